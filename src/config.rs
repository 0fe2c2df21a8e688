/// Configuration management for DID resolution
use crate::{
    error::{DidError, DidResult},
    identity::Network,
};
use std::env;
use std::time::Duration;

/// Quiet period after the last message before a resolution completes
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Delay between mirror node polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1_000);

/// Messages requested per mirror node page
pub const DEFAULT_PAGE_LIMIT: u32 = 100;

/// Resolver configuration
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub network: Network,
    /// Mirror node REST base URL
    pub mirror_base_url: String,
    pub idle_timeout: Duration,
    pub poll_interval: Duration,
    /// Upper bound on a whole resolution; `None` waits for quiescence only
    pub hard_deadline: Option<Duration>,
    pub page_limit: u32,
    /// Swallow transport errors instead of failing the resolution
    pub ignore_errors: bool,
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self::for_network(Network::Testnet)
    }
}

impl ResolverConfig {
    /// Defaults for a network, using its public mirror node
    pub fn for_network(network: Network) -> Self {
        Self {
            network,
            mirror_base_url: network.default_mirror_url().to_string(),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            hard_deadline: None,
            page_limit: DEFAULT_PAGE_LIMIT,
            ignore_errors: false,
            request_timeout: Duration::from_secs(10),
            user_agent: format!("hcs-did-resolver/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> DidResult<Self> {
        dotenv::dotenv().ok();

        let network: Network = env::var("HEDERA_NETWORK")
            .unwrap_or_else(|_| "testnet".to_string())
            .parse()
            .map_err(|_| DidError::Config("HEDERA_NETWORK must be mainnet, testnet or previewnet".to_string()))?;

        let mut config = Self::for_network(network);

        if let Ok(url) = env::var("HEDERA_MIRROR_URL") {
            config.mirror_base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(ms) = env_millis("DID_RESOLVER_IDLE_TIMEOUT_MS")? {
            config.idle_timeout = ms;
        }
        if let Some(ms) = env_millis("DID_RESOLVER_POLL_INTERVAL_MS")? {
            config.poll_interval = ms;
        }
        config.hard_deadline = env_millis("DID_RESOLVER_HARD_DEADLINE_MS")?;

        if let Ok(limit) = env::var("DID_RESOLVER_PAGE_LIMIT") {
            config.page_limit = limit
                .parse()
                .map_err(|_| DidError::Config("Invalid DID_RESOLVER_PAGE_LIMIT".to_string()))?;
        }
        if let Ok(ignore) = env::var("DID_RESOLVER_IGNORE_ERRORS") {
            config.ignore_errors = ignore
                .parse()
                .map_err(|_| DidError::Config("Invalid DID_RESOLVER_IGNORE_ERRORS".to_string()))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> DidResult<()> {
        if self.mirror_base_url.is_empty() {
            return Err(DidError::Config("Mirror base URL cannot be empty".to_string()));
        }

        if self.idle_timeout.is_zero() {
            return Err(DidError::Config("Idle timeout must be positive".to_string()));
        }

        if self.poll_interval.is_zero() {
            return Err(DidError::Config("Poll interval must be positive".to_string()));
        }

        if self.page_limit == 0 {
            return Err(DidError::Config("Page limit must be positive".to_string()));
        }

        if let Some(deadline) = self.hard_deadline {
            if deadline < self.idle_timeout {
                return Err(DidError::Config(
                    "Hard deadline must not be shorter than the idle timeout".to_string(),
                ));
            }
        }

        Ok(())
    }
}

fn env_millis(name: &str) -> DidResult<Option<Duration>> {
    match env::var(name) {
        Ok(value) => value
            .parse::<u64>()
            .map(|ms| Some(Duration::from_millis(ms)))
            .map_err(|_| DidError::Config(format!("Invalid {}", name))),
        Err(_) => Ok(None),
    }
}
