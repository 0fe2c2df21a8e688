/// hcs-did-resolve - resolve a did:hedera identifier from the command line
///
/// Usage: `hcs-did-resolve <did>`. Configuration comes from the environment
/// (see `ResolverConfig::from_env`); the resolved DID document and its
/// metadata are printed as JSON. Set `DID_RESOLVER_LOG_FORMAT=json` for
/// structured logs on stderr.

use anyhow::{bail, Context};
use hcs_did_resolver::{
    resolve, DefaultVerifier, DocumentState, HcsDid, HttpMirrorClient, ResolverConfig,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer, Registry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging; stdout is reserved for the document
    let log_layer: Box<dyn Layer<Registry> + Send + Sync> =
        match std::env::var("DID_RESOLVER_LOG_FORMAT").as_deref() {
            Ok("json") => Box::new(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(true),
            ),
            _ => Box::new(tracing_subscriber::fmt::layer().with_writer(std::io::stderr)),
        };

    tracing_subscriber::registry()
        .with(log_layer)
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hcs_did_resolver=info".into()),
        )
        .init();

    let did = match std::env::args().nth(1) {
        Some(did) => did,
        None => bail!("usage: hcs-did-resolve <did:hedera:...>"),
    };

    // Load configuration, following the DID's network unless overridden
    let mut config = ResolverConfig::from_env().context("Failed to load configuration")?;
    let parsed = HcsDid::parse(&did).context("Invalid DID")?;
    if parsed.network() != config.network && std::env::var("HEDERA_MIRROR_URL").is_err() {
        warn!(
            "Switching from {} to {} to match the DID",
            config.network,
            parsed.network()
        );
        config.network = parsed.network();
        config.mirror_base_url = parsed.network().default_mirror_url().to_string();
    }

    info!("Resolving {} via {}", did, config.mirror_base_url);

    let client = Arc::new(HttpMirrorClient::new(&config)?);
    let document = resolve(&did, client, config, Arc::new(DefaultVerifier)).await?;

    if document.state() == DocumentState::NotRegistered {
        warn!("{} is not registered", did);
    }

    let output = json!({
        "didDocument": document.to_did_document()?,
        "didDocumentMetadata": document.resolution_metadata(),
        "conflicts": document.conflicts().iter().map(|c| c.to_string()).collect::<Vec<_>>(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
