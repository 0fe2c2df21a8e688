/// Mirror node REST client
use crate::{
    config::ResolverConfig,
    error::{DidError, DidResult},
    identity::TopicId,
    transport::{MirrorClient, TopicMessagesPage},
};
use async_trait::async_trait;
use tracing::debug;

/// Mirror client backed by the public REST API
#[derive(Clone)]
pub struct HttpMirrorClient {
    http_client: reqwest::Client,
    base_url: String,
    page_limit: u32,
}

impl HttpMirrorClient {
    /// Create a new mirror client
    pub fn new(config: &ResolverConfig) -> DidResult<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| DidError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: config.mirror_base_url.trim_end_matches('/').to_string(),
            page_limit: config.page_limit,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn messages_url(&self, topic_id: &TopicId, after: Option<&str>) -> String {
        let mut url = format!(
            "{}/api/v1/topics/{}/messages?limit={}&order=asc",
            self.base_url, topic_id, self.page_limit
        );
        if let Some(timestamp) = after {
            url.push_str("&timestamp=gt:");
            url.push_str(timestamp);
        }
        url
    }
}

#[async_trait]
impl MirrorClient for HttpMirrorClient {
    async fn fetch_messages(
        &self,
        topic_id: &TopicId,
        after: Option<&str>,
    ) -> DidResult<TopicMessagesPage> {
        let url = self.messages_url(topic_id, after);
        debug!("Fetching topic messages: {}", url);

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| DidError::Transport(format!("Failed to fetch topic messages: {}", e)))?;

        if !response.status().is_success() {
            return Err(DidError::Transport(format!(
                "Mirror node returned error: {}",
                response.status()
            )));
        }

        let page: TopicMessagesPage = response
            .json()
            .await
            .map_err(|e| DidError::Transport(format!("Invalid topic messages response: {}", e)))?;

        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_url() {
        let mut config = ResolverConfig::default();
        config.mirror_base_url = "http://localhost:5551/".to_string();
        config.page_limit = 25;
        let client = HttpMirrorClient::new(&config).unwrap();
        let topic: TopicId = "0.0.1234".parse().unwrap();

        assert_eq!(client.base_url(), "http://localhost:5551");
        assert_eq!(
            client.messages_url(&topic, None),
            "http://localhost:5551/api/v1/topics/0.0.1234/messages?limit=25&order=asc"
        );
        assert_eq!(
            client.messages_url(&topic, Some("1676373386.541924003")),
            "http://localhost:5551/api/v1/topics/0.0.1234/messages?limit=25&order=asc&timestamp=gt:1676373386.541924003"
        );
    }

    #[tokio::test]
    async fn test_unreachable_mirror_is_transport_error() {
        let mut config = ResolverConfig::default();
        config.mirror_base_url = "http://127.0.0.1:1".to_string();
        let client = HttpMirrorClient::new(&config).unwrap();
        let topic: TopicId = "0.0.1".parse().unwrap();

        let result = client.fetch_messages(&topic, None).await;
        assert!(matches!(result, Err(DidError::Transport(_))));
    }
}
