//! HTTP client for the Backboard thread API.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::Url;

use super::{TeamError, TeamMessage, TeamStore, DEFAULT_BACKBOARD_URL};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Backboard API client.
pub struct BackboardClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl BackboardClient {
    /// Creates a client for the default URL.
    pub fn new() -> Result<Self, TeamError> {
        Self::with_url(DEFAULT_BACKBOARD_URL)
    }

    /// Creates a client for a custom URL.
    pub fn with_url(base_url: &str) -> Result<Self, TeamError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: None,
        })
    }

    /// Sets the API key for authentication.
    pub fn with_api_key(mut self, api_key: &str) -> Self {
        self.api_key = Some(api_key.to_string());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `<base>/threads/<thread_id>/messages`, with `thread_id` encoded as a
    /// single path segment.
    fn messages_url(&self, thread_id: &str) -> Result<Url, TeamError> {
        let invalid = || TeamError::InvalidUrl(self.base_url.clone());
        let mut url = Url::parse(&self.base_url).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|()| invalid())?
            .pop_if_empty()
            .extend(["threads", thread_id, "messages"]);
        Ok(url)
    }
}

impl TeamStore for BackboardClient {
    fn store(&self, thread_id: &str, message: &TeamMessage) -> Result<(), TeamError> {
        let api_key = self.api_key.as_ref().ok_or(TeamError::NotConfigured)?;
        if thread_id.trim().is_empty() {
            return Err(TeamError::NotConfigured);
        }

        let url = self.messages_url(thread_id)?;
        tracing::debug!("Posting to {url}");

        let response = self
            .client
            .post(url)
            .header("X-API-Key", api_key)
            .json(message)
            .send()?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(TeamError::ServerError { status, message });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message() -> TeamMessage {
        TeamMessage {
            content: "Learning: x".to_string(),
            metadata: json!({ "type": "learning" }),
        }
    }

    #[test]
    fn test_default_url() {
        let client = BackboardClient::new().unwrap();
        assert_eq!(client.base_url(), DEFAULT_BACKBOARD_URL);
    }

    #[test]
    fn test_with_url_trims_trailing_slash() {
        let client = BackboardClient::with_url("https://example.com/api/").unwrap();
        assert_eq!(client.base_url(), "https://example.com/api");
        assert_eq!(
            client.messages_url("thread-1").unwrap().as_str(),
            "https://example.com/api/threads/thread-1/messages"
        );
    }

    #[test]
    fn test_messages_url_encodes_thread_id() {
        let client = BackboardClient::with_url("https://example.com/api").unwrap();
        assert_eq!(
            client.messages_url("../admin/x y").unwrap().as_str(),
            "https://example.com/api/threads/..%2Fadmin%2Fx%20y/messages"
        );
    }

    #[test]
    fn test_store_with_invalid_base_url() {
        let client = BackboardClient::with_url("not a url")
            .unwrap()
            .with_api_key("key");
        assert!(matches!(
            client.store("thread-1", &message()),
            Err(TeamError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_store_without_api_key() {
        let client = BackboardClient::new().unwrap();
        assert!(matches!(
            client.store("thread-1", &message()),
            Err(TeamError::NotConfigured)
        ));
    }

    #[test]
    fn test_store_without_thread() {
        let client = BackboardClient::new().unwrap().with_api_key("key");
        assert!(matches!(
            client.store("  ", &message()),
            Err(TeamError::NotConfigured)
        ));
    }

    #[test]
    fn test_store_unreachable_server() {
        let client = BackboardClient::with_url("http://127.0.0.1:1")
            .unwrap()
            .with_api_key("key");

        assert!(matches!(
            client.store("thread-1", &message()),
            Err(TeamError::Http(_))
        ));
    }

    #[test]
    fn test_message_wire_format() {
        let value = serde_json::to_value(message()).unwrap();
        assert_eq!(value, json!({ "content": "Learning: x", "metadata": { "type": "learning" } }));
    }
}
