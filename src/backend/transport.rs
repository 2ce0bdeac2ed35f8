use async_trait::async_trait;
use std::time::Duration;

use super::config::Config;
use super::error::FetchError;

/// Raw HTTPS GET. Everything the backend reads from the network goes through here.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: &Config) -> Result<Self, FetchError> {
        Ok(Self {
            client: build_client(config)?,
        })
    }
}

fn build_client(config: &Config) -> Result<reqwest::Client, FetchError> {
    reqwest::Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build()
        .map_err(|e| FetchError::Transport(format!("failed to build HTTP client: {e}")))
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        log::debug!("GET {url}");
        let response = self.client.get(url).send().await?.error_for_status()?;
        let bytes = response.bytes().await?;
        Ok(bytes.to_vec())
    }
}
