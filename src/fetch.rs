//! Receipt image download.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::FetchError;
use crate::pipeline::types::MediaFetcher;

/// Per-download request timeout.
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// `reqwest`-backed media fetcher.
#[derive(Clone)]
pub struct HttpMediaFetcher {
    client: reqwest::Client,
}

impl HttpMediaFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MediaFetcher for HttpMediaFetcher {
    async fn fetch(&self, url: &str, bearer: Option<&str>) -> Result<Vec<u8>, FetchError> {
        let mut request = self.client.get(url).timeout(FETCH_TIMEOUT);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| FetchError::Request {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await.map_err(|e| FetchError::Request {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        Ok(bytes.to_vec())
    }
}
