// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! HTTP transport seam.
//!
//! Sources never talk to the network directly; they receive a [`Fetcher`]
//! so tests can substitute canned payloads.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;

use crate::error::FeedError;

/// Default per-request timeout.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(20);

/// Retrieves raw payload bytes for a URL.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FeedError>;
}

/// [`Fetcher`] backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Build a client with the given request timeout and user agent.
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, FeedError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| FeedError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FeedError> {
        debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FeedError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FeedError::Transport(e.to_string()))?;
        Ok(body.to_vec())
    }
}


#[cfg(test)]
mod tests {
    use super::fake::FakeFetcher;
    use super::*;

    #[test]
    fn test_http_fetcher_builds() {
        assert!(HttpFetcher::new(DEFAULT_FETCH_TIMEOUT, "geowatch-test").is_ok());
    }

    #[tokio::test]
    async fn test_fake_routes_by_url() {
        let fetcher = FakeFetcher::new();
        fetcher.respond("https://a", "hello");
        fetcher.fail("https://b", FeedError::HttpStatus { status: 500, url: "https://b".into() });

        assert_eq!(fetcher.fetch("https://a").await.unwrap(), b"hello".to_vec());
        assert!(matches!(fetcher.fetch("https://b").await, Err(FeedError::HttpStatus { status: 500, .. })));
        assert!(matches!(fetcher.fetch("https://c").await, Err(FeedError::Transport(_))));
        assert_eq!(fetcher.calls(), 3);
    }
}
