use async_trait::async_trait;
use log::{debug, error, info};
use reqwest::tls;
use std::time::Duration;

use crate::config::{DisplayCurrency, PAGE_SIZE};
use crate::error::CoinWatchError;

/// Source of raw response text for a URL.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, CoinWatchError>;
}

/// URL builder for the global and ticker endpoints.
#[derive(Debug, Clone)]
pub struct Endpoints {
    base_url: String,
}

impl Endpoints {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim().trim_end_matches('/').to_string(),
        }
    }

    pub fn global(&self, currency: DisplayCurrency) -> String {
        format!("{}/v2/global/?convert={}", self.base_url, currency.code())
    }

    /// Ticker listing for the zero-based `page`.
    pub fn ticker(&self, page: usize, currency: DisplayCurrency) -> String {
        format!(
            "{}/v2/ticker/?sort=id&start={}&limit={}&convert={}",
            self.base_url,
            page * PAGE_SIZE + 1,
            PAGE_SIZE,
            currency.code()
        )
    }
}

/// HTTPS fetcher with gzip/deflate decoding and a TLS 1.2 floor.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Option<Duration>) -> Result<Self, CoinWatchError> {
        let mut builder = reqwest::Client::builder()
            .gzip(true)
            .deflate(true)
            .min_tls_version(tls::Version::TLS_1_2)
            .user_agent(concat!("coinwatch/", env!("CARGO_PKG_VERSION")));

        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let client = builder
            .build()
            .map_err(|e| CoinWatchError::Network(format!("Failed to create HTTP client: {}", e)))?;

        info!("Created HTTP fetcher (timeout: {:?})", timeout);
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, CoinWatchError> {
        debug!("GET {}", url);

        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                error!("Request to {} failed: {}", url, e);
                return Err(e.into());
            }
        };

        let status = response.status();
        if !status.is_success() {
            error!("Request to {} returned {}", url, status);
            return Err(CoinWatchError::Network(format!("HTTP {} from {}", status, url)));
        }

        let body = response.text().await?;
        debug!("Received {} bytes from {}", body.len(), url);
        Ok(body)
    }
}
