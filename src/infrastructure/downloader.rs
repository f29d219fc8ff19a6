// src/infrastructure/downloader.rs
use crate::application::MediaFetcher;
use crate::domain::DomainError;
use reqwest::blocking::Client;
use std::time::Duration;
use tracing::{debug, instrument};

/// Downloads media over HTTP(S).
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, DomainError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DomainError::Fetch(e.to_string()))?;
        Ok(Self { client })
    }
}

impl MediaFetcher for HttpFetcher {
    #[instrument(level = "debug", skip(self))]
    fn fetch(&self, url: &str) -> Result<Vec<u8>, DomainError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| DomainError::Fetch(format!("{} download failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DomainError::Fetch(format!(
                "{} download failed with return code {}",
                url,
                status.as_u16()
            )));
        }

        let body = response
            .bytes()
            .map_err(|e| DomainError::Fetch(format!("{} download failed: {}", url, e)))?;
        debug!(bytes = body.len(), "Downloaded media");
        Ok(body.to_vec())
    }
}
