//! services/api/src/adapters/http_fetch.rs
//!
//! This module contains the adapter for fetching source pages over HTTP.
//! It implements the `HttpFetcher` port from the `core` crate using `reqwest`.

use async_trait::async_trait;
use quiz_forge_core::ports::{FetchError, FetchOptions, FetchedPage, HttpFetcher};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use tracing::debug;

const MAX_REDIRECTS: usize = 5;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `HttpFetcher` with a shared `reqwest` client.
#[derive(Clone)]
pub struct ReqwestFetcher {
    client: Client,
}

impl ReqwestFetcher {
    /// Creates a new `ReqwestFetcher`.
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .gzip(true)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()?;
        Ok(Self { client })
    }
}

fn header_map(options: &FetchOptions) -> Result<HeaderMap, FetchError> {
    let mut headers = HeaderMap::new();
    for (name, value) in &options.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| FetchError::Transport(format!("invalid header name {}: {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| FetchError::Transport(format!("invalid header value: {}", e)))?;
        headers.insert(name, value);
    }
    Ok(headers)
}

fn map_transport(e: reqwest::Error, options: &FetchOptions) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout(options.timeout)
    } else if e.is_builder() {
        FetchError::InvalidUrl(e.to_string())
    } else {
        FetchError::Transport(e.to_string())
    }
}

//=========================================================================================
// `HttpFetcher` Trait Implementation
//=========================================================================================

#[async_trait]
impl HttpFetcher for ReqwestFetcher {
    /// Fetches `url`, reading at most `max_bytes` of body before giving up.
    async fn get(&self, url: &str, options: &FetchOptions) -> Result<FetchedPage, FetchError> {
        let parsed = url::Url::parse(url).map_err(|e| FetchError::InvalidUrl(e.to_string()))?;

        let mut response = self
            .client
            .get(parsed)
            .headers(header_map(options)?)
            .timeout(options.timeout)
            .send()
            .await
            .map_err(|e| map_transport(e, options))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        if let Some(length) = response.content_length() {
            if length > options.max_bytes as u64 {
                return Err(FetchError::TooLarge {
                    limit: options.max_bytes,
                });
            }
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        // Content-Length may be absent or wrong, so the limit is enforced while streaming.
        let mut body: Vec<u8> = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| map_transport(e, options))?
        {
            if body.len() + chunk.len() > options.max_bytes {
                return Err(FetchError::TooLarge {
                    limit: options.max_bytes,
                });
            }
            body.extend_from_slice(&chunk);
        }

        debug!(url, bytes = body.len(), "Fetched page");
        Ok(FetchedPage {
            content_type,
            body: String::from_utf8_lossy(&body).into_owned(),
        })
    }
}
