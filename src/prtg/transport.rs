//! HTTP transport seam and credential redaction for logged URLs.

use crate::constants::USER_AGENT;
use crate::prtg::error::{PrtgError, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use url::Url;

/// Status and body of a completed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new<B: Into<String>>(status: u16, body: B) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn ok<B: Into<String>>(body: B) -> Self {
        Self::new(200, body)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_retryable_status(&self) -> bool {
        matches!(self.status, 502 | 503 | 504)
    }
}

/// GET-only transport to the PRTG web server.
///
/// Errors returned here are transport failures only; HTTP error statuses come
/// back as an `HttpResponse` and are classified by the normalizer.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &Url) -> Result<HttpResponse>;
}

pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(request_timeout: Duration, connect_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .connect_timeout(connect_timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| PrtgError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &Url) -> Result<HttpResponse> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| transport_error(e, url))?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| transport_error(e, url))?;
        Ok(HttpResponse { status, body })
    }
}

fn transport_error(error: reqwest::Error, url: &Url) -> PrtgError {
    if error.is_timeout() {
        PrtgError::Timeout { url: redact(url) }
    } else {
        PrtgError::connection(redact(url), error.to_string())
    }
}

/// Request URL with the passhash masked, for logs and error messages.
pub fn redact(url: &Url) -> String {
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(key, value)| {
            let value = if key == "passhash" {
                "***".to_string()
            } else {
                value.into_owned()
            };
            (key.into_owned(), value)
        })
        .collect();

    if pairs.is_empty() {
        return url.to_string();
    }

    let mut redacted = url.clone();
    redacted.query_pairs_mut().clear().extend_pairs(pairs);
    redacted.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_masks_passhash() {
        let url = Url::parse(
            "https://prtg.local/table.json?username=api&passhash=123456&content=devices",
        )
        .unwrap();
        let redacted = redact(&url);
        assert_eq!(
            redacted,
            "https://prtg.local/table.json?username=api&passhash=***&content=devices"
        );
    }

    #[test]
    fn test_redact_without_query() {
        let url = Url::parse("https://prtg.local/status.json").unwrap();
        assert_eq!(redact(&url), "https://prtg.local/status.json");
    }

    #[test]
    fn test_status_classes() {
        assert!(HttpResponse::ok("{}").is_success());
        assert!(!HttpResponse::new(400, "").is_success());
        assert!(HttpResponse::new(503, "").is_retryable_status());
        assert!(!HttpResponse::new(500, "").is_retryable_status());
    }
}
