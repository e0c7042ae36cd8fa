use std::time::Duration;

use creatordb_core::HarvesterSettings;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::Value;

use crate::error::HarvestError;

/// Fallback `Retry-After` when a 429 carries none.
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Shared HTTP client for every platform engine.
///
/// Maps 429 to [`HarvestError::RateLimited`], 404 to [`HarvestError::NotFound`]
/// and any other non-2xx to [`HarvestError::UnexpectedStatus`]. Nothing is
/// retried here; the cascade moves on to the next strategy instead.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

pub(crate) fn extract_domain(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_owned))
        .unwrap_or_else(|| url.to_owned())
}

impl HttpFetcher {
    /// # Errors
    ///
    /// Returns [`HarvestError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(settings: &HarvesterSettings) -> Result<Self, HarvestError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(&settings.user_agent)
            .build()?;
        Ok(Self { client })
    }

    /// GETs a document as text.
    ///
    /// # Errors
    ///
    /// Status-mapped errors as described on [`HttpFetcher`], or
    /// [`HarvestError::Http`] on transport failure.
    pub async fn get_text(&self, url: &str, headers: &[(&str, &str)]) -> Result<String, HarvestError> {
        let request = with_headers(self.client.get(url), headers)
            .header(reqwest::header::ACCEPT, "text/html,application/xhtml+xml,*/*");
        let response = send(request, url).await?;
        Ok(response.text().await?)
    }

    /// GETs and parses a JSON body.
    ///
    /// # Errors
    ///
    /// As [`HttpFetcher::get_text`], plus [`HarvestError::Deserialize`] when
    /// the body is not JSON.
    pub async fn get_json(&self, url: &str, headers: &[(&str, &str)]) -> Result<Value, HarvestError> {
        let request = with_headers(self.client.get(url), headers)
            .header(reqwest::header::ACCEPT, "application/json");
        let response = send(request, url).await?;
        parse_json(response, url).await
    }

    /// POSTs a JSON body and parses the JSON reply.
    ///
    /// # Errors
    ///
    /// As [`HttpFetcher::get_json`].
    pub async fn post_json(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: &Value,
    ) -> Result<Value, HarvestError> {
        let request = with_headers(self.client.post(url), headers)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(body);
        let response = send(request, url).await?;
        parse_json(response, url).await
    }

    /// GETs raw bytes with the response `Content-Type`, if any.
    ///
    /// # Errors
    ///
    /// As [`HttpFetcher::get_text`].
    pub async fn get_bytes(&self, url: &str) -> Result<(Vec<u8>, Option<String>), HarvestError> {
        let response = send(self.client.get(url), url).await?;
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let bytes = response.bytes().await?;
        Ok((bytes.to_vec(), content_type))
    }
}

fn with_headers(mut request: RequestBuilder, headers: &[(&str, &str)]) -> RequestBuilder {
    for (name, value) in headers {
        request = request.header(*name, *value);
    }
    request
}

async fn send(request: RequestBuilder, url: &str) -> Result<Response, HarvestError> {
    let response = request.send().await?;
    let status = response.status();

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after_secs = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok())
            .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
        return Err(HarvestError::RateLimited {
            domain: extract_domain(url),
            retry_after_secs,
        });
    }

    if status == StatusCode::NOT_FOUND {
        return Err(HarvestError::NotFound {
            url: url.to_owned(),
        });
    }

    if !status.is_success() {
        return Err(HarvestError::UnexpectedStatus {
            status: status.as_u16(),
            url: url.to_owned(),
        });
    }

    Ok(response)
}

async fn parse_json(response: Response, url: &str) -> Result<Value, HarvestError> {
    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|source| HarvestError::Deserialize {
        context: url.to_owned(),
        source,
    })
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
