use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

use crate::circuit_breaker::{create_source_circuit_breaker, guarded, SourceCircuitBreaker};
use crate::errors::SourceError;
use crate::models::SourceKind;

/// How a vendor expects to be authenticated.
#[derive(Debug, Clone)]
pub enum SourceAuth {
    None,
    /// Static headers sent on every call.
    Headers(Vec<(String, String)>),
    /// HTTP basic auth; Companies House uses the API key as username with no password.
    Basic {
        username: String,
        password: Option<String>,
    },
}

/// HTTP plumbing shared by the adapters: one reqwest client, one breaker, one
/// place that turns vendor status codes into [`SourceError`]s.
#[derive(Clone)]
pub struct SourceHttpClient {
    vendor: SourceKind,
    client: Client,
    base_url: String,
    auth: SourceAuth,
    breaker: SourceCircuitBreaker,
}

impl SourceHttpClient {
    pub fn new(
        vendor: SourceKind,
        base_url: impl Into<String>,
        auth: SourceAuth,
        timeout: Duration,
    ) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SourceError::transport(vendor, format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            vendor,
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth,
            breaker: create_source_circuit_breaker(),
        })
    }

    pub fn vendor(&self) -> SourceKind {
        self.vendor
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `{base}/{path}` with `query` encoded as parameters.
    pub async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value, SourceError> {
        let url = self.url(path, query)?;
        tracing::debug!("{} GET {}", self.vendor, url.path());
        let request = self.authorize(self.client.get(url));
        guarded(&self.breaker, self.vendor, self.execute(request, path)).await
    }

    /// POST a JSON body to `{base}/{path}`.
    pub async fn post_json<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Value, SourceError> {
        let url = self.url(path, &[])?;
        tracing::debug!("{} POST {}", self.vendor, url.path());
        let request = self.authorize(self.client.post(url).json(body));
        guarded(&self.breaker, self.vendor, self.execute(request, path)).await
    }

    fn url(&self, path: &str, query: &[(&str, String)]) -> Result<reqwest::Url, SourceError> {
        let raw = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let url = if query.is_empty() {
            reqwest::Url::parse(&raw)
        } else {
            reqwest::Url::parse_with_params(&raw, query.iter().map(|(k, v)| (*k, v.as_str())))
        };
        url.map_err(|e| SourceError::InvalidQuery(format!("Failed to build URL: {}", e)))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth {
            SourceAuth::None => request,
            SourceAuth::Headers(headers) => headers
                .iter()
                .fold(request, |req, (name, value)| req.header(name.as_str(), value.as_str())),
            SourceAuth::Basic { username, password } => request.basic_auth(username, password.as_ref()),
        }
    }

    async fn execute(&self, request: RequestBuilder, resource: &str) -> Result<Value, SourceError> {
        let response = request.send().await.map_err(|e| {
            SourceError::transport(self.vendor, format!("request failed: {}", e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::warn!("{} returned {} for {}", self.vendor, status, resource);
            return Err(classify_status(self.vendor, status, resource, &error_text));
        }

        let body = response
            .text()
            .await
            .map_err(|e| SourceError::transport(self.vendor, format!("failed to read body: {}", e)))?;

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&body).map_err(|e| SourceError::malformed(self.vendor, e.to_string()))
    }
}

/// Maps a non-success status to the error taxonomy.
pub fn classify_status(vendor: SourceKind, status: StatusCode, resource: &str, body: &str) -> SourceError {
    match status {
        StatusCode::NOT_FOUND => SourceError::NotFound {
            vendor,
            resource: resource.to_string(),
        },
        StatusCode::TOO_MANY_REQUESTS | StatusCode::REQUEST_TIMEOUT => {
            SourceError::transport(vendor, format!("status {}", status.as_u16()))
        }
        s if s.is_server_error() => SourceError::transport(vendor, format!("status {}", s.as_u16())),
        s => SourceError::business(vendor, vendor_message(body).unwrap_or_else(|| format!("status {}", s.as_u16()))),
    }
}

/// Pulls the human-readable message out of a vendor error body.
pub fn vendor_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(json) = serde_json::from_str::<Value>(trimmed) {
        let candidates = [
            json.get("Message"),
            json.get("message"),
            json.get("error").and_then(|e| e.get("message")),
            json.get("error").filter(|e| e.is_string()),
            json.get("errors")
                .and_then(|e| e.get(0))
                .and_then(|e| e.get("error").or_else(|| e.get("message"))),
            json.get("TransactionResult").and_then(|t| t.get("ResultText")),
            json.get("detail"),
        ];
        if let Some(msg) = candidates
            .into_iter()
            .flatten()
            .filter_map(|v| v.as_str())
            .map(str::trim)
            .find(|s| !s.is_empty())
        {
            return Some(msg.to_string());
        }
    }

    Some(trimmed.chars().take(200).collect())
}
