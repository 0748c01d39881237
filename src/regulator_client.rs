use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use std::time::Duration;

use crate::config::Config;
use crate::errors::SourceError;
use crate::http_client::{SourceAuth, SourceHttpClient};
use crate::models::{EntityKey, SearchFilters, SearchResult, SourceKind, SubResource, SubResourceResponse};
use crate::source_adapter::{ensure_source, unsupported, validate_query, SourceAdapter};

/// The register answers an empty search with 200, no `Data`, and a message like
/// "No search result found".
static NO_RESULTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bno\s+(search\s+)?results?\s+(were\s+)?found\b").expect("no-results pattern")
});

const DOSSIER_RESOURCES: &[SubResource] = &[
    SubResource::Profile,
    SubResource::Address,
    SubResource::Individuals,
    SubResource::Permissions,
    SubResource::Requirements,
    SubResource::Regulators,
    SubResource::Passports,
    SubResource::DisciplinaryHistory,
    SubResource::Waivers,
    SubResource::TradingNames,
];

/// Client for the FCA Financial Services Register.
#[derive(Clone)]
pub struct RegulatorClient {
    http: SourceHttpClient,
    default_per_page: u32,
}

impl RegulatorClient {
    pub fn new(config: &Config) -> Result<Self, SourceError> {
        let http = SourceHttpClient::new(
            SourceKind::Regulator,
            config.regulator_base_url.clone(),
            SourceAuth::Headers(vec![
                ("X-AUTH-EMAIL".to_string(), config.regulator_auth_email.clone()),
                ("X-AUTH-KEY".to_string(), config.regulator_auth_key.clone()),
            ]),
            Duration::from_secs(config.http_timeout_secs),
        )?;

        Ok(Self {
            http,
            default_per_page: config.search_page_size,
        })
    }

    fn path_for(frn: &str, resource: SubResource) -> Option<String> {
        let suffix = match resource {
            SubResource::Profile => return Some(format!("Firm/{}", frn)),
            SubResource::Address => "Address",
            SubResource::Individuals => "Individuals",
            SubResource::Permissions => "Permissions",
            SubResource::Requirements => "Requirements",
            SubResource::Regulators => "Regulators",
            SubResource::Passports => "Passports",
            SubResource::DisciplinaryHistory => "DisciplinaryHistory",
            SubResource::Waivers => "Waivers",
            SubResource::TradingNames => "Names",
            _ => return None,
        };
        Some(format!("Firm/{}/{}", frn, suffix))
    }
}

#[async_trait]
impl SourceAdapter for RegulatorClient {
    fn source(&self) -> SourceKind {
        SourceKind::Regulator
    }

    fn dossier_resources(&self) -> &'static [SubResource] {
        DOSSIER_RESOURCES
    }

    async fn search(&self, query: &str, filters: &SearchFilters) -> Result<Vec<SearchResult>, SourceError> {
        let query = validate_query(query)?;
        tracing::info!("Searching FCA register for: {}", query);

        let per_page = filters.per_page.unwrap_or(self.default_per_page);
        let payload = self
            .http
            .get_json(
                "Search",
                &[
                    ("q", query.to_string()),
                    ("type", filters.search_type.as_str().to_string()),
                    ("per_page", per_page.to_string()),
                ],
            )
            .await?;

        let results = parse_search(&payload)?;
        tracing::info!("FCA search returned {} candidates", results.len());
        Ok(results)
    }

    async fn fetch_sub_resource(&self, key: &EntityKey, resource: SubResource) -> SubResourceResponse {
        if let Err(e) = ensure_source(SourceKind::Regulator, key) {
            return SubResourceResponse::from_result(Err(e));
        }
        let Some(path) = Self::path_for(key.as_str(), resource) else {
            return unsupported(SourceKind::Regulator, resource);
        };

        SubResourceResponse::from_result(self.http.get_json(&path, &[]).await)
    }
}

/// Reads the `{Status, Message, Data}` search envelope.
pub fn parse_search(payload: &Value) -> Result<Vec<SearchResult>, SourceError> {
    match payload.get("Data") {
        Some(Value::Array(rows)) => Ok(rows.iter().filter_map(search_row).collect()),
        Some(Value::Null) | None => {
            let message = payload
                .get("Message")
                .and_then(|m| m.as_str())
                .map(str::trim)
                .unwrap_or_default();
            if message.is_empty() || NO_RESULTS.is_match(message) {
                Ok(Vec::new())
            } else {
                Err(SourceError::business(SourceKind::Regulator, message))
            }
        }
        Some(other) => Err(SourceError::malformed(
            SourceKind::Regulator,
            format!("search Data was {}, expected an array", json_kind(other)),
        )),
    }
}

fn search_row(row: &Value) -> Option<SearchResult> {
    let key = match row.get("Reference Number") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => {
            tracing::warn!("Skipping FCA search row without a reference number");
            return None;
        }
    };

    Some(SearchResult {
        source: SourceKind::Regulator,
        key,
        name: text(row, "Name").unwrap_or_default(),
        status: text(row, "Status"),
        entity_type: text(row, "Type of business or Individual"),
        address_snippet: None,
    })
}

fn text(row: &Value, field: &str) -> Option<String> {
    row.get(field)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
