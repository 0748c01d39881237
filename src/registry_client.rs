use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use crate::config::Config;
use crate::errors::SourceError;
use crate::http_client::{SourceAuth, SourceHttpClient};
use crate::models::{EntityKey, SearchFilters, SearchResult, SourceKind, SubResource, SubResourceResponse};
use crate::regulator_client::json_kind;
use crate::source_adapter::{ensure_source, unsupported, validate_query, SourceAdapter};

const DOSSIER_RESOURCES: &[SubResource] = &[
    SubResource::Profile,
    SubResource::Individuals,
    SubResource::FilingHistory,
    SubResource::SignificantControl,
];

/// Client for the Companies House public data API.
#[derive(Clone)]
pub struct RegistryClient {
    http: SourceHttpClient,
    default_per_page: u32,
}

impl RegistryClient {
    pub fn new(config: &Config) -> Result<Self, SourceError> {
        let http = SourceHttpClient::new(
            SourceKind::Registry,
            config.registry_base_url.clone(),
            SourceAuth::Basic {
                username: config.registry_api_key.clone(),
                password: None,
            },
            Duration::from_secs(config.http_timeout_secs),
        )?;

        Ok(Self {
            http,
            default_per_page: config.search_page_size,
        })
    }

    fn path_for(company_number: &str, resource: SubResource) -> Option<String> {
        let suffix = match resource {
            SubResource::Profile => return Some(format!("company/{}", company_number)),
            SubResource::Individuals => "officers",
            SubResource::FilingHistory => "filing-history",
            SubResource::SignificantControl => "persons-with-significant-control",
            _ => return None,
        };
        Some(format!("company/{}/{}", company_number, suffix))
    }
}

#[async_trait]
impl SourceAdapter for RegistryClient {
    fn source(&self) -> SourceKind {
        SourceKind::Registry
    }

    fn dossier_resources(&self) -> &'static [SubResource] {
        DOSSIER_RESOURCES
    }

    async fn search(&self, query: &str, filters: &SearchFilters) -> Result<Vec<SearchResult>, SourceError> {
        let query = validate_query(query)?;
        tracing::info!("Searching Companies House for: {}", query);

        let per_page = filters.per_page.unwrap_or(self.default_per_page);
        let payload = self
            .http
            .get_json(
                "search/companies",
                &[("q", query.to_string()), ("items_per_page", per_page.to_string())],
            )
            .await?;

        let results = parse_search(&payload)?;
        tracing::info!("Companies House search returned {} candidates", results.len());
        Ok(results)
    }

    async fn fetch_sub_resource(&self, key: &EntityKey, resource: SubResource) -> SubResourceResponse {
        if let Err(e) = ensure_source(SourceKind::Registry, key) {
            return SubResourceResponse::from_result(Err(e));
        }
        let Some(path) = Self::path_for(key.as_str(), resource) else {
            return unsupported(SourceKind::Registry, resource);
        };

        SubResourceResponse::from_result(self.http.get_json(&path, &[]).await)
    }
}

/// Reads the `{items: [...]}` search envelope. A missing `items` means no hits.
pub fn parse_search(payload: &Value) -> Result<Vec<SearchResult>, SourceError> {
    match payload.get("items") {
        Some(Value::Array(items)) => Ok(items.iter().filter_map(search_item).collect()),
        Some(Value::Null) | None => Ok(Vec::new()),
        Some(other) => Err(SourceError::malformed(
            SourceKind::Registry,
            format!("search items was {}, expected an array", json_kind(other)),
        )),
    }
}

fn search_item(item: &Value) -> Option<SearchResult> {
    let key = text(item, "company_number")?;
    Some(SearchResult {
        source: SourceKind::Registry,
        key,
        name: text(item, "title").unwrap_or_default(),
        status: text(item, "company_status"),
        entity_type: text(item, "company_type"),
        address_snippet: text(item, "address_snippet"),
    })
}

fn text(item: &Value, field: &str) -> Option<String> {
    item.get(field)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn items_become_candidates() {
        let payload = json!({
            "items": [{
                "company_number": "01026167",
                "title": "BARCLAYS BANK PLC",
                "company_status": "active",
                "company_type": "plc",
                "address_snippet": "1 Churchill Place, London, E14 5HP"
            }, {
                "title": "NO NUMBER LTD"
            }],
            "total_results": 2
        });
        let results = parse_search(&payload).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].key, "01026167");
        assert_eq!(results[0].address_snippet.as_deref(), Some("1 Churchill Place, London, E14 5HP"));
    }

    #[test]
    fn missing_items_is_zero_results() {
        assert!(parse_search(&json!({"total_results": 0})).unwrap().is_empty());
    }

    #[test]
    fn officers_live_under_company() {
        assert_eq!(
            RegistryClient::path_for("01026167", SubResource::Individuals).as_deref(),
            Some("company/01026167/officers")
        );
        assert_eq!(RegistryClient::path_for("01026167", SubResource::Permissions), None);
    }
}
