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
    SubResource::FinancialStatements,
    SubResource::RiskScores,
];

/// Product ordered for the profile sub-resource.
pub const PROFILE_PRODUCT: &str = "DCP_STD";

/// Client for the D&B Direct organizations API.
#[derive(Clone)]
pub struct BusinessDataClient {
    http: SourceHttpClient,
    api_version: String,
}

impl BusinessDataClient {
    pub fn new(config: &Config) -> Result<Self, SourceError> {
        let http = SourceHttpClient::new(
            SourceKind::BusinessData,
            config.business_data_base_url.clone(),
            SourceAuth::Headers(vec![(
                "Authorization".to_string(),
                config.business_data_token.clone(),
            )]),
            Duration::from_secs(config.http_timeout_secs),
        )?;

        Ok(Self {
            http,
            api_version: config.business_data_api_version.clone(),
        })
    }

    fn path_for(&self, duns: &str, resource: SubResource) -> Option<String> {
        let suffix = match resource {
            SubResource::Profile => format!("products/{}", PROFILE_PRODUCT),
            SubResource::FinancialStatements => "financials".to_string(),
            SubResource::RiskScores => "analytics".to_string(),
            _ => return None,
        };
        Some(format!("V{}/organizations/{}/{}", self.api_version, duns, suffix))
    }
}

#[async_trait]
impl SourceAdapter for BusinessDataClient {
    fn source(&self) -> SourceKind {
        SourceKind::BusinessData
    }

    fn dossier_resources(&self) -> &'static [SubResource] {
        DOSSIER_RESOURCES
    }

    async fn search(&self, query: &str, filters: &SearchFilters) -> Result<Vec<SearchResult>, SourceError> {
        let query = validate_query(query)?;
        let country = filters.country.clone().unwrap_or_else(|| "US".to_string());
        tracing::info!("Searching D&B for: {} ({})", query, country);

        let mut params = vec![
            ("CountryISOAlpha2Code", country),
            ("SubjectName", query.to_string()),
            ("match", "true".to_string()),
            ("MatchTypeText", filters.match_type.as_str().to_string()),
        ];
        if let Some(territory) = &filters.territory {
            params.push(("TerritoryName", territory.clone()));
        }

        let path = format!("V{}/organizations", self.api_version);
        let payload = self.http.get_json(&path, &params).await?;

        let results = parse_search(&payload)?;
        tracing::info!("D&B search returned {} candidates", results.len());
        Ok(results)
    }

    async fn fetch_sub_resource(&self, key: &EntityKey, resource: SubResource) -> SubResourceResponse {
        if let Err(e) = ensure_source(SourceKind::BusinessData, key) {
            return SubResourceResponse::from_result(Err(e));
        }
        let Some(path) = self.path_for(key.as_str(), resource) else {
            return unsupported(SourceKind::BusinessData, resource);
        };

        let result = self
            .http
            .get_json(&path, &[])
            .await
            .and_then(|payload| check_transaction(&payload).map(|_| payload));
        SubResourceResponse::from_result(result)
    }
}

/// D&B reports some failures inside a 200 body via `TransactionResult`.
pub fn check_transaction(payload: &Value) -> Result<(), SourceError> {
    let result = payload
        .get("TransactionResult")
        .or_else(|| {
            payload
                .as_object()
                .and_then(|o| o.values().find_map(|v| v.get("TransactionResult")))
        });

    let Some(result) = result else {
        return Ok(());
    };

    let severity = result
        .get("SeverityText")
        .and_then(|v| v.as_str())
        .unwrap_or_default();
    if severity.eq_ignore_ascii_case("error") || severity.eq_ignore_ascii_case("fatal") {
        let message = result
            .get("ResultText")
            .and_then(|v| v.as_str())
            .unwrap_or("D&B transaction failed");
        return Err(SourceError::business(SourceKind::BusinessData, message));
    }

    Ok(())
}

/// Reads match candidates from a wrapped (`MatchResponse`) or bare response.
pub fn parse_search(payload: &Value) -> Result<Vec<SearchResult>, SourceError> {
    check_transaction(payload)?;

    let body = payload.get("MatchResponse").unwrap_or(payload);
    match body.get("MatchCandidate") {
        Some(Value::Array(candidates)) => Ok(candidates.iter().filter_map(candidate).collect()),
        Some(Value::Null) | None => Ok(Vec::new()),
        Some(other) => Err(SourceError::malformed(
            SourceKind::BusinessData,
            format!("MatchCandidate was {}, expected an array", json_kind(other)),
        )),
    }
}

fn candidate(candidate: &Value) -> Option<SearchResult> {
    let org = candidate.get("Organization")?;
    let key = org
        .get("DUNSNumber")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())?
        .to_string();

    let name = org
        .pointer("/OrganizationName/OrganizationPrimaryName/0/OrganizationName")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    Some(SearchResult {
        source: SourceKind::BusinessData,
        key,
        name,
        status: org
            .get("OperatingStatusText")
            .and_then(|v| v.as_str())
            .map(String::from),
        entity_type: None,
        address_snippet: org.get("PrimaryAddress").and_then(address_snippet),
    })
}

fn address_snippet(address: &Value) -> Option<String> {
    let mut parts: Vec<String> = address
        .get("StreetAddressLine")
        .and_then(|v| v.as_array())
        .map(|lines| {
            lines
                .iter()
                .filter_map(|l| l.get("LineText").and_then(|t| t.as_str()))
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();

    for field in [
        "PrimaryTownName",
        "TerritoryAbbreviatedName",
        "PostalCode",
        "CountryISOAlpha2Code",
    ] {
        if let Some(value) = address.get(field).and_then(|v| v.as_str()) {
            parts.push(value.to_string());
        }
    }

    let parts: Vec<String> = parts
        .into_iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect();
    (!parts.is_empty()).then(|| parts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn gorman() -> Value {
        json!({
            "Organization": {
                "DUNSNumber": "804735132",
                "OrganizationName": {
                    "OrganizationPrimaryName": [{"OrganizationName": "GORMAN MANUFACTURING COMPANY, INC."}]
                },
                "PrimaryAddress": {
                    "StreetAddressLine": [{"LineText": "492 KOLLER ST"}],
                    "PrimaryTownName": "SAN FRANCISCO",
                    "CountryISOAlpha2Code": "US",
                    "PostalCode": "94110",
                    "TerritoryAbbreviatedName": "CA"
                }
            }
        })
    }

    #[test]
    fn wrapped_and_bare_match_responses_parse_alike() {
        let wrapped = json!({"MatchResponse": {
            "TransactionResult": {"ResultID": "CM000", "ResultText": "Success"},
            "MatchCandidate": [gorman()]
        }});
        let bare = json!({"MatchCandidate": [gorman()]});

        let a = parse_search(&wrapped).unwrap();
        assert_eq!(a, parse_search(&bare).unwrap());
        assert_eq!(a[0].key, "804735132");
        assert_eq!(
            a[0].address_snippet.as_deref(),
            Some("492 KOLLER ST, SAN FRANCISCO, CA, 94110, US")
        );
    }

    #[test]
    fn fatal_transaction_is_business_error() {
        let payload = json!({"TransactionResult": {
            "SeverityText": "Fatal",
            "ResultID": "SC001",
            "ResultText": "Your user credentials are invalid."
        }});
        assert_eq!(
            parse_search(&payload),
            Err(SourceError::business(SourceKind::BusinessData, "Your user credentials are invalid."))
        );
    }

    #[test]
    fn nested_transaction_result_is_checked() {
        let payload = json!({"OrderProductResponse": {"TransactionResult": {
            "SeverityText": "Error", "ResultID": "PD005", "ResultText": "Product not available"
        }}});
        assert!(check_transaction(&payload).is_err());
        assert!(check_transaction(&json!({"Organization": {}})).is_ok());
    }
}
