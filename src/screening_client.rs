use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::time::Duration;

use crate::config::Config;
use crate::errors::SourceError;
use crate::http_client::{SourceAuth, SourceHttpClient};
use crate::models::{EntityKey, SearchFilters, SearchResult, SourceKind, SubResource, SubResourceResponse};
use crate::screening::{
    generate_screening_id, normalize_batch, normalize_screening, parse_vendor_response, sanitize_entity,
    sanitize_person,
};
use crate::screening_models::*;
use crate::source_adapter::{ensure_source, unsupported, validate_query, SourceAdapter};

/// Client for the Bridger XG screening service.
#[derive(Clone)]
pub struct ScreeningClient {
    http: SourceHttpClient,
    batch_limit: usize,
}

impl ScreeningClient {
    pub fn new(config: &Config) -> Result<Self, SourceError> {
        let http = SourceHttpClient::new(
            SourceKind::Screening,
            config.screening_base_url.clone(),
            SourceAuth::Basic {
                username: config.screening_user.clone(),
                password: Some(config.screening_pass.clone()),
            },
            Duration::from_secs(config.http_timeout_secs),
        )?;

        Ok(Self {
            http,
            batch_limit: config.screening_batch_limit,
        })
    }

    /// Screens one person against sanctions, PEP and adverse-media lists.
    pub async fn screen_person(&self, request: &PersonScreenRequest) -> Result<ScreeningResult, SourceError> {
        let subject = sanitize_person(request)?;
        tracing::info!("Screening person: {}", subject.reference_id);

        let payload = self.http.post_json("RunSearch", &person_payload(&subject)).await?;
        let response = parse_vendor_response(&payload)?;
        let result = normalize_screening(response, ScreeningSubject::Person(subject));

        tracing::info!(
            "✓ Screening {} complete: {} matches, highest risk {}",
            result.screening_id,
            result.match_count,
            result.highest_risk_level
        );
        Ok(result)
    }

    /// Screens one business entity.
    pub async fn screen_entity(&self, request: &EntityScreenRequest) -> Result<ScreeningResult, SourceError> {
        let subject = sanitize_entity(request)?;
        tracing::info!("Screening entity: {}", subject.reference_id);

        let payload = self.http.post_json("RunEntitySearch", &entity_payload(&subject)).await?;
        let response = parse_vendor_response(&payload)?;
        let result = normalize_screening(response, ScreeningSubject::Entity(subject));

        tracing::info!(
            "✓ Screening {} complete: {} matches, highest risk {}",
            result.screening_id,
            result.match_count,
            result.highest_risk_level
        );
        Ok(result)
    }

    /// Screens several subjects in one vendor call.
    pub async fn batch_screen(&self, request: &BatchScreenRequest) -> Result<BatchScreeningResult, SourceError> {
        if request.is_empty() {
            return Err(SourceError::InvalidQuery(
                "batch must contain at least one person or entity".to_string(),
            ));
        }
        if request.len() > self.batch_limit {
            return Err(SourceError::InvalidQuery(format!(
                "batch of {} exceeds the limit of {} subjects",
                request.len(),
                self.batch_limit
            )));
        }

        let cleaned = BatchScreenRequest {
            persons: request.persons.iter().map(sanitize_person).collect::<Result<_, _>>()?,
            entities: request.entities.iter().map(sanitize_entity).collect::<Result<_, _>>()?,
        };
        tracing::info!("Batch screening {} subjects", cleaned.len());

        let body = json!({
            "Persons": cleaned.persons.iter().map(person_payload).collect::<Vec<_>>(),
            "Entities": cleaned.entities.iter().map(entity_payload).collect::<Vec<_>>(),
        });
        let payload = self.http.post_json("BatchScreen", &body).await?;
        let result = normalize_batch(&payload, cleaned.subjects())?;

        tracing::info!(
            "✓ Batch {} complete: {} results {:?}",
            result.batch_id,
            result.total_screened,
            result.risk_summary
        );
        Ok(result)
    }

    /// Lists the watchlists the account can screen against.
    pub async fn screening_lists(&self) -> Result<Vec<ScreeningListInfo>, SourceError> {
        let payload = self.http.get_json("GetAvailableLists", &[]).await?;
        let lists = payload
            .get("Lists")
            .or_else(|| payload.get("ScreeningLists"))
            .unwrap_or(&payload);

        let lists: Vec<VendorListInfo> = match lists {
            Value::Null => Vec::new(),
            other => serde_json::from_value(other.clone())
                .map_err(|e| SourceError::malformed(SourceKind::Screening, format!("screening lists: {}", e)))?,
        };
        Ok(lists.into_iter().map(ScreeningListInfo::from).collect())
    }

    /// Raw stored screening, as the vendor returns it.
    async fn fetch_screening(&self, screening_id: &str) -> Result<Value, SourceError> {
        self.http.get_json(&format!("Screenings/{}", screening_id), &[]).await
    }

    /// A previously run screening, normalized. The subject is rebuilt from the stored record.
    pub async fn screening_result(&self, screening_id: &str) -> Result<ScreeningResult, SourceError> {
        let key = EntityKey::parse(SourceKind::Screening, screening_id)?;
        let screening_id = stored_screening_id(&key);
        let payload = self.fetch_screening(screening_id).await?;
        let response = parse_vendor_response(&payload)?;
        let subject = stored_subject(&payload, response.reference_id.as_deref().unwrap_or(screening_id));
        let mut result = normalize_screening(response, subject);
        if result.screening_id.is_empty() {
            result.screening_id = screening_id.to_string();
        }
        Ok(result)
    }
}

#[async_trait]
impl SourceAdapter for ScreeningClient {
    fn source(&self) -> SourceKind {
        SourceKind::Screening
    }

    /// Screening results are not dossiers.
    fn dossier_resources(&self) -> &'static [SubResource] {
        &[]
    }

    /// Screens `query` as an entity name and reports each list hit as a candidate
    /// keyed `<screening id>:<match id>`. The screening id prefix is enough to fetch
    /// the full result afterwards.
    async fn search(&self, query: &str, filters: &SearchFilters) -> Result<Vec<SearchResult>, SourceError> {
        let query = validate_query(query)?;
        let request = EntityScreenRequest {
            reference_id: generate_screening_id(),
            entity_name: query.to_string(),
            country: filters.country.clone(),
            ..Default::default()
        };
        let result = self.screen_entity(&request).await?;

        Ok(result
            .matches
            .iter()
            .map(|m| SearchResult {
                source: SourceKind::Screening,
                key: format!("{}:{}", result.screening_id, m.match_id),
                name: m.name.clone(),
                status: Some(m.risk_level.to_string()),
                entity_type: Some(m.source.list_type.clone()),
                address_snippet: m.source.country.clone(),
            })
            .collect())
    }

    async fn fetch_sub_resource(&self, key: &EntityKey, resource: SubResource) -> SubResourceResponse {
        if let Err(e) = ensure_source(SourceKind::Screening, key) {
            return SubResourceResponse::from_result(Err(e));
        }
        if resource != SubResource::ScreeningRecord {
            return unsupported(SourceKind::Screening, resource);
        }
        SubResourceResponse::from_result(self.fetch_screening(stored_screening_id(key)).await)
    }
}

/// The screening part of a candidate key; plain screening ids pass through.
fn stored_screening_id(key: &EntityKey) -> &str {
    key.as_str().split_once(':').map_or(key.as_str(), |(id, _)| id)
}

fn person_payload(subject: &PersonScreenRequest) -> Value {
    compact(vec![
        ("FullName", Some(subject.full_name.clone())),
        ("FirstName", subject.first_name.clone()),
        ("LastName", subject.last_name.clone()),
        ("DOB", subject.dob.clone()),
        ("Nationality", subject.nationality.clone()),
        ("Country", subject.country.clone()),
        ("ReferenceId", Some(subject.reference_id.clone())),
    ])
}

fn entity_payload(subject: &EntityScreenRequest) -> Value {
    compact(vec![
        ("EntityName", Some(subject.entity_name.clone())),
        ("Country", subject.country.clone()),
        ("RegistrationNumber", subject.registration_number.clone()),
        ("ReferenceId", Some(subject.reference_id.clone())),
    ])
}

/// Vendor request objects omit absent fields instead of sending nulls.
fn compact(fields: Vec<(&str, Option<String>)>) -> Value {
    let map: Map<String, Value> = fields
        .into_iter()
        .filter_map(|(k, v)| v.map(|v| (k.to_string(), Value::String(v))))
        .collect();
    Value::Object(map)
}

fn stored_subject(payload: &Value, reference_id: &str) -> ScreeningSubject {
    let body = payload.get("ScreeningResponse").unwrap_or(payload);
    let field = |name: &str| body.pointer(&format!("/Subject/{}", name)).and_then(|v| v.as_str()).map(String::from);

    match field("FullName") {
        Some(full_name) => ScreeningSubject::Person(PersonScreenRequest {
            reference_id: reference_id.to_string(),
            full_name,
            dob: field("DOB"),
            nationality: field("Nationality"),
            country: field("Country"),
            ..Default::default()
        }),
        None => ScreeningSubject::Entity(EntityScreenRequest {
            reference_id: reference_id.to_string(),
            entity_name: field("EntityName").unwrap_or_default(),
            country: field("Country"),
            registration_number: field("RegistrationNumber"),
            ..Default::default()
        }),
    }
}
