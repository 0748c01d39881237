//! Screening aggregation: input sanitation, match normalization and risk derivation.

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;

use crate::errors::SourceError;
use crate::models::SourceKind;
use crate::screening_models::*;

/// Normalizes a vendor score to 0-100. Vendors use 0.0-1.0, 0-100 or 0-1000.
/// Fractions are truncated, never rounded up.
///
/// Returns `None` when the score is missing or not numeric.
pub fn calculate_match_score(raw: Option<&Value>) -> Option<u8> {
    let score = match raw? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !score.is_finite() {
        return None;
    }

    let normalized = if (0.0..=1.0).contains(&score) {
        score * 100.0
    } else if score > 100.0 {
        score / 10.0
    } else {
        score
    };

    // Truncated, so 89.9 stays below the 90 threshold.
    Some(normalized.clamp(0.0, 100.0).floor() as u8)
}

/// Risk for a single match.
///
/// Sanctions are always HIGH, a PEP hit scoring 90+ is HIGH, any other PEP or
/// adverse-media hit is MEDIUM, and a bare score of 70+ is MEDIUM. A match with
/// neither categories nor a usable score is UNKNOWN.
pub fn determine_risk_level(categories: &[String], score: Option<u8>) -> RiskLevel {
    let parsed: Vec<MatchCategory> = categories.iter().map(|c| MatchCategory::parse(c)).collect();
    let has = |category: MatchCategory| parsed.contains(&category);

    if has(MatchCategory::Sanctions) {
        return RiskLevel::High;
    }
    if has(MatchCategory::Pep) && score.is_some_and(|s| s >= 90) {
        return RiskLevel::High;
    }
    if has(MatchCategory::Pep) || has(MatchCategory::AdverseMedia) {
        return RiskLevel::Medium;
    }

    match score {
        Some(s) if s >= 70 => RiskLevel::Medium,
        None if parsed.is_empty() => RiskLevel::Unknown,
        _ => RiskLevel::Low,
    }
}

/// Trims and strips markup characters; blank input becomes `None`.
pub fn sanitize_input(text: Option<&str>) -> Option<String> {
    let cleaned: String = text?.trim().chars().filter(|c| *c != '<' && *c != '>').collect();
    let cleaned = cleaned.trim().to_string();
    (!cleaned.is_empty()).then_some(cleaned)
}

/// Accepts `YYYY-MM-DD` or an RFC 3339 timestamp and returns `YYYY-MM-DD`.
pub fn format_dob(raw: &str) -> Result<String, SourceError> {
    let trimmed = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(date.format("%Y-%m-%d").to_string());
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(ts.date_naive().format("%Y-%m-%d").to_string());
    }
    Err(SourceError::InvalidQuery(format!(
        "date of birth '{}' must be YYYY-MM-DD",
        raw
    )))
}

fn country_code(field: &str, raw: Option<&str>) -> Result<Option<String>, SourceError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(code) if code.len() == 2 && code.chars().all(|c| c.is_ascii_alphabetic()) => {
            Ok(Some(code.to_ascii_uppercase()))
        }
        Some(code) => Err(SourceError::InvalidQuery(format!(
            "{} must be an ISO alpha-2 code, got '{}'",
            field, code
        ))),
    }
}

fn required(field: &str, value: &str) -> Result<String, SourceError> {
    sanitize_input(Some(value))
        .ok_or_else(|| SourceError::InvalidQuery(format!("{} is required", field)))
}

/// Validates a person request and returns its cleaned form.
pub fn sanitize_person(request: &PersonScreenRequest) -> Result<PersonScreenRequest, SourceError> {
    Ok(PersonScreenRequest {
        reference_id: required("referenceId", &request.reference_id)?,
        full_name: required("fullName", &request.full_name)?,
        first_name: sanitize_input(request.first_name.as_deref()),
        last_name: sanitize_input(request.last_name.as_deref()),
        dob: request
            .dob
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .map(format_dob)
            .transpose()?,
        nationality: country_code("nationality", request.nationality.as_deref())?,
        country: country_code("country", request.country.as_deref())?,
        address: request.address.clone(),
        identifiers: request.identifiers.clone(),
    })
}

pub fn sanitize_entity(request: &EntityScreenRequest) -> Result<EntityScreenRequest, SourceError> {
    Ok(EntityScreenRequest {
        reference_id: required("referenceId", &request.reference_id)?,
        entity_name: required("entityName", &request.entity_name)?,
        country: country_code("country", request.country.as_deref())?,
        registration_number: sanitize_input(request.registration_number.as_deref()),
        address: request.address.clone(),
    })
}

pub fn generate_screening_id() -> String {
    format!("SCR-{}", uuid::Uuid::new_v4())
}

pub fn generate_batch_id() -> String {
    format!("BATCH-{}", uuid::Uuid::new_v4())
}

pub fn iso_timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

pub fn normalize_match(raw: &VendorMatch) -> ScreeningMatch {
    let score = calculate_match_score(raw.score.as_ref());
    let risk_level = determine_risk_level(&raw.categories, score);

    ScreeningMatch {
        match_id: raw
            .entity_id
            .clone()
            .unwrap_or_else(|| format!("MATCH-{}", generate_screening_id())),
        score: score.unwrap_or(0),
        name: raw.name.clone().unwrap_or_default(),
        aliases: raw.aliases.clone(),
        categories: raw.categories.clone(),
        risk_level,
        source: MatchSource {
            list_name: raw.list_name.clone().unwrap_or_else(|| "Unknown".to_string()),
            list_type: raw.list_type.clone().unwrap_or_else(|| "OTHER".to_string()),
            country: raw.country.clone(),
        },
        dob: raw.dob.clone(),
        nationality: raw.nationality.clone(),
        description: raw.description.clone(),
        last_updated: raw.last_updated.clone(),
    }
}

/// Reads a single screening payload, wrapped in `ScreeningResponse` or bare.
pub fn parse_vendor_response(payload: &Value) -> Result<VendorScreeningResponse, SourceError> {
    let body = payload.get("ScreeningResponse").unwrap_or(payload);
    if body.is_null() {
        return Ok(VendorScreeningResponse::default());
    }
    serde_json::from_value(body.clone())
        .map_err(|e| SourceError::malformed(SourceKind::Screening, format!("screening response: {}", e)))
}

/// Turns a vendor response into a result for `subject`.
pub fn normalize_screening(response: VendorScreeningResponse, subject: ScreeningSubject) -> ScreeningResult {
    let matches: Vec<ScreeningMatch> = response.matches.iter().map(normalize_match).collect();
    let reference_id = response
        .reference_id
        .filter(|r| !r.trim().is_empty())
        .unwrap_or_else(|| subject.reference_id().to_string());

    ScreeningResult::from_matches(
        response.screening_id.unwrap_or_else(generate_screening_id),
        reference_id,
        ScreeningStatus::from_vendor(response.status.as_deref()),
        subject,
        matches,
        iso_timestamp(),
        response.processing_time,
    )
}

/// Result for a batch subject the vendor returned nothing for.
pub fn failed_result(subject: ScreeningSubject) -> ScreeningResult {
    ScreeningResult::from_matches(
        generate_screening_id(),
        subject.reference_id().to_string(),
        ScreeningStatus::Failed,
        subject,
        Vec::new(),
        iso_timestamp(),
        None,
    )
}

/// Pairs vendor batch results with the submitted subjects.
///
/// Results are matched by reference id first; any left over are paired by
/// position. Each subject is normalized independently and every subject gets
/// exactly one result, in submission order.
pub fn normalize_batch(payload: &Value, subjects: Vec<ScreeningSubject>) -> Result<BatchScreeningResult, SourceError> {
    let body = payload.get("BatchScreeningResponse").unwrap_or(payload);
    let batch: VendorBatchResponse = serde_json::from_value(body.clone())
        .map_err(|e| SourceError::malformed(SourceKind::Screening, format!("batch response: {}", e)))?;

    let mut pending: Vec<Option<VendorScreeningResponse>> = batch
        .results
        .iter()
        .map(|r| match parse_vendor_response(r) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                tracing::warn!("Skipping unreadable batch entry: {}", e);
                None
            }
        })
        .collect();

    if let Some(reported) = batch.total_screened {
        if reported != subjects.len() {
            tracing::warn!(
                "Batch reported {} screened but {} subjects were submitted",
                reported,
                subjects.len()
            );
        }
    }

    // First pass: exact reference id matches.
    let mut paired: Vec<Option<VendorScreeningResponse>> = subjects
        .iter()
        .map(|subject| {
            let position = pending.iter().position(|entry| {
                entry
                    .as_ref()
                    .and_then(|r| r.reference_id.as_deref())
                    .is_some_and(|id| id == subject.reference_id())
            })?;
            pending[position].take()
        })
        .collect();

    // Second pass: leftovers by position, for vendors that drop reference ids.
    let mut leftovers = pending.into_iter().flatten();
    for slot in paired.iter_mut().filter(|slot| slot.is_none()) {
        match leftovers.next() {
            Some(response) => *slot = Some(response),
            None => break,
        }
    }

    let results = subjects
        .into_iter()
        .zip(paired)
        .map(|(subject, response)| match response {
            Some(response) => normalize_screening(response, subject),
            None => {
                tracing::warn!("No batch result for subject {}", subject.reference_id());
                failed_result(subject)
            }
        })
        .collect();

    Ok(BatchScreeningResult::new(
        batch.batch_id.unwrap_or_else(generate_batch_id),
        results,
        iso_timestamp(),
    ))
}
