use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// Enums
// ============================================================================

/// Risk classification. Ordered so that `max` yields the most severe level:
/// HIGH > MEDIUM > LOW > UNKNOWN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Unknown,
    Low,
    Medium,
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RiskLevel::Unknown => "UNKNOWN",
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ScreeningStatus {
    #[default]
    Completed,
    Pending,
    Failed,
}

impl ScreeningStatus {
    /// Unrecognised vendor statuses are treated as completed, matching what a returned result implies.
    pub fn from_vendor(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_uppercase()).as_deref() {
            Some("PENDING") | Some("IN_PROGRESS") => ScreeningStatus::Pending,
            Some("FAILED") | Some("ERROR") => ScreeningStatus::Failed,
            _ => ScreeningStatus::Completed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchCategory {
    Pep,
    Sanctions,
    AdverseMedia,
    FinancialRegulator,
    LawEnforcement,
    Other,
}

impl MatchCategory {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().replace([' ', '-'], "_").as_str() {
            "PEP" => MatchCategory::Pep,
            "SANCTIONS" | "SANCTION" => MatchCategory::Sanctions,
            "ADVERSE_MEDIA" => MatchCategory::AdverseMedia,
            "FINANCIAL_REGULATOR" => MatchCategory::FinancialRegulator,
            "LAW_ENFORCEMENT" => MatchCategory::LawEnforcement,
            _ => MatchCategory::Other,
        }
    }
}

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostalAddress {
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub postal_code: Option<String>,
}

/// Document or ID number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identifier {
    #[serde(rename = "type")]
    pub id_type: String,
    pub number: String,
    pub country: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonScreenRequest {
    pub reference_id: String,
    pub full_name: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// YYYY-MM-DD.
    pub dob: Option<String>,
    pub nationality: Option<String>,
    pub country: Option<String>,
    pub address: Option<PostalAddress>,
    pub identifiers: Option<Vec<Identifier>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityScreenRequest {
    pub reference_id: String,
    pub entity_name: String,
    pub country: Option<String>,
    pub registration_number: Option<String>,
    pub address: Option<PostalAddress>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BatchScreenRequest {
    #[serde(default)]
    pub persons: Vec<PersonScreenRequest>,
    #[serde(default)]
    pub entities: Vec<EntityScreenRequest>,
}

impl BatchScreenRequest {
    pub fn len(&self) -> usize {
        self.persons.len() + self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Subjects in submission order: persons first, then entities.
    pub fn subjects(&self) -> Vec<ScreeningSubject> {
        self.persons
            .iter()
            .cloned()
            .map(ScreeningSubject::Person)
            .chain(self.entities.iter().cloned().map(ScreeningSubject::Entity))
            .collect()
    }
}

/// The screened subject, echoed back on the result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScreeningSubject {
    Person(PersonScreenRequest),
    Entity(EntityScreenRequest),
}

impl ScreeningSubject {
    pub fn reference_id(&self) -> &str {
        match self {
            ScreeningSubject::Person(p) => &p.reference_id,
            ScreeningSubject::Entity(e) => &e.reference_id,
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            ScreeningSubject::Person(p) => &p.full_name,
            ScreeningSubject::Entity(e) => &e.entity_name,
        }
    }
}

// ============================================================================
// Results
// ============================================================================

/// Which list a match came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchSource {
    pub list_name: String,
    pub list_type: String,
    pub country: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreeningMatch {
    pub match_id: String,
    /// 0-100.
    pub score: u8,
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    pub risk_level: RiskLevel,
    pub source: MatchSource,
    pub dob: Option<String>,
    pub nationality: Option<String>,
    pub description: Option<String>,
    pub last_updated: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreeningResult {
    pub screening_id: String,
    pub reference_id: String,
    pub status: ScreeningStatus,
    pub subject: ScreeningSubject,
    pub matches: Vec<ScreeningMatch>,
    pub match_count: usize,
    pub highest_risk_level: RiskLevel,
    pub created_at: String,
    pub processing_time: Option<f64>,
}

impl ScreeningResult {
    /// Builds a result whose `match_count` and `highest_risk_level` are derived
    /// from `matches`, so they cannot disagree with it.
    pub fn from_matches(
        screening_id: String,
        reference_id: String,
        status: ScreeningStatus,
        subject: ScreeningSubject,
        matches: Vec<ScreeningMatch>,
        created_at: String,
        processing_time: Option<f64>,
    ) -> Self {
        let highest_risk_level = highest_risk(matches.iter().map(|m| m.risk_level));
        Self {
            screening_id,
            reference_id,
            status,
            subject,
            match_count: matches.len(),
            matches,
            highest_risk_level,
            created_at,
            processing_time,
        }
    }
}

/// Most severe level in `levels`; `LOW` when there are none.
pub fn highest_risk(levels: impl IntoIterator<Item = RiskLevel>) -> RiskLevel {
    levels.into_iter().max().unwrap_or(RiskLevel::Low)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchScreeningResult {
    pub batch_id: String,
    pub total_screened: usize,
    pub results: Vec<ScreeningResult>,
    /// Result count per highest risk level.
    pub risk_summary: BTreeMap<RiskLevel, usize>,
    pub created_at: String,
}

impl BatchScreeningResult {
    pub fn new(batch_id: String, results: Vec<ScreeningResult>, created_at: String) -> Self {
        let mut risk_summary = BTreeMap::new();
        for result in &results {
            *risk_summary.entry(result.highest_risk_level).or_insert(0) += 1;
        }
        Self {
            batch_id,
            total_screened: results.len(),
            results,
            risk_summary,
            created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreeningListInfo {
    pub list_name: String,
    pub list_type: String,
    pub description: Option<String>,
    pub country: Option<String>,
    pub last_updated: Option<String>,
}

// ============================================================================
// Vendor payloads
// ============================================================================

/// Screening response as the vendor sends it, before normalization.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VendorScreeningResponse {
    pub screening_id: Option<String>,
    pub reference_id: Option<String>,
    pub status: Option<String>,
    #[serde(default)]
    pub matches: Vec<VendorMatch>,
    pub processing_time: Option<f64>,
}

/// A match as the vendor sends it. `Score` arrives on different scales and types.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VendorMatch {
    pub entity_id: Option<String>,
    pub score: Option<Value>,
    pub name: Option<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    pub list_name: Option<String>,
    pub list_type: Option<String>,
    pub country: Option<String>,
    #[serde(rename = "DOB")]
    pub dob: Option<String>,
    pub nationality: Option<String>,
    pub description: Option<String>,
    pub last_updated: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VendorBatchResponse {
    pub batch_id: Option<String>,
    pub total_screened: Option<usize>,
    #[serde(default)]
    pub results: Vec<Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VendorListInfo {
    pub list_name: String,
    pub list_type: Option<String>,
    pub description: Option<String>,
    pub country: Option<String>,
    pub last_updated: Option<String>,
}

impl From<VendorListInfo> for ScreeningListInfo {
    fn from(list: VendorListInfo) -> Self {
        Self {
            list_name: list.list_name,
            list_type: list.list_type.unwrap_or_else(|| "OTHER".to_string()),
            description: list.description,
            country: list.country,
            last_updated: list.last_updated,
        }
    }
}
