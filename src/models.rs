use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use crate::errors::SourceError;

static COUNTRY_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z]{2}$").expect("country code pattern"));

// ============================================================================
// Sources and keys
// ============================================================================

/// The upstream a piece of data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    /// Financial-services regulator register (FCA).
    Regulator,
    /// Corporate registry (Companies House).
    Registry,
    /// Business-data provider (D&B).
    BusinessData,
    /// Watchlist and sanctions screening (Bridger).
    Screening,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Regulator => "regulator",
            SourceKind::Registry => "registry",
            SourceKind::BusinessData => "business-data",
            SourceKind::Screening => "screening",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = SourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "regulator" | "fca" => Ok(SourceKind::Regulator),
            "registry" | "companies-house" | "ch" => Ok(SourceKind::Registry),
            "business-data" | "dnb" => Ok(SourceKind::BusinessData),
            "screening" | "lexisnexis" | "bridger" => Ok(SourceKind::Screening),
            other => Err(SourceError::InvalidQuery(format!(
                "unknown source '{}'",
                other
            ))),
        }
    }
}

/// Identifier of an entity within one source. Opaque outside that source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityKey {
    pub source: SourceKind,
    pub value: String,
}

impl EntityKey {
    /// Validates and canonicalises a raw identifier for `source`.
    pub fn parse(source: SourceKind, raw: &str) -> Result<Self, SourceError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(SourceError::InvalidQuery(format!(
                "{} identifier cannot be empty",
                source
            )));
        }

        let value = match source {
            SourceKind::Regulator => {
                if trimmed.len() > 10 || !trimmed.chars().all(|c| c.is_ascii_digit()) {
                    return Err(SourceError::InvalidQuery(format!(
                        "'{}' is not a valid firm reference number",
                        trimmed
                    )));
                }
                trimmed.to_string()
            }
            SourceKind::Registry => normalize_company_number(trimmed)?,
            SourceKind::BusinessData => format_duns(trimmed)?,
            SourceKind::Screening => trimmed.to_string(),
        };

        Ok(Self { source, value })
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source, self.value)
    }
}

/// Company numbers are 8 characters: all digits, or a two-letter prefix and 6 digits.
pub fn normalize_company_number(raw: &str) -> Result<String, SourceError> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase();

    let invalid = || SourceError::InvalidQuery(format!("'{}' is not a valid company number", raw));

    if cleaned.is_empty() || cleaned.len() > 8 || !cleaned.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(invalid());
    }

    if cleaned.chars().all(|c| c.is_ascii_digit()) {
        return Ok(format!("{:0>8}", cleaned));
    }

    let (prefix, digits) = cleaned.split_at(2.min(cleaned.len()));
    if prefix.chars().all(|c| c.is_ascii_alphabetic())
        && !digits.is_empty()
        && digits.chars().all(|c| c.is_ascii_digit())
    {
        return Ok(format!("{}{:0>6}", prefix, digits));
    }

    Err(invalid())
}

/// D-U-N-S numbers may be written with hyphens; the canonical form is 9 bare digits.
pub fn format_duns(raw: &str) -> Result<String, SourceError> {
    let digits: String = raw.trim().chars().filter(|c| *c != '-').collect();
    if digits.len() != 9 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(SourceError::InvalidQuery(format!(
            "'{}' is not a valid D-U-N-S number (expected 9 digits)",
            raw
        )));
    }
    Ok(digits)
}

// ============================================================================
// Search
// ============================================================================

/// One candidate returned by a source search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub source: SourceKind,
    pub key: String,
    pub name: String,
    pub status: Option<String>,
    pub entity_type: Option<String>,
    pub address_snippet: Option<String>,
}

/// Raw search filters as they arrive over HTTP or the CLI.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchParams {
    pub q: String,
    pub country: Option<String>,
    pub territory: Option<String>,
    pub match_type: Option<String>,
    pub search_type: Option<String>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MatchType {
    Basic,
    #[default]
    Advanced,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::Basic => "Basic",
            MatchType::Advanced => "Advanced",
        }
    }
}

impl FromStr for MatchType {
    type Err = SourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "basic" => Ok(MatchType::Basic),
            "advanced" => Ok(MatchType::Advanced),
            other => Err(SourceError::InvalidQuery(format!(
                "match type must be Basic or Advanced, got '{}'",
                other
            ))),
        }
    }
}

/// Which kind of register entry a regulator search looks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegisterSearchType {
    #[default]
    Firm,
    Individual,
    Fund,
}

impl RegisterSearchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegisterSearchType::Firm => "firm",
            RegisterSearchType::Individual => "individual",
            RegisterSearchType::Fund => "fund",
        }
    }
}

impl FromStr for RegisterSearchType {
    type Err = SourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "firm" => Ok(RegisterSearchType::Firm),
            "individual" => Ok(RegisterSearchType::Individual),
            "fund" => Ok(RegisterSearchType::Fund),
            other => Err(SourceError::InvalidQuery(format!(
                "search type must be firm, individual or fund, got '{}'",
                other
            ))),
        }
    }
}

/// Validated search filters. Each adapter reads the ones it understands.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SearchFilters {
    pub country: Option<String>,
    pub territory: Option<String>,
    pub match_type: MatchType,
    pub search_type: RegisterSearchType,
    pub per_page: Option<u32>,
}

impl SearchFilters {
    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }

    pub fn with_per_page(mut self, per_page: u32) -> Self {
        self.per_page = Some(per_page);
        self
    }
}

impl TryFrom<&SearchParams> for SearchFilters {
    type Error = SourceError;

    fn try_from(params: &SearchParams) -> Result<Self, Self::Error> {
        let country = match non_blank(params.country.as_deref()) {
            Some(code) if COUNTRY_CODE.is_match(code) => Some(code.to_ascii_uppercase()),
            Some(code) => {
                return Err(SourceError::InvalidQuery(format!(
                    "country must be an ISO alpha-2 code, got '{}'",
                    code
                )))
            }
            None => None,
        };

        let per_page = match params.per_page {
            Some(n) if !(1..=100).contains(&n) => {
                return Err(SourceError::InvalidQuery(
                    "per_page must be between 1 and 100".to_string(),
                ))
            }
            other => other,
        };

        Ok(Self {
            country,
            territory: non_blank(params.territory.as_deref()).map(String::from),
            match_type: non_blank(params.match_type.as_deref())
                .map(str::parse)
                .transpose()?
                .unwrap_or_default(),
            search_type: non_blank(params.search_type.as_deref())
                .map(str::parse)
                .transpose()?
                .unwrap_or_default(),
            per_page,
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

// ============================================================================
// Sub-resources
// ============================================================================

/// A named part of an entity's record fetched with its own call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SubResource {
    Profile,
    Address,
    Individuals,
    Permissions,
    Requirements,
    Regulators,
    Passports,
    DisciplinaryHistory,
    Waivers,
    TradingNames,
    FilingHistory,
    SignificantControl,
    FinancialStatements,
    RiskScores,
    ScreeningRecord,
}

impl SubResource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubResource::Profile => "profile",
            SubResource::Address => "address",
            SubResource::Individuals => "individuals",
            SubResource::Permissions => "permissions",
            SubResource::Requirements => "requirements",
            SubResource::Regulators => "regulators",
            SubResource::Passports => "passports",
            SubResource::DisciplinaryHistory => "disciplinary-history",
            SubResource::Waivers => "waivers",
            SubResource::TradingNames => "trading-names",
            SubResource::FilingHistory => "filing-history",
            SubResource::SignificantControl => "significant-control",
            SubResource::FinancialStatements => "financial-statements",
            SubResource::RiskScores => "risk-scores",
            SubResource::ScreeningRecord => "screening-record",
        }
    }
}

impl fmt::Display for SubResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a sub-resource has no payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum Unavailable {
    NotFound,
    Failed(String),
    /// Fetched, but in a shape the normalizer does not recognise.
    Malformed(String),
}

/// Outcome of one sub-resource fetch, kept apart from its siblings.
#[derive(Debug, Clone, PartialEq)]
pub enum SubResourceResponse {
    Available(Value),
    Unavailable(Unavailable),
}

impl SubResourceResponse {
    pub fn from_result(result: Result<Value, SourceError>) -> Self {
        match result {
            Ok(payload) => SubResourceResponse::Available(payload),
            Err(SourceError::NotFound { .. }) => {
                SubResourceResponse::Unavailable(Unavailable::NotFound)
            }
            Err(e @ SourceError::MalformedPayload { .. }) => {
                SubResourceResponse::Unavailable(Unavailable::Malformed(e.to_string()))
            }
            Err(e) => SubResourceResponse::Unavailable(Unavailable::Failed(e.to_string())),
        }
    }

    pub fn payload(&self) -> Option<&Value> {
        match self {
            SubResourceResponse::Available(v) => Some(v),
            SubResourceResponse::Unavailable(_) => None,
        }
    }
}

// ============================================================================
// Dossier
// ============================================================================

/// Postal address in one shape regardless of vendor.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Address {
    pub lines: Vec<String>,
    pub locality: Option<String>,
    pub region: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
}

impl Address {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
            && self.locality.is_none()
            && self.region.is_none()
            && self.postal_code.is_none()
            && self.country.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Permission {
    pub name: String,
    pub details: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientMoneyCapability {
    CanHold,
    CannotHold,
}

/// Officer, approved person or other named individual attached to an entity.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Person {
    pub name: String,
    pub role: Option<String>,
    pub status: Option<String>,
    pub reference: Option<String>,
    pub appointed_on: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    pub summary: String,
    pub details: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegulatorRecord {
    pub name: String,
    pub effective_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisciplinaryAction {
    pub action_type: String,
    pub description: Option<String>,
    pub date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradingName {
    pub name: String,
    pub status: Option<String>,
    pub effective_from: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filing {
    pub date: Option<String>,
    pub filing_type: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
}

/// Person with significant control over a company.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllingPerson {
    pub name: String,
    pub natures_of_control: Vec<String>,
    pub notified_on: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BalanceSheet {
    pub total_assets: Option<f64>,
    pub total_liabilities: Option<f64>,
    pub net_worth: Option<f64>,
    pub current_assets: Option<f64>,
    pub current_liabilities: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IncomeStatement {
    pub revenue: Option<f64>,
    pub gross_profit: Option<f64>,
    pub operating_income: Option<f64>,
    pub net_income: Option<f64>,
    pub ebitda: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialStatement {
    pub statement_date: Option<String>,
    pub currency: Option<String>,
    pub fiscal_year: Option<i64>,
    pub balance_sheet: Option<BalanceSheet>,
    pub income_statement: Option<IncomeStatement>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskScore {
    pub score_type: String,
    pub score_value: Option<f64>,
    pub score_date: Option<String>,
    /// Vendor wording, e.g. "Low-Medium".
    pub risk_level: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictiveIndicator {
    pub indicator_type: String,
    pub value: String,
    pub description: Option<String>,
}

/// A section that could not be filled, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionDiagnostic {
    pub resource: SubResource,
    pub reason: Unavailable,
}

/// Normalized view of one entity from one source.
///
/// Every collection is present and defaults to empty; a missing section never
/// shows up as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDossier {
    pub source: SourceKind,
    pub entity_key: String,
    pub name: Option<String>,
    pub status: Option<String>,
    pub in_good_standing: bool,
    pub entity_type: Option<String>,
    pub registration_date: Option<String>,
    /// Source-specific display facts, e.g. "Client Money Permission" or "SIC Codes".
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    pub address: Option<Address>,
    pub client_money: Option<ClientMoneyCapability>,
    #[serde(default)]
    pub permissions: Vec<Permission>,
    #[serde(default)]
    pub individuals: Vec<Person>,
    #[serde(default)]
    pub requirements: Vec<Requirement>,
    #[serde(default)]
    pub regulators: Vec<RegulatorRecord>,
    #[serde(default)]
    pub passports: Vec<Value>,
    #[serde(default)]
    pub disciplinary_history: Vec<DisciplinaryAction>,
    #[serde(default)]
    pub waivers: Vec<Value>,
    #[serde(default)]
    pub trading_names: Vec<TradingName>,
    #[serde(default)]
    pub filing_history: Vec<Filing>,
    #[serde(default)]
    pub significant_control: Vec<ControllingPerson>,
    #[serde(default)]
    pub financial_statements: Vec<FinancialStatement>,
    #[serde(default)]
    pub risk_scores: Vec<RiskScore>,
    #[serde(default)]
    pub predictive_indicators: Vec<PredictiveIndicator>,
    #[serde(default)]
    pub diagnostics: Vec<SectionDiagnostic>,
}

impl EntityDossier {
    /// An empty dossier for `key`; normalizers fill in what they find.
    pub fn empty(key: &EntityKey) -> Self {
        Self {
            source: key.source,
            entity_key: key.value.clone(),
            name: None,
            status: None,
            in_good_standing: false,
            entity_type: None,
            registration_date: None,
            attributes: BTreeMap::new(),
            address: None,
            client_money: None,
            permissions: Vec::new(),
            individuals: Vec::new(),
            requirements: Vec::new(),
            regulators: Vec::new(),
            passports: Vec::new(),
            disciplinary_history: Vec::new(),
            waivers: Vec::new(),
            trading_names: Vec::new(),
            filing_history: Vec::new(),
            significant_control: Vec::new(),
            financial_statements: Vec::new(),
            risk_scores: Vec::new(),
            predictive_indicators: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    pub fn record_diagnostic(&mut self, resource: SubResource, reason: Unavailable) {
        self.diagnostics.push(SectionDiagnostic { resource, reason });
    }
}
