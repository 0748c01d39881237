//! Maps each source's sub-resource payloads onto one [`EntityDossier`].
//!
//! Shape detection is explicit: every section accepts the variants its vendor is
//! known to send and reports anything else as a diagnostic instead of failing
//! the dossier. Normalization is a pure function of its input, so running it
//! twice on the same payloads yields the same dossier.

use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::LazyLock;

use crate::models::*;

/// Fields tried, in order, when looking for an entity's display name.
pub const NAME_PRECEDENCE: &[&str] = &[
    "Organisation Name",
    "organisation_name",
    "company_name",
    "Name",
    "name",
    "title",
    "Title",
];

/// Statuses that mean the entity is currently authorised or trading.
const GOOD_STANDING: &[&str] = &["authorised", "active", "open"];

const UNNAMED_PERMISSION: &str = "Unnamed permission";

/// Outcome of reading one section; the error describes the unexpected shape.
pub type Shape<T> = Result<T, String>;

static NULL: Value = Value::Null;

/// Register messages such as "Firm not found" or "No waivers found".
static NOT_FOUND_MESSAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bnot\s+found\b|\bno\b.*\bfound\b").expect("not-found message pattern"));

/// Builds the dossier for `key` from whatever sub-resources were fetched.
pub fn normalize(key: &EntityKey, sections: &BTreeMap<SubResource, SubResourceResponse>) -> EntityDossier {
    let mut dossier = EntityDossier::empty(key);
    let mut permissions_read = false;

    for (resource, response) in sections {
        let payload = match response {
            SubResourceResponse::Available(payload) => payload,
            SubResourceResponse::Unavailable(reason) => {
                tracing::debug!("{} {} unavailable: {:?}", key, resource, reason);
                dossier.record_diagnostic(*resource, reason.clone());
                continue;
            }
        };

        if key.source == SourceKind::Regulator {
            if let Some(reason) = empty_register_envelope(payload) {
                tracing::debug!("{} {} has no Data: {:?}", key, resource, reason);
                dossier.record_diagnostic(*resource, reason);
                continue;
            }
        }

        let outcome = match key.source {
            SourceKind::Regulator => regulator_section(&mut dossier, *resource, payload),
            SourceKind::Registry => registry_section(&mut dossier, *resource, payload),
            SourceKind::BusinessData => business_data_section(&mut dossier, *resource, payload),
            SourceKind::Screening => Err("screening records are not normalized into dossiers".to_string()),
        };

        match outcome {
            Ok(()) => permissions_read |= *resource == SubResource::Permissions,
            Err(problem) => {
                tracing::warn!("⚠️ {} {} has an unexpected shape: {}", key, resource, problem);
                dossier.record_diagnostic(*resource, Unavailable::Malformed(problem));
            }
        }
    }

    // Only permissions that were actually read are classified.
    if key.source == SourceKind::Regulator && permissions_read {
        dossier.client_money = Some(client_money_capability(&dossier.permissions));
    }

    if key.source == SourceKind::BusinessData && dossier.financial_statements.is_empty() {
        if let Some(profile) = sections.get(&SubResource::Profile).and_then(|r| r.payload()) {
            dossier.financial_statements = profile_financials(unwrap_organization(profile));
        }
    }

    dossier.in_good_standing = dossier.status.as_deref().is_some_and(is_good_standing);
    dossier
}

// ============================================================================
// Shared rules
// ============================================================================

/// First present, non-empty name field by [`NAME_PRECEDENCE`].
pub fn resolve_name(record: &Value) -> Option<String> {
    NAME_PRECEDENCE.iter().find_map(|field| text(record, field))
}

/// Case-insensitive match against authorised/active/open.
pub fn is_good_standing(status: &str) -> bool {
    let status = status.trim();
    GOOD_STANDING.iter().any(|s| status.eq_ignore_ascii_case(s))
}

/// Can hold client money iff some permission mentions "client money" and none
/// of that permission's text says "cannot hold".
pub fn client_money_capability(permissions: &[Permission]) -> ClientMoneyCapability {
    let can_hold = permissions.iter().any(|permission| {
        let text = serde_json::to_string(permission)
            .unwrap_or_default()
            .to_lowercase();
        text.contains("client money") && !text.contains("cannot hold")
    });

    if can_hold {
        ClientMoneyCapability::CanHold
    } else {
        ClientMoneyCapability::CannotHold
    }
}

/// Turns a permissions payload into an ordered list.
///
/// A mapping becomes one entry per key, in the vendor's order, with the value kept as
/// the details. A sequence keeps its order and each record becomes the details.
pub fn flatten_permissions(data: &Value) -> Shape<Vec<Permission>> {
    match data {
        Value::Null => Ok(Vec::new()),
        Value::Object(map) => Ok(map
            .iter()
            .map(|(name, details)| Permission {
                name: name.clone(),
                details: details.clone(),
            })
            .collect()),
        Value::Array(items) => Ok(items
            .iter()
            .map(|item| Permission {
                name: match item {
                    Value::String(s) if !s.trim().is_empty() => s.trim().to_string(),
                    _ => first_text(item, &["Permission", "Permission Name", "Name"])
                        .unwrap_or_else(|| UNNAMED_PERMISSION.to_string()),
                },
                details: item.clone(),
            })
            .collect()),
        other => Err(format!("permissions were {}", kind(other))),
    }
}

/// Detects which vendor address layout `value` uses and maps it.
///
/// Returns `Ok(None)` for an empty or null address.
pub fn normalize_address(value: &Value) -> Shape<Option<Address>> {
    let map = match value {
        Value::Null => return Ok(None),
        Value::Object(map) if map.is_empty() => return Ok(None),
        Value::Object(map) => map,
        Value::Array(items) => return items.first().map_or(Ok(None), normalize_address),
        other => return Err(format!("address was {}", kind(other))),
    };

    let address = if map.keys().any(|k| k.starts_with("Address Line") || k == "Town" || k == "Postcode") {
        Address {
            lines: ["Address Line 1", "Address Line 2", "Address Line 3", "Address Line 4"]
                .iter()
                .filter_map(|f| text(value, f))
                .collect(),
            locality: text(value, "Town"),
            region: text(value, "County"),
            postal_code: text(value, "Postcode"),
            country: text(value, "Country"),
        }
    } else if map.keys().any(|k| k.starts_with("address_line") || k == "postal_code" || k == "locality" || k == "premises") {
        let first = match (text(value, "premises"), text(value, "address_line_1")) {
            (Some(premises), Some(line)) => Some(format!("{} {}", premises, line)),
            (premises, line) => premises.or(line),
        };
        Address {
            lines: first.into_iter().chain(text(value, "address_line_2")).collect(),
            locality: text(value, "locality"),
            region: text(value, "region"),
            postal_code: text(value, "postal_code"),
            country: text(value, "country"),
        }
    } else if map.contains_key("StreetAddressLine") || map.contains_key("PrimaryTownName") {
        Address {
            lines: value
                .get("StreetAddressLine")
                .and_then(|v| v.as_array())
                .map(|lines| lines.iter().filter_map(|l| text(l, "LineText")).collect())
                .unwrap_or_default(),
            locality: text(value, "PrimaryTownName"),
            region: text(value, "TerritoryAbbreviatedName"),
            postal_code: text(value, "PostalCode"),
            country: text(value, "CountryISOAlpha2Code"),
        }
    } else {
        return Err("unrecognised address layout".to_string());
    };

    Ok((!address.is_empty()).then_some(address))
}

// ============================================================================
// Regulator register
// ============================================================================

const REGULATOR_PROFILE_FIELDS: &[&str] = &["Organisation Name", "Name", "Status", "Business Type", "Status Effective Date"];

fn regulator_section(dossier: &mut EntityDossier, resource: SubResource, payload: &Value) -> Shape<()> {
    let data = envelope_data(payload);
    match resource {
        SubResource::Profile => {
            let Some(profile) = records(data)?.into_iter().next() else {
                return Ok(());
            };
            dossier.name = resolve_name(profile);
            dossier.status = text(profile, "Status");
            dossier.entity_type = text(profile, "Business Type");
            dossier.registration_date = text(profile, "Status Effective Date");
            collect_attributes(&mut dossier.attributes, profile, REGULATOR_PROFILE_FIELDS);
        }
        SubResource::Address => dossier.address = normalize_address(data)?,
        SubResource::Individuals => {
            dossier.individuals = records(data)?
                .into_iter()
                .filter_map(|r| {
                    Some(Person {
                        name: first_text(r, &["Individual Name", "Name", "name"])?,
                        role: first_text(r, &["Role", "Controlled Function"]),
                        status: text(r, "Status"),
                        reference: first_text(r, &["IRN", "Individual Reference Number"]),
                        appointed_on: None,
                    })
                })
                .collect()
        }
        SubResource::Permissions => dossier.permissions = flatten_permissions(data)?,
        SubResource::Requirements => {
            dossier.requirements = records(data)?
                .into_iter()
                .filter_map(|r| {
                    Some(Requirement {
                        summary: first_text(r, &["Requirement", "Requirement Type", "Description"])?,
                        details: r.clone(),
                    })
                })
                .collect()
        }
        SubResource::Regulators => {
            dossier.regulators = records(data)?
                .into_iter()
                .filter_map(|r| {
                    Some(RegulatorRecord {
                        name: first_text(r, &["Regulator Name", "Regulator", "Name"])?,
                        effective_date: text(r, "Effective Date"),
                    })
                })
                .collect()
        }
        SubResource::Passports => dossier.passports = grouped_records(data, "Passports")?,
        SubResource::Waivers => dossier.waivers = grouped_records(data, "Waivers")?,
        SubResource::DisciplinaryHistory => {
            dossier.disciplinary_history = records(data)?
                .into_iter()
                .map(|r| DisciplinaryAction {
                    action_type: first_text(r, &["Type", "Enforcement Type", "TypeofDescription"])
                        .unwrap_or_else(|| "Disciplinary Action".to_string()),
                    description: first_text(r, &["Description", "Details", "TypeofAction"]),
                    date: first_text(r, &["Date", "ActionEffectiveFrom"]),
                })
                .collect()
        }
        SubResource::TradingNames => dossier.trading_names = trading_names(data)?,
        other => return Err(format!("{} is not a regulator sub-resource", other)),
    }
    Ok(())
}

/// Names come either as flat records or grouped under "Current Names" / "Previous Names".
fn trading_names(data: &Value) -> Shape<Vec<TradingName>> {
    let mut names = Vec::new();
    for record in records(data)? {
        let grouped = [("Current Names", "Current"), ("Previous Names", "Previous")];
        if grouped.iter().any(|(field, _)| record.get(field).is_some()) {
            for (field, status) in grouped {
                for entry in records(record.get(field).unwrap_or(&NULL))? {
                    if let Some(name) = first_text(entry, &["Name", "Trading Name"]) {
                        names.push(TradingName {
                            name,
                            status: text(entry, "Status").or_else(|| Some(status.to_string())),
                            effective_from: text(entry, "Effective From"),
                        });
                    }
                }
            }
        } else if let Some(name) = first_text(record, &["Name", "Trading Name"]) {
            names.push(TradingName {
                name,
                status: text(record, "Status"),
                effective_from: text(record, "Effective From"),
            });
        }
    }
    Ok(names)
}

// ============================================================================
// Corporate registry
// ============================================================================

fn registry_section(dossier: &mut EntityDossier, resource: SubResource, payload: &Value) -> Shape<()> {
    match resource {
        SubResource::Profile => {
            if !payload.is_object() {
                return Err(format!("profile was {}", kind(payload)));
            }
            dossier.name = resolve_name(payload);
            dossier.status = text(payload, "company_status");
            dossier.entity_type = text(payload, "type");
            dossier.registration_date = text(payload, "date_of_creation");
            if let Some(address) = payload.get("registered_office_address") {
                dossier.address = normalize_address(address)?;
            }

            if let Some(number) = text(payload, "company_number") {
                dossier.attributes.insert("Company Number".to_string(), number);
            }
            if let Some(jurisdiction) = text(payload, "jurisdiction") {
                dossier.attributes.insert("Jurisdiction".to_string(), jurisdiction);
            }
            let sic_codes: Vec<&str> = payload
                .get("sic_codes")
                .and_then(|v| v.as_array())
                .map(|codes| codes.iter().filter_map(|c| c.as_str()).collect())
                .unwrap_or_default();
            if !sic_codes.is_empty() {
                dossier.attributes.insert("SIC Codes".to_string(), sic_codes.join(", "));
            }
        }
        SubResource::Individuals => {
            dossier.individuals = records(items(payload)?)?
                .into_iter()
                .filter_map(|r| {
                    Some(Person {
                        name: first_text(r, &["name", "Name"])?,
                        role: text(r, "officer_role"),
                        status: text(r, "resigned_on").map(|_| "Resigned".to_string()),
                        reference: None,
                        appointed_on: text(r, "appointed_on"),
                    })
                })
                .collect()
        }
        SubResource::FilingHistory => {
            dossier.filing_history = records(items(payload)?)?
                .into_iter()
                .map(|r| Filing {
                    date: text(r, "date"),
                    filing_type: text(r, "type"),
                    category: text(r, "category"),
                    description: text(r, "description"),
                })
                .collect()
        }
        SubResource::SignificantControl => {
            dossier.significant_control = records(items(payload)?)?
                .into_iter()
                .filter_map(|r| {
                    Some(ControllingPerson {
                        name: first_text(r, &["name", "Name"])?,
                        natures_of_control: r
                            .get("natures_of_control")
                            .and_then(|v| v.as_array())
                            .map(|n| n.iter().filter_map(|s| s.as_str()).map(String::from).collect())
                            .unwrap_or_default(),
                        notified_on: text(r, "notified_on"),
                    })
                })
                .collect()
        }
        other => return Err(format!("{} is not a registry sub-resource", other)),
    }
    Ok(())
}

/// Registry collections are wrapped in `{items: [...]}`.
fn items(payload: &Value) -> Shape<&Value> {
    match payload {
        Value::Null => Ok(&NULL),
        Value::Array(_) => Ok(payload),
        Value::Object(map) => Ok(map.get("items").unwrap_or(&NULL)),
        other => Err(format!("collection was {}", kind(other))),
    }
}

// ============================================================================
// Business-data provider
// ============================================================================

fn business_data_section(dossier: &mut EntityDossier, resource: SubResource, payload: &Value) -> Shape<()> {
    match resource {
        SubResource::Profile => {
            let org = unwrap_organization(payload);
            if !org.is_object() {
                return Err(format!("organization was {}", kind(org)));
            }
            dossier.name = org
                .pointer("/OrganizationName/OrganizationPrimaryName/0/OrganizationName")
                .and_then(|v| v.as_str())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .or_else(|| resolve_name(org));
            dossier.status = text(org, "OperatingStatusText");
            dossier.registration_date = text(org, "StartDate");
            if let Some(address) = org.get("PrimaryAddress") {
                dossier.address = normalize_address(address)?;
            }

            let attributes = &mut dossier.attributes;
            if let Some(description) = text(org, "BusinessDescription") {
                attributes.insert("Business Description".to_string(), description);
            }
            if let Some(employees) = scalar(org.get("EmployeeQuantity")) {
                attributes.insert("Employee Quantity".to_string(), employees);
            }
            if let Some(revenue) = scalar(org.get("SalesRevenueAmount")) {
                attributes.insert("Sales Revenue".to_string(), revenue);
            }
            if let Some(phone) = org
                .pointer("/Telecommunication/0/TelecommunicationNumber")
                .and_then(|v| v.as_str())
            {
                attributes.insert("Telephone".to_string(), phone.to_string());
            }
        }
        SubResource::FinancialStatements => {
            let body = payload.get("FinancialStatementsResponse").unwrap_or(payload);
            dossier.financial_statements = records(body.get("FinancialStatements").unwrap_or(&NULL))?
                .into_iter()
                .map(|s| FinancialStatement {
                    statement_date: text(s, "StatementDate"),
                    currency: text(s, "Currency"),
                    fiscal_year: s.get("FiscalYear").and_then(|v| v.as_i64()),
                    balance_sheet: s.get("BalanceSheet").filter(|b| b.is_object()).map(|b| BalanceSheet {
                        total_assets: number(b, "TotalAssets"),
                        total_liabilities: number(b, "TotalLiabilities"),
                        net_worth: number(b, "NetWorth"),
                        current_assets: number(b, "CurrentAssets"),
                        current_liabilities: number(b, "CurrentLiabilities"),
                    }),
                    income_statement: s.get("IncomeStatement").filter(|i| i.is_object()).map(|i| IncomeStatement {
                        revenue: number(i, "Revenue"),
                        gross_profit: number(i, "GrossProfit"),
                        operating_income: number(i, "OperatingIncome"),
                        net_income: number(i, "NetIncome"),
                        ebitda: number(i, "EBITDA"),
                    }),
                })
                .collect()
        }
        SubResource::RiskScores => {
            let body = payload.get("AnalyticsResponse").unwrap_or(payload);
            dossier.risk_scores = records(body.get("RiskScores").unwrap_or(&NULL))?
                .into_iter()
                .filter_map(|s| {
                    Some(RiskScore {
                        score_type: text(s, "ScoreType")?,
                        score_value: number(s, "ScoreValue"),
                        score_date: text(s, "ScoreDate"),
                        risk_level: text(s, "RiskLevel"),
                        description: text(s, "ScoreDescription"),
                    })
                })
                .collect();
            dossier.predictive_indicators = records(body.get("PredictiveIndicators").unwrap_or(&NULL))?
                .into_iter()
                .filter_map(|i| {
                    Some(PredictiveIndicator {
                        indicator_type: text(i, "IndicatorType")?,
                        value: scalar(i.get("IndicatorValue")).unwrap_or_default(),
                        description: text(i, "IndicatorDescription"),
                    })
                })
                .collect();
        }
        other => return Err(format!("{} is not a business-data sub-resource", other)),
    }
    Ok(())
}

/// The profile arrives wrapped in the order envelope or as a bare `Organization`.
fn unwrap_organization(payload: &Value) -> &Value {
    payload
        .pointer("/OrderProductResponse/OrderProductResponseDetail/Product/Organization")
        .or_else(|| payload.get("Organization"))
        .unwrap_or(payload)
}

/// Summary figures some profiles embed when the financials product is unavailable.
fn profile_financials(org: &Value) -> Vec<FinancialStatement> {
    records(org.get("FinancialStatement").unwrap_or(&NULL))
        .unwrap_or_default()
        .into_iter()
        .map(|s| FinancialStatement {
            statement_date: text(s, "StatementDate"),
            currency: text(s, "Currency"),
            fiscal_year: None,
            balance_sheet: number(s, "TotalAssets").map(|total_assets| BalanceSheet {
                total_assets: Some(total_assets),
                ..Default::default()
            }),
            income_statement: Some(IncomeStatement {
                revenue: number(s, "Revenue"),
                net_income: number(s, "NetIncome"),
                ..Default::default()
            }),
        })
        .collect()
}

// ============================================================================
// Value helpers
// ============================================================================

/// A register reply carrying `Status`/`Message` but no `Data` has no content.
///
/// "Not found" style messages mean the section is absent; anything else is
/// an envelope we cannot read.
fn empty_register_envelope(payload: &Value) -> Option<Unavailable> {
    let map = payload.as_object()?;
    if map.contains_key("Data") || !(map.contains_key("Status") || map.contains_key("Message")) {
        return None;
    }

    let message = map
        .get("Message")
        .and_then(|m| m.as_str())
        .map(str::trim)
        .unwrap_or_default();
    if NOT_FOUND_MESSAGE.is_match(message) {
        Some(Unavailable::NotFound)
    } else {
        let status = map.get("Status").and_then(|s| s.as_str()).unwrap_or("no status");
        Some(Unavailable::Malformed(format!(
            "register reply without Data ({}): {}",
            status,
            if message.is_empty() { "no message" } else { message }
        )))
    }
}

/// Register payloads wrap their content in `{Status, Message, Data}`.
fn envelope_data(payload: &Value) -> &Value {
    match payload {
        Value::Object(map) if map.contains_key("Data") => &map["Data"],
        _ => payload,
    }
}

/// A sequence of records; a single object counts as one record, null as none.
fn records(data: &Value) -> Shape<Vec<&Value>> {
    match data {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => Ok(items.iter().filter(|i| !i.is_null()).collect()),
        Value::Object(_) => Ok(vec![data]),
        other => Err(format!("expected records, found {}", kind(other))),
    }
}

/// Passports and waivers may be nested under a same-named key.
fn grouped_records(data: &Value, group: &str) -> Shape<Vec<Value>> {
    let inner = match data {
        Value::Object(map) => map.get(group).unwrap_or(data),
        _ => data,
    };
    let mut out = Vec::new();
    for record in records(inner)? {
        match record.get(group) {
            Some(nested) => out.extend(records(nested)?.into_iter().cloned()),
            None => out.push(record.clone()),
        }
    }
    Ok(out)
}

fn collect_attributes(attributes: &mut BTreeMap<String, String>, record: &Value, consumed: &[&str]) {
    let Some(map) = record.as_object() else {
        return;
    };
    for (field, value) in map {
        if consumed.contains(&field.as_str()) {
            continue;
        }
        if let Some(rendered) = scalar(Some(value)) {
            if !rendered.starts_with("http://") && !rendered.starts_with("https://") {
                attributes.insert(field.clone(), rendered);
            }
        }
    }
}

fn text(record: &Value, field: &str) -> Option<String> {
    record
        .get(field)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

fn first_text(record: &Value, fields: &[&str]) -> Option<String> {
    fields.iter().find_map(|f| text(record, f))
}

fn number(record: &Value, field: &str) -> Option<f64> {
    match record.get(field)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Non-empty string, number or boolean rendered as display text.
fn scalar(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn kind(value: &Value) -> &'static str {
    crate::regulator_client::json_kind(value)
}
