/// Integration tests with mocked vendor APIs
/// Exercises search, dossier aggregation and screening without hitting real services
use entity_dossier_api::aggregator::aggregate;
use entity_dossier_api::business_data_client::BusinessDataClient;
use entity_dossier_api::config::Config;
use entity_dossier_api::errors::{AppError, SourceError};
use entity_dossier_api::models::*;
use entity_dossier_api::regulator_client::RegulatorClient;
use entity_dossier_api::registry_client::RegistryClient;
use entity_dossier_api::screening_client::ScreeningClient;
use entity_dossier_api::screening_models::*;
use entity_dossier_api::selection::SelectionTracker;
use entity_dossier_api::source_adapter::SourceAdapter;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Helper function to create test config with every vendor pointed at `base_url`
fn create_test_config(base_url: String) -> Config {
    Config {
        port: 8080,
        regulator_base_url: base_url.clone(),
        regulator_auth_email: "test@example.com".to_string(),
        regulator_auth_key: "test_key".to_string(),
        registry_base_url: base_url.clone(),
        registry_api_key: "test_ch_key".to_string(),
        business_data_base_url: base_url.clone(),
        business_data_token: "Bearer test_token".to_string(),
        business_data_api_version: "5.0".to_string(),
        screening_base_url: base_url,
        screening_user: "test_user".to_string(),
        screening_pass: "test_pass".to_string(),
        http_timeout_secs: 5,
        search_page_size: 10,
        screening_batch_limit: 3,
    }
}

fn frn(raw: &str) -> EntityKey {
    EntityKey::parse(SourceKind::Regulator, raw).unwrap()
}

// ============================================================================
// Regulator register
// ============================================================================

#[tokio::test]
async fn test_regulator_search_returns_candidates() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/Search"))
        .and(query_param("q", "Barclays Bank PLC"))
        .and(query_param("type", "firm"))
        .and(header("X-AUTH-EMAIL", "test@example.com"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Status": "FSR-API-04-01-00",
            "Message": "Ok. Search successful",
            "Data": [{
                "Reference Number": "204224",
                "Name": "Barclays Bank Plc",
                "Status": "Authorised",
                "Type of business or Individual": "Firm",
                "URL": "https://register.fca.org.uk/services/V0.1/Firm/204224"
            }]
        })))
        .mount(&mock_server)
        .await;

    let client = RegulatorClient::new(&create_test_config(mock_server.uri())).unwrap();
    let results = client
        .search("Barclays Bank PLC", &SearchFilters::default())
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].key, "204224");
    assert_eq!(results[0].name, "Barclays Bank Plc");
    assert_eq!(results[0].status.as_deref(), Some("Authorised"));
    assert_eq!(results[0].source, SourceKind::Regulator);
}

#[tokio::test]
async fn test_regulator_zero_results_is_not_an_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/Search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Status": "FSR-API-04-01-11",
            "Message": "No search result found",
            "Data": null
        })))
        .mount(&mock_server)
        .await;

    let client = RegulatorClient::new(&create_test_config(mock_server.uri())).unwrap();
    let results = client
        .search("Zzyzx Nonexistent Holdings", &SearchFilters::default())
        .await
        .unwrap();

    assert!(results.is_empty());
}

#[tokio::test]
async fn test_regulator_unavailable_is_retryable_transport_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/Search"))
        .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
        .mount(&mock_server)
        .await;

    let client = RegulatorClient::new(&create_test_config(mock_server.uri())).unwrap();
    let err = client
        .search("Barclays", &SearchFilters::default())
        .await
        .unwrap_err();

    assert!(err.is_transport(), "expected transport error, got {:?}", err);
    assert!(matches!(AppError::from(err), AppError::SourceUnavailable(_)));
}

#[tokio::test]
async fn test_regulator_business_message_is_surfaced_verbatim() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/Search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Status": "FSR-API-01-01-11",
            "Message": "Unauthorised: Please check your API key",
            "Data": null
        })))
        .mount(&mock_server)
        .await;

    let client = RegulatorClient::new(&create_test_config(mock_server.uri())).unwrap();
    let err = client
        .search("Barclays", &SearchFilters::default())
        .await
        .unwrap_err();

    match AppError::from(err) {
        AppError::SourceRejected(msg) => {
            assert_eq!(msg, "Unauthorised: Please check your API key")
        }
        other => panic!("expected rejection, got {:?}", other),
    }
}

#[tokio::test]
async fn test_regulator_dossier_maps_permissions_and_absorbs_missing_sections() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/Firm/204224"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Status": "FSR-API-02-01-00",
            "Message": "Ok. Firm Found",
            "Data": [{
                "Organisation Name": "Barclays Bank Plc",
                "Status": "Authorised",
                "Business Type": "Regulated",
                "Status Effective Date": "01/12/2001"
            }]
        })))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/Firm/204224/Permissions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Status": "FSR-API-02-06-00",
            "Message": "Ok. Firm permissions found",
            "Data": {
                "Dealing in investments": {
                    "Customer Type": ["Retail", "Professional"],
                    "Investment Type": ["Shares", "Bonds"]
                }
            }
        })))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/Firm/204224/Address"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Data": [{
                "Address Line 1": "1 Churchill Place",
                "Town": "London",
                "Postcode": "E14 5HP",
                "Country": "UNITED KINGDOM"
            }]
        })))
        .mount(&mock_server)
        .await;

    // Every other sub-resource is unmounted and answers 404.
    let client = RegulatorClient::new(&create_test_config(mock_server.uri())).unwrap();
    let tracker = SelectionTracker::new();
    let result = aggregate(&client, &frn("204224"), tracker.select())
        .await
        .unwrap();
    let dossier = tracker.accept(result).expect("only selection is current");

    assert_eq!(dossier.name.as_deref(), Some("Barclays Bank Plc"));
    assert!(dossier.in_good_standing);
    assert_eq!(dossier.permissions.len(), 1);
    assert_eq!(dossier.permissions[0].name, "Dealing in investments");
    assert_eq!(
        dossier.permissions[0].details["Investment Type"],
        json!(["Shares", "Bonds"])
    );
    assert_eq!(
        dossier.address.as_ref().and_then(|a| a.postal_code.as_deref()),
        Some("E14 5HP")
    );
    assert_eq!(dossier.client_money, Some(ClientMoneyCapability::CannotHold));

    assert!(dossier.waivers.is_empty());
    assert!(dossier
        .diagnostics
        .iter()
        .any(|d| d.resource == SubResource::Waivers && d.reason == Unavailable::NotFound));
    assert_eq!(dossier.diagnostics.len(), 7);
}

#[tokio::test]
async fn test_stale_selection_is_discarded() {
    let mock_server = MockServer::start().await;

    for (reference, name) in [("204224", "Barclays Bank Plc"), ("122702", "Barclays Capital Securities Limited")] {
        Mock::given(method("GET"))
            .and(path(format!("/Firm/{}", reference)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Data": [{"Organisation Name": name, "Status": "Authorised"}]
            })))
            .mount(&mock_server)
            .await;
    }

    let client = RegulatorClient::new(&create_test_config(mock_server.uri())).unwrap();
    let tracker = SelectionTracker::new();

    let first = tracker.select();
    let second = tracker.select();
    let frn_older = frn("204224");
    let frn_newer = frn("122702");
    let (older, newer) = tokio::join!(
        aggregate(&client, &frn_older, first),
        aggregate(&client, &frn_newer, second)
    );

    assert!(tracker.accept(older.unwrap()).is_none());
    let shown = tracker.accept(newer.unwrap()).expect("latest selection wins");
    assert_eq!(
        shown.name.as_deref(),
        Some("Barclays Capital Securities Limited")
    );
}

// ============================================================================
// Corporate registry
// ============================================================================

#[tokio::test]
async fn test_registry_partial_failure_keeps_other_sections() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/company/01026167"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "company_name": "BARCLAYS BANK PLC",
            "company_number": "01026167",
            "company_status": "active",
            "type": "plc",
            "registered_office_address": {
                "address_line_1": "1 Churchill Place",
                "locality": "London",
                "postal_code": "E14 5HP"
            }
        })))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/company/01026167/officers"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/company/01026167/filing-history"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{"date": "2024-03-01", "type": "AA", "category": "accounts", "description": "accounts-with-accounts-type-full"}]
        })))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/company/01026167/persons-with-significant-control"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{"name": "Barclays PLC", "natures_of_control": ["ownership-of-shares-75-to-100-percent"]}]
        })))
        .mount(&mock_server)
        .await;

    let client = RegistryClient::new(&create_test_config(mock_server.uri())).unwrap();
    // Unpadded input is canonicalised before any call.
    let key = EntityKey::parse(SourceKind::Registry, "1026167").unwrap();
    let tracker = SelectionTracker::new();
    let dossier = aggregate(&client, &key, tracker.select())
        .await
        .unwrap()
        .dossier;

    assert_eq!(dossier.name.as_deref(), Some("BARCLAYS BANK PLC"));
    assert!(dossier.individuals.is_empty());
    assert_eq!(dossier.filing_history.len(), 1);
    assert_eq!(dossier.significant_control[0].name, "Barclays PLC");
    assert_eq!(dossier.diagnostics.len(), 1);
    assert_eq!(dossier.diagnostics[0].resource, SubResource::Individuals);
    assert!(matches!(dossier.diagnostics[0].reason, Unavailable::Failed(_)));
}

#[tokio::test]
async fn test_registry_search_without_items_is_empty() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search/companies"))
        .and(query_param("q", "no such company"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "kind": "search#companies",
            "total_results": 0
        })))
        .mount(&mock_server)
        .await;

    let client = RegistryClient::new(&create_test_config(mock_server.uri())).unwrap();
    let results = client
        .search("no such company", &SearchFilters::default())
        .await
        .unwrap();
    assert!(results.is_empty());
}

// ============================================================================
// Business data
// ============================================================================

#[tokio::test]
async fn test_business_data_search_defaults_country() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/V5.0/organizations"))
        .and(query_param("CountryISOAlpha2Code", "US"))
        .and(query_param("SubjectName", "Gorman Manufacturing"))
        .and(query_param("match", "true"))
        .and(header("Authorization", "Bearer test_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "MatchResponse": {
                "TransactionResult": {"SeverityText": "Information", "ResultText": "Success"},
                "MatchCandidate": [{
                    "Organization": {
                        "DUNSNumber": "804735132",
                        "OrganizationName": {"OrganizationPrimaryName": [{"OrganizationName": "GORMAN MANUFACTURING COMPANY, INC."}]},
                        "OperatingStatusText": "Active",
                        "PrimaryAddress": {"PrimaryTownName": "SAN FRANCISCO", "CountryISOAlpha2Code": "US"}
                    }
                }]
            }
        })))
        .mount(&mock_server)
        .await;

    let client = BusinessDataClient::new(&create_test_config(mock_server.uri())).unwrap();
    let results = client
        .search("Gorman Manufacturing", &SearchFilters::default())
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].key, "804735132");
    assert_eq!(
        results[0].address_snippet.as_deref(),
        Some("SAN FRANCISCO, US")
    );
}

#[tokio::test]
async fn test_business_data_transaction_error_is_business_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/V5.0/organizations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "MatchResponse": {
                "TransactionResult": {"SeverityText": "Error", "ResultText": "Invalid country code"}
            }
        })))
        .mount(&mock_server)
        .await;

    let client = BusinessDataClient::new(&create_test_config(mock_server.uri())).unwrap();
    let err = client
        .search("Gorman", &SearchFilters::default().with_country("GB"))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        SourceError::business(SourceKind::BusinessData, "Invalid country code")
    );
}

#[tokio::test]
async fn test_business_data_dossier_records_failed_sections() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/V5.0/organizations/804735132/products/DCP_STD"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "OrderProductResponse": {"OrderProductResponseDetail": {"Product": {"Organization": {
                "DUNSNumber": "804735132",
                "OrganizationName": {"OrganizationPrimaryName": [{"OrganizationName": "GORMAN MANUFACTURING COMPANY, INC."}]},
                "OperatingStatusText": "Active"
            }}}}
        })))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/V5.0/organizations/804735132/financials"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "FinancialStatementsResponse": {
                "TransactionResult": {"SeverityText": "Error", "ResultText": "Product not available"}
            }
        })))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/V5.0/organizations/804735132/analytics"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "AnalyticsResponse": {
                "RiskScores": [{"ScoreType": "Failure Score", "ScoreValue": 82}]
            }
        })))
        .mount(&mock_server)
        .await;

    let client = BusinessDataClient::new(&create_test_config(mock_server.uri())).unwrap();
    let key = EntityKey::parse(SourceKind::BusinessData, "80-473-5132").unwrap();
    let tracker = SelectionTracker::new();
    let dossier = aggregate(&client, &key, tracker.select())
        .await
        .unwrap()
        .dossier;

    assert_eq!(
        dossier.name.as_deref(),
        Some("GORMAN MANUFACTURING COMPANY, INC.")
    );
    assert_eq!(dossier.risk_scores.len(), 1);
    assert!(dossier.financial_statements.is_empty());
    assert_eq!(dossier.diagnostics.len(), 1);
    assert_eq!(
        dossier.diagnostics[0].reason,
        Unavailable::Failed("business-data rejected the request: Product not available".to_string())
    );
}

// ============================================================================
// Screening
// ============================================================================

#[tokio::test]
async fn test_entity_screening_without_matches_is_low_risk() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/RunEntitySearch"))
        .and(body_partial_json(json!({
            "EntityName": "Acme Corporation",
            "Country": "US",
            "ReferenceId": "ENT-67890"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ScreeningResponse": {
                "ScreeningId": "SCR-001",
                "Status": "COMPLETED",
                "Matches": []
            }
        })))
        .mount(&mock_server)
        .await;

    let client = ScreeningClient::new(&create_test_config(mock_server.uri())).unwrap();
    let result = client
        .screen_entity(&EntityScreenRequest {
            reference_id: "ENT-67890".to_string(),
            entity_name: "Acme Corporation".to_string(),
            country: Some("us".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(result.screening_id, "SCR-001");
    assert_eq!(result.status, ScreeningStatus::Completed);
    assert!(result.matches.is_empty());
    assert_eq!(result.match_count, 0);
    assert_eq!(result.highest_risk_level, RiskLevel::Low);
    assert_eq!(result.reference_id, "ENT-67890");
}

#[tokio::test]
async fn test_person_screening_normalizes_scores_and_risk() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/RunSearch"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ScreeningId": "SCR-002",
            "ReferenceId": "CUST-12345",
            "Status": "COMPLETED",
            "Matches": [
                {"EntityId": "M1", "Name": "John Smith", "Score": 0.72, "Categories": ["PEP"], "ListName": "Global PEP", "ListType": "PEP"},
                {"EntityId": "M2", "Name": "John Smith", "Score": 950, "Categories": ["SANCTIONS"], "ListName": "OFAC SDN", "ListType": "SANCTIONS"}
            ]
        })))
        .mount(&mock_server)
        .await;

    let client = ScreeningClient::new(&create_test_config(mock_server.uri())).unwrap();
    let result = client
        .screen_person(&PersonScreenRequest {
            reference_id: "CUST-12345".to_string(),
            full_name: "John Smith".to_string(),
            dob: Some("1970-01-01".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(result.match_count, 2);
    assert_eq!(result.matches[0].score, 72);
    assert_eq!(result.matches[0].risk_level, RiskLevel::Medium);
    assert_eq!(result.matches[1].score, 95);
    assert_eq!(result.matches[1].risk_level, RiskLevel::High);
    assert_eq!(result.highest_risk_level, RiskLevel::High);
}

#[tokio::test]
async fn test_person_screening_rejects_bad_input_before_calling() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&mock_server)
        .await;

    let client = ScreeningClient::new(&create_test_config(mock_server.uri())).unwrap();
    let err = client
        .screen_person(&PersonScreenRequest {
            reference_id: "CUST-1".to_string(),
            full_name: "   ".to_string(),
            ..Default::default()
        })
        .await
        .unwrap_err();

    assert!(matches!(err, SourceError::InvalidQuery(_)));
}

#[tokio::test]
async fn test_batch_screening_pairs_results_with_subjects() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/BatchScreen"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "BatchId": "BATCH-42",
            "TotalScreened": 2,
            "Results": [
                {"ReferenceId": "ENT-1", "Status": "COMPLETED", "Matches": [
                    {"Name": "Acme Trading LLC", "Score": 91, "Categories": ["SANCTIONS"]}
                ]},
                {"ReferenceId": "P-1", "Status": "COMPLETED", "Matches": []}
            ]
        })))
        .mount(&mock_server)
        .await;

    let client = ScreeningClient::new(&create_test_config(mock_server.uri())).unwrap();
    let request = BatchScreenRequest {
        persons: vec![PersonScreenRequest {
            reference_id: "P-1".to_string(),
            full_name: "Jane Doe".to_string(),
            ..Default::default()
        }],
        entities: vec![
            EntityScreenRequest {
                reference_id: "ENT-1".to_string(),
                entity_name: "Acme Trading".to_string(),
                ..Default::default()
            },
            EntityScreenRequest {
                reference_id: "ENT-2".to_string(),
                entity_name: "Beta Holdings".to_string(),
                ..Default::default()
            },
        ],
    };

    let batch = client.batch_screen(&request).await.unwrap();

    assert_eq!(batch.batch_id, "BATCH-42");
    assert_eq!(batch.total_screened, 3);
    assert_eq!(batch.results[0].reference_id, "P-1");
    assert_eq!(batch.results[0].highest_risk_level, RiskLevel::Low);
    assert_eq!(batch.results[1].reference_id, "ENT-1");
    assert_eq!(batch.results[1].highest_risk_level, RiskLevel::High);
    assert_eq!(batch.results[2].status, ScreeningStatus::Failed);
    assert_eq!(batch.risk_summary.get(&RiskLevel::Low), Some(&2));
    assert_eq!(batch.risk_summary.get(&RiskLevel::High), Some(&1));
}

#[tokio::test]
async fn test_batch_over_limit_is_rejected() {
    let mock_server = MockServer::start().await;
    let client = ScreeningClient::new(&create_test_config(mock_server.uri())).unwrap();

    let entities = (0..4)
        .map(|i| EntityScreenRequest {
            reference_id: format!("ENT-{}", i),
            entity_name: format!("Company {}", i),
            ..Default::default()
        })
        .collect();
    let err = client
        .batch_screen(&BatchScreenRequest {
            persons: vec![],
            entities,
        })
        .await
        .unwrap_err();

    assert!(matches!(err, SourceError::InvalidQuery(_)));
}

#[tokio::test]
async fn test_screening_lists_are_listed() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/GetAvailableLists"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Lists": [
                {"ListName": "OFAC SDN", "ListType": "SANCTIONS", "Country": "US"},
                {"ListName": "Global PEP"}
            ]
        })))
        .mount(&mock_server)
        .await;

    let client = ScreeningClient::new(&create_test_config(mock_server.uri())).unwrap();
    let lists = client.screening_lists().await.unwrap();

    assert_eq!(lists.len(), 2);
    assert_eq!(lists[0].list_type, "SANCTIONS");
    assert_eq!(lists[1].list_type, "OTHER");
}

#[tokio::test]
async fn test_screening_result_lookup_rebuilds_subject() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/Screenings/SCR-777"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ScreeningResponse": {
                "ReferenceId": "CUST-9",
                "Status": "COMPLETED",
                "Subject": {"FullName": "Jane Doe"},
                "Matches": []
            }
        })))
        .mount(&mock_server)
        .await;

    let client = ScreeningClient::new(&create_test_config(mock_server.uri())).unwrap();
    let result = client.screening_result("SCR-777").await.unwrap();

    assert_eq!(result.reference_id, "CUST-9");
    assert_eq!(result.subject.display_name(), "Jane Doe");
    assert_eq!(result.highest_risk_level, RiskLevel::Low);
}

#[tokio::test]
async fn test_unknown_screening_is_not_found() {
    let mock_server = MockServer::start().await;
    let client = ScreeningClient::new(&create_test_config(mock_server.uri())).unwrap();

    let err = client.screening_result("SCR-missing").await.unwrap_err();
    assert!(matches!(err, SourceError::NotFound { .. }));
    assert!(matches!(AppError::from(err), AppError::NotFound(_)));
}

#[tokio::test]
async fn test_screening_source_has_no_dossier() {
    let mock_server = MockServer::start().await;
    let client = ScreeningClient::new(&create_test_config(mock_server.uri())).unwrap();
    let key = EntityKey::parse(SourceKind::Screening, "SCR-1").unwrap();
    let tracker = SelectionTracker::new();

    let err = aggregate(&client, &key, tracker.select()).await.unwrap_err();
    assert!(matches!(err, SourceError::InvalidQuery(_)));
}

#[tokio::test]
async fn test_screening_candidates_have_distinct_keys() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/RunEntitySearch"))
        .and(body_partial_json(json!({"EntityName": "Acme Trading"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ScreeningId": "SCR-900",
            "Status": "COMPLETED",
            "Matches": [
                {"EntityId": "M1", "Name": "Acme Trading Ltd", "Score": 88, "Categories": ["SANCTIONS"], "ListName": "OFAC SDN", "ListType": "SANCTIONS"},
                {"EntityId": "M2", "Name": "Acme Trading LLC", "Score": 61, "Categories": [], "ListName": "Watch", "ListType": "OTHER"}
            ]
        })))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/Screenings/SCR-900"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ScreeningId": "SCR-900",
            "ReferenceId": "ENT-900",
            "Status": "COMPLETED",
            "Subject": {"EntityName": "Acme Trading"},
            "Matches": []
        })))
        .mount(&mock_server)
        .await;

    let client = ScreeningClient::new(&create_test_config(mock_server.uri())).unwrap();
    let candidates = client
        .search("Acme Trading", &SearchFilters::default())
        .await
        .unwrap();

    assert_eq!(candidates.len(), 2);
    assert_eq!(candidates[0].key, "SCR-900:M1");
    assert_eq!(candidates[1].key, "SCR-900:M2");
    assert_ne!(candidates[0].key, candidates[1].key);

    // Either candidate key still resolves to the stored screening.
    let result = client.screening_result(&candidates[1].key).await.unwrap();
    assert_eq!(result.screening_id, "SCR-900");
    assert_eq!(result.reference_id, "ENT-900");
}
