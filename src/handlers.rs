use crate::aggregator::aggregate;
use crate::business_data_client::BusinessDataClient;
use crate::config::Config;
use crate::errors::{AppError, ResultExt};
use crate::models::*;
use crate::regulator_client::RegulatorClient;
use crate::registry_client::RegistryClient;
use crate::screening_client::ScreeningClient;
use crate::screening_models::*;
use crate::selection::SelectionTracker;
use crate::source_adapter::SourceAdapter;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::json;
use std::sync::Arc;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// FCA register adapter.
    pub regulator: Arc<dyn SourceAdapter>,
    /// Companies House adapter.
    pub registry: Arc<dyn SourceAdapter>,
    /// D&B adapter.
    pub business_data: Arc<dyn SourceAdapter>,
    /// Bridger screening client, also usable as an adapter for search.
    pub screening: Arc<ScreeningClient>,
}

impl AppState {
    /// Builds every vendor client from configuration.
    pub fn from_config(config: Config) -> Result<Self, AppError> {
        let regulator = RegulatorClient::new(&config).context("FCA client")?;
        let registry = RegistryClient::new(&config).context("Companies House client")?;
        let business_data = BusinessDataClient::new(&config).context("D&B client")?;
        let screening = ScreeningClient::new(&config).context("Bridger client")?;

        Ok(Self {
            config,
            regulator: Arc::new(regulator),
            registry: Arc::new(registry),
            business_data: Arc::new(business_data),
            screening: Arc::new(screening),
        })
    }

    pub fn adapter(&self, source: SourceKind) -> Arc<dyn SourceAdapter> {
        match source {
            SourceKind::Regulator => self.regulator.clone(),
            SourceKind::Registry => self.registry.clone(),
            SourceKind::BusinessData => self.business_data.clone(),
            SourceKind::Screening => self.screening.clone() as Arc<dyn SourceAdapter>,
        }
    }
}

/// Health check endpoint.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "entity-dossier-api",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// GET /api/v1/sources/:source/search
///
/// Searches one source. Zero hits is a 200 with an empty list.
pub async fn search(
    State(state): State<Arc<AppState>>,
    Path(source): Path<String>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<SearchResult>>, AppError> {
    let source: SourceKind = source.parse()?;
    let filters = SearchFilters::try_from(&params)?;
    tracing::info!("GET /sources/{}/search - q: {}", source, params.q);

    let results = state
        .adapter(source)
        .search(&params.q, &filters)
        .await
        .with_context(|| format!("{} search", source))?;

    Ok(Json(results))
}

/// GET /api/v1/sources/:source/entities/:key
///
/// Fans out to every sub-resource of the entity and returns the normalized dossier.
/// Sections that could not be fetched are empty and listed under `diagnostics`.
pub async fn get_dossier(
    State(state): State<Arc<AppState>>,
    Path((source, key)): Path<(String, String)>,
) -> Result<Json<EntityDossier>, AppError> {
    let source: SourceKind = source.parse()?;
    let key = EntityKey::parse(source, &key)?;
    tracing::info!("GET /sources/{}/entities/{}", source, key.as_str());

    // Every HTTP request is its own viewer, so its selection is always current.
    let tracker = SelectionTracker::new();
    let result = aggregate(state.adapter(source).as_ref(), &key, tracker.select())
        .await
        .with_context(|| format!("{} dossier", key))?;

    Ok(Json(result.dossier))
}

/// POST /api/v1/screening/person
pub async fn screen_person(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PersonScreenRequest>,
) -> Result<Json<ScreeningResult>, AppError> {
    tracing::info!("POST /screening/person - reference: {}", request.reference_id);
    let result = state
        .screening
        .screen_person(&request)
        .await
        .context("person screening")?;
    Ok(Json(result))
}

/// POST /api/v1/screening/entity
pub async fn screen_entity(
    State(state): State<Arc<AppState>>,
    Json(request): Json<EntityScreenRequest>,
) -> Result<Json<ScreeningResult>, AppError> {
    tracing::info!("POST /screening/entity - reference: {}", request.reference_id);
    let result = state
        .screening
        .screen_entity(&request)
        .await
        .context("entity screening")?;
    Ok(Json(result))
}

/// POST /api/v1/screening/batch
pub async fn screen_batch(
    State(state): State<Arc<AppState>>,
    Json(request): Json<BatchScreenRequest>,
) -> Result<Json<BatchScreeningResult>, AppError> {
    tracing::info!(
        "POST /screening/batch - {} persons, {} entities",
        request.persons.len(),
        request.entities.len()
    );
    let result = state
        .screening
        .batch_screen(&request)
        .await
        .context("batch screening")?;
    Ok(Json(result))
}

/// GET /api/v1/screening/results/:screening_id
pub async fn get_screening(
    State(state): State<Arc<AppState>>,
    Path(screening_id): Path<String>,
) -> Result<Json<ScreeningResult>, AppError> {
    tracing::info!("GET /screening/results/{}", screening_id);
    let result = state
        .screening
        .screening_result(&screening_id)
        .await
        .with_context(|| format!("screening {}", screening_id))?;
    Ok(Json(result))
}

/// GET /api/v1/screening/lists
pub async fn screening_lists(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ScreeningListInfo>>, AppError> {
    let lists = state.screening.screening_lists().await.context("screening lists")?;
    Ok(Json(lists))
}
