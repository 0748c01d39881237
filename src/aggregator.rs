use futures::future::join_all;
use std::collections::BTreeMap;

use crate::errors::SourceError;
use crate::models::{EntityDossier, EntityKey, SubResource, SubResourceResponse, Unavailable};
use crate::normalizer::normalize;
use crate::selection::SelectionToken;
use crate::source_adapter::{ensure_source, SourceAdapter};

/// A dossier together with the selection it was requested under.
#[derive(Debug, Clone)]
pub struct AggregatedDossier {
    pub token: SelectionToken,
    pub dossier: EntityDossier,
}

/// Fetches every sub-resource `adapter` needs for `key` concurrently and waits
/// for all of them to settle.
///
/// A failed fetch never cancels its siblings; it is kept as `Unavailable` and
/// surfaces as a diagnostic once normalized.
pub async fn collect_sub_resources(
    adapter: &dyn SourceAdapter,
    key: &EntityKey,
) -> Result<BTreeMap<SubResource, SubResourceResponse>, SourceError> {
    ensure_source(adapter.source(), key)?;

    let resources = adapter.dossier_resources();
    if resources.is_empty() {
        return Err(SourceError::InvalidQuery(format!(
            "{} results are not available as dossiers",
            adapter.source()
        )));
    }

    let responses = join_all(
        resources
            .iter()
            .map(|resource| adapter.fetch_sub_resource(key, *resource)),
    )
    .await;

    Ok(resources.iter().copied().zip(responses).collect())
}

/// Builds the normalized dossier for `key`, tagged with `token`.
pub async fn aggregate(
    adapter: &dyn SourceAdapter,
    key: &EntityKey,
    token: SelectionToken,
) -> Result<AggregatedDossier, SourceError> {
    tracing::info!("🔍 Step 1: Fetching {} sub-resources for {}", adapter.dossier_resources().len(), key);
    let sections = collect_sub_resources(adapter, key).await?;

    let failed: Vec<String> = sections
        .iter()
        .filter_map(|(resource, response)| match response {
            SubResourceResponse::Unavailable(Unavailable::NotFound) => None,
            SubResourceResponse::Unavailable(reason) => Some(format!("{} ({:?})", resource, reason)),
            SubResourceResponse::Available(_) => None,
        })
        .collect();
    if failed.is_empty() {
        tracing::info!("✓ All sub-resources settled for {}", key);
    } else {
        tracing::warn!("⚠️ {} sub-resources failed for {}: {}", failed.len(), key, failed.join(", "));
    }

    tracing::info!("🔍 Step 2: Normalizing dossier for {}", key);
    let dossier = normalize(key, &sections);
    tracing::info!(
        "✅ Dossier ready for {}: {} ({} diagnostics)",
        key,
        dossier.name.as_deref().unwrap_or("unnamed"),
        dossier.diagnostics.len()
    );

    Ok(AggregatedDossier { token, dossier })
}
