//! The capability every upstream source implements.

use async_trait::async_trait;

use crate::errors::SourceError;
use crate::models::{EntityKey, SearchFilters, SearchResult, SourceKind, SubResource, SubResourceResponse};

/// One upstream source, seen as a search plus a set of independently fetchable sub-resources.
///
/// Implementations hold only immutable configuration, an HTTP client and a
/// circuit breaker, so a single instance can serve concurrent calls.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn source(&self) -> SourceKind;

    /// Sub-resources a dossier for this source is assembled from. Static per source.
    fn dossier_resources(&self) -> &'static [SubResource];

    /// Finds candidates for `query`. Zero hits is `Ok(vec![])`, never an error.
    async fn search(&self, query: &str, filters: &SearchFilters) -> Result<Vec<SearchResult>, SourceError>;

    /// Fetches one sub-resource in the vendor's own shape. Failures are reported
    /// in the response, not raised, so siblings are unaffected.
    async fn fetch_sub_resource(&self, key: &EntityKey, resource: SubResource) -> SubResourceResponse;
}

/// Rejects blank queries before any vendor call is made.
pub fn validate_query(query: &str) -> Result<&str, SourceError> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Err(SourceError::InvalidQuery("query cannot be empty".to_string()));
    }
    Ok(trimmed)
}

/// Guards against a key from one source being handed to another.
pub fn ensure_source(adapter: SourceKind, key: &EntityKey) -> Result<(), SourceError> {
    if key.source != adapter {
        return Err(SourceError::InvalidQuery(format!(
            "{} key cannot be used with the {} source",
            key.source, adapter
        )));
    }
    Ok(())
}

/// Response for a sub-resource the source does not offer.
pub fn unsupported(source: SourceKind, resource: SubResource) -> SubResourceResponse {
    tracing::warn!("{} does not provide {}", source, resource);
    SubResourceResponse::from_result(Err(SourceError::InvalidQuery(format!(
        "{} does not provide {}",
        source, resource
    ))))
}
