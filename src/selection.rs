use std::sync::atomic::{AtomicU64, Ordering};

use crate::aggregator::AggregatedDossier;
use crate::models::EntityDossier;

/// Generation a detail aggregation was started under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SelectionToken(u64);

impl SelectionToken {
    pub fn generation(&self) -> u64 {
        self.0
    }
}

/// Last-selection-wins guard for a single viewer.
///
/// Each new selection bumps the generation; results carrying an older token
/// are dropped instead of overwriting the newer view.
#[derive(Debug, Default)]
pub struct SelectionTracker {
    generation: AtomicU64,
}

impl SelectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new selection, invalidating every earlier token.
    pub fn select(&self) -> SelectionToken {
        SelectionToken(self.generation.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_current(&self, token: SelectionToken) -> bool {
        self.generation.load(Ordering::SeqCst) == token.0
    }

    /// Hands back the dossier only if it belongs to the latest selection.
    pub fn accept(&self, result: AggregatedDossier) -> Option<EntityDossier> {
        if self.is_current(result.token) {
            Some(result.dossier)
        } else {
            tracing::debug!(
                "Discarding stale dossier for {} (generation {})",
                result.dossier.entity_key,
                result.token.generation()
            );
            None
        }
    }
}
