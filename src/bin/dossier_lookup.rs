//! Command-line lookup: search one source and print a dossier as JSON.
//!
//! ```text
//! dossier-lookup <source> <query> [index...]
//! ```
//!
//! Without an index the candidates are listed. Every index is a new selection;
//! they are aggregated concurrently and only the last selection's dossier is
//! printed.

use anyhow::{anyhow, bail, Context};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use entity_dossier_api::aggregator::aggregate;
use entity_dossier_api::config::Config;
use entity_dossier_api::handlers::AppState;
use entity_dossier_api::models::{EntityKey, SearchFilters, SourceKind};
use entity_dossier_api::selection::SelectionTracker;

const USAGE: &str = "usage: dossier-lookup <source> <query> [index...]";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout stays valid JSON
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "entity_dossier_api=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut args = std::env::args().skip(1);
    let source: SourceKind = args.next().ok_or_else(|| anyhow!(USAGE))?.parse()?;
    let query = args.next().ok_or_else(|| anyhow!(USAGE))?;
    let indices = args
        .map(|raw| raw.parse::<usize>().with_context(|| format!("'{}' is not a candidate index", raw)))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let config = Config::from_env()?;
    let state = AppState::from_config(config)?;
    let adapter = state.adapter(source);

    let filters = SearchFilters::default();
    let candidates = adapter.search(&query, &filters).await?;
    if candidates.is_empty() {
        eprintln!("No {} results for '{}'", source, query);
        return Ok(());
    }

    if indices.is_empty() {
        println!("{}", serde_json::to_string_pretty(&candidates)?);
        return Ok(());
    }

    let tracker = Arc::new(SelectionTracker::new());
    let mut pending = Vec::with_capacity(indices.len());
    for index in indices {
        let candidate = candidates
            .get(index)
            .ok_or_else(|| anyhow!("index {} out of range ({} candidates)", index, candidates.len()))?;
        let key = EntityKey::parse(source, &candidate.key)?;
        let token = tracker.select();
        tracing::info!("Selected {} ({})", candidate.name, key);

        let adapter = Arc::clone(&adapter);
        pending.push(tokio::spawn(async move {
            aggregate(adapter.as_ref(), &key, token).await
        }));
    }

    let mut shown = None;
    for handle in pending {
        let result = handle.await??;
        if let Some(dossier) = tracker.accept(result) {
            shown = Some(dossier);
        }
    }

    match shown {
        Some(dossier) => println!("{}", serde_json::to_string_pretty(&dossier)?),
        None => bail!("no dossier was produced for the last selection"),
    }

    Ok(())
}
