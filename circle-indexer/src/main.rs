//! Circle Indexer Main Entry Point
//!
//! Syncs the configured HCS topics from a mirror node into the in-memory
//! circle graph until interrupted.

use circle_indexer::{Dependencies, IndexingError};
use dotenv::dotenv;
use std::env;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber. `RUST_LOG` overrides the filter and
/// `LOG_FORMAT=json` switches to one JSON object per line.
fn init_tracing() -> Result<(), IndexingError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("circle_indexer=info,circle_indexer_state=info"));

    let json = env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json"));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true),
            )
            .try_init()
            .map_err(|e| IndexingError::config(format!("Failed to initialize tracing: {}", e)))?;

        info!(
            service_name = "circle-indexer",
            service_version = env!("CARGO_PKG_VERSION"),
            "Tracing initialized with JSON format"
        );
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(true).pretty())
            .try_init()
            .map_err(|e| IndexingError::config(format!("Failed to initialize tracing: {}", e)))?;

        info!(
            service_name = "circle-indexer",
            service_version = env!("CARGO_PKG_VERSION"),
            "Tracing initialized with console output"
        );
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), IndexingError> {
    // Topic ids and mirror URLs usually live in .env during development.
    dotenv().ok();

    init_tracing()?;

    info!("Starting Circle Indexer");

    let mut deps = match Dependencies::new() {
        Ok(deps) => {
            info!("Dependencies initialized successfully");
            deps
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize dependencies");
            return Err(e);
        }
    };

    match deps.orchestrator.run().await {
        Ok(()) => {
            let stats = deps.cache.get_stats();
            let report = deps.orchestrator.loader().verify_consistency();
            for (topic, topic_stats) in deps.orchestrator.stats() {
                info!(
                    topic = %topic,
                    backfilled = topic_stats.backfilled,
                    streamed = topic_stats.streamed,
                    duplicates = topic_stats.duplicates,
                    failed = topic_stats.failed,
                    "Topic totals"
                );
            }
            if !report.consistent {
                error!(
                    missing_in_cache = report.missing_in_cache.len(),
                    unexpected_in_cache = report.unexpected_in_cache.len(),
                    "Circle cache disagrees with the event log"
                );
            }
            info!(
                node_count = stats.node_count,
                edge_count = stats.edge_count,
                consistent = report.consistent,
                "Circle indexer stopped"
            );
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Circle indexer failed");
            Err(e.into())
        }
    }
}
