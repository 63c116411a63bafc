use std::sync::Arc;
use std::time::Duration;

use intel_ingestion::IngestJob;
use intel_repository::Repository;
use tokio::sync::mpsc;

/// Replaces the absent Celery beat schedule (`run_all_sources`): periodically
/// walks every non-deleted source and enqueues a routine (non-priority)
/// ingest job for it. `execute_ingest`'s own `ingest_min_interval_seconds`
/// check is what actually throttles re-fetching, so a short poll interval
/// here is harmless — sources not yet due simply get logged as skipped.
pub async fn run_periodic_scheduler(repo: Arc<dyn Repository>, sender: mpsc::Sender<IngestJob>, poll_interval: Duration) {
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.tick().await;

    loop {
        ticker.tick().await;

        let sources = match repo.list_active_sources().await {
            Ok(sources) => sources,
            Err(error) => {
                tracing::warn!(%error, "scheduler failed to list active sources, skipping this tick");
                continue;
            }
        };

        for source in sources {
            if sender.send(IngestJob::routine(source.id)).await.is_err() {
                tracing::warn!("worker job queue closed, stopping scheduler");
                return;
            }
        }
    }
}
