use std::sync::Arc;
use std::time::Duration;

use intel_core::{EmbeddingClient, Settings};
use intel_ingestion::{execute_ingest, IngestJob};
use intel_repository::Repository;
use reqwest::Client;
use tokio::sync::{mpsc, Mutex};

const RETRY_BASE_SECS: u64 = 2;
const RETRY_CAP_SECS: u64 = 30;
const MAX_RETRIES: u32 = 3;

/// A fixed-size pool of workers draining a single ingestion job queue.
/// Mirrors the "independent parallel tasks dispatched through a job queue"
/// shape: one source processed end-to-end per job, no ordering guarantee
/// across jobs, throttled only by `concurrency`.
pub struct WorkerPool {
    sender: mpsc::Sender<IngestJob>,
}

impl WorkerPool {
    /// A cloneable handle for enqueuing jobs; orchestrators attach this via
    /// `Orchestrator::with_job_sender`.
    pub fn sender(&self) -> mpsc::Sender<IngestJob> {
        self.sender.clone()
    }

    pub fn spawn(
        repo: Arc<dyn Repository>,
        settings: Arc<Settings>,
        embedding_client: Arc<EmbeddingClient>,
        http_client: Client,
        concurrency: usize,
        queue_capacity: usize,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(queue_capacity);
        let receiver = Arc::new(Mutex::new(receiver));

        for worker_id in 0..concurrency.max(1) {
            let receiver = receiver.clone();
            let repo = repo.clone();
            let settings = settings.clone();
            let embedding_client = embedding_client.clone();
            let http_client = http_client.clone();

            tokio::spawn(async move {
                loop {
                    let job = {
                        let mut guard = receiver.lock().await;
                        guard.recv().await
                    };
                    let Some(job) = job else {
                        tracing::info!(worker_id, "job queue closed, worker exiting");
                        break;
                    };
                    run_job(&repo, &settings, &embedding_client, &http_client, worker_id, job).await;
                }
            });
        }

        Self { sender }
    }
}

/// Runs one job to completion, retrying transport failures up to
/// `MAX_RETRIES` times (so up to `MAX_RETRIES + 1` attempts total) with
/// exponential backoff: `2 ** retries` seconds, capped at `RETRY_CAP_SECS`.
async fn run_job(
    repo: &Arc<dyn Repository>,
    settings: &Settings,
    embedding_client: &EmbeddingClient,
    http_client: &Client,
    worker_id: usize,
    job: IngestJob,
) {
    let mut retries = 0u32;
    loop {
        let outcome = execute_ingest(&**repo, settings, embedding_client, http_client, job.source_id, job.force_refresh).await;

        match outcome {
            Ok(outcome) => {
                tracing::info!(
                    worker_id,
                    source_id = job.source_id,
                    status = ?outcome.status,
                    chunks = outcome.chunk_count,
                    "ingest job completed"
                );
                return;
            }
            Err(error) if error.retryable() && retries < MAX_RETRIES => {
                let backoff = Duration::from_secs((RETRY_BASE_SECS.pow(retries)).min(RETRY_CAP_SECS));
                tracing::warn!(worker_id, source_id = job.source_id, retries, %error, ?backoff, "retrying ingest job");
                tokio::time::sleep(backoff).await;
                retries += 1;
            }
            Err(error) => {
                tracing::error!(worker_id, source_id = job.source_id, retries, %error, "ingest job failed");
                return;
            }
        }
    }
}
