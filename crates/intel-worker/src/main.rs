use std::sync::Arc;
use std::time::Duration;

use intel_core::{EmbeddingClient, Settings};
use intel_repository::SqlRepository;
use intel_worker::{run_periodic_scheduler, WorkerPool};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).json().init();

    sqlx::any::install_default_drivers();

    let settings = Arc::new(Settings::load());
    let repo: Arc<dyn intel_repository::Repository> = Arc::new(SqlRepository::connect(&settings.database_url).await?);
    let embedding_client = Arc::new(EmbeddingClient::new(&settings));
    let http_client = reqwest::Client::builder().timeout(Duration::from_secs(30)).build()?;

    let pool = WorkerPool::spawn(
        repo.clone(),
        settings.clone(),
        embedding_client,
        http_client,
        settings.worker_concurrency,
        settings.worker_queue_capacity,
    );

    tracing::info!(concurrency = settings.worker_concurrency, "intel-worker pool started");

    run_periodic_scheduler(repo, pool.sender(), Duration::from_secs(settings.worker_poll_interval_secs)).await;

    Ok(())
}
