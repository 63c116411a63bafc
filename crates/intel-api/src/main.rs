use std::sync::Arc;

use intel_core::Settings;
use intel_orchestrator::Orchestrator;
use intel_repository::SqlRepository;
use tower_http::trace::TraceLayer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).json().init();

    sqlx::any::install_default_drivers();

    let settings = Arc::new(Settings::load());
    let repo = Arc::new(SqlRepository::connect(&settings.database_url).await?);
    let orchestrator = Arc::new(Orchestrator::new(repo.clone(), settings.clone()));

    let state = intel_api::AppState { orchestrator, repo, settings: settings.clone() };
    let app = intel_api::build_router(state).layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
    tracing::info!("intel-api listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
