use finance_chat_cascade::{
    api::start_server,
    router::TracingListener,
    CascadeOrchestrator, EnvCredentials, Settings,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = Settings::from_env()?;

    info!("Finance Chat Cascade - API Server");
    info!(
        port = settings.port,
        environment = ?settings.environment,
        synthetic = settings.synthetic_enabled,
        "Settings loaded"
    );

    let cascade = CascadeOrchestrator::from_settings(&settings, Arc::new(EnvCredentials))?;
    cascade.router().add_listener(Arc::new(TracingListener));

    let providers = cascade.registry().list_providers().await;
    let available: Vec<&str> = providers
        .iter()
        .filter(|p| p.available && !p.is_synthetic())
        .map(|p| p.key.as_str())
        .collect();

    if available.is_empty() {
        warn!("No provider credentials configured; see .env.example");
    } else {
        info!(providers = ?available, "Providers with credentials");
    }

    start_server(Arc::new(cascade), settings.port).await?;

    Ok(())
}
