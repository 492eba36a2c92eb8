use std::sync::Arc;

use anyhow::Result;
use engine::{EngineConfig, GroupRegistry};
use store::{CheckpointStore, FileCheckpointStore, MemoryCheckpointStore, MemoryMetadataStore};
use tracing::info;

mod access;
mod app;
mod config;
mod error;
mod extractors;
mod identity;
mod metadata;
mod middleware;
mod routes;

use identity::HttpIdentityResolver;
use metadata::MetadataIndex;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = config::Config::load()?;
    middleware::logging::init_logging(&config.logging);

    info!("Starting unfair-wheel API v{}", env!("CARGO_PKG_VERSION"));

    let checkpoint: Arc<dyn CheckpointStore> = match &config.engine.checkpoint_dir {
        Some(dir) => {
            info!(dir = %dir, "File checkpointing enabled");
            Arc::new(FileCheckpointStore::new(dir))
        }
        None => {
            info!("Checkpointing is in-memory only");
            Arc::new(MemoryCheckpointStore::new())
        }
    };

    let registry = Arc::new(GroupRegistry::new(EngineConfig::default(), checkpoint));
    let metadata = Arc::new(MetadataIndex::new(Arc::new(MemoryMetadataStore::new())));
    let resolver = Arc::new(HttpIdentityResolver::new(
        config.auth.resolver_url.clone(),
        config.auth.secret.clone(),
    ));

    let addr = config.socket_addr()?;
    let app = app::create_app(config, registry, metadata, resolver);

    info!("Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
