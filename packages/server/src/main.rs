use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use common::FilesystemAttachmentStore;
use tracing::info;

use server::config::AppConfig;
use server::mailer::Notifier;
use server::state::AppState;
use server::{build_router, database, seed};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    let config = AppConfig::load().context("Failed to load config")?;

    let db = database::init_db(&config.database)
        .await
        .context("Failed to initialize database")?;
    seed::ensure_indexes(&db)
        .await
        .context("Failed to ensure indexes")?;

    let storage = Arc::new(
        FilesystemAttachmentStore::new(config.storage.root.clone(), config.storage.max_file_size)
            .await
            .context("Failed to initialize attachment storage")?,
    );
    let notifier = Arc::new(
        Notifier::new(db.clone(), &config.mail).context("Failed to initialize mailer")?,
    );

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server.host/server.port")?;

    let state = AppState {
        db,
        config,
        storage,
        notifier,
    };
    let app = build_router(state);

    info!("Server running at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
