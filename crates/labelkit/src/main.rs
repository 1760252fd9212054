mod cli;
mod server;

use std::sync::Arc;

use clap::Parser;
use eyre::WrapErr;
use tokio_util::sync::CancellationToken;

use labelkit_core::db::{LabelDb, MemoryDb};
use labelkit_core::LabelStore;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let args = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_file(true)
        .with_line_number(true)
        .with_level(true)
        .init();

    // Use the configured API token or generate one for this server session.
    let api_token = match &args.api_token {
        Some(token) if !token.trim().is_empty() => token.trim().to_string(),
        _ => {
            use rand::Rng;
            let bytes: [u8; 16] = rand::thread_rng().r#gen();
            hex_encode(bytes)
        }
    };

    let db = open_label_db(&args).await?;
    let shutdown = CancellationToken::new();

    let state = server::AppState {
        labels: LabelStore::new(db),
        api_token: api_token.clone(),
        shutdown: shutdown.clone(),
    };

    let bind_addr = format!("{}:{}", args.bind, args.port);
    let origin = format!("http://{}:{}", args.bind, args.port);
    let router = server::build_router(state, &origin)?;

    if args.bind == "0.0.0.0" {
        tracing::warn!("server is bound to 0.0.0.0; it is accessible from the network");
    }

    println!();
    println!("  labelkit is running:");
    println!("    URL:       http://{bind_addr}");
    println!("    API token: {api_token}");
    println!();

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .context("bind TCP listener")?;

    tracing::info!("listening on {bind_addr}");
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %err, "failed to listen for shutdown signal");
            }
            tracing::info!("shutting down; cancelling in-flight label requests");
            shutdown.cancel();
        })
        .await
        .context("run HTTP server")?;

    Ok(())
}

/// Pick the label backend from the CLI: PostgreSQL when configured, then a
/// JSONL file, then a purely in-memory store.
async fn open_label_db(args: &cli::Cli) -> eyre::Result<Arc<dyn LabelDb>> {
    #[cfg(feature = "postgres")]
    {
        if let Some(url) = &args.database_url {
            let db = labelkit_core::db::PgLabelDb::connect(url)
                .await
                .context("connect to PostgreSQL")?;
            db.ensure_schema().await.context("create labels table")?;
            tracing::info!("using PostgreSQL label store");
            return Ok(Arc::new(db));
        }
    }

    match &args.labels_file {
        Some(path) => {
            let db = MemoryDb::with_persistence(path).context("load persisted label file")?;
            let rows = db.row_count().await;
            tracing::info!(path = %path.display(), rows, "loaded persisted label store");
            Ok(Arc::new(db))
        }
        None => {
            tracing::info!("labels are in-memory only; pass --labels-file to persist them");
            Ok(Arc::new(MemoryDb::new()))
        }
    }
}

/// Tiny hex-encoding helper to avoid adding a `hex` crate dependency.
fn hex_encode(bytes: impl AsRef<[u8]>) -> String {
    bytes.as_ref().iter().map(|b| format!("{b:02x}")).collect()
}
