mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use fellowship_api::notify::email::Mailer;
use fellowship_api::notify::push::PushClient;
use fellowship_api::router;
use fellowship_api::state::AppStateInner;
use fellowship_api::storage::Storage;
use fellowship_db::Database;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fellowship=debug,tower_http=debug".into()),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("FATAL: {:#}", e);
            eprintln!("       Set it in your .env file and restart.");
            std::process::exit(1);
        }
    };

    let db = Database::open(&config.db_path)?;
    info!("Database opened at {}", config.db_path.display());

    let storage = Storage::new(config.storage_dir.clone(), &config.public_url).await?;

    let mailer = match &config.email {
        Some(email) => {
            info!("Email delivery via {}", email.api_url);
            Some(Mailer::new(&email.api_url, email.api_key.clone(), email.from.clone())?)
        }
        None => {
            warn!("FELLOWSHIP_EMAIL_API_KEY is not set, email delivery is disabled");
            None
        }
    };
    let push = match &config.push {
        Some(push) => Some(PushClient::new(&push.api_url, push.access_token.clone())?),
        None => {
            info!("Push delivery is disabled");
            None
        }
    };

    let state = Arc::new(AppStateInner {
        db,
        jwt_secret: config.jwt_secret.clone(),
        storage,
        mailer,
        push,
        public_url: config.public_url.clone(),
    });

    let app = router::build(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Fellowship server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
