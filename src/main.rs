use std::sync::Arc;
use std::time::Duration;

use axum::http::Method;
use clap::Parser;
use marginalia::auth::AuthGate;
use marginalia::config::{Cli, Config, StoreBackend, default_config_dir, default_config_path};
use marginalia::covers::RemoteCovers;
use marginalia::db::Database;
use marginalia::handler::AppState;
use marginalia::librarian::Librarian;
use marginalia::routes::routes;
use marginalia::s3::ObjectStorage;
use marginalia::store::{CoverLookup, CoverStore, LibraryStore, MemoryCoverStore, MemoryStore, NoCovers};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let args = Cli::parse();
    dotenvy::dotenv().ok();

    // With --config the data directory is the config file's parent,
    // otherwise ~/.marginalia/ holds both.
    let (config_path, data_dir) = match args.config_path {
        Some(path) => {
            let path = std::path::PathBuf::from(path);
            let dir = path
                .parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| std::path::PathBuf::from("."));
            (path, dir)
        }
        None => {
            let dir = default_config_dir();
            (default_config_path(), dir)
        }
    };

    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        eprintln!("failed to create data directory {:?}: {}", data_dir, e);
        std::process::exit(1);
    }

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    tracing::info!("marginalia.svc starting");

    let cfg = Config::new(&config_path.to_string_lossy()).unwrap_or_else(|e| {
        tracing::error!(error = %e, path = ?config_path, "failed to load config file");
        std::process::exit(1);
    });

    let object_storage = match cfg.app.store == StoreBackend::S3 || !cfg.app.get_bucket().is_empty() {
        true => Some(Arc::new(ObjectStorage::new(&cfg).await.unwrap_or_else(|e| {
            tracing::error!(error = %marginalia::unpack_error(&e), "failed to setup object storage");
            std::process::exit(1);
        }))),
        false => None,
    };

    let store: Arc<dyn LibraryStore> = match cfg.app.store {
        StoreBackend::Sqlite => Arc::new(Database::new(&cfg, &data_dir).await.unwrap_or_else(|e| {
            tracing::error!(error = %e, "failed to setup database");
            std::process::exit(1);
        })),
        StoreBackend::S3 => match &object_storage {
            Some(s3) => s3.clone(),
            None => {
                tracing::error!("s3 store selected but no object storage is configured");
                std::process::exit(1);
            }
        },
        StoreBackend::Memory => {
            tracing::warn!("using in-memory library, nothing will survive a restart");
            Arc::new(MemoryStore::new())
        }
    };

    let cover_store: Arc<dyn CoverStore> = match &object_storage {
        Some(s3) => s3.clone(),
        None => {
            tracing::warn!("no bucket configured, covers are kept in memory");
            Arc::new(MemoryCoverStore::default())
        }
    };

    let cover_lookup: Arc<dyn CoverLookup> = if cfg.covers.enabled {
        Arc::new(RemoteCovers::new(Duration::from_secs(cfg.covers.timeout_seconds)).unwrap_or_else(|e| {
            tracing::error!(error = %e, "failed to setup cover lookup");
            std::process::exit(1);
        }))
    } else {
        Arc::new(NoCovers)
    };

    let auth = AuthGate::new(cfg.app.auth_token.clone());
    if auth.is_open() {
        tracing::warn!("no auth_token configured, delete/rename/restore are unprotected");
    }

    let state = AppState {
        librarian: Arc::new(Librarian::new(store, cover_lookup, cover_store)),
        auth,
    };

    let address = format!("0.0.0.0:{}", cfg.app.get_port());
    let cancellation_token = CancellationToken::new();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);

    let app = routes().layer(cors).with_state(state);

    let listener = tokio::net::TcpListener::bind(&address).await.unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to setup tcp listener");
        std::process::exit(1);
    });

    let shutdown = cancellation_token.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            tracing::info!("ctrl+c signal received, preparing to shutdown");
        }
        shutdown.cancel();
    });

    tracing::info!("marginalia.svc running on {}", &address);
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancellation_token.cancelled().await });
    if let Err(err) = server.await {
        tracing::error!(error = %err, "server error");
        std::process::exit(1);
    }

    tracing::info!("marginalia.svc going off, graceful shutdown complete");
}
