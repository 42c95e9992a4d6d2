//! Passage API server binary.
//!
//! Reads configuration from the environment (and `.env`), wires the
//! provider client, user store and token engine, then serves the REST API.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use passage_api::config::ApiConfig;
use passage_core::auth::revocation::InMemoryRevocationStore;
use passage_core::auth::service::AuthService;
use passage_core::auth::tokens::TokenEngine;
use passage_core::oauth::provider::HttpProviderClient;
use passage_core::users::postgres::PgUserStore;
use passage_core::users::store::{InMemoryUserStore, UserStore};
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

/// How often expired revocation entries are swept.
const REVOCATION_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

/// CLI arguments. Flags override the matching environment variables.
#[derive(Parser, Debug)]
#[command(name = "passage_api_server", about = "Passage API server")]
struct Args {
    /// Address to listen on (overrides `BIND_ADDR`).
    #[arg(long)]
    bind: Option<String>,

    /// PostgreSQL connection URL. Users are kept in memory when unset.
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Maximum number of database connections in the pool.
    #[arg(long, default_value_t = 5)]
    max_connections: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,passage_api=debug,passage_core=debug".into()),
        )
        .init();

    let args = Args::parse();

    let mut config = ApiConfig::from_env()?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if args.database_url.is_some() {
        config.database_url = args.database_url;
    }

    info!(bind_addr = %config.bind_addr, "starting passage_api_server");

    let users: Arc<dyn UserStore> = match &config.database_url {
        Some(url) => {
            info!(max_connections = args.max_connections, "configuring connection pool");
            let pool = PgPoolOptions::new()
                .max_connections(args.max_connections)
                .acquire_timeout(Duration::from_secs(30))
                .connect(url)
                .await?;

            info!("running database migrations");
            passage_core::migrate::migrate(&pool).await?;
            Arc::new(PgUserStore::new(pool))
        }
        None => {
            warn!("DATABASE_URL not set; users are kept in memory and lost on restart");
            Arc::new(InMemoryUserStore::new())
        }
    };

    let revocations = Arc::new(InMemoryRevocationStore::new());
    tokio::spawn({
        let revocations = revocations.clone();
        async move {
            let mut tick = tokio::time::interval(REVOCATION_SWEEP_INTERVAL);
            loop {
                tick.tick().await;
                revocations.purge_expired();
            }
        }
    });

    let tokens = TokenEngine::new(
        config.jwt_secret.as_bytes(),
        config.tokens.clone(),
        revocations,
    );
    let provider = Arc::new(HttpProviderClient::new(config.provider.clone())?);
    let auth = AuthService::new(provider, users, tokens);

    let state = passage_api::AppState {
        auth: Arc::new(auth),
    };
    let app = passage_api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %listener.local_addr()?, "REST API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await?;

    Ok(())
}
