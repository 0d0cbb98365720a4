use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use cardbox_api::config;
use cardbox_api::database::{self, cards::CardStore, users::UserStore};
use cardbox_api::handlers::{router, AppState};
use cardbox_api::session::{SessionConfig, SessionManager};

#[derive(Parser)]
#[command(name = "cardbox-api", version, about = "Note card backend API")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server
    Serve {
        /// Port to listen on; falls back to PORT env, then 3000
        #[arg(long)]
        port: Option<u16>,
    },
    /// Ensure the database schema exists, then exit
    InitDb,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = config::config();
    tracing::info!("Starting cardbox API in {:?} mode", config.environment);

    if config.security.jwt_secret.is_empty() {
        anyhow::bail!("SECURITY_JWT_SECRET must be set");
    }

    let pool = database::connect(&config.database)
        .await
        .context("failed to connect database pool")?;

    match cli.command.unwrap_or(Command::Serve { port: None }) {
        Command::InitDb => {
            database::init_schema(&pool).await?;
        }
        Command::Serve { port } => {
            database::init_schema(&pool).await?;

            let state = Arc::new(AppState {
                users: UserStore::new(pool.clone()),
                cards: CardStore::new(pool.clone()),
                sessions: SessionManager::new(SessionConfig::from_security(&config.security)),
                api: config.api.clone(),
                pool,
            });

            let port = port
                .or_else(|| std::env::var("PORT").ok().and_then(|s| s.parse().ok()))
                .unwrap_or(3000);
            let bind_addr = format!("0.0.0.0:{}", port);
            let listener = tokio::net::TcpListener::bind(&bind_addr)
                .await
                .with_context(|| format!("failed to bind {}", bind_addr))?;

            tracing::info!("Listening on http://{}", bind_addr);
            axum::serve(listener, router(state)).await.context("server")?;
        }
    }

    Ok(())
}
