//! Hangouts console client.
//!
//! # Usage
//!
//! ```bash
//! # Custom socket server
//! hangouts --username alice --email alice@example.com --server ws://localhost:3000
//!
//! # Hosted backend
//! hangouts --transport service --username alice --email alice@example.com \
//!     --server https://api.example.com/parse --live-query wss://api.example.com \
//!     --app-id hangouts --token r:abc123
//! ```

use std::{path::PathBuf, time::Duration};

use clap::{Parser, ValueEnum};
use hangouts_cli::{Backend, ConsoleDriver, Runtime};
use hangouts_client::{
    EngineConfig, Identity, TransitionPolicy,
    transport::{ServiceConfig, ServiceTransport, SocketConfig, SocketTransport},
};
use hangouts_core::{RedbStorage, SystemEnv};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Which backend to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum TransportKind {
    /// Custom WebSocket server
    Socket,
    /// Hosted backend over REST and live query
    Service,
}

/// Hangouts console client
#[derive(Parser, Debug)]
#[command(name = "hangouts")]
#[command(about = "Console client for hangouts relationship sync")]
#[command(version)]
struct Args {
    /// Local username
    #[arg(short, long, env = "HANGOUTS_USERNAME")]
    username: String,

    /// Local email, shown to peers
    #[arg(short, long, env = "HANGOUTS_EMAIL")]
    email: String,

    /// Backend type
    #[arg(short, long, value_enum, default_value = "socket")]
    transport: TransportKind,

    /// Socket server URL, or REST endpoint for the hosted backend
    #[arg(short, long, env = "HANGOUTS_SERVER", default_value = "ws://localhost:3000")]
    server: String,

    /// Live-query endpoint (hosted backend)
    #[arg(long, env = "HANGOUTS_LIVE_QUERY")]
    live_query: Option<String>,

    /// Application id (hosted backend)
    #[arg(long, env = "HANGOUTS_APP_ID", default_value = "hangouts")]
    app_id: String,

    /// Session token (hosted backend)
    #[arg(long, env = "HANGOUTS_TOKEN", default_value = "")]
    token: String,

    /// Maximum search results (hosted backend)
    #[arg(long, default_value = "20")]
    search_limit: usize,

    /// Cache database path. Defaults to `<username>.redb`.
    #[arg(long)]
    db: Option<PathBuf>,

    /// Reject commands that are illegal from the current relationship state
    /// (default)
    #[arg(long, conflicts_with = "permissive")]
    strict: bool,

    /// Apply every command regardless of the current relationship state
    #[arg(long)]
    permissive: bool,

    /// Give up on unacknowledged commands after this many seconds
    #[arg(long)]
    ack_timeout_secs: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    // stdout carries the view
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let identity = Identity::new(args.username.clone(), args.email.clone());
    let db = args.db.clone().unwrap_or_else(|| PathBuf::from(format!("{}.redb", args.username)));
    let storage = RedbStorage::open(&db)?;
    tracing::info!(user = %identity.username, db = %db.display(), "cache opened");

    let backend = match args.transport {
        TransportKind::Socket => {
            Backend::Socket(SocketTransport::new(SocketConfig { url: args.server }))
        },
        TransportKind::Service => {
            let live_query_url = args
                .live_query
                .ok_or("--live-query is required for the service transport")?;
            Backend::Service(ServiceTransport::new(ServiceConfig {
                server_url: args.server,
                live_query_url,
                application_id: args.app_id,
                session_token: args.token,
                search_limit: args.search_limit,
            }))
        },
    };

    let policy = if args.permissive && !args.strict {
        TransitionPolicy::Permissive
    } else {
        TransitionPolicy::Strict
    };
    let config = EngineConfig {
        policy,
        ack_timeout: args.ack_timeout_secs.map(Duration::from_secs),
    };

    let driver = ConsoleDriver::new(backend);
    let runtime = Runtime::new(driver, SystemEnv::new(), storage, identity, config);
    runtime.run().await?;

    Ok(())
}
