//! Murmur Key Directory Server
//!
//! Serves the public key directory used by Murmur clients for end-to-end
//! encryption. See the library docs for the routes.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use murmur_directory::{router, AppState, DirectoryConfig};

// ── CLI Arguments ─────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "murmur-directory", version, about = "Murmur public key directory")]
struct Args {
    /// Address to bind
    #[arg(long, default_value = "0.0.0.0", env = "DIRECTORY_HOST")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = 8080, env = "DIRECTORY_PORT")]
    port: u16,

    /// Directory for persisted keys (in-memory when unset)
    #[arg(long, env = "DIRECTORY_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// JSON file mapping bearer tokens to users
    #[arg(long, env = "DIRECTORY_TOKENS_FILE")]
    tokens_file: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, env = "DIRECTORY_LOG_JSON")]
    log_json: bool,
}

// ── Entry Point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "murmur_directory=info,tower_http=info".into());
    if args.log_json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let config = DirectoryConfig {
        host: args.host,
        port: args.port,
        data_dir: args.data_dir,
        tokens_file: args.tokens_file,
    };

    let state = match AppState::from_config(&config) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(error = %e, "Failed to initialize directory");
            return ExitCode::FAILURE;
        }
    };

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("Murmur directory starting on {}", addr);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, addr = addr.as_str(), "Failed to bind address");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = axum::serve(listener, router(state)).await {
        tracing::error!(error = %e, "Server error");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

// ── Tests ─────────────────────────────────────────────────────────────────────
