//! Mock x402 facilitator for local development.
//!
//! Accepts any structurally valid payment and settles each authorization once.
//! Never use it in front of a real backend.
//!
//! # Environment Variables
//!
//! - `HOST` - Bind address (default: `0.0.0.0`)
//! - `PORT` - Port (default: `3000`)
//! - `RUST_LOG` - Log level filter (default: `info`)

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use x402_gate_server::mock::{MockState, mock_router};
use x402_gate_server::util::SigDown;

/// In-memory x402 facilitator.
#[derive(Parser, Debug)]
#[command(name = "mock-facilitator")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Bind address.
    #[arg(long, env = "HOST", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    host: IpAddr,

    /// Port to listen on.
    #[arg(long, env = "PORT", default_value_t = 3000)]
    port: u16,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        tracing::error!("Mock facilitator failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let app = mock_router(MockState::default()).layer(TraceLayer::new_for_http());

    let sig_down = SigDown::try_new()?;
    let token = sig_down.cancellation_token();

    let addr = SocketAddr::new(cli.host, cli.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Mock facilitator listening on http://{addr}");
    tracing::info!("  POST /api/v1/verify - Verify payment");
    tracing::info!("  POST /api/v1/settle - Settle payment");
    tracing::info!("  GET  /api/v1/info   - Facilitator information");
    tracing::info!("  GET  /health        - Health check");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { token.cancelled().await })
        .await?;

    Ok(())
}
