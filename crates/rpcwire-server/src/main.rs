//! rpcwire server binary.
//!
//! - `--transport stdio`: one connection over stdin/stdout, exits on
//!   `shutdown` or end of input.
//! - `--transport http`: `POST /rpc` on `--listen`; the readiness line
//!   `listening on http://<addr>` goes to stderr once bound.
//!
//! Diagnostics always go to stderr; stdout belongs to the stream transport.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use rpcwire_core::Result;
use rpcwire_server::{app_state::AppState, config, ServerConfig, TransportKind};

#[derive(Parser, Debug)]
#[command(name = "rpcwire-server")]
#[command(about = "JSON-RPC 2.0 server over line-delimited stdio or HTTP")]
struct Args {
    /// Optional YAML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Carrier to serve on (overrides `server.transport`)
    #[arg(short, long, value_enum)]
    transport: Option<TransportKind>,

    /// HTTP listen address (overrides `server.listen`)
    #[arg(long)]
    listen: Option<SocketAddr>,

    /// HTTP port (0 = auto-assign); replaces the port of the listen address
    #[arg(short, long)]
    port: Option<u16>,
}

fn load_config(args: &Args) -> Result<ServerConfig> {
    let mut cfg = match &args.config {
        Some(path) => config::load_from_file(&path.to_string_lossy())?,
        None => ServerConfig::default(),
    };
    if let Some(transport) = args.transport {
        cfg.server.transport = transport;
    }
    let mut listen = cfg.server.listen_addr()?;
    if let Some(addr) = args.listen {
        listen = addr;
    }
    if let Some(port) = args.port {
        listen.set_port(port);
    }
    cfg.server.listen = listen.to_string();
    cfg.validate()?;
    Ok(cfg)
}

async fn run(cfg: ServerConfig) -> Result<()> {
    let state = AppState::new(cfg)?;
    match state.cfg().server.transport {
        TransportKind::Stdio => {
            let exit = rpcwire_server::serve_stdio(state).await?;
            tracing::info!(?exit, "stdio transport finished");
        }
        TransportKind::Http => {
            let addr = state.cfg().server.listen_addr()?;
            let server = rpcwire_server::bind(state, addr).await?;
            eprintln!("listening on http://{}", server.local_addr());
            server.serve().await?;
        }
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = Args::parse();

    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let code = match load_config(&args) {
        Ok(cfg) => match run(cfg).await {
            Ok(()) => 0,
            Err(e) => {
                tracing::error!(kind = e.kind().as_str(), error = %e, "server failed");
                eprintln!("server error: {e}");
                1
            }
        },
        Err(e) => {
            eprintln!("server error: {e}");
            1
        }
    };

    // Tokio's stdin reader parks a blocking thread that shutdown would wait on.
    std::process::exit(code)
}
