//! `rpc-host` — a minimal demo host: accepts WebSocket connections, hands
//! each one a fresh [`component_rpc::ComponentSystem`] wired to a small
//! built-in component registry, and logs lifecycle events. Ambient stack
//! modeled on the host daemon family's `main.rs`: `clap` for CLI/env
//! arguments, `tracing`/`tracing-subscriber` for structured logging,
//! `anyhow` at the top level only.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::Parser;
use component_rpc::config::HostConfig;
use component_rpc::{
    Component, ComponentOptions, ComponentRegistry, ComponentSystem, HandlerError, Params, Peer,
};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "rpc-host", about = "Bidirectional JSON-RPC host over WebSocket")]
struct Args {
    /// `host:port` to listen on. Overrides `RPC_HOST_BIND_ADDR` and any
    /// `rpc-host.toml` setting.
    #[arg(long)]
    bind_addr: Option<String>,

    /// `trace` | `debug` | `info` | `warn` | `error`, or an `EnvFilter`
    /// directive string. Overrides `RPC_HOST_LOG` and the TOML file.
    #[arg(long)]
    log: Option<String>,

    /// Directory holding `rpc-host.toml`, if present.
    #[arg(long, env = "RPC_HOST_DATA_DIR", default_value = ".")]
    data_dir: PathBuf,
}

/// A trivial built-in component exposing `Clock.now`, registered by default
/// so the binary is useful standalone without any external configuration.
struct ClockComponent;

#[async_trait]
impl Component for ClockComponent {
    async fn component_did_mount(&self) -> Result<(), HandlerError> {
        info!("Clock component mounted");
        Ok(())
    }
}

fn install_builtin_components(registry: &ComponentRegistry) {
    registry
        .register::<ClockComponent>(
            "Clock",
            Arc::new(|options: ComponentOptions| {
                options.expose(
                    "now",
                    Arc::new(|_params: Params| {
                        Box::pin(async move {
                            let now = std::time::SystemTime::now()
                                .duration_since(std::time::UNIX_EPOCH)
                                .unwrap_or_default()
                                .as_secs();
                            Ok(Value::from(now))
                        })
                    }),
                );
                Arc::new(ClockComponent) as Arc<dyn Component>
            }),
        )
        .expect("Clock registers exactly once at startup");
}

fn init_tracing(directive: &str) {
    let filter = EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();
}

async fn handle_connection(
    stream: tokio::net::TcpStream,
    peer_addr: SocketAddr,
    registry: Arc<ComponentRegistry>,
    connections: Arc<Semaphore>,
) {
    // Held for the whole connection; dropped (and the slot freed) when this
    // function returns, whichever way the guest disconnects.
    let _permit = match connections.try_acquire_owned() {
        Ok(permit) => permit,
        Err(_) => {
            error!(%peer_addr, "rejecting connection: max_connections reached");
            return;
        }
    };

    let ws = match tokio_tungstenite::accept_async(stream).await {
        Ok(ws) => ws,
        Err(err) => {
            error!(%peer_addr, err = %err, "websocket handshake failed");
            return;
        }
    };

    let (transport, pump) = component_rpc::transport::websocket::WebSocketTransport::new(ws);
    let peer = Peer::new(transport);
    let system = ComponentSystem::new(peer.clone(), registry);

    info!(%peer_addr, "guest connected");
    let pump_task = tokio::spawn(pump.run(peer.clone()));
    system.enable().await;

    let _ = pump_task.await;
    system.unmount().await;
    info!(%peer_addr, "guest disconnected");
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = HostConfig::resolve(args.data_dir, args.bind_addr, args.log)
        .context("failed to resolve configuration")?;
    init_tracing(&config.log);

    let registry = Arc::new(ComponentRegistry::new());
    install_builtin_components(&registry);
    let connections = Arc::new(Semaphore::new(config.max_connections));

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, max_connections = config.max_connections, "rpc-host listening");

    loop {
        let (stream, peer_addr) = listener.accept().await?;
        let registry = registry.clone();
        let connections = connections.clone();
        tokio::spawn(handle_connection(stream, peer_addr, registry, connections));
    }
}
