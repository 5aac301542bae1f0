use anyhow::{bail, Context, Result};
use chatbridge::config::Config;
use chatbridge::pipeline::{Bridge, VERSION};
use chatbridge::util::{init_tracing, load_env_file};
use chatbridge::{grpc, rest, UpstreamClient};
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinSet;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

fn print_usage(program: &str) {
    eprintln!("Usage: {program} [--config=config.json] [--http-only | --grpc-only] [--version]");
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("chatbridge");

    if args.iter().any(|a| a == "--version") {
        println!("chatbridge v{VERSION}");
        return Ok(());
    }
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage(program);
        return Ok(());
    }

    let http_only = args.iter().any(|a| a == "--http-only");
    let grpc_only = args.iter().any(|a| a == "--grpc-only");
    if http_only && grpc_only {
        print_usage(program);
        bail!("--http-only and --grpc-only are mutually exclusive");
    }

    let config_path = args
        .iter()
        .find_map(|a| a.strip_prefix("--config="))
        .map(PathBuf::from);

    let env_source = load_env_file();
    let config = Config::load(config_path.as_deref())?;
    init_tracing(&config.logging);
    tracing::info!("Environment loaded from: {}", env_source);
    if let Some(path) = config_path.as_deref().filter(|p| !p.exists()) {
        tracing::warn!(path = %path.display(), "config file not found; using defaults");
    }

    let client = UpstreamClient::new(&config.upstream)
        .context("failed to build upstream HTTP client")?;
    tracing::info!(
        upstream = %client.base_url(),
        timeout_secs = config.upstream.timeout_secs,
        has_api_key = config.upstream.api_key.is_some(),
        "upstream client ready"
    );
    let bridge = Bridge::new(Arc::new(client));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut servers: JoinSet<(&'static str, Result<()>)> = JoinSet::new();

    if !grpc_only {
        let addr = config.server.http_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind HTTP listener on {addr}"))?;
        tracing::info!("REST server listening on http://{}", addr);
        let bridge = bridge.clone();
        let signal = wait_for_shutdown(shutdown_rx.clone());
        servers.spawn(async move {
            let res = rest::serve(listener, bridge, signal)
                .await
                .context("HTTP server error");
            ("http", res)
        });
    }

    if !http_only {
        let addr = resolve(&config.server.grpc_addr()).await?;
        tracing::info!("gRPC server listening on {}", addr);
        let bridge = bridge.clone();
        let signal = wait_for_shutdown(shutdown_rx.clone());
        servers.spawn(async move {
            let res = grpc::serve(addr, bridge, signal)
                .await
                .context("gRPC server error");
            ("grpc", res)
        });
    }

    // Run until a signal arrives or either server stops on its own.
    let mut exit_err = None;
    tokio::select! {
        Some(joined) = servers.join_next() => {
            match joined {
                Ok((name, Ok(()))) => tracing::warn!(server = name, "server stopped unexpectedly"),
                Ok((name, Err(e))) => {
                    tracing::error!(server = name, error = %e, "server failed");
                    exit_err = Some(e);
                }
                Err(e) => tracing::error!(error = %e, "server task panicked"),
            }
        }
        _ = shutdown_signal() => {}
    }

    let _ = shutdown_tx.send(true);
    let drain = async {
        while let Some(joined) = servers.join_next().await {
            match joined {
                Ok((name, Ok(()))) => tracing::info!(server = name, "server stopped gracefully"),
                Ok((name, Err(e))) => tracing::error!(server = name, error = %e, "server shutdown error"),
                Err(e) => tracing::error!(error = %e, "server task panicked"),
            }
        }
    };
    if tokio::time::timeout(SHUTDOWN_GRACE, drain).await.is_err() {
        tracing::warn!("servers did not stop within {:?}; aborting", SHUTDOWN_GRACE);
        servers.abort_all();
    }

    tracing::info!("chatbridge stopped");
    match exit_err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

async fn resolve(addr: &str) -> Result<SocketAddr> {
    tokio::net::lookup_host(addr)
        .await
        .with_context(|| format!("failed to resolve {addr}"))?
        .next()
        .with_context(|| format!("no address found for {addr}"))
}

/// Resolves once shutdown is requested or the sender is gone.
async fn wait_for_shutdown(mut rx: watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received ctrl-c, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
