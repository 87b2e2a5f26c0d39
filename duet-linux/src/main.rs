// Duet Linux: relay client, WebRTC peer, console for one-to-one media sessions.
// With --hub, serves as the relay the clients connect to.

mod config;
mod console;
mod host;
mod hub;
mod media;
mod relay;
mod rtc;

use anyhow::Context;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() -> anyhow::Result<()> {
    let mut hub_mode = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("duet-linux {}", VERSION);
                return Ok(());
            }
            "--hub" => hub_mode = true,
            other => anyhow::bail!("unknown argument `{other}` (expected --hub or --version)"),
        }
    }

    let cfg = config::load()?;
    init_tracing(&cfg.log_level);

    let rt = tokio::runtime::Runtime::new().context("starting tokio runtime")?;
    if hub_mode {
        return rt.block_on(async {
            tokio::select! {
                r = hub::run_hub(&cfg.relay_addr) => r,
                r = shutdown_signal() => Ok(r?),
            }
        });
    }
    rt.block_on(async {
        let (me, reader, writer) = relay::connect(&cfg.relay_addr).await?;
        info!(participant = %me, relay = %cfg.relay_addr, "connected");
        println!("you are {me}; type `help` for commands");

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(relay::run_reader(reader, tx.clone()));
        tokio::spawn(console::run_console(tx.clone()));
        let shutdown_tx = tx.clone();
        tokio::spawn(async move {
            if let Err(e) = shutdown_signal().await {
                tracing::warn!(error = %e, "signal handler failed");
            }
            let _ = shutdown_tx.send(host::HostEvent::Shutdown);
        });

        host::Host::new(&cfg, me, writer, tx).run(rx).await
    })
}

/// RUST_LOG wins over the configured level.
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Wait for Ctrl+C or SIGTERM (Unix).
async fn shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            r = tokio::signal::ctrl_c() => r?,
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
    }
    Ok(())
}
