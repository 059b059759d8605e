use clap::Parser;
use std::path::PathBuf;
use tracer::{Config, ShutdownSignal, Tracer};

#[derive(Parser)]
#[command(name = "tracer", about = "Live HTTP(S) trace viewer correlated with the device log")]
struct Cli {
    /// Config file (default: ~/.config/tracer/config.toml, created if missing).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Preferred port; the next free one is used when it is taken.
    #[arg(long)]
    port: Option<u16>,

    #[arg(long)]
    host: Option<String>,

    /// Block-structured trace file to tail (overrides TRACER_LOG).
    #[arg(long)]
    trace_file: Option<PathBuf>,

    /// Exclude URLs containing this pattern. Repeatable.
    #[arg(long = "exclude", value_name = "PATTERN")]
    excludes: Vec<String>,

    /// Write debug logs to /tmp/tracer-debug.log (tail -f to inspect).
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug)?;

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(file) = cli.trace_file {
        config.trace.file = Some(file);
    }
    for pattern in cli.excludes {
        let pattern = pattern.trim().to_string();
        if !pattern.is_empty() && !config.filter.exclude.contains(&pattern) {
            config.filter.exclude.push(pattern);
        }
    }

    // Installed before any producer is spawned so SIGTERM always reaches
    // the teardown below.
    let mut shutdown = ShutdownSignal::install()?;
    let tracer = Tracer::start(&config).await?;
    let listener = tracer_web::bind_with_fallback(
        &config.server.host,
        config.server.port,
        config.server.port_attempts,
    )
    .await?;

    // Event streams never finish on their own, so the server runs until
    // interrupted or terminated.
    let result = tokio::select! {
        served = tracer_web::serve(listener, tracer.state.clone()) => served.map_err(anyhow::Error::from),
        signal = shutdown.recv() => signal
            .map(|kind| tracing::info!(signal = kind, "shutting down"))
            .map_err(anyhow::Error::from),
    };

    tracer.shutdown().await;
    result
}

fn init_tracing(debug: bool) -> anyhow::Result<()> {
    if debug {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open("/tmp/tracer-debug.log")?;
        tracing_subscriber::fmt()
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_env("RUST_LOG")
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
            )
            .init();
        tracing::info!("tracer debug log started, tail -f /tmp/tracer-debug.log");
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_env("RUST_LOG")
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    }
    Ok(())
}
