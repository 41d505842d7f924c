//! rollbackerd — the rollbacker daemon.
//!
//! Watches one named container: while its health endpoint answers 200 the
//! container's image is recorded as good; when it stops answering, the
//! container is replaced with the last good image.
//!
//! # Usage
//!
//! ```text
//! rollbackerd run --container my_app --health-url http://localhost:5000/health
//! rollbackerd run --config rollbacker.toml --once
//! rollbackerd status --state-file good_images.json
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand, ValueEnum};
use rollbacker_core::{ConfigFile, SupervisorConfig};
use rollbacker_health::HttpProber;
use rollbacker_runtime::{DockerRuntime, HostPlatform};
use rollbacker_state::GoodImageStore;
use rollbacker_supervisor::Supervisor;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "info,rollbacker=debug";

#[derive(Parser)]
#[command(name = "rollbackerd", about = "Self-healing supervisor for a single container")]
struct Cli {
    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Supervise the container until interrupted.
    Run {
        #[command(flatten)]
        settings: Settings,

        /// Run a single cycle and exit.
        #[arg(long)]
        once: bool,
    },
    /// Print the recorded good images.
    Status {
        #[command(flatten)]
        settings: Settings,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

/// Overrides layered on top of the config file, which is layered on the defaults.
#[derive(Args, Debug, Default)]
struct Settings {
    /// TOML config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Name of the container to supervise.
    #[arg(long)]
    container: Option<String>,

    /// Health endpoint; only a 200 response counts as healthy.
    #[arg(long)]
    health_url: Option<String>,

    /// JSON file holding the last good image per container.
    #[arg(long)]
    state_file: Option<PathBuf>,

    /// Poll interval, e.g. "10s".
    #[arg(long)]
    interval: Option<String>,

    /// Health probe timeout, e.g. "3s".
    #[arg(long)]
    probe_timeout: Option<String>,

    /// Host port bound when redeploying.
    #[arg(long)]
    host_port: Option<u16>,

    /// Container port bound when redeploying.
    #[arg(long)]
    container_port: Option<u16>,

    /// Container runtime TCP endpoint, e.g. tcp://127.0.0.1:2375.
    #[arg(long)]
    docker_host: Option<String>,
}

impl Settings {
    fn resolve(self) -> anyhow::Result<SupervisorConfig> {
        let mut file = match &self.config {
            Some(path) => ConfigFile::from_file(path)?,
            None => ConfigFile::default(),
        };

        if self.container.is_some() {
            file.container_name = self.container;
        }
        if self.health_url.is_some() {
            file.health_url = self.health_url;
        }
        if self.state_file.is_some() {
            file.state_file = self.state_file;
        }
        if self.interval.is_some() {
            file.check_interval = self.interval;
        }
        if self.probe_timeout.is_some() {
            file.probe_timeout = self.probe_timeout;
        }
        if self.host_port.is_some() {
            file.host_port = self.host_port;
        }
        if self.container_port.is_some() {
            file.container_port = self.container_port;
        }
        if self.docker_host.is_some() {
            file.docker_host = self.docker_host;
        }

        Ok(SupervisorConfig::resolve(file)?)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match cli.command {
        Command::Run { settings, once } => run(settings.resolve()?, once).await,
        Command::Status { settings } => status(&settings.resolve()?),
    }
}

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn run(config: SupervisorConfig, once: bool) -> anyhow::Result<()> {
    // Unsupported platform or unreachable runtime ends the process here.
    let platform = HostPlatform::detect()?;
    info!(
        %platform,
        container = %config.container,
        health_url = %config.health_url,
        "rollbacker starting"
    );

    let runtime = DockerRuntime::connect(platform, config.docker_host.as_deref()).await?;
    let prober = HttpProber::from_config(&config);
    let supervisor = Supervisor::new(&config, Arc::new(runtime), Arc::new(prober));

    if once {
        let outcome = supervisor.run_once().await;
        info!(?outcome, "single cycle finished");
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("shutdown signal received");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                error!(error = %e, "failed to install CTRL+C handler");
                // Dropping the sender would stop the loop; keep it alive.
                std::future::pending::<()>().await;
            }
        }
    });

    supervisor.run(shutdown_rx).await;
    info!("rollbacker stopped");
    Ok(())
}

fn status(config: &SupervisorConfig) -> anyhow::Result<()> {
    let store = GoodImageStore::open(&config.state_file);
    let record = store.load()?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}
