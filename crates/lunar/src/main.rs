mod config;

use clap::{Args, Parser, Subcommand, ValueEnum};
use config::{Backend, FileConfig, Overrides, Settings};
use lunar_apiserver::{ApiServer, AppState, Config as ApiConfig};
use lunar_runtime::{
    CommandRunner, FileJobStore, ItadmCli, JobTracker, MockDatasetManager, MockIscsiAdmin,
    MockTargetFramework, Orchestrator, OrchestratorContext, StmfCli, SystemRunner, ZfsCli,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "lunar", about = "Lunar storage control plane")]
struct Cli {
    /// Log output format
    #[arg(long, global = true, value_enum, default_value = "text", env = "LUNAR_LOG_FORMAT")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the storage API server
    Serve(ServeArgs),
}

#[derive(Args)]
struct ServeArgs {
    /// Configuration file (YAML or JSON)
    #[arg(long, env = "LUNAR_CONFIG")]
    config: Option<PathBuf>,
    /// Address to listen on, with or without a port
    #[arg(long, env = "LUNAR_LISTEN")]
    listen: Option<String>,
    /// Basic authentication user; authentication is off when unset
    #[arg(long, env = "LUNAR_USERNAME")]
    username: Option<String>,
    #[arg(long, env = "LUNAR_PASSWORD", hide_env_values = true)]
    password: Option<String>,
    /// Directory for job status files
    #[arg(long, env = "LUNAR_JOB_DIR")]
    job_dir: Option<PathBuf>,
    #[arg(long, value_enum, env = "LUNAR_BACKEND")]
    backend: Option<Backend>,
    /// Route group changes and configuration backups through the HA administrator
    #[arg(long)]
    stmf_ha: bool,
    /// Pools the API refuses to manage (repeatable or comma separated)
    #[arg(long = "private-pool", value_delimiter = ',', env = "LUNAR_PRIVATE_POOLS")]
    private_pools: Vec<String>,
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match cli.command {
        Commands::Serve(args) => run_serve(args).await,
    }
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

/// Run the API server until ctrl-c, then drain running jobs
async fn run_serve(args: ServeArgs) -> miette::Result<()> {
    let file = match &args.config {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            FileConfig::load(path)?
        }
        None => FileConfig::default(),
    };
    let overrides = Overrides {
        listen: args.listen,
        username: args.username,
        password: args.password,
        job_dir: args.job_dir,
        backend: args.backend,
        stmf_ha_enabled: args.stmf_ha,
        private_pools: args.private_pools,
    };
    let settings = Settings::resolve(file, overrides)?;

    info!("Starting lunar storage API server");
    let state = create_app_state(&settings).await?;

    let token = CancellationToken::new();
    let api_config = ApiConfig {
        listen_addr: settings.listen_addr,
        auth: settings.auth.clone(),
    };
    let api_server = ApiServer::new(api_config, state.clone());
    let api_token = token.clone();
    let mut api_handle = tokio::spawn(async move { api_server.run(api_token).await });

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.map_err(|e| miette::miette!("Failed to listen for ctrl-c: {}", e))?;
            info!("Shutting down gracefully...");
        }
        result = &mut api_handle => {
            // the server only returns early when it could not start
            return match result {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(miette::miette!("API server error: {}", e)),
                Err(e) => Err(miette::miette!("API server task failed: {}", e)),
            };
        }
    }

    token.cancel();

    let shutdown_timeout = Duration::from_secs(5);
    match tokio::time::timeout(shutdown_timeout, api_handle).await {
        Ok(Ok(Err(e))) => error!("API server error: {}", e),
        Err(_) => warn!("API server did not stop within {:?}", shutdown_timeout),
        _ => {}
    }

    info!("Waiting for running jobs");
    state.jobs.shutdown().await;

    info!("Shutdown complete");

    Ok(())
}

/// Wire the subsystems, orchestrator and job tracker together
async fn create_app_state(settings: &Settings) -> miette::Result<Arc<AppState>> {
    let context = OrchestratorContext::new(settings.settle);

    let orchestrator = match settings.backend {
        Backend::Cli => {
            let runner: Arc<dyn CommandRunner> = Arc::new(SystemRunner);
            info!(
                "Using zfs, stmfadm and itadm (HA administration: {})",
                settings.stmf.ha_enabled
            );
            Orchestrator::new(
                Arc::new(ZfsCli::new(runner.clone(), settings.decode.clone())),
                Arc::new(StmfCli::new(runner.clone(), settings.stmf.clone())),
                Arc::new(ItadmCli::new(runner)),
                context,
            )
        }
        Backend::Mock => {
            warn!("Using in-memory subsystems; no pool on this host is touched");
            let zfs = Arc::new(
                MockDatasetManager::with_pools(&["tank"]).with_rules(settings.decode.clone()),
            );
            Orchestrator::new(
                zfs.clone(),
                Arc::new(MockTargetFramework::new(zfs)),
                Arc::new(MockIscsiAdmin::new()),
                context,
            )
        }
    };

    let store = FileJobStore::open(&settings.job_dir).await.map_err(|e| {
        miette::miette!(
            "Failed to open job directory '{}': {}",
            settings.job_dir.display(),
            e
        )
    })?;
    let jobs = JobTracker::new(Arc::new(store));

    let state = AppState::new(Arc::new(orchestrator), Arc::new(jobs))
        .with_private_pools(settings.private_pools.clone());
    Ok(Arc::new(state))
}
