mod assembler;
mod collectors;
mod config;
mod context;
mod host;
mod probe;
mod report;
mod snapshot;

use assembler::Assembler;
use clap::Parser;
use collectors::DomainCollector;
use config::{Config, ConfigError};
use context::RunContext;
use host::LocalHost;
use report::{PersistenceError, ReportWriter};
use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const EXIT_PERSISTENCE: u8 = 1;
const EXIT_CONFIG: u8 = 2;
const EXIT_INTERRUPTED: i32 = 130;
// Timed-out domains leave their blocking workers behind; don't wait on them.
const RUNTIME_SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

#[derive(Parser, Debug)]
#[command(name = "hostsnap")]
#[command(version)]
#[command(about = "Collect a one-shot health snapshot of this machine")]
struct Cli {
    /// Config file; defaults to ./hostsnap.yaml when present.
    #[arg(long)]
    config: Option<String>,
    #[arg(long)]
    output_dir: Option<PathBuf>,
    /// Run all domain collectors at once.
    #[arg(long)]
    parallel: bool,
    #[arg(long)]
    print_default_config: bool,
}

fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();
    if cli.print_default_config {
        println!("{}", Config::example_yaml());
        return ExitCode::SUCCESS;
    }

    let cfg = match load_config(&cli) {
        Ok(cfg) => cfg,
        Err(err) => {
            error!(error = %err, "failed to load configuration");
            return ExitCode::from(EXIT_CONFIG);
        }
    };
    let collectors = match collectors::build(&cfg) {
        Ok(collectors) => collectors,
        Err(err) => {
            error!(error = %err, "failed to prepare collectors");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    info!(
        output_dir = %cfg.output_dir.display(),
        domains = cfg.domains.len(),
        timeout_secs = cfg.domain_timeout_secs,
        parallel = cfg.parallel,
        "starting hostsnap"
    );

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            error!(error = %err, "failed to start async runtime");
            return ExitCode::FAILURE;
        }
    };
    let outcome = runtime.block_on(run(cfg, collectors));
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_GRACE);

    match outcome {
        Ok(path) => {
            info!(path = %path.display(), "snapshot saved");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "failed to persist snapshot");
            ExitCode::from(EXIT_PERSISTENCE)
        }
    }
}

fn load_config(cli: &Cli) -> Result<Config, ConfigError> {
    let mut cfg = Config::resolve(cli.config.as_deref())?;
    if let Some(dir) = &cli.output_dir {
        cfg.output_dir = dir.clone();
    }
    if cli.parallel {
        cfg.parallel = true;
    }
    cfg.validate()?;
    Ok(cfg)
}

async fn run(
    cfg: Config,
    collectors: Vec<Arc<dyn DomainCollector>>,
) -> Result<PathBuf, PersistenceError> {
    let ctx = Arc::new(RunContext::new(&cfg, SystemTime::now()));
    let mut writer = ReportWriter::open(&ctx)?;
    info!(stem = writer.stem(), "report files claimed");

    let (cancel_tx, cancel_rx) = watch::channel(false);
    let ctrl_c = tokio::spawn(async move {
        if escalate_interrupts(tokio::signal::ctrl_c, cancel_tx).await {
            warn!("second Ctrl+C received, aborting without a report");
            std::process::exit(EXIT_INTERRUPTED);
        }
    });

    let assembler = Assembler::new(Arc::new(LocalHost::new()), collectors);
    let snapshot = assembler.assemble(ctx, &cancel_rx, &mut writer).await;
    ctrl_c.abort();

    writer.finish(&snapshot)
}

/// Flips `cancel` on the first interrupt. Resolves `true` on a second one,
/// `false` if the listener itself fails.
async fn escalate_interrupts<F, Fut>(mut interrupt: F, cancel: watch::Sender<bool>) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<()>>,
{
    if let Err(err) = interrupt().await {
        error!(error = %err, "failed to listen for Ctrl+C");
        return false;
    }
    info!("Ctrl+C received, stopping after the current domain; press again to abort");
    let _ = cancel.send(true);
    interrupt().await.is_ok()
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
