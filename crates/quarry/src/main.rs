//! Quarry agent entrypoint.
//!
//! Exit codes, one per fatal startup cause:
//!   1: another instance is already running
//!   2: configuration problem
//!   3: interrupted by the user
//!   4: scan run failed
//!   5: rule validation problem

use anyhow::Context;
use clap::Parser;
use quarry::config::{Config, Mode};
use quarry::dispatch::{DispatchConfig, Dispatcher};
use quarry::driver::{DriverConfig, ScanDriver};
use quarry::engine::{InProcessExecutor, ScanEngine};
use quarry::feed::FeedGenerator;
use quarry::fingerprint::compute_fingerprint;
use quarry::lock::InstanceLock;
use quarry::recorder::Recorder;
use quarry::source::PgArtifactSource;
use quarry::yara::{validate_rules, YaraCliEngine};
use quarry_db::ScanDb;
use quarry_logging::{init_logging, quarry_home, LogConfig};
use quarry_protocol::FeedInfo;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{error, info};

const EXIT_ALREADY_RUNNING: u8 = 1;
const EXIT_CONFIG: u8 = 2;
const EXIT_INTERRUPTED: u8 = 3;
const EXIT_SCAN_FAILED: u8 = 4;
const EXIT_RULE_VALIDATION: u8 = 5;

#[derive(Parser, Debug)]
#[command(name = "quarry", about = "Rule-based binary scan agent")]
struct Cli {
    /// Location of the config file
    #[arg(long)]
    config: PathBuf,

    /// Override the feed output path from the config
    #[arg(long)]
    output_file: Option<PathBuf>,

    /// ONLY validate the rules in the configured directory, then exit
    #[arg(long)]
    validate_rules: bool,

    /// Enable verbose logging on stderr
    #[arg(short, long)]
    verbose: bool,

    /// Override the log directory
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = init_logging(LogConfig {
        app_name: "quarry",
        verbose: cli.verbose,
        log_dir: cli.log_dir.clone(),
    }) {
        eprintln!("Failed to initialize logging: {err:#}");
        return ExitCode::from(EXIT_CONFIG);
    }

    let _lock = match InstanceLock::acquire(quarry_home().join("quarry.pid")) {
        Ok(lock) => lock,
        Err(err) => {
            error!("Only one instance of the agent may run at a time: {err}");
            return ExitCode::from(EXIT_ALREADY_RUNNING);
        }
    };

    let mut config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(err) => {
            error!("Unable to continue due to a configuration problem: {err:#}");
            return ExitCode::from(EXIT_CONFIG);
        }
    };
    if let Some(output) = cli.output_file {
        config.feed_output = output;
    }

    if cli.validate_rules {
        info!(rules_dir = %config.rules_dir.display(), "Validating rules");
        return match validate_rules(&config.yara_binary, &config.rules_dir).await {
            Ok(()) => {
                info!("All rules compiled successfully");
                ExitCode::SUCCESS
            }
            Err(err) => {
                error!("There were errors compiling rules: {err:#}");
                ExitCode::from(EXIT_RULE_VALIDATION)
            }
        };
    }

    if let Err(err) = validate_rules(&config.yara_binary, &config.rules_dir).await {
        error!("There were errors compiling rules: {err:#}");
        return ExitCode::from(EXIT_RULE_VALIDATION);
    }

    match run(config).await {
        Ok(interrupted) => {
            if interrupted {
                info!("Interrupted by user");
                ExitCode::from(EXIT_INTERRUPTED)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(err) => {
            error!("Scan run failed: {err:#}");
            ExitCode::from(EXIT_SCAN_FAILED)
        }
    }
}

/// Wire the components together and run one full pass. Returns whether
/// the run was interrupted.
async fn run(config: Config) -> anyhow::Result<bool> {
    let fingerprint =
        compute_fingerprint(&config.rules_dir).context("Failed to fingerprint rule set")?;
    info!(rules = fingerprint.len(), "Rule set fingerprinted");

    let db = ScanDb::open(config.database_path())
        .await
        .context("Failed to open record store")?;

    let feed = FeedGenerator::new(db.clone(), FeedInfo::default(), &config.feed_output);
    // Publish current state up front so a feed exists even if this run
    // finds nothing new.
    feed.regenerate()
        .await
        .context("Initial feed generation failed")?;

    let engine: Arc<dyn ScanEngine> = Arc::new(
        YaraCliEngine::new(&config.yara_binary, &config.rules_dir, &config.blob_dir)
            .context("Failed to load rule files")?,
    );
    let dispatcher = match config.mode {
        Mode::Local => Dispatcher::local(Arc::clone(&engine), DispatchConfig::default()),
        Mode::Remote => Dispatcher::distributed(
            Arc::clone(&engine),
            Arc::new(InProcessExecutor::new(Arc::clone(&engine))),
            DispatchConfig::default(),
        ),
    };

    let driver = ScanDriver::new(
        db.clone(),
        Arc::new(PgArtifactSource::new(&config.module_store_url)),
        dispatcher,
        Recorder::new(db.clone(), fingerprint.clone()),
        feed,
        fingerprint,
        DriverConfig::from(&config),
    );

    let shutdown = driver.shutdown_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown.store(true, Ordering::SeqCst);
        }
    });

    let summary = driver.run().await?;
    Ok(summary.interrupted)
}
