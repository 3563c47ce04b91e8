use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use solana_version_notifier::alert::sinks_from_config;
use solana_version_notifier::config::{Config, ConfigOverrides};
use solana_version_notifier::monitor::Monitor;
use solana_version_notifier::output::{render_json, render_records_table};
use solana_version_notifier::state::{NotificationStore, RecordKey, RecordKind, StoredRecord};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "solana-version-notifier",
    about = "Notify once about new Solana cluster versions, program deploys and GitHub tags"
)]
struct Cli {
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[arg(long)]
    db: Option<String>,
    #[arg(long = "slack-webhook", env = "NEON_SLACK_CHANNEL", hide_env_values = true)]
    slack_webhook: Option<String>,
    #[arg(long = "github-token", env = "GITHUB_TOKEN", hide_env_values = true)]
    github_token: Option<String>,
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Poll every source, then send pending notifications
    Check {
        #[arg(long)]
        kind: Vec<RecordKind>,
    },
    /// Poll sources and record observations without notifying
    Poll {
        #[arg(long)]
        kind: Vec<RecordKind>,
    },
    /// Send pending notifications without polling
    Notify {
        #[arg(long)]
        kind: Vec<RecordKind>,
    },
    /// Show records that have not been notified yet
    Pending {
        #[arg(long)]
        kind: Vec<RecordKind>,
    },
    /// Show every stored record
    List {
        #[arg(long)]
        kind: Vec<RecordKind>,
    },
    /// Mark one record notified without sending anything
    Mark {
        #[arg(long)]
        kind: RecordKind,
        /// Repo or program name (github, program)
        #[arg(long)]
        name: Option<String>,
        /// Release or tag (solana, github)
        #[arg(long)]
        version: Option<String>,
        /// Cluster (solana, program)
        #[arg(long)]
        cluster: Option<String>,
    },
    /// Repeat `check` on a timer
    Watch {
        #[arg(long)]
        interval_secs: Option<u64>,
        /// 0 runs until interrupted
        #[arg(long, default_value_t = 0)]
        iterations: u32,
    },
    Config {
        #[arg(long)]
        init: bool,
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load(Some(&config_path))?;
    config.apply_overrides(ConfigOverrides {
        db_path: cli.db.clone(),
        slack_webhook: cli.slack_webhook.clone(),
        github_token: cli.github_token.clone(),
    });

    if let Commands::Config { init, show } = &cli.command {
        return handle_config_command(*init, *show, &config, &config_path);
    }

    let db_path = config.resolved_db_path();
    let store = Arc::new(
        NotificationStore::open(&db_path, &config.store_options())
            .with_context(|| format!("failed opening state store: {}", db_path.display()))?,
    );
    let monitor = Monitor::from_config(&config, Arc::clone(&store));
    let sinks = sinks_from_config(&config);

    match &cli.command {
        Commands::Check { kind } => {
            let (polled, sent) = monitor.check(&selected_kinds(kind), &sinks).await?;
            info!(
                "observed {}, new {}, upstream failures {}, notified {}, failed {}",
                polled.observed,
                polled.new,
                polled.failures.len(),
                sent.sent,
                sent.failed
            );
        }
        Commands::Poll { kind } => {
            let polled = monitor.poll(&selected_kinds(kind)).await?;
            match cli.output {
                OutputFormat::Table => println!(
                    "observed {}, new {}, upstream failures {}",
                    polled.observed,
                    polled.new,
                    polled.failures.len()
                ),
                OutputFormat::Json => println!("{}", render_json(&polled)?),
            }
        }
        Commands::Notify { kind } => {
            let sent = monitor.notify(&selected_kinds(kind), &sinks).await?;
            info!("notified {}, failed {}", sent.sent, sent.failed);
        }
        Commands::Pending { kind } => {
            let mut records = Vec::new();
            for kind in selected_kinds(kind) {
                for record in store.pending_unnotified(kind) {
                    records.push(record?);
                }
            }
            print_records(&records, cli.output)?;
        }
        Commands::List { kind } => {
            let mut records = Vec::new();
            for kind in selected_kinds(kind) {
                records.extend(store.list(kind)?);
            }
            print_records(&records, cli.output)?;
        }
        Commands::Mark {
            kind,
            name,
            version,
            cluster,
        } => {
            let record_key = mark_key(
                *kind,
                name.as_deref(),
                version.as_deref(),
                cluster.as_deref(),
            )?;
            store.mark_notified(&record_key)?;
            println!("marked {record_key} notified");
        }
        Commands::Watch {
            interval_secs,
            iterations,
        } => {
            let interval = interval_secs.unwrap_or(config.watch.interval_secs);
            run_watch_loop(&monitor, &sinks, interval, *iterations).await?;
        }
        Commands::Config { .. } => unreachable!("config command handled before dispatch"),
    }

    drop(monitor);
    match Arc::try_unwrap(store) {
        Ok(store) => store.close()?,
        Err(_) => warn!("state store still shared at shutdown, skipping explicit close"),
    }
    Ok(())
}

fn handle_config_command(
    init: bool,
    show: bool,
    config: &Config,
    config_path: &PathBuf,
) -> Result<()> {
    if init {
        if config_path.exists() {
            return Err(anyhow!(
                "config already exists at {}, refusing to overwrite",
                config_path.display()
            ));
        }
        Config::write_template(config_path)?;
        println!("Wrote config template to {}", config_path.display());
    }
    if show || !init {
        println!("{}", render_json(config)?);
    }
    Ok(())
}

fn mark_key(
    kind: RecordKind,
    name: Option<&str>,
    version: Option<&str>,
    cluster: Option<&str>,
) -> Result<RecordKey> {
    let require = |value: Option<&str>, flag: &str| {
        value
            .map(str::to_string)
            .ok_or_else(|| anyhow!("--{flag} is required to mark {kind} records"))
    };
    let key = match kind {
        RecordKind::SolanaCluster => {
            RecordKey::solana_cluster(require(version, "version")?, require(cluster, "cluster")?)
        }
        RecordKind::GithubVersion => {
            RecordKey::github_version(require(name, "name")?, require(version, "version")?)
        }
        RecordKind::Program => {
            RecordKey::program(require(name, "name")?, require(cluster, "cluster")?)
        }
    };
    Ok(key)
}

fn selected_kinds(requested: &[RecordKind]) -> Vec<RecordKind> {
    if requested.is_empty() {
        return RecordKind::ALL.to_vec();
    }
    let mut kinds = requested.to_vec();
    kinds.sort();
    kinds.dedup();
    kinds
}

async fn run_watch_loop(
    monitor: &Monitor,
    sinks: &[Box<dyn solana_version_notifier::alert::AlertSink>],
    interval_secs: u64,
    iterations: u32,
) -> Result<()> {
    let interval = Duration::from_secs(interval_secs.max(1));
    let mut round: u32 = 0;
    loop {
        round += 1;
        info!("watch iteration {round}");
        match monitor.check(&RecordKind::ALL, sinks).await {
            Ok((polled, sent)) => info!(
                "observed {}, new {}, notified {}, failed {}",
                polled.observed, polled.new, sent.sent, sent.failed
            ),
            Err(err) => return Err(err.context(format!("watch iteration {round} failed"))),
        }
        if iterations != 0 && round >= iterations {
            return Ok(());
        }
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, stopping watch");
                return Ok(());
            }
        }
    }
}

fn print_records(records: &[StoredRecord], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", render_records_table(records)),
        OutputFormat::Json => println!("{}", render_json(records)?),
    }
    Ok(())
}
