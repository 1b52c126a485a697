use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use raingo_core::{Config, Error, NoopObserver, PipelineObserver, Service, StoreTier};
use tokio::fs;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod progress;

use progress::ProgressObserver;

/// Local store used when neither `--local` nor `RAINGO_LOCAL_STORE` names one.
const DEFAULT_LOCAL_STORE: &str = "raingo-local.jsonl";

#[derive(Parser, Debug)]
#[command(name = "raingo")]
#[command(about = "Hash password lists into a local store and resolve digests back to plaintext")]
struct Cli {
    /// Local JSONL store (overrides RAINGO_LOCAL_STORE; defaults to ./raingo-local.jsonl)
    #[arg(long, global = true)]
    local: Option<PathBuf>,

    /// Authoritative JSONL store (overrides RAINGO_AUTHORITATIVE_STORE)
    #[arg(long, global = true)]
    authoritative_store: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Hash every line of FILE with MD5, SHA1, SHA256 and RIPEMD-160
    Hash {
        file: PathBuf,

        /// Number of hashing workers
        #[arg(short = 'j', long)]
        workers: Option<usize>,

        /// Disable progress bar
        #[arg(long)]
        no_progress: bool,
    },
    /// Look up the plaintext behind one or more digests
    Resolve {
        #[arg(required = true)]
        digests: Vec<String>,
    },
    /// Print one page of stored records as JSON lines
    List {
        #[arg(long, default_value_t = 1)]
        page: usize,

        #[command(flatten)]
        tier: TierArg,
    },
    /// Print the number of stored records
    Count {
        #[command(flatten)]
        tier: TierArg,
    },
}

#[derive(Args, Debug)]
struct TierArg {
    /// Read the authoritative store instead of the local one
    #[arg(long)]
    authoritative: bool,
}

impl TierArg {
    fn tier(&self) -> StoreTier {
        if self.authoritative { StoreTier::Authoritative } else { StoreTier::Local }
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let mut config = with_store_paths(Config::from_env()?, cli.local, cli.authoritative_store);

    match cli.command {
        Command::Hash { file, workers, no_progress } => {
            if let Some(workers) = workers {
                config.workers = workers;
            }
            hash(config, file, !no_progress).await
        }
        Command::Resolve { digests } => {
            let service = Service::open(config, Arc::new(NoopObserver)).await?;
            for digest in &digests {
                println!("{digest}: {}", service.resolve_legacy(digest.trim()).await);
            }
            service.save_stats().await?;
            let stats = service.stats();
            let ratio = stats.success_ratio().unwrap_or(0.0);
            println!(
                "resolved {} / failed {} overall ({:.1}% success)",
                stats.success,
                stats.failure,
                ratio * 100.0
            );
            Ok(())
        }
        Command::List { page, tier } => {
            let service = Service::open(config, Arc::new(NoopObserver)).await?;
            for record in service.list_entries(page, tier.tier()).await? {
                println!("{}", serde_json::to_string(&record)?);
            }
            Ok(())
        }
        Command::Count { tier } => {
            let service = Service::open(config, Arc::new(NoopObserver)).await?;
            println!("{}", service.total_entries(tier.tier()).await?);
            Ok(())
        }
    }
}

/// Applies the store flags over `config`, falling back to [`DEFAULT_LOCAL_STORE`]
/// so hashed records and cached lookups outlive the process.
fn with_store_paths(
    mut config: Config,
    local: Option<PathBuf>,
    authoritative: Option<PathBuf>,
) -> Config {
    if let Some(path) = local {
        config.local_store = Some(path);
    }
    if config.local_store.is_none() {
        config.local_store = Some(PathBuf::from(DEFAULT_LOCAL_STORE));
    }
    if let Some(path) = authoritative {
        config.authoritative_store = Some(path);
    }
    config
}

async fn hash(config: Config, file: PathBuf, show_progress: bool) -> Result<(), Error> {
    let contents = fs::read_to_string(&file).await?;
    let plaintexts: Vec<String> = contents
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();

    info!(path = %file.display(), plaintexts = plaintexts.len(), "read wordlist");

    if plaintexts.is_empty() {
        println!("Nothing to hash - {:?} has no lines.", file);
        return Ok(());
    }

    println!(
        "Hashing {} plaintexts from {:?} using {} workers",
        plaintexts.len(),
        file,
        config.workers
    );

    let observer: Arc<dyn PipelineObserver> = Arc::new(ProgressObserver::new(show_progress));
    let service = Service::open(config, observer).await?;

    let handle = service.start_hashing(plaintexts);
    let cancel = handle.cancel_token();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, persisting what has been hashed so far");
            cancel.cancel();
        }
    });

    let summary = handle.wait().await?;
    ctrl_c.abort();

    println!(
        "{} plaintexts hashed, {} of {} records new{}",
        summary.processed,
        summary.drain.inserted,
        summary.drain.received,
        if summary.cancelled { " (cancelled)" } else { "" }
    );
    if summary.drain.failed_batches > 0 {
        eprintln!(
            "{} batches ({} records) could not be stored",
            summary.drain.failed_batches, summary.drain.dropped
        );
    }
    Ok(())
}
