use ads_core::store::SledStore;
use ads_core::{Engine, IngestPaths, Stores};
use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Load ads, campaigns and synonyms into the ads store", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the ingestion pipeline: synonyms, then campaigns, then ads
    Ingest {
        /// Store directory
        #[arg(long, default_value = "./ads-db")]
        db: PathBuf,
        /// Synonyms file, one {"word", "synonyms"} record per line
        #[arg(long)]
        synonyms: PathBuf,
        /// Campaigns file, one {"campaign_id", "budget"} record per line
        #[arg(long)]
        campaigns: PathBuf,
        /// Ads file, one record per line between `[` and `]`
        #[arg(long)]
        ads: PathBuf,
        /// Wipe an existing store before ingesting
        #[arg(long, default_value_t = false)]
        reset: bool,
    },
    /// Resolve a query against an ingested store and print matching ads as JSON lines
    Search {
        #[arg(long, default_value = "./ads-db")]
        db: PathBuf,
        /// Free-text query
        #[arg(long)]
        q: String,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Ingest { db, synonyms, campaigns, ads, reset } => {
            ingest(db, IngestPaths { synonyms, campaigns, ads }, reset)
        }
        Commands::Search { db, q } => search(db, &q),
    }
}

fn ingest(db: PathBuf, paths: IngestPaths, reset: bool) -> Result<()> {
    let store = SledStore::open(&db)?;
    if !store.is_empty()? {
        if !reset {
            bail!("store at {} already holds data; pass --reset to rebuild it", db.display());
        }
        tracing::info!(db = %db.display(), "clearing existing store");
        store.clear()?;
    }

    let start = Instant::now();
    let engine = Engine::new(Stores::sled(&store));
    let report = engine.ingest_paths(&paths)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    tracing::info!(db = %db.display(), took_s = start.elapsed().as_secs_f64(), "ingestion complete");
    Ok(())
}

/// Opens a store that an earlier `ingest` populated; never creates one.
fn open_existing(db: &Path) -> Result<SledStore> {
    if !db.exists() {
        bail!("no store at {}; run `indexer ingest` first", db.display());
    }
    let store = SledStore::open(db)?;
    if store.is_empty()? {
        bail!("store at {} holds no data; run `indexer ingest` first", db.display());
    }
    Ok(store)
}

fn search(db: PathBuf, q: &str) -> Result<()> {
    let store = open_existing(&db)?;
    let engine = Engine::attach(Stores::sled(&store));
    let selection = engine.select_ads(q)?;
    for ad in &selection.ads {
        println!("{}", serde_json::to_string(ad)?);
    }
    for err in &selection.errors {
        tracing::warn!(error = %err, "results may be incomplete");
    }
    tracing::info!(query = q, hits = selection.ads.len(), "search complete");
    Ok(())
}
