use ads_core::store::SledStore;
use ads_core::{Engine, IngestPaths, Stores};
use anyhow::{bail, Result};
use axum::Router;
use clap::Parser;
use server::{build_app, AppState, Templates};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
struct Args {
    /// Store directory
    #[arg(long, default_value = "./ads-db")]
    db: PathBuf,
    /// Synonyms file; with --campaigns and --ads, ingest at startup
    #[arg(long)]
    synonyms: Option<PathBuf>,
    /// Campaigns file
    #[arg(long)]
    campaigns: Option<PathBuf>,
    /// Ads file
    #[arg(long)]
    ads: Option<PathBuf>,
    /// Wipe a non-empty store before startup ingestion
    #[arg(long, default_value_t = false)]
    reset: bool,
    /// Results page template containing `$list$`
    #[arg(long)]
    ui_template: Option<PathBuf>,
    /// Per-ad template containing `$title$` and friends
    #[arg(long)]
    ad_template: Option<PathBuf>,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,
    /// Per-query time budget in milliseconds (0 = unbounded)
    #[arg(long, default_value_t = 2000)]
    query_timeout_ms: u64,
}

fn open_engine(args: &Args) -> Result<Engine> {
    let store = SledStore::open(&args.db)?;
    let stores = Stores::sled(&store);
    match (&args.synonyms, &args.campaigns, &args.ads) {
        (Some(synonyms), Some(campaigns), Some(ads)) => {
            if !store.is_empty()? {
                if !args.reset {
                    bail!("store at {} already holds data; pass --reset to rebuild it", args.db.display());
                }
                store.clear()?;
            }
            let engine = Engine::new(stores);
            let paths = IngestPaths { synonyms: synonyms.clone(), campaigns: campaigns.clone(), ads: ads.clone() };
            engine.ingest_paths(&paths)?;
            Ok(engine)
        }
        (None, None, None) => {
            tracing::info!(db = %args.db.display(), "serving existing store");
            Ok(Engine::attach(stores))
        }
        _ => bail!("--synonyms, --campaigns and --ads must be given together"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();

    let engine = open_engine(&args)?;
    let templates = Templates::load(args.ui_template.as_deref(), args.ad_template.as_deref())?;
    let query_timeout = (args.query_timeout_ms > 0).then(|| Duration::from_millis(args.query_timeout_ms));
    let state = AppState { engine: Arc::new(engine), templates: Arc::new(templates), query_timeout };
    let app: Router = build_app(state);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
