mod terminal;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use url::Url;
use uutispuro_core::feed::WsTransport;
use uutispuro_core::{
    CacheProxy, ClickBeacon, ClientConfig, ClientRegistry, DiskCacheStore, FeedClient,
    HttpFetcher, PrecacheManifest, ProxyRequest, SharedContainer,
};

use crate::terminal::TerminalContainer;

#[derive(Debug, Parser)]
#[command(name = "uutispuro", about = "Offline cache and live feed for Uutispuro")]
struct Cli {
    /// Config file; defaults to ~/.config/uutispuro/config.json
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Site origin, overriding the configured one
    #[arg(long, global = true)]
    origin: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Install the current cache version: precache every manifest path
    Precache,
    /// Request a path through the caching proxy
    Fetch { path: String },
    /// Follow the live feed of a locale root page (/fi or /en)
    Watch {
        #[arg(default_value = "/fi")]
        page: String,
    },
    /// Record a click on a news item
    Click { id: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "uutispuro failed");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn load_config(cli: &Cli) -> ClientConfig {
    let mut config = match &cli.config {
        Some(path) => ClientConfig::from_file(path).unwrap_or_else(|err| {
            error!(error = %err, path = %path.display(), "invalid config file, using defaults");
            ClientConfig::default()
        }),
        None => ClientConfig::load(),
    };
    if let Some(origin) = &cli.origin {
        config.origin = origin.clone();
    }
    config
}

fn cache_dir() -> PathBuf {
    // Linux: ~/.config/uutispuro/cache
    let mut dir = ClientConfig::config_dir().unwrap_or_else(|_| std::env::temp_dir().join("uutispuro"));
    dir.push("cache");
    dir
}

async fn build_proxy(
    config: &ClientConfig,
    origin: Url,
) -> Result<CacheProxy<DiskCacheStore, HttpFetcher>, Box<dyn std::error::Error>> {
    let store = DiskCacheStore::open(cache_dir()).await?;
    let fetcher = HttpFetcher::from_config(&config.cache)?;
    Ok(CacheProxy::new(
        store,
        fetcher,
        config.cache.version.clone(),
        origin,
        PrecacheManifest::standard(),
    ))
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&cli);
    let origin = config.origin_url()?;

    match cli.command {
        Command::Precache => {
            let proxy = build_proxy(&config, origin).await?;
            let report = proxy.on_install().await?;
            let claimed = proxy.on_activate(&ClientRegistry::new()).await?;
            println!(
                "cached {} paths into {} (claimed {claimed} pages)",
                report.cached, report.bucket
            );
        }
        Command::Fetch { path } => {
            let proxy = build_proxy(&config, origin.clone()).await?;
            if !proxy.resume().await? {
                info!(bucket = %proxy.version(), "no installed cache, fetching from network");
            }
            let served = proxy.on_fetch(ProxyRequest::get(origin.join(&path)?)).await?;
            println!(
                "{} {:?} {} bytes",
                served.response.status,
                served.source,
                served.response.body.len()
            );
            served.revalidation.finished().await;
        }
        Command::Watch { page } => {
            let container = SharedContainer::new(TerminalContainer::new());
            let client = FeedClient::new(WsTransport, origin, container, &config.feed);
            let Some(handle) = client.start(&page)? else {
                println!("{page} has no live feed; use /fi or /en");
                return Ok(());
            };
            info!(url = %handle.url(), "watching live feed, ctrl-c to stop");
            tokio::signal::ctrl_c().await?;
            handle.stop().await?;
        }
        Command::Click { id } => {
            let client = reqwest::Client::builder()
                .user_agent(config.cache.user_agent.clone())
                .timeout(config.cache.request_timeout())
                .build()?;
            ClickBeacon::new(client, origin).track(&id).await?;
        }
    }

    Ok(())
}
