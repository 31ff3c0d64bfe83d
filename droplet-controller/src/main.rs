//! droplet-controller: keeps one Droplet record in sync with DigitalOcean.
//!
//! The record is a JSON file. Every resync tick the controller runs one
//! reconciliation pass over it and writes it back, until the droplet was
//! deleted or orphaned.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use droplet_controller::clients::droplets::{DEFAULT_API_ENDPOINT, DEFAULT_REQUEST_TIMEOUT};
use droplet_controller::clients::DoClientFactory;
use droplet_controller::credentials::{CredentialSource, DirectoryCredentials, EnvCredentials};
use droplet_controller::store::FileStore;
use droplet_controller::{reconcile_once, DropletConnector, PassOutcome};

/// Droplet controller
#[derive(Parser, Debug)]
#[command(name = "droplet-controller", version, about)]
struct Args {
    /// Path to the Droplet record (JSON)
    #[arg(long)]
    record: PathBuf,

    /// Provider API endpoint
    #[arg(long, default_value = DEFAULT_API_ENDPOINT)]
    api_endpoint: String,

    /// Environment variable holding the API token
    #[arg(long, default_value = "DIGITALOCEAN_TOKEN")]
    token_env: String,

    /// Directory with one token file per provider config (overrides --token-env)
    #[arg(long)]
    credentials_dir: Option<PathBuf>,

    /// Resync interval in seconds
    #[arg(long, default_value = "60")]
    resync_interval: u64,

    /// Provider request timeout in seconds
    #[arg(long, default_value_t = DEFAULT_REQUEST_TIMEOUT.as_secs())]
    request_timeout: u64,

    /// Run a single pass and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "droplet_controller=info,reqwest=warn,hyper=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let store = Arc::new(FileStore::new(&args.record));
    let name = store
        .load()
        .await
        .with_context(|| format!("Failed to read record {}", args.record.display()))?
        .metadata
        .name;

    let credentials: Arc<dyn CredentialSource> = match &args.credentials_dir {
        Some(dir) => Arc::new(DirectoryCredentials::new(dir)),
        None => Arc::new(EnvCredentials::new(&args.token_env)),
    };
    let clients = Arc::new(
        DoClientFactory::new(&args.api_endpoint, Duration::from_secs(args.request_timeout))
            .context("Failed to build HTTP client")?,
    );
    let connector = DropletConnector::new(credentials, clients, store.clone());

    info!("Starting droplet-controller for {}", name);
    info!("API endpoint: {}", args.api_endpoint);

    let mut ticker = tokio::time::interval(Duration::from_secs(args.resync_interval.max(1)));
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping");
                break;
            }
        }

        match reconcile_once(&connector, store.as_ref(), &name).await {
            Ok(PassOutcome::Deleted) | Ok(PassOutcome::Orphaned) => {
                info!("Droplet {} released, stopping", name);
                break;
            }
            Ok(_) => {}
            Err(e) => error!("Pass failed: {}. Retrying in {}s", e, args.resync_interval),
        }

        if args.once {
            break;
        }
    }

    Ok(())
}
