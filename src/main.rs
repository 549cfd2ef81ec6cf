use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn};

use orbitrack::feed;
use orbitrack::geo::{GmstRotation, NominatimClient};
use orbitrack::manager::SystemProfile;
use orbitrack::server::{self, ApiContext};
use orbitrack::{IngestPipeline, MemoryStore, QueryEngine};

#[derive(Parser, Clone, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Bind address for the HTTP API.
    #[clap(long, default_value = "0.0.0.0:8080")]
    addr: SocketAddr,

    /// Upstream ephemeris feed (CCSDS OEM XML).
    #[clap(long, default_value = feed::DEFAULT_FEED_URL)]
    feed_url: String,

    /// Reverse geocoder endpoint.
    #[clap(long, default_value = NominatimClient::DEFAULT_ENDPOINT)]
    geocoder_url: String,

    /// Per-request timeout for upstream HTTP calls, seconds.
    #[clap(long, default_value = "10")]
    http_timeout: u64,

    /// Start without contacting the upstream feed (store stays empty).
    #[clap(long)]
    skip_fetch: bool,
}

fn main() {
    let profile = SystemProfile::detect();

    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(profile.worker_threads)
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
        .block_on(async_main(profile));
}

async fn async_main(profile: SystemProfile) {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info,orbitrack=info");
    }
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    let args = Args::parse();
    info!(
        cores = profile.logical_cores,
        workers = profile.worker_threads,
        "starting orbitrack"
    );

    let store = Arc::new(MemoryStore::new());
    let pipeline = IngestPipeline::new(store.clone());
    let timeout = Duration::from_secs(args.http_timeout);

    if args.skip_fetch {
        warn!("--skip-fetch set, serving an empty store");
    } else {
        // One writer phase before any query is served. A failed fetch or
        // parse leaves the store empty and queries answering 503; the
        // process still comes up so the deployment can be probed.
        match fetch_and_ingest(&pipeline, &args.feed_url, timeout).await {
            Ok(count) => info!(count, "ephemeris ingested"),
            Err(e) => error!("ingest failed, store stays empty: {e}"),
        }
    }

    let geocoder = match NominatimClient::new(&args.geocoder_url, timeout) {
        Ok(client) => Some(Arc::new(client)),
        Err(e) => {
            warn!("geocoder client unavailable, addresses degrade to Unknown: {e}");
            None
        }
    };

    let ctx = ApiContext {
        engine: Arc::new(QueryEngine::new(store, Arc::new(GmstRotation))),
        geocoder,
    };

    let addr = args.addr;
    tokio::spawn(async move {
        server::run(ctx, addr).await;
    });

    tokio::signal::ctrl_c()
        .await
        .expect("failed to listen for shutdown signal");
    info!("shutting down");
}

async fn fetch_and_ingest(
    pipeline: &IngestPipeline,
    url: &str,
    timeout: Duration,
) -> Result<usize, orbitrack::IngestError> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| orbitrack::IngestError::Upstream(e.to_string()))?;

    let body = feed::fetch_feed(&client, url).await?;
    let batch = feed::parse_feed(&body)?;
    pipeline.ingest(batch)
}
