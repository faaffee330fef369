use std::sync::Arc;

use anyhow::{Context, Result};
use ride::RideManager;
use ride::ticker::run_ticker;
use ridetrack::http::{self, AppState, FeedSender};
use ridetrack::messaging::run_feed;
use ridetrack::{AppContext, Config, LogPublisher};
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry, fmt};

const FEED_BUFFER: usize = 64;

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    Registry::default().with(filter).with(fmt::layer()).init();

    let ride_config = ride::Config::from_env();
    let config = Config::from_env();

    let context = AppContext::new(&ride_config, &config, LogPublisher);
    let manager = Arc::new(RideManager::new(ride_config.thresholds, context));
    let (shutdown, shutdown_rx) = watch::channel(false);

    let ticker = tokio::spawn({
        let manager = Arc::clone(&manager);
        let mut shutdown_rx = shutdown_rx;
        let period = ride_config.inactivity_check_interval;
        async move {
            run_ticker(&manager, period, async move {
                let _ = shutdown_rx.changed().await;
            })
            .await;
        }
    });

    // shadow documents arrive one per line on stdin, plus the test endpoint
    let (feed_tx, mut feed_rx) = mpsc::channel(FEED_BUFFER);
    tokio::spawn(read_stdin(feed_tx.clone()));
    tokio::spawn({
        let manager = Arc::clone(&manager);
        async move {
            let feed = futures::stream::poll_fn(move |cx| feed_rx.poll_recv(cx));
            run_feed(&manager, feed).await;
        }
    });

    let feed = config.test_mode.then_some(feed_tx);
    let app = http::router(AppState { manager, feed });

    let listener = TcpListener::bind(&config.server_address)
        .await
        .with_context(|| format!("binding {}", config.server_address))?;
    info!(address = %config.server_address, test_mode = config.test_mode, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                error!(error = %err, "failed to listen for shutdown signal");
            }
            info!("shutting down");
        })
        .await
        .context("serving http")?;

    let _ = shutdown.send(true);
    ticker.await.context("joining inactivity ticker")?;
    info!("stopped");

    // the stdin read is blocking and would hold runtime shutdown until the next line
    std::process::exit(0)
}

async fn read_stdin(feed: FeedSender) {
    let mut lines = BufReader::new(io::stdin()).lines();
    loop {
        let item = match lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => continue,
            Ok(Some(line)) => Ok(line.into_bytes()),
            Ok(None) => break,
            Err(err) => Err(err),
        };
        let failed = item.is_err();
        if feed.send(item).await.is_err() || failed {
            break;
        }
    }
    info!("stdin feed closed");
}
