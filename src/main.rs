use tokio::signal;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use framegrab::demux::{BoundaryScanner, HeaderParser};
use framegrab::sink::DirectorySink;
use framegrab::source::{StreamUrl, connect};
use framegrab::{Config, FrameExtractor};

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

const APP_NAME: &str = "framegrab";

// -----------------------------------------------------------------------------
// ----- Main ------------------------------------------------------------------

#[tokio::main]
async fn main() -> std::io::Result<()> {
    setup().await;
    run_session().await
}

// -----------------------------------------------------------------------------
// ----- Setup -----------------------------------------------------------------

async fn setup() {
    // This has to be the first thing we do, because it initializes the config
    Config::init().await;

    init_tracing();
}

fn init_tracing() {
    let config = Config::snapshot();
    let filter = EnvFilter::try_new(config.log_level.as_str()).unwrap();
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

// -----------------------------------------------------------------------------
// ----- Run -------------------------------------------------------------------

async fn run_session() -> std::io::Result<()> {
    let config = Config::snapshot();

    let url = StreamUrl::parse(&config.url).map_err(std::io::Error::other)?;

    info!("{} connecting to {}", APP_NAME, url);

    let connection = connect(&url, config.capture.max_line_len)
        .await
        .map_err(std::io::Error::other)?;

    // Prefer the boundary the device advertises in its Content-Type; fall
    // back to the configured marker when the response does not carry one.
    let marker = match connection.boundary {
        Some(advertised) => {
            info!("device advertises boundary {:?}", advertised);
            advertised
        }
        None => config.capture.boundary.clone(),
    };

    let sink = DirectorySink::create(&config.out_dir, config.capture.on_collision)
        .await
        .map_err(std::io::Error::other)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            warn!("{} interrupted; finishing current frame", APP_NAME);
            let _ = shutdown_tx.send(true);
        }
    });

    let scanner = BoundaryScanner::new(&marker);
    let parser = HeaderParser::new(
        config.capture.max_header_lines,
        config.capture.max_payload_len,
    );

    let mut extractor = FrameExtractor::new(connection.source, scanner, parser, sink, shutdown_rx)
        .with_default_extension(config.capture.extension.as_str());

    if let Some(limit) = config.read_timeout {
        extractor = extractor.with_read_timeout(limit);
    }

    let stats = extractor.run().await.map_err(std::io::Error::other)?;

    info!(
        "{} session complete: {} stored, {} skipped, {} store failures",
        APP_NAME, stats.frames_stored, stats.frames_skipped, stats.store_failures
    );

    Ok(())
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
