use parking_lot::RwLock;
use std::{
    path::PathBuf,
    sync::{Arc, OnceLock},
    time::Duration,
};

use super::{capture::CaptureConfig, cli::CliConfig, types::LogLevel};

// -----------------------------------------------------------------------------
// ----- Global Singleton ------------------------------------------------------

static ROOT_CONFIG: OnceLock<Arc<RwLock<Config>>> = OnceLock::new();

// -----------------------------------------------------------------------------
// ----- Config ----------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct Config {
    pub url: String,
    pub out_dir: PathBuf,
    pub log_level: LogLevel,
    pub read_timeout: Option<Duration>,
    pub capture: CaptureConfig,
}

// -----------------------------------------------------------------------------
// ----- Config: Static --------------------------------------------------------

impl Config {
    /// Async because CaptureConfig::init() is async (non-blocking IO).
    pub async fn init() {
        CliConfig::init();

        let cli = CliConfig::snapshot();
        CaptureConfig::init(cli.config_file_location.as_deref()).await;

        Self::load();
    }

    pub fn snapshot() -> Config {
        Self::handle().read().clone()
    }
}

// -----------------------------------------------------------------------------
// ----- Config: Private -------------------------------------------------------

impl Config {
    fn load() {
        let cli = CliConfig::snapshot();
        let capture = CaptureConfig::snapshot();

        let next = Config {
            url: cli.url,
            out_dir: cli.out_dir,
            log_level: cli.log_level,
            read_timeout: cli.read_timeout,
            capture,
        };

        if let Some(handle) = ROOT_CONFIG.get() {
            *handle.write() = next;
        } else {
            let _ = ROOT_CONFIG.set(Arc::new(RwLock::new(next)));
        }
    }

    fn handle() -> Arc<RwLock<Config>> {
        ROOT_CONFIG
            .get()
            .expect("Config not initialized; call Config::init().await first")
            .clone()
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
