use clap::Parser;
use parking_lot::RwLock;
use std::{
    fs,
    path::{Path, PathBuf},
    sync::{Arc, OnceLock},
    time::Duration,
};

use super::types::LogLevel;
use crate::source::StreamUrl;

// -----------------------------------------------------------------------------
// ----- Global Singleton ------------------------------------------------------

static CLI_CONFIG: OnceLock<Arc<RwLock<CliConfig>>> = OnceLock::new();

// -----------------------------------------------------------------------------
// ----- CliConfig -------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct CliConfig {
    pub url: String,
    pub out_dir: PathBuf,
    pub log_level: LogLevel,
    pub config_file_location: Option<PathBuf>,
    pub read_timeout: Option<Duration>,
}

impl CliConfig {
    pub fn init() {
        CLI_CONFIG.get_or_init(|| {
            let cfg = Self::from_args();
            cfg.validate();
            Arc::new(RwLock::new(cfg))
        });
    }

    pub fn snapshot() -> CliConfig {
        handle().read().clone()
    }
}

// -----------------------------------------------------------------------------
// ----- CliConfig: Private ----------------------------------------------------

impl CliConfig {
    fn from_args() -> Self {
        let args = Args::try_parse().unwrap_or_else(|e| panic!("Invalid CLI/ENV: {e}"));

        Self {
            url: args.url,
            out_dir: args.out_dir,
            log_level: args.log_level,
            config_file_location: args.config_file,
            read_timeout: args.read_timeout,
        }
    }

    fn validate(&self) {
        // Fail before connecting, not at connect time with a vaguer error.
        if let Err(e) = StreamUrl::parse(&self.url) {
            panic!("invalid stream URL {:?}: {e}", self.url);
        }

        if let Some(path) = self.config_file_location.as_deref() {
            must_exist_file(path, "--config / framegrab.toml");
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Args ------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "framegrab", version, about = "Capture labeled frames from a device stream")]
struct Args {
    // Stream endpoint, e.g. http://192.168.4.1/stream. Required via CLI or ENV.
    #[arg(env = "FRAMEGRAB_URL", value_name = "URL")]
    url: String,

    // Where extracted frames land. Created if missing.
    #[arg(long = "out", short = 'o', env = "FRAMEGRAB_OUT", default_value = "frames")]
    out_dir: PathBuf,

    // Not required via CLI or ENV (defaults to info).
    #[arg(long = "log", default_value = "info")]
    log_level: LogLevel,

    // Optional; defaults apply when absent. Must exist when given.
    #[arg(long = "config", env = "FRAMEGRAB_CONFIG_FILE")]
    config_file: Option<PathBuf>,

    // Upper bound on a single payload read, e.g. "5s" or "500ms".
    #[arg(long = "read-timeout", env = "FRAMEGRAB_READ_TIMEOUT", value_parser = humantime::parse_duration)]
    read_timeout: Option<Duration>,
}

// -----------------------------------------------------------------------------
// ----- Private Utils ---------------------------------------------------------

fn handle() -> Arc<RwLock<CliConfig>> {
    CLI_CONFIG
        .get()
        .expect("config not initialized; call config::init().await first")
        .clone()
}

fn must_exist_file(path: &Path, hint: &str) {
    let md = fs::metadata(path).unwrap_or_else(|_| {
        panic!("required file missing: {} (from {hint})", path.display());
    });

    if !md.is_file() {
        panic!("path is not a file: {} (from {hint})", path.display());
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
