use once_cell::sync::OnceCell;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

use super::types::CollisionPolicy;

// -----------------------------------------------------------------------------
// ----- Singleton -------------------------------------------------------------

static CAPTURE: OnceCell<CaptureConfig> = OnceCell::new();

// -----------------------------------------------------------------------------
// ----- Defaults --------------------------------------------------------------

const DEFAULT_BOUNDARY: &str = "--frame";
const DEFAULT_EXTENSION: &str = "jpg";
const DEFAULT_MAX_HEADER_LINES: usize = 64;
const DEFAULT_MAX_PAYLOAD_LEN: usize = 32 * 1024 * 1024;
const DEFAULT_MAX_LINE_LEN: usize = 16 * 1024;

// -----------------------------------------------------------------------------
// ----- CaptureConfig ---------------------------------------------------------

/// Wire-format and storage knobs, loaded from the optional `[capture]` table
/// of the TOML config file. Every field has a default matching the device
/// firmware, so running without a config file is the common case.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CaptureConfig {
    /// Marker line delimiting consecutive frames.
    pub boundary: String,

    /// Extension appended to labels that do not carry one.
    pub extension: String,

    pub on_collision: CollisionPolicy,

    /// Resynchronization guard: header blocks longer than this are skipped.
    pub max_header_lines: usize,

    /// Declared lengths above this are rejected as malformed, never honored.
    pub max_payload_len: usize,

    /// Cap on the line-assembly buffer for terminator-free streams.
    pub max_line_len: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            boundary: DEFAULT_BOUNDARY.to_string(),
            extension: DEFAULT_EXTENSION.to_string(),
            on_collision: CollisionPolicy::Overwrite,
            max_header_lines: DEFAULT_MAX_HEADER_LINES,
            max_payload_len: DEFAULT_MAX_PAYLOAD_LEN,
            max_line_len: DEFAULT_MAX_LINE_LEN,
        }
    }
}

// -----------------------------------------------------------------------------
// ----- CaptureConfig: Static -------------------------------------------------

impl CaptureConfig {
    /// Init: panic on any error. Do not continue with a bad state.
    pub async fn init(path: Option<&Path>) {
        let cfg = match path {
            Some(path) => Self::from_file_async(path).await.unwrap_or_else(|e| {
                panic!("failed to load capture config from {:?}: {e}", path)
            }),
            None => CaptureConfig::default(),
        };

        CAPTURE
            .set(cfg)
            .unwrap_or_else(|_| panic!("CaptureConfig::init called twice"));
    }

    pub fn snapshot() -> CaptureConfig {
        CAPTURE
            .get()
            .expect("capture config not initialized; call Config::init().await first")
            .clone()
    }
}

// -----------------------------------------------------------------------------
// ----- CaptureConfig: Private ------------------------------------------------

impl CaptureConfig {
    async fn from_file_async(path: &Path) -> Result<CaptureConfig, CaptureError> {
        let raw = fs::read_to_string(path)
            .await
            .map_err(|e| CaptureError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;
        Self::parse(&raw)
    }

    fn parse(raw: &str) -> Result<CaptureConfig, CaptureError> {
        let doc: CaptureFile = toml::from_str(raw)?;
        doc.capture.validate()?;
        Ok(doc.capture)
    }

    fn validate(&self) -> Result<(), CaptureError> {
        if self.boundary.trim().is_empty() {
            return Err(CaptureError::InvalidField("boundary must not be empty"));
        }
        if self.extension.is_empty() || self.extension.contains(['.', '/', '\\']) {
            return Err(CaptureError::InvalidField(
                "extension must be a bare suffix like \"jpg\"",
            ));
        }
        if self.max_line_len < self.boundary.len() + 2 {
            return Err(CaptureError::InvalidField(
                "max_line_len too small to hold a boundary line",
            ));
        }
        if self.max_header_lines < 2 {
            return Err(CaptureError::InvalidField(
                "max_header_lines must allow at least a label and a length",
            ));
        }
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// ----- Internal: On-disk format ----------------------------------------------

#[derive(Debug, Clone, Deserialize)]
struct CaptureFile {
    #[serde(default)]
    capture: CaptureConfig,
}

// -----------------------------------------------------------------------------
// ----- Error -----------------------------------------------------------------

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("{0}")]
    InvalidField(&'static str),
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let cfg = CaptureConfig::parse("").unwrap();
        assert_eq!(cfg.boundary, "--frame");
        assert_eq!(cfg.extension, "jpg");
        assert_eq!(cfg.on_collision, CollisionPolicy::Overwrite);
    }

    #[test]
    fn partial_table_keeps_other_defaults() {
        let cfg = CaptureConfig::parse(
            r#"
            [capture]
            boundary = "--cam0"
            on_collision = "rename"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.boundary, "--cam0");
        assert_eq!(cfg.on_collision, CollisionPolicy::Rename);
        assert_eq!(cfg.max_header_lines, DEFAULT_MAX_HEADER_LINES);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = CaptureConfig::parse("[capture]\nbondary = \"--x\"\n");
        assert!(err.is_err());
    }

    #[test]
    fn bad_collision_policy_is_rejected() {
        let err = CaptureConfig::parse("[capture]\non_collision = \"append\"\n");
        assert!(err.is_err());
    }

    #[test]
    fn empty_boundary_is_rejected() {
        let err = CaptureConfig::parse("[capture]\nboundary = \"  \"\n");
        assert!(matches!(err, Err(CaptureError::InvalidField(_))));
    }

    #[test]
    fn dotted_extension_is_rejected() {
        let err = CaptureConfig::parse("[capture]\nextension = \".jpg\"\n");
        assert!(matches!(err, Err(CaptureError::InvalidField(_))));
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
