// sink/mod.rs
//! Frame persistence. The extractor only sees the [`FrameSink`] trait; the
//! directory implementation lives in [`dir_sink`].

use std::path::PathBuf;
use thiserror::Error;

pub mod dir_sink;

pub use dir_sink::DirectorySink;

// -----------------------------------------------------------------------------
// ----- FrameSink -------------------------------------------------------------

/// Persists one frame under an already-sanitized name.
///
/// Failures are per-frame: the caller logs them and moves on to the next
/// boundary, a lost frame never ends the capture session.
pub trait FrameSink {
    fn store(
        &mut self,
        label: &str,
        payload: &[u8],
    ) -> impl std::future::Future<Output = Result<PathBuf, SinkError>> + Send;
}

// -----------------------------------------------------------------------------
// ----- Error -----------------------------------------------------------------

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("storage failed at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
