use std::path::{Path, PathBuf};
use tokio::fs;

use crate::config::CollisionPolicy;

use super::{FrameSink, SinkError};

// -----------------------------------------------------------------------------
// ----- DirectorySink ---------------------------------------------------------

/// Writes each frame to `<root>/<label>`.
///
/// The label is assumed sanitized by the caller; this type never joins raw
/// stream input into a path. Collisions follow the configured policy:
/// overwrite (the original tool's behavior) or rename with a numeric suffix.
pub struct DirectorySink {
    root: PathBuf,
    on_collision: CollisionPolicy,
}

// -----------------------------------------------------------------------------
// ----- DirectorySink: Static -------------------------------------------------

impl DirectorySink {
    /// Create the output directory up front so the first frame cannot fail
    /// on a missing parent mid-session.
    pub async fn create(
        root: impl Into<PathBuf>,
        on_collision: CollisionPolicy,
    ) -> Result<Self, SinkError> {
        let root = root.into();

        fs::create_dir_all(&root).await.map_err(|e| SinkError::Io {
            path: root.clone(),
            source: e,
        })?;

        Ok(Self { root, on_collision })
    }
}

// -----------------------------------------------------------------------------
// ----- DirectorySink: FrameSink ----------------------------------------------

impl FrameSink for DirectorySink {
    async fn store(&mut self, label: &str, payload: &[u8]) -> Result<PathBuf, SinkError> {
        let path = match self.on_collision {
            CollisionPolicy::Overwrite => self.root.join(label),
            CollisionPolicy::Rename => self.unused_path(label).await?,
        };

        fs::write(&path, payload).await.map_err(|e| SinkError::Io {
            path: path.clone(),
            source: e,
        })?;

        Ok(path)
    }
}

// -----------------------------------------------------------------------------
// ----- DirectorySink: Private ------------------------------------------------

impl DirectorySink {
    async fn unused_path(&self, label: &str) -> Result<PathBuf, SinkError> {
        let first = self.root.join(label);
        if !self.exists(&first).await? {
            return Ok(first);
        }

        let stem = Path::new(label)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(label);
        let ext = Path::new(label).extension().and_then(|s| s.to_str());

        let mut n = 1u32;
        loop {
            let candidate = match ext {
                Some(ext) => format!("{stem}-{n}.{ext}"),
                None => format!("{stem}-{n}"),
            };

            let path = self.root.join(candidate);
            if !self.exists(&path).await? {
                return Ok(path);
            }
            n += 1;
        }
    }

    async fn exists(&self, path: &Path) -> Result<bool, SinkError> {
        fs::try_exists(path).await.map_err(|e| SinkError::Io {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
