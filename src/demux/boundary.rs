use memchr::memmem;
use tokio::io::AsyncRead;
use tracing::debug;

use crate::source::{ByteSource, SourceError};

// -----------------------------------------------------------------------------
// ----- BoundaryScanner -------------------------------------------------------

/// Finds the next frame boundary in the stream.
///
/// Works on reassembled lines, not raw transport chunks, so a marker split
/// across two reads is still recognized once the line completes. Lines
/// without the marker are inter-frame noise (the trailing `\r\n` the device
/// writes after each payload, preamble, skipped payload bytes during
/// resynchronization) and are silently discarded.
pub struct BoundaryScanner {
    marker: Vec<u8>,
}

impl BoundaryScanner {
    pub fn new(marker: &str) -> Self {
        Self {
            marker: marker.as_bytes().to_vec(),
        }
    }

    /// Consume lines until one contains the marker (`true`) or the stream
    /// ends (`false`).
    pub async fn next_boundary<R: AsyncRead + Unpin>(
        &self,
        source: &mut ByteSource<R>,
    ) -> Result<bool, SourceError> {
        loop {
            match source.read_line().await {
                Ok(Some(line)) => {
                    if memmem::find(&line, &self.marker).is_some() {
                        return Ok(true);
                    }
                }
                Ok(None) => return Ok(false),
                // A terminator-free run (binary payload being skipped) is not
                // fatal; the discard already happened, keep scanning.
                Err(SourceError::LineTooLong(n)) => {
                    debug!("discarded {n} terminator-free bytes while scanning");
                }
                Err(e) => return Err(e),
            }
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn source(data: &[u8]) -> ByteSource<Cursor<Vec<u8>>> {
        ByteSource::new(Cursor::new(data.to_vec()), 64)
    }

    #[tokio::test]
    async fn finds_marker_and_skips_noise() {
        let scanner = BoundaryScanner::new("--frame");
        let mut src = source(b"\r\npreamble\r\n--frame\r\nX-Label:a\r\n");

        assert!(scanner.next_boundary(&mut src).await.unwrap());
        // cursor sits just past the boundary line
        assert_eq!(
            src.read_line().await.unwrap().unwrap().as_ref(),
            b"X-Label:a\r\n"
        );
    }

    #[tokio::test]
    async fn reports_end_of_stream() {
        let scanner = BoundaryScanner::new("--frame");
        let mut src = source(b"nothing here\r\nat all");

        assert!(!scanner.next_boundary(&mut src).await.unwrap());
    }

    #[tokio::test]
    async fn empty_stream_has_no_boundary() {
        let scanner = BoundaryScanner::new("--frame");
        let mut src = source(b"");

        assert!(!scanner.next_boundary(&mut src).await.unwrap());
    }

    #[tokio::test]
    async fn survives_oversized_garbage_runs() {
        let scanner = BoundaryScanner::new("--frame");

        let mut data = vec![0xFFu8; 300]; // no terminator for > max_line_len
        data.extend_from_slice(b"\n--frame\r\n");
        let mut src = ByteSource::new(Cursor::new(data), 64);

        assert!(scanner.next_boundary(&mut src).await.unwrap());
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
