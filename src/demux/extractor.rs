use std::time::Duration;

use thiserror::Error;
use tokio::io::AsyncRead;
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::sink::FrameSink;
use crate::source::{ByteSource, SourceError};

use super::boundary::BoundaryScanner;
use super::frame::{Frame, sanitize_label};
use super::header::{Header, HeaderError, HeaderParser};

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

const DEFAULT_EXTENSION: &str = "jpg";

// -----------------------------------------------------------------------------
// ----- FrameExtractor --------------------------------------------------------

/// The demultiplexer state machine.
///
/// Repeats boundary → header → exactly-`declared_len` payload bytes → sink,
/// until the stream ends or the transport fails. Per-frame failures (bad
/// header, truncated payload, storage error) are logged and counted; they
/// never abort the session and never leave the cursor mid-payload: every
/// frame attempt ends either right after a skipped header block or after
/// exactly the declared number of payload bytes.
pub struct FrameExtractor<R, S> {
    source: ByteSource<R>,
    scanner: BoundaryScanner,
    parser: HeaderParser,
    sink: S,
    shutdown: watch::Receiver<bool>,

    default_extension: String,
    read_timeout: Option<Duration>,

    stats: SessionStats,
}

// -----------------------------------------------------------------------------
// ----- FrameExtractor: Sub Structs -------------------------------------------

enum ExtractorState {
    AwaitingBoundary,
    AwaitingHeader,
    AwaitingPayload(Header),
    FrameReady(Frame),
    Closed,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub frames_stored: u64,
    pub frames_skipped: u64,
    pub store_failures: u64,
    pub bytes_discarded: u64,
}

// -----------------------------------------------------------------------------
// ----- FrameExtractor: Static ------------------------------------------------

impl<R, S> FrameExtractor<R, S> {
    pub fn new(
        source: ByteSource<R>,
        scanner: BoundaryScanner,
        parser: HeaderParser,
        sink: S,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            source,
            scanner,
            parser,
            sink,
            shutdown,
            default_extension: DEFAULT_EXTENSION.to_string(),
            read_timeout: None,
            stats: SessionStats::default(),
        }
    }

    pub fn with_default_extension(mut self, ext: impl Into<String>) -> Self {
        self.default_extension = ext.into();
        self
    }

    /// Bound a single payload read. On expiry the partial frame is dropped
    /// and scanning resumes at the next boundary; without a bound a stalled
    /// device holds the session in `AwaitingPayload` forever.
    pub fn with_read_timeout(mut self, limit: Duration) -> Self {
        self.read_timeout = Some(limit);
        self
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}

// -----------------------------------------------------------------------------
// ----- FrameExtractor: Public ------------------------------------------------

impl<R: AsyncRead + Unpin, S: FrameSink> FrameExtractor<R, S> {
    /// Run until clean stream end, shutdown, or transport failure.
    pub async fn run(&mut self) -> Result<SessionStats, SessionError> {
        let mut state = ExtractorState::AwaitingBoundary;

        loop {
            state = match state {
                ExtractorState::AwaitingBoundary => self.await_boundary().await?,
                ExtractorState::AwaitingHeader => self.await_header().await?,
                ExtractorState::AwaitingPayload(header) => self.await_payload(header).await?,
                ExtractorState::FrameReady(frame) => self.deliver(frame).await?,
                ExtractorState::Closed => break,
            };
        }

        Ok(self.stats.clone())
    }
}

// -----------------------------------------------------------------------------
// ----- FrameExtractor: Private -----------------------------------------------

impl<R: AsyncRead + Unpin, S: FrameSink> FrameExtractor<R, S> {
    /// The cancellation point: checked once per frame, before scanning.
    async fn await_boundary(&mut self) -> Result<ExtractorState, SessionError> {
        if *self.shutdown.borrow() {
            info!("shutdown requested; closing stream");
            self.source.close();
            return Ok(ExtractorState::Closed);
        }

        match self.scanner.next_boundary(&mut self.source).await? {
            true => Ok(ExtractorState::AwaitingHeader),
            false => {
                debug!("stream ended while scanning for a boundary");
                Ok(ExtractorState::Closed)
            }
        }
    }

    async fn await_header(&mut self) -> Result<ExtractorState, SessionError> {
        match self.parser.parse(&mut self.source).await {
            Ok(header) => Ok(ExtractorState::AwaitingPayload(header)),

            Err(HeaderError::Source(e)) => Err(e.into()),

            Err(HeaderError::UnexpectedEof) => {
                warn!("stream ended inside a header block");
                self.stats.frames_skipped += 1;
                Ok(ExtractorState::Closed)
            }

            // Malformed block: skip this frame, resynchronize at the next
            // boundary. One corrupt frame must not end a capture session.
            Err(e) => {
                warn!("skipping frame: {e}");
                self.stats.frames_skipped += 1;
                Ok(ExtractorState::AwaitingBoundary)
            }
        }
    }

    async fn await_payload(&mut self, header: Header) -> Result<ExtractorState, SessionError> {
        let declared = header.declared_len;

        let result = if let Some(limit) = self.read_timeout {
            match timeout(limit, self.source.read_exact(declared)).await {
                Ok(result) => result,
                Err(_elapsed) => {
                    warn!(
                        "payload read for {:?} timed out ({declared} bytes declared); resynchronizing",
                        header.label
                    );
                    self.stats.frames_skipped += 1;
                    return Ok(ExtractorState::AwaitingBoundary);
                }
            }
        } else {
            self.source.read_exact(declared).await
        };

        match result {
            Ok(payload) => Ok(ExtractorState::FrameReady(Frame {
                label: header.label,
                payload,
            })),

            Err(SourceError::StreamEnded { expected, received }) => {
                warn!("truncated frame {:?}: {received} of {expected} payload bytes", header.label);
                self.stats.frames_skipped += 1;
                self.stats.bytes_discarded += received as u64;
                Ok(ExtractorState::Closed)
            }

            Err(e) => Err(e.into()),
        }
    }

    /// Store synchronously before scanning on: strict ordering, and no two
    /// writes ever race on a colliding label.
    async fn deliver(&mut self, frame: Frame) -> Result<ExtractorState, SessionError> {
        let Some(name) = sanitize_label(&frame.label, &self.default_extension) else {
            warn!("dropping frame with unusable label {:?}", frame.label);
            self.stats.frames_skipped += 1;
            return Ok(ExtractorState::AwaitingBoundary);
        };

        match self.sink.store(&name, &frame.payload).await {
            Ok(path) => {
                info!("saved {} ({} bytes)", path.display(), frame.payload.len());
                self.stats.frames_stored += 1;
            }
            Err(e) => {
                warn!("failed to store frame {name:?}: {e}");
                self.stats.store_failures += 1;
            }
        }

        Ok(ExtractorState::AwaitingBoundary)
    }
}

// -----------------------------------------------------------------------------
// ----- Error -----------------------------------------------------------------

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("stream source failed: {0}")]
    Source(#[from] SourceError),
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
