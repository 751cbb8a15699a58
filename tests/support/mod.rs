use std::io;
use std::path::PathBuf;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, ReadBuf};
use tokio::sync::watch;

use framegrab::demux::{BoundaryScanner, FrameExtractor, HeaderParser};
use framegrab::sink::{FrameSink, SinkError};
use framegrab::source::ByteSource;

// -----------------------------------------------------------------------------
// ----- Stream builders -------------------------------------------------------

/// Serialize one frame the way the device firmware does: boundary line,
/// `Key:value` headers without a space, blank line, payload, trailing CRLF.
#[allow(dead_code)]
pub fn frame_bytes(label: &str, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"--frame\r\n");
    out.extend_from_slice(b"Content-Type:image/jpeg\r\n");
    out.extend_from_slice(format!("X-Label:{label}\r\n").as_bytes());
    out.extend_from_slice(format!("Content-Length:{}\r\n\r\n", payload.len()).as_bytes());
    out.extend_from_slice(payload);
    out.extend_from_slice(b"\r\n");
    out
}

#[allow(dead_code)]
pub fn stream_of(frames: &[(&str, &[u8])]) -> Vec<u8> {
    let mut out = Vec::new();
    for (label, payload) in frames {
        out.extend_from_slice(&frame_bytes(label, payload));
    }
    out
}

// -----------------------------------------------------------------------------
// ----- ChunkReader -----------------------------------------------------------

/// Delivers a byte stream in fixed-size transport chunks, independent of any
/// frame structure, so tests can split boundaries and headers mid-marker.
#[allow(dead_code)]
pub struct ChunkReader {
    data: Vec<u8>,
    pos: usize,
    chunk: usize,
}

impl ChunkReader {
    #[allow(dead_code)]
    pub fn new(data: Vec<u8>, chunk: usize) -> Self {
        assert!(chunk > 0, "chunk size must be positive");
        Self { data, pos: 0, chunk }
    }
}

impl AsyncRead for ChunkReader {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();

        if this.pos >= this.data.len() {
            return Poll::Ready(Ok(())); // EOF
        }

        let take = this
            .chunk
            .min(this.data.len() - this.pos)
            .min(buf.remaining());
        buf.put_slice(&this.data[this.pos..this.pos + take]);
        this.pos += take;

        Poll::Ready(Ok(()))
    }
}

// -----------------------------------------------------------------------------
// ----- CollectSink -----------------------------------------------------------

/// In-memory sink recording every (name, payload) pair it receives.
#[allow(dead_code)]
#[derive(Default)]
pub struct CollectSink {
    pub frames: Vec<(String, Vec<u8>)>,
}

impl FrameSink for CollectSink {
    async fn store(&mut self, label: &str, payload: &[u8]) -> Result<PathBuf, SinkError> {
        self.frames.push((label.to_string(), payload.to_vec()));
        Ok(PathBuf::from(label))
    }
}

// -----------------------------------------------------------------------------
// ----- Extractor wiring ------------------------------------------------------

#[allow(dead_code)]
pub fn no_shutdown() -> watch::Receiver<bool> {
    // sender dropped; the receiver keeps the last value
    watch::channel(false).1
}

/// An extractor over `data` delivered in `chunk`-byte transport reads.
#[allow(dead_code)]
pub fn chunked_extractor<S: FrameSink>(
    data: Vec<u8>,
    chunk: usize,
    sink: S,
) -> FrameExtractor<ChunkReader, S> {
    FrameExtractor::new(
        ByteSource::new(ChunkReader::new(data, chunk), 16 * 1024),
        BoundaryScanner::new("--frame"),
        HeaderParser::new(64, 32 * 1024 * 1024),
        sink,
        no_shutdown(),
    )
}
