use bytes::{Bytes, BytesMut};
use memchr::memchr;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

const READ_CHUNK_HINT: usize = 4096;

// -----------------------------------------------------------------------------
// ----- ByteSource ------------------------------------------------------------

/// Pull-based cursor over an open transport.
///
/// Owns the stream position exclusively: callers consume bytes strictly
/// left-to-right through [`read_line`](Self::read_line) and
/// [`read_exact`](Self::read_exact), with no peeking or rewinding. The only
/// buffering is the internal line-assembly slab, and consumed bytes are
/// discarded immediately.
pub struct ByteSource<R> {
    reader: Option<R>,
    buffer: BytesMut,
    max_line_len: usize,
    eof: bool,
}

impl<R> ByteSource<R> {
    pub fn new(reader: R, max_line_len: usize) -> Self {
        Self {
            reader: Some(reader),
            buffer: BytesMut::with_capacity(READ_CHUNK_HINT),
            max_line_len,
            eof: false,
        }
    }

    /// Drop the transport. Subsequent reads drain the buffer, then end.
    pub fn close(&mut self) {
        self.reader = None;
        self.eof = true;
    }
}

// -----------------------------------------------------------------------------
// ----- ByteSource: Public ----------------------------------------------------

impl<R: AsyncRead + Unpin> ByteSource<R> {
    /// Next sequence of bytes up to and including `\n`, or the shorter final
    /// sequence at end-of-stream. `Ok(None)` once the stream is exhausted.
    ///
    /// Lines longer than `max_line_len` are discarded and reported as
    /// [`SourceError::LineTooLong`], as is a terminator-free run that would
    /// otherwise grow the assembly buffer without bound.
    pub async fn read_line(&mut self) -> Result<Option<Bytes>, SourceError> {
        loop {
            if let Some(nl) = memchr(b'\n', &self.buffer) {
                if nl + 1 > self.max_line_len {
                    let dropped = self.buffer.split_to(nl + 1);
                    return Err(SourceError::LineTooLong(dropped.len()));
                }
                return Ok(Some(self.buffer.split_to(nl + 1).freeze()));
            }

            if self.eof {
                if self.buffer.is_empty() {
                    return Ok(None);
                }
                return Ok(Some(self.buffer.split().freeze()));
            }

            if self.buffer.len() >= self.max_line_len {
                let dropped = self.buffer.split();
                return Err(SourceError::LineTooLong(dropped.len()));
            }

            self.fill().await?;
        }
    }

    /// Suspend until exactly `n` bytes are available, then return them.
    ///
    /// Fails with [`SourceError::StreamEnded`] if the transport closes first;
    /// the partial bytes stay buffered for whoever resynchronizes, they are
    /// never returned as a short read.
    pub async fn read_exact(&mut self, n: usize) -> Result<Bytes, SourceError> {
        while self.buffer.len() < n {
            if self.eof {
                return Err(SourceError::StreamEnded {
                    expected: n,
                    received: self.buffer.len(),
                });
            }
            self.fill().await?;
        }

        Ok(self.buffer.split_to(n).freeze())
    }
}

// -----------------------------------------------------------------------------
// ----- ByteSource: Private ---------------------------------------------------

impl<R: AsyncRead + Unpin> ByteSource<R> {
    async fn fill(&mut self) -> Result<(), SourceError> {
        let Some(reader) = self.reader.as_mut() else {
            self.eof = true;
            return Ok(());
        };

        self.buffer.reserve(READ_CHUNK_HINT);
        let n = reader
            .read_buf(&mut self.buffer)
            .await
            .map_err(SourceError::Transport)?;

        if n == 0 {
            self.eof = true;
        }

        Ok(())
    }
}

// -----------------------------------------------------------------------------
// ----- Error -----------------------------------------------------------------

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("transport error: {0}")]
    Transport(#[source] std::io::Error),

    #[error("stream ended after {received} of {expected} bytes")]
    StreamEnded { expected: usize, received: usize },

    #[error("discarded {0} bytes without a line terminator")]
    LineTooLong(usize),
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
