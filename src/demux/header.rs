use tokio::io::AsyncRead;

use thiserror::Error;

use crate::source::{ByteSource, SourceError};

// -----------------------------------------------------------------------------
// ----- Header ----------------------------------------------------------------

/// Parsed frame header: the label that names the artifact and the declared
/// payload length that governs extraction. Never partially trusted; both
/// fields are present or the whole block is rejected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Header {
    pub label: String,
    pub declared_len: usize,
}

// -----------------------------------------------------------------------------
// ----- HeaderParser ----------------------------------------------------------

/// Parses the `Key: value` block between a boundary and the blank line that
/// precedes payload bytes.
///
/// The payload length always comes from `Content-Length`; this parser never
/// infers one by scanning ahead for the next boundary, because boundary-like
/// byte sequences occur legitimately inside binary payloads.
pub struct HeaderParser {
    max_lines: usize,
    max_payload_len: usize,
}

impl HeaderParser {
    pub fn new(max_lines: usize, max_payload_len: usize) -> Self {
        Self {
            max_lines,
            max_payload_len,
        }
    }

    pub async fn parse<R: AsyncRead + Unpin>(
        &self,
        source: &mut ByteSource<R>,
    ) -> Result<Header, HeaderError> {
        let mut label: Option<String> = None;
        let mut declared_len: Option<usize> = None;
        let mut lines = 0usize;

        loop {
            let line = match source.read_line().await {
                Ok(Some(line)) => line,
                Ok(None) => return Err(HeaderError::UnexpectedEof),
                Err(SourceError::LineTooLong(n)) => return Err(HeaderError::OversizedLine(n)),
                Err(e) => return Err(HeaderError::Source(e)),
            };

            if is_blank(&line) {
                break;
            }

            lines += 1;
            if lines > self.max_lines {
                return Err(HeaderError::BlockTooLarge(lines));
            }

            // The firmware prints `Key:value` with no space; tolerate both.
            let text = String::from_utf8_lossy(&line);
            let Some((key, value)) = text.split_once(':') else {
                continue; // not a header line, ignore
            };

            let key = key.trim();
            let value = value.trim();

            if key.eq_ignore_ascii_case("x-label") {
                if !value.is_empty() {
                    label = Some(value.to_string());
                }
            } else if key.eq_ignore_ascii_case("content-length") {
                let parsed = value
                    .parse::<usize>()
                    .map_err(|_| HeaderError::MalformedLength {
                        value: value.to_string(),
                    })?;

                if parsed > self.max_payload_len {
                    return Err(HeaderError::LengthOverCap {
                        declared: parsed,
                        max: self.max_payload_len,
                    });
                }

                declared_len = Some(parsed);
            }
            // other keys (Content-Type and friends) are irrelevant
        }

        let label = label.ok_or(HeaderError::MissingLabel)?;
        let declared_len = declared_len.ok_or(HeaderError::MissingLength)?;

        Ok(Header {
            label,
            declared_len,
        })
    }
}

// -----------------------------------------------------------------------------
// ----- Internal: Helpers -----------------------------------------------------

fn is_blank(line: &[u8]) -> bool {
    matches!(line, [b'\r', b'\n'] | [b'\n'])
}

// -----------------------------------------------------------------------------
// ----- Error -----------------------------------------------------------------

#[derive(Debug, Error)]
pub enum HeaderError {
    #[error("header block has no X-Label line")]
    MissingLabel,

    #[error("header block has no Content-Length line")]
    MissingLength,

    #[error("Content-Length {value:?} is not a non-negative integer")]
    MalformedLength { value: String },

    #[error("Content-Length {declared} exceeds the {max}-byte payload cap")]
    LengthOverCap { declared: usize, max: usize },

    #[error("header block exceeded {0} lines without a terminating blank line")]
    BlockTooLarge(usize),

    #[error("header line exceeded the line-length cap ({0} bytes)")]
    OversizedLine(usize),

    #[error("stream ended inside a header block")]
    UnexpectedEof,

    #[error(transparent)]
    Source(SourceError),
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn source(data: &[u8]) -> ByteSource<Cursor<Vec<u8>>> {
        ByteSource::new(Cursor::new(data.to_vec()), 1024)
    }

    fn parser() -> HeaderParser {
        HeaderParser::new(64, 32 * 1024 * 1024)
    }

    #[tokio::test]
    async fn parses_firmware_style_block() {
        // no space after the colon, extra Content-Type line, spaces in label
        let mut src = source(
            b"Content-Type:image/jpeg\r\nX-Label:42 1 0 0 0 200.jpg\r\nContent-Length:1234\r\n\r\n",
        );

        let header = parser().parse(&mut src).await.unwrap();
        assert_eq!(header.label, "42 1 0 0 0 200.jpg");
        assert_eq!(header.declared_len, 1234);
    }

    #[tokio::test]
    async fn parses_spaced_block_case_insensitively() {
        let mut src = source(b"x-label: img1 \r\ncontent-LENGTH: 4\r\n\r\n");

        let header = parser().parse(&mut src).await.unwrap();
        assert_eq!(header.label, "img1");
        assert_eq!(header.declared_len, 4);
    }

    #[tokio::test]
    async fn zero_length_is_valid() {
        let mut src = source(b"X-Label:empty\r\nContent-Length:0\r\n\r\n");

        let header = parser().parse(&mut src).await.unwrap();
        assert_eq!(header.declared_len, 0);
    }

    #[tokio::test]
    async fn missing_label_is_rejected() {
        let mut src = source(b"Content-Length:10\r\n\r\n");

        assert!(matches!(
            parser().parse(&mut src).await,
            Err(HeaderError::MissingLabel)
        ));
    }

    #[tokio::test]
    async fn empty_label_is_rejected() {
        let mut src = source(b"X-Label:   \r\nContent-Length:10\r\n\r\n");

        assert!(matches!(
            parser().parse(&mut src).await,
            Err(HeaderError::MissingLabel)
        ));
    }

    #[tokio::test]
    async fn missing_length_is_rejected() {
        let mut src = source(b"X-Label:img\r\n\r\n");

        assert!(matches!(
            parser().parse(&mut src).await,
            Err(HeaderError::MissingLength)
        ));
    }

    #[tokio::test]
    async fn malformed_length_is_rejected() {
        for bad in [&b"X-Label:img\r\nContent-Length:abc\r\n\r\n"[..],
                    &b"X-Label:img\r\nContent-Length:-5\r\n\r\n"[..],
                    &b"X-Label:img\r\nContent-Length:12.5\r\n\r\n"[..]] {
            let mut src = source(bad);
            assert!(matches!(
                parser().parse(&mut src).await,
                Err(HeaderError::MalformedLength { .. })
            ));
        }
    }

    #[tokio::test]
    async fn absurd_length_is_rejected() {
        let mut src = source(b"X-Label:img\r\nContent-Length:999999999999\r\n\r\n");

        assert!(matches!(
            parser().parse(&mut src).await,
            Err(HeaderError::LengthOverCap { .. })
        ));
    }

    #[tokio::test]
    async fn eof_inside_block_is_reported() {
        let mut src = source(b"X-Label:img\r\nContent-Length:4\r\n");

        assert!(matches!(
            parser().parse(&mut src).await,
            Err(HeaderError::UnexpectedEof)
        ));
    }

    #[tokio::test]
    async fn runaway_block_is_rejected() {
        let mut block = Vec::new();
        for i in 0..100 {
            block.extend_from_slice(format!("K{i}:v\r\n").as_bytes());
        }
        let mut src = source(&block);

        assert!(matches!(
            HeaderParser::new(16, 1024).parse(&mut src).await,
            Err(HeaderError::BlockTooLarge(_))
        ));
    }

    #[tokio::test]
    async fn cursor_rests_on_payload_after_parse() {
        let mut src = source(b"X-Label:a\r\nContent-Length:3\r\n\r\nXYZtail");

        let header = parser().parse(&mut src).await.unwrap();
        let payload = src.read_exact(header.declared_len).await.unwrap();
        assert_eq!(payload.as_ref(), b"XYZ");
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
