//! Minimal HTTP GET plumbing for the device stream.
//!
//! The camera speaks just enough HTTP to serve
//! `Content-Type: multipart/x-mixed-replace` and then writes raw frames to
//! the socket forever. We send an HTTP/1.0 request (1.0 forbids chunked
//! bodies), check the status line, consume the response headers, and hand
//! the demuxer a [`ByteSource`] positioned exactly at the first body byte.

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use super::byte_source::{ByteSource, SourceError};

// -----------------------------------------------------------------------------
// ----- StreamUrl -------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamUrl {
    pub host: String,
    pub port: u16,
    pub path: String,
}

impl StreamUrl {
    /// Parse `http://host[:port][/path]`. Only plain-http device URLs are
    /// supported; anything else belongs to a smarter client.
    pub fn parse(raw: &str) -> Result<Self, ConnectError> {
        let rest = raw
            .strip_prefix("http://")
            .ok_or_else(|| ConnectError::InvalidUrl {
                url: raw.to_string(),
                reason: "only http:// URLs are supported",
            })?;

        let (authority, path) = match rest.find('/') {
            Some(idx) => (&rest[..idx], &rest[idx..]),
            None => (rest, "/"),
        };

        let (host, port) = match authority.rsplit_once(':') {
            Some((host, port)) => {
                let port = port.parse().map_err(|_| ConnectError::InvalidUrl {
                    url: raw.to_string(),
                    reason: "port is not a number",
                })?;
                (host, port)
            }
            None => (authority, 80),
        };

        if host.is_empty() {
            return Err(ConnectError::InvalidUrl {
                url: raw.to_string(),
                reason: "missing host",
            });
        }

        Ok(Self {
            host: host.to_string(),
            port,
            path: path.to_string(),
        })
    }
}

impl std::fmt::Display for StreamUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "http://{}:{}{}", self.host, self.port, self.path)
    }
}

// -----------------------------------------------------------------------------
// ----- StreamConnection ------------------------------------------------------

pub struct StreamConnection {
    /// Positioned at the first byte after the response headers.
    pub source: ByteSource<TcpStream>,

    /// Boundary marker advertised by the device, if any
    /// (`Content-Type: ...; boundary=frame` becomes `--frame`).
    pub boundary: Option<String>,
}

// -----------------------------------------------------------------------------
// ----- connect ---------------------------------------------------------------

pub async fn connect(url: &StreamUrl, max_line_len: usize) -> Result<StreamConnection, ConnectError> {
    let mut stream = TcpStream::connect((url.host.as_str(), url.port))
        .await
        .map_err(ConnectError::Io)?;

    let request = format!(
        "GET {} HTTP/1.0\r\nHost: {}\r\nAccept: */*\r\nConnection: close\r\n\r\n",
        url.path, url.host
    );
    stream
        .write_all(request.as_bytes())
        .await
        .map_err(ConnectError::Io)?;

    // The same source that reads the response headers is handed onward, so
    // no body bytes are lost or duplicated at the header/body seam.
    let mut source = ByteSource::new(stream, max_line_len);

    let status_line = source
        .read_line()
        .await?
        .ok_or(ConnectError::UnexpectedEof)?;
    check_status(&status_line)?;

    let mut boundary = None;
    loop {
        let line = source
            .read_line()
            .await?
            .ok_or(ConnectError::UnexpectedEof)?;

        if is_blank(&line) {
            break;
        }

        let text = String::from_utf8_lossy(&line);
        if let Some((key, value)) = text.split_once(':')
            && key.trim().eq_ignore_ascii_case("content-type")
        {
            boundary = boundary_param(value);
        }
    }

    Ok(StreamConnection { source, boundary })
}

// -----------------------------------------------------------------------------
// ----- Internal: Helpers -----------------------------------------------------

fn check_status(line: &[u8]) -> Result<(), ConnectError> {
    let text = String::from_utf8_lossy(line);
    let mut parts = text.split_whitespace();

    let version = parts.next().unwrap_or("");
    let code = parts.next().unwrap_or("");

    if !version.starts_with("HTTP/") || code != "200" {
        return Err(ConnectError::BadStatus(text.trim_end().to_string()));
    }

    Ok(())
}

fn is_blank(line: &[u8]) -> bool {
    matches!(line, [b'\r', b'\n'] | [b'\n'])
}

/// Extract the `boundary=` parameter from a Content-Type value and turn it
/// into the marker line the stream actually carries (`--<token>`).
fn boundary_param(value: &str) -> Option<String> {
    let lowered = value.to_ascii_lowercase();
    let idx = lowered.find("boundary=")?;

    let token = &value[idx + "boundary=".len()..];
    let token = token
        .split([';', ' ', '\t', '\r', '\n'])
        .next()
        .unwrap_or("")
        .trim_matches('"');

    if token.is_empty() {
        return None;
    }

    Some(format!("--{token}"))
}

// -----------------------------------------------------------------------------
// ----- Error -----------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("invalid URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: &'static str },

    #[error("connection failed: {0}")]
    Io(#[source] std::io::Error),

    #[error("device answered {0:?}, expected 200")]
    BadStatus(String),

    #[error("stream closed before the response headers ended")]
    UnexpectedEof,

    #[error(transparent)]
    Source(#[from] SourceError),
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_host() {
        let url = StreamUrl::parse("http://192.168.4.1").unwrap();
        assert_eq!(url.host, "192.168.4.1");
        assert_eq!(url.port, 80);
        assert_eq!(url.path, "/");
    }

    #[test]
    fn parses_host_port_and_path() {
        let url = StreamUrl::parse("http://camera.local:8080/stream").unwrap();
        assert_eq!(url.host, "camera.local");
        assert_eq!(url.port, 8080);
        assert_eq!(url.path, "/stream");
    }

    #[test]
    fn rejects_https_and_bare_hosts() {
        assert!(StreamUrl::parse("https://device/stream").is_err());
        assert!(StreamUrl::parse("device/stream").is_err());
        assert!(StreamUrl::parse("http:///stream").is_err());
        assert!(StreamUrl::parse("http://host:notaport/x").is_err());
    }

    #[test]
    fn accepts_200_status_only() {
        assert!(check_status(b"HTTP/1.1 200 OK\r\n").is_ok());
        assert!(check_status(b"HTTP/1.0 200\r\n").is_ok());
        assert!(check_status(b"HTTP/1.1 404 Not Found\r\n").is_err());
        assert!(check_status(b"garbage\r\n").is_err());
    }

    #[test]
    fn extracts_boundary_parameter() {
        assert_eq!(
            boundary_param(" multipart/x-mixed-replace; boundary=frame\r"),
            Some("--frame".to_string())
        );
        assert_eq!(
            boundary_param(" multipart/x-mixed-replace; BOUNDARY=\"cam0\"; charset=binary"),
            Some("--cam0".to_string())
        );
        assert_eq!(boundary_param(" image/jpeg"), None);
        assert_eq!(boundary_param(" multipart/x-mixed-replace; boundary="), None);
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
