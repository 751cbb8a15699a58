// source/mod.rs
//! Stream input layer: the forward-only byte cursor and the thin HTTP
//! plumbing that produces one positioned at the start of a multipart body.

pub mod byte_source;
pub mod http;

pub use byte_source::{ByteSource, SourceError};
pub use http::{ConnectError, StreamConnection, StreamUrl, connect};
