//! Closed error types for the two core subsystems, plus the startup error
//! surfaced to `main`. Parse and cache errors are never converted to
//! `anyhow`/`Box<dyn Error>` internally; only the dispatcher maps them to an
//! HTTP status, and only `main` maps `ServerError` to a process exit code.

use std::path::PathBuf;
use thiserror::Error;

/// Outcome of `Parser::parse`. Deliberately mirrors the HTTP status the
/// dispatcher will eventually choose, without depending on the response
/// module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    /// Peer closed the connection or a read failed; drop silently, no
    /// response is sent.
    Io,
    /// Structural deviation from the grammar.
    Bad,
    /// Allocation/size-cap failure while building the request.
    Internal,
}

/// Errors returned while building or querying the content cache.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to read directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to stat {path}: {source}")]
    Stat {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("directory walk produced {found} files, exceeding the cap of {cap}")]
    TooManyFiles { found: usize, cap: usize },
}

/// Failures that abort process startup or an in-progress reload.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to configure listen backlog: {0}")]
    Listen(#[source] std::io::Error),
    #[error("TLS context construction failed: {0}")]
    TlsContext(String),
    #[error("certificate does not match private key, or one could not be loaded: {0}")]
    TlsCredentials(String),
    #[error("failed to write pid file {path}: {source}")]
    PidFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("initial cache load failed: {0}")]
    InitialCacheLoad(#[from] CacheError),
    #[error("invalid bind address {0:?}")]
    InvalidBindAddress(String),
    #[error("configuration error: {0}")]
    Config(String),
}
