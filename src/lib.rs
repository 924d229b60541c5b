//! Core library for the static-content HTTP/1.x server: content cache,
//! request parser, response assembler, and connection dispatcher. `main.rs`
//! is a thin wire-up over this crate's public API plus the external
//! collaborators (CLI, INI config, logging) that populate it.

pub mod cache;
pub mod cli;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod hash;
pub mod logging;
pub mod mime;
pub mod parser;
pub mod pidfile;
pub mod request;
pub mod response;
pub mod tls;
pub mod transport;

pub use cache::{CacheEntry, ContentCache};
pub use config::ServerConfig;
pub use error::{CacheError, ParseError, ServerError};
pub use request::{Method, Request, RequestKind};
