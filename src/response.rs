//! Status line/header formatting, framed send, and the error-page fallback
//! used when no on-disk page exists for a given status.

use std::time::SystemTime;

use crate::cache::{CacheEntry, ContentCache};
use crate::transport::Transport;

/// `{200, 400, 404, 500, 501}` reason phrases, exactly as tabulated in the
/// spec.
pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "200 OK",
        400 => "400 Bad Request",
        404 => "404 Not Found",
        500 => "500 Internal Server Error",
        501 => "501 Not Implemented",
        _ => "500 Internal Server Error",
    }
}

fn error_page_path(status: u16) -> String {
    format!("/error/{status}/index.html")
}

/// Resolve the `CacheEntry` to serve for an error `status`: the on-disk
/// error page if present, otherwise a synthesized plain-text body carrying
/// the reason phrase.
pub fn error_entry(cache: &ContentCache, status: u16) -> CacheEntry {
    let path = error_page_path(status);
    cache
        .find(&path)
        .unwrap_or_else(|| CacheEntry::synthesize(&path, reason_phrase(status)))
}

/// Format and frame a response onto `transport`. For `HEAD`, no body bytes
/// are sent but `Content-Length` still reflects the full entry length.
pub async fn write_response(
    transport: &mut Transport,
    status: u16,
    entry: &CacheEntry,
    is_head: bool,
    extra_headers: &str,
) -> std::io::Result<()> {
    let date = httpdate::fmt_http_date(SystemTime::now());
    let mut buf = Vec::with_capacity(entry.length + extra_headers.len() + 160);

    buf.extend_from_slice(b"HTTP/1.1 ");
    buf.extend_from_slice(reason_phrase(status).as_bytes());
    buf.extend_from_slice(b"\r\n");
    buf.extend_from_slice(format!("Date: {date}\r\n").as_bytes());
    buf.extend_from_slice(format!("Content-Type: {}\r\n", entry.mime).as_bytes());
    buf.extend_from_slice(format!("Content-Length: {}\r\n", entry.length).as_bytes());
    buf.extend_from_slice(extra_headers.as_bytes());
    buf.extend_from_slice(b"\r\n");
    if !is_head {
        buf.extend_from_slice(&entry.bytes);
    }

    transport.write_all(&buf).await
}
