//! The request-line/header byte-at-a-time state machine, reading only
//! through `Transport::peek`/`Transport::next`.

use crate::error::ParseError;
use crate::request::{Method, Request, RequestKind};
use crate::transport::{ByteResult, Transport};

const URI_SIZE_MAX: usize = 1024;
const URL_VAR_NAME_MAX: usize = 128;
const URL_VAR_VALUE_MAX: usize = 1024;
/// Not named explicitly in the grammar; bounds a single header value so a
/// misbehaving or hostile peer can't force unbounded buffering.
const HEADER_VALUE_MAX: usize = 8192;

fn nibble(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

fn is_horizontal_ws(b: u8) -> bool {
    b == b' ' || b == b'\t'
}

async fn read_hex_digit(t: &mut Transport) -> Result<u8, ParseError> {
    match t.next().await {
        ByteResult::Byte(b) => nibble(b).ok_or(ParseError::Bad),
        ByteResult::Eof => Err(ParseError::Bad),
        ByteResult::IoErr => Err(ParseError::Io),
    }
}

/// Decode `%HH` escapes and pass other bytes through verbatim. Used by the
/// URI and fragment productions, which share `unreserved | "%" HEX HEX`.
/// Terminates on any byte in `terminators`, without consuming it.
async fn read_percent_decoded(
    t: &mut Transport,
    terminators: &[u8],
    cap: usize,
) -> Result<Vec<u8>, ParseError> {
    let mut out = Vec::new();
    loop {
        match t.peek().await {
            ByteResult::Byte(b) if terminators.contains(&b) => break,
            ByteResult::Byte(b'%') => {
                t.next().await;
                let hi = read_hex_digit(t).await?;
                let lo = read_hex_digit(t).await?;
                out.push((hi << 4) | lo);
            }
            ByteResult::Byte(b) => {
                t.next().await;
                out.push(b);
            }
            ByteResult::Eof => return Err(ParseError::Bad),
            ByteResult::IoErr => return Err(ParseError::Io),
        }
        if out.len() > cap {
            return Err(ParseError::Internal);
        }
    }
    Ok(out)
}

/// State 1: method token, matched byte-at-a-time with no whitespace
/// consumed past the token itself.
async fn parse_method(t: &mut Transport) -> Result<Method, ParseError> {
    let mut token = Vec::with_capacity(8);
    loop {
        match t.peek().await {
            ByteResult::Byte(b) if is_horizontal_ws(b) => break,
            ByteResult::Byte(b) => {
                t.next().await;
                token.push(b);
                // Longest recognized method is "OPTIONS" (7 bytes); one more
                // byte can never match, so stop early as a non-match.
                if token.len() > 7 {
                    return Err(ParseError::Bad);
                }
            }
            ByteResult::Eof => return Err(ParseError::Bad),
            ByteResult::IoErr => return Err(ParseError::Io),
        }
    }
    Method::from_token(&token).ok_or(ParseError::Bad)
}

/// State 2: exactly one required space after the method, then any amount of
/// additional horizontal whitespace. A bare `\n` here means there was no
/// URI at all.
async fn skip_post_method_whitespace(t: &mut Transport) -> Result<(), ParseError> {
    match t.next().await {
        ByteResult::Byte(b' ') => {}
        ByteResult::Byte(_) => return Err(ParseError::Bad),
        ByteResult::Eof => return Err(ParseError::Bad),
        ByteResult::IoErr => return Err(ParseError::Io),
    }
    loop {
        match t.peek().await {
            ByteResult::Byte(b) if is_horizontal_ws(b) => {
                t.next().await;
            }
            ByteResult::Byte(b'\n') => return Err(ParseError::Bad),
            _ => break,
        }
    }
    Ok(())
}

/// State 3: the URI itself. A trailing `/` is rewritten to `/index.html`.
async fn parse_uri(t: &mut Transport) -> Result<String, ParseError> {
    let bytes = read_percent_decoded(t, b" \t?#\r\n", URI_SIZE_MAX).await?;
    if bytes.is_empty() {
        return Err(ParseError::Bad);
    }
    let mut bytes = bytes;
    if bytes.last() == Some(&b'/') {
        bytes.extend_from_slice(b"index.html");
    }
    String::from_utf8(bytes).map_err(|_| ParseError::Bad)
}

/// State 4: optional `?name=value&name=value...` component. Not
/// percent-decoded (the grammar only applies `%HH` escaping to `uri` and
/// `fragment`).
async fn parse_query(t: &mut Transport) -> Result<Vec<(String, String)>, ParseError> {
    let mut vars = Vec::new();
    if !matches!(t.peek().await, ByteResult::Byte(b'?')) {
        return Ok(vars);
    }
    t.next().await; // consume '?'

    loop {
        let name = read_until(t, b"=", URL_VAR_NAME_MAX, /* disallow_ws */ true).await?;
        match t.next().await {
            ByteResult::Byte(b'=') => {}
            ByteResult::Byte(_) => return Err(ParseError::Bad),
            ByteResult::Eof => return Err(ParseError::Bad),
            ByteResult::IoErr => return Err(ParseError::Io),
        }
        let value = read_until(t, b"& \t\r\n", URL_VAR_VALUE_MAX, false).await?;
        vars.push((name, value));

        match t.peek().await {
            ByteResult::Byte(b'&') => {
                t.next().await;
            }
            _ => break,
        }
    }
    Ok(vars)
}

/// Read raw (non-percent-decoded) bytes until one of `terminators`, up to
/// `cap` bytes. When `disallow_ws` is set, encountering horizontal
/// whitespace before a terminator is itself a `BAD` request (used for query
/// variable names, which must not contain embedded whitespace).
async fn read_until(
    t: &mut Transport,
    terminators: &[u8],
    cap: usize,
    disallow_ws: bool,
) -> Result<String, ParseError> {
    let mut out = Vec::new();
    loop {
        match t.peek().await {
            ByteResult::Byte(b) if terminators.contains(&b) => break,
            ByteResult::Byte(b) if disallow_ws && is_horizontal_ws(b) => {
                return Err(ParseError::Bad)
            }
            ByteResult::Byte(b) => {
                t.next().await;
                out.push(b);
            }
            ByteResult::Eof => return Err(ParseError::Bad),
            ByteResult::IoErr => return Err(ParseError::Io),
        }
        if out.len() > cap {
            return Err(ParseError::Internal);
        }
    }
    String::from_utf8(out).map_err(|_| ParseError::Bad)
}

/// State 5: optional `#fragment`, percent-decoded like the URI.
async fn parse_fragment(t: &mut Transport) -> Result<Option<String>, ParseError> {
    if !matches!(t.peek().await, ByteResult::Byte(b'#')) {
        return Ok(None);
    }
    t.next().await;
    let bytes = read_percent_decoded(t, b" \t\r\n", URI_SIZE_MAX).await?;
    String::from_utf8(bytes)
        .map(Some)
        .map_err(|_| ParseError::Bad)
}

enum VersionOrSimple {
    Simple,
    Full(u32, u32),
}

/// State 6: after skipping whitespace, either a bare `\n` (SIMPLE request)
/// or `"HTTP/" major "." minor`.
async fn parse_version_or_simple(t: &mut Transport) -> Result<VersionOrSimple, ParseError> {
    loop {
        match t.peek().await {
            ByteResult::Byte(b) if is_horizontal_ws(b) => {
                t.next().await;
            }
            _ => break,
        }
    }

    if matches!(t.peek().await, ByteResult::Byte(b'\n')) {
        t.next().await;
        return Ok(VersionOrSimple::Simple);
    }

    for expected in b"HTTP/" {
        match t.next().await {
            ByteResult::Byte(b) if b == *expected => {}
            ByteResult::Byte(_) => return Err(ParseError::Bad),
            ByteResult::Eof => return Err(ParseError::Bad),
            ByteResult::IoErr => return Err(ParseError::Io),
        }
    }
    let major = read_decimal(t).await?;
    match t.next().await {
        ByteResult::Byte(b'.') => {}
        ByteResult::Byte(_) => return Err(ParseError::Bad),
        ByteResult::Eof => return Err(ParseError::Bad),
        ByteResult::IoErr => return Err(ParseError::Io),
    }
    let minor = read_decimal(t).await?;
    Ok(VersionOrSimple::Full(major, minor))
}

async fn read_decimal(t: &mut Transport) -> Result<u32, ParseError> {
    let mut value: u32 = 0;
    let mut digits = 0u32;
    loop {
        match t.peek().await {
            ByteResult::Byte(b) if b.is_ascii_digit() => {
                t.next().await;
                value = value.saturating_mul(10).saturating_add((b - b'0') as u32);
                digits += 1;
            }
            ByteResult::IoErr => return Err(ParseError::Io),
            _ => break,
        }
    }
    if digits == 0 {
        return Err(ParseError::Bad);
    }
    Ok(value)
}

/// State 7: require the CRLF that terminates the request line.
async fn expect_crlf(t: &mut Transport) -> Result<(), ParseError> {
    match t.next().await {
        ByteResult::Byte(b'\r') => {}
        ByteResult::Byte(_) => return Err(ParseError::Bad),
        ByteResult::Eof => return Err(ParseError::Bad),
        ByteResult::IoErr => return Err(ParseError::Io),
    }
    match t.next().await {
        ByteResult::Byte(b'\n') => Ok(()),
        ByteResult::Byte(_) => Err(ParseError::Bad),
        ByteResult::Eof => Err(ParseError::Bad),
        ByteResult::IoErr => Err(ParseError::Io),
    }
}

/// State 8: headers, repeated until a bare CRLF line.
async fn parse_headers(t: &mut Transport) -> Result<Vec<(String, String)>, ParseError> {
    let mut headers = Vec::new();
    loop {
        if matches!(t.peek().await, ByteResult::Byte(b'\r')) {
            t.next().await;
            match t.next().await {
                ByteResult::Byte(b'\n') => break,
                ByteResult::Byte(_) => return Err(ParseError::Bad),
                ByteResult::Eof => return Err(ParseError::Bad),
                ByteResult::IoErr => return Err(ParseError::Io),
            }
        }

        let name = read_until(t, b":", URL_VAR_NAME_MAX, false).await?;
        match t.next().await {
            ByteResult::Byte(b':') => {}
            ByteResult::Byte(_) => return Err(ParseError::Bad),
            ByteResult::Eof => return Err(ParseError::Bad),
            ByteResult::IoErr => return Err(ParseError::Io),
        }
        match t.next().await {
            ByteResult::Byte(b' ') => {}
            ByteResult::Byte(_) => return Err(ParseError::Bad),
            ByteResult::Eof => return Err(ParseError::Bad),
            ByteResult::IoErr => return Err(ParseError::Io),
        }
        let value = read_until(t, b"\r", HEADER_VALUE_MAX, false).await?;
        match t.next().await {
            ByteResult::Byte(b'\r') => {}
            ByteResult::Byte(_) => return Err(ParseError::Bad),
            ByteResult::Eof => return Err(ParseError::Bad),
            ByteResult::IoErr => return Err(ParseError::Io),
        }
        match t.next().await {
            ByteResult::Byte(b'\n') => {}
            ByteResult::Byte(_) => return Err(ParseError::Bad),
            ByteResult::Eof => return Err(ParseError::Bad),
            ByteResult::IoErr => return Err(ParseError::Io),
        }
        headers.push((name, value));
    }
    Ok(headers)
}

/// Parse one request from `transport`. On any error, everything allocated
/// so far is simply dropped; there is no separate free path to run.
pub async fn parse(transport: &mut Transport) -> Result<Request, ParseError> {
    let method = parse_method(transport).await?;
    skip_post_method_whitespace(transport).await?;
    let uri = parse_uri(transport).await?;
    let query_variables = parse_query(transport).await?;
    let uri_fragment = parse_fragment(transport).await?;

    match parse_version_or_simple(transport).await? {
        VersionOrSimple::Simple => {
            if method != Method::Get {
                return Err(ParseError::Bad);
            }
            Ok(Request {
                method,
                uri,
                uri_fragment,
                query_variables,
                headers: Vec::new(),
                http_version_major: 0,
                http_version_minor: 9,
                kind: RequestKind::Simple,
            })
        }
        VersionOrSimple::Full(major, minor) => {
            expect_crlf(transport).await?;
            let headers = parse_headers(transport).await?;
            Ok(Request {
                method,
                uri,
                uri_fragment,
                query_variables,
                headers,
                http_version_major: major,
                http_version_minor: minor,
                kind: RequestKind::Full,
            })
        }
    }
}
