//! The request data model produced by the parser.

/// One of the eight methods the grammar recognizes. The parser accepts all
/// eight; only the dispatcher decides which ones it actually serves (keeping
/// this split means adding a method to the server's allow-list never touches
/// the parser).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    Connect,
    Delete,
    Get,
    Head,
    Options,
    Post,
    Put,
    Trace,
}

impl Method {
    pub fn from_token(token: &[u8]) -> Option<Method> {
        match token {
            b"CONNECT" => Some(Method::Connect),
            b"DELETE" => Some(Method::Delete),
            b"GET" => Some(Method::Get),
            b"HEAD" => Some(Method::Head),
            b"OPTIONS" => Some(Method::Options),
            b"POST" => Some(Method::Post),
            b"PUT" => Some(Method::Put),
            b"TRACE" => Some(Method::Trace),
            _ => None,
        }
    }
}

/// HTTP/0.9 single-line GET vs HTTP/1.x request with a version token and
/// (optional) headers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestKind {
    Simple,
    Full,
}

/// A fully parsed request. Populated only by the parser; freed when the
/// connection worker that owns it exits.
#[derive(Clone, Debug)]
pub struct Request {
    pub method: Method,
    pub uri: String,
    pub uri_fragment: Option<String>,
    pub query_variables: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub http_version_major: u32,
    pub http_version_minor: u32,
    pub kind: RequestKind,
}

impl Request {
    pub fn is_head(&self) -> bool {
        self.method == Method::Head
    }

    pub fn is_get(&self) -> bool {
        self.method == Method::Get
    }
}
