use may_minihttp::Request;
use std::collections::HashMap;
use tracing::debug;

/// The parts of an inbound request the gateway looks at.
#[derive(Debug, PartialEq)]
pub struct ParsedRequest {
    /// HTTP method (GET, POST, etc.)
    pub method: String,
    /// Request path without the query string
    pub path: String,
    /// HTTP headers (lowercase keys)
    pub headers: HashMap<String, String>,
}

impl ParsedRequest {
    /// Header value by lowercase name
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

/// Strip the query string from a request target.
pub fn route_path(raw: &str) -> &str {
    match raw.split('?').next() {
        Some(p) if !p.is_empty() => p,
        _ => "/",
    }
}

/// Extract method, path and headers from a `may_minihttp::Request`.
///
/// Header names are lowercased. Header values are never logged: the
/// `authorization` header carries the bearer token.
pub fn parse_request(req: Request) -> ParsedRequest {
    let method = req.method().to_string();
    let path = route_path(req.path()).to_string();

    let headers: HashMap<String, String> = req
        .headers()
        .iter()
        .map(|h| {
            (
                h.name.to_ascii_lowercase(),
                String::from_utf8_lossy(h.value).to_string(),
            )
        })
        .collect();

    debug!(
        method = %method,
        path = %path,
        header_count = headers.len(),
        has_authorization = headers.contains_key("authorization"),
        "HTTP request parsed"
    );

    ParsedRequest {
        method,
        path,
        headers,
    }
}
