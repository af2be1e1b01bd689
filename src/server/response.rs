use may_minihttp::Response;
use serde_json::Value;

fn status_reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        204 => "No Content",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        500 => "Internal Server Error",
        _ => "OK",
    }
}

/// Owned storage for the one per-request header line a connection writes.
///
/// `may_minihttp::Response::header` only accepts `&'static str`. A connection
/// encodes each response right after `HttpService::call` returns and before
/// it decodes the next request, so a line borrowed from this slot stays valid
/// for as long as the response that references it. The slot belongs to the
/// per-connection service clone and is rewritten in place on every request,
/// so nothing outlives the connection.
#[derive(Debug, Default)]
pub struct HeaderSlot {
    line: String,
}

impl Clone for HeaderSlot {
    // Each connection gets its own, empty slot.
    fn clone(&self) -> Self {
        Self::default()
    }
}

impl HeaderSlot {
    /// Render `name: value` into the slot and hand the line to the response.
    ///
    /// Only one line per request may come from a slot; a second call
    /// overwrites the first.
    pub(crate) fn write(&mut self, res: &mut Response, name: &str, value: &str) {
        let line: *const str = self.fill(name, value);
        // SAFETY: the response is encoded before this slot is written again or
        // dropped (see the type docs), so the borrowed line outlives every use.
        res.header(unsafe { &*line });
    }

    fn fill(&mut self, name: &str, value: &str) -> &str {
        self.line.clear();
        self.line.push_str(name);
        self.line.push_str(": ");
        self.line.push_str(value);
        &self.line
    }

    /// Bytes currently held by the slot.
    #[must_use]
    pub fn retained(&self) -> usize {
        self.line.capacity()
    }
}

/// Plain-text response.
pub fn write_text(res: &mut Response, status: u16, body: &str) {
    res.status_code(status as usize, status_reason(status));
    res.header("Content-Type: text/plain");
    res.body_vec(body.as_bytes().to_vec());
}

/// `204 No Content`; any headers must already be set.
pub fn write_no_content(res: &mut Response) {
    res.status_code(204, status_reason(204));
    res.body_vec(Vec::new());
}

/// JSON response.
pub fn write_json(res: &mut Response, status: u16, body: &Value) {
    res.status_code(status as usize, status_reason(status));
    res.header("Content-Type: application/json");
    res.body_vec(body.to_string().into_bytes());
}
