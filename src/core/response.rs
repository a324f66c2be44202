//! Response state shared by every handler of a single dispatch.
use axum::body::{Body as AxumBody, HttpBody};
use bytes::BytesMut;
use http::{HeaderMap, HeaderValue, StatusCode, header};
use hyper::Response;

const DEFAULT_CONTENT_TYPE: &str = "application/json; charset=utf-8";

enum ResponseBody {
    Buffered(BytesMut),
    Streamed(AxumBody),
}

/// Write-once response sink.
///
/// The status is recorded the first time it is written and never changes afterwards; a body
/// write on an unwritten response implies `200 OK`. [`ResponseWriter::written`] is the signal
/// the dispatch loop uses to stop walking a middleware chain.
pub struct ResponseWriter {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: ResponseBody,
    size: u64,
    flushed: bool,
}

impl ResponseWriter {
    pub fn new() -> Self {
        Self {
            status: None,
            headers: HeaderMap::new(),
            body: ResponseBody::Buffered(BytesMut::new()),
            size: 0,
            flushed: false,
        }
    }

    /// Status written so far, `None` while the response has not begun.
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Whether a status has been written.
    pub fn written(&self) -> bool {
        self.status.is_some()
    }

    /// Number of body bytes written.
    ///
    /// Exact for buffered writes. After [`ResponseWriter::stream`] it is the body's declared
    /// length, or `0` when the stream has no exact size hint (chunked upstream bodies).
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn flushed(&self) -> bool {
        self.flushed
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Record the response status. Only the first call takes effect.
    pub fn write_header(&mut self, status: StatusCode) {
        if let Some(current) = self.status {
            tracing::warn!(
                "Superfluous write_header({}) ignored, status already {}",
                status.as_u16(),
                current.as_u16()
            );
            return;
        }
        self.status = Some(status);
    }

    /// Append bytes to the body, returning the number of bytes accepted.
    pub fn write(&mut self, data: impl AsRef<[u8]>) -> usize {
        let data = data.as_ref();
        if !self.headers.contains_key(header::CONTENT_TYPE) {
            self.headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static(DEFAULT_CONTENT_TYPE),
            );
        }
        if !self.written() {
            self.write_header(StatusCode::OK);
        }

        match &mut self.body {
            ResponseBody::Buffered(buffer) => {
                buffer.extend_from_slice(data);
                self.size += data.len() as u64;
                data.len()
            }
            ResponseBody::Streamed(_) => {
                tracing::warn!(
                    "Dropping {} byte write: response body is already streamed",
                    data.len()
                );
                0
            }
        }
    }

    /// Hand the response a streamed body, replacing anything buffered so far. The bytes are
    /// produced after dispatch returns, so only a declared length is reflected in `size()`.
    pub fn stream(&mut self, body: AxumBody) {
        if !self.written() {
            self.write_header(StatusCode::OK);
        }
        self.size = body.size_hint().exact().unwrap_or(0);
        self.body = ResponseBody::Streamed(body);
    }

    /// Commit the response head. An unwritten response is committed as `200 OK`.
    pub fn flush(&mut self) {
        if !self.written() {
            self.write_header(StatusCode::OK);
        }
        self.flushed = true;
    }

    /// Plain-text error reply with the given status.
    pub fn error(&mut self, status: StatusCode, message: &str) {
        self.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        self.headers.insert(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        );
        self.write_header(status);
        if !message.is_empty() {
            self.write(message);
            self.write("\n");
        }
    }

    pub fn not_found(&mut self) {
        self.write_header(StatusCode::NOT_FOUND);
    }

    pub fn no_content(&mut self) {
        self.write_header(StatusCode::NO_CONTENT);
    }

    /// Redirect to `location`. An unrepresentable location becomes a 500.
    pub fn redirect(&mut self, location: &str, status: StatusCode) {
        match HeaderValue::from_str(location) {
            Ok(value) => {
                self.headers.insert(header::LOCATION, value);
                self.write_header(status);
            }
            Err(e) => {
                tracing::error!("Invalid redirect location {:?}: {}", location, e);
                self.error(StatusCode::INTERNAL_SERVER_ERROR, "");
            }
        }
    }

    /// Convert into a response for the host server.
    pub fn into_response(self) -> Response<AxumBody> {
        let body = match self.body {
            ResponseBody::Buffered(buffer) => AxumBody::from(buffer.freeze()),
            ResponseBody::Streamed(body) => body,
        };
        let mut response = Response::new(body);
        *response.status_mut() = self.status.unwrap_or(StatusCode::OK);
        *response.headers_mut() = self.headers;
        response
    }
}

impl Default for ResponseWriter {
    fn default() -> Self {
        Self::new()
    }
}
