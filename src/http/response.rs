use std::io;

use thiserror::Error;

use crate::http::headers::HeaderSet;

/// HTTP status codes produced by the server or its handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    /// 200 OK
    Ok,
    /// 201 Created
    Created,
    /// 204 No Content
    NoContent,
    /// 301 Moved Permanently
    MovedPermanently,
    /// 304 Not Modified
    NotModified,
    /// 400 Bad Request
    BadRequest,
    /// 403 Forbidden
    Forbidden,
    /// 404 Not Found
    NotFound,
    /// 405 Method Not Allowed
    MethodNotAllowed,
    /// 408 Request Timeout
    RequestTimeout,
    /// 413 Payload Too Large
    PayloadTooLarge,
    /// 500 Internal Server Error
    InternalServerError,
    /// 501 Not Implemented
    NotImplemented,
}

impl StatusCode {
    /// Returns the numeric HTTP status code.
    ///
    /// # Example
    ///
    /// ```
    /// # use vhostd::http::response::StatusCode;
    /// assert_eq!(StatusCode::Ok.as_u16(), 200);
    /// assert_eq!(StatusCode::NotImplemented.as_u16(), 501);
    /// ```
    pub fn as_u16(&self) -> u16 {
        match self {
            StatusCode::Ok => 200,
            StatusCode::Created => 201,
            StatusCode::NoContent => 204,
            StatusCode::MovedPermanently => 301,
            StatusCode::NotModified => 304,
            StatusCode::BadRequest => 400,
            StatusCode::Forbidden => 403,
            StatusCode::NotFound => 404,
            StatusCode::MethodNotAllowed => 405,
            StatusCode::RequestTimeout => 408,
            StatusCode::PayloadTooLarge => 413,
            StatusCode::InternalServerError => 500,
            StatusCode::NotImplemented => 501,
        }
    }

    /// Returns the standard HTTP reason phrase for this status code.
    pub fn reason_phrase(&self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::Created => "Created",
            StatusCode::NoContent => "No Content",
            StatusCode::MovedPermanently => "Moved Permanently",
            StatusCode::NotModified => "Not Modified",
            StatusCode::BadRequest => "Bad Request",
            StatusCode::Forbidden => "Forbidden",
            StatusCode::NotFound => "Not Found",
            StatusCode::MethodNotAllowed => "Method Not Allowed",
            StatusCode::RequestTimeout => "Request Timeout",
            StatusCode::PayloadTooLarge => "Payload Too Large",
            StatusCode::InternalServerError => "Internal Server Error",
            StatusCode::NotImplemented => "Not Implemented",
        }
    }

    /// Statuses that never carry a body.
    pub fn is_bodiless(&self) -> bool {
        matches!(self, StatusCode::NoContent | StatusCode::NotModified)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResponseError {
    #[error("response head is fixed once body bytes have been written")]
    HeadersSent,
}

/// Response under construction by a handler.
///
/// Status, headers, mime type and the compression flag form the response
/// head. The head is frozen as soon as the first body byte is written; any
/// later attempt to change it fails with [`ResponseError::HeadersSent`].
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: HeaderSet,
    mime: String,
    compress: bool,
    body: Vec<u8>,
    head_fixed: bool,
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    /// A `200 OK` response with a `text/html` mime type and no body.
    pub fn new() -> Self {
        Self::with_status(StatusCode::Ok)
    }

    pub fn with_status(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderSet::new(),
            mime: "text/html; charset=utf-8".to_string(),
            compress: false,
            body: Vec::new(),
            head_fixed: false,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderSet {
        &self.headers
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn compress(&self) -> bool {
        self.compress
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// True once body bytes have been written.
    pub fn head_fixed(&self) -> bool {
        self.head_fixed
    }

    fn ensure_head_open(&self) -> Result<(), ResponseError> {
        if self.head_fixed {
            return Err(ResponseError::HeadersSent);
        }
        Ok(())
    }

    pub fn set_status(&mut self, status: StatusCode) -> Result<(), ResponseError> {
        self.ensure_head_open()?;
        self.status = status;
        Ok(())
    }

    /// Adds or replaces a header.
    pub fn set_header(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), ResponseError> {
        self.ensure_head_open()?;
        self.headers.insert(key, value);
        Ok(())
    }

    pub fn set_mime(&mut self, mime: impl Into<String>) -> Result<(), ResponseError> {
        self.ensure_head_open()?;
        self.mime = mime.into();
        Ok(())
    }

    pub fn set_compress(&mut self, compress: bool) -> Result<(), ResponseError> {
        self.ensure_head_open()?;
        self.compress = compress;
        Ok(())
    }

    /// Appends body bytes and freezes the head.
    pub fn write_body(&mut self, bytes: &[u8]) {
        self.head_fixed = true;
        self.body.extend_from_slice(bytes);
    }

    /// Builder-style body setter used for responses assembled in one go.
    pub fn with_body(mut self, body: impl AsRef<[u8]>) -> Self {
        self.write_body(body.as_ref());
        self
    }
}

impl io::Write for Response {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_body(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn head_is_mutable_before_body() {
        let mut resp = Response::new();
        resp.set_status(StatusCode::Created).unwrap();
        resp.set_header("X-Id", "7").unwrap();
        resp.set_mime("application/json").unwrap();

        assert_eq!(resp.status(), StatusCode::Created);
        assert_eq!(resp.headers().get("x-id"), Some("7"));
        assert_eq!(resp.mime(), "application/json");
        assert!(!resp.head_fixed());
    }

    #[test]
    fn head_freezes_after_first_body_byte() {
        let mut resp = Response::new();
        write!(resp, "hello").unwrap();

        assert_eq!(resp.set_status(StatusCode::NotFound), Err(ResponseError::HeadersSent));
        assert_eq!(resp.set_header("A", "b"), Err(ResponseError::HeadersSent));
        assert_eq!(resp.set_compress(true), Err(ResponseError::HeadersSent));
        assert_eq!(resp.status(), StatusCode::Ok);
        assert_eq!(resp.body(), b"hello");
    }

    #[test]
    fn reason_phrases_match_codes() {
        assert_eq!(StatusCode::NotFound.as_u16(), 404);
        assert_eq!(StatusCode::NotFound.reason_phrase(), "Not Found");
        assert_eq!(StatusCode::MethodNotAllowed.as_u16(), 405);
        assert!(StatusCode::NoContent.is_bodiless());
    }
}
