//! Incremental HTTP request parser.
//!
//! The parser is a resumable state machine fed from a [`ByteBuffer`]. Each
//! call to [`RequestParser::advance`] consumes as many complete lines (or body
//! bytes) as are buffered and stops when it runs out, keeping everything it
//! has learned so far. It yields a [`Request`] exactly once, or a classified
//! [`ParseError`] after which it refuses to consume anything else.

use bytes::BytesMut;
use thiserror::Error;
use url::Url;

use crate::http::buffer::ByteBuffer;
use crate::http::headers::HeaderSet;
use crate::http::request::{Method, Request, Version};
use crate::http::response::StatusCode;

/// Default cap on the bytes a single request may occupy.
pub const DEFAULT_MAX_REQUEST_BYTES: usize = 1024 * 1024;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("malformed request line: {0:?}")]
    MalformedRequestLine(String),
    #[error("unsupported method: {0}")]
    UnsupportedMethod(String),
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(String),
    #[error("relative request target without a Host header")]
    MissingHostHeader,
    #[error("invalid request target: {0}")]
    InvalidRequestTarget(String),
    #[error("both Content-Length and Transfer-Encoding were sent")]
    AmbiguousBodyFraming,
    #[error("request body declared without a Content-Type")]
    MissingContentType,
    #[error("invalid Content-Length: {0}")]
    InvalidContentLength(String),
    #[error("unsupported transfer coding: {0}")]
    UnsupportedTransferEncoding(String),
    #[error("malformed chunked body")]
    MalformedChunk,
    #[error("request exceeds {0} bytes")]
    RequestTooLarge(usize),
}

impl ParseError {
    /// Status code reported to the client for this failure.
    pub fn status(&self) -> StatusCode {
        match self {
            ParseError::UnsupportedMethod(_) => StatusCode::MethodNotAllowed,
            ParseError::AmbiguousBodyFraming | ParseError::UnsupportedTransferEncoding(_) => {
                StatusCode::NotImplemented
            }
            ParseError::RequestTooLarge(_) => StatusCode::PayloadTooLarge,
            ParseError::MalformedRequestLine(_)
            | ParseError::UnsupportedVersion(_)
            | ParseError::MissingHostHeader
            | ParseError::InvalidRequestTarget(_)
            | ParseError::MissingContentType
            | ParseError::InvalidContentLength(_)
            | ParseError::MalformedChunk => StatusCode::BadRequest,
        }
    }
}

/// Where the parser currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    AwaitingRequestLine,
    AwaitingHeaderLine,
    AwaitingBody,
    Complete,
    Failed,
}

#[derive(Debug)]
pub enum ParseStatus {
    /// Everything buffered was consumed; push more bytes and call again.
    Incomplete,
    Complete(Request),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyFraming {
    Length(usize),
    Chunked(ChunkStage),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkStage {
    Size,
    Data(usize),
    DataEnd,
    Trailers,
}

#[derive(Debug)]
pub struct RequestParser {
    state: ParseState,
    method: Method,
    target: String,
    version: Version,
    headers: HeaderSet,
    uri: Option<Url>,
    framing: Option<BodyFraming>,
    body: BytesMut,
    consumed: usize,
    max_bytes: usize,
    error: Option<ParseError>,
}

impl Default for RequestParser {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestParser {
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_MAX_REQUEST_BYTES)
    }

    /// Parser rejecting requests larger than `max_bytes` (head plus body).
    pub fn with_limit(max_bytes: usize) -> Self {
        Self {
            state: ParseState::AwaitingRequestLine,
            method: Method::Unknown,
            target: String::new(),
            version: Version::default(),
            headers: HeaderSet::new(),
            uri: None,
            framing: None,
            body: BytesMut::new(),
            consumed: 0,
            max_bytes,
            error: None,
        }
    }

    pub fn state(&self) -> ParseState {
        self.state
    }

    /// Bytes of the current request consumed so far.
    pub fn consumed(&self) -> usize {
        self.consumed
    }

    /// Version announced on the request line, once it has been read.
    pub fn version(&self) -> Option<Version> {
        match self.state {
            ParseState::AwaitingRequestLine => None,
            _ => Some(self.version),
        }
    }

    /// Advances as far as the buffered bytes allow.
    ///
    /// After a request has been yielded the parser stays `Complete` and
    /// reports `Incomplete` without touching the buffer. After a failure it
    /// keeps returning the same error.
    pub fn advance(&mut self, buf: &mut ByteBuffer) -> Result<ParseStatus, ParseError> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }

        match self.run(buf) {
            Ok(status) => Ok(status),
            Err(err) => {
                self.state = ParseState::Failed;
                self.error = Some(err.clone());
                Err(err)
            }
        }
    }

    fn run(&mut self, buf: &mut ByteBuffer) -> Result<ParseStatus, ParseError> {
        loop {
            match self.state {
                ParseState::AwaitingRequestLine => {
                    let Some(line) = self.next_line(buf) else {
                        return self.incomplete(buf);
                    };
                    self.parse_request_line(&line)?;
                    self.state = ParseState::AwaitingHeaderLine;
                }
                ParseState::AwaitingHeaderLine => {
                    let Some(line) = self.next_line(buf) else {
                        return self.incomplete(buf);
                    };
                    if !line.is_empty() {
                        self.parse_header_line(&line);
                        continue;
                    }
                    self.finish_head()?;
                    if self.framing.is_none() {
                        return self.build(false).map(ParseStatus::Complete);
                    }
                    self.state = ParseState::AwaitingBody;
                }
                ParseState::AwaitingBody => {
                    if self.read_body(buf)? {
                        return self.build(true).map(ParseStatus::Complete);
                    }
                    return self.incomplete(buf);
                }
                ParseState::Complete | ParseState::Failed => return Ok(ParseStatus::Incomplete),
            }
        }
    }

    fn next_line(&mut self, buf: &mut ByteBuffer) -> Option<Vec<u8>> {
        let line = buf.peek_line()?.to_vec();
        buf.consume_line(line.len());
        self.consumed += line.len() + 2;
        Some(line)
    }

    fn incomplete(&self, buf: &ByteBuffer) -> Result<ParseStatus, ParseError> {
        self.check_limit(buf.len())?;
        Ok(ParseStatus::Incomplete)
    }

    /// Fails once `more` bytes on top of what was consumed would pass the
    /// limit. Sizes come from the client and may be near `usize::MAX`.
    fn check_limit(&self, more: usize) -> Result<(), ParseError> {
        match self.consumed.checked_add(more) {
            Some(total) if total <= self.max_bytes => Ok(()),
            _ => Err(ParseError::RequestTooLarge(self.max_bytes)),
        }
    }

    fn parse_request_line(&mut self, line: &[u8]) -> Result<(), ParseError> {
        let line = std::str::from_utf8(line)
            .map_err(|_| ParseError::MalformedRequestLine(String::from_utf8_lossy(line).into()))?;

        let parts: Vec<&str> = line.split(' ').collect();
        let [method, target, version] = parts.as_slice() else {
            return Err(ParseError::MalformedRequestLine(line.to_string()));
        };
        if target.is_empty() {
            return Err(ParseError::MalformedRequestLine(line.to_string()));
        }

        self.method = match Method::parse(method) {
            Method::Unknown => return Err(ParseError::UnsupportedMethod(method.to_string())),
            m => m,
        };
        self.version = Version::parse(version)
            .ok_or_else(|| ParseError::UnsupportedVersion(version.to_string()))?;
        self.target = target.to_string();
        Ok(())
    }

    // Lines without a colon are skipped rather than rejected.
    fn parse_header_line(&mut self, line: &[u8]) {
        let line = String::from_utf8_lossy(line);
        let Some((name, value)) = line.split_once(':') else {
            return;
        };
        let name = name.trim();
        if name.is_empty() {
            return;
        }
        self.headers.append(name, value.trim());
    }

    fn finish_head(&mut self) -> Result<(), ParseError> {
        self.uri = Some(self.resolve_target()?);

        let length = self.content_length_header()?;
        let coding = self.headers.get("Transfer-Encoding");

        self.framing = match (length, coding) {
            (None, None) => None,
            (Some(_), Some(_)) => return Err(ParseError::AmbiguousBodyFraming),
            _ if !self.headers.contains("Content-Type") => {
                return Err(ParseError::MissingContentType);
            }
            (Some(length), None) => {
                let n: usize = length
                    .trim()
                    .parse()
                    .map_err(|_| ParseError::InvalidContentLength(length.to_string()))?;
                self.check_limit(n)?;
                Some(BodyFraming::Length(n))
            }
            (None, Some(coding)) => {
                if !coding.trim().eq_ignore_ascii_case("chunked") {
                    return Err(ParseError::UnsupportedTransferEncoding(coding.to_string()));
                }
                Some(BodyFraming::Chunked(ChunkStage::Size))
            }
        };
        Ok(())
    }

    /// The Content-Length value, if sent. Repeated headers (or a comma
    /// list) must all carry the same value.
    fn content_length_header(&self) -> Result<Option<String>, ParseError> {
        let mut values = self
            .headers
            .get_all("Content-Length")
            .iter()
            .flat_map(|v| v.split(','))
            .map(str::trim);
        let Some(first) = values.next() else {
            return Ok(None);
        };
        if let Some(other) = values.find(|v| *v != first) {
            return Err(ParseError::InvalidContentLength(format!("{}, {}", first, other)));
        }
        Ok(Some(first.to_string()))
    }

    fn resolve_target(&self) -> Result<Url, ParseError> {
        let target = self.target.as_str();
        let invalid = || ParseError::InvalidRequestTarget(target.to_string());

        if target.starts_with('/') {
            let host = self
                .headers
                .get("Host")
                .map(str::trim)
                .filter(|h| !h.is_empty())
                .ok_or(ParseError::MissingHostHeader)?;
            // A Host value carrying a path, query or userinfo would shift the target.
            if host.contains(['/', '?', '#', '@', ' ']) {
                return Err(invalid());
            }
            let uri = Url::parse(&format!("http://{}{}", host, target)).map_err(|_| invalid())?;
            if uri.host_str().is_none() {
                return Err(invalid());
            }
            return Ok(uri);
        }

        let lower = target.get(..8).unwrap_or(target).to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            let uri = Url::parse(target).map_err(|_| invalid())?;
            if uri.host_str().is_none() {
                return Err(invalid());
            }
            return Ok(uri);
        }

        Err(invalid())
    }

    /// Returns true once the body is complete.
    fn read_body(&mut self, buf: &mut ByteBuffer) -> Result<bool, ParseError> {
        loop {
            let Some(framing) = self.framing else {
                return Ok(true);
            };
            match framing {
                BodyFraming::Length(total) => {
                    let missing = total - self.body.len();
                    let available = missing.min(buf.len());
                    if let Some(bytes) = buf.take(available) {
                        self.consumed += bytes.len();
                        self.body.extend_from_slice(&bytes);
                    }
                    return Ok(self.body.len() == total);
                }
                BodyFraming::Chunked(ChunkStage::Size) => {
                    let Some(line) = self.next_line(buf) else {
                        return Ok(false);
                    };
                    let size = parse_chunk_size(&line)?;
                    let stage = if size == 0 {
                        ChunkStage::Trailers
                    } else {
                        self.check_limit(size)?;
                        ChunkStage::Data(size)
                    };
                    self.framing = Some(BodyFraming::Chunked(stage));
                }
                BodyFraming::Chunked(ChunkStage::Data(remaining)) => {
                    let available = remaining.min(buf.len());
                    if available == 0 {
                        return Ok(false);
                    }
                    if let Some(bytes) = buf.take(available) {
                        self.consumed += bytes.len();
                        self.body.extend_from_slice(&bytes);
                    }
                    let stage = match remaining - available {
                        0 => ChunkStage::DataEnd,
                        left => ChunkStage::Data(left),
                    };
                    self.framing = Some(BodyFraming::Chunked(stage));
                }
                BodyFraming::Chunked(ChunkStage::DataEnd) => {
                    let Some(line) = self.next_line(buf) else {
                        return Ok(false);
                    };
                    if !line.is_empty() {
                        return Err(ParseError::MalformedChunk);
                    }
                    self.framing = Some(BodyFraming::Chunked(ChunkStage::Size));
                }
                BodyFraming::Chunked(ChunkStage::Trailers) => {
                    let Some(line) = self.next_line(buf) else {
                        return Ok(false);
                    };
                    if line.is_empty() {
                        return Ok(true);
                    }
                }
            }
        }
    }

    fn build(&mut self, with_body: bool) -> Result<Request, ParseError> {
        let uri = self
            .uri
            .take()
            .ok_or_else(|| ParseError::InvalidRequestTarget(self.target.clone()))?;
        self.state = ParseState::Complete;
        let body = with_body.then(|| std::mem::take(&mut self.body).freeze());
        Ok(Request::new(
            self.method,
            uri,
            self.version,
            std::mem::take(&mut self.headers),
            body,
        ))
    }
}

fn parse_chunk_size(line: &[u8]) -> Result<usize, ParseError> {
    let line = std::str::from_utf8(line).map_err(|_| ParseError::MalformedChunk)?;
    let digits = line.split(';').next().unwrap_or("").trim();
    usize::from_str_radix(digits, 16).map_err(|_| ParseError::MalformedChunk)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_all(input: &[u8]) -> Result<ParseStatus, ParseError> {
        let mut buf = ByteBuffer::new();
        buf.push(input);
        RequestParser::new().advance(&mut buf)
    }

    fn complete(input: &[u8]) -> Request {
        match parse_all(input) {
            Ok(ParseStatus::Complete(req)) => req,
            other => panic!("expected a complete request, got {:?}", other),
        }
    }

    #[test]
    fn parse_simple_get() {
        let req = complete(b"GET /x HTTP/1.1\r\nHost: a\r\n\r\n");

        assert_eq!(req.method(), Method::GET);
        assert_eq!(req.path(), "/x");
        assert_eq!(req.version(), Version::V1_1);
        assert_eq!(req.uri().as_str(), "http://a/x");
        assert!(req.body().is_none());
    }

    #[test]
    fn request_line_needs_three_tokens() {
        for line in ["GET /x\r\n\r\n", "GET /x HTTP/1.1 extra\r\n\r\n", "GET  /x HTTP/1.1\r\n\r\n"] {
            let err = parse_all(line.as_bytes()).unwrap_err();
            assert!(matches!(err, ParseError::MalformedRequestLine(_)), "{line:?}");
            assert_eq!(err.status(), StatusCode::BadRequest);
        }
    }

    #[test]
    fn chunk_size_accepts_extensions() {
        assert_eq!(parse_chunk_size(b"1a;name=value").unwrap(), 26);
        assert!(parse_chunk_size(b"zz").is_err());
    }

    #[test]
    fn failed_parser_consumes_nothing_more() {
        let mut buf = ByteBuffer::new();
        let mut parser = RequestParser::new();
        buf.push(b"FOO / HTTP/1.1\r\n");
        assert!(parser.advance(&mut buf).is_err());
        assert_eq!(parser.state(), ParseState::Failed);

        buf.push(b"Host: a\r\n\r\n");
        let before = buf.len();
        assert!(matches!(parser.advance(&mut buf), Err(ParseError::UnsupportedMethod(_))));
        assert_eq!(buf.len(), before);
    }

    #[test]
    fn huge_content_length_is_too_large() {
        let err = parse_all(
            b"POST / HTTP/1.1\r\nHost: a\r\nContent-Type: x\r\nContent-Length: 18446744073709551615\r\n\r\n",
        )
        .unwrap_err();
        assert_eq!(err, ParseError::RequestTooLarge(DEFAULT_MAX_REQUEST_BYTES));
    }

    #[test]
    fn huge_chunk_size_is_too_large() {
        let mut buf = ByteBuffer::new();
        let mut parser = RequestParser::new();
        buf.push(b"POST / HTTP/1.1\r\nHost: a\r\nContent-Type: x\r\nTransfer-Encoding: chunked\r\n\r\n");
        buf.push(format!("{:x}\r\n", usize::MAX).as_bytes());

        let err = parser.advance(&mut buf).unwrap_err();
        assert_eq!(err, ParseError::RequestTooLarge(DEFAULT_MAX_REQUEST_BYTES));
        assert_eq!(err.status(), StatusCode::PayloadTooLarge);
    }

    #[test]
    fn conflicting_content_lengths_rejected() {
        let err = parse_all(
            b"POST / HTTP/1.1\r\nHost: a\r\nContent-Type: x\r\nContent-Length: 3\r\nContent-Length: 4\r\n\r\nabcd",
        )
        .unwrap_err();
        assert!(matches!(err, ParseError::InvalidContentLength(_)));

        let err = parse_all(b"POST / HTTP/1.1\r\nHost: a\r\nContent-Type: x\r\nContent-Length: 3, 4\r\n\r\nabcd")
            .unwrap_err();
        assert!(matches!(err, ParseError::InvalidContentLength(_)));
    }

    #[test]
    fn repeated_equal_content_lengths_accepted() {
        let req = complete(
            b"POST / HTTP/1.1\r\nHost: a\r\nContent-Type: x\r\nContent-Length: 3\r\nContent-Length: 3\r\n\r\nabc",
        );
        assert_eq!(req.body().unwrap().as_ref(), b"abc");
    }

    #[test]
    fn head_larger_than_limit_fails() {
        let mut buf = ByteBuffer::new();
        let mut parser = RequestParser::with_limit(32);
        buf.push(b"GET /x HTTP/1.1\r\nX-Padding: aaaaaaaaaaaaaaaaaaaaaaaa");

        let err = parser.advance(&mut buf).unwrap_err();
        assert_eq!(err, ParseError::RequestTooLarge(32));
        assert_eq!(err.status(), StatusCode::PayloadTooLarge);
    }
}
