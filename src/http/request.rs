use bytes::Bytes;
use std::fmt;
use url::Url;

use crate::http::headers::HeaderSet;

/// HTTP request methods, including the WebDAV extensions.
///
/// Method tokens are case-sensitive. Anything outside the fixed set parses
/// to [`Method::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    GET,
    HEAD,
    POST,
    PUT,
    DELETE,
    TRACE,
    OPTIONS,
    CONNECT,
    PROPFIND,
    PROPPATCH,
    MKCOL,
    COPY,
    MOVE,
    LOCK,
    UNLOCK,
    Unknown,
}

impl Method {
    /// Parses an HTTP method token.
    ///
    /// ```
    /// # use vhostd::http::request::Method;
    /// assert_eq!(Method::parse("GET"), Method::GET);
    /// assert_eq!(Method::parse("get"), Method::Unknown);
    /// ```
    pub fn parse(s: &str) -> Self {
        match s {
            "GET" => Method::GET,
            "HEAD" => Method::HEAD,
            "POST" => Method::POST,
            "PUT" => Method::PUT,
            "DELETE" => Method::DELETE,
            "TRACE" => Method::TRACE,
            "OPTIONS" => Method::OPTIONS,
            "CONNECT" => Method::CONNECT,
            "PROPFIND" => Method::PROPFIND,
            "PROPPATCH" => Method::PROPPATCH,
            "MKCOL" => Method::MKCOL,
            "COPY" => Method::COPY,
            "MOVE" => Method::MOVE,
            "LOCK" => Method::LOCK,
            "UNLOCK" => Method::UNLOCK,
            _ => Method::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::GET => "GET",
            Method::HEAD => "HEAD",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::DELETE => "DELETE",
            Method::TRACE => "TRACE",
            Method::OPTIONS => "OPTIONS",
            Method::CONNECT => "CONNECT",
            Method::PROPFIND => "PROPFIND",
            Method::PROPPATCH => "PROPPATCH",
            Method::MKCOL => "MKCOL",
            Method::COPY => "COPY",
            Method::MOVE => "MOVE",
            Method::LOCK => "LOCK",
            Method::UNLOCK => "UNLOCK",
            Method::Unknown => "UNKNOWN",
        }
    }

    /// GET and HEAD, the only methods read-only handlers serve.
    pub fn is_read_only(&self) -> bool {
        matches!(self, Method::GET | Method::HEAD)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Protocol versions accepted on the request line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Version {
    V0_9,
    V1_0,
    #[default]
    V1_1,
}

impl Version {
    /// Matches the exact version token, e.g. `HTTP/1.1`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "HTTP/0.9" => Some(Version::V0_9),
            "HTTP/1.0" => Some(Version::V1_0),
            "HTTP/1.1" => Some(Version::V1_1),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Version::V0_9 => "HTTP/0.9",
            Version::V1_0 => "HTTP/1.0",
            Version::V1_1 => "HTTP/1.1",
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully parsed HTTP request.
///
/// Requests are only produced complete, by the parser or by
/// [`RequestBuilder`], and cannot be mutated afterwards. The target is
/// always an absolute URI.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    uri: Url,
    version: Version,
    headers: HeaderSet,
    body: Option<Bytes>,
}

impl Request {
    pub(crate) fn new(
        method: Method,
        uri: Url,
        version: Version,
        headers: HeaderSet,
        body: Option<Bytes>,
    ) -> Self {
        Self {
            method,
            uri,
            version,
            headers,
            body,
        }
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn uri(&self) -> &Url {
        &self.uri
    }

    /// Path component of the target, e.g. `/static/app.css`.
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn query(&self) -> Option<&str> {
        self.uri.query()
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn headers(&self) -> &HeaderSet {
        &self.headers
    }

    /// Retrieves a header value by name, ignoring case.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key)
    }

    /// Host used for virtual host selection: the `Host` header when sent,
    /// otherwise the authority of an absolute target.
    pub fn host(&self) -> Option<&str> {
        self.header("Host").or_else(|| self.uri.host_str())
    }

    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }

    /// Declared Content-Length, if present and numeric.
    pub fn content_length(&self) -> Option<usize> {
        self.header("Content-Length").and_then(|v| v.trim().parse().ok())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("Content-Type")
    }

    /// Whether `Accept-Encoding` lists the given coding.
    pub fn accepts_encoding(&self, coding: &str) -> bool {
        self.headers.get_all("Accept-Encoding").iter().any(|v| {
            v.split(',')
                .map(|c| c.split(';').next().unwrap_or("").trim())
                .any(|c| c.eq_ignore_ascii_case(coding))
        })
    }
}

/// Builder for constructing Request objects outside the parser.
pub struct RequestBuilder {
    method: Method,
    uri: Option<String>,
    version: Version,
    headers: HeaderSet,
    body: Option<Bytes>,
}

impl Default for RequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestBuilder {
    pub fn new() -> Self {
        Self {
            method: Method::GET,
            uri: None,
            version: Version::V1_1,
            headers: HeaderSet::new(),
            body: None,
        }
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Absolute target URI, e.g. `http://example.com/index.html`.
    pub fn uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    pub fn version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(key, value);
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn build(self) -> Result<Request, &'static str> {
        let uri = self.uri.ok_or("uri missing")?;
        let uri = Url::parse(&uri).map_err(|_| "uri is not absolute")?;
        Ok(Request::new(
            self.method,
            uri,
            self.version,
            self.headers,
            self.body,
        ))
    }
}
