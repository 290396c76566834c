//! Request handlers.
//!
//! Every handler implements the single [`Handler`] capability. The few
//! behavioral differences between handler families are carried by the
//! [`HandlerKind`] tag, which is checked when a handler is registered under
//! a resource class and again when a request is dispatched to it.
//!
//! - **`static_files`**: filesystem-backed resources below a root directory
//! - **`dynamic`**: programmatic pages built from a closure
//! - **`embedded`**: assets compiled into the binary

pub mod dynamic;
pub mod embedded;
pub mod static_files;

use std::fmt;
use std::net::SocketAddr;

use thiserror::Error;

use crate::http::request::{Method, Request};
use crate::http::response::{Response, ResponseError, StatusCode};
use crate::routing::class::ResourceClass;

pub use dynamic::DynamicHandler;
pub use embedded::EmbeddedHandler;
pub use static_files::StaticFileHandler;

/// Handler family tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerKind {
    StaticFile,
    Dynamic,
    Embedded,
}

impl HandlerKind {
    /// File-backed and embedded handlers are read-only.
    pub fn allows_method(&self, method: Method) -> bool {
        match self {
            HandlerKind::Dynamic => true,
            HandlerKind::StaticFile | HandlerKind::Embedded => method.is_read_only(),
        }
    }

    /// Whether the handler resolves all trailing segments itself, as a
    /// file path below its node.
    pub fn maps_sub_path(&self) -> bool {
        matches!(self, HandlerKind::StaticFile | HandlerKind::Embedded)
    }
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HandlerKind::StaticFile => "static-file",
            HandlerKind::Dynamic => "dynamic",
            HandlerKind::Embedded => "embedded",
        };
        f.write_str(name)
    }
}

/// Failures a handler reports instead of a response.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error(transparent)]
    Response(#[from] ResponseError),
    #[error(transparent)]
    Fault(#[from] anyhow::Error),
}

impl HandlerError {
    pub fn status(&self) -> StatusCode {
        match self {
            HandlerError::NotFound(_) => StatusCode::NotFound,
            HandlerError::Forbidden(_) => StatusCode::Forbidden,
            HandlerError::Response(_) | HandlerError::Fault(_) => StatusCode::InternalServerError,
        }
    }
}

/// Everything the router learned about a request, passed explicitly to the
/// handler.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Connection serving the request.
    pub connection_id: u64,
    pub peer: Option<SocketAddr>,
    /// Name of the virtual host that matched.
    pub host: String,
    pub class: ResourceClass,
    /// Name the handler was registered under.
    pub handler_name: String,
    /// Path of the node the handler is attached to, class segment included.
    pub node_path: String,
    /// Path segments below the handler's node, left for the handler to
    /// interpret.
    pub remaining: Vec<String>,
    /// The request path ended with `/`.
    pub directory: bool,
}

impl RequestContext {
    /// Remaining segments joined with `/`.
    pub fn remaining_path(&self) -> String {
        self.remaining.join("/")
    }
}

pub trait Handler: Send + Sync {
    fn kind(&self) -> HandlerKind;

    /// Produces the response for a routed request.
    ///
    /// Status, headers and mime type must be set before body bytes are
    /// written to `response`.
    fn handle(
        &self,
        ctx: &RequestContext,
        request: &Request,
        response: &mut Response,
    ) -> Result<(), HandlerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_only_kinds_reject_writes() {
        assert!(HandlerKind::StaticFile.allows_method(Method::GET));
        assert!(HandlerKind::Embedded.allows_method(Method::HEAD));
        assert!(!HandlerKind::StaticFile.allows_method(Method::POST));
        assert!(!HandlerKind::Embedded.allows_method(Method::PROPFIND));
        assert!(HandlerKind::Dynamic.allows_method(Method::MKCOL));
    }

    #[test]
    fn error_statuses() {
        assert_eq!(HandlerError::NotFound("x".into()).status(), StatusCode::NotFound);
        assert_eq!(
            HandlerError::Fault(anyhow::anyhow!("boom")).status(),
            StatusCode::InternalServerError
        );
    }
}
