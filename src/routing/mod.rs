//! Virtual host selection and resource routing.
//!
//! The [`Registry`] is built once at startup and is read-only afterwards:
//!
//! ```text
//!   Host header ──► HostResolver ──► VirtualHost
//!                                       │
//!   /static/css/site.css                ▼
//!    │      └──────────────► ResourceTree walk ──► (node, remaining)
//!    └─ resource class                                  │
//!                                                       ▼
//!                                            handler + trailing segments
//! ```

pub mod class;
pub mod host;
pub mod path;
pub mod registry;
pub mod tree;

use thiserror::Error;

use crate::handlers::HandlerKind;
use crate::http::request::Method;
use crate::http::response::StatusCode;

pub use class::ResourceClass;
pub use host::{HostResolver, Route, VirtualHost};
pub use path::NormalizedPath;
pub use registry::Registry;
pub use tree::{NodeId, Resolution, ResourceTree};

/// Failures found after a request parsed successfully.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RouteError {
    #[error("no virtual host matches {0:?}")]
    NoMatchingHost(String),
    #[error("no resource at {0}")]
    NotFound(String),
    #[error("method {0} not allowed here")]
    MethodNotAllowed(Method),
}

impl RouteError {
    pub fn status(&self) -> StatusCode {
        match self {
            // A request no host accepts points at server configuration.
            RouteError::NoMatchingHost(_) => StatusCode::InternalServerError,
            RouteError::NotFound(_) => StatusCode::NotFound,
            RouteError::MethodNotAllowed(_) => StatusCode::MethodNotAllowed,
        }
    }
}

/// Failures while building the routing tables at startup.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("host {0:?} is already registered")]
    DuplicateHost(String),
    #[error("invalid host name {0:?}")]
    InvalidHostName(String),
    #[error("unknown host {0:?}")]
    UnknownHost(String),
    #[error("path {0:?} does not start with a resource class")]
    MissingResourceClass(String),
    #[error("{kind} handler cannot be registered under the {class} class")]
    ClassMismatch {
        class: ResourceClass,
        kind: HandlerKind,
    },
    #[error("handler {name:?} already registered at {path}")]
    DuplicateHandler { path: String, name: String },
    #[error("handler name must not be empty")]
    EmptyHandlerName,
}
