//! Listening sockets, dispatch to handlers and error responses.

pub mod dispatcher;
pub mod error;
pub mod listener;

pub use dispatcher::Dispatcher;
pub use error::{DefaultErrorResponder, ErrorResponder, Failure};
pub use listener::{Server, ShutdownHandle};
