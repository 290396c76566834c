//! Routing and handler invocation for parsed requests.

use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::handlers::{HandlerError, RequestContext};
use crate::http::connection::ConnectionInfo;
use crate::http::request::Request;
use crate::http::response::Response;
use crate::routing::{Registry, Route, RouteError};
use crate::server::error::{DefaultErrorResponder, ErrorResponder, Failure};

/// Owns the routing tables and the error responder of one server instance.
pub struct Dispatcher {
    registry: Arc<Registry>,
    responder: Arc<dyn ErrorResponder>,
}

impl Dispatcher {
    pub fn new(registry: Registry) -> Self {
        Self::with_responder(registry, Arc::new(DefaultErrorResponder))
    }

    pub fn with_responder(registry: Registry, responder: Arc<dyn ErrorResponder>) -> Self {
        Self {
            registry: Arc::new(registry),
            responder,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn responder(&self) -> &dyn ErrorResponder {
        self.responder.as_ref()
    }

    /// Selects the virtual host and handler for a request.
    pub fn route(
        &self,
        conn: &ConnectionInfo,
        request: &Request,
    ) -> Result<(Route, RequestContext), Failure> {
        let (host, route) = self
            .registry
            .route(request.host(), request.path())
            .inspect_err(|e| debug!(conn = conn.id, error = %e, "Routing failed"))?;

        if !route.handler.kind().allows_method(request.method()) {
            return Err(RouteError::MethodNotAllowed(request.method()).into());
        }

        let ctx = RequestContext {
            connection_id: conn.id,
            peer: conn.peer,
            host: host.name().to_string(),
            class: route.class,
            handler_name: route.handler_name.clone(),
            node_path: route.node_path.clone(),
            remaining: route.remaining.clone(),
            directory: route.directory,
        };
        Ok((route, ctx))
    }

    /// Runs the handler on the blocking pool. Handler errors and panics are
    /// turned into failures here and never escape further.
    pub async fn invoke(
        &self,
        route: &Route,
        ctx: RequestContext,
        request: Arc<Request>,
    ) -> Result<Response, Failure> {
        let handler = Arc::clone(&route.handler);
        let conn = ctx.connection_id;
        let handler_name = ctx.handler_name.clone();

        let result = tokio::task::spawn_blocking(move || {
            let mut response = Response::new();
            handler
                .handle(&ctx, &request, &mut response)
                .map(|()| response)
        })
        .await;

        match result {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(err)) => {
                match &err {
                    HandlerError::NotFound(_) | HandlerError::Forbidden(_) => {
                        debug!(conn, handler = %handler_name, error = %err, "Handler declined request");
                    }
                    HandlerError::Response(_) | HandlerError::Fault(_) => {
                        error!(conn, handler = %handler_name, error = %err, "Handler failed");
                    }
                }
                Err(err.into())
            }
            Err(join) if join.is_panic() => {
                error!(conn, handler = %handler_name, "Handler panicked");
                Err(Failure::internal(format!("handler {:?} panicked", handler_name)))
            }
            Err(join) => {
                warn!(conn, handler = %handler_name, error = %join, "Handler task cancelled");
                Err(Failure::internal("handler was cancelled"))
            }
        }
    }
}
