use crate::handlers::{Handler, HandlerError, HandlerKind, RequestContext};
use crate::http::request::Request;
use crate::http::response::Response;

type PageFn =
    dyn Fn(&RequestContext, &Request, &mut Response) -> Result<(), HandlerError> + Send + Sync;

/// Programmatic page backed by a closure.
///
/// Trailing path segments below the page's node reach the closure through
/// [`RequestContext::remaining`].
pub struct DynamicHandler {
    page: Box<PageFn>,
}

impl DynamicHandler {
    pub fn new<F>(page: F) -> Self
    where
        F: Fn(&RequestContext, &Request, &mut Response) -> Result<(), HandlerError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            page: Box::new(page),
        }
    }
}

impl Handler for DynamicHandler {
    fn kind(&self) -> HandlerKind {
        HandlerKind::Dynamic
    }

    fn handle(
        &self,
        ctx: &RequestContext,
        request: &Request,
        response: &mut Response,
    ) -> Result<(), HandlerError> {
        (self.page)(ctx, request, response)
    }
}
