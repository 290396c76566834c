use std::collections::HashMap;

use crate::handlers::{Handler, HandlerError, HandlerKind, RequestContext};
use crate::http::mime;
use crate::http::request::Request;
use crate::http::response::Response;

/// Serves assets compiled into the binary, keyed by their path relative to
/// the handler's node (e.g. `css/site.css`).
#[derive(Debug, Default)]
pub struct EmbeddedHandler {
    assets: HashMap<String, &'static [u8]>,
    index: Option<String>,
}

impl EmbeddedHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_asset(mut self, name: impl Into<String>, bytes: &'static [u8]) -> Self {
        self.assets.insert(name.into(), bytes);
        self
    }

    /// Asset served when no trailing path is given.
    pub fn with_index(mut self, name: impl Into<String>) -> Self {
        self.index = Some(name.into());
        self
    }
}

impl Handler for EmbeddedHandler {
    fn kind(&self) -> HandlerKind {
        HandlerKind::Embedded
    }

    fn handle(
        &self,
        ctx: &RequestContext,
        _request: &Request,
        response: &mut Response,
    ) -> Result<(), HandlerError> {
        let name = match (ctx.remaining.is_empty(), &self.index) {
            (true, Some(index)) => index.clone(),
            _ => ctx.remaining_path(),
        };
        let bytes = self
            .assets
            .get(&name)
            .ok_or_else(|| HandlerError::NotFound(format!("no embedded asset {:?}", name)))?;

        let mime = mime::from_path(&name);
        response.set_mime(mime)?;
        response.set_compress(mime::is_compressible(mime))?;
        response.write_body(bytes);
        Ok(())
    }
}
