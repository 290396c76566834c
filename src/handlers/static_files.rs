use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::debug;

use crate::handlers::{Handler, HandlerError, HandlerKind, RequestContext};
use crate::http::mime;
use crate::http::request::Request;
use crate::http::response::Response;

const INDEX_FILE: &str = "index.html";

/// Maps the segments left over by routing to a file below `root`.
#[derive(Debug, Clone)]
pub struct StaticFileHandler {
    root: PathBuf,
}

impl StaticFileHandler {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn locate(&self, ctx: &RequestContext) -> Result<PathBuf, HandlerError> {
        let mut path = self.root.clone();
        for segment in &ctx.remaining {
            // Normalization already removed `.` and `..`; separators and NULs
            // could still smuggle in a path of their own.
            if segment == ".." || segment.contains(['\\', '\0']) {
                return Err(HandlerError::Forbidden(ctx.remaining_path()));
            }
            path.push(segment);
        }

        if path.is_dir() {
            path.push(INDEX_FILE);
        }

        let root = self
            .root
            .canonicalize()
            .with_context(|| format!("static root {} is not accessible", self.root.display()))?;
        let resolved = path.canonicalize().map_err(|e| io_error(e.kind(), ctx))?;
        if !resolved.starts_with(&root) {
            return Err(HandlerError::Forbidden(ctx.remaining_path()));
        }
        Ok(resolved)
    }
}

fn io_error(kind: ErrorKind, ctx: &RequestContext) -> HandlerError {
    match kind {
        ErrorKind::NotFound => HandlerError::NotFound(format!("/{}", ctx.remaining_path())),
        ErrorKind::PermissionDenied => HandlerError::Forbidden(ctx.remaining_path()),
        other => HandlerError::Fault(anyhow::anyhow!(
            "reading {:?} failed: {}",
            ctx.remaining_path(),
            other
        )),
    }
}

impl Handler for StaticFileHandler {
    fn kind(&self) -> HandlerKind {
        HandlerKind::StaticFile
    }

    fn handle(
        &self,
        ctx: &RequestContext,
        _request: &Request,
        response: &mut Response,
    ) -> Result<(), HandlerError> {
        let path = self.locate(ctx)?;
        debug!(conn = ctx.connection_id, file = %path.display(), "Serving static file");

        let bytes = fs::read(&path).map_err(|e| io_error(e.kind(), ctx))?;
        let mime = mime::from_path(&path);
        response.set_mime(mime)?;
        response.set_compress(mime::is_compressible(mime))?;
        response.write_body(&bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::request::RequestBuilder;
    use crate::routing::class::ResourceClass;

    fn ctx(remaining: &[&str]) -> RequestContext {
        RequestContext {
            connection_id: 1,
            peer: None,
            host: "example.com".into(),
            class: ResourceClass::Static,
            handler_name: "index".into(),
            node_path: "/static".into(),
            remaining: remaining.iter().map(|s| s.to_string()).collect(),
            directory: false,
        }
    }

    fn request() -> Request {
        RequestBuilder::new()
            .uri("http://example.com/static/")
            .build()
            .unwrap()
    }

    #[test]
    fn serves_file_with_mime() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("css")).unwrap();
        fs::write(dir.path().join("css/site.css"), "body{}").unwrap();

        let handler = StaticFileHandler::new(dir.path());
        let mut resp = Response::new();
        handler.handle(&ctx(&["css", "site.css"]), &request(), &mut resp).unwrap();

        assert_eq!(resp.body(), b"body{}");
        assert_eq!(resp.mime(), "text/css");
        assert!(resp.compress());
    }

    #[test]
    fn directory_serves_index() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("index.html"), "<h1>home</h1>").unwrap();

        let handler = StaticFileHandler::new(dir.path());
        let mut resp = Response::new();
        handler.handle(&ctx(&[]), &request(), &mut resp).unwrap();

        assert_eq!(resp.body(), b"<h1>home</h1>");
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let handler = StaticFileHandler::new(dir.path());
        let mut resp = Response::new();

        let err = handler.handle(&ctx(&["nope.txt"]), &request(), &mut resp).unwrap_err();
        assert!(matches!(err, HandlerError::NotFound(_)));
    }

    #[test]
    fn leading_dots_in_file_names_are_allowed() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("..config"), "dotted").unwrap();

        let handler = StaticFileHandler::new(dir.path());
        let mut resp = Response::new();
        handler.handle(&ctx(&["..config"]), &request(), &mut resp).unwrap();

        assert_eq!(resp.body(), b"dotted");
    }

    #[test]
    fn backslash_segments_are_forbidden() {
        let dir = tempfile::tempdir().unwrap();
        let handler = StaticFileHandler::new(dir.path());
        let mut resp = Response::new();

        let err = handler.handle(&ctx(&["..\\secret"]), &request(), &mut resp).unwrap_err();
        assert!(matches!(err, HandlerError::Forbidden(_)));
    }
}
