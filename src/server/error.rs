//! Failure classification and the error responder.
//!
//! Every stage classifies its own failures; what crosses into the
//! [`ErrorResponder`] is only a status code and a detail string.

use crate::handlers::HandlerError;
use crate::http::connection::ConnectionInfo;
use crate::http::parser::ParseError;
use crate::http::response::{Response, StatusCode};
use crate::routing::RouteError;

/// A classified failure on its way to the error responder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub status: StatusCode,
    pub detail: String,
}

impl Failure {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::InternalServerError, detail)
    }
}

impl From<ParseError> for Failure {
    fn from(err: ParseError) -> Self {
        Self::new(err.status(), err.to_string())
    }
}

impl From<RouteError> for Failure {
    fn from(err: RouteError) -> Self {
        Self::new(err.status(), err.to_string())
    }
}

impl From<HandlerError> for Failure {
    fn from(err: HandlerError) -> Self {
        Self::new(err.status(), err.to_string())
    }
}

/// Produces the response sent for a failed request.
pub trait ErrorResponder: Send + Sync {
    fn respond(&self, conn: &ConnectionInfo, status: StatusCode, detail: &str) -> Response;
}

/// Small HTML error page.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultErrorResponder;

impl ErrorResponder for DefaultErrorResponder {
    fn respond(&self, _conn: &ConnectionInfo, status: StatusCode, detail: &str) -> Response {
        let body = format!(
            "<!DOCTYPE html>\n<html><head><title>{code} {reason}</title></head>\
             <body><h1>{code} {reason}</h1><p>{detail}</p></body></html>\n",
            code = status.as_u16(),
            reason = status.reason_phrase(),
            detail = escape_html(detail),
        );
        Response::with_status(status).with_body(body)
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_errors_keep_their_status() {
        let failure = Failure::from(ParseError::AmbiguousBodyFraming);
        assert_eq!(failure.status, StatusCode::NotImplemented);

        let failure = Failure::from(RouteError::NoMatchingHost("x".into()));
        assert_eq!(failure.status, StatusCode::InternalServerError);
    }

    #[test]
    fn default_page_escapes_detail() {
        let resp = DefaultErrorResponder.respond(
            &ConnectionInfo::new(3, None),
            StatusCode::NotFound,
            "<script>",
        );
        let body = String::from_utf8_lossy(resp.body());

        assert_eq!(resp.status(), StatusCode::NotFound);
        assert!(body.contains("404 Not Found"));
        assert!(body.contains("&lt;script&gt;"));
        assert!(!body.contains("<script>"));
    }
}
