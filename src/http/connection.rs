use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};

use crate::config::Config;
use crate::handlers::RequestContext;
use crate::http::buffer::ByteBuffer;
use crate::http::parser::{DEFAULT_MAX_REQUEST_BYTES, ParseStatus, RequestParser};
use crate::http::request::Request;
use crate::http::response::{Response, StatusCode};
use crate::http::writer::{ResponseWriter, WriteOptions};
use crate::routing::Route;
use crate::server::dispatcher::Dispatcher;
use crate::server::error::Failure;

const READ_CHUNK: usize = 4096;

/// Identity of one accepted connection, shared with handlers and the error
/// responder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub id: u64,
    pub peer: Option<SocketAddr>,
}

impl ConnectionInfo {
    pub fn new(id: u64, peer: Option<SocketAddr>) -> Self {
        Self { id, peer }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ConnectionSettings {
    /// Longest wait for the next bytes from the client.
    pub idle_timeout: Duration,
    /// Longest time between the first byte and a complete request.
    pub request_timeout: Duration,
    pub max_request_bytes: usize,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(10),
            max_request_bytes: DEFAULT_MAX_REQUEST_BYTES,
        }
    }
}

impl ConnectionSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            idle_timeout: cfg.idle_timeout(),
            request_timeout: cfg.request_timeout(),
            max_request_bytes: cfg.max_request_bytes,
        }
    }
}

pub enum ConnectionState {
    Accepted,
    Reading,
    Parsed(Arc<Request>),
    Routed {
        request: Arc<Request>,
        route: Route,
        ctx: RequestContext,
    },
    HandlerInvoked {
        request: Arc<Request>,
        response: Response,
    },
    Responding {
        writer: ResponseWriter,
        status: StatusCode,
        request: Option<Arc<Request>>,
    },
    Erroring(Failure, Option<Arc<Request>>),
    Closed,
}

impl ConnectionState {
    pub fn name(&self) -> &'static str {
        match self {
            ConnectionState::Accepted => "accepted",
            ConnectionState::Reading => "reading",
            ConnectionState::Parsed(_) => "parsed",
            ConnectionState::Routed { .. } => "routed",
            ConnectionState::HandlerInvoked { .. } => "handler-invoked",
            ConnectionState::Responding { .. } => "responding",
            ConnectionState::Erroring(..) => "erroring",
            ConnectionState::Closed => "closed",
        }
    }
}

enum ReadOutcome {
    Request(Request),
    Failed(Failure),
    Closed,
}

/// One request/response cycle on one socket.
///
/// The connection exclusively owns its stream, receive buffer and parser.
/// It is driven to completion by a single task and closes the stream when
/// done, whatever the outcome.
pub struct Connection<S> {
    stream: S,
    info: ConnectionInfo,
    buffer: ByteBuffer,
    parser: RequestParser,
    settings: ConnectionSettings,
    dispatcher: Arc<Dispatcher>,
    state: ConnectionState,
    accepted_at: Instant,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(
        stream: S,
        info: ConnectionInfo,
        dispatcher: Arc<Dispatcher>,
        settings: ConnectionSettings,
    ) -> Self {
        Self {
            stream,
            info,
            buffer: ByteBuffer::new(),
            parser: RequestParser::with_limit(settings.max_request_bytes),
            settings,
            dispatcher,
            state: ConnectionState::Accepted,
            accepted_at: Instant::now(),
        }
    }

    pub fn info(&self) -> &ConnectionInfo {
        &self.info
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    /// Drives the connection to `Closed`. Transport failures are returned;
    /// protocol, routing and handler failures are answered on the wire.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        let result = self.drive().await;
        if let Err(e) = self.stream.shutdown().await {
            trace!(conn = self.info.id, error = %e, "Shutdown after close failed");
        }
        self.state = ConnectionState::Closed;
        debug!(conn = self.info.id, "Connection closed");
        result
    }

    async fn drive(&mut self) -> anyhow::Result<()> {
        loop {
            let state = std::mem::replace(&mut self.state, ConnectionState::Closed);
            trace!(conn = self.info.id, state = state.name(), "Connection step");

            self.state = match state {
                ConnectionState::Accepted => ConnectionState::Reading,

                ConnectionState::Reading => match self.read_request().await? {
                    ReadOutcome::Request(request) => ConnectionState::Parsed(Arc::new(request)),
                    ReadOutcome::Failed(failure) => ConnectionState::Erroring(failure, None),
                    ReadOutcome::Closed => ConnectionState::Closed,
                },

                ConnectionState::Parsed(request) => {
                    match self.dispatcher.route(&self.info, &request) {
                        Ok((route, ctx)) => ConnectionState::Routed {
                            request,
                            route,
                            ctx,
                        },
                        Err(failure) => ConnectionState::Erroring(failure, Some(request)),
                    }
                }

                ConnectionState::Routed {
                    request,
                    route,
                    ctx,
                } => {
                    let outcome = self
                        .dispatcher
                        .invoke(&route, ctx, Arc::clone(&request))
                        .await;
                    match outcome {
                        Ok(response) => ConnectionState::HandlerInvoked { request, response },
                        Err(failure) => ConnectionState::Erroring(failure, Some(request)),
                    }
                }

                ConnectionState::HandlerInvoked { request, response } => {
                    match ResponseWriter::new(&response, WriteOptions::for_request(&request)) {
                        Ok(writer) => ConnectionState::Responding {
                            writer,
                            status: response.status(),
                            request: Some(request),
                        },
                        Err(e) => {
                            ConnectionState::Erroring(Failure::internal(e.to_string()), Some(request))
                        }
                    }
                }

                ConnectionState::Erroring(failure, request) => {
                    let response = self.dispatcher.responder().respond(
                        &self.info,
                        failure.status,
                        &failure.detail,
                    );
                    let opts = match &request {
                        Some(request) => WriteOptions::for_request(request),
                        None => WriteOptions {
                            version: self.parser.version().unwrap_or_default(),
                            ..WriteOptions::default()
                        },
                    };
                    ConnectionState::Responding {
                        writer: ResponseWriter::new(&response, opts)?,
                        status: failure.status,
                        request,
                    }
                }

                ConnectionState::Responding {
                    mut writer,
                    status,
                    request,
                } => {
                    writer
                        .write_to_stream(&mut self.stream)
                        .await
                        .context("writing response failed")?;
                    self.log_access(status, request.as_deref());
                    ConnectionState::Closed
                }

                ConnectionState::Closed => break,
            };
        }

        Ok(())
    }

    async fn read_request(&mut self) -> anyhow::Result<ReadOutcome> {
        let mut first_byte_at: Option<Instant> = None;

        loop {
            // Try parsing whatever we already have
            match self.parser.advance(&mut self.buffer) {
                Ok(ParseStatus::Complete(request)) => return Ok(ReadOutcome::Request(request)),
                Ok(ParseStatus::Incomplete) => {}
                Err(e) => {
                    warn!(conn = self.info.id, peer = ?self.info.peer, error = %e, "Malformed request");
                    return Ok(ReadOutcome::Failed(e.into()));
                }
            }

            let wait = match first_byte_at {
                None => self.settings.idle_timeout,
                Some(at) => self
                    .settings
                    .idle_timeout
                    .min(self.settings.request_timeout.saturating_sub(at.elapsed())),
            };

            let mut temp = [0u8; READ_CHUNK];
            let n = match timeout(wait, self.stream.read(&mut temp)).await {
                Err(_) if self.buffer.total_received() == 0 => {
                    debug!(conn = self.info.id, "Idle connection timed out");
                    return Ok(ReadOutcome::Closed);
                }
                Err(_) => {
                    debug!(conn = self.info.id, received = self.buffer.total_received(), "Request timed out");
                    return Ok(ReadOutcome::Failed(Failure::new(
                        StatusCode::RequestTimeout,
                        "request was not completed in time",
                    )));
                }
                Ok(read) => read.context("socket read failed")?,
            };

            if n == 0 {
                // Client closed connection
                if self.buffer.total_received() > 0 {
                    debug!(conn = self.info.id, "Client closed mid-request");
                }
                return Ok(ReadOutcome::Closed);
            }

            first_byte_at.get_or_insert_with(Instant::now);
            self.buffer.push(&temp[..n]);
        }
    }

    fn log_access(&self, status: StatusCode, request: Option<&Request>) {
        let elapsed_ms = self.accepted_at.elapsed().as_millis() as u64;
        match request {
            Some(request) => info!(
                conn = self.info.id,
                peer = ?self.info.peer,
                method = %request.method(),
                uri = %request.uri(),
                status = status.as_u16(),
                elapsed_ms,
                "Request served"
            ),
            None => info!(
                conn = self.info.id,
                peer = ?self.info.peer,
                status = status.as_u16(),
                elapsed_ms,
                "Request rejected"
            ),
        }
    }
}
