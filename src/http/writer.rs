use std::io::Write;

use anyhow::Context;
use flate2::Compression;
use flate2::write::GzEncoder;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::http::request::{Method, Request, Version};
use crate::http::response::Response;

/// Per-request details that shape how a response is framed.
#[derive(Debug, Clone, Copy, Default)]
pub struct WriteOptions {
    pub version: Version,
    /// HEAD request: send the head and Content-Length only.
    pub head_only: bool,
    /// Client accepts gzip.
    pub gzip: bool,
}

impl WriteOptions {
    pub fn for_request(request: &Request) -> Self {
        Self {
            version: request.version(),
            head_only: request.method() == Method::HEAD,
            gzip: request.accepts_encoding("gzip"),
        }
    }
}

fn status_version(version: Version) -> &'static str {
    match version {
        Version::V1_1 => "HTTP/1.1",
        Version::V0_9 | Version::V1_0 => "HTTP/1.0",
    }
}

fn gzip(body: &[u8]) -> anyhow::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(body.len() / 2), Compression::default());
    encoder.write_all(body).context("gzip write failed")?;
    encoder.finish().context("gzip finish failed")
}

fn serialize_response(resp: &Response, opts: WriteOptions) -> anyhow::Result<Vec<u8>> {
    let mut buf = Vec::new();
    let status = resp.status();

    let status_line = format!(
        "{} {} {}\r\n",
        status_version(opts.version),
        status.as_u16(),
        status.reason_phrase()
    );
    buf.extend_from_slice(status_line.as_bytes());

    let compressed;
    let gzipped = !status.is_bodiless() && resp.compress() && opts.gzip && !resp.body().is_empty();
    let body: &[u8] = if status.is_bodiless() {
        &[]
    } else if gzipped {
        compressed = gzip(resp.body())?;
        &compressed
    } else {
        resp.body()
    };

    // Framing headers are always computed here, whatever the handler set.
    for (k, v) in resp.headers().iter() {
        if k.eq_ignore_ascii_case("Content-Length")
            || k.eq_ignore_ascii_case("Connection")
            || k.eq_ignore_ascii_case("Content-Encoding")
        {
            continue;
        }
        buf.extend_from_slice(k.as_bytes());
        buf.extend_from_slice(b": ");
        buf.extend_from_slice(v.as_bytes());
        buf.extend_from_slice(b"\r\n");
    }

    if !status.is_bodiless() {
        if !resp.headers().contains("Content-Type") {
            buf.extend_from_slice(format!("Content-Type: {}\r\n", resp.mime()).as_bytes());
        }
        if gzipped {
            buf.extend_from_slice(b"Content-Encoding: gzip\r\nVary: Accept-Encoding\r\n");
        }
        buf.extend_from_slice(format!("Content-Length: {}\r\n", body.len()).as_bytes());
    }
    buf.extend_from_slice(b"Connection: close\r\n");

    // Header/body separator
    buf.extend_from_slice(b"\r\n");

    if !opts.head_only {
        buf.extend_from_slice(body);
    }

    Ok(buf)
}

pub struct ResponseWriter {
    buffer: Vec<u8>,
    written: usize,
}

impl ResponseWriter {
    pub fn new(response: &Response, opts: WriteOptions) -> anyhow::Result<Self> {
        Ok(Self {
            buffer: serialize_response(response, opts)?,
            written: 0,
        })
    }

    /// Serialized bytes, head and body.
    pub fn bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub async fn write_to_stream<W>(&mut self, stream: &mut W) -> anyhow::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        while self.written < self.buffer.len() {
            let n = stream.write(&self.buffer[self.written..]).await?;

            if n == 0 {
                return Err(anyhow::anyhow!("connection closed while writing"));
            }

            self.written += n;
        }
        stream.flush().await?;

        Ok(())
    }
}
