//! Socket transport: the stream-based variant over raw TCP/TLS.
//!
//! Writes an HTTP/1.1 request head and body over the stream, then reads the
//! status line, header block, and body (content-length, chunked, or
//! close-delimited framing) until completion. Plain or TLS streams are
//! selected by URL scheme.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::Method;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::TlsConnector;
use tracing::debug;
use url::Url;

use super::{Dispatch, TerminalSignal, TransportBackend, TransportCall, TransportKind};
use crate::errors::FailureKind;
use crate::headers::Headers;
use crate::DEFAULT_USER_AGENT;

/// Connection-reuse handle for the socket transport, keyed by scheme in
/// [`crate::config::AgentOptions`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketAgent {
    /// Limit on establishing the TCP connection.
    pub connect_timeout: Option<Duration>,
    /// Disable Nagle's algorithm on the connection.
    pub nodelay: bool,
}

impl Default for SocketAgent {
    fn default() -> Self {
        Self {
            connect_timeout: Some(Duration::from_secs(30)),
            nodelay: true,
        }
    }
}

/// Stream-based transport over raw TCP/TLS sockets.
#[derive(Debug, Clone, Default)]
pub struct SocketTransport;

impl SocketTransport {
    /// Creates a socket transport.
    pub fn new() -> Self {
        Self
    }

    async fn run(&self, call: &TransportCall) -> io::Result<(u16, Headers, Bytes)> {
        let url = &call.url;
        let secure = url.scheme() == "https";
        let host = url
            .host_str()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "URL has no host"))?;
        let port = url
            .port_or_known_default()
            .unwrap_or(if secure { 443 } else { 80 });

        let agent = if secure {
            call.agents.secure.clone()
        } else {
            call.agents.insecure.clone()
        }
        .unwrap_or_else(|| Arc::new(SocketAgent::default()));

        let tcp = connect(host, port, &agent).await?;
        if secure {
            let tls = tls_connect(host, tcp).await?;
            let mut stream = BufReader::new(tls);
            exchange(&mut stream, call).await
        } else {
            let mut stream = BufReader::new(tcp);
            exchange(&mut stream, call).await
        }
    }
}

#[async_trait]
impl TransportBackend for SocketTransport {
    async fn execute(&self, mut call: TransportCall) -> Dispatch {
        if !call.headers.contains("user-agent") {
            call.headers.set("user-agent", DEFAULT_USER_AGENT);
        }
        if !call.headers.contains("host") {
            call.headers.set("host", host_header(&call.url));
        }
        if !call.headers.contains("connection") {
            call.headers.set("connection", "close");
        }
        if let Some(body) = &call.body {
            if !body.is_empty() {
                call.headers.set("content-length", body.len() as u64);
            }
        }

        let headers_sent = call.headers.clone();

        let signal = tokio::select! {
            _ = call.abort.triggered() => {
                debug!(url = %call.url, "in-flight call aborted");
                TerminalSignal::Failure {
                    kind: FailureKind::Abort,
                    status: None,
                    headers: Headers::new(),
                }
            }
            outcome = with_deadline(call.timeout, self.run(&call)) => match outcome {
                Ok(Ok((status, headers, body))) => TerminalSignal::Response { status, headers, body },
                Ok(Err(error)) => {
                    debug!(%error, url = %call.url, "socket dispatch failed");
                    TerminalSignal::Failure {
                        kind: classify_io(&error),
                        status: None,
                        headers: Headers::new(),
                    }
                }
                // The elapsed branch drops the in-flight I/O future, which
                // owns the stream: reporting the timeout also tears the
                // connection down.
                Err(_) => {
                    debug!(url = %call.url, "socket dispatch timed out");
                    TerminalSignal::Failure {
                        kind: FailureKind::Timeout,
                        status: None,
                        headers: Headers::new(),
                    }
                }
            }
        };

        Dispatch {
            signal,
            headers_sent,
        }
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Socket
    }
}

async fn with_deadline<F>(
    deadline: Option<Duration>,
    future: F,
) -> Result<F::Output, tokio::time::error::Elapsed>
where
    F: std::future::Future,
{
    match deadline {
        Some(limit) => timeout(limit, future).await,
        None => Ok(future.await),
    }
}

async fn connect(host: &str, port: u16, agent: &SocketAgent) -> io::Result<TcpStream> {
    let address = format!("{host}:{port}");
    let stream = match agent.connect_timeout {
        Some(limit) => timeout(limit, TcpStream::connect(&address))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "connect timed out"))??,
        None => TcpStream::connect(&address).await?,
    };
    if agent.nodelay {
        stream.set_nodelay(true).ok();
    }
    Ok(stream)
}

async fn tls_connect(
    host: &str,
    stream: TcpStream,
) -> io::Result<tokio_rustls::client::TlsStream<TcpStream>> {
    let mut roots = rustls::RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config = rustls::ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    let connector = TlsConnector::from(Arc::new(config));

    let server_name = rustls::pki_types::ServerName::try_from(host.to_string()).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid server name: {host}"),
        )
    })?;

    connector.connect(server_name, stream).await
}

async fn exchange<S>(stream: &mut S, call: &TransportCall) -> io::Result<(u16, Headers, Bytes)>
where
    S: AsyncBufRead + AsyncWrite + Unpin + Send,
{
    write_request(stream, call).await?;
    read_response(stream, &call.method).await
}

async fn write_request<S>(stream: &mut S, call: &TransportCall) -> io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    let mut head = format!("{} {} HTTP/1.1\r\n", call.method, request_target(&call.url));
    for (name, value) in call.headers.iter() {
        head.push_str(name);
        head.push_str(": ");
        head.push_str(&Headers::wire_value(value));
        head.push_str("\r\n");
    }
    head.push_str("\r\n");

    stream.write_all(head.as_bytes()).await?;
    if let Some(body) = &call.body {
        stream.write_all(body).await?;
    }
    stream.flush().await
}

async fn read_response<S>(stream: &mut S, method: &Method) -> io::Result<(u16, Headers, Bytes)>
where
    S: AsyncBufRead + Unpin,
{
    let mut status_line = String::new();
    if stream.read_line(&mut status_line).await? == 0 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "connection closed before status line",
        ));
    }
    let status = parse_status_line(&status_line)?;

    let mut block = String::new();
    loop {
        let mut line = String::new();
        if stream.read_line(&mut line).await? == 0 {
            break;
        }
        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            break;
        }
        block.push_str(trimmed);
        block.push_str("\r\n");
    }
    let headers = Headers::parse_block(&block);

    let body = if response_has_body(method, status) {
        read_body(stream, &headers).await?
    } else {
        Bytes::new()
    };

    Ok((status, headers, body))
}

fn parse_status_line(line: &str) -> io::Result<u16> {
    line.split_whitespace()
        .nth(1)
        .and_then(|code| code.parse().ok())
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("malformed status line: {line:?}"),
            )
        })
}

fn response_has_body(method: &Method, status: u16) -> bool {
    *method != Method::HEAD && status != 204 && status != 304 && !(100..200).contains(&status)
}

async fn read_body<S>(stream: &mut S, headers: &Headers) -> io::Result<Bytes>
where
    S: AsyncBufRead + Unpin,
{
    let chunked = headers
        .get_str("transfer-encoding")
        .map(|value| value.to_ascii_lowercase().contains("chunked"))
        .unwrap_or(false);
    if chunked {
        return read_chunked(stream).await;
    }

    if let Some(length) = content_length(headers) {
        let mut buffer = vec![0u8; length];
        stream.read_exact(&mut buffer).await?;
        return Ok(Bytes::from(buffer));
    }

    let mut buffer = Vec::new();
    stream.read_to_end(&mut buffer).await?;
    Ok(Bytes::from(buffer))
}

fn content_length(headers: &Headers) -> Option<usize> {
    let value = headers.get("content-length")?;
    match value.as_u64() {
        Some(length) => Some(length as usize),
        None => value.as_str().and_then(|text| text.trim().parse().ok()),
    }
}

async fn read_chunked<S>(stream: &mut S) -> io::Result<Bytes>
where
    S: AsyncBufRead + Unpin,
{
    let mut collected = Vec::new();
    loop {
        let mut size_line = String::new();
        if stream.read_line(&mut size_line).await? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed mid-chunk",
            ));
        }
        let size_text = size_line.trim().split(';').next().unwrap_or("").trim();
        let size = usize::from_str_radix(size_text, 16).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("malformed chunk size: {size_line:?}"),
            )
        })?;
        if size == 0 {
            break;
        }

        let mut chunk = vec![0u8; size];
        stream.read_exact(&mut chunk).await?;
        collected.extend_from_slice(&chunk);

        let mut crlf = [0u8; 2];
        stream.read_exact(&mut crlf).await?;
    }

    // Trailers, up to the final blank line.
    loop {
        let mut line = String::new();
        let read = stream.read_line(&mut line).await?;
        if read == 0 || line.trim_end().is_empty() {
            break;
        }
    }

    Ok(Bytes::from(collected))
}

fn request_target(url: &Url) -> String {
    let path = url.path();
    let path = if path.is_empty() { "/" } else { path };
    match url.query() {
        Some(query) => format!("{path}?{query}"),
        None => path.to_string(),
    }
}

fn host_header(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    }
}

fn classify_io(error: &io::Error) -> FailureKind {
    match error.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => FailureKind::Timeout,
        _ => FailureKind::Error,
    }
}
