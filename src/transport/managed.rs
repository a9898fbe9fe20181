//! Managed transport: the event-driven variant over a pooled HTTP client.
//!
//! Connection handling, redirects, and timeout enforcement are delegated to
//! the underlying client; this module lowers its outcomes to the shared
//! terminal-signal contract. The underlying client never produces a
//! response without a genuine status code, so "no real response" states
//! arrive exclusively through the failure paths.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;
use url::Url;

use super::{Dispatch, TerminalSignal, TransportBackend, TransportCall, TransportKind};
use crate::cookies::CookieSource;
use crate::errors::{FailureKind, RequestError, RequestResult};
use crate::headers::Headers;

/// Event-driven transport over a pooled [`reqwest::Client`].
pub struct ManagedTransport {
    client: Client,
    cookies: Arc<dyn CookieSource>,
    origin: Option<Url>,
}

impl ManagedTransport {
    /// Creates a managed transport.
    ///
    /// `origin` is the client's own origin; targets matching it count as
    /// same-origin for CSRF injection.
    pub fn new(cookies: Arc<dyn CookieSource>, origin: Option<Url>) -> RequestResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|error| RequestError::Configuration {
                message: format!("failed to build HTTP client: {error}"),
            })?;

        Ok(Self {
            client,
            cookies,
            origin,
        })
    }

    fn same_origin(&self, url: &Url) -> bool {
        match &self.origin {
            Some(origin) => {
                origin.scheme() == url.scheme()
                    && origin.host_str() == url.host_str()
                    && origin.port_or_known_default() == url.port_or_known_default()
            }
            None => false,
        }
    }

    /// Injects the CSRF header when credentials are included or the target
    /// is same-origin, and the configured cookie is present.
    fn inject_csrf(&self, call: &mut TransportCall) {
        if !(call.with_credentials || self.same_origin(&call.url)) {
            return;
        }
        let (Some(cookie), Some(header)) = (call.csrf.cookie.clone(), call.csrf.header.clone())
        else {
            return;
        };
        if let Some(token) = self.cookies.get(&cookie) {
            call.headers.set(&header, token);
        }
    }
}

fn classify(error: &reqwest::Error) -> FailureKind {
    if error.is_timeout() {
        FailureKind::Timeout
    } else {
        FailureKind::Error
    }
}

#[async_trait]
impl TransportBackend for ManagedTransport {
    async fn execute(&self, mut call: TransportCall) -> Dispatch {
        self.inject_csrf(&mut call);

        let mut request = self.client.request(call.method.clone(), call.url.clone());
        if let Some(timeout) = call.timeout {
            request = request.timeout(timeout);
        }
        for (name, value) in call.headers.iter() {
            request = request.header(name, Headers::wire_value(value));
        }
        if let Some(body) = call.body.clone() {
            request = request.body(body);
        }

        let headers_sent = call.headers.clone();

        let io = async {
            match request.send().await {
                Ok(response) => {
                    let status = response.status().as_u16();
                    let headers = Headers::from_http(response.headers());
                    match response.bytes().await {
                        Ok(body) => TerminalSignal::Response {
                            status,
                            headers,
                            body,
                        },
                        Err(error) => {
                            debug!(%error, status, "response body read failed");
                            TerminalSignal::Failure {
                                kind: classify(&error),
                                status: Some(status),
                                headers,
                            }
                        }
                    }
                }
                Err(error) => {
                    debug!(%error, url = %call.url, "dispatch failed");
                    TerminalSignal::Failure {
                        kind: classify(&error),
                        status: None,
                        headers: Headers::new(),
                    }
                }
            }
        };

        let signal = tokio::select! {
            _ = call.abort.triggered() => {
                debug!(url = %call.url, "in-flight call aborted");
                TerminalSignal::Failure {
                    kind: FailureKind::Abort,
                    status: None,
                    headers: Headers::new(),
                }
            }
            signal = io => signal,
        };

        Dispatch {
            signal,
            headers_sent,
        }
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Managed
    }
}
