//! Transport backends: the shared contract and its terminal signals.
//!
//! Two variants implement [`TransportBackend`]: the managed variant
//! (event-driven, over a pooled high-level HTTP client) and the socket
//! variant (stream-based, over raw TCP/TLS). Both lower their native
//! lifecycles into a single [`TerminalSignal`], settled exactly once per
//! call; the pipeline never branches on the variant.

pub mod managed;
pub mod socket;

pub use managed::ManagedTransport;
pub use socket::{SocketAgent, SocketTransport};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::Method;
use tokio::sync::watch;
use url::Url;

use crate::config::{AgentOptions, CsrfOptions};
use crate::errors::FailureKind;
use crate::headers::Headers;

/// Which transport variant a client dispatches through. Selected at
/// construction, never mid-pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportKind {
    /// Event-driven variant over a pooled HTTP client.
    #[default]
    Managed,
    /// Stream-based variant over raw TCP/TLS sockets.
    Socket,
}

/// Everything a transport needs to execute one call.
#[derive(Debug, Clone)]
pub struct TransportCall {
    /// HTTP method.
    pub method: Method,
    /// Fully resolved target URL.
    pub url: Url,
    /// Request headers (the transport may add its own before sending).
    pub headers: Headers,
    /// Encoded body bytes, if any.
    pub body: Option<Bytes>,
    /// Transport-enforced timeout.
    pub timeout: Option<Duration>,
    /// Credential-inclusion flag; gates CSRF injection.
    pub with_credentials: bool,
    /// CSRF cookie/header names.
    pub csrf: CsrfOptions,
    /// Per-scheme connection-reuse handles.
    pub agents: AgentOptions,
    /// Abort token wired to the call's cancellation handle.
    pub abort: AbortToken,
}

/// The single event that ends a transport call.
#[derive(Debug, Clone)]
pub enum TerminalSignal {
    /// A response arrived; the status may or may not be in the success
    /// range.
    Response {
        /// Status code.
        status: u16,
        /// Normalized response headers.
        headers: Headers,
        /// Raw body bytes.
        body: Bytes,
    },
    /// The call ended without a usable response.
    Failure {
        /// Failure classification.
        kind: FailureKind,
        /// Status code, when one was observed before the failure.
        status: Option<u16>,
        /// Whatever response headers were available at that point.
        headers: Headers,
    },
}

/// Transport outcome: the terminal signal plus the headers actually sent
/// (after transport-side additions), kept for envelope introspection.
#[derive(Debug, Clone)]
pub struct Dispatch {
    /// Terminal signal for the call.
    pub signal: TerminalSignal,
    /// Headers as written to the wire.
    pub headers_sent: Headers,
}

/// Shared contract of both transport variants.
#[async_trait]
pub trait TransportBackend: Send + Sync {
    /// Executes one call to its terminal signal. Failures are in-band; this
    /// never errors at the Rust level.
    async fn execute(&self, call: TransportCall) -> Dispatch;

    /// The variant this backend implements.
    fn kind(&self) -> TransportKind;
}

/// One-shot abort token bridging a cancellation handle to an in-flight
/// transport call.
#[derive(Debug, Clone)]
pub struct AbortToken {
    sender: Arc<watch::Sender<bool>>,
    receiver: watch::Receiver<bool>,
}

impl AbortToken {
    /// Creates an untriggered token.
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
            receiver,
        }
    }

    /// Triggers the token; idempotent.
    pub fn trigger(&self) {
        let _ = self.sender.send(true);
    }

    /// Returns true once triggered.
    pub fn is_triggered(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolves once the token is triggered; pends forever otherwise.
    pub async fn triggered(&self) {
        let mut receiver = self.receiver.clone();
        loop {
            if *receiver.borrow() {
                return;
            }
            if receiver.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

impl Default for AbortToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn abort_token_resolves_after_trigger() {
        let token = AbortToken::new();
        assert!(!token.is_triggered());

        let waiter = token.clone();
        let task = tokio::spawn(async move { waiter.triggered().await });

        token.trigger();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("triggered() must resolve")
            .unwrap();
        assert!(token.is_triggered());
    }

    #[tokio::test]
    async fn untriggered_token_pends() {
        let token = AbortToken::new();
        let outcome =
            tokio::time::timeout(Duration::from_millis(20), token.triggered()).await;
        assert!(outcome.is_err());
    }
}
