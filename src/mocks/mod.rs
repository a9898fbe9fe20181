//! Mock implementations for testing.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use mockall::mock;
use parking_lot::Mutex;

use crate::cookies::CookieSource;
use crate::headers::Headers;
use crate::transport::{
    Dispatch, TerminalSignal, TransportBackend, TransportCall, TransportKind,
};

/// Scripted transport: pops pre-queued terminal signals and records every
/// call it receives.
pub struct MockTransport {
    kind: TransportKind,
    signals: Mutex<Vec<TerminalSignal>>,
    calls: Arc<Mutex<Vec<TransportCall>>>,
}

impl MockTransport {
    /// Creates a mock reporting itself as the managed variant.
    pub fn new() -> Self {
        Self {
            kind: TransportKind::Managed,
            signals: Mutex::new(Vec::new()),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queues a terminal signal; signals are consumed in FIFO order.
    pub fn with_signal(self, signal: TerminalSignal) -> Self {
        self.signals.lock().push(signal);
        self
    }

    /// Queues a plain response.
    pub fn with_response(self, status: u16, headers: Headers, body: impl Into<Bytes>) -> Self {
        self.with_signal(TerminalSignal::Response {
            status,
            headers,
            body: body.into(),
        })
    }

    /// The calls executed so far.
    pub fn calls(&self) -> Vec<TransportCall> {
        self.calls.lock().clone()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TransportBackend for MockTransport {
    async fn execute(&self, call: TransportCall) -> Dispatch {
        self.calls.lock().push(call.clone());

        let signal = {
            let mut signals = self.signals.lock();
            if signals.is_empty() {
                TerminalSignal::Response {
                    status: 200,
                    headers: Headers::new(),
                    body: Bytes::new(),
                }
            } else {
                signals.remove(0)
            }
        };

        Dispatch {
            signal,
            headers_sent: call.headers,
        }
    }

    fn kind(&self) -> TransportKind {
        self.kind
    }
}

mock! {
    /// Mockall-backed cookie source for expectation-style tests.
    pub Cookies {}

    impl CookieSource for Cookies {
        fn get(&self, name: &str) -> Option<String>;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CsrfOptions;
    use crate::transport::AbortToken;
    use http::Method;

    #[tokio::test]
    async fn mock_transport_replays_signals_in_order() {
        let transport = MockTransport::new()
            .with_response(201, Headers::new(), "first")
            .with_response(404, Headers::new(), "second");

        let call = TransportCall {
            method: Method::GET,
            url: "http://example.com/".parse().unwrap(),
            headers: Headers::new(),
            body: None,
            timeout: None,
            with_credentials: false,
            csrf: CsrfOptions::default(),
            agents: Default::default(),
            abort: AbortToken::new(),
        };

        let first = transport.execute(call.clone()).await;
        let second = transport.execute(call).await;

        assert!(matches!(
            first.signal,
            TerminalSignal::Response { status: 201, .. }
        ));
        assert!(matches!(
            second.signal,
            TerminalSignal::Response { status: 404, .. }
        ));
        assert_eq!(transport.calls().len(), 2);
    }

    #[test]
    fn mockall_cookie_source_honors_expectations() {
        let mut cookies = MockCookies::new();
        cookies
            .expect_get()
            .withf(|name| name == "CSRF-TOKEN")
            .returning(|_| Some("token123".to_string()));

        assert_eq!(cookies.get("CSRF-TOKEN").as_deref(), Some("token123"));
    }
}
