//! Executing `HttpRequest`s, with a bounded timeout and a retry policy.
//!
//! # Design
//! `Transport` is the I/O seam: `HttpTransport` drives real requests through
//! ureq, tests plug in a scripted implementation. Retrying lives in exactly
//! one place, `RetryingTransport`, parameterised by a `RetryPolicy` value.
//! Only timeouts are retried. A response with any status code counts as a
//! completed exchange and is never retried here.

use std::io;
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use crate::http::{HttpMethod, HttpRequest, HttpResponse};

/// Failure to complete an HTTP exchange at all.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The client stopped waiting for the server.
    #[error("request timed out")]
    Timeout,

    /// Connection refused, reset, DNS failure, unreadable body, and so on.
    #[error("connection failed: {0}")]
    Connection(String),
}

/// Executes one HTTP exchange.
pub trait Transport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).execute(request)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).execute(request)
    }
}

/// How many times a logical request may be attempted, and how long to wait
/// between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Always at least 1.
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 2;
    pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(2);

    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// A single attempt, no retry.
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }

    fn allows_retry(&self, attempt: u32, err: &TransportError) -> bool {
        matches!(err, TransportError::Timeout) && attempt < self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_ATTEMPTS, Self::DEFAULT_BACKOFF)
    }
}

/// Wraps a transport and retries timed-out requests according to a policy.
#[derive(Debug, Clone)]
pub struct RetryingTransport<T> {
    inner: T,
    policy: RetryPolicy,
}

impl<T: Transport> RetryingTransport<T> {
    pub fn new(inner: T, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    /// Executes `request`, calling `on_retry` with the upcoming attempt
    /// number (2, 3, ...) before each retry. The last attempt's outcome is
    /// returned as is.
    pub fn execute_with<F>(
        &self,
        request: &HttpRequest,
        mut on_retry: F,
    ) -> Result<HttpResponse, TransportError>
    where
        F: FnMut(u32),
    {
        let mut attempt = 1;
        loop {
            debug!(method = request.method.as_str(), url = %request.url, attempt, "sending request");
            match self.inner.execute(request) {
                Err(err) if self.policy.allows_retry(attempt, &err) => {
                    warn!(
                        url = %request.url,
                        attempt,
                        backoff_ms = self.policy.backoff.as_millis() as u64,
                        "request timed out, retrying"
                    );
                    if !self.policy.backoff.is_zero() {
                        thread::sleep(self.policy.backoff);
                    }
                    attempt += 1;
                    on_retry(attempt);
                }
                outcome => return outcome,
            }
        }
    }
}

impl<T: Transport> Transport for RetryingTransport<T> {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.execute_with(request, |_| {})
    }
}

/// Blocking HTTP transport backed by a ureq agent.
///
/// The timeout bounds each attempt as a whole (connect, send, and read).
/// 4xx/5xx responses are returned as data rather than errors.
#[derive(Clone)]
pub struct HttpTransport {
    agent: ureq::Agent,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Self {
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self { agent }
    }
}

impl Transport for HttpTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let url = request.url.as_str();
        let body = request.body.as_deref();
        let result = match request.method {
            HttpMethod::Get => with_headers(self.agent.get(url), &request.headers).call(),
            HttpMethod::Delete => with_headers(self.agent.delete(url), &request.headers).call(),
            HttpMethod::Post => send_body(with_headers(self.agent.post(url), &request.headers), body),
            HttpMethod::Put => send_body(with_headers(self.agent.put(url), &request.headers), body),
        };

        let mut response = result.map_err(classify)?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.body_mut().read_to_string().map_err(classify)?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

fn with_headers<B>(
    mut builder: ureq::RequestBuilder<B>,
    headers: &[(String, String)],
) -> ureq::RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

fn send_body(
    builder: ureq::RequestBuilder<ureq::typestate::WithBody>,
    body: Option<&str>,
) -> Result<ureq::http::Response<ureq::Body>, ureq::Error> {
    match body {
        Some(body) => builder.send(body.as_bytes()),
        None => builder.send_empty(),
    }
}

fn classify(err: ureq::Error) -> TransportError {
    match err {
        ureq::Error::Timeout(_) => TransportError::Timeout,
        ureq::Error::Io(ref io_err)
            if matches!(io_err.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) =>
        {
            TransportError::Timeout
        }
        other => TransportError::Connection(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    struct Scripted {
        outcomes: RefCell<VecDeque<Result<HttpResponse, TransportError>>>,
        calls: RefCell<u32>,
    }

    impl Scripted {
        fn new(outcomes: Vec<Result<HttpResponse, TransportError>>) -> Self {
            Self {
                outcomes: RefCell::new(outcomes.into()),
                calls: RefCell::new(0),
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.borrow()
        }
    }

    impl Transport for Scripted {
        fn execute(&self, _request: &HttpRequest) -> Result<HttpResponse, TransportError> {
            *self.calls.borrow_mut() += 1;
            self.outcomes
                .borrow_mut()
                .pop_front()
                .expect("scripted transport ran out of outcomes")
        }
    }

    fn request() -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Get,
            url: "http://localhost:3000/api/todos".to_string(),
            headers: Vec::new(),
            body: None,
        }
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::ZERO)
    }

    #[test]
    fn timeout_then_success_is_absorbed() {
        let inner = Scripted::new(vec![
            Err(TransportError::Timeout),
            Ok(HttpResponse::new(200, "[]")),
        ]);
        let transport = RetryingTransport::new(&inner, fast_policy(2));
        let mut retries = Vec::new();
        let response = transport.execute_with(&request(), |n| retries.push(n)).unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(inner.calls(), 2);
        assert_eq!(retries, vec![2]);
    }

    #[test]
    fn retries_at_most_once_by_default() {
        let inner = Scripted::new(vec![
            Err(TransportError::Timeout),
            Err(TransportError::Timeout),
            Ok(HttpResponse::new(200, "[]")),
        ]);
        let policy = RetryPolicy {
            backoff: Duration::ZERO,
            ..RetryPolicy::default()
        };
        let transport = RetryingTransport::new(&inner, policy);
        let err = transport.execute(&request()).unwrap_err();
        assert_eq!(err, TransportError::Timeout);
        assert_eq!(inner.calls(), 2);
    }

    #[test]
    fn connection_errors_are_not_retried() {
        let inner = Scripted::new(vec![Err(TransportError::Connection("refused".to_string()))]);
        let transport = RetryingTransport::new(&inner, fast_policy(3));
        let err = transport.execute(&request()).unwrap_err();
        assert!(matches!(err, TransportError::Connection(_)));
        assert_eq!(inner.calls(), 1);
    }

    #[test]
    fn server_errors_are_not_retried() {
        let inner = Scripted::new(vec![Ok(HttpResponse::new(503, "unavailable"))]);
        let transport = RetryingTransport::new(&inner, fast_policy(3));
        let response = transport.execute(&request()).unwrap();
        assert_eq!(response.status, 503);
        assert_eq!(inner.calls(), 1);
    }

    #[test]
    fn no_retry_policy_surfaces_first_timeout() {
        let inner = Scripted::new(vec![Err(TransportError::Timeout)]);
        let transport = RetryingTransport::new(&inner, RetryPolicy::none());
        assert_eq!(transport.execute(&request()).unwrap_err(), TransportError::Timeout);
        assert_eq!(inner.calls(), 1);
    }

    #[test]
    fn larger_policy_allows_more_attempts() {
        let inner = Scripted::new(vec![
            Err(TransportError::Timeout),
            Err(TransportError::Timeout),
            Ok(HttpResponse::new(200, "[]")),
        ]);
        let transport = RetryingTransport::new(&inner, fast_policy(3));
        assert!(transport.execute(&request()).is_ok());
        assert_eq!(inner.calls(), 3);
    }

    #[test]
    fn zero_attempts_is_clamped_to_one() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
    }

    #[test]
    fn default_policy_is_two_attempts_two_seconds_apart() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 2);
        assert_eq!(policy.backoff, Duration::from_secs(2));
    }

    #[test]
    fn unreachable_host_is_a_connection_error() {
        // Port 1 on localhost is reserved and closed on any sane test machine.
        let transport = HttpTransport::new(Duration::from_secs(2));
        let mut req = request();
        req.url = "http://127.0.0.1:1/todos".to_string();
        let err = transport.execute(&req).unwrap_err();
        assert!(matches!(err, TransportError::Connection(_)));
    }
}
