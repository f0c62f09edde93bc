//! `reqwest::Client` wrapper that traces outgoing calls.
//!
//! Every request runs inside an `outgoing_http` span carrying method, url, status and
//! latency, and gets an `x-request-id` header when the caller did not set one, so the
//! receiving ingress logs under the same id.

use std::time::Instant;
use tracing::{field, Instrument, Level};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Clone)]
pub struct TracedClient {
    inner: reqwest::Client,
}

impl TracedClient {
    pub fn new(inner: reqwest::Client) -> Self {
        Self { inner }
    }

    pub async fn execute(&self, mut req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        let span = tracing::span!(
            Level::INFO,
            "outgoing_http",
            http.method = %req.method(),
            http.url = %req.url(),
            http.status_code = field::Empty,
            request_id = field::Empty,
            latency_ms = field::Empty,
        );

        if !req.headers().contains_key(REQUEST_ID_HEADER) {
            let id = nanoid::nanoid!();
            if let Ok(v) = reqwest::header::HeaderValue::from_str(&id) {
                req.headers_mut().insert(REQUEST_ID_HEADER, v);
            }
        }
        if let Some(id) = req
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            span.record("request_id", id);
        }

        let started = Instant::now();
        let result = self.inner.execute(req).instrument(span.clone()).await;
        span.record("latency_ms", started.elapsed().as_millis() as u64);

        match &result {
            Ok(resp) => {
                span.record("http.status_code", resp.status().as_u16());
                if resp.status().is_server_error() {
                    tracing::warn!(parent: &span, status = resp.status().as_u16(), "Upstream server error");
                }
            }
            Err(e) => tracing::warn!(parent: &span, error = %e, "Outgoing request failed"),
        }
        result
    }

    /// Build and execute in one step.
    pub async fn send(&self, builder: reqwest::RequestBuilder) -> reqwest::Result<reqwest::Response> {
        let req = builder.build()?;
        self.execute(req).await
    }

    pub fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.inner.request(method, url)
    }

    pub fn inner(&self) -> &reqwest::Client {
        &self.inner
    }
}

impl From<reqwest::Client> for TracedClient {
    fn from(c: reqwest::Client) -> Self {
        Self::new(c)
    }
}

impl Default for TracedClient {
    fn default() -> Self {
        Self::new(reqwest::Client::new())
    }
}
