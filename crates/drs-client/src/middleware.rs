use std::time::Duration;

use async_trait::async_trait;
use http::Extensions;
use reqwest::header::HeaderMap;
use reqwest::{Request, Response, StatusCode};
use reqwest_middleware::{Middleware, Next};
use tracing::{debug, warn};

use crate::error::ALREADY_EXISTS;

/// How much of a retry-candidate body is inspected for terminal markers.
const SNIFF_LIMIT: usize = 8 * 1024;

/// Backoff bounds for the retrying dispatcher.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub min_backoff: Duration,
    pub max_backoff: Duration,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            min_backoff: Duration::from_secs(5),
            max_backoff: Duration::from_secs(15),
            max_attempts: 5,
        }
    }
}

impl RetryPolicy {
    /// Exponential backoff, clamped to the configured window.
    fn backoff(&self, attempt: u32) -> Duration {
        let exp = self
            .min_backoff
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)));
        exp.min(self.max_backoff)
    }
}

/// Retries transport errors and 5xx responses.
///
/// 4xx responses and any body containing `already exists` are terminal. A
/// retried response's body is fully drained for the sniff and restored
/// byte-for-byte for downstream decoding. Middleware below this one (auth)
/// runs again on every attempt.
pub struct RetryMiddleware {
    policy: RetryPolicy,
}

impl RetryMiddleware {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl Middleware for RetryMiddleware {
    async fn handle(
        &self,
        req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> reqwest_middleware::Result<Response> {
        // Streaming bodies cannot be replayed; send them single-shot.
        if req.try_clone().is_none() {
            return next.run(req, extensions).await;
        }

        let mut attempt = 1u32;
        loop {
            let request = req
                .try_clone()
                .expect("cloneability was checked before the attempt loop");

            match next.clone().run(request, extensions).await {
                Ok(response) if response.status().is_server_error() => {
                    let status = response.status();
                    let headers = response.headers().clone();
                    let body = response
                        .bytes()
                        .await
                        .map_err(reqwest_middleware::Error::Reqwest)?;

                    let sniff = &body[..body.len().min(SNIFF_LIMIT)];
                    let terminal = String::from_utf8_lossy(sniff).contains(ALREADY_EXISTS);

                    if terminal || attempt >= self.policy.max_attempts {
                        if !terminal {
                            warn!("giving up after {attempt} attempts ({status})");
                        }
                        return Ok(restore_response(status, headers, body));
                    }

                    let delay = self.policy.backoff(attempt);
                    debug!("attempt {attempt} returned {status}; retrying in {delay:?}");
                    tokio::time::sleep(delay).await;
                }
                Ok(response) => return Ok(response),
                Err(err) => {
                    if attempt >= self.policy.max_attempts {
                        return Err(err);
                    }
                    let delay = self.policy.backoff(attempt);
                    debug!("attempt {attempt} failed ({err}); retrying in {delay:?}");
                    tokio::time::sleep(delay).await;
                }
            }

            attempt += 1;
        }
    }
}

/// Rebuild a [`Response`] whose body was consumed by the sniff.
fn restore_response(status: StatusCode, headers: HeaderMap, body: bytes::Bytes) -> Response {
    let mut restored = http::Response::new(reqwest::Body::from(body));
    *restored.status_mut() = status;
    *restored.headers_mut() = headers;
    Response::from(restored)
}
