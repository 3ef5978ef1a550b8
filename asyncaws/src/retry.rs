use bytes::Bytes;
use log::{debug, warn};

use asyncaws_core::{Context, Result};

use crate::config::RetryConfig;

/// A response together with the number of transport invocations it took.
#[derive(Debug)]
pub struct Delivered {
    /// The last response received.
    pub response: http::Response<Bytes>,
    /// Transport invocations, the first one included.
    pub attempts: u32,
}

/// Sends requests through the context transport, retrying transient failures.
///
/// A failure is transient when the transport reports a retryable error or
/// the service answers with a 5xx status. Client errors are returned as-is.
/// Once the budget is spent the last response is returned unchanged, so a
/// surviving 5xx is left for the caller to classify.
#[derive(Debug, Clone)]
pub struct RetryHttpClient {
    ctx: Context,
    config: RetryConfig,
}

impl RetryHttpClient {
    /// Create a client sending through `ctx`.
    pub fn new(ctx: Context, config: RetryConfig) -> Self {
        Self { ctx, config }
    }

    /// Retry policy in use.
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Send `req`, replaying the same bytes on transient failures.
    ///
    /// `max_attempts` overrides the configured budget for this call.
    pub async fn send(
        &self,
        req: http::Request<Bytes>,
        max_attempts: Option<u32>,
    ) -> Result<Delivered> {
        let max_attempts = max_attempts.unwrap_or(self.config.max_attempts).max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let result = self.ctx.http_send(clone_request(&req)).await;
            let exhausted = attempt >= max_attempts;

            let reason = match &result {
                Ok(resp) if resp.status().is_server_error() => {
                    Some(format!("server answered {}", resp.status()))
                }
                Err(err) if err.is_retryable() => Some(err.to_string()),
                _ => None,
            };
            let Some(reason) = reason else {
                return result.map(|response| Delivered {
                    response,
                    attempts: attempt,
                });
            };

            if exhausted {
                warn!(
                    "giving up on {} {} after {attempt} attempts: {reason}",
                    req.method(),
                    req.uri()
                );
                return match result {
                    Ok(response) => Ok(Delivered {
                        response,
                        attempts: attempt,
                    }),
                    Err(err) => Err(err.with_context(format!("attempts: {attempt}"))),
                };
            }

            let delay = self.config.delay(attempt);
            debug!(
                "retrying {} {} (attempt {attempt}/{max_attempts}) in {delay:?}: {reason}",
                req.method(),
                req.uri()
            );
            tokio::time::sleep(delay).await;
        }
    }
}

/// Build an identical request: same method, target, headers and body bytes.
fn clone_request(req: &http::Request<Bytes>) -> http::Request<Bytes> {
    let mut cloned = http::Request::new(req.body().clone());
    *cloned.method_mut() = req.method().clone();
    *cloned.uri_mut() = req.uri().clone();
    *cloned.version_mut() = req.version();
    *cloned.headers_mut() = req.headers().clone();
    cloned
}
