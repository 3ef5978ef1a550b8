use std::fmt::{self, Debug};
use std::sync::Arc;

use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use log::{error, warn};
use tokio::runtime::Handle;
use tokio::task::{AbortHandle, JoinError, JoinHandle};

use asyncaws_core::RequestContext;

use crate::error::{AwsErrorFactory, Error, ErrorClass, Result, StructuredError};

/// A received HTTP response, fully buffered.
#[derive(Debug, Clone)]
pub struct ResponseInfo {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    url: String,
    attempts: u32,
}

impl ResponseInfo {
    /// Create a response received after one attempt.
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes, url: impl Into<String>) -> Self {
        Self {
            status,
            headers,
            body,
            url: url.into(),
            attempts: 1,
        }
    }

    /// Set the number of transport invocations it took.
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    /// HTTP status.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Get a header value as string.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Response body.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// URL the request was sent to.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Transport invocations, retries included.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Request id reported in the response headers.
    pub fn request_id(&self) -> Option<&str> {
        self.header("x-amzn-requestid")
            .or_else(|| self.header("x-amz-request-id"))
    }
}

enum State {
    Pending(JoinHandle<asyncaws_core::Result<ResponseInfo>>),
    Received(Arc<ResponseInfo>),
    Resolved(Arc<ResponseInfo>),
    Failed {
        info: Option<Arc<ResponseInfo>>,
        error: Error,
    },
}

/// The lazy side of an HTTP exchange.
///
/// The exchange runs in the background from the moment the response is
/// created. Nothing is raised until [`Response::resolve`] is called: a
/// failure status is then classified exactly once and handed back on every
/// later call.
///
/// A response dropped without being resolved still reports its failure,
/// through an `error!` log line, instead of losing it.
pub struct Response {
    state: State,
    observed: bool,
    request_ctx: RequestContext,
    error_factory: Arc<dyn AwsErrorFactory>,
}

impl Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &self.state {
            State::Pending(_) => "pending",
            State::Received(_) => "received",
            State::Resolved(_) => "resolved",
            State::Failed { .. } => "failed",
        };
        f.debug_struct("Response")
            .field("state", &state)
            .field("observed", &self.observed)
            .field("operation", &self.request_ctx.operation())
            .finish()
    }
}

impl Response {
    /// Wrap an exchange running in the background.
    pub fn pending(
        handle: JoinHandle<asyncaws_core::Result<ResponseInfo>>,
        request_ctx: RequestContext,
        error_factory: Arc<dyn AwsErrorFactory>,
    ) -> Self {
        Self::with_state(State::Pending(handle), request_ctx, error_factory)
    }

    /// Wrap an already received response.
    pub fn ready(
        info: ResponseInfo,
        request_ctx: RequestContext,
        error_factory: Arc<dyn AwsErrorFactory>,
    ) -> Self {
        Self::with_state(State::Received(Arc::new(info)), request_ctx, error_factory)
    }

    /// A response whose exchange could not even start.
    pub fn failed(
        error: impl Into<Error>,
        request_ctx: RequestContext,
        error_factory: Arc<dyn AwsErrorFactory>,
    ) -> Self {
        let state = State::Failed {
            info: None,
            error: error.into(),
        };
        Self::with_state(state, request_ctx, error_factory)
    }

    fn with_state(
        state: State,
        request_ctx: RequestContext,
        error_factory: Arc<dyn AwsErrorFactory>,
    ) -> Self {
        Self {
            state,
            observed: false,
            request_ctx,
            error_factory,
        }
    }

    /// Per-call options this response was sent with.
    pub fn request_context(&self) -> &RequestContext {
        &self.request_ctx
    }

    /// Whether the outcome has been handed to the caller.
    pub fn is_observed(&self) -> bool {
        self.observed
    }

    /// Wait for the response without judging its status.
    ///
    /// A 4xx or 5xx response is returned as-is; only a failure to obtain a
    /// response at all is an error.
    pub async fn info(&mut self) -> Result<Arc<ResponseInfo>> {
        self.receive().await;
        match &self.state {
            State::Received(info) | State::Resolved(info) => Ok(info.clone()),
            State::Failed {
                info: Some(info), ..
            } => Ok(info.clone()),
            State::Failed { error, .. } => {
                self.observed = true;
                Err(error.clone())
            }
            State::Pending(_) => Err(Error::Cancelled),
        }
    }

    /// Wait for the response and raise a failure status as a typed error.
    ///
    /// The error body is parsed on the first call only.
    pub async fn resolve(&mut self) -> Result<Arc<ResponseInfo>> {
        self.receive().await;
        self.observed = true;

        if let State::Received(info) = &self.state {
            let info = info.clone();
            self.state = match self.classify(&info) {
                Some(error) => State::Failed {
                    info: Some(info),
                    error,
                },
                None => State::Resolved(info),
            };
        }

        match &self.state {
            State::Resolved(info) => Ok(info.clone()),
            State::Failed { error, .. } => Err(error.clone()),
            State::Received(_) | State::Pending(_) => Err(Error::Cancelled),
        }
    }

    /// Abort the exchange. A cancelled response never reports at drop time.
    pub fn cancel(&mut self) {
        self.observed = true;
        if let State::Pending(handle) = &self.state {
            handle.abort();
            self.state = State::Failed {
                info: None,
                error: Error::Cancelled,
            };
        }
    }

    /// Handle aborting the exchange, while it is still running.
    pub fn abort_handle(&self) -> Option<AbortHandle> {
        match &self.state {
            State::Pending(handle) => Some(handle.abort_handle()),
            _ => None,
        }
    }

    async fn receive(&mut self) {
        if let State::Pending(handle) = &mut self.state {
            let outcome = handle.await;
            self.state = received(outcome);
        }
    }

    fn classify(&self, info: &ResponseInfo) -> Option<Error> {
        let class = ErrorClass::from_status(info.status())?;
        let parsed = self
            .error_factory
            .create_from_response(info.headers(), info.body());

        let mut err = StructuredError::new(
            class,
            info.status(),
            info.url(),
            parsed,
            info.body().clone(),
        )
        .with_request_id(info.request_id().map(str::to_string));

        let kind = err
            .code()
            .and_then(|code| self.request_ctx.mapped_error(code))
            .map(str::to_string);
        if let Some(kind) = kind {
            err = err.with_kind(kind);
        }
        Some(Error::Http(Arc::new(err)))
    }
}

fn received(outcome: std::result::Result<asyncaws_core::Result<ResponseInfo>, JoinError>) -> State {
    let error = match outcome {
        Ok(Ok(info)) => return State::Received(Arc::new(info)),
        Ok(Err(err)) => Error::from(err),
        Err(err) if err.is_cancelled() => Error::Cancelled,
        Err(err) => Error::from(asyncaws_core::Error::unexpected(format!(
            "request task panicked: {err}"
        ))),
    };
    State::Failed { info: None, error }
}

fn report(operation: Option<&str>, err: &Error) {
    if matches!(err, Error::Cancelled) {
        return;
    }
    error!(
        "{} failed and its result was never resolved: {err}",
        operation.unwrap_or("request")
    );
}

impl Drop for Response {
    fn drop(&mut self) {
        if self.observed {
            return;
        }

        let state = std::mem::replace(
            &mut self.state,
            State::Failed {
                info: None,
                error: Error::Cancelled,
            },
        );
        match state {
            State::Pending(handle) => {
                let Ok(rt) = Handle::try_current() else {
                    warn!(
                        "{} dropped while in flight outside of a runtime, its outcome is lost",
                        self.request_ctx.operation().unwrap_or("request")
                    );
                    return;
                };
                let mut observer = Response::pending(
                    handle,
                    self.request_ctx.clone(),
                    self.error_factory.clone(),
                );
                observer.observed = true;
                rt.spawn(async move {
                    if let Err(err) = observer.resolve().await {
                        report(observer.request_ctx.operation(), &err);
                    }
                });
            }
            State::Received(info) => {
                if let Some(err) = self.classify(&info) {
                    report(self.request_ctx.operation(), &err);
                }
            }
            State::Failed { error, .. } => report(self.request_ctx.operation(), &error),
            State::Resolved(_) => {}
        }
    }
}
