use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use tokio::task::AbortHandle;

use crate::error::{Error, Result};
use crate::paginate::{PaginatedOutput, Paginator};
use crate::response::{Response, ResponseInfo};

/// The typed output of an operation, built from a successful response.
pub trait Output: Sized + Send + 'static {
    /// Build the output from the response.
    fn populate(info: &ResponseInfo) -> Result<Self>;
}

impl Output for () {
    fn populate(_: &ResponseInfo) -> Result<Self> {
        Ok(())
    }
}

impl Output for Bytes {
    fn populate(info: &ResponseInfo) -> Result<Self> {
        Ok(info.body().clone())
    }
}

/// Output deserialized from a JSON body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Json<T>(pub T);

impl<T: DeserializeOwned + Send + 'static> Output for Json<T> {
    fn populate(info: &ResponseInfo) -> Result<Self> {
        serde_json::from_slice(info.body())
            .map(Json)
            .map_err(|e| Error::Parse(e.to_string()))
    }
}

/// Output deserialized from an XML body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Xml<T>(pub T);

impl<T: DeserializeOwned + Send + 'static> Output for Xml<T> {
    fn populate(info: &ResponseInfo) -> Result<Self> {
        let body = std::str::from_utf8(info.body()).map_err(|e| Error::Parse(e.to_string()))?;
        quick_xml::de::from_str(body)
            .map(Xml)
            .map_err(|e| Error::Parse(e.to_string()))
    }
}

/// Identifies a registered prefetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PrefetchId(u64);

/// The lazy result of an operation call.
///
/// The call returns immediately; the exchange runs in the background. The
/// first accessor waits for it, raises a failure status as a typed error or
/// parses the body into `T`. Later accessors reuse that outcome.
///
/// Call [`ApiResult::finish`] on results whose output is not needed so that
/// a failure is still observed.
#[derive(Debug)]
pub struct ApiResult<T: Output> {
    response: Response,
    output: Option<Result<T>>,
    next_prefetch: u64,
    prefetches: HashMap<PrefetchId, AbortHandle>,
}

impl<T: Output> ApiResult<T> {
    /// Wrap a response.
    pub fn new(response: Response) -> Self {
        Self {
            response,
            output: None,
            next_prefetch: 0,
            prefetches: HashMap::new(),
        }
    }

    /// The underlying response.
    pub fn response(&self) -> &Response {
        &self.response
    }

    /// Wait for the raw response without judging its status.
    pub async fn info(&mut self) -> Result<Arc<ResponseInfo>> {
        self.response.info().await
    }

    /// Force resolution, raising the typed error of a failed call.
    pub async fn resolve(&mut self) -> Result<()> {
        self.output().await.map(|_| ())
    }

    /// Resolve and consume the result: the end-of-scope observe call.
    pub async fn finish(mut self) -> Result<()> {
        self.resolve().await
    }

    /// The typed output.
    pub async fn output(&mut self) -> Result<&T> {
        let output = match self.output.take() {
            Some(output) => output,
            None => self.populate().await,
        };
        self.output.insert(output).as_ref().map_err(Clone::clone)
    }

    /// The typed output, mutably.
    pub async fn output_mut(&mut self) -> Result<&mut T> {
        let output = match self.output.take() {
            Some(output) => output,
            None => self.populate().await,
        };
        self.output.insert(output).as_mut().map_err(|e| e.clone())
    }

    /// Take the typed output.
    pub async fn into_output(mut self) -> Result<T> {
        match self.output.take() {
            Some(output) => output,
            None => self.populate().await,
        }
    }

    async fn populate(&mut self) -> Result<T> {
        let info = self.response.resolve().await?;
        T::populate(&info)
    }

    /// Abort the exchange and every registered prefetch.
    pub fn cancel(&mut self) {
        self.response.cancel();
        self.cancel_prefetches();
    }

    /// Handle aborting the exchange, while it is still running.
    pub fn abort_handle(&self) -> Option<AbortHandle> {
        self.response.abort_handle()
    }

    /// Track an in-flight request started on behalf of this result.
    pub fn register_prefetch(&mut self, handle: AbortHandle) -> PrefetchId {
        let id = PrefetchId(self.next_prefetch);
        self.next_prefetch += 1;
        self.prefetches.insert(id, handle);
        id
    }

    /// Stop tracking a prefetch, typically because it has been consumed.
    pub fn unregister_prefetch(&mut self, id: PrefetchId) {
        self.prefetches.remove(&id);
    }

    /// Number of prefetches still tracked.
    pub fn prefetch_count(&self) -> usize {
        self.prefetches.len()
    }

    /// Abort every tracked prefetch.
    pub fn cancel_prefetches(&mut self) {
        for (_, handle) in self.prefetches.drain() {
            handle.abort();
        }
    }

    /// Iterate over the items of every page, starting with this one.
    ///
    /// `fetch` issues the same operation for a follow-up input, built from
    /// `input` with the continuation token of the previous page.
    pub fn paginate<F>(self, input: T::Input, fetch: F) -> Paginator<T>
    where
        T: PaginatedOutput,
        F: Fn(T::Input) -> ApiResult<T> + Send + Sync + 'static,
    {
        Paginator::new(self, input, fetch)
    }
}

impl<T: Output> Drop for ApiResult<T> {
    fn drop(&mut self) {
        self.cancel_prefetches();
    }
}
