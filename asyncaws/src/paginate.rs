use std::collections::VecDeque;
use std::fmt::{self, Debug};

use futures::Stream;

use crate::error::Result;
use crate::result::{ApiResult, Output, PrefetchId};

/// An output that is one page of a longer listing.
pub trait PaginatedOutput: Output {
    /// Input of the operation producing this output.
    type Input: Clone + Send + 'static;
    /// Element of the listing.
    type Item: Send + 'static;

    /// Continuation token of the next page; `None` on the last page.
    fn next_token(&self) -> Option<String>;

    /// Move the items of this page out.
    fn take_items(&mut self) -> Vec<Self::Item>;

    /// `input` with its continuation field set to `token`.
    fn next_input(input: &Self::Input, token: &str) -> Self::Input;
}

type Fetch<T> = Box<dyn Fn(<T as PaginatedOutput>::Input) -> ApiResult<T> + Send + Sync>;

enum Page<T: PaginatedOutput> {
    Root,
    Next(ApiResult<T>, Option<PrefetchId>),
}

/// Items of every page of a listing, in order.
///
/// The request for page N+1 is sent as soon as page N has been parsed, so
/// that it runs while the caller works through the items of page N. The
/// sequence ends after the first page without a continuation token, or after
/// the first error. It cannot be restarted.
pub struct Paginator<T: PaginatedOutput> {
    input: T::Input,
    fetch: Fetch<T>,
    root: ApiResult<T>,
    page: Option<Page<T>>,
    items: VecDeque<T::Item>,
    pages: usize,
}

impl<T: PaginatedOutput> Debug for Paginator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Paginator")
            .field("pages", &self.pages)
            .field("buffered", &self.items.len())
            .field("done", &self.page.is_none())
            .finish()
    }
}

impl<T: PaginatedOutput> Paginator<T> {
    pub(crate) fn new<F>(root: ApiResult<T>, input: T::Input, fetch: F) -> Self
    where
        F: Fn(T::Input) -> ApiResult<T> + Send + Sync + 'static,
    {
        Self {
            input,
            fetch: Box::new(fetch),
            root,
            page: Some(Page::Root),
            items: VecDeque::new(),
            pages: 0,
        }
    }

    /// Number of pages loaded so far.
    pub fn pages(&self) -> usize {
        self.pages
    }

    /// The first page.
    pub fn root(&self) -> &ApiResult<T> {
        &self.root
    }

    /// Next item, `None` once the listing is exhausted.
    pub async fn next(&mut self) -> Option<Result<T::Item>> {
        loop {
            if let Some(item) = self.items.pop_front() {
                return Some(Ok(item));
            }

            let page = self.page.take()?;
            let token = match self.load(page).await {
                Ok(token) => token,
                Err(err) => return Some(Err(err)),
            };

            if let Some(token) = token {
                let next = (self.fetch)(T::next_input(&self.input, &token));
                let id = next
                    .abort_handle()
                    .map(|handle| self.root.register_prefetch(handle));
                self.page = Some(Page::Next(next, id));
            }
        }
    }

    /// Parse `page`, queue its items and return its continuation token.
    async fn load(&mut self, page: Page<T>) -> Result<Option<String>> {
        let mut next = match page {
            Page::Root => None,
            Page::Next(result, id) => {
                if let Some(id) = id {
                    self.root.unregister_prefetch(id);
                }
                Some(result)
            }
        };

        let output = match &mut next {
            Some(result) => result.output_mut().await?,
            None => self.root.output_mut().await?,
        };
        self.pages += 1;
        self.items.extend(output.take_items());
        Ok(non_empty(output.next_token()))
    }

    /// Turn into a stream of items.
    pub fn into_stream(self) -> impl Stream<Item = Result<T::Item>> {
        futures::stream::unfold(self, |mut paginator| async move {
            let item = paginator.next().await?;
            Some((item, paginator))
        })
    }
}

fn non_empty(token: Option<String>) -> Option<String> {
    token.filter(|t| !t.is_empty())
}

impl<T: PaginatedOutput> Drop for Paginator<T> {
    fn drop(&mut self) {
        if let Some(Page::Next(result, _)) = &mut self.page {
            result.cancel();
        }
        self.root.cancel_prefetches();
    }
}
