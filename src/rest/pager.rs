use crate::KalshiError;
use crate::rest::types::MAX_PAGE_SIZE;

use futures::future::BoxFuture;
use tokio::time::{Duration, Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Page size to request for a caller wanting `limit` items in total.
pub fn page_size(limit: usize) -> u32 {
    limit.clamp(1, MAX_PAGE_SIZE as usize) as u32
}

/// Manual page-by-page cursor pagination.
///
/// The fetch callback receives the cursor returned by the previous page
/// (`None` on the first call) and returns `(items, next_cursor)`. An absent or
/// empty `next_cursor` marks the end of the stream.
pub struct CursorPager<T> {
    cursor: Option<String>,
    done: bool,
    fetch: Box<
        dyn FnMut(
                Option<String>,
            ) -> BoxFuture<'static, Result<(Vec<T>, Option<String>), KalshiError>>
            + Send,
    >,
}

impl<T> CursorPager<T> {
    pub fn new<F>(cursor: Option<String>, fetch: F) -> Self
    where
        F: FnMut(
                Option<String>,
            ) -> BoxFuture<'static, Result<(Vec<T>, Option<String>), KalshiError>>
            + Send
            + 'static,
    {
        Self {
            cursor: cursor.filter(|c| !c.is_empty()),
            done: false,
            fetch: Box::new(fetch),
        }
    }

    /// Fetch the next page of results.
    ///
    /// Returns `Ok(Some(items))` if a page was fetched, `Ok(None)` when
    /// pagination is complete, or `Err` on failure.
    pub async fn next_page(&mut self) -> Result<Option<Vec<T>>, KalshiError> {
        if self.done {
            return Ok(None);
        }

        let (items, next) = (self.fetch)(self.cursor.take()).await?;
        self.cursor = next.filter(|c| !c.is_empty());
        if self.cursor.is_none() {
            self.done = true;
        }

        Ok(Some(items))
    }

    /// Returns the cursor for the next page fetch.
    pub fn current_cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }

    /// Returns true if pagination is complete.
    pub fn is_done(&self) -> bool {
        self.done
    }
}

/// Bounds on how long one pagination run may take.
///
/// The token is checked before every page fetch and raced against the fetch
/// itself; `deadline` is measured from the start of [`collect_limited`].
#[derive(Debug, Clone, Default)]
pub struct PageBudget {
    pub cancel: CancellationToken,
    pub deadline: Option<Duration>,
}

impl PageBudget {
    pub fn with_deadline(deadline: Duration) -> Self {
        Self {
            cancel: CancellationToken::new(),
            deadline: Some(deadline),
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Drain `pager` until `limit` items are collected or the stream ends.
///
/// Stops on an absent cursor or on an empty page, even if that page came
/// with a cursor. The result is truncated to exactly `limit`. The first
/// error aborts the run and whatever was collected so far is dropped.
pub async fn collect_limited<T>(
    mut pager: CursorPager<T>,
    limit: usize,
    budget: &PageBudget,
) -> Result<Vec<T>, KalshiError> {
    let deadline = budget.deadline.map(|d| Instant::now() + d);
    let mut items = Vec::new();
    let mut pages = 0usize;

    while items.len() < limit {
        if budget.cancel.is_cancelled() {
            return Err(KalshiError::Cancelled);
        }
        if let Some(deadline) = deadline
            && Instant::now() >= deadline
        {
            return Err(KalshiError::DeadlineExceeded);
        }

        let page = tokio::select! {
            biased;
            _ = budget.cancel.cancelled() => return Err(KalshiError::Cancelled),
            _ = wait_for(deadline) => return Err(KalshiError::DeadlineExceeded),
            page = pager.next_page() => page?,
        };
        let Some(batch) = page else {
            break;
        };

        pages += 1;
        let empty = batch.is_empty();
        items.extend(batch);
        debug!(
            page = pages,
            collected = items.len(),
            limit,
            has_cursor = pager.current_cursor().is_some(),
            "fetched page"
        );

        if empty || pager.is_done() {
            break;
        }
    }

    items.truncate(limit);
    Ok(items)
}

async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
