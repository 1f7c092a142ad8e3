//! Bookkeeping for in-flight requests: monotonic request tokens used to drop
//! responses that arrive after a newer request was issued, and the counter
//! behind each store's loading flag.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Identifies one issued request within a [RequestSequence].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RequestToken(u64);

/// Issues increasing [RequestToken]s and remembers the latest one.
///
/// A store issues a token before it sends a fetch and only applies the
/// response if [RequestSequence::is_latest] still holds for that token.
#[derive(Debug, Default)]
pub struct RequestSequence {
    latest: AtomicU64,
}

impl RequestSequence {
    /// Create a sequence with no requests issued.
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a new token, superseding every token issued before it.
    pub fn issue(&self) -> RequestToken {
        RequestToken(self.latest.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Whether `token` is the most recently issued token.
    pub fn is_latest(&self, token: RequestToken) -> bool {
        self.latest.load(Ordering::SeqCst) == token.0
    }
}

/// Counts the store actions that are waiting on the network.
///
/// A store is loading while the count is non-zero, so overlapping actions keep
/// the flag set until the last of them resolves.
#[derive(Debug, Default)]
pub struct LoadingCounter {
    in_flight: AtomicUsize,
}

impl LoadingCounter {
    /// Mark an action as started. The action counts as finished when the
    /// returned guard is dropped, including on early returns.
    pub fn start(&self) -> LoadingGuard<'_> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);

        LoadingGuard { counter: self }
    }

    /// Whether any action is in flight.
    pub fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }
}

/// Keeps a [LoadingCounter] raised until dropped.
#[derive(Debug)]
pub struct LoadingGuard<'a> {
    counter: &'a LoadingCounter,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.counter.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}
