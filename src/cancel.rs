//! Cooperative cancellation for in-flight searches.
//!
//! A search accepts a single [`CancellationToken`] that is checked at every
//! suspension point (index lookups, graph fetches, embedding and understanding
//! calls). A cancelled call returns [`Error::Cancelled`](crate::Error) and
//! never a partial result; an intermediate candidate graph has no standalone
//! meaning.

use crate::{Error, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Cooperative cancellation token with an optional deadline.
///
/// Cloning is cheap; clones share the same cancellation state. The token is
/// considered cancelled once [`cancel`](Self::cancel) has been called or the
/// deadline (if any) has passed.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancellationToken {
    /// Creates a new token (not cancelled, no deadline).
    #[must_use]
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: None,
        }
    }

    /// Creates a token that cancels itself once `timeout` has elapsed.
    #[must_use]
    pub fn with_deadline(timeout: Duration) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: Some(Instant::now() + timeout),
        }
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Returns whether cancellation has been requested or the deadline passed.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        if self.cancelled.load(Ordering::Relaxed) {
            return true;
        }
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Returns `Err(Error::Cancelled)` if the token is cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] when cancellation has been requested or
    /// the deadline has passed.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}
