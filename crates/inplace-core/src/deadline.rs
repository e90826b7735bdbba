//! Per-evaluation deadline

use std::future::Future;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};

/// Deadline used when `now + timeout` does not fit in an [`Instant`]
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Point in time by which an evaluation must finish
///
/// Threaded through every collaborator call of one evaluation. A call still
/// in flight at the deadline is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Deadline(Instant);

/// The deadline passed before a call completed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expired;

impl Deadline {
    /// Deadline at a fixed instant
    #[inline]
    #[must_use]
    pub fn at(instant: Instant) -> Self {
        Self(instant)
    }

    /// Deadline `timeout` from now, saturating to a far-future instant
    #[must_use]
    pub fn after(timeout: Duration) -> Self {
        let now = Instant::now();
        Self(now.checked_add(timeout).unwrap_or(now + FAR_FUTURE))
    }

    /// Get the deadline instant
    #[inline]
    #[must_use]
    pub fn instant(&self) -> Instant {
        self.0
    }

    /// Check if the deadline has passed
    #[inline]
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.0
    }

    /// Run `future` to completion unless the deadline passes first
    pub async fn run<F: Future>(&self, future: F) -> Result<F::Output, Expired> {
        timeout_at(self.0, future).await.map_err(|_| Expired)
    }
}
