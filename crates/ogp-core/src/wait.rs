//! Polling wait primitive
//!
//! Host-page state is only observable by polling: a dialog appears some time
//! after a click, and disappears some time after submit. [`wait_for`] tests a
//! condition on a fixed interval until it holds, the configured timeout
//! elapses, or the [`CancelToken`] fires.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use futures::future::LocalBoxFuture;

/// Default polling interval.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(250);

/// Default upper bound for a single wait.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Shortest sleep between polls. A zero interval is raised to this so a
/// bounded wait still reaches its timeout.
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Source of delays. Browser builds sleep on `setTimeout`; tests yield.
pub trait Timer {
    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()>;
}

/// Polling parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub interval: Duration,
    /// `None` waits until the condition holds or the wait is cancelled.
    pub timeout: Option<Duration>,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            timeout: Some(DEFAULT_TIMEOUT),
        }
    }
}

impl WaitPolicy {
    /// Poll forever at `interval`.
    pub fn unbounded(interval: Duration) -> Self {
        Self { interval, timeout: None }
    }
}

/// How a wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The condition held.
    Ready,
    /// The timeout elapsed first. `waited` is the total time slept.
    TimedOut { waited: Duration },
    /// The cancel token fired first.
    Cancelled,
}

impl WaitOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

/// Cooperative cancellation flag shared by clones.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Rc<Cell<bool>>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.get()
    }
}

/// Wait until `condition` returns true.
///
/// The condition is tested once before the first sleep, so an already-true
/// condition resolves without touching the timer. Elapsed time is the sum of
/// the intervals slept.
pub async fn wait_for<F>(
    timer: &dyn Timer,
    policy: &WaitPolicy,
    cancel: &CancelToken,
    mut condition: F,
) -> WaitOutcome
where
    F: FnMut() -> bool,
{
    let interval = policy.interval.max(MIN_INTERVAL);
    let mut waited = Duration::ZERO;
    loop {
        if condition() {
            return WaitOutcome::Ready;
        }
        if cancel.is_cancelled() {
            return WaitOutcome::Cancelled;
        }
        if let Some(timeout) = policy.timeout {
            if waited >= timeout {
                return WaitOutcome::TimedOut { waited };
            }
        }
        timer.sleep(interval).await;
        waited += interval;
    }
}
