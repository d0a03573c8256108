use std::ops::ControlFlow;
use thiserror::Error;

/// Returned when a progress callback asks a long operation to stop.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("operation cancelled")]
pub struct Cancelled;

/// Rate-limited progress reporting with cooperative cancellation.
///
/// The wrapped callback is invoked at most once per percent of the total,
/// plus once at the start and once at completion. Observers that return
/// `ControlFlow::Break` get a [`Cancelled`] back at the next report point;
/// callers stop at the next node boundary and release their resources.
pub struct ProgressSink<'a> {
    callback: Option<&'a mut dyn FnMut(u64, u64, &str) -> ControlFlow<()>>,
    total: u64,
    last_reported: Option<u64>,
}

impl<'a> ProgressSink<'a> {
    pub fn new(
        callback: Option<&'a mut dyn FnMut(u64, u64, &str) -> ControlFlow<()>>,
        total: u64,
    ) -> Self {
        Self {
            callback,
            total,
            last_reported: None,
        }
    }

    /// A sink that never reports and never cancels.
    pub fn disabled() -> Self {
        Self {
            callback: None,
            total: 0,
            last_reported: None,
        }
    }

    pub fn set_total(&mut self, total: u64) {
        self.total = total;
        self.last_reported = None;
    }

    /// Reports `current` out of the configured total, skipping callbacks
    /// that fall within the same percent as the previous report.
    pub fn report(&mut self, current: u64, status: &str) -> Result<(), Cancelled> {
        let Some(callback) = self.callback.as_mut() else {
            return Ok(());
        };
        let percent = if self.total == 0 {
            100
        } else {
            current.saturating_mul(100) / self.total
        };
        if self.last_reported == Some(percent) && current != self.total {
            return Ok(());
        }
        self.last_reported = Some(percent);
        match callback(current, self.total, status) {
            ControlFlow::Continue(()) => Ok(()),
            ControlFlow::Break(()) => Err(Cancelled),
        }
    }
}
