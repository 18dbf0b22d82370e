// src/services/sequencer.rs
//! Strictly sequential, paced execution of per-item sub-requests.
//!
//! Sub-request `i + 1` is only issued after sub-request `i` has resolved
//! and the pacing delay has elapsed. The delay is applied before every
//! sub-request, the first one included. Results are handed to the caller
//! one at a time as they arrive. A sub-request may also succeed without
//! producing anything; that item stays unfilled and counts as `empty`.

use crate::errors::StyleSenseError;
use crate::models::BatchStatus;
use log::{info, warn};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The upstream kept refusing; remaining sub-requests were not issued.
    RateLimited,
    Cancelled,
}

/// Outcome of one run. Never a hard error: whatever completed stays usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SequenceReport {
    pub succeeded: usize,
    pub empty: usize,
    pub failed: usize,
    pub skipped: usize,
    pub stopped: Option<StopReason>,
}

impl SequenceReport {
    pub fn is_partial(&self) -> bool {
        self.stopped.is_some() || self.failed > 0 || self.empty > 0
    }

    pub fn status(&self) -> BatchStatus {
        match self.stopped {
            Some(StopReason::Cancelled) => BatchStatus::Cancelled,
            Some(StopReason::RateLimited) => BatchStatus::Partial,
            None if self.failed > 0 || self.empty > 0 => BatchStatus::Partial,
            None => BatchStatus::Complete,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PacedSequencer {
    delay: Duration,
}

impl Default for PacedSequencer {
    fn default() -> Self {
        Self::new(Duration::from_millis(1500))
    }
}

impl PacedSequencer {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// Runs `operation` over `requests` in order, passing each success to
    /// `publish` together with the request's position.
    ///
    /// A failure on one item is logged and the run moves on, unless the
    /// failure is a rate limit, which stops the run and marks the rest as
    /// skipped.
    pub async fn run<R, T, F, Fut, P>(
        &self,
        requests: Vec<R>,
        mut operation: F,
        mut publish: P,
        cancel: &CancellationToken,
    ) -> SequenceReport
    where
        F: FnMut(R) -> Fut,
        Fut: Future<Output = Result<Option<T>, StyleSenseError>>,
        P: FnMut(usize, T),
    {
        let total = requests.len();
        let mut report = SequenceReport::default();

        for (index, request) in requests.into_iter().enumerate() {
            let paced = tokio::select! {
                _ = cancel.cancelled() => false,
                _ = tokio::time::sleep(self.delay) => true,
            };
            if !paced {
                report.skipped = total - index;
                report.stopped = Some(StopReason::Cancelled);
                info!("sequence cancelled before item {}/{}", index + 1, total);
                return report;
            }

            let result = tokio::select! {
                _ = cancel.cancelled() => Err(StyleSenseError::Cancelled),
                result = operation(request) => result,
            };

            match result {
                Ok(Some(value)) => {
                    publish(index, value);
                    report.succeeded += 1;
                }
                Ok(None) => {
                    report.empty += 1;
                    info!("item {}/{} produced nothing", index + 1, total);
                }
                Err(StyleSenseError::Cancelled) => {
                    report.skipped = total - index;
                    report.stopped = Some(StopReason::Cancelled);
                    info!("sequence cancelled during item {}/{}", index + 1, total);
                    return report;
                }
                Err(err) if err.is_rate_limited() => {
                    report.failed += 1;
                    report.skipped = total - index - 1;
                    report.stopped = Some(StopReason::RateLimited);
                    warn!(
                        "rate limited on item {}/{}, skipping remaining {}: {}",
                        index + 1,
                        total,
                        report.skipped,
                        err
                    );
                    return report;
                }
                Err(err) => {
                    report.failed += 1;
                    warn!("item {}/{} failed, continuing: {}", index + 1, total, err);
                }
            }
        }

        report
    }
}
