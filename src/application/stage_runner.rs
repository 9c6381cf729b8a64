//! Stage runner
//!
//! Applies one async operation to every item of a batch. Issuance is paced:
//! after a warm-up pause the items are started strictly in order, one every
//! `issue_delay`, while the already issued ones keep making progress. The
//! runner then waits for every operation to settle. A failed or panicking
//! operation is counted and logged; it never cancels its siblings.
//!
//! Each operation borrows exactly one item mutably, so the items are enriched
//! in place without any locking.

use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::domain::stage::HarvestStage;
use crate::infrastructure::config::PacingConfig;
use crate::infrastructure::http_client::TransportError;

/// Failure of a single item; siblings are unaffected.
#[derive(Error, Debug)]
pub enum StageError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Operation panicked: {message}")]
    Panicked { message: String },
}

/// Position of an item in its batch. `idx` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageTicket {
    pub idx: usize,
    pub total: usize,
}

/// Per-item work of one stage.
#[async_trait]
pub trait StageOperation<T: Send>: Send + Sync {
    async fn apply(&self, item: &mut T, ticket: StageTicket) -> Result<(), StageError>;
}

/// What a finished stage looked like.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageSummary {
    pub stage: HarvestStage,
    pub items: usize,
    pub failed: usize,
    pub elapsed: Duration,
}

impl StageSummary {
    pub fn succeeded(&self) -> usize {
        self.items - self.failed
    }
}

#[derive(Debug, Clone)]
pub struct StageRunner {
    issue_delay: Duration,
    warmup_delay: Duration,
    progress_every: usize,
}

impl StageRunner {
    pub fn new(issue_delay: Duration, warmup_delay: Duration, progress_every: usize) -> Self {
        Self {
            issue_delay,
            warmup_delay,
            progress_every: progress_every.max(1),
        }
    }

    pub fn from_config(pacing: &PacingConfig) -> Self {
        Self::new(pacing.issue_delay(), pacing.warmup_delay(), pacing.progress_every)
    }

    /// Run `operation` over all `items` and wait for every one of them.
    pub async fn run<T, Op>(&self, stage: HarvestStage, items: &mut [T], operation: &Op) -> StageSummary
    where
        T: Send,
        Op: StageOperation<T> + ?Sized,
    {
        let started = Instant::now();
        let total = items.len();
        info!("🚀 Stage {}: {} items", stage, total);

        if total == 0 {
            return StageSummary {
                stage,
                items: 0,
                failed: 0,
                elapsed: started.elapsed(),
            };
        }

        debug!("Stage {}: warming up for {:?}", stage, self.warmup_delay);
        sleep(self.warmup_delay).await;

        let mut pending = FuturesUnordered::new();
        let mut progress = Progress::new(stage, total, self.progress_every);

        for (index, item) in items.iter_mut().enumerate() {
            let ticket = StageTicket { idx: index + 1, total };
            pending.push(settle(operation, item, ticket));

            if ticket.idx == total || self.issue_delay.is_zero() {
                continue;
            }

            // Issued operations keep running while the next issuance waits
            let pause = sleep(self.issue_delay);
            tokio::pin!(pause);
            loop {
                tokio::select! {
                    () = &mut pause => break,
                    Some((done, result)) = pending.next(), if !pending.is_empty() => {
                        progress.record(done, result);
                    }
                }
            }
        }

        while let Some((done, result)) = pending.next().await {
            progress.record(done, result);
        }

        let summary = StageSummary {
            stage,
            items: total,
            failed: progress.failed,
            elapsed: started.elapsed(),
        };
        info!(
            "✅ Stage {} done in {:.2?}: {} ok, {} failed",
            stage,
            summary.elapsed,
            summary.succeeded(),
            summary.failed
        );
        summary
    }
}

fn is_milestone(completed: usize, total: usize, every: usize) -> bool {
    completed % every == 0 || completed == total
}

/// Completion tally of one stage run.
struct Progress {
    stage: HarvestStage,
    total: usize,
    every: usize,
    completed: usize,
    failed: usize,
}

impl Progress {
    fn new(stage: HarvestStage, total: usize, every: usize) -> Self {
        Self {
            stage,
            total,
            every,
            completed: 0,
            failed: 0,
        }
    }

    fn record(&mut self, ticket: StageTicket, result: Result<(), StageError>) {
        self.completed += 1;
        if let Err(e) = result {
            self.failed += 1;
            warn!("{} item {}/{} failed: {}", self.stage, ticket.idx, ticket.total, e);
        }
        if is_milestone(self.completed, self.total, self.every) {
            info!("{}: completed {} of {}", self.stage, self.completed, self.total);
        }
    }
}

/// Run one operation to completion, turning a panic into an error.
async fn settle<T, Op>(operation: &Op, item: &mut T, ticket: StageTicket) -> (StageTicket, Result<(), StageError>)
where
    T: Send,
    Op: StageOperation<T> + ?Sized,
{
    let result = match AssertUnwindSafe(operation.apply(item, ticket)).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => Err(StageError::Panicked {
            message: panic_message(panic.as_ref()),
        }),
    };
    (ticket, result)
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
