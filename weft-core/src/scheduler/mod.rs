//! Job Scheduler
//!
//! Effects created with a queueing scheduler do not re-run on every write.
//! Their jobs are collected here and run together at the next flush.
//!
//! # Driving the Scheduler
//!
//! There is no event loop inside the crate. The host decides when a batch
//! ends, then either calls [`flush_jobs`] directly or awaits [`next_tick`],
//! which performs the pending flush when polled:
//!
//! ```rust,ignore
//! state.set("count", 1);
//! state.set("count", 2);
//! next_tick().await?; // queued effects have run once
//! ```
//!
//! A flush that exceeds the recursion limit stops, discards the remaining
//! work and reports [`ReactiveError::RecursionLimitExceeded`].

mod job;
mod queue;

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

pub use job::{Job, JobId};
pub use queue::{
    flush_jobs, flush_post_flush_cbs, flush_state, has_pending_flush, invalidate_job,
    is_flushing, queue_job, queue_post_flush_cb, queue_post_flush_cbs, queued_len, FlushState,
};

use crate::error::ReactiveError;

/// Future returned by [`next_tick`].
#[derive(Debug)]
#[must_use = "futures do nothing unless polled"]
pub struct NextTick {
    _private: (),
}

impl Future for NextTick {
    type Output = Result<(), ReactiveError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if queue::is_flushing() {
            queue::wake_after_flush(cx.waker());
            return Poll::Pending;
        }
        Poll::Ready(queue::flush_jobs())
    }
}

/// Resolves once the pending flush has completed.
pub fn next_tick() -> NextTick {
    NextTick { _private: () }
}

/// Wait for the pending flush, then run `f` and return its result.
pub async fn next_tick_with<F, R>(f: F) -> Result<R, ReactiveError>
where
    F: FnOnce() -> R,
{
    next_tick().await?;
    Ok(f())
}
