//! Job Queue
//!
//! Batches re-runs so that any number of writes before a flush cause at most
//! one run per job.
//!
//! # Algorithm
//!
//! 1. `queue_job` appends a job unless it is already waiting, and marks a
//!    flush as pending.
//! 2. `flush_jobs` sorts the waiting jobs by ordering id (unordered last,
//!    insertion order kept for ties) and runs them front to back. Jobs queued
//!    while flushing are appended and run in the same flush.
//! 3. Post-flush callbacks run once the main queue is empty, deduplicated.
//! 4. Steps 2 and 3 repeat until both queues are empty.
//!
//! Every run of a job or callback within one flush is counted. A job that
//! keeps re-queueing itself past the recursion limit aborts the flush.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::task::Waker;

use serde::Serialize;

use super::job::{Job, JobId};
use crate::config;
use crate::error::{handle_error, panic_message, ErrorSource, ReactiveError};

/// Lifecycle of the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum FlushState {
    /// Nothing waiting.
    #[default]
    Idle,
    /// Work is queued and a flush is due.
    Pending,
    /// A flush is running.
    Flushing,
}

#[derive(Default)]
struct Scheduler {
    /// Waiting jobs. Invalidated entries become `None` and are skipped.
    queue: VecDeque<Option<Job>>,
    post_flush: Vec<Job>,
    state: FlushState,
    waiters: Vec<Waker>,
}

impl Scheduler {
    fn contains(&self, id: JobId) -> bool {
        self.queue.iter().flatten().any(|job| job.id() == id)
    }

    fn request_flush(&mut self) {
        if self.state == FlushState::Idle {
            self.state = FlushState::Pending;
        }
    }

    fn is_drained(&self) -> bool {
        self.queue.is_empty() && self.post_flush.is_empty()
    }
}

thread_local! {
    static SCHEDULER: RefCell<Scheduler> = RefCell::new(Scheduler::default());
}

/// Queue a job for the next flush. A job already waiting is not added
/// again.
pub fn queue_job(job: Job) {
    let rejected = SCHEDULER.with(|scheduler| {
        let mut scheduler = scheduler.borrow_mut();
        if scheduler.contains(job.id()) {
            Some(job)
        } else {
            scheduler.queue.push_back(Some(job));
            scheduler.request_flush();
            None
        }
    });
    drop(rejected);
}

/// Remove a waiting job. Its slot is left empty so positions do not shift
/// under a running flush.
pub fn invalidate_job(job: &Job) {
    let removed = SCHEDULER.with(|scheduler| {
        let mut scheduler = scheduler.borrow_mut();
        scheduler
            .queue
            .iter_mut()
            .find(|entry| entry.as_ref().is_some_and(|queued| queued.id() == job.id()))
            .and_then(Option::take)
    });
    drop(removed);
}

/// Queue a callback to run after the main queue. A callback already waiting
/// is not added again.
pub fn queue_post_flush_cb(cb: Job) {
    let rejected = SCHEDULER.with(|scheduler| {
        let mut scheduler = scheduler.borrow_mut();
        if scheduler.post_flush.iter().any(|queued| queued.id() == cb.id()) {
            Some(cb)
        } else {
            scheduler.post_flush.push(cb);
            scheduler.request_flush();
            None
        }
    });
    drop(rejected);
}

/// Queue several post-flush callbacks as given. Duplicates are dropped when
/// the callbacks run.
pub fn queue_post_flush_cbs(cbs: impl IntoIterator<Item = Job>) {
    SCHEDULER.with(|scheduler| {
        let mut scheduler = scheduler.borrow_mut();
        scheduler.post_flush.extend(cbs);
        if !scheduler.post_flush.is_empty() {
            scheduler.request_flush();
        }
    });
}

pub fn flush_state() -> FlushState {
    SCHEDULER.with(|scheduler| scheduler.borrow().state)
}

/// Whether work is queued and no flush is running.
pub fn has_pending_flush() -> bool {
    flush_state() == FlushState::Pending
}

pub fn is_flushing() -> bool {
    flush_state() == FlushState::Flushing
}

/// Run every queued job and post-flush callback, including work queued
/// along the way.
///
/// Calling it from inside a running flush is a no-op: the outer flush picks
/// up anything queued.
pub fn flush_jobs() -> Result<(), ReactiveError> {
    let start = SCHEDULER.with(|scheduler| {
        let mut scheduler = scheduler.borrow_mut();
        match scheduler.state {
            FlushState::Flushing => false,
            _ if scheduler.is_drained() => {
                scheduler.state = FlushState::Idle;
                false
            }
            _ => {
                scheduler.state = FlushState::Flushing;
                true
            }
        }
    });
    if !start {
        return Ok(());
    }

    let mut seen = HashMap::new();
    let result = run_flush(&mut seen);

    let (waiters, discarded) = SCHEDULER.with(|scheduler| {
        let mut scheduler = scheduler.borrow_mut();
        scheduler.state = FlushState::Idle;
        let discarded = if result.is_err() {
            (
                std::mem::take(&mut scheduler.queue),
                std::mem::take(&mut scheduler.post_flush),
            )
        } else {
            Default::default()
        };
        (std::mem::take(&mut scheduler.waiters), discarded)
    });
    drop(discarded);

    for waker in waiters {
        waker.wake();
    }
    result
}

/// Run the waiting post-flush callbacks now.
pub fn flush_post_flush_cbs() -> Result<(), ReactiveError> {
    let mut seen = HashMap::new();
    run_post_flush(&mut seen)
}

fn run_flush(seen: &mut HashMap<JobId, usize>) -> Result<(), ReactiveError> {
    let mut cycle = 0usize;
    loop {
        cycle += 1;
        let queued = SCHEDULER.with(|scheduler| {
            let mut scheduler = scheduler.borrow_mut();
            scheduler
                .queue
                .make_contiguous()
                .sort_by_key(|entry| match entry.as_ref().and_then(Job::order) {
                    Some(order) => (false, order),
                    None => (true, 0),
                });
            scheduler.queue.len()
        });
        tracing::trace!(cycle, queued, "flushing jobs");

        while let Some(entry) = next_entry() {
            let Some(job) = entry else {
                continue;
            };
            check_recursion(seen, &job)?;
            run_guarded(&job, ErrorSource::Scheduler);
        }

        run_post_flush(seen)?;

        if SCHEDULER.with(|scheduler| scheduler.borrow().is_drained()) {
            return Ok(());
        }
    }
}

fn next_entry() -> Option<Option<Job>> {
    SCHEDULER.with(|scheduler| scheduler.borrow_mut().queue.pop_front())
}

fn run_post_flush(seen: &mut HashMap<JobId, usize>) -> Result<(), ReactiveError> {
    let mut callbacks =
        SCHEDULER.with(|scheduler| std::mem::take(&mut scheduler.borrow_mut().post_flush));
    if callbacks.is_empty() {
        return Ok(());
    }

    let mut ids = HashSet::new();
    callbacks.retain(|cb| ids.insert(cb.id()));

    for cb in &callbacks {
        check_recursion(seen, cb)?;
        run_guarded(cb, ErrorSource::PostFlush);
    }
    Ok(())
}

fn check_recursion(seen: &mut HashMap<JobId, usize>, job: &Job) -> Result<(), ReactiveError> {
    let limit = config::recursion_limit();
    let count = seen.entry(job.id()).or_insert(0);
    if *count > limit {
        return Err(ReactiveError::RecursionLimitExceeded {
            job: job.describe(),
            limit,
        });
    }
    *count += 1;
    Ok(())
}

fn run_guarded(job: &Job, origin: ErrorSource) {
    if let Err(payload) = catch_unwind(AssertUnwindSafe(|| job.invoke())) {
        handle_error(ReactiveError::Panicked {
            origin,
            label: job.describe(),
            message: panic_message(payload.as_ref()),
        });
    }
}

/// Register a waker to be woken when the running flush ends.
pub(super) fn wake_after_flush(waker: &Waker) {
    SCHEDULER.with(|scheduler| {
        let mut scheduler = scheduler.borrow_mut();
        if !scheduler.waiters.iter().any(|queued| queued.will_wake(waker)) {
            scheduler.waiters.push(waker.clone());
        }
    });
}

/// Number of jobs waiting in the main queue, invalidated slots included.
pub fn queued_len() -> usize {
    SCHEDULER.with(|scheduler| scheduler.borrow().queue.len())
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
