//! Scheduler jobs.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

/// Unique identifier for a job. Queues deduplicate by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct JobId(u64);

impl JobId {
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job #{}", self.0)
    }
}

struct JobInner {
    id: JobId,
    order: Option<u64>,
    label: Option<String>,
    run: Arc<dyn Fn() + Send + Sync>,
}

/// A unit of deferred work with a stable identity.
///
/// Cloning the handle keeps the identity, so queueing clones of one job
/// before a flush runs it once.
#[derive(Clone)]
pub struct Job {
    inner: Arc<JobInner>,
}

impl Job {
    pub fn new<F>(run: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(JobInner {
                id: JobId::new(),
                order: None,
                label: None,
                run: Arc::new(run),
            }),
        }
    }

    /// Set the ordering id. Lower ids run first within a flush; jobs without
    /// one run after all ordered jobs. The job keeps its identity.
    pub fn with_order(self, order: u64) -> Self {
        self.rebuild(Some(order), self.inner.label.clone())
    }

    /// Name the job in diagnostics. The job keeps its identity.
    pub fn with_label(self, label: impl Into<String>) -> Self {
        self.rebuild(self.inner.order, Some(label.into()))
    }

    fn rebuild(&self, order: Option<u64>, label: Option<String>) -> Self {
        Self {
            inner: Arc::new(JobInner {
                id: self.inner.id,
                order,
                label,
                run: self.inner.run.clone(),
            }),
        }
    }

    pub fn id(&self) -> JobId {
        self.inner.id
    }

    pub fn order(&self) -> Option<u64> {
        self.inner.order
    }

    pub fn label(&self) -> Option<&str> {
        self.inner.label.as_deref()
    }

    /// The label, or the id when unlabeled.
    pub fn describe(&self) -> String {
        match &self.inner.label {
            Some(label) => label.clone(),
            None => self.inner.id.to_string(),
        }
    }

    pub(crate) fn invoke(&self) {
        (self.inner.run)()
    }
}

impl PartialEq for Job {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for Job {}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.inner.id.raw())
            .field("order", &self.inner.order)
            .field("label", &self.inner.label)
            .finish()
    }
}
