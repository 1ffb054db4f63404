//! Error types and the injectable error handler.
//!
//! Misuse (writing to a readonly wrapper, wrapping a number) is not an error:
//! it is reported through `tracing` and ignored. What remains is either fatal
//! for a flush ([`ReactiveError::RecursionLimitExceeded`]) or a panic inside
//! user code that was caught at a job or effect boundary.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde::Serialize;

/// Where a caught panic came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorSource {
    /// A job in the main scheduler queue.
    Scheduler,
    /// A post-flush callback.
    PostFlush,
    /// An effect run synchronously by a trigger.
    Effect,
}

impl fmt::Display for ErrorSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorSource::Scheduler => write!(f, "scheduler job"),
            ErrorSource::PostFlush => write!(f, "post-flush callback"),
            ErrorSource::Effect => write!(f, "effect"),
        }
    }
}

/// Errors surfaced by the reactive runtime.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReactiveError {
    /// A job re-queued itself more often than the configured limit within a
    /// single flush. The flush is aborted and both queues are cleared.
    #[error(
        "maximum recursive updates exceeded in {job} (limit {limit}); \
         a job, watcher or effect is probably mutating state it depends on"
    )]
    RecursionLimitExceeded { job: String, limit: usize },

    /// User code panicked inside a job, post-flush callback or effect.
    #[error("{origin} `{label}` panicked: {message}")]
    Panicked {
        origin: ErrorSource,
        label: String,
        message: String,
    },
}

type ErrorHandler = Rc<dyn Fn(&ReactiveError)>;

thread_local! {
    static ERROR_HANDLER: RefCell<Option<ErrorHandler>> = const { RefCell::new(None) };
}

/// Route caught errors on this thread to `handler` instead of the default
/// `tracing::error!` sink.
pub fn set_error_handler<F>(handler: F)
where
    F: Fn(&ReactiveError) + 'static,
{
    ERROR_HANDLER.with(|slot| *slot.borrow_mut() = Some(Rc::new(handler)));
}

/// Restore the default error sink.
pub fn clear_error_handler() {
    ERROR_HANDLER.with(|slot| slot.borrow_mut().take());
}

/// Hand an error to the current thread's handler.
pub fn handle_error(error: ReactiveError) {
    // Clone out of the slot so the handler may itself install a new handler.
    let handler = ERROR_HANDLER.with(|slot| slot.borrow().clone());
    match handler {
        Some(handler) => handler(&error),
        None => tracing::error!(error = %error, "unhandled error in reactive computation"),
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recursion_error_names_the_job() {
        let error = ReactiveError::RecursionLimitExceeded {
            job: "render".into(),
            limit: 100,
        };
        let text = error.to_string();
        assert!(text.contains("render"));
        assert!(text.contains("100"));
    }

    #[test]
    fn custom_handler_receives_errors() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        set_error_handler(move |error| sink.borrow_mut().push(error.clone()));

        handle_error(ReactiveError::Panicked {
            origin: ErrorSource::Effect,
            label: "effect #1".into(),
            message: "boom".into(),
        });

        clear_error_handler();
        assert_eq!(seen.borrow().len(), 1);
        assert!(seen.borrow()[0].to_string().contains("boom"));
    }

    #[test]
    fn panic_message_extracts_strings() {
        let payload: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(payload.as_ref()), "static");

        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");

        let payload: Box<dyn Any + Send> = Box::new(42);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }
}
