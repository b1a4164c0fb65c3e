use crate::error::ExpectationFailure;
use log::warn;

/// What the serving loop observed during a session.
///
/// It is owned by the serving thread and handed over, once, to the lifecycle controller when
/// the loop shuts down - the caller thread never looks at it while requests are being served.
#[derive(Debug, Default)]
pub(crate) struct SessionLog {
    /// Most recent rejection. Later failures overwrite earlier ones.
    pub(crate) last_failure: Option<ExpectationFailure>,
    /// Set by the first out-of-order request and never overwritten, even when a later
    /// failure takes its place as `last_failure`.
    pub(crate) ordering_violation: Option<ExpectationFailure>,
    pub(crate) requests_served: u64,
    /// Errors that are neither expectation failures nor expected transient I/O hiccups.
    pub(crate) serving_errors: Vec<String>,
}

impl SessionLog {
    pub(crate) fn record_failure(&mut self, failure: ExpectationFailure) {
        if matches!(failure, ExpectationFailure::OutOfOrder { .. })
            && self.ordering_violation.is_none()
        {
            self.ordering_violation = Some(failure.clone());
        }
        self.last_failure = Some(failure);
    }

    pub(crate) fn record_serving_error(&mut self, error: String) {
        warn!("Unexpected error while serving requests: {}", error);
        self.serving_errors.push(error);
    }
}
