use crate::error::{ExpectationFailure, RequestLine};
use crate::registry::Registry;
use crate::session::SessionLog;
use log::debug;

/// What [`MockHttp::verify`](crate::MockHttp::verify) returns when every expectation was met.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerificationReport {
    /// How many requests the server answered, matched or not.
    pub requests_served: u64,
    /// Unexpected errors the serving loop ran into and recovered from - e.g. failing to accept a
    /// connection for reasons other than the client going away.
    /// They are not expectation failures, hence they do not fail verification.
    pub serving_errors: Vec<String>,
}

/// Turn what the server observed into a verdict.
///
/// The most recent failure is reported. A later successful request does not clear it, so an
/// out-of-order request still fails verification once the right order has been restored.
/// If no request was rejected, the first mandatory expectation (in registration order) that
/// was never invoked fails verification.
pub(crate) fn verify(
    session: SessionLog,
    registry: &Registry,
) -> Result<VerificationReport, ExpectationFailure> {
    if let Some(failure) = session.last_failure {
        if let Some(violation) = session.ordering_violation.filter(|v| *v != failure) {
            debug!("Reporting the most recent failure. An earlier one was: {}", violation);
        }
        return Err(failure);
    }
    if let Some(failure) = unretrieved(registry) {
        return Err(failure);
    }
    Ok(VerificationReport {
        requests_served: session.requests_served,
        serving_errors: session.serving_errors,
    })
}

fn unretrieved(registry: &Registry) -> Option<ExpectationFailure> {
    registry
        .all_expectations()
        .find(|registered| {
            registered.specification.times.is_mandatory() && registered.invocation_count == 0
        })
        .map(|registered| {
            let expected = &registered.specification;
            ExpectationFailure::UnretrievedUrl {
                request: RequestLine::new(&expected.method, &expected.path),
                detail: format!("expected {:?}, got no request", expected.times),
            }
        })
}
