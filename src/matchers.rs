//! The checks an incoming request goes through before it gets the response configured on its
//! [`Expectation`](crate::Expectation).
//!
//! Checks run in a fixed order and the first failing one wins, so each rejected request gets
//! exactly one diagnosis:
//! 1. an expectation must be registered for the request's method and path;
//! 2. required headers;
//! 3. required query parameters;
//! 4. required body;
//! 5. the [`Times`] policy;
//! 6. the `after` ordering constraint.
use crate::error::{ExpectationFailure, RequestLine};
use crate::registry::{ExpectationId, Registry, RegisteredExpectation};
use crate::request::{printable_body, BodyPrintLimit};
use crate::{Request, ResponseTemplate, Times};
use log::debug;

/// Match `request` against `registry`.
///
/// On success the matched expectation's invocation count goes up by one and its response
/// template is returned. On failure nothing is counted and the failure is remembered on the
/// expectation it was raised for (if any).
pub(crate) fn match_request(
    registry: &mut Registry,
    request: &Request,
    body_print_limit: BodyPrintLimit,
) -> Result<ResponseTemplate, ExpectationFailure> {
    let line = request.request_line();
    let id = registry
        .lookup(&request.method, request.path())
        .ok_or_else(|| ExpectationFailure::UnexpectedUrl {
            detail: format!("no expectation is registered for {}", line),
            request: line.clone(),
        })?;

    match check(registry, id, request, &line, body_print_limit) {
        Ok(()) => {
            let expectation = registry.get_mut(id);
            expectation.invocation_count += 1;
            debug!(
                "{} matched, invocation #{}.",
                line, expectation.invocation_count
            );
            Ok(expectation.specification.response.clone())
        }
        Err(failure) => {
            registry.get_mut(id).last_failure = Some(failure.clone());
            Err(failure)
        }
    }
}

fn check(
    registry: &Registry,
    id: ExpectationId,
    request: &Request,
    line: &RequestLine,
    body_print_limit: BodyPrintLimit,
) -> Result<(), ExpectationFailure> {
    let expectation = registry.get(id);
    check_headers(expectation, request, line)?;
    check_query_params(expectation, request, line)?;
    check_body(expectation, request, line, body_print_limit)?;
    check_times(expectation, line)?;
    check_order(registry, expectation, line)
}

fn check_headers(
    expectation: &RegisteredExpectation,
    request: &Request,
    line: &RequestLine,
) -> Result<(), ExpectationFailure> {
    for (name, expected) in &expectation.specification.headers {
        let mut values = request.headers.get_all(name).iter().peekable();
        if values.peek().is_none() {
            return Err(ExpectationFailure::MissingHeader {
                request: line.clone(),
                detail: format!("expected header `{}` is missing", name),
            });
        }
        if !values.any(|value| value == expected) {
            let received = request
                .headers
                .get_all(name)
                .iter()
                .map(|value| String::from_utf8_lossy(value.as_bytes()))
                .collect::<Vec<_>>()
                .join(",");
            return Err(ExpectationFailure::WrongHeaderValue {
                request: line.clone(),
                detail: format!(
                    "wrong value for `{}`. Expected: {:?} Got: {:?}",
                    name,
                    String::from_utf8_lossy(expected.as_bytes()),
                    received
                ),
            });
        }
    }
    Ok(())
}

fn check_query_params(
    expectation: &RegisteredExpectation,
    request: &Request,
    line: &RequestLine,
) -> Result<(), ExpectationFailure> {
    for (key, expected) in &expectation.specification.query_params {
        let received = request
            .url
            .query_pairs()
            .filter(|(k, _)| k.as_ref() == key.as_str())
            .map(|(_, v)| v.into_owned())
            .collect::<Vec<_>>();
        if received.is_empty() {
            return Err(ExpectationFailure::WrongQueryParam {
                request: line.clone(),
                detail: format!("expected query parameter `{}` is missing", key),
            });
        }
        if !received.iter().any(|value| value == expected) {
            return Err(ExpectationFailure::WrongQueryParamValue {
                request: line.clone(),
                detail: format!(
                    "wrong value for `{}`. Expected: {:?} Got: {:?}",
                    key,
                    expected,
                    received.join(",")
                ),
            });
        }
    }
    Ok(())
}

fn check_body(
    expectation: &RegisteredExpectation,
    request: &Request,
    line: &RequestLine,
    body_print_limit: BodyPrintLimit,
) -> Result<(), ExpectationFailure> {
    match &expectation.specification.body {
        Some(expected) if *expected != request.body => Err(ExpectationFailure::WrongBody {
            request: line.clone(),
            detail: format!(
                "expected request body {:?} Got: {:?}",
                printable_body(expected, body_print_limit),
                printable_body(&request.body, body_print_limit)
            ),
        }),
        _ => Ok(()),
    }
}

fn check_times(
    expectation: &RegisteredExpectation,
    line: &RequestLine,
) -> Result<(), ExpectationFailure> {
    match expectation.specification.times {
        Times::Never => Err(ExpectationFailure::UnexpectedUrl {
            request: line.clone(),
            detail: "expected never".into(),
        }),
        Times::Once if expectation.invocation_count >= 1 => {
            Err(ExpectationFailure::AlreadyRetrieved {
                request: line.clone(),
                detail: "requested twice, expected once".into(),
            })
        }
        _ => Ok(()),
    }
}

fn check_order(
    registry: &Registry,
    expectation: &RegisteredExpectation,
    line: &RequestLine,
) -> Result<(), ExpectationFailure> {
    let Some(after) = expectation.after else {
        return Ok(());
    };
    let predecessor = registry.get(after);
    if predecessor.invocation_count > 0 {
        return Ok(());
    }
    let predecessor = &predecessor.specification;
    Err(ExpectationFailure::OutOfOrder {
        request: line.clone(),
        detail: format!(
            "expected only after {} {} (`{}`)",
            predecessor.method,
            predecessor.path,
            predecessor.name.as_deref().unwrap_or_default()
        ),
    })
}
