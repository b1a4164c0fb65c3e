use crate::error::ExpectationFailure;
use crate::{Expectation, MockHttpError};
use http::Method;
use log::debug;
use std::collections::HashMap;

/// Identifies an [`Expectation`] within the [`Registry`] it was registered on.
/// Ids are handed out in registration order and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct ExpectationId(usize);

/// Given the behaviour specification as an [`Expectation`], keep track of runtime information
/// concerning it - e.g. how many times it matched an incoming request.
pub(crate) struct RegisteredExpectation {
    pub(crate) specification: Expectation,
    /// The expectation that must be invoked before this one, resolved at registration.
    pub(crate) after: Option<ExpectationId>,
    /// Only ever incremented, by the matcher, once every check has passed.
    pub(crate) invocation_count: u64,
    /// The most recent failure caused by a request for this expectation.
    pub(crate) last_failure: Option<ExpectationFailure>,
}

/// All the expectations registered on a mock server, keyed by method and path.
///
/// Expectations are never removed: re-registering a method and path shadows the previous
/// expectation for matching purposes, but the shadowed one stays reachable by id (and by name,
/// unless the name is reused) so that handles and `after` references keep working.
#[derive(Default)]
pub(crate) struct Registry {
    expectations: Vec<RegisteredExpectation>,
    by_route: HashMap<Method, HashMap<String, ExpectationId>>,
    by_name: HashMap<String, ExpectationId>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Store `specification`, replacing any expectation registered for the same method and path.
    ///
    /// Fails if `after` names an expectation that has not been registered yet.
    pub(crate) fn register(
        &mut self,
        specification: Expectation,
    ) -> Result<ExpectationId, MockHttpError> {
        let after = match &specification.after {
            Some(name) => match self.by_name.get(name) {
                Some(id) => Some(*id),
                None => return Err(MockHttpError::NameResolution { name: name.clone() }),
            },
            None => None,
        };

        let id = ExpectationId(self.expectations.len());
        if let Some(name) = &specification.name {
            self.by_name.insert(name.clone(), id);
        }
        let previous = self
            .by_route
            .entry(specification.method.clone())
            .or_default()
            .insert(specification.path.clone(), id);
        if previous.is_some() {
            debug!(
                "Replacing the expectation for {} {}.",
                specification.method, specification.path
            );
        }

        self.expectations.push(RegisteredExpectation {
            specification,
            after,
            invocation_count: 0,
            last_failure: None,
        });
        Ok(id)
    }

    /// Exact lookup on method and path, no pattern matching involved.
    pub(crate) fn lookup(&self, method: &Method, path: &str) -> Option<ExpectationId> {
        self.by_route.get(method)?.get(path).copied()
    }

    pub(crate) fn get(&self, id: ExpectationId) -> &RegisteredExpectation {
        &self.expectations[id.0]
    }

    pub(crate) fn get_mut(&mut self, id: ExpectationId) -> &mut RegisteredExpectation {
        &mut self.expectations[id.0]
    }

    /// The expectations currently answering requests, in registration order.
    pub(crate) fn all_expectations(&self) -> impl Iterator<Item = &RegisteredExpectation> {
        self.expectations
            .iter()
            .enumerate()
            .filter(|(index, registered)| {
                let expected = &registered.specification;
                self.lookup(&expected.method, &expected.path) == Some(ExpectationId(*index))
            })
            .map(|(_, registered)| registered)
    }
}
