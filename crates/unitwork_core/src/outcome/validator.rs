//! Validator contract and chaining.
//!
//! # Responsibility
//! - Define the pluggable `&Model -> Outcome` validation seam.
//! - Run validator chains that surface every failure in one pass.
//!
//! # Invariants
//! - Validators only borrow the model immutably.
//! - Chains never short-circuit: every validator runs and its outcome is
//!   combined into the running total in declaration order.

use super::result::Outcome;
use regex::Regex;

/// Error code used by the built-in rule/pattern validators.
pub const VALIDATION_ERROR_CODE: &str = "validation";

/// Inspects a model and reports whether it may be manipulated.
pub trait Validator<M: ?Sized> {
    fn validate(&self, model: &M) -> Outcome;
}

impl<M: ?Sized, F> Validator<M> for F
where
    F: Fn(&M) -> Outcome,
{
    fn validate(&self, model: &M) -> Outcome {
        self(model)
    }
}

/// Runs every validator against `model` and combines the outcomes.
///
/// Returns success for an empty validator list.
pub fn check_all<M: ?Sized>(model: &M, validators: &[&dyn Validator<M>]) -> Outcome {
    let mut iter = validators.iter();
    let Some(first) = iter.next() else {
        return Outcome::success_empty();
    };

    iter.fold(first.validate(model), |total, validator| {
        total + validator.validate(model)
    })
}

/// Owned, reusable validator chain with `check_all` semantics.
pub struct ValidatorChain<'a, M: ?Sized> {
    validators: Vec<Box<dyn Validator<M> + 'a>>,
}

impl<'a, M: ?Sized> ValidatorChain<'a, M> {
    pub fn new() -> Self {
        Self {
            validators: Vec::new(),
        }
    }

    /// Appends a validator to the end of the chain.
    pub fn with(mut self, validator: impl Validator<M> + 'a) -> Self {
        self.validators.push(Box::new(validator));
        self
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }
}

impl<M: ?Sized> Default for ValidatorChain<'_, M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: ?Sized> Validator<M> for ValidatorChain<'_, M> {
    fn validate(&self, model: &M) -> Outcome {
        let refs: Vec<&dyn Validator<M>> = self
            .validators
            .iter()
            .map(|validator| validator.as_ref())
            .collect();
        check_all(model, &refs)
    }
}

/// Builds a validator that fails with `(code, message)` when `predicate`
/// returns `false`.
pub fn rule<M: ?Sized>(
    code: impl Into<String>,
    message: impl Into<String>,
    predicate: impl Fn(&M) -> bool,
) -> impl Validator<M> {
    let code = code.into();
    let message = message.into();
    move |model: &M| {
        if predicate(model) {
            Outcome::success_empty()
        } else {
            Outcome::fail(message.clone()).with_error(code.clone(), message.clone())
        }
    }
}

/// Builds a validator that requires the projected text to match `regex`.
pub fn pattern<M: ?Sized>(
    message: impl Into<String>,
    regex: Regex,
    project: impl Fn(&M) -> &str,
) -> impl Validator<M> {
    rule(VALIDATION_ERROR_CODE, message, move |model: &M| {
        regex.is_match(project(model))
    })
}
