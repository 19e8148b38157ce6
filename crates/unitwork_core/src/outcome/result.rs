//! Propagatable operation outcome.
//!
//! # Responsibility
//! - Report success/failure together with status, message and error entries.
//! - Aggregate several outcomes into one (`combine` / `+`).
//! - Re-wrap an existing outcome around a different payload type.
//!
//! # Invariants
//! - `errors` keeps insertion order and allows duplicates.
//! - Combination never mutates its operands; it builds a new outcome.
//! - A success outcome has no errors unless built that way explicitly.

use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::ops::Add;

/// One `(code, error)` pair carried by a failed outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorEntry {
    /// Stable machine-readable code.
    pub code: String,
    /// Human-readable description.
    pub error: String,
}

impl ErrorEntry {
    pub fn new(code: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            error: error.into(),
        }
    }
}

impl Display for ErrorEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.error)
    }
}

/// Outcome of an operation, optionally carrying a payload.
///
/// `Outcome<()>` is the value-less form used by validators; value-bearing
/// forms are produced by `rewrap`/`map`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome<T = ()> {
    succeeded: bool,
    status_code: Option<u16>,
    message: Option<String>,
    errors: Vec<ErrorEntry>,
    value: Option<T>,
}

impl<T> Outcome<T> {
    /// Creates a success outcome carrying `value`.
    pub fn success(value: T) -> Self {
        Self {
            succeeded: true,
            status_code: None,
            message: None,
            errors: Vec::new(),
            value: Some(value),
        }
    }

    /// Creates a success outcome without payload.
    pub fn success_empty() -> Self {
        Self {
            succeeded: true,
            status_code: None,
            message: None,
            errors: Vec::new(),
            value: None,
        }
    }

    /// Creates a failed outcome with no message, status or errors.
    pub fn failure() -> Self {
        Self {
            succeeded: false,
            status_code: None,
            message: None,
            errors: Vec::new(),
            value: None,
        }
    }

    /// Creates a failed outcome with a message.
    pub fn fail(message: impl Into<String>) -> Self {
        Self::failure().with_message(message)
    }

    /// Creates a failed outcome from an error value.
    ///
    /// The error's display text becomes both the message and a single entry
    /// under `code`.
    pub fn from_error(code: impl Into<String>, err: &dyn Error) -> Self {
        let text = err.to_string();
        Self::failure()
            .with_message(text.clone())
            .with_error(code, text)
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_status(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    /// Appends one error entry.
    pub fn with_error(mut self, code: impl Into<String>, error: impl Into<String>) -> Self {
        self.errors.push(ErrorEntry::new(code, error));
        self
    }

    pub fn with_value(mut self, value: T) -> Self {
        self.value = Some(value);
        self
    }

    /// Truthiness of the outcome.
    pub fn succeeded(&self) -> bool {
        self.succeeded
    }

    pub fn status_code(&self) -> Option<u16> {
        self.status_code
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn errors(&self) -> &[ErrorEntry] {
        &self.errors
    }

    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn into_value(self) -> Option<T> {
        self.value
    }

    /// Combines two outcomes into a new one.
    ///
    /// - `succeeded` is the conjunction of both operands.
    /// - `errors` is `self.errors` followed by `other.errors`.
    /// - status and message come from the failing operand; when both fail or
    ///   both succeed, the later operand wins where it has a value.
    /// - the payload is `other`'s if present, otherwise `self`'s.
    pub fn combine(self, other: Outcome<T>) -> Outcome<T> {
        let (status_code, message) = if self.succeeded == other.succeeded {
            (
                other.status_code.or(self.status_code),
                other.message.or(self.message),
            )
        } else if other.succeeded {
            (self.status_code, self.message)
        } else {
            (other.status_code, other.message)
        };

        let mut errors = self.errors;
        errors.extend(other.errors);

        Outcome {
            succeeded: self.succeeded && other.succeeded,
            status_code,
            message,
            errors,
            value: other.value.or(self.value),
        }
    }

    /// Re-wraps this outcome around `value`, keeping success, status,
    /// message and errors untouched.
    pub fn rewrap<U>(self, value: U) -> Outcome<U> {
        Outcome {
            succeeded: self.succeeded,
            status_code: self.status_code,
            message: self.message,
            errors: self.errors,
            value: Some(value),
        }
    }

    /// Maps the payload (if any) without re-evaluating success.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        Outcome {
            succeeded: self.succeeded,
            status_code: self.status_code,
            message: self.message,
            errors: self.errors,
            value: self.value.map(f),
        }
    }

    /// Drops the payload, producing the value-less form.
    pub fn discard(self) -> Outcome {
        self.map(|_| ())
    }

    /// Lifts the outcome into `Result` for `?`-based callers.
    ///
    /// A success outcome without payload yields `OutcomeError` with no
    /// entries, since there is no value to hand out.
    pub fn into_result(self) -> Result<T, OutcomeError> {
        match (self.succeeded, self.value) {
            (true, Some(value)) => Ok(value),
            (_, _) => Err(OutcomeError {
                status_code: self.status_code,
                message: self.message,
                errors: self.errors,
            }),
        }
    }
}

impl<T> Add for Outcome<T> {
    type Output = Outcome<T>;

    fn add(self, rhs: Self) -> Self::Output {
        self.combine(rhs)
    }
}

impl<T> From<&Outcome<T>> for bool {
    fn from(value: &Outcome<T>) -> Self {
        value.succeeded
    }
}

impl<T> Display for Outcome<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", if self.succeeded { "succeeded" } else { "failed" })?;
        if let Some(status) = self.status_code {
            write!(f, " status={status}")?;
        }
        if let Some(message) = &self.message {
            write!(f, " message=\"{message}\"")?;
        }
        for entry in &self.errors {
            write!(f, " [{entry}]")?;
        }
        Ok(())
    }
}

/// A failed (or empty) outcome lifted into `std::result::Result`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutcomeError {
    pub status_code: Option<u16>,
    pub message: Option<String>,
    pub errors: Vec<ErrorEntry>,
}

impl Display for OutcomeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match (&self.message, self.errors.first()) {
            (Some(message), _) => write!(f, "{message}")?,
            (None, Some(entry)) => write!(f, "{entry}")?,
            (None, None) => write!(f, "outcome carried no value")?,
        }
        if self.errors.len() > 1 {
            write!(f, " (+{} more)", self.errors.len() - 1)?;
        }
        Ok(())
    }
}

impl Error for OutcomeError {}

#[cfg(test)]
mod tests {
    use super::{ErrorEntry, Outcome};

    fn failing(status: u16, code: &str, error: &str) -> Outcome {
        Outcome::failure()
            .with_status(status)
            .with_message(format!("failed with {status}"))
            .with_error(code, error)
    }

    #[test]
    fn combine_is_order_preserving_and_right_biased() {
        let combined = failing(401, "1", "One") + failing(402, "2", "Two") + failing(403, "3", "Thr");

        assert!(!combined.succeeded());
        assert_eq!(combined.status_code(), Some(403));
        assert_eq!(combined.message(), Some("failed with 403"));
        assert_eq!(
            combined.errors(),
            &[
                ErrorEntry::new("1", "One"),
                ErrorEntry::new("2", "Two"),
                ErrorEntry::new("3", "Thr"),
            ]
        );
    }

    #[test]
    fn combine_keeps_failing_operand_status_when_later_succeeds() {
        let combined = failing(409, "conflict", "dup") + Outcome::success_empty().with_status(200);

        assert!(!combined.succeeded());
        assert_eq!(combined.status_code(), Some(409));
        assert_eq!(combined.errors().len(), 1);
    }

    #[test]
    fn combine_does_not_leak_success_message_into_failure() {
        let combined = Outcome::<()>::success_empty().with_message("fine")
            + Outcome::failure().with_error("x", "broken");

        assert!(!combined.succeeded());
        assert_eq!(combined.message(), None);
    }

    #[test]
    fn combine_of_successes_prefers_later_payload() {
        let combined = Outcome::success(1) + Outcome::success(2);
        assert!(combined.succeeded());
        assert_eq!(combined.value(), Some(&2));

        let combined = Outcome::success(1) + Outcome::success_empty();
        assert_eq!(combined.value(), Some(&1));
    }

    #[test]
    fn rewrap_preserves_failure_and_errors() {
        let source = failing(422, "validation", "name is required");
        let wrapped = source.clone().rewrap(("model", Option::<u32>::None));

        assert!(!wrapped.succeeded());
        assert_eq!(wrapped.status_code(), source.status_code());
        assert_eq!(wrapped.message(), source.message());
        assert_eq!(wrapped.errors(), source.errors());
        assert_eq!(wrapped.value(), Some(&("model", None)));
    }

    #[test]
    fn truthiness_follows_succeeded() {
        assert!(bool::from(&Outcome::success(5)));
        assert!(!bool::from(&Outcome::<()>::fail("no")));
    }

    #[test]
    fn into_result_lifts_failures() {
        assert_eq!(Outcome::success(7).into_result().expect("success"), 7);

        let err = failing(500, "save_failed", "disk full")
            .into_result()
            .expect_err("failed outcome must be Err");
        assert_eq!(err.status_code, Some(500));
        assert_eq!(err.to_string(), "failed with 500");
    }

    #[test]
    fn from_error_captures_display_text() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "device busy");
        let outcome = Outcome::<i64>::from_error("save_failed", &io);

        assert!(!outcome.succeeded());
        assert_eq!(outcome.message(), Some("device busy"));
        assert_eq!(outcome.errors(), &[ErrorEntry::new("save_failed", "device busy")]);
    }

    #[test]
    fn display_lists_entries() {
        let text = failing(401, "1", "One").to_string();
        assert!(text.starts_with("failed status=401"));
        assert!(text.contains("[1: One]"));
    }
}
