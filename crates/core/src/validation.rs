//! Field-level validation errors.
//!
//! Editors and the checkout wizard report every problem at once instead of
//! stopping at the first, so callers collect into [`ValidationErrors`] and
//! finish with [`ValidationErrors::into_result`].

use core::fmt;

use serde::{Deserialize, Serialize};

/// A problem with one input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Field name as it appears in the JSON payload.
    pub field: String,
    /// Human-readable message.
    pub message: String,
}

impl FieldError {
    /// Create a field error.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Accumulates [`FieldError`]s.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    /// An empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Record an error.
    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.push(FieldError::new(field, message));
    }

    /// Record an error when `value` is blank after trimming.
    pub fn require(&mut self, field: &str, value: &str) {
        if value.trim().is_empty() {
            self.push(field, "is required");
        }
    }

    /// Record an error when `value` is longer than `max` characters.
    pub fn max_chars(&mut self, field: &str, value: &str, max: usize) {
        if value.trim().chars().count() > max {
            self.push(field, format!("must be at most {max} characters"));
        }
    }

    /// Append errors from a nested validation.
    pub fn extend(&mut self, other: impl IntoIterator<Item = FieldError>) {
        self.0.extend(other);
    }

    /// Whether nothing was recorded.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether an error was recorded for `field`.
    #[must_use]
    pub fn has(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field == field)
    }

    /// The recorded errors.
    #[must_use]
    pub fn into_vec(self) -> Vec<FieldError> {
        self.0
    }

    /// `Ok(())` when empty, otherwise the recorded errors.
    ///
    /// # Errors
    ///
    /// Returns the collected field errors if any were recorded.
    pub fn into_result(self) -> Result<(), Vec<FieldError>> {
        if self.0.is_empty() { Ok(()) } else { Err(self.0) }
    }
}

impl IntoIterator for ValidationErrors {
    type Item = FieldError;
    type IntoIter = std::vec::IntoIter<FieldError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Optional text fields arrive as `""` from HTML forms; treat those as absent.
#[must_use]
pub fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn collects_every_error() {
        let mut errors = ValidationErrors::new();
        errors.require("name", "  ");
        errors.max_chars("description", "abcdef", 3);
        errors.require("email", "a@b.co");

        assert!(errors.has("name"));
        assert!(errors.has("description"));
        assert!(!errors.has("email"));
        assert_eq!(errors.into_result().unwrap_err().len(), 2);
    }

    #[test]
    fn empty_is_ok() {
        assert_eq!(ValidationErrors::new().into_result(), Ok(()));
    }

    #[test]
    fn blank_optionals_become_none() {
        assert_eq!(non_blank(Some("  ".into())), None);
        assert_eq!(non_blank(Some(" 7 ".into())), Some("7".into()));
        assert_eq!(non_blank(None), None);
    }
}
