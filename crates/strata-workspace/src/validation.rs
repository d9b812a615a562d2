// validation.rs — Structured validation failures raised during submit.
//
// An extension vetoes a submit by returning a ValidationError from its
// on_submitting_changes hook. Nothing is committed; the caller may fix the
// offending entities and resubmit the same workspace.

use std::fmt;
use thiserror::Error;

use strata_changeset::RecordKey;

/// Severity tag on one validation result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationSeverity {
    Warning,
    Error,
}

impl fmt::Display for ValidationSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warning => f.write_str("warning"),
            Self::Error => f.write_str("error"),
        }
    }
}

/// One field-level validation finding.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    /// The entity the finding is about.
    pub target: RecordKey,
    /// The offending property.
    pub property: String,
    /// Human-readable description of the problem.
    pub message: String,
    pub severity: ValidationSeverity,
}

impl ValidationResult {
    pub fn error(
        target: RecordKey,
        property: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            target,
            property: property.into(),
            message: message.into(),
            severity: ValidationSeverity::Error,
        }
    }

    pub fn warning(
        target: RecordKey,
        property: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            target,
            property: property.into(),
            message: message.into(),
            severity: ValidationSeverity::Warning,
        }
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}.{}: {}",
            self.severity, self.target, self.property, self.message
        )
    }
}

/// Aggregate of field-level findings that aborted a submit.
#[derive(Debug, Clone, Error)]
#[error("validation failed with {} finding(s):\n{}", .results.len(), format_results(.results))]
pub struct ValidationError {
    pub results: Vec<ValidationResult>,
}

impl ValidationError {
    pub fn new(results: Vec<ValidationResult>) -> Self {
        Self { results }
    }

    pub fn single(result: ValidationResult) -> Self {
        Self {
            results: vec![result],
        }
    }
}

fn format_results(results: &[ValidationResult]) -> String {
    results
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}
