//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Require an authenticated caller before touching the store.
//! - Log failures with context, then hand them back to the caller.

use crate::auth::{AuthError, AuthUser, Caller};
use crate::model::validation::ValidationError;
use crate::repo::RepoError;
use log::warn;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod order_service;
pub mod quote_service;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Step of the quote creation workflow that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowStep {
    /// Opening the store transaction.
    Begin,
    InsertQuote,
    InsertSpace { space: usize },
    InsertItem { space: usize, item: usize },
    Commit,
}

impl Display for WorkflowStep {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Begin => write!(f, "begin"),
            Self::InsertQuote => write!(f, "insert_quote"),
            Self::InsertSpace { space } => write!(f, "insert_space[{space}]"),
            Self::InsertItem { space, item } => write!(f, "insert_item[{space}][{item}]"),
            Self::Commit => write!(f, "commit"),
        }
    }
}

/// A store failure inside a multi-step workflow, tagged with its step.
#[derive(Debug)]
pub struct WorkflowStepError {
    pub step: WorkflowStep,
    pub source: RepoError,
}

impl WorkflowStepError {
    pub fn new(step: WorkflowStep, source: impl Into<RepoError>) -> Self {
        Self {
            step,
            source: source.into(),
        }
    }
}

impl Display for WorkflowStepError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "step `{}` failed: {}", self.step, self.source)
    }
}

impl Error for WorkflowStepError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.source)
    }
}

/// Service error surfaced to callers.
///
/// Validation failures render as `field: message` lines; every other
/// failure renders as `Failed to <operation>: <detail>`.
#[derive(Debug)]
pub enum ServiceError {
    /// Input failed field validation.
    Validation(ValidationError),
    /// Caller identity is missing or unusable.
    Auth {
        operation: &'static str,
        source: AuthError,
    },
    /// The store rejected or failed a single operation.
    Store {
        operation: &'static str,
        source: RepoError,
    },
    /// A later step of a multi-step write failed; nothing was committed.
    WorkflowStep {
        operation: &'static str,
        source: WorkflowStepError,
    },
}

impl ServiceError {
    /// Wraps a repository failure for `operation`.
    ///
    /// Repository-side validation failures stay `Validation` so callers see
    /// the field list rather than a wrapped message.
    pub(crate) fn store(operation: &'static str, source: RepoError) -> Self {
        match source {
            RepoError::Validation(err) => Self::Validation(err),
            other => Self::Store {
                operation,
                source: other,
            },
        }
    }

    pub(crate) fn auth(operation: &'static str, source: AuthError) -> Self {
        Self::Auth { operation, source }
    }

    /// Field violations, when this is a validation failure.
    pub fn validation(&self) -> Option<&ValidationError> {
        match self {
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }

    /// Failed workflow step, when this is a workflow failure.
    pub fn failed_step(&self) -> Option<WorkflowStep> {
        match self {
            Self::WorkflowStep { source, .. } => Some(source.step),
            _ => None,
        }
    }
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Auth { operation, source } => write!(f, "Failed to {operation}: {source}"),
            Self::Store { operation, source } => write!(f, "Failed to {operation}: {source}"),
            Self::WorkflowStep { operation, source } => {
                write!(f, "Failed to {operation}: {source}")
            }
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Auth { source, .. } => Some(source),
            Self::Store { source, .. } => Some(source),
            Self::WorkflowStep { source, .. } => Some(source),
        }
    }
}

impl From<ValidationError> for ServiceError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Resolves the caller for `operation`, logging rejected anonymous calls.
pub(crate) fn require_user<'c>(
    caller: &'c Caller,
    event: &str,
    operation: &'static str,
) -> ServiceResult<&'c AuthUser> {
    caller.require_user().map_err(|err| {
        warn!("event={event} module=service status=rejected reason=unauthenticated");
        ServiceError::auth(operation, err)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn store_errors_are_prefixed_with_the_operation() {
        let id = Uuid::nil();
        let err = ServiceError::store(
            "get order",
            RepoError::NotFound {
                collection: crate::repo::Collection::Orders,
                id,
            },
        );
        assert_eq!(
            err.to_string(),
            format!("Failed to get order: orders row not found: {id}")
        );
    }

    #[test]
    fn repo_validation_errors_stay_field_level() {
        let violation = ValidationError::single("total", "Total must be greater than 0");
        let err = ServiceError::store("create quote", RepoError::Validation(violation));
        assert_eq!(err.validation().unwrap().fields(), vec!["total"]);
        assert_eq!(err.to_string(), "total: Total must be greater than 0");
    }

    #[test]
    fn workflow_steps_render_indexes() {
        assert_eq!(WorkflowStep::InsertQuote.to_string(), "insert_quote");
        assert_eq!(
            WorkflowStep::InsertSpace { space: 2 }.to_string(),
            "insert_space[2]"
        );
        assert_eq!(
            WorkflowStep::InsertItem { space: 0, item: 3 }.to_string(),
            "insert_item[0][3]"
        );
    }
}
