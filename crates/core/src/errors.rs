use thiserror::Error;

use crate::domain::order::OrderStatus;
use crate::domain::public_quote::PublicQuoteStatus;
use crate::domain::quote::QuoteStatus;
use crate::validation::ValidationViolation;

fn joined(violations: &[ValidationViolation]) -> String {
    violations.iter().map(|v| v.message.as_str()).collect::<Vec<_>>().join("; ")
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid quote transition from {from:?} to {to:?}")]
    InvalidQuoteTransition { from: QuoteStatus, to: QuoteStatus },
    #[error("invalid order transition from {from:?} to {to:?}: {reason}")]
    InvalidOrderTransition { from: OrderStatus, to: OrderStatus, reason: String },
    #[error("invalid public quote transition from {from:?} to {to:?}")]
    InvalidPublicQuoteTransition { from: PublicQuoteStatus, to: PublicQuoteStatus },
    #[error("quote line items are not editable in {status:?} status")]
    QuoteNotEditable { status: QuoteStatus },
    #[error("delivered quantities were already confirmed for this order")]
    QuantitiesAlreadyConfirmed,
    #[error("quantities can only be confirmed while the order is ready (current: {status:?})")]
    QuantityConfirmationNotReady { status: OrderStatus },
    #[error("public quote was already converted")]
    AlreadyConverted,
    #[error("validation failed: {}", joined(.violations))]
    Validation { violations: Vec<ValidationViolation> },
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("no active pricing configuration is available")]
    MissingActiveConfig,
    #[error("quote number sequence unavailable: {0}")]
    SequenceUnavailable(String),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("conflict: {message}")]
    Conflict { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &str {
        match self {
            Self::BadRequest { message, .. } | Self::Conflict { message, .. } => message,
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::Conflict { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let unassigned = || "unassigned".to_owned();
        match value {
            // Validation failures carry the full aggregate message so the
            // caller sees every violated rule, not just the first.
            ApplicationError::Domain(error @ DomainError::Validation { .. })
            | ApplicationError::Domain(error @ DomainError::InvariantViolation(_)) => {
                Self::BadRequest { message: error.to_string(), correlation_id: unassigned() }
            }
            // State-transition violations: the record is left untouched and
            // the caller gets a specific not-allowed-in-current-state error.
            ApplicationError::Domain(error) => {
                Self::Conflict { message: error.to_string(), correlation_id: unassigned() }
            }
            // Fatal precondition: never silently defaulted to a hardcoded
            // price, always surfaced as a server-side error.
            ApplicationError::MissingActiveConfig => Self::Internal {
                message: ApplicationError::MissingActiveConfig.to_string(),
                correlation_id: unassigned(),
            },
            ApplicationError::SequenceUnavailable(message)
            | ApplicationError::Persistence(message) => {
                Self::ServiceUnavailable { message, correlation_id: unassigned() }
            }
            ApplicationError::Configuration(message) => {
                Self::Internal { message, correlation_id: unassigned() }
            }
        }
    }
}
