//! Error types shared across the tally crates.
//!
//! Every error maps onto one [`ErrorKind`] so callers can decide how to
//! surface it: validation failures go straight back to the user, parse
//! failures drop a single import row, external failures become a message.

use thiserror::Error;

use crate::draft::DraftStatus;
use crate::member::MemberId;

/// Coarse classification used by callers to pick a handling policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Totals don't balance or a required selection is missing. Never retried.
    Validation,
    /// One input row could not be read. The row is dropped from its batch.
    Parse,
    /// OCR / transcription failure or timeout.
    ExternalService,
}

/// Errors returned by the split calculator.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SplitError {
    #[error("Please enter a valid amount (got {0})")]
    NonPositiveTotal(f64),

    #[error("Select at least one member to split with")]
    EmptySelection,

    #[error("Payer {0} is not part of the split")]
    PayerNotSelected(MemberId),

    #[error("Split input given for {0}, who is not part of the split")]
    UnselectedInput(MemberId),

    #[error("Invalid split input for {member}: {value}")]
    InvalidInput { member: MemberId, value: f64 },

    #[error("{member} would owe a negative amount ({owed:.2})")]
    NegativeOwed { member: MemberId, owed: f64 },

    /// Mode-specific totals don't add up; the message is user-facing.
    #[error("{0}")]
    SplitMismatch(&'static str),
}

impl SplitError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }
}

/// Errors returned by draft construction, editing and lifecycle transitions.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DraftError {
    #[error("{0}")]
    Invalid(&'static str),

    #[error("{0} appears more than once in the split")]
    DuplicateParticipant(MemberId),

    #[error("{member} has a negative amount in the split")]
    NegativeAmount { member: MemberId },

    #[error("Draft {id} is {status} and can no longer be edited")]
    NotEditable { id: String, status: DraftStatus },

    #[error("Draft {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: String,
        from: DraftStatus,
        to: DraftStatus,
    },

    #[error(transparent)]
    Split(#[from] SplitError),
}

impl DraftError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }

    /// True for lifecycle violations (as opposed to bad amounts).
    pub fn is_transition(&self) -> bool {
        matches!(self, Self::NotEditable { .. } | Self::InvalidTransition { .. })
    }
}

/// Period keys are `YYYY-MM`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid period key '{0}', expected YYYY-MM")]
pub struct PeriodKeyError(pub String);

/// Failure at the OCR / transcription boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("{service} is not configured.")]
    NotConfigured { service: &'static str },

    #[error("{service} failed: {details}")]
    Failed {
        service: &'static str,
        details: String,
    },

    #[error("{service} timed out. Try again.")]
    TimedOut { service: &'static str },

    #[error("{0}")]
    NothingDetected(&'static str),
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::ExternalService
    }
}
