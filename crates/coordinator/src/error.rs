//! Coordinator error types.

use common::ItemId;
use ledger::LedgerError;
use thiserror::Error;

use crate::coordination::Coordination;
use crate::steps::Step;

/// Errors that can occur while placing an order.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// A peer service could not be reached or did not answer in time.
    #[error("{service} service unavailable: {reason}")]
    RemoteUnavailable {
        service: &'static str,
        reason: String,
    },

    /// A peer service answered with a non-OK status.
    #[error("{service} service rejected the request ({status}): {message}")]
    RemoteRejected {
        service: &'static str,
        status: u16,
        message: String,
    },

    /// An in-process ledger failed.
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// The store does not know the item.
    #[error("Item not found: {0}")]
    ItemNotFound(ItemId),

    /// The store reports no free slots for the item.
    #[error("No stock left for item {0}")]
    NoStock(ItemId),

    /// A step aborted the order. Carries the trail up to the abort.
    #[error("Order step '{step}' failed: {source}")]
    StepFailed {
        step: Step,
        #[source]
        source: Box<CoordinatorError>,
        trail: Box<Coordination>,
    },
}

impl CoordinatorError {
    /// Returns true if the order could not be placed because a resource ran
    /// out, as opposed to a peer misbehaving.
    pub fn is_unavailability(&self) -> bool {
        match self {
            CoordinatorError::ItemNotFound(_) | CoordinatorError::NoStock(_) => true,
            CoordinatorError::Ledger(e) => matches!(
                e,
                LedgerError::NoAvailability { .. } | LedgerError::ItemNotFound(_)
            ),
            // Resource services answer 404 when nothing can be reserved
            CoordinatorError::RemoteRejected { status, .. } => *status == 404,
            CoordinatorError::RemoteUnavailable { .. } => false,
            CoordinatorError::StepFailed { source, .. } => source.is_unavailability(),
        }
    }

    /// The step that aborted the order, if this is a step failure.
    pub fn failed_step(&self) -> Option<Step> {
        match self {
            CoordinatorError::StepFailed { step, .. } => Some(*step),
            _ => None,
        }
    }

    /// The coordination trail, if this is a step failure.
    pub fn trail(&self) -> Option<&Coordination> {
        match self {
            CoordinatorError::StepFailed { trail, .. } => Some(trail),
            _ => None,
        }
    }
}

/// Convenience type alias for coordinator results.
pub type Result<T> = std::result::Result<T, CoordinatorError>;
