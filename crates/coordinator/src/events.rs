//! Events recorded while an order is being coordinated.

use common::{ItemId, OrderId, Reservation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::steps::Step;

/// One entry of a coordination trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum CoordinationEvent {
    Started(StartedData),
    StepStarted(StepData),
    StepCompleted(StepCompletedData),
    StepFailed(StepFailedData),
    CompensationStarted(StepData),
    CompensationStepCompleted(StepData),
    /// A slot could not be handed back; the lease sweeper or an operator
    /// has to reclaim it.
    CompensationStepFailed(StepFailedData),
    Completed(CompletedData),
    Failed(FailedData),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartedData {
    pub coordination_id: Uuid,
    pub item_id: ItemId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepData {
    pub step: Step,
}

/// Whatever a completed step handed back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepCompletedData {
    pub step: Step,
    pub reservation: Option<Reservation>,
    pub order_id: Option<OrderId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepFailedData {
    pub step: Step,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedData {
    pub order_id: OrderId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedData {
    pub reason: String,
}

impl CoordinationEvent {
    pub fn started(coordination_id: Uuid, item_id: ItemId) -> Self {
        CoordinationEvent::Started(StartedData {
            coordination_id,
            item_id,
        })
    }

    pub fn step_started(step: Step) -> Self {
        CoordinationEvent::StepStarted(StepData { step })
    }

    pub fn step_completed(
        step: Step,
        reservation: Option<Reservation>,
        order_id: Option<OrderId>,
    ) -> Self {
        CoordinationEvent::StepCompleted(StepCompletedData {
            step,
            reservation,
            order_id,
        })
    }

    pub fn step_failed(step: Step, error: impl Into<String>) -> Self {
        CoordinationEvent::StepFailed(StepFailedData {
            step,
            error: error.into(),
        })
    }

    pub fn compensation_started(from_step: Step) -> Self {
        CoordinationEvent::CompensationStarted(StepData { step: from_step })
    }

    pub fn compensation_step_completed(step: Step) -> Self {
        CoordinationEvent::CompensationStepCompleted(StepData { step })
    }

    pub fn compensation_step_failed(step: Step, error: impl Into<String>) -> Self {
        CoordinationEvent::CompensationStepFailed(StepFailedData {
            step,
            error: error.into(),
        })
    }

    pub fn completed(order_id: OrderId) -> Self {
        CoordinationEvent::Completed(CompletedData { order_id })
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        CoordinationEvent::Failed(FailedData {
            reason: reason.into(),
        })
    }

    /// Returns the event name as a string.
    pub fn event_type(&self) -> &'static str {
        match self {
            CoordinationEvent::Started(_) => "Started",
            CoordinationEvent::StepStarted(_) => "StepStarted",
            CoordinationEvent::StepCompleted(_) => "StepCompleted",
            CoordinationEvent::StepFailed(_) => "StepFailed",
            CoordinationEvent::CompensationStarted(_) => "CompensationStarted",
            CoordinationEvent::CompensationStepCompleted(_) => "CompensationStepCompleted",
            CoordinationEvent::CompensationStepFailed(_) => "CompensationStepFailed",
            CoordinationEvent::Completed(_) => "Completed",
            CoordinationEvent::Failed(_) => "Failed",
        }
    }
}
