//! The in-memory trail of one order coordination.

use common::{ItemId, OrderId, Reservation, SlotId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::events::CoordinationEvent;
use crate::state::CoordinationState;
use crate::steps::Step;

/// Everything that happened while placing one order.
///
/// Built by applying [`CoordinationEvent`]s in order. Events that the current
/// [`CoordinationState`] does not admit are dropped. The trail lives only as
/// long as the request that produced it and is handed back to the caller on
/// success and failure alike.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Coordination {
    id: Option<Uuid>,
    item_id: Option<ItemId>,
    state: CoordinationState,
    completed_steps: Vec<Step>,
    item_reservation: Option<Reservation>,
    agent_reservation: Option<Reservation>,
    order_id: Option<OrderId>,
    failed_step: Option<Step>,
    failure_reason: Option<String>,
    released: Vec<Step>,
    unreleased: Vec<Step>,
    history: Vec<CoordinationEvent>,
}

impl Coordination {
    /// Applies an event to the trail.
    ///
    /// Returns false, leaving the trail untouched, when the event is not a
    /// legal transition from the current state.
    pub fn apply(&mut self, event: CoordinationEvent) -> bool {
        if !self.admits(&event) {
            tracing::warn!(
                state = %self.state,
                event = event.event_type(),
                "ignoring out-of-order coordination event"
            );
            return false;
        }

        match &event {
            CoordinationEvent::Started(data) => {
                self.id = Some(data.coordination_id);
                self.item_id = Some(data.item_id);
                self.state = CoordinationState::Running;
            }
            CoordinationEvent::StepStarted(_) => {}
            CoordinationEvent::StepCompleted(data) => {
                self.completed_steps.push(data.step);
                match data.step {
                    Step::ReserveItem => self.item_reservation = data.reservation,
                    Step::ReserveAgent => self.agent_reservation = data.reservation,
                    Step::MintOrderId => self.order_id = data.order_id.clone(),
                    _ => {}
                }
            }
            CoordinationEvent::StepFailed(data) => {
                self.failed_step = Some(data.step);
                self.failure_reason = Some(data.error.clone());
            }
            CoordinationEvent::CompensationStarted(_) => {
                self.state = CoordinationState::Compensating;
            }
            CoordinationEvent::CompensationStepCompleted(data) => {
                self.released.push(data.step);
            }
            CoordinationEvent::CompensationStepFailed(data) => {
                self.unreleased.push(data.step);
            }
            CoordinationEvent::Completed(data) => {
                self.order_id = Some(data.order_id.clone());
                self.state = CoordinationState::Completed;
            }
            CoordinationEvent::Failed(_) => {
                self.state = CoordinationState::Failed;
            }
        }
        self.history.push(event);
        true
    }

    fn admits(&self, event: &CoordinationEvent) -> bool {
        match event {
            CoordinationEvent::Started(_) => self.state.can_run(),
            CoordinationEvent::StepStarted(_)
            | CoordinationEvent::StepCompleted(_)
            | CoordinationEvent::StepFailed(_)
            | CoordinationEvent::Completed(_) => self.state == CoordinationState::Running,
            CoordinationEvent::CompensationStarted(_) => self.state.can_compensate(),
            CoordinationEvent::CompensationStepCompleted(_)
            | CoordinationEvent::CompensationStepFailed(_) => {
                self.state == CoordinationState::Compensating
            }
            CoordinationEvent::Failed(_) => !self.state.is_terminal(),
        }
    }

    /// Reservations taken but not consumed by a booking, newest first.
    ///
    /// These are the slots a failed coordination has to hand back.
    pub fn pending_releases(&self) -> Vec<(Step, Reservation)> {
        [
            (Step::ReserveAgent, self.agent_reservation),
            (Step::ReserveItem, self.item_reservation),
        ]
        .into_iter()
        .filter_map(|(step, reservation)| Some((step, reservation?)))
        .filter(|(step, _)| {
            step.booked_by()
                .is_some_and(|booking| !self.has_completed(booking))
        })
        .collect()
    }

    /// Bookings that already committed and cannot be taken back.
    pub fn committed_bookings(&self) -> Vec<(Step, SlotId)> {
        [
            (Step::BookItem, self.item_slot()),
            (Step::BookAgent, self.agent_slot()),
        ]
        .into_iter()
        .filter(|(step, _)| self.has_completed(*step))
        .filter_map(|(step, slot)| Some((step, slot?)))
        .collect()
    }

    /// Returns true if `step` completed.
    pub fn has_completed(&self, step: Step) -> bool {
        self.completed_steps.contains(&step)
    }

    pub fn id(&self) -> Option<Uuid> {
        self.id
    }

    pub fn item_id(&self) -> Option<ItemId> {
        self.item_id
    }

    pub fn state(&self) -> CoordinationState {
        self.state
    }

    pub fn completed_steps(&self) -> &[Step] {
        &self.completed_steps
    }

    pub fn item_slot(&self) -> Option<SlotId> {
        self.item_reservation.map(|r| r.slot_id)
    }

    pub fn agent_slot(&self) -> Option<SlotId> {
        self.agent_reservation.map(|r| r.slot_id)
    }

    pub fn order_id(&self) -> Option<&OrderId> {
        self.order_id.as_ref()
    }

    /// The step that aborted the coordination, if any.
    pub fn failed_step(&self) -> Option<Step> {
        self.failed_step
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    /// Steps whose effects were undone during compensation.
    pub fn released(&self) -> &[Step] {
        &self.released
    }

    /// Steps whose effects are still in place after compensation.
    pub fn unreleased(&self) -> &[Step] {
        &self.unreleased
    }

    pub fn history(&self) -> &[CoordinationEvent] {
        &self.history
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running() -> Coordination {
        let mut trail = Coordination::default();
        trail.apply(CoordinationEvent::started(Uuid::new_v4(), ItemId::new(1)));
        trail
    }

    fn complete(trail: &mut Coordination, step: Step, slot: Option<i64>) {
        trail.apply(CoordinationEvent::step_started(step));
        trail.apply(CoordinationEvent::step_completed(
            step,
            slot.map(|id| Reservation::new(SlotId::new(id), 1)),
            None,
        ));
    }

    #[test]
    fn test_started_trail_is_running() {
        let trail = running();
        assert_eq!(trail.state(), CoordinationState::Running);
        assert_eq!(trail.item_id(), Some(ItemId::new(1)));
        assert!(trail.id().is_some());
    }

    #[test]
    fn test_pending_releases_newest_first() {
        let mut trail = running();
        complete(&mut trail, Step::CheckAvailability, None);
        complete(&mut trail, Step::ReserveItem, Some(4));
        complete(&mut trail, Step::ReserveAgent, Some(9));

        assert_eq!(
            trail.pending_releases(),
            vec![
                (Step::ReserveAgent, Reservation::new(SlotId::new(9), 1)),
                (Step::ReserveItem, Reservation::new(SlotId::new(4), 1)),
            ]
        );
    }

    #[test]
    fn test_booked_slots_are_not_pending() {
        let mut trail = running();
        complete(&mut trail, Step::ReserveItem, Some(4));
        complete(&mut trail, Step::ReserveAgent, Some(9));
        complete(&mut trail, Step::BookItem, None);
        trail.apply(CoordinationEvent::step_failed(Step::BookAgent, "timeout"));

        assert_eq!(
            trail.pending_releases(),
            vec![(Step::ReserveAgent, Reservation::new(SlotId::new(9), 1))]
        );
        assert_eq!(
            trail.committed_bookings(),
            vec![(Step::BookItem, SlotId::new(4))]
        );
        assert_eq!(trail.failed_step(), Some(Step::BookAgent));
        assert_eq!(trail.failure_reason(), Some("timeout"));
    }

    #[test]
    fn test_failure_before_any_reservation() {
        let mut trail = running();
        trail.apply(CoordinationEvent::step_failed(
            Step::CheckAvailability,
            "no stock",
        ));
        assert!(trail.pending_releases().is_empty());
        assert!(trail.committed_bookings().is_empty());
    }

    #[test]
    fn test_compensation_lifecycle() {
        let mut trail = running();
        complete(&mut trail, Step::ReserveItem, Some(2));
        trail.apply(CoordinationEvent::step_failed(Step::ReserveAgent, "none"));
        trail.apply(CoordinationEvent::compensation_started(Step::ReserveAgent));
        assert_eq!(trail.state(), CoordinationState::Compensating);

        trail.apply(CoordinationEvent::compensation_step_completed(
            Step::ReserveItem,
        ));
        trail.apply(CoordinationEvent::failed("reserve_agent failed"));

        assert_eq!(trail.state(), CoordinationState::Failed);
        assert_eq!(trail.released(), &[Step::ReserveItem]);
        assert!(trail.unreleased().is_empty());
        assert_eq!(trail.history().len(), 7);
    }

    #[test]
    fn test_completed_records_order() {
        let mut trail = running();
        trail.apply(CoordinationEvent::step_completed(
            Step::MintOrderId,
            None,
            Some(OrderId::from("order-1")),
        ));
        assert_eq!(trail.order_id(), Some(&OrderId::from("order-1")));

        trail.apply(CoordinationEvent::completed(OrderId::from("order-1")));
        assert_eq!(trail.state(), CoordinationState::Completed);
        assert!(trail.state().is_terminal());
    }

    #[test]
    fn test_out_of_order_events_are_dropped() {
        let mut trail = Coordination::default();
        assert!(!trail.apply(CoordinationEvent::step_started(Step::ReserveItem)));
        assert!(!trail.apply(CoordinationEvent::compensation_started(Step::ReserveItem)));
        assert!(trail.history().is_empty());

        trail.apply(CoordinationEvent::started(Uuid::new_v4(), ItemId::new(1)));
        let id = trail.id();
        complete(&mut trail, Step::ReserveItem, Some(3));

        // A second start does not reset a running trail
        assert!(!trail.apply(CoordinationEvent::started(Uuid::new_v4(), ItemId::new(2))));
        assert_eq!(trail.id(), id);
        assert_eq!(trail.item_id(), Some(ItemId::new(1)));
        assert_eq!(trail.item_slot(), Some(SlotId::new(3)));

        // Compensation steps need a compensating trail
        assert!(!trail.apply(CoordinationEvent::compensation_step_completed(
            Step::ReserveItem
        )));
        assert!(trail.released().is_empty());

        assert!(trail.apply(CoordinationEvent::completed(OrderId::from("order-1"))));
        let recorded = trail.history().len();

        // Terminal trails accept nothing
        assert!(!trail.apply(CoordinationEvent::failed("late")));
        assert!(!trail.apply(CoordinationEvent::compensation_started(Step::BookAgent)));
        assert!(!trail.apply(CoordinationEvent::step_failed(Step::BookAgent, "late")));
        assert_eq!(trail.state(), CoordinationState::Completed);
        assert_eq!(trail.failed_step(), None);
        assert_eq!(trail.history().len(), recorded);
    }

    #[test]
    fn test_compensating_trail_cannot_complete() {
        let mut trail = running();
        trail.apply(CoordinationEvent::step_failed(Step::ReserveAgent, "none"));
        trail.apply(CoordinationEvent::compensation_started(Step::ReserveAgent));

        assert!(!trail.apply(CoordinationEvent::completed(OrderId::from("order-1"))));
        assert!(!trail.apply(CoordinationEvent::step_started(Step::MintOrderId)));
        assert_eq!(trail.state(), CoordinationState::Compensating);
        assert!(trail.order_id().is_none());

        assert!(trail.apply(CoordinationEvent::failed("reserve_agent failed")));
        assert_eq!(trail.state(), CoordinationState::Failed);
    }
}
