//! Order coordinator: reserve both resources, then book them.

use std::future::Future;
use std::time::Instant;

use common::{ItemId, OrderId, Reservation, SlotId};
use uuid::Uuid;

use crate::coordination::Coordination;
use crate::error::{CoordinatorError, Result};
use crate::events::CoordinationEvent;
use crate::services::{DeliveryService, StoreService};
use crate::steps::Step;

/// A placed order.
#[derive(Debug, Clone)]
pub struct OrderConfirmation {
    pub coordination_id: Uuid,
    pub order_id: OrderId,
    pub item_slot: SlotId,
    pub agent_slot: SlotId,
    pub coordination: Coordination,
}

/// Values a step leaves behind in the trail.
trait StepOutput {
    fn reservation(&self) -> Option<Reservation> {
        None
    }

    fn order_id(&self) -> Option<OrderId> {
        None
    }
}

impl StepOutput for () {}

impl StepOutput for Reservation {
    fn reservation(&self) -> Option<Reservation> {
        Some(*self)
    }
}

impl StepOutput for OrderId {
    fn order_id(&self) -> Option<OrderId> {
        Some(self.clone())
    }
}

struct Booked {
    order_id: OrderId,
    item: Reservation,
    agent: Reservation,
}

struct Aborted {
    step: Step,
    error: CoordinatorError,
}

/// Places orders by chaining the store and delivery services.
///
/// Holds no state between requests; every call to
/// [`create_order`](Self::create_order) builds its own [`Coordination`].
pub struct OrderCoordinator<S, D>
where
    S: StoreService,
    D: DeliveryService,
{
    store: S,
    delivery: D,
}

impl<S, D> OrderCoordinator<S, D>
where
    S: StoreService,
    D: DeliveryService,
{
    pub fn new(store: S, delivery: D) -> Self {
        Self { store, delivery }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn delivery(&self) -> &D {
        &self.delivery
    }

    /// Places an order for one unit of `item_id` with one delivery agent.
    ///
    /// Steps run strictly in order and the first failure aborts. Slots that
    /// were reserved but not booked are released before the error is
    /// returned as [`CoordinatorError::StepFailed`].
    #[tracing::instrument(skip(self))]
    pub async fn create_order(&self, item_id: ItemId) -> Result<OrderConfirmation> {
        let started = Instant::now();
        let coordination_id = Uuid::new_v4();

        let mut trail = Coordination::default();
        trail.apply(CoordinationEvent::started(coordination_id, item_id));

        let outcome = self.run_steps(&mut trail, item_id).await;
        let elapsed = started.elapsed().as_secs_f64();
        metrics::histogram!("order_coordination_duration_seconds").record(elapsed);

        match outcome {
            Ok(booked) => {
                trail.apply(CoordinationEvent::completed(booked.order_id.clone()));
                metrics::counter!("orders_created_total").increment(1);
                tracing::info!(
                    %coordination_id,
                    order_id = %booked.order_id,
                    item_slot = %booked.item,
                    agent_slot = %booked.agent,
                    elapsed,
                    "order created"
                );
                Ok(OrderConfirmation {
                    coordination_id,
                    order_id: booked.order_id,
                    item_slot: booked.item.slot_id,
                    agent_slot: booked.agent.slot_id,
                    coordination: trail,
                })
            }
            Err(Aborted { step, error }) => {
                self.compensate(&mut trail, item_id, step).await;
                metrics::counter!("orders_failed_total", "step" => step.as_str()).increment(1);
                tracing::warn!(%coordination_id, %step, error = %error, "order aborted");
                Err(CoordinatorError::StepFailed {
                    step,
                    source: Box::new(error),
                    trail: Box::new(trail),
                })
            }
        }
    }

    async fn run_steps(
        &self,
        trail: &mut Coordination,
        item_id: ItemId,
    ) -> std::result::Result<Booked, Aborted> {
        self.step(trail, Step::CheckAvailability, self.check_availability(item_id))
            .await?;
        let item = self
            .step(trail, Step::ReserveItem, self.store.reserve_item(item_id))
            .await?;
        let agent = self
            .step(trail, Step::ReserveAgent, self.delivery.reserve_agent())
            .await?;
        let order_id = self
            .step(trail, Step::MintOrderId, mint_order_id())
            .await?;
        self.step(
            trail,
            Step::BookItem,
            self.store.book_item(item_id, item, &order_id),
        )
        .await?;
        self.step(
            trail,
            Step::BookAgent,
            self.delivery.book_agent(agent, &order_id),
        )
        .await?;

        Ok(Booked {
            order_id,
            item,
            agent,
        })
    }

    /// Runs one step and records its outcome in the trail.
    async fn step<T, F>(
        &self,
        trail: &mut Coordination,
        step: Step,
        action: F,
    ) -> std::result::Result<T, Aborted>
    where
        T: StepOutput,
        F: Future<Output = Result<T>>,
    {
        tracing::debug!(%step, "order step started");
        trail.apply(CoordinationEvent::step_started(step));

        match action.await {
            Ok(output) => {
                trail.apply(CoordinationEvent::step_completed(
                    step,
                    output.reservation(),
                    output.order_id(),
                ));
                Ok(output)
            }
            Err(error) => {
                trail.apply(CoordinationEvent::step_failed(step, error.to_string()));
                Err(Aborted { step, error })
            }
        }
    }

    /// Advisory pre-check. Stock may still run out before the reserve.
    async fn check_availability(&self, item_id: ItemId) -> Result<()> {
        match self.store.check_item(item_id).await? {
            None => Err(CoordinatorError::ItemNotFound(item_id)),
            Some(item) if item.free_slots <= 0 => Err(CoordinatorError::NoStock(item_id)),
            Some(_) => Ok(()),
        }
    }

    /// Hands back every slot reserved but not booked, newest first.
    ///
    /// Release failures are recorded and logged but do not stop the chain;
    /// the lease sweeper reclaims whatever is left behind.
    #[tracing::instrument(skip(self, trail))]
    async fn compensate(&self, trail: &mut Coordination, item_id: ItemId, failed_step: Step) {
        trail.apply(CoordinationEvent::compensation_started(failed_step));

        for (step, reservation) in trail.pending_releases() {
            let released = match step {
                Step::ReserveAgent => self.delivery.release_agent(reservation).await,
                Step::ReserveItem => self.store.release_item(item_id, reservation).await,
                _ => continue,
            };
            match released {
                Ok(()) => {
                    tracing::debug!(%step, %reservation, "reservation released");
                    trail.apply(CoordinationEvent::compensation_step_completed(step));
                }
                Err(e) => {
                    tracing::warn!(
                        %step,
                        %reservation,
                        error = %e,
                        "failed to release reservation"
                    );
                    trail.apply(CoordinationEvent::compensation_step_failed(
                        step,
                        e.to_string(),
                    ));
                }
            }
        }

        // Booked slots are terminal
        for (step, slot_id) in trail.committed_bookings() {
            tracing::error!(
                %step,
                %slot_id,
                %failed_step,
                "booked slot left behind by aborted order"
            );
            trail.apply(CoordinationEvent::compensation_step_failed(
                step,
                format!("slot {slot_id} is booked and cannot be released"),
            ));
        }

        trail.apply(CoordinationEvent::failed(format!(
            "step {failed_step} failed"
        )));
    }
}

async fn mint_order_id() -> Result<OrderId> {
    Ok(OrderId::generate())
}
