//! Integration tests for order coordination over in-process ledgers.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use coordinator::{
    CoordinationState, CoordinatorError, DeliveryService, LedgerDeliveryService,
    LedgerStoreService, OrderCoordinator, Step, StoreService,
};
use futures_util::future::join_all;
use ledger::{
    InMemoryLedger, ItemAvailability, ItemId, Ledger, LedgerError, OrderId, Reservation,
    SlotCounts, SlotStatus,
};

/// Delivery service whose calls can be made to fail like an unreachable peer.
#[derive(Clone)]
struct FlakyDelivery {
    inner: LedgerDeliveryService<InMemoryLedger>,
    fail_book: Arc<AtomicBool>,
    fail_release: Arc<AtomicBool>,
    expire_before_book: Arc<AtomicBool>,
}

impl FlakyDelivery {
    fn new(ledger: InMemoryLedger) -> Self {
        Self {
            inner: LedgerDeliveryService::new(ledger),
            fail_book: Arc::new(AtomicBool::new(false)),
            fail_release: Arc::new(AtomicBool::new(false)),
            expire_before_book: Arc::new(AtomicBool::new(false)),
        }
    }

    fn timeout() -> CoordinatorError {
        CoordinatorError::RemoteUnavailable {
            service: "delivery",
            reason: "request timed out after 5000 ms".to_string(),
        }
    }
}

#[async_trait]
impl DeliveryService for FlakyDelivery {
    async fn reserve_agent(&self) -> coordinator::Result<Reservation> {
        self.inner.reserve_agent().await
    }

    async fn book_agent(
        &self,
        reservation: Reservation,
        order_id: &OrderId,
    ) -> coordinator::Result<()> {
        if self.fail_book.load(Ordering::SeqCst) {
            return Err(Self::timeout());
        }
        if self.expire_before_book.load(Ordering::SeqCst) {
            // The lease runs out and another order picks the agent up
            let ledger = self.inner.ledger();
            ledger.sweep_expired(sweep_cutoff()).await?;
            ledger.reserve(None).await?;
        }
        self.inner.book_agent(reservation, order_id).await
    }

    async fn release_agent(&self, reservation: Reservation) -> coordinator::Result<()> {
        if self.fail_release.load(Ordering::SeqCst) {
            return Err(Self::timeout());
        }
        self.inner.release_agent(reservation).await
    }
}

/// Store service that rejects bookings the way a store answering 400 would.
#[derive(Clone)]
struct RejectingStore {
    inner: LedgerStoreService<InMemoryLedger>,
    reject_book: Arc<AtomicBool>,
}

#[async_trait]
impl StoreService for RejectingStore {
    async fn check_item(&self, item_id: ItemId) -> coordinator::Result<Option<ItemAvailability>> {
        self.inner.check_item(item_id).await
    }

    async fn reserve_item(&self, item_id: ItemId) -> coordinator::Result<Reservation> {
        self.inner.reserve_item(item_id).await
    }

    async fn book_item(
        &self,
        item_id: ItemId,
        reservation: Reservation,
        order_id: &OrderId,
    ) -> coordinator::Result<()> {
        if self.reject_book.load(Ordering::SeqCst) {
            return Err(CoordinatorError::RemoteRejected {
                service: "store",
                status: 400,
                message: format!("invalid reservation: slot {}", reservation.slot_id),
            });
        }
        self.inner.book_item(item_id, reservation, order_id).await
    }

    async fn release_item(
        &self,
        item_id: ItemId,
        reservation: Reservation,
    ) -> coordinator::Result<()> {
        self.inner.release_item(item_id, reservation).await
    }
}

struct TestHarness {
    store: InMemoryLedger,
    delivery: InMemoryLedger,
    item_id: ItemId,
}

impl TestHarness {
    async fn new(item_slots: usize, agents: usize) -> Self {
        let (store, item_id) = InMemoryLedger::with_item("iPhone 12", item_slots)
            .await
            .unwrap();
        let delivery = InMemoryLedger::with_agents(agents).await.unwrap();
        Self {
            store,
            delivery,
            item_id,
        }
    }

    fn coordinator(
        &self,
    ) -> OrderCoordinator<LedgerStoreService<InMemoryLedger>, LedgerDeliveryService<InMemoryLedger>>
    {
        OrderCoordinator::new(
            LedgerStoreService::new(self.store.clone()),
            LedgerDeliveryService::new(self.delivery.clone()),
        )
    }

    async fn counts(&self) -> (SlotCounts, SlotCounts) {
        (
            self.store.counts().await.unwrap(),
            self.delivery.counts().await.unwrap(),
        )
    }
}

#[tokio::test]
async fn sold_out_item_never_consumes_an_agent() {
    let harness = TestHarness::new(10, 10).await;

    // An item whose only slot is already booked
    let sold_out = harness.store.add_item("Sold out").await.unwrap();
    harness.store.provision(Some(sold_out), 1).await.unwrap();
    let reservation = harness.store.reserve(Some(sold_out)).await.unwrap();
    harness
        .store
        .book(reservation, &OrderId::from("earlier"))
        .await
        .unwrap();

    let coordinator = harness.coordinator();
    let err = coordinator.create_order(sold_out).await.unwrap_err();
    assert_eq!(err.failed_step(), Some(Step::CheckAvailability));
    assert!(err.is_unavailability());

    let (_, delivery) = harness.counts().await;
    assert_eq!(
        delivery,
        SlotCounts {
            free: 10,
            reserved: 0,
            booked: 0
        }
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_orders_get_distinct_slots() {
    const ORDERS: usize = 10;
    let harness = TestHarness::new(ORDERS, ORDERS).await;
    let coordinator = Arc::new(harness.coordinator());

    let handles: Vec<_> = (0..ORDERS)
        .map(|_| {
            let coordinator = coordinator.clone();
            let item_id = harness.item_id;
            tokio::spawn(async move { coordinator.create_order(item_id).await })
        })
        .collect();

    let mut order_ids = HashSet::new();
    let mut item_slots = HashSet::new();
    let mut agent_slots = HashSet::new();
    for handle in handles {
        let confirmation = handle.await.unwrap().unwrap();
        assert_eq!(
            confirmation.coordination.state(),
            CoordinationState::Completed
        );
        assert!(order_ids.insert(confirmation.order_id));
        assert!(item_slots.insert(confirmation.item_slot));
        assert!(agent_slots.insert(confirmation.agent_slot));
    }
    assert_eq!(order_ids.len(), ORDERS);

    let (store, delivery) = harness.counts().await;
    assert_eq!(store.booked, ORDERS as u64);
    assert_eq!(delivery.booked, ORDERS as u64);
    assert_eq!(store.reserved + delivery.reserved, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn oversubscribed_orders_leave_no_reservations() {
    let harness = TestHarness::new(5, 3).await;
    let coordinator = Arc::new(harness.coordinator());

    let results = join_all((0..8).map(|_| {
        let coordinator = coordinator.clone();
        let item_id = harness.item_id;
        async move { coordinator.create_order(item_id).await }
    }))
    .await;

    let placed = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(placed, 3);
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        assert!(err.is_unavailability(), "unexpected failure: {err}");
    }

    let (store, delivery) = harness.counts().await;
    assert_eq!((store.booked, store.reserved, store.free), (3, 0, 2));
    assert_eq!((delivery.booked, delivery.reserved), (3, 0));
}

#[tokio::test]
async fn agent_booking_timeout_releases_agent() {
    let harness = TestHarness::new(2, 2).await;
    let delivery = FlakyDelivery::new(harness.delivery.clone());
    delivery.fail_book.store(true, Ordering::SeqCst);
    let coordinator =
        OrderCoordinator::new(LedgerStoreService::new(harness.store.clone()), delivery);

    let err = coordinator.create_order(harness.item_id).await.unwrap_err();
    assert_eq!(err.failed_step(), Some(Step::BookAgent));
    assert!(!err.is_unavailability());

    let trail = err.trail().unwrap();
    assert_eq!(trail.state(), CoordinationState::Failed);
    assert_eq!(trail.released(), &[Step::ReserveAgent]);
    // The item was already booked and stays that way
    assert_eq!(trail.unreleased(), &[Step::BookItem]);

    let item_slot = trail.item_slot().unwrap();
    let slot = harness.store.get_slot(item_slot).await.unwrap().unwrap();
    assert_eq!(slot.status, SlotStatus::Booked);

    let (_, delivery) = harness.counts().await;
    assert_eq!(delivery.free, 2);
}

#[tokio::test]
async fn rejected_item_booking_releases_both_reservations() {
    let harness = TestHarness::new(1, 1).await;
    let store = RejectingStore {
        inner: LedgerStoreService::new(harness.store.clone()),
        reject_book: Arc::new(AtomicBool::new(true)),
    };
    let coordinator =
        OrderCoordinator::new(store.clone(), LedgerDeliveryService::new(harness.delivery.clone()));

    let err = coordinator.create_order(harness.item_id).await.unwrap_err();
    assert_eq!(err.failed_step(), Some(Step::BookItem));

    let trail = err.trail().unwrap();
    assert_eq!(trail.released(), &[Step::ReserveAgent, Step::ReserveItem]);
    assert!(trail.unreleased().is_empty());

    let (store_counts, delivery_counts) = harness.counts().await;
    assert_eq!(store_counts.free, 1);
    assert_eq!(delivery_counts.free, 1);

    // Pool is intact, so the next order goes through
    store.reject_book.store(false, Ordering::SeqCst);
    assert!(coordinator.create_order(harness.item_id).await.is_ok());
}

#[tokio::test]
async fn failed_release_is_left_for_the_sweeper() {
    let harness = TestHarness::new(1, 1).await;
    let delivery = FlakyDelivery::new(harness.delivery.clone());
    delivery.fail_release.store(true, Ordering::SeqCst);
    let store = RejectingStore {
        inner: LedgerStoreService::new(harness.store.clone()),
        reject_book: Arc::new(AtomicBool::new(true)),
    };
    let coordinator = OrderCoordinator::new(store, delivery);

    let err = coordinator.create_order(harness.item_id).await.unwrap_err();
    let trail = err.trail().unwrap();
    assert_eq!(trail.released(), &[Step::ReserveItem]);
    assert_eq!(trail.unreleased(), &[Step::ReserveAgent]);

    let (_, delivery) = harness.counts().await;
    assert_eq!(delivery.reserved, 1);

    let reclaimed = harness
        .delivery
        .sweep_expired(sweep_cutoff())
        .await
        .unwrap();
    assert_eq!(reclaimed.len(), 1);
    assert_eq!(harness.delivery.counts().await.unwrap().free, 1);
}

#[tokio::test]
async fn expired_agent_lease_does_not_book_over_new_holder() {
    let harness = TestHarness::new(1, 1).await;
    let delivery = FlakyDelivery::new(harness.delivery.clone());
    delivery.expire_before_book.store(true, Ordering::SeqCst);
    let coordinator =
        OrderCoordinator::new(LedgerStoreService::new(harness.store.clone()), delivery);

    let err = coordinator.create_order(harness.item_id).await.unwrap_err();
    assert_eq!(err.failed_step(), Some(Step::BookAgent));
    assert!(matches!(
        &err,
        CoordinatorError::StepFailed { source, .. }
            if matches!(**source, CoordinatorError::Ledger(LedgerError::InvalidReservation(_)))
    ));

    // The stale release is fenced off too, so the new holder keeps the agent
    let trail = err.trail().unwrap();
    assert_eq!(trail.unreleased(), &[Step::ReserveAgent, Step::BookItem]);

    let agent = harness
        .delivery
        .get_slot(trail.agent_slot().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(agent.status, SlotStatus::Reserved);
    assert!(agent.current_order_id.is_none());
}

/// A cutoff later than any reservation taken so far.
fn sweep_cutoff() -> chrono::DateTime<chrono::Utc> {
    chrono::Utc::now() + chrono::Duration::seconds(1)
}
