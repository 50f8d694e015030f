//! Order placement across real store and delivery services over HTTP.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use coordinator::{HttpDeliveryService, HttpStoreService, OrderCoordinator, Step};
use futures_util::future::join_all;
use ledger::{InMemoryLedger, ItemId, Ledger};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            metrics_exporter_prometheus::PrometheusBuilder::new()
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

async fn spawn_app(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

struct Deployment {
    store: InMemoryLedger,
    delivery: InMemoryLedger,
    item_id: ItemId,
    coordinator: Arc<OrderCoordinator<HttpStoreService, HttpDeliveryService>>,
}

impl Deployment {
    async fn start(items: usize, agents: usize) -> Self {
        let (store, item_id) = InMemoryLedger::with_item("iPhone 12", items).await.unwrap();
        let delivery = InMemoryLedger::with_agents(agents).await.unwrap();

        let store_addr = spawn_app(api::store_app(store.clone(), get_metrics_handle())).await;
        let delivery_addr =
            spawn_app(api::delivery_app(delivery.clone(), get_metrics_handle())).await;

        let timeout = Duration::from_secs(5);
        let coordinator = Arc::new(OrderCoordinator::new(
            HttpStoreService::new(format!("http://{store_addr}"), timeout),
            HttpDeliveryService::new(format!("http://{delivery_addr}/"), timeout),
        ));

        Self {
            store,
            delivery,
            item_id,
            coordinator,
        }
    }
}

/// An address nothing is listening on.
async fn closed_addr() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

async fn post_order(app: Router, body: Value) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/order")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_order_over_http() {
    let deployment = Deployment::start(2, 2).await;
    let app = api::order_app(deployment.coordinator.clone(), get_metrics_handle());

    let (status, json) = post_order(app, json!({ "item_id": deployment.item_id })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "Order created");

    let store = deployment.store.counts().await.unwrap();
    let delivery = deployment.delivery.counts().await.unwrap();
    assert_eq!((store.booked, store.free), (1, 1));
    assert_eq!((delivery.booked, delivery.free), (1, 1));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_orders_over_http() {
    const ORDERS: usize = 10;
    let deployment = Deployment::start(ORDERS, ORDERS).await;

    let results = join_all((0..ORDERS).map(|_| {
        let coordinator = deployment.coordinator.clone();
        let item_id = deployment.item_id;
        async move { coordinator.create_order(item_id).await }
    }))
    .await;

    let mut order_ids = HashSet::new();
    let mut item_slots = HashSet::new();
    let mut agent_slots = HashSet::new();
    for result in results {
        let confirmation = result.unwrap();
        assert!(order_ids.insert(confirmation.order_id));
        assert!(item_slots.insert(confirmation.item_slot));
        assert!(agent_slots.insert(confirmation.agent_slot));
    }
    assert_eq!(order_ids.len(), ORDERS);

    let store = deployment.store.counts().await.unwrap();
    let delivery = deployment.delivery.counts().await.unwrap();
    assert_eq!(store.booked, ORDERS as u64);
    assert_eq!(delivery.booked, ORDERS as u64);
}

#[tokio::test]
async fn test_sold_out_over_http() {
    let deployment = Deployment::start(0, 3).await;

    let err = deployment
        .coordinator
        .create_order(deployment.item_id)
        .await
        .unwrap_err();
    assert_eq!(err.failed_step(), Some(Step::CheckAvailability));
    assert!(err.is_unavailability());
    assert_eq!(deployment.delivery.counts().await.unwrap().free, 3);
}

#[tokio::test]
async fn test_unknown_item_over_http() {
    let deployment = Deployment::start(1, 1).await;

    let err = deployment
        .coordinator
        .create_order(ItemId::new(999))
        .await
        .unwrap_err();
    assert_eq!(err.failed_step(), Some(Step::CheckAvailability));
    assert!(err.is_unavailability());
}

#[tokio::test]
async fn test_unreachable_store_is_bad_gateway() {
    let store_addr = closed_addr().await;
    let delivery_addr = closed_addr().await;
    let coordinator = Arc::new(OrderCoordinator::new(
        HttpStoreService::new(format!("http://{store_addr}"), Duration::from_millis(500)),
        HttpDeliveryService::new(format!("http://{delivery_addr}"), Duration::from_millis(500)),
    ));
    let app = api::order_app(coordinator, get_metrics_handle());

    let (status, json) = post_order(app, json!({ "item_id": 1 })).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(json["failed_step"], "check_availability");
}

#[tokio::test]
async fn test_unreachable_delivery_releases_item() {
    let (store, item_id) = InMemoryLedger::with_item("iPhone 12", 1).await.unwrap();
    let store_addr = spawn_app(api::store_app(store.clone(), get_metrics_handle())).await;
    let delivery_addr = closed_addr().await;

    let coordinator = OrderCoordinator::new(
        HttpStoreService::new(format!("http://{store_addr}"), Duration::from_secs(5)),
        HttpDeliveryService::new(format!("http://{delivery_addr}"), Duration::from_millis(500)),
    );

    let err = coordinator.create_order(item_id).await.unwrap_err();
    assert_eq!(err.failed_step(), Some(Step::ReserveAgent));
    assert!(!err.is_unavailability());
    assert_eq!(store.counts().await.unwrap().free, 1);
}
