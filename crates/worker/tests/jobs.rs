//! End-to-end tests for the background jobs against the in-memory store.

use chrono::{Duration, Utc};
use common::{
    FulfillmentMethod, Money, OrderStatus, PaymentMethod, ProductId, ShopId, UserId,
};
use domain::{CheckoutRequest, CheckoutService, OrderService, TransitionRequest};
use payment::{InMemoryGateway, PaymentService};
use storage::{MarketStore, MemoryStore, OutboxStatus, ProductRecord};
use worker::{AutoCancel, Dispatcher, MAX_ATTEMPTS, RestockOutcome, restock};

struct Harness {
    store: MemoryStore,
    checkout: CheckoutService<MemoryStore>,
    orders: OrderService<MemoryStore>,
    gateway: InMemoryGateway,
    payments: PaymentService<MemoryStore, InMemoryGateway>,
    dispatcher: Dispatcher<MemoryStore, InMemoryGateway>,
    auto_cancel: AutoCancel<MemoryStore>,
}

impl Harness {
    fn new() -> Self {
        let store = MemoryStore::new();
        let gateway = InMemoryGateway::new();
        let payments = PaymentService::new(
            store.clone(),
            gateway.clone(),
            "https://shop.test/payments/callback",
        );
        Self {
            checkout: CheckoutService::new(store.clone()),
            orders: OrderService::new(store.clone()),
            dispatcher: Dispatcher::new(store.clone(), payments.clone()),
            auto_cancel: AutoCancel::new(store.clone()),
            payments,
            gateway,
            store,
        }
    }

    async fn seed_product(&self, stock: i64) -> ProductRecord {
        let product = ProductRecord {
            id: ProductId::new(),
            shop_id: ShopId::new(),
            name: "Widget".to_string(),
            description: String::new(),
            price: Money::from_cents(1_000),
            active: true,
        };
        self.store.add_product(product.clone(), stock).await;
        product
    }

    async fn place_order(&self, product: &ProductRecord, quantity: u32) -> domain::CheckoutReceipt {
        self.place_order_with(product, quantity, PaymentMethod::Cash)
            .await
    }

    async fn place_order_with(
        &self,
        product: &ProductRecord,
        quantity: u32,
        payment_method: PaymentMethod,
    ) -> domain::CheckoutReceipt {
        let user = UserId::new();
        self.store.upsert_cart_item(user, product.id, quantity).await;
        self.checkout
            .checkout(&CheckoutRequest {
                user_id: user,
                shipping_address_id: None,
                fulfillment_method: FulfillmentMethod::Pickup,
                payment_method,
            })
            .await
            .unwrap()
    }
}

#[tokio::test]
async fn cancelled_order_is_restocked_through_the_outbox() {
    let h = Harness::new();
    let product = h.seed_product(10).await;
    let receipt = h.place_order(&product, 4).await;
    assert_eq!(h.store.stock_of(product.id).await, Some(6));

    h.orders
        .transition(
            receipt.orders[0].id,
            &TransitionRequest::to(OrderStatus::Cancelled),
        )
        .await
        .unwrap();
    // compensation has not run yet
    assert_eq!(h.store.stock_of(product.id).await, Some(6));

    let executed = h.dispatcher.drain_once().await.unwrap();
    assert_eq!(executed, 1);
    assert_eq!(h.store.stock_of(product.id).await, Some(10));

    let order = h
        .store
        .get_order(receipt.orders[0].id)
        .await
        .unwrap()
        .unwrap();
    assert!(order.restocked_at.is_some());

    let tasks = h.store.outbox_snapshot().await;
    assert_eq!(tasks[0].status, OutboxStatus::Done);
}

#[tokio::test]
async fn restock_is_idempotent() {
    let h = Harness::new();
    let product = h.seed_product(10).await;
    let receipt = h.place_order(&product, 4).await;
    let order_id = receipt.orders[0].id;

    h.orders
        .transition(order_id, &TransitionRequest::to(OrderStatus::Cancelled))
        .await
        .unwrap();

    assert_eq!(
        restock::restock_order(&h.store, order_id).await.unwrap(),
        RestockOutcome::Restocked
    );
    assert_eq!(
        restock::restock_order(&h.store, order_id).await.unwrap(),
        RestockOutcome::AlreadyRestocked
    );
    // credited exactly once
    assert_eq!(h.store.stock_of(product.id).await, Some(10));
}

#[tokio::test]
async fn restock_skips_deleted_products() {
    let h = Harness::new();
    let product = h.seed_product(10).await;
    let receipt = h.place_order(&product, 4).await;
    let order_id = receipt.orders[0].id;

    h.orders
        .transition(order_id, &TransitionRequest::to(OrderStatus::Cancelled))
        .await
        .unwrap();
    h.store.remove_product(product.id).await;

    assert_eq!(
        restock::restock_order(&h.store, order_id).await.unwrap(),
        RestockOutcome::Restocked
    );
    assert_eq!(h.store.stock_of(product.id).await, None);
}

#[tokio::test]
async fn verification_task_flows_payment_to_orders() {
    let h = Harness::new();
    let product = h.seed_product(10).await;
    let receipt = h
        .place_order_with(&product, 1, PaymentMethod::Digital)
        .await;

    let init = h
        .payments
        .initialize(receipt.group.id, "a@b.test")
        .await
        .unwrap();
    h.gateway.mark_charged(&init.reference);

    // as the webhook handler would after a valid charge.success
    h.payments.enqueue_verification(&init.reference).await.unwrap();
    let executed = h.dispatcher.drain_once().await.unwrap();
    assert_eq!(executed, 1);

    let order = h
        .store
        .get_order(receipt.orders[0].id)
        .await
        .unwrap()
        .unwrap();
    assert!(order.is_paid);
}

#[tokio::test]
async fn failing_verification_retries_then_buries() {
    let h = Harness::new();
    let product = h.seed_product(10).await;
    let receipt = h
        .place_order_with(&product, 1, PaymentMethod::Digital)
        .await;
    let init = h
        .payments
        .initialize(receipt.group.id, "a@b.test")
        .await
        .unwrap();

    h.gateway.set_fail_on_verify(true);
    h.payments.enqueue_verification(&init.reference).await.unwrap();

    for attempt in 1..=MAX_ATTEMPTS {
        let task = h.store.outbox_snapshot().await.pop().unwrap();
        assert_eq!(task.status, OutboxStatus::Pending);
        // collapse the backoff so the next pass claims it immediately
        h.store
            .reschedule_task(task.id, Utc::now() - Duration::seconds(1), "forced due")
            .await
            .unwrap();

        let executed = h.dispatcher.drain_once().await.unwrap();
        assert_eq!(executed, 1, "attempt {attempt} should claim the task");
    }

    let task = h.store.outbox_snapshot().await.pop().unwrap();
    assert_eq!(task.status, OutboxStatus::Dead);
    assert_eq!(task.attempts, MAX_ATTEMPTS);
    assert!(task.last_error.is_some());

    // payment state was left unresolved, not corrupted
    let payment = h
        .store
        .get_payment_by_reference(&init.reference)
        .await
        .unwrap()
        .unwrap();
    assert!(!payment.verified);
}

#[tokio::test]
async fn unknown_reference_is_buried_without_retries() {
    let h = Harness::new();
    h.payments.enqueue_verification("PAY-gone").await.unwrap();

    h.dispatcher.drain_once().await.unwrap();

    let task = h.store.outbox_snapshot().await.pop().unwrap();
    assert_eq!(task.status, OutboxStatus::Dead);
    assert_eq!(task.attempts, 1);
}

#[tokio::test]
async fn stale_unpaid_digital_groups_are_auto_cancelled() {
    let h = Harness::new();
    let product = h.seed_product(20).await;

    let stale = h
        .place_order_with(&product, 2, PaymentMethod::Digital)
        .await;
    h.store
        .set_group_created_at(stale.group.id, Utc::now() - Duration::hours(5))
        .await;

    let fresh = h
        .place_order_with(&product, 2, PaymentMethod::Digital)
        .await;

    let paid = h
        .place_order_with(&product, 2, PaymentMethod::Digital)
        .await;
    let init = h.payments.initialize(paid.group.id, "a@b.test").await.unwrap();
    h.gateway.mark_charged(&init.reference);
    h.payments.verify(&init.reference).await.unwrap();
    h.store
        .set_group_created_at(paid.group.id, Utc::now() - Duration::hours(5))
        .await;

    let stale_cash = h.place_order(&product, 2).await;
    h.store
        .set_group_created_at(stale_cash.group.id, Utc::now() - Duration::hours(5))
        .await;

    let cancelled = h.auto_cancel.run_once().await.unwrap();
    assert_eq!(cancelled, 1);

    let group = h
        .store
        .get_order_group(stale.group.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(group.status, common::GroupStatus::Cancelled);

    for untouched in [fresh.group.id, paid.group.id, stale_cash.group.id] {
        let group = h.store.get_order_group(untouched).await.unwrap().unwrap();
        assert_eq!(group.status, common::GroupStatus::Pending);
    }

    // cancellation scheduled restock; the dispatcher completes the loop
    assert_eq!(h.store.stock_of(product.id).await, Some(12));
    h.dispatcher.drain_once().await.unwrap();
    assert_eq!(h.store.stock_of(product.id).await, Some(14));
}
