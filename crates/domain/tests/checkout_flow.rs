//! End-to-end tests for the checkout/fulfillment core against the
//! in-memory store.

use chrono::{Duration, Utc};
use common::{
    AddressId, FulfillmentMethod, GroupStatus, Money, OrderStatus, PaymentMethod, ProductId,
    ShopId, UserId,
};
use domain::{
    CheckoutRequest, CheckoutService, DomainError, OrderService, TransitionRequest,
};
use storage::{AddressRecord, MarketStore, MemoryStore, ProductRecord, TaskPayload};

struct Harness {
    store: MemoryStore,
    checkout: CheckoutService<MemoryStore>,
    orders: OrderService<MemoryStore>,
}

impl Harness {
    fn new() -> Self {
        let store = MemoryStore::new();
        Self {
            checkout: CheckoutService::new(store.clone()),
            orders: OrderService::new(store.clone()),
            store,
        }
    }

    async fn seed_product(&self, shop_id: ShopId, price_cents: i64, stock: i64) -> ProductRecord {
        let product = ProductRecord {
            id: ProductId::new(),
            shop_id,
            name: format!("Product {price_cents}"),
            description: "seeded".to_string(),
            price: Money::from_cents(price_cents),
            active: true,
        };
        self.store.add_product(product.clone(), stock).await;
        product
    }

    async fn seed_address(&self, user_id: UserId) -> AddressRecord {
        let address = AddressRecord {
            id: AddressId::new(),
            user_id,
            recipient: "A. Customer".to_string(),
            phone: "+2348000000000".to_string(),
            line1: "1 Market Street".to_string(),
            city: "Lagos".to_string(),
            region: "LA".to_string(),
        };
        self.store.add_address(address.clone()).await;
        address
    }

    fn delivery_request(&self, user_id: UserId, address_id: AddressId) -> CheckoutRequest {
        CheckoutRequest {
            user_id,
            shipping_address_id: Some(address_id),
            fulfillment_method: FulfillmentMethod::Delivery,
            payment_method: PaymentMethod::Cash,
        }
    }

    fn pickup_request(&self, user_id: UserId) -> CheckoutRequest {
        CheckoutRequest {
            user_id,
            shipping_address_id: None,
            fulfillment_method: FulfillmentMethod::Pickup,
            payment_method: PaymentMethod::Cash,
        }
    }
}

/// Two items from two shops, delivery + cash: one group, two orders,
/// delivery fee on top, cart emptied, stock reduced.
#[tokio::test]
async fn checkout_fans_out_per_shop_and_adds_delivery_fee() {
    let h = Harness::new();
    let user = UserId::new();
    let address = h.seed_address(user).await;

    let shop_a = ShopId::new();
    let shop_b = ShopId::new();
    let p1 = h.seed_product(shop_a, 100_000, 10).await;
    let p2 = h.seed_product(shop_b, 50_000, 10).await;

    h.store.upsert_cart_item(user, p1.id, 1).await;
    h.store.upsert_cart_item(user, p2.id, 2).await;

    let receipt = h
        .checkout
        .checkout(&h.delivery_request(user, address.id))
        .await
        .unwrap();

    assert_eq!(receipt.orders.len(), 2);
    assert_eq!(receipt.group.status, GroupStatus::Pending);

    // 1 * 1000.00 + 2 * 500.00 + 3000.00 delivery fee
    assert_eq!(receipt.group.total, Money::from_cents(100_000 + 100_000 + 300_000));
    let order_sum: Money = receipt.orders.iter().map(|o| o.total).sum();
    assert_eq!(order_sum, Money::from_cents(200_000));

    let snapshot = receipt.group.shipping_address.as_ref().unwrap();
    assert_eq!(snapshot.city, "Lagos");

    assert_eq!(h.store.cart_len(user).await, 0);
    assert_eq!(h.store.stock_of(p1.id).await, Some(9));
    assert_eq!(h.store.stock_of(p2.id).await, Some(8));

    for order in &receipt.orders {
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.group_id, receipt.group.id);
    }
}

#[tokio::test]
async fn order_totals_equal_item_sums() {
    let h = Harness::new();
    let user = UserId::new();
    let shop = ShopId::new();
    let p1 = h.seed_product(shop, 1_500, 10).await;
    let p2 = h.seed_product(shop, 2_500, 10).await;

    h.store.upsert_cart_item(user, p1.id, 3).await;
    h.store.upsert_cart_item(user, p2.id, 1).await;

    let receipt = h.checkout.checkout(&h.pickup_request(user)).await.unwrap();
    assert_eq!(receipt.orders.len(), 1);
    assert_eq!(receipt.orders[0].total, Money::from_cents(3 * 1_500 + 2_500));
    // pickup: no delivery fee, no shipping snapshot
    assert_eq!(receipt.group.total, receipt.orders[0].total);
    assert!(receipt.group.shipping_address.is_none());
}

/// Stock 5, two concurrent checkouts each wanting 3: exactly one wins,
/// the loser sees the stock observed under the lock, and stock never
/// goes negative.
#[tokio::test]
async fn concurrent_checkouts_race_on_shared_stock() {
    let h = Harness::new();
    let shop = ShopId::new();
    let product = h.seed_product(shop, 10_000, 5).await;

    let mut handles = Vec::new();
    for _ in 0..2 {
        let store = h.store.clone();
        let checkout = h.checkout.clone();
        let product_id = product.id;
        handles.push(tokio::spawn(async move {
            let user = UserId::new();
            store.upsert_cart_item(user, product_id, 3).await;
            checkout
                .checkout(&CheckoutRequest {
                    user_id: user,
                    shipping_address_id: None,
                    fulfillment_method: FulfillmentMethod::Pickup,
                    payment_method: PaymentMethod::Cash,
                })
                .await
        }));
    }

    let mut successes = 0;
    let mut losers = Vec::new();
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(e) => losers.push(e),
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(losers.len(), 1);
    match &losers[0] {
        DomainError::InsufficientStock {
            product_id,
            available,
        } => {
            assert_eq!(*product_id, product.id);
            assert_eq!(*available, 2);
        }
        other => panic!("expected InsufficientStock, got {other:?}"),
    }
    assert_eq!(h.store.stock_of(product.id).await, Some(2));
}

/// A short line anywhere in the cart aborts everything: no group, no
/// orders, no stock mutation from the other lines, cart intact.
#[tokio::test]
async fn failed_line_rolls_back_the_whole_checkout() {
    let h = Harness::new();
    let user = UserId::new();
    let shop = ShopId::new();
    let plenty_a = h.seed_product(shop, 1_000, 10).await;
    let plenty_b = h.seed_product(shop, 2_000, 10).await;
    let short = h.seed_product(shop, 3_000, 1).await;

    h.store.upsert_cart_item(user, plenty_a.id, 2).await;
    h.store.upsert_cart_item(user, plenty_b.id, 2).await;
    h.store.upsert_cart_item(user, short.id, 5).await;

    let result = h.checkout.checkout(&h.pickup_request(user)).await;
    assert!(matches!(
        result,
        Err(DomainError::InsufficientStock { available: 1, .. })
    ));

    assert_eq!(h.store.group_count().await, 0);
    assert_eq!(h.store.order_count().await, 0);
    assert_eq!(h.store.cart_len(user).await, 3);
    assert_eq!(h.store.stock_of(plenty_a.id).await, Some(10));
    assert_eq!(h.store.stock_of(plenty_b.id).await, Some(10));
    assert_eq!(h.store.stock_of(short.id).await, Some(1));
}

#[tokio::test]
async fn empty_cart_is_a_distinct_error() {
    let h = Harness::new();
    let result = h.checkout.checkout(&h.pickup_request(UserId::new())).await;
    assert!(matches!(result, Err(DomainError::EmptyCart)));
}

#[tokio::test]
async fn deactivated_product_fails_checkout_with_report() {
    let h = Harness::new();
    let user = UserId::new();
    let shop = ShopId::new();
    let mut dead = h.seed_product(shop, 1_000, 10).await;
    dead.active = false;
    h.store.add_product(dead.clone(), 10).await; // re-seed deactivated

    h.store.upsert_cart_item(user, dead.id, 1).await;

    match h.checkout.checkout(&h.pickup_request(user)).await {
        Err(DomainError::InvalidCart { report }) => {
            assert!(!report.valid);
            assert_eq!(report.lines.len(), 1);
        }
        other => panic!("expected InvalidCart, got {other:?}"),
    }
}

#[tokio::test]
async fn delivery_without_address_is_rejected() {
    let h = Harness::new();
    let user = UserId::new();
    let p = h.seed_product(ShopId::new(), 1_000, 5).await;
    h.store.upsert_cart_item(user, p.id, 1).await;

    let mut request = h.pickup_request(user);
    request.fulfillment_method = FulfillmentMethod::Delivery;
    assert!(matches!(
        h.checkout.checkout(&request).await,
        Err(DomainError::MissingShippingAddress)
    ));

    // someone else's address resolves to not-found
    let foreign = h.seed_address(UserId::new()).await;
    request.shipping_address_id = Some(foreign.id);
    assert!(matches!(
        h.checkout.checkout(&request).await,
        Err(DomainError::NotFound { .. })
    ));
}

/// Pickup + cash at processing: completion needs the explicit paid flag,
/// and sets the pickup/payment fields.
#[tokio::test]
async fn cash_pickup_completion_requires_paid_confirmation() {
    let h = Harness::new();
    let user = UserId::new();
    let p = h.seed_product(ShopId::new(), 5_000, 5).await;
    h.store.upsert_cart_item(user, p.id, 1).await;

    let receipt = h.checkout.checkout(&h.pickup_request(user)).await.unwrap();
    let order_id = receipt.orders[0].id;

    h.orders
        .transition(order_id, &TransitionRequest::to(OrderStatus::Processing))
        .await
        .unwrap();

    let unpaid = h
        .orders
        .transition(order_id, &TransitionRequest::to(OrderStatus::Completed))
        .await;
    assert!(matches!(
        unpaid,
        Err(DomainError::InvalidPaymentStatus { .. })
    ));

    let completed = h
        .orders
        .transition(
            order_id,
            &TransitionRequest::to(OrderStatus::Completed).with_mark_paid(),
        )
        .await
        .unwrap();

    assert_eq!(completed.status, OrderStatus::Completed);
    assert!(completed.is_paid);
    assert!(completed.paid_at.is_some());
    assert!(completed.is_picked_up);
    assert!(!completed.is_delivered);

    let group = h
        .store
        .get_order_group(receipt.group.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(group.status, GroupStatus::Fulfilled);
}

/// Delivery at processing: shipping needs a future delivery date, sets
/// shipped_at once, and repeating the call is AlreadyInState.
#[tokio::test]
async fn shipping_validates_the_delivery_date() {
    let h = Harness::new();
    let user = UserId::new();
    let address = h.seed_address(user).await;
    let p = h.seed_product(ShopId::new(), 5_000, 5).await;
    h.store.upsert_cart_item(user, p.id, 1).await;

    let receipt = h
        .checkout
        .checkout(&h.delivery_request(user, address.id))
        .await
        .unwrap();
    let order_id = receipt.orders[0].id;

    h.orders
        .transition(order_id, &TransitionRequest::to(OrderStatus::Processing))
        .await
        .unwrap();

    assert!(matches!(
        h.orders
            .transition(order_id, &TransitionRequest::to(OrderStatus::Shipped))
            .await,
        Err(DomainError::InvalidDeliveryDate { .. })
    ));

    let past = TransitionRequest::to(OrderStatus::Shipped)
        .with_delivery_date(Utc::now() - Duration::days(1));
    assert!(matches!(
        h.orders.transition(order_id, &past).await,
        Err(DomainError::InvalidDeliveryDate { .. })
    ));

    let tomorrow =
        TransitionRequest::to(OrderStatus::Shipped).with_delivery_date(Utc::now() + Duration::days(1));
    let shipped = h.orders.transition(order_id, &tomorrow).await.unwrap();
    assert_eq!(shipped.status, OrderStatus::Shipped);
    assert!(shipped.shipped_at.is_some());
    assert!(shipped.delivery_date.is_some());

    // same call again: rejected without touching the timestamps
    assert!(matches!(
        h.orders.transition(order_id, &tomorrow).await,
        Err(DomainError::AlreadyInState {
            status: OrderStatus::Shipped
        })
    ));
    let unchanged = h.store.get_order(order_id).await.unwrap().unwrap();
    assert_eq!(unchanged.shipped_at, shipped.shipped_at);
}

/// An illegal transition leaves status and timestamps untouched.
#[tokio::test]
async fn rejected_transition_has_no_side_effects() {
    let h = Harness::new();
    let user = UserId::new();
    let p = h.seed_product(ShopId::new(), 5_000, 5).await;
    h.store.upsert_cart_item(user, p.id, 1).await;

    let receipt = h.checkout.checkout(&h.pickup_request(user)).await.unwrap();
    let order_id = receipt.orders[0].id;

    // pending -> shipped skips processing
    assert!(matches!(
        h.orders
            .transition(
                order_id,
                &TransitionRequest::to(OrderStatus::Shipped)
                    .with_delivery_date(Utc::now() + Duration::days(1))
            )
            .await,
        Err(DomainError::InvalidStatusTransition {
            from: OrderStatus::Pending,
            to: OrderStatus::Shipped
        })
    ));

    let order = h.store.get_order(order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Pending);
    assert!(order.shipped_at.is_none());
    assert!(h.store.outbox_snapshot().await.is_empty());
}

/// With two orders in a group, completing one yields partially
/// fulfilled; completing both yields fulfilled.
#[tokio::test]
async fn group_aggregate_follows_order_completion() {
    let h = Harness::new();
    let user = UserId::new();
    let p1 = h.seed_product(ShopId::new(), 1_000, 5).await;
    let p2 = h.seed_product(ShopId::new(), 2_000, 5).await;
    h.store.upsert_cart_item(user, p1.id, 1).await;
    h.store.upsert_cart_item(user, p2.id, 1).await;

    let receipt = h.checkout.checkout(&h.pickup_request(user)).await.unwrap();
    assert_eq!(receipt.orders.len(), 2);

    for (index, order) in receipt.orders.iter().enumerate() {
        h.orders
            .transition(order.id, &TransitionRequest::to(OrderStatus::Processing))
            .await
            .unwrap();
        h.orders
            .transition(
                order.id,
                &TransitionRequest::to(OrderStatus::Completed).with_mark_paid(),
            )
            .await
            .unwrap();

        let group = h
            .store
            .get_order_group(receipt.group.id)
            .await
            .unwrap()
            .unwrap();
        if index == 0 {
            assert_eq!(group.status, GroupStatus::PartiallyFulfilled);
        } else {
            assert_eq!(group.status, GroupStatus::Fulfilled);
        }
    }
}

/// Cancelling an order enqueues its restock task only on commit, and a
/// group whose every order is cancelled aggregates to cancelled.
#[tokio::test]
async fn order_cancellation_enqueues_restock() {
    let h = Harness::new();
    let user = UserId::new();
    let p = h.seed_product(ShopId::new(), 1_000, 5).await;
    h.store.upsert_cart_item(user, p.id, 2).await;

    let receipt = h.checkout.checkout(&h.pickup_request(user)).await.unwrap();
    let order_id = receipt.orders[0].id;

    h.orders
        .transition(order_id, &TransitionRequest::to(OrderStatus::Cancelled))
        .await
        .unwrap();

    let tasks = h.store.outbox_snapshot().await;
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].payload, TaskPayload::Restock { order_id });

    let group = h
        .store
        .get_order_group(receipt.group.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(group.status, GroupStatus::Cancelled);
    assert!(group.cancelled_at.is_some());
}

/// A group created five hours ago can no longer be cancelled by the
/// customer, while a fresh one can.
#[tokio::test]
async fn customer_cancellation_window_is_enforced() {
    let h = Harness::new();
    let user = UserId::new();
    let p = h.seed_product(ShopId::new(), 1_000, 10).await;

    h.store.upsert_cart_item(user, p.id, 1).await;
    let stale = h.checkout.checkout(&h.pickup_request(user)).await.unwrap();
    h.store
        .set_group_created_at(stale.group.id, Utc::now() - Duration::hours(5))
        .await;

    assert!(matches!(
        h.orders.cancel_group_as_customer(user, stale.group.id).await,
        Err(DomainError::CancellationWindowExpired)
    ));

    h.store.upsert_cart_item(user, p.id, 1).await;
    let fresh = h.checkout.checkout(&h.pickup_request(user)).await.unwrap();
    let cancelled = h
        .orders
        .cancel_group_as_customer(user, fresh.group.id)
        .await
        .unwrap();
    assert_eq!(cancelled.status, GroupStatus::Cancelled);

    let orders = h.store.orders_in_group(fresh.group.id).await.unwrap();
    assert!(orders.iter().all(|o| o.status == OrderStatus::Cancelled));
    // one restock task per cancelled order
    let restocks = h
        .store
        .outbox_snapshot()
        .await
        .into_iter()
        .filter(|t| matches!(t.payload, TaskPayload::Restock { .. }))
        .count();
    assert_eq!(restocks, 1);
}

#[tokio::test]
async fn foreign_group_cannot_be_cancelled() {
    let h = Harness::new();
    let user = UserId::new();
    let p = h.seed_product(ShopId::new(), 1_000, 10).await;
    h.store.upsert_cart_item(user, p.id, 1).await;
    let receipt = h.checkout.checkout(&h.pickup_request(user)).await.unwrap();

    assert!(matches!(
        h.orders
            .cancel_group_as_customer(UserId::new(), receipt.group.id)
            .await,
        Err(DomainError::NotFound { .. })
    ));
}

/// Bulk cancellation flips only pending orders; in-flight fulfillment
/// survives.
#[tokio::test]
async fn shop_bulk_cancel_spares_processing_orders() {
    let h = Harness::new();
    let shop = ShopId::new();
    let p = h.seed_product(shop, 1_000, 100).await;

    // two customers, one order each; one order moves to processing
    let user_a = UserId::new();
    h.store.upsert_cart_item(user_a, p.id, 1).await;
    let receipt_a = h
        .checkout
        .checkout(&h.pickup_request(user_a))
        .await
        .unwrap();

    let user_b = UserId::new();
    h.store.upsert_cart_item(user_b, p.id, 1).await;
    let receipt_b = h
        .checkout
        .checkout(&h.pickup_request(user_b))
        .await
        .unwrap();

    h.orders
        .transition(
            receipt_a.orders[0].id,
            &TransitionRequest::to(OrderStatus::Processing),
        )
        .await
        .unwrap();

    let cancelled = h.orders.cancel_pending_for_shop(shop).await.unwrap();
    assert_eq!(cancelled, 1);

    let order_a = h
        .store
        .get_order(receipt_a.orders[0].id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order_a.status, OrderStatus::Processing);

    let order_b = h
        .store
        .get_order(receipt_b.orders[0].id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order_b.status, OrderStatus::Cancelled);

    let group_b = h
        .store
        .get_order_group(receipt_b.group.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(group_b.status, GroupStatus::Cancelled);
}

#[tokio::test]
async fn customer_bulk_cancel_only_touches_own_pending_orders() {
    let h = Harness::new();
    let shop = ShopId::new();
    let p = h.seed_product(shop, 1_000, 100).await;

    let target = UserId::new();
    h.store.upsert_cart_item(target, p.id, 1).await;
    let own = h.checkout.checkout(&h.pickup_request(target)).await.unwrap();

    let bystander = UserId::new();
    h.store.upsert_cart_item(bystander, p.id, 1).await;
    let other = h
        .checkout
        .checkout(&h.pickup_request(bystander))
        .await
        .unwrap();

    let cancelled = h.orders.cancel_pending_for_customer(target).await.unwrap();
    assert_eq!(cancelled, 1);

    assert_eq!(
        h.store
            .get_order(own.orders[0].id)
            .await
            .unwrap()
            .unwrap()
            .status,
        OrderStatus::Cancelled
    );
    assert_eq!(
        h.store
            .get_order(other.orders[0].id)
            .await
            .unwrap()
            .unwrap()
            .status,
        OrderStatus::Pending
    );
}

/// Re-adding a product to a cart replaces the line instead of duplicating
/// it, so checkout sees one line with the latest quantity.
#[tokio::test]
async fn cart_line_replacement_flows_through_checkout() {
    let h = Harness::new();
    let user = UserId::new();
    let p = h.seed_product(ShopId::new(), 1_000, 10).await;

    h.store.upsert_cart_item(user, p.id, 1).await;
    h.store.upsert_cart_item(user, p.id, 4).await;

    let receipt = h.checkout.checkout(&h.pickup_request(user)).await.unwrap();
    assert_eq!(receipt.orders.len(), 1);
    assert_eq!(receipt.orders[0].total, Money::from_cents(4_000));
    assert_eq!(h.store.stock_of(p.id).await, Some(6));
}
