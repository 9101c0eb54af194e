//! Payment initialization and reconciliation.

use chrono::Utc;
use common::{GroupStatus, OrderGroupId, PaymentMethod};
use storage::{MarketStore, PaymentRecord, StoreTx, TaskPayload};
use uuid::Uuid;

use crate::error::PaymentError;
use crate::gateway::PaymentGateway;

/// Result of initializing a payment.
#[derive(Debug, Clone)]
pub struct PaymentInit {
    pub reference: String,
    pub authorization_url: String,
}

/// Result of a verification pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// The payment was verified by this call and orders were marked paid.
    Verified,
    /// The payment was already verified; nothing was mutated.
    AlreadyVerified,
}

/// Creates payments against the gateway and reconciles their state back.
#[derive(Clone)]
pub struct PaymentService<S: MarketStore, G: PaymentGateway> {
    store: S,
    gateway: G,
    callback_url: String,
}

impl<S: MarketStore, G: PaymentGateway> PaymentService<S, G> {
    /// Creates a new payment service.
    pub fn new(store: S, gateway: G, callback_url: impl Into<String>) -> Self {
        Self {
            store,
            gateway,
            callback_url: callback_url.into(),
        }
    }

    /// Initializes (or re-initializes) the payment for a digital group and
    /// returns the gateway checkout URL.
    ///
    /// The payment row is created lazily on first call; an unverified
    /// reference from an earlier attempt is rotated; a verified payment is
    /// immutable. The reference is committed before the gateway call, so a
    /// gateway failure leaves a row the customer can retry against.
    #[tracing::instrument(skip(self, email))]
    pub async fn initialize(
        &self,
        group_id: OrderGroupId,
        email: &str,
    ) -> Result<PaymentInit, PaymentError> {
        let mut tx = self.store.begin().await?;

        let group = tx
            .lock_order_group(group_id)
            .await?
            .ok_or_else(|| PaymentError::NotFound {
                entity: "order group",
                id: group_id.to_string(),
            })?;
        if group.payment_method != PaymentMethod::Digital {
            return Err(PaymentError::NotDigital);
        }
        if group.status != GroupStatus::Pending {
            return Err(PaymentError::GroupNotPayable {
                status: group.status,
            });
        }

        let reference = match tx.lock_payment_for_group(group_id).await? {
            Some(payment) if payment.verified => {
                return Err(PaymentError::DuplicateTransaction);
            }
            Some(mut payment) => {
                payment.reference = new_reference();
                payment.amount = group.total;
                tx.update_payment(&payment).await?;
                payment.reference
            }
            None => {
                let payment = PaymentRecord {
                    group_id,
                    reference: new_reference(),
                    amount: group.total,
                    verified: false,
                    paid_at: None,
                    refund_requested: false,
                    refunded: false,
                    created_at: Utc::now(),
                };
                tx.insert_payment(&payment).await?;
                payment.reference
            }
        };
        tx.commit().await?;

        let initialized = self
            .gateway
            .initialize(&reference, group.total, email, &self.callback_url)
            .await?;

        metrics::counter!("payments_initialized_total").increment(1);
        Ok(PaymentInit {
            reference,
            authorization_url: initialized.authorization_url,
        })
    }

    /// Enqueues an asynchronous verification for a reference, as the
    /// webhook handler does after validating the signature.
    pub async fn enqueue_verification(&self, reference: &str) -> Result<(), PaymentError> {
        let mut tx = self.store.begin().await?;
        tx.enqueue_task(
            &TaskPayload::VerifyPayment {
                reference: reference.to_string(),
            },
            Utc::now(),
        )
        .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Verifies a payment against the gateway and reconciles local state.
    ///
    /// No-ops on an already-verified payment. On gateway success, marks
    /// the payment verified and every order of the group paid in one
    /// transaction. A charge the gateway does not (yet) report as
    /// successful surfaces as a retryable gateway error; the payment stays
    /// unverified and the customer can re-initiate.
    #[tracing::instrument(skip(self))]
    pub async fn verify(&self, reference: &str) -> Result<VerifyOutcome, PaymentError> {
        // cheap idempotency read before the gateway round-trip
        match self.store.get_payment_by_reference(reference).await? {
            None => {
                return Err(PaymentError::NotFound {
                    entity: "payment",
                    id: reference.to_string(),
                });
            }
            Some(payment) if payment.verified => return Ok(VerifyOutcome::AlreadyVerified),
            Some(_) => {}
        }

        let verification = self.gateway.verify_by_reference(reference).await?;
        if !verification.success {
            return Err(PaymentError::Gateway(format!(
                "charge {reference} is not successful"
            )));
        }

        let mut tx = self.store.begin().await?;
        let mut payment = tx
            .lock_payment_by_reference(reference)
            .await?
            .ok_or_else(|| PaymentError::NotFound {
                entity: "payment",
                id: reference.to_string(),
            })?;
        if payment.verified {
            // lost a race with another verification pass
            return Ok(VerifyOutcome::AlreadyVerified);
        }

        let paid_at = verification.paid_at.unwrap_or_else(Utc::now);
        payment.verified = true;
        payment.paid_at = Some(paid_at);
        tx.update_payment(&payment).await?;

        let orders = tx.lock_orders_in_group(payment.group_id).await?;
        for mut order in orders {
            if !order.is_paid {
                order.is_paid = true;
                order.paid_at = Some(paid_at);
                tx.update_order(&order).await?;
            }
        }
        tx.commit().await?;

        metrics::counter!("payments_verified_total").increment(1);
        tracing::info!(reference, group_id = %payment.group_id, "payment verified");
        Ok(VerifyOutcome::Verified)
    }
}

fn new_reference() -> String {
    format!("PAY-{}", Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{FulfillmentMethod, Money, OrderId, OrderStatus, ShopId, UserId};
    use storage::{MemoryStore, OrderGroupRecord, OrderRecord};

    use crate::gateway::InMemoryGateway;

    struct Harness {
        store: MemoryStore,
        gateway: InMemoryGateway,
        payments: PaymentService<MemoryStore, InMemoryGateway>,
    }

    impl Harness {
        fn new() -> Self {
            let store = MemoryStore::new();
            let gateway = InMemoryGateway::new();
            Self {
                payments: PaymentService::new(
                    store.clone(),
                    gateway.clone(),
                    "https://shop.test/payments/callback",
                ),
                store,
                gateway,
            }
        }

        /// Seeds a pending digital group with two orders.
        async fn seed_group(&self) -> (OrderGroupId, Vec<OrderId>) {
            let group = OrderGroupRecord {
                id: OrderGroupId::new(),
                user_id: UserId::new(),
                shipping_address: None,
                fulfillment_method: FulfillmentMethod::Pickup,
                payment_method: PaymentMethod::Digital,
                status: GroupStatus::Pending,
                total: Money::from_cents(10_000),
                created_at: Utc::now(),
                cancelled_at: None,
            };

            let mut tx = self.store.begin().await.unwrap();
            tx.insert_order_group(&group).await.unwrap();
            let mut order_ids = Vec::new();
            for _ in 0..2 {
                let order = OrderRecord {
                    id: OrderId::new(),
                    group_id: group.id,
                    shop_id: ShopId::new(),
                    status: OrderStatus::Pending,
                    total: Money::from_cents(5_000),
                    is_paid: false,
                    paid_at: None,
                    is_delivered: false,
                    is_picked_up: false,
                    delivery_date: None,
                    created_at: Utc::now(),
                    processing_at: None,
                    shipped_at: None,
                    completed_at: None,
                    cancelled_at: None,
                    restocked_at: None,
                };
                order_ids.push(order.id);
                tx.insert_order(&order).await.unwrap();
            }
            tx.commit().await.unwrap();

            (group.id, order_ids)
        }
    }

    #[tokio::test]
    async fn initialize_creates_then_rotates_reference() {
        let h = Harness::new();
        let (group_id, _) = h.seed_group().await;

        let first = h.payments.initialize(group_id, "a@b.test").await.unwrap();
        assert!(first.authorization_url.contains(&first.reference));

        let second = h.payments.initialize(group_id, "a@b.test").await.unwrap();
        assert_ne!(first.reference, second.reference);
        assert_eq!(h.gateway.initialized_count(), 2);

        // the old reference no longer resolves
        assert!(
            h.store
                .get_payment_by_reference(&first.reference)
                .await
                .unwrap()
                .is_none()
        );
        let payment = h
            .store
            .get_payment_by_reference(&second.reference)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(payment.amount, Money::from_cents(10_000));
        assert!(!payment.verified);
    }

    #[tokio::test]
    async fn initialize_rejects_cash_and_non_pending_groups() {
        let h = Harness::new();

        let cash_group = OrderGroupRecord {
            id: OrderGroupId::new(),
            user_id: UserId::new(),
            shipping_address: None,
            fulfillment_method: FulfillmentMethod::Pickup,
            payment_method: PaymentMethod::Cash,
            status: GroupStatus::Pending,
            total: Money::from_cents(2_000),
            created_at: Utc::now(),
            cancelled_at: None,
        };
        let mut cancelled_group = OrderGroupRecord {
            id: OrderGroupId::new(),
            payment_method: PaymentMethod::Digital,
            ..cash_group.clone()
        };
        cancelled_group.status = GroupStatus::Cancelled;

        let mut tx = h.store.begin().await.unwrap();
        tx.insert_order_group(&cash_group).await.unwrap();
        tx.insert_order_group(&cancelled_group).await.unwrap();
        tx.commit().await.unwrap();

        assert!(matches!(
            h.payments.initialize(cash_group.id, "a@b.test").await,
            Err(PaymentError::NotDigital)
        ));
        assert!(matches!(
            h.payments.initialize(cancelled_group.id, "a@b.test").await,
            Err(PaymentError::GroupNotPayable {
                status: GroupStatus::Cancelled
            })
        ));
        assert_eq!(h.gateway.initialized_count(), 0);
    }

    #[tokio::test]
    async fn gateway_failure_leaves_reusable_reference() {
        let h = Harness::new();
        let (group_id, _) = h.seed_group().await;
        h.gateway.set_fail_on_initialize(true);

        assert!(matches!(
            h.payments.initialize(group_id, "a@b.test").await,
            Err(PaymentError::Gateway(_))
        ));

        // the reference row survived; a retry rotates and succeeds
        h.gateway.set_fail_on_initialize(false);
        let retry = h.payments.initialize(group_id, "a@b.test").await.unwrap();
        assert!(
            h.store
                .get_payment_by_reference(&retry.reference)
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn verify_marks_payment_and_sibling_orders_paid() {
        let h = Harness::new();
        let (group_id, order_ids) = h.seed_group().await;
        let init = h.payments.initialize(group_id, "a@b.test").await.unwrap();

        h.gateway.mark_charged(&init.reference);
        let outcome = h.payments.verify(&init.reference).await.unwrap();
        assert_eq!(outcome, VerifyOutcome::Verified);

        let payment = h
            .store
            .get_payment_by_reference(&init.reference)
            .await
            .unwrap()
            .unwrap();
        assert!(payment.verified);
        assert!(payment.paid_at.is_some());

        for order_id in order_ids {
            let order = h.store.get_order(order_id).await.unwrap().unwrap();
            assert!(order.is_paid);
            assert_eq!(order.paid_at, payment.paid_at);
        }
    }

    #[tokio::test]
    async fn verify_twice_performs_no_second_mutation() {
        let h = Harness::new();
        let (group_id, _) = h.seed_group().await;
        let init = h.payments.initialize(group_id, "a@b.test").await.unwrap();
        h.gateway.mark_charged(&init.reference);

        assert_eq!(
            h.payments.verify(&init.reference).await.unwrap(),
            VerifyOutcome::Verified
        );
        let calls_after_first = h.gateway.verify_calls();

        assert_eq!(
            h.payments.verify(&init.reference).await.unwrap(),
            VerifyOutcome::AlreadyVerified
        );
        // second pass never reached the gateway
        assert_eq!(h.gateway.verify_calls(), calls_after_first);
    }

    #[tokio::test]
    async fn verified_payment_cannot_be_reinitialized() {
        let h = Harness::new();
        let (group_id, _) = h.seed_group().await;
        let init = h.payments.initialize(group_id, "a@b.test").await.unwrap();
        h.gateway.mark_charged(&init.reference);
        h.payments.verify(&init.reference).await.unwrap();

        assert!(matches!(
            h.payments.initialize(group_id, "a@b.test").await,
            Err(PaymentError::DuplicateTransaction)
        ));
    }

    #[tokio::test]
    async fn unsettled_charge_is_a_retryable_error() {
        let h = Harness::new();
        let (group_id, _) = h.seed_group().await;
        let init = h.payments.initialize(group_id, "a@b.test").await.unwrap();

        // gateway reachable, but the charge never settled
        let err = h.payments.verify(&init.reference).await.unwrap_err();
        assert!(err.is_retryable());

        let payment = h
            .store
            .get_payment_by_reference(&init.reference)
            .await
            .unwrap()
            .unwrap();
        assert!(!payment.verified);
    }

    #[tokio::test]
    async fn unknown_reference_is_not_retryable() {
        let h = Harness::new();
        let err = h.payments.verify("PAY-missing").await.unwrap_err();
        assert!(matches!(err, PaymentError::NotFound { .. }));
        assert!(!err.is_retryable());
        assert_eq!(h.gateway.verify_calls(), 0);
    }

    #[tokio::test]
    async fn enqueue_verification_writes_an_outbox_task() {
        let h = Harness::new();
        h.payments.enqueue_verification("ref-1").await.unwrap();
        let tasks = h.store.outbox_snapshot().await;
        assert_eq!(tasks.len(), 1);
        assert_eq!(
            tasks[0].payload,
            TaskPayload::VerifyPayment {
                reference: "ref-1".to_string()
            }
        );
    }
}
