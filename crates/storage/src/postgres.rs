//! PostgreSQL-backed store implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    AddressId, FulfillmentMethod, GroupStatus, Money, OrderGroupId, OrderId, OrderStatus,
    PaymentMethod, ProductId, ShopId, UserId,
};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::error::Result;
use crate::outbox::{OutboxStatus, OutboxTask, TaskPayload};
use crate::records::{
    AddressRecord, AddressSnapshot, CartItemRecord, OrderGroupRecord, OrderItemRecord,
    OrderRecord, PaymentRecord, ProductRecord, StockRecord,
};
use crate::store::{MarketStore, StoreTx};

/// PostgreSQL-backed [`MarketStore`].
///
/// Row locks are taken with `SELECT ... FOR UPDATE`; every unit of work in
/// the transactional core runs inside one [`PostgresTx`].
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }
}

fn row_to_product(row: &PgRow) -> Result<ProductRecord> {
    Ok(ProductRecord {
        id: ProductId::from_uuid(row.try_get::<Uuid, _>("id")?),
        shop_id: ShopId::from_uuid(row.try_get::<Uuid, _>("shop_id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        price: Money::from_cents(row.try_get("price_cents")?),
        active: row.try_get("active")?,
    })
}

fn row_to_stock(row: &PgRow) -> Result<StockRecord> {
    Ok(StockRecord {
        product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
        stock: row.try_get("stock")?,
        last_updated_by: row.try_get("last_updated_by")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_cart_item(row: &PgRow) -> Result<CartItemRecord> {
    Ok(CartItemRecord {
        user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
        product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
        quantity: row.try_get::<i32, _>("quantity")? as u32,
    })
}

fn row_to_address(row: &PgRow) -> Result<AddressRecord> {
    Ok(AddressRecord {
        id: AddressId::from_uuid(row.try_get::<Uuid, _>("id")?),
        user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
        recipient: row.try_get("recipient")?,
        phone: row.try_get("phone")?,
        line1: row.try_get("line1")?,
        city: row.try_get("city")?,
        region: row.try_get("region")?,
    })
}

fn row_to_group(row: &PgRow) -> Result<OrderGroupRecord> {
    let recipient: Option<String> = row.try_get("ship_recipient")?;
    let shipping_address = match recipient {
        Some(recipient) => Some(AddressSnapshot {
            recipient,
            phone: row.try_get("ship_phone")?,
            line1: row.try_get("ship_line1")?,
            city: row.try_get("ship_city")?,
            region: row.try_get("ship_region")?,
        }),
        None => None,
    };

    Ok(OrderGroupRecord {
        id: OrderGroupId::from_uuid(row.try_get::<Uuid, _>("id")?),
        user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
        shipping_address,
        fulfillment_method: row
            .try_get::<String, _>("fulfillment_method")?
            .parse::<FulfillmentMethod>()?,
        payment_method: row
            .try_get::<String, _>("payment_method")?
            .parse::<PaymentMethod>()?,
        status: row.try_get::<String, _>("status")?.parse::<GroupStatus>()?,
        total: Money::from_cents(row.try_get("total_cents")?),
        created_at: row.try_get("created_at")?,
        cancelled_at: row.try_get("cancelled_at")?,
    })
}

fn row_to_order(row: &PgRow) -> Result<OrderRecord> {
    Ok(OrderRecord {
        id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
        group_id: OrderGroupId::from_uuid(row.try_get::<Uuid, _>("group_id")?),
        shop_id: ShopId::from_uuid(row.try_get::<Uuid, _>("shop_id")?),
        status: row.try_get::<String, _>("status")?.parse::<OrderStatus>()?,
        total: Money::from_cents(row.try_get("total_cents")?),
        is_paid: row.try_get("is_paid")?,
        paid_at: row.try_get("paid_at")?,
        is_delivered: row.try_get("is_delivered")?,
        is_picked_up: row.try_get("is_picked_up")?,
        delivery_date: row.try_get("delivery_date")?,
        created_at: row.try_get("created_at")?,
        processing_at: row.try_get("processing_at")?,
        shipped_at: row.try_get("shipped_at")?,
        completed_at: row.try_get("completed_at")?,
        cancelled_at: row.try_get("cancelled_at")?,
        restocked_at: row.try_get("restocked_at")?,
    })
}

fn row_to_order_item(row: &PgRow) -> Result<OrderItemRecord> {
    Ok(OrderItemRecord {
        id: row.try_get("id")?,
        order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
        product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
        product_name: row.try_get("product_name")?,
        product_description: row.try_get("product_description")?,
        quantity: row.try_get::<i32, _>("quantity")? as u32,
        price: Money::from_cents(row.try_get("price_cents")?),
    })
}

fn row_to_payment(row: &PgRow) -> Result<PaymentRecord> {
    Ok(PaymentRecord {
        group_id: OrderGroupId::from_uuid(row.try_get::<Uuid, _>("group_id")?),
        reference: row.try_get("reference")?,
        amount: Money::from_cents(row.try_get("amount_cents")?),
        verified: row.try_get("verified")?,
        paid_at: row.try_get("paid_at")?,
        refund_requested: row.try_get("refund_requested")?,
        refunded: row.try_get("refunded")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_task(row: &PgRow) -> Result<OutboxTask> {
    let payload_json: serde_json::Value = row.try_get("payload")?;
    Ok(OutboxTask {
        id: row.try_get("id")?,
        payload: serde_json::from_value::<TaskPayload>(payload_json)?,
        attempts: row.try_get("attempts")?,
        status: row.try_get::<String, _>("status")?.parse::<OutboxStatus>()?,
        next_attempt_at: row.try_get("next_attempt_at")?,
        last_error: row.try_get("last_error")?,
        created_at: row.try_get("created_at")?,
    })
}

const ORDER_COLUMNS: &str = "id, group_id, shop_id, status, total_cents, is_paid, paid_at, \
     is_delivered, is_picked_up, delivery_date, created_at, processing_at, shipped_at, \
     completed_at, cancelled_at, restocked_at";

const GROUP_COLUMNS: &str = "id, user_id, ship_recipient, ship_phone, ship_line1, ship_city, \
     ship_region, fulfillment_method, payment_method, status, total_cents, created_at, \
     cancelled_at";

const PAYMENT_COLUMNS: &str =
    "group_id, reference, amount_cents, verified, paid_at, refund_requested, refunded, created_at";

#[async_trait]
impl MarketStore for PostgresStore {
    type Tx = PostgresTx;

    async fn begin(&self) -> Result<PostgresTx> {
        Ok(PostgresTx {
            tx: self.pool.begin().await?,
        })
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<OrderRecord>> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_order).transpose()
    }

    async fn get_order_group(&self, id: OrderGroupId) -> Result<Option<OrderGroupRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {GROUP_COLUMNS} FROM order_groups WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_group).transpose()
    }

    async fn orders_in_group(&self, group_id: OrderGroupId) -> Result<Vec<OrderRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE group_id = $1 ORDER BY id"
        ))
        .bind(group_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_order).collect()
    }

    async fn get_payment_by_reference(&self, reference: &str) -> Result<Option<PaymentRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE reference = $1"
        ))
        .bind(reference)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_payment).transpose()
    }

    async fn stale_unpaid_digital_groups(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<OrderGroupId>> {
        let rows = sqlx::query(
            r#"
            SELECT g.id
            FROM order_groups g
            LEFT JOIN payments p ON p.group_id = g.id
            WHERE g.status = 'pending'
              AND g.payment_method = 'digital'
              AND g.created_at < $1
              AND COALESCE(p.verified, FALSE) = FALSE
            ORDER BY g.created_at
            LIMIT $2
            "#,
        )
        .bind(cutoff)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| Ok(OrderGroupId::from_uuid(row.try_get::<Uuid, _>("id")?)))
            .collect()
    }

    async fn claim_due_tasks(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<OutboxTask>> {
        // SKIP LOCKED lets several dispatcher processes share the queue
        // without claiming the same row twice.
        let rows = sqlx::query(
            r#"
            UPDATE outbox_tasks
            SET attempts = attempts + 1
            WHERE id IN (
                SELECT id FROM outbox_tasks
                WHERE status = 'pending' AND next_attempt_at <= $1
                ORDER BY id
                LIMIT $2
                FOR UPDATE SKIP LOCKED
            )
            RETURNING id, payload, attempts, status, next_attempt_at, last_error, created_at
            "#,
        )
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_task).collect()
    }

    async fn complete_task(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE outbox_tasks SET status = 'done' WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn reschedule_task(
        &self,
        id: i64,
        next_attempt_at: DateTime<Utc>,
        error: &str,
    ) -> Result<()> {
        sqlx::query("UPDATE outbox_tasks SET next_attempt_at = $2, last_error = $3 WHERE id = $1")
            .bind(id)
            .bind(next_attempt_at)
            .bind(error)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn bury_task(&self, id: i64, error: &str) -> Result<()> {
        sqlx::query("UPDATE outbox_tasks SET status = 'dead', last_error = $2 WHERE id = $1")
            .bind(id)
            .bind(error)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// A transaction over the PostgreSQL store.
pub struct PostgresTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PostgresTx {
    async fn get_product(&mut self, id: ProductId) -> Result<Option<ProductRecord>> {
        let row = sqlx::query(
            "SELECT id, shop_id, name, description, price_cents, active FROM products WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;
        row.as_ref().map(row_to_product).transpose()
    }

    async fn lock_stock(&mut self, product_id: ProductId) -> Result<Option<StockRecord>> {
        let row = sqlx::query(
            "SELECT product_id, stock, last_updated_by, updated_at FROM stock_ledger \
             WHERE product_id = $1 FOR UPDATE",
        )
        .bind(product_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;
        row.as_ref().map(row_to_stock).transpose()
    }

    async fn update_stock(&mut self, record: &StockRecord) -> Result<()> {
        sqlx::query(
            "UPDATE stock_ledger SET stock = $2, last_updated_by = $3, updated_at = $4 \
             WHERE product_id = $1",
        )
        .bind(record.product_id.as_uuid())
        .bind(record.stock)
        .bind(&record.last_updated_by)
        .bind(record.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn cart_items(&mut self, user_id: UserId) -> Result<Vec<CartItemRecord>> {
        let rows = sqlx::query(
            "SELECT user_id, product_id, quantity FROM cart_items \
             WHERE user_id = $1 ORDER BY product_id",
        )
        .bind(user_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await?;
        rows.iter().map(row_to_cart_item).collect()
    }

    async fn delete_cart_items(&mut self, user_id: UserId) -> Result<()> {
        sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn get_address(
        &mut self,
        user_id: UserId,
        id: AddressId,
    ) -> Result<Option<AddressRecord>> {
        let row = sqlx::query(
            "SELECT id, user_id, recipient, phone, line1, city, region FROM addresses \
             WHERE id = $1 AND user_id = $2",
        )
        .bind(id.as_uuid())
        .bind(user_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;
        row.as_ref().map(row_to_address).transpose()
    }

    async fn insert_order_group(&mut self, group: &OrderGroupRecord) -> Result<()> {
        let ship = group.shipping_address.as_ref();
        sqlx::query(
            r#"
            INSERT INTO order_groups
                (id, user_id, ship_recipient, ship_phone, ship_line1, ship_city, ship_region,
                 fulfillment_method, payment_method, status, total_cents, created_at, cancelled_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(group.id.as_uuid())
        .bind(group.user_id.as_uuid())
        .bind(ship.map(|s| s.recipient.clone()))
        .bind(ship.map(|s| s.phone.clone()))
        .bind(ship.map(|s| s.line1.clone()))
        .bind(ship.map(|s| s.city.clone()))
        .bind(ship.map(|s| s.region.clone()))
        .bind(group.fulfillment_method.as_str())
        .bind(group.payment_method.as_str())
        .bind(group.status.as_str())
        .bind(group.total.cents())
        .bind(group.created_at)
        .bind(group.cancelled_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn insert_order(&mut self, order: &OrderRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO orders
                (id, group_id, shop_id, status, total_cents, is_paid, paid_at, is_delivered,
                 is_picked_up, delivery_date, created_at, processing_at, shipped_at,
                 completed_at, cancelled_at, restocked_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.group_id.as_uuid())
        .bind(order.shop_id.as_uuid())
        .bind(order.status.as_str())
        .bind(order.total.cents())
        .bind(order.is_paid)
        .bind(order.paid_at)
        .bind(order.is_delivered)
        .bind(order.is_picked_up)
        .bind(order.delivery_date)
        .bind(order.created_at)
        .bind(order.processing_at)
        .bind(order.shipped_at)
        .bind(order.completed_at)
        .bind(order.cancelled_at)
        .bind(order.restocked_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn insert_order_item(&mut self, item: &OrderItemRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO order_items
                (id, order_id, product_id, product_name, product_description, quantity, price_cents)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(item.id)
        .bind(item.order_id.as_uuid())
        .bind(item.product_id.as_uuid())
        .bind(&item.product_name)
        .bind(&item.product_description)
        .bind(item.quantity as i32)
        .bind(item.price.cents())
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn lock_order(&mut self, id: OrderId) -> Result<Option<OrderRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;
        row.as_ref().map(row_to_order).transpose()
    }

    async fn lock_order_group(&mut self, id: OrderGroupId) -> Result<Option<OrderGroupRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {GROUP_COLUMNS} FROM order_groups WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;
        row.as_ref().map(row_to_group).transpose()
    }

    async fn lock_orders_in_group(&mut self, group_id: OrderGroupId) -> Result<Vec<OrderRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE group_id = $1 ORDER BY id FOR UPDATE"
        ))
        .bind(group_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await?;
        rows.iter().map(row_to_order).collect()
    }

    async fn lock_pending_orders_for_user(&mut self, user_id: UserId) -> Result<Vec<OrderRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT o.id, o.group_id, o.shop_id, o.status, o.total_cents, o.is_paid, o.paid_at,
                   o.is_delivered, o.is_picked_up, o.delivery_date, o.created_at, o.processing_at,
                   o.shipped_at, o.completed_at, o.cancelled_at, o.restocked_at
            FROM orders o
            JOIN order_groups g ON g.id = o.group_id
            WHERE g.user_id = $1 AND o.status = 'pending'
            ORDER BY o.id
            FOR UPDATE OF o
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await?;
        rows.iter().map(row_to_order).collect()
    }

    async fn lock_pending_orders_for_shop(&mut self, shop_id: ShopId) -> Result<Vec<OrderRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders \
             WHERE shop_id = $1 AND status = 'pending' ORDER BY id FOR UPDATE"
        ))
        .bind(shop_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await?;
        rows.iter().map(row_to_order).collect()
    }

    async fn update_order(&mut self, order: &OrderRecord) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE orders SET
                status = $2, total_cents = $3, is_paid = $4, paid_at = $5, is_delivered = $6,
                is_picked_up = $7, delivery_date = $8, processing_at = $9, shipped_at = $10,
                completed_at = $11, cancelled_at = $12, restocked_at = $13
            WHERE id = $1
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.status.as_str())
        .bind(order.total.cents())
        .bind(order.is_paid)
        .bind(order.paid_at)
        .bind(order.is_delivered)
        .bind(order.is_picked_up)
        .bind(order.delivery_date)
        .bind(order.processing_at)
        .bind(order.shipped_at)
        .bind(order.completed_at)
        .bind(order.cancelled_at)
        .bind(order.restocked_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn update_order_group(&mut self, group: &OrderGroupRecord) -> Result<()> {
        sqlx::query(
            "UPDATE order_groups SET status = $2, total_cents = $3, cancelled_at = $4 WHERE id = $1",
        )
        .bind(group.id.as_uuid())
        .bind(group.status.as_str())
        .bind(group.total.cents())
        .bind(group.cancelled_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn order_items(&mut self, order_id: OrderId) -> Result<Vec<OrderItemRecord>> {
        let rows = sqlx::query(
            "SELECT id, order_id, product_id, product_name, product_description, quantity, \
             price_cents FROM order_items WHERE order_id = $1 ORDER BY product_id",
        )
        .bind(order_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await?;
        rows.iter().map(row_to_order_item).collect()
    }

    async fn lock_payment_for_group(
        &mut self,
        group_id: OrderGroupId,
    ) -> Result<Option<PaymentRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE group_id = $1 FOR UPDATE"
        ))
        .bind(group_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;
        row.as_ref().map(row_to_payment).transpose()
    }

    async fn lock_payment_by_reference(
        &mut self,
        reference: &str,
    ) -> Result<Option<PaymentRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE reference = $1 FOR UPDATE"
        ))
        .bind(reference)
        .fetch_optional(&mut *self.tx)
        .await?;
        row.as_ref().map(row_to_payment).transpose()
    }

    async fn insert_payment(&mut self, payment: &PaymentRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO payments
                (group_id, reference, amount_cents, verified, paid_at, refund_requested,
                 refunded, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(payment.group_id.as_uuid())
        .bind(&payment.reference)
        .bind(payment.amount.cents())
        .bind(payment.verified)
        .bind(payment.paid_at)
        .bind(payment.refund_requested)
        .bind(payment.refunded)
        .bind(payment.created_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn update_payment(&mut self, payment: &PaymentRecord) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE payments SET
                reference = $2, amount_cents = $3, verified = $4, paid_at = $5,
                refund_requested = $6, refunded = $7
            WHERE group_id = $1
            "#,
        )
        .bind(payment.group_id.as_uuid())
        .bind(&payment.reference)
        .bind(payment.amount.cents())
        .bind(payment.verified)
        .bind(payment.paid_at)
        .bind(payment.refund_requested)
        .bind(payment.refunded)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn enqueue_task(&mut self, payload: &TaskPayload, run_at: DateTime<Utc>) -> Result<()> {
        let payload_json = serde_json::to_value(payload)?;
        sqlx::query(
            "INSERT INTO outbox_tasks (payload, attempts, status, next_attempt_at, created_at) \
             VALUES ($1, 0, 'pending', $2, $3)",
        )
        .bind(payload_json)
        .bind(run_at)
        .bind(Utc::now())
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
