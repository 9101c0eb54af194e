//! Persistence layer for the marketplace backend.
//!
//! The [`MarketStore`] / [`StoreTx`] traits are the seam between the
//! transactional core and the database. Two implementations are provided:
//!
//! - [`PostgresStore`], backed by sqlx with `SELECT ... FOR UPDATE` row
//!   locks and a real transaction per unit of work, and
//! - [`MemoryStore`], which serializes transactions behind a single async
//!   mutex and stages mutations against a copy of the state, giving the
//!   same atomicity and isolation guarantees for tests.
//!
//! Background tasks are delivered through a transactional outbox: the
//! triggering transaction enqueues a [`TaskPayload`] row, and a dispatcher
//! claims and executes rows only after that transaction has committed.

mod error;
mod memory;
mod outbox;
mod postgres;
mod records;
mod store;

pub use error::{Result, StorageError};
pub use memory::{MemoryStore, MemoryTx};
pub use outbox::{OutboxStatus, OutboxTask, TaskPayload};
pub use postgres::{PostgresStore, PostgresTx};
pub use records::{
    AddressRecord, AddressSnapshot, CartItemRecord, OrderGroupRecord, OrderItemRecord,
    OrderRecord, PaymentRecord, ProductRecord, StockRecord,
};
pub use store::{MarketStore, StoreTx};
