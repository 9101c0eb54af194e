//! Payment gateway integration and reconciliation.
//!
//! The gateway's webhook is a hint, never an authority: a signed
//! `charge.success` event only enqueues a verification task, and the task
//! re-queries the gateway's verify endpoint before any financial state
//! changes. Verification is idempotent and safe to retry.

mod error;
pub mod gateway;
pub mod paystack;
mod service;
pub mod webhook;

pub use error::PaymentError;
pub use gateway::{ChargeVerification, InMemoryGateway, InitializedPayment, PaymentGateway};
pub use paystack::PaystackGateway;
pub use service::{PaymentInit, PaymentService, VerifyOutcome};
