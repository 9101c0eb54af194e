//! Payment gateway trait and in-memory implementation.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::Money;

use crate::error::PaymentError;

/// Result of initializing a hosted checkout session.
#[derive(Debug, Clone)]
pub struct InitializedPayment {
    /// Where to send the customer to complete payment.
    pub authorization_url: String,
}

/// Result of verifying a charge by reference.
#[derive(Debug, Clone)]
pub struct ChargeVerification {
    /// True once the gateway has settled the charge.
    pub success: bool,
    /// Settlement time reported by the gateway.
    pub paid_at: Option<DateTime<Utc>>,
}

/// The hosted payment gateway, reduced to the two calls the core needs.
#[async_trait]
pub trait PaymentGateway: Send + Sync + 'static {
    /// Creates a checkout session for `reference` and returns the URL the
    /// customer pays at.
    async fn initialize(
        &self,
        reference: &str,
        amount: Money,
        email: &str,
        callback_url: &str,
    ) -> Result<InitializedPayment, PaymentError>;

    /// Queries the authoritative state of a charge.
    async fn verify_by_reference(
        &self,
        reference: &str,
    ) -> Result<ChargeVerification, PaymentError>;
}

#[derive(Debug, Default)]
struct InMemoryGatewayState {
    initialized: Vec<(String, i64)>,
    charged: HashSet<String>,
    fail_on_verify: bool,
    fail_on_initialize: bool,
    verify_calls: u32,
}

/// In-memory payment gateway for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryGateway {
    state: Arc<RwLock<InMemoryGatewayState>>,
}

impl InMemoryGateway {
    /// Creates a new in-memory gateway.
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates the customer completing payment for a reference.
    pub fn mark_charged(&self, reference: &str) {
        self.state
            .write()
            .unwrap()
            .charged
            .insert(reference.to_string());
    }

    /// Configures verify calls to fail as if the network were down.
    pub fn set_fail_on_verify(&self, fail: bool) {
        self.state.write().unwrap().fail_on_verify = fail;
    }

    /// Configures initialize calls to fail as if the network were down.
    pub fn set_fail_on_initialize(&self, fail: bool) {
        self.state.write().unwrap().fail_on_initialize = fail;
    }

    /// Returns how many checkout sessions were initialized.
    pub fn initialized_count(&self) -> usize {
        self.state.read().unwrap().initialized.len()
    }

    /// Returns how many verify calls were made.
    pub fn verify_calls(&self) -> u32 {
        self.state.read().unwrap().verify_calls
    }

    /// Returns the most recently initialized reference, if any.
    pub fn last_reference(&self) -> Option<String> {
        self.state
            .read()
            .unwrap()
            .initialized
            .last()
            .map(|(reference, _)| reference.clone())
    }
}

#[async_trait]
impl PaymentGateway for InMemoryGateway {
    async fn initialize(
        &self,
        reference: &str,
        amount: Money,
        _email: &str,
        _callback_url: &str,
    ) -> Result<InitializedPayment, PaymentError> {
        let mut state = self.state.write().unwrap();
        if state.fail_on_initialize {
            return Err(PaymentError::Gateway("connection refused".to_string()));
        }
        state
            .initialized
            .push((reference.to_string(), amount.cents()));
        Ok(InitializedPayment {
            authorization_url: format!("https://checkout.test/{reference}"),
        })
    }

    async fn verify_by_reference(
        &self,
        reference: &str,
    ) -> Result<ChargeVerification, PaymentError> {
        let mut state = self.state.write().unwrap();
        state.verify_calls += 1;
        if state.fail_on_verify {
            return Err(PaymentError::Gateway("connection refused".to_string()));
        }
        let success = state.charged.contains(reference);
        Ok(ChargeVerification {
            success,
            paid_at: success.then(Utc::now),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn verify_reflects_charge_state() {
        let gateway = InMemoryGateway::new();
        let init = gateway
            .initialize("ref-1", Money::from_cents(5000), "a@b.test", "https://cb")
            .await
            .unwrap();
        assert!(init.authorization_url.contains("ref-1"));

        let unpaid = gateway.verify_by_reference("ref-1").await.unwrap();
        assert!(!unpaid.success);

        gateway.mark_charged("ref-1");
        let paid = gateway.verify_by_reference("ref-1").await.unwrap();
        assert!(paid.success);
        assert!(paid.paid_at.is_some());
        assert_eq!(gateway.verify_calls(), 2);
    }

    #[tokio::test]
    async fn failure_knobs_produce_gateway_errors() {
        let gateway = InMemoryGateway::new();
        gateway.set_fail_on_verify(true);
        assert!(matches!(
            gateway.verify_by_reference("ref-1").await,
            Err(PaymentError::Gateway(_))
        ));

        gateway.set_fail_on_initialize(true);
        assert!(matches!(
            gateway
                .initialize("ref-1", Money::from_cents(1), "a@b.test", "https://cb")
                .await,
            Err(PaymentError::Gateway(_))
        ));
        assert_eq!(gateway.initialized_count(), 0);
    }
}
