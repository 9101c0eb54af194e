//! Paystack HTTP client.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::Money;
use serde::Deserialize;

use crate::error::PaymentError;
use crate::gateway::{ChargeVerification, InitializedPayment, PaymentGateway};

const DEFAULT_BASE_URL: &str = "https://api.paystack.co";

/// Outbound calls are bounded so a slow gateway cannot pin a worker.
const GATEWAY_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

/// Paystack-backed [`PaymentGateway`].
#[derive(Clone)]
pub struct PaystackGateway {
    client: reqwest::Client,
    secret_key: String,
    base_url: String,
}

impl PaystackGateway {
    /// Creates a client against the production Paystack API.
    pub fn new(secret_key: impl Into<String>) -> Result<Self, PaymentError> {
        Self::with_base_url(secret_key, DEFAULT_BASE_URL)
    }

    /// Creates a client against a custom base URL (tests, sandboxes).
    pub fn with_base_url(
        secret_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, PaymentError> {
        let client = reqwest::Client::builder()
            .timeout(GATEWAY_TIMEOUT)
            .build()
            .map_err(|e| PaymentError::Gateway(e.to_string()))?;
        Ok(Self {
            client,
            secret_key: secret_key.into(),
            base_url: base_url.into(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    status: bool,
    #[serde(default)]
    message: String,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct InitializeData {
    authorization_url: String,
}

#[derive(Debug, Deserialize)]
struct VerifyData {
    status: String,
    paid_at: Option<DateTime<Utc>>,
}

impl PaystackGateway {
    async fn unwrap_envelope<T>(
        response: reqwest::Response,
    ) -> Result<T, PaymentError>
    where
        T: serde::de::DeserializeOwned,
    {
        let status = response.status();
        if !status.is_success() {
            return Err(PaymentError::Gateway(format!(
                "gateway returned HTTP {status}"
            )));
        }

        let envelope: ApiEnvelope<T> = response
            .json()
            .await
            .map_err(|e| PaymentError::Gateway(e.to_string()))?;
        if !envelope.status {
            return Err(PaymentError::Gateway(envelope.message));
        }
        envelope
            .data
            .ok_or_else(|| PaymentError::Gateway("gateway response had no data".to_string()))
    }
}

#[async_trait]
impl PaymentGateway for PaystackGateway {
    #[tracing::instrument(skip(self, email, callback_url))]
    async fn initialize(
        &self,
        reference: &str,
        amount: Money,
        email: &str,
        callback_url: &str,
    ) -> Result<InitializedPayment, PaymentError> {
        let response = self
            .client
            .post(format!("{}/transaction/initialize", self.base_url))
            .bearer_auth(&self.secret_key)
            .json(&serde_json::json!({
                "reference": reference,
                "amount": amount.cents(),
                "email": email,
                "callback_url": callback_url,
            }))
            .send()
            .await
            .map_err(|e| PaymentError::Gateway(e.to_string()))?;

        let data: InitializeData = Self::unwrap_envelope(response).await?;
        Ok(InitializedPayment {
            authorization_url: data.authorization_url,
        })
    }

    #[tracing::instrument(skip(self))]
    async fn verify_by_reference(
        &self,
        reference: &str,
    ) -> Result<ChargeVerification, PaymentError> {
        let response = self
            .client
            .get(format!(
                "{}/transaction/verify/{reference}",
                self.base_url
            ))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| PaymentError::Gateway(e.to_string()))?;

        let data: VerifyData = Self::unwrap_envelope(response).await?;
        Ok(ChargeVerification {
            success: data.status == "success",
            paid_at: data.paid_at,
        })
    }
}
