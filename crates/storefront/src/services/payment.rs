//! Payment processor client.
//!
//! The processor is an opaque black box: the storefront hands it an order
//! amount (integer minor units) and the payer's contact identity, and later
//! receives a single settlement callback carrying one settlement token. The
//! processor's own UI drives everything in between.

use async_trait::async_trait;
use projecthub_core::{CurrencyCode, Email};
use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::PaymentsConfig;

/// Razorpay Orders API base URL.
const BASE_URL: &str = "https://api.razorpay.com/v1";

/// Errors that can occur when talking to the payment processor.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse a response or build the client.
    #[error("Parse error: {0}")]
    Parse(String),
}

/// The outbound payment handoff.
#[derive(Debug, Clone)]
pub struct PaymentOrder {
    /// Opaque checkout reference, echoed back by the processor.
    pub reference: String,
    /// Order total in integer minor currency units (paise, cents).
    pub amount_minor: i64,
    pub currency: CurrencyCode,
    /// Contact identity for the processor's own checkout UI.
    pub payer_email: Email,
}

/// Seam for the payment handoff.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    /// Register the order with the processor, returning its provider-side
    /// order reference.
    async fn initiate(&self, order: &PaymentOrder) -> Result<String, PaymentError>;
}

/// Razorpay Orders API client.
#[derive(Clone)]
pub struct RazorpayClient {
    client: reqwest::Client,
    key_id: String,
    key_secret: SecretString,
}

#[derive(Serialize)]
struct CreateOrderRequest<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
}

#[derive(Deserialize)]
struct CreateOrderResponse {
    id: String,
}

impl RazorpayClient {
    /// Create a new Razorpay API client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(config: &PaymentsConfig) -> Result<Self, PaymentError> {
        let mut headers = HeaderMap::new();
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            key_id: config.key_id.clone(),
            key_secret: config.key_secret.clone(),
        })
    }
}

#[async_trait]
impl PaymentProcessor for RazorpayClient {
    async fn initiate(&self, order: &PaymentOrder) -> Result<String, PaymentError> {
        let url = format!("{BASE_URL}/orders");
        let body = CreateOrderRequest {
            amount: order.amount_minor,
            currency: order.currency.code(),
            receipt: &order.reference,
        };

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.key_id, Some(self.key_secret.expose_secret()))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(PaymentError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let created: CreateOrderResponse = response
            .json()
            .await
            .map_err(|e| PaymentError::Parse(e.to_string()))?;

        Ok(created.id)
    }
}
