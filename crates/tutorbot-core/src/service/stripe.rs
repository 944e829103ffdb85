use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use tracing::{debug, error, info};

use crate::config::StripeConfig;
use crate::error::{PaymentError, WebhookError};
use crate::service::payment::{CheckoutSession, PaymentGateway};

const STRIPE_API_BASE: &str = "https://api.stripe.com";

/// Maximum age of a signed webhook before it is treated as a replay.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

type HmacSha256 = Hmac<Sha256>;

/// Stripe webhook event types we handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StripeEventType {
    CheckoutSessionCompleted,
    Unknown(String),
}

impl From<&str> for StripeEventType {
    fn from(s: &str) -> Self {
        match s {
            "checkout.session.completed" => Self::CheckoutSessionCompleted,
            other => Self::Unknown(other.to_string()),
        }
    }
}

/// The envelope every Stripe webhook delivery shares.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeEvent {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

impl StripeEvent {
    pub fn kind(&self) -> StripeEventType {
        StripeEventType::from(self.event_type.as_str())
    }

    /// String field of `data.object`, if present and non-empty.
    pub fn object_str(&self, field: &str) -> Option<&str> {
        self.data
            .object
            .get(field)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
    }
}

/// Parse a webhook payload after its signature has been checked.
pub fn parse_event(payload: &[u8]) -> Result<StripeEvent, WebhookError> {
    serde_json::from_slice(payload)
        .map_err(|e| WebhookError::MalformedRequest(format!("invalid event payload: {e}")))
}

/// Verify a `Stripe-Signature` header (`t=<unix>,v1=<hex>[,v1=<hex>…]`).
///
/// The signed payload is `"{t}.{raw body}"`; it must be the exact bytes
/// received, never a re-serialized body. Any matching `v1` entry passes,
/// which covers secret rotation. `now` is the current unix time.
pub fn verify_webhook_signature(
    payload: &[u8],
    header: &str,
    webhook_secret: &str,
    now: i64,
) -> Result<(), WebhookError> {
    let mut timestamp = None;
    let mut candidates = Vec::new();
    for (key, value) in header.split(',').filter_map(|part| part.trim().split_once('=')) {
        match key {
            "t" => timestamp = Some(value),
            "v1" => candidates.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp
        .ok_or_else(|| WebhookError::MalformedRequest("signature header has no timestamp".to_string()))?;
    if candidates.is_empty() {
        return Err(WebhookError::MalformedRequest(
            "signature header has no v1 signature".to_string(),
        ));
    }

    let signed_at: i64 = timestamp
        .parse()
        .map_err(|_| WebhookError::MalformedRequest("signature timestamp is not a number".to_string()))?;
    if (now - signed_at).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err(WebhookError::Authentication(
            "timestamp outside the tolerance zone".to_string(),
        ));
    }

    let mut mac = HmacSha256::new_from_slice(webhook_secret.as_bytes())
        .map_err(|_| WebhookError::Authentication("invalid webhook secret".to_string()))?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);

    let matched = candidates.iter().any(|candidate| {
        hex::decode(candidate)
            .map(|expected| mac.clone().verify_slice(&expected).is_ok())
            .unwrap_or(false)
    });

    if matched {
        Ok(())
    } else {
        Err(WebhookError::Authentication(
            "no signatures found matching the expected signature for payload".to_string(),
        ))
    }
}

/// Checkout Sessions API client.
pub struct StripeClient {
    secret_key: String,
    price_id: String,
    success_url: String,
    cancel_url: String,
    http: reqwest::Client,
}

impl StripeClient {
    pub fn new(config: &StripeConfig, http: reqwest::Client) -> Self {
        Self {
            secret_key: config.secret_key.clone(),
            price_id: config.price_id.clone(),
            success_url: config.success_url.clone(),
            cancel_url: config.cancel_url.clone(),
            http,
        }
    }

    /// Form fields for a one-price subscription checkout.
    fn session_form<'a>(&'a self, user_id: &'a str) -> Vec<(&'static str, &'a str)> {
        vec![
            ("mode", "subscription"),
            ("payment_method_types[0]", "card"),
            ("line_items[0][price]", self.price_id.as_str()),
            ("line_items[0][quantity]", "1"),
            ("success_url", self.success_url.as_str()),
            ("cancel_url", self.cancel_url.as_str()),
            ("client_reference_id", user_id),
        ]
    }
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    id: String,
    url: Option<String>,
}

#[async_trait]
impl PaymentGateway for StripeClient {
    async fn create_checkout_session(&self, user_id: &str) -> Result<CheckoutSession, PaymentError> {
        debug!("Creating checkout session for {}", user_id);

        let resp = self
            .http
            .post(format!("{STRIPE_API_BASE}/v1/checkout/sessions"))
            .bearer_auth(&self.secret_key)
            .form(&self.session_form(user_id))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            error!("Stripe checkout API error: {} {}", status, text);
            return Err(PaymentError::Api {
                status: status.as_u16(),
                message: text,
            });
        }

        let session: SessionResponse = resp.json().await?;
        let url = session.url.ok_or(PaymentError::MissingUrl)?;
        info!("Checkout session {} created for {}", session.id, user_id);

        Ok(CheckoutSession { id: session.id, url })
    }
}
