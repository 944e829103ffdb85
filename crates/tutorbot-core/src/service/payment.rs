use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::channel::OutboundMessage;
use crate::error::{PaymentError, WebhookError};
use crate::service::messages;
use crate::service::stripe::{self, StripeEventType};
use crate::store::{PlanStatus, RecordStore, UserPatch};

/// A checkout session created for one upgrade request. Not stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

/// Creates hosted checkout pages for the paid plan.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a subscription checkout tagged with `user_id` as its
    /// correlation reference.
    async fn create_checkout_session(&self, user_id: &str) -> Result<CheckoutSession, PaymentError>;
}

/// Reply carrying a button that opens the checkout page.
pub fn checkout_reply(session: &CheckoutSession) -> OutboundMessage {
    OutboundMessage::link_button(
        messages::UPGRADE_PROMPT,
        messages::UPGRADE_PROMPT,
        messages::UPGRADE_BUTTON_LABEL,
        &session.url,
    )
}

/// What a verified payment webhook led to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    /// Checkout completed for a known user. `persisted` is false when the
    /// store write failed; the delivery is acknowledged either way.
    Upgraded { user_id: String, persisted: bool },
    /// Verified but not acted on (other event types, missing reference).
    Ignored { event_type: String },
}

/// Verify and apply one payment-processor webhook delivery.
///
/// Errors are only returned for deliveries that fail verification or do not
/// parse; store failures are logged and reported in the outcome instead.
pub async fn receive_payment_event(
    store: &dyn RecordStore,
    payload: &[u8],
    signature: Option<&str>,
    webhook_secret: &str,
    now: i64,
) -> Result<PaymentOutcome, WebhookError> {
    let signature = signature.ok_or_else(|| {
        WebhookError::MalformedRequest("missing stripe-signature header".to_string())
    })?;
    stripe::verify_webhook_signature(payload, signature, webhook_secret, now)?;
    let event = stripe::parse_event(payload)?;

    match event.kind() {
        StripeEventType::CheckoutSessionCompleted => {
            let Some(user_id) = event.object_str("client_reference_id") else {
                warn!("Checkout {} completed without client_reference_id", event.id);
                return Ok(PaymentOutcome::Ignored {
                    event_type: event.event_type.clone(),
                });
            };
            let customer_id = event.object_str("customer");
            info!("Checkout completed: user={}, customer={:?}", user_id, customer_id);

            let patch = UserPatch {
                plan_status: Some(PlanStatus::Paid),
                stripe_customer_id: customer_id.map(str::to_string),
                ..UserPatch::default()
            };
            let persisted = match store.update_user(user_id, &patch).await {
                Ok(()) => {
                    info!("User {} upgraded to paid", user_id);
                    true
                }
                Err(e) => {
                    error!("Failed to record payment for {}: {}", user_id, e);
                    false
                }
            };

            Ok(PaymentOutcome::Upgraded {
                user_id: user_id.to_string(),
                persisted,
            })
        }
        other => {
            warn!("Unhandled Stripe event type: {:?}", other);
            Ok(PaymentOutcome::Ignored {
                event_type: event.event_type,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{Action, Template};

    #[test]
    fn test_checkout_reply_links_session() {
        let session = CheckoutSession {
            id: "cs_test_1".to_string(),
            url: "https://checkout.stripe.com/c/pay/cs_test_1".to_string(),
        };
        match checkout_reply(&session) {
            OutboundMessage::Template {
                template: Template::Buttons { actions, .. },
                ..
            } => assert_eq!(
                actions,
                vec![Action::Uri {
                    label: messages::UPGRADE_BUTTON_LABEL.to_string(),
                    uri: session.url.clone(),
                }]
            ),
            other => panic!("unexpected reply: {other:?}"),
        }
    }
}
