use std::sync::Arc;

use axum::body::Bytes;
use tokio::task::JoinHandle;
use tracing::{error, info, info_span, warn, Instrument};

use crate::channel::{line, InboundEvent};
use crate::error::WebhookError;
use crate::service::router::EventRouter;

/// Summary of one webhook delivery, for logs and tests.
#[derive(Debug)]
pub enum Delivery {
    /// Dropped before any event was looked at.
    Rejected(WebhookError),
    Dispatched {
        /// Events handed to the router.
        spawned: usize,
        /// Event types this bot does not handle.
        ignored: usize,
        /// Events that failed validation.
        malformed: usize,
        /// Spawned events whose handling failed or panicked.
        failed: usize,
    },
}

/// Acknowledge-then-process handling of messaging webhooks.
///
/// The HTTP layer calls [`accept`](Self::accept) and answers right away;
/// verification and every event's work happen afterwards on their own tasks.
pub struct Dispatcher {
    channel_secret: String,
    router: Arc<EventRouter>,
}

impl Dispatcher {
    pub fn new(channel_secret: impl Into<String>, router: Arc<EventRouter>) -> Self {
        Self {
            channel_secret: channel_secret.into(),
            router,
        }
    }

    /// Start processing a delivery in the background and return immediately.
    ///
    /// The handle resolves once every event task has finished; callers that
    /// only need fire-and-forget can drop it.
    pub fn accept(self: &Arc<Self>, body: Bytes, signature: Option<String>) -> JoinHandle<Delivery> {
        let this = Arc::clone(self);
        let span = info_span!("line_webhook", delivery = %uuid::Uuid::new_v4());
        tokio::spawn(async move { this.process(&body, signature.as_deref()).await }.instrument(span))
    }

    /// Verify, decode and fan out one delivery.
    pub async fn process(&self, body: &[u8], signature: Option<&str>) -> Delivery {
        let events = match self.authenticate_and_decode(body, signature) {
            Ok(events) => events,
            Err(e) => {
                match &e {
                    WebhookError::Authentication(_) => warn!("Dropping LINE webhook: {}", e),
                    WebhookError::MalformedRequest(_) => error!("Dropping LINE webhook: {}", e),
                }
                return Delivery::Rejected(e);
            }
        };

        info!("LINE webhook accepted: {} bytes, {} events", body.len(), events.len());

        let mut handles = Vec::new();
        let mut ignored = 0;
        let mut malformed = 0;
        for event in events {
            match event {
                Ok(Some(event)) => handles.push(spawn_supervised(Arc::clone(&self.router), event)),
                Ok(None) => ignored += 1,
                Err(e) => {
                    error!("Skipping event: {}", e);
                    malformed += 1;
                }
            }
        }

        let spawned = handles.len();
        let mut failed = 0;
        for handle in handles {
            match handle.await {
                Ok(true) => {}
                Ok(false) => failed += 1,
                Err(e) => {
                    error!("Event task panicked: {}", e);
                    failed += 1;
                }
            }
        }

        Delivery::Dispatched {
            spawned,
            ignored,
            malformed,
            failed,
        }
    }

    fn authenticate_and_decode(
        &self,
        body: &[u8],
        signature: Option<&str>,
    ) -> Result<Vec<Result<Option<InboundEvent>, WebhookError>>, WebhookError> {
        let signature = signature.ok_or_else(|| {
            WebhookError::MalformedRequest("missing x-line-signature header".to_string())
        })?;
        if !line::verify_signature(&self.channel_secret, body, signature) {
            return Err(WebhookError::Authentication(
                "x-line-signature does not match body".to_string(),
            ));
        }
        line::decode_events(body)
    }
}

/// Run one event on its own task behind an error boundary.
///
/// Failures are logged and answered with the fixed apology; nothing escapes
/// to the dispatcher or sibling events. Resolves to whether handling succeeded.
pub fn spawn_supervised(router: Arc<EventRouter>, event: InboundEvent) -> JoinHandle<bool> {
    let span = info_span!("event", user = %event.user_id(), kind = event.kind());
    tokio::spawn(
        async move {
            match router.handle(&event).await {
                Ok(()) => true,
                Err(e) => {
                    error!("Event handling failed: {}", e);
                    router.apologize(&event).await;
                    false
                }
            }
        }
        .instrument(span),
    )
}
