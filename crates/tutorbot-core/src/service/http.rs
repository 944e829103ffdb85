use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::agent::Tutor;
use crate::channel::line::LineClient;
use crate::config::Config;
use crate::provider;
use crate::service::dispatch::Dispatcher;
use crate::service::payment::{receive_payment_event, PaymentOutcome};
use crate::service::router::EventRouter;
use crate::service::stripe::StripeClient;
use crate::store::sheet::SheetStore;
use crate::store::RecordStore;

/// Webhook bodies are small JSON documents; anything bigger is refused.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Shared application state for the HTTP API.
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub store: Arc<dyn RecordStore>,
    pub stripe_webhook_secret: String,
}

impl AppState {
    /// Wire the production collaborators from config.
    pub fn from_config(config: &Config, http: reqwest::Client) -> Self {
        let store: Arc<dyn RecordStore> = Arc::new(SheetStore::new(&config.store, http.clone()));
        let messenger = Arc::new(LineClient::new(&config.line, http.clone()));
        let provider = Arc::from(provider::create_provider(&config.ai, http.clone()));
        let tutor = Arc::new(Tutor::new(provider, &config.ai));
        let payments = Arc::new(StripeClient::new(&config.stripe, http));

        let router = Arc::new(EventRouter::new(store.clone(), messenger, tutor, payments));
        Self {
            dispatcher: Arc::new(Dispatcher::new(&config.line.channel_secret, router)),
            store,
            stripe_webhook_secret: config.stripe.webhook_secret.clone(),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Create the axum Router with all routes.
///
/// Each webhook route only accepts POST; axum answers other methods with 405.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/webhooks/line", post(handle_line_webhook))
        .route("/webhooks/stripe", post(handle_stripe_webhook))
        .route("/health", get(handle_health))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// POST /webhooks/line: acknowledge first, process afterwards.
async fn handle_line_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let signature = headers
        .get("x-line-signature")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    // Detached: the platform's delivery timeout only covers this response.
    drop(state.dispatcher.accept(body, signature));

    (StatusCode::OK, "OK")
}

/// POST /webhooks/stripe: payment completion.
async fn handle_stripe_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    info!("Stripe webhook received: {} bytes", body.len());

    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok());

    let outcome = receive_payment_event(
        state.store.as_ref(),
        &body,
        signature,
        &state.stripe_webhook_secret,
        chrono::Utc::now().timestamp(),
    )
    .await;

    match outcome {
        Ok(outcome) => {
            if let PaymentOutcome::Upgraded { persisted: false, user_id } = &outcome {
                warn!("Acknowledging Stripe event although {} was not updated", user_id);
            }
            (StatusCode::OK, Json(serde_json::json!({ "received": true }))).into_response()
        }
        Err(e) => {
            warn!("Stripe webhook rejected: {}", e);
            (StatusCode::BAD_REQUEST, format!("Webhook Error: {e}")).into_response()
        }
    }
}

/// GET /health
async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: crate::VERSION.to_string(),
    })
}

/// Bind and serve until the process is stopped.
pub async fn serve(addr: &str, state: Arc<AppState>) -> anyhow::Result<()> {
    let router = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);
    axum::serve(listener, router).await?;
    Ok(())
}
