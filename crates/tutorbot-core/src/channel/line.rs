use async_trait::async_trait;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use tracing::{debug, error};

use crate::channel::{InboundEvent, MessageKind, Messenger, OutboundMessage, Profile};
use crate::config::LineConfig;
use crate::error::{ChannelError, WebhookError};

const LINE_API_BASE: &str = "https://api.line.me";
const LINE_DATA_API_BASE: &str = "https://api-data.line.me";

/// Maximum number of message objects in one reply.
pub const MAX_REPLY_MESSAGES: usize = 5;

type HmacSha256 = Hmac<Sha256>;

/// Verify a webhook signature: base64 HMAC-SHA256 of the raw body keyed by
/// the channel secret. The comparison runs in constant time.
pub fn verify_signature(channel_secret: &str, body: &[u8], signature: &str) -> bool {
    let Ok(provided) = base64::engine::general_purpose::STANDARD.decode(signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(channel_secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&provided).is_ok()
}

/// Decode a webhook body into events.
///
/// The outer error is for a body that is not a webhook payload at all. Each
/// event is decoded and validated on its own, so one bad event (wrong shape
/// or missing field) does not sink its siblings; `Ok(None)` marks event
/// types this bot does not handle.
pub fn decode_events(
    body: &[u8],
) -> Result<Vec<Result<Option<InboundEvent>, WebhookError>>, WebhookError> {
    let webhook: LineWebhook = serde_json::from_slice(body)
        .map_err(|e| WebhookError::MalformedRequest(format!("invalid webhook body: {e}")))?;
    Ok(webhook.events.into_iter().map(decode_event).collect())
}

fn decode_event(raw: serde_json::Value) -> Result<Option<InboundEvent>, WebhookError> {
    let event: LineEvent = serde_json::from_value(raw)
        .map_err(|e| WebhookError::MalformedRequest(format!("invalid event: {e}")))?;
    event.into_inbound()
}

/// LINE Messaging API client.
pub struct LineClient {
    access_token: String,
    http: reqwest::Client,
}

impl LineClient {
    pub fn new(config: &LineConfig, http: reqwest::Client) -> Self {
        Self {
            access_token: config.channel_access_token.clone(),
            http,
        }
    }
}

#[async_trait]
impl Messenger for LineClient {
    async fn get_profile(&self, user_id: &str) -> Result<Profile, ChannelError> {
        let url = format!(
            "{}/v2/bot/profile/{}",
            LINE_API_BASE,
            urlencoding::encode(user_id)
        );
        let resp = self
            .http
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.access_token))
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            error!("LINE profile API error: {} {}", status, text);
            return Err(ChannelError::Api {
                status: status.as_u16(),
                message: text,
            });
        }

        Ok(resp.json().await?)
    }

    /// Must be called within one minute of receiving the webhook.
    async fn reply(&self, reply_token: &str, messages: &[OutboundMessage]) -> Result<(), ChannelError> {
        if messages.is_empty() || messages.len() > MAX_REPLY_MESSAGES {
            return Err(ChannelError::Send(format!(
                "a reply carries 1..={} messages, got {}",
                MAX_REPLY_MESSAGES,
                messages.len()
            )));
        }

        let body = serde_json::json!({
            "replyToken": reply_token,
            "messages": messages,
        });

        let resp = self
            .http
            .post(format!("{LINE_API_BASE}/v2/bot/message/reply"))
            .header("Authorization", format!("Bearer {}", self.access_token))
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            error!("LINE reply API error: {} {}", status, text);
            return Err(ChannelError::Api {
                status: status.as_u16(),
                message: text,
            });
        }

        debug!("LINE reply sent ({} messages)", messages.len());
        Ok(())
    }

    fn content_url(&self, message_id: &str) -> String {
        message_content_url(LINE_DATA_API_BASE, message_id)
    }
}

/// Content endpoint for a message's binary payload.
pub fn message_content_url(data_api_base: &str, message_id: &str) -> String {
    format!(
        "{}/v2/bot/message/{}/content",
        data_api_base,
        urlencoding::encode(message_id)
    )
}

// ====== LINE Webhook Types ======

#[derive(Debug, Deserialize)]
pub struct LineWebhook {
    #[serde(default)]
    pub destination: Option<String>,
    /// Kept raw so each event is decoded separately.
    #[serde(default)]
    pub events: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub reply_token: Option<String>,
    pub source: Option<LineSource>,
    pub message: Option<LineMessage>,
    pub timestamp: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineSource {
    #[serde(rename = "type")]
    pub source_type: String,
    pub user_id: Option<String>,
    pub group_id: Option<String>,
    pub room_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineMessage {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub msg_type: String,
    pub text: Option<String>,
}

impl LineEvent {
    fn into_inbound(self) -> Result<Option<InboundEvent>, WebhookError> {
        if self.event_type != "message" && self.event_type != "follow" {
            debug!("Ignoring LINE event type: {}", self.event_type);
            return Ok(None);
        }

        let user_id = self
            .source
            .and_then(|s| s.user_id)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| malformed(&self.event_type, "source.userId"))?;
        let reply_token = self
            .reply_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| malformed(&self.event_type, "replyToken"))?;

        if self.event_type == "follow" {
            return Ok(Some(InboundEvent::Follow { user_id, reply_token }));
        }

        let message = self
            .message
            .ok_or_else(|| malformed("message", "message"))?;
        let message = match message.msg_type.as_str() {
            "text" => MessageKind::Text {
                text: message.text.ok_or_else(|| malformed("message", "message.text"))?,
            },
            "image" => MessageKind::Image {
                id: message.id.ok_or_else(|| malformed("message", "message.id"))?,
            },
            other => MessageKind::Other {
                kind: other.to_string(),
            },
        };

        Ok(Some(InboundEvent::Message {
            user_id,
            reply_token,
            message,
        }))
    }
}

fn malformed(event_type: &str, field: &str) -> WebhookError {
    WebhookError::MalformedRequest(format!("{event_type} event without {field}"))
}
