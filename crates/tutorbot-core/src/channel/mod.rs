pub mod line;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ChannelError;

/// One inbound webhook event, validated at the boundary.
///
/// Lives only for a single handling cycle; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// The user added the bot as a friend (or unblocked it).
    Follow { user_id: String, reply_token: String },
    Message {
        user_id: String,
        reply_token: String,
        message: MessageKind,
    },
}

impl InboundEvent {
    pub fn user_id(&self) -> &str {
        match self {
            Self::Follow { user_id, .. } | Self::Message { user_id, .. } => user_id,
        }
    }

    pub fn reply_token(&self) -> &str {
        match self {
            Self::Follow { reply_token, .. } | Self::Message { reply_token, .. } => reply_token,
        }
    }

    /// Short label used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Follow { .. } => "follow",
            Self::Message { message: MessageKind::Text { .. }, .. } => "message/text",
            Self::Message { message: MessageKind::Image { .. }, .. } => "message/image",
            Self::Message { message: MessageKind::Other { .. }, .. } => "message/other",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    Text { text: String },
    Image { id: String },
    /// Stickers, audio, location and the like.
    Other { kind: String },
}

/// A message object sent back through the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum OutboundMessage {
    Text {
        text: String,
    },
    #[serde(rename_all = "camelCase")]
    Template {
        alt_text: String,
        template: Template,
    },
}

impl OutboundMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Buttons template with a single link-opening action.
    pub fn link_button(
        alt_text: impl Into<String>,
        text: impl Into<String>,
        label: impl Into<String>,
        uri: impl Into<String>,
    ) -> Self {
        Self::Template {
            alt_text: alt_text.into(),
            template: Template::Buttons {
                title: None,
                text: text.into(),
                actions: vec![Action::Uri {
                    label: label.into(),
                    uri: uri.into(),
                }],
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Template {
    Buttons {
        #[serde(skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        text: String,
        actions: Vec<Action>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Action {
    Uri { label: String, uri: String },
}

/// Public profile of a platform user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub user_id: String,
    pub display_name: String,
    #[serde(default)]
    pub picture_url: Option<String>,
    #[serde(default)]
    pub status_message: Option<String>,
}

/// Outbound side of the messaging platform.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Fetch the user's public profile.
    async fn get_profile(&self, user_id: &str) -> Result<Profile, ChannelError>;

    /// Reply to an event using its single-use reply token.
    async fn reply(&self, reply_token: &str, messages: &[OutboundMessage]) -> Result<(), ChannelError>;

    /// URL from which the content of an image message can be fetched.
    fn content_url(&self, message_id: &str) -> String;
}
