/// Core error types for tutorbot.
#[derive(Debug, thiserror::Error)]
pub enum BotError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Webhook error: {0}")]
    Webhook(#[from] WebhookError),

    #[error("Record store error: {0}")]
    Store(#[from] StoreError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Missing required settings: {}", .0.join(", "))]
    Missing(Vec<&'static str>),
}

/// Problems with an inbound webhook delivery itself.
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    /// The signature did not match the payload. Expected outcome, not a bug.
    #[error("Signature verification failed: {0}")]
    Authentication(String),

    #[error("Malformed request: {0}")]
    MalformedRequest(String),
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Store returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse store response: {0}")]
    Parse(String),

    #[error("Update rejected for user {0}")]
    Update(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Empty completion")]
    Empty,
}

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("LINE API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Send error: {0}")]
    Send(String),
}

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Stripe API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Checkout session has no URL")]
    MissingUrl,
}

pub type Result<T> = std::result::Result<T, BotError>;
