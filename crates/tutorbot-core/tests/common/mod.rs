//! In-memory collaborators shared by the integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tokio::sync::watch;

use tutorbot_core::agent::Tutor;
use tutorbot_core::channel::{InboundEvent, MessageKind, Messenger, OutboundMessage, Profile};
use tutorbot_core::config::AiConfig;
use tutorbot_core::error::{ChannelError, PaymentError, ProviderError, StoreError};
use tutorbot_core::provider::LlmProvider;
use tutorbot_core::service::dispatch::Dispatcher;
use tutorbot_core::service::payment::{CheckoutSession, PaymentGateway};
use tutorbot_core::service::router::EventRouter;
use tutorbot_core::store::{RecordStore, UserPatch, UserRecord};
use tutorbot_core::types::{CompletionResponse, FinishReason, Message, TokenUsage};

pub const CHANNEL_SECRET: &str = "test-channel-secret";
pub const STRIPE_SECRET: &str = "whsec_test_secret";

/// `x-line-signature` for `body`: base64 HMAC-SHA256 keyed by the channel secret.
pub fn line_signature(channel_secret: &str, body: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(channel_secret.as_bytes()).unwrap();
    mac.update(body);
    base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes())
}

/// `stripe-signature` for `payload` signed at `timestamp`.
pub fn stripe_signature(payload: &[u8], webhook_secret: &str, timestamp: i64) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(webhook_secret.as_bytes()).unwrap();
    mac.update(format!("{timestamp}.").as_bytes());
    mac.update(payload);
    format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
}

/// Ordered log of every outbound call, across all doubles.
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

// ---------------------------------------------------------------------------

pub struct MemoryStore {
    log: CallLog,
    users: Mutex<HashMap<String, UserRecord>>,
    faq: Mutex<HashMap<String, String>>,
    updates: Mutex<Vec<(String, UserPatch)>>,
    fail_updates: AtomicBool,
    gate: watch::Sender<bool>,
}

impl MemoryStore {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            users: Mutex::new(HashMap::new()),
            faq: Mutex::new(HashMap::new()),
            updates: Mutex::new(Vec::new()),
            fail_updates: AtomicBool::new(false),
            gate: watch::channel(true).0,
        }
    }

    pub fn insert_user(&self, user_id: &str, record: UserRecord) {
        self.users.lock().unwrap().insert(user_id.to_string(), record);
    }

    pub fn insert_faq(&self, question: &str, answer: &str) {
        self.faq
            .lock()
            .unwrap()
            .insert(question.to_string(), answer.to_string());
    }

    pub fn user(&self, user_id: &str) -> Option<UserRecord> {
        self.users.lock().unwrap().get(user_id).cloned()
    }

    pub fn updates(&self) -> Vec<(String, UserPatch)> {
        self.updates.lock().unwrap().clone()
    }

    pub fn fail_updates(&self) {
        self.fail_updates.store(true, Ordering::SeqCst);
    }

    /// Hold every read until [`open`](Self::open) is called.
    pub fn close(&self) {
        self.gate.send_replace(false);
    }

    pub fn open(&self) {
        self.gate.send_replace(true);
    }

    async fn wait_open(&self) {
        let mut rx = self.gate.subscribe();
        let _ = rx.wait_for(|open| *open).await;
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get_user(&self, user_id: &str) -> Result<Option<UserRecord>, StoreError> {
        self.wait_open().await;
        self.log.push(format!("store.get_user:{user_id}"));
        Ok(self.user(user_id))
    }

    async fn update_user(&self, user_id: &str, patch: &UserPatch) -> Result<(), StoreError> {
        self.log.push(format!("store.update_user:{user_id}"));
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(StoreError::Update(user_id.to_string()));
        }
        self.updates
            .lock()
            .unwrap()
            .push((user_id.to_string(), patch.clone()));
        self.users
            .lock()
            .unwrap()
            .entry(user_id.to_string())
            .or_default()
            .apply(patch);
        Ok(())
    }

    async fn get_faq(&self, question: &str) -> Result<Option<String>, StoreError> {
        self.wait_open().await;
        self.log.push("store.get_faq");
        Ok(self.faq.lock().unwrap().get(question).cloned())
    }
}

// ---------------------------------------------------------------------------

pub struct RecordingMessenger {
    log: CallLog,
    replies: Mutex<Vec<(String, Vec<OutboundMessage>)>>,
    display_name: String,
    fail_replies: AtomicBool,
}

impl RecordingMessenger {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            replies: Mutex::new(Vec::new()),
            display_name: "テスト太郎".to_string(),
            fail_replies: AtomicBool::new(false),
        }
    }

    pub fn replies(&self) -> Vec<(String, Vec<OutboundMessage>)> {
        self.replies.lock().unwrap().clone()
    }

    /// Texts of every reply sent, flattened in order.
    pub fn texts(&self) -> Vec<String> {
        self.replies()
            .into_iter()
            .flat_map(|(_, messages)| messages)
            .filter_map(|m| match m {
                OutboundMessage::Text { text } => Some(text),
                OutboundMessage::Template { .. } => None,
            })
            .collect()
    }

    pub fn fail_replies(&self) {
        self.fail_replies.store(true, Ordering::SeqCst);
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Wait until at least `n` replies were sent, or give up after 2s.
    pub async fn wait_for_replies(&self, n: usize) -> Vec<(String, Vec<OutboundMessage>)> {
        for _ in 0..200 {
            if self.replies.lock().unwrap().len() >= n {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.replies()
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn get_profile(&self, user_id: &str) -> Result<Profile, ChannelError> {
        self.log.push(format!("line.get_profile:{user_id}"));
        Ok(Profile {
            user_id: user_id.to_string(),
            display_name: self.display_name.clone(),
            picture_url: None,
            status_message: None,
        })
    }

    async fn reply(&self, reply_token: &str, messages: &[OutboundMessage]) -> Result<(), ChannelError> {
        self.log.push(format!("line.reply:{reply_token}"));
        if self.fail_replies.load(Ordering::SeqCst) {
            return Err(ChannelError::Send("reply token expired".to_string()));
        }
        self.replies
            .lock()
            .unwrap()
            .push((reply_token.to_string(), messages.to_vec()));
        Ok(())
    }

    fn content_url(&self, message_id: &str) -> String {
        format!("https://content.test/{message_id}")
    }
}

// ---------------------------------------------------------------------------

pub struct FakeLlm {
    log: CallLog,
    calls: Mutex<Vec<Vec<Message>>>,
    reply: String,
    fail: AtomicBool,
}

impl FakeLlm {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            calls: Mutex::new(Vec::new()),
            reply: "AIの回答です".to_string(),
            fail: AtomicBool::new(false),
        }
    }

    pub fn calls(&self) -> Vec<Vec<Message>> {
        self.calls.lock().unwrap().clone()
    }

    pub fn reply(&self) -> &str {
        &self.reply
    }

    pub fn fail(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl LlmProvider for FakeLlm {
    async fn chat(
        &self,
        messages: &[Message],
        _model: &str,
        _max_tokens: u32,
        _temperature: f64,
    ) -> Result<CompletionResponse, ProviderError> {
        self.log.push("llm.chat");
        self.calls.lock().unwrap().push(messages.to_vec());
        if self.fail.load(Ordering::SeqCst) {
            return Err(ProviderError::Api {
                status: 500,
                message: "upstream unavailable".to_string(),
            });
        }
        Ok(CompletionResponse {
            content: Some(self.reply.clone()),
            finish_reason: FinishReason::Stop,
            usage: TokenUsage::default(),
        })
    }

    fn default_model(&self) -> &str {
        "fake-model"
    }
}

// ---------------------------------------------------------------------------

pub struct FakeGateway {
    log: CallLog,
    fail: AtomicBool,
}

impl FakeGateway {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            fail: AtomicBool::new(false),
        }
    }

    pub fn fail(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_checkout_session(&self, user_id: &str) -> Result<CheckoutSession, PaymentError> {
        self.log.push(format!("stripe.checkout:{user_id}"));
        if self.fail.load(Ordering::SeqCst) {
            return Err(PaymentError::MissingUrl);
        }
        Ok(CheckoutSession {
            id: "cs_test_1".to_string(),
            url: format!("https://checkout.test/{user_id}"),
        })
    }
}

// ---------------------------------------------------------------------------

/// A router wired to in-memory doubles.
pub struct Harness {
    pub log: CallLog,
    pub store: Arc<MemoryStore>,
    pub messenger: Arc<RecordingMessenger>,
    pub llm: Arc<FakeLlm>,
    pub payments: Arc<FakeGateway>,
    pub router: Arc<EventRouter>,
}

impl Harness {
    pub fn new() -> Self {
        let log = CallLog::default();
        let store = Arc::new(MemoryStore::new(log.clone()));
        let messenger = Arc::new(RecordingMessenger::new(log.clone()));
        let llm = Arc::new(FakeLlm::new(log.clone()));
        let payments = Arc::new(FakeGateway::new(log.clone()));
        let tutor = Arc::new(Tutor::new(llm.clone(), &AiConfig::default()));
        let router = Arc::new(EventRouter::new(
            store.clone(),
            messenger.clone(),
            tutor,
            payments.clone(),
        ));
        Self {
            log,
            store,
            messenger,
            llm,
            payments,
            router,
        }
    }

    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        Arc::new(Dispatcher::new(CHANNEL_SECRET, self.router.clone()))
    }
}

pub fn text_event(user_id: &str, text: &str) -> InboundEvent {
    InboundEvent::Message {
        user_id: user_id.to_string(),
        reply_token: format!("rt-{user_id}"),
        message: MessageKind::Text {
            text: text.to_string(),
        },
    }
}

pub fn follow_event(user_id: &str) -> InboundEvent {
    InboundEvent::Follow {
        user_id: user_id.to_string(),
        reply_token: format!("rt-{user_id}"),
    }
}

/// A LINE webhook body carrying one text message per `(user, text)` pair.
pub fn line_body(messages: &[(&str, &str)]) -> String {
    let events: Vec<serde_json::Value> = messages
        .iter()
        .enumerate()
        .map(|(i, (user_id, text))| {
            serde_json::json!({
                "type": "message",
                "replyToken": format!("rt-{i}"),
                "source": { "type": "user", "userId": user_id },
                "timestamp": 1_760_000_000_000u64,
                "message": { "id": format!("m{i}"), "type": "text", "text": text }
            })
        })
        .collect();
    serde_json::json!({ "destination": "Ubot", "events": events }).to_string()
}
