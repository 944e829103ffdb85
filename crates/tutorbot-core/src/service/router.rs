use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info};

use crate::agent::Tutor;
use crate::channel::{InboundEvent, MessageKind, Messenger, OutboundMessage};
use crate::error::Result;
use crate::service::messages;
use crate::service::onboarding;
use crate::service::payment::{self, PaymentGateway};
use crate::store::{OnboardingStatus, PlanStatus, RecordStore, UserPatch, UserRecord};
use crate::util::truncate_utf16;

/// LINE rejects text messages longer than this many UTF-16 units.
pub const MAX_TEXT_UNITS: usize = 5000;

/// What handling one event decided: at most one record write and one reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Routed {
    pub patch: Option<UserPatch>,
    pub replies: Vec<OutboundMessage>,
}

impl Routed {
    fn texts<I>(texts: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Self {
            patch: None,
            replies: texts
                .into_iter()
                .map(|t| OutboundMessage::text(truncate_utf16(&t.into(), MAX_TEXT_UNITS, "…")))
                .collect(),
        }
    }

    fn with_patch(mut self, patch: UserPatch) -> Self {
        self.patch = Some(patch);
        self
    }
}

/// Decides and carries out the response to each inbound event.
pub struct EventRouter {
    store: Arc<dyn RecordStore>,
    messenger: Arc<dyn Messenger>,
    tutor: Arc<Tutor>,
    payments: Arc<dyn PaymentGateway>,
}

impl EventRouter {
    pub fn new(
        store: Arc<dyn RecordStore>,
        messenger: Arc<dyn Messenger>,
        tutor: Arc<Tutor>,
        payments: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            store,
            messenger,
            tutor,
            payments,
        }
    }

    /// Handle one event end to end.
    pub async fn handle(&self, event: &InboundEvent) -> Result<()> {
        self.handle_at(event, Utc::now()).await
    }

    /// Like [`handle`](Self::handle) with an explicit clock.
    pub async fn handle_at(&self, event: &InboundEvent, now: DateTime<Utc>) -> Result<()> {
        let routed = self.route(event, now).await?;

        if let Some(patch) = &routed.patch {
            // A lost write must not cost the student their reply.
            if let Err(e) = self.store.update_user(event.user_id(), patch).await {
                error!("Failed to persist update for {}: {}", event.user_id(), e);
            }
        }

        if !routed.replies.is_empty() {
            self.messenger
                .reply(event.reply_token(), &routed.replies)
                .await?;
        }
        Ok(())
    }

    /// Best-effort apology after a failed event. Never fails.
    pub async fn apologize(&self, event: &InboundEvent) {
        let apology = [OutboundMessage::text(messages::ERROR)];
        if let Err(e) = self.messenger.reply(event.reply_token(), &apology).await {
            error!("Failed to send apology to {}: {}", event.user_id(), e);
        }
    }

    /// Decide the patch and replies for one event, in priority order.
    /// Reads, lookups and completions happen here; writes do not.
    pub async fn route(&self, event: &InboundEvent, now: DateTime<Utc>) -> Result<Routed> {
        let (user_id, message) = match event {
            InboundEvent::Follow { user_id, .. } => return self.follow(user_id).await,
            InboundEvent::Message { user_id, message, .. } => (user_id.as_str(), message),
        };

        let record = self.store.get_user(user_id).await?.unwrap_or_default();
        let text = match message {
            MessageKind::Text { text } => Some(text.as_str()),
            _ => None,
        };
        let keyword = text.map(str::trim);

        if keyword == Some(messages::RESET_KEYWORD) {
            info!("User {} restarted the hearing", user_id);
            return Ok(Routed::texts([messages::ASK_GRADE])
                .with_patch(UserPatch::status(OnboardingStatus::FIRST)));
        }

        if keyword == Some(messages::PAYMENT_KEYWORD) {
            let session = self.payments.create_checkout_session(user_id).await?;
            return Ok(Routed {
                patch: None,
                replies: vec![payment::checkout_reply(&session)],
            });
        }

        if let Some(status) = record.status.filter(|s| s.is_hearing()) {
            return Ok(hearing(user_id, status, &record, text, now));
        }

        if record.status == Some(OnboardingStatus::TrialExpired) {
            if record.plan_status != Some(PlanStatus::Paid) {
                return Ok(Routed::texts([messages::TRIAL_END]));
            }
            // Paid after the trial ran out: serve them and clear the lockout.
            info!("Reinstating paid user {}", user_id);
            let routed = self.converse(user_id, &record, message, keyword).await?;
            return Ok(routed.with_patch(UserPatch::status(OnboardingStatus::Active)));
        }
        if record.status == Some(OnboardingStatus::Active) && record.trial_elapsed(now) {
            info!("Trial ended for {}", user_id);
            return Ok(Routed::texts([messages::TRIAL_END])
                .with_patch(UserPatch::status(OnboardingStatus::TrialExpired)));
        }

        self.converse(user_id, &record, message, keyword).await
    }

    /// Replies for a user past the hearing whose plan lets them in.
    async fn converse(
        &self,
        user_id: &str,
        record: &UserRecord,
        message: &MessageKind,
        keyword: Option<&str>,
    ) -> Result<Routed> {
        let past_hearing = matches!(
            record.status,
            Some(OnboardingStatus::Active | OnboardingStatus::TrialExpired)
        );
        if past_hearing && keyword == Some(messages::AGREE_KEYWORD) {
            return Ok(Routed::texts([messages::ALREADY_AGREED]));
        }

        match message {
            MessageKind::Text { text } => self.answer(record, text).await,
            MessageKind::Image { id } => {
                let url = self.messenger.content_url(id);
                debug!("Explaining image {} for {}", id, user_id);
                let reply = self.tutor.explain_image(record, &url).await?;
                Ok(Routed::texts([reply]))
            }
            MessageKind::Other { kind } => {
                debug!("Unsupported message type from {}: {}", user_id, kind);
                Ok(Routed::texts([messages::UNSUPPORTED_MESSAGE]))
            }
        }
    }

    async fn follow(&self, user_id: &str) -> Result<Routed> {
        let profile = self.messenger.get_profile(user_id).await?;
        info!("New follower {} ({})", user_id, profile.display_name);

        let patch = UserPatch {
            line_id: Some(user_id.to_string()),
            account_name: Some(profile.display_name),
            status: Some(OnboardingStatus::FIRST),
            ..UserPatch::default()
        };
        Ok(Routed::texts([messages::WELCOME, messages::ASK_GRADE]).with_patch(patch))
    }

    /// FAQ first; the tutor only sees questions the FAQ cannot answer.
    async fn answer(&self, record: &UserRecord, text: &str) -> Result<Routed> {
        if let Some(answer) = self.store.get_faq(text).await? {
            debug!("FAQ hit");
            return Ok(Routed::texts([answer]));
        }
        let reply = self.tutor.answer(record, text).await?;
        Ok(Routed::texts([reply]))
    }
}

fn hearing(
    user_id: &str,
    status: OnboardingStatus,
    record: &UserRecord,
    text: Option<&str>,
    now: DateTime<Utc>,
) -> Routed {
    let transition = text.and_then(|t| onboarding::advance(status, record, t, now));
    match transition {
        Some(t) => {
            if let Some(next) = t.patch.as_ref().and_then(|p| p.status) {
                info!("User {} hearing: {} -> {}", user_id, status, next);
            }
            Routed {
                patch: t.patch,
                ..Routed::texts(t.replies)
            }
        }
        None => {
            let mut replies = vec![messages::INVALID_INPUT];
            replies.extend(onboarding::question_for(status));
            Routed::texts(replies)
        }
    }
}
