pub mod sheet;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::StoreError;

/// Length of the free trial that starts when the terms are accepted.
pub const TRIAL_DAYS: i64 = 5;

/// Position of a user in the conversation.
///
/// The `hearing_*` stages are the onboarding questionnaire, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingStatus {
    HearingGrade,
    HearingGender,
    HearingRegion,
    HearingWeakSubject,
    HearingHowKnown,
    HearingTerms,
    Active,
    TrialExpired,
}

impl OnboardingStatus {
    /// Stage every new or reset user starts from.
    pub const FIRST: Self = Self::HearingGrade;

    pub fn is_hearing(self) -> bool {
        !matches!(self, Self::Active | Self::TrialExpired)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::HearingGrade => "hearing_grade",
            Self::HearingGender => "hearing_gender",
            Self::HearingRegion => "hearing_region",
            Self::HearingWeakSubject => "hearing_weak_subject",
            Self::HearingHowKnown => "hearing_how_known",
            Self::HearingTerms => "hearing_terms",
            Self::Active => "active",
            Self::TrialExpired => "trial_expired",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "hearing_grade" => Self::HearingGrade,
            "hearing_gender" => Self::HearingGender,
            "hearing_region" => Self::HearingRegion,
            "hearing_weak_subject" => Self::HearingWeakSubject,
            "hearing_how_known" => Self::HearingHowKnown,
            "hearing_terms" => Self::HearingTerms,
            "active" => Self::Active,
            "trial_expired" => Self::TrialExpired,
            _ => return None,
        })
    }
}

impl std::fmt::Display for OnboardingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Trial,
    Paid,
}

/// A user row as kept by the record store.
///
/// Sheet cells come back as empty strings when unset, so every optional
/// field treats `""` as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserRecord {
    #[serde(deserialize_with = "empty_as_none")]
    pub line_id: Option<String>,
    #[serde(deserialize_with = "empty_as_none")]
    pub account_name: Option<String>,
    #[serde(deserialize_with = "status_or_none")]
    pub status: Option<OnboardingStatus>,
    #[serde(deserialize_with = "empty_as_none")]
    pub grade: Option<String>,
    #[serde(deserialize_with = "empty_as_none")]
    pub gender: Option<String>,
    #[serde(deserialize_with = "empty_as_none")]
    pub region: Option<String>,
    #[serde(deserialize_with = "empty_as_none")]
    pub weak_subject: Option<String>,
    #[serde(deserialize_with = "empty_as_none")]
    pub how_known: Option<String>,
    #[serde(deserialize_with = "plan_or_none")]
    pub plan_status: Option<PlanStatus>,
    #[serde(deserialize_with = "empty_as_none")]
    pub stripe_customer_id: Option<String>,
    #[serde(deserialize_with = "empty_as_none")]
    pub trial_started_at: Option<String>,
}

impl UserRecord {
    /// Merge a patch into this record, the way the store's `updateUser` does.
    pub fn apply(&mut self, patch: &UserPatch) {
        fn merge<T: Clone>(field: &mut Option<T>, value: &Option<T>) {
            if let Some(v) = value {
                *field = Some(v.clone());
            }
        }
        merge(&mut self.line_id, &patch.line_id);
        merge(&mut self.account_name, &patch.account_name);
        merge(&mut self.status, &patch.status);
        merge(&mut self.grade, &patch.grade);
        merge(&mut self.gender, &patch.gender);
        merge(&mut self.region, &patch.region);
        merge(&mut self.weak_subject, &patch.weak_subject);
        merge(&mut self.how_known, &patch.how_known);
        merge(&mut self.plan_status, &patch.plan_status);
        merge(&mut self.stripe_customer_id, &patch.stripe_customer_id);
        merge(&mut self.trial_started_at, &patch.trial_started_at);
    }

    /// Whether a trial user's free window has run out at `now`.
    ///
    /// Paid users and records without a parseable start time never expire.
    pub fn trial_elapsed(&self, now: DateTime<Utc>) -> bool {
        if self.plan_status != Some(PlanStatus::Trial) {
            return false;
        }
        self.trial_started_at
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|start| now >= start.with_timezone(&Utc) + Duration::days(TRIAL_DAYS))
            .unwrap_or(false)
    }
}

/// Partial update of a [`UserRecord`]; only present fields are written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<OnboardingStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grade: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weak_subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub how_known: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_status: Option<PlanStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stripe_customer_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trial_started_at: Option<String>,
}

impl UserPatch {
    pub fn status(status: OnboardingStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// The external spreadsheet-backed store of users and FAQ entries.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch a user; `Ok(None)` when the store has no row for them.
    async fn get_user(&self, user_id: &str) -> Result<Option<UserRecord>, StoreError>;

    /// Merge `patch` into the user's row, creating it if needed.
    async fn update_user(&self, user_id: &str, patch: &UserPatch) -> Result<(), StoreError>;

    /// Exact-match FAQ lookup.
    async fn get_faq(&self, question: &str) -> Result<Option<String>, StoreError>;
}

fn empty_as_none<'de, D>(de: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    // Sheets hand back numbers for numeric-looking cells.
    let value = Option::<serde_json::Value>::deserialize(de)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) if !s.trim().is_empty() => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn status_or_none<'de, D>(de: D) -> Result<Option<OnboardingStatus>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = empty_as_none(de)?;
    Ok(raw.and_then(|s| {
        let parsed = OnboardingStatus::parse(s.trim());
        if parsed.is_none() {
            tracing::warn!("Unknown user status in store: {}", s);
        }
        parsed
    }))
}

fn plan_or_none<'de, D>(de: D) -> Result<Option<PlanStatus>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = empty_as_none(de)?;
    Ok(raw.and_then(|s| match s.trim() {
        "trial" => Some(PlanStatus::Trial),
        "paid" => Some(PlanStatus::Paid),
        _ => None,
    }))
}
