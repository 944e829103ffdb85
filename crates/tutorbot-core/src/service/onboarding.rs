//! The hearing questionnaire every new student goes through.
//!
//! Stages run strictly in order: grade, gender, region, weak subject, how
//! they found us, terms of service. One accepted answer advances exactly one
//! stage; a rejected answer leaves the status where it was.

use chrono::{DateTime, Utc};

use crate::service::messages;
use crate::store::{OnboardingStatus, PlanStatus, UserPatch, UserRecord};

pub const GRADE_CHOICES: &[&str] = &["小学生", "中学生", "高校生", "大学生", "社会人"];
pub const GENDER_CHOICES: &[&str] = &["男性", "女性", "その他"];

/// Outcome of one answer during the hearing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// Fields to write; `None` when the answer was rejected.
    pub patch: Option<UserPatch>,
    pub replies: Vec<&'static str>,
}

impl Transition {
    fn accept(patch: UserPatch, reply: &'static str) -> Self {
        Self {
            patch: Some(patch),
            replies: vec![reply],
        }
    }

    fn reject(status: OnboardingStatus) -> Self {
        let mut replies = vec![messages::INVALID_INPUT];
        replies.extend(question_for(status));
        Self { patch: None, replies }
    }
}

/// The question pending at `status`, if it is a hearing stage.
pub fn question_for(status: OnboardingStatus) -> Option<&'static str> {
    match status {
        OnboardingStatus::HearingGrade => Some(messages::ASK_GRADE),
        OnboardingStatus::HearingGender => Some(messages::ASK_GENDER),
        OnboardingStatus::HearingRegion => Some(messages::ASK_REGION),
        OnboardingStatus::HearingWeakSubject => Some(messages::ASK_WEAK_SUBJECT),
        OnboardingStatus::HearingHowKnown => Some(messages::ASK_HOW_KNOWN),
        OnboardingStatus::HearingTerms => Some(messages::ASK_TERMS),
        OnboardingStatus::Active | OnboardingStatus::TrialExpired => None,
    }
}

/// Apply one answer at a hearing stage. Returns `None` outside the hearing.
pub fn advance(
    status: OnboardingStatus,
    record: &UserRecord,
    answer: &str,
    now: DateTime<Utc>,
) -> Option<Transition> {
    let answer = answer.trim();

    let transition = match status {
        OnboardingStatus::HearingGrade => match choice(GRADE_CHOICES, answer) {
            Some(grade) => Transition::accept(
                UserPatch {
                    grade: Some(grade.to_string()),
                    status: Some(OnboardingStatus::HearingGender),
                    ..UserPatch::default()
                },
                messages::ASK_GENDER,
            ),
            None => Transition::reject(status),
        },
        OnboardingStatus::HearingGender => match choice(GENDER_CHOICES, answer) {
            Some(gender) => Transition::accept(
                UserPatch {
                    gender: Some(gender.to_string()),
                    status: Some(OnboardingStatus::HearingRegion),
                    ..UserPatch::default()
                },
                messages::ASK_REGION,
            ),
            None => Transition::reject(status),
        },
        OnboardingStatus::HearingRegion if !answer.is_empty() => Transition::accept(
            UserPatch {
                region: Some(answer.to_string()),
                status: Some(OnboardingStatus::HearingWeakSubject),
                ..UserPatch::default()
            },
            messages::ASK_WEAK_SUBJECT,
        ),
        OnboardingStatus::HearingWeakSubject if !answer.is_empty() => Transition::accept(
            UserPatch {
                weak_subject: Some(answer.to_string()),
                status: Some(OnboardingStatus::HearingHowKnown),
                ..UserPatch::default()
            },
            messages::ASK_HOW_KNOWN,
        ),
        OnboardingStatus::HearingHowKnown if !answer.is_empty() => Transition::accept(
            UserPatch {
                how_known: Some(answer.to_string()),
                status: Some(OnboardingStatus::HearingTerms),
                ..UserPatch::default()
            },
            messages::ASK_TERMS,
        ),
        OnboardingStatus::HearingTerms if answer == messages::AGREE_KEYWORD => {
            accept_terms(record, now)
        }
        OnboardingStatus::HearingRegion
        | OnboardingStatus::HearingWeakSubject
        | OnboardingStatus::HearingHowKnown
        | OnboardingStatus::HearingTerms => Transition::reject(status),
        OnboardingStatus::Active | OnboardingStatus::TrialExpired => return None,
    };

    Some(transition)
}

/// First acceptance starts the trial; a re-hearing keeps the existing plan.
fn accept_terms(record: &UserRecord, now: DateTime<Utc>) -> Transition {
    if record.plan_status.is_some() {
        return Transition::accept(
            UserPatch::status(OnboardingStatus::Active),
            messages::REHEARING_COMPLETE,
        );
    }

    Transition::accept(
        UserPatch {
            status: Some(OnboardingStatus::Active),
            plan_status: Some(PlanStatus::Trial),
            trial_started_at: Some(now.to_rfc3339()),
            ..UserPatch::default()
        },
        messages::TERMS_ACCEPTED,
    )
}

fn choice(choices: &[&'static str], answer: &str) -> Option<&'static str> {
    choices.iter().copied().find(|c| *c == answer)
}
