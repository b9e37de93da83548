use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use thiserror::Error;

use super::{
    account::Account,
    entitlement::Entitlement,
    profile::{MatrimonyProfile, PaymentStatus, PhotoError, PhotoSet, ProfileChanges, ProfileState},
    wizard::{FieldError, NewProfile, ProfileDraft},
};

/// Grace period between "mark completed" and upstream hard deletion.
pub const DELETION_GRACE_DAYS: i64 = 14;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileAction {
    CompletePayment,
    Hide,
    Unhide,
    MarkCompleted,
    Edit,
    Delete,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Actor {
    Owner,
    Admin,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ProfileEvent {
    PaymentVerified,
    Hide,
    Unhide,
    MarkCompleted { now: DateTime<Utc> },
    Edit(ProfileChanges),
    Delete,
}

impl ProfileEvent {
    pub fn action(&self) -> ProfileAction {
        match self {
            ProfileEvent::PaymentVerified => ProfileAction::CompletePayment,
            ProfileEvent::Hide => ProfileAction::Hide,
            ProfileEvent::Unhide => ProfileAction::Unhide,
            ProfileEvent::MarkCompleted { .. } => ProfileAction::MarkCompleted,
            ProfileEvent::Edit(_) => ProfileAction::Edit,
            ProfileEvent::Delete => ProfileAction::Delete,
        }
    }

    /// Hide when visible, unhide when hidden.
    pub fn toggle_visibility(profile: &MatrimonyProfile) -> Self {
        if profile.is_hidden {
            ProfileEvent::Unhide
        } else {
            ProfileEvent::Hide
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum LifecycleError {
    #[error("cannot {action:?} a profile in state {state:?}")]
    NotAllowed {
        action: ProfileAction,
        state: ProfileState,
    },
    #[error("only an administrator may {0:?} a profile")]
    AdminOnly(ProfileAction),
    #[error("account is not entitled to create a profile")]
    NotEntitled,
    #[error("profile draft is incomplete")]
    Invalid(Vec<FieldError>),
    #[error(transparent)]
    Photos(#[from] PhotoError),
}

pub fn ensure_allowed(state: ProfileState, action: ProfileAction) -> Result<(), LifecycleError> {
    use ProfileState::*;

    let allowed = match action {
        ProfileAction::CompletePayment => state == PendingPayment,
        ProfileAction::Hide => state == Active,
        ProfileAction::Unhide => state == Hidden,
        ProfileAction::MarkCompleted => matches!(state, Active | Hidden),
        ProfileAction::Edit | ProfileAction::Delete => !state.is_terminal(),
    };

    if allowed {
        Ok(())
    } else {
        Err(LifecycleError::NotAllowed { action, state })
    }
}

fn ensure_actor(actor: Actor, action: ProfileAction) -> Result<(), LifecycleError> {
    match (actor, action) {
        (Actor::Owner, ProfileAction::MarkCompleted) => Err(LifecycleError::AdminOnly(action)),
        _ => Ok(()),
    }
}

/// Table check against the profile itself. A profile upstream hid while it
/// still awaits payment reports `PendingPayment`, yet may be made visible again.
fn ensure_allowed_for(profile: &MatrimonyProfile, action: ProfileAction) -> Result<(), LifecycleError> {
    let state = profile.state();
    if action == ProfileAction::Unhide && profile.is_hidden && state == ProfileState::PendingPayment {
        return Ok(());
    }
    ensure_allowed(state, action)
}

/// Applies `event` to `profile` in place after checking the transition table.
pub fn transition(
    profile: &mut MatrimonyProfile,
    actor: Actor,
    event: ProfileEvent,
) -> Result<(), LifecycleError> {
    let action = event.action();
    ensure_actor(actor, action)?;
    ensure_allowed_for(profile, action)?;

    match event {
        ProfileEvent::PaymentVerified => profile.payment = PaymentStatus::Paid,
        ProfileEvent::Hide => profile.is_hidden = true,
        ProfileEvent::Unhide => profile.is_hidden = false,
        ProfileEvent::MarkCompleted { now } => {
            profile.scheduled_deletion = Some(now + Duration::days(DELETION_GRACE_DAYS));
            profile.is_hidden = true;
        }
        ProfileEvent::Edit(changes) => {
            if let Some(photos) = &changes.photos {
                profile.photos = PhotoSet::new(photos.clone())?;
            }
            changes.apply_to(&mut profile.details);
        }
        ProfileEvent::Delete => profile.deleted = true,
    }
    Ok(())
}

/// A validated draft plus the payment requirement frozen at submission.
#[derive(Clone, Debug, PartialEq)]
pub struct Submission {
    pub profile: NewProfile,
    pub payment_required: bool,
}

impl Submission {
    pub fn initial_state(&self) -> ProfileState {
        if self.payment_required {
            ProfileState::PendingPayment
        } else {
            ProfileState::Active
        }
    }
}

/// Draft -> PendingPayment | Active. `payment_required` is computed here, once,
/// from the owner's membership at submission time.
pub fn submit(
    owner: &Account,
    entitlement: &Entitlement,
    draft: &ProfileDraft,
    today: NaiveDate,
) -> Result<Submission, LifecycleError> {
    if entitlement.is_blocked || !entitlement.can_create_profile() {
        return Err(LifecycleError::NotEntitled);
    }
    let profile = draft.validate(today).map_err(LifecycleError::Invalid)?;

    Ok(Submission {
        profile,
        payment_required: !owner.is_member,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        account::fixture,
        entitlement::evaluate,
        profile::{self, Photo},
        wizard::complete_draft,
    };

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 15).expect("date")
    }

    #[test]
    fn non_member_submission_requires_payment() {
        let owner = fixture("a1");
        let submission =
            submit(&owner, &evaluate(&owner, &[]), &complete_draft(), today()).expect("submit");
        assert!(submission.payment_required);
        assert_eq!(submission.initial_state(), ProfileState::PendingPayment);
    }

    #[test]
    fn member_submission_is_active_immediately() {
        let mut owner = fixture("a1");
        owner.is_member = true;
        let submission =
            submit(&owner, &evaluate(&owner, &[]), &complete_draft(), today()).expect("submit");
        assert!(!submission.payment_required);
        assert_eq!(submission.initial_state(), ProfileState::Active);
    }

    #[test]
    fn unapproved_owner_cannot_submit() {
        let mut owner = fixture("a1");
        owner.is_approved = false;
        let result = submit(&owner, &evaluate(&owner, &[]), &complete_draft(), today());
        assert_eq!(result, Err(LifecycleError::NotEntitled));
    }

    #[test]
    fn invalid_draft_never_reaches_submission() {
        let owner = fixture("a1");
        let mut draft = complete_draft();
        draft.photos.clear();
        let result = submit(&owner, &evaluate(&owner, &[]), &draft, today());
        assert!(matches!(result, Err(LifecycleError::Invalid(_))));
    }

    #[test]
    fn toggle_visibility_twice_restores_original() {
        let mut profile = profile::fixture("m1", "a1", PaymentStatus::NotRequired);
        let original = profile.is_hidden;
        for _ in 0..2 {
            let event = ProfileEvent::toggle_visibility(&profile);
            transition(&mut profile, Actor::Owner, event).expect("toggle");
        }
        assert_eq!(profile.is_hidden, original);
    }

    #[test]
    fn pending_payment_cannot_be_hidden() {
        let mut profile = profile::fixture("m1", "a1", PaymentStatus::Pending);
        let result = transition(&mut profile, Actor::Admin, ProfileEvent::Hide);
        assert_eq!(
            result,
            Err(LifecycleError::NotAllowed {
                action: ProfileAction::Hide,
                state: ProfileState::PendingPayment,
            })
        );
    }

    #[test]
    fn hidden_profile_awaiting_payment_can_be_unhidden() {
        let mut profile = profile::fixture("m1", "a1", PaymentStatus::Pending);
        profile.is_hidden = true;
        assert_eq!(profile.state(), ProfileState::PendingPayment);

        let event = ProfileEvent::toggle_visibility(&profile);
        assert_eq!(event, ProfileEvent::Unhide);
        transition(&mut profile, Actor::Owner, event).expect("unhide");
        assert!(!profile.is_hidden);
        assert_eq!(profile.state(), ProfileState::PendingPayment);
        assert!(!profile.is_publicly_listed());

        // Still not hideable until paid.
        assert!(transition(&mut profile, Actor::Owner, ProfileEvent::Hide).is_err());
    }

    #[test]
    fn payment_moves_pending_to_active_once() {
        let mut profile = profile::fixture("m1", "a1", PaymentStatus::Pending);
        transition(&mut profile, Actor::Owner, ProfileEvent::PaymentVerified).expect("pay");
        assert_eq!(profile.state(), ProfileState::Active);
        assert!(profile.is_paid());
        assert!(profile.payment_required());

        let again = transition(&mut profile, Actor::Owner, ProfileEvent::PaymentVerified);
        assert!(matches!(again, Err(LifecycleError::NotAllowed { .. })));
    }

    #[test]
    fn mark_completed_schedules_deletion_and_hides() {
        let now = Utc::now();
        let mut profile = profile::fixture("m1", "a1", PaymentStatus::Paid);
        let event = ProfileEvent::MarkCompleted { now };

        assert_eq!(
            transition(&mut profile.clone(), Actor::Owner, event.clone()),
            Err(LifecycleError::AdminOnly(ProfileAction::MarkCompleted))
        );

        transition(&mut profile, Actor::Admin, event).expect("complete");
        assert!(profile.is_hidden);
        assert_eq!(
            profile.scheduled_deletion,
            Some(now + Duration::days(DELETION_GRACE_DAYS))
        );
        assert_eq!(profile.state(), ProfileState::ScheduledForDeletion);
        assert!(!profile.is_publicly_listed());

        // Irreversible: no unhide, no second completion.
        assert!(transition(&mut profile, Actor::Admin, ProfileEvent::Unhide).is_err());
        assert!(transition(&mut profile, Actor::Admin, ProfileEvent::MarkCompleted { now }).is_err());
    }

    #[test]
    fn edits_keep_payment_flags_and_are_refused_after_deletion() {
        let mut profile = profile::fixture("m1", "a1", PaymentStatus::Pending);
        let changes = ProfileChanges {
            city: Some("Kochi".to_string()),
            photos: Some(vec![Photo {
                url: "https://media.example.org/new.jpg".to_string(),
                storage_id: "new".to_string(),
                is_primary: true,
            }]),
            ..Default::default()
        };
        transition(&mut profile, Actor::Owner, ProfileEvent::Edit(changes.clone())).expect("edit");
        assert_eq!(profile.details.city.as_deref(), Some("Kochi"));
        assert_eq!(profile.payment, PaymentStatus::Pending);
        assert_eq!(profile.photos.len(), 1);

        transition(&mut profile, Actor::Owner, ProfileEvent::Delete).expect("delete");
        assert_eq!(profile.state(), ProfileState::Deleted);
        assert!(transition(&mut profile, Actor::Owner, ProfileEvent::Edit(changes)).is_err());
        assert!(transition(&mut profile, Actor::Admin, ProfileEvent::Delete).is_err());
    }
}
