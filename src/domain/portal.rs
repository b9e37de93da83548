use serde::{Deserialize, Serialize};

use super::{
    account::Account,
    checkout::CheckoutCoordinator,
    entitlement::{evaluate, Entitlement},
    gate::Viewer,
    profile::MatrimonyProfile,
};

/// Token for one "open this view" request. A response carrying a ticket whose
/// generation is no longer current belongs to an abandoned view.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewTicket {
    pub generation: u64,
    pub target: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewCursor {
    generation: u64,
    target: Option<String>,
}

/// Per-session application state. The cached account and owned profiles are
/// what the evaluator and the gate read between refreshes.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PortalSession {
    credential: Option<String>,
    account: Option<Account>,
    owned_profiles: Option<Vec<MatrimonyProfile>>,
    pub checkout: CheckoutCoordinator,
    view: ViewCursor,
}

impl PortalSession {
    pub fn signed_in(credential: String, account: Account) -> Self {
        Self {
            credential: Some(credential),
            account: Some(account),
            ..Self::default()
        }
    }

    pub fn credential(&self) -> Option<&str> {
        self.credential.as_deref()
    }

    pub fn account(&self) -> Option<&Account> {
        self.account.as_ref()
    }

    pub fn owned_profiles(&self) -> Option<&[MatrimonyProfile]> {
        self.owned_profiles.as_deref()
    }

    pub fn owned_profile(&self, profile_id: &str) -> Option<&MatrimonyProfile> {
        self.owned_profiles
            .as_deref()
            .and_then(|profiles| profiles.iter().find(|p| p.id == profile_id))
    }

    /// Whether the caches must be refreshed before the gate may trust them.
    pub fn needs_refresh(&self) -> bool {
        self.credential.is_some() && (self.account.is_none() || self.owned_profiles.is_none())
    }

    pub fn entitlement(&self) -> Option<Entitlement> {
        let account = self.account.as_ref()?;
        Some(evaluate(account, self.owned_profiles.as_deref().unwrap_or(&[])))
    }

    pub fn viewer(&self) -> Option<Viewer> {
        let account = self.account.as_ref()?;
        Some(Viewer {
            entitlement: evaluate(account, self.owned_profiles.as_deref().unwrap_or(&[])),
            suspension_reason: account.suspension_reason.clone(),
        })
    }

    pub fn set_account(&mut self, account: Account) {
        self.account = Some(account);
    }

    pub fn set_owned_profiles(&mut self, profiles: Vec<MatrimonyProfile>) {
        self.owned_profiles = Some(profiles);
    }

    /// Replaces or inserts one owned profile after a mutation the session performed.
    pub fn patch_owned_profile(&mut self, profile: MatrimonyProfile) {
        let Some(profiles) = self.owned_profiles.as_mut() else {
            // Unknown cache: the next refresh picks the profile up.
            return;
        };
        let position = profiles.iter().position(|p| p.id == profile.id);
        match position {
            Some(index) if profile.deleted => {
                profiles.remove(index);
            }
            Some(index) => profiles[index] = profile,
            None if !profile.deleted => profiles.push(profile),
            None => {}
        }
    }

    pub fn invalidate_account(&mut self) {
        self.account = None;
    }

    pub fn invalidate_profiles(&mut self) {
        self.owned_profiles = None;
    }

    pub fn begin_view(&mut self, target: impl Into<String>) -> ViewTicket {
        self.view.generation += 1;
        let target = target.into();
        self.view.target = Some(target.clone());
        ViewTicket {
            generation: self.view.generation,
            target,
        }
    }

    pub fn is_current(&self, ticket: &ViewTicket) -> bool {
        self.view.generation == ticket.generation
            && self.view.target.as_deref() == Some(ticket.target.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        account::fixture,
        profile::{self, PaymentStatus},
    };

    #[test]
    fn later_navigation_supersedes_earlier_ticket() {
        let mut session = PortalSession::default();
        let first = session.begin_view("/matrimony/m1");
        let second = session.begin_view("/matrimony/m2");
        assert!(!session.is_current(&first));
        assert!(session.is_current(&second));
    }

    #[test]
    fn patching_owned_profiles_updates_entitlement() {
        let mut session = PortalSession::signed_in("token".to_string(), fixture("a1"));
        assert!(session.needs_refresh());
        session.set_owned_profiles(vec![profile::fixture("m1", "a1", PaymentStatus::Pending)]);
        assert!(!session.needs_refresh());
        assert_eq!(session.entitlement().map(|e| e.can_browse_listings), Some(false));

        let mut paid = profile::fixture("m1", "a1", PaymentStatus::Paid);
        session.patch_owned_profile(paid.clone());
        assert_eq!(session.entitlement().map(|e| e.can_browse_listings), Some(true));

        paid.deleted = true;
        session.patch_owned_profile(paid);
        assert_eq!(session.owned_profiles().map(<[_]>::len), Some(0));
    }

    #[test]
    fn anonymous_session_has_no_viewer() {
        let session = PortalSession::default();
        assert!(session.viewer().is_none());
        assert!(!session.needs_refresh());
    }
}
