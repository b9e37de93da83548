use serde::Serialize;
use utoipa::ToSchema;

use super::{account::Account, profile::MatrimonyProfile};

/// Capability set derived from an account snapshot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Entitlement {
    pub can_browse_listings: bool,
    pub can_create_free_profile: bool,
    pub must_pay_for_profile: bool,
    pub is_blocked: bool,
    pub is_admin: bool,
    /// Only the account's own approval status may be shown.
    pub awaiting_approval: bool,
}

impl Entitlement {
    pub fn can_create_profile(&self) -> bool {
        self.can_create_free_profile || self.must_pay_for_profile
    }
}

/// Rules apply in priority order: suspension, approval, membership.
/// `owned` are the caller's own profiles; only their payment state is read.
pub fn evaluate(account: &Account, owned: &[MatrimonyProfile]) -> Entitlement {
    if account.is_suspended {
        return Entitlement {
            is_blocked: true,
            ..Entitlement::default()
        };
    }

    if !account.is_approved {
        return Entitlement {
            is_admin: account.is_admin,
            awaiting_approval: true,
            ..Entitlement::default()
        };
    }

    let owns_paid_profile = owned
        .iter()
        .any(|profile| account.owns(&profile.owner_id) && profile.is_paid());

    Entitlement {
        can_browse_listings: account.is_member || owns_paid_profile,
        can_create_free_profile: account.is_member,
        must_pay_for_profile: !account.is_member,
        is_blocked: false,
        is_admin: account.is_admin,
        awaiting_approval: false,
    }
}
