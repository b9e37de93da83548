use serde::Serialize;
use utoipa::ToSchema;

use super::entitlement::Entitlement;

pub const LOGIN_PATH: &str = "/login";
pub const HOME_PATH: &str = "/";
pub const MEMBERSHIP_PATH: &str = "/membership";

/// Capabilities a view needs before it may render.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Requirement {
    pub auth: bool,
    pub approval: bool,
    pub member: bool,
    pub admin: bool,
}

impl Requirement {
    pub const PUBLIC: Requirement = Requirement {
        auth: false,
        approval: false,
        member: false,
        admin: false,
    };
    pub const AUTH: Requirement = Requirement {
        auth: true,
        ..Requirement::PUBLIC
    };
    pub const APPROVED: Requirement = Requirement {
        approval: true,
        ..Requirement::AUTH
    };
    pub const MEMBER: Requirement = Requirement {
        member: true,
        ..Requirement::APPROVED
    };
    pub const ADMIN: Requirement = Requirement {
        admin: true,
        ..Requirement::AUTH
    };

    pub fn is_public(&self) -> bool {
        *self == Requirement::PUBLIC
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum InterstitialReason {
    Suspended { reason: Option<String> },
    PendingApproval,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum GateDecision {
    Render,
    Redirect { target: String },
    Interstitial { reason: InterstitialReason },
}

impl GateDecision {
    fn redirect(target: &str) -> Self {
        GateDecision::Redirect {
            target: target.to_string(),
        }
    }
}

/// What the gate knows about the caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Viewer {
    pub entitlement: Entitlement,
    pub suspension_reason: Option<String>,
}

/// Suspension first so a suspended admin sees why, then authentication,
/// approval, and finally membership or admin as the route asks.
pub fn decide(requirement: Requirement, viewer: Option<&Viewer>) -> GateDecision {
    if requirement.is_public() {
        return GateDecision::Render;
    }

    if let Some(viewer) = viewer.filter(|v| v.entitlement.is_blocked) {
        return GateDecision::Interstitial {
            reason: InterstitialReason::Suspended {
                reason: viewer.suspension_reason.clone(),
            },
        };
    }

    let Some(viewer) = viewer else {
        return GateDecision::redirect(LOGIN_PATH);
    };
    let entitlement = &viewer.entitlement;

    if requirement.approval && entitlement.awaiting_approval && !entitlement.is_admin {
        return GateDecision::Interstitial {
            reason: InterstitialReason::PendingApproval,
        };
    }

    if requirement.admin && !entitlement.is_admin {
        return GateDecision::redirect(HOME_PATH);
    }

    if requirement.member && !(entitlement.can_browse_listings || entitlement.is_admin) {
        return GateDecision::redirect(MEMBERSHIP_PATH);
    }

    GateDecision::Render
}

/// Maps SPA paths to their requirements. Longest matching prefix wins;
/// unknown paths are public.
#[derive(Clone, Debug)]
pub struct RouteTable {
    routes: Vec<(&'static str, Requirement)>,
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new(vec![
            ("/profile", Requirement::AUTH),
            ("/membership", Requirement::APPROVED),
            ("/matrimony", Requirement::MEMBER),
            ("/matrimony/create", Requirement::APPROVED),
            ("/matrimony/mine", Requirement::APPROVED),
            ("/matrimony/edit", Requirement::APPROVED),
            ("/admin", Requirement::ADMIN),
        ])
    }
}

impl RouteTable {
    pub fn new(routes: Vec<(&'static str, Requirement)>) -> Self {
        Self { routes }
    }

    pub fn requirement_for(&self, path: &str) -> Requirement {
        let path = path.split(['?', '#']).next().unwrap_or(path);
        let path = path.trim_end_matches('/');
        self.routes
            .iter()
            .filter(|(prefix, _)| {
                path == *prefix
                    || path
                        .strip_prefix(prefix)
                        .is_some_and(|rest| rest.starts_with('/'))
            })
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, requirement)| *requirement)
            .unwrap_or(Requirement::PUBLIC)
    }
}
