use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::{
    domain::{
        entitlement::Entitlement,
        gate::{decide, GateDecision, RouteTable},
        portal::PortalSession,
    },
    error::PortalError,
    service::ensure_fresh,
    upstream::{auth::AuthApi, matrimony::MatrimonyApi},
};

#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct Navigation {
    pub path: String,
    pub decision: GateDecision,
    pub entitlement: Option<Entitlement>,
    /// Generation of the view the SPA may now render, when it renders.
    pub view: Option<u64>,
}

#[async_trait]
pub trait NavigationService: Send + Sync {
    /// Gate decision for `path`. Snapshots invalidated by earlier mutations
    /// are reloaded first.
    async fn navigate(
        &self,
        session: Option<&mut PortalSession>,
        path: &str,
    ) -> Result<Navigation, PortalError>;
}

pub struct NavigationServiceImpl {
    auth_api: Arc<dyn AuthApi>,
    matrimony_api: Arc<dyn MatrimonyApi>,
    routes: RouteTable,
}

impl NavigationServiceImpl {
    pub fn new(
        auth_api: Arc<dyn AuthApi>,
        matrimony_api: Arc<dyn MatrimonyApi>,
        routes: RouteTable,
    ) -> Self {
        Self {
            auth_api,
            matrimony_api,
            routes,
        }
    }
}

#[async_trait]
impl NavigationService for NavigationServiceImpl {
    async fn navigate(
        &self,
        session: Option<&mut PortalSession>,
        path: &str,
    ) -> Result<Navigation, PortalError> {
        let requirement = self.routes.requirement_for(path);

        let Some(session) = session else {
            return Ok(Navigation {
                path: path.to_string(),
                decision: decide(requirement, None),
                entitlement: None,
                view: None,
            });
        };

        if session.needs_refresh() {
            ensure_fresh(self.auth_api.as_ref(), self.matrimony_api.as_ref(), session).await?;
        }
        let viewer = session.viewer();
        let decision = decide(requirement, viewer.as_ref());
        let view = match decision {
            GateDecision::Render => Some(session.begin_view(path).generation),
            _ => None,
        };
        tracing::debug!(path, ?decision, "navigation decided");

        Ok(Navigation {
            path: path.to_string(),
            decision,
            entitlement: viewer.map(|v| v.entitlement),
            view,
        })
    }
}
