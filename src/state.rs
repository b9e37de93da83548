use std::{sync::Arc, time::Duration};
use thiserror::Error;

use crate::{
    domain::gate::RouteTable,
    service::{
        admin::{AdminService, AdminServiceImpl},
        auth::{AuthService, AuthServiceImpl},
        checkout::{CheckoutService, CheckoutServiceImpl},
        config::{ConfigService, ConfigServiceImpl},
        matrimony::{MatrimonyService, MatrimonyServiceImpl},
        navigation::{NavigationService, NavigationServiceImpl},
        session::{
            MemorySessionService, PortalSessions, RedisSessionService, SessionError,
            SessionService,
        },
    },
    upstream::{
        accounts::{AccountsApi, HttpAccountsApi},
        auth::{AuthApi, HttpAuthApi},
        gallery::{GalleryApi, HttpGalleryApi},
        matrimony::{HttpMatrimonyApi, MatrimonyApi},
        media::{HttpMediaApi, MediaApi},
        payments::{HttpPaymentsApi, PaymentsApi},
        HttpUpstreamClient, UpstreamClient, UpstreamError,
    },
};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("upstream client: {0}")]
    Upstream(#[from] UpstreamError),
    #[error("session store: {0}")]
    Session(#[from] SessionError),
}

/// The upstream resource clients the services are built over.
#[derive(Clone)]
pub struct Upstreams {
    pub auth: Arc<dyn AuthApi>,
    pub accounts: Arc<dyn AccountsApi>,
    pub matrimony: Arc<dyn MatrimonyApi>,
    pub payments: Arc<dyn PaymentsApi>,
    pub media: Arc<dyn MediaApi>,
    pub gallery: Arc<dyn GalleryApi>,
}

impl Upstreams {
    pub fn http(client: Arc<dyn UpstreamClient>) -> Self {
        Self {
            auth: Arc::new(HttpAuthApi::new(client.clone())),
            accounts: Arc::new(HttpAccountsApi::new(client.clone())),
            matrimony: Arc::new(HttpMatrimonyApi::new(client.clone())),
            payments: Arc::new(HttpPaymentsApi::new(client.clone())),
            media: Arc::new(HttpMediaApi::new(client.clone())),
            gallery: Arc::new(HttpGalleryApi::new(client)),
        }
    }
}

pub struct AppState {
    config: Arc<dyn ConfigService>,
    sessions: PortalSessions,
    auth: Arc<dyn AuthService>,
    matrimony: Arc<dyn MatrimonyService>,
    checkout: Arc<dyn CheckoutService>,
    admin: Arc<dyn AdminService>,
    navigation: Arc<dyn NavigationService>,
    gallery: Arc<dyn GalleryApi>,
}

impl AppState {
    pub async fn new() -> Result<Arc<Self>, StartupError> {
        let config = Arc::new(ConfigServiceImpl::new());
        let values = config.values();

        let client = Arc::new(HttpUpstreamClient::new(
            &values.upstream_api_base,
            Duration::from_secs(values.upstream_timeout_seconds),
        )?);

        let store: Arc<dyn SessionService> = match &values.redis_url {
            Some(redis_url) => Arc::new(
                RedisSessionService::new(
                    redis_url,
                    values.session_ttl_seconds,
                    values.session_key_prefix.clone(),
                )
                .await?,
            ),
            None => {
                tracing::warn!("REDIS_URL not set, sessions are kept in process memory");
                Arc::new(MemorySessionService::new(values.session_ttl_seconds))
            }
        };

        Ok(Self::from_parts(config, store, Upstreams::http(client)))
    }

    pub fn from_parts(
        config: Arc<dyn ConfigService>,
        store: Arc<dyn SessionService>,
        upstreams: Upstreams,
    ) -> Arc<Self> {
        let values = config.values().clone();

        let auth = Arc::new(AuthServiceImpl::new(
            upstreams.auth.clone(),
            upstreams.matrimony.clone(),
        ));
        let matrimony = Arc::new(MatrimonyServiceImpl::new(
            upstreams.auth.clone(),
            upstreams.matrimony.clone(),
            upstreams.media.clone(),
            values.media_upload_folder.clone(),
        ));
        let checkout = Arc::new(CheckoutServiceImpl::new(
            upstreams.auth.clone(),
            upstreams.matrimony.clone(),
            upstreams.payments.clone(),
            values.payment_gateway_key_id.clone(),
            values.checkout_ttl_seconds,
        ));
        let admin = Arc::new(AdminServiceImpl::new(
            upstreams.auth.clone(),
            upstreams.accounts.clone(),
            upstreams.matrimony.clone(),
        ));
        let navigation = Arc::new(NavigationServiceImpl::new(
            upstreams.auth.clone(),
            upstreams.matrimony.clone(),
            RouteTable::default(),
        ));

        Arc::new(Self {
            config,
            sessions: PortalSessions::new(store),
            auth,
            matrimony,
            checkout,
            admin,
            navigation,
            gallery: upstreams.gallery,
        })
    }

    pub fn config(&self) -> &dyn ConfigService {
        self.config.as_ref()
    }

    pub fn sessions(&self) -> &PortalSessions {
        &self.sessions
    }

    pub fn auth(&self) -> &dyn AuthService {
        self.auth.as_ref()
    }

    pub fn matrimony(&self) -> &dyn MatrimonyService {
        self.matrimony.as_ref()
    }

    pub fn checkout(&self) -> &dyn CheckoutService {
        self.checkout.as_ref()
    }

    pub fn admin(&self) -> &dyn AdminService {
        self.admin.as_ref()
    }

    pub fn navigation(&self) -> &dyn NavigationService {
        self.navigation.as_ref()
    }

    pub fn gallery(&self) -> &dyn GalleryApi {
        self.gallery.as_ref()
    }
}
