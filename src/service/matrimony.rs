use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

use crate::{
    domain::{
        gate::Requirement,
        lifecycle::{submit, transition, Actor, LifecycleError, ProfileEvent},
        portal::PortalSession,
        profile::{MatrimonyProfile, Photo, ProfileChanges, ProfileFilter, ProfilePage},
        wizard::ProfileDraft,
    },
    error::{PortalError, LISTING_PATH},
    service::{
        authorize, credential, ensure_fresh, refresh_owned_profiles,
        session::PortalSessions, signed_in_account,
    },
    upstream::{
        auth::AuthApi,
        matrimony::MatrimonyApi,
        media::{MediaApi, SignedUpload},
        UpstreamError,
    },
};

#[async_trait]
pub trait MatrimonyService: Send + Sync {
    async fn list(
        &self,
        session: &mut PortalSession,
        filter: &ProfileFilter,
    ) -> Result<ProfilePage<MatrimonyProfile>, PortalError>;
    /// Opens one profile. A response that arrives after the session moved to
    /// another view is discarded as superseded.
    async fn view(
        &self,
        sessions: &PortalSessions,
        session_id: &str,
        profile_id: &str,
    ) -> Result<MatrimonyProfile, PortalError>;
    async fn list_mine(&self, session: &mut PortalSession)
        -> Result<Vec<MatrimonyProfile>, PortalError>;
    async fn create(
        &self,
        session: &mut PortalSession,
        draft: &ProfileDraft,
    ) -> Result<MatrimonyProfile, PortalError>;
    async fn update(
        &self,
        session: &mut PortalSession,
        profile_id: &str,
        changes: ProfileChanges,
    ) -> Result<MatrimonyProfile, PortalError>;
    async fn toggle_hidden(
        &self,
        session: &mut PortalSession,
        profile_id: &str,
    ) -> Result<MatrimonyProfile, PortalError>;
    async fn delete(&self, session: &mut PortalSession, profile_id: &str) -> Result<(), PortalError>;
    async fn add_photo(
        &self,
        session: &mut PortalSession,
        profile_id: &str,
        photo: Photo,
    ) -> Result<MatrimonyProfile, PortalError>;
    async fn remove_photo(
        &self,
        session: &mut PortalSession,
        profile_id: &str,
        storage_id: &str,
    ) -> Result<MatrimonyProfile, PortalError>;
    async fn set_primary_photo(
        &self,
        session: &mut PortalSession,
        profile_id: &str,
        storage_id: &str,
    ) -> Result<MatrimonyProfile, PortalError>;
    /// Parameters the browser needs to upload a photo straight to the media host.
    async fn upload_signature(&self, session: &mut PortalSession) -> Result<SignedUpload, PortalError>;
}

pub struct MatrimonyServiceImpl {
    auth_api: Arc<dyn AuthApi>,
    matrimony_api: Arc<dyn MatrimonyApi>,
    media_api: Arc<dyn MediaApi>,
    upload_folder: String,
}

impl MatrimonyServiceImpl {
    pub fn new(
        auth_api: Arc<dyn AuthApi>,
        matrimony_api: Arc<dyn MatrimonyApi>,
        media_api: Arc<dyn MediaApi>,
        upload_folder: String,
    ) -> Self {
        Self {
            auth_api,
            matrimony_api,
            media_api,
            upload_folder,
        }
    }

    async fn fresh(&self, session: &mut PortalSession) -> Result<(), PortalError> {
        ensure_fresh(self.auth_api.as_ref(), self.matrimony_api.as_ref(), session).await
    }

    /// The caller's own copy of a profile. One refresh is tried before
    /// concluding the profile belongs to someone else.
    async fn owned(
        &self,
        session: &mut PortalSession,
        profile_id: &str,
    ) -> Result<MatrimonyProfile, PortalError> {
        self.fresh(session).await?;
        authorize(session, Requirement::APPROVED)?;
        if let Some(profile) = session.owned_profile(profile_id) {
            return Ok(profile.clone());
        }
        refresh_owned_profiles(self.matrimony_api.as_ref(), session).await?;
        session
            .owned_profile(profile_id)
            .cloned()
            .ok_or(PortalError::NotOwner)
    }

    /// Owner mutations: a 403 means the profile is not ours to change.
    fn owner_error(err: UpstreamError) -> PortalError {
        match err {
            UpstreamError::Forbidden => PortalError::NotOwner,
            other => PortalError::profile_not_found(other),
        }
    }

    async fn replace_photos(
        &self,
        session: &mut PortalSession,
        profile_id: &str,
        photos: Vec<Photo>,
    ) -> Result<MatrimonyProfile, PortalError> {
        let changes = ProfileChanges {
            photos: Some(photos),
            ..Default::default()
        };
        self.update(session, profile_id, changes).await
    }
}

#[async_trait]
impl MatrimonyService for MatrimonyServiceImpl {
    async fn list(
        &self,
        session: &mut PortalSession,
        filter: &ProfileFilter,
    ) -> Result<ProfilePage<MatrimonyProfile>, PortalError> {
        self.fresh(session).await?;
        authorize(session, Requirement::MEMBER)?;
        let token = credential(session)?;

        let page = self.matrimony_api.list(&token, filter).await?;
        let items = page
            .items
            .into_iter()
            .map(MatrimonyProfile::from)
            .filter(|profile| {
                let listed = profile.is_publicly_listed();
                if !listed {
                    tracing::debug!(profile_id = %profile.id, "dropping unlisted profile from listing");
                }
                listed
            })
            .collect();

        Ok(ProfilePage {
            items,
            page: page.page,
            total_pages: page.total_pages,
            total: page.total,
        })
    }

    async fn view(
        &self,
        sessions: &PortalSessions,
        session_id: &str,
        profile_id: &str,
    ) -> Result<MatrimonyProfile, PortalError> {
        let (ticket, token) = {
            let Some(mut open) = sessions.open(session_id).await? else {
                return Err(PortalError::Unauthenticated);
            };
            if let Err(err) = self.fresh(&mut open.session).await {
                if matches!(err, PortalError::SessionInvalid) {
                    open.end().await?;
                }
                return Err(err);
            }
            authorize(&open.session, Requirement::APPROVED)?;
            let ticket = open.session.begin_view(format!("{LISTING_PATH}/{profile_id}"));
            let token = credential(&open.session)?;
            open.save().await?;
            (ticket, token)
        };

        // The session lock is released while upstream answers.
        let fetched = self.matrimony_api.get(&token, profile_id).await;

        let Some(open) = sessions.open(session_id).await? else {
            return Err(PortalError::Unauthenticated);
        };
        let record = match fetched {
            Ok(record) => record,
            Err(UpstreamError::SessionInvalid) => {
                open.end().await?;
                return Err(PortalError::SessionInvalid);
            }
            Err(err) => return Err(PortalError::profile_not_found(err)),
        };
        if !open.session.is_current(&ticket) {
            tracing::debug!(profile_id, "discarding superseded profile response");
            return Err(PortalError::Superseded);
        }

        let profile = MatrimonyProfile::from(record);
        let entitlement = authorize(&open.session, Requirement::APPROVED)?;
        let is_owner = open
            .session
            .account()
            .is_some_and(|account| account.owns(&profile.owner_id));
        if !is_owner {
            if !(entitlement.can_browse_listings || entitlement.is_admin) {
                return Err(PortalError::MembershipRequired);
            }
            if !profile.is_publicly_listed() && !entitlement.is_admin {
                return Err(PortalError::NotFound {
                    redirect: LISTING_PATH,
                });
            }
        }
        Ok(profile)
    }

    async fn list_mine(
        &self,
        session: &mut PortalSession,
    ) -> Result<Vec<MatrimonyProfile>, PortalError> {
        self.fresh(session).await?;
        authorize(session, Requirement::AUTH)?;
        refresh_owned_profiles(self.matrimony_api.as_ref(), session).await?;
        Ok(session.owned_profiles().map(<[_]>::to_vec).unwrap_or_default())
    }

    async fn create(
        &self,
        session: &mut PortalSession,
        draft: &ProfileDraft,
    ) -> Result<MatrimonyProfile, PortalError> {
        self.fresh(session).await?;
        authorize(session, Requirement::APPROVED)?;
        // Entitlement depends on what the owner already has.
        refresh_owned_profiles(self.matrimony_api.as_ref(), session).await?;
        let account = signed_in_account(session)?;
        let entitlement = session.entitlement().unwrap_or_default();

        let submission = submit(&account, &entitlement, draft, Utc::now().date_naive())?;
        let token = credential(session)?;
        let record = self.matrimony_api.create(&token, &submission).await?;
        let profile = MatrimonyProfile::from(record);

        if profile.state() != submission.initial_state() {
            tracing::warn!(
                profile_id = %profile.id,
                expected = ?submission.initial_state(),
                actual = ?profile.state(),
                "upstream created profile in an unexpected state"
            );
        }
        tracing::info!(profile_id = %profile.id, payment_required = submission.payment_required, "profile submitted");
        session.patch_owned_profile(profile.clone());
        Ok(profile)
    }

    async fn update(
        &self,
        session: &mut PortalSession,
        profile_id: &str,
        changes: ProfileChanges,
    ) -> Result<MatrimonyProfile, PortalError> {
        let mut local = self.owned(session, profile_id).await?;
        transition(&mut local, Actor::Owner, ProfileEvent::Edit(changes.clone()))?;

        let token = credential(session)?;
        let record = self
            .matrimony_api
            .update(&token, profile_id, &changes)
            .await
            .map_err(Self::owner_error)?;
        let profile = MatrimonyProfile::from(record);
        if profile.payment != local.payment {
            tracing::warn!(profile_id, "upstream changed payment status during an edit");
        }
        session.patch_owned_profile(profile.clone());
        Ok(profile)
    }

    async fn toggle_hidden(
        &self,
        session: &mut PortalSession,
        profile_id: &str,
    ) -> Result<MatrimonyProfile, PortalError> {
        let mut profile = self.owned(session, profile_id).await?;
        let event = ProfileEvent::toggle_visibility(&profile);
        transition(&mut profile, Actor::Owner, event)?;

        let token = credential(session)?;
        let is_hidden = self
            .matrimony_api
            .toggle_hidden(&token, profile_id)
            .await
            .map_err(Self::owner_error)?;
        if is_hidden != profile.is_hidden {
            tracing::warn!(profile_id, is_hidden, "upstream visibility differs from local toggle");
            profile.is_hidden = is_hidden;
        }
        session.patch_owned_profile(profile.clone());
        Ok(profile)
    }

    async fn delete(&self, session: &mut PortalSession, profile_id: &str) -> Result<(), PortalError> {
        let mut profile = self.owned(session, profile_id).await?;
        transition(&mut profile, Actor::Owner, ProfileEvent::Delete)?;

        let token = credential(session)?;
        self.matrimony_api
            .delete(&token, profile_id)
            .await
            .map_err(Self::owner_error)?;
        tracing::info!(profile_id, "profile deleted by owner");
        session.patch_owned_profile(profile);
        Ok(())
    }

    async fn add_photo(
        &self,
        session: &mut PortalSession,
        profile_id: &str,
        photo: Photo,
    ) -> Result<MatrimonyProfile, PortalError> {
        let profile = self.owned(session, profile_id).await?;
        let mut photos = profile.photos;
        photos.add(photo).map_err(LifecycleError::from)?;
        self.replace_photos(session, profile_id, photos.into()).await
    }

    async fn remove_photo(
        &self,
        session: &mut PortalSession,
        profile_id: &str,
        storage_id: &str,
    ) -> Result<MatrimonyProfile, PortalError> {
        let profile = self.owned(session, profile_id).await?;
        let mut photos = profile.photos;
        photos.remove(storage_id).map_err(LifecycleError::from)?;
        self.replace_photos(session, profile_id, photos.into()).await
    }

    async fn set_primary_photo(
        &self,
        session: &mut PortalSession,
        profile_id: &str,
        storage_id: &str,
    ) -> Result<MatrimonyProfile, PortalError> {
        let profile = self.owned(session, profile_id).await?;
        let mut photos = profile.photos;
        photos.set_primary(storage_id).map_err(LifecycleError::from)?;
        self.replace_photos(session, profile_id, photos.into()).await
    }

    async fn upload_signature(&self, session: &mut PortalSession) -> Result<SignedUpload, PortalError> {
        self.fresh(session).await?;
        authorize(session, Requirement::APPROVED)?;
        let token = credential(session)?;
        Ok(self
            .media_api
            .signed_upload(&token, &self.upload_folder)
            .await?)
    }
}
