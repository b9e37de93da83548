use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};
use tokio::sync::oneshot;
use uuid::Uuid;

use portal_api::{
    config::Config,
    domain::{
        account::Account,
        checkout::{PaymentOrder, PaymentReceipt, PurchaseTarget},
        gate::{GateDecision, InterstitialReason},
        portal::PortalSession,
        profile::{
            Gender, MaritalStatus, MatrimonyProfile, PaymentStatus, Photo, ProfileChanges,
            ProfileFilter, ProfilePage, ProfileRecord, ProfileState,
        },
        wizard::ProfileDraft,
        lifecycle::Submission,
    },
    error::PortalError,
    service::{
        admin::BulkAction,
        config::ConfigServiceImpl,
        session::MemorySessionService,
    },
    state::{AppState, Upstreams},
    upstream::{
        accounts::{AccountFilter, AccountsApi},
        auth::{AuthApi, Registration, SignedIn},
        gallery::{GalleryAlbum, GalleryApi},
        matrimony::MatrimonyApi,
        media::{MediaApi, SignedUpload},
        payments::PaymentsApi,
        UpstreamError,
    },
};

const PASSWORD: &str = "correct horse";

#[derive(Default)]
struct World {
    accounts: HashMap<String, Account>,
    profiles: Vec<ProfileRecord>,
    orders: HashMap<String, PurchaseTarget>,
    orders_by_attempt: HashMap<Uuid, PaymentOrder>,
    verification_succeeds: bool,
    order_creation_fails: bool,
    mutations: usize,
    next_id: u32,
    held_fetch: Option<HeldFetch>,
}

/// Parks the next profile fetch until the test releases it.
struct HeldFetch {
    entered: oneshot::Sender<()>,
    release: oneshot::Receiver<()>,
}

/// In-memory stand-in for every upstream resource.
#[derive(Clone, Default)]
struct FakeBackend {
    world: Arc<Mutex<World>>,
}

impl FakeBackend {
    fn new() -> Self {
        let backend = Self::default();
        backend.world().verification_succeeds = true;
        backend
    }

    fn world(&self) -> std::sync::MutexGuard<'_, World> {
        self.world.lock().expect("world lock")
    }

    fn add_account(&self, id: &str, approved: bool, member: bool, admin: bool) -> Account {
        let account = Account {
            id: id.to_string(),
            name: format!("user {id}"),
            email: format!("{id}@example.org"),
            phone: None,
            is_approved: approved,
            is_member: member,
            is_admin: admin,
            is_suspended: false,
            suspension_reason: None,
            created_at: None,
            updated_at: None,
        };
        self.world().accounts.insert(id.to_string(), account.clone());
        account
    }

    fn suspend(&self, id: &str, reason: &str) {
        let mut world = self.world();
        if let Some(account) = world.accounts.get_mut(id) {
            account.is_suspended = true;
            account.suspension_reason = Some(reason.to_string());
        }
    }

    fn insert_profile(&self, id: &str, owner: &str, payment_required: bool, is_paid: bool) {
        let record = record(id, owner, payment_required, is_paid);
        self.world().profiles.push(record);
    }

    fn profile(&self, id: &str) -> Option<ProfileRecord> {
        self.world().profiles.iter().find(|p| p.id == id).cloned()
    }

    fn mutations(&self) -> usize {
        self.world().mutations
    }

    fn account_for(world: &World, token: &str) -> Result<Account, UpstreamError> {
        let id = token
            .strip_prefix("token-")
            .ok_or(UpstreamError::SessionInvalid)?;
        world
            .accounts
            .get(id)
            .cloned()
            .ok_or(UpstreamError::SessionInvalid)
    }

    fn admin_for(world: &World, token: &str) -> Result<Account, UpstreamError> {
        let account = Self::account_for(world, token)?;
        if account.is_admin && !account.is_suspended {
            Ok(account)
        } else {
            Err(UpstreamError::Forbidden)
        }
    }

    fn update_account(
        &self,
        token: &str,
        account_id: &str,
        update: impl FnOnce(&mut Account),
    ) -> Result<Account, UpstreamError> {
        let mut world = self.world();
        Self::admin_for(&world, token)?;
        world.mutations += 1;
        let account = world
            .accounts
            .get_mut(account_id)
            .ok_or(UpstreamError::NotFound)?;
        update(account);
        Ok(account.clone())
    }
}

fn record(id: &str, owner: &str, payment_required: bool, is_paid: bool) -> ProfileRecord {
    let draft = complete_draft();
    let profile = draft
        .validate(Utc::now().date_naive())
        .expect("fixture draft is valid");
    ProfileRecord {
        id: id.to_string(),
        owner_id: owner.to_string(),
        details: profile.details,
        photos: profile.photos.as_slice().to_vec(),
        payment_required,
        is_paid,
        is_hidden: false,
        scheduled_deletion: None,
        created_at: Some(Utc::now()),
    }
}

fn complete_draft() -> ProfileDraft {
    ProfileDraft {
        full_name: Some("Meera Nair".to_string()),
        date_of_birth: NaiveDate::from_ymd_opt(1995, 3, 14),
        gender: Some(Gender::Female),
        height_cm: Some(162),
        marital_status: Some(MaritalStatus::NeverMarried),
        contact_email: Some("meera@example.org".to_string()),
        photos: vec![Photo {
            url: "https://media.example.org/meera.jpg".to_string(),
            storage_id: "meera".to_string(),
            is_primary: true,
        }],
        ..Default::default()
    }
}

fn is_listed(record: &ProfileRecord) -> bool {
    !record.is_hidden && (record.is_paid || !record.payment_required)
}

#[async_trait]
impl AuthApi for FakeBackend {
    async fn register(&self, registration: &Registration) -> Result<(), UpstreamError> {
        let mut world = self.world();
        world.mutations += 1;
        world.next_id += 1;
        let id = format!("new{}", world.next_id);
        world.accounts.insert(
            id.clone(),
            Account {
                id,
                name: registration.name.clone(),
                email: registration.email.clone(),
                phone: registration.phone.clone(),
                is_approved: false,
                is_member: false,
                is_admin: false,
                is_suspended: false,
                suspension_reason: None,
                created_at: None,
                updated_at: None,
            },
        );
        Ok(())
    }

    async fn verify_otp(&self, email: &str, otp: &str) -> Result<SignedIn, UpstreamError> {
        if otp != "123456" {
            return Err(UpstreamError::Rejected("invalid code".to_string()));
        }
        self.login(email, PASSWORD).await
    }

    async fn login(&self, email: &str, password: &str) -> Result<SignedIn, UpstreamError> {
        let world = self.world();
        let account = world
            .accounts
            .values()
            .find(|account| account.email == email)
            .cloned()
            .filter(|_| password == PASSWORD)
            .ok_or(UpstreamError::SessionInvalid)?;
        Ok(SignedIn {
            token: format!("token-{}", account.id),
            account,
        })
    }

    async fn current_account(&self, token: &str) -> Result<Account, UpstreamError> {
        Self::account_for(&self.world(), token)
    }

    async fn request_password_reset(&self, _email: &str) -> Result<(), UpstreamError> {
        Ok(())
    }

    async fn reset_password(&self, reset_token: &str, _password: &str) -> Result<(), UpstreamError> {
        if reset_token == "valid" {
            Ok(())
        } else {
            Err(UpstreamError::SessionInvalid)
        }
    }
}

#[async_trait]
impl AccountsApi for FakeBackend {
    async fn list(
        &self,
        token: &str,
        filter: Option<AccountFilter>,
    ) -> Result<Vec<Account>, UpstreamError> {
        let world = self.world();
        Self::admin_for(&world, token)?;
        Ok(world
            .accounts
            .values()
            .filter(|account| match filter {
                Some(AccountFilter::Pending) => !account.is_approved,
                Some(AccountFilter::Approved) => account.is_approved,
                Some(AccountFilter::Suspended) => account.is_suspended,
                None => true,
            })
            .cloned()
            .collect())
    }

    async fn approve(&self, token: &str, account_id: &str) -> Result<Account, UpstreamError> {
        self.update_account(token, account_id, |account| account.is_approved = true)
    }

    async fn reject(&self, token: &str, account_id: &str) -> Result<(), UpstreamError> {
        let mut world = self.world();
        Self::admin_for(&world, token)?;
        world.mutations += 1;
        world
            .accounts
            .remove(account_id)
            .map(|_| ())
            .ok_or(UpstreamError::NotFound)
    }

    async fn suspend(
        &self,
        token: &str,
        account_id: &str,
        reason: &str,
    ) -> Result<Account, UpstreamError> {
        self.update_account(token, account_id, |account| {
            account.is_suspended = true;
            account.suspension_reason = Some(reason.to_string());
        })
    }

    async fn unsuspend(&self, token: &str, account_id: &str) -> Result<Account, UpstreamError> {
        self.update_account(token, account_id, |account| {
            account.is_suspended = false;
            account.suspension_reason = None;
        })
    }

    async fn grant_admin(&self, token: &str, account_id: &str) -> Result<Account, UpstreamError> {
        self.update_account(token, account_id, |account| account.is_admin = true)
    }

    async fn mark_member(&self, token: &str, account_id: &str) -> Result<Account, UpstreamError> {
        self.update_account(token, account_id, |account| account.is_member = true)
    }
}

#[async_trait]
impl MatrimonyApi for FakeBackend {
    async fn list(
        &self,
        token: &str,
        _filter: &ProfileFilter,
    ) -> Result<ProfilePage<ProfileRecord>, UpstreamError> {
        let world = self.world();
        Self::account_for(&world, token)?;
        let items: Vec<_> = world.profiles.iter().filter(|p| is_listed(p)).cloned().collect();
        Ok(ProfilePage {
            total: items.len() as u64,
            items,
            page: 1,
            total_pages: 1,
        })
    }

    async fn get(&self, token: &str, profile_id: &str) -> Result<ProfileRecord, UpstreamError> {
        let held = self.world().held_fetch.take();
        if let Some(held) = held {
            let _ = held.entered.send(());
            let _ = held.release.await;
        }
        let world = self.world();
        Self::account_for(&world, token)?;
        world
            .profiles
            .iter()
            .find(|p| p.id == profile_id)
            .cloned()
            .ok_or(UpstreamError::NotFound)
    }

    async fn create(&self, token: &str, submission: &Submission) -> Result<ProfileRecord, UpstreamError> {
        let mut world = self.world();
        let owner = Self::account_for(&world, token)?;
        world.mutations += 1;
        world.next_id += 1;
        let record = ProfileRecord {
            id: format!("m{}", world.next_id),
            owner_id: owner.id,
            details: submission.profile.details.clone(),
            photos: submission.profile.photos.as_slice().to_vec(),
            payment_required: submission.payment_required,
            is_paid: false,
            is_hidden: false,
            scheduled_deletion: None,
            created_at: Some(Utc::now()),
        };
        world.profiles.push(record.clone());
        Ok(record)
    }

    async fn update(
        &self,
        token: &str,
        profile_id: &str,
        changes: &ProfileChanges,
    ) -> Result<ProfileRecord, UpstreamError> {
        let mut world = self.world();
        let caller = Self::account_for(&world, token)?;
        world.mutations += 1;
        let record = world
            .profiles
            .iter_mut()
            .find(|p| p.id == profile_id)
            .ok_or(UpstreamError::NotFound)?;
        if record.owner_id != caller.id {
            return Err(UpstreamError::Forbidden);
        }
        changes.apply_to(&mut record.details);
        if let Some(photos) = &changes.photos {
            record.photos = photos.clone();
        }
        Ok(record.clone())
    }

    async fn delete(&self, token: &str, profile_id: &str) -> Result<(), UpstreamError> {
        let mut world = self.world();
        let caller = Self::account_for(&world, token)?;
        world.mutations += 1;
        let before = world.profiles.len();
        world
            .profiles
            .retain(|p| !(p.id == profile_id && p.owner_id == caller.id));
        if world.profiles.len() == before {
            return Err(UpstreamError::Forbidden);
        }
        Ok(())
    }

    async fn toggle_hidden(&self, token: &str, profile_id: &str) -> Result<bool, UpstreamError> {
        let mut world = self.world();
        let caller = Self::account_for(&world, token)?;
        world.mutations += 1;
        let record = world
            .profiles
            .iter_mut()
            .find(|p| p.id == profile_id && (p.owner_id == caller.id || caller.is_admin))
            .ok_or(UpstreamError::Forbidden)?;
        record.is_hidden = !record.is_hidden;
        Ok(record.is_hidden)
    }

    async fn list_mine(&self, token: &str) -> Result<Vec<ProfileRecord>, UpstreamError> {
        let world = self.world();
        let caller = Self::account_for(&world, token)?;
        Ok(world
            .profiles
            .iter()
            .filter(|p| p.owner_id == caller.id)
            .cloned()
            .collect())
    }

    async fn admin_list_all(&self, token: &str) -> Result<Vec<ProfileRecord>, UpstreamError> {
        let world = self.world();
        Self::admin_for(&world, token)?;
        Ok(world.profiles.clone())
    }

    async fn admin_mark_completed(
        &self,
        token: &str,
        profile_id: &str,
    ) -> Result<DateTime<Utc>, UpstreamError> {
        let mut world = self.world();
        Self::admin_for(&world, token)?;
        world.mutations += 1;
        let record = world
            .profiles
            .iter_mut()
            .find(|p| p.id == profile_id)
            .ok_or(UpstreamError::NotFound)?;
        let scheduled = Utc::now() + Duration::days(14);
        record.is_hidden = true;
        record.scheduled_deletion = Some(scheduled);
        Ok(scheduled)
    }

    async fn admin_delete(&self, token: &str, profile_id: &str) -> Result<(), UpstreamError> {
        let mut world = self.world();
        Self::admin_for(&world, token)?;
        world.mutations += 1;
        world.profiles.retain(|p| p.id != profile_id);
        Ok(())
    }
}

#[async_trait]
impl PaymentsApi for FakeBackend {
    async fn create_order(
        &self,
        token: &str,
        target: &PurchaseTarget,
        attempt: Uuid,
    ) -> Result<PaymentOrder, UpstreamError> {
        let mut world = self.world();
        Self::account_for(&world, token)?;
        if world.order_creation_fails {
            return Err(UpstreamError::Server(502));
        }
        if let Some(order) = world.orders_by_attempt.get(&attempt) {
            return Ok(order.clone());
        }
        let order = PaymentOrder {
            order_id: format!("order_{}", world.orders.len() + 1),
            amount: 50_000,
            currency: "INR".to_string(),
        };
        world.orders.insert(order.order_id.clone(), target.clone());
        world.orders_by_attempt.insert(attempt, order.clone());
        Ok(order)
    }

    async fn verify(
        &self,
        token: &str,
        target: &PurchaseTarget,
        receipt: &PaymentReceipt,
    ) -> Result<bool, UpstreamError> {
        let mut world = self.world();
        let caller = Self::account_for(&world, token)?;
        if !world.verification_succeeds || world.orders.get(&receipt.order_id) != Some(target) {
            return Ok(false);
        }
        world.mutations += 1;
        match target {
            PurchaseTarget::Membership => {
                if let Some(account) = world.accounts.get_mut(&caller.id) {
                    account.is_member = true;
                }
            }
            PurchaseTarget::Profile { profile_id } => {
                if let Some(record) = world.profiles.iter_mut().find(|p| &p.id == profile_id) {
                    record.is_paid = true;
                }
            }
        }
        Ok(true)
    }
}

#[async_trait]
impl MediaApi for FakeBackend {
    async fn signed_upload(&self, token: &str, folder: &str) -> Result<SignedUpload, UpstreamError> {
        Self::account_for(&self.world(), token)?;
        Ok(SignedUpload {
            signature: "signature".to_string(),
            timestamp: 1_760_000_000,
            api_key: "key".to_string(),
            cloud_name: "portal".to_string(),
            folder: folder.to_string(),
        })
    }
}

#[async_trait]
impl GalleryApi for FakeBackend {
    async fn list(&self) -> Result<Vec<GalleryAlbum>, UpstreamError> {
        Ok(Vec::new())
    }
}

fn config() -> Config {
    Config {
        port: 0,
        upstream_api_base: "http://upstream.invalid/api".to_string(),
        upstream_timeout_seconds: 5,
        redis_url: None,
        session_ttl_seconds: 3600,
        session_key_prefix: "portal-test".to_string(),
        cookie_secure: false,
        cookie_domain: None,
        checkout_ttl_seconds: 900,
        payment_gateway_key_id: Some("rzp_test".to_string()),
        media_upload_folder: "matrimony".to_string(),
        cors_allowed_origin: None,
    }
}

fn portal(backend: &FakeBackend) -> Arc<AppState> {
    let upstream = Arc::new(backend.clone());
    AppState::from_parts(
        Arc::new(ConfigServiceImpl::from_config(config())),
        Arc::new(MemorySessionService::new(3600)),
        Upstreams {
            auth: upstream.clone(),
            accounts: upstream.clone(),
            matrimony: upstream.clone(),
            payments: upstream.clone(),
            media: upstream.clone(),
            gallery: upstream,
        },
    )
}

async fn sign_in(state: &AppState, account: &Account) -> PortalSession {
    state
        .auth()
        .login(&account.email, PASSWORD)
        .await
        .expect("login")
}

fn receipt(order: &PaymentOrder) -> PaymentReceipt {
    PaymentReceipt {
        order_id: order.order_id.clone(),
        payment_id: "pay_1".to_string(),
        signature: "sig".to_string(),
    }
}

async fn pay(state: &AppState, session: &mut PortalSession, target: PurchaseTarget) -> Result<PurchaseTarget, PortalError> {
    let status = state.checkout().begin(session, target).await?;
    let order = status.order.expect("order after begin");
    state.checkout().complete(session, receipt(&order)).await
}

#[tokio::test]
async fn non_member_profile_waits_for_payment_then_activates() {
    let backend = FakeBackend::new();
    let owner = backend.add_account("a1", true, false, false);
    let state = portal(&backend);
    let mut session = sign_in(&state, &owner).await;

    let profile = state
        .matrimony()
        .create(&mut session, &complete_draft())
        .await
        .expect("create");
    assert_eq!(profile.payment, PaymentStatus::Pending);
    assert_eq!(profile.state(), ProfileState::PendingPayment);
    assert!(!profile.is_publicly_listed());

    let settled = pay(
        &state,
        &mut session,
        PurchaseTarget::Profile {
            profile_id: profile.id.clone(),
        },
    )
    .await
    .expect("payment");
    assert_eq!(
        settled,
        PurchaseTarget::Profile {
            profile_id: profile.id.clone()
        }
    );

    let cached = session.owned_profile(&profile.id).expect("cached");
    assert_eq!(cached.state(), ProfileState::Active);
    assert!(cached.is_paid());
    let stored = backend.profile(&profile.id).expect("stored");
    assert!(stored.payment_required && stored.is_paid);
    assert!(session.entitlement().expect("entitlement").can_browse_listings);
}

#[tokio::test]
async fn member_profile_is_active_without_an_order() {
    let backend = FakeBackend::new();
    let owner = backend.add_account("a1", true, true, false);
    let state = portal(&backend);
    let mut session = sign_in(&state, &owner).await;

    let profile = state
        .matrimony()
        .create(&mut session, &complete_draft())
        .await
        .expect("create");
    assert_eq!(profile.payment, PaymentStatus::NotRequired);
    assert_eq!(profile.state(), ProfileState::Active);
    assert!(backend.world().orders.is_empty());

    let begin = state
        .checkout()
        .begin(
            &mut session,
            PurchaseTarget::Profile {
                profile_id: profile.id.clone(),
            },
        )
        .await;
    assert!(begin.is_err());
    assert!(backend.world().orders.is_empty());
}

#[tokio::test]
async fn admin_mark_completed_hides_and_schedules_deletion() {
    let backend = FakeBackend::new();
    let admin = backend.add_account("admin", true, true, true);
    let viewer = backend.add_account("v1", true, true, false);
    backend.add_account("a1", true, true, false);
    backend.insert_profile("m1", "a1", false, false);
    let state = portal(&backend);

    let mut viewer_session = sign_in(&state, &viewer).await;
    let before = state
        .matrimony()
        .list(&mut viewer_session, &ProfileFilter::default())
        .await
        .expect("listing");
    assert!(before.items.iter().any(|p| p.id == "m1"));

    let mut admin_session = sign_in(&state, &admin).await;
    let completed = state
        .admin()
        .mark_completed(&mut admin_session, "m1")
        .await
        .expect("mark completed");
    assert!(completed.is_hidden);
    assert!(completed.scheduled_deletion.is_some_and(|at| at > Utc::now()));
    assert_eq!(completed.state(), ProfileState::ScheduledForDeletion);

    let after = state
        .matrimony()
        .list(&mut viewer_session, &ProfileFilter::default())
        .await
        .expect("listing");
    assert!(after.items.iter().all(|p| p.id != "m1"));

    let again = state.admin().mark_completed(&mut admin_session, "m1").await;
    assert!(matches!(again, Err(PortalError::Lifecycle(_))));
}

#[tokio::test]
async fn admin_hides_and_unhides_another_accounts_profile() {
    let backend = FakeBackend::new();
    let admin = backend.add_account("admin", true, true, true);
    let viewer = backend.add_account("v1", true, true, false);
    backend.add_account("a1", true, true, false);
    backend.insert_profile("m1", "a1", false, false);
    let state = portal(&backend);
    let mut viewer_session = sign_in(&state, &viewer).await;
    let mut admin_session = sign_in(&state, &admin).await;

    let hidden = state
        .admin()
        .toggle_hidden(&mut admin_session, "m1")
        .await
        .expect("admin hide");
    assert!(hidden.is_hidden);
    assert_eq!(hidden.state(), ProfileState::Hidden);
    assert!(backend.profile("m1").expect("profile").is_hidden);
    let listing = state
        .matrimony()
        .list(&mut viewer_session, &ProfileFilter::default())
        .await
        .expect("listing");
    assert!(listing.items.iter().all(|p| p.id != "m1"));

    let shown = state
        .admin()
        .toggle_hidden(&mut admin_session, "m1")
        .await
        .expect("admin unhide");
    assert!(!shown.is_hidden);
    assert_eq!(shown.state(), ProfileState::Active);
    let listing = state
        .matrimony()
        .list(&mut viewer_session, &ProfileFilter::default())
        .await
        .expect("listing");
    assert!(listing.items.iter().any(|p| p.id == "m1"));

    let mut owner_session = sign_in(&state, &viewer).await;
    let refused = state.admin().toggle_hidden(&mut owner_session, "m1").await;
    assert!(refused.is_err());
    assert!(!backend.profile("m1").expect("profile").is_hidden);
}

#[tokio::test]
async fn owner_can_remove_the_last_photo() {
    let backend = FakeBackend::new();
    let owner = backend.add_account("a1", true, true, false);
    backend.insert_profile("m1", "a1", false, false);
    let state = portal(&backend);
    let mut session = sign_in(&state, &owner).await;
    let storage_ids: Vec<String> = backend
        .profile("m1")
        .expect("profile")
        .photos
        .iter()
        .map(|photo| photo.storage_id.clone())
        .collect();
    assert!(!storage_ids.is_empty());

    let mut last = None;
    for storage_id in &storage_ids {
        last = Some(
            state
                .matrimony()
                .remove_photo(&mut session, "m1", storage_id)
                .await
                .expect("remove photo"),
        );
    }
    let profile = last.expect("updated profile");
    assert!(profile.photos.is_empty());
    assert!(backend.profile("m1").expect("profile").photos.is_empty());
}

#[tokio::test]
async fn suspended_account_sees_interstitial_and_mutates_nothing() {
    let backend = FakeBackend::new();
    let account = backend.add_account("a1", true, true, true);
    backend.insert_profile("m1", "a1", false, false);
    let state = portal(&backend);
    let mut session = sign_in(&state, &account).await;
    backend.suspend("a1", "spam");
    state.auth().refresh(&mut session).await.expect("refresh");
    let baseline = backend.mutations();

    for path in ["/profile", "/membership", "/matrimony", "/matrimony/create", "/admin/users"] {
        let navigation = state
            .navigation()
            .navigate(Some(&mut session), path)
            .await
            .expect("navigate");
        assert_eq!(
            navigation.decision,
            GateDecision::Interstitial {
                reason: InterstitialReason::Suspended {
                    reason: Some("spam".to_string())
                }
            },
            "{path}"
        );
    }

    let create = state.matrimony().create(&mut session, &complete_draft()).await;
    assert!(matches!(create, Err(PortalError::Suspended)));
    let toggle = state.matrimony().toggle_hidden(&mut session, "m1").await;
    assert!(matches!(toggle, Err(PortalError::Suspended)));
    let checkout = state
        .checkout()
        .begin(&mut session, PurchaseTarget::Membership)
        .await;
    assert!(matches!(checkout, Err(PortalError::Suspended)));
    let approve = state
        .admin()
        .bulk(&mut session, &["a1".to_string()], BulkAction::Approve)
        .await;
    assert!(matches!(approve, Err(PortalError::Suspended)));

    assert_eq!(backend.mutations(), baseline);
}

#[tokio::test]
async fn failed_verification_changes_no_entitlement() {
    let backend = FakeBackend::new();
    let owner = backend.add_account("a1", true, false, false);
    backend.insert_profile("m1", "a1", true, false);
    backend.world().verification_succeeds = false;
    let state = portal(&backend);
    let mut session = sign_in(&state, &owner).await;
    let entitlement_before = session.entitlement();

    for target in [
        PurchaseTarget::Membership,
        PurchaseTarget::Profile {
            profile_id: "m1".to_string(),
        },
    ] {
        let result = pay(&state, &mut session, target).await;
        assert!(matches!(
            result,
            Err(PortalError::Payment(
                portal_api::domain::checkout::CheckoutFailure::VerificationFailed
            ))
        ));
        assert!(!session.checkout.is_busy());
    }

    assert_eq!(session.entitlement(), entitlement_before);
    assert!(!session.account().expect("account").is_member);
    assert!(!backend.profile("m1").expect("profile").is_paid);
    let status = state.checkout().status(&mut session).await.expect("status");
    assert_eq!(
        status.last_failure.map(|f| f.code),
        Some("payment_verification_failed")
    );
}

#[tokio::test]
async fn membership_purchase_leaves_existing_profile_payment_frozen() {
    let backend = FakeBackend::new();
    let owner = backend.add_account("a1", true, false, false);
    let state = portal(&backend);
    let mut session = sign_in(&state, &owner).await;

    let profile = state
        .matrimony()
        .create(&mut session, &complete_draft())
        .await
        .expect("create");
    assert!(profile.payment_required());

    pay(&state, &mut session, PurchaseTarget::Membership)
        .await
        .expect("membership");
    assert!(session.account().expect("account").is_member);

    let mine = state.matrimony().list_mine(&mut session).await.expect("mine");
    let same = mine.iter().find(|p| p.id == profile.id).expect("same profile");
    assert!(same.payment_required());
    assert_eq!(same.state(), ProfileState::PendingPayment);
}

#[tokio::test]
async fn toggling_visibility_twice_restores_it() {
    let backend = FakeBackend::new();
    let owner = backend.add_account("a1", true, true, false);
    backend.insert_profile("m1", "a1", false, false);
    let state = portal(&backend);
    let mut session = sign_in(&state, &owner).await;

    let hidden = state
        .matrimony()
        .toggle_hidden(&mut session, "m1")
        .await
        .expect("hide");
    assert!(hidden.is_hidden);
    let shown = state
        .matrimony()
        .toggle_hidden(&mut session, "m1")
        .await
        .expect("unhide");
    assert!(!shown.is_hidden);
    assert!(!backend.profile("m1").expect("profile").is_hidden);
}

#[tokio::test]
async fn editing_someone_elses_profile_navigates_away() {
    let backend = FakeBackend::new();
    let owner = backend.add_account("a1", true, true, false);
    backend.add_account("a2", true, true, false);
    backend.insert_profile("m2", "a2", false, false);
    let state = portal(&backend);
    let mut session = sign_in(&state, &owner).await;

    let result = state
        .matrimony()
        .update(
            &mut session,
            "m2",
            ProfileChanges {
                city: Some("Thrissur".to_string()),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(result, Err(PortalError::NotOwner)));
    assert_eq!(backend.profile("m2").expect("profile").details.city, None);
}

#[tokio::test]
async fn only_one_checkout_at_a_time_and_cancel_is_not_a_failure() {
    let backend = FakeBackend::new();
    let owner = backend.add_account("a1", true, false, false);
    let state = portal(&backend);
    let mut session = sign_in(&state, &owner).await;

    let status = state
        .checkout()
        .begin(&mut session, PurchaseTarget::Membership)
        .await
        .expect("begin");
    assert_eq!(status.phase, "awaiting_gateway");
    assert_eq!(status.gateway_key_id.as_deref(), Some("rzp_test"));

    let second = state
        .checkout()
        .begin(&mut session, PurchaseTarget::Membership)
        .await;
    assert!(matches!(second, Err(PortalError::Checkout(_))));

    let cancelled = state.checkout().cancel(&mut session).await.expect("cancel");
    assert!(!cancelled.busy);
    assert!(cancelled.last_failure.is_none());
    assert!(!session.account().expect("account").is_member);
}

#[tokio::test]
async fn order_failure_is_retryable() {
    let backend = FakeBackend::new();
    let owner = backend.add_account("a1", true, false, false);
    backend.world().order_creation_fails = true;
    let state = portal(&backend);
    let mut session = sign_in(&state, &owner).await;

    let first = state
        .checkout()
        .begin(&mut session, PurchaseTarget::Membership)
        .await;
    assert!(matches!(
        first,
        Err(PortalError::Payment(
            portal_api::domain::checkout::CheckoutFailure::OrderRejected
        ))
    ));
    assert!(!session.checkout.is_busy());

    backend.world().order_creation_fails = false;
    pay(&state, &mut session, PurchaseTarget::Membership)
        .await
        .expect("retry succeeds");
    assert!(session.account().expect("account").is_member);
}

#[tokio::test]
async fn revoked_credential_surfaces_as_session_invalid() {
    let backend = FakeBackend::new();
    let owner = backend.add_account("a1", true, true, false);
    let state = portal(&backend);
    let mut session = sign_in(&state, &owner).await;
    backend.world().accounts.remove("a1");

    let result = state.matrimony().list_mine(&mut session).await;
    assert!(matches!(result, Err(PortalError::SessionInvalid)));
}

#[tokio::test]
async fn stale_profile_response_is_discarded() {
    let backend = FakeBackend::new();
    let owner = backend.add_account("a1", true, true, false);
    backend.insert_profile("m1", "a1", false, false);
    let state = portal(&backend);
    let session = sign_in(&state, &owner).await;
    let sid = state.sessions().create(&session).await.expect("store");

    let (entered_tx, entered_rx) = oneshot::channel();
    let (release_tx, release_rx) = oneshot::channel();
    backend.world().held_fetch = Some(HeldFetch {
        entered: entered_tx,
        release: release_rx,
    });

    let pending = {
        let state = state.clone();
        let sid = sid.clone();
        tokio::spawn(async move { state.matrimony().view(state.sessions(), &sid, "m1").await })
    };
    entered_rx.await.expect("fetch started");

    // The user navigates elsewhere while the first fetch is in flight.
    let navigation = {
        let mut open = state.sessions().open(&sid).await.expect("open").expect("session");
        let navigation = state
            .navigation()
            .navigate(Some(&mut open.session), "/matrimony")
            .await
            .expect("navigate");
        open.save().await.expect("save");
        navigation
    };
    assert_eq!(navigation.decision, GateDecision::Render);
    release_tx.send(()).expect("release");

    let stale = pending.await.expect("join");
    assert!(matches!(stale, Err(PortalError::Superseded)));

    let fresh = state
        .matrimony()
        .view(state.sessions(), &sid, "m1")
        .await
        .expect("view");
    assert_eq!(fresh.id, "m1");
}

#[tokio::test]
async fn bulk_actions_report_aggregate_counts() {
    let backend = FakeBackend::new();
    let admin = backend.add_account("admin", true, false, true);
    backend.add_account("p1", false, false, false);
    backend.add_account("p2", false, false, false);
    let state = portal(&backend);
    let mut session = sign_in(&state, &admin).await;

    let outcome = state
        .admin()
        .bulk(
            &mut session,
            &["p1".to_string(), "missing".to_string(), "p2".to_string()],
            BulkAction::Approve,
        )
        .await
        .expect("bulk");
    assert_eq!(outcome.succeeded, 2);
    assert_eq!(outcome.failed, 1);
    assert!(backend.world().accounts["p1"].is_approved);
}

#[tokio::test]
async fn unlisted_profiles_are_hidden_from_non_admin_viewers() {
    let backend = FakeBackend::new();
    let viewer = backend.add_account("v1", true, true, false);
    backend.add_account("a1", true, false, false);
    backend.insert_profile("pending", "a1", true, false);
    let state = portal(&backend);
    let session = sign_in(&state, &viewer).await;
    let sid = state.sessions().create(&session).await.expect("store");

    let result = state.matrimony().view(state.sessions(), &sid, "pending").await;
    assert!(matches!(result, Err(PortalError::NotFound { .. })));
}

#[test]
fn profile_listing_rule_matches_all_flag_combinations() {
    for hidden in [false, true] {
        for required in [false, true] {
            for paid in [false, true] {
                let mut rec = record("m1", "a1", required, paid);
                rec.is_hidden = hidden;
                let profile = MatrimonyProfile::from(rec.clone());
                assert_eq!(profile.is_publicly_listed(), is_listed(&rec), "{hidden} {required} {paid}");
            }
        }
    }
}

async fn serve(state: Arc<AppState>) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, portal_api::app(state))
            .await
            .expect("server");
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn revoked_credential_over_http_ends_the_session() {
    let backend = FakeBackend::new();
    backend.add_account("a1", true, true, false);
    let base_url = serve(portal(&backend)).await;
    let client = reqwest::Client::new();

    let anonymous = client
        .get(format!("{base_url}/api/v1/me"))
        .send()
        .await
        .expect("me");
    assert_eq!(anonymous.status(), reqwest::StatusCode::UNAUTHORIZED);

    let login = client
        .post(format!("{base_url}/api/v1/auth/login"))
        .json(&serde_json::json!({ "email": "A1@example.org", "password": PASSWORD }))
        .send()
        .await
        .expect("login");
    assert_eq!(login.status(), reqwest::StatusCode::OK);
    let cookie = login
        .headers()
        .get(reqwest::header::SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .expect("sid cookie")
        .to_string();

    let me = client
        .get(format!("{base_url}/api/v1/me"))
        .header(reqwest::header::COOKIE, cookie.clone())
        .send()
        .await
        .expect("me");
    assert_eq!(me.status(), reqwest::StatusCode::OK);

    backend.world().accounts.remove("a1");
    let expired = client
        .get(format!("{base_url}/api/v1/me"))
        .header(reqwest::header::COOKIE, cookie.clone())
        .send()
        .await
        .expect("me");
    assert_eq!(expired.status(), reqwest::StatusCode::UNAUTHORIZED);
    let cleared = expired
        .headers()
        .get(reqwest::header::SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(cleared.contains("Max-Age=0"), "{cleared}");
    let notice: serde_json::Value = expired.json().await.expect("notice");
    assert_eq!(notice["code"], "session_expired");
    assert_eq!(notice["redirect"], "/login");

    let after = client
        .get(format!("{base_url}/api/v1/me"))
        .header(reqwest::header::COOKIE, cookie)
        .send()
        .await
        .expect("me");
    let notice: serde_json::Value = after.json().await.expect("notice");
    assert_eq!(notice["code"], "unauthenticated");
}
