use utoipa::OpenApi;

use crate::{
    domain::{
        account::Account,
        checkout::{CheckoutFailure, PaymentOrder, PaymentReceipt, PurchaseTarget},
        entitlement::Entitlement,
        gate::{GateDecision, InterstitialReason},
        profile::{
            Diet, Gender, MaritalStatus, PaymentStatus, Photo, ProfileChanges, ProfileDetails,
            ProfileState,
        },
        wizard::{ProfileDraft, WizardStep},
    },
    error::Notice,
    handler::{
        self,
        admin::{AccountActionResponse, BulkRequest, SuspendRequest},
        auth::{
            ForgotPasswordRequest, LoginRequest, RegisterRequest, RegisterResponse,
            ResetPasswordRequest, VerifyOtpRequest,
        },
        checkout::{CheckoutCompleted, GatewayFailureRequest},
        health::Health,
        matrimony::{DraftCheckRequest, DraftCheckResponse, ProfileListResponse, ProfileResponse},
        session::SessionResponse,
    },
    service::{
        admin::{AccountAction, BulkAction, BulkOutcome},
        checkout::{CheckoutStatus, FailureNotice},
        navigation::Navigation,
    },
    upstream::{
        accounts::AccountFilter,
        gallery::{GalleryAlbum, GalleryImage},
        media::SignedUpload,
    },
};

#[derive(OpenApi)]
#[openapi(
    paths(
        handler::health::health,
        handler::auth::register,
        handler::auth::verify_otp,
        handler::auth::login,
        handler::auth::logout,
        handler::auth::forgot_password,
        handler::auth::reset_password,
        handler::session::me,
        handler::navigation::navigate,
        handler::matrimony::list_profiles,
        handler::matrimony::create_profile,
        handler::matrimony::get_profile,
        handler::matrimony::update_profile,
        handler::matrimony::delete_profile,
        handler::matrimony::toggle_hidden,
        handler::matrimony::add_photo,
        handler::matrimony::remove_photo,
        handler::matrimony::set_primary_photo,
        handler::matrimony::list_mine,
        handler::matrimony::check_draft,
        handler::matrimony::upload_signature,
        handler::checkout::status,
        handler::checkout::begin,
        handler::checkout::complete,
        handler::checkout::cancel,
        handler::checkout::gateway_failed,
        handler::checkout::widget_failed,
        handler::admin::list_accounts,
        handler::admin::apply_account_action,
        handler::admin::suspend_account,
        handler::admin::bulk_accounts,
        handler::admin::list_profiles,
        handler::admin::mark_completed,
        handler::admin::toggle_profile_hidden,
        handler::admin::delete_profile,
        handler::gallery::list_albums
    ),
    components(schemas(
        Health,
        Notice,
        Account,
        Entitlement,
        SessionResponse,
        RegisterRequest,
        RegisterResponse,
        VerifyOtpRequest,
        LoginRequest,
        ForgotPasswordRequest,
        ResetPasswordRequest,
        Navigation,
        GateDecision,
        InterstitialReason,
        Gender,
        MaritalStatus,
        Diet,
        Photo,
        ProfileDetails,
        ProfileChanges,
        ProfileDraft,
        WizardStep,
        PaymentStatus,
        ProfileState,
        ProfileResponse,
        ProfileListResponse,
        DraftCheckRequest,
        DraftCheckResponse,
        SignedUpload,
        PurchaseTarget,
        PaymentOrder,
        PaymentReceipt,
        CheckoutFailure,
        CheckoutStatus,
        FailureNotice,
        CheckoutCompleted,
        GatewayFailureRequest,
        AccountFilter,
        AccountAction,
        BulkAction,
        BulkOutcome,
        BulkRequest,
        SuspendRequest,
        AccountActionResponse,
        GalleryAlbum,
        GalleryImage
    )),
    tags(
        (name = "health", description = "Health check"),
        (name = "auth", description = "Sign-up, sign-in and password reset"),
        (name = "session", description = "Current portal session"),
        (name = "navigation", description = "Access gate for SPA routes"),
        (name = "matrimony", description = "Matrimony profiles"),
        (name = "media", description = "Direct photo uploads"),
        (name = "checkout", description = "Membership and profile payments"),
        (name = "admin", description = "Account and profile administration"),
        (name = "gallery", description = "Community event galleries")
    )
)]
pub struct ApiDoc;
