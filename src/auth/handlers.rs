use axum::{
    extract::{FromRef, Path, State},
    http::StatusCode,
    Json,
};
use time::{Duration, OffsetDateTime};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{
            AuthResponse, EmailRequest, LoginRequest, MessageResponse, MinimalUser,
            OtpSentResponse, PhoneOtpRequest, PublicUser, ResetPasswordRequest, SignupRequest,
            SignupResponse, VerifiedResponse, VerifyEmailOtpRequest, VerifyPhoneOtpRequest,
        },
        extractors::AuthUser,
        repo::NewUser,
        repo_types::{Role, User},
        services::{dialable_phone, hash_password, is_valid_email, verify_password},
        tokens::{generate_opaque_token, generate_otp, JwtKeys},
    },
    error::ApiError,
    notify::email as mail,
    state::AppState,
};

const OTP_DIGITS: u32 = 6;
const OTP_TTL: Duration = Duration::minutes(10);
const RESET_TOKEN_TTL: Duration = Duration::hours(1);
const OPAQUE_TOKEN_BYTES: usize = 32;

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    Json(mut payload): Json<SignupRequest>,
) -> Result<(StatusCode, Json<SignupResponse>), ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::validation("Invalid email"));
    }

    if let Some(existing) = User::find_by_email(&state.db, &payload.email).await? {
        if !existing.is_verified() {
            warn!(email = %payload.email, "signup against unverified account");
            return Err(ApiError::UnverifiedExists {
                name: existing.name,
                email: existing.email,
                phone_number: existing.phone_number,
            });
        }
        warn!(email = %payload.email, "email already registered");
        return Err(ApiError::UserExists);
    }

    let password_hash = hash_password(&payload.password)?;
    let verification_token = generate_opaque_token(OPAQUE_TOKEN_BYTES);

    let role = payload.role.unwrap_or_default();
    // Restaurant details only make sense for the restaurant role
    let restaurant_details = match role {
        Role::Restaurant => payload.restaurant_details.as_ref(),
        _ => None,
    };

    let user = User::create(
        &state.db,
        NewUser {
            name: &payload.name,
            email: &payload.email,
            phone_number: payload.phone_number.as_deref(),
            password_hash: &password_hash,
            role,
            restaurant_details,
            verification_token: &verification_token,
        },
    )
    .await?;

    info!(user_id = %user.id, email = %user.email, role = ?user.role, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            message: "Registration successful! Please verify your account using OTP.".into(),
            email_sent: false,
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    let user = User::find_by_email(&state.db, &payload.email)
        .await?
        .ok_or(ApiError::InvalidCredentials)?;

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(ApiError::InvalidCredentials);
    }

    // Password was correct; the account just has no verified channel yet
    if !user.is_verified() {
        warn!(user_id = %user.id, "login on unverified account");
        return Err(ApiError::NeedsVerification {
            email: user.email,
            phone_number: user.phone_number,
        });
    }

    let token = JwtKeys::from_ref(&state).sign(&user)?;
    info!(user_id = %user.id, "user logged in");
    Ok(Json(AuthResponse {
        token,
        user: PublicUser::from(&user),
    }))
}

#[instrument(skip(state, payload))]
pub async fn send_phone_otp(
    State(state): State<AppState>,
    Json(payload): Json<PhoneOtpRequest>,
) -> Result<Json<OtpSentResponse>, ApiError> {
    let user = User::find_by_phone(&state.db, &payload.phone_number)
        .await?
        .ok_or(ApiError::UserNotFound)?;

    let otp = generate_otp(OTP_DIGITS);
    let expires = OffsetDateTime::now_utc() + OTP_TTL;
    User::set_phone_otp(&state.db, user.id, &otp, expires).await?;

    // Persisted first: the OTP stays valid even if delivery fails
    state.notifier.queue_sms(
        &dialable_phone(&payload.phone_number),
        format!("Your FoodMandu AI verification code is: {otp}"),
    );

    info!(user_id = %user.id, "phone otp issued");
    Ok(Json(OtpSentResponse {
        message: "OTP sent successfully".into(),
        mock: state.notifier.sms_is_mock(),
    }))
}

#[instrument(skip(state, payload))]
pub async fn verify_phone_otp(
    State(state): State<AppState>,
    Json(payload): Json<VerifyPhoneOtpRequest>,
) -> Result<Json<VerifiedResponse>, ApiError> {
    let user = User::find_by_phone(&state.db, &payload.phone_number)
        .await?
        .ok_or(ApiError::UserNotFound)?;

    if user.phone_verified {
        return Ok(Json(VerifiedResponse {
            message: "Phone already verified".into(),
            verified: true,
            token: None,
            user: None,
        }));
    }

    match &user.phone_otp {
        Some(stored) if *stored == payload.otp => {}
        _ => return Err(ApiError::validation("Invalid OTP")),
    }
    if user.phone_otp_expired(OffsetDateTime::now_utc()) {
        return Err(ApiError::validation("OTP expired"));
    }

    // Conditional update: flips the flag and clears the OTP only while the
    // code still matches, so a concurrent consumer cannot double-spend it.
    let user = User::consume_phone_otp(&state.db, user.id, &payload.otp)
        .await?
        .ok_or_else(|| ApiError::validation("Invalid OTP"))?;

    let token = JwtKeys::from_ref(&state).sign(&user)?;
    info!(user_id = %user.id, "phone verified");
    Ok(Json(VerifiedResponse {
        message: "Phone verified successfully".into(),
        verified: true,
        token: Some(token),
        user: Some(MinimalUser::from(&user)),
    }))
}

#[instrument(skip(state, payload))]
pub async fn send_email_otp(
    State(state): State<AppState>,
    Json(payload): Json<EmailRequest>,
) -> Result<Json<OtpSentResponse>, ApiError> {
    let user = User::find_by_email(&state.db, &payload.email)
        .await?
        .ok_or(ApiError::UserNotFound)?;

    if user.email_verified {
        return Err(ApiError::validation("Email already verified"));
    }

    let otp = generate_otp(OTP_DIGITS);
    let expires = OffsetDateTime::now_utc() + OTP_TTL;
    User::set_email_otp(&state.db, user.id, &otp, expires).await?;

    let (subject, body) = mail::otp_email(&user.name, &otp);
    state.notifier.queue_email(&user.email, &subject, body);

    info!(user_id = %user.id, "email otp issued");
    Ok(Json(OtpSentResponse {
        message: "OTP sent to email".into(),
        mock: state.notifier.email_is_mock(),
    }))
}

#[instrument(skip(state, payload))]
pub async fn verify_email_otp(
    State(state): State<AppState>,
    Json(payload): Json<VerifyEmailOtpRequest>,
) -> Result<Json<VerifiedResponse>, ApiError> {
    let user = User::find_by_email(&state.db, &payload.email)
        .await?
        .ok_or(ApiError::UserNotFound)?;

    if user.email_verified {
        return Ok(Json(VerifiedResponse {
            message: "Email already verified".into(),
            verified: true,
            token: None,
            user: None,
        }));
    }

    match &user.email_otp {
        Some(stored) if *stored == payload.otp => {}
        _ => return Err(ApiError::validation("Invalid OTP")),
    }
    if user.email_otp_expired(OffsetDateTime::now_utc()) {
        return Err(ApiError::validation("OTP expired"));
    }

    let user = User::consume_email_otp(&state.db, user.id, &payload.otp)
        .await?
        .ok_or_else(|| ApiError::validation("Invalid OTP"))?;

    let token = JwtKeys::from_ref(&state).sign(&user)?;
    info!(user_id = %user.id, "email verified via otp");
    Ok(Json(VerifiedResponse {
        message: "Email verified successfully".into(),
        verified: true,
        token: Some(token),
        user: Some(MinimalUser::from(&user)),
    }))
}

#[instrument(skip(state))]
pub async fn verify_email_with_token(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let user = User::consume_verification_token(&state.db, &token)
        .await?
        .ok_or_else(|| ApiError::validation("Invalid or expired verification token"))?;

    let (subject, body) = mail::welcome_email(&user.name);
    state.notifier.queue_email(&user.email, &subject, body);

    info!(user_id = %user.id, "email verified via link");
    Ok(Json(MessageResponse::new(
        "Email verified successfully! You can now log in.",
    )))
}

#[instrument(skip(state, payload))]
pub async fn resend_verification(
    State(state): State<AppState>,
    Json(payload): Json<EmailRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let user = User::find_by_email(&state.db, &payload.email)
        .await?
        .ok_or(ApiError::UserNotFound)?;

    if user.email_verified {
        return Err(ApiError::validation("Email already verified"));
    }

    let token = generate_opaque_token(OPAQUE_TOKEN_BYTES);
    User::set_verification_token(&state.db, user.id, &token).await?;

    let (subject, body) = mail::verification_email(&state.config.frontend_url, &user.name, &token);
    state.notifier.queue_email(&user.email, &subject, body);

    info!(user_id = %user.id, "verification email re-issued");
    Ok(Json(MessageResponse::new(
        "Verification email sent! Please check your inbox.",
    )))
}

const FORGOT_PASSWORD_REPLY: &str =
    "If an account with that email exists, a password reset link has been sent.";

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<EmailRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    // Identical reply either way, so the endpoint can't be used to probe
    // which emails have accounts.
    let Some(user) = User::find_by_email(&state.db, &payload.email).await? else {
        return Ok(Json(MessageResponse::new(FORGOT_PASSWORD_REPLY)));
    };

    let token = generate_opaque_token(OPAQUE_TOKEN_BYTES);
    let expires = OffsetDateTime::now_utc() + RESET_TOKEN_TTL;
    User::set_reset_token(&state.db, user.id, &token, expires).await?;

    // Awaited: the user is waiting on this one email, so a delivery failure
    // is a server error rather than a silent drop.
    let (subject, body) =
        mail::password_reset_email(&state.config.frontend_url, &user.name, &token);
    state.notifier.send_email(&user.email, &subject, body).await?;

    info!(user_id = %user.id, "password reset token issued");
    Ok(Json(MessageResponse::new(FORGOT_PASSWORD_REPLY)))
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let password_hash = hash_password(&payload.password)?;

    // Single conditional update: matches the token, checks the expiry and
    // clears both in one statement, making the token single-use.
    let user = User::consume_reset_token(&state.db, &token, &password_hash)
        .await?
        .ok_or_else(|| ApiError::validation("Invalid or expired reset token"))?;

    let (subject, body) = mail::password_reset_confirmation(&user.name);
    state.notifier.queue_email(&user.email, &subject, body);

    info!(user_id = %user.id, "password reset");
    Ok(Json(MessageResponse::new(
        "Password reset successful! You can now log in with your new password.",
    )))
}

#[instrument(skip(state))]
pub async fn me(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> Result<Json<PublicUser>, ApiError> {
    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or(ApiError::UserNotFound)?;
    Ok(Json(PublicUser::from(&user)))
}
