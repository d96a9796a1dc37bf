use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;

mod dto;
pub(crate) mod extractors;
pub mod handlers;
pub mod repo;
pub mod repo_types;
pub mod services;
pub mod tokens;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/signup", post(handlers::signup))
        .route("/login", post(handlers::login))
        .route("/send-phone-otp", post(handlers::send_phone_otp))
        .route("/verify-phone-otp", post(handlers::verify_phone_otp))
        .route("/send-email-otp", post(handlers::send_email_otp))
        .route("/verify-email-otp", post(handlers::verify_email_otp))
        .route("/verify-email/:token", get(handlers::verify_email_with_token))
        .route("/resend-verification", post(handlers::resend_verification))
        .route("/forgot-password", post(handlers::forgot_password))
        .route("/reset-password/:token", post(handlers::reset_password))
        .route("/me", get(handlers::me))
}
