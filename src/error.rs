use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

/// Every failure a flow operation can surface to the client. Handlers return
/// `Result<_, ApiError>` and the conversion to an HTTP response lives here,
/// so status codes and body shapes stay consistent across routes.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("User not found")]
    UserNotFound,

    #[error("User already exists")]
    UserExists,

    /// Duplicate signup against an account that never completed verification.
    /// Distinguished (409 + account hints) so the client can redirect into
    /// the verification flow instead of showing a dead-end conflict.
    #[error("User already exists but is not verified.")]
    UnverifiedExists {
        name: String,
        email: String,
        phone_number: Option<String>,
    },

    /// Deliberately generic: must not reveal whether the email exists.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Correct password but neither email nor phone is verified.
    #[error("Please verify your account to continue.")]
    NeedsVerification {
        email: String,
        phone_number: Option<String>,
    },

    /// Malformed, mismatched or expired OTP / single-use token. The message
    /// is specific ("Invalid OTP" vs "OTP expired") to help legitimate users.
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("Token expired")]
    TokenExpired,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        Self::Internal(anyhow::Error::new(e).context("database error"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            Self::UserNotFound => (
                StatusCode::NOT_FOUND,
                json!({ "message": self.to_string() }),
            ),
            Self::UserExists => (
                StatusCode::BAD_REQUEST,
                json!({ "message": self.to_string() }),
            ),
            Self::UnverifiedExists {
                name,
                email,
                phone_number,
            } => (
                StatusCode::CONFLICT,
                json!({
                    "message": self.to_string(),
                    "unverified": true,
                    "user": {
                        "name": name,
                        "email": email,
                        "phoneNumber": phone_number,
                    },
                }),
            ),
            Self::InvalidCredentials => (
                StatusCode::BAD_REQUEST,
                json!({ "message": self.to_string() }),
            ),
            Self::NeedsVerification {
                email,
                phone_number,
            } => (
                StatusCode::FORBIDDEN,
                json!({
                    "message": self.to_string(),
                    "needsVerification": true,
                    "email": email,
                    "phoneNumber": phone_number,
                }),
            ),
            Self::Validation(msg) => (StatusCode::BAD_REQUEST, json!({ "message": msg })),
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, json!({ "message": msg })),
            Self::TokenExpired => (
                StatusCode::UNAUTHORIZED,
                json!({ "message": self.to_string(), "expired": true }),
            ),
            Self::Internal(e) => {
                error!(error = %e, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "message": "Server Error" }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}
