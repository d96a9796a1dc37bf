use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::repo_types::{RestaurantDetails, Role, User};

/// Request body for signup.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub restaurant_details: Option<RestaurantDetails>,
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhoneOtpRequest {
    pub phone_number: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPhoneOtpRequest {
    pub phone_number: String,
    pub otp: String,
}

/// Shared body for send-email-otp, resend-verification and forgot-password.
#[derive(Debug, Deserialize)]
pub struct EmailRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyEmailOtpRequest {
    pub email: String,
    pub otp: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupResponse {
    pub message: String,
    pub email_sent: bool,
}

/// Returned by send-phone-otp / send-email-otp. `mock` tells the client the
/// code was logged instead of delivered (no gateway configured).
#[derive(Debug, Serialize)]
pub struct OtpSentResponse {
    pub message: String,
    pub mock: bool,
}

/// Public part of the user returned after login.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub is_admin: bool,
    pub profile_image: Option<String>,
    pub is_approved: bool,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            is_admin: user.is_admin,
            profile_image: user.profile_image.clone(),
            is_approved: user.is_approved(),
        }
    }
}

/// Response returned after login.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: PublicUser,
}

/// Minimal projection returned alongside the token after OTP verification.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MinimalUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub is_admin: bool,
}

impl From<&User> for MinimalUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            is_admin: user.is_admin,
        }
    }
}

/// Response returned after a successful OTP verification.
#[derive(Debug, Serialize)]
pub struct VerifiedResponse {
    pub message: String,
    pub verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<MinimalUser>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signup_request_accepts_camel_case_fields() {
        let body = r#"{
            "name": "Momo House",
            "email": "owner@momo.example",
            "password": "pw1",
            "phoneNumber": "9811111111",
            "role": "restaurant",
            "restaurantDetails": { "restaurantName": "Momo House" }
        }"#;
        let req: SignupRequest = serde_json::from_str(body).unwrap();
        assert_eq!(req.role, Some(Role::Restaurant));
        assert_eq!(req.phone_number.as_deref(), Some("9811111111"));
        let details = req.restaurant_details.unwrap();
        assert_eq!(details.restaurant_name, "Momo House");
        assert!(!details.is_approved);
    }

    #[test]
    fn signup_request_defaults_optional_fields() {
        let req: SignupRequest = serde_json::from_str(
            r#"{ "name": "A", "email": "a@x.com", "password": "pw1" }"#,
        )
        .unwrap();
        assert!(req.role.is_none());
        assert!(req.phone_number.is_none());
        assert!(req.restaurant_details.is_none());
    }

    #[test]
    fn public_user_serializes_camel_case() {
        let public = PublicUser {
            id: Uuid::new_v4(),
            name: "Asha".into(),
            email: "asha@example.com".into(),
            role: Role::Customer,
            is_admin: false,
            profile_image: None,
            is_approved: true,
        };
        let json = serde_json::to_value(&public).unwrap();
        assert_eq!(json["isAdmin"], false);
        assert_eq!(json["isApproved"], true);
        assert_eq!(json["role"], "customer");
    }

    #[test]
    fn verified_response_omits_absent_token() {
        let resp = VerifiedResponse {
            message: "Phone already verified".into(),
            verified: true,
            token: None,
            user: None,
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(!json.contains("token"));
        assert!(!json.contains("user"));
    }
}
