use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Account role. Restaurants carry an embedded details record; everyone else
/// does not.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Restaurant,
    Admin,
}

impl Default for Role {
    fn default() -> Self {
        Role::Customer
    }
}

/// Restaurant profile embedded in the user row (JSONB). Only present when
/// role = restaurant.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RestaurantDetails {
    pub restaurant_name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_approved: bool,
}

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone_number: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 hash, not exposed in JSON
    pub role: Role,
    pub is_admin: bool,
    pub profile_image: Option<String>,
    pub restaurant_details: Option<sqlx::types::Json<RestaurantDetails>>,
    pub email_verified: bool,
    pub phone_verified: bool,
    #[serde(skip_serializing)]
    pub verification_token: Option<String>,
    #[serde(skip_serializing)]
    pub phone_otp: Option<String>,
    pub phone_otp_expires: Option<OffsetDateTime>,
    #[serde(skip_serializing)]
    pub email_otp: Option<String>,
    pub email_otp_expires: Option<OffsetDateTime>,
    #[serde(skip_serializing)]
    pub reset_password_token: Option<String>,
    pub reset_password_expires: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
}

impl User {
    /// A user may log in once either channel is verified.
    pub fn is_verified(&self) -> bool {
        self.email_verified || self.phone_verified
    }

    /// Whether the stored phone OTP can no longer be accepted at `now`.
    /// A missing expiry counts as expired: the OTP and its expiry are only
    /// ever written together, so one without the other is not a valid pair.
    pub fn phone_otp_expired(&self, now: OffsetDateTime) -> bool {
        self.phone_otp_expires.map(|t| t < now).unwrap_or(true)
    }

    pub fn email_otp_expired(&self, now: OffsetDateTime) -> bool {
        self.email_otp_expires.map(|t| t < now).unwrap_or(true)
    }

    /// Restaurants need an explicit approval; every other role is considered
    /// approved.
    pub fn is_approved(&self) -> bool {
        match self.role {
            Role::Restaurant => self
                .restaurant_details
                .as_ref()
                .map(|d| d.is_approved)
                .unwrap_or(false),
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank_user(role: Role) -> User {
        User {
            id: Uuid::new_v4(),
            name: "Asha".into(),
            email: "asha@example.com".into(),
            phone_number: None,
            password_hash: "$argon2id$fake".into(),
            role,
            is_admin: false,
            profile_image: None,
            restaurant_details: None,
            email_verified: false,
            phone_verified: false,
            verification_token: None,
            phone_otp: None,
            phone_otp_expires: None,
            email_otp: None,
            email_otp_expires: None,
            reset_password_token: None,
            reset_password_expires: None,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn either_verified_flag_makes_the_user_verified() {
        let mut user = blank_user(Role::Customer);
        assert!(!user.is_verified());
        user.email_verified = true;
        assert!(user.is_verified());
        user.email_verified = false;
        user.phone_verified = true;
        assert!(user.is_verified());
    }

    #[test]
    fn non_restaurants_are_always_approved() {
        assert!(blank_user(Role::Customer).is_approved());
        assert!(blank_user(Role::Admin).is_approved());
    }

    #[test]
    fn restaurant_approval_comes_from_details() {
        let mut user = blank_user(Role::Restaurant);
        assert!(!user.is_approved());

        user.restaurant_details = Some(sqlx::types::Json(RestaurantDetails {
            restaurant_name: "Momo House".into(),
            is_approved: true,
            ..Default::default()
        }));
        assert!(user.is_approved());
    }

    #[test]
    fn matching_otp_with_past_expiry_counts_as_expired() {
        let now = OffsetDateTime::now_utc();
        let mut user = blank_user(Role::Customer);
        user.phone_otp = Some("123456".into());
        user.phone_otp_expires = Some(now - time::Duration::minutes(1));
        assert!(user.phone_otp_expired(now));

        user.email_otp = Some("654321".into());
        user.email_otp_expires = Some(now - time::Duration::seconds(1));
        assert!(user.email_otp_expired(now));
    }

    #[test]
    fn otp_within_its_window_is_not_expired() {
        let now = OffsetDateTime::now_utc();
        let mut user = blank_user(Role::Customer);
        user.phone_otp = Some("123456".into());
        user.phone_otp_expires = Some(now + time::Duration::minutes(10));
        assert!(!user.phone_otp_expired(now));

        user.email_otp_expires = Some(now + time::Duration::minutes(10));
        assert!(!user.email_otp_expired(now));
    }

    #[test]
    fn missing_expiry_counts_as_expired() {
        let now = OffsetDateTime::now_utc();
        let mut user = blank_user(Role::Customer);
        // OTP present but no expiry: never a valid pair
        user.phone_otp = Some("123456".into());
        assert!(user.phone_otp_expired(now));
        assert!(user.email_otp_expired(now));
    }

    #[test]
    fn sensitive_fields_never_serialize() {
        let mut user = blank_user(Role::Customer);
        user.phone_otp = Some("123456".into());
        user.reset_password_token = Some("deadbeef".into());
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("password_hash"));
        assert!(!json.contains("123456"));
        assert!(!json.contains("deadbeef"));
    }
}
