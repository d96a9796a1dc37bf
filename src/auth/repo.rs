use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo_types::{RestaurantDetails, Role, User};
use crate::auth::services::alt_phone;

const USER_COLUMNS: &str = r#"
    id, name, email, phone_number, password_hash, role, is_admin,
    profile_image, restaurant_details, email_verified, phone_verified,
    verification_token, phone_otp, phone_otp_expires, email_otp,
    email_otp_expires, reset_password_token, reset_password_expires, created_at
"#;

// The single-use consumers are built here so their invariants (flag flip,
// token/expiry cleared together, expiry enforced in the WHERE clause) can be
// unit tested without a live database.
fn consume_phone_otp_sql() -> String {
    format!(
        r#"
        UPDATE users
        SET phone_verified = TRUE, phone_otp = NULL, phone_otp_expires = NULL
        WHERE id = $1 AND phone_otp = $2 AND phone_otp_expires > now()
        RETURNING {USER_COLUMNS}
        "#
    )
}

fn consume_email_otp_sql() -> String {
    format!(
        r#"
        UPDATE users
        SET email_verified = TRUE, email_otp = NULL, email_otp_expires = NULL
        WHERE id = $1 AND email_otp = $2 AND email_otp_expires > now()
        RETURNING {USER_COLUMNS}
        "#
    )
}

fn consume_reset_token_sql() -> String {
    format!(
        r#"
        UPDATE users
        SET password_hash = $2, reset_password_token = NULL, reset_password_expires = NULL
        WHERE reset_password_token = $1 AND reset_password_expires > now()
        RETURNING {USER_COLUMNS}
        "#
    )
}

fn consume_verification_token_sql() -> String {
    format!(
        r#"
        UPDATE users
        SET email_verified = TRUE, verification_token = NULL
        WHERE verification_token = $1
        RETURNING {USER_COLUMNS}
        "#
    )
}

/// Fields needed to insert a fresh, unverified account.
pub struct NewUser<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub phone_number: Option<&'a str>,
    pub password_hash: &'a str,
    pub role: Role,
    pub restaurant_details: Option<&'a RestaurantDetails>,
    pub verification_token: &'a str,
}

impl User {
    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(db)
            .await?;
        Ok(user)
    }

    /// Find by phone number, falling back to the "+"-toggled alternate form.
    /// Exactly one alternate is tried.
    pub async fn find_by_phone(db: &PgPool, phone: &str) -> anyhow::Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE phone_number = $1");
        if let Some(user) = sqlx::query_as::<_, User>(&sql)
            .bind(phone)
            .fetch_optional(db)
            .await?
        {
            return Ok(Some(user));
        }
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(alt_phone(phone))
            .fetch_optional(db)
            .await?;
        Ok(user)
    }

    /// Create a new unverified user.
    pub async fn create(db: &PgPool, new: NewUser<'_>) -> anyhow::Result<User> {
        let sql = format!(
            r#"
            INSERT INTO users
                (name, email, phone_number, password_hash, role,
                 restaurant_details, verification_token)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {USER_COLUMNS}
            "#
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(new.name)
            .bind(new.email)
            .bind(new.phone_number)
            .bind(new.password_hash)
            .bind(new.role)
            .bind(new.restaurant_details.map(sqlx::types::Json))
            .bind(new.verification_token)
            .fetch_one(db)
            .await?;
        Ok(user)
    }

    /// Store a fresh phone OTP and its expiry (always written together).
    pub async fn set_phone_otp(
        db: &PgPool,
        id: Uuid,
        otp: &str,
        expires: OffsetDateTime,
    ) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET phone_otp = $2, phone_otp_expires = $3 WHERE id = $1")
            .bind(id)
            .bind(otp)
            .bind(expires)
            .execute(db)
            .await?;
        Ok(())
    }

    /// Mark the phone verified and clear the OTP pair in one conditional
    /// update. Returns None when the OTP no longer matches or has expired,
    /// which also covers a concurrent consumer winning the race.
    pub async fn consume_phone_otp(
        db: &PgPool,
        id: Uuid,
        otp: &str,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&consume_phone_otp_sql())
            .bind(id)
            .bind(otp)
            .fetch_optional(db)
            .await?;
        Ok(user)
    }

    pub async fn set_email_otp(
        db: &PgPool,
        id: Uuid,
        otp: &str,
        expires: OffsetDateTime,
    ) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET email_otp = $2, email_otp_expires = $3 WHERE id = $1")
            .bind(id)
            .bind(otp)
            .bind(expires)
            .execute(db)
            .await?;
        Ok(())
    }

    pub async fn consume_email_otp(
        db: &PgPool,
        id: Uuid,
        otp: &str,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&consume_email_otp_sql())
            .bind(id)
            .bind(otp)
            .fetch_optional(db)
            .await?;
        Ok(user)
    }

    pub async fn set_reset_token(
        db: &PgPool,
        id: Uuid,
        token: &str,
        expires: OffsetDateTime,
    ) -> anyhow::Result<()> {
        sqlx::query(
            "UPDATE users SET reset_password_token = $2, reset_password_expires = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(token)
        .bind(expires)
        .execute(db)
        .await?;
        Ok(())
    }

    /// Rotate the password hash and clear the reset pair, but only while the
    /// token matches and is unexpired. Single-use: a second call with the
    /// same token finds nothing.
    pub async fn consume_reset_token(
        db: &PgPool,
        token: &str,
        new_password_hash: &str,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&consume_reset_token_sql())
            .bind(token)
            .bind(new_password_hash)
            .fetch_optional(db)
            .await?;
        Ok(user)
    }

    pub async fn set_verification_token(
        db: &PgPool,
        id: Uuid,
        token: &str,
    ) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET verification_token = $2 WHERE id = $1")
            .bind(id)
            .bind(token)
            .execute(db)
            .await?;
        Ok(())
    }

    /// Verify the email via the link token. The token carries no expiry and
    /// stays valid until consumed or replaced by a resend.
    pub async fn consume_verification_token(
        db: &PgPool,
        token: &str,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&consume_verification_token_sql())
            .bind(token)
            .fetch_optional(db)
            .await?;
        Ok(user)
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(db)
            .await?;
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Collapse whitespace so assertions don't depend on formatting
    fn normalized(sql: String) -> String {
        sql.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn phone_otp_consume_clears_the_pair_and_checks_expiry() {
        let sql = normalized(consume_phone_otp_sql());
        // The flag flip and the NULL-ing of both OTP columns are one statement
        assert!(sql.contains(
            "SET phone_verified = TRUE, phone_otp = NULL, phone_otp_expires = NULL"
        ));
        // Matching alone is not enough: the WHERE clause enforces the expiry,
        // so an expired code can never be consumed
        assert!(sql.contains("WHERE id = $1 AND phone_otp = $2 AND phone_otp_expires > now()"));
    }

    #[test]
    fn email_otp_consume_clears_the_pair_and_checks_expiry() {
        let sql = normalized(consume_email_otp_sql());
        assert!(sql.contains(
            "SET email_verified = TRUE, email_otp = NULL, email_otp_expires = NULL"
        ));
        assert!(sql.contains("WHERE id = $1 AND email_otp = $2 AND email_otp_expires > now()"));
    }

    #[test]
    fn reset_token_consume_is_single_use_and_expiry_guarded() {
        let sql = normalized(consume_reset_token_sql());
        // The token and its expiry are cleared in the same statement that
        // rotates the hash, so a second call with the same token matches
        // nothing
        assert!(sql.contains(
            "SET password_hash = $2, reset_password_token = NULL, reset_password_expires = NULL"
        ));
        assert!(sql
            .contains("WHERE reset_password_token = $1 AND reset_password_expires > now()"));
    }

    #[test]
    fn verification_token_consume_has_no_expiry_condition() {
        // The email-link token is long-lived: consumed or replaced, never
        // timed out
        let sql = normalized(consume_verification_token_sql());
        assert!(sql.contains("SET email_verified = TRUE, verification_token = NULL"));
        assert!(sql.contains("WHERE verification_token = $1"));
        assert!(!sql.contains("now()"));
    }
}
