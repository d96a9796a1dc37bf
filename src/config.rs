use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub ttl_minutes: i64,
}

/// SMTP credentials for outbound mail. When absent the app falls back to a
/// log-only sender (mock mode).
#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub username: String,
    pub password: String,
    pub from: String,
}

/// Twilio-style SMS gateway credentials. When absent the app falls back to a
/// log-only sender (mock mode).
#[derive(Debug, Clone, Deserialize)]
pub struct SmsConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub smtp: Option<SmtpConfig>,
    pub sms: Option<SmsConfig>,
    pub frontend_url: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;

        // No hardcoded fallback: refusing to start beats signing sessions
        // with a known secret.
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")
                .map_err(|_| anyhow::anyhow!("JWT_SECRET must be set"))?,
            ttl_minutes: std::env::var("JWT_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60 * 24),
        };

        let smtp = match std::env::var("SMTP_HOST") {
            Ok(host) => Some(SmtpConfig {
                host,
                username: std::env::var("SMTP_USERNAME")?,
                password: std::env::var("SMTP_PASSWORD")?,
                from: std::env::var("SMTP_FROM")
                    .unwrap_or_else(|_| "FoodMandu <no-reply@foodmandu.app>".into()),
            }),
            Err(_) => None,
        };

        let sms = match std::env::var("TWILIO_ACCOUNT_SID") {
            Ok(account_sid) => Some(SmsConfig {
                account_sid,
                auth_token: std::env::var("TWILIO_AUTH_TOKEN")?,
                from_number: std::env::var("TWILIO_FROM_NUMBER")?,
            }),
            Err(_) => None,
        };

        let frontend_url = std::env::var("FRONTEND_URL")
            .unwrap_or_else(|_| "http://localhost:5173".into());

        Ok(Self {
            database_url,
            jwt,
            smtp,
            sms,
            frontend_url,
        })
    }
}
