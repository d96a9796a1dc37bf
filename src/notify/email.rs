use async_trait::async_trait;
use lettre::{
    message::header,
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::config::SmtpConfig;
use crate::notify::EmailSender;

/// SMTP email sender backed by lettre's async transport.
pub struct SmtpMailer {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> anyhow::Result<Self> {
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)?
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();
        Ok(Self {
            mailer,
            from: config.from.clone(),
        })
    }
}

#[async_trait]
impl EmailSender for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, body: String) -> anyhow::Result<()> {
        let message = Message::builder()
            .from(self.from.parse()?)
            .to(to.parse()?)
            .subject(subject)
            .header(header::ContentType::TEXT_PLAIN)
            .body(body)?;
        self.mailer.send(message).await?;
        Ok(())
    }
}

pub fn otp_email(name: &str, otp: &str) -> (String, String) {
    (
        "Your FoodMandu verification code".to_string(),
        format!("Hi {name},\n\nYour FoodMandu verification code is: {otp}\n\nIt expires in 10 minutes."),
    )
}

pub fn verification_email(frontend_url: &str, name: &str, token: &str) -> (String, String) {
    (
        "Verify your FoodMandu account".to_string(),
        format!(
            "Hi {name},\n\nPlease verify your email by visiting:\n{frontend_url}/verify-email/{token}"
        ),
    )
}

pub fn password_reset_email(frontend_url: &str, name: &str, token: &str) -> (String, String) {
    (
        "Reset your FoodMandu password".to_string(),
        format!(
            "Hi {name},\n\nYou requested a password reset. The link below is valid for 1 hour:\n{frontend_url}/reset-password/{token}\n\nIf you did not request this, you can ignore this email."
        ),
    )
}

pub fn password_reset_confirmation(name: &str) -> (String, String) {
    (
        "Your FoodMandu password was changed".to_string(),
        format!("Hi {name},\n\nYour password was just reset. If this wasn't you, contact support immediately."),
    )
}

pub fn welcome_email(name: &str) -> (String, String) {
    (
        "Welcome to FoodMandu!".to_string(),
        format!("Hi {name},\n\nYour email is verified. You can now log in and start ordering."),
    )
}
