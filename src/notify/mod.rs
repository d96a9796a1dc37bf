pub mod email;
pub mod sms;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Outbound email transport. Implementations: SMTP via lettre, or a log-only
/// mock when no SMTP host is configured.
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: String) -> anyhow::Result<()>;
    fn is_mock(&self) -> bool {
        false
    }
}

/// Outbound SMS transport. Implementations: Twilio-style HTTP API, or a
/// log-only mock.
#[async_trait]
pub trait SmsSender: Send + Sync {
    async fn send(&self, to: &str, body: String) -> anyhow::Result<()>;
    fn is_mock(&self) -> bool {
        false
    }
}

enum Outbound {
    Email {
        to: String,
        subject: String,
        body: String,
    },
    Sms {
        to: String,
        body: String,
    },
}

/// Dispatches notifications. Fire-and-forget sends go through a bounded queue
/// drained by a single background worker; delivery failures are logged there
/// and never reach the request that queued them. Paths that must observe the
/// failure (the password-reset email) use the awaited `send_email`.
#[derive(Clone)]
pub struct Notifier {
    email: Arc<dyn EmailSender>,
    sms: Arc<dyn SmsSender>,
    tx: mpsc::Sender<Outbound>,
}

impl Notifier {
    pub fn spawn(email: Arc<dyn EmailSender>, sms: Arc<dyn SmsSender>, capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<Outbound>(capacity);
        let worker_email = Arc::clone(&email);
        let worker_sms = Arc::clone(&sms);

        tokio::spawn(async move {
            while let Some(outbound) = rx.recv().await {
                match outbound {
                    Outbound::Email { to, subject, body } => {
                        if let Err(e) = worker_email.send(&to, &subject, body).await {
                            error!(error = %e, to = %to, "background email send failed");
                        }
                    }
                    Outbound::Sms { to, body } => {
                        if let Err(e) = worker_sms.send(&to, body).await {
                            error!(error = %e, to = %to, "background sms send failed");
                        }
                    }
                }
            }
            info!("notification worker stopped");
        });

        Self { email, sms, tx }
    }

    /// Queue an email for background delivery. A full queue drops the
    /// message with a warning rather than blocking the request.
    pub fn queue_email(&self, to: &str, subject: &str, body: String) {
        let msg = Outbound::Email {
            to: to.to_string(),
            subject: subject.to_string(),
            body,
        };
        if let Err(e) = self.tx.try_send(msg) {
            warn!(to = %to, error = %e, "email dropped, notification queue unavailable");
        }
    }

    /// Queue an SMS for background delivery (same drop-on-full semantics).
    pub fn queue_sms(&self, to: &str, body: String) {
        let msg = Outbound::Sms {
            to: to.to_string(),
            body,
        };
        if let Err(e) = self.tx.try_send(msg) {
            warn!(to = %to, error = %e, "sms dropped, notification queue unavailable");
        }
    }

    /// Send an email inline and surface the failure to the caller.
    pub async fn send_email(&self, to: &str, subject: &str, body: String) -> anyhow::Result<()> {
        self.email.send(to, subject, body).await
    }

    pub fn email_is_mock(&self) -> bool {
        self.email.is_mock()
    }

    pub fn sms_is_mock(&self) -> bool {
        self.sms.is_mock()
    }
}

/// Log-only email sender used when SMTP is not configured.
pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send(&self, to: &str, subject: &str, body: String) -> anyhow::Result<()> {
        info!(to = %to, subject = %subject, body = %body, "[MOCK EMAIL]");
        Ok(())
    }

    fn is_mock(&self) -> bool {
        true
    }
}

/// Log-only SMS sender used when no gateway is configured.
pub struct LogSmsSender;

#[async_trait]
impl SmsSender for LogSmsSender {
    async fn send(&self, to: &str, body: String) -> anyhow::Result<()> {
        info!(to = %to, body = %body, "[MOCK SMS]");
        Ok(())
    }

    fn is_mock(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder {
        emails: Mutex<Vec<(String, String)>>,
        smses: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    #[async_trait]
    impl EmailSender for Arc<Recorder> {
        async fn send(&self, to: &str, subject: &str, _body: String) -> anyhow::Result<()> {
            if self.fail {
                anyhow::bail!("smtp down");
            }
            self.emails
                .lock()
                .unwrap()
                .push((to.to_string(), subject.to_string()));
            Ok(())
        }
    }

    #[async_trait]
    impl SmsSender for Arc<Recorder> {
        async fn send(&self, to: &str, body: String) -> anyhow::Result<()> {
            if self.fail {
                anyhow::bail!("gateway down");
            }
            self.smses
                .lock()
                .unwrap()
                .push((to.to_string(), body));
            Ok(())
        }
    }

    async fn drain() {
        // Give the worker task a chance to run
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn queued_messages_are_delivered_in_the_background() {
        let recorder = Arc::new(Recorder::default());
        let notifier = Notifier::spawn(
            Arc::new(Arc::clone(&recorder)),
            Arc::new(Arc::clone(&recorder)),
            16,
        );

        notifier.queue_email("a@x.com", "Verify", "code".into());
        notifier.queue_sms("+9779811111111", "code".into());
        drain().await;

        assert_eq!(recorder.emails.lock().unwrap().len(), 1);
        assert_eq!(recorder.smses.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn a_failing_send_does_not_stop_the_worker() {
        let failing = Arc::new(Recorder {
            fail: true,
            ..Default::default()
        });
        let recording = Arc::new(Recorder::default());
        let notifier = Notifier::spawn(
            Arc::new(Arc::clone(&failing)),
            Arc::new(Arc::clone(&recording)),
            16,
        );

        notifier.queue_email("a@x.com", "Verify", "code".into());
        notifier.queue_sms("+9779811111111", "code".into());
        drain().await;

        // The email failed quietly; the SMS behind it still went out.
        assert!(failing.emails.lock().unwrap().is_empty());
        assert_eq!(recording.smses.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn awaited_send_surfaces_the_failure() {
        let failing = Arc::new(Recorder {
            fail: true,
            ..Default::default()
        });
        let notifier = Notifier::spawn(
            Arc::new(Arc::clone(&failing)),
            Arc::new(LogSmsSender),
            16,
        );

        let err = notifier
            .send_email("a@x.com", "Reset", "link".into())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("smtp down"));
    }

    #[tokio::test]
    async fn mock_flags_reflect_the_senders() {
        let notifier = Notifier::spawn(Arc::new(LogEmailSender), Arc::new(LogSmsSender), 4);
        assert!(notifier.email_is_mock());
        assert!(notifier.sms_is_mock());
    }
}
