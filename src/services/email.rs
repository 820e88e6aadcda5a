use crate::config::email::EmailConfig;
use anyhow::Result;
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<()>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(cfg: &EmailConfig, timeout: Duration) -> Result<Self> {
        let creds = Credentials::new(cfg.smtp_username.clone(), cfg.smtp_password.clone());
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&cfg.smtp_host)?
            .port(cfg.smtp_port)
            .credentials(creds)
            .timeout(Some(timeout))
            .build();
        let from: Mailbox = cfg.from_address.parse().map_err(|e: lettre::address::AddressError| {
            anyhow::anyhow!("Invalid from address '{}': {}", cfg.from_address, e)
        })?;

        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<()> {
        let to: Mailbox = email.to.parse().map_err(|e: lettre::address::AddressError| {
            anyhow::anyhow!("Invalid to address '{}': {}", email.to, e)
        })?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(email.subject.as_str())
            .header(ContentType::TEXT_PLAIN)
            .body(email.body.clone())?;

        self.transport.send(message).await?;
        Ok(())
    }
}

/// Keeps every message in memory instead of delivering it.
#[derive(Default)]
pub struct MemoryOutbox {
    sent: Mutex<Vec<OutgoingEmail>>,
}

impl MemoryOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn last_to(&self, to: &str) -> Option<OutgoingEmail> {
        self.messages().into_iter().rev().find(|m| m.to == to)
    }
}

#[async_trait]
impl Mailer for MemoryOutbox {
    async fn send(&self, email: &OutgoingEmail) -> Result<()> {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(email.clone());
        Ok(())
    }
}

#[derive(Clone)]
pub struct EmailService {
    mailer: Option<Arc<dyn Mailer>>,
    frontend_url: String,
    timeout: Duration,
}

impl EmailService {
    pub fn new(mailer: Option<Arc<dyn Mailer>>, frontend_url: String, timeout: Duration) -> Self {
        Self {
            mailer,
            frontend_url,
            timeout,
        }
    }

    /// Build from environment variables. If SMTP is not configured, email
    /// sending is skipped (graceful degradation).
    pub fn from_env(frontend_url: String, timeout: Duration) -> Self {
        let mailer = EmailConfig::from_env().and_then(|cfg| match SmtpMailer::new(&cfg, timeout) {
            Ok(mailer) => Some(Arc::new(mailer) as Arc<dyn Mailer>),
            Err(e) => {
                tracing::warn!("Failed to build SMTP transport: {e}");
                None
            }
        });
        Self::new(mailer, frontend_url, timeout)
    }

    pub fn is_configured(&self) -> bool {
        self.mailer.is_some()
    }

    pub fn password_reset_email(&self, to: &str, token: &str) -> OutgoingEmail {
        let link = format!("{}/reset-password/{}", self.frontend_url, token);
        OutgoingEmail {
            to: to.to_string(),
            subject: "SignScribe - Reset Your Password".to_string(),
            body: format!(
                "You requested a password reset for your SignScribe account.\n\n\
                 Open the link below to choose a new password:\n\n{}\n\n\
                 This link expires in 1 hour. If you did not request this, you can safely ignore this email.",
                link
            ),
        }
    }

    pub fn verification_email(&self, to: &str, token: &str) -> OutgoingEmail {
        let link = format!("{}/verify-email/{}", self.frontend_url, token);
        OutgoingEmail {
            to: to.to_string(),
            subject: "SignScribe - Verify Your Email".to_string(),
            body: format!(
                "Welcome to SignScribe! Please verify your email by opening the link below:\n\n{}\n\n\
                 This link expires in 24 hours.",
                link
            ),
        }
    }

    /// Sends on a detached task bounded by the configured timeout; the caller
    /// never waits on the mail server. Failures are logged only.
    pub fn dispatch(&self, email: OutgoingEmail) {
        let Some(mailer) = self.mailer.clone() else {
            tracing::debug!(subject = %email.subject, "SMTP not configured, skipping email");
            return;
        };
        let timeout = self.timeout;

        tokio::spawn(async move {
            match tokio::time::timeout(timeout, mailer.send(&email)).await {
                Ok(Ok(())) => tracing::info!(subject = %email.subject, "Email sent"),
                Ok(Err(e)) => tracing::error!(subject = %email.subject, "Failed to send email: {e}"),
                Err(_) => tracing::error!(
                    subject = %email.subject,
                    "Email delivery timed out after {:?}",
                    timeout
                ),
            }
        });
    }
}
