//! Email transport — SMTP sending via async lettre.
//!
//! Each message goes out as multipart/alternative (plain + HTML) when an
//! HTML body is present. Works with Gmail app passwords, Outlook, custom relays.

use std::time::Duration;

use async_trait::async_trait;
use herald_core::config::EmailConfig;
use herald_core::error::{HeraldError, Result};
use herald_core::traits::Transport;
use herald_core::types::{BatchSummary, Message, NotificationKind, NotificationRecord};
use lettre::message::{Mailbox, MultiPart, header::ContentType};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message as LettreMessage, Tokio1Executor};

use crate::templates::MessageBuilder;

/// SMTP transport with STARTTLS and login credentials.
pub struct EmailTransport {
    config: EmailConfig,
    templates: MessageBuilder,
    mailer: AsyncSmtpTransport<Tokio1Executor>,
}

impl EmailTransport {
    pub fn new(config: EmailConfig, templates: MessageBuilder) -> Result<Self> {
        if config.account.is_empty() || config.password.is_empty() {
            return Err(HeraldError::Config(
                "email.account and email.password are required for SMTP".into(),
            ));
        }

        let creds = Credentials::new(config.account.clone(), config.password.clone());
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .map_err(|e| HeraldError::Config(format!("SMTP relay: {e}")))?
            .port(config.smtp_port)
            .credentials(creds)
            .timeout(Some(Duration::from_secs(config.timeout_secs)))
            .build();

        Ok(Self {
            config,
            templates,
            mailer,
        })
    }

    /// Convert a rendered message into a lettre message.
    fn to_lettre(&self, message: &Message) -> Result<LettreMessage> {
        let from_name = message
            .from_name
            .as_deref()
            .unwrap_or(&self.config.display_name);
        let from: Mailbox = format!("{from_name} <{}>", self.config.account)
            .parse()
            .map_err(|e| HeraldError::Send(format!("Invalid from: {e}")))?;

        let to: Mailbox = match &message.to_name {
            Some(name) => format!("{name} <{}>", message.to),
            None => message.to.clone(),
        }
        .parse()
        .or_else(|_| message.to.parse())
        .map_err(|e| HeraldError::Send(format!("Invalid to '{}': {e}", message.to)))?;

        let builder = LettreMessage::builder()
            .from(from)
            .to(to)
            .subject(message.subject.clone());

        let email = match &message.html_body {
            Some(html) => builder.multipart(MultiPart::alternative_plain_html(
                message.text_body.clone(),
                html.clone(),
            )),
            None => builder
                .header(ContentType::TEXT_PLAIN)
                .body(message.text_body.clone()),
        };
        email.map_err(|e| HeraldError::Send(format!("Build email: {e}")))
    }
}

#[async_trait]
impl Transport for EmailTransport {
    fn name(&self) -> &str {
        "email"
    }

    fn build_message(&self, kind: NotificationKind, record: &NotificationRecord) -> Result<Message> {
        self.templates.build(kind, record)
    }

    fn build_batch_summary(&self, summary: &BatchSummary) -> Result<Message> {
        self.templates.batch_summary(summary)
    }

    async fn send(&self, message: &Message) -> Result<()> {
        let email = self.to_lettre(message)?;
        self.mailer
            .send(email)
            .await
            .map_err(|e| HeraldError::Send(format!("SMTP send: {e}")))?;

        tracing::info!("📤 Email sent to: {} ({})", message.to, message.subject);
        Ok(())
    }
}
