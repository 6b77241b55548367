//! SMTP mail transport — async lettre sender with bounded retry.
//!
//! Transport-level retry lives here, beneath the engine's stage-level
//! retry-in-place: a timeout or connection failure gets a fresh transport
//! and another attempt (3s/6s/9s backoff, capped), a permanent SMTP
//! rejection fails immediately.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment as LettreAttachment, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use herald_core::config::{SendingConfig, SmtpConfig};
use herald_core::error::{HeraldError, Result};
use herald_core::traits::MailTransport;
use herald_core::types::OutgoingEmail;

/// SMTP-backed `MailTransport`.
pub struct SmtpMailer {
    smtp: SmtpConfig,
    sending: SendingConfig,
}

impl SmtpMailer {
    pub fn new(smtp: &SmtpConfig, sending: &SendingConfig) -> Self {
        Self {
            smtp: smtp.clone(),
            sending: sending.clone(),
        }
    }

    /// Build a fresh STARTTLS transport. Rebuilt per attempt so a broken
    /// connection is never reused.
    fn build_transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
        let username = if self.smtp.username.is_empty() {
            self.sending.sender.clone()
        } else {
            self.smtp.username.clone()
        };
        let creds = Credentials::new(username, self.smtp.password.clone());
        Ok(
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.smtp.host)
                .map_err(|e| HeraldError::Transport(format!("SMTP relay: {e}")))?
                .port(self.smtp.port)
                .credentials(creds)
                .build(),
        )
    }

    fn build_message(&self, email: &OutgoingEmail) -> Result<Message> {
        let from = format!("{} <{}>", self.sending.sender_name, self.sending.sender)
            .parse()
            .map_err(|e| HeraldError::Transport(format!("Invalid from: {e}")))?;
        let to = email
            .to
            .parse()
            .map_err(|e| HeraldError::Transport(format!("Invalid to: {e}")))?;

        let builder = Message::builder()
            .from(from)
            .to(to)
            .subject(&email.subject);

        let html_part = SinglePart::builder()
            .header(ContentType::TEXT_HTML)
            .body(email.html_body.clone());

        let message = match &email.attachment {
            Some(attachment) => {
                let content_type = ContentType::parse(&attachment.content_type)
                    .map_err(|e| HeraldError::Transport(format!("Attachment type: {e}")))?;
                builder.multipart(
                    MultiPart::mixed().singlepart(html_part).singlepart(
                        LettreAttachment::new(attachment.filename.clone())
                            .body(attachment.data.clone(), content_type),
                    ),
                )
            }
            None => builder.singlepart(html_part),
        };
        message.map_err(|e| HeraldError::Transport(format!("Build email: {e}")))
    }

    /// Connectivity probe for `herald check`.
    pub async fn probe(&self) -> Result<bool> {
        let transport = self.build_transport()?;
        transport
            .test_connection()
            .await
            .map_err(|e| HeraldError::Transport(format!("SMTP probe: {e}")))
    }
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<String> {
        let max_retries = self.smtp.max_retries.max(1);

        let mut last_error = String::new();
        for attempt in 1..=max_retries {
            // Message and transport are rebuilt per attempt; a broken
            // connection from the previous try is never reused.
            let message = self.build_message(email)?;
            let transport = self.build_transport()?;
            match transport.send(message).await {
                Ok(response) => {
                    tracing::info!("📤 Email sent to {} ({})", email.to, response.code());
                    return Ok(format!("smtp:{}", response.code()));
                }
                Err(e) if e.is_permanent() => {
                    return Err(HeraldError::Transport(format!("SMTP rejected: {e}")));
                }
                Err(e) => {
                    last_error = e.to_string();
                    if attempt < max_retries {
                        let wait = (attempt as u64 * 3).min(15);
                        tracing::warn!(
                            "⚠️ SMTP attempt {attempt}/{max_retries} failed ({e}), retrying in {wait}s"
                        );
                        tokio::time::sleep(std::time::Duration::from_secs(wait)).await;
                    }
                }
            }
        }
        Err(HeraldError::Transport(format!(
            "SMTP send failed after {max_retries} attempts: {last_error}"
        )))
    }
}
