//! SMTP delivery of overdue notices

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, Message},
    transport::smtp::authentication::Credentials,
    SmtpTransport, Transport,
};
use std::str::FromStr;

use super::overdue::Notifier;
use crate::{
    config::EmailConfig,
    error::{AppError, AppResult},
    models::overdue::OverdueNotice,
};

#[derive(Clone)]
pub struct EmailService {
    config: EmailConfig,
}

impl EmailService {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    fn build_message(&self, to: &str, subject: &str, body: &str) -> AppResult<Message> {
        let from_name = self.config.smtp_from_name.as_deref().unwrap_or("Libris");
        let from_mailbox = Mailbox::from_str(&format!("{} <{}>", from_name, self.config.smtp_from))
            .map_err(|e| AppError::Internal(format!("Invalid from address: {}", e)))?;

        let to_mailbox = Mailbox::from_str(to)
            .map_err(|e| AppError::Delivery(format!("Invalid recipient address {}: {}", to, e)))?;

        Message::builder()
            .from(from_mailbox)
            .to(to_mailbox)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| AppError::Internal(format!("Failed to build email: {}", e)))
    }

    fn transport(&self) -> AppResult<SmtpTransport> {
        let builder = if self.config.smtp_use_tls {
            SmtpTransport::starttls_relay(&self.config.smtp_host)
                .map_err(|e| AppError::Internal(format!("Failed to create SMTP transport: {}", e)))?
        } else {
            SmtpTransport::builder_dangerous(&self.config.smtp_host)
        }
        .port(self.config.smtp_port);

        let builder = match (&self.config.smtp_username, &self.config.smtp_password) {
            (Some(username), Some(password)) => {
                builder.credentials(Credentials::new(username.clone(), password.clone()))
            }
            _ => builder,
        };

        Ok(builder.build())
    }

    /// Blocking send; run it off the async executor
    fn deliver(&self, to: &str, subject: &str, body: &str) -> AppResult<()> {
        let message = self.build_message(to, subject, body)?;
        self.transport()?
            .send(&message)
            .map_err(|e| AppError::Delivery(format!("Failed to send email: {}", e)))?;
        Ok(())
    }
}

#[async_trait]
impl Notifier for EmailService {
    async fn send(&self, notice: &OverdueNotice) -> AppResult<()> {
        let service = self.clone();
        let owned = notice.clone();
        tokio::task::spawn_blocking(move || service.deliver(&owned.to, &owned.subject, &owned.body))
            .await
            .map_err(|e| AppError::Internal(format!("Email task failed: {}", e)))??;

        tracing::info!(to = %notice.to, "Sent overdue notice");
        Ok(())
    }
}
