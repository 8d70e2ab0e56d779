//! Outgoing email over SMTP

use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

use crate::config::SmtpConfig;
use crate::error::{AppError, ExternalError};

const SERVICE: &str = "smtp";

/// A file attached to an email
#[derive(Debug, Clone)]
pub struct MailAttachment {
    pub file_name: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

impl MailAttachment {
    pub fn pdf(file_name: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: "application/pdf".to_string(),
            content,
        }
    }
}

#[derive(Clone)]
pub struct Mailer {
    config: SmtpConfig,
}

impl Mailer {
    pub fn new(config: &SmtpConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Build the MIME message without sending it
    pub fn build_message(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        attachment: Option<MailAttachment>,
    ) -> Result<Message, AppError> {
        let from: Mailbox = self
            .config
            .from
            .parse()
            .map_err(|e| AppError::Configuration(format!("invalid smtp.from: {}", e)))?;
        let to: Mailbox = to.trim().parse().map_err(|_| AppError::Validation {
            field: "correo".to_string(),
            message: format!("Invalid email address: {}", to),
            message_es: format!("Correo inválido: {}", to),
        })?;

        let builder = Message::builder().from(from).to(to).subject(subject);

        let message = match attachment {
            Some(file) => {
                let content_type = ContentType::parse(&file.content_type)
                    .map_err(|e| AppError::Document(format!("bad content type: {}", e)))?;
                builder.multipart(
                    MultiPart::mixed()
                        .singlepart(SinglePart::plain(body.to_string()))
                        .singlepart(Attachment::new(file.file_name).body(file.content, content_type)),
                )
            }
            None => builder.body(body.to_string()),
        };

        message.map_err(|e| AppError::Internal(format!("cannot build email: {}", e)))
    }

    fn transport(&self) -> Result<SmtpTransport, ExternalError> {
        match (&self.config.username, &self.config.password) {
            (Some(user), Some(pass)) => Ok(SmtpTransport::relay(&self.config.host)
                .map_err(|e| ExternalError::network(SERVICE, e))?
                .credentials(Credentials::new(user.clone(), pass.clone()))
                .build()),
            // Unauthenticated local relay
            _ => Ok(SmtpTransport::builder_dangerous(&self.config.host).build()),
        }
    }

    /// Send an email; the blocking SMTP exchange runs off the async runtime
    pub async fn send(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        attachment: Option<MailAttachment>,
    ) -> Result<(), AppError> {
        let message = self.build_message(to, subject, body, attachment)?;
        let transport = self.transport()?;

        tokio::task::spawn_blocking(move || transport.send(&message))
            .await
            .map_err(|e| AppError::Internal(format!("mail task panicked: {}", e)))?
            .map_err(|e| ExternalError::network(SERVICE, e))?;

        tracing::info!(to = %to, subject = %subject, "Email sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mailer() -> Mailer {
        Mailer::new(&SmtpConfig {
            host: "localhost".to_string(),
            username: None,
            password: None,
            from: "Operaciones <operaciones@example.com>".to_string(),
        })
    }

    #[test]
    fn test_message_with_pdf_attachment() {
        let message = mailer()
            .build_message(
                "ana@example.com",
                "Contrato de servicio",
                "Adjuntamos tu contrato.",
                Some(MailAttachment::pdf("contrato.pdf", b"%PDF-1.3".to_vec())),
            )
            .unwrap();

        let raw = String::from_utf8_lossy(&message.formatted()).to_string();
        assert!(raw.contains("Subject: Contrato de servicio"));
        assert!(raw.contains("application/pdf"));
        assert!(raw.contains("contrato.pdf"));
    }

    #[test]
    fn test_invalid_recipient_is_validation_error() {
        let err = mailer()
            .build_message("not-an-email", "x", "y", None)
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }
}
