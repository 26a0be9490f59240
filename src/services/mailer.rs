// src/services/mailer.rs

use async_trait::async_trait;

use crate::common::error::AppError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// Transporte de e-mail. O envio real (SMTP etc.) fica fora deste serviço.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: MailMessage) -> Result<(), AppError>;
}

/// Apenas registra a mensagem no log. Padrão em desenvolvimento.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: MailMessage) -> Result<(), AppError> {
        tracing::info!(to = %message.to, subject = %message.subject, "📧 E-mail (log):\n{}", message.text);
        tracing::debug!(html = %message.html, "📧 Corpo HTML");
        Ok(())
    }
}

pub fn verification_mail(email: &str, link: &str) -> MailMessage {
    MailMessage {
        to: email.to_string(),
        subject: "Bitte E-Mail-Adresse bestätigen".to_string(),
        text: format!("Hallo,\n\nbitte bestätige deine E-Mail-Adresse für {email}:\n{link}\n"),
        html: format!(
            "<p>Hallo,</p><p>bitte bestätige deine E-Mail-Adresse für {email}:</p><p><a href=\"{link}\">{link}</a></p>"
        ),
    }
}


#[cfg(test)]
mod tests {
    use super::{testing::MemoryMailer, *};

    #[test]
    fn verification_mail_contains_link() {
        let mail = verification_mail("max@example.de", "https://app/verify/abc");
        assert_eq!(mail.to, "max@example.de");
        assert!(mail.text.contains("https://app/verify/abc"));
        assert!(mail.html.contains("href=\"https://app/verify/abc\""));
    }

    #[tokio::test]
    async fn memory_mailer_records_messages() {
        let mailer = MemoryMailer::default();
        mailer
            .send(verification_mail("a@b.de", "https://app/verify/t"))
            .await
            .unwrap();
        assert_eq!(mailer.sent().len(), 1);
        assert_eq!(mailer.sent()[0].subject, "Bitte E-Mail-Adresse bestätigen");
    }
}
