use lettre::message::header::ContentType;
use lettre::message::{Mailbox, MessageBuilder};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

use crate::db::contact::ContactSubmission;
use crate::utils::config::EmailConfig;

/// Outgoing email: login links and new contact submissions.
#[derive(Clone)]
pub struct Notifier {
    /// Mailbox to send email from.
    from: Mailbox,
    /// Mailbox contact submissions are forwarded to.
    contact_to: Mailbox,
    /// Underlying SMTPS transport.
    transport: SmtpTransport,
}

impl Notifier {
    pub fn connect(config: &EmailConfig) -> anyhow::Result<Self> {
        // `lettre` requires a default provider to be installed to use SMTPS.
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

        let mut transport = SmtpTransport::from_url(&config.smtp_addr)?;
        if let (Some(username), Some(password)) = (&config.smtp_username, &config.smtp_password) {
            transport = transport.credentials(Credentials::new(username.clone(), password.clone()));
        }
        let transport = transport.build();

        let contact_to = config.contact_to.clone().unwrap_or_else(|| config.from.clone());
        Ok(Self { transport, from: config.from.clone(), contact_to })
    }

    pub fn builder(&self) -> MessageBuilder {
        Message::builder().from(self.from.clone()).header(ContentType::TEXT_PLAIN)
    }

    /// Send a message from a blocking worker, since the SMTP transport is synchronous.
    pub async fn send(&self, message: Message) -> anyhow::Result<()> {
        let transport = self.transport.clone();
        tokio::task::spawn_blocking(move || transport.send(&message)).await??;
        Ok(())
    }

    /// Forward a contact form submission to the team, with Reply-To set to the sender.
    pub async fn contact_received(&self, submission: &ContactSubmission) -> anyhow::Result<()> {
        let message = self
            .builder()
            .to(self.contact_to.clone())
            .reply_to(Mailbox::new(Some(submission.name.clone()), submission.email.parse()?))
            .subject(format!("[Contact] {}", submission.name))
            .body(contact_body(submission))?;
        self.send(message).await
    }
}

fn contact_body(s: &ContactSubmission) -> String {
    let mut body = format!("From: {} <{}>\n", s.name, s.email);
    if let Some(company) = &s.company {
        body += &format!("Company: {company}\n");
    }
    if let Some(budget) = &s.budget {
        body += &format!("Budget: {budget}\n");
    }
    body += "\n";
    body += &s.message;
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contact_body_skips_missing_fields() {
        let submission = ContactSubmission {
            id: 1,
            name: "Alice".into(),
            email: "alice@client.test".into(),
            company: None,
            budget: Some("25k+".into()),
            message: "Let's talk.".into(),
            read: false,
            created_at: chrono::Utc::now(),
        };
        assert_eq!(contact_body(&submission), "From: Alice <alice@client.test>\nBudget: 25k+\n\nLet's talk.");
    }
}
