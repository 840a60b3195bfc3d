use async_trait::async_trait;
use fleetbook_core::Notifier;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{error, info};

use crate::app_config::MailConfig;

/// SMTP delivery of booking notices.
#[derive(Clone)]
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpNotifier {
    pub fn new(config: &MailConfig) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let from: Mailbox = config.from.parse()?;

        let mut builder = if config.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
        } else {
            // Plain SMTP, for local catch-all servers
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        };
        builder = builder.port(config.port);

        if !config.username.is_empty() {
            builder = builder.credentials(Credentials::new(config.username.clone(), config.password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

fn plain_message(from: &Mailbox, to: Mailbox, subject: &str, body: &str) -> Result<Message, lettre::error::Error> {
    Message::builder()
        .from(from.clone())
        .to(to)
        .subject(subject)
        .header(ContentType::TEXT_PLAIN)
        .body(body.to_string())
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send_email(
        &self,
        to_name: &str,
        to_email: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let address: Address = to_email.parse()?;
        let message = plain_message(&self.from, Mailbox::new(Some(to_name.to_string()), address), subject, body)?;

        match self.transport.send(message).await {
            Ok(_) => {
                info!(subject = %subject, "Email accepted by SMTP relay");
                Ok(())
            }
            Err(e) => {
                error!(subject = %subject, "SMTP delivery failed: {}", e);
                Err(Box::new(e))
            }
        }
    }
}
