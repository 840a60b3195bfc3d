use async_trait::async_trait;

/// Outbound e-mail channel.
///
/// An `Err` aborts the enclosing lifecycle transaction, so implementations must
/// only return `Ok` once the message has been accepted for delivery.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_email(
        &self,
        to_name: &str,
        to_email: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}
