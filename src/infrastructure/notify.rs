use crate::domain::ports::{NotificationEvent, NotificationSink};
use async_trait::async_trait;

/// Notification sink that records events to the tracing log.
///
/// Stands in for real email/SMS delivery, which lives outside the core.
#[derive(Default, Clone)]
pub struct LoggingNotificationSink;

impl LoggingNotificationSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NotificationSink for LoggingNotificationSink {
    async fn notify(&self, event: NotificationEvent) {
        match event {
            NotificationEvent::Deposited { actor, amount, entry } => {
                tracing::info!(%actor, %amount, %entry, "deposit completed");
            }
            NotificationEvent::Withdrawn { actor, amount, entry } => {
                tracing::info!(%actor, %amount, %entry, "withdrawal completed");
            }
            NotificationEvent::Transferred { from, to, amount, entry } => {
                tracing::info!(%from, %to, %amount, %entry, "transfer completed");
            }
            NotificationEvent::PaymentMethodAdded { actor, method } => {
                tracing::info!(%actor, %method, "payment method added");
            }
            NotificationEvent::QrPaymentSent { payer, recipient, amount, entry } => {
                tracing::info!(%payer, %recipient, %amount, %entry, "qr payment sent");
            }
            NotificationEvent::QrPaymentReceived { payer, recipient, amount, entry } => {
                tracing::info!(%payer, %recipient, %amount, %entry, "qr payment received");
            }
        }
    }
}

/// Sink that drops every event. Useful in tests that assert on ledger state
/// only.
#[derive(Default, Clone)]
pub struct NullNotificationSink;

impl NullNotificationSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NotificationSink for NullNotificationSink {
    async fn notify(&self, _event: NotificationEvent) {}
}
