//! Best-effort outbound e-mail.
//!
//! Callers hand messages to a [`Notifier`] and move on. The production notifier is a bounded
//! queue drained by a background task, so transport latency and failures never reach the request
//! that triggered the message.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::domain::{Applicant, ValidatedPartner};

/// Structured outbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundEmail {
    pub recipient: String,
    pub subject: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
}

/// Delivery failure. Logged by the dispatcher, never returned to request handlers.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("mail transport unavailable: {0}")]
    Unavailable(String),
    #[error("recipient rejected: {0}")]
    Rejected(String),
}

/// Single delivery attempt against a concrete mail backend.
pub trait MailTransport: Send + Sync {
    fn deliver(&self, email: &OutboundEmail) -> Result<(), TransportError>;
}

/// Fire-and-forget hook used by the marketplace services.
pub trait Notifier: Send + Sync {
    fn dispatch(&self, email: OutboundEmail);
}

/// Transport that records messages in the trace log instead of sending them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTransport;

impl MailTransport for LogTransport {
    fn deliver(&self, email: &OutboundEmail) -> Result<(), TransportError> {
        info!(
            recipient = %email.recipient,
            subject = %email.subject,
            reply_to = email.reply_to.as_deref().unwrap_or("-"),
            "outbound email"
        );
        Ok(())
    }
}

/// Queue-backed notifier; [`NotificationDispatcher::spawn`] starts the draining worker.
#[derive(Debug, Clone)]
pub struct NotificationDispatcher {
    sender: mpsc::Sender<OutboundEmail>,
}

impl NotificationDispatcher {
    /// Must be called from within a tokio runtime. The worker exits once every dispatcher clone
    /// has been dropped and the queue is drained.
    pub fn spawn<T>(transport: Arc<T>, capacity: usize) -> (Self, JoinHandle<()>)
    where
        T: MailTransport + ?Sized + 'static,
    {
        let (sender, mut receiver) = mpsc::channel::<OutboundEmail>(capacity.max(1));
        let worker = tokio::spawn(async move {
            while let Some(email) = receiver.recv().await {
                if let Err(err) = transport.deliver(&email) {
                    warn!(
                        recipient = %email.recipient,
                        subject = %email.subject,
                        error = %err,
                        "notification delivery failed"
                    );
                }
            }
        });
        (Self { sender }, worker)
    }
}

impl Notifier for NotificationDispatcher {
    fn dispatch(&self, email: OutboundEmail) {
        if let Err(err) = self.sender.try_send(email) {
            let (reason, email) = match err {
                mpsc::error::TrySendError::Full(email) => ("queue full", email),
                mpsc::error::TrySendError::Closed(email) => ("dispatcher stopped", email),
            };
            warn!(
                recipient = %email.recipient,
                subject = %email.subject,
                reason,
                "notification dropped"
            );
        }
    }
}

/// Contact-form payload relayed to the operator inbox.
#[derive(Debug, Clone, Deserialize)]
pub struct ContactMessage {
    #[serde(default)]
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub message: String,
}

pub fn submission_received(operator: &str, applicant: &Applicant) -> OutboundEmail {
    OutboundEmail {
        recipient: operator.to_string(),
        subject: format!("New partner application: {}", applicant.details.company_name),
        body: format!(
            "Company: {}\nEmail: {}\nContact: {}\n\n{}",
            applicant.details.company_name,
            applicant.details.work_email,
            applicant.details.contact,
            applicant.details.message
        ),
        reply_to: Some(applicant.details.work_email.to_string()),
    }
}

pub fn approval_notice(partner: &ValidatedPartner) -> OutboundEmail {
    OutboundEmail {
        recipient: partner.details.work_email.to_string(),
        subject: "Your partner application was approved".to_string(),
        body: format!(
            "{} is now a validated partner and visible to customers.",
            partner.details.company_name
        ),
        reply_to: None,
    }
}

pub fn rejection_notice(applicant: &Applicant) -> OutboundEmail {
    OutboundEmail {
        recipient: applicant.details.work_email.to_string(),
        subject: "Your partner application was declined".to_string(),
        body: format!(
            "The application submitted for {} was not accepted.",
            applicant.details.company_name
        ),
        reply_to: None,
    }
}

pub fn contact_relay(operator: &str, contact: &ContactMessage) -> OutboundEmail {
    OutboundEmail {
        recipient: operator.to_string(),
        subject: format!("Contact form: {}", contact.name.trim()),
        body: contact.message.clone(),
        reply_to: Some(contact.email.trim().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingTransport {
        delivered: Mutex<Vec<OutboundEmail>>,
    }

    impl MailTransport for RecordingTransport {
        fn deliver(&self, email: &OutboundEmail) -> Result<(), TransportError> {
            if email.recipient.ends_with("@bounce.test") {
                return Err(TransportError::Rejected(email.recipient.clone()));
            }
            self.delivered
                .lock()
                .expect("transport mutex poisoned")
                .push(email.clone());
            Ok(())
        }
    }

    fn email(recipient: &str) -> OutboundEmail {
        OutboundEmail {
            recipient: recipient.to_string(),
            subject: "hi".to_string(),
            body: "body".to_string(),
            reply_to: None,
        }
    }

    #[tokio::test]
    async fn worker_keeps_draining_after_failed_delivery() {
        let transport = Arc::new(RecordingTransport::default());
        let (dispatcher, worker) = NotificationDispatcher::spawn(transport.clone(), 8);

        dispatcher.dispatch(email("ops@bounce.test"));
        dispatcher.dispatch(email("ops@acme.test"));
        drop(dispatcher);
        worker.await.expect("worker exits cleanly");

        let delivered = transport.delivered.lock().expect("transport mutex poisoned");
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].recipient, "ops@acme.test");
    }

    #[tokio::test]
    async fn dispatch_after_worker_stops_is_swallowed() {
        let transport = Arc::new(RecordingTransport::default());
        let (dispatcher, worker) = NotificationDispatcher::spawn(transport, 1);
        worker.abort();
        let _ = worker.await;

        dispatcher.dispatch(email("ops@acme.test"));
    }

    #[test]
    fn contact_relay_replies_to_sender() {
        let relay = contact_relay(
            "operator@hub.test",
            &ContactMessage {
                name: " Dana ".to_string(),
                email: " dana@client.test ".to_string(),
                message: "Need a quote".to_string(),
            },
        );
        assert_eq!(relay.recipient, "operator@hub.test");
        assert_eq!(relay.subject, "Contact form: Dana");
        assert_eq!(relay.reply_to.as_deref(), Some("dana@client.test"));
    }
}
