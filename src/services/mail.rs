use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct OutboundMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Fire-and-forget mail relay. Callers on non-critical paths log failures
/// instead of propagating them.
#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), AppError>;
}

/// Captures outbound mail in memory so tests can assert on it.
#[derive(Debug, Default)]
pub struct InMemoryMailSender {
    sent: Mutex<Vec<OutboundMail>>,
    fail_on_send: AtomicBool,
}

impl InMemoryMailSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_on_send(&self, fail: bool) {
        self.fail_on_send.store(fail, Ordering::SeqCst);
    }

    pub fn sent_mail(&self) -> Vec<OutboundMail> {
        self.sent.lock().expect("mail outbox poisoned").clone()
    }
}

#[async_trait]
impl MailSender for InMemoryMailSender {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), AppError> {
        if self.fail_on_send.load(Ordering::SeqCst) {
            return Err(AppError::Internal("mail relay unreachable".to_string()));
        }

        self.sent.lock().expect("mail outbox poisoned").push(OutboundMail {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });

        Ok(())
    }
}
