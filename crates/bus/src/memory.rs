//! In-memory publisher
//!
//! Records every published message. Used by tests and for running a
//! listener without a NATS server.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::{BusError, Publisher, validate_subject};

/// A recorded message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub subject: String,
    pub payload: Bytes,
}

/// Publisher that keeps messages in memory
#[derive(Debug, Default)]
pub struct MemoryBus {
    messages: Mutex<Vec<Message>>,
    notify: Notify,
    fail_publish: AtomicBool,
    closed: AtomicBool,
    close_calls: AtomicUsize,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// All messages published so far, in publish order
    pub fn messages(&self) -> Vec<Message> {
        self.messages.lock().clone()
    }

    /// Messages published on `subject`, in publish order
    pub fn messages_for(&self, subject: &str) -> Vec<Message> {
        self.messages
            .lock()
            .iter()
            .filter(|m| m.subject == subject)
            .cloned()
            .collect()
    }

    /// Number of times `close` was called
    pub fn close_count(&self) -> usize {
        self.close_calls.load(Ordering::Acquire)
    }

    /// Make subsequent publishes fail with [`BusError::Rejected`]
    pub fn set_fail_publish(&self, fail: bool) {
        self.fail_publish.store(fail, Ordering::Release);
    }

    /// Wait until at least `count` messages exist on `subject`
    ///
    /// Returns those messages, or `None` if `timeout` passes first.
    pub async fn wait_for_messages(
        &self,
        subject: &str,
        count: usize,
        timeout: Duration,
    ) -> Option<Vec<Message>> {
        let wait = async {
            loop {
                let notified = self.notify.notified();
                let messages = self.messages_for(subject);
                if messages.len() >= count {
                    return messages;
                }
                notified.await;
            }
        };
        tokio::time::timeout(timeout, wait).await.ok()
    }
}

#[async_trait]
impl Publisher for MemoryBus {
    async fn publish(&self, subject: &str, payload: &[u8]) -> Result<(), BusError> {
        validate_subject(subject)?;
        if self.closed.load(Ordering::Acquire) {
            return Err(BusError::Closed);
        }
        if self.fail_publish.load(Ordering::Acquire) {
            return Err(BusError::Rejected("memory bus set to fail".into()));
        }

        self.messages.lock().push(Message {
            subject: subject.to_string(),
            payload: Bytes::copy_from_slice(payload),
        });
        self.notify.notify_waiters();
        Ok(())
    }

    async fn close(&self) -> Result<(), BusError> {
        self.closed.store(true, Ordering::Release);
        self.close_calls.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "memory"
    }
}
