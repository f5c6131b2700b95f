//! Bounded, shared mail store
//!
//! One store instance is shared between the SMTP server (which adds
//! messages) and the POP3 server (which lists, retrieves, and deletes
//! them), plus any number of concurrent sessions on each. Every
//! operation takes the single internal lock for its whole duration and
//! never across I/O, so calls are linearizable.

use std::sync::Arc;

use mailstub_common::{Error, Result};
use tokio::sync::Mutex;
use tracing::debug;

use crate::message::MailMessage;

/// Handle type shared between servers and sessions.
pub type SharedMailStore = Arc<FixedSizeMailStore>;

/// A mail store that holds up to a fixed number of messages in memory.
/// Once the limit is reached, adding a new message evicts the oldest.
#[derive(Debug)]
pub struct FixedSizeMailStore {
    inner: Mutex<Inner>,
}

#[derive(Debug)]
struct Inner {
    capacity: usize,
    messages: Vec<Arc<MailMessage>>,
}

impl FixedSizeMailStore {
    /// Create a store that holds up to `capacity` messages.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                capacity,
                messages: Vec::new(),
            }),
        }
    }

    /// Number of messages currently held, O(1).
    pub async fn count(&self) -> usize {
        self.inner.lock().await.messages.len()
    }

    /// Append a message at the tail. If the store would exceed its
    /// capacity, the oldest messages are evicted from the head until it
    /// fits again; a single add can evict more than one message if the
    /// capacity was reduced since the last add.
    pub async fn add(&self, message: MailMessage) {
        let mut inner = self.inner.lock().await;
        inner.messages.push(Arc::new(message));
        while inner.messages.len() > inner.capacity {
            let evicted = inner.messages.remove(0);
            debug!(uid = evicted.uid(), "evicted oldest message");
        }
    }

    /// Snapshot of all messages in insertion order. Later mutations of
    /// the store do not affect a returned snapshot.
    pub async fn list(&self) -> Vec<Arc<MailMessage>> {
        self.inner.lock().await.messages.clone()
    }

    /// Retrieve the message at a 0-based index.
    pub async fn get(&self, index: usize) -> Result<Arc<MailMessage>> {
        let inner = self.inner.lock().await;
        inner
            .messages
            .get(index)
            .cloned()
            .ok_or(Error::InvalidIndex(index))
    }

    /// Remove the message at a 0-based index, shifting later messages
    /// down by one.
    pub async fn delete(&self, index: usize) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if index >= inner.messages.len() {
            return Err(Error::InvalidIndex(index));
        }
        inner.messages.remove(index);
        Ok(())
    }

    /// Remove all messages.
    pub async fn clear(&self) {
        self.inner.lock().await.messages.clear();
    }

    /// Change the capacity. If the store currently holds more messages
    /// than the new capacity allows, the oldest are evicted.
    pub async fn resize(&self, capacity: usize) {
        let mut inner = self.inner.lock().await;
        inner.capacity = capacity;
        while inner.messages.len() > inner.capacity {
            inner.messages.remove(0);
        }
    }
}
