//! In-process job store and notification channel.
//!
//! Behaves like the Redis substrate for a single process: records are
//! replaced wholesale, conditional updates never create records and every
//! live subscription receives each published payload once. Used by tests
//! and local development without a Redis server.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::debug;

use crate::channel::{ChannelMessage, ChannelSubscription, MessageKind, NotificationChannel};
use crate::store::JobStore;
use crate::Result;

type Subscribers = HashMap<u64, mpsc::UnboundedSender<ChannelMessage>>;

#[derive(Default)]
struct Inner {
    records: Mutex<HashMap<String, HashMap<String, String>>>,
    channels: Mutex<HashMap<String, Subscribers>>,
    unsubscribes: Mutex<HashMap<String, usize>>,
    next_id: AtomicU64,
}

impl Inner {
    fn release(&self, channel: &str, id: u64) -> bool {
        let mut channels = self.channels.lock();
        let Some(subscribers) = channels.get_mut(channel) else {
            return false;
        };
        let removed = subscribers.remove(&id).is_some();
        if subscribers.is_empty() {
            channels.remove(channel);
        }
        removed
    }
}

/// Job store and notification channel held in memory.
///
/// Clones share the same state.
#[derive(Clone, Default)]
pub struct MemorySubstrate {
    inner: Arc<Inner>,
}

impl MemorySubstrate {
    /// Create an empty substrate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live subscriptions on a channel.
    pub fn active_subscriptions(&self, channel: &str) -> usize {
        self.inner
            .channels
            .lock()
            .get(channel)
            .map_or(0, HashMap::len)
    }

    /// Number of explicit `unsubscribe` calls made on a channel.
    ///
    /// Subscriptions that are only dropped are not counted.
    pub fn unsubscribe_count(&self, channel: &str) -> usize {
        self.inner
            .unsubscribes
            .lock()
            .get(channel)
            .copied()
            .unwrap_or(0)
    }

    /// Deliver a message to every subscriber of a channel, returning how many received it.
    pub fn broadcast(&self, channel: &str, message: ChannelMessage) -> usize {
        let mut channels = self.inner.channels.lock();
        let Some(subscribers) = channels.get_mut(channel) else {
            return 0;
        };
        subscribers.retain(|_, sender| sender.send(message.clone()).is_ok());
        subscribers.len()
    }

    /// Close a channel. Its subscriptions drain buffered messages, then end.
    pub fn close_channel(&self, channel: &str) {
        if let Some(subscribers) = self.inner.channels.lock().remove(channel) {
            debug!(channel = %channel, subscribers = subscribers.len(), "Closed memory channel");
        }
    }

    /// Number of stored records.
    pub fn record_count(&self) -> usize {
        self.inner.records.lock().len()
    }
}

#[async_trait]
impl JobStore for MemorySubstrate {
    async fn write_fields(&self, key: &str, fields: &[(String, String)]) -> Result<()> {
        let mut records = self.inner.records.lock();
        if fields.is_empty() {
            records.remove(key);
        } else {
            records.insert(key.to_string(), fields.iter().cloned().collect());
        }
        Ok(())
    }

    async fn set_field_if_present(&self, key: &str, field: &str, value: &str) -> Result<bool> {
        let mut records = self.inner.records.lock();
        match records.get_mut(key) {
            Some(record) => {
                record.insert(field.to_string(), value.to_string());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_all_fields(&self, key: &str) -> Result<u64> {
        let removed = self.inner.records.lock().remove(key);
        Ok(removed.map_or(0, |record| record.len() as u64))
    }

    async fn read_all_fields(&self, key: &str) -> Result<HashMap<String, String>> {
        Ok(self.inner.records.lock().get(key).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl NotificationChannel for MemorySubstrate {
    async fn publish(&self, channel: &str, payload: &str) -> Result<u64> {
        let receivers = self.broadcast(channel, ChannelMessage::message(channel, payload));
        Ok(receivers as u64)
    }

    async fn subscribe(&self, channel: &str) -> Result<Box<dyn ChannelSubscription>> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::unbounded_channel();

        let count = {
            let mut channels = self.inner.channels.lock();
            let subscribers = channels.entry(channel.to_string()).or_default();
            subscribers.insert(id, sender.clone());
            subscribers.len()
        };

        // Acknowledge like a Redis server: payload is the subscription count
        let _ = sender.send(ChannelMessage::control(
            MessageKind::Subscribe,
            channel,
            count.to_string(),
        ));

        Ok(Box::new(MemorySubscription {
            inner: Arc::clone(&self.inner),
            channel: channel.to_string(),
            id,
            receiver,
            active: true,
        }))
    }
}

struct MemorySubscription {
    inner: Arc<Inner>,
    channel: String,
    id: u64,
    receiver: mpsc::UnboundedReceiver<ChannelMessage>,
    active: bool,
}

#[async_trait]
impl ChannelSubscription for MemorySubscription {
    fn channel(&self) -> &str {
        &self.channel
    }

    async fn next_message(&mut self) -> Option<Result<ChannelMessage>> {
        self.receiver.recv().await.map(Ok)
    }

    async fn unsubscribe(&mut self) -> Result<()> {
        if self.active {
            self.inner.release(&self.channel, self.id);
            *self
                .inner
                .unsubscribes
                .lock()
                .entry(self.channel.clone())
                .or_default() += 1;
            self.active = false;
        }
        Ok(())
    }
}

impl Drop for MemorySubscription {
    fn drop(&mut self) {
        self.inner.release(&self.channel, self.id);
    }
}
