//! Notification channel port.

use async_trait::async_trait;

use crate::Result;

/// The channel job notifications are published on.
pub const EMAIL_CHANNEL: &str = "email-channel";

/// What a channel delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// A published payload.
    Message,
    /// Subscription acknowledgement.
    Subscribe,
    /// Unsubscription acknowledgement.
    Unsubscribe,
}

/// A message received from a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMessage {
    /// Message kind.
    pub kind: MessageKind,
    /// Channel the message arrived on.
    pub channel: String,
    /// Raw payload.
    pub payload: String,
}

impl ChannelMessage {
    /// A published payload.
    pub fn message(channel: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Message,
            channel: channel.into(),
            payload: payload.into(),
        }
    }

    /// A control message such as a subscription acknowledgement.
    pub fn control(kind: MessageKind, channel: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            kind,
            channel: channel.into(),
            payload: payload.into(),
        }
    }

    /// Whether this carries a published payload.
    pub fn is_payload(&self) -> bool {
        self.kind == MessageKind::Message
    }
}

/// A live subscription to one channel.
///
/// Implementations own their connection and release it on drop.
#[async_trait]
pub trait ChannelSubscription: Send {
    /// The subscribed channel.
    fn channel(&self) -> &str;

    /// Wait for the next message. `None` means the channel is closed.
    async fn next_message(&mut self) -> Option<Result<ChannelMessage>>;

    /// Stop receiving messages. Calling it again is a no-op.
    async fn unsubscribe(&mut self) -> Result<()>;
}

/// Pub/sub transport for job notifications.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Publish a payload, returning how many subscribers received it.
    async fn publish(&self, channel: &str, payload: &str) -> Result<u64>;

    /// Subscribe to a channel. The subscription is live when this returns.
    async fn subscribe(&self, channel: &str) -> Result<Box<dyn ChannelSubscription>>;
}
