//! Redis Pub/Sub support.
//!
//! Every [`Subscription`] owns its own pub/sub connection. Messages are read
//! straight off that connection, so nothing is buffered between the socket
//! and the consumer, and dropping the subscription closes the connection.

use futures::StreamExt;
use redis::Client;
use tracing::{debug, info};

use crate::{RedisConfig, RedisError, Result};

/// A Redis Pub/Sub message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Channel name.
    pub channel: String,
    /// Message payload.
    pub payload: String,
}

/// A live subscription to one channel.
pub struct Subscription {
    pubsub: redis::aio::PubSub,
    channel: String,
    active: bool,
}

impl Subscription {
    /// Get the channel name.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Whether the subscription has not been unsubscribed yet.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Receive the next message.
    ///
    /// Returns `None` once the connection is closed. A message whose payload
    /// is not valid UTF-8 yields an error without ending the stream.
    pub async fn recv(&mut self) -> Option<Result<Message>> {
        let msg = self.pubsub.on_message().next().await?;

        let payload = match msg.get_payload::<String>() {
            Ok(payload) => payload,
            Err(e) => return Some(Err(RedisError::PubSub(e.to_string()))),
        };

        let message = Message {
            channel: msg.get_channel_name().to_string(),
            payload,
        };
        debug!(channel = %message.channel, "Received pub/sub message");

        Some(Ok(message))
    }

    /// Unsubscribe from the channel. Calling it again is a no-op.
    pub async fn unsubscribe(&mut self) -> Result<()> {
        if !self.active {
            return Ok(());
        }

        self.pubsub
            .unsubscribe(&self.channel)
            .await
            .map_err(|e| RedisError::PubSub(e.to_string()))?;
        self.active = false;

        info!(channel = %self.channel, "Unsubscribed from Redis channel");
        Ok(())
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        debug!(
            channel = %self.channel,
            subscribed = self.active,
            "Subscription connection released"
        );
    }
}

/// Redis Pub/Sub client.
pub struct PubSub {
    client: Client,
}

impl PubSub {
    /// Create a new Pub/Sub client.
    pub fn new(config: &RedisConfig) -> Result<Self> {
        let client = Client::open(config.connection_url())
            .map_err(|e| RedisError::Connection(e.to_string()))?;
        Ok(Self { client })
    }

    /// Subscribe to a channel on a dedicated connection.
    ///
    /// The subscription is confirmed by the server before this returns.
    pub async fn subscribe(&self, channel: &str) -> Result<Subscription> {
        let mut pubsub = self
            .client
            .get_async_pubsub()
            .await
            .map_err(|e| RedisError::Connection(e.to_string()))?;

        pubsub
            .subscribe(channel)
            .await
            .map_err(|e| RedisError::PubSub(e.to_string()))?;

        info!(channel = %channel, "Subscribed to Redis channel");

        Ok(Subscription {
            pubsub,
            channel: channel.to_string(),
            active: true,
        })
    }
}
