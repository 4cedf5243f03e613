//! Redis adapters for the job store and notification channel.

use async_trait::async_trait;
use fusion_redis::{RedisService, Subscription};
use std::collections::HashMap;
use std::sync::Arc;

use crate::channel::{ChannelMessage, ChannelSubscription, NotificationChannel};
use crate::store::JobStore;
use crate::Result;

/// Job store backed by Redis hashes.
#[derive(Clone)]
pub struct RedisJobStore {
    redis: Arc<RedisService>,
}

impl RedisJobStore {
    /// Create a store over a shared Redis service.
    pub fn new(redis: Arc<RedisService>) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl JobStore for RedisJobStore {
    async fn write_fields(&self, key: &str, fields: &[(String, String)]) -> Result<()> {
        Ok(self.redis.replace_hash(key, fields).await?)
    }

    async fn set_field_if_present(&self, key: &str, field: &str, value: &str) -> Result<bool> {
        Ok(self.redis.hset_if_exists(key, field, value).await?)
    }

    async fn delete_all_fields(&self, key: &str) -> Result<u64> {
        Ok(self.redis.delete_hash(key).await?)
    }

    async fn read_all_fields(&self, key: &str) -> Result<HashMap<String, String>> {
        Ok(self.redis.hgetall_map(key).await?)
    }
}

/// Notification channel backed by Redis pub/sub.
#[derive(Clone)]
pub struct RedisChannel {
    redis: Arc<RedisService>,
}

impl RedisChannel {
    /// Create a channel over a shared Redis service.
    pub fn new(redis: Arc<RedisService>) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl NotificationChannel for RedisChannel {
    async fn publish(&self, channel: &str, payload: &str) -> Result<u64> {
        Ok(self.redis.publish(channel, payload).await?)
    }

    async fn subscribe(&self, channel: &str) -> Result<Box<dyn ChannelSubscription>> {
        let subscription = self.redis.pubsub()?.subscribe(channel).await?;
        Ok(Box::new(RedisChannelSubscription { subscription }))
    }
}

/// A Redis subscription. Dropping it closes its pub/sub connection.
struct RedisChannelSubscription {
    subscription: Subscription,
}

#[async_trait]
impl ChannelSubscription for RedisChannelSubscription {
    fn channel(&self) -> &str {
        self.subscription.channel()
    }

    async fn next_message(&mut self) -> Option<Result<ChannelMessage>> {
        let received = self.subscription.recv().await?;
        Some(
            received
                .map(|message| ChannelMessage::message(message.channel, message.payload))
                .map_err(Into::into),
        )
    }

    async fn unsubscribe(&mut self) -> Result<()> {
        Ok(self.subscription.unsubscribe().await?)
    }
}
