//! Pipeline tests against a live Redis.

use async_trait::async_trait;
use fusion_dispatch::*;
use fusion_redis::{RedisConfig, RedisService};
use std::sync::Arc;
use std::time::Duration;

struct AcceptAll;

#[async_trait]
impl MailTransport for AcceptAll {
    async fn send(&self, _to: &str, _subject: &str, _html: &str) -> Delivery {
        Delivery::Sent
    }
}

async fn redis() -> Arc<RedisService> {
    let config = RedisConfig::builder()
        .url("redis://localhost:6379")
        .pool_size(4)
        .build();
    Arc::new(RedisService::new(config).await.unwrap())
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_redis_job_is_sent_and_marked() {
    let redis = redis().await;
    let dispatch = DispatchService::redis(Arc::clone(&redis), AcceptAll)
        .with_channel_name("fusion-dispatch:test:sent");
    let recipient = "redis-sent@example.com";
    dispatch.remove(recipient).await.unwrap();

    dispatch.start().await.unwrap();
    dispatch
        .queue(recipient, EmailJob::new("Hello", "<p>Hi</p>"))
        .await
        .unwrap();

    let marked = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let fields = dispatch.fetch(recipient).await.unwrap();
            if fields.get(FIELD_STATUS).map(String::as_str) == Some("sent") {
                return fields;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .unwrap();

    assert_eq!(marked[FIELD_EMAIL], recipient);
    assert_eq!(marked[FIELD_SUBJECT], "Hello");
    assert_eq!(dispatch.stop().await, SubscriberExit::Cancelled);

    assert_eq!(dispatch.remove(recipient).await.unwrap(), 4);
    assert_eq!(dispatch.remove(recipient).await.unwrap(), 0);
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_redis_unpublished_job_stays_queued() {
    let redis = redis().await;
    let dispatch = DispatchService::redis(redis, AcceptAll)
        .with_channel_name("fusion-dispatch:test:unpublished");
    let recipient = "redis-unpublished@example.com";

    dispatch
        .enqueue(recipient, EmailJob::new("Later", "<p>Later</p>"), false)
        .await
        .unwrap();

    let job = dispatch.fetch_job(recipient).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Queued);
    assert!(dispatch.mark_sent(recipient).await.unwrap());
    assert_eq!(
        dispatch.fetch_job(recipient).await.unwrap().unwrap().status,
        JobStatus::Sent
    );

    dispatch.remove(recipient).await.unwrap();
    assert!(!dispatch.mark_sent(recipient).await.unwrap());
}
