//! The dispatch service.

use fusion_mail::TemplateEngine;
use fusion_redis::RedisService;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::channel::{EMAIL_CHANNEL, NotificationChannel};
use crate::job::{EmailJob, FIELD_STATUS, JobStatus};
use crate::memory::MemorySubstrate;
use crate::redis::{RedisChannel, RedisJobStore};
use crate::store::{JobStore, job_key};
use crate::subscriber::{Counters, Pipeline, SubscriberExit, SubscriberState, SubscriberTask};
use crate::transport::MailTransport;
use crate::{DispatchError, Result};

/// Set a job's status to `sent` if its record still exists.
pub(crate) async fn mark_job_sent(store: &dyn JobStore, recipient: &str) -> Result<bool> {
    store
        .set_field_if_present(&job_key(recipient), FIELD_STATUS, JobStatus::Sent.as_str())
        .await
}

/// Snapshot of the pipeline counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchStats {
    /// Payload messages received by the subscriber.
    pub received: u64,
    /// Emails the transport accepted.
    pub sent: u64,
    /// Emails the transport refused.
    pub failed: u64,
    /// Messages skipped as empty or undecodable.
    pub skipped: u64,
    /// Current subscriber state.
    pub state: SubscriberState,
}

struct RunningSubscriber {
    channel: String,
    token: CancellationToken,
    handle: JoinHandle<SubscriberExit>,
}

/// Queues email jobs and runs the subscriber that delivers them.
///
/// Producers call [`DispatchService::queue`]; the record is written with
/// status `queued` and a copy is published on the channel. The subscriber
/// started with [`DispatchService::start`] sends each published job and
/// marks it `sent`. A failed send leaves the job `queued`; nothing retries it.
///
/// An enqueue for a recipient that lands while the subscriber is still
/// marking that recipient's previous job can leave the new job marked
/// `sent`.
pub struct DispatchService {
    channel: Arc<dyn NotificationChannel>,
    channel_name: String,
    pipeline: Pipeline,
    templates: Option<Arc<dyn TemplateEngine>>,
    state: Arc<Mutex<SubscriberState>>,
    subscriber: tokio::sync::Mutex<Option<RunningSubscriber>>,
}

impl DispatchService {
    /// Create a service over any store, channel and transport.
    pub fn new(
        store: impl JobStore + 'static,
        channel: impl NotificationChannel + 'static,
        transport: impl MailTransport + 'static,
    ) -> Self {
        Self {
            channel: Arc::new(channel),
            channel_name: EMAIL_CHANNEL.to_string(),
            pipeline: Pipeline {
                store: Arc::new(store),
                transport: Arc::new(transport),
                counters: Arc::new(Counters::default()),
            },
            templates: None,
            state: Arc::new(Mutex::new(SubscriberState::Stopped)),
            subscriber: tokio::sync::Mutex::new(None),
        }
    }

    /// Create a service backed by Redis.
    pub fn redis(redis: Arc<RedisService>, transport: impl MailTransport + 'static) -> Self {
        Self::new(
            RedisJobStore::new(Arc::clone(&redis)),
            RedisChannel::new(redis),
            transport,
        )
    }

    /// Create a service backed by an in-memory substrate.
    pub fn in_memory(substrate: &MemorySubstrate, transport: impl MailTransport + 'static) -> Self {
        Self::new(substrate.clone(), substrate.clone(), transport)
    }

    /// Publish on a channel other than [`EMAIL_CHANNEL`].
    pub fn with_channel_name(mut self, channel: impl Into<String>) -> Self {
        self.channel_name = channel.into();
        self
    }

    /// Set the template engine used by [`DispatchService::enqueue_template`].
    pub fn with_templates(mut self, engine: impl TemplateEngine + 'static) -> Self {
        self.templates = Some(Arc::new(engine));
        self
    }

    /// The channel jobs are published on.
    pub fn channel_name(&self) -> &str {
        &self.channel_name
    }

    /// Write a job for `recipient` and optionally publish it.
    ///
    /// Any existing record for the recipient is replaced. The record is
    /// written before it is published. Returns the job as stored.
    pub async fn enqueue(&self, recipient: &str, job: EmailJob, publish: bool) -> Result<EmailJob> {
        if recipient.trim().is_empty() {
            return Err(DispatchError::EmptyRecipient);
        }

        let job = EmailJob {
            recipient: recipient.to_string(),
            status: JobStatus::Queued,
            ..job
        };

        self.pipeline
            .store
            .write_fields(&job_key(recipient), &job.to_fields())
            .await?;

        if publish {
            let payload = job.to_payload()?;
            let receivers = self.channel.publish(&self.channel_name, &payload).await?;
            if receivers == 0 {
                warn!(
                    channel = %self.channel_name,
                    recipient = %recipient,
                    "Job published with no subscriber listening"
                );
            }
        }

        info!(recipient = %recipient, publish, "Email job queued");
        Ok(job)
    }

    /// Write and publish a job. What every producer uses.
    pub async fn queue(&self, recipient: &str, job: EmailJob) -> Result<EmailJob> {
        self.enqueue(recipient, job, true).await
    }

    /// Render a registered template and queue the result.
    pub async fn enqueue_template(
        &self,
        recipient: &str,
        template: &str,
        context: &serde_json::Value,
    ) -> Result<EmailJob> {
        let engine = self
            .templates
            .as_ref()
            .ok_or_else(|| DispatchError::Template("no template engine configured".to_string()))?;

        let rendered = engine.render(template, context)?;
        let subject = rendered
            .subject
            .ok_or_else(|| DispatchError::Template(format!("template {} has no subject", template)))?;
        let body = rendered
            .html
            .or(rendered.text)
            .ok_or_else(|| DispatchError::Template(format!("template {} has no body", template)))?;

        let job = EmailJob::new(subject, body).with_field("template", template);
        self.queue(recipient, job).await
    }

    /// Mark the recipient's job `sent`. Returns `false` when there is no job.
    pub async fn mark_sent(&self, recipient: &str) -> Result<bool> {
        mark_job_sent(self.pipeline.store.as_ref(), recipient).await
    }

    /// Delete the recipient's job, returning how many fields it held.
    pub async fn remove(&self, recipient: &str) -> Result<u64> {
        let removed = self
            .pipeline
            .store
            .delete_all_fields(&job_key(recipient))
            .await?;
        debug!(recipient = %recipient, fields = removed, "Email job removed");
        Ok(removed)
    }

    /// Read the recipient's raw job record. Empty when there is none.
    pub async fn fetch(&self, recipient: &str) -> Result<HashMap<String, String>> {
        self.pipeline
            .store
            .read_all_fields(&job_key(recipient))
            .await
    }

    /// Read and decode the recipient's job.
    pub async fn fetch_job(&self, recipient: &str) -> Result<Option<EmailJob>> {
        let fields = self.fetch(recipient).await?;
        if fields.is_empty() {
            return Ok(None);
        }
        EmailJob::from_fields(fields).map(Some)
    }

    /// Start the subscriber on the configured channel.
    pub async fn start(&self) -> Result<()> {
        self.start_on(&self.channel_name).await
    }

    /// Start the subscriber on `channel`.
    ///
    /// The subscription is live when this returns. Does nothing if the
    /// subscriber is already running.
    pub async fn start_on(&self, channel: &str) -> Result<()> {
        let mut slot = self.subscriber.lock().await;

        if let Some(running) = slot.as_ref()
            && !running.handle.is_finished()
            && *self.state.lock() != SubscriberState::Stopped
        {
            debug!(channel = %running.channel, "Subscriber already running");
            return Ok(());
        }

        // A task that ended on its own is reaped before starting a new one
        if let Some(previous) = slot.take() {
            let exit = join(previous.handle).await;
            debug!(channel = %previous.channel, exit = %exit, "Reaped finished subscriber");
        }

        let subscription = self.channel.subscribe(channel).await?;
        let token = CancellationToken::new();
        let task = SubscriberTask {
            subscription,
            pipeline: self.pipeline.clone(),
            state: Arc::clone(&self.state),
            token: token.clone(),
        };

        *self.state.lock() = SubscriberState::Running;
        let handle = tokio::spawn(task.supervise());

        *slot = Some(RunningSubscriber {
            channel: channel.to_string(),
            token,
            handle,
        });
        Ok(())
    }

    /// Stop the subscriber and wait for it to finish.
    ///
    /// The task unsubscribes before this returns. Safe to call at any time;
    /// returns [`SubscriberExit::NotRunning`] when there is nothing to stop.
    pub async fn stop(&self) -> SubscriberExit {
        let mut slot = self.subscriber.lock().await;
        let Some(running) = slot.take() else {
            return SubscriberExit::NotRunning;
        };

        *self.state.lock() = SubscriberState::Cancelling;
        running.token.cancel();
        let exit = join(running.handle).await;
        *self.state.lock() = SubscriberState::Stopped;

        info!(channel = %running.channel, exit = %exit, "Subscriber shut down");
        exit
    }

    /// Whether the subscriber task is running.
    pub fn is_running(&self) -> bool {
        *self.state.lock() == SubscriberState::Running
    }

    /// Current counters and subscriber state.
    pub fn stats(&self) -> DispatchStats {
        let counters = &self.pipeline.counters;
        DispatchStats {
            received: counters.received.load(Ordering::Relaxed),
            sent: counters.sent.load(Ordering::Relaxed),
            failed: counters.failed.load(Ordering::Relaxed),
            skipped: counters.skipped.load(Ordering::Relaxed),
            state: *self.state.lock(),
        }
    }
}

impl Drop for DispatchService {
    fn drop(&mut self) {
        if let Some(running) = self.subscriber.get_mut().as_ref() {
            running.token.cancel();
        }
    }
}

async fn join(handle: JoinHandle<SubscriberExit>) -> SubscriberExit {
    match handle.await {
        Ok(exit) => exit,
        Err(e) => SubscriberExit::Failed(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use fusion_mail::Delivery;

    struct NullTransport;

    #[async_trait]
    impl MailTransport for NullTransport {
        async fn send(&self, _to: &str, _subject: &str, _html: &str) -> Delivery {
            Delivery::Sent
        }
    }

    fn service() -> (MemorySubstrate, DispatchService) {
        let substrate = MemorySubstrate::new();
        let service = DispatchService::in_memory(&substrate, NullTransport);
        (substrate, service)
    }

    #[tokio::test]
    async fn test_enqueue_rejects_empty_recipient() {
        let (substrate, service) = service();
        let err = service
            .queue("  ", EmailJob::new("s", "b"))
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::EmptyRecipient));
        assert_eq!(substrate.record_count(), 0);
    }

    #[tokio::test]
    async fn test_enqueue_forces_recipient_and_status() {
        let (_substrate, service) = service();
        let job = EmailJob {
            status: JobStatus::Sent,
            ..EmailJob::new("Hello", "<p>hi</p>").recipient("someone-else@example.com")
        };

        let stored = service.enqueue("ada@example.com", job, false).await.unwrap();

        assert_eq!(stored.recipient, "ada@example.com");
        assert_eq!(stored.status, JobStatus::Queued);
        assert_eq!(service.fetch_job("ada@example.com").await.unwrap(), Some(stored));
    }

    #[tokio::test]
    async fn test_enqueue_without_publish_is_silent() {
        let (substrate, service) = service();
        let mut subscription = substrate.subscribe(EMAIL_CHANNEL).await.unwrap();
        let _ack = subscription.next_message().await;

        service
            .enqueue("ada@example.com", EmailJob::new("s", "b"), false)
            .await
            .unwrap();
        service
            .queue("bob@example.com", EmailJob::new("s", "b"))
            .await
            .unwrap();

        let message = subscription.next_message().await.unwrap().unwrap();
        let job = EmailJob::from_payload(&message.payload).unwrap().unwrap();
        assert_eq!(job.recipient, "bob@example.com");
    }

    #[tokio::test]
    async fn test_channel_name_override() {
        let substrate = MemorySubstrate::new();
        let service =
            DispatchService::in_memory(&substrate, NullTransport).with_channel_name("staging-email");
        service.start().await.unwrap();

        assert_eq!(service.channel_name(), "staging-email");
        assert_eq!(substrate.active_subscriptions("staging-email"), 1);
        assert_eq!(substrate.active_subscriptions(EMAIL_CHANNEL), 0);

        assert_eq!(service.stop().await, SubscriberExit::Cancelled);
    }

    #[tokio::test]
    async fn test_enqueue_template_requires_engine() {
        let (_substrate, service) = service();
        let err = service
            .enqueue_template("ada@example.com", "password_reset", &serde_json::json!({}))
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::Template(_)));
    }
}
