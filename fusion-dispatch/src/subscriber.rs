//! The subscriber task: listen, decode, send, mark sent.

use fusion_mail::Delivery;
use futures::FutureExt;
use parking_lot::Mutex;
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::channel::{ChannelMessage, ChannelSubscription};
use crate::job::EmailJob;
use crate::service::mark_job_sent;
use crate::store::JobStore;
use crate::transport::MailTransport;

/// Lifecycle of the subscriber task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubscriberState {
    /// No task is running.
    #[default]
    Stopped,
    /// The task is consuming messages.
    Running,
    /// Cancellation was requested and the task is winding down.
    Cancelling,
}

impl fmt::Display for SubscriberState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Stopped => "stopped",
            Self::Running => "running",
            Self::Cancelling => "cancelling",
        })
    }
}

/// Why the subscriber task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriberExit {
    /// No task was running.
    NotRunning,
    /// Stopped on request.
    Cancelled,
    /// The channel closed underneath the task.
    ChannelClosed,
    /// The task panicked or could not be joined.
    Failed(String),
}

impl fmt::Display for SubscriberExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotRunning => f.write_str("not running"),
            Self::Cancelled => f.write_str("cancelled"),
            Self::ChannelClosed => f.write_str("channel closed"),
            Self::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Pipeline counters shared between the service and its task.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) received: AtomicU64,
    pub(crate) sent: AtomicU64,
    pub(crate) failed: AtomicU64,
    pub(crate) skipped: AtomicU64,
}

impl Counters {
    fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// The per-message half of the pipeline.
#[derive(Clone)]
pub(crate) struct Pipeline {
    pub(crate) store: Arc<dyn JobStore>,
    pub(crate) transport: Arc<dyn MailTransport>,
    pub(crate) counters: Arc<Counters>,
}

/// Everything the running task owns.
pub(crate) struct SubscriberTask {
    pub(crate) subscription: Box<dyn ChannelSubscription>,
    pub(crate) pipeline: Pipeline,
    pub(crate) state: Arc<Mutex<SubscriberState>>,
    pub(crate) token: CancellationToken,
}

impl SubscriberTask {
    /// Run the task, reporting a panic as [`SubscriberExit::Failed`].
    ///
    /// The state is reset to `Stopped` when the task dies, so a dead task is
    /// never reported as running.
    pub(crate) async fn supervise(self) -> SubscriberExit {
        let state = Arc::clone(&self.state);
        match AssertUnwindSafe(self.run()).catch_unwind().await {
            Ok(exit) => exit,
            Err(panic) => {
                let reason = panic_reason(panic.as_ref());
                error!(reason = %reason, "Subscriber task panicked");
                *state.lock() = SubscriberState::Stopped;
                SubscriberExit::Failed(reason)
            }
        }
    }

    /// Consume messages until cancelled or the channel ends.
    ///
    /// Unsubscribes before returning; the subscription and its connection
    /// are dropped with the task.
    pub(crate) async fn run(mut self) -> SubscriberExit {
        let channel = self.subscription.channel().to_string();
        info!(channel = %channel, "Subscriber started");

        let exit = loop {
            let next = tokio::select! {
                biased;
                _ = self.token.cancelled() => break SubscriberExit::Cancelled,
                next = self.subscription.next_message() => next,
            };

            match next {
                Some(Ok(message)) => {
                    let handled = AssertUnwindSafe(self.pipeline.handle(message))
                        .catch_unwind()
                        .await;
                    if let Err(panic) = handled {
                        Counters::incr(&self.pipeline.counters.failed);
                        error!(
                            channel = %channel,
                            reason = %panic_reason(panic.as_ref()),
                            "Message handler panicked, job left as it was"
                        );
                    }
                }
                Some(Err(e)) => {
                    Counters::incr(&self.pipeline.counters.skipped);
                    warn!(channel = %channel, error = %e, "Dropping unreadable message");
                }
                None => break SubscriberExit::ChannelClosed,
            }
        };

        if let Err(e) = self.subscription.unsubscribe().await {
            debug!(channel = %channel, error = %e, "Unsubscribe failed");
        }

        match &exit {
            SubscriberExit::Cancelled => info!(channel = %channel, "Subscriber stopped"),
            other => {
                error!(channel = %channel, exit = %other, "Subscriber ended unexpectedly");
                *self.state.lock() = SubscriberState::Stopped;
            }
        }

        exit
    }
}

impl Pipeline {
    /// Handle one message. Nothing in here ends the loop.
    async fn handle(&self, message: ChannelMessage) {
        if !message.is_payload() {
            debug!(kind = ?message.kind, channel = %message.channel, "Ignoring control message");
            return;
        }
        Counters::incr(&self.counters.received);

        let job = match EmailJob::from_payload(&message.payload) {
            Ok(Some(job)) => job,
            Ok(None) => {
                Counters::incr(&self.counters.skipped);
                debug!(channel = %message.channel, "Skipping empty payload");
                return;
            }
            Err(e) => {
                Counters::incr(&self.counters.skipped);
                warn!(channel = %message.channel, error = %e, "Skipping undecodable payload");
                return;
            }
        };

        match self
            .transport
            .send(&job.recipient, &job.subject, &job.body)
            .await
        {
            Delivery::Sent => {
                Counters::incr(&self.counters.sent);
                match mark_job_sent(self.store.as_ref(), &job.recipient).await {
                    Ok(true) => info!(recipient = %job.recipient, "Email sent"),
                    Ok(false) => {
                        debug!(recipient = %job.recipient, "Email sent but job record is gone")
                    }
                    Err(e) => {
                        error!(recipient = %job.recipient, error = %e, "Failed to mark job sent")
                    }
                }
            }
            Delivery::Failed { reason } => {
                Counters::incr(&self.counters.failed);
                warn!(
                    recipient = %job.recipient,
                    reason = %reason,
                    "Email delivery failed, job left queued"
                );
            }
        }
    }
}

fn panic_reason(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_reason() {
        let reason = std::panic::catch_unwind(|| {
            panic!("transport bug");
        })
        .unwrap_err();
        assert_eq!(panic_reason(reason.as_ref()), "transport bug");

        let code = 7;
        let reason = std::panic::catch_unwind(|| {
            panic!("bad code {code}");
        })
        .unwrap_err();
        assert_eq!(panic_reason(reason.as_ref()), "bad code 7");

        let reason = std::panic::catch_unwind(|| {
            std::panic::panic_any(42_u8);
        })
        .unwrap_err();
        assert_eq!(panic_reason(reason.as_ref()), "unknown panic");
    }

    #[test]
    fn test_exit_display() {
        assert_eq!(SubscriberExit::ChannelClosed.to_string(), "channel closed");
        assert_eq!(
            SubscriberExit::Failed("boom".to_string()).to_string(),
            "failed: boom"
        );
        assert_eq!(SubscriberState::Cancelling.to_string(), "cancelling");
    }
}
