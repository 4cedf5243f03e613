//! Integration tests for common Product Fusion workflows.
//!
//! These drive the account emails the backend sends through the top-level
//! re-exports, with the in-memory substrate standing in for Redis.

use async_trait::async_trait;
use parking_lot::Mutex;
use product_fusion::prelude::*;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

// =============================================================================
// Helpers
// =============================================================================

#[derive(Clone, Default)]
struct Outbox {
    delivered: Arc<Mutex<Vec<(String, String)>>>,
    bouncing: Arc<Mutex<Option<String>>>,
}

impl Outbox {
    fn subjects_for(&self, to: &str) -> Vec<String> {
        self.delivered
            .lock()
            .iter()
            .filter(|(recipient, _)| recipient == to)
            .map(|(_, subject)| subject.clone())
            .collect()
    }

    fn bounce(&self, to: &str) {
        *self.bouncing.lock() = Some(to.to_string());
    }
}

#[async_trait]
impl MailTransport for Outbox {
    async fn send(&self, to: &str, subject: &str, _html: &str) -> Delivery {
        if self.bouncing.lock().as_deref() == Some(to) {
            return Delivery::Failed {
                reason: "mailbox full".to_string(),
            };
        }
        self.delivered
            .lock()
            .push((to.to_string(), subject.to_string()));
        Delivery::Sent
    }
}

async fn wait_for_status(dispatch: &DispatchService, recipient: &str, status: JobStatus) {
    let reached = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if let Ok(Some(job)) = dispatch.fetch_job(recipient).await
                && job.status == status
            {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(reached.is_ok(), "{recipient} never reached {status}");
}

async fn running_dispatcher() -> (MemorySubstrate, Outbox, DispatchService) {
    let substrate = MemorySubstrate::new();
    let outbox = Outbox::default();
    let templates = HandlebarsEngine::transactional().unwrap();
    let dispatch =
        DispatchService::in_memory(&substrate, outbox.clone()).with_templates(templates);
    dispatch.start().await.unwrap();
    (substrate, outbox, dispatch)
}

// =============================================================================
// Account Lifecycle
// =============================================================================

#[tokio::test]
async fn test_signup_then_password_reset() {
    let (_substrate, outbox, dispatch) = running_dispatcher().await;
    let user = "grace@example.com";

    dispatch
        .enqueue_template(
            user,
            templates::VERIFY_EMAIL,
            &json!({ "email": user, "link": "https://fusion.example.com/verify/abc" }),
        )
        .await
        .unwrap();
    wait_for_status(&dispatch, user, JobStatus::Sent).await;

    dispatch
        .enqueue_template(
            user,
            templates::PASSWORD_RESET,
            &json!({ "link": "https://fusion.example.com/reset/xyz" }),
        )
        .await
        .unwrap();
    wait_for_status(&dispatch, user, JobStatus::Sent).await;

    assert_eq!(
        outbox.subjects_for(user),
        vec!["Welcome - Verify Your Email", "Password Reset Request"]
    );

    // One record per recipient; the newest job replaced the first.
    let record = dispatch.fetch(user).await.unwrap();
    assert_eq!(record.get("subject").map(String::as_str), Some("Password Reset Request"));
    assert_eq!(record.get("template").map(String::as_str), Some("password_reset"));

    let stats = dispatch.stats();
    assert_eq!((stats.received, stats.sent, stats.failed), (2, 2, 0));
    assert_eq!(dispatch.stop().await, SubscriberExit::Cancelled);
}

#[tokio::test]
async fn test_bounced_login_alert_stays_queued() {
    let (_substrate, outbox, dispatch) = running_dispatcher().await;
    let user = "linus@example.com";
    outbox.bounce(user);

    dispatch
        .enqueue_template(
            user,
            templates::LOGIN_ALERT,
            &json!({
                "email": user,
                "time": "2024-05-01 09:30 UTC",
                "ip": "203.0.113.7",
                "user_agent": "Firefox"
            }),
        )
        .await
        .unwrap();

    let settled = tokio::time::timeout(Duration::from_secs(2), async {
        while dispatch.stats().failed == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(settled.is_ok());

    let job = dispatch.fetch_job(user).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Queued);
    assert!(outbox.subjects_for(user).is_empty());

    dispatch.stop().await;
}

#[tokio::test]
async fn test_account_deletion_removes_pending_email() {
    let substrate = MemorySubstrate::new();
    let dispatch = DispatchService::in_memory(&substrate, Outbox::default());
    let user = "ada@example.com";

    // Not published and no subscriber running: the job just sits in the store.
    dispatch
        .enqueue(user, EmailJob::new("Password Updated", "<p>Done.</p>"), false)
        .await
        .unwrap();
    assert_eq!(substrate.record_count(), 1);

    assert!(dispatch.remove(user).await.unwrap() > 0);
    assert_eq!(dispatch.remove(user).await.unwrap(), 0);
    assert!(dispatch.fetch(user).await.unwrap().is_empty());
    assert!(!dispatch.mark_sent(user).await.unwrap());
    assert_eq!(substrate.record_count(), 0);
}

#[tokio::test]
async fn test_member_invite_on_custom_channel() {
    let substrate = MemorySubstrate::new();
    let outbox = Outbox::default();
    let dispatch = DispatchService::in_memory(&substrate, outbox.clone())
        .with_channel_name("invites")
        .with_templates(HandlebarsEngine::transactional().unwrap());
    dispatch.start().await.unwrap();

    assert_eq!(substrate.active_subscriptions("invites"), 1);
    assert_eq!(substrate.active_subscriptions(EMAIL_CHANNEL), 0);

    let invitee = "hopper@example.com";
    dispatch
        .enqueue_template(
            invitee,
            templates::MEMBER_INVITE,
            &json!({
                "email": invitee,
                "organization": "Acme & Co",
                "link": "https://fusion.example.com/invite/42"
            }),
        )
        .await
        .unwrap();
    wait_for_status(&dispatch, invitee, JobStatus::Sent).await;

    let subjects = outbox.subjects_for(invitee);
    assert_eq!(subjects.len(), 1);
    assert!(subjects[0].contains("Acme & Co"));

    dispatch.stop().await;
    assert_eq!(substrate.active_subscriptions("invites"), 0);
}

// =============================================================================
// Wiring
// =============================================================================

#[test]
fn test_default_settings_wire_up() {
    let settings = Settings::default();
    assert!(settings.validate().is_ok());

    let security: SmtpSecurity = settings.smtp_security.parse().unwrap();
    assert_eq!(security.default_port(), settings.smtp_port);

    assert!(settings.log_level.is_none());
    assert_eq!(LogConfig::default().level, Level::Info);
}

// The prelude must leave `std::result::Result` usable with two parameters.
fn smtp_from(settings: &Settings) -> Result<SmtpConfig, Box<dyn std::error::Error>> {
    let security: SmtpSecurity = settings.smtp_security.parse()?;
    Ok(SmtpConfig::new(&settings.smtp_server).security(security))
}

#[test]
fn test_prelude_keeps_std_result() {
    let settings = Settings {
        smtp_security: "starttls".to_string(),
        ..Settings::default()
    };
    let config = smtp_from(&settings).unwrap();
    assert_eq!(config.security, SmtpSecurity::StartTls);

    let settings = Settings {
        smtp_security: "carrier-pigeon".to_string(),
        ..Settings::default()
    };
    assert!(smtp_from(&settings).is_err());
}
