//! Integration tests for fusion-mail

use async_trait::async_trait;
use fusion_mail::*;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Records every email it is asked to send; optionally refuses them all.
#[derive(Clone, Default)]
struct RecordingTransport {
    sent: Arc<Mutex<Vec<Email>>>,
    refuse: bool,
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, email: &Email) -> Result<()> {
        if self.refuse {
            return Err(MailError::Smtp("550 mailbox unavailable".to_string()));
        }
        self.sent.lock().await.push(email.clone());
        Ok(())
    }
}

fn mailer(transport: &RecordingTransport) -> Mailer {
    Mailer::new(transport.clone())
        .default_from("Product Fusion <noreply@fusion.example.com>")
        .unwrap()
}

#[tokio::test]
async fn test_deliver_applies_default_sender() {
    let transport = RecordingTransport::default();
    let delivery = mailer(&transport)
        .deliver("ada@example.com", "Password Updated", "<p>updated</p>")
        .await;

    assert_eq!(delivery, Delivery::Sent);

    let sent = transport.sent.lock().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(
        sent[0].from.as_ref().map(Address::email),
        Some("noreply@fusion.example.com")
    );
    assert_eq!(sent[0].to[0].email, "ada@example.com");
    assert_eq!(sent[0].html.as_deref(), Some("<p>updated</p>"));
}

#[tokio::test]
async fn test_deliver_reports_transport_failure() {
    let transport = RecordingTransport {
        refuse: true,
        ..Default::default()
    };
    let delivery = mailer(&transport)
        .deliver("ada@example.com", "Password Updated", "<p>updated</p>")
        .await;

    match delivery {
        Delivery::Failed { reason } => assert!(reason.contains("550")),
        Delivery::Sent => panic!("refused send reported as delivered"),
    }
}

#[tokio::test]
async fn test_deliver_rejects_bad_recipient_without_sending() {
    let transport = RecordingTransport::default();
    let delivery = mailer(&transport)
        .deliver("not-an-address", "Hello", "<p>hi</p>")
        .await;

    assert!(!delivery.is_sent());
    assert!(transport.sent.lock().await.is_empty());
}

#[tokio::test]
async fn test_send_without_sender_fails() {
    let transport = RecordingTransport::default();
    let result = Mailer::new(transport.clone())
        .send_html("ada@example.com", "Hello", "<p>hi</p>")
        .await;

    assert!(matches!(result, Err(MailError::MissingField("from"))));
    assert!(transport.sent.lock().await.is_empty());
}

#[tokio::test]
async fn test_deliver_rendered_template() {
    let transport = RecordingTransport::default();
    let engine = HandlebarsEngine::transactional().unwrap();
    let rendered = engine
        .render(
            templates::PASSWORD_UPDATED,
            &json!({ "email": "ada@example.com" }),
        )
        .unwrap();

    let delivery = mailer(&transport)
        .deliver(
            "ada@example.com",
            rendered.subject.as_deref().unwrap(),
            rendered.html.as_deref().unwrap(),
        )
        .await;
    assert!(delivery.is_sent());

    let sent = transport.sent.lock().await;
    assert_eq!(sent[0].subject.as_deref(), Some("Password Updated"));
    assert!(sent[0].html.as_deref().unwrap().contains("ada@example.com"));
}

#[test]
fn test_transactional_templates() {
    let engine = HandlebarsEngine::transactional().unwrap();

    let verify = engine
        .render(
            templates::VERIFY_EMAIL,
            &json!({
                "email": "ada@example.com",
                "link": "https://fusion.example.com/api/auth/verify-email",
            }),
        )
        .unwrap();
    assert_eq!(verify.subject.as_deref(), Some("Welcome - Verify Your Email"));
    assert!(verify
        .html
        .unwrap()
        .contains("https://fusion.example.com/api/auth/verify-email"));

    let login = engine
        .render(
            templates::LOGIN_ALERT,
            &json!({
                "email": "ada@example.com",
                "time": "2024-05-01 10:00:00",
                "ip": "10.0.0.7",
                "user_agent": "curl",
            }),
        )
        .unwrap();
    assert_eq!(login.subject.as_deref(), Some("New Login Detected"));
    assert!(login.html.unwrap().contains("10.0.0.7"));

    let reset = engine
        .render(templates::PASSWORD_RESET, &json!({ "link": "https://fusion.example.com/reset" }))
        .unwrap();
    assert_eq!(reset.subject.as_deref(), Some("Password Reset Request"));
    assert!(reset.text.is_none());

    let invite = engine
        .render(
            templates::MEMBER_INVITE,
            &json!({
                "email": "ada@example.com",
                "organization": "Acme & Co",
                "link": "https://fusion.example.com/invite",
            }),
        )
        .unwrap();
    assert_eq!(invite.subject.as_deref(), Some("You're Invited to Acme & Co"));
    assert!(invite.html.unwrap().contains("Acme &amp; Co"));
}

#[test]
fn test_rendered_values_are_escaped() {
    let engine = HandlebarsEngine::transactional().unwrap();
    let rendered = engine
        .render(
            templates::PASSWORD_UPDATED,
            &json!({ "email": "<script>alert(1)</script>" }),
        )
        .unwrap();

    let html = rendered.html.unwrap();
    assert!(!html.contains("<script>"));
    assert!(html.contains("&lt;script&gt;"));
}
