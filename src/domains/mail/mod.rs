//! Mail sender (component B): builds an RFC-5322 message and dispatches it
//! through the provider's `messages.send` endpoint. The provider SDK is
//! treated as an opaque collaborator reached over plain `reqwest`, the same
//! way the rest of this codebase talks to external HTTP APIs.

use async_trait::async_trait;

use crate::common::base64url;
use crate::config::Config;
use crate::domains::oauth::token::fetch_access_token;
use crate::kernel::AppError;

const GMAIL_SEND_URL: &str = "https://gmail.googleapis.com/gmail/v1/users/me/messages/send";

/// Outcome of a successful send. Either field may be absent if the provider
/// omits it — callers must not assume a `thread_id` is always present.
#[derive(Debug, Clone, Default)]
pub struct SendOutcome {
    pub message_id: Option<String>,
    pub thread_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OutgoingMessage<'a> {
    pub from: &'a str,
    pub to: &'a str,
    pub subject: Option<&'a str>,
    pub body_text: Option<&'a str>,
}

/// The mail-sending capability, injected into the kernel so tests can
/// substitute a fake instead of talking to a real mail provider.
#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send(
        &self,
        refresh_token: &str,
        message: OutgoingMessage<'_>,
    ) -> Result<SendOutcome, AppError>;
}

/// Builds the RFC-5322 message: `From`, `To`, `Subject`, `MIME-Version: 1.0`,
/// `Content-Type: text/plain; charset="UTF-8"`, a blank line, then the body
/// (empty string if absent). Lines are joined with `\n`.
pub fn build_rfc5322_message(message: &OutgoingMessage<'_>) -> String {
    let subject = message.subject.unwrap_or_default();
    let body = message.body_text.unwrap_or_default();
    [
        format!("From: {}", message.from),
        format!("To: {}", message.to),
        format!("Subject: {subject}"),
        "MIME-Version: 1.0".to_string(),
        "Content-Type: text/plain; charset=\"UTF-8\"".to_string(),
        String::new(),
        body.to_string(),
    ]
    .join("\n")
}

pub struct GmailSender {
    client: reqwest::Client,
    config: std::sync::Arc<Config>,
}

impl GmailSender {
    pub fn new(client: reqwest::Client, config: std::sync::Arc<Config>) -> Self {
        Self { client, config }
    }
}

#[derive(serde::Serialize)]
struct SendRequest {
    raw: String,
}

#[derive(serde::Deserialize)]
struct SendResponse {
    id: Option<String>,
    #[serde(rename = "threadId")]
    thread_id: Option<String>,
}

#[async_trait]
impl MailSender for GmailSender {
    async fn send(
        &self,
        refresh_token: &str,
        message: OutgoingMessage<'_>,
    ) -> Result<SendOutcome, AppError> {
        let access_token = fetch_access_token(&self.client, &self.config, refresh_token).await?;

        let raw_message = build_rfc5322_message(&message);
        let raw = base64url::encode(raw_message.as_bytes());

        let resp = self
            .client
            .post(GMAIL_SEND_URL)
            .bearer_auth(access_token)
            .json(&SendRequest { raw })
            .send()
            .await
            .map_err(|e| AppError::SendError(format!("send request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(AppError::SendError(format!(
                "send returned {status}: {body}"
            )));
        }

        let parsed: SendResponse = resp
            .json()
            .await
            .map_err(|e| AppError::SendError(format!("send response malformed: {e}")))?;

        Ok(SendOutcome {
            message_id: parsed.id,
            thread_id: parsed.thread_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_has_blank_line_before_body() {
        let msg = OutgoingMessage {
            from: "me@example.com",
            to: "you@example.com",
            subject: Some("hi"),
            body_text: Some("line one\nline two"),
        };
        let built = build_rfc5322_message(&msg);
        let mut lines = built.split('\n');
        assert_eq!(lines.next(), Some("From: me@example.com"));
        assert_eq!(lines.next(), Some("To: you@example.com"));
        assert_eq!(lines.next(), Some("Subject: hi"));
        assert_eq!(lines.next(), Some("MIME-Version: 1.0"));
        assert_eq!(
            lines.next(),
            Some("Content-Type: text/plain; charset=\"UTF-8\"")
        );
        assert_eq!(lines.next(), Some(""));
        assert_eq!(lines.next(), Some("line one"));
        assert_eq!(lines.next(), Some("line two"));
    }

    #[test]
    fn missing_body_becomes_empty_string() {
        let msg = OutgoingMessage {
            from: "me@example.com",
            to: "you@example.com",
            subject: None,
            body_text: None,
        };
        let built = build_rfc5322_message(&msg);
        assert!(built.ends_with('\n'));
        assert!(built.contains("Subject: \n"));
    }

    #[test]
    fn raw_field_is_base64url_of_the_message() {
        let msg = OutgoingMessage {
            from: "me@example.com",
            to: "you@example.com",
            subject: Some("hi"),
            body_text: Some("body"),
        };
        let built = build_rfc5322_message(&msg);
        let encoded = base64url::encode(built.as_bytes());
        assert!(!encoded.contains('+'));
        assert!(!encoded.contains('/'));
        assert!(!encoded.contains('='));
        assert_eq!(base64url::decode(&encoded).unwrap(), built.as_bytes());
    }
}
