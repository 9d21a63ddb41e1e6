//! Reply detector (component C): has the recipient replied to a thread
//! since a given watermark?
//!
//! Fail-safe bias: a list-level provider error returns `false` rather than
//! propagating, because stopping a sequence on a transient error is judged
//! worse than sending one unwanted follow-up. Callers must not rely on this
//! for anything load-bearing like legal opt-out.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::config::Config;
use crate::domains::oauth::token::fetch_access_token;
use crate::kernel::AppError;

const MAX_MESSAGES_PER_THREAD: usize = 20;

#[async_trait]
pub trait ReplyDetector: Send + Sync {
    /// `thread_id` may be absent (no send has ever produced one) — in that
    /// case there is nothing to check and the answer is always `false`.
    async fn has_replied(
        &self,
        refresh_token: &str,
        thread_id: Option<&str>,
        recipient_email: &str,
        since: DateTime<Utc>,
    ) -> Result<bool, AppError>;
}

pub struct GmailReplyDetector {
    client: reqwest::Client,
    config: std::sync::Arc<Config>,
}

impl GmailReplyDetector {
    pub fn new(client: reqwest::Client, config: std::sync::Arc<Config>) -> Self {
        Self { client, config }
    }
}

#[derive(serde::Deserialize)]
struct ThreadResponse {
    messages: Option<Vec<ThreadMessage>>,
}

#[derive(serde::Deserialize)]
struct ThreadMessage {
    id: String,
}

#[derive(serde::Deserialize)]
struct MessageMetadata {
    payload: Option<MessagePayload>,
}

#[derive(serde::Deserialize)]
struct MessagePayload {
    headers: Option<Vec<MessageHeader>>,
}

#[derive(serde::Deserialize)]
struct MessageHeader {
    name: String,
    value: String,
}

#[async_trait]
impl ReplyDetector for GmailReplyDetector {
    async fn has_replied(
        &self,
        refresh_token: &str,
        thread_id: Option<&str>,
        recipient_email: &str,
        since: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let Some(thread_id) = thread_id else {
            return Ok(false);
        };

        let access_token = match fetch_access_token(&self.client, &self.config, refresh_token).await
        {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(error = %e, "reply detector: access token exchange failed, defaulting to no-reply");
                return Ok(false);
            }
        };

        let thread_url = format!(
            "https://gmail.googleapis.com/gmail/v1/users/me/threads/{thread_id}"
        );
        let resp = match self
            .client
            .get(&thread_url)
            .bearer_auth(&access_token)
            .query(&[("format", "metadata")])
            .send()
            .await
        {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                tracing::warn!(status = %r.status(), thread_id, "thread list failed, defaulting to no-reply");
                return Ok(false);
            }
            Err(e) => {
                tracing::warn!(error = %e, thread_id, "thread list request failed, defaulting to no-reply");
                return Ok(false);
            }
        };

        let thread: ThreadResponse = match resp.json().await {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(error = %e, thread_id, "thread response malformed, defaulting to no-reply");
                return Ok(false);
            }
        };

        let messages: Vec<ThreadMessage> = thread.messages.unwrap_or_default();

        for message in messages.iter().take(MAX_MESSAGES_PER_THREAD) {
            match self
                .fetch_message_metadata(&access_token, &message.id)
                .await
            {
                Ok(Some((from, date))) => {
                    if from.to_lowercase().contains(&recipient_email.to_lowercase())
                        && date > since
                    {
                        return Ok(true);
                    }
                }
                Ok(None) => continue,
                Err(e) => {
                    tracing::debug!(error = %e, message_id = %message.id, "skipping unfetchable message");
                    continue;
                }
            }
        }

        Ok(false)
    }
}

impl GmailReplyDetector {
    async fn fetch_message_metadata(
        &self,
        access_token: &str,
        message_id: &str,
    ) -> Result<Option<(String, DateTime<Utc>)>, AppError> {
        let url = format!(
            "https://gmail.googleapis.com/gmail/v1/users/me/messages/{message_id}"
        );
        let resp = self
            .client
            .get(&url)
            .bearer_auth(access_token)
            .query(&[
                ("format", "metadata"),
                ("metadataHeaders", "From"),
                ("metadataHeaders", "Date"),
            ])
            .send()
            .await
            .map_err(|e| AppError::SendError(format!("message fetch failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(AppError::SendError(format!(
                "message fetch returned {}",
                resp.status()
            )));
        }

        let metadata: MessageMetadata = resp
            .json()
            .await
            .map_err(|e| AppError::SendError(format!("message metadata malformed: {e}")))?;

        let headers = metadata
            .payload
            .and_then(|p| p.headers)
            .unwrap_or_default();

        let from = headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case("From"))
            .map(|h| h.value.clone());
        let date = headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case("Date"))
            .and_then(|h| DateTime::parse_from_rfc2822(h.value.trim()).ok())
            .map(|d| d.with_timezone(&Utc));

        Ok(match (from, date) {
            (Some(from), Some(date)) => Some((from, date)),
            _ => None,
        })
    }
}
