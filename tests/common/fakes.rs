//! Fakes for the external collaborators the kernel injects: the mail
//! provider, the reply detector, and the wall clock. Each records its calls
//! so assertions can check what the system under test actually did.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use scheduler_core::common::Clock;
use scheduler_core::domains::mail::{MailSender, OutgoingMessage, SendOutcome};
use scheduler_core::domains::reply::ReplyDetector;
use scheduler_core::kernel::AppError;

/// Queues canned outcomes (or errors) for successive `send` calls. Defaults
/// to an infinite stream of successes with a fresh message/thread id per
/// call when the queue runs dry.
pub struct FakeMailSender {
    responses: Mutex<VecDeque<Result<SendOutcome, String>>>,
    calls: Mutex<Vec<(String, Option<String>)>>,
    next_id: Mutex<u64>,
}

impl FakeMailSender {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            next_id: Mutex::new(1),
        }
    }

    /// All sends after construction will reuse this thread id, simulating a
    /// provider that groups a whole sequence's sends into one conversation.
    pub fn with_fixed_thread(thread_id: &str, count: usize) -> Self {
        let fake = Self::new();
        for _ in 0..count {
            fake.push_success_with_thread(Some(thread_id.to_string()));
        }
        fake
    }

    pub fn push_success_with_thread(&self, thread_id: Option<String>) {
        let mut next_id = self.next_id.lock().unwrap();
        let message_id = format!("msg-{next_id}");
        *next_id += 1;
        self.responses.lock().unwrap().push_back(Ok(SendOutcome {
            message_id: Some(message_id),
            thread_id,
        }));
    }

    pub fn push_failure(&self, error: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(error.to_string()));
    }

    pub fn calls(&self) -> Vec<(String, Option<String>)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl Default for FakeMailSender {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MailSender for FakeMailSender {
    async fn send(
        &self,
        _refresh_token: &str,
        message: OutgoingMessage<'_>,
    ) -> Result<SendOutcome, AppError> {
        self.calls.lock().unwrap().push((
            message.to.to_string(),
            message.subject.map(str::to_string),
        ));

        let queued = self.responses.lock().unwrap().pop_front();
        match queued {
            Some(Ok(outcome)) => Ok(outcome),
            Some(Err(error)) => Err(AppError::SendError(error)),
            None => {
                let mut next_id = self.next_id.lock().unwrap();
                let message_id = format!("msg-{next_id}");
                let thread_id = format!("thread-{next_id}");
                *next_id += 1;
                Ok(SendOutcome {
                    message_id: Some(message_id),
                    thread_id: Some(thread_id),
                })
            }
        }
    }
}

/// Always answers `has_replied` with a fixed value, settable after
/// construction so a test can flip it mid-scenario (e.g. "no reply on the
/// first tick, replied by the second").
pub struct FakeReplyDetector {
    replied: Mutex<bool>,
    calls: Mutex<Vec<(Option<String>, DateTime<Utc>)>>,
}

impl FakeReplyDetector {
    pub fn new(replied: bool) -> Self {
        Self {
            replied: Mutex::new(replied),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn set_replied(&self, replied: bool) {
        *self.replied.lock().unwrap() = replied;
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ReplyDetector for FakeReplyDetector {
    async fn has_replied(
        &self,
        _refresh_token: &str,
        thread_id: Option<&str>,
        _recipient_email: &str,
        since: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        self.calls
            .lock()
            .unwrap()
            .push((thread_id.map(str::to_string), since));
        Ok(*self.replied.lock().unwrap())
    }
}

/// A settable clock, for tests that assert on what the state machine records
/// as `sent_at` without depending on wall-clock timing.
pub struct FakeClock {
    now: Mutex<DateTime<Utc>>,
}

impl FakeClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap() = now;
    }
}

impl Clock for FakeClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}
