//! ServerKernel - core infrastructure with all dependencies.
//!
//! Holds the database pool and every injected collaborator (mail sender,
//! reply detector, clock) behind a trait object, so handlers and the worker
//! loop depend on capabilities, not concrete implementations, and tests can
//! substitute fakes.

use std::sync::Arc;

use sqlx::PgPool;

use crate::common::Clock;
use crate::config::Config;
use crate::domains::mail::MailSender;
use crate::domains::reply::ReplyDetector;
use crate::kernel::jobs::{JobQueue, PostgresJobQueue};

#[derive(Clone)]
pub struct ServerKernel {
    pub db_pool: PgPool,
    pub job_queue: Arc<dyn JobQueue>,
    pub mail_sender: Arc<dyn MailSender>,
    pub reply_detector: Arc<dyn ReplyDetector>,
    pub clock: Arc<dyn Clock>,
    pub config: Arc<Config>,
}

impl ServerKernel {
    pub fn new(
        db_pool: PgPool,
        mail_sender: Arc<dyn MailSender>,
        reply_detector: Arc<dyn ReplyDetector>,
        clock: Arc<dyn Clock>,
        config: Arc<Config>,
    ) -> Self {
        let job_queue: Arc<dyn JobQueue> = Arc::new(PostgresJobQueue::new(db_pool.clone()));
        Self {
            db_pool,
            job_queue,
            mail_sender,
            reply_detector,
            clock,
            config,
        }
    }

    /// Used by tests to substitute a fake job queue.
    pub fn with_job_queue(mut self, job_queue: Arc<dyn JobQueue>) -> Self {
        self.job_queue = job_queue;
        self
    }
}
