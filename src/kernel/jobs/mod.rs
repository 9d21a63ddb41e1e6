//! Job infrastructure: the durable queue (component D) and the worker loop
//! that drains it (component E).

pub mod job;
pub mod queue;
pub mod worker;

pub use job::{Job, JobStatus, MAX_ATTEMPTS};
pub use queue::{JobQueue, PostgresJobQueue};
pub use worker::{run_once, JobFailure, WorkerSummary};
