//! Worker loop (component E): claim a batch, execute each job in order,
//! update its outcome. Invoked externally on a periodic trigger — see
//! `server::routes::worker`.

use serde::Serialize;

use crate::domains::credentials::Credential;
use crate::domains::events::EmailEvent;
use crate::domains::mail::OutgoingMessage;
use crate::domains::sequences::state_machine::{self, Advance};
use crate::kernel::ServerKernel;

use super::job::Job;

#[derive(Debug, Serialize)]
pub struct JobFailure {
    pub job_id: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct WorkerSummary {
    pub claimed: usize,
    pub sent: usize,
    pub failed: usize,
    pub skipped: usize,
    pub failures: Vec<JobFailure>,
}

impl WorkerSummary {
    fn empty() -> Self {
        Self {
            claimed: 0,
            sent: 0,
            failed: 0,
            skipped: 0,
            failures: Vec::new(),
        }
    }
}

/// Runs one worker tick: claim up to `batch_size` due jobs and process them
/// sequentially. Never returns an error for per-job failures — those are
/// recorded in the returned summary so the caller (and its trigger) sees a
/// 200 and keeps scheduling the next tick, per §7.
pub async fn run_once(kernel: &ServerKernel, batch_size: i64) -> Result<WorkerSummary, sqlx::Error> {
    let jobs = kernel.job_queue.claim(batch_size).await?;
    if jobs.is_empty() {
        return Ok(WorkerSummary::empty());
    }

    let mut summary = WorkerSummary {
        claimed: jobs.len(),
        sent: 0,
        failed: 0,
        skipped: 0,
        failures: Vec::new(),
    };

    for job in jobs {
        process_one(kernel, job, &mut summary).await;
    }

    Ok(summary)
}

async fn process_one(kernel: &ServerKernel, job: Job, summary: &mut WorkerSummary) {
    let credential = match Credential::find_by_owner(&job.owner_id, &kernel.db_pool).await {
        Ok(cred) => cred,
        Err(e) => {
            tracing::error!(job_id = %job.id, error = %e, "failed to load credential, leaving job claimed");
            summary.failures.push(JobFailure {
                job_id: job.id.to_string(),
                error: e.to_string(),
            });
            return;
        }
    };

    let refresh_token = match credential.as_ref().and_then(|c| c.refresh_token.as_deref()) {
        Some(token) => token,
        None => {
            if let Err(e) = job
                .mark_failed_immediately("no_refresh_token", &kernel.db_pool)
                .await
            {
                tracing::error!(job_id = %job.id, error = %e, "failed to mark job failed (no_refresh_token)");
            }
            summary.failed += 1;
            summary.failures.push(JobFailure {
                job_id: job.id.to_string(),
                error: "no_refresh_token".to_string(),
            });
            return;
        }
    };

    let message = OutgoingMessage {
        from: &kernel.config.email_from,
        to: &job.to_email,
        subject: job.subject.as_deref(),
        body_text: job.body_text.as_deref(),
    };

    match kernel.mail_sender.send(refresh_token, message).await {
        Ok(outcome) => {
            let sent_job = match job.mark_sent(outcome.message_id.as_deref(), &kernel.db_pool).await {
                Ok(j) => j,
                Err(e) => {
                    tracing::error!(job_id = %job.id, error = %e, "failed to mark job sent after successful provider send");
                    summary.failures.push(JobFailure {
                        job_id: job.id.to_string(),
                        error: e.to_string(),
                    });
                    return;
                }
            };
            summary.sent += 1;

            if let (Some(run_id), Some(step_id)) = (sent_job.sequence_run_id, sent_job.step_id) {
                let now = kernel.clock.now();
                let result = state_machine::advance_run(
                    run_id,
                    step_id,
                    outcome.message_id.as_deref(),
                    outcome.thread_id.as_deref(),
                    now,
                    sent_job.timezone.as_deref(),
                    kernel.reply_detector.as_ref(),
                    &kernel.db_pool,
                )
                .await;

                // Errors here do NOT revert the job's `sent` status — they
                // are recorded as a failed email_event row per §7; the
                // sequence may stall on this run until an operator looks.
                if let Err(e) = result {
                    tracing::error!(job_id = %job.id, run_id = %run_id, error = %e, "sequence post-send logic failed");
                    if let Err(record_err) =
                        EmailEvent::record_failed(run_id, Some(step_id), &e.to_string(), now, &kernel.db_pool)
                            .await
                    {
                        tracing::error!(error = %record_err, "failed to record post-send failure event");
                    }
                } else if matches!(result, Ok(Advance::NoOp)) {
                    tracing::debug!(job_id = %job.id, run_id = %run_id, "run was no longer active, skipped advance");
                }
            }
        }
        Err(e) => {
            let now = kernel.clock.now();
            match job.record_failure(&e.to_string(), now, &kernel.db_pool).await {
                Ok(updated) if updated.status == super::job::JobStatus::Failed => {
                    summary.failed += 1;
                    summary.failures.push(JobFailure {
                        job_id: job.id.to_string(),
                        error: e.to_string(),
                    });
                }
                Ok(_) => {
                    // Rescheduled with backoff; not a terminal failure for
                    // this tick's summary.
                }
                Err(store_err) => {
                    tracing::error!(job_id = %job.id, error = %store_err, "failed to persist retry/failure outcome");
                    summary.failures.push(JobFailure {
                        job_id: job.id.to_string(),
                        error: store_err.to_string(),
                    });
                }
            }
        }
    }
}
