//! Sequence state machine (component F): invoked after a job bound to a run
//! is marked `sent`. Drives the run from `active` to `stopped` or
//! `completed`, or schedules the next step's job.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::common::entity_ids::{RunId, StepId};
use crate::domains::credentials::Credential;
use crate::domains::events::EmailEvent;
use crate::domains::reply::ReplyDetector;
use crate::kernel::jobs::job::Job;
use crate::kernel::AppError;

use super::run::Run;
use super::step::Step;

/// What happened to the run as a result of this post-send procedure. Exactly
/// one of these holds — see invariant 5 in the testable-properties section.
#[derive(Debug, PartialEq, Eq)]
pub enum Advance {
    ScheduledNext,
    Stopped,
    Completed,
    /// The run was already non-active when this job landed; nothing to do
    /// beyond recording the event (edge case in §4.F).
    NoOp,
}

/// Runs the post-send procedure for a job bound to `(run_id, step_id)`.
///
/// `message_id`/`thread_id` are the outcome of the just-completed send;
/// `sent_at` is the watermark this send becomes for future reply checks.
pub async fn advance_run(
    run_id: RunId,
    step_id: StepId,
    message_id: Option<&str>,
    thread_id: Option<&str>,
    sent_at: DateTime<Utc>,
    timezone: Option<&str>,
    reply_detector: &dyn ReplyDetector,
    pool: &PgPool,
) -> Result<Advance, AppError> {
    EmailEvent::record_sent(run_id, step_id, message_id, sent_at, pool).await?;

    let run = Run::find_by_id(run_id, pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("run {run_id} not found")))?;

    // Edge case: a run whose status is already not active must not be
    // advanced further — the event row above is the only effect.
    if !run.is_active() {
        return Ok(Advance::NoOp);
    }

    let step = Step::find_by_id(step_id, pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("step {step_id} not found")))?;

    // Capture the watermark BEFORE this send's timestamp overwrites it —
    // §4.F step 5 checks for replies strictly after the *previous* send.
    let previous_watermark = run.last_sent_at.unwrap_or(sent_at);

    let run = run
        .record_send(step.step_order, thread_id, sent_at, pool)
        .await?;

    let credential = Credential::find_by_owner(&run.owner_id, pool).await?;
    let replied = match (&credential, run.thread_id.as_deref()) {
        (Some(cred), Some(_)) if cred.refresh_token.is_some() => {
            reply_detector
                .has_replied(
                    cred.refresh_token.as_deref().unwrap(),
                    run.thread_id.as_deref(),
                    &run.recipient_email,
                    previous_watermark,
                )
                .await?
        }
        // No thread id yet, or no usable credential: §4.F's edge case says
        // a null thread id means "no reply possible to check".
        _ => false,
    };

    if replied {
        run.mark_stopped(pool).await?;
        return Ok(Advance::Stopped);
    }

    let next_step = Step::next_after(step.sequence_id, step.step_order, pool).await?;

    let Some(next_step) = next_step else {
        run.mark_completed(pool).await?;
        return Ok(Advance::Completed);
    };

    schedule_next_job(&run, next_step, timezone, sent_at, pool).await?;
    Ok(Advance::ScheduledNext)
}

/// §4.F step 7: `delay_days = 0` schedules for immediate re-dispatch,
/// bounding cadence to the worker's tick (the worker itself owns the poll
/// interval — this only sets `scheduled_for = now`). `timezone` is carried
/// over from the prior job as advisory metadata; it is never consulted for
/// the scheduling arithmetic above, which is always UTC. `now` is the
/// injected clock's reading for this tick (the same value used as this
/// send's watermark), not a fresh wall-clock read, so scheduling stays
/// deterministic under a `FakeClock`.
async fn schedule_next_job(
    run: &Run,
    next_step: Step,
    timezone: Option<&str>,
    now: DateTime<Utc>,
    pool: &PgPool,
) -> Result<Job, sqlx::Error> {
    let scheduled_for = now + chrono::Duration::seconds(next_step.delay_days as i64 * 86_400);

    Job::builder()
        .owner_id(run.owner_id.clone())
        .to_email(run.recipient_email.clone())
        .subject(next_step.subject.unwrap_or_default())
        .body_text(next_step.body_text.unwrap_or_default())
        .scheduled_for(scheduled_for)
        .sequence_run_id(run.id)
        .step_id(next_step.id)
        .timezone(timezone.unwrap_or_default().to_string())
        .build()
        .insert(pool)
        .await
}
