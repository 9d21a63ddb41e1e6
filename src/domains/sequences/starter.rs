//! Sequence starter (component G): materializes one run per recipient and
//! schedules the step-0 job for each.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::PgPool;

use crate::common::entity_ids::SequenceId;
use crate::kernel::jobs::job::Job;
use crate::kernel::AppError;

use super::run::Run;
use super::sequence::Sequence;
use super::step::Step;

#[derive(Debug, Deserialize)]
pub struct StartSequenceRequest {
    pub sequence_id: SequenceId,
    pub owner_id: String,
    #[serde(default)]
    pub recipients: Option<Vec<String>>,
    pub first_send_time: Option<DateTime<Utc>>,
    pub timezone: Option<String>,
}

pub struct StartSequenceOutcome {
    pub runs: Vec<Run>,
    pub jobs: Vec<Job>,
}

/// §4.G. Recipient de-duplication is deliberately NOT performed here — a
/// caller that passes duplicate recipients gets one run per entry,
/// including duplicates. A database error partway through aborts with the
/// remaining recipients unprocessed; there is no compensating transaction,
/// so already-created runs and jobs for earlier recipients stand.
pub async fn start_sequence(
    request: StartSequenceRequest,
    pool: &PgPool,
) -> Result<StartSequenceOutcome, AppError> {
    let steps = Step::list_for_sequence(request.sequence_id, pool).await?;
    let step_zero = steps
        .iter()
        .find(|s| s.step_order == first_step_order(&steps))
        .ok_or_else(|| AppError::Validation("sequence has no steps".into()))?;

    let recipients = match request.recipients.filter(|r| !r.is_empty()) {
        Some(r) => r,
        None => {
            let stored = Sequence::recipient_list(request.sequence_id, pool).await?;
            if stored.is_empty() {
                return Err(AppError::Validation(
                    "no recipients supplied and none stored for this sequence".into(),
                ));
            }
            stored
        }
    };

    let first_send_time = request.first_send_time.unwrap_or_else(Utc::now);

    let mut runs = Vec::with_capacity(recipients.len());
    let mut jobs = Vec::with_capacity(recipients.len());

    for recipient_email in recipients {
        let run = Run::create(
            request.sequence_id,
            &request.owner_id,
            &recipient_email,
            pool,
        )
        .await?;

        let job = Job::builder()
            .owner_id(request.owner_id.clone())
            .to_email(recipient_email)
            .subject(step_zero.subject.clone().unwrap_or_default())
            .body_text(step_zero.body_text.clone().unwrap_or_default())
            .scheduled_for(first_send_time)
            .sequence_run_id(run.id)
            .step_id(step_zero.id)
            .timezone(request.timezone.clone().unwrap_or_default())
            .build()
            .insert(pool)
            .await?;

        runs.push(run);
        jobs.push(job);
    }

    Ok(StartSequenceOutcome { runs, jobs })
}

fn first_step_order(steps: &[Step]) -> i32 {
    steps.iter().map(|s| s.step_order).min().unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(order: i32) -> Step {
        Step {
            id: crate::common::entity_ids::StepId::new(),
            sequence_id: crate::common::entity_ids::SequenceId::new(),
            step_order: order,
            subject: None,
            body_text: None,
            delay_days: 0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn first_step_order_picks_the_minimum() {
        let steps = vec![step(3), step(1), step(2)];
        assert_eq!(first_step_order(&steps), 1);
    }
}
