//! End-to-end scenarios for the sequence state machine (component F) and
//! starter (component G), driven through the worker loop (component E)
//! against a real Postgres.

mod common;

use test_context::test_context;

use scheduler_core::domains::credentials::Credential;
use scheduler_core::domains::sequences::run::RunStatus;
use scheduler_core::domains::sequences::starter::{start_sequence, StartSequenceRequest};
use scheduler_core::domains::sequences::step::{NewStep, Step};
use scheduler_core::kernel::jobs::run_once;
use sqlx::PgPool;

use crate::common::TestHarness;

async fn create_sequence(owner_id: &str, pool: &PgPool) -> scheduler_core::common::SequenceId {
    let id = scheduler_core::common::SequenceId::new();
    sqlx::query("INSERT INTO sequences (id, owner_id, created_at) VALUES ($1, $2, NOW())")
        .bind(id)
        .bind(owner_id)
        .execute(pool)
        .await
        .unwrap();
    id
}

async fn connect_tenant(owner_id: &str, pool: &PgPool) {
    Credential::upsert(owner_id, Some("connected@example.test"), "refresh-token", pool)
        .await
        .unwrap();
}

/// Forces every currently-`scheduled` job to be immediately due, simulating
/// the passage of real time (delay_days / backoff minutes) between worker
/// ticks without an actual sleep.
async fn force_all_due(pool: &PgPool) {
    sqlx::query("UPDATE jobs SET scheduled_for = NOW() - INTERVAL '1 minute' WHERE status = 'scheduled'")
        .execute(pool)
        .await
        .unwrap();
}

async fn three_step_sequence(owner_id: &str, pool: &PgPool) -> scheduler_core::common::SequenceId {
    let sequence_id = create_sequence(owner_id, pool).await;
    for (order, delay) in [(1, 0), (2, 1), (3, 2)] {
        Step::insert(
            sequence_id,
            &NewStep {
                step_order: order,
                subject: Some(format!("Step {order}")),
                body_text: Some(format!("Body {order}")),
                delay_days: delay,
            },
            pool,
        )
        .await
        .unwrap();
    }
    sequence_id
}

#[test_context(TestHarness)]
#[tokio::test]
async fn three_step_sequence_completes_after_all_sends(ctx: &TestHarness) {
    connect_tenant("tenant-s1", &ctx.db_pool).await;
    let sequence_id = three_step_sequence("tenant-s1", &ctx.db_pool).await;

    let outcome = start_sequence(
        StartSequenceRequest {
            sequence_id,
            owner_id: "tenant-s1".to_string(),
            recipients: Some(vec!["a@x.com".to_string()]),
            first_send_time: None,
            timezone: None,
        },
        &ctx.db_pool,
    )
    .await
    .unwrap();
    assert_eq!(outcome.runs.len(), 1);
    let run_id = outcome.runs[0].id;

    // Tick 1: step 1 (delay 0) sends immediately.
    let summary = run_once(&ctx.kernel, 10).await.unwrap();
    assert_eq!(summary.sent, 1);

    // Tick 2: step 2's job was scheduled a day out; force it due.
    force_all_due(&ctx.db_pool).await;
    let summary = run_once(&ctx.kernel, 10).await.unwrap();
    assert_eq!(summary.sent, 1);

    // Tick 3: step 3.
    force_all_due(&ctx.db_pool).await;
    let summary = run_once(&ctx.kernel, 10).await.unwrap();
    assert_eq!(summary.sent, 1);

    // No further job should have been created after the last step.
    force_all_due(&ctx.db_pool).await;
    let summary = run_once(&ctx.kernel, 10).await.unwrap();
    assert_eq!(summary.claimed, 0);

    let run = scheduler_core::domains::sequences::run::Run::find_by_id(run_id, &ctx.db_pool)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.current_step, 3);
    assert_eq!(ctx.mail_sender.call_count(), 3);

    let events: Vec<(String,)> =
        sqlx::query_as("SELECT status::text FROM email_events WHERE sequence_run_id = $1 ORDER BY sent_at ASC")
            .bind(run_id)
            .fetch_all(&ctx.db_pool)
            .await
            .unwrap();
    assert_eq!(events.len(), 3);
    assert!(events.iter().all(|(status,)| status == "sent"));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn reply_stops_the_run_before_step_two(ctx: &TestHarness) {
    connect_tenant("tenant-s2", &ctx.db_pool).await;
    let sequence_id = three_step_sequence("tenant-s2", &ctx.db_pool).await;

    let outcome = start_sequence(
        StartSequenceRequest {
            sequence_id,
            owner_id: "tenant-s2".to_string(),
            recipients: Some(vec!["b@x.com".to_string()]),
            first_send_time: None,
            timezone: None,
        },
        &ctx.db_pool,
    )
    .await
    .unwrap();
    let run_id = outcome.runs[0].id;

    // Step 1 sends; the recipient has not replied yet.
    run_once(&ctx.kernel, 10).await.unwrap();

    // Recipient replies before the next tick.
    ctx.reply_detector.set_replied(true);
    force_all_due(&ctx.db_pool).await;
    let summary = run_once(&ctx.kernel, 10).await.unwrap();
    // Nothing was claimable: step 2's job was never created.
    assert_eq!(summary.claimed, 0);

    let run = scheduler_core::domains::sequences::run::Run::find_by_id(run_id, &ctx.db_pool)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(run.status, RunStatus::Stopped);
    assert_eq!(run.current_step, 1);
    assert_eq!(
        ctx.mail_sender.call_count(),
        1,
        "step 2 must never have been sent"
    );
}

#[test_context(TestHarness)]
#[tokio::test]
async fn max_attempts_exceeded_marks_job_failed_and_run_stays_active(ctx: &TestHarness) {
    connect_tenant("tenant-s4", &ctx.db_pool).await;
    let sequence_id = three_step_sequence("tenant-s4", &ctx.db_pool).await;

    for _ in 0..5 {
        ctx.mail_sender.push_failure("provider unavailable");
    }

    let outcome = start_sequence(
        StartSequenceRequest {
            sequence_id,
            owner_id: "tenant-s4".to_string(),
            recipients: Some(vec!["c@x.com".to_string()]),
            first_send_time: None,
            timezone: None,
        },
        &ctx.db_pool,
    )
    .await
    .unwrap();
    let run_id = outcome.runs[0].id;

    for _ in 0..5 {
        force_all_due(&ctx.db_pool).await;
        run_once(&ctx.kernel, 10).await.unwrap();
    }

    let job: (String, i32, Option<String>) = sqlx::query_as(
        "SELECT status::text, attempts, last_error FROM jobs WHERE sequence_run_id = $1",
    )
    .bind(run_id)
    .fetch_one(&ctx.db_pool)
    .await
    .unwrap();
    assert_eq!(job.0, "failed");
    assert_eq!(job.1, 5);
    assert_eq!(job.2.as_deref(), Some("provider unavailable"));

    let run = scheduler_core::domains::sequences::run::Run::find_by_id(run_id, &ctx.db_pool)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(run.status, RunStatus::Active);
    assert_eq!(run.current_step, 0, "no step was ever successfully sent");
}

#[test_context(TestHarness)]
#[tokio::test]
async fn first_retry_backs_off_by_two_minutes_then_succeeds(ctx: &TestHarness) {
    connect_tenant("tenant-s3", &ctx.db_pool).await;
    let sequence_id = three_step_sequence("tenant-s3", &ctx.db_pool).await;

    ctx.mail_sender.push_failure("transient provider error");

    let outcome = start_sequence(
        StartSequenceRequest {
            sequence_id,
            owner_id: "tenant-s3".to_string(),
            recipients: Some(vec!["retry@x.com".to_string()]),
            first_send_time: None,
            timezone: None,
        },
        &ctx.db_pool,
    )
    .await
    .unwrap();
    let run_id = outcome.runs[0].id;

    let before_first_tick = chrono::Utc::now();
    let summary = run_once(&ctx.kernel, 10).await.unwrap();
    assert_eq!(summary.sent, 0);
    assert_eq!(
        summary.failed, 0,
        "a retryable failure reschedules the job, it is not terminal"
    );

    let job: (String, i32, chrono::DateTime<chrono::Utc>) = sqlx::query_as(
        "SELECT status::text, attempts, scheduled_for FROM jobs WHERE sequence_run_id = $1",
    )
    .bind(run_id)
    .fetch_one(&ctx.db_pool)
    .await
    .unwrap();
    assert_eq!(job.0, "scheduled");
    assert_eq!(job.1, 1, "attempts holds the post-increment count");

    // §4.E: n = attempts pre-increment = 0, so the first retry backs off
    // 2^(0+1) = 2 minutes. Allow slack for test execution time.
    let delay = job.2 - before_first_tick;
    assert!(
        delay >= chrono::Duration::seconds(110) && delay <= chrono::Duration::seconds(130),
        "first retry must back off ~2 minutes, got {delay}"
    );

    // Next tick: the recipient's send succeeds.
    force_all_due(&ctx.db_pool).await;
    let summary = run_once(&ctx.kernel, 10).await.unwrap();
    assert_eq!(summary.sent, 1);

    let events: Vec<(String,)> = sqlx::query_as(
        "SELECT status::text FROM email_events WHERE sequence_run_id = $1 ORDER BY sent_at ASC",
    )
    .bind(run_id)
    .fetch_all(&ctx.db_pool)
    .await
    .unwrap();
    assert_eq!(
        events.len(),
        1,
        "only the eventual successful send produces an event row"
    );
    assert_eq!(events[0].0, "sent");
}

#[test_context(TestHarness)]
#[tokio::test]
async fn missing_credential_fails_the_job_without_retry(ctx: &TestHarness) {
    // Deliberately no `connect_tenant` call — this tenant has no credential.
    let sequence_id = three_step_sequence("tenant-s5", &ctx.db_pool).await;

    let outcome = start_sequence(
        StartSequenceRequest {
            sequence_id,
            owner_id: "tenant-s5".to_string(),
            recipients: Some(vec!["d@x.com".to_string()]),
            first_send_time: None,
            timezone: None,
        },
        &ctx.db_pool,
    )
    .await
    .unwrap();
    let run_id = outcome.runs[0].id;

    let summary = run_once(&ctx.kernel, 10).await.unwrap();
    assert_eq!(summary.failed, 1);
    assert_eq!(ctx.mail_sender.call_count(), 0);

    let job: (String, i32, Option<String>) = sqlx::query_as(
        "SELECT status::text, attempts, last_error FROM jobs WHERE sequence_run_id = $1",
    )
    .bind(run_id)
    .fetch_one(&ctx.db_pool)
    .await
    .unwrap();
    assert_eq!(job.0, "failed");
    assert_eq!(job.2.as_deref(), Some("no_refresh_token"));

    let run = scheduler_core::domains::sequences::run::Run::find_by_id(run_id, &ctx.db_pool)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(run.status, RunStatus::Active);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn thread_id_is_set_once_and_never_overwritten(ctx: &TestHarness) {
    connect_tenant("tenant-thread", &ctx.db_pool).await;
    let sequence_id = three_step_sequence("tenant-thread", &ctx.db_pool).await;

    let outcome = start_sequence(
        StartSequenceRequest {
            sequence_id,
            owner_id: "tenant-thread".to_string(),
            recipients: Some(vec!["e@x.com".to_string()]),
            first_send_time: None,
            timezone: None,
        },
        &ctx.db_pool,
    )
    .await
    .unwrap();
    let run_id = outcome.runs[0].id;

    run_once(&ctx.kernel, 10).await.unwrap();
    let run_after_first =
        scheduler_core::domains::sequences::run::Run::find_by_id(run_id, &ctx.db_pool)
            .await
            .unwrap()
            .unwrap();
    let first_thread_id = run_after_first.thread_id.clone();
    assert!(first_thread_id.is_some());

    force_all_due(&ctx.db_pool).await;
    run_once(&ctx.kernel, 10).await.unwrap();
    let run_after_second =
        scheduler_core::domains::sequences::run::Run::find_by_id(run_id, &ctx.db_pool)
            .await
            .unwrap()
            .unwrap();

    assert_eq!(run_after_second.thread_id, first_thread_id);
}
