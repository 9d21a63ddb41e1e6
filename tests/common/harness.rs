//! Test harness: one shared Postgres container + migration run for the
//! whole test binary, a fresh connection pool and kernel per test.

use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::PgPool;
use test_context::AsyncTestContext;
use testcontainers::runners::AsyncRunner;
use testcontainers::ContainerAsync;
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

use scheduler_core::common::SystemClock;
use scheduler_core::kernel::ServerKernel;
use scheduler_core::Config;

use super::fakes::{FakeMailSender, FakeReplyDetector};

struct SharedInfra {
    db_url: String,
    _postgres: ContainerAsync<Postgres>,
}

static SHARED_INFRA: OnceCell<SharedInfra> = OnceCell::const_new();

impl SharedInfra {
    async fn init() -> Result<Self> {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let postgres = Postgres::default()
            .start()
            .await
            .context("failed to start postgres container")?;

        let host = postgres.get_host().await?;
        let port = postgres.get_host_port_ipv4(5432).await?;
        let db_url = format!("postgresql://postgres:postgres@{host}:{port}/postgres");

        let pool = PgPool::connect(&db_url)
            .await
            .context("failed to connect to test postgres")?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("failed to run migrations against test postgres")?;

        pool.close().await;

        Ok(Self {
            db_url,
            _postgres: postgres,
        })
    }

    async fn get() -> &'static Self {
        SHARED_INFRA
            .get_or_init(|| async {
                Self::init()
                    .await
                    .expect("failed to initialize shared test infrastructure")
            })
            .await
    }
}

fn test_config() -> Config {
    Config {
        database_url: String::new(),
        port: 0,
        google_client_id: "test-client-id".to_string(),
        google_client_secret: "test-client-secret".to_string(),
        redirect_uri: "https://example.test/oauth2/callback".to_string(),
        kaptiv_api_key: "test-api-key".to_string(),
        worker_secret: "test-worker-secret".to_string(),
        frontend_return: "https://example.test/return".to_string(),
        email_from: "sender@example.test".to_string(),
        job_batch_size: 20,
        default_timezone: "Asia/Singapore".to_string(),
    }
}

/// Per-test harness: a dedicated connection pool against the shared
/// container, a fresh `ServerKernel` wired to fakes the test can reach into
/// and reconfigure.
pub struct TestHarness {
    pub db_pool: PgPool,
    pub kernel: ServerKernel,
    pub mail_sender: Arc<FakeMailSender>,
    pub reply_detector: Arc<FakeReplyDetector>,
}

impl TestHarness {
    pub async fn new() -> Result<Self> {
        let infra = SharedInfra::get().await;
        let db_pool = PgPool::connect(&infra.db_url)
            .await
            .context("failed to connect to test postgres")?;

        let mail_sender = Arc::new(FakeMailSender::new());
        let reply_detector = Arc::new(FakeReplyDetector::new(false));
        let clock = Arc::new(SystemClock);
        let config = Arc::new(test_config());

        let kernel = ServerKernel::new(
            db_pool.clone(),
            mail_sender.clone() as _,
            reply_detector.clone() as _,
            clock,
            config,
        );

        Ok(Self {
            db_pool,
            kernel,
            mail_sender,
            reply_detector,
        })
    }

    /// Truncate every table between tests, since they share one container.
    pub async fn reset(&self) {
        sqlx::query(
            "TRUNCATE TABLE email_events, jobs, sequence_runs, sequence_recipients, \
             sequence_steps, sequences, oauth_states, credentials RESTART IDENTITY CASCADE",
        )
        .execute(&self.db_pool)
        .await
        .expect("failed to truncate tables between tests");
    }
}

impl AsyncTestContext for TestHarness {
    async fn setup() -> Self {
        let harness = Self::new().await.expect("failed to create test harness");
        harness.reset().await;
        harness
    }

    async fn teardown(self) {
        self.db_pool.close().await;
    }
}
