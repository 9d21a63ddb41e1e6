//! Shared integration-test infrastructure: a real Postgres via testcontainers,
//! migrated once and reused across the whole test binary, plus fakes for the
//! external collaborators (mail provider, reply detector, clock).

mod fakes;
mod harness;

pub use fakes::{FakeClock, FakeMailSender, FakeReplyDetector};
pub use harness::TestHarness;
