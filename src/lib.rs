// Email sequence scheduler - core library
//
// Schedules and delivers drip-style email sequences on behalf of tenants
// who have connected a mail account via OAuth2. The job queue (kernel::jobs)
// and the sequence state machine (domains::sequences) are the core; HTTP
// framing lives under server.

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::Config;
