// Kernel - core infrastructure with dependency injection
//
// The ServerKernel holds all server dependencies (database, mail provider,
// reply detector, clock) and provides access via traits for testability.
//
// IMPORTANT: Kernel is for INFRASTRUCTURE only, not business logic.
// Business logic belongs in domain layers.

pub mod error;
pub mod jobs;
pub mod server_kernel;

pub use error::AppError;
pub use server_kernel::ServerKernel;
