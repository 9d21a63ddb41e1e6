//! Typed ID definitions for all domain entities.
//!
//! This module defines type aliases for each domain entity, providing
//! compile-time type safety for ID usage throughout the application.
//!
//! # Example
//!
//! ```rust
//! use crate::common::{SequenceId, StepId, RunId};
//!
//! // These are incompatible types - compiler prevents mixing them up
//! let sequence_id: SequenceId = SequenceId::new();
//! let step_id: StepId = StepId::new();
//!
//! // This would be a compile error:
//! // let wrong: StepId = sequence_id;
//! ```
//!
//! `owner_id` (the tenant identifier) is deliberately not one of these —
//! it is an opaque caller-supplied string, not a UUID this service mints.

// Re-export the core Id type and version markers
pub use super::id::{Id, V4, V7};

// ============================================================================
// Entity marker types
// ============================================================================

/// Marker type for Credential entities.
pub struct Credential;

/// Marker type for OAuthState entities.
pub struct OAuthState;

/// Marker type for Sequence entities.
pub struct Sequence;

/// Marker type for Step entities.
pub struct Step;

/// Marker type for Run entities (one per sequence/recipient pair).
pub struct Run;

/// Marker type for scheduled-email Job entities.
pub struct ScheduledJob;

/// Marker type for EmailEvent entities (append-only send audit trail).
pub struct EmailEvent;

// ============================================================================
// Type aliases - the primary API
// ============================================================================

/// Typed ID for Credential entities.
pub type CredentialId = Id<Credential>;

/// Typed ID for OAuthState entities.
pub type OAuthStateId = Id<OAuthState>;

/// Typed ID for Sequence entities.
pub type SequenceId = Id<Sequence>;

/// Typed ID for Step entities.
pub type StepId = Id<Step>;

/// Typed ID for Run entities.
pub type RunId = Id<Run>;

/// Typed ID for scheduled-email Job entities.
pub type JobId = Id<ScheduledJob>;

/// Typed ID for EmailEvent entities.
pub type EmailEventId = Id<EmailEvent>;
