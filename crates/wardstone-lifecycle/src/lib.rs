//! # wardstone-lifecycle: Assignment, delegation, review, remediation
//!
//! The write side of the access-control system. [`AssignmentService`] owns
//! every mutation of who holds what:
//!
//! - **Assignment** with duplicate and separation-of-duties enforcement
//! - **Delegation**, limited to roles at priority 500 or below and always
//!   stamped with the delegator as approver
//! - **Revocation**, including of roles no longer in the catalog
//! - **Break-glass recording**, written before the grant is released
//! - **Access review** reports and the **automated remediation** sweep
//!
//! # Architecture
//!
//! ```text
//!             AssignmentService (invariants, one mutation at a time)
//!            /        |          \
//!   AssignmentStore   |   EmergencyAccessStore     (dumb persistence)
//!                     |
//!                 AuditStore    (one entry per public operation)
//! ```
//!
//! The stores hold rows; the service holds the rules. Checks and their
//! matching writes run under a single mutation lock, so two racing grants
//! cannot both pass a separation-of-duties check that only one of them
//! survives. Per-user version counters let decision caches key on store
//! state and drop stale grants the moment a revocation lands.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use chrono::Utc;
//! use wardstone_audit::MemoryAuditStore;
//! use wardstone_catalog::RoleCatalog;
//! use wardstone_lifecycle::{
//!     AssignOptions, AssignmentService, MemoryAssignmentStore, MemoryEmergencyAccessStore,
//! };
//! use wardstone_types::{RoleId, UserId};
//!
//! let service = AssignmentService::new(
//!     Arc::new(RoleCatalog::builtin()),
//!     Arc::new(MemoryAssignmentStore::new()),
//!     Arc::new(MemoryEmergencyAccessStore::new()),
//!     Arc::new(MemoryAuditStore::new()),
//! );
//!
//! let now = Utc::now();
//! service.assign_role(
//!     &UserId::new("dr-chen"),
//!     &RoleId::new("physician"),
//!     &UserId::system(),
//!     AssignOptions::new(),
//!     now,
//! )?;
//!
//! let held = service.effective_assignments(&UserId::new("dr-chen"), now)?;
//! assert_eq!(held.len(), 1);
//! # Ok::<(), wardstone_lifecycle::LifecycleError>(())
//! ```

use chrono::{DateTime, Utc};
use thiserror::Error;
use wardstone_audit::AuditError;
use wardstone_types::{ErrorKind, RoleId, UserId};

mod review;
mod service;
mod store;

pub use review::{
    AccessReview, ExcessivePrivilegeDetector, RemediationReport, ReviewConfig, ReviewEntry,
    ReviewFinding,
};
pub use service::{AssignOptions, AssignmentService};
pub use store::{
    AssignmentStore, EmergencyAccessStore, MemoryAssignmentStore, MemoryEmergencyAccessStore,
};

/// Errors surfaced by lifecycle operations.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// The role does not exist in the catalog.
    #[error("role not found: {0}")]
    RoleNotFound(RoleId),

    /// The user already holds an effective assignment of the role.
    #[error("user `{user}` already holds role `{role}`")]
    AlreadyAssigned { user: UserId, role: RoleId },

    /// No assignment of the role exists for the user.
    #[error("user `{user}` does not hold role `{role}`")]
    NotAssigned { user: UserId, role: RoleId },

    /// Granting the candidate role would complete a conflicting pair.
    #[error(
        "granting `{candidate}` to `{user}` violates separation of duties: \
         `{left}` conflicts with `{right}`"
    )]
    SeparationOfDuties {
        user: UserId,
        candidate: RoleId,
        left: RoleId,
        right: RoleId,
    },

    /// The role sits above the delegation priority cutoff.
    #[error("role `{0}` is not delegable")]
    NotDelegable(RoleId),

    /// The delegator does not hold the role, directly or by inheritance.
    #[error("user `{user}` cannot delegate role `{role}` they do not hold")]
    DelegatorLacksRole { user: UserId, role: RoleId },

    /// Grant expiry must lie in the future.
    #[error("expiry {0} is not in the future")]
    ExpiryInPast(DateTime<Utc>),

    /// Break-glass records require a justification.
    #[error("emergency access requires a non-empty justification")]
    EmptyJustification,

    /// The backing store rejected the operation.
    #[error("lifecycle store failure: {0}")]
    Store(String),

    /// The audit trail rejected a write.
    #[error(transparent)]
    Audit(#[from] AuditError),
}

impl LifecycleError {
    /// Coarse classification for mapping to transport-level failures.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::RoleNotFound(_) | Self::NotAssigned { .. } => ErrorKind::NotFound,
            Self::AlreadyAssigned { .. } | Self::SeparationOfDuties { .. } => ErrorKind::Conflict,
            Self::NotDelegable(_) | Self::DelegatorLacksRole { .. } => ErrorKind::Forbidden,
            Self::ExpiryInPast(_) | Self::EmptyJustification => ErrorKind::Validation,
            Self::Store(_) => ErrorKind::Internal,
            Self::Audit(err) => err.kind(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LifecycleError>;
