//! # Wardstone
//!
//! Access decision and certification engine for healthcare records.
//!
//! Wardstone answers "may this user do this, to this resource, right now?"
//! with a hybrid model, and keeps the evidence:
//!
//! - **RBAC**: a role catalog with hierarchy, priorities, and a
//!   separation-of-duties conflict table
//! - **ABAC**: attribute rules over departments and clearance levels
//! - **Break-glass**: emergency overrides for responders, recorded before
//!   they are granted
//! - **Certification**: campaigns that put risk-scored grants in front of
//!   a reviewer chain
//! - **Audit**: every decision, grant, and review in an append-only trail
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                           Wardstone                            │
//! │  ┌─────────┐   ┌──────────┐   ┌───────────┐   ┌─────────────┐  │
//! │  │ Catalog │ → │   PDP    │   │ Lifecycle │ ← │   Certify   │  │
//! │  │ (roles) │   │ (decide) │   │ (grants)  │   │ (campaigns) │  │
//! │  └─────────┘   └────┬─────┘   └─────┬─────┘   └──────┬──────┘  │
//! │                     └─────── audit trail ────────────┘         │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The facade adds what the sub-crates leave to the caller: the decision
//! cache, fail-closed error handling, log-before-grant for break-glass,
//! and authorization of role administration itself.
//!
//! # Quick Start
//!
//! ```
//! use chrono::{TimeZone, Utc};
//! use wardstone::{
//!     Action, AssignOptions, EnvironmentContext, PolicyContext, Resource,
//!     ResourceAttributes, ResourceKind, RoleId, Subject, SubjectAttributes,
//!     UserId, Wardstone, WardstoneConfig,
//! };
//!
//! # fn main() -> wardstone::Result<()> {
//! let engine = Wardstone::new(WardstoneConfig::default());
//! let now = Utc.with_ymd_and_hms(2025, 6, 2, 10, 0, 0).unwrap();
//!
//! engine.assign_role(
//!     &UserId::new("dr-chen"),
//!     &RoleId::new("physician"),
//!     &UserId::system(),
//!     AssignOptions::new(),
//!     now,
//! )?;
//!
//! let ctx = PolicyContext::new(
//!     Subject::new("dr-chen", SubjectAttributes::new()),
//!     Resource::new(
//!         ResourceKind::PatientRecord,
//!         "mrn-1001",
//!         ResourceAttributes::new().with_care_team_member("dr-chen"),
//!     ),
//!     Action::View,
//!     EnvironmentContext::at(now),
//! );
//! assert!(engine.check_access(&ctx).allowed);
//! # Ok(())
//! # }
//! ```

use thiserror::Error;

mod cache;
mod config;
mod engine;

pub use cache::CacheStats;
pub use config::{
    BusinessHoursConfig, CacheConfig, ConfigLoader, EmergencyConfig, ReviewConfig, WardstoneConfig,
};
pub use engine::{RoleSummary, Wardstone};

// Re-export the request vocabulary and decision types
pub use wardstone_types::{
    AccessDecision, Action, AssignmentCondition, AssignmentId, AttributeValue, AuditEntryId,
    BusinessHours, CampaignId, CertificationId, ContextError, EmergencyAccessId,
    EmergencyAccessRecord, EnvironmentContext, ErrorKind, PolicyContext, PolicyTrace, Resource,
    ResourceAttributes, ResourceKind, RoleId, SessionId, Subject, SubjectAttributes, UserId,
    UserRoleAssignment,
};

// Re-export the role catalog
pub use wardstone_catalog::{
    AttributeCondition, CatalogError, ConditionOp, EMERGENCY_RESPONDER, OwnershipScope, Permission,
    PermissionMatrix, PermissionMatrixEntry, PermissionMatrixRole, Role, RoleCatalog,
    RoleConstraint, TimeConstraint,
};

// Re-export the evaluator for callers building their own pipeline
pub use wardstone_pdp::{
    EffectiveRoleEntry, EmergencyGrant, Evaluation, EvaluationConfig, JUSTIFICATION_ATTRIBUTE,
    effective_role_entries, evaluate,
};

// Re-export the audit trail
pub use wardstone_audit::{
    AuditAction, AuditEntry, AuditError, AuditQuery, AuditStore, MemoryAuditStore,
};

// Re-export assignment lifecycle types
pub use wardstone_lifecycle::{
    AccessReview, AssignOptions, AssignmentService, AssignmentStore, EmergencyAccessStore,
    ExcessivePrivilegeDetector, LifecycleError, MemoryAssignmentStore, MemoryEmergencyAccessStore,
    RemediationReport, ReviewEntry, ReviewFinding,
};

// Re-export certification types
pub use wardstone_certify::{
    Campaign, CampaignStatistics, CampaignStatus, Certification, CertificationEngine,
    CertificationSchedule, CertificationStatus, CertificationSubject, CertifyError,
    LoggingNotificationSink, NotificationSink, ReminderNotice, ReminderUrgency, ReviewDecision,
    RiskLevel, RoleScope, recommendations, risk_score,
};

/// Errors surfaced by facade operations that can fail.
///
/// [`Wardstone::check_access`] never returns one of these; decision
/// evaluation fails closed instead.
#[derive(Debug, Error)]
pub enum WardstoneError {
    /// The acting user lacks the administrative permission the operation
    /// requires.
    #[error("user `{actor}` lacks permission `{permission}`")]
    NotAuthorized { actor: UserId, permission: String },

    /// An assignment lifecycle operation failed.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// A certification operation failed.
    #[error(transparent)]
    Certify(#[from] CertifyError),

    /// The audit trail rejected a read or write.
    #[error(transparent)]
    Audit(#[from] AuditError),

    /// A compliance export could not be serialized.
    #[error("export serialization failed: {0}")]
    Export(#[from] serde_json::Error),
}

impl WardstoneError {
    /// Coarse classification for mapping to transport-level failures.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotAuthorized { .. } => ErrorKind::Forbidden,
            Self::Lifecycle(err) => err.kind(),
            Self::Certify(err) => err.kind(),
            Self::Audit(err) => err.kind(),
            Self::Export(_) => ErrorKind::Internal,
        }
    }
}

pub type Result<T> = std::result::Result<T, WardstoneError>;
