//! # wardstone-certify: Access certification campaigns
//!
//! Periodic recertification of who holds what. A campaign snapshots every
//! in-scope access right into [`Certification`] items, scores each for
//! risk, and routes them to a reviewer chain. Decisions feed straight back
//! into the assignment lifecycle:
//!
//! - **Certify** keeps the grant
//! - **Revoke** withdraws it through the normal revocation path
//! - **Modify** swaps the role for a narrower one atomically
//!
//! # Architecture
//!
//! ```text
//! CertificationSchedule --open--> Campaign
//!                                    |
//!                  [Certification, Certification, ...]   (risk-scored)
//!                                    |
//!                  process_certification(reviewer, decision)
//!                                    |
//!                         AssignmentService (revoke / replace)
//! ```
//!
//! Risk scoring is additive over role priority, delegation, grant age, and
//! recorded usage; see [`risk_score`]. The same signals produce per-item
//! [`recommendations`]. Items sort by risk so reviewers see the dangerous
//! grants first.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use chrono::Utc;
//! use wardstone_audit::{AuditStore, MemoryAuditStore};
//! use wardstone_catalog::RoleCatalog;
//! use wardstone_certify::{CertificationEngine, CertificationSchedule, RoleScope};
//! use wardstone_lifecycle::{
//!     AssignmentService, MemoryAssignmentStore, MemoryEmergencyAccessStore,
//! };
//! use wardstone_types::UserId;
//!
//! let audit: Arc<dyn AuditStore> = Arc::new(MemoryAuditStore::new());
//! let service = Arc::new(AssignmentService::new(
//!     Arc::new(RoleCatalog::builtin()),
//!     Arc::new(MemoryAssignmentStore::new()),
//!     Arc::new(MemoryEmergencyAccessStore::new()),
//!     Arc::clone(&audit),
//! ));
//! let engine = CertificationEngine::new(service, audit);
//!
//! let schedule = CertificationSchedule::new(
//!     "q3-privileged-access",
//!     RoleScope::MinPriority(700),
//!     vec![UserId::new("ciso-reyes")],
//! );
//! let campaign = engine.open_campaign(&schedule, &UserId::new("ciso-reyes"), Utc::now())?;
//!
//! // Nobody holds a privileged role yet, so the campaign closes at once.
//! assert!(!campaign.is_open());
//! # Ok::<(), wardstone_certify::CertifyError>(())
//! ```

use thiserror::Error;
use wardstone_audit::AuditError;
use wardstone_lifecycle::LifecycleError;
use wardstone_types::{CampaignId, CertificationId, ErrorKind, UserId};

mod certification;
mod engine;
mod schedule;

pub use certification::{
    Certification, CertificationStatus, CertificationSubject, ReviewDecision, RiskLevel,
    recommendations, risk_score,
};
pub use engine::{
    Campaign, CampaignStatistics, CampaignStatus, CertificationEngine, LoggingNotificationSink,
    NotificationSink, ReminderNotice, ReminderUrgency,
};
pub use schedule::{CertificationSchedule, RoleScope};

/// Errors surfaced by campaign operations.
#[derive(Debug, Error)]
pub enum CertifyError {
    /// No campaign with that id.
    #[error("campaign not found: {0}")]
    CampaignNotFound(CampaignId),

    /// No certification with that id.
    #[error("certification not found: {0}")]
    CertificationNotFound(CertificationId),

    /// The decider is not in the campaign's reviewer chain.
    #[error("user `{reviewer}` is not a reviewer of campaign {campaign}")]
    ReviewerNotInChain {
        reviewer: UserId,
        campaign: CampaignId,
    },

    /// The certification already carries a decision.
    #[error("certification {0} is already decided")]
    AlreadyDecided(CertificationId),

    /// Emergency-access items accept only certify and revoke.
    #[error("emergency access records cannot be modified")]
    ModifyUnsupported,

    /// Campaigns need at least one reviewer.
    #[error("reviewer chain must not be empty")]
    EmptyReviewerChain,

    /// The schedule fails basic validation.
    #[error("invalid schedule: {0}")]
    InvalidSchedule(String),

    /// Campaign state storage failed.
    #[error("campaign store failure: {0}")]
    Store(String),

    /// A decision's side effect was rejected by the lifecycle layer.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// The audit trail rejected a write.
    #[error(transparent)]
    Audit(#[from] AuditError),
}

impl CertifyError {
    /// Coarse classification for mapping to transport-level failures.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::CampaignNotFound(_) | Self::CertificationNotFound(_) => ErrorKind::NotFound,
            Self::ReviewerNotInChain { .. } => ErrorKind::Forbidden,
            Self::AlreadyDecided(_) => ErrorKind::Conflict,
            Self::ModifyUnsupported | Self::EmptyReviewerChain | Self::InvalidSchedule(_) => {
                ErrorKind::Validation
            }
            Self::Store(_) => ErrorKind::Internal,
            Self::Lifecycle(err) => err.kind(),
            Self::Audit(err) => err.kind(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CertifyError>;
