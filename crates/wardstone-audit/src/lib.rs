//! # wardstone-audit: Append-only audit trail
//!
//! Every access decision, role change, break-glass invocation, and
//! certification outcome is recorded as a structured [`AuditEntry`]. The
//! trail is append-only by construction: [`AuditStore`] exposes no way to
//! modify or remove an entry once written.
//!
//! # Architecture
//!
//! ```text
//! AuditStore (trait) = {
//!     append(actor, action) -> AuditEntryId,
//!     query(filter) -> Vec<AuditEntry>,
//!     export_json(filter) -> String,
//!     role_used_since(user, role, since) -> bool,
//! }
//! ```
//!
//! Appends are fallible on purpose. A caller that cannot record an event
//! must fail closed rather than proceed unrecorded; the decision engine
//! denies access when the trail rejects a write.
//!
//! # Example
//!
//! ```
//! use wardstone_audit::{AuditAction, AuditQuery, AuditStore, MemoryAuditStore};
//! use wardstone_types::{RoleId, UserId};
//!
//! let store = MemoryAuditStore::new();
//!
//! store.append(
//!     UserId::new("admin-okafor"),
//!     AuditAction::RoleAssigned {
//!         user_id: UserId::new("dr-chen"),
//!         role_id: RoleId::new("physician"),
//!         assigned_by: UserId::new("admin-okafor"),
//!         delegated: false,
//!         expires_at: None,
//!     },
//! )?;
//!
//! let history = store.query(&AuditQuery::default().with_user(UserId::new("dr-chen")))?;
//! assert_eq!(history.len(), 1);
//! # Ok::<(), wardstone_audit::AuditError>(())
//! ```

use thiserror::Error;
use wardstone_types::ErrorKind;

mod entry;
mod store;

pub use entry::{AuditAction, AuditEntry};
pub use store::{AuditQuery, AuditStore, MemoryAuditStore};

/// Errors surfaced by audit storage.
#[derive(Debug, Error)]
pub enum AuditError {
    /// The backing store rejected the operation.
    #[error("audit store failure: {0}")]
    Store(String),

    /// Export serialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AuditError {
    /// Coarse classification for mapping to transport-level failures.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Store(_) | Self::Serialization(_) => ErrorKind::Internal,
        }
    }
}

pub type Result<T> = std::result::Result<T, AuditError>;
