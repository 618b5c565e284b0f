//! User-role assignments and break-glass emergency access records.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{Action, AssignmentId, EmergencyAccessId, ResourceKind, RoleId, UserId};

// ============================================================================
// Role assignments
// ============================================================================

/// A condition attached to an assignment at grant time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentCondition {
    /// The named user approved this grant. Delegations always carry the
    /// delegator here.
    ApprovedBy(UserId),
}

/// A grant of one role to one user.
///
/// At most one *effective* assignment exists per `(user, role)` pair;
/// expired remnants may linger until a remediation sweep. There is no update
/// primitive anywhere in the system; every change is a revoke followed by a
/// fresh assignment, so the audit trail shows each grant's full provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRoleAssignment {
    pub id: AssignmentId,
    pub user_id: UserId,
    pub role_id: RoleId,
    /// Who granted the role. The reserved `system` actor marks bootstrap
    /// grants.
    pub assigned_by: UserId,
    pub assigned_at: DateTime<Utc>,
    /// Expiry, if any. Expired assignments simply stop being effective; no
    /// cleanup has to run for correctness.
    pub expires_at: Option<DateTime<Utc>>,
    /// Free-form scope note, e.g. a ward or project.
    pub scope: Option<String>,
    pub conditions: Vec<AssignmentCondition>,
    /// Set when this grant was delegated rather than assigned.
    pub delegated: bool,
}

impl UserRoleAssignment {
    pub fn new(
        user_id: impl Into<UserId>,
        role_id: impl Into<RoleId>,
        assigned_by: impl Into<UserId>,
        assigned_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AssignmentId::new(),
            user_id: user_id.into(),
            role_id: role_id.into(),
            assigned_by: assigned_by.into(),
            assigned_at,
            expires_at: None,
            scope: None,
            conditions: Vec::new(),
            delegated: false,
        }
    }

    #[must_use]
    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    #[must_use]
    pub fn with_condition(mut self, condition: AssignmentCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    #[must_use]
    pub fn delegated(mut self) -> Self {
        self.delegated = true;
        self
    }

    /// Whether the assignment is in force at `now`.
    pub fn is_effective(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|expiry| expiry > now)
    }

    /// Whole days since the grant. Negative for grants dated in the future.
    pub fn age_days(&self, now: DateTime<Utc>) -> i64 {
        (now - self.assigned_at).num_days()
    }

    /// The approver recorded at grant time, if any.
    pub fn approved_by(&self) -> Option<&UserId> {
        self.conditions.iter().find_map(|condition| match condition {
            AssignmentCondition::ApprovedBy(user) => Some(user),
        })
    }
}

// ============================================================================
// Emergency access
// ============================================================================

/// A break-glass grant, written to durable storage *before* the caller sees
/// the allow decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyAccessRecord {
    pub id: EmergencyAccessId,
    pub user_id: UserId,
    pub resource_kind: ResourceKind,
    pub resource_id: String,
    pub action: Action,
    pub granted_at: DateTime<Utc>,
    /// Hard-capped at one hour past `granted_at`.
    pub expires_at: DateTime<Utc>,
    /// Why the override was invoked. Stores reject empty justifications.
    pub justification: String,
}

impl EmergencyAccessRecord {
    /// Longest lifetime of a break-glass grant.
    pub const MAX_DURATION_SECS: i64 = 3600;

    /// Builds a record, clamping the requested expiry into
    /// `(granted_at, granted_at + 1h]`.
    pub fn new(
        user_id: impl Into<UserId>,
        resource_kind: ResourceKind,
        resource_id: impl Into<String>,
        action: Action,
        granted_at: DateTime<Utc>,
        justification: impl Into<String>,
        requested_expiry: Option<DateTime<Utc>>,
    ) -> Self {
        let cap = granted_at + Duration::seconds(Self::MAX_DURATION_SECS);
        let expires_at = match requested_expiry {
            Some(requested) if requested > granted_at && requested < cap => requested,
            _ => cap,
        };
        Self {
            id: EmergencyAccessId::new(),
            user_id: user_id.into(),
            resource_kind,
            resource_id: resource_id.into(),
            action,
            granted_at,
            expires_at,
            justification: justification.into(),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}
