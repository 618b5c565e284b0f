//! Audit event payloads.
//!
//! Every security-relevant operation produces exactly one [`AuditAction`]
//! describing what happened, wrapped in an [`AuditEntry`] recording when and
//! by whom. Entries are immutable once appended.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use wardstone_types::{
    AccessDecision, Action, AuditEntryId, CampaignId, CertificationId, EmergencyAccessId,
    PolicyContext, ResourceKind, RoleId, UserId,
};

/// Structured audit actions covering every operation that evaluates or
/// changes access.
///
/// Each variant captures the context needed for forensic reconstruction:
/// who was involved, which role or resource, and the outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditAction {
    // -- Policy decisions --
    /// An access request was evaluated by the decision engine.
    AccessEvaluated {
        context: PolicyContext,
        decision: AccessDecision,
        elapsed_micros: u64,
    },

    // -- Role lifecycle --
    /// A role was assigned to a user.
    RoleAssigned {
        user_id: UserId,
        role_id: RoleId,
        assigned_by: UserId,
        delegated: bool,
        expires_at: Option<DateTime<Utc>>,
    },
    /// A role assignment was revoked.
    RoleRevoked {
        user_id: UserId,
        role_id: RoleId,
        revoked_by: UserId,
        reason: Option<String>,
    },
    /// A user temporarily handed one of their roles to another user.
    RoleDelegated {
        from: UserId,
        to: UserId,
        role_id: RoleId,
        expires_at: Option<DateTime<Utc>>,
    },

    // -- Break-glass --
    /// Emergency access was invoked, bypassing normal policy.
    EmergencyAccessInvoked {
        record_id: EmergencyAccessId,
        user_id: UserId,
        resource_kind: ResourceKind,
        resource_id: String,
        action: Action,
        justification: String,
    },

    // -- Certification campaigns --
    /// A certification campaign was opened with its initial workload.
    CampaignOpened {
        campaign_id: CampaignId,
        name: String,
        total: usize,
    },
    /// A reviewer decided a single certification item.
    CertificationDecided {
        campaign_id: CampaignId,
        certification_id: CertificationId,
        user_id: UserId,
        reviewer: UserId,
        decision: String,
    },
    /// Every certification in a campaign has been decided.
    CampaignCompleted {
        campaign_id: CampaignId,
        total: usize,
        revoked: usize,
        modified: usize,
    },

    // -- Remediation --
    /// An automated remediation sweep finished.
    RemediationCompleted {
        expired_removed: usize,
        unused_revoked: usize,
        emergency_purged: usize,
        errors: usize,
    },
}

impl AuditAction {
    /// Returns the action category for filtering (e.g. "Role", "Emergency").
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::AccessEvaluated { .. } => "Access",
            Self::RoleAssigned { .. } | Self::RoleRevoked { .. } | Self::RoleDelegated { .. } => {
                "Role"
            }
            Self::EmergencyAccessInvoked { .. } => "Emergency",
            Self::CampaignOpened { .. } | Self::CampaignCompleted { .. } => "Campaign",
            Self::CertificationDecided { .. } => "Certification",
            Self::RemediationCompleted { .. } => "Remediation",
        }
    }

    /// Check whether this action references the given user.
    ///
    /// Inspects every field that can identify a person: request subjects,
    /// assignment targets, delegation counterparties, and reviewers.
    #[must_use]
    pub fn involves_user(&self, user: &UserId) -> bool {
        match self {
            Self::AccessEvaluated { context, .. } => context.subject.id == *user,

            Self::RoleAssigned { user_id, .. }
            | Self::RoleRevoked { user_id, .. }
            | Self::EmergencyAccessInvoked { user_id, .. } => user_id == user,

            Self::RoleDelegated { from, to, .. } => from == user || to == user,

            Self::CertificationDecided {
                user_id, reviewer, ..
            } => user_id == user || reviewer == user,

            // Aggregate actions carry no individual identity.
            Self::CampaignOpened { .. }
            | Self::CampaignCompleted { .. }
            | Self::RemediationCompleted { .. } => false,
        }
    }
}

/// A single immutable audit record.
///
/// All fields are set at append time and never change. The store exposes no
/// mutation or deletion surface, which makes the trail append-only by
/// construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Unique entry identifier.
    pub id: AuditEntryId,
    /// When the entry was recorded.
    pub timestamp: DateTime<Utc>,
    /// Who performed the operation.
    pub actor: UserId,
    /// What happened.
    pub action: AuditAction,
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn role_assigned(user: &str) -> AuditAction {
        AuditAction::RoleAssigned {
            user_id: UserId::new(user),
            role_id: RoleId::new("physician"),
            assigned_by: UserId::new("admin-okafor"),
            delegated: false,
            expires_at: None,
        }
    }

    #[test_case(role_assigned("dr-chen"), "Role"; "role assignment")]
    #[test_case(
        AuditAction::EmergencyAccessInvoked {
            record_id: EmergencyAccessId::new(),
            user_id: UserId::new("dr-chen"),
            resource_kind: ResourceKind::PatientRecord,
            resource_id: "mrn-1001".to_string(),
            action: Action::View,
            justification: "cardiac arrest, treating team unavailable".to_string(),
        },
        "Emergency";
        "break-glass invocation"
    )]
    #[test_case(
        AuditAction::RemediationCompleted {
            expired_removed: 2,
            unused_revoked: 1,
            emergency_purged: 0,
            errors: 0,
        },
        "Remediation";
        "remediation sweep"
    )]
    fn categories_group_related_actions(action: AuditAction, expected: &str) {
        assert_eq!(action.category(), expected);
    }

    #[test]
    fn campaign_actions_share_a_category() {
        let opened = AuditAction::CampaignOpened {
            campaign_id: CampaignId::new(),
            name: "Q3 privileged review".to_string(),
            total: 12,
        };
        let completed = AuditAction::CampaignCompleted {
            campaign_id: CampaignId::new(),
            total: 12,
            revoked: 3,
            modified: 1,
        };
        assert_eq!(opened.category(), "Campaign");
        assert_eq!(completed.category(), "Campaign");
    }

    #[test]
    fn assignment_actions_reference_their_target() {
        let action = role_assigned("dr-chen");
        assert!(action.involves_user(&UserId::new("dr-chen")));
        assert!(
            !action.involves_user(&UserId::new("admin-okafor")),
            "the assigning admin is the actor, not the referenced user"
        );
    }

    #[test]
    fn delegation_references_both_parties() {
        let action = AuditAction::RoleDelegated {
            from: UserId::new("dr-chen"),
            to: UserId::new("dr-patel"),
            role_id: RoleId::new("physician"),
            expires_at: None,
        };
        assert!(action.involves_user(&UserId::new("dr-chen")));
        assert!(action.involves_user(&UserId::new("dr-patel")));
        assert!(!action.involves_user(&UserId::new("nurse-okafor")));
    }

    #[test]
    fn certification_references_subject_and_reviewer() {
        let action = AuditAction::CertificationDecided {
            campaign_id: CampaignId::new(),
            certification_id: CertificationId::new(),
            user_id: UserId::new("dr-chen"),
            reviewer: UserId::new("director-hall"),
            decision: "revoke".to_string(),
        };
        assert!(action.involves_user(&UserId::new("dr-chen")));
        assert!(action.involves_user(&UserId::new("director-hall")));
    }

    #[test]
    fn aggregate_actions_reference_nobody() {
        let action = AuditAction::RemediationCompleted {
            expired_removed: 0,
            unused_revoked: 0,
            emergency_purged: 3,
            errors: 1,
        };
        assert!(!action.involves_user(&UserId::system()));
    }
}
