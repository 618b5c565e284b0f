//! Assignment, delegation, and revocation with invariant enforcement.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use wardstone_audit::{AuditAction, AuditStore};
use wardstone_catalog::RoleCatalog;
use wardstone_types::{
    AssignmentCondition, EmergencyAccessId, EmergencyAccessRecord, RoleId, UserId,
    UserRoleAssignment,
};

use crate::store::{AssignmentStore, EmergencyAccessStore};
use crate::{LifecycleError, Result};

// ============================================================================
// Assignment options
// ============================================================================

/// Optional grant parameters for [`AssignmentService::assign_role`].
#[derive(Debug, Clone, Default)]
pub struct AssignOptions {
    pub expires_at: Option<DateTime<Utc>>,
    pub scope: Option<String>,
    pub conditions: Vec<AssignmentCondition>,
}

impl AssignOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
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
}

// ============================================================================
// Assignment service
// ============================================================================

/// Enforces the lifecycle invariants the stores deliberately do not.
///
/// All mutations serialize on an internal lock, so the
/// check-then-insert sequences (duplicate detection, separation of duties,
/// delegator-holds-role) are atomic even over dumb stores. Every public
/// operation writes exactly one audit entry after its store write succeeds.
pub struct AssignmentService {
    pub(crate) catalog: Arc<RoleCatalog>,
    pub(crate) assignments: Arc<dyn AssignmentStore>,
    pub(crate) emergency: Arc<dyn EmergencyAccessStore>,
    pub(crate) audit: Arc<dyn AuditStore>,
    pub(crate) privilege_detector: Option<Arc<dyn crate::review::ExcessivePrivilegeDetector>>,
    mutate: Mutex<()>,
}

impl AssignmentService {
    pub fn new(
        catalog: Arc<RoleCatalog>,
        assignments: Arc<dyn AssignmentStore>,
        emergency: Arc<dyn EmergencyAccessStore>,
        audit: Arc<dyn AuditStore>,
    ) -> Self {
        Self {
            catalog,
            assignments,
            emergency,
            audit,
            privilege_detector: None,
            mutate: Mutex::new(()),
        }
    }

    pub fn catalog(&self) -> &RoleCatalog {
        &self.catalog
    }

    /// Assignments of `user` still in force at `now`, in grant order.
    pub fn effective_assignments(
        &self,
        user: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<UserRoleAssignment>> {
        let mut assignments = self.assignments.assignments_for(user)?;
        assignments.retain(|assignment| assignment.is_effective(now));
        Ok(assignments)
    }

    /// Every user holding at least one assignment, expired remnants
    /// included.
    pub fn users_with_assignments(&self) -> Result<Vec<UserId>> {
        self.assignments.user_ids()
    }

    /// Every break-glass record currently on file.
    pub fn emergency_records(&self) -> Result<Vec<EmergencyAccessRecord>> {
        self.emergency.all()
    }

    /// Terminates a break-glass grant early; `false` when the record was
    /// already gone.
    pub fn remove_emergency_record(&self, id: EmergencyAccessId) -> Result<bool> {
        self.emergency.remove(id)
    }

    /// Grants `role` to `user`.
    ///
    /// Fails when the role is unknown, the expiry is not in the future, the
    /// user already holds an effective assignment of the role, or the grant
    /// would introduce a separation-of-duties conflict anywhere in the
    /// expanded hierarchy.
    pub fn assign_role(
        &self,
        user: &UserId,
        role: &RoleId,
        assigned_by: &UserId,
        options: AssignOptions,
        now: DateTime<Utc>,
    ) -> Result<UserRoleAssignment> {
        if self.catalog.role(role).is_none() {
            return Err(LifecycleError::RoleNotFound(role.clone()));
        }
        check_expiry(options.expires_at, now)?;

        let assignment = {
            let _guard = self
                .mutate
                .lock()
                .map_err(|_| LifecycleError::Store("mutation lock poisoned".to_string()))?;
            self.assign_locked(user, role, assigned_by, options, false, now)?
        };

        self.audit.append(
            assigned_by.clone(),
            AuditAction::RoleAssigned {
                user_id: user.clone(),
                role_id: role.clone(),
                assigned_by: assigned_by.clone(),
                delegated: false,
                expires_at: assignment.expires_at,
            },
        )?;
        tracing::info!(user = %user, role = %role, assigned_by = %assigned_by, "role assigned");
        Ok(assignment)
    }

    /// Delegates a role `from` one user `to` another.
    ///
    /// Only roles at priority 500 or below are delegable. The delegator must
    /// hold the role effectively, directly or through the hierarchy, and is
    /// recorded on the new grant as its approver. The delegate is subject to
    /// the same duplicate and separation-of-duties checks as a direct grant.
    pub fn delegate_role(
        &self,
        from: &UserId,
        to: &UserId,
        role: &RoleId,
        expires_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<UserRoleAssignment> {
        let Some(definition) = self.catalog.role(role) else {
            return Err(LifecycleError::RoleNotFound(role.clone()));
        };
        if definition.priority > 500 {
            return Err(LifecycleError::NotDelegable(role.clone()));
        }
        check_expiry(expires_at, now)?;

        let assignment = {
            let _guard = self
                .mutate
                .lock()
                .map_err(|_| LifecycleError::Store("mutation lock poisoned".to_string()))?;

            let held = self.expanded_role_ids(from, now)?;
            if !held.contains(role) {
                return Err(LifecycleError::DelegatorLacksRole {
                    user: from.clone(),
                    role: role.clone(),
                });
            }

            let mut options =
                AssignOptions::new().with_condition(AssignmentCondition::ApprovedBy(from.clone()));
            options.expires_at = expires_at;
            self.assign_locked(to, role, from, options, true, now)?
        };

        self.audit.append(
            from.clone(),
            AuditAction::RoleDelegated {
                from: from.clone(),
                to: to.clone(),
                role_id: role.clone(),
                expires_at,
            },
        )?;
        tracing::info!(from = %from, to = %to, role = %role, "role delegated");
        Ok(assignment)
    }

    /// Revokes every assignment of `role` (live or expired remnant) held by
    /// `user`, returning the removed rows.
    ///
    /// The role is not required to still exist in the catalog, so grants of
    /// decommissioned roles can be cleaned up.
    pub fn revoke_role(
        &self,
        user: &UserId,
        role: &RoleId,
        revoked_by: &UserId,
        reason: Option<String>,
    ) -> Result<Vec<UserRoleAssignment>> {
        let removed = {
            let _guard = self
                .mutate
                .lock()
                .map_err(|_| LifecycleError::Store("mutation lock poisoned".to_string()))?;
            self.assignments.remove(user, role)?
        };

        self.audit.append(
            revoked_by.clone(),
            AuditAction::RoleRevoked {
                user_id: user.clone(),
                role_id: role.clone(),
                revoked_by: revoked_by.clone(),
                reason,
            },
        )?;
        tracing::info!(user = %user, role = %role, revoked_by = %revoked_by, "role revoked");
        Ok(removed)
    }

    /// Swaps one role for another in a single atomic step.
    ///
    /// The replacement grant is validated against the user's *remaining*
    /// roles, so a swap can resolve a separation-of-duties conflict the old
    /// role participated in. When the replacement is rejected the removed
    /// rows are restored and the user's state is unchanged. Writes two audit
    /// entries, a revocation and an assignment, in that order.
    pub fn replace_role(
        &self,
        user: &UserId,
        old: &RoleId,
        new: &RoleId,
        actor: &UserId,
        now: DateTime<Utc>,
    ) -> Result<UserRoleAssignment> {
        if self.catalog.role(new).is_none() {
            return Err(LifecycleError::RoleNotFound(new.clone()));
        }

        let assignment = {
            let _guard = self
                .mutate
                .lock()
                .map_err(|_| LifecycleError::Store("mutation lock poisoned".to_string()))?;

            let removed = self.assignments.remove(user, old)?;
            match self.assign_locked(user, new, actor, AssignOptions::new(), false, now) {
                Ok(assignment) => assignment,
                Err(err) => {
                    for row in removed {
                        self.assignments.insert(row)?;
                    }
                    return Err(err);
                }
            }
        };

        self.audit.append(
            actor.clone(),
            AuditAction::RoleRevoked {
                user_id: user.clone(),
                role_id: old.clone(),
                revoked_by: actor.clone(),
                reason: Some(format!("replaced by `{new}`")),
            },
        )?;
        self.audit.append(
            actor.clone(),
            AuditAction::RoleAssigned {
                user_id: user.clone(),
                role_id: new.clone(),
                assigned_by: actor.clone(),
                delegated: false,
                expires_at: None,
            },
        )?;
        tracing::info!(user = %user, old = %old, new = %new, actor = %actor, "role replaced");
        Ok(assignment)
    }

    /// Persists a break-glass record, then its audit entry.
    ///
    /// Callers must not release the corresponding allow decision until this
    /// returns `Ok`; a failure here turns the emergency request into a deny.
    pub fn record_emergency_access(&self, record: EmergencyAccessRecord) -> Result<()> {
        self.emergency.record(record.clone())?;
        self.audit.append(
            record.user_id.clone(),
            AuditAction::EmergencyAccessInvoked {
                record_id: record.id,
                user_id: record.user_id.clone(),
                resource_kind: record.resource_kind,
                resource_id: record.resource_id.clone(),
                action: record.action,
                justification: record.justification.clone(),
            },
        )?;
        tracing::warn!(
            user = %record.user_id,
            resource = %record.resource_id,
            action = %record.action,
            "emergency access recorded"
        );
        Ok(())
    }

    /// Core grant path. Caller holds the mutation lock.
    fn assign_locked(
        &self,
        user: &UserId,
        role: &RoleId,
        assigned_by: &UserId,
        options: AssignOptions,
        delegated: bool,
        now: DateTime<Utc>,
    ) -> Result<UserRoleAssignment> {
        let effective = self.effective_assignments(user, now)?;
        if effective.iter().any(|assignment| assignment.role_id == *role) {
            return Err(LifecycleError::AlreadyAssigned {
                user: user.clone(),
                role: role.clone(),
            });
        }

        let held: Vec<RoleId> = effective
            .into_iter()
            .map(|assignment| assignment.role_id)
            .collect();
        if let Some((left, right)) = self.catalog.find_conflict(&held, role) {
            return Err(LifecycleError::SeparationOfDuties {
                user: user.clone(),
                candidate: role.clone(),
                left,
                right,
            });
        }

        let mut assignment =
            UserRoleAssignment::new(user.clone(), role.clone(), assigned_by.clone(), now);
        if let Some(expires_at) = options.expires_at {
            assignment = assignment.with_expiry(expires_at);
        }
        if let Some(scope) = options.scope {
            assignment = assignment.with_scope(scope);
        }
        for condition in options.conditions {
            assignment = assignment.with_condition(condition);
        }
        if delegated {
            assignment = assignment.delegated();
        }

        self.assignments.insert(assignment.clone())?;
        Ok(assignment)
    }

    /// Effective direct roles of `user` expanded through the hierarchy.
    pub(crate) fn expanded_role_ids(
        &self,
        user: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<RoleId>> {
        let direct: Vec<RoleId> = self
            .effective_assignments(user, now)?
            .into_iter()
            .map(|assignment| assignment.role_id)
            .collect();
        Ok(self.catalog.expand(&direct))
    }
}

fn check_expiry(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Result<()> {
    match expires_at {
        Some(expiry) if expiry <= now => Err(LifecycleError::ExpiryInPast(expiry)),
        _ => Ok(()),
    }
}
