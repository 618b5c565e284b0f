//! Storage seams for assignments and emergency access records.
//!
//! The traits are deliberately dumb persistence: invariants (effective
//! uniqueness, separation of duties, delegability) live in
//! [`AssignmentService`](crate::AssignmentService), which serializes
//! mutations. Production deployments replace the in-memory implementations
//! with durable storage behind the same contracts.

use std::collections::BTreeMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use wardstone_types::{EmergencyAccessId, EmergencyAccessRecord, RoleId, UserId, UserRoleAssignment};

use crate::{LifecycleError, Result};

// ============================================================================
// Assignment store
// ============================================================================

/// Persistence for user-role assignments.
///
/// The store does not police duplicates or conflicts; the service does,
/// under its mutation lock. Every mutation bumps the owning user's version,
/// which decision caches embed in their keys so revocation invalidates
/// cached grants immediately.
pub trait AssignmentStore: Send + Sync {
    /// Assignments for one user, in insertion order.
    fn assignments_for(&self, user: &UserId) -> Result<Vec<UserRoleAssignment>>;

    /// Every user currently holding at least one assignment, in id order.
    fn user_ids(&self) -> Result<Vec<UserId>>;

    /// Every assignment in the store.
    fn all(&self) -> Result<Vec<UserRoleAssignment>>;

    /// Appends an assignment.
    fn insert(&self, assignment: UserRoleAssignment) -> Result<()>;

    /// Removes every assignment of `role` for `user`, returning the removed
    /// rows. Fails with [`LifecycleError::NotAssigned`] when none exist.
    fn remove(&self, user: &UserId, role: &RoleId) -> Result<Vec<UserRoleAssignment>>;

    /// Removes assignments of `user` no longer effective at `now`.
    fn remove_expired(&self, user: &UserId, now: DateTime<Utc>) -> Result<Vec<UserRoleAssignment>>;

    /// Monotonic per-user mutation counter. Unknown users are at version 0.
    fn version(&self, user: &UserId) -> Result<u64>;
}

#[derive(Debug, Default)]
struct AssignmentsInner {
    by_user: BTreeMap<UserId, Vec<UserRoleAssignment>>,
    versions: BTreeMap<UserId, u64>,
}

impl AssignmentsInner {
    fn bump(&mut self, user: &UserId) {
        *self.versions.entry(user.clone()).or_insert(0) += 1;
    }
}

/// In-memory assignment store for tests and single-process deployments.
#[derive(Debug, Default)]
pub struct MemoryAssignmentStore {
    inner: RwLock<AssignmentsInner>,
}

impl MemoryAssignmentStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl AssignmentStore for MemoryAssignmentStore {
    fn assignments_for(&self, user: &UserId) -> Result<Vec<UserRoleAssignment>> {
        let inner = self
            .inner
            .read()
            .map_err(|_| LifecycleError::Store("assignment store lock poisoned".to_string()))?;
        Ok(inner.by_user.get(user).cloned().unwrap_or_default())
    }

    fn user_ids(&self) -> Result<Vec<UserId>> {
        let inner = self
            .inner
            .read()
            .map_err(|_| LifecycleError::Store("assignment store lock poisoned".to_string()))?;
        Ok(inner
            .by_user
            .iter()
            .filter(|(_, assignments)| !assignments.is_empty())
            .map(|(user, _)| user.clone())
            .collect())
    }

    fn all(&self) -> Result<Vec<UserRoleAssignment>> {
        let inner = self
            .inner
            .read()
            .map_err(|_| LifecycleError::Store("assignment store lock poisoned".to_string()))?;
        Ok(inner.by_user.values().flatten().cloned().collect())
    }

    fn insert(&self, assignment: UserRoleAssignment) -> Result<()> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| LifecycleError::Store("assignment store lock poisoned".to_string()))?;
        let user = assignment.user_id.clone();
        inner.by_user.entry(user.clone()).or_default().push(assignment);
        inner.bump(&user);
        Ok(())
    }

    fn remove(&self, user: &UserId, role: &RoleId) -> Result<Vec<UserRoleAssignment>> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| LifecycleError::Store("assignment store lock poisoned".to_string()))?;
        let assignments = inner.by_user.get_mut(user).ok_or_else(|| {
            LifecycleError::NotAssigned {
                user: user.clone(),
                role: role.clone(),
            }
        })?;

        let mut removed = Vec::new();
        assignments.retain(|assignment| {
            if assignment.role_id == *role {
                removed.push(assignment.clone());
                false
            } else {
                true
            }
        });

        if removed.is_empty() {
            return Err(LifecycleError::NotAssigned {
                user: user.clone(),
                role: role.clone(),
            });
        }
        inner.bump(user);
        Ok(removed)
    }

    fn remove_expired(
        &self,
        user: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<UserRoleAssignment>> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| LifecycleError::Store("assignment store lock poisoned".to_string()))?;
        let Some(assignments) = inner.by_user.get_mut(user) else {
            return Ok(Vec::new());
        };

        let mut removed = Vec::new();
        assignments.retain(|assignment| {
            if assignment.is_effective(now) {
                true
            } else {
                removed.push(assignment.clone());
                false
            }
        });

        if !removed.is_empty() {
            inner.bump(user);
        }
        Ok(removed)
    }

    fn version(&self, user: &UserId) -> Result<u64> {
        let inner = self
            .inner
            .read()
            .map_err(|_| LifecycleError::Store("assignment store lock poisoned".to_string()))?;
        Ok(inner.versions.get(user).copied().unwrap_or(0))
    }
}

// ============================================================================
// Emergency access store
// ============================================================================

/// Persistence for break-glass records.
///
/// [`record`](EmergencyAccessStore::record) must be durable before the
/// caller releases the corresponding allow decision; the engine denies the
/// request when this write fails.
pub trait EmergencyAccessStore: Send + Sync {
    /// Persists a record. Blank justifications are rejected.
    fn record(&self, record: EmergencyAccessRecord) -> Result<()>;

    /// Records for one user, in insertion order.
    fn records_for(&self, user: &UserId) -> Result<Vec<EmergencyAccessRecord>>;

    /// Every record in the store.
    fn all(&self) -> Result<Vec<EmergencyAccessRecord>>;

    /// Drops records expired at `now`, returning how many were purged.
    fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize>;

    /// Removes one record by id; `true` when it existed.
    fn remove(&self, id: EmergencyAccessId) -> Result<bool>;
}

/// In-memory emergency access store.
#[derive(Debug, Default)]
pub struct MemoryEmergencyAccessStore {
    records: RwLock<Vec<EmergencyAccessRecord>>,
}

impl MemoryEmergencyAccessStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl EmergencyAccessStore for MemoryEmergencyAccessStore {
    fn record(&self, record: EmergencyAccessRecord) -> Result<()> {
        if record.justification.trim().is_empty() {
            return Err(LifecycleError::EmptyJustification);
        }
        let mut records = self
            .records
            .write()
            .map_err(|_| LifecycleError::Store("emergency store lock poisoned".to_string()))?;
        records.push(record);
        Ok(())
    }

    fn records_for(&self, user: &UserId) -> Result<Vec<EmergencyAccessRecord>> {
        let records = self
            .records
            .read()
            .map_err(|_| LifecycleError::Store("emergency store lock poisoned".to_string()))?;
        Ok(records
            .iter()
            .filter(|record| record.user_id == *user)
            .cloned()
            .collect())
    }

    fn all(&self) -> Result<Vec<EmergencyAccessRecord>> {
        let records = self
            .records
            .read()
            .map_err(|_| LifecycleError::Store("emergency store lock poisoned".to_string()))?;
        Ok(records.clone())
    }

    fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut records = self
            .records
            .write()
            .map_err(|_| LifecycleError::Store("emergency store lock poisoned".to_string()))?;
        let before = records.len();
        records.retain(|record| !record.is_expired(now));
        Ok(before - records.len())
    }

    fn remove(&self, id: EmergencyAccessId) -> Result<bool> {
        let mut records = self
            .records
            .write()
            .map_err(|_| LifecycleError::Store("emergency store lock poisoned".to_string()))?;
        let before = records.len();
        records.retain(|record| record.id != id);
        Ok(before != records.len())
    }
}
