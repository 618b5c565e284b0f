//! Effective-role resolution.
//!
//! A user's effective roles are their directly assigned roles plus all
//! transitive parents. Resolution walks the hierarchy iteratively with a
//! visited set, so a misconfigured cycle terminates instead of recursing.
//!
//! Ordering is load-bearing: entries come out in assignment-insertion order,
//! each directly assigned role followed depth-first by its parents. Role
//! priority never influences this order.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use wardstone_catalog::{Role, RoleCatalog};
use wardstone_types::{RoleId, UserRoleAssignment};

/// One role in the effective set, tied to the assignment that introduced it.
#[derive(Debug, Clone, Copy)]
pub struct EffectiveRoleEntry<'a> {
    pub role: &'a Role,
    /// The direct assignment this role arrived through. Inherited roles are
    /// checked against the same assignment as the child that introduced them.
    pub assignment: &'a UserRoleAssignment,
    /// `false` for directly assigned roles, `true` for parents reached
    /// through the hierarchy.
    pub inherited: bool,
}

/// Resolves the effective role set at `now`.
///
/// Expired assignments contribute nothing. Role ids missing from the catalog
/// are dropped; a stale assignment must not wedge evaluation. Each role
/// appears at most once, attributed to the first assignment that reached it.
pub fn effective_role_entries<'a>(
    catalog: &'a RoleCatalog,
    assignments: &'a [UserRoleAssignment],
    now: DateTime<Utc>,
) -> Vec<EffectiveRoleEntry<'a>> {
    let mut entries = Vec::new();
    let mut visited: HashSet<&RoleId> = HashSet::new();

    for assignment in assignments {
        if !assignment.is_effective(now) {
            continue;
        }
        let mut stack: Vec<(&RoleId, bool)> = vec![(&assignment.role_id, false)];
        while let Some((role_id, inherited)) = stack.pop() {
            if !visited.insert(role_id) {
                continue;
            }
            let Some(role) = catalog.role(role_id) else {
                continue;
            };
            entries.push(EffectiveRoleEntry {
                role,
                assignment,
                inherited,
            });
            // Reversed push keeps declaration order once popped.
            for parent in role.parent_roles.iter().rev() {
                if !visited.contains(parent) {
                    stack.push((parent, true));
                }
            }
        }
    }

    entries
}
