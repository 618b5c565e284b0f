//! Role definitions and role-level constraints.

use chrono::Timelike;
use serde::{Deserialize, Serialize};
use wardstone_types::{Action, PolicyContext, ResourceKind, RoleId, UserRoleAssignment};

use crate::permission::Permission;

// ============================================================================
// Role constraints
// ============================================================================

/// A gate on an entire role. When any constraint fails for a request, the
/// role contributes nothing to that evaluation; its permissions are not
/// consulted at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleConstraint {
    /// The role is usable only between these UTC hours. Windows that wrap
    /// midnight (`start_hour > end_hour`) are supported.
    TimeWindow { start_hour: u32, end_hour: u32 },
    /// The role is usable only from the named locations.
    LocationIn(Vec<String>),
    /// The role only applies to these resource kinds.
    ResourceLimit(Vec<ResourceKind>),
    /// The assignment must carry an approval condition.
    RequiresApproval,
}

impl RoleConstraint {
    /// Stable constraint name used in `role_constraint:<role>:<kind>` traces.
    pub fn kind(&self) -> &'static str {
        match self {
            RoleConstraint::TimeWindow { .. } => "time_window",
            RoleConstraint::LocationIn(_) => "location",
            RoleConstraint::ResourceLimit(_) => "resource_limit",
            RoleConstraint::RequiresApproval => "requires_approval",
        }
    }

    /// Whether the constraint holds for this request. `assignment` is the
    /// direct assignment that introduced the role into the effective set;
    /// inherited roles are checked against the assignment they came through.
    pub fn is_satisfied(&self, ctx: &PolicyContext, assignment: &UserRoleAssignment) -> bool {
        match self {
            RoleConstraint::TimeWindow {
                start_hour,
                end_hour,
            } => {
                let hour = ctx.environment.time.hour();
                if start_hour <= end_hour {
                    (*start_hour..*end_hour).contains(&hour)
                } else {
                    hour >= *start_hour || hour < *end_hour
                }
            }
            RoleConstraint::LocationIn(locations) => ctx
                .environment
                .location
                .as_ref()
                .is_some_and(|location| locations.contains(location)),
            RoleConstraint::ResourceLimit(kinds) => kinds.contains(&ctx.resource.kind),
            RoleConstraint::RequiresApproval => assignment.approved_by().is_some(),
        }
    }
}

// ============================================================================
// Role
// ============================================================================

/// A named bundle of permissions in the catalog.
///
/// Roles form a DAG through `parent_roles`; holding a role grants the
/// transitive closure of its parents' permissions. The graph is never trusted
/// to be acyclic; expansion always runs with a visited set.
///
/// `priority` ranks privilege (0 to 1000) for delegation limits, risk
/// scoring, and display. It has no effect on evaluation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    pub description: String,
    pub permissions: Vec<Permission>,
    pub parent_roles: Vec<RoleId>,
    pub constraints: Vec<RoleConstraint>,
    /// System roles ship with the catalog and cannot be replaced.
    pub is_system: bool,
    pub priority: u16,
}

impl Role {
    pub fn new(id: impl Into<RoleId>, name: impl Into<String>, priority: u16) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            permissions: Vec::new(),
            parent_roles: Vec::new(),
            constraints: Vec::new(),
            is_system: false,
            priority,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn with_permission(mut self, permission: Permission) -> Self {
        self.permissions.push(permission);
        self
    }

    #[must_use]
    pub fn with_parent(mut self, parent: impl Into<RoleId>) -> Self {
        self.parent_roles.push(parent.into());
        self
    }

    #[must_use]
    pub fn with_constraint(mut self, constraint: RoleConstraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Marks the role as a builtin system role.
    #[must_use]
    pub fn system(mut self) -> Self {
        self.is_system = true;
        self
    }

    /// The role's own permissions for `(resource, action)`, in declaration
    /// order. Inherited permissions are reached through catalog expansion,
    /// never through this method.
    pub fn matching_permissions(
        &self,
        resource: ResourceKind,
        action: Action,
    ) -> impl Iterator<Item = &Permission> {
        self.permissions
            .iter()
            .filter(move |p| p.applies_to(resource, action))
    }

    /// The first failing constraint for this request, if any.
    pub fn failed_constraint(
        &self,
        ctx: &PolicyContext,
        assignment: &UserRoleAssignment,
    ) -> Option<&RoleConstraint> {
        self.constraints
            .iter()
            .find(|constraint| !constraint.is_satisfied(ctx, assignment))
    }
}
