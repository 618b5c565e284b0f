//! The role catalog: builtin roles, hierarchy expansion, and the
//! separation-of-duties conflict table.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use wardstone_types::{Action, ErrorKind, ResourceKind, RoleId};

use crate::permission::{
    AttributeCondition, ConditionOp, OwnershipScope, Permission, TimeConstraint,
};
use crate::role::Role;

pub type Result<T> = std::result::Result<T, CatalogError>;

// ============================================================================
// Errors
// ============================================================================

/// Failures raised by catalog operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("role `{0}` not found")]
    RoleNotFound(RoleId),

    #[error("system role `{0}` cannot be replaced")]
    SystemRoleImmutable(RoleId),

    #[error("role `{role}` references unknown parent `{parent}`")]
    UnknownParent { role: RoleId, parent: RoleId },
}

impl CatalogError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CatalogError::RoleNotFound(_) => ErrorKind::NotFound,
            CatalogError::SystemRoleImmutable(_) => ErrorKind::Forbidden,
            CatalogError::UnknownParent { .. } => ErrorKind::Validation,
        }
    }
}

// ============================================================================
// Catalog
// ============================================================================

/// The authoritative role store.
///
/// Deployments start from [`RoleCatalog::builtin`] and may register custom
/// roles on top. System roles are immutable once present.
#[derive(Debug, Clone, Default)]
pub struct RoleCatalog {
    roles: BTreeMap<RoleId, Role>,
    /// Mutually exclusive role pairs. A user may never hold both sides,
    /// directly or through inheritance.
    sod_conflicts: Vec<(RoleId, RoleId)>,
}

impl RoleCatalog {
    /// An empty catalog with no roles and no conflict table.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The builtin healthcare catalog: twelve system roles and the standard
    /// separation-of-duties table.
    pub fn builtin() -> Self {
        let mut catalog = Self::empty();
        for role in [
            super_admin(),
            system_admin(),
            auditor(),
            medical_director(),
            compliance_officer(),
            physician(),
            pharmacist(),
            emergency_responder(),
            nurse(),
            lab_technician(),
            billing_clerk(),
            receptionist(),
        ] {
            catalog.roles.insert(role.id.clone(), role);
        }

        // The conflict table pairs oversight roles with the roles they
        // oversee, and billing with prescribing.
        catalog.sod_conflicts = vec![
            (RoleId::new("auditor"), RoleId::new("system_admin")),
            (RoleId::new("auditor"), RoleId::new("super_admin")),
            (RoleId::new("billing_clerk"), RoleId::new("physician")),
            (RoleId::new("billing_clerk"), RoleId::new("medical_director")),
            (RoleId::new("pharmacist"), RoleId::new("physician")),
        ];
        catalog
    }

    pub fn role(&self, id: &RoleId) -> Option<&Role> {
        self.roles.get(id)
    }

    pub fn contains(&self, id: &RoleId) -> bool {
        self.roles.contains_key(id)
    }

    /// All roles, in id order.
    pub fn roles(&self) -> impl Iterator<Item = &Role> {
        self.roles.values()
    }

    /// The separation-of-duties conflict table.
    pub fn conflicts(&self) -> &[(RoleId, RoleId)] {
        &self.sod_conflicts
    }

    /// Registers or replaces a custom role. System roles cannot be replaced,
    /// and every parent must already exist.
    pub fn register(&mut self, role: Role) -> Result<()> {
        if let Some(existing) = self.roles.get(&role.id) {
            if existing.is_system {
                return Err(CatalogError::SystemRoleImmutable(role.id));
            }
        }
        for parent in &role.parent_roles {
            if !self.roles.contains_key(parent) {
                return Err(CatalogError::UnknownParent {
                    role: role.id.clone(),
                    parent: parent.clone(),
                });
            }
        }
        self.roles.insert(role.id.clone(), role);
        Ok(())
    }

    /// Adds a separation-of-duties pair. Both roles must exist.
    pub fn add_conflict(&mut self, a: impl Into<RoleId>, b: impl Into<RoleId>) -> Result<()> {
        let (a, b) = (a.into(), b.into());
        for side in [&a, &b] {
            if !self.roles.contains_key(side) {
                return Err(CatalogError::RoleNotFound(side.clone()));
            }
        }
        self.sod_conflicts.push((a, b));
        Ok(())
    }

    /// Expands direct role ids to the full effective set: each direct role
    /// followed by its transitive parents in discovery order, deduplicated
    /// across the whole walk.
    ///
    /// The walk is iterative with a visited set, so a misconfigured cycle in
    /// the hierarchy terminates instead of recursing. Ids not present in the
    /// catalog are dropped.
    pub fn expand(&self, direct: &[RoleId]) -> Vec<RoleId> {
        let mut out = Vec::new();
        let mut visited: HashSet<RoleId> = HashSet::new();

        for root in direct {
            let mut stack = vec![root.clone()];
            while let Some(id) = stack.pop() {
                if visited.contains(&id) {
                    continue;
                }
                let Some(role) = self.roles.get(&id) else {
                    continue;
                };
                visited.insert(id.clone());
                out.push(id);
                // Reversed push keeps parents in declaration order on pop.
                for parent in role.parent_roles.iter().rev() {
                    if !visited.contains(parent) {
                        stack.push(parent.clone());
                    }
                }
            }
        }
        out
    }

    /// Checks whether granting `candidate` to a user holding `held` would
    /// introduce a separation-of-duties violation. Both sides are expanded
    /// through the hierarchy first.
    ///
    /// Only *new* violations are reported: a pair is flagged when at least
    /// one side arrives with the candidate. Pre-existing violations in
    /// `held` never block an unrelated grant.
    pub fn find_conflict(&self, held: &[RoleId], candidate: &RoleId) -> Option<(RoleId, RoleId)> {
        let held_set: HashSet<RoleId> = self.expand(held).into_iter().collect();
        let candidate_set: HashSet<RoleId> =
            self.expand(std::slice::from_ref(candidate)).into_iter().collect();

        let full: HashSet<&RoleId> = held_set.union(&candidate_set).collect();
        for (a, b) in &self.sod_conflicts {
            if !(full.contains(a) && full.contains(b)) {
                continue;
            }
            let a_is_new = candidate_set.contains(a) && !held_set.contains(a);
            let b_is_new = candidate_set.contains(b) && !held_set.contains(b);
            if a_is_new || b_is_new {
                return Some((a.clone(), b.clone()));
            }
        }
        None
    }

    /// Whether `role_id`, including its inherited roles, carries any
    /// permission for `(resource, action)`.
    pub fn grants(&self, role_id: &RoleId, resource: ResourceKind, action: Action) -> bool {
        self.expand(std::slice::from_ref(role_id)).iter().any(|id| {
            self.roles
                .get(id)
                .is_some_and(|role| role.matching_permissions(resource, action).next().is_some())
        })
    }

    /// Serializable inspection view of the whole catalog, highest priority
    /// first.
    pub fn export_permission_matrix(&self) -> PermissionMatrix {
        let mut roles: Vec<PermissionMatrixRole> = self
            .roles
            .values()
            .map(|role| PermissionMatrixRole {
                id: role.id.clone(),
                name: role.name.clone(),
                priority: role.priority,
                is_system: role.is_system,
                inherits: role.parent_roles.clone(),
                permissions: role
                    .permissions
                    .iter()
                    .map(|p| PermissionMatrixEntry {
                        permission: p.key(),
                        scope: p.scope,
                        time: p.time,
                        conditions: p.conditions.len(),
                    })
                    .collect(),
            })
            .collect();
        roles.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.id.cmp(&b.id)));
        PermissionMatrix { roles }
    }
}

// ============================================================================
// Permission matrix export
// ============================================================================

/// Role-by-permission view of the catalog for audits and tooling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionMatrix {
    pub roles: Vec<PermissionMatrixRole>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionMatrixRole {
    pub id: RoleId,
    pub name: String,
    pub priority: u16,
    pub is_system: bool,
    pub inherits: Vec<RoleId>,
    pub permissions: Vec<PermissionMatrixEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionMatrixEntry {
    /// Permission key, `<resource>:<action>`.
    pub permission: String,
    pub scope: OwnershipScope,
    pub time: TimeConstraint,
    /// Number of attribute conditions attached.
    pub conditions: usize,
}

// ============================================================================
// Builtin roles
// ============================================================================

/// Role id of the builtin break-glass role. The decision engine checks this
/// id when an emergency override is requested.
pub const EMERGENCY_RESPONDER: &str = "emergency_responder";

/// Front-desk staff: appointment management inside the organization, during
/// business hours.
fn receptionist() -> Role {
    Role::new("receptionist", "Receptionist", 150)
        .with_description("Schedules and manages appointments")
        .with_permission(
            Permission::new(ResourceKind::Appointment, Action::View)
                .with_scope(OwnershipScope::Organization)
                .with_time(TimeConstraint::BusinessHours),
        )
        .with_permission(
            Permission::new(ResourceKind::Appointment, Action::Create)
                .with_scope(OwnershipScope::Organization)
                .with_time(TimeConstraint::BusinessHours),
        )
        .with_permission(
            Permission::new(ResourceKind::Appointment, Action::Update)
                .with_scope(OwnershipScope::Organization)
                .with_time(TimeConstraint::BusinessHours),
        )
        .system()
}

/// Billing staff. Deliberately has no clinical permissions; the conflict
/// table keeps billing and prescribing apart.
fn billing_clerk() -> Role {
    Role::new("billing_clerk", "Billing Clerk", 300)
        .with_description("Manages billing records and claims")
        .with_permission(
            Permission::new(ResourceKind::BillingRecord, Action::View)
                .with_scope(OwnershipScope::Organization)
                .with_time(TimeConstraint::BusinessHours),
        )
        .with_permission(
            Permission::new(ResourceKind::BillingRecord, Action::Create)
                .with_scope(OwnershipScope::Organization)
                .with_time(TimeConstraint::BusinessHours),
        )
        .with_permission(
            Permission::new(ResourceKind::BillingRecord, Action::Update)
                .with_scope(OwnershipScope::Organization)
                .with_time(TimeConstraint::BusinessHours),
        )
        .with_permission(
            Permission::new(ResourceKind::BillingRecord, Action::Export)
                .with_scope(OwnershipScope::Organization)
                .with_time(TimeConstraint::BusinessHours),
        )
        .system()
}

/// Laboratory staff: full lab-result workflow, around the clock.
fn lab_technician() -> Role {
    Role::new("lab_technician", "Lab Technician", 350)
        .with_description("Processes laboratory results")
        .with_parent("receptionist")
        .with_permission(
            Permission::new(ResourceKind::LabResult, Action::View)
                .with_scope(OwnershipScope::Organization),
        )
        .with_permission(
            Permission::new(ResourceKind::LabResult, Action::Create)
                .with_scope(OwnershipScope::Organization),
        )
        .with_permission(
            Permission::new(ResourceKind::LabResult, Action::Update)
                .with_scope(OwnershipScope::Organization),
        )
        .system()
}

/// Nursing staff: care-team scoped chart access at any hour, plus the
/// inherited appointment permissions.
fn nurse() -> Role {
    Role::new("nurse", "Nurse", 450)
        .with_description("Provides direct patient care")
        .with_parent("receptionist")
        .with_permission(
            Permission::new(ResourceKind::PatientRecord, Action::View)
                .with_scope(OwnershipScope::Team),
        )
        .with_permission(
            Permission::new(ResourceKind::PatientRecord, Action::Update)
                .with_scope(OwnershipScope::Team),
        )
        .with_permission(
            Permission::new(ResourceKind::LabResult, Action::View).with_scope(OwnershipScope::Team),
        )
        .with_permission(
            Permission::new(ResourceKind::Prescription, Action::View)
                .with_scope(OwnershipScope::Team),
        )
        .system()
}

/// First responders. The role carries no matrix entries on purpose: it is
/// the eligibility gate for break-glass overrides, and every grant made
/// through it flows out as a recorded emergency access, never as a routine
/// permission match. Priority above 500 also makes it non-delegable.
fn emergency_responder() -> Role {
    Role::new(EMERGENCY_RESPONDER, "Emergency Responder", 550)
        .with_description("Break-glass eligibility during declared emergencies")
        .system()
}

/// Pharmacy staff: prescription review and dispensing for the organization.
/// Dispensing carries an attribute condition so an already-dispensed
/// prescription cannot be filled twice.
fn pharmacist() -> Role {
    Role::new("pharmacist", "Pharmacist", 600)
        .with_description("Reviews and dispenses prescriptions")
        .with_parent("receptionist")
        .with_permission(
            Permission::new(ResourceKind::Prescription, Action::View)
                .with_scope(OwnershipScope::Organization),
        )
        .with_permission(
            Permission::new(ResourceKind::Prescription, Action::Dispense)
                .with_scope(OwnershipScope::Organization)
                .with_condition(AttributeCondition::new(
                    "resource.ext.status",
                    ConditionOp::NotEquals,
                    "dispensed",
                )),
        )
        .system()
}

/// Treating physicians: care-team scoped records and prescribing, plus
/// everything a nurse can do.
fn physician() -> Role {
    Role::new("physician", "Physician", 650)
        .with_description("Diagnoses and treats patients")
        .with_parent("nurse")
        .with_permission(
            Permission::new(ResourceKind::PatientRecord, Action::View)
                .with_scope(OwnershipScope::Team),
        )
        .with_permission(
            Permission::new(ResourceKind::PatientRecord, Action::Create)
                .with_scope(OwnershipScope::Organization),
        )
        .with_permission(
            Permission::new(ResourceKind::PatientRecord, Action::Update)
                .with_scope(OwnershipScope::Team),
        )
        .with_permission(
            Permission::new(ResourceKind::Prescription, Action::Create)
                .with_scope(OwnershipScope::Team),
        )
        .with_permission(
            Permission::new(ResourceKind::Prescription, Action::Prescribe)
                .with_scope(OwnershipScope::Team),
        )
        .with_permission(
            Permission::new(ResourceKind::LabResult, Action::Approve)
                .with_scope(OwnershipScope::Team),
        )
        .system()
}

/// Compliance office: audit visibility without any clinical reach.
fn compliance_officer() -> Role {
    Role::new("compliance_officer", "Compliance Officer", 750)
        .with_description("Monitors regulatory compliance")
        .with_permission(Permission::new(ResourceKind::AuditLog, Action::View))
        .with_permission(
            Permission::new(ResourceKind::AuditLog, Action::Export)
                .with_time(TimeConstraint::BusinessHours),
        )
        .with_permission(Permission::new(ResourceKind::EmergencyAccess, Action::View))
        .system()
}

/// Department leadership: organization-wide clinical visibility on top of
/// full physician capability.
fn medical_director() -> Role {
    Role::new("medical_director", "Medical Director", 800)
        .with_description("Leads clinical staff and approves staffing changes")
        .with_parent("physician")
        .with_permission(
            Permission::new(ResourceKind::PatientRecord, Action::View)
                .with_scope(OwnershipScope::Organization),
        )
        .with_permission(
            Permission::new(ResourceKind::PatientRecord, Action::Export)
                .with_scope(OwnershipScope::Organization)
                .with_time(TimeConstraint::BusinessHours),
        )
        .with_permission(
            Permission::new(ResourceKind::RoleAssignment, Action::Approve)
                .with_scope(OwnershipScope::Organization),
        )
        .system()
}

/// Independent audit: read and export everything audit-related, change
/// nothing. The conflict table keeps auditors out of administration.
fn auditor() -> Role {
    Role::new("auditor", "Auditor", 850)
        .with_description("Independent review of access and audit trails")
        .with_permission(Permission::new(ResourceKind::AuditLog, Action::View))
        .with_permission(Permission::new(ResourceKind::AuditLog, Action::Export))
        .with_permission(Permission::new(ResourceKind::RoleAssignment, Action::View))
        .with_permission(Permission::new(ResourceKind::EmergencyAccess, Action::View))
        .system()
}

/// Platform administration: role lifecycle and system maintenance. No audit
/// log access; oversight belongs to auditors.
fn system_admin() -> Role {
    Role::new("system_admin", "System Administrator", 900)
        .with_description("Administers users, roles, and the platform")
        .with_permission(Permission::new(ResourceKind::RoleAssignment, Action::View))
        .with_permission(Permission::new(ResourceKind::RoleAssignment, Action::Assign))
        .with_permission(Permission::new(ResourceKind::RoleAssignment, Action::Revoke))
        .with_permission(Permission::new(ResourceKind::System, Action::View))
        .with_permission(Permission::new(ResourceKind::System, Action::Update))
        .with_permission(Permission::new(ResourceKind::PatientRecord, Action::Delete))
        .system()
}

/// Root authority: everything a system administrator can do, plus
/// destructive platform operations and emergency-access revocation.
fn super_admin() -> Role {
    Role::new("super_admin", "Super Administrator", 1000)
        .with_description("Unrestricted platform authority")
        .with_parent("system_admin")
        .with_permission(Permission::new(ResourceKind::System, Action::Delete))
        .with_permission(Permission::new(ResourceKind::EmergencyAccess, Action::Revoke))
        .system()
}
