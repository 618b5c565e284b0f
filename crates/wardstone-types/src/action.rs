//! Request vocabulary: the actions a subject can attempt and the kinds of
//! resources they can be attempted on.
//!
//! Both enums are closed. Permission checks, decision traces, and audit
//! entries all use the stable `key()` names, so the wire form and the trace
//! form never diverge.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

// ============================================================================
// Action
// ============================================================================

/// An operation a subject attempts against a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    View,
    Create,
    Update,
    Delete,
    Export,
    /// Write a prescription. Physician-tier clinical action.
    Prescribe,
    /// Fill a prescription. Pharmacy-tier clinical action.
    Dispense,
    Approve,
    /// Grant a role to a user.
    Assign,
    /// Remove a role from a user.
    Revoke,
    /// Hand a held role to another user for a bounded period.
    Delegate,
}

impl Action {
    /// Stable lowercase name used in permission keys and decision traces.
    pub fn key(self) -> &'static str {
        match self {
            Action::View => "view",
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::Export => "export",
            Action::Prescribe => "prescribe",
            Action::Dispense => "dispense",
            Action::Approve => "approve",
            Action::Assign => "assign",
            Action::Revoke => "revoke",
            Action::Delegate => "delegate",
        }
    }
}

impl Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

// ============================================================================
// ResourceKind
// ============================================================================

/// The category of resource named in a request.
///
/// The engine never loads resource data; it only reasons about the kind, the
/// opaque resource id, and the attributes the caller supplies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// A patient's medical record. Keyed as `record` in traces.
    #[serde(rename = "record")]
    PatientRecord,
    Prescription,
    LabResult,
    Appointment,
    BillingRecord,
    AuditLog,
    RoleAssignment,
    EmergencyAccess,
    /// Administrative surface of the platform itself.
    System,
}

impl ResourceKind {
    /// Stable lowercase name used in permission keys and decision traces.
    pub fn key(self) -> &'static str {
        match self {
            ResourceKind::PatientRecord => "record",
            ResourceKind::Prescription => "prescription",
            ResourceKind::LabResult => "lab_result",
            ResourceKind::Appointment => "appointment",
            ResourceKind::BillingRecord => "billing_record",
            ResourceKind::AuditLog => "audit_log",
            ResourceKind::RoleAssignment => "role_assignment",
            ResourceKind::EmergencyAccess => "emergency_access",
            ResourceKind::System => "system",
        }
    }
}

impl Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}
