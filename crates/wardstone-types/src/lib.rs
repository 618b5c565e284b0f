//! # wardstone-types: Core types for `Wardstone`
//!
//! This crate contains shared types used across the `Wardstone` system:
//! - Entity IDs ([`UserId`], [`RoleId`], [`AssignmentId`], [`CampaignId`])
//! - Request vocabulary ([`Action`], [`ResourceKind`])
//! - Attribute model ([`SubjectAttributes`], [`ResourceAttributes`], [`AttributeValue`])
//! - Policy contexts ([`PolicyContext`], [`EnvironmentContext`], [`BusinessHours`])
//! - Decisions ([`AccessDecision`], [`PolicyTrace`])
//! - Role assignments ([`UserRoleAssignment`], [`EmergencyAccessRecord`])
//! - Error classification ([`ErrorKind`])

use std::fmt::Display;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

mod action;
mod assignment;
mod context;
mod decision;

pub use action::{Action, ResourceKind};
pub use assignment::{AssignmentCondition, EmergencyAccessRecord, UserRoleAssignment};
pub use context::{
    AttributeValue, BusinessHours, ContextError, EnvironmentContext, MAX_EXT_ATTRIBUTES,
    PolicyContext, Resource, ResourceAttributes, Subject, SubjectAttributes,
};
pub use decision::{AccessDecision, PolicyTrace};

// ============================================================================
// Entity IDs - String-backed (supplied by the identity provider)
// ============================================================================

/// Unique identifier for a user, as issued by the identity provider.
///
/// # Examples
///
/// ```
/// # use wardstone_types::UserId;
/// let id = UserId::new("dr-chen");
/// assert_eq!(id.as_str(), "dr-chen");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The reserved actor used for bootstrap operations that must not be
    /// authorized through the policy engine itself.
    pub fn system() -> Self {
        Self("system".to_string())
    }

    /// Returns `true` for the reserved bootstrap actor.
    pub fn is_system(&self) -> bool {
        self.0 == "system"
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for UserId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Unique identifier for a role in the catalog.
///
/// Role IDs are stable slugs (`physician`, `super_admin`), never display names.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RoleId(String);

impl RoleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for RoleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RoleId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for RoleId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Opaque session identifier carried in the request environment.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

// ============================================================================
// Entity IDs - UUID-backed (minted by the engine)
// ============================================================================

/// Unique identifier for a user-role assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AssignmentId(Uuid);

impl AssignmentId {
    /// Mints a fresh random identifier.
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Display for AssignmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for AssignmentId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

/// Unique identifier for a break-glass emergency access record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EmergencyAccessId(Uuid);

impl EmergencyAccessId {
    /// Mints a fresh random identifier.
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Display for EmergencyAccessId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for EmergencyAccessId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

/// Unique identifier for a certification campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CampaignId(Uuid);

impl CampaignId {
    /// Mints a fresh random identifier.
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Display for CampaignId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for CampaignId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

/// Unique identifier for a single certification within a campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CertificationId(Uuid);

impl CertificationId {
    /// Mints a fresh random identifier.
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Display for CertificationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for CertificationId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

/// Unique identifier for an audit log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AuditEntryId(Uuid);

impl AuditEntryId {
    /// Mints a fresh random identifier.
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Display for AuditEntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for AuditEntryId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

// ============================================================================
// Error classification
// ============================================================================

/// Coarse classification shared by every error type in the system.
///
/// Callers branch on the kind; the error itself carries the detail. The
/// mapping is fixed: unknown entities are [`NotFound`](ErrorKind::NotFound),
/// policy refusals are [`Forbidden`](ErrorKind::Forbidden), state collisions
/// (duplicate assignments, separation-of-duties violations, already-decided
/// certifications) are [`Conflict`](ErrorKind::Conflict), malformed input is
/// [`Validation`](ErrorKind::Validation), and unexpected store faults are
/// [`Internal`](ErrorKind::Internal).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Forbidden,
    Conflict,
    Validation,
    Internal,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Validation => "validation",
            ErrorKind::Internal => "internal",
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
