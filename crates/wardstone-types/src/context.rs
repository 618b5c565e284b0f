//! Attribute model and policy context.
//!
//! A [`PolicyContext`] is the complete, trusted description of one access
//! request: who ([`Subject`]), what ([`Resource`]), which operation
//! ([`Action`](crate::Action)), and under which circumstances
//! ([`EnvironmentContext`]). The identity provider and the calling service
//! populate it; the engine only reads it.
//!
//! Attributes are typed structs with a closed set of well-known fields plus a
//! bounded extension map, validated at the boundary. Free-form attribute bags
//! are deliberately not supported: a typo'd key must fail validation instead
//! of silently evaluating to "attribute absent".

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Action, ErrorKind, ResourceKind, SessionId, UserId};

/// Upper bound on extension attributes per subject or resource.
pub const MAX_EXT_ATTRIBUTES: usize = 16;

/// Well-known subject fields that extension attributes must not shadow.
const SUBJECT_FIELDS: &[&str] = &[
    "id",
    "department",
    "organization",
    "clearance_level",
    "specialty",
    "emergency_override",
    "ext",
];

/// Well-known resource fields that extension attributes must not shadow.
const RESOURCE_FIELDS: &[&str] = &[
    "id",
    "kind",
    "department",
    "organization",
    "classification_level",
    "owner",
    "care_team",
    "ext",
];

// ============================================================================
// Attribute values
// ============================================================================

/// A single attribute value.
///
/// Serializes untagged, so extension maps read naturally in JSON:
/// `{"shift": "night", "ward": 3, "on_call": true}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Int(i64),
    Str(String),
    List(Vec<String>),
}

impl AttributeValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttributeValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            AttributeValue::List(items) => Some(items),
            _ => None,
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Str(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::Str(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Int(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

impl From<Vec<String>> for AttributeValue {
    fn from(value: Vec<String>) -> Self {
        AttributeValue::List(value)
    }
}

// ============================================================================
// Subject attributes
// ============================================================================

/// Attributes of the requesting user, as asserted by the identity provider.
///
/// Every field is optional on the wire; absent fields take their zero
/// values, so callers submit only the attributes they assert.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubjectAttributes {
    /// Organizational unit, e.g. `cardiology`.
    pub department: Option<String>,
    /// Owning organization for cross-facility deployments.
    pub organization: Option<String>,
    /// Clearance level, 0 (none) and up. Compared against
    /// [`ResourceAttributes::classification_level`].
    pub clearance_level: u8,
    /// Clinical specialty, informational.
    pub specialty: Option<String>,
    /// Set when the caller is invoking break-glass emergency access.
    pub emergency_override: bool,
    /// Bounded extension map for deployment-specific attributes.
    pub ext: BTreeMap<String, AttributeValue>,
}

impl SubjectAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_department(mut self, department: impl Into<String>) -> Self {
        self.department = Some(department.into());
        self
    }

    #[must_use]
    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(organization.into());
        self
    }

    #[must_use]
    pub fn with_clearance_level(mut self, level: u8) -> Self {
        self.clearance_level = level;
        self
    }

    #[must_use]
    pub fn with_specialty(mut self, specialty: impl Into<String>) -> Self {
        self.specialty = Some(specialty.into());
        self
    }

    #[must_use]
    pub fn with_emergency_override(mut self) -> Self {
        self.emergency_override = true;
        self
    }

    #[must_use]
    pub fn with_ext(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.ext.insert(key.into(), value.into());
        self
    }

    /// Checks the extension map against the closed-field rules.
    pub fn validate(&self) -> Result<(), ContextError> {
        validate_ext(&self.ext, SUBJECT_FIELDS)
    }
}

// ============================================================================
// Resource attributes
// ============================================================================

/// Attributes of the target resource, as supplied by the owning service.
///
/// Every field is optional on the wire; absent fields take their zero
/// values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceAttributes {
    /// Department the resource belongs to.
    pub department: Option<String>,
    /// Owning organization.
    pub organization: Option<String>,
    /// Sensitivity classification, 0 (public) and up. Compared against
    /// [`SubjectAttributes::clearance_level`].
    pub classification_level: u8,
    /// The user who owns the resource, when ownership applies.
    pub owner: Option<UserId>,
    /// Users on the care team for this resource.
    pub care_team: Vec<UserId>,
    /// Bounded extension map for deployment-specific attributes.
    pub ext: BTreeMap<String, AttributeValue>,
}

impl ResourceAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_department(mut self, department: impl Into<String>) -> Self {
        self.department = Some(department.into());
        self
    }

    #[must_use]
    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(organization.into());
        self
    }

    #[must_use]
    pub fn with_classification_level(mut self, level: u8) -> Self {
        self.classification_level = level;
        self
    }

    #[must_use]
    pub fn with_owner(mut self, owner: impl Into<UserId>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    #[must_use]
    pub fn with_care_team_member(mut self, member: impl Into<UserId>) -> Self {
        self.care_team.push(member.into());
        self
    }

    #[must_use]
    pub fn with_ext(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.ext.insert(key.into(), value.into());
        self
    }

    /// Checks the extension map against the closed-field rules.
    pub fn validate(&self) -> Result<(), ContextError> {
        validate_ext(&self.ext, RESOURCE_FIELDS)
    }
}

fn validate_ext(
    ext: &BTreeMap<String, AttributeValue>,
    reserved: &[&str],
) -> Result<(), ContextError> {
    if ext.len() > MAX_EXT_ATTRIBUTES {
        return Err(ContextError::TooManyAttributes {
            limit: MAX_EXT_ATTRIBUTES,
            count: ext.len(),
        });
    }
    for key in ext.keys() {
        if key.is_empty() {
            return Err(ContextError::EmptyAttributeKey);
        }
        if reserved.contains(&key.as_str()) {
            return Err(ContextError::ShadowedAttribute(key.clone()));
        }
    }
    Ok(())
}

// ============================================================================
// Environment
// ============================================================================

/// The business-hours window used by time-constrained permissions.
///
/// Hours are UTC; weekends are always outside business hours. Windows that
/// wrap midnight (`start_hour > end_hour`) are supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessHours {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl Default for BusinessHours {
    fn default() -> Self {
        Self {
            start_hour: 9,
            end_hour: 17,
        }
    }
}

impl BusinessHours {
    pub fn new(start_hour: u32, end_hour: u32) -> Self {
        Self {
            start_hour,
            end_hour,
        }
    }

    /// Whether `time` falls inside the window on a weekday.
    pub fn contains(&self, time: DateTime<Utc>) -> bool {
        if matches!(time.weekday(), Weekday::Sat | Weekday::Sun) {
            return false;
        }
        let hour = time.hour();
        if self.start_hour <= self.end_hour {
            (self.start_hour..self.end_hour).contains(&hour)
        } else {
            hour >= self.start_hour || hour < self.end_hour
        }
    }
}

/// Circumstances of the request: when, from where, under which session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentContext {
    /// Wall-clock time of the request. All time-based checks read this field,
    /// never the system clock, so evaluation stays reproducible.
    pub time: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub session_id: Option<SessionId>,
    /// Facility or network zone name, checked by location constraints.
    pub location: Option<String>,
}

impl EnvironmentContext {
    /// Environment pinned to an explicit timestamp.
    pub fn at(time: DateTime<Utc>) -> Self {
        Self {
            time,
            ip_address: None,
            session_id: None,
            location: None,
        }
    }

    /// Environment pinned to the current wall clock.
    pub fn now() -> Self {
        Self::at(Utc::now())
    }

    #[must_use]
    pub fn with_ip_address(mut self, ip: impl Into<String>) -> Self {
        self.ip_address = Some(ip.into());
        self
    }

    #[must_use]
    pub fn with_session_id(mut self, session: impl Into<SessionId>) -> Self {
        self.session_id = Some(session.into());
        self
    }

    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Whether the request falls in the default business-hours window.
    pub fn is_business_hours(&self) -> bool {
        BusinessHours::default().contains(self.time)
    }
}

// ============================================================================
// Policy context
// ============================================================================

/// The requesting user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub id: UserId,
    #[serde(default)]
    pub attributes: SubjectAttributes,
}

impl Subject {
    pub fn new(id: impl Into<UserId>, attributes: SubjectAttributes) -> Self {
        Self {
            id: id.into(),
            attributes,
        }
    }
}

/// The target resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub kind: ResourceKind,
    /// Opaque resource identifier; the engine never dereferences it.
    pub id: String,
    #[serde(default)]
    pub attributes: ResourceAttributes,
}

impl Resource {
    pub fn new(kind: ResourceKind, id: impl Into<String>, attributes: ResourceAttributes) -> Self {
        Self {
            kind,
            id: id.into(),
            attributes,
        }
    }
}

/// One complete access request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyContext {
    pub subject: Subject,
    pub resource: Resource,
    pub action: Action,
    pub environment: EnvironmentContext,
}

impl PolicyContext {
    pub fn new(
        subject: Subject,
        resource: Resource,
        action: Action,
        environment: EnvironmentContext,
    ) -> Self {
        Self {
            subject,
            resource,
            action,
            environment,
        }
    }

    /// Boundary validation: non-empty ids, well-formed extension maps.
    pub fn validate(&self) -> Result<(), ContextError> {
        if self.subject.id.as_str().is_empty() {
            return Err(ContextError::EmptySubjectId);
        }
        if self.resource.id.is_empty() {
            return Err(ContextError::EmptyResourceId);
        }
        self.subject.attributes.validate()?;
        self.resource.attributes.validate()?;
        Ok(())
    }

    /// Resolves a dotted attribute path against this context.
    ///
    /// Supported roots: `subject`, `resource`, `environment`, `action`.
    /// Extension attributes are addressed as `subject.ext.<key>` and
    /// `resource.ext.<key>`. Unknown paths resolve to `None`, which condition
    /// operators treat as "attribute absent", never as a match.
    pub fn lookup(&self, path: &str) -> Option<AttributeValue> {
        let mut parts = path.splitn(3, '.');
        let root = parts.next()?;
        match root {
            "action" => Some(AttributeValue::Str(self.action.key().to_string())),
            "subject" => match parts.next()? {
                "id" => Some(AttributeValue::Str(self.subject.id.to_string())),
                "department" => self
                    .subject
                    .attributes
                    .department
                    .clone()
                    .map(AttributeValue::Str),
                "organization" => self
                    .subject
                    .attributes
                    .organization
                    .clone()
                    .map(AttributeValue::Str),
                "clearance_level" => Some(AttributeValue::Int(i64::from(
                    self.subject.attributes.clearance_level,
                ))),
                "specialty" => self
                    .subject
                    .attributes
                    .specialty
                    .clone()
                    .map(AttributeValue::Str),
                "emergency_override" => Some(AttributeValue::Bool(
                    self.subject.attributes.emergency_override,
                )),
                "ext" => self.subject.attributes.ext.get(parts.next()?).cloned(),
                _ => None,
            },
            "resource" => match parts.next()? {
                "kind" => Some(AttributeValue::Str(self.resource.kind.key().to_string())),
                "id" => Some(AttributeValue::Str(self.resource.id.clone())),
                "department" => self
                    .resource
                    .attributes
                    .department
                    .clone()
                    .map(AttributeValue::Str),
                "organization" => self
                    .resource
                    .attributes
                    .organization
                    .clone()
                    .map(AttributeValue::Str),
                "classification_level" => Some(AttributeValue::Int(i64::from(
                    self.resource.attributes.classification_level,
                ))),
                "owner" => self
                    .resource
                    .attributes
                    .owner
                    .as_ref()
                    .map(|o| AttributeValue::Str(o.to_string())),
                "care_team" => Some(AttributeValue::List(
                    self.resource
                        .attributes
                        .care_team
                        .iter()
                        .map(ToString::to_string)
                        .collect(),
                )),
                "ext" => self.resource.attributes.ext.get(parts.next()?).cloned(),
                _ => None,
            },
            "environment" => match parts.next()? {
                "ip_address" => self
                    .environment
                    .ip_address
                    .clone()
                    .map(AttributeValue::Str),
                "location" => self.environment.location.clone().map(AttributeValue::Str),
                _ => None,
            },
            _ => None,
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Rejections raised by boundary validation of a [`PolicyContext`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("subject id must not be empty")]
    EmptySubjectId,

    #[error("resource id must not be empty")]
    EmptyResourceId,

    #[error("extension attribute keys must not be empty")]
    EmptyAttributeKey,

    #[error("extension attribute `{0}` shadows a well-known field")]
    ShadowedAttribute(String),

    #[error("at most {limit} extension attributes are allowed, got {count}")]
    TooManyAttributes { limit: usize, count: usize },
}

impl ContextError {
    /// All context errors are validation failures.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }
}
