//! Permission grants and their qualifying checks.
//!
//! A [`Permission`] names a `(resource, action)` pair and three qualifiers
//! that all have to hold before the grant applies: an ownership scope, a time
//! constraint, and a list of ANDed attribute conditions. Evaluation
//! short-circuits on the first failing qualifier.

use serde::{Deserialize, Serialize};
use wardstone_types::{Action, AttributeValue, BusinessHours, PolicyContext, ResourceKind};

// ============================================================================
// Ownership scope
// ============================================================================

/// How far a grant reaches relative to the resource's ownership attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnershipScope {
    /// Only resources the subject owns.
    Own,
    /// Resources the subject owns or is on the care team for.
    Team,
    /// Resources belonging to the subject's organization.
    Organization,
    /// Every resource of the kind.
    Any,
}

impl OwnershipScope {
    pub fn key(self) -> &'static str {
        match self {
            OwnershipScope::Own => "own",
            OwnershipScope::Team => "team",
            OwnershipScope::Organization => "organization",
            OwnershipScope::Any => "any",
        }
    }

    /// Whether the scope covers the request. Missing ownership attributes
    /// never widen a scope: an ownerless resource fails `Own`, and a request
    /// without organizations on both sides fails `Organization`.
    pub fn permits(self, ctx: &PolicyContext) -> bool {
        match self {
            OwnershipScope::Any => true,
            OwnershipScope::Own => ctx.resource.attributes.owner.as_ref() == Some(&ctx.subject.id),
            OwnershipScope::Team => {
                ctx.resource.attributes.owner.as_ref() == Some(&ctx.subject.id)
                    || ctx.resource.attributes.care_team.contains(&ctx.subject.id)
            }
            OwnershipScope::Organization => match (
                &ctx.subject.attributes.organization,
                &ctx.resource.attributes.organization,
            ) {
                (Some(subject_org), Some(resource_org)) => subject_org == resource_org,
                _ => false,
            },
        }
    }
}

// ============================================================================
// Time constraint
// ============================================================================

/// When a grant is usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeConstraint {
    /// Usable at any time.
    Always,
    /// Usable only inside the configured business-hours window.
    BusinessHours,
    /// Usable only while the subject is invoking an emergency override.
    Emergency,
}

impl TimeConstraint {
    pub fn key(self) -> &'static str {
        match self {
            TimeConstraint::Always => "always",
            TimeConstraint::BusinessHours => "business_hours",
            TimeConstraint::Emergency => "emergency",
        }
    }

    pub fn permits(self, ctx: &PolicyContext, hours: &BusinessHours) -> bool {
        match self {
            TimeConstraint::Always => true,
            TimeConstraint::BusinessHours => hours.contains(ctx.environment.time),
            TimeConstraint::Emergency => ctx.subject.attributes.emergency_override,
        }
    }
}

// ============================================================================
// Attribute conditions
// ============================================================================

/// Comparison operator for an [`AttributeCondition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOp {
    Equals,
    NotEquals,
    In,
    NotIn,
    Contains,
}

/// One attribute comparison against the request context.
///
/// `field` is a dotted path resolved by
/// [`PolicyContext::lookup`]. Absent attributes never satisfy the positive
/// operators (`equals`, `in`, `contains`); the negative operators
/// (`not_equals`, `not_in`) treat absence as success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeCondition {
    pub field: String,
    pub op: ConditionOp,
    pub value: AttributeValue,
}

impl AttributeCondition {
    pub fn new(
        field: impl Into<String>,
        op: ConditionOp,
        value: impl Into<AttributeValue>,
    ) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    pub fn evaluate(&self, ctx: &PolicyContext) -> bool {
        let resolved = ctx.lookup(&self.field);
        match self.op {
            ConditionOp::Equals => resolved.as_ref() == Some(&self.value),
            ConditionOp::NotEquals => resolved.as_ref() != Some(&self.value),
            ConditionOp::In => match (&resolved, &self.value) {
                (Some(AttributeValue::Str(s)), AttributeValue::List(items)) => items.contains(s),
                _ => false,
            },
            ConditionOp::NotIn => match (&resolved, &self.value) {
                (Some(AttributeValue::Str(s)), AttributeValue::List(items)) => !items.contains(s),
                (None, AttributeValue::List(_)) => true,
                _ => false,
            },
            ConditionOp::Contains => match (&resolved, &self.value) {
                (Some(AttributeValue::List(items)), AttributeValue::Str(s)) => items.contains(s),
                (Some(AttributeValue::Str(haystack)), AttributeValue::Str(needle)) => {
                    haystack.contains(needle.as_str())
                }
                _ => false,
            },
        }
    }
}

// ============================================================================
// Permission
// ============================================================================

/// A single grant: `(resource, action)` plus qualifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub resource: ResourceKind,
    pub action: Action,
    pub scope: OwnershipScope,
    pub time: TimeConstraint,
    /// ANDed conditions; all must hold.
    pub conditions: Vec<AttributeCondition>,
}

impl Permission {
    /// An unconditional grant: any scope, any time, no conditions.
    pub fn new(resource: ResourceKind, action: Action) -> Self {
        Self {
            resource,
            action,
            scope: OwnershipScope::Any,
            time: TimeConstraint::Always,
            conditions: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_scope(mut self, scope: OwnershipScope) -> Self {
        self.scope = scope;
        self
    }

    #[must_use]
    pub fn with_time(mut self, time: TimeConstraint) -> Self {
        self.time = time;
        self
    }

    #[must_use]
    pub fn with_condition(mut self, condition: AttributeCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Whether this permission is about the requested `(resource, action)`.
    pub fn applies_to(&self, resource: ResourceKind, action: Action) -> bool {
        self.resource == resource && self.action == action
    }

    /// Stable permission key, `<resource>:<action>`.
    pub fn key(&self) -> String {
        format!("{}:{}", self.resource.key(), self.action.key())
    }

    /// Checks scope, time, then conditions in order. Returns the first
    /// failing qualifier as a trace detail, or `None` when fully satisfied.
    pub fn first_failure(&self, ctx: &PolicyContext, hours: &BusinessHours) -> Option<String> {
        if !self.scope.permits(ctx) {
            return Some(format!("scope:{}", self.scope.key()));
        }
        if !self.time.permits(ctx, hours) {
            return Some(format!("time:{}", self.time.key()));
        }
        for condition in &self.conditions {
            if !condition.evaluate(ctx) {
                return Some(format!("condition:{}", condition.field));
            }
        }
        None
    }
}
