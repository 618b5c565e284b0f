//! Access decisions and their evaluation traces.

use serde::{Deserialize, Serialize};

// ============================================================================
// Policy trace
// ============================================================================

/// One rule consulted during evaluation, matched or not.
///
/// Trace ids are stable and machine-parseable:
/// - `role_permission:<role>:<resource>:<action>`
/// - `role_constraint:<role>:<kind>`
/// - `abac:department_match`, `abac:clearance_dominates`
/// - `emergency_override`
/// - `decision_cache`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyTrace {
    /// Stable rule identifier.
    pub policy: String,
    /// Whether the rule granted (or, for constraints, passed).
    pub matched: bool,
    /// Optional machine-readable qualifier, e.g. which check failed.
    pub detail: Option<String>,
}

impl PolicyTrace {
    pub fn matched(policy: impl Into<String>) -> Self {
        Self {
            policy: policy.into(),
            matched: true,
            detail: None,
        }
    }

    pub fn unmatched(policy: impl Into<String>) -> Self {
        Self {
            policy: policy.into(),
            matched: false,
            detail: None,
        }
    }

    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

// ============================================================================
// Access decision
// ============================================================================

/// The outcome of evaluating one [`PolicyContext`](crate::PolicyContext).
///
/// Reasons are identifier-only: role ids, permission keys, and rule names.
/// Patient data and attribute values never appear here, because decisions are
/// copied verbatim into the audit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessDecision {
    pub allowed: bool,
    /// Short, PHI-free explanation.
    pub reason: String,
    /// Permission keys the request needed, `<resource>:<action>`.
    pub required_permissions: Vec<String>,
    /// The subset of required permissions no policy granted. Empty when
    /// allowed.
    pub missing_permissions: Vec<String>,
    /// Every rule consulted, in evaluation order.
    pub applied_policies: Vec<PolicyTrace>,
    /// Set when the grant came from a break-glass emergency override.
    pub break_glass: bool,
}

impl AccessDecision {
    pub fn allow(reason: impl Into<String>) -> Self {
        Self {
            allowed: true,
            reason: reason.into(),
            required_permissions: Vec::new(),
            missing_permissions: Vec::new(),
            applied_policies: Vec::new(),
            break_glass: false,
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: reason.into(),
            required_permissions: Vec::new(),
            missing_permissions: Vec::new(),
            applied_policies: Vec::new(),
            break_glass: false,
        }
    }

    #[must_use]
    pub fn with_required_permission(mut self, permission: impl Into<String>) -> Self {
        let permission = permission.into();
        if !self.allowed {
            self.missing_permissions.push(permission.clone());
        }
        self.required_permissions.push(permission);
        self
    }

    #[must_use]
    pub fn with_traces(mut self, traces: Vec<PolicyTrace>) -> Self {
        self.applied_policies = traces;
        self
    }

    #[must_use]
    pub fn via_break_glass(mut self) -> Self {
        self.break_glass = true;
        self
    }

    /// The trace ids of rules that matched, in order.
    pub fn matched_policies(&self) -> impl Iterator<Item = &str> {
        self.applied_policies
            .iter()
            .filter(|t| t.matched)
            .map(|t| t.policy.as_str())
    }
}
