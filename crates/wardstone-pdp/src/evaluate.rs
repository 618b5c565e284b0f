//! Request evaluation: the decision pipeline.
//!
//! 1. Resolve effective roles (assignment order, visited-set walk).
//! 2. Gate each role on its constraints; a failing role is skipped whole.
//! 3. Match role permissions; the first fully satisfied permission grants
//!    and short-circuits.
//! 4. Attribute fallback: department match, then clearance dominance.
//! 5. Break-glass: an emergency override by a responder grants the request,
//!    contingent on the caller durably recording it first.
//! 6. Deny, returning the full consulted-rule trace.
//!
//! The evaluator is pure: no stores, no clock reads (time comes from the
//! context), no panics. Persistence, caching, and audit belong to the
//! caller.

use wardstone_catalog::{EMERGENCY_RESPONDER, RoleCatalog};
use wardstone_types::{
    AccessDecision, AttributeValue, BusinessHours, PolicyContext, PolicyTrace, UserRoleAssignment,
};

use crate::roles::effective_role_entries;

/// Subject extension attribute carrying the break-glass justification.
pub const JUSTIFICATION_ATTRIBUTE: &str = "justification";

/// Tunables for one evaluation.
#[derive(Debug, Clone, Default)]
pub struct EvaluationConfig {
    /// Window consulted by `business_hours` time constraints.
    pub business_hours: BusinessHours,
}

/// The outcome of evaluating one request.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub decision: AccessDecision,
    /// Present when the grant is an emergency override. The caller must
    /// persist the corresponding record before releasing the decision; if
    /// that write fails, the access must be denied.
    pub emergency: Option<EmergencyGrant>,
}

/// What the caller needs to record a break-glass grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmergencyGrant {
    pub justification: String,
}

/// Evaluates one access request against the catalog and the user's
/// assignments.
///
/// Deny-by-default: the request is allowed only when a role permission, an
/// attribute rule, or a break-glass override explicitly grants it. The
/// returned trace lists every rule consulted, in evaluation order.
pub fn evaluate(
    catalog: &RoleCatalog,
    assignments: &[UserRoleAssignment],
    ctx: &PolicyContext,
    config: &EvaluationConfig,
) -> Evaluation {
    let required = format!("{}:{}", ctx.resource.kind.key(), ctx.action.key());
    let entries = effective_role_entries(catalog, assignments, ctx.environment.time);

    tracing::debug!(
        subject = %ctx.subject.id,
        permission = %required,
        effective_roles = entries.len(),
        "evaluating access request"
    );

    let mut traces: Vec<PolicyTrace> = Vec::new();

    // RBAC pass, in assignment order. Priority plays no part here.
    for entry in &entries {
        if let Some(constraint) = entry.role.failed_constraint(ctx, entry.assignment) {
            traces.push(PolicyTrace::unmatched(format!(
                "role_constraint:{}:{}",
                entry.role.id,
                constraint.kind()
            )));
            continue;
        }
        for permission in entry.role.matching_permissions(ctx.resource.kind, ctx.action) {
            let policy = format!("role_permission:{}:{}", entry.role.id, permission.key());
            match permission.first_failure(ctx, &config.business_hours) {
                None => {
                    traces.push(PolicyTrace::matched(policy));
                    return granted(
                        format!("granted by role `{}`", entry.role.id),
                        &required,
                        traces,
                    );
                }
                Some(detail) => traces.push(PolicyTrace::unmatched(policy).with_detail(detail)),
            }
        }
    }

    // Attribute fallback. Absent attributes never widen access, and an
    // unclassified resource grants nothing through clearance.
    let subject = &ctx.subject.attributes;
    let resource = &ctx.resource.attributes;

    let department_match = match (&subject.department, &resource.department) {
        (Some(s), Some(r)) => s == r,
        _ => false,
    };
    if department_match {
        traces.push(PolicyTrace::matched("abac:department_match"));
        return granted(
            "granted by attribute policy: department match",
            &required,
            traces,
        );
    }
    traces.push(PolicyTrace::unmatched("abac:department_match"));

    if resource.classification_level > 0 && subject.clearance_level >= resource.classification_level
    {
        traces.push(PolicyTrace::matched("abac:clearance_dominates"));
        return granted(
            "granted by attribute policy: clearance dominates classification",
            &required,
            traces,
        );
    }
    traces.push(PolicyTrace::unmatched("abac:clearance_dominates"));

    // Break-glass. Requires the override flag, the responder role in the
    // effective set, and a non-empty justification.
    if subject.emergency_override {
        let holds_responder = entries
            .iter()
            .any(|entry| entry.role.id.as_str() == EMERGENCY_RESPONDER);
        if holds_responder {
            if let Some(justification) = justification(ctx) {
                traces.push(PolicyTrace::matched("emergency_override"));
                let decision = AccessDecision::allow("break-glass emergency override")
                    .with_required_permission(required)
                    .with_traces(traces)
                    .via_break_glass();
                return Evaluation {
                    decision,
                    emergency: Some(EmergencyGrant { justification }),
                };
            }
            traces.push(
                PolicyTrace::unmatched("emergency_override").with_detail("justification:empty"),
            );
        } else {
            traces.push(
                PolicyTrace::unmatched("emergency_override")
                    .with_detail("role:emergency_responder"),
            );
        }
    }

    let decision = AccessDecision::deny(format!("no role or attribute policy grants `{required}`"))
        .with_required_permission(required)
        .with_traces(traces);
    Evaluation {
        decision,
        emergency: None,
    }
}

fn granted(reason: impl Into<String>, required: &str, traces: Vec<PolicyTrace>) -> Evaluation {
    Evaluation {
        decision: AccessDecision::allow(reason)
            .with_required_permission(required)
            .with_traces(traces),
        emergency: None,
    }
}

/// The trimmed, non-empty break-glass justification, if supplied.
fn justification(ctx: &PolicyContext) -> Option<String> {
    ctx.subject
        .attributes
        .ext
        .get(JUSTIFICATION_ATTRIBUTE)
        .and_then(AttributeValue::as_str)
        .map(str::trim)
        .filter(|j| !j.is_empty())
        .map(ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use test_case::test_case;
    use wardstone_catalog::{Permission, Role, RoleConstraint};
    use wardstone_types::{
        Action, EnvironmentContext, Resource, ResourceAttributes, ResourceKind, Subject,
        SubjectAttributes,
    };

    fn weekday_morning() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 5, 10, 0, 0).unwrap()
    }

    fn saturday_small_hours() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 8, 3, 0, 0).unwrap()
    }

    fn assignment(role: &str) -> UserRoleAssignment {
        UserRoleAssignment::new(
            "dr-chen",
            role,
            "system",
            weekday_morning() - Duration::days(30),
        )
    }

    fn record_request(
        subject: SubjectAttributes,
        resource: ResourceAttributes,
        action: Action,
        time: DateTime<Utc>,
    ) -> PolicyContext {
        PolicyContext::new(
            Subject::new("dr-chen", subject),
            Resource::new(ResourceKind::PatientRecord, "mrn-1001", resource),
            action,
            EnvironmentContext::at(time),
        )
    }

    fn check(
        catalog: &RoleCatalog,
        assignments: &[UserRoleAssignment],
        ctx: &PolicyContext,
    ) -> Evaluation {
        evaluate(catalog, assignments, ctx, &EvaluationConfig::default())
    }

    #[test]
    fn physician_views_team_owned_record() {
        let catalog = RoleCatalog::builtin();
        let assignments = vec![assignment("physician")];
        let ctx = record_request(
            SubjectAttributes::new(),
            ResourceAttributes::new().with_care_team_member("dr-chen"),
            Action::View,
            weekday_morning(),
        );

        let evaluation = check(&catalog, &assignments, &ctx);
        assert!(evaluation.decision.allowed);
        assert_eq!(evaluation.decision.reason, "granted by role `physician`");
        assert!(
            evaluation
                .decision
                .matched_policies()
                .any(|p| p == "role_permission:physician:record:view"),
            "trace must name the granting permission"
        );
        assert!(evaluation.emergency.is_none());
    }

    #[test]
    fn physician_cannot_delete_records() {
        let catalog = RoleCatalog::builtin();
        let assignments = vec![assignment("physician")];
        let ctx = record_request(
            SubjectAttributes::new(),
            ResourceAttributes::new(),
            Action::Delete,
            weekday_morning(),
        );

        let evaluation = check(&catalog, &assignments, &ctx);
        assert!(!evaluation.decision.allowed);
        assert_eq!(
            evaluation.decision.missing_permissions,
            vec!["record:delete"]
        );
    }

    #[test]
    fn first_satisfied_permission_short_circuits() {
        let mut catalog = RoleCatalog::empty();
        catalog
            .register(
                Role::new("junior", "Junior", 100)
                    .with_permission(Permission::new(ResourceKind::PatientRecord, Action::View)),
            )
            .unwrap();
        catalog
            .register(
                Role::new("senior", "Senior", 900)
                    .with_permission(Permission::new(ResourceKind::PatientRecord, Action::View)),
            )
            .unwrap();

        // Junior assigned first wins, despite senior's higher priority.
        let assignments = vec![assignment("junior"), assignment("senior")];
        let ctx = record_request(
            SubjectAttributes::new(),
            ResourceAttributes::new(),
            Action::View,
            weekday_morning(),
        );

        let evaluation = check(&catalog, &assignments, &ctx);
        assert!(evaluation.decision.allowed);
        assert_eq!(evaluation.decision.reason, "granted by role `junior`");
        assert!(
            !evaluation
                .decision
                .applied_policies
                .iter()
                .any(|t| t.policy.starts_with("role_permission:senior")),
            "evaluation must stop at the first grant"
        );
        assert!(
            !evaluation
                .decision
                .applied_policies
                .iter()
                .any(|t| t.policy.starts_with("abac:")),
            "attribute rules are not consulted after a role grant"
        );
    }

    #[test]
    fn failing_constraint_skips_the_whole_role() {
        let mut catalog = RoleCatalog::empty();
        catalog
            .register(
                Role::new("day_shift", "Day Shift", 300)
                    .with_constraint(RoleConstraint::TimeWindow {
                        start_hour: 8,
                        end_hour: 18,
                    })
                    .with_permission(Permission::new(ResourceKind::PatientRecord, Action::View)),
            )
            .unwrap();

        let assignments = vec![assignment("day_shift")];
        let late = Utc.with_ymd_and_hms(2025, 3, 5, 22, 0, 0).unwrap();
        let ctx = record_request(
            SubjectAttributes::new(),
            ResourceAttributes::new(),
            Action::View,
            late,
        );

        let evaluation = check(&catalog, &assignments, &ctx);
        assert!(!evaluation.decision.allowed);
        assert!(
            evaluation
                .decision
                .applied_policies
                .iter()
                .any(|t| t.policy == "role_constraint:day_shift:time_window" && !t.matched),
            "the failed constraint must be traced"
        );
        assert!(
            !evaluation
                .decision
                .applied_policies
                .iter()
                .any(|t| t.policy.starts_with("role_permission:day_shift")),
            "a gated role's permissions are never consulted"
        );
    }

    #[test]
    fn scope_failure_is_traced_with_detail() {
        let catalog = RoleCatalog::builtin();
        let assignments = vec![assignment("nurse")];
        // Record belongs to someone else's care team.
        let ctx = record_request(
            SubjectAttributes::new(),
            ResourceAttributes::new().with_care_team_member("dr-patel"),
            Action::View,
            weekday_morning(),
        );

        let evaluation = check(&catalog, &assignments, &ctx);
        assert!(!evaluation.decision.allowed);
        let trace = evaluation
            .decision
            .applied_policies
            .iter()
            .find(|t| t.policy == "role_permission:nurse:record:view")
            .expect("nurse view permission must be consulted");
        assert!(!trace.matched);
        assert_eq!(trace.detail.as_deref(), Some("scope:team"));
    }

    #[test]
    fn department_match_grants_without_roles() {
        let catalog = RoleCatalog::builtin();
        let ctx = record_request(
            SubjectAttributes::new().with_department("cardiology"),
            ResourceAttributes::new().with_department("cardiology"),
            Action::View,
            weekday_morning(),
        );

        let evaluation = check(&catalog, &[], &ctx);
        assert!(evaluation.decision.allowed);
        assert_eq!(
            evaluation.decision.reason,
            "granted by attribute policy: department match"
        );
        assert!(
            evaluation
                .decision
                .matched_policies()
                .any(|p| p == "abac:department_match")
        );
    }

    #[test]
    fn clearance_dominates_classification() {
        let catalog = RoleCatalog::builtin();
        let ctx = record_request(
            SubjectAttributes::new().with_clearance_level(4),
            ResourceAttributes::new().with_classification_level(3),
            Action::View,
            weekday_morning(),
        );

        let evaluation = check(&catalog, &[], &ctx);
        assert!(evaluation.decision.allowed);
        assert_eq!(
            evaluation.decision.reason,
            "granted by attribute policy: clearance dominates classification"
        );
        // The department rule was consulted first and did not match.
        assert_eq!(
            evaluation.decision.applied_policies[0].policy,
            "abac:department_match"
        );
        assert!(!evaluation.decision.applied_policies[0].matched);
    }

    #[test_case(4, 3, true; "clearance above classification")]
    #[test_case(3, 3, true; "clearance equal to classification")]
    #[test_case(2, 3, false; "clearance below classification")]
    #[test_case(5, 0, false; "unclassified resource never grants")]
    fn clearance_rule_combinations(clearance: u8, classification: u8, allowed: bool) {
        let catalog = RoleCatalog::builtin();
        let ctx = record_request(
            SubjectAttributes::new().with_clearance_level(clearance),
            ResourceAttributes::new().with_classification_level(classification),
            Action::View,
            weekday_morning(),
        );

        let evaluation = check(&catalog, &[], &ctx);
        assert_eq!(evaluation.decision.allowed, allowed);
    }

    #[test]
    fn break_glass_grants_for_responders() {
        let catalog = RoleCatalog::builtin();
        let assignments = vec![assignment("emergency_responder")];
        let ctx = record_request(
            SubjectAttributes::new()
                .with_emergency_override()
                .with_ext("justification", "patient coding, treating team unreachable"),
            ResourceAttributes::new(),
            Action::View,
            saturday_small_hours(),
        );

        let evaluation = check(&catalog, &assignments, &ctx);
        assert!(evaluation.decision.allowed);
        assert!(evaluation.decision.break_glass);
        assert_eq!(evaluation.decision.reason, "break-glass emergency override");
        let grant = evaluation.emergency.expect("emergency grant details");
        assert_eq!(
            grant.justification,
            "patient coding, treating team unreachable"
        );
        assert!(
            evaluation
                .decision
                .matched_policies()
                .any(|p| p == "emergency_override")
        );
    }

    #[test]
    fn break_glass_requires_the_responder_role() {
        let catalog = RoleCatalog::builtin();
        let assignments = vec![assignment("nurse")];
        let ctx = record_request(
            SubjectAttributes::new()
                .with_emergency_override()
                .with_ext("justification", "attempted override"),
            ResourceAttributes::new(),
            Action::View,
            saturday_small_hours(),
        );

        let evaluation = check(&catalog, &assignments, &ctx);
        assert!(!evaluation.decision.allowed);
        assert!(evaluation.emergency.is_none());
        let trace = evaluation
            .decision
            .applied_policies
            .iter()
            .find(|t| t.policy == "emergency_override")
            .expect("override attempt must be traced");
        assert_eq!(trace.detail.as_deref(), Some("role:emergency_responder"));
    }

    #[test]
    fn break_glass_requires_a_justification() {
        let catalog = RoleCatalog::builtin();
        let assignments = vec![assignment("emergency_responder")];
        let ctx = record_request(
            SubjectAttributes::new()
                .with_emergency_override()
                .with_ext("justification", "   "),
            ResourceAttributes::new(),
            Action::View,
            saturday_small_hours(),
        );

        let evaluation = check(&catalog, &assignments, &ctx);
        assert!(
            !evaluation.decision.allowed,
            "a blank justification must fail closed"
        );
        let trace = evaluation
            .decision
            .applied_policies
            .iter()
            .find(|t| t.policy == "emergency_override")
            .expect("override attempt must be traced");
        assert_eq!(trace.detail.as_deref(), Some("justification:empty"));
    }

    #[test]
    fn default_is_deny_with_a_complete_trace() {
        let catalog = RoleCatalog::builtin();
        let ctx = record_request(
            SubjectAttributes::new(),
            ResourceAttributes::new(),
            Action::Export,
            weekday_morning(),
        );

        let evaluation = check(&catalog, &[], &ctx);
        assert!(!evaluation.decision.allowed);
        assert_eq!(
            evaluation.decision.reason,
            "no role or attribute policy grants `record:export`"
        );
        assert_eq!(evaluation.decision.required_permissions, vec!["record:export"]);
        assert_eq!(evaluation.decision.missing_permissions, vec!["record:export"]);
        let consulted: Vec<&str> = evaluation
            .decision
            .applied_policies
            .iter()
            .map(|t| t.policy.as_str())
            .collect();
        assert_eq!(
            consulted,
            vec!["abac:department_match", "abac:clearance_dominates"]
        );
    }
}
