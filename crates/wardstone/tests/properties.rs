//! Property-based tests using proptest.
//!
//! Invariants that must hold for every input: deny by default, inheritance
//! closure, separation of duties, cache transparency, and risk banding.

use std::collections::BTreeSet;

use chrono::{DateTime, TimeZone, Utc};
use proptest::prelude::*;
use wardstone::{
    Action, AssignOptions, CertificationSchedule, EnvironmentContext, PolicyContext, Resource,
    ResourceAttributes, ResourceKind, ReviewDecision, RiskLevel, RoleCatalog, RoleId, RoleScope,
    Subject, SubjectAttributes, UserId, Wardstone, risk_score,
};

/// Every role shipped in the builtin catalog.
const BUILTIN_ROLES: &[&str] = &[
    "receptionist",
    "billing_clerk",
    "lab_technician",
    "nurse",
    "emergency_responder",
    "pharmacist",
    "physician",
    "compliance_officer",
    "medical_director",
    "auditor",
    "system_admin",
    "super_admin",
];

const KINDS: &[ResourceKind] = &[
    ResourceKind::PatientRecord,
    ResourceKind::Prescription,
    ResourceKind::LabResult,
    ResourceKind::Appointment,
    ResourceKind::BillingRecord,
    ResourceKind::AuditLog,
    ResourceKind::RoleAssignment,
    ResourceKind::EmergencyAccess,
    ResourceKind::System,
];

const ACTIONS: &[Action] = &[
    Action::View,
    Action::Create,
    Action::Update,
    Action::Delete,
    Action::Export,
    Action::Prescribe,
    Action::Dispense,
    Action::Approve,
    Action::Assign,
    Action::Revoke,
    Action::Delegate,
];

/// Monday 2025-06-02 10:00 UTC, inside the default business-hours window.
fn monday_morning() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 2, 10, 0, 0).unwrap()
}

/// Grants each candidate as the system actor, ignoring rejections, and
/// returns the resulting effective role set.
fn grant_and_resolve(roles: &[&str]) -> BTreeSet<RoleId> {
    let engine = Wardstone::default();
    let user = UserId::new("prop-user");
    let at = monday_morning();
    for role in roles {
        let _ = engine.assign_role(
            &user,
            &RoleId::new(*role),
            &UserId::system(),
            AssignOptions::new(),
            at,
        );
    }
    engine
        .effective_roles(&user, at)
        .expect("resolution succeeds")
        .into_iter()
        .map(|summary| summary.role_id)
        .collect()
}

proptest! {
    // ========================================================================
    // Decision Engine Invariants
    // ========================================================================

    /// Without a grant, a matching attribute, or an emergency override,
    /// every request is denied and names the permission it needed.
    #[test]
    fn access_is_denied_by_default(
        user in "[a-z]{1,12}",
        resource in "[a-z0-9]{1,16}",
        kind in prop::sample::select(KINDS),
        action in prop::sample::select(ACTIONS),
    ) {
        let engine = Wardstone::default();
        let ctx = PolicyContext::new(
            Subject::new(user.as_str(), SubjectAttributes::new()),
            Resource::new(kind, resource.as_str(), ResourceAttributes::new()),
            action,
            EnvironmentContext::at(monday_morning()),
        );

        let decision = engine.check_access(&ctx);

        prop_assert!(!decision.allowed);
        let required = format!("{}:{}", kind.key(), action.key());
        prop_assert_eq!(decision.required_permissions, vec![required]);
    }

    /// Replaying an identical request keeps the outcome and marks the
    /// decision as a cache hit.
    #[test]
    fn cache_replay_preserves_the_outcome(
        role in prop::sample::select(BUILTIN_ROLES),
        kind in prop::sample::select(KINDS),
        action in prop::sample::select(ACTIONS),
    ) {
        let engine = Wardstone::default();
        let at = monday_morning();
        engine
            .assign_role(
                &UserId::new("prop-user"),
                &RoleId::new(role),
                &UserId::system(),
                AssignOptions::new(),
                at,
            )
            .expect("a single grant never conflicts");

        let ctx = PolicyContext::new(
            Subject::new("prop-user", SubjectAttributes::new()),
            Resource::new(kind, "res-1", ResourceAttributes::new()),
            action,
            EnvironmentContext::at(at),
        );
        let first = engine.check_access(&ctx);
        let second = engine.check_access(&ctx);

        prop_assert_eq!(first.allowed, second.allowed);
        prop_assert!(
            second
                .applied_policies
                .iter()
                .any(|trace| trace.policy == "decision_cache"),
            "the replay carries the cache marker"
        );
    }

    // ========================================================================
    // Role Hierarchy Invariants
    // ========================================================================

    /// The effective role set is closed under inheritance: whenever a role
    /// is effective, every parent the catalog declares for it is too.
    #[test]
    fn effective_roles_are_closed_under_inheritance(
        roles in prop::collection::vec(prop::sample::select(BUILTIN_ROLES), 1..5),
    ) {
        let effective = grant_and_resolve(&roles);

        let catalog = RoleCatalog::builtin();
        for id in &effective {
            let role = catalog.role(id).expect("effective roles come from the catalog");
            for parent in &role.parent_roles {
                prop_assert!(
                    effective.contains(parent),
                    "role `{}` is effective but its parent `{}` is not",
                    id,
                    parent
                );
            }
        }
    }

    /// No sequence of grant attempts ends with both halves of a conflict
    /// pair effective, directly or through inheritance.
    #[test]
    fn separation_of_duties_survives_any_grant_order(
        roles in prop::collection::vec(prop::sample::select(BUILTIN_ROLES), 1..8),
    ) {
        let effective = grant_and_resolve(&roles);

        let catalog = RoleCatalog::builtin();
        for (left, right) in catalog.conflicts() {
            prop_assert!(
                !(effective.contains(left) && effective.contains(right)),
                "conflicting roles `{}` and `{}` are both effective",
                left,
                right
            );
        }
    }

    // ========================================================================
    // Certification Campaign Invariants
    // ========================================================================

    /// Campaign statistics partition cleanly after every decision: pending
    /// plus decided equals the item total, and the total never moves.
    #[test]
    fn campaign_statistics_stay_partitioned(
        decisions in prop::collection::vec(any::<bool>(), 1..=12),
    ) {
        let engine = Wardstone::default();
        let at = monday_morning();
        let reviewer = UserId::new("auditor-gray");
        // One role per user keeps every grant clear of the conflict pairs.
        for (i, _) in decisions.iter().enumerate() {
            engine
                .assign_role(
                    &UserId::new(format!("staff-{i}")),
                    &RoleId::new(BUILTIN_ROLES[i]),
                    &UserId::system(),
                    AssignOptions::new(),
                    at,
                )
                .expect("one role per user never conflicts");
        }

        let schedule = CertificationSchedule::new(
            "quarterly access review",
            RoleScope::All,
            vec![reviewer.clone()],
        );
        let campaign = engine
            .certifications()
            .open_campaign(&schedule, &UserId::new("compliance-lee"), at)
            .expect("campaign opens");
        let items = engine
            .certifications()
            .certifications_for(campaign.id)
            .expect("campaign items are listable");
        prop_assert_eq!(items.len(), decisions.len(), "one item per direct grant");

        let mut decided = 0;
        for (item, revoke) in items.iter().zip(&decisions) {
            let decision = if *revoke {
                ReviewDecision::Revoke
            } else {
                ReviewDecision::Certify
            };
            engine
                .certifications()
                .process_certification(item.id, &reviewer, decision, at)
                .expect("the assigned reviewer may decide");
            decided += 1;

            let stats = engine.certifications().statistics(campaign.id).expect("stats");
            prop_assert_eq!(stats.total, items.len());
            prop_assert_eq!(
                stats.pending + stats.certified + stats.revoked + stats.modified,
                stats.total,
                "items partition into pending and decided"
            );
            prop_assert_eq!(stats.certified + stats.revoked, decided);
        }

        let done = engine.certifications().statistics(campaign.id).expect("stats");
        prop_assert_eq!(done.pending, 0);
    }

    // ========================================================================
    // Risk Scoring Invariants
    // ========================================================================

    /// An unexercised grant scores exactly thirty points above the same
    /// grant with recorded use.
    #[test]
    fn unused_access_adds_a_fixed_premium(
        priority in 0u16..1200,
        delegated: bool,
        age_days in 0i64..1000,
    ) {
        let used = risk_score(priority, delegated, age_days, false);
        let unused = risk_score(priority, delegated, age_days, true);
        prop_assert_eq!(unused, used + 30);
    }

    /// Every score carries at least the base role weight.
    #[test]
    fn risk_scores_start_at_the_base_weight(
        priority in 0u16..1200,
        delegated: bool,
        age_days in 0i64..1000,
        unused: bool,
    ) {
        prop_assert!(risk_score(priority, delegated, age_days, unused) >= 10);
    }

    /// Band assignment is monotone: a higher score never lands in a lower
    /// band.
    #[test]
    fn risk_bands_are_monotone(a: u8, b: u8) {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(RiskLevel::from_score(low) <= RiskLevel::from_score(high));
    }
}
