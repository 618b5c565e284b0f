//! Audit storage: query filters, the [`AuditStore`] trait, and the in-memory
//! reference implementation.

use std::sync::RwLock;

use chrono::{DateTime, Utc};
use wardstone_types::{AuditEntryId, RoleId, UserId};

use crate::entry::{AuditAction, AuditEntry};
use crate::{AuditError, Result};

// ============================================================================
// Query filter
// ============================================================================

/// Query filter for the audit trail.
///
/// All fields are optional. When multiple fields are set, they are combined
/// with AND logic. Use the builder methods for ergonomic construction.
#[derive(Debug, Default, Clone)]
pub struct AuditQuery {
    pub user_id: Option<UserId>,
    pub action_type: Option<String>,
    pub time_from: Option<DateTime<Utc>>,
    pub time_to: Option<DateTime<Utc>>,
    pub actor: Option<UserId>,
    pub limit: Option<usize>,
}

impl AuditQuery {
    /// Filter to entries involving the given user, whether as request
    /// subject, assignment target, delegation counterparty, or reviewer.
    #[must_use]
    pub fn with_user(mut self, user: UserId) -> Self {
        self.user_id = Some(user);
        self
    }

    /// Filter by action category prefix (e.g. "Role", "Emergency").
    #[must_use]
    pub fn with_action_type(mut self, action_type: &str) -> Self {
        self.action_type = Some(action_type.to_string());
        self
    }

    /// Filter to entries within a time range (inclusive).
    #[must_use]
    pub fn with_time_range(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.time_from = Some(from);
        self.time_to = Some(to);
        self
    }

    /// Filter to entries recorded at or after the given instant.
    #[must_use]
    pub fn with_since(mut self, since: DateTime<Utc>) -> Self {
        self.time_from = Some(since);
        self
    }

    /// Filter by the actor who performed the operation.
    #[must_use]
    pub fn with_actor(mut self, actor: UserId) -> Self {
        self.actor = Some(actor);
        self
    }

    /// Limit the number of results returned.
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Check whether a single entry matches all active criteria.
    ///
    /// The limit is not applied here; stores truncate after filtering.
    #[must_use]
    pub fn matches(&self, entry: &AuditEntry) -> bool {
        if let Some(ref user_id) = self.user_id {
            if !entry.action.involves_user(user_id) {
                return false;
            }
        }

        if let Some(ref action_type) = self.action_type {
            if !entry.action.category().starts_with(action_type.as_str()) {
                return false;
            }
        }

        if let Some(from) = self.time_from {
            if entry.timestamp < from {
                return false;
            }
        }
        if let Some(to) = self.time_to {
            if entry.timestamp > to {
                return false;
            }
        }

        if let Some(ref actor) = self.actor {
            if entry.actor != *actor {
                return false;
            }
        }

        true
    }
}

// ============================================================================
// Store trait
// ============================================================================

/// Append-only storage for audit entries.
///
/// Implementations must be shareable across threads; the engine keeps one
/// store behind an `Arc` and appends from every service. The trait
/// deliberately exposes no update or delete surface.
///
/// Appends are fallible on purpose: callers that cannot record an event must
/// fail closed rather than proceed unrecorded.
pub trait AuditStore: Send + Sync {
    /// Append an entry and return its id.
    fn append(&self, actor: UserId, action: AuditAction) -> Result<AuditEntryId>;

    /// Retrieve entries matching the filter, in insertion order.
    fn query(&self, filter: &AuditQuery) -> Result<Vec<AuditEntry>>;

    /// Look up a single entry by id.
    fn entry(&self, id: AuditEntryId) -> Result<Option<AuditEntry>>;

    /// Total number of entries recorded.
    fn count(&self) -> Result<usize>;

    /// Export entries matching the filter as a pretty-printed JSON array.
    ///
    /// Useful for compliance reporting and external audit tooling.
    fn export_json(&self, filter: &AuditQuery) -> Result<String> {
        let entries = self.query(filter)?;
        serde_json::to_string_pretty(&entries).map_err(AuditError::from)
    }

    /// Whether the given role contributed to any permitted access for the
    /// user at or after `since`.
    ///
    /// Scans permitted decisions for a matched trace with the
    /// `role_permission:<role>:` prefix. Constraint and attribute traces do
    /// not count as role usage.
    fn role_used_since(&self, user: &UserId, role: &RoleId, since: DateTime<Utc>) -> Result<bool> {
        let needle = format!("role_permission:{role}:");
        let filter = AuditQuery::default()
            .with_user(user.clone())
            .with_action_type("Access")
            .with_since(since);
        let entries = self.query(&filter)?;
        Ok(entries.iter().any(|entry| match &entry.action {
            AuditAction::AccessEvaluated { decision, .. } => {
                decision.allowed
                    && decision
                        .applied_policies
                        .iter()
                        .any(|trace| trace.matched && trace.policy.starts_with(&needle))
            }
            _ => false,
        }))
    }
}

// ============================================================================
// In-memory implementation
// ============================================================================

/// In-memory audit store backed by an append-only vector.
///
/// Suitable for tests and single-process deployments. Lock poisoning is
/// surfaced as [`AuditError::Store`] rather than a panic, so a poisoned
/// trail turns into denied operations instead of a crash.
#[derive(Debug, Default)]
pub struct MemoryAuditStore {
    entries: RwLock<Vec<AuditEntry>>,
}

impl MemoryAuditStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl AuditStore for MemoryAuditStore {
    fn append(&self, actor: UserId, action: AuditAction) -> Result<AuditEntryId> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| AuditError::Store("audit log lock poisoned".to_string()))?;

        let id = AuditEntryId::new();
        entries.push(AuditEntry {
            id,
            timestamp: Utc::now(),
            actor,
            action,
        });
        Ok(id)
    }

    fn query(&self, filter: &AuditQuery) -> Result<Vec<AuditEntry>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| AuditError::Store("audit log lock poisoned".to_string()))?;

        let mut results: Vec<AuditEntry> = entries
            .iter()
            .filter(|entry| filter.matches(entry))
            .cloned()
            .collect();

        if let Some(limit) = filter.limit {
            results.truncate(limit);
        }

        Ok(results)
    }

    fn entry(&self, id: AuditEntryId) -> Result<Option<AuditEntry>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| AuditError::Store("audit log lock poisoned".to_string()))?;
        Ok(entries.iter().find(|e| e.id == id).cloned())
    }

    fn count(&self) -> Result<usize> {
        let entries = self
            .entries
            .read()
            .map_err(|_| AuditError::Store("audit log lock poisoned".to_string()))?;
        Ok(entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use wardstone_types::{
        AccessDecision, Action, EnvironmentContext, PolicyContext, PolicyTrace, Resource,
        ResourceAttributes, ResourceKind, Subject, SubjectAttributes,
    };

    fn assigned(user: &str, role: &str) -> AuditAction {
        AuditAction::RoleAssigned {
            user_id: UserId::new(user),
            role_id: RoleId::new(role),
            assigned_by: UserId::new("admin-okafor"),
            delegated: false,
            expires_at: None,
        }
    }

    fn evaluated(user: &str, traces: Vec<PolicyTrace>, allowed: bool) -> AuditAction {
        let context = PolicyContext::new(
            Subject::new(user, SubjectAttributes::default()),
            Resource::new(
                ResourceKind::PatientRecord,
                "mrn-1001",
                ResourceAttributes::default(),
            ),
            Action::View,
            EnvironmentContext::now(),
        );
        let decision = if allowed {
            AccessDecision::allow("granted by role `physician`")
        } else {
            AccessDecision::deny("no role or attribute policy grants `record:view`")
        };
        AuditAction::AccessEvaluated {
            context,
            decision: decision.with_traces(traces),
            elapsed_micros: 12,
        }
    }

    #[test]
    fn append_assigns_an_id_and_preserves_the_entry() {
        let store = MemoryAuditStore::new();
        assert_eq!(store.count().unwrap(), 0);

        let id = store
            .append(UserId::new("admin-okafor"), assigned("dr-chen", "physician"))
            .unwrap();

        assert_eq!(store.count().unwrap(), 1);
        let entry = store.entry(id).unwrap().expect("entry must exist");
        assert_eq!(entry.id, id);
        assert_eq!(entry.actor, UserId::new("admin-okafor"));
        assert_eq!(entry.action.category(), "Role");
    }

    #[test]
    fn query_by_user_spans_action_kinds() {
        let store = MemoryAuditStore::new();
        let actor = UserId::new("admin-okafor");

        store
            .append(actor.clone(), assigned("dr-chen", "physician"))
            .unwrap();
        store
            .append(
                UserId::new("dr-chen"),
                evaluated(
                    "dr-chen",
                    vec![PolicyTrace::matched("role_permission:physician:record:view")],
                    true,
                ),
            )
            .unwrap();
        store
            .append(actor.clone(), assigned("nurse-patel", "nurse"))
            .unwrap();

        let history = store
            .query(&AuditQuery::default().with_user(UserId::new("dr-chen")))
            .unwrap();
        assert_eq!(
            history.len(),
            2,
            "assignment and evaluation both reference dr-chen"
        );

        let other = store
            .query(&AuditQuery::default().with_user(UserId::new("nurse-patel")))
            .unwrap();
        assert_eq!(other.len(), 1);
    }

    #[test]
    fn query_by_action_type_uses_category_prefixes() {
        let store = MemoryAuditStore::new();
        let actor = UserId::new("admin-okafor");

        store
            .append(actor.clone(), assigned("dr-chen", "physician"))
            .unwrap();
        store
            .append(
                actor.clone(),
                AuditAction::RoleRevoked {
                    user_id: UserId::new("dr-chen"),
                    role_id: RoleId::new("physician"),
                    revoked_by: actor.clone(),
                    reason: None,
                },
            )
            .unwrap();
        store
            .append(
                UserId::new("dr-chen"),
                evaluated("dr-chen", Vec::new(), false),
            )
            .unwrap();

        let roles = store
            .query(&AuditQuery::default().with_action_type("Role"))
            .unwrap();
        assert_eq!(roles.len(), 2, "assignment and revocation are both Role");

        let access = store
            .query(&AuditQuery::default().with_action_type("Access"))
            .unwrap();
        assert_eq!(access.len(), 1);
    }

    #[test]
    fn query_by_time_range_is_inclusive() {
        let store = MemoryAuditStore::new();
        let before = Utc::now();

        store
            .append(
                UserId::new("admin-okafor"),
                assigned("dr-chen", "physician"),
            )
            .unwrap();

        let after = Utc::now();

        let in_range = store
            .query(&AuditQuery::default().with_time_range(before, after))
            .unwrap();
        assert_eq!(in_range.len(), 1, "entry must fall inside the range");

        let past = store
            .query(&AuditQuery::default().with_time_range(
                before - Duration::hours(2),
                before - Duration::hours(1),
            ))
            .unwrap();
        assert!(past.is_empty(), "no entries in a past range");
    }

    #[test]
    fn query_by_actor_matches_exactly() {
        let store = MemoryAuditStore::new();

        store
            .append(
                UserId::new("admin-okafor"),
                assigned("dr-chen", "physician"),
            )
            .unwrap();
        store
            .append(UserId::system(), assigned("nurse-patel", "nurse"))
            .unwrap();

        let by_admin = store
            .query(&AuditQuery::default().with_actor(UserId::new("admin-okafor")))
            .unwrap();
        assert_eq!(by_admin.len(), 1);

        let by_system = store
            .query(&AuditQuery::default().with_actor(UserId::system()))
            .unwrap();
        assert_eq!(by_system.len(), 1);
    }

    #[test]
    fn limit_caps_results_in_insertion_order() {
        let store = MemoryAuditStore::new();
        for i in 0..10 {
            store
                .append(
                    UserId::new("admin-okafor"),
                    assigned(&format!("user-{i}"), "nurse"),
                )
                .unwrap();
        }

        let results = store
            .query(&AuditQuery::default().with_limit(3))
            .unwrap();
        assert_eq!(results.len(), 3);
        assert!(
            results[0].action.involves_user(&UserId::new("user-0")),
            "results keep insertion order"
        );
    }

    #[test]
    fn empty_query_returns_everything() {
        let store = MemoryAuditStore::new();
        store
            .append(
                UserId::new("admin-okafor"),
                assigned("dr-chen", "physician"),
            )
            .unwrap();
        store
            .append(
                UserId::new("dr-chen"),
                evaluated("dr-chen", Vec::new(), false),
            )
            .unwrap();

        let all = store.query(&AuditQuery::default()).unwrap();
        assert_eq!(all.len(), store.count().unwrap());
    }

    #[test]
    fn export_json_round_trips() {
        let store = MemoryAuditStore::new();
        store
            .append(
                UserId::new("admin-okafor"),
                assigned("dr-chen", "physician"),
            )
            .unwrap();
        store
            .append(
                UserId::new("admin-okafor"),
                AuditAction::RoleRevoked {
                    user_id: UserId::new("dr-chen"),
                    role_id: RoleId::new("physician"),
                    revoked_by: UserId::new("admin-okafor"),
                    reason: Some("offboarding".to_string()),
                },
            )
            .unwrap();

        let json = store.export_json(&AuditQuery::default()).unwrap();
        let parsed: Vec<serde_json::Value> =
            serde_json::from_str(&json).expect("exported JSON must parse");
        assert_eq!(parsed.len(), 2);
        assert!(json.contains("RoleAssigned"));
        assert!(json.contains("offboarding"));
    }

    #[test]
    fn role_usage_requires_a_matched_role_trace() {
        let store = MemoryAuditStore::new();
        let user = UserId::new("dr-chen");
        let role = RoleId::new("physician");
        let since = Utc::now() - Duration::days(90);

        // A permitted decision that matched a different role.
        store
            .append(
                user.clone(),
                evaluated(
                    "dr-chen",
                    vec![PolicyTrace::matched("role_permission:nurse:record:view")],
                    true,
                ),
            )
            .unwrap();
        assert!(!store.role_used_since(&user, &role, since).unwrap());

        // A denial that merely consulted the role.
        store
            .append(
                user.clone(),
                evaluated(
                    "dr-chen",
                    vec![PolicyTrace::unmatched(
                        "role_permission:physician:record:delete",
                    )],
                    false,
                ),
            )
            .unwrap();
        assert!(
            !store.role_used_since(&user, &role, since).unwrap(),
            "consulted-but-unmatched traces are not usage"
        );

        // A permitted decision granted through the role.
        store
            .append(
                user.clone(),
                evaluated(
                    "dr-chen",
                    vec![PolicyTrace::matched("role_permission:physician:record:view")],
                    true,
                ),
            )
            .unwrap();
        assert!(store.role_used_since(&user, &role, since).unwrap());
    }

    #[test]
    fn role_usage_ignores_constraint_traces() {
        let store = MemoryAuditStore::new();
        let user = UserId::new("dr-chen");

        store
            .append(
                user.clone(),
                evaluated(
                    "dr-chen",
                    vec![
                        PolicyTrace::matched("role_constraint:physician:time_window"),
                        PolicyTrace::matched("abac:department_match"),
                    ],
                    true,
                ),
            )
            .unwrap();

        assert!(
            !store
                .role_used_since(&user, &RoleId::new("physician"), Utc::now() - Duration::days(1))
                .unwrap(),
            "constraint and attribute traces must not count as role usage"
        );
    }

    #[test]
    fn role_usage_respects_the_since_bound() {
        let store = MemoryAuditStore::new();
        let user = UserId::new("dr-chen");
        let role = RoleId::new("physician");

        store
            .append(
                user.clone(),
                evaluated(
                    "dr-chen",
                    vec![PolicyTrace::matched("role_permission:physician:record:view")],
                    true,
                ),
            )
            .unwrap();

        assert!(
            store
                .role_used_since(&user, &role, Utc::now() - Duration::days(1))
                .unwrap()
        );
        assert!(
            !store
                .role_used_since(&user, &role, Utc::now() + Duration::hours(1))
                .unwrap(),
            "usage before the bound must not count"
        );
    }
}
