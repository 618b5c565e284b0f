//! Main entry point for the Wardstone engine.
//!
//! The [`Wardstone`] struct wires the role catalog, the decision pipeline,
//! the assignment lifecycle, the audit trail, and the certification engine
//! behind one API. It owns the decision cache and enforces the two rules the
//! sub-crates cannot enforce alone:
//!
//! - **Fail closed.** [`Wardstone::check_access`] is infallible. Any
//!   internal fault (store error, poisoned lock, audit failure) surfaces as
//!   a deny, never as an error the caller might ignore.
//! - **Log before grant.** A break-glass decision is released only after
//!   its emergency record and audit entry are stored. If either write
//!   fails, the access is denied.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use wardstone_audit::{AuditAction, AuditEntry, AuditQuery, AuditStore, MemoryAuditStore};
use wardstone_catalog::{PermissionMatrix, RoleCatalog};
use wardstone_certify::{CertificationEngine, LoggingNotificationSink, NotificationSink};
use wardstone_lifecycle::{
    AccessReview, AssignOptions, AssignmentService, AssignmentStore, EmergencyAccessStore,
    MemoryAssignmentStore, MemoryEmergencyAccessStore, RemediationReport,
};
use wardstone_pdp::{EvaluationConfig, evaluate};
use wardstone_types::{
    AccessDecision, Action, EmergencyAccessRecord, EnvironmentContext, PolicyContext, PolicyTrace,
    Resource, ResourceAttributes, ResourceKind, RoleId, Subject, SubjectAttributes, UserId,
    UserRoleAssignment,
};

use crate::cache::{CacheStats, SieveCache};
use crate::config::WardstoneConfig;
use crate::{Result, WardstoneError};

// ============================================================================
// Decision cache key
// ============================================================================

/// Cache key for one (subject, resource, action) request shape.
///
/// The key carries the subject's assignment version, so any role mutation
/// makes every older entry unreachable. Subject attributes and request time
/// are deliberately absent: within the ttl a repeat request replays the
/// cached outcome even if the caller asserts different attributes. The ttl
/// bounds that exposure.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DecisionKey {
    user: UserId,
    version: u64,
    kind: ResourceKind,
    resource: String,
    action: Action,
}

// ============================================================================
// Role summary
// ============================================================================

/// One role in a user's effective set, flattened for display and export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSummary {
    pub role_id: RoleId,
    pub name: String,
    pub priority: u16,
    /// `false` for directly assigned roles, `true` for inherited parents.
    pub inherited: bool,
    /// The grant this role arrived through was delegated.
    pub delegated: bool,
}

// ============================================================================
// Engine
// ============================================================================

/// The assembled access-control engine.
pub struct Wardstone {
    config: WardstoneConfig,
    catalog: Arc<RoleCatalog>,
    assignments: Arc<dyn AssignmentStore>,
    audit: Arc<dyn AuditStore>,
    service: Arc<AssignmentService>,
    certifications: CertificationEngine,
    alerts: Arc<dyn NotificationSink>,
    eval: EvaluationConfig,
    /// `None` when configured with capacity 0; every request then takes the
    /// full evaluation path.
    cache: Option<Mutex<SieveCache<DecisionKey, AccessDecision>>>,
}

impl Wardstone {
    /// Engine over the built-in role catalog with in-memory stores.
    pub fn new(config: WardstoneConfig) -> Self {
        Self::with_catalog(RoleCatalog::builtin(), config)
    }

    /// Engine over a custom catalog with in-memory stores.
    pub fn with_catalog(catalog: RoleCatalog, config: WardstoneConfig) -> Self {
        Self::with_stores(
            catalog,
            Arc::new(MemoryAssignmentStore::new()),
            Arc::new(MemoryEmergencyAccessStore::new()),
            Arc::new(MemoryAuditStore::new()),
            config,
        )
    }

    /// Engine over caller-provided stores, for deployments that persist
    /// assignments or ship audit entries elsewhere.
    pub fn with_stores(
        catalog: RoleCatalog,
        assignments: Arc<dyn AssignmentStore>,
        emergency: Arc<dyn EmergencyAccessStore>,
        audit: Arc<dyn AuditStore>,
        config: WardstoneConfig,
    ) -> Self {
        let catalog = Arc::new(catalog);
        let service = Arc::new(AssignmentService::new(
            Arc::clone(&catalog),
            Arc::clone(&assignments),
            emergency,
            Arc::clone(&audit),
        ));
        let certifications = CertificationEngine::new(Arc::clone(&service), Arc::clone(&audit));
        let cache = (config.cache.capacity > 0)
            .then(|| Mutex::new(SieveCache::new(config.cache.capacity, config.cache.ttl())));
        let eval = EvaluationConfig {
            business_hours: config.business_hours.window(),
        };

        Self {
            config,
            catalog,
            assignments,
            audit,
            service,
            certifications,
            alerts: Arc::new(LoggingNotificationSink),
            eval,
            cache,
        }
    }

    /// Replaces the notification sink for break-glass alerts and
    /// certification reminders.
    #[must_use]
    pub fn with_notification_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.certifications = self.certifications.with_notification_sink(Arc::clone(&sink));
        self.alerts = sink;
        self
    }

    // ------------------------------------------------------------------
    // Decisions
    // ------------------------------------------------------------------

    /// Evaluates one access request.
    ///
    /// Never returns an error: malformed requests, store faults, and audit
    /// failures all come back as denials with a PHI-free reason. Every call
    /// lands in the audit trail, cache hits included.
    pub fn check_access(&self, ctx: &PolicyContext) -> AccessDecision {
        let started = Instant::now();

        if let Err(err) = ctx.validate() {
            let decision = AccessDecision::deny(format!("malformed request: {err}"));
            return self.record_decision(ctx, decision, started);
        }

        // Break-glass requests bypass the cache in both directions. Each
        // use must produce its own emergency record.
        let emergency_requested = ctx.subject.attributes.emergency_override;
        let key = if self.cache.is_some() {
            self.decision_key(ctx)
        } else {
            None
        };

        if !emergency_requested {
            if let (Some(key), Some(cache)) = (&key, &self.cache) {
                if let Ok(mut cache) = cache.lock() {
                    if let Some(cached) = cache.get(key, started) {
                        let mut decision = cached.clone();
                        decision
                            .applied_policies
                            .push(PolicyTrace::matched("decision_cache"));
                        drop(cache);
                        return self.record_decision(ctx, decision, started);
                    }
                }
            }
        }

        let assignments = match self.assignments.assignments_for(&ctx.subject.id) {
            Ok(assignments) => assignments,
            Err(err) => {
                tracing::error!(
                    subject = %ctx.subject.id,
                    error = %err,
                    "assignment lookup failed, failing closed"
                );
                let decision = AccessDecision::deny("internal error during evaluation");
                return self.record_decision(ctx, decision, started);
            }
        };

        let evaluation = evaluate(&self.catalog, &assignments, ctx, &self.eval);
        let mut decision = evaluation.decision;

        // Log before grant: the break-glass record must be stored before
        // the decision is released.
        if let Some(grant) = evaluation.emergency {
            let record = EmergencyAccessRecord::new(
                ctx.subject.id.clone(),
                ctx.resource.kind,
                ctx.resource.id.clone(),
                ctx.action,
                ctx.environment.time,
                grant.justification,
                Some(ctx.environment.time + Duration::seconds(self.config.emergency.grant_secs)),
            );
            match self.service.record_emergency_access(record.clone()) {
                Ok(()) => self.alerts.emergency_access(&record),
                Err(err) => {
                    tracing::error!(
                        subject = %ctx.subject.id,
                        error = %err,
                        "emergency record write failed, denying break-glass access"
                    );
                    decision = AccessDecision::deny("emergency access could not be recorded");
                }
            }
        }

        if !emergency_requested && !decision.break_glass {
            if let (Some(key), Some(cache)) = (key, &self.cache) {
                if let Ok(mut cache) = cache.lock() {
                    cache.insert(key, decision.clone(), started);
                }
            }
        }

        self.record_decision(ctx, decision, started)
    }

    /// Running decision cache counters. All zero when the cache is
    /// disabled.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache
            .as_ref()
            .and_then(|cache| cache.lock().ok().map(|cache| cache.stats()))
            .unwrap_or_default()
    }

    fn decision_key(&self, ctx: &PolicyContext) -> Option<DecisionKey> {
        let version = self.assignments.version(&ctx.subject.id).ok()?;
        Some(DecisionKey {
            user: ctx.subject.id.clone(),
            version,
            kind: ctx.resource.kind,
            resource: ctx.resource.id.clone(),
            action: ctx.action,
        })
    }

    /// Appends the decision to the audit trail and returns it. An allow
    /// that cannot be recorded turns into a deny.
    fn record_decision(
        &self,
        ctx: &PolicyContext,
        decision: AccessDecision,
        started: Instant,
    ) -> AccessDecision {
        let elapsed_micros = started.elapsed().as_micros() as u64;
        let entry = AuditAction::AccessEvaluated {
            context: ctx.clone(),
            decision: decision.clone(),
            elapsed_micros,
        };
        match self.audit.append(ctx.subject.id.clone(), entry) {
            Ok(_) => decision,
            Err(err) => {
                tracing::error!(
                    subject = %ctx.subject.id,
                    error = %err,
                    "audit append failed, failing closed"
                );
                if decision.allowed {
                    AccessDecision::deny("internal error during evaluation")
                } else {
                    decision
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Role lifecycle
    // ------------------------------------------------------------------

    /// Grants `role` to `user` on behalf of `assigned_by`.
    ///
    /// Unless `assigned_by` is the system actor, the caller must hold
    /// `role_assignment:assign`; the authorization probe itself lands in
    /// the audit trail.
    pub fn assign_role(
        &self,
        user: &UserId,
        role: &RoleId,
        assigned_by: &UserId,
        options: AssignOptions,
        now: DateTime<Utc>,
    ) -> Result<UserRoleAssignment> {
        self.authorize(assigned_by, Action::Assign, role, now)?;
        Ok(self.service.assign_role(user, role, assigned_by, options, now)?)
    }

    /// Temporarily hands a role held by `from` to `to`. Authority comes
    /// from holding the role; no administrative permission is required.
    pub fn delegate_role(
        &self,
        from: &UserId,
        to: &UserId,
        role: &RoleId,
        expires_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<UserRoleAssignment> {
        Ok(self.service.delegate_role(from, to, role, expires_at, now)?)
    }

    /// Revokes every grant of `role` held by `user`, returning the removed
    /// rows. Requires `role_assignment:revoke` unless `revoked_by` is the
    /// system actor.
    pub fn revoke_role(
        &self,
        user: &UserId,
        role: &RoleId,
        revoked_by: &UserId,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Vec<UserRoleAssignment>> {
        self.authorize(revoked_by, Action::Revoke, role, now)?;
        Ok(self.service.revoke_role(user, role, revoked_by, reason)?)
    }

    /// The user's effective roles at `now`: direct grants plus inherited
    /// parents, expired assignments excluded.
    pub fn effective_roles(&self, user: &UserId, now: DateTime<Utc>) -> Result<Vec<RoleSummary>> {
        let assignments = self.assignments.assignments_for(user)?;
        let entries = wardstone_pdp::effective_role_entries(&self.catalog, &assignments, now);
        Ok(entries
            .iter()
            .map(|entry| RoleSummary {
                role_id: entry.role.id.clone(),
                name: entry.role.name.clone(),
                priority: entry.role.priority,
                inherited: entry.inherited,
                delegated: entry.assignment.delegated,
            })
            .collect())
    }

    fn authorize(
        &self,
        actor: &UserId,
        action: Action,
        subject_role: &RoleId,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if actor.is_system() {
            return Ok(());
        }
        let ctx = PolicyContext::new(
            Subject::new(actor.clone(), SubjectAttributes::new()),
            Resource::new(
                ResourceKind::RoleAssignment,
                subject_role.as_str(),
                ResourceAttributes::new(),
            ),
            action,
            EnvironmentContext::at(now),
        );
        if self.check_access(&ctx).allowed {
            Ok(())
        } else {
            Err(WardstoneError::NotAuthorized {
                actor: actor.clone(),
                permission: format!("{}:{}", ResourceKind::RoleAssignment.key(), action.key()),
            })
        }
    }

    // ------------------------------------------------------------------
    // Reviews and remediation
    // ------------------------------------------------------------------

    /// Access review for one user, using the configured review windows.
    pub fn review_user(&self, user: &UserId, now: DateTime<Utc>) -> Result<AccessReview> {
        let config = self.config.review.to_lifecycle();
        Ok(self.service.review_user(user, &config, now)?)
    }

    /// Access reviews for every user with at least one assignment.
    pub fn review_all(&self, now: DateTime<Utc>) -> Result<Vec<AccessReview>> {
        let config = self.config.review.to_lifecycle();
        Ok(self.service.review_all(&config, now)?)
    }

    /// One remediation sweep: expired grants removed, stale unused grants
    /// revoked, expired emergency records purged.
    pub fn automated_remediation(&self, now: DateTime<Utc>) -> Result<RemediationReport> {
        let config = self.config.review.to_lifecycle();
        Ok(self.service.automated_remediation(&config, now)?)
    }

    // ------------------------------------------------------------------
    // Oversight
    // ------------------------------------------------------------------

    /// Every break-glass record currently on file.
    pub fn emergency_records(&self) -> Result<Vec<EmergencyAccessRecord>> {
        Ok(self.service.emergency_records()?)
    }

    /// Queries the audit trail.
    pub fn audit_trail(&self, query: &AuditQuery) -> Result<Vec<AuditEntry>> {
        Ok(self.audit.query(query)?)
    }

    /// Audit trail entries matching `query`, as a JSON array.
    pub fn export_audit_json(&self, query: &AuditQuery) -> Result<String> {
        Ok(self.audit.export_json(query)?)
    }

    /// Every role assignment on file, as pretty-printed JSON.
    pub fn export_assignments_json(&self) -> Result<String> {
        let assignments = self.assignments.all()?;
        Ok(serde_json::to_string_pretty(&assignments)?)
    }

    /// The break-glass record, as pretty-printed JSON.
    pub fn export_emergency_json(&self) -> Result<String> {
        let records = self.service.emergency_records()?;
        Ok(serde_json::to_string_pretty(&records)?)
    }

    /// The full role-permission matrix, for compliance export.
    pub fn permission_matrix(&self) -> PermissionMatrix {
        self.catalog.export_permission_matrix()
    }

    /// The role-permission matrix as pretty-printed JSON.
    pub fn permission_matrix_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.permission_matrix())?)
    }

    // ------------------------------------------------------------------
    // Subsystem access
    // ------------------------------------------------------------------

    /// The role catalog this engine evaluates against.
    pub fn catalog(&self) -> &RoleCatalog {
        &self.catalog
    }

    /// The assignment lifecycle service, for operations the facade does
    /// not wrap (role replacement, direct delegation queries).
    pub fn lifecycle(&self) -> &AssignmentService {
        &self.service
    }

    /// The certification engine: campaigns, decisions, reminders.
    pub fn certifications(&self) -> &CertificationEngine {
        &self.certifications
    }

    /// The configuration this engine was built with.
    pub fn config(&self) -> &WardstoneConfig {
        &self.config
    }
}

impl Default for Wardstone {
    fn default() -> Self {
        Self::new(WardstoneConfig::default())
    }
}
