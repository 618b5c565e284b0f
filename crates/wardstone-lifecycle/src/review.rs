//! Access review reports and the automated remediation sweep.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use wardstone_audit::{AuditAction, AuditStore};
use wardstone_types::{UserId, UserRoleAssignment};

use crate::Result;
use crate::service::AssignmentService;
use crate::store::{AssignmentStore, EmergencyAccessStore};

// ============================================================================
// Review configuration
// ============================================================================

/// Thresholds for review findings and remediation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewConfig {
    /// Grants expiring within this many days are flagged.
    pub expiring_within_days: i64,
    /// Grants at least this old with no recorded use are flagged, and
    /// revoked by the remediation sweep.
    pub unused_after_days: i64,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            expiring_within_days: 30,
            unused_after_days: 90,
        }
    }
}

// ============================================================================
// Findings
// ============================================================================

/// One observation about an assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewFinding {
    /// The assignment has lapsed but still sits in the store.
    Expired,
    /// The assignment lapses within the configured window.
    ExpiringSoon { days_left: i64 },
    /// The grant arrived by delegation rather than direct assignment.
    DelegatedGrant { approved_by: Option<UserId> },
    /// The role is old enough to judge and has no recorded use in the
    /// lookback window.
    UnusedRole,
    /// Raised by a deployment-specific detector.
    ExcessivePrivilege { note: String },
}

/// One assignment with everything the review noticed about it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewEntry {
    pub assignment: UserRoleAssignment,
    pub findings: Vec<ReviewFinding>,
}

impl ReviewEntry {
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }
}

/// A point-in-time review of one user's assignments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessReview {
    pub user_id: UserId,
    pub generated_at: DateTime<Utc>,
    pub entries: Vec<ReviewEntry>,
}

impl AccessReview {
    pub fn is_clean(&self) -> bool {
        self.entries.iter().all(ReviewEntry::is_clean)
    }
}

/// Hook for deployment-specific privilege analysis. Each returned note
/// becomes a [`ReviewFinding::ExcessivePrivilege`] on the assignment.
pub trait ExcessivePrivilegeDetector: Send + Sync {
    fn findings(
        &self,
        user: &UserId,
        assignment: &UserRoleAssignment,
        all: &[UserRoleAssignment],
    ) -> Vec<String>;
}

// ============================================================================
// Remediation
// ============================================================================

/// Outcome of one remediation sweep.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemediationReport {
    pub expired_removed: usize,
    pub unused_revoked: usize,
    pub emergency_purged: usize,
    /// Users whose sweep failed, with the failure. One user's bad state
    /// never aborts the rest of the sweep.
    pub errors: Vec<(UserId, String)>,
}

impl AssignmentService {
    /// Installs a privilege detector consulted during reviews.
    #[must_use]
    pub fn with_privilege_detector(
        mut self,
        detector: std::sync::Arc<dyn ExcessivePrivilegeDetector>,
    ) -> Self {
        self.privilege_detector = Some(detector);
        self
    }

    /// Reviews every assignment of `user`, expired remnants included.
    ///
    /// Expired assignments get the single [`ReviewFinding::Expired`] finding;
    /// the remaining checks only apply to grants still in force.
    pub fn review_user(
        &self,
        user: &UserId,
        config: &ReviewConfig,
        now: DateTime<Utc>,
    ) -> Result<AccessReview> {
        let assignments = self.assignments.assignments_for(user)?;
        let mut entries = Vec::with_capacity(assignments.len());

        for assignment in &assignments {
            let mut findings = Vec::new();
            if !assignment.is_effective(now) {
                findings.push(ReviewFinding::Expired);
            } else {
                if let Some(expiry) = assignment.expires_at {
                    let days_left = (expiry - now).num_days();
                    if days_left <= config.expiring_within_days {
                        findings.push(ReviewFinding::ExpiringSoon { days_left });
                    }
                }
                if assignment.delegated {
                    findings.push(ReviewFinding::DelegatedGrant {
                        approved_by: assignment.approved_by().cloned(),
                    });
                }
                if self.is_unused(user, assignment, config, now)? {
                    findings.push(ReviewFinding::UnusedRole);
                }
                if let Some(detector) = &self.privilege_detector {
                    for note in detector.findings(user, assignment, &assignments) {
                        findings.push(ReviewFinding::ExcessivePrivilege { note });
                    }
                }
            }
            entries.push(ReviewEntry {
                assignment: assignment.clone(),
                findings,
            });
        }

        Ok(AccessReview {
            user_id: user.clone(),
            generated_at: now,
            entries,
        })
    }

    /// Reviews every user holding at least one assignment.
    pub fn review_all(
        &self,
        config: &ReviewConfig,
        now: DateTime<Utc>,
    ) -> Result<Vec<AccessReview>> {
        self.assignments
            .user_ids()?
            .iter()
            .map(|user| self.review_user(user, config, now))
            .collect()
    }

    /// Sweeps the whole store: drops expired assignments, revokes stale
    /// unused roles, and purges lapsed emergency records.
    ///
    /// Each unused-role revocation goes through the normal revoke path, so
    /// it lands in the audit trail individually; the sweep itself appends
    /// one summary entry at the end.
    pub fn automated_remediation(
        &self,
        config: &ReviewConfig,
        now: DateTime<Utc>,
    ) -> Result<RemediationReport> {
        let mut report = RemediationReport::default();

        for user in self.assignments.user_ids()? {
            match self.remediate_user(&user, config, now) {
                Ok((expired, unused)) => {
                    report.expired_removed += expired;
                    report.unused_revoked += unused;
                }
                Err(err) => {
                    tracing::warn!(user = %user, error = %err, "remediation skipped user");
                    report.errors.push((user, err.to_string()));
                }
            }
        }
        report.emergency_purged = self.emergency.purge_expired(now)?;

        self.audit.append(
            UserId::system(),
            AuditAction::RemediationCompleted {
                expired_removed: report.expired_removed,
                unused_revoked: report.unused_revoked,
                emergency_purged: report.emergency_purged,
                errors: report.errors.len(),
            },
        )?;
        tracing::info!(
            expired = report.expired_removed,
            unused = report.unused_revoked,
            emergency = report.emergency_purged,
            "remediation sweep complete"
        );
        Ok(report)
    }

    fn remediate_user(
        &self,
        user: &UserId,
        config: &ReviewConfig,
        now: DateTime<Utc>,
    ) -> Result<(usize, usize)> {
        let expired = self.assignments.remove_expired(user, now)?.len();

        let mut unused = 0;
        for assignment in self.effective_assignments(user, now)? {
            if self.is_unused(user, &assignment, config, now)? {
                self.revoke_role(
                    user,
                    &assignment.role_id,
                    &UserId::system(),
                    Some(format!("unused for at least {} days", config.unused_after_days)),
                )?;
                unused += 1;
            }
        }
        Ok((expired, unused))
    }

    /// An assignment is unused when it is old enough to judge and the audit
    /// trail shows no grant through the role inside the lookback window.
    fn is_unused(
        &self,
        user: &UserId,
        assignment: &UserRoleAssignment,
        config: &ReviewConfig,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        if assignment.age_days(now) < config.unused_after_days {
            return Ok(false);
        }
        let since = now - Duration::days(config.unused_after_days);
        let used = self.audit.role_used_since(user, &assignment.role_id, since)?;
        Ok(!used)
    }
}
