//! Campaign lifecycle: open, decide, complete, remind.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use wardstone_audit::{AuditAction, AuditStore};
use wardstone_lifecycle::{AssignmentService, LifecycleError};
use wardstone_types::{CampaignId, CertificationId, EmergencyAccessRecord, UserId};

use crate::certification::{
    Certification, CertificationStatus, CertificationSubject, ReviewDecision, RiskLevel,
    recommendations, risk_score,
};
use crate::schedule::CertificationSchedule;
use crate::{CertifyError, Result};

/// Lookback for the unused-role risk factor. Matches the remediation
/// default, so a campaign and a sweep agree on what "unused" means.
const UNUSED_LOOKBACK_DAYS: i64 = 90;

/// Break-glass use is always scored into the high band.
const EMERGENCY_RISK_SCORE: u8 = 70;

/// Days before the due date at which a pending item draws a reminder.
const REMINDER_OFFSET_DAYS: [i64; 3] = [7, 3, 1];

// ============================================================================
// Campaigns
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Open,
    Completed { completed_at: DateTime<Utc> },
}

/// A certification campaign and its review window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub id: CampaignId,
    pub name: String,
    pub opened_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
    /// First entry is the assigned reviewer; the rest receive overdue
    /// escalations.
    pub reviewer_chain: Vec<UserId>,
    pub status: CampaignStatus,
}

impl Campaign {
    pub fn is_open(&self) -> bool {
        matches!(self.status, CampaignStatus::Open)
    }
}

/// Counts over one campaign's items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignStatistics {
    pub total: usize,
    pub pending: usize,
    pub certified: usize,
    pub revoked: usize,
    pub modified: usize,
    pub high_risk: usize,
}

// ============================================================================
// Reminders
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderUrgency {
    /// A fixed-offset nudge this many days before the due date.
    DaysBefore(u8),
    /// Past the due date; the whole reviewer chain is notified.
    Overdue,
}

/// One reminder about one pending certification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderNotice {
    pub campaign_id: CampaignId,
    pub certification_id: CertificationId,
    /// The user whose access is awaiting review.
    pub subject_user: UserId,
    pub recipients: Vec<UserId>,
    pub urgency: ReminderUrgency,
    pub due_at: DateTime<Utc>,
}

/// Delivery seam for reminders and security alerts. Deployments plug in
/// mail or paging here.
pub trait NotificationSink: Send + Sync {
    /// A certification approaches or has passed its due date.
    fn notify(&self, notice: &ReminderNotice);

    /// Break-glass access was recorded. Fires after the record persists
    /// and before the decision is released to the caller.
    fn emergency_access(&self, record: &EmergencyAccessRecord) {
        let _ = record;
    }
}

/// Default sink: reminders and alerts land in the log and nowhere else.
#[derive(Debug, Default)]
pub struct LoggingNotificationSink;

impl NotificationSink for LoggingNotificationSink {
    fn notify(&self, notice: &ReminderNotice) {
        tracing::info!(
            campaign = %notice.campaign_id,
            certification = %notice.certification_id,
            subject = %notice.subject_user,
            urgency = ?notice.urgency,
            "certification reminder"
        );
    }

    fn emergency_access(&self, record: &EmergencyAccessRecord) {
        tracing::warn!(
            user = %record.user_id,
            resource = %record.resource_id,
            action = %record.action.key(),
            expires_at = %record.expires_at,
            "break-glass access recorded"
        );
    }
}

// ============================================================================
// Engine
// ============================================================================

#[derive(Debug, Default)]
struct EngineState {
    campaigns: BTreeMap<CampaignId, Campaign>,
    certifications: BTreeMap<CertificationId, Certification>,
}

/// Runs certification campaigns over the live assignment state.
///
/// The engine reads subjects through [`AssignmentService`] and applies
/// revoke and modify decisions through it as well, so certification outcomes
/// obey the same invariants as any other mutation. Campaign state lives in
/// memory; the audit trail is the durable record of what was decided.
pub struct CertificationEngine {
    service: Arc<AssignmentService>,
    audit: Arc<dyn AuditStore>,
    sink: Arc<dyn NotificationSink>,
    state: RwLock<EngineState>,
}

impl CertificationEngine {
    pub fn new(service: Arc<AssignmentService>, audit: Arc<dyn AuditStore>) -> Self {
        Self {
            service,
            audit,
            sink: Arc::new(LoggingNotificationSink),
            state: RwLock::new(EngineState::default()),
        }
    }

    /// Replaces the reminder sink.
    #[must_use]
    pub fn with_notification_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Opens a campaign: snapshots every in-scope access right into a
    /// pending certification assigned to the first reviewer in the chain.
    ///
    /// A campaign that matches nothing is completed on the spot; both the
    /// opening and the completion are audited.
    pub fn open_campaign(
        &self,
        schedule: &CertificationSchedule,
        opened_by: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Campaign> {
        if schedule.reviewer_chain.is_empty() {
            return Err(CertifyError::EmptyReviewerChain);
        }
        if schedule.name.trim().is_empty() {
            return Err(CertifyError::InvalidSchedule(
                "campaign name must not be empty".to_string(),
            ));
        }
        if schedule.due_in_days < 1 {
            return Err(CertifyError::InvalidSchedule(
                "review window must be at least one day".to_string(),
            ));
        }

        let campaign_id = CampaignId::new();
        let reviewer = schedule.reviewer_chain[0].clone();
        let mut items = Vec::new();

        for user in self.service.users_with_assignments()? {
            for assignment in self.service.effective_assignments(&user, now)? {
                let priority = self
                    .service
                    .catalog()
                    .role(&assignment.role_id)
                    .map(|role| role.priority);
                if !schedule.scope.includes(&assignment.role_id, priority) {
                    continue;
                }
                let since = now - Duration::days(UNUSED_LOOKBACK_DAYS);
                let unused = !self.audit.role_used_since(&user, &assignment.role_id, since)?;
                let age_days = assignment.age_days(now);
                let score =
                    risk_score(priority.unwrap_or(0), assignment.delegated, age_days, unused);
                items.push(Certification {
                    id: CertificationId::new(),
                    campaign_id,
                    user_id: user.clone(),
                    subject: CertificationSubject::RoleAssignment {
                        role_id: assignment.role_id.clone(),
                        delegated: assignment.delegated,
                        assigned_at: assignment.assigned_at,
                    },
                    risk_score: score,
                    risk_level: RiskLevel::from_score(score),
                    recommendations: recommendations(
                        priority.unwrap_or(0),
                        assignment.delegated,
                        age_days,
                        unused,
                    ),
                    reviewer: reviewer.clone(),
                    status: CertificationStatus::Pending,
                });
            }
        }

        if schedule.include_emergency_access {
            for record in self.service.emergency_records()? {
                if record.is_expired(now) {
                    continue;
                }
                items.push(Certification {
                    id: CertificationId::new(),
                    campaign_id,
                    user_id: record.user_id.clone(),
                    subject: CertificationSubject::EmergencyAccess {
                        record_id: record.id,
                    },
                    risk_score: EMERGENCY_RISK_SCORE,
                    risk_level: RiskLevel::from_score(EMERGENCY_RISK_SCORE),
                    recommendations: vec![
                        "break-glass grant; verify the recorded justification".to_string(),
                    ],
                    reviewer: reviewer.clone(),
                    status: CertificationStatus::Pending,
                });
            }
        }

        let total = items.len();
        let campaign = Campaign {
            id: campaign_id,
            name: schedule.name.clone(),
            opened_at: now,
            due_at: now + Duration::days(schedule.due_in_days),
            reviewer_chain: schedule.reviewer_chain.clone(),
            status: if total == 0 {
                CampaignStatus::Completed { completed_at: now }
            } else {
                CampaignStatus::Open
            },
        };

        {
            let mut state = self.state.write().map_err(|_| lock_poisoned())?;
            state.campaigns.insert(campaign_id, campaign.clone());
            for item in items {
                state.certifications.insert(item.id, item);
            }
        }

        self.audit.append(
            opened_by.clone(),
            AuditAction::CampaignOpened {
                campaign_id,
                name: schedule.name.clone(),
                total,
            },
        )?;
        if total == 0 {
            self.audit.append(
                opened_by.clone(),
                AuditAction::CampaignCompleted {
                    campaign_id,
                    total: 0,
                    revoked: 0,
                    modified: 0,
                },
            )?;
            tracing::info!(campaign = %campaign_id, "campaign matched nothing and closed");
        } else {
            tracing::info!(campaign = %campaign_id, total, "campaign opened");
        }
        Ok(campaign)
    }

    pub fn campaign(&self, id: CampaignId) -> Result<Campaign> {
        let state = self.state.read().map_err(|_| lock_poisoned())?;
        state
            .campaigns
            .get(&id)
            .cloned()
            .ok_or(CertifyError::CampaignNotFound(id))
    }

    /// Items of a campaign, pending first and highest risk first within
    /// each group.
    pub fn certifications_for(&self, campaign_id: CampaignId) -> Result<Vec<Certification>> {
        let state = self.state.read().map_err(|_| lock_poisoned())?;
        if !state.campaigns.contains_key(&campaign_id) {
            return Err(CertifyError::CampaignNotFound(campaign_id));
        }
        let mut items: Vec<Certification> = state
            .certifications
            .values()
            .filter(|certification| certification.campaign_id == campaign_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| {
            b.is_pending()
                .cmp(&a.is_pending())
                .then(b.risk_score.cmp(&a.risk_score))
                .then(a.user_id.cmp(&b.user_id))
        });
        Ok(items)
    }

    /// Pending items assigned to `reviewer` across all open campaigns,
    /// highest risk first.
    pub fn pending_for_reviewer(&self, reviewer: &UserId) -> Result<Vec<Certification>> {
        let state = self.state.read().map_err(|_| lock_poisoned())?;
        let mut items: Vec<Certification> = state
            .certifications
            .values()
            .filter(|certification| {
                certification.is_pending() && certification.reviewer == *reviewer
            })
            .cloned()
            .collect();
        items.sort_by(|a, b| b.risk_score.cmp(&a.risk_score).then(a.user_id.cmp(&b.user_id)));
        Ok(items)
    }

    /// Records a reviewer's decision and applies its effect.
    ///
    /// Any member of the campaign's reviewer chain may decide. Revocations
    /// are idempotent: a grant that disappeared between opening and deciding
    /// is logged and treated as revoked. When the last pending item is
    /// decided the campaign completes and a summary lands in the audit
    /// trail.
    pub fn process_certification(
        &self,
        id: CertificationId,
        reviewer: &UserId,
        decision: ReviewDecision,
        now: DateTime<Utc>,
    ) -> Result<Certification> {
        let mut state = self.state.write().map_err(|_| lock_poisoned())?;

        let mut certification = state
            .certifications
            .get(&id)
            .cloned()
            .ok_or(CertifyError::CertificationNotFound(id))?;
        let campaign_id = certification.campaign_id;
        let chain = state
            .campaigns
            .get(&campaign_id)
            .ok_or(CertifyError::CampaignNotFound(campaign_id))?
            .reviewer_chain
            .clone();
        if !chain.contains(reviewer) {
            return Err(CertifyError::ReviewerNotInChain {
                reviewer: reviewer.clone(),
                campaign: campaign_id,
            });
        }
        if !certification.is_pending() {
            return Err(CertifyError::AlreadyDecided(id));
        }

        self.apply(&certification, reviewer, &decision, now)?;

        certification.status = CertificationStatus::Completed {
            decision: decision.clone(),
            decided_by: reviewer.clone(),
            decided_at: now,
        };
        state.certifications.insert(id, certification.clone());

        self.audit.append(
            reviewer.clone(),
            AuditAction::CertificationDecided {
                campaign_id,
                certification_id: id,
                user_id: certification.user_id.clone(),
                reviewer: reviewer.clone(),
                decision: decision.to_string(),
            },
        )?;
        tracing::debug!(certification = %id, decision = %decision, "certification decided");

        let (all_decided, total, revoked, modified) = {
            let mut total = 0;
            let mut pending = 0;
            let mut revoked = 0;
            let mut modified = 0;
            for item in state
                .certifications
                .values()
                .filter(|item| item.campaign_id == campaign_id)
            {
                total += 1;
                match &item.status {
                    CertificationStatus::Pending => pending += 1,
                    CertificationStatus::Completed {
                        decision: ReviewDecision::Revoke,
                        ..
                    } => revoked += 1,
                    CertificationStatus::Completed {
                        decision: ReviewDecision::Modify { .. },
                        ..
                    } => modified += 1,
                    CertificationStatus::Completed { .. } => {}
                }
            }
            (pending == 0, total, revoked, modified)
        };
        if all_decided {
            if let Some(campaign) = state.campaigns.get_mut(&campaign_id) {
                campaign.status = CampaignStatus::Completed { completed_at: now };
            }
            self.audit.append(
                reviewer.clone(),
                AuditAction::CampaignCompleted {
                    campaign_id,
                    total,
                    revoked,
                    modified,
                },
            )?;
            tracing::info!(campaign = %campaign_id, total, revoked, modified, "campaign completed");
        }

        Ok(certification)
    }

    /// Counts for one campaign.
    ///
    /// # Assertions
    ///
    /// - Post: pending and decided counts partition the total
    pub fn statistics(&self, campaign_id: CampaignId) -> Result<CampaignStatistics> {
        let state = self.state.read().map_err(|_| lock_poisoned())?;
        if !state.campaigns.contains_key(&campaign_id) {
            return Err(CertifyError::CampaignNotFound(campaign_id));
        }

        let mut stats = CampaignStatistics::default();
        for certification in state
            .certifications
            .values()
            .filter(|certification| certification.campaign_id == campaign_id)
        {
            stats.total += 1;
            if certification.risk_level == RiskLevel::High {
                stats.high_risk += 1;
            }
            match &certification.status {
                CertificationStatus::Pending => stats.pending += 1,
                CertificationStatus::Completed { decision, .. } => match decision {
                    ReviewDecision::Certify => stats.certified += 1,
                    ReviewDecision::Revoke => stats.revoked += 1,
                    ReviewDecision::Modify { .. } => stats.modified += 1,
                },
            }
        }

        assert_eq!(
            stats.pending + stats.certified + stats.revoked + stats.modified,
            stats.total,
            "campaign items must partition into pending and decided"
        );
        Ok(stats)
    }

    /// Emits reminders for pending items of open campaigns.
    ///
    /// The assigned reviewer is nudged at the fixed offsets of seven,
    /// three, and one day before the due date; past it every reviewer in
    /// the chain is, on every sweep. The sweep is stateless, so the
    /// caller's scheduler decides the cadence.
    pub fn reminder_sweep(&self, now: DateTime<Utc>) -> Result<Vec<ReminderNotice>> {
        let notices = {
            let state = self.state.read().map_err(|_| lock_poisoned())?;
            let mut notices = Vec::new();
            for campaign in state.campaigns.values().filter(|campaign| campaign.is_open()) {
                let overdue = now >= campaign.due_at;
                let days_left = (campaign.due_at - now).num_days();
                if !overdue && !REMINDER_OFFSET_DAYS.contains(&days_left) {
                    continue;
                }
                for certification in state.certifications.values().filter(|certification| {
                    certification.campaign_id == campaign.id && certification.is_pending()
                }) {
                    let (urgency, recipients) = if overdue {
                        (ReminderUrgency::Overdue, campaign.reviewer_chain.clone())
                    } else {
                        (
                            ReminderUrgency::DaysBefore(days_left as u8),
                            vec![certification.reviewer.clone()],
                        )
                    };
                    notices.push(ReminderNotice {
                        campaign_id: campaign.id,
                        certification_id: certification.id,
                        subject_user: certification.user_id.clone(),
                        recipients,
                        urgency,
                        due_at: campaign.due_at,
                    });
                }
            }
            notices
        };

        for notice in &notices {
            self.sink.notify(notice);
        }
        if !notices.is_empty() {
            tracing::debug!(count = notices.len(), "reminders sent");
        }
        Ok(notices)
    }

    fn apply(
        &self,
        certification: &Certification,
        reviewer: &UserId,
        decision: &ReviewDecision,
        now: DateTime<Utc>,
    ) -> Result<()> {
        match (&certification.subject, decision) {
            (_, ReviewDecision::Certify) => Ok(()),
            (CertificationSubject::RoleAssignment { role_id, .. }, ReviewDecision::Revoke) => {
                let revoked = self.service.revoke_role(
                    &certification.user_id,
                    role_id,
                    reviewer,
                    Some("revoked by access certification".to_string()),
                );
                match revoked {
                    Ok(_) => Ok(()),
                    Err(LifecycleError::NotAssigned { .. }) => {
                        tracing::warn!(
                            user = %certification.user_id,
                            role = %role_id,
                            "revocation target already absent"
                        );
                        Ok(())
                    }
                    Err(err) => Err(err.into()),
                }
            }
            (
                CertificationSubject::RoleAssignment { role_id, .. },
                ReviewDecision::Modify { replacement },
            ) => {
                self.service.replace_role(
                    &certification.user_id,
                    role_id,
                    replacement,
                    reviewer,
                    now,
                )?;
                Ok(())
            }
            (CertificationSubject::EmergencyAccess { record_id }, ReviewDecision::Revoke) => {
                if !self.service.remove_emergency_record(*record_id)? {
                    tracing::warn!(record = %record_id, "emergency record already gone");
                }
                Ok(())
            }
            (CertificationSubject::EmergencyAccess { .. }, ReviewDecision::Modify { .. }) => {
                Err(CertifyError::ModifyUnsupported)
            }
        }
    }
}

fn lock_poisoned() -> CertifyError {
    CertifyError::Store("campaign state lock poisoned".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use wardstone_audit::{AuditQuery, MemoryAuditStore};
    use wardstone_catalog::RoleCatalog;
    use wardstone_lifecycle::{AssignOptions, MemoryAssignmentStore, MemoryEmergencyAccessStore};
    use wardstone_types::{
        AccessDecision, Action, EmergencyAccessRecord, EnvironmentContext, PolicyContext,
        PolicyTrace, Resource, ResourceAttributes, ResourceKind, RoleId, Subject,
        SubjectAttributes,
    };

    use crate::schedule::RoleScope;

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, 9, 0, 0).unwrap()
    }

    fn fixture() -> (Arc<AssignmentService>, Arc<dyn AuditStore>, CertificationEngine) {
        let audit: Arc<dyn AuditStore> = Arc::new(MemoryAuditStore::new());
        let service = Arc::new(AssignmentService::new(
            Arc::new(RoleCatalog::builtin()),
            Arc::new(MemoryAssignmentStore::new()),
            Arc::new(MemoryEmergencyAccessStore::new()),
            Arc::clone(&audit),
        ));
        let engine = CertificationEngine::new(Arc::clone(&service), Arc::clone(&audit));
        (service, audit, engine)
    }

    fn seed(service: &AssignmentService, user: &str, role: &str, at: DateTime<Utc>) {
        service
            .assign_role(
                &UserId::new(user),
                &RoleId::new(role),
                &UserId::system(),
                AssignOptions::new(),
                at,
            )
            .unwrap();
    }

    fn record_usage(audit: &dyn AuditStore, user: &str, role: &str, at: DateTime<Utc>) {
        let context = PolicyContext::new(
            Subject::new(user, SubjectAttributes::new()),
            Resource::new(ResourceKind::PatientRecord, "mrn-1001", ResourceAttributes::new()),
            Action::View,
            EnvironmentContext::at(at),
        );
        let decision = AccessDecision::allow(format!("granted by role `{role}`"))
            .with_traces(vec![PolicyTrace::matched(format!(
                "role_permission:{role}:record:view"
            ))]);
        audit
            .append(
                UserId::new(user),
                AuditAction::AccessEvaluated {
                    context,
                    decision,
                    elapsed_micros: 15,
                },
            )
            .unwrap();
    }

    fn privileged_schedule() -> CertificationSchedule {
        CertificationSchedule::new(
            "q3-privileged",
            RoleScope::MinPriority(700),
            vec![UserId::new("ciso-reyes"), UserId::new("cto-okafor")],
        )
    }

    #[test]
    fn scoped_campaigns_snapshot_only_matching_roles() {
        let (service, _audit, engine) = fixture();
        seed(&service, "admin-9", "super_admin", base());
        seed(&service, "dr-chen", "physician", base());
        seed(&service, "nurse-patel", "nurse", base());

        let campaign = engine
            .open_campaign(&privileged_schedule(), &UserId::new("ciso-reyes"), base())
            .unwrap();
        assert!(campaign.is_open());

        let items = engine.certifications_for(campaign.id).unwrap();
        assert_eq!(items.len(), 1, "only super_admin clears priority 700");
        assert_eq!(items[0].user_id, UserId::new("admin-9"));

        // Fresh but unused platform root: 40 for priority, 30 for unused.
        assert_eq!(items[0].risk_score, 70);
        assert_eq!(items[0].risk_level, RiskLevel::High);
        assert_eq!(items[0].reviewer, UserId::new("ciso-reyes"));
        assert_eq!(
            items[0].recommendations,
            vec![
                "unused in the lookback window; favor revocation".to_string(),
                "high-privilege role; confirm the duty still requires it".to_string(),
            ]
        );

        let stats = engine.statistics(campaign.id).unwrap();
        assert_eq!(stats.total, 1);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.high_risk, 1);
    }

    #[test]
    fn usage_keeps_the_risk_down() {
        let (service, audit, engine) = fixture();
        seed(&service, "dr-chen", "physician", base() - Duration::days(30));
        seed(&service, "nurse-patel", "nurse", base() - Duration::days(30));
        record_usage(audit.as_ref(), "dr-chen", "physician", base() - Duration::days(3));

        let schedule = CertificationSchedule::new(
            "q3-all",
            RoleScope::All,
            vec![UserId::new("ciso-reyes")],
        );
        let campaign = engine
            .open_campaign(&schedule, &UserId::new("ciso-reyes"), base())
            .unwrap();
        let items = engine.certifications_for(campaign.id).unwrap();

        // Unused nurse (10 + 30) sorts above the exercised physician (25).
        assert_eq!(items[0].user_id, UserId::new("nurse-patel"));
        assert_eq!(items[0].risk_score, 40);
        assert_eq!(items[1].user_id, UserId::new("dr-chen"));
        assert_eq!(items[1].risk_score, 25);
        assert!(
            items[1].recommendations.is_empty(),
            "an exercised ordinary grant needs no guidance"
        );
    }

    #[test]
    fn empty_campaigns_complete_on_the_spot() {
        let (_service, audit, engine) = fixture();
        let campaign = engine
            .open_campaign(&privileged_schedule(), &UserId::new("ciso-reyes"), base())
            .unwrap();

        assert!(!campaign.is_open());
        let trail = audit
            .query(&AuditQuery::default().with_action_type("Campaign"))
            .unwrap();
        assert_eq!(trail.len(), 2, "opened and completed entries");
    }

    #[test]
    fn campaigns_require_a_reviewer_chain() {
        let (_service, _audit, engine) = fixture();
        let schedule = CertificationSchedule::new("q3", RoleScope::All, Vec::new());
        let err = engine
            .open_campaign(&schedule, &UserId::new("ciso-reyes"), base())
            .unwrap_err();
        assert!(matches!(err, CertifyError::EmptyReviewerChain));
    }

    #[test]
    fn certify_decision_keeps_the_grant() {
        let (service, _audit, engine) = fixture();
        seed(&service, "admin-9", "super_admin", base());
        let campaign = engine
            .open_campaign(&privileged_schedule(), &UserId::new("ciso-reyes"), base())
            .unwrap();
        let item = engine.certifications_for(campaign.id).unwrap().remove(0);

        engine
            .process_certification(
                item.id,
                &UserId::new("ciso-reyes"),
                ReviewDecision::Certify,
                base(),
            )
            .unwrap();

        let held = service
            .effective_assignments(&UserId::new("admin-9"), base())
            .unwrap();
        assert_eq!(held.len(), 1, "certified grant survives");

        let stats = engine.statistics(campaign.id).unwrap();
        assert_eq!(stats.certified, 1);
        assert_eq!(stats.pending, 0);
        assert!(!engine.campaign(campaign.id).unwrap().is_open());
    }

    #[test]
    fn revoke_decision_removes_the_grant_and_closes_the_campaign() {
        let (service, audit, engine) = fixture();
        seed(&service, "admin-9", "super_admin", base());
        let campaign = engine
            .open_campaign(&privileged_schedule(), &UserId::new("ciso-reyes"), base())
            .unwrap();
        let item = engine.certifications_for(campaign.id).unwrap().remove(0);

        engine
            .process_certification(
                item.id,
                &UserId::new("ciso-reyes"),
                ReviewDecision::Revoke,
                base(),
            )
            .unwrap();

        assert!(
            service
                .effective_assignments(&UserId::new("admin-9"), base())
                .unwrap()
                .is_empty()
        );
        let completed = audit
            .query(&AuditQuery::default().with_action_type("Campaign"))
            .unwrap();
        assert!(
            completed
                .iter()
                .any(|entry| {
                    matches!(entry.action, AuditAction::CampaignCompleted { revoked: 1, .. })
                }),
            "completion summary counts the revocation"
        );
    }

    #[test]
    fn modify_decision_swaps_the_role() {
        let (service, _audit, engine) = fixture();
        seed(&service, "dr-chen", "physician", base());
        let schedule = CertificationSchedule::new(
            "narrowing",
            RoleScope::Roles(vec![RoleId::new("physician")]),
            vec![UserId::new("ciso-reyes")],
        );
        let campaign = engine
            .open_campaign(&schedule, &UserId::new("ciso-reyes"), base())
            .unwrap();
        let item = engine.certifications_for(campaign.id).unwrap().remove(0);

        engine
            .process_certification(
                item.id,
                &UserId::new("ciso-reyes"),
                ReviewDecision::Modify {
                    replacement: RoleId::new("nurse"),
                },
                base(),
            )
            .unwrap();

        let held = service
            .effective_assignments(&UserId::new("dr-chen"), base())
            .unwrap();
        assert_eq!(held.len(), 1);
        assert_eq!(held[0].role_id, RoleId::new("nurse"));
        assert_eq!(engine.statistics(campaign.id).unwrap().modified, 1);
    }

    #[test]
    fn decisions_come_only_from_the_chain() {
        let (service, _audit, engine) = fixture();
        seed(&service, "admin-9", "super_admin", base());
        let campaign = engine
            .open_campaign(&privileged_schedule(), &UserId::new("ciso-reyes"), base())
            .unwrap();
        let item = engine.certifications_for(campaign.id).unwrap().remove(0);

        let err = engine
            .process_certification(
                item.id,
                &UserId::new("intruder"),
                ReviewDecision::Certify,
                base(),
            )
            .unwrap_err();
        assert!(matches!(err, CertifyError::ReviewerNotInChain { .. }));

        // The escalation reviewer further down the chain may decide.
        engine
            .process_certification(
                item.id,
                &UserId::new("cto-okafor"),
                ReviewDecision::Certify,
                base(),
            )
            .unwrap();

        let err = engine
            .process_certification(
                item.id,
                &UserId::new("ciso-reyes"),
                ReviewDecision::Certify,
                base(),
            )
            .unwrap_err();
        assert!(matches!(err, CertifyError::AlreadyDecided(_)));
    }

    #[test]
    fn revocation_of_an_already_removed_grant_still_counts() {
        let (service, _audit, engine) = fixture();
        seed(&service, "admin-9", "super_admin", base());
        let campaign = engine
            .open_campaign(&privileged_schedule(), &UserId::new("ciso-reyes"), base())
            .unwrap();
        let item = engine.certifications_for(campaign.id).unwrap().remove(0);

        // The grant leaves through the normal path mid-campaign.
        service
            .revoke_role(
                &UserId::new("admin-9"),
                &RoleId::new("super_admin"),
                &UserId::system(),
                Some("offboarded".to_string()),
            )
            .unwrap();

        engine
            .process_certification(
                item.id,
                &UserId::new("ciso-reyes"),
                ReviewDecision::Revoke,
                base(),
            )
            .unwrap();
        assert_eq!(engine.statistics(campaign.id).unwrap().revoked, 1);
    }

    #[test]
    fn emergency_records_ride_along_when_asked() {
        let (service, _audit, engine) = fixture();
        seed(&service, "dr-chen", "physician", base());
        service
            .record_emergency_access(EmergencyAccessRecord::new(
                "medic-7",
                ResourceKind::PatientRecord,
                "mrn-1001",
                Action::View,
                base() - Duration::minutes(10),
                "cardiac arrest",
                None,
            ))
            .unwrap();
        // A record from yesterday has long expired and stays out.
        service
            .record_emergency_access(EmergencyAccessRecord::new(
                "medic-7",
                ResourceKind::PatientRecord,
                "mrn-2002",
                Action::View,
                base() - Duration::days(1),
                "earlier incident",
                None,
            ))
            .unwrap();

        let schedule = CertificationSchedule::new(
            "q3-all",
            RoleScope::All,
            vec![UserId::new("ciso-reyes")],
        )
        .with_emergency_access();
        let campaign = engine
            .open_campaign(&schedule, &UserId::new("ciso-reyes"), base())
            .unwrap();
        let items = engine.certifications_for(campaign.id).unwrap();

        let emergency: Vec<_> = items
            .iter()
            .filter(|item| matches!(item.subject, CertificationSubject::EmergencyAccess { .. }))
            .collect();
        assert_eq!(emergency.len(), 1);
        assert_eq!(emergency[0].risk_level, RiskLevel::High);
        assert_eq!(
            emergency[0].recommendations,
            vec!["break-glass grant; verify the recorded justification".to_string()]
        );

        // Revoking the emergency item terminates the live grant.
        engine
            .process_certification(
                emergency[0].id,
                &UserId::new("ciso-reyes"),
                ReviewDecision::Revoke,
                base(),
            )
            .unwrap();
        let remaining = service.emergency_records().unwrap();
        assert_eq!(remaining.len(), 1, "only the expired record is left");
        assert_eq!(remaining[0].resource_id, "mrn-2002");
    }

    #[test]
    fn modify_is_rejected_for_emergency_subjects() {
        let (service, _audit, engine) = fixture();
        service
            .record_emergency_access(EmergencyAccessRecord::new(
                "medic-7",
                ResourceKind::PatientRecord,
                "mrn-1001",
                Action::View,
                base() - Duration::minutes(10),
                "cardiac arrest",
                None,
            ))
            .unwrap();
        let schedule = CertificationSchedule::new(
            "emergency-only",
            RoleScope::Roles(Vec::new()),
            vec![UserId::new("ciso-reyes")],
        )
        .with_emergency_access();
        let campaign = engine
            .open_campaign(&schedule, &UserId::new("ciso-reyes"), base())
            .unwrap();
        let item = engine.certifications_for(campaign.id).unwrap().remove(0);

        let err = engine
            .process_certification(
                item.id,
                &UserId::new("ciso-reyes"),
                ReviewDecision::Modify {
                    replacement: RoleId::new("nurse"),
                },
                base(),
            )
            .unwrap_err();
        assert!(matches!(err, CertifyError::ModifyUnsupported));
        assert!(
            engine.certifications_for(campaign.id).unwrap()[0].is_pending(),
            "failed decision leaves the item pending"
        );
    }

    #[test]
    fn reminders_escalate_after_the_due_date() {
        let (service, _audit, engine) = fixture();
        seed(&service, "admin-9", "super_admin", base());
        engine
            .open_campaign(&privileged_schedule(), &UserId::new("ciso-reyes"), base())
            .unwrap();

        // Far from due: silence.
        assert!(engine.reminder_sweep(base() + Duration::days(2)).unwrap().is_empty());

        // Two days out is not a fixed offset: still silence.
        assert!(engine.reminder_sweep(base() + Duration::days(12)).unwrap().is_empty());

        // At an offset: assigned reviewer only.
        let notices = engine.reminder_sweep(base() + Duration::days(11)).unwrap();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].urgency, ReminderUrgency::DaysBefore(3));
        assert_eq!(notices[0].recipients, vec![UserId::new("ciso-reyes")]);

        // Past due: the whole chain hears about it.
        let notices = engine.reminder_sweep(base() + Duration::days(15)).unwrap();
        assert_eq!(notices[0].urgency, ReminderUrgency::Overdue);
        assert_eq!(
            notices[0].recipients,
            vec![UserId::new("ciso-reyes"), UserId::new("cto-okafor")]
        );
    }

    #[test]
    fn decided_items_stop_drawing_reminders() {
        let (service, _audit, engine) = fixture();
        seed(&service, "admin-9", "super_admin", base());
        let campaign = engine
            .open_campaign(&privileged_schedule(), &UserId::new("ciso-reyes"), base())
            .unwrap();
        let item = engine.certifications_for(campaign.id).unwrap().remove(0);
        engine
            .process_certification(
                item.id,
                &UserId::new("ciso-reyes"),
                ReviewDecision::Certify,
                base(),
            )
            .unwrap();

        assert!(engine.reminder_sweep(base() + Duration::days(20)).unwrap().is_empty());
    }

    #[test]
    fn notices_reach_the_installed_sink() {
        use std::sync::Mutex;

        #[derive(Default)]
        struct Collector(Mutex<Vec<ReminderNotice>>);
        impl NotificationSink for Collector {
            fn notify(&self, notice: &ReminderNotice) {
                self.0.lock().unwrap().push(notice.clone());
            }
        }

        let (service, audit, _) = fixture();
        let sink = Arc::new(Collector::default());
        let engine = CertificationEngine::new(Arc::clone(&service), Arc::clone(&audit))
            .with_notification_sink(Arc::clone(&sink) as Arc<dyn NotificationSink>);

        seed(&service, "admin-9", "super_admin", base());
        engine
            .open_campaign(&privileged_schedule(), &UserId::new("ciso-reyes"), base())
            .unwrap();
        engine.reminder_sweep(base() + Duration::days(13)).unwrap();

        let seen = sink.0.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].urgency, ReminderUrgency::DaysBefore(1));
    }
}
