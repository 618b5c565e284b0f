//! Certification records and risk scoring.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use wardstone_types::{CampaignId, CertificationId, EmergencyAccessId, RoleId, UserId};

// ============================================================================
// Risk scoring
// ============================================================================

/// Coarse risk banding for reviewer triage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Bands: below 40 is low, 40 to 69 is medium, 70 and above is high.
    #[must_use]
    pub fn from_score(score: u8) -> Self {
        match score {
            0..=39 => Self::Low,
            40..=69 => Self::Medium,
            _ => Self::High,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        };
        f.write_str(label)
    }
}

/// Additive risk score for one assignment under review.
///
/// Role weight dominates: anything above priority 700 starts at 40, so a
/// privileged role that is also unused lands in the high band on its own.
/// The unused factor has no age gate; a day-old grant that has never been
/// exercised still counts as unused.
#[must_use]
pub fn risk_score(priority: u16, delegated: bool, age_days: i64, unused: bool) -> u8 {
    let mut score: u8 = if priority > 700 {
        40
    } else if priority > 500 {
        25
    } else {
        10
    };
    if delegated {
        score += 15;
    }
    if age_days > 365 {
        score += 20;
    } else if age_days > 180 {
        score += 10;
    }
    if unused {
        score += 30;
    }
    score
}

/// Reviewer guidance derived from the same signals as [`risk_score`].
///
/// One line per flagged factor, strongest action first. An unremarkable
/// grant gets an empty list, which the campaign stores as-is.
#[must_use]
pub fn recommendations(priority: u16, delegated: bool, age_days: i64, unused: bool) -> Vec<String> {
    let mut out = Vec::new();
    if unused {
        out.push("unused in the lookback window; favor revocation".to_string());
    }
    if delegated {
        out.push("delegated grant; confirm the delegator still stands behind it".to_string());
    }
    if age_days > 365 {
        out.push("granted over a year ago; re-verify the original justification".to_string());
    }
    if priority > 700 {
        out.push("high-privilege role; confirm the duty still requires it".to_string());
    }
    out
}

// ============================================================================
// Certifications
// ============================================================================

/// What one certification asks the reviewer to judge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertificationSubject {
    /// An effective role assignment.
    RoleAssignment {
        role_id: RoleId,
        delegated: bool,
        assigned_at: DateTime<Utc>,
    },
    /// A live break-glass grant.
    EmergencyAccess { record_id: EmergencyAccessId },
}

/// The reviewer's verdict on a certification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    /// Access is appropriate and stays.
    Certify,
    /// Access is withdrawn.
    Revoke,
    /// The role is swapped for a narrower one. Not applicable to
    /// emergency-access subjects.
    Modify { replacement: RoleId },
}

impl fmt::Display for ReviewDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Certify => f.write_str("certify"),
            Self::Revoke => f.write_str("revoke"),
            Self::Modify { replacement } => write!(f, "modify to `{replacement}`"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertificationStatus {
    Pending,
    Completed {
        decision: ReviewDecision,
        decided_by: UserId,
        decided_at: DateTime<Utc>,
    },
}

/// One item of a campaign: a single access right awaiting review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Certification {
    pub id: CertificationId,
    pub campaign_id: CampaignId,
    /// The user whose access is under review.
    pub user_id: UserId,
    pub subject: CertificationSubject,
    pub risk_score: u8,
    pub risk_level: RiskLevel,
    /// Factor-by-factor guidance for the reviewer. May be empty.
    pub recommendations: Vec<String>,
    /// The reviewer the item is assigned to; reminders go here first.
    pub reviewer: UserId,
    pub status: CertificationStatus,
}

impl Certification {
    pub fn is_pending(&self) -> bool {
        matches!(self.status, CertificationStatus::Pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(1000, false, 0, true, 70 ; "fresh unused super admin is high on its own")]
    #[test_case(650, false, 0, false, 25 ; "plain physician grant is low")]
    #[test_case(450, true, 200, false, 35 ; "aging delegated nurse stays low")]
    #[test_case(450, true, 400, true, 75 ; "stale unused delegation goes high")]
    #[test_case(650, false, 200, true, 65 ; "unused physician lands medium")]
    #[test_case(1000, true, 400, true, 105 ; "every factor stacked")]
    fn risk_scores_add_up(priority: u16, delegated: bool, age: i64, unused: bool, expected: u8) {
        assert_eq!(risk_score(priority, delegated, age, unused), expected);
    }

    #[test_case(0, RiskLevel::Low)]
    #[test_case(39, RiskLevel::Low)]
    #[test_case(40, RiskLevel::Medium)]
    #[test_case(69, RiskLevel::Medium)]
    #[test_case(70, RiskLevel::High)]
    #[test_case(105, RiskLevel::High)]
    fn risk_bands_have_hard_edges(score: u8, expected: RiskLevel) {
        assert_eq!(RiskLevel::from_score(score), expected);
    }

    #[test]
    fn recommendations_track_the_scored_factors() {
        assert!(recommendations(650, false, 30, false).is_empty());

        let stacked = recommendations(1000, true, 400, true);
        assert_eq!(stacked.len(), 4, "every factor contributes one line");
        assert!(stacked[0].contains("revocation"), "unused leads");
        assert!(stacked[3].contains("high-privilege"));

        assert_eq!(
            recommendations(450, false, 30, true),
            vec!["unused in the lookback window; favor revocation".to_string()]
        );
    }

    #[test]
    fn age_boundaries_are_exclusive() {
        // Exactly 180 or 365 days earns nothing extra.
        assert_eq!(risk_score(450, false, 180, false), 10);
        assert_eq!(risk_score(450, false, 181, false), 20);
        assert_eq!(risk_score(450, false, 365, false), 20);
        assert_eq!(risk_score(450, false, 366, false), 30);
    }

    #[test]
    fn decisions_render_for_the_audit_trail() {
        assert_eq!(ReviewDecision::Certify.to_string(), "certify");
        assert_eq!(ReviewDecision::Revoke.to_string(), "revoke");
        assert_eq!(
            ReviewDecision::Modify {
                replacement: RoleId::new("nurse")
            }
            .to_string(),
            "modify to `nurse`"
        );
    }
}
