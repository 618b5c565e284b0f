//! Campaign schedules and role scoping.

use serde::{Deserialize, Serialize};
use wardstone_types::{RoleId, UserId};

/// Which roles a campaign pulls into review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleScope {
    /// Every assignment, including ones whose role has left the catalog.
    All,
    /// Only the listed roles.
    Roles(Vec<RoleId>),
    /// Roles at or above the given priority. Assignments whose role is no
    /// longer in the catalog have no known priority and are excluded.
    MinPriority(u16),
}

impl RoleScope {
    /// Whether an assignment of `role_id` falls inside this scope.
    /// `priority` is the catalog priority, `None` for decommissioned roles.
    #[must_use]
    pub fn includes(&self, role_id: &RoleId, priority: Option<u16>) -> bool {
        match self {
            Self::All => true,
            Self::Roles(ids) => ids.contains(role_id),
            Self::MinPriority(min) => priority.is_some_and(|p| p >= *min),
        }
    }
}

/// Everything needed to open a campaign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificationSchedule {
    pub name: String,
    pub scope: RoleScope,
    /// First entry reviews; the rest are the escalation path for overdue
    /// items. Must not be empty.
    pub reviewer_chain: Vec<UserId>,
    pub due_in_days: i64,
    /// Also pull live break-glass grants into the campaign.
    pub include_emergency_access: bool,
}

impl CertificationSchedule {
    /// A schedule with a 14-day review window and no emergency records.
    pub fn new(name: impl Into<String>, scope: RoleScope, reviewer_chain: Vec<UserId>) -> Self {
        Self {
            name: name.into(),
            scope,
            reviewer_chain,
            due_in_days: 14,
            include_emergency_access: false,
        }
    }

    #[must_use]
    pub fn with_due_in_days(mut self, days: i64) -> Self {
        self.due_in_days = days;
        self
    }

    #[must_use]
    pub fn with_emergency_access(mut self) -> Self {
        self.include_emergency_access = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn nurse_only() -> RoleScope {
        RoleScope::Roles(vec![RoleId::new("nurse")])
    }

    fn floor_700() -> RoleScope {
        RoleScope::MinPriority(700)
    }

    #[test_case(RoleScope::All, "physician", Some(650), true ; "all takes anything")]
    #[test_case(RoleScope::All, "ghost", None, true ; "all takes decommissioned roles")]
    #[test_case(nurse_only(), "nurse", Some(450), true ; "listed role matches")]
    #[test_case(nurse_only(), "physician", Some(650), false ; "unlisted role does not")]
    #[test_case(floor_700(), "super_admin", Some(1000), true ; "priority at or above the floor")]
    #[test_case(floor_700(), "physician", Some(650), false ; "priority below the floor")]
    #[test_case(floor_700(), "ghost", None, false ; "unknown priority is excluded")]
    fn scope_membership(scope: RoleScope, role: &str, priority: Option<u16>, included: bool) {
        assert_eq!(scope.includes(&RoleId::new(role), priority), included);
    }

    #[test]
    fn schedules_default_to_two_weeks() {
        let schedule = CertificationSchedule::new(
            "q3-privileged",
            RoleScope::MinPriority(700),
            vec![UserId::new("ciso-reyes")],
        );
        assert_eq!(schedule.due_in_days, 14);
        assert!(!schedule.include_emergency_access);
    }
}
