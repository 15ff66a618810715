use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Team {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StaffMember {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    pub active: bool,
    pub available: bool,
    pub team_id: Option<i64>,
}

impl StaffMember {
    /// Team members must be both active and available to count towards eligibility.
    pub fn is_eligible_team_member(&self) -> bool {
        self.active && self.available
    }

    /// Individual assignment only requires the member to be active.
    pub fn is_individually_assignable(&self) -> bool {
        self.active
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TeamRoster {
    pub team: Team,
    pub members: Vec<StaffMember>,
}

impl TeamRoster {
    pub fn eligible_members(&self) -> impl Iterator<Item = &StaffMember> {
        self.members.iter().filter(|m| m.is_eligible_team_member())
    }

    pub fn is_assignable(&self) -> bool {
        self.eligible_members().next().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(id: i64, active: bool, available: bool) -> StaffMember {
        StaffMember {
            id,
            name: format!("m{id}"),
            email: None,
            active,
            available,
            team_id: Some(1),
        }
    }

    #[test]
    fn team_needs_member_both_active_and_available() {
        let team = Team {
            id: 1,
            name: "Rescue".to_string(),
        };
        let roster = TeamRoster {
            team: team.clone(),
            members: vec![member(1, true, false), member(2, false, true)],
        };
        assert!(!roster.is_assignable());

        let roster = TeamRoster {
            team,
            members: vec![member(1, true, false), member(3, true, true)],
        };
        assert!(roster.is_assignable());
        assert_eq!(roster.eligible_members().count(), 1);
    }

    #[test]
    fn individual_assignment_ignores_availability() {
        assert!(member(1, true, false).is_individually_assignable());
        assert!(!member(1, false, true).is_individually_assignable());
    }
}
