use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::domain::roster::{StaffMember, TeamRoster};
use crate::domain::Assignment;
use crate::error::{AppError, NO_ELIGIBLE_MEMBERS};
use crate::notify::Address;
use crate::roster::RosterProvider;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum AssignmentTarget {
    Team(i64),
    Staff(i64),
}

/// An eligible assignment plus who to tell about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAssignment {
    pub assignment: Assignment,
    pub assignee: String,
    pub recipients: Vec<Address>,
}

fn addresses<'a>(members: impl Iterator<Item = &'a StaffMember>) -> Vec<Address> {
    let mut out: Vec<Address> = members
        .filter_map(|m| m.email.as_deref())
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .map(Address::new)
        .collect();
    out.sort();
    out.dedup();
    out
}

fn no_eligible_team_members(roster: &TeamRoster) -> AppError {
    let total = roster.members.len();
    let message = if total == 0 {
        format!("Team {} has no members", roster.team.name)
    } else {
        format!(
            "Team {} has {total} member(s) but none are both active and available",
            roster.team.name
        )
    };
    AppError::new(NO_ELIGIBLE_MEMBERS, message).with_details(format!(
        "team_id={}; team={}; total_members={total}; eligible_members=0",
        roster.team.id, roster.team.name
    ))
}

pub fn resolve_team(
    conn: &Connection,
    roster: &dyn RosterProvider,
    team_id: i64,
) -> Result<ResolvedAssignment, AppError> {
    let team = roster
        .team_roster(conn, team_id)?
        .ok_or_else(|| AppError::not_found("team", team_id))?;

    if !team.is_assignable() {
        return Err(no_eligible_team_members(&team));
    }

    Ok(ResolvedAssignment {
        assignment: Assignment::Team { team_id },
        assignee: format!("team {}", team.team.name),
        recipients: addresses(team.eligible_members()),
    })
}

/// Individual assignment checks `active` only; availability is not consulted.
pub fn resolve_staff(
    conn: &Connection,
    roster: &dyn RosterProvider,
    staff_id: i64,
) -> Result<ResolvedAssignment, AppError> {
    let member = roster
        .staff_member(conn, staff_id)?
        .ok_or_else(|| AppError::not_found("staff", staff_id))?;

    if !member.is_individually_assignable() {
        return Err(AppError::new(
            NO_ELIGIBLE_MEMBERS,
            format!("Staff member {} is inactive", member.name),
        )
        .with_details(format!("staff_id={staff_id}; reason=inactive")));
    }

    Ok(ResolvedAssignment {
        assignment: Assignment::Staff { staff_id },
        assignee: member.name.clone(),
        recipients: addresses(std::iter::once(&member)),
    })
}

pub fn resolve_target(
    conn: &Connection,
    roster: &dyn RosterProvider,
    target: AssignmentTarget,
) -> Result<ResolvedAssignment, AppError> {
    match target {
        AssignmentTarget::Team(team_id) => resolve_team(conn, roster, team_id),
        AssignmentTarget::Staff(staff_id) => resolve_staff(conn, roster, staff_id),
    }
}
