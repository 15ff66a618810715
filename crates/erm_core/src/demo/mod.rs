use rusqlite::Connection;

use crate::error::AppError;
use crate::ingest::roster_csv::{import_roster_csv, RosterImportSummary};

pub const DEMO_SEEDED_AT: &str = "2026-01-01T00:00:00Z";

fn demo_csv() -> String {
    // Deterministic roster covering every eligibility shape the engine distinguishes:
    // fully staffed, partially eligible, all ineligible, and unaffiliated responders.
    let mut out = String::new();
    out.push_str("Team,Name,Email,Active,Available\n");

    let teams = ["Fire Station 1", "Flood Response", "Medical Unit"];
    for (t, team) in teams.iter().enumerate() {
        for i in 1..=4 {
            // Every fourth member is off duty, every third is unavailable.
            let n = t * 4 + i;
            let active = n % 4 != 0;
            let available = n % 3 != 0;
            let slug = team.to_lowercase().replace(' ', ".");
            out.push_str(&format!(
                "{team},Responder {n:02},r{n:02}@{slug}.example.org,{active},{available}\n"
            ));
        }
    }

    out.push_str("Night Watch,Sleeper One,night1@example.org,false,true\n");
    out.push_str("Night Watch,Sleeper Two,night2@example.org,true,false\n");
    out.push_str(",Duty Officer,duty.officer@example.org,true,false\n");
    out.push_str(",Retired Volunteer,,false,false\n");
    out
}

/// Seed teams and staff for demos and tests. Incidents are never seeded.
pub fn seed_demo_roster(conn: &mut Connection) -> Result<RosterImportSummary, AppError> {
    import_roster_csv(conn, &demo_csv(), DEMO_SEEDED_AT)
}
