use crate::domain::IncidentStatus;
use crate::error::{AppError, INVALID_INPUT};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Target equals the current status; nothing to write.
    Unchanged,
    Change {
        from: IncidentStatus,
        to: IncidentStatus,
    },
}

pub fn allowed_targets(from: IncidentStatus) -> &'static [IncidentStatus] {
    match from {
        IncidentStatus::Pending => &[IncidentStatus::InProgress, IncidentStatus::Closed],
        IncidentStatus::InProgress => &[IncidentStatus::Resolved, IncidentStatus::Closed],
        IncidentStatus::Resolved | IncidentStatus::Closed => &[],
    }
}

/// Resolved and closed incidents reject every normal-path mutation.
pub fn ensure_mutable(current: IncidentStatus) -> Result<(), AppError> {
    if current.is_terminal() {
        return Err(AppError::terminal_state(current.as_str()));
    }
    Ok(())
}

/// Terminal check runs first, so repeating a terminal status is a violation rather than a
/// no-op.
pub fn check_transition(from: IncidentStatus, to: IncidentStatus) -> Result<Transition, AppError> {
    ensure_mutable(from)?;
    if from == to {
        return Ok(Transition::Unchanged);
    }
    if !allowed_targets(from).contains(&to) {
        let allowed = allowed_targets(from)
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        return Err(AppError::new(
            INVALID_INPUT,
            format!("Cannot move incident from {} to {}", from.as_str(), to.as_str()),
        )
        .with_details(format!("allowed={allowed}"))
        .with_fields(["status"]));
    }
    Ok(Transition::Change { from, to })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TERMINAL_STATE_VIOLATION;
    use IncidentStatus::*;

    #[test]
    fn table_of_allowed_moves() {
        assert_eq!(
            check_transition(Pending, InProgress).unwrap(),
            Transition::Change {
                from: Pending,
                to: InProgress
            }
        );
        assert!(check_transition(Pending, Closed).is_ok());
        assert!(check_transition(InProgress, Resolved).is_ok());
        assert!(check_transition(InProgress, Closed).is_ok());
    }

    #[test]
    fn skipping_or_reversing_is_invalid_input() {
        for (from, to) in [(Pending, Resolved), (InProgress, Pending)] {
            let err = check_transition(from, to).unwrap_err();
            assert_eq!(err.code, INVALID_INPUT);
            assert_eq!(err.fields, vec!["status".to_string()]);
        }
    }

    #[test]
    fn same_status_is_a_no_op_unless_terminal() {
        assert_eq!(check_transition(Pending, Pending).unwrap(), Transition::Unchanged);
        assert_eq!(
            check_transition(InProgress, InProgress).unwrap(),
            Transition::Unchanged
        );
        for terminal in [Resolved, Closed] {
            for to in [Pending, InProgress, Resolved, Closed] {
                let err = check_transition(terminal, to).unwrap_err();
                assert_eq!(err.code, TERMINAL_STATE_VIOLATION);
                assert!(err.message.contains(terminal.as_str()));
            }
        }
    }
}
