//! State machine transition validity tables.
//!
//! Invalid transitions fail loudly: the caller wraps them in a
//! protocol-violation error that is fatal for the run.

use gantry_workflow::NodeState;

use crate::error::ExecutionError;
use crate::status::ExecutionStatus;

/// Returns `true` if the run-level transition from `from` to `to` is valid.
#[must_use]
pub fn can_transition_execution(from: ExecutionStatus, to: ExecutionStatus) -> bool {
    matches!(
        (from, to),
        (ExecutionStatus::Created, ExecutionStatus::Running)
            | (ExecutionStatus::Running, ExecutionStatus::Paused)
            | (ExecutionStatus::Running, ExecutionStatus::Completed)
            | (ExecutionStatus::Running, ExecutionStatus::Failed)
            | (ExecutionStatus::Running, ExecutionStatus::Cancelled)
            | (ExecutionStatus::Paused, ExecutionStatus::Running)
            | (ExecutionStatus::Paused, ExecutionStatus::Failed)
            | (ExecutionStatus::Paused, ExecutionStatus::Cancelled)
    )
}

/// Validate a run-level transition.
pub fn validate_execution_transition(
    from: ExecutionStatus,
    to: ExecutionStatus,
) -> Result<(), ExecutionError> {
    if can_transition_execution(from, to) {
        Ok(())
    } else {
        Err(ExecutionError::InvalidTransition {
            entity: "workflow".into(),
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}

/// Returns `true` if the node-level transition from `from` to `to` is valid.
///
/// `Failed -> Pending` is the retry path; `Pending -> Skipped` is the
/// suppressed-edge path.
#[must_use]
pub fn can_transition_node(from: NodeState, to: NodeState) -> bool {
    matches!(
        (from, to),
        (NodeState::Pending, NodeState::Running)
            | (NodeState::Pending, NodeState::Skipped)
            | (NodeState::Pending, NodeState::Cancelled)
            | (NodeState::Running, NodeState::Completed)
            | (NodeState::Running, NodeState::Failed)
            | (NodeState::Running, NodeState::Cancelled)
            | (NodeState::Failed, NodeState::Pending)
    )
}

/// Validate a node-level transition.
pub fn validate_node_transition(from: NodeState, to: NodeState) -> Result<(), ExecutionError> {
    if can_transition_node(from, to) {
        Ok(())
    } else {
        Err(ExecutionError::InvalidTransition {
            entity: "node".into(),
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ExecutionStatus::Created, ExecutionStatus::Running, true)]
    #[case(ExecutionStatus::Running, ExecutionStatus::Paused, true)]
    #[case(ExecutionStatus::Paused, ExecutionStatus::Running, true)]
    #[case(ExecutionStatus::Running, ExecutionStatus::Completed, true)]
    #[case(ExecutionStatus::Running, ExecutionStatus::Failed, true)]
    #[case(ExecutionStatus::Paused, ExecutionStatus::Failed, true)]
    #[case(ExecutionStatus::Running, ExecutionStatus::Cancelled, true)]
    #[case(ExecutionStatus::Paused, ExecutionStatus::Cancelled, true)]
    #[case(ExecutionStatus::Created, ExecutionStatus::Completed, false)]
    #[case(ExecutionStatus::Created, ExecutionStatus::Paused, false)]
    #[case(ExecutionStatus::Completed, ExecutionStatus::Running, false)]
    #[case(ExecutionStatus::Cancelled, ExecutionStatus::Running, false)]
    #[case(ExecutionStatus::Failed, ExecutionStatus::Running, false)]
    #[case(ExecutionStatus::Paused, ExecutionStatus::Completed, false)]
    fn execution_transition_table(
        #[case] from: ExecutionStatus,
        #[case] to: ExecutionStatus,
        #[case] valid: bool,
    ) {
        assert_eq!(can_transition_execution(from, to), valid);
        assert_eq!(validate_execution_transition(from, to).is_ok(), valid);
    }

    #[rstest]
    #[case(NodeState::Pending, NodeState::Running, true)]
    #[case(NodeState::Pending, NodeState::Skipped, true)]
    #[case(NodeState::Pending, NodeState::Cancelled, true)]
    #[case(NodeState::Running, NodeState::Completed, true)]
    #[case(NodeState::Running, NodeState::Failed, true)]
    #[case(NodeState::Running, NodeState::Cancelled, true)]
    #[case(NodeState::Failed, NodeState::Pending, true)]
    #[case(NodeState::Pending, NodeState::Completed, false)]
    #[case(NodeState::Completed, NodeState::Running, false)]
    #[case(NodeState::Skipped, NodeState::Running, false)]
    #[case(NodeState::Cancelled, NodeState::Pending, false)]
    #[case(NodeState::Failed, NodeState::Running, false)]
    #[case(NodeState::Running, NodeState::Skipped, false)]
    fn node_transition_table(
        #[case] from: NodeState,
        #[case] to: NodeState,
        #[case] valid: bool,
    ) {
        assert_eq!(can_transition_node(from, to), valid);
        assert_eq!(validate_node_transition(from, to).is_ok(), valid);
    }

    #[test]
    fn invalid_transition_error_names_states() {
        let err = validate_node_transition(NodeState::Completed, NodeState::Running).unwrap_err();
        assert_eq!(
            err.to_string(),
            "protocol violation: invalid node transition from completed to running"
        );
    }
}
