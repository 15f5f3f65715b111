//! What to do with a freshly calculated batch.

use crate::errors::SyncErrorMap;
use crate::policy::RoundPolicy;

/// The orchestrator's next step after a calculation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundDecision {
    /// Work remains and the budget allows another round.
    Execute,
    /// No work and no failures: persist the batch watermark and stop.
    Finished,
    /// No work remains but failures are still recorded. Work disappeared
    /// while errors remained, which is an inconsistency.
    ErrorsWithoutWork,
    /// The round budget is spent with work or failures outstanding.
    BudgetExhausted,
}

/// Decide the next step.
///
/// `rounds_executed` counts rounds already run in this sync call. An empty
/// batch is honored even when the budget is spent, so a final round that
/// drains all work still finishes cleanly.
pub fn decide(
    remaining: usize,
    errors: &SyncErrorMap,
    rounds_executed: u32,
    policy: &RoundPolicy,
) -> RoundDecision {
    if remaining == 0 {
        if errors.is_empty() {
            RoundDecision::Finished
        } else {
            RoundDecision::ErrorsWithoutWork
        }
    } else if rounds_executed >= policy.max_rounds {
        RoundDecision::BudgetExhausted
    } else {
        RoundDecision::Execute
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filesync_types::{ExecuteWorkError, FileId};

    fn failing() -> SyncErrorMap {
        let mut map = SyncErrorMap::new();
        map.record(FileId::new(), ExecuteWorkError::FileNotFound);
        map
    }

    #[test]
    fn no_work_no_errors_finishes() {
        let policy = RoundPolicy::default();
        assert_eq!(
            decide(0, &SyncErrorMap::new(), 0, &policy),
            RoundDecision::Finished
        );
    }

    #[test]
    fn no_work_with_errors_is_inconsistent() {
        let policy = RoundPolicy::default();
        assert_eq!(
            decide(0, &failing(), 1, &policy),
            RoundDecision::ErrorsWithoutWork
        );
    }

    #[test]
    fn work_within_budget_executes() {
        let policy = RoundPolicy::new(2);
        assert_eq!(
            decide(3, &SyncErrorMap::new(), 1, &policy),
            RoundDecision::Execute
        );
    }

    #[test]
    fn work_past_budget_is_exhausted() {
        let policy = RoundPolicy::new(2);
        assert_eq!(
            decide(3, &failing(), 2, &policy),
            RoundDecision::BudgetExhausted
        );
        assert_eq!(
            decide(1, &SyncErrorMap::new(), 2, &policy),
            RoundDecision::BudgetExhausted
        );
    }

    #[test]
    fn drained_final_round_still_finishes() {
        let policy = RoundPolicy::new(2);
        assert_eq!(
            decide(0, &SyncErrorMap::new(), 2, &policy),
            RoundDecision::Finished
        );
    }
}
