use super::{MigrationPlan, PlanResult};
use crate::core::PlanIntegrityError;
use crate::storage::TransactionalStore;
use std::collections::HashSet;

impl<S: TransactionalStore> MigrationPlan<S> {
    /// Validates the integrity of the plan.
    ///
    /// Checks for:
    /// - a non-empty plan name,
    /// - non-empty target labels,
    /// - an unbroken chain starting at the initial state,
    /// - unique target labels (a target equal to the initial state or an
    ///   earlier target would close a cycle).
    ///
    /// Pure: never touches a store.
    pub fn validate(&self) -> PlanResult<()> {
        if self.name.trim().is_empty() {
            return Err(PlanIntegrityError::EmptyPlanName);
        }

        let mut seen = HashSet::<&str>::new();
        seen.insert(self.initial_state.as_str());

        let mut expected = self.initial_state.as_str();
        for (index, transition) in self.transitions.iter().enumerate() {
            if transition.to.is_empty() {
                return Err(PlanIntegrityError::EmptyTargetState { index });
            }
            if transition.from != expected {
                return Err(PlanIntegrityError::BrokenChain {
                    index,
                    expected: expected.to_string(),
                    found: transition.from.clone(),
                });
            }
            if !seen.insert(transition.to.as_str()) {
                return Err(PlanIntegrityError::DuplicateTargetState(
                    transition.to.clone(),
                ));
            }
            expected = transition.to.as_str();
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::core::PlanIntegrityError;
    use crate::plan::{MigrationPlan, NoopStep, Transition};
    use crate::storage::MemoryStore;
    use std::sync::Arc;

    type Plan = MigrationPlan<MemoryStore>;

    #[test]
    fn test_valid_chain() {
        let plan = Plan::new("ok").from("").to("a", NoopStep).to("b", NoopStep);
        assert!(plan.validate().is_ok());
        assert!(Plan::new("empty").validate().is_ok());
    }

    #[test]
    fn test_rejects_empty_name() {
        assert_eq!(
            Plan::new("  ").validate().unwrap_err(),
            PlanIntegrityError::EmptyPlanName
        );
    }

    #[test]
    fn test_rejects_empty_target() {
        let plan = Plan::new("p").to("a", NoopStep).to("", NoopStep);
        assert_eq!(
            plan.validate().unwrap_err(),
            PlanIntegrityError::EmptyTargetState { index: 1 }
        );
    }

    #[test]
    fn test_rejects_broken_chain() {
        let plan = Plan::new("p")
            .to("a", NoopStep)
            .from("x")
            .to("b", NoopStep);
        assert_eq!(
            plan.validate().unwrap_err(),
            PlanIntegrityError::BrokenChain {
                index: 1,
                expected: "a".into(),
                found: "x".into()
            }
        );

        let mut generated = Plan::new("g").from("v1");
        generated.add_transition(Transition::new("v0", "v2", Arc::new(NoopStep)));
        assert!(matches!(
            generated.validate().unwrap_err(),
            PlanIntegrityError::BrokenChain { index: 0, .. }
        ));
    }

    #[test]
    fn test_rejects_duplicate_targets_and_cycles() {
        let duplicate = Plan::new("p")
            .to("a", NoopStep)
            .to("b", NoopStep)
            .to("a", NoopStep);
        assert_eq!(
            duplicate.validate().unwrap_err(),
            PlanIntegrityError::DuplicateTargetState("a".into())
        );

        let back_to_start = Plan::new("p").from("v1").to("v2", NoopStep).to("v1", NoopStep);
        assert_eq!(
            back_to_start.validate().unwrap_err(),
            PlanIntegrityError::DuplicateTargetState("v1".into())
        );
    }
}
