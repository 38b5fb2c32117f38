use super::{MigrationPlan, PlanResult, TransitionStep};
use crate::core::PlanIntegrityError;
use crate::storage::TransactionalStore;
use std::collections::BTreeMap;
use std::sync::Arc;

pub type StepFactory<S> = Arc<dyn Fn() -> Arc<dyn TransitionStep<S>> + Send + Sync>;

/// Named step factories, resolved when a plan is built.
///
/// Lets plans be assembled from data (a list of labels, the versions of
/// installed components) instead of code, without runtime type lookup.
pub struct StepRegistry<S: TransactionalStore> {
    factories: BTreeMap<String, StepFactory<S>>,
}

impl<S: TransactionalStore> Default for StepRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: TransactionalStore> StepRegistry<S> {
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Registers a factory; a second registration under the same name wins.
    pub fn register<F, T>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> T + Send + Sync + 'static,
        T: TransitionStep<S> + 'static,
    {
        self.factories.insert(
            name.into(),
            Arc::new(move || Arc::new(factory()) as Arc<dyn TransitionStep<S>>),
        );
    }

    /// Registers one shared step instance.
    pub fn register_shared(&mut self, name: impl Into<String>, step: Arc<dyn TransitionStep<S>>) {
        self.factories
            .insert(name.into(), Arc::new(move || Arc::clone(&step)));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered step names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    pub fn resolve(&self, name: &str) -> PlanResult<Arc<dyn TransitionStep<S>>> {
        self.factories
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| PlanIntegrityError::UnknownStep(name.to_string()))
    }

    /// Builds and validates a plan from `(target state, step name)` pairs.
    pub fn build_plan(
        &self,
        plan_name: impl Into<String>,
        initial_state: impl Into<String>,
        chain: &[(&str, &str)],
    ) -> PlanResult<MigrationPlan<S>> {
        let mut plan = MigrationPlan::new(plan_name).from(initial_state);
        for (target, step_name) in chain {
            plan = plan.to_step(*target, self.resolve(step_name)?);
        }
        plan.validate()?;
        Ok(plan)
    }

    /// Builds a plan whose targets are also the step names, e.g. one step
    /// per released component version.
    pub fn build_linear_plan<I, L>(
        &self,
        plan_name: impl Into<String>,
        initial_state: impl Into<String>,
        labels: I,
    ) -> PlanResult<MigrationPlan<S>>
    where
        I: IntoIterator<Item = L>,
        L: AsRef<str>,
    {
        let labels: Vec<L> = labels.into_iter().collect();
        let chain: Vec<(&str, &str)> = labels
            .iter()
            .map(|label| (label.as_ref(), label.as_ref()))
            .collect();
        self.build_plan(plan_name, initial_state, &chain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{FnStep, NoopStep};
    use crate::storage::MemoryStore;

    fn registry() -> StepRegistry<MemoryStore> {
        let mut registry = StepRegistry::new();
        registry.register("noop", || NoopStep);
        registry.register("create-users", || {
            FnStep::<MemoryStore>::new("create-users", |tx| {
                tx.create_table_if_not_exists("users", vec![])?;
                Ok(())
            })
        });
        registry
    }

    #[test]
    fn test_build_plan_resolves_steps() {
        let plan = registry()
            .build_plan("core", "", &[("1.0", "create-users"), ("1.1", "noop")])
            .unwrap();
        assert_eq!(plan.final_state(), "1.1");
        assert_eq!(plan.transitions()[0].step_name(), "create-users");
        assert_eq!(plan.transitions()[1].step_name(), "NoopStep");
    }

    #[test]
    fn test_unknown_step_is_integrity_error() {
        let err = registry()
            .build_plan("core", "", &[("1.0", "missing")])
            .unwrap_err();
        assert_eq!(err, PlanIntegrityError::UnknownStep("missing".into()));
    }

    #[test]
    fn test_build_plan_validates_chain() {
        let err = registry()
            .build_plan("core", "", &[("1.0", "noop"), ("1.0", "noop")])
            .unwrap_err();
        assert_eq!(err, PlanIntegrityError::DuplicateTargetState("1.0".into()));
    }

    #[test]
    fn test_linear_plan_and_names() {
        let mut registry = registry();
        registry.register_shared("2.0", Arc::new(NoopStep));
        registry.register("2.1", || NoopStep);
        assert_eq!(registry.names(), vec!["2.0", "2.1", "create-users", "noop"]);

        let plan = registry.build_linear_plan("forms", "1.9", ["2.0", "2.1"]).unwrap();
        assert_eq!(plan.initial_state(), "1.9");
        assert_eq!(plan.pending_from("1.9").unwrap(), vec!["2.0", "2.1"]);
    }
}
