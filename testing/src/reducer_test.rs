//! Given-When-Then harness for reducers
//!
//! A test names a starting state, feeds it a script of actions, and checks
//! the state and effects that come out. Invariants that must hold after
//! every step (a derived count, an ordering rule) are registered once with
//! [`ReducerTest::then_every_state`] instead of being repeated per action.

#![allow(clippy::module_name_repetitions)] // ReducerTest is the natural name

use smallvec::SmallVec;
use tasklist_core::{effect::Effect, reducer::Reducer};

type StateCheck<S> = Box<dyn FnOnce(&S)>;
type InvariantCheck<S> = Box<dyn Fn(&S)>;
type EffectCheck<A> = Box<dyn FnOnce(&[Effect<A>])>;

/// Effects returned for one step of the script
type StepEffects<A> = SmallVec<[Effect<A>; 4]>;

/// Fluent reducer test
///
/// Actions queued with [`when_action`](Self::when_action) or
/// [`when_actions`](Self::when_actions) are reduced in order. State checks
/// see the final state, [`then_effects`](Self::then_effects) sees the
/// effects of the last step and [`then_step_effects`](Self::then_step_effects)
/// those of any earlier one.
///
/// # Example
///
/// ```ignore
/// use tasklist_testing::{assertions, ReducerTest};
///
/// ReducerTest::new(ListReducer::new())
///     .with_env(test_environment())
///     .given_state(ListState::ready(vec![]))
///     .when_actions([
///         ListAction::Add { title: "Buy milk".into() },
///         ListAction::ToggleDone { index: 0 },
///     ])
///     .then_every_state(|state| assert!(state.outstanding() <= state.items.len()))
///     .then_state(|state| assert_eq!(state.outstanding(), 0))
///     .then_step_effects(0, |effects| assertions::assert_future_effects(effects, 1))
///     .run();
/// ```
pub struct ReducerTest<R, S, A, E>
where
    R: Reducer<State = S, Action = A, Environment = E>,
{
    reducer: R,
    environment: Option<E>,
    given: Option<S>,
    script: Vec<A>,
    invariants: Vec<InvariantCheck<S>>,
    final_checks: Vec<StateCheck<S>>,
    effect_checks: Vec<(Option<usize>, EffectCheck<A>)>,
}

impl<R, S, A, E> ReducerTest<R, S, A, E>
where
    R: Reducer<State = S, Action = A, Environment = E>,
{
    /// Start a test for `reducer`
    #[must_use]
    pub const fn new(reducer: R) -> Self {
        Self {
            reducer,
            environment: None,
            given: None,
            script: Vec::new(),
            invariants: Vec::new(),
            final_checks: Vec::new(),
            effect_checks: Vec::new(),
        }
    }

    /// Environment handed to every step
    #[must_use]
    pub fn with_env(mut self, env: E) -> Self {
        self.environment = Some(env);
        self
    }

    /// Starting state (Given)
    #[must_use]
    pub fn given_state(mut self, state: S) -> Self {
        self.given = Some(state);
        self
    }

    /// Append one action to the script (When)
    #[must_use]
    pub fn when_action(mut self, action: A) -> Self {
        self.script.push(action);
        self
    }

    /// Append several actions to the script, in order
    #[must_use]
    pub fn when_actions<I>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = A>,
    {
        self.script.extend(actions);
        self
    }

    /// Check that runs after every step, including the last
    #[must_use]
    pub fn then_every_state<F>(mut self, check: F) -> Self
    where
        F: Fn(&S) + 'static,
    {
        self.invariants.push(Box::new(check));
        self
    }

    /// Check on the state after the whole script (Then)
    #[must_use]
    pub fn then_state<F>(mut self, check: F) -> Self
    where
        F: FnOnce(&S) + 'static,
    {
        self.final_checks.push(Box::new(check));
        self
    }

    /// Check on the effects of the last step (Then)
    #[must_use]
    pub fn then_effects<F>(mut self, check: F) -> Self
    where
        F: FnOnce(&[Effect<A>]) + 'static,
    {
        self.effect_checks.push((None, Box::new(check)));
        self
    }

    /// Check on the effects of step `step` (zero-based)
    #[must_use]
    pub fn then_step_effects<F>(mut self, step: usize, check: F) -> Self
    where
        F: FnOnce(&[Effect<A>]) + 'static,
    {
        self.effect_checks.push((Some(step), Box::new(check)));
        self
    }

    /// Reduce the script and run every check
    ///
    /// # Panics
    ///
    /// Panics if the state, environment or script is missing, if a step
    /// index is past the end of the script, or if any check fails.
    #[allow(clippy::panic)] // Test code can panic
    #[allow(clippy::expect_used)] // Test code can use expect
    pub fn run(self) {
        let mut state = self.given.expect("Starting state must be set with given_state()");
        let env = self.environment.expect("Environment must be set with with_env()");
        assert!(
            !self.script.is_empty(),
            "At least one action must be set with when_action()"
        );

        let mut steps: Vec<StepEffects<A>> = Vec::with_capacity(self.script.len());
        for action in self.script {
            steps.push(self.reducer.reduce(&mut state, action, &env));
            for invariant in &self.invariants {
                invariant(&state);
            }
        }

        for check in self.final_checks {
            check(&state);
        }

        let last = steps.len() - 1;
        for (step, check) in self.effect_checks {
            let step = step.unwrap_or(last);
            let effects = steps
                .get(step)
                .unwrap_or_else(|| panic!("Step {step} is past the end of a {}-step script", last + 1));
            check(effects);
        }
    }
}

/// Helper assertions for effects
pub mod assertions {
    use tasklist_core::effect::Effect;

    fn futures<A>(effects: &[Effect<A>]) -> usize {
        effects.iter().filter(|e| matches!(e, Effect::Future(_))).count()
    }

    /// Assert that nothing asynchronous was started
    ///
    /// # Panics
    ///
    /// Panics if any effect is not [`Effect::None`].
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_no_effects<A>(effects: &[Effect<A>]) {
        assert!(
            effects.iter().all(Effect::is_none),
            "Expected no effects, but found {}: {:?}",
            effects.len(),
            effects
        );
    }

    /// Assert the number of effects
    ///
    /// # Panics
    ///
    /// Panics if the number of effects doesn't match expected.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_effects_count<A>(effects: &[Effect<A>], expected: usize) {
        assert_eq!(
            effects.len(),
            expected,
            "Expected {expected} effects, but found {}",
            effects.len()
        );
    }

    /// Assert that at least one future was started
    ///
    /// # Panics
    ///
    /// Panics if no Future effect is found.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_has_future_effect<A>(effects: &[Effect<A>]) {
        assert!(futures(effects) > 0, "Expected at least one Future effect, but none found");
    }

    /// Assert exactly `expected` futures were started
    ///
    /// A mutation of the list should start one write; a no-op none.
    ///
    /// # Panics
    ///
    /// Panics if the number of Future effects differs.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_future_effects<A>(effects: &[Effect<A>], expected: usize) {
        let found = futures(effects);
        assert_eq!(found, expected, "Expected {expected} Future effects, but found {found}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    /// A checklist that only tracks counts
    #[derive(Clone, Debug, Default)]
    struct Checklist {
        open: usize,
        done: usize,
        saves: usize,
    }

    #[derive(Clone, Debug)]
    enum Step {
        Open,
        Finish,
        Save,
    }

    struct ChecklistReducer;

    impl Reducer for ChecklistReducer {
        type State = Checklist;
        type Action = Step;
        type Environment = ();

        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            _env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]> {
            match action {
                Step::Open => {
                    state.open += 1;
                    smallvec![Effect::future(async { Some(Step::Save) })]
                },
                Step::Finish if state.open > 0 => {
                    state.open -= 1;
                    state.done += 1;
                    smallvec![Effect::future(async { Some(Step::Save) })]
                },
                Step::Finish => SmallVec::new(),
                Step::Save => {
                    state.saves += 1;
                    smallvec![Effect::None]
                },
            }
        }
    }

    #[test]
    fn final_state_and_last_effects() {
        ReducerTest::new(ChecklistReducer)
            .with_env(())
            .given_state(Checklist::default())
            .when_action(Step::Open)
            .when_action(Step::Finish)
            .when_action(Step::Finish)
            .then_state(|state| {
                assert_eq!(state.open, 0);
                assert_eq!(state.done, 1);
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn effects_of_an_earlier_step() {
        ReducerTest::new(ChecklistReducer)
            .with_env(())
            .given_state(Checklist::default())
            .when_actions([Step::Open, Step::Open, Step::Save])
            .then_step_effects(0, |effects| assertions::assert_future_effects(effects, 1))
            .then_step_effects(1, assertions::assert_has_future_effect)
            .then_effects(|effects| {
                assertions::assert_effects_count(effects, 1);
                assertions::assert_future_effects(effects, 0);
            })
            .then_state(|state| assert_eq!(state.saves, 1))
            .run();
    }

    #[test]
    fn invariant_runs_after_every_step() {
        use std::cell::Cell;
        use std::rc::Rc;

        let seen = Rc::new(Cell::new(0));
        let counter = Rc::clone(&seen);
        ReducerTest::new(ChecklistReducer)
            .with_env(())
            .given_state(Checklist::default())
            .when_actions([Step::Open, Step::Open, Step::Finish, Step::Finish, Step::Finish])
            .then_every_state(move |state| {
                counter.set(counter.get() + 1);
                assert!(state.open + state.done <= 2);
            })
            .run();
        assert_eq!(seen.get(), 5);
    }

    #[test]
    #[should_panic(expected = "past the end")]
    fn step_past_the_script_is_reported() {
        ReducerTest::new(ChecklistReducer)
            .with_env(())
            .given_state(Checklist::default())
            .when_action(Step::Open)
            .then_step_effects(3, assertions::assert_no_effects)
            .run();
    }

    #[test]
    #[should_panic(expected = "Expected no effects")]
    fn pending_write_is_not_silent() {
        assertions::assert_no_effects::<Step>(&[Effect::future(async { None })]);
    }
}
