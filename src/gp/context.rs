//! The activation record used while evaluating a tree.

use super::subroutine::SubroutineRegistry;
use super::value::{Value, Variable};
use crate::config::EvaluationConfig;
use tracing::trace;

/// The cooperative control flag checked before every node runs.
///
/// Every status other than `Evaluating` is terminal for the current frame: nodes visited
/// afterwards return their type default without doing anything. `BreakCalled` and
/// `ContinueCalled` may be cleared again by the nearest enclosing `Repeat`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum EvaluationStatus {
    Evaluating,
    ValueReturned,
    BreakCalled,
    ContinueCalled,
    InvalidLeftHandValue,
    InvalidReference,
    InvalidValue,
    StepsExceeded,
    StackExceeded,
}

/// Step and call-depth counters shared by every frame of one top-level evaluation.
#[derive(Clone, Debug)]
pub struct Resources {
    steps: u64,
    max_steps: u64,
    depth: usize,
    max_depth: usize,
}

/// One frame: argument and local-variable tables plus the frame's status.
pub struct EvaluationContext<'a> {
    arguments: Vec<Variable>,
    local_variables: Vec<Variable>,
    status: EvaluationStatus,
    return_value: Option<Value>,
    resources: &'a mut Resources,
    registry: &'a SubroutineRegistry,
}

impl EvaluationStatus {
    /// Whether the status reports a fault rather than control flow.
    pub fn is_fault(self) -> bool {
        match self {
            EvaluationStatus::Evaluating
            | EvaluationStatus::ValueReturned
            | EvaluationStatus::BreakCalled
            | EvaluationStatus::ContinueCalled => false,
            _ => true,
        }
    }
}

impl Resources {
    pub fn new(config: &EvaluationConfig) -> Self {
        Resources {
            steps: 0,
            max_steps: config.max_steps,
            depth: 0,
            max_depth: config.max_stack_depth,
        }
    }

    /// Node evaluations performed so far.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Current subroutine nesting.
    pub fn depth(&self) -> usize {
        self.depth
    }

    fn step(&mut self) -> bool {
        if self.steps >= self.max_steps {
            return false;
        }
        self.steps += 1;
        true
    }

    fn push_frame(&mut self) -> bool {
        if self.depth >= self.max_depth {
            return false;
        }
        self.depth += 1;
        true
    }

    fn pop_frame(&mut self) {
        debug_assert!(self.depth > 0, "popped more frames than were pushed");
        self.depth = self.depth.saturating_sub(1);
    }
}

impl<'a> EvaluationContext<'a> {
    pub fn new(
        arguments: Vec<Variable>,
        local_variables: Vec<Variable>,
        resources: &'a mut Resources,
        registry: &'a SubroutineRegistry,
    ) -> Self {
        EvaluationContext {
            arguments,
            local_variables,
            status: EvaluationStatus::Evaluating,
            return_value: None,
            resources,
            registry,
        }
    }

    /// A frame for a subroutine call, sharing this frame's resources and registry.
    pub fn nested(
        &mut self,
        arguments: Vec<Variable>,
        local_variables: Vec<Variable>,
    ) -> EvaluationContext<'_> {
        EvaluationContext::new(arguments, local_variables, &mut *self.resources, self.registry)
    }

    pub fn status(&self) -> EvaluationStatus {
        self.status
    }

    pub fn is_evaluating(&self) -> bool {
        self.status == EvaluationStatus::Evaluating
    }

    /// Leave `Evaluating` with `status`. Has no effect once the frame is already in a
    /// terminal status.
    pub fn signal(&mut self, status: EvaluationStatus) {
        if self.is_evaluating() {
            if status.is_fault() {
                trace!(?status, "evaluation fault");
            }
            self.status = status;
        }
    }

    /// Clear a `BreakCalled` or `ContinueCalled` status.
    pub(crate) fn resume(&mut self) {
        debug_assert!(
            self.status == EvaluationStatus::BreakCalled
                || self.status == EvaluationStatus::ContinueCalled
        );
        self.status = EvaluationStatus::Evaluating;
    }

    /// Called on entry to every node. Returns `true` when the node may run.
    pub(crate) fn enter(&mut self) -> bool {
        if !self.is_evaluating() {
            return false;
        }
        if !self.resources.step() {
            self.status = EvaluationStatus::StepsExceeded;
            return false;
        }
        true
    }

    pub(crate) fn push_frame(&mut self) -> bool {
        if self.resources.push_frame() {
            true
        } else {
            self.signal(EvaluationStatus::StackExceeded);
            false
        }
    }

    pub(crate) fn pop_frame(&mut self) {
        self.resources.pop_frame();
    }

    /// Record `value` as the frame's result and stop evaluating.
    pub fn return_with(&mut self, value: Value) {
        if self.is_evaluating() {
            self.return_value = Some(value);
            self.status = EvaluationStatus::ValueReturned;
        }
    }

    pub fn return_value(&self) -> Option<&Value> {
        self.return_value.as_ref()
    }

    pub fn take_return_value(&mut self) -> Option<Value> {
        self.return_value.take()
    }

    pub fn argument(&self, index: usize) -> Option<&Variable> {
        self.arguments.get(index)
    }

    pub fn local_variable(&self, index: usize) -> Option<&Variable> {
        self.local_variables.get(index)
    }

    pub fn resources(&self) -> &Resources {
        &*self.resources
    }

    pub fn registry(&self) -> &'a SubroutineRegistry {
        self.registry
    }
}
