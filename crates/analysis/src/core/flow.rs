use serde::Serialize;
use std::fmt;
use tracing::{debug, warn};

/// Stage of a single analysis round trip.
///
/// A call only moves forward: `Built → Rendered → Dispatched → Validated → Done`,
/// or ends in `Failed` straight after `Built` (bad input) or `Dispatched`
/// (transport or service failure).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowState {
    Built,
    Rendered,
    Dispatched,
    Validated,
    Done,
    Failed,
}

impl FlowState {
    pub fn can_transition_to(self, next: FlowState) -> bool {
        use FlowState::*;
        matches!(
            (self, next),
            (Built, Rendered)
                | (Built, Failed)
                | (Rendered, Dispatched)
                | (Dispatched, Validated)
                | (Dispatched, Failed)
                | (Validated, Done)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, FlowState::Done | FlowState::Failed)
    }
}

impl fmt::Display for FlowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Built => "Built",
            Self::Rendered => "Rendered",
            Self::Dispatched => "Dispatched",
            Self::Validated => "Validated",
            Self::Done => "Done",
            Self::Failed => "Failed",
        };
        write!(f, "{}", name)
    }
}

/// States visited by one call, in order.
#[derive(Debug, Clone)]
pub struct FlowTrace {
    states: Vec<FlowState>,
}

impl Default for FlowTrace {
    fn default() -> Self {
        Self::new()
    }
}

impl FlowTrace {
    pub fn new() -> Self {
        Self {
            states: vec![FlowState::Built],
        }
    }

    pub fn current(&self) -> FlowState {
        self.states
            .last()
            .copied()
            .unwrap_or(FlowState::Built)
    }

    /// Moves to `next` if the transition table allows it; returns whether it moved.
    pub fn advance(&mut self, next: FlowState) -> bool {
        let current = self.current();
        if !current.can_transition_to(next) {
            warn!("Refusing flow transition {} -> {}", current, next);
            return false;
        }

        debug!("Flow {} -> {}", current, next);
        self.states.push(next);
        true
    }

    pub fn states(&self) -> &[FlowState] {
        &self.states
    }

    pub fn into_states(self) -> Vec<FlowState> {
        self.states
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let mut trace = FlowTrace::new();
        assert!(trace.advance(FlowState::Rendered));
        assert!(trace.advance(FlowState::Dispatched));
        assert!(trace.advance(FlowState::Validated));
        assert!(trace.advance(FlowState::Done));

        assert_eq!(
            trace.states(),
            &[
                FlowState::Built,
                FlowState::Rendered,
                FlowState::Dispatched,
                FlowState::Validated,
                FlowState::Done
            ]
        );
        assert!(trace.current().is_terminal());
    }

    #[test]
    fn test_failure_paths() {
        let mut early = FlowTrace::new();
        assert!(early.advance(FlowState::Failed));

        let mut late = FlowTrace::new();
        late.advance(FlowState::Rendered);
        late.advance(FlowState::Dispatched);
        assert!(late.advance(FlowState::Failed));
    }

    #[test]
    fn test_no_reentry_or_skipping() {
        let mut trace = FlowTrace::new();
        assert!(!trace.advance(FlowState::Dispatched));
        trace.advance(FlowState::Rendered);
        assert!(!trace.advance(FlowState::Built));
        assert!(!trace.advance(FlowState::Failed));

        trace.advance(FlowState::Dispatched);
        trace.advance(FlowState::Validated);
        trace.advance(FlowState::Done);
        assert!(!trace.advance(FlowState::Failed));
        assert_eq!(trace.current(), FlowState::Done);
    }
}
