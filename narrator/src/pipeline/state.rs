//! Pipeline lifecycle and the report produced by a finished run.

use std::fmt;
use std::path::PathBuf;

/// Where a document pipeline currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineState {
    Init,
    Chunking,
    Synthesizing,
    Merging,
    Done,
    Failed,
}

impl PipelineState {
    /// Whether the state machine may move from `self` to `next`.
    ///
    /// Any non-terminal state may fail; `Done` and `Failed` are terminal.
    pub fn can_transition_to(self, next: PipelineState) -> bool {
        use PipelineState::*;
        matches!(
            (self, next),
            (Init, Chunking) | (Chunking, Synthesizing) | (Synthesizing, Merging) | (Merging, Done)
        ) || (next == Failed && !self.is_terminal())
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Failed)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Init => "init",
            PipelineState::Chunking => "chunking",
            PipelineState::Synthesizing => "synthesizing",
            PipelineState::Merging => "merging",
            PipelineState::Done => "done",
            PipelineState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Summary of a successfully narrated document.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineReport {
    pub document_id: String,
    /// The merged WAV file
    pub output: PathBuf,
    pub total_chunks: usize,
    /// Chunks sent to the model during this run
    pub synthesized: usize,
    /// Chunks already completed by an earlier run
    pub skipped: usize,
    /// Chunks holding a single sentence over the bounds
    pub oversized: usize,
    /// Length of the merged audio
    pub duration_ms: u64,
    pub final_state: PipelineState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions() {
        use PipelineState::*;
        assert!(Init.can_transition_to(Chunking));
        assert!(Chunking.can_transition_to(Synthesizing));
        assert!(Synthesizing.can_transition_to(Merging));
        assert!(Merging.can_transition_to(Done));

        assert!(!Init.can_transition_to(Merging));
        assert!(!Merging.can_transition_to(Synthesizing));
        assert!(!Done.can_transition_to(Chunking));
    }

    #[test]
    fn test_failure_only_from_live_states() {
        use PipelineState::*;
        for state in [Init, Chunking, Synthesizing, Merging] {
            assert!(state.can_transition_to(Failed));
        }
        assert!(!Done.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Failed));
    }

    #[test]
    fn test_display() {
        assert_eq!(PipelineState::Synthesizing.to_string(), "synthesizing");
    }
}
