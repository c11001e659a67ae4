//! Configuration types for pipelines

use serde::{Deserialize, Serialize};

/// Move discipline of a [`Pipeline`](crate::pipe::Pipeline).
///
/// `err_on_move` decides what a moved-from pipeline does when pulled: yield
/// [`StreamError::UseAfterMove`](crate::error::StreamError::UseAfterMove) or
/// behave as an exhausted sequence. `move_on_chain` decides whether deriving
/// a pipeline hands the source to a fresh pipeline (leaving the original
/// inert) or retargets the original in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipeConfig {
    pub err_on_move: bool,
    pub move_on_chain: bool,
}

impl Default for PipeConfig {
    fn default() -> Self {
        Self {
            err_on_move: false,
            move_on_chain: true,
        }
    }
}

impl PipeConfig {
    pub fn with_err_on_move(mut self, on: bool) -> Self {
        self.err_on_move = on;
        self
    }

    pub fn with_move_on_chain(mut self, on: bool) -> Self {
        self.move_on_chain = on;
        self
    }
}
