//! Error types for grammar construction, compilation and parsing.

use thiserror::Error;

/// Misuse of the grammar construction API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GrammarError {
    #[error("forward reference `{0}` already has a target")]
    ForwardAlreadySet(String),

    #[error("`{0}` is not a forward reference")]
    NotForward(String),
}

/// Structural problems found while lowering a tree. Always fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("forward reference `{0}` was never given a target")]
    UnsetForward(String),

    #[error("choice `{0}` has no alternatives")]
    EmptyChoice(String),

    #[error("jump from {from} to {to} does not fit in a 24-bit operand")]
    JumpOutOfRange { from: usize, to: usize },

    #[error("{0} table exceeds the 24-bit operand range")]
    TableOverflow(&'static str),
}

/// A parse that did not match.
///
/// `pos` is where the cursor ended up, which after the local rewinds is the
/// position the parse was started from. `error_pos` is the input position the
/// diagnostic talks about.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct Failure {
    pub message: String,
    pub pos: usize,
    pub error_pos: usize,
}
