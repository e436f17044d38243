//! Complete grammars built from the prelude, used by the CLI and the
//! fixture tests.

pub mod arith;
pub mod json;
