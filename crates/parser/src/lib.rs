//! Weft Parser
//!
//! Parser combinators compiled to bytecode for a backtracking VM.
//!
//! # Overview
//!
//! Grammars are trees of small parsers (char tests, literals) composed with
//! combinators (sequence, choice, repetition, transforms, forward references
//! for recursion). A tree is built once in a `bumpalo` arena, optimized,
//! compiled to a [`Program`], and the program is then run over any number of
//! inputs.
//!
//! # Example
//!
//! ```
//! use bumpalo::Bump;
//! use weft_parser::{compile, Grammar, Value};
//!
//! let arena = Bump::new();
//! let g = Grammar::new(&arena);
//! let list = g.between(g.sep_by(g.integer(), g.char(',')), g.char('|'));
//! let program = compile(&arena, list).unwrap();
//!
//! let m = program.parse("|1,-2,3|").unwrap();
//! assert_eq!(m.value, Value::List(vec![Value::Int(1), Value::Int(-2), Value::Int(3)]));
//! assert_eq!(m.end, 8);
//! ```
//!
//! # Public API
//!
//! - [`Grammar`] - Tree construction, including the prelude primitives
//! - [`compile`] / [`Compiler`] - Optimize and lower a tree to a [`Program`]
//! - [`Program::parse`] - Run a program, yielding a [`Match`] or a [`Failure`]
//! - [`format_tree`] / [`Program::dump`] - Debug output
//!
//! # Debugging
//!
//! Set `DEBUG=compiler,optimizer,vm` (or `DEBUG=*`) to log from those
//! stages, and `DEBUG_VERBOSITY=3` for an instruction trace from the VM.

mod builder;
mod error;
pub mod format;
pub mod grammars;
mod node;
pub mod optimizer;
pub mod parser_vm;
mod prelude;
mod value;

// Re-export from weft-common
pub use common::debug;
pub use common::{create_logger, Logger, SourceLoc, SourceModule};

// Re-export public types
pub use builder::{Grammar, P};
pub use error::{CompileError, Failure, GrammarError};
pub use format::format_tree;
pub use node::{LiftFn, MapFn, Node, NodeId, NodeKind, SugarKind};
pub use optimizer::optimize;
pub use parser_vm::{compile, CharSet, Compiler, Match, Program, ScanSet};
pub use value::{Const, Value};
