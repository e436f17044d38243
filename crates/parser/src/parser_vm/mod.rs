//! Parsing Virtual Machine
//!
//! Combinator trees compile to bytecode which a backtracking VM executes
//! with explicit position and accumulator stacks.
//!
//! # Architecture
//!
//! The compiler lowers each node to a self-contained fragment whose jumps
//! are relative, so a Forward's target is compiled once, in place, and that
//! range doubles as the sub-program later references call into.
//!
//! # Instruction Encoding
//!
//! Instructions are 32-bit words: 8-bit opcode + 24-bit operand.

mod charset;
mod compiler;
pub mod instruction;
mod program;
mod vm;

// Re-export public types
pub use charset::{CharSet, ScanSet};
pub use compiler::{compile, Compiler};
pub use instruction::{encode, encode_signed, op, opcode, operand, operand_signed};
pub use program::{Arity, ForwardEntry, LiteralEntry, Match, Program, ScannerEntry, SetEntry};
pub use vm::{Diagnostic, MAX_DEPTH, VM};
