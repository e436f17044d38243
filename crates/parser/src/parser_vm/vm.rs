//! Parsing Virtual Machine execution.
//!
//! One call of [`VM::run`] executes a code range with its own position and
//! accumulator stacks. The register holds the status of the last fragment:
//! its value on success, a lazily rendered [`Diagnostic`] on failure.

use std::mem;
use std::ops::Range;

use common::debug::{create_logger, forced_logger, Logger};
use common::{log, log_detail, log_fail, log_trace};

use crate::value::Value;

use super::instruction::{name, op, opcode, operand, target};
use super::program::Program;

/// Nesting limit for Forward calls. Exceeding it fails the parse instead of
/// overflowing the native stack on runaway (e.g. left) recursion.
pub const MAX_DEPTH: usize = 1_000;

/// Why a fragment failed. Rendered to text only when a failure reaches the
/// caller.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// A labelled test (scan set, explicit FAIL) did not match
    Expected { label: u32, pos: usize, found: Option<char> },
    /// A literal mismatched at `pos`
    ExpectedChar { expected: char, pos: usize, found: Option<char> },
    /// Input left over where the end was required
    EndOfInput { pos: usize, found: char },
    /// Too few repetitions
    AtLeast { min: u32, label: u32, pos: usize },
    /// A transform rejected its input
    Message { text: String, pos: usize },
    DepthExceeded { pos: usize },
}

fn got(found: Option<char>) -> String {
    match found {
        Some(c) => c.to_string(),
        None => "nothing".to_string(),
    }
}

impl Diagnostic {
    /// Message text and the input position it refers to.
    pub fn render(&self, program: &Program) -> (String, usize) {
        match self {
            Diagnostic::Expected { label, pos, found } => (
                format!("Expected {} at {}. Got {} instead.", program.label(*label), pos, got(*found)),
                *pos,
            ),
            Diagnostic::ExpectedChar { expected, pos, found } => (
                format!("Expected {} at {}. Got {} instead.", expected, pos, got(*found)),
                *pos,
            ),
            Diagnostic::EndOfInput { pos, found } => {
                (format!("Expected end of input at {}. Got {} instead.", pos, found), *pos)
            }
            Diagnostic::AtLeast { min, label, pos } => (
                format!("Expected at least {} {} at {}.", min, program.label(*label), pos),
                *pos,
            ),
            Diagnostic::Message { text, pos } => (text.clone(), *pos),
            Diagnostic::DepthExceeded { pos } => {
                (format!("Recursion limit of {} exceeded at {}.", MAX_DEPTH, pos), *pos)
            }
        }
    }
}

type Register = Result<Value, Diagnostic>;

#[inline]
fn fold_case(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

/// Parsing Virtual Machine
pub struct VM<'p, 'a> {
    // Bytecode
    program: &'p Program<'a>,

    // Input
    input: &'p [char],
    pub pos: usize,

    // Forward nesting
    depth: usize,

    // Logger
    log: Logger,
}

impl<'p, 'a> VM<'p, 'a> {
    pub fn new(program: &'p Program<'a>, input: &'p [char], pos: usize) -> Self {
        let log = if program.trace { forced_logger("vm") } else { create_logger("vm") };
        Self { program, input, pos, depth: 0, log }
    }

    // -------------------------------------------------------------------------
    // Input Navigation
    // -------------------------------------------------------------------------

    /// Char under the cursor; `None` is the end-of-input sentinel.
    #[inline]
    fn peek(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    // -------------------------------------------------------------------------
    // Matching
    // -------------------------------------------------------------------------

    fn any_char(&mut self, id: u32) -> Register {
        let entry = &self.program.sets[id as usize];
        match entry.set.match_at(self.input, self.pos) {
            Some((c, len)) => {
                self.pos += len;
                Ok(Value::Char(c))
            }
            None => Err(Diagnostic::Expected { label: entry.label, pos: self.pos, found: self.peek() }),
        }
    }

    /// LITERAL and KEYWORD. The cursor only moves on a full match.
    fn literal(&mut self, id: u32) -> Register {
        let lit = &self.program.literals[id as usize];
        let start = self.pos;
        for (i, &expected) in lit.text.iter().enumerate() {
            let found = self.input.get(start + i).copied();
            let matched = match found {
                Some(c) if lit.ignore_case => fold_case(c) == expected,
                Some(c) => c == expected,
                None => false,
            };
            if !matched {
                return Err(Diagnostic::ExpectedChar { expected, pos: start + i, found });
            }
        }
        self.pos = start + lit.text.len();
        Ok(self.program.values[lit.value as usize].clone())
    }

    fn scan(&mut self, id: u32) -> Register {
        let entry = &self.program.scanners[id as usize];
        let start = self.pos;
        let mut items = Vec::new();
        while let Some((c, len)) = entry.set.match_at(self.input, self.pos) {
            items.push(Value::Char(c));
            self.pos += len;
        }
        if items.len() as u64 >= entry.min as u64 {
            Ok(Value::List(items))
        } else {
            self.pos = start;
            Err(Diagnostic::AtLeast { min: entry.min, label: entry.label, pos: start })
        }
    }

    fn end_of_input(&self) -> Register {
        match self.peek() {
            None => Ok(Value::Null),
            Some(found) => Err(Diagnostic::EndOfInput { pos: self.pos, found }),
        }
    }

    // -------------------------------------------------------------------------
    // Recursion
    // -------------------------------------------------------------------------

    /// Run a Forward's sub-program with fresh stacks. The cursor is restored
    /// if it fails.
    fn call(&mut self, id: u32) -> Register {
        let program = self.program;
        let fwd = &program.forwards[id as usize];
        if self.depth >= MAX_DEPTH {
            log_fail!(self.log, "recursion limit hit in {} at {}", program.label(fwd.label), self.pos);
            return Err(Diagnostic::DepthExceeded { pos: self.pos });
        }

        let saved = self.pos;
        log_detail!(self.log, "-> {} at {}", program.label(fwd.label), self.pos);
        self.log.push_indent();
        self.depth += 1;
        let result = self.run(fwd.code.clone());
        self.depth -= 1;
        self.log.pop_indent();

        if result.is_err() {
            self.pos = saved;
        }
        log_detail!(
            self.log,
            "<- {} {} at {}",
            program.label(fwd.label),
            if result.is_ok() { "ok" } else { "failed" },
            self.pos
        );
        result
    }

    // -------------------------------------------------------------------------
    // Execution
    // -------------------------------------------------------------------------

    /// Execute `range`. Returns the register when the instruction pointer
    /// leaves the range.
    pub fn run(&mut self, range: Range<usize>) -> Register {
        let program = self.program;
        let code = &program.code;
        let mut positions: Vec<usize> = Vec::new();
        let mut accumulators: Vec<Vec<Value>> = Vec::new();
        let mut reg: Register = Ok(Value::Null);
        let mut pc = range.start;

        while pc < range.end {
            let instr = code[pc];
            let oper = operand(instr);
            log_trace!(self.log, "{:4}: {:<16} pos={}", pc, name(opcode(instr)), self.pos);

            match opcode(instr) {
                op::ANY_CHAR => reg = self.any_char(oper),
                op::LITERAL | op::KEYWORD => reg = self.literal(oper),
                op::SCAN => reg = self.scan(oper),
                op::EOF => reg = self.end_of_input(),

                op::JUMP => {
                    pc = target(pc, instr);
                    continue;
                }
                op::JUMP_IF_SUCCESS => {
                    if reg.is_ok() {
                        pc = target(pc, instr);
                        continue;
                    }
                }
                op::JUMP_IF_FAILURE => {
                    if reg.is_err() {
                        pc = target(pc, instr);
                        continue;
                    }
                }
                op::LOOP => {
                    // Go around again only if the body consumed input
                    let start = positions.pop();
                    if start.is_some_and(|start| self.pos > start) {
                        pc = target(pc, instr);
                        continue;
                    }
                }

                op::PUSH_POS => positions.push(self.pos),
                op::CLEAR_POS => {
                    positions.pop();
                }
                op::POP_POS => {
                    if let Some(saved) = positions.pop() {
                        self.pos = saved;
                    }
                }
                op::POP_PUSH_POS => {
                    if let Some(&saved) = positions.last() {
                        self.pos = saved;
                    }
                }

                op::CREATE_ACC => accumulators.push(Vec::new()),
                op::DELETE_ACC => {
                    accumulators.pop();
                }
                op::PUSH => {
                    if let (Some(acc), Ok(value)) = (accumulators.last_mut(), reg.as_mut()) {
                        acc.push(mem::take(value));
                    }
                }
                op::POP => {
                    reg = Ok(accumulators.last_mut().and_then(Vec::pop).unwrap_or_default());
                }
                op::LOAD_ACC => {
                    let items = accumulators.pop().unwrap_or_default();
                    let arity = &program.arities[oper as usize];
                    reg = if items.len() as u64 >= arity.min as u64 {
                        Ok(Value::List(items))
                    } else {
                        Err(Diagnostic::AtLeast { min: arity.min, label: arity.label, pos: self.pos })
                    };
                }

                op::MAP => {
                    if let Ok(value) = reg.as_mut() {
                        let func = program.maps[oper as usize];
                        let pos = self.pos;
                        reg = func(mem::take(value)).map_err(|text| Diagnostic::Message { text, pos });
                    }
                }
                op::LIFT => {
                    if let Ok(value) = reg.as_mut() {
                        let func = program.lifts[oper as usize];
                        let args = mem::take(value).into_list().unwrap_or_default();
                        let pos = self.pos;
                        reg = func(args).map_err(|text| Diagnostic::Message { text, pos });
                    }
                }
                op::OPT => {
                    if reg.is_err() {
                        reg = Ok(program.values[oper as usize].clone());
                    }
                }
                op::FAIL => {
                    reg = Err(Diagnostic::Expected { label: oper, pos: self.pos, found: self.peek() });
                }

                op::FORWARD => reg = self.call(oper),

                op::PRINT => {
                    log!(self.log, "{} at {}", program.label(oper), self.pos);
                }

                // Programs come from the compiler, which only emits known opcodes
                _ => {}
            }
            pc += 1;
        }

        reg
    }
}
