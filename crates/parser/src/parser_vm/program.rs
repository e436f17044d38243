//! Compiled program: bytecode plus its constant tables.

use std::io::Write;
use std::ops::Range;

use hashbrown::HashMap;

use crate::error::{CompileError, Failure};
use crate::node::{LiftFn, MapFn};
use crate::value::Value;

use super::charset::ScanSet;
use super::instruction::{
    encode, encode_signed, is_jump, jump_offset, name, op, opcode, operand, target, MAX_OPERAND,
};
use super::vm::VM;

/// Scan set table entry
pub struct SetEntry<'a> {
    pub set: ScanSet<'a>,
    pub label: u32,
}

/// Literal and keyword table entry
pub struct LiteralEntry {
    /// Expected chars, already lower-cased when `ignore_case` is set
    pub text: Vec<char>,
    pub ignore_case: bool,
    /// Value produced on success (index into `values`)
    pub value: u32,
}

/// Scanner table entry
pub struct ScannerEntry<'a> {
    pub set: ScanSet<'a>,
    pub min: u32,
    pub label: u32,
}

/// Minimum item count for LOAD_ACC
pub struct Arity {
    pub min: u32,
    pub label: u32,
}

/// Sub-program of a Forward: the code range its target was compiled to
pub struct ForwardEntry {
    pub code: Range<usize>,
    pub label: u32,
}

/// A compiled grammar, ready to parse.
///
/// Immutable once compiled; every parse runs a fresh [`VM`] over it.
pub struct Program<'a> {
    /// Bytecode buffer
    pub code: Vec<u32>,

    /// Range of the root program within `code`
    pub entry: Range<usize>,

    pub sets: Vec<SetEntry<'a>>,
    pub literals: Vec<LiteralEntry>,
    pub scanners: Vec<ScannerEntry<'a>>,
    pub arities: Vec<Arity>,
    pub values: Vec<Value>,
    pub labels: Vec<String>,
    pub maps: Vec<MapFn<'a>>,
    pub lifts: Vec<LiftFn<'a>>,
    pub forwards: Vec<ForwardEntry>,

    /// Log PRINT instructions even when the `vm` logger is off
    pub trace: bool,

    label_ids: HashMap<String, u32>,
}

fn table_id(len: usize, table: &'static str) -> Result<u32, CompileError> {
    if len as u64 > MAX_OPERAND as u64 {
        Err(CompileError::TableOverflow(table))
    } else {
        Ok(len as u32)
    }
}

impl<'a> Program<'a> {
    pub fn new() -> Self {
        Self {
            code: Vec::new(),
            entry: 0..0,
            sets: Vec::new(),
            literals: Vec::new(),
            scanners: Vec::new(),
            arities: Vec::new(),
            values: Vec::new(),
            labels: Vec::new(),
            maps: Vec::new(),
            lifts: Vec::new(),
            forwards: Vec::new(),
            trace: false,
            label_ids: HashMap::new(),
        }
    }

    // -------------------------------------------------------------------------
    // Parsing
    // -------------------------------------------------------------------------

    /// Parse `text` from its start. The match need not reach the end of the
    /// input; grammars that require it end with an EOF node.
    pub fn parse(&self, text: &str) -> Result<Match, Failure> {
        let input: Vec<char> = text.chars().collect();
        self.parse_at(&input, 0)
    }

    /// Parse `input` starting at char index `pos`.
    pub fn parse_at(&self, input: &[char], pos: usize) -> Result<Match, Failure> {
        let mut vm = VM::new(self, input, pos);
        match vm.run(self.entry.clone()) {
            Ok(value) => Ok(Match { value, end: vm.pos }),
            Err(diag) => {
                let (message, error_pos) = diag.render(self);
                Err(Failure { message, pos: vm.pos, error_pos })
            }
        }
    }

    /// Parse `text` and keep only the value.
    pub fn value(&self, text: &str) -> Result<Value, Failure> {
        self.parse(text).map(|m| m.value)
    }

    // -------------------------------------------------------------------------
    // Building
    // -------------------------------------------------------------------------

    pub fn current_offset(&self) -> usize {
        self.code.len()
    }

    /// Emit an instruction, returning its offset.
    pub fn emit(&mut self, opcode: u8, operand: u32) -> usize {
        let offset = self.code.len();
        self.code.push(encode(opcode, operand));
        offset
    }

    /// Point the jump at `at` to `to`.
    pub fn patch_jump(&mut self, at: usize, to: usize) -> Result<(), CompileError> {
        let offset = jump_offset(at, to).ok_or(CompileError::JumpOutOfRange { from: at, to })?;
        let opc = opcode(self.code[at]);
        self.code[at] = encode(opc, encode_signed(offset));
        Ok(())
    }

    /// Emit a jump back to an already known offset.
    pub fn emit_jump_to(&mut self, opcode: u8, to: usize) -> Result<usize, CompileError> {
        let at = self.emit(opcode, 0);
        self.patch_jump(at, to)?;
        Ok(at)
    }

    pub fn intern_label(&mut self, label: &str) -> Result<u32, CompileError> {
        if let Some(&id) = self.label_ids.get(label) {
            return Ok(id);
        }
        let id = table_id(self.labels.len(), "label")?;
        self.labels.push(label.to_string());
        self.label_ids.insert(label.to_string(), id);
        Ok(id)
    }

    pub fn add_set(&mut self, set: ScanSet<'a>, label: &str) -> Result<u32, CompileError> {
        let label = self.intern_label(label)?;
        let id = table_id(self.sets.len(), "scan set")?;
        self.sets.push(SetEntry { set, label });
        Ok(id)
    }

    pub fn add_literal(
        &mut self,
        text: &str,
        ignore_case: bool,
        value: Value,
    ) -> Result<u32, CompileError> {
        let value = self.add_value(value)?;
        let id = table_id(self.literals.len(), "literal")?;
        self.literals.push(LiteralEntry { text: text.chars().collect(), ignore_case, value });
        Ok(id)
    }

    pub fn add_scanner(
        &mut self,
        set: ScanSet<'a>,
        min: u32,
        label: &str,
    ) -> Result<u32, CompileError> {
        let label = self.intern_label(label)?;
        let id = table_id(self.scanners.len(), "scanner")?;
        self.scanners.push(ScannerEntry { set, min, label });
        Ok(id)
    }

    pub fn add_arity(&mut self, min: u32, label: &str) -> Result<u32, CompileError> {
        let label = self.intern_label(label)?;
        let id = table_id(self.arities.len(), "arity")?;
        self.arities.push(Arity { min, label });
        Ok(id)
    }

    pub fn add_value(&mut self, value: Value) -> Result<u32, CompileError> {
        let id = table_id(self.values.len(), "value")?;
        self.values.push(value);
        Ok(id)
    }

    pub fn add_map(&mut self, func: MapFn<'a>) -> Result<u32, CompileError> {
        let id = table_id(self.maps.len(), "map function")?;
        self.maps.push(func);
        Ok(id)
    }

    pub fn add_lift(&mut self, func: LiftFn<'a>) -> Result<u32, CompileError> {
        let id = table_id(self.lifts.len(), "lift function")?;
        self.lifts.push(func);
        Ok(id)
    }

    /// Reserve a forward id; its code range is filled in once compiled.
    pub fn add_forward(&mut self, label: &str) -> Result<u32, CompileError> {
        let label = self.intern_label(label)?;
        let id = table_id(self.forwards.len(), "forward")?;
        self.forwards.push(ForwardEntry { code: 0..0, label });
        Ok(id)
    }

    pub fn label(&self, id: u32) -> &str {
        self.labels.get(id as usize).map(String::as_str).unwrap_or("???")
    }

    // -------------------------------------------------------------------------
    // Debugging
    // -------------------------------------------------------------------------

    /// Dump the compiled program to stderr for debugging
    pub fn dump(&self) {
        let stderr = std::io::stderr();
        let mut out = stderr.lock();
        self.dump_to(&mut out);
    }

    pub fn dump_to<W: Write>(&self, out: &mut W) {
        writeln!(out, "\n{:=^60}", " COMPILED PROGRAM DUMP ").ok();

        writeln!(out, "\n--- Scan Sets ({} entries) ---", self.sets.len()).ok();
        for (i, entry) in self.sets.iter().enumerate() {
            writeln!(
                out,
                "  [{:3}] {} escapes {} ({})",
                i,
                entry.set.chars.describe(),
                entry.set.escapes.describe(),
                self.label(entry.label)
            )
            .ok();
        }

        writeln!(out, "\n--- Literals ({} entries) ---", self.literals.len()).ok();
        for (i, lit) in self.literals.iter().enumerate() {
            let text: String = lit.text.iter().collect();
            let case = if lit.ignore_case { " [nocase]" } else { "" };
            writeln!(out, "  [{:3}] {:?}{} -> {}", i, text, case, self.values[lit.value as usize])
                .ok();
        }

        writeln!(out, "\n--- Scanners ({} entries) ---", self.scanners.len()).ok();
        for (i, scanner) in self.scanners.iter().enumerate() {
            writeln!(
                out,
                "  [{:3}] {} escapes {} min {} ({})",
                i,
                scanner.set.chars.describe(),
                scanner.set.escapes.describe(),
                scanner.min,
                self.label(scanner.label)
            )
            .ok();
        }

        writeln!(out, "\n--- Forwards ({} entries) ---", self.forwards.len()).ok();
        for (i, fwd) in self.forwards.iter().enumerate() {
            writeln!(
                out,
                "  [{:3}] {} @ {}..{}",
                i,
                self.label(fwd.label),
                fwd.code.start,
                fwd.code.end
            )
            .ok();
        }

        writeln!(out, "\n--- Bytecode ({} instructions) ---", self.code.len()).ok();
        self.disassemble(out);

        writeln!(out, "\n{:=^60}\n", "").ok();
    }

    /// Disassemble bytecode to a writer
    pub fn disassemble<W: Write>(&self, out: &mut W) {
        for (pc, &instr) in self.code.iter().enumerate() {
            if pc == self.entry.start {
                writeln!(out, "\n  ; === entry ===").ok();
            }
            for fwd in &self.forwards {
                if fwd.code.start == pc && !fwd.code.is_empty() {
                    writeln!(out, "\n  ; === forward {} ===", self.label(fwd.label)).ok();
                }
            }

            let opc = opcode(instr);
            let oper = operand(instr);
            let mnemonic = name(opc);
            let desc = if is_jump(opc) {
                format!("{:<16} -> @{}", mnemonic, target(pc, instr))
            } else {
                match opc {
                    op::ANY_CHAR => {
                        let label = self.sets.get(oper as usize).map(|s| self.label(s.label));
                        format!("{:<16} {} ({})", mnemonic, oper, label.unwrap_or("???"))
                    }
                    op::LITERAL | op::KEYWORD => {
                        let text: Option<String> =
                            self.literals.get(oper as usize).map(|l| l.text.iter().collect());
                        format!("{:<16} {} ({:?})", mnemonic, oper, text.unwrap_or_default())
                    }
                    op::SCAN => {
                        let label = self.scanners.get(oper as usize).map(|s| self.label(s.label));
                        format!("{:<16} {} ({})", mnemonic, oper, label.unwrap_or("???"))
                    }
                    op::LOAD_ACC => {
                        let min = self.arities.get(oper as usize).map(|a| a.min).unwrap_or(0);
                        format!("{:<16} {} (min {})", mnemonic, oper, min)
                    }
                    op::OPT => {
                        let value = self.values.get(oper as usize).cloned().unwrap_or_default();
                        format!("{:<16} {} ({})", mnemonic, oper, value)
                    }
                    op::FAIL | op::PRINT => {
                        format!("{:<16} {} ({})", mnemonic, oper, self.label(oper))
                    }
                    op::FORWARD => {
                        let label = self.forwards.get(oper as usize).map(|f| self.label(f.label));
                        format!("{:<16} {} ({})", mnemonic, oper, label.unwrap_or("???"))
                    }
                    op::MAP | op::LIFT => format!("{:<16} {}", mnemonic, oper),
                    _ if mnemonic == "???" => format!("??? opcode={:#04x} oper={}", opc, oper),
                    _ => mnemonic.to_string(),
                }
            };

            writeln!(out, "  {:4}: {}", pc, desc).ok();
        }
    }
}

impl Default for Program<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// A successful parse.
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    pub value: Value,
    /// Char index just past the match
    pub end: usize,
}
