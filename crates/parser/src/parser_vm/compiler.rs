//! Bytecode compiler for combinator trees.
//!
//! Every node lowers to a self-contained fragment: control enters at its
//! first instruction, leaves past its last, the register holds the status,
//! and on failure the cursor is back where the fragment started. Jumps are
//! emitted as placeholders and patched once their target is known.

use bumpalo::Bump;
use common::debug::{create_logger, Logger};
use common::{log, log_detail, log_success};
use hashbrown::HashMap;

use crate::error::CompileError;
use crate::node::{LiftFn, MapFn, Node, NodeId, NodeKind};
use crate::optimizer::optimize;
use crate::value::{Const, Value};

use super::charset::{CharSet, ScanSet};
use super::instruction::op;
use super::program::Program;

/// Compile combinator trees into programs
pub struct Compiler {
    optimize: bool,
    trace: bool,
    log: Logger,
}

impl Compiler {
    pub fn new() -> Self {
        Self { optimize: true, trace: false, log: create_logger("compiler") }
    }

    /// Run the optimizer first (on by default).
    pub fn optimize(mut self, on: bool) -> Self {
        self.optimize = on;
        self
    }

    /// Emit PRINT before named nodes and force VM logging for the program.
    pub fn trace(mut self, on: bool) -> Self {
        self.trace = on;
        self
    }

    /// Lower `root` into a program. The input tree is left untouched; the
    /// optimized tree is allocated in `arena`.
    pub fn compile<'a>(
        &self,
        arena: &'a Bump,
        root: &'a Node<'a>,
    ) -> Result<Program<'a>, CompileError> {
        let root = if self.optimize { optimize(arena, root) } else { root };

        let mut lowering = Lowering {
            program: Program::new(),
            arena,
            forwards: HashMap::new(),
            trace: self.trace,
            log: &self.log,
        };
        lowering.program.trace = self.trace;

        let start = lowering.program.current_offset();
        lowering.lower(root)?;
        let end = lowering.program.current_offset();
        lowering.program.entry = start..end;

        let program = lowering.program;
        log_success!(
            self.log,
            "compiled {:?}: {} instructions, {} forwards",
            root,
            program.code.len(),
            program.forwards.len()
        );
        Ok(program)
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

struct Lowering<'a, 'c> {
    program: Program<'a>,
    arena: &'a Bump,
    /// Forward node -> forward id, assigned on first visit
    forwards: HashMap<NodeId, u32>,
    trace: bool,
    log: &'c Logger,
}

impl<'a> Lowering<'a, '_> {
    /// Emit a jump whose target is patched later.
    fn jump(&mut self, opcode: u8) -> usize {
        self.program.emit(opcode, 0)
    }

    /// Point the given jumps at the current offset.
    fn land(&mut self, jumps: &[usize]) -> Result<(), CompileError> {
        let here = self.program.current_offset();
        for &at in jumps {
            self.program.patch_jump(at, here)?;
        }
        Ok(())
    }

    fn lower(&mut self, node: &'a Node<'a>) -> Result<(), CompileError> {
        if self.trace {
            if let Some(name) = node.name() {
                let label = self.program.intern_label(name)?;
                self.program.emit(op::PRINT, label);
            }
        }

        match &node.kind {
            NodeKind::Char { c, ignore_case } => {
                let set = ScanSet::literal(CharSet::single(self.arena, *c, *ignore_case));
                self.lower_set(set, node)
            }
            NodeKind::InSet(chars) => self.lower_set(ScanSet::literal(*chars), node),
            NodeKind::EscapedChar(c) => {
                let set = ScanSet::escaped(CharSet::single(self.arena, *c, false));
                self.lower_set(set, node)
            }
            NodeKind::ScanSet(set) => self.lower_set(*set, node),
            NodeKind::Scanner { set, min, item_label } => {
                let id = self.program.add_scanner(*set, *min, item_label)?;
                self.program.emit(op::SCAN, id);
                Ok(())
            }
            NodeKind::Literal { text, ignore_case } => {
                let id = self.program.add_literal(text, *ignore_case, Value::Str(text.to_string()))?;
                self.program.emit(op::LITERAL, id);
                Ok(())
            }
            NodeKind::Keyword { text, value, ignore_case } => {
                let id = self.program.add_literal(text, *ignore_case, value.to_value())?;
                self.program.emit(op::KEYWORD, id);
                Ok(())
            }
            NodeKind::End => {
                self.program.emit(op::EOF, 0);
                Ok(())
            }

            NodeKind::Concat(..) => {
                let mut items = Vec::new();
                flatten_concat(node, &mut items);
                self.lower_sequence(&items, None)
            }
            NodeKind::Or(left, right) => self.lower_choice(&[*left, *right], node),
            NodeKind::Choice(alternatives) => self.lower_choice(alternatives, node),
            NodeKind::KeepLeft(left, right) => self.lower_keep_left(left, right),
            NodeKind::KeepRight(left, right) => self.lower_keep_right(left, right),
            NodeKind::FollowedBy(left, right) => self.lower_lookahead(left, right, None),
            NodeKind::NotFollowedBy(left, right) => {
                let label = self.program.intern_label(&node.label())?;
                self.lower_lookahead(left, right, Some(label))
            }

            NodeKind::Lift { func, children } => self.lower_sequence(children, Some(*func)),
            NodeKind::Opt { child, default } => self.lower_opt(child, default),
            NodeKind::Many { child, min } => self.lower_many(child, *min),
            NodeKind::Map { func, child } => self.lower_map(child, *func),
            NodeKind::Sugar { inner, .. } => self.lower(inner),

            NodeKind::Forward(_) => self.lower_forward(node),
        }
    }

    fn lower_set(&mut self, set: ScanSet<'a>, node: &'a Node<'a>) -> Result<(), CompileError> {
        let id = self.program.add_set(set, &node.label())?;
        self.program.emit(op::ANY_CHAR, id);
        Ok(())
    }

    /// Concat chains and Lift.
    ///
    /// ```text
    ///   CREATE_ACC
    ///   PUSH_POS
    ///   <item>; JUMP_IF_FAILURE fail; PUSH     (per item)
    ///   LOAD_ACC n
    ///   [LIFT f; JUMP_IF_FAILURE undo]
    ///   CLEAR_POS
    ///   JUMP done
    /// fail:
    ///   DELETE_ACC
    /// undo:
    ///   POP_POS
    /// done:
    /// ```
    fn lower_sequence(
        &mut self,
        items: &[&'a Node<'a>],
        lift: Option<LiftFn<'a>>,
    ) -> Result<(), CompileError> {
        self.program.emit(op::CREATE_ACC, 0);
        self.program.emit(op::PUSH_POS, 0);

        let mut fails = Vec::with_capacity(items.len());
        for item in items {
            self.lower(item)?;
            fails.push(self.jump(op::JUMP_IF_FAILURE));
            self.program.emit(op::PUSH, 0);
        }

        let label = if lift.is_some() { "Lift" } else { "Concat" };
        let arity = self.program.add_arity(items.len() as u32, label)?;
        self.program.emit(op::LOAD_ACC, arity);

        let mut undo = Vec::new();
        if let Some(func) = lift {
            let id = self.program.add_lift(func)?;
            self.program.emit(op::LIFT, id);
            undo.push(self.jump(op::JUMP_IF_FAILURE));
        }

        self.program.emit(op::CLEAR_POS, 0);
        let done = self.jump(op::JUMP);
        self.land(&fails)?;
        self.program.emit(op::DELETE_ACC, 0);
        self.land(&undo)?;
        self.program.emit(op::POP_POS, 0);
        self.land(&[done])
    }

    /// Ordered choice. Each alternative starts from the same position; only
    /// the last failure is kept.
    ///
    /// ```text
    ///   PUSH_POS
    ///   <alt 1>; JUMP_IF_SUCCESS ok
    ///   POP_PUSH_POS; <alt 2>; JUMP_IF_SUCCESS ok
    ///   ...
    ///   POP_POS
    ///   JUMP done
    /// ok:
    ///   CLEAR_POS
    /// done:
    /// ```
    fn lower_choice(
        &mut self,
        alternatives: &[&'a Node<'a>],
        node: &'a Node<'a>,
    ) -> Result<(), CompileError> {
        if alternatives.is_empty() {
            return Err(CompileError::EmptyChoice(node.label()));
        }

        self.program.emit(op::PUSH_POS, 0);
        let mut oks = Vec::with_capacity(alternatives.len());
        for (i, alt) in alternatives.iter().enumerate() {
            if i > 0 {
                self.program.emit(op::POP_PUSH_POS, 0);
            }
            self.lower(alt)?;
            oks.push(self.jump(op::JUMP_IF_SUCCESS));
        }
        self.program.emit(op::POP_POS, 0);
        let done = self.jump(op::JUMP);
        self.land(&oks)?;
        self.program.emit(op::CLEAR_POS, 0);
        self.land(&[done])
    }

    /// ```text
    ///   CREATE_ACC
    ///   PUSH_POS
    ///   <left>;  JUMP_IF_FAILURE fail; PUSH
    ///   <right>; JUMP_IF_FAILURE fail
    ///   POP
    ///   CLEAR_POS
    ///   JUMP done
    /// fail:
    ///   POP_POS
    /// done:
    ///   DELETE_ACC
    /// ```
    fn lower_keep_left(
        &mut self,
        left: &'a Node<'a>,
        right: &'a Node<'a>,
    ) -> Result<(), CompileError> {
        self.program.emit(op::CREATE_ACC, 0);
        self.program.emit(op::PUSH_POS, 0);
        self.lower(left)?;
        let left_fail = self.jump(op::JUMP_IF_FAILURE);
        self.program.emit(op::PUSH, 0);
        self.lower(right)?;
        let right_fail = self.jump(op::JUMP_IF_FAILURE);
        self.program.emit(op::POP, 0);
        self.program.emit(op::CLEAR_POS, 0);
        let done = self.jump(op::JUMP);
        self.land(&[left_fail, right_fail])?;
        self.program.emit(op::POP_POS, 0);
        self.land(&[done])?;
        self.program.emit(op::DELETE_ACC, 0);
        Ok(())
    }

    /// ```text
    ///   PUSH_POS
    ///   <left>;  JUMP_IF_FAILURE fail
    ///   <right>; JUMP_IF_FAILURE fail
    ///   CLEAR_POS
    ///   JUMP done
    /// fail:
    ///   POP_POS
    /// done:
    /// ```
    fn lower_keep_right(
        &mut self,
        left: &'a Node<'a>,
        right: &'a Node<'a>,
    ) -> Result<(), CompileError> {
        self.program.emit(op::PUSH_POS, 0);
        self.lower(left)?;
        let left_fail = self.jump(op::JUMP_IF_FAILURE);
        self.lower(right)?;
        let right_fail = self.jump(op::JUMP_IF_FAILURE);
        self.program.emit(op::CLEAR_POS, 0);
        let done = self.jump(op::JUMP);
        self.land(&[left_fail, right_fail])?;
        self.program.emit(op::POP_POS, 0);
        self.land(&[done])
    }

    /// FollowedBy (`reject == None`) and NotFollowedBy. The right side is
    /// only peeked at: the cursor is reset to the end of left either way.
    ///
    /// ```text
    ///   CREATE_ACC
    ///   PUSH_POS
    ///   <left>; JUMP_IF_FAILURE fail; PUSH
    ///   PUSH_POS; <right>; POP_POS
    ///   JUMP_IF_FAILURE fail        | JUMP_IF_SUCCESS reject
    ///   POP
    ///   CLEAR_POS
    ///   JUMP done
    ///                               | reject: FAIL label
    /// fail:
    ///   POP_POS
    /// done:
    ///   DELETE_ACC
    /// ```
    fn lower_lookahead(
        &mut self,
        left: &'a Node<'a>,
        right: &'a Node<'a>,
        reject: Option<u32>,
    ) -> Result<(), CompileError> {
        self.program.emit(op::CREATE_ACC, 0);
        self.program.emit(op::PUSH_POS, 0);
        self.lower(left)?;
        let mut fails = vec![self.jump(op::JUMP_IF_FAILURE)];
        self.program.emit(op::PUSH, 0);

        self.program.emit(op::PUSH_POS, 0);
        self.lower(right)?;
        self.program.emit(op::POP_POS, 0);

        let rejected = match reject {
            None => {
                fails.push(self.jump(op::JUMP_IF_FAILURE));
                None
            }
            Some(_) => Some(self.jump(op::JUMP_IF_SUCCESS)),
        };
        self.program.emit(op::POP, 0);
        self.program.emit(op::CLEAR_POS, 0);
        let done = self.jump(op::JUMP);

        if let (Some(at), Some(label)) = (rejected, reject) {
            self.land(&[at])?;
            self.program.emit(op::FAIL, label);
        }
        self.land(&fails)?;
        self.program.emit(op::POP_POS, 0);
        self.land(&[done])?;
        self.program.emit(op::DELETE_ACC, 0);
        Ok(())
    }

    /// ```text
    ///   PUSH_POS
    ///   <child>; JUMP_IF_FAILURE fail
    ///   CLEAR_POS
    ///   JUMP done
    /// fail:
    ///   POP_POS
    ///   OPT default
    /// done:
    /// ```
    fn lower_opt(&mut self, child: &'a Node<'a>, default: &Const<'a>) -> Result<(), CompileError> {
        self.program.emit(op::PUSH_POS, 0);
        self.lower(child)?;
        let fail = self.jump(op::JUMP_IF_FAILURE);
        self.program.emit(op::CLEAR_POS, 0);
        let done = self.jump(op::JUMP);
        self.land(&[fail])?;
        self.program.emit(op::POP_POS, 0);
        let value = self.program.add_value(default.to_value())?;
        self.program.emit(op::OPT, value);
        self.land(&[done])
    }

    /// ```text
    ///   CREATE_ACC
    /// again:
    ///   PUSH_POS
    ///   <child>; JUMP_IF_FAILURE exit
    ///   PUSH
    ///   LOOP again          (pops the position; stops if nothing was consumed)
    ///   JUMP done
    /// exit:
    ///   POP_POS
    /// done:
    ///   LOAD_ACC min
    /// ```
    fn lower_many(&mut self, child: &'a Node<'a>, min: u32) -> Result<(), CompileError> {
        self.program.emit(op::CREATE_ACC, 0);
        let again = self.program.current_offset();
        self.program.emit(op::PUSH_POS, 0);
        self.lower(child)?;
        let exit = self.jump(op::JUMP_IF_FAILURE);
        self.program.emit(op::PUSH, 0);
        self.program.emit_jump_to(op::LOOP, again)?;
        let done = self.jump(op::JUMP);
        self.land(&[exit])?;
        self.program.emit(op::POP_POS, 0);
        self.land(&[done])?;
        let arity = self.program.add_arity(min, &child.label())?;
        self.program.emit(op::LOAD_ACC, arity);
        Ok(())
    }

    /// ```text
    ///   PUSH_POS
    ///   <child>
    ///   MAP f
    ///   JUMP_IF_FAILURE fail
    ///   CLEAR_POS
    ///   JUMP done
    /// fail:
    ///   POP_POS
    /// done:
    /// ```
    fn lower_map(&mut self, child: &'a Node<'a>, func: MapFn<'a>) -> Result<(), CompileError> {
        self.program.emit(op::PUSH_POS, 0);
        self.lower(child)?;
        let id = self.program.add_map(func)?;
        self.program.emit(op::MAP, id);
        let fail = self.jump(op::JUMP_IF_FAILURE);
        self.program.emit(op::CLEAR_POS, 0);
        let done = self.jump(op::JUMP);
        self.land(&[fail])?;
        self.program.emit(op::POP_POS, 0);
        self.land(&[done])
    }

    /// The first visit compiles the target in place and records that range
    /// as the forward's sub-program; later visits call it.
    fn lower_forward(&mut self, node: &'a Node<'a>) -> Result<(), CompileError> {
        if let Some(&id) = self.forwards.get(&node.id()) {
            self.program.emit(op::FORWARD, id);
            return Ok(());
        }

        let target = node.target().ok_or_else(|| CompileError::UnsetForward(node.label()))?;
        let id = self.program.add_forward(&node.label())?;
        self.forwards.insert(node.id(), id);

        let start = self.program.current_offset();
        self.lower(target)?;
        let end = self.program.current_offset();
        self.program.forwards[id as usize].code = start..end;
        log_detail!(self.log, "forward {} ({}) @ {}..{}", id, node.label(), start, end);
        Ok(())
    }
}

/// Operands of a left-nested Concat chain, in order.
fn flatten_concat<'a>(node: &'a Node<'a>, items: &mut Vec<&'a Node<'a>>) {
    if let NodeKind::Concat(left, right) = &node.kind {
        if matches!(left.kind, NodeKind::Concat(..)) {
            flatten_concat(left, items);
        } else {
            items.push(left);
        }
        items.push(right);
    }
}

/// Compile with the default settings: optimizer on, tracing off.
pub fn compile<'a>(arena: &'a Bump, root: &'a Node<'a>) -> Result<Program<'a>, CompileError> {
    let compiler = Compiler::new();
    log!(compiler.log, "compiling {:?}", root);
    compiler.compile(arena, root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Grammar;
    use crate::parser_vm::instruction::{opcode, target};

    fn unoptimized<'a>(arena: &'a Bump, root: &'a Node<'a>) -> Program<'a> {
        Compiler::new().optimize(false).compile(arena, root).unwrap()
    }

    #[test]
    fn test_jumps_stay_inside_fragments() {
        let arena = Bump::new();
        let g = Grammar::new(&arena);
        let root = g.choice(&[
            g.keep_left(g.literal("ab"), g.char(';')),
            g.many1(g.or(g.char('x'), g.char('y'))),
            g.not_followed_by(g.char('a'), g.char('c')),
        ]);
        let program = unoptimized(&arena, root);
        for (pc, &instr) in program.code.iter().enumerate() {
            if crate::parser_vm::instruction::is_jump(opcode(instr)) {
                let to = target(pc, instr);
                assert!(to <= program.entry.end, "jump at {} leaves the program", pc);
            }
        }
    }

    #[test]
    fn test_forward_compiled_once() {
        let arena = Bump::new();
        let g = Grammar::new(&arena);
        let expr = g.named(g.forward(), "expr");
        let parens = g.keep_left(g.keep_right(g.char('('), g.opt(expr)), g.char(')'));
        expr.set_target(parens).unwrap();
        let root = g.concat(expr, g.concat(expr, expr));

        let program = unoptimized(&arena, root);
        assert_eq!(program.forwards.len(), 1);
        let calls = program.code.iter().filter(|&&i| opcode(i) == op::FORWARD).count();
        // The nested reference plus the two later uses
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_unset_forward_is_an_error() {
        let arena = Bump::new();
        let g = Grammar::new(&arena);
        let fwd = g.named(g.forward(), "value");
        let root = g.many(fwd);
        assert_eq!(
            Compiler::new().compile(&arena, root).err(),
            Some(CompileError::UnsetForward("value".into()))
        );
    }

    #[test]
    fn test_empty_choice_is_an_error() {
        let arena = Bump::new();
        let g = Grammar::new(&arena);
        let root = g.named(g.choice(&[]), "nothing");
        assert_eq!(
            Compiler::new().optimize(false).compile(&arena, root).err(),
            Some(CompileError::EmptyChoice("nothing".into()))
        );
    }

    #[test]
    fn test_concat_flattens_left_chains_only() {
        let arena = Bump::new();
        let g = Grammar::new(&arena);
        let (a, b, c) = (g.char('a'), g.char('b'), g.char('c'));

        let left = unoptimized(&arena, g.concat(g.concat(a, b), c));
        assert_eq!(
            left.value("abc").unwrap(),
            Value::List(vec!['a'.into(), 'b'.into(), 'c'.into()])
        );

        let right = unoptimized(&arena, g.concat(a, g.concat(b, c)));
        assert_eq!(
            right.value("abc").unwrap(),
            Value::List(vec!['a'.into(), Value::List(vec!['b'.into(), 'c'.into()])])
        );
    }

    #[test]
    fn test_trace_emits_print_for_named_nodes() {
        let arena = Bump::new();
        let g = Grammar::new(&arena);
        let root = g.named(g.literal("hi"), "greeting");
        let program = Compiler::new().trace(true).compile(&arena, root).unwrap();
        assert!(program.trace);
        assert_eq!(opcode(program.code[0]), op::PRINT);
        assert_eq!(program.value("hi").unwrap(), Value::Str("hi".into()));
    }
}
