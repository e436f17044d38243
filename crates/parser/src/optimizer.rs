//! Tree optimizer.
//!
//! Builds a new tree in the arena; the input tree is not modified. Rewrites:
//!
//! - Char, InSet, EscapedChar and ScanSet become a canonical ScanSet.
//! - Nested Or/Choice flatten into one Choice, keeping alternative order.
//! - Adjacent ScanSet alternatives merge into their union. A Choice whose
//!   alternatives all merge becomes a single ScanSet.
//! - Many/Many1 over a ScanSet becomes a Scanner.
//!
//! Results are memoized by node identity, so shared subtrees stay shared and
//! recursive grammars terminate: a Forward's replacement is recorded before
//! its target is visited.

use bumpalo::Bump;
use common::debug::{create_logger, Logger};
use common::{log, log_detail};
use hashbrown::HashMap;

use crate::builder::{Grammar, P};
use crate::node::{Node, NodeId, NodeKind};
use crate::parser_vm::{CharSet, ScanSet};

/// Optimize the tree rooted at `root`.
pub fn optimize<'a>(arena: &'a Bump, root: P<'a>) -> P<'a> {
    let mut optimizer = Optimizer::new(arena);
    let optimized = optimizer.visit(root);
    log!(
        optimizer.log,
        "optimized {:?}: {} nodes rewritten, {} char tests merged",
        root,
        optimizer.memo.len(),
        optimizer.merged
    );
    optimized
}

pub struct Optimizer<'a> {
    g: Grammar<'a>,
    memo: HashMap<NodeId, P<'a>>,
    merged: usize,
    log: Logger,
}

impl<'a> Optimizer<'a> {
    pub fn new(arena: &'a Bump) -> Self {
        Self {
            g: Grammar::new(arena),
            memo: HashMap::new(),
            merged: 0,
            log: create_logger("optimizer"),
        }
    }

    pub fn visit(&mut self, node: P<'a>) -> P<'a> {
        if let Some(&done) = self.memo.get(&node.id()) {
            return done;
        }

        if node.is_forward() {
            let forward = self.g.forward();
            copy_name(node, forward);
            self.memo.insert(node.id(), forward);
            if let Some(target) = node.target() {
                let target = self.visit(target);
                // Fresh forward, so this is its only assignment
                let _ = forward.set_target(target);
            }
            return forward;
        }

        let optimized = if let Some(set) = self.char_test(node) {
            self.g.scan_set(set, &node.label())
        } else {
            match &node.kind {
                NodeKind::Or(..) | NodeKind::Choice(_) => self.fold_choice(node),
                NodeKind::Many { child, min } => self.fold_many(node, *child, *min),
                _ => self.rebuild(node),
            }
        };
        self.memo.insert(node.id(), optimized);
        optimized
    }

    /// Canonical scan set of a single-char test.
    fn char_test(&self, node: &Node<'a>) -> Option<ScanSet<'a>> {
        let arena = self.g.arena();
        match &node.kind {
            NodeKind::Char { c, ignore_case } => {
                Some(ScanSet::literal(CharSet::single(arena, *c, *ignore_case)))
            }
            NodeKind::InSet(chars) => Some(ScanSet::literal(*chars)),
            NodeKind::EscapedChar(c) => Some(ScanSet::escaped(CharSet::single(arena, *c, false))),
            NodeKind::ScanSet(set) => Some(*set),
            _ => None,
        }
    }

    fn flatten_alternatives(&mut self, node: P<'a>, out: &mut Vec<P<'a>>) {
        let children = match &node.kind {
            NodeKind::Or(left, right) => vec![*left, *right],
            NodeKind::Choice(alternatives) => alternatives.to_vec(),
            _ => vec![node],
        };
        for child in children {
            let child = self.visit(child);
            match &child.kind {
                NodeKind::Choice(alternatives) => out.extend_from_slice(alternatives),
                _ => out.push(child),
            }
        }
    }

    fn fold_choice(&mut self, node: P<'a>) -> P<'a> {
        let mut alternatives = Vec::new();
        self.flatten_alternatives(node, &mut alternatives);

        let arena = self.g.arena();
        let mut folded: Vec<P<'a>> = Vec::with_capacity(alternatives.len());
        let mut fresh = false;
        for alt in alternatives {
            if let (Some(&last), NodeKind::ScanSet(next)) = (folded.last(), &alt.kind) {
                if let NodeKind::ScanSet(prev) = &last.kind {
                    if prev.can_merge(next) {
                        let label = format!("{} | {}", last.label(), alt.label());
                        let union = self.g.scan_set(prev.union(next, arena), &label);
                        log_detail!(self.log, "merged {}", label);
                        self.merged += 1;
                        fresh = true;
                        if let Some(slot) = folded.last_mut() {
                            *slot = union;
                        }
                        continue;
                    }
                }
            }
            folded.push(alt);
        }

        // Only a merged set may stand in for the choice. Any other lone
        // alternative keeps its wrapper so concat flattening sees the same shape.
        match folded.as_slice() {
            [only] if fresh => {
                copy_name(node, only);
                *only
            }
            _ => {
                let choice = self.g.choice(&folded);
                copy_name(node, choice);
                choice
            }
        }
    }

    fn fold_many(&mut self, node: P<'a>, child: P<'a>, min: u32) -> P<'a> {
        let inner = self.visit(child);
        let many = match &inner.kind {
            NodeKind::ScanSet(set) => {
                log_detail!(self.log, "{} over {} becomes a scanner", node.describe(), child.label());
                let item_label = self.g.str(&child.label());
                self.g.node(NodeKind::Scanner { set: *set, min, item_label })
            }
            _ => self.g.node(NodeKind::Many { child: inner, min }),
        };
        copy_name(node, many);
        many
    }

    /// Same node shape over optimized children. Leaves are immutable and
    /// shared as they are.
    fn rebuild(&mut self, node: P<'a>) -> P<'a> {
        let kind = match &node.kind {
            NodeKind::Concat(l, r) => NodeKind::Concat(self.visit(l), self.visit(r)),
            NodeKind::KeepLeft(l, r) => NodeKind::KeepLeft(self.visit(l), self.visit(r)),
            NodeKind::KeepRight(l, r) => NodeKind::KeepRight(self.visit(l), self.visit(r)),
            NodeKind::FollowedBy(l, r) => NodeKind::FollowedBy(self.visit(l), self.visit(r)),
            NodeKind::NotFollowedBy(l, r) => NodeKind::NotFollowedBy(self.visit(l), self.visit(r)),
            NodeKind::Lift { func, children } => {
                let children: Vec<P<'a>> = children.iter().map(|c| self.visit(c)).collect();
                NodeKind::Lift { func: *func, children: self.g.nodes(&children) }
            }
            NodeKind::Opt { child, default } => {
                NodeKind::Opt { child: self.visit(child), default: *default }
            }
            NodeKind::Map { func, child } => NodeKind::Map { func: *func, child: self.visit(child) },
            NodeKind::Sugar { kind, inner } => NodeKind::Sugar { kind: *kind, inner: self.visit(inner) },
            _ => return node,
        };
        let rebuilt = self.g.node(kind);
        copy_name(node, rebuilt);
        rebuilt
    }
}

fn copy_name<'a>(from: &Node<'a>, to: &Node<'a>) {
    if let Some(name) = from.name() {
        to.set_name(name);
    }
}
