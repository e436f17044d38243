//! Combinator tree nodes.
//!
//! Trees are built once in a `bumpalo` arena and referenced as
//! `&'a Node<'a>`. A node's identity is its address; two structurally equal
//! subtrees are still different nodes. Nodes are immutable after construction
//! apart from the single target assignment of a Forward and the diagnostic
//! name.

use std::cell::{Cell, OnceCell};
use std::fmt;

use crate::error::GrammarError;
use crate::parser_vm::{CharSet, ScanSet};
use crate::value::{Const, Value};

/// Transform applied to a single child value.
pub type MapFn<'a> = &'a (dyn Fn(Value) -> Result<Value, String> + Send + Sync);

/// Transform applied to the values of all children of a Lift.
pub type LiftFn<'a> = &'a (dyn Fn(Vec<Value>) -> Result<Value, String> + Send + Sync);

/// Identity of a node within its arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// The combinators whose trees are kept under a descriptive wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SugarKind {
    SepBy,
    Between,
    OneLineComment,
    EnclosedComment,
}

impl SugarKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SugarKind::SepBy => "SepBy",
            SugarKind::Between => "Between",
            SugarKind::OneLineComment => "OneLineComment",
            SugarKind::EnclosedComment => "EnclosedComment",
        }
    }
}

pub enum NodeKind<'a> {
    // Atomic
    Char { c: char, ignore_case: bool },
    InSet(CharSet<'a>),
    EscapedChar(char),
    ScanSet(ScanSet<'a>),
    Scanner { set: ScanSet<'a>, min: u32, item_label: &'a str },
    Literal { text: &'a str, ignore_case: bool },
    Keyword { text: &'a str, value: Const<'a>, ignore_case: bool },
    End,

    // Binary
    Concat(&'a Node<'a>, &'a Node<'a>),
    Or(&'a Node<'a>, &'a Node<'a>),
    KeepLeft(&'a Node<'a>, &'a Node<'a>),
    KeepRight(&'a Node<'a>, &'a Node<'a>),
    FollowedBy(&'a Node<'a>, &'a Node<'a>),
    NotFollowedBy(&'a Node<'a>, &'a Node<'a>),

    // N-ary
    Choice(&'a [&'a Node<'a>]),
    Lift { func: LiftFn<'a>, children: &'a [&'a Node<'a>] },

    // Unary
    Opt { child: &'a Node<'a>, default: Const<'a> },
    Many { child: &'a Node<'a>, min: u32 },
    Map { func: MapFn<'a>, child: &'a Node<'a> },

    Sugar { kind: SugarKind, inner: &'a Node<'a> },

    Forward(OnceCell<&'a Node<'a>>),
}

pub struct Node<'a> {
    pub kind: NodeKind<'a>,
    name: Cell<Option<&'a str>>,
}

impl<'a> Node<'a> {
    pub fn new(kind: NodeKind<'a>) -> Self {
        Self { kind, name: Cell::new(None) }
    }

    #[inline]
    pub fn id(&self) -> NodeId {
        NodeId(self as *const Node<'a> as usize)
    }

    pub fn name(&self) -> Option<&'a str> {
        self.name.get()
    }

    /// Attach a descriptive name. Only diagnostics and dumps change.
    pub fn set_name(&self, name: &'a str) {
        self.name.set(Some(name));
    }

    pub fn named(&'a self, name: &'a str) -> &'a Node<'a> {
        self.set_name(name);
        self
    }

    pub fn is_forward(&self) -> bool {
        matches!(self.kind, NodeKind::Forward(_))
    }

    /// Target of a Forward, if assigned.
    pub fn target(&self) -> Option<&'a Node<'a>> {
        match &self.kind {
            NodeKind::Forward(cell) => cell.get().copied(),
            _ => None,
        }
    }

    /// Close a Forward. A second assignment is an error.
    pub fn set_target(&self, target: &'a Node<'a>) -> Result<(), GrammarError> {
        match &self.kind {
            NodeKind::Forward(cell) => cell
                .set(target)
                .map_err(|_| GrammarError::ForwardAlreadySet(self.label())),
            _ => Err(GrammarError::NotForward(self.label())),
        }
    }

    /// Direct children in evaluation order. A Forward's child is its target.
    pub fn children(&self) -> Vec<&'a Node<'a>> {
        match &self.kind {
            NodeKind::Char { .. }
            | NodeKind::InSet(_)
            | NodeKind::EscapedChar(_)
            | NodeKind::ScanSet(_)
            | NodeKind::Scanner { .. }
            | NodeKind::Literal { .. }
            | NodeKind::Keyword { .. }
            | NodeKind::End => Vec::new(),
            NodeKind::Concat(l, r)
            | NodeKind::Or(l, r)
            | NodeKind::KeepLeft(l, r)
            | NodeKind::KeepRight(l, r)
            | NodeKind::FollowedBy(l, r)
            | NodeKind::NotFollowedBy(l, r) => vec![*l, *r],
            NodeKind::Choice(alts) => alts.to_vec(),
            NodeKind::Lift { children, .. } => children.to_vec(),
            NodeKind::Opt { child, .. }
            | NodeKind::Many { child, .. }
            | NodeKind::Map { child, .. } => vec![*child],
            NodeKind::Sugar { inner, .. } => vec![*inner],
            NodeKind::Forward(cell) => cell.get().map(|t| vec![*t]).unwrap_or_default(),
        }
    }

    /// Short structural description, independent of the name.
    pub fn describe(&self) -> String {
        match &self.kind {
            NodeKind::Char { c, ignore_case: false } => format!("Char({})", c),
            NodeKind::Char { c, ignore_case: true } => format!("CharNoCase({})", c),
            NodeKind::InSet(set) => format!("InSet{}", set.describe()),
            NodeKind::EscapedChar(c) => format!("EscapedChar({})", c),
            NodeKind::ScanSet(_) => "AnyChar".to_string(),
            NodeKind::Scanner { min, .. } => format!("Scanner(min={})", min),
            NodeKind::Literal { text, ignore_case: false } => format!("Literal({})", text),
            NodeKind::Literal { text, ignore_case: true } => format!("LiteralNoCase({})", text),
            NodeKind::Keyword { text, .. } => format!("Keyword({})", text),
            NodeKind::End => "EOF".to_string(),
            NodeKind::Concat(..) => "Concat".to_string(),
            NodeKind::Or(..) => "Or".to_string(),
            NodeKind::KeepLeft(..) => "KeepLeft".to_string(),
            NodeKind::KeepRight(..) => "KeepRight".to_string(),
            NodeKind::FollowedBy(..) => "FollowedBy".to_string(),
            NodeKind::NotFollowedBy(..) => "NotFollowedBy".to_string(),
            NodeKind::Choice(alts) => format!("Choice({})", alts.len()),
            NodeKind::Lift { children, .. } => format!("Lift({})", children.len()),
            NodeKind::Opt { .. } => "Opt".to_string(),
            NodeKind::Many { min: 0, .. } => "Many".to_string(),
            NodeKind::Many { .. } => "Many1".to_string(),
            NodeKind::Map { .. } => "Map".to_string(),
            NodeKind::Sugar { kind, .. } => kind.as_str().to_string(),
            NodeKind::Forward(_) => "Forward".to_string(),
        }
    }

    /// Label used in diagnostics: the name if one was set, else the
    /// structural description.
    pub fn label(&self) -> String {
        match self.name() {
            Some(name) => name.to_string(),
            None => self.describe(),
        }
    }
}

impl fmt::Debug for Node<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.describe())?;
        if let Some(name) = self.name() {
            write!(f, " {:?}", name)?;
        }
        Ok(())
    }
}
