//! Grammar construction.
//!
//! [`Grammar`] is a thin handle around the tree arena. Every combinator is a
//! named method returning a fresh `&'a Node<'a>`; subtrees may be shared
//! freely, and recursion goes through [`Grammar::forward`].

use std::cell::OnceCell;
use std::fmt::Display;

use bumpalo::Bump;

use crate::node::{LiftFn, MapFn, Node, NodeKind, SugarKind};
use crate::parser_vm::{CharSet, ScanSet};
use crate::value::{Const, Value};

/// Shorthand for an arena-allocated node.
pub type P<'a> = &'a Node<'a>;

#[derive(Clone, Copy)]
pub struct Grammar<'a> {
    arena: &'a Bump,
}

impl<'a> Grammar<'a> {
    pub fn new(arena: &'a Bump) -> Self {
        Self { arena }
    }

    pub fn arena(&self) -> &'a Bump {
        self.arena
    }

    pub(crate) fn node(&self, kind: NodeKind<'a>) -> P<'a> {
        self.arena.alloc(Node::new(kind))
    }

    pub(crate) fn str(&self, s: &str) -> &'a str {
        self.arena.alloc_str(s)
    }

    pub(crate) fn nodes(&self, nodes: &[P<'a>]) -> &'a [P<'a>] {
        self.arena.alloc_slice_copy(nodes)
    }

    /// Give `node` a descriptive name and return it.
    pub fn named(&self, node: P<'a>, name: &str) -> P<'a> {
        node.set_name(self.str(name));
        node
    }

    /// Copy a list constant into the arena.
    pub fn list(&self, items: &[Const<'a>]) -> Const<'a> {
        Const::List(self.arena.alloc_slice_copy(items))
    }

    pub fn text(&self, s: &str) -> Const<'a> {
        Const::Str(self.str(s))
    }

    // -------------------------------------------------------------------------
    // Character tests
    // -------------------------------------------------------------------------

    pub fn char(&self, c: char) -> P<'a> {
        self.node(NodeKind::Char { c, ignore_case: false })
    }

    pub fn char_no_case(&self, c: char) -> P<'a> {
        self.node(NodeKind::Char { c, ignore_case: true })
    }

    /// Any one char of `chars`, reported as `label` on failure.
    pub fn in_set<I: IntoIterator<Item = char>>(&self, chars: I, label: &str) -> P<'a> {
        let set = CharSet::from_chars(self.arena, chars);
        self.named(self.node(NodeKind::InSet(set)), label)
    }

    /// Any one char not in `chars`. End of input still does not match.
    pub fn not_in_set<I: IntoIterator<Item = char>>(&self, chars: I, label: &str) -> P<'a> {
        let set = CharSet::from_chars(self.arena, chars).negate();
        self.named(self.node(NodeKind::InSet(set)), label)
    }

    /// A backslash followed by `c`; produces `c`.
    pub fn escaped_char(&self, c: char) -> P<'a> {
        self.node(NodeKind::EscapedChar(c))
    }

    pub fn scan_set(&self, set: ScanSet<'a>, label: &str) -> P<'a> {
        self.named(self.node(NodeKind::ScanSet(set)), label)
    }

    /// Run of at least `min` chars from `chars`, or backslash escapes of
    /// `escapes`. Produces the list of matched chars.
    pub fn scanner<I, J>(&self, chars: I, escapes: J, min: u32, label: &str) -> P<'a>
    where
        I: IntoIterator<Item = char>,
        J: IntoIterator<Item = char>,
    {
        let set = ScanSet::new(
            CharSet::from_chars(self.arena, chars),
            CharSet::from_chars(self.arena, escapes),
        );
        let item_label = self.str(label);
        self.node(NodeKind::Scanner { set, min, item_label })
    }

    // -------------------------------------------------------------------------
    // Literals
    // -------------------------------------------------------------------------

    pub fn literal(&self, text: &str) -> P<'a> {
        self.node(NodeKind::Literal { text: self.str(text), ignore_case: false })
    }

    /// Case-insensitive literal; produces the lower-cased text.
    pub fn literal_no_case(&self, text: &str) -> P<'a> {
        let lowered = text.to_lowercase();
        self.node(NodeKind::Literal { text: self.str(&lowered), ignore_case: true })
    }

    /// Literal producing a fixed constant instead of its text.
    pub fn keyword(&self, text: &str, value: Const<'a>) -> P<'a> {
        self.node(NodeKind::Keyword { text: self.str(text), value, ignore_case: false })
    }

    pub fn keyword_no_case(&self, text: &str, value: Const<'a>) -> P<'a> {
        let lowered = text.to_lowercase();
        self.node(NodeKind::Keyword { text: self.str(&lowered), value, ignore_case: true })
    }

    /// Matches only at the end of the input, consuming nothing.
    pub fn end(&self) -> P<'a> {
        self.node(NodeKind::End)
    }

    // -------------------------------------------------------------------------
    // Sequencing and alternation
    // -------------------------------------------------------------------------

    /// Both in order. Left-nested chains produce one flat list.
    pub fn concat(&self, left: P<'a>, right: P<'a>) -> P<'a> {
        self.node(NodeKind::Concat(left, right))
    }

    pub fn or(&self, left: P<'a>, right: P<'a>) -> P<'a> {
        self.node(NodeKind::Or(left, right))
    }

    /// Ordered choice; the first alternative that matches wins.
    pub fn choice(&self, alternatives: &[P<'a>]) -> P<'a> {
        self.node(NodeKind::Choice(self.nodes(alternatives)))
    }

    pub fn keep_left(&self, left: P<'a>, right: P<'a>) -> P<'a> {
        self.node(NodeKind::KeepLeft(left, right))
    }

    pub fn keep_right(&self, left: P<'a>, right: P<'a>) -> P<'a> {
        self.node(NodeKind::KeepRight(left, right))
    }

    /// `left`, if `right` matches after it. Only `left` is consumed.
    pub fn followed_by(&self, left: P<'a>, right: P<'a>) -> P<'a> {
        self.node(NodeKind::FollowedBy(left, right))
    }

    /// `left`, unless `right` matches after it. Only `left` is consumed.
    pub fn not_followed_by(&self, left: P<'a>, right: P<'a>) -> P<'a> {
        self.node(NodeKind::NotFollowedBy(left, right))
    }

    // -------------------------------------------------------------------------
    // Repetition and options
    // -------------------------------------------------------------------------

    pub fn opt(&self, child: P<'a>) -> P<'a> {
        self.opt_or(child, Const::Null)
    }

    pub fn opt_or(&self, child: P<'a>, default: Const<'a>) -> P<'a> {
        self.node(NodeKind::Opt { child, default })
    }

    pub fn many(&self, child: P<'a>) -> P<'a> {
        self.node(NodeKind::Many { child, min: 0 })
    }

    pub fn many1(&self, child: P<'a>) -> P<'a> {
        self.node(NodeKind::Many { child, min: 1 })
    }

    // -------------------------------------------------------------------------
    // Transforms
    //
    // Closures are stored in the arena, which never runs destructors, so they
    // should not own resources that need dropping.
    // -------------------------------------------------------------------------

    pub fn map<F>(&self, child: P<'a>, f: F) -> P<'a>
    where
        F: Fn(Value) -> Value + Send + Sync + 'a,
    {
        let func: MapFn<'a> =
            self.arena.alloc(move |v: Value| -> Result<Value, String> { Ok(f(v)) });
        self.node(NodeKind::Map { func, child })
    }

    /// Like [`Grammar::map`], but the transform may reject the value. The
    /// error message becomes the failure diagnostic.
    pub fn try_map<F, E>(&self, child: P<'a>, f: F) -> P<'a>
    where
        F: Fn(Value) -> Result<Value, E> + Send + Sync + 'a,
        E: Display,
    {
        let func: MapFn<'a> = self.arena.alloc(move |v: Value| -> Result<Value, String> {
            f(v).map_err(|e| e.to_string())
        });
        self.node(NodeKind::Map { func, child })
    }

    /// Run `children` in sequence and pass all their values to `f`.
    pub fn lift<F>(&self, children: &[P<'a>], f: F) -> P<'a>
    where
        F: Fn(Vec<Value>) -> Value + Send + Sync + 'a,
    {
        let func: LiftFn<'a> =
            self.arena.alloc(move |args: Vec<Value>| -> Result<Value, String> { Ok(f(args)) });
        self.node(NodeKind::Lift { func, children: self.nodes(children) })
    }

    pub fn try_lift<F, E>(&self, children: &[P<'a>], f: F) -> P<'a>
    where
        F: Fn(Vec<Value>) -> Result<Value, E> + Send + Sync + 'a,
        E: Display,
    {
        let func: LiftFn<'a> =
            self.arena.alloc(move |args: Vec<Value>| -> Result<Value, String> {
                f(args).map_err(|e| e.to_string())
            });
        self.node(NodeKind::Lift { func, children: self.nodes(children) })
    }

    // -------------------------------------------------------------------------
    // Sugar
    // -------------------------------------------------------------------------

    fn sugar(&self, kind: SugarKind, inner: P<'a>) -> P<'a> {
        self.node(NodeKind::Sugar { kind, inner })
    }

    /// An optional first `item`, then any number of `sep item`; produces the
    /// list of items. A missing first item is left out of the list.
    pub fn sep_by(&self, item: P<'a>, sep: P<'a>) -> P<'a> {
        // The first item is boxed in a one-element list so a legitimate
        // `Null` value is not mistaken for a missing item.
        let first = self.opt(self.map(item, |v| Value::List(vec![v])));
        let rest = self.many(self.keep_right(sep, item));
        let inner = self.lift(&[first, rest], |args| {
            let mut args = args.into_iter();
            let mut items = args.next().and_then(Value::into_list).unwrap_or_default();
            items.extend(args.next().and_then(Value::into_list).unwrap_or_default());
            Value::List(items)
        });
        self.sugar(SugarKind::SepBy, inner)
    }

    /// `inner` surrounded by `envelope` on both sides; produces `inner`.
    pub fn between(&self, inner: P<'a>, envelope: P<'a>) -> P<'a> {
        let inner = self.keep_left(self.keep_right(envelope, inner), envelope);
        self.sugar(SugarKind::Between, inner)
    }

    /// `start` followed by the rest of the line; produces the comment text.
    pub fn one_line_comment(&self, start: &str) -> P<'a> {
        let body = self.many(self.not_in_set(['\n', '\r'], "comment character"));
        let inner = self.map(self.keep_right(self.literal(start), body), text_of);
        self.sugar(SugarKind::OneLineComment, inner)
    }

    /// `start`, anything up to the first `end`, then `end`; produces the
    /// enclosed text.
    pub fn enclosed_comment(&self, start: &str, end: &str) -> P<'a> {
        let mut tail = end.chars();
        let Some(first) = tail.next() else {
            let inner = self.map(self.literal(start), |_| Value::Str(String::new()));
            return self.sugar(SugarKind::EnclosedComment, inner);
        };
        let rest = tail.as_str();
        let plain = self.not_in_set([first], "comment character");
        let item = if rest.is_empty() {
            plain
        } else {
            self.choice(&[plain, self.not_followed_by(self.char(first), self.literal(rest))])
        };
        let opened = self.keep_right(self.literal(start), self.many(item));
        let body = self.keep_left(opened, self.literal(end));
        let inner = self.map(body, text_of);
        self.sugar(SugarKind::EnclosedComment, inner)
    }

    // -------------------------------------------------------------------------
    // Recursion
    // -------------------------------------------------------------------------

    /// A placeholder closed later with [`Node::set_target`].
    pub fn forward(&self) -> P<'a> {
        self.node(NodeKind::Forward(OnceCell::new()))
    }
}

/// Join the chars of a matched value into a string.
pub(crate) fn text_of(v: Value) -> Value {
    match v.concat_text() {
        Some(text) => Value::Str(text),
        None => v,
    }
}
