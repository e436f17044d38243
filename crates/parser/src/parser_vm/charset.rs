//! Character sets using a bitmap for fast matching.
//!
//! The 8-bit range lives in a 256-bit bitmap; anything wider is kept in a
//! sorted slice in the grammar arena. Sets are `Copy` so they can sit inside
//! arena-allocated tree nodes and compiled programs alike.

use std::fmt;

use bumpalo::Bump;

const BITMAP_LIMIT: u32 = 256;

/// A set of characters, possibly negated.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct CharSet<'a> {
    /// Bitmap for the 8-bit range (256 bits = 32 bytes)
    bitmap: [u64; 4],
    /// Sorted, deduplicated characters outside the bitmap range
    wide: &'a [char],
    negated: bool,
}

impl<'a> CharSet<'a> {
    pub const fn empty() -> Self {
        Self { bitmap: [0; 4], wide: &[], negated: false }
    }

    pub fn from_chars<I: IntoIterator<Item = char>>(arena: &'a Bump, chars: I) -> Self {
        let mut bitmap = [0u64; 4];
        let mut wide = Vec::new();
        for c in chars {
            let code = c as u32;
            if code < BITMAP_LIMIT {
                bitmap[(code / 64) as usize] |= 1u64 << (code % 64);
            } else {
                wide.push(c);
            }
        }
        Self { bitmap, wide: seal(arena, wide), negated: false }
    }

    /// Set holding `c`, plus its other-case variants when `ignore_case` is on.
    pub fn single(arena: &'a Bump, c: char, ignore_case: bool) -> Self {
        if ignore_case {
            Self::from_chars(arena, c.to_lowercase().chain(c.to_uppercase()).chain([c]))
        } else {
            Self::from_chars(arena, [c])
        }
    }

    /// Complement of this set.
    pub fn negate(self) -> Self {
        Self { negated: !self.negated, ..self }
    }

    #[inline]
    pub fn contains(&self, c: char) -> bool {
        self.stored(c) != self.negated
    }

    #[inline]
    fn stored(&self, c: char) -> bool {
        let code = c as u32;
        if code < BITMAP_LIMIT {
            (self.bitmap[(code / 64) as usize] & (1u64 << (code % 64))) != 0
        } else {
            self.wide.binary_search(&c).is_ok()
        }
    }

    /// Check if this charset is negated
    pub fn is_negated(&self) -> bool {
        self.negated
    }

    /// True for a set that matches nothing.
    pub fn is_empty(&self) -> bool {
        !self.negated && self.bitmap == [0; 4] && self.wide.is_empty()
    }

    /// Set union. Negated operands are handled through De Morgan so the
    /// result stays a single (possibly negated) stored set.
    pub fn union(&self, other: &CharSet<'a>, arena: &'a Bump) -> CharSet<'a> {
        match (self.negated, other.negated) {
            (false, false) => self.stored_union(other, arena),
            (true, false) => self.stored_difference(other, arena).negate(),
            (false, true) => other.stored_difference(self, arena).negate(),
            (true, true) => self.stored_intersection(other, arena).negate(),
        }
    }

    fn stored_union(&self, other: &CharSet<'a>, arena: &'a Bump) -> CharSet<'a> {
        let mut bitmap = self.bitmap;
        for (dst, src) in bitmap.iter_mut().zip(other.bitmap) {
            *dst |= src;
        }
        let wide = self.wide.iter().chain(other.wide).copied().collect();
        CharSet { bitmap, wide: seal(arena, wide), negated: false }
    }

    fn stored_difference(&self, other: &CharSet<'a>, arena: &'a Bump) -> CharSet<'a> {
        let mut bitmap = self.bitmap;
        for (dst, src) in bitmap.iter_mut().zip(other.bitmap) {
            *dst &= !src;
        }
        let wide = self
            .wide
            .iter()
            .copied()
            .filter(|c| other.wide.binary_search(c).is_err())
            .collect();
        CharSet { bitmap, wide: seal(arena, wide), negated: false }
    }

    fn stored_intersection(&self, other: &CharSet<'a>, arena: &'a Bump) -> CharSet<'a> {
        let mut bitmap = self.bitmap;
        for (dst, src) in bitmap.iter_mut().zip(other.bitmap) {
            *dst &= src;
        }
        let wide = self
            .wide
            .iter()
            .copied()
            .filter(|c| other.wide.binary_search(c).is_ok())
            .collect();
        CharSet { bitmap, wide: seal(arena, wide), negated: false }
    }

    /// Short rendering of the stored characters, used by program dumps.
    pub fn describe(&self) -> String {
        let mut chars = String::new();
        for code in 0..BITMAP_LIMIT {
            let Some(c) = char::from_u32(code) else { continue };
            if !self.stored(c) {
                continue;
            }
            if c.is_ascii_graphic() {
                chars.push(c);
            } else {
                chars.push_str(&format!("\\x{:02x}", code));
            }
        }
        chars.extend(self.wide.iter());
        if chars.chars().count() > 40 {
            chars = chars.chars().take(40).collect();
            chars.push_str("...");
        }
        let neg = if self.negated { "^" } else { "" };
        format!("[{}{}]", neg, chars)
    }
}

impl Default for CharSet<'_> {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for CharSet<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CharSet{}", self.describe())
    }
}

fn seal<'a>(arena: &'a Bump, mut chars: Vec<char>) -> &'a [char] {
    if chars.is_empty() {
        return &[];
    }
    chars.sort_unstable();
    chars.dedup();
    arena.alloc_slice_copy(&chars)
}

/// The canonical character-test primitive: a set of literal characters plus
/// a set of characters accepted after a backslash.
///
/// A backslash followed by an escape char yields the escape char and
/// consumes both. Union-closed, which is what lets the optimizer fold runs of
/// alternatives into one test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScanSet<'a> {
    pub chars: CharSet<'a>,
    pub escapes: CharSet<'a>,
}

impl<'a> ScanSet<'a> {
    pub fn new(chars: CharSet<'a>, escapes: CharSet<'a>) -> Self {
        Self { chars, escapes }
    }

    pub fn literal(chars: CharSet<'a>) -> Self {
        Self { chars, escapes: CharSet::empty() }
    }

    pub fn escaped(escapes: CharSet<'a>) -> Self {
        Self { chars: CharSet::empty(), escapes }
    }

    pub fn union(&self, other: &ScanSet<'a>, arena: &'a Bump) -> ScanSet<'a> {
        ScanSet {
            chars: self.chars.union(&other.chars, arena),
            escapes: self.escapes.union(&other.escapes, arena),
        }
    }

    /// Whether trying `self` then `later` behaves exactly like trying their
    /// union.
    ///
    /// The only difference arises when `self` accepts a bare backslash and
    /// `later` accepts escape sequences: in order, `self` takes the lone
    /// backslash, while the union would take the two-char escape.
    pub fn can_merge(&self, later: &ScanSet<'a>) -> bool {
        !(self.chars.contains('\\') && !later.escapes.is_empty())
    }

    /// Match one (possibly escaped) char at `pos`.
    ///
    /// Returns the produced char and how many input chars were consumed.
    #[inline]
    pub fn match_at(&self, input: &[char], pos: usize) -> Option<(char, usize)> {
        let c = *input.get(pos)?;
        if c == '\\' {
            if let Some(&next) = input.get(pos + 1) {
                if self.escapes.contains(next) {
                    return Some((next, 2));
                }
            }
        }
        if self.chars.contains(c) {
            Some((c, 1))
        } else {
            None
        }
    }
}
