//! Source text and location lookup for diagnostics.
//!
//! Parse positions are `char` indices into the input. This module maps them
//! back to 1-based line/column pairs and the text of the surrounding line so
//! that callers can print a caret under the failing position.

/// A position in source text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceLoc {
    /// Char index in the source text.
    pub offset: u32,
    /// Line number (1-based).
    pub line: u32,
    /// Column number (1-based, counted in chars).
    pub col: u32,
}

impl SourceLoc {
    /// Create a new source location.
    pub fn new(offset: u32, line: u32, col: u32) -> Self {
        Self { offset, line, col }
    }
}

/// A named piece of source text, e.g. a file given on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceModule<'a> {
    /// The full source text.
    pub text: &'a str,
    /// File path, `<stdin>`, or a test name.
    pub id: &'a str,
}

impl<'a> SourceModule<'a> {
    pub fn new(text: &'a str, id: &'a str) -> Self {
        Self { text, id }
    }

    /// Locate a char index. Positions past the end clamp to the end of text.
    pub fn locate(&self, pos: usize) -> SourceLoc {
        let mut line = 1;
        let mut col = 1;
        let mut offset = 0;
        for c in self.text.chars().take(pos) {
            offset += 1;
            if c == '\n' {
                line += 1;
                col = 1;
            } else {
                col += 1;
            }
        }
        SourceLoc::new(offset, line, col)
    }

    /// Text of the given 1-based line, without its line terminator.
    pub fn line_text(&self, line: u32) -> &'a str {
        self.text
            .split('\n')
            .nth(line.saturating_sub(1) as usize)
            .map(|l| l.trim_end_matches('\r'))
            .unwrap_or("")
    }

    /// Render `id:line:col: msg` followed by the source line and a caret.
    pub fn render_error(&self, pos: usize, msg: &str) -> String {
        let loc = self.locate(pos);
        let spaces = loc.col.saturating_sub(1) as usize;
        format!(
            "{}:{}:{}: {}\n  {}\n  {}^",
            self.id,
            loc.line,
            loc.col,
            msg,
            self.line_text(loc.line),
            " ".repeat(spaces)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_loc_new() {
        let loc = SourceLoc::new(10, 2, 5);
        assert_eq!(loc.offset, 10);
        assert_eq!(loc.line, 2);
        assert_eq!(loc.col, 5);
    }

    #[test]
    fn test_locate_first_line() {
        let module = SourceModule::new("hello world", "test");
        assert_eq!(module.locate(0), SourceLoc::new(0, 1, 1));
        assert_eq!(module.locate(6), SourceLoc::new(6, 1, 7));
    }

    #[test]
    fn test_locate_after_newline() {
        let module = SourceModule::new("ab\ncd", "test");
        assert_eq!(module.locate(3), SourceLoc::new(3, 2, 1));
        assert_eq!(module.locate(4), SourceLoc::new(4, 2, 2));
    }

    #[test]
    fn test_locate_counts_chars_not_bytes() {
        let module = SourceModule::new("éé=", "test");
        assert_eq!(module.locate(2), SourceLoc::new(2, 1, 3));
    }

    #[test]
    fn test_locate_clamps_past_end() {
        let module = SourceModule::new("ab", "test");
        assert_eq!(module.locate(10), SourceLoc::new(2, 1, 3));
    }

    #[test]
    fn test_line_text() {
        let module = SourceModule::new("one\r\ntwo\nthree", "test");
        assert_eq!(module.line_text(1), "one");
        assert_eq!(module.line_text(2), "two");
        assert_eq!(module.line_text(3), "three");
        assert_eq!(module.line_text(7), "");
    }

    #[test]
    fn test_render_error() {
        let module = SourceModule::new("[1,\n 2,x]", "in.json");
        let rendered = module.render_error(7, "Expected digit at 7. Got x instead.");
        assert_eq!(
            rendered,
            "in.json:2:4: Expected digit at 7. Got x instead.\n   2,x]\n     ^"
        );
    }
}
