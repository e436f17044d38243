//! Ready-made primitives: character classes, numbers and quoted strings.

use crate::builder::{text_of, Grammar, P};
use crate::value::Value;

const DIGITS: &str = "0123456789";
const LETTERS: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
const PUNCTUATION: &str = "!\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~";
const WHITESPACE: &str = " \t\x0b\x0c";
const NEWLINES: &str = "\n\r";

fn punctuation_except(excluded: &str) -> impl Iterator<Item = char> + '_ {
    PUNCTUATION.chars().filter(move |c| !excluded.contains(*c))
}

impl<'a> Grammar<'a> {
    pub fn digit(&self) -> P<'a> {
        self.in_set(DIGITS.chars(), "digit")
    }

    pub fn non_zero_digit(&self) -> P<'a> {
        self.in_set(DIGITS.chars().skip(1), "non zero digit")
    }

    pub fn letter(&self) -> P<'a> {
        self.in_set(LETTERS.chars(), "letter")
    }

    pub fn punctuation(&self) -> P<'a> {
        self.in_set(PUNCTUATION.chars(), "punctuation character")
    }

    pub fn printable(&self) -> P<'a> {
        let chars = DIGITS.chars().chain(LETTERS.chars()).chain(PUNCTUATION.chars());
        self.in_set(chars.chain(WHITESPACE.chars()).chain(NEWLINES.chars()), "printable character")
    }

    /// Blanks other than newlines.
    pub fn whitespace(&self) -> P<'a> {
        self.in_set(WHITESPACE.chars(), "whitespace except newlines")
    }

    pub fn eol(&self) -> P<'a> {
        self.in_set(NEWLINES.chars(), "newline")
    }

    /// Optional run of blanks and newlines.
    pub fn ws(&self) -> P<'a> {
        self.named(self.many(self.or(self.whitespace(), self.eol())), "whitespace")
    }

    /// `-? digit+` as an `Int`.
    pub fn integer(&self) -> P<'a> {
        let sign = self.opt(self.char('-'));
        let digits = self.many1(self.digit());
        let integer = self.try_lift(&[sign, digits], |args| {
            let text = number_text(&args);
            text.parse::<i64>()
                .map(Value::Int)
                .map_err(|e| format!("Invalid integer {}: {}", text, e))
        });
        self.named(integer, "integer")
    }

    /// `-? digit+ ('.' digit*)?`: an `Int` without a fraction, else a `Float`.
    pub fn number(&self) -> P<'a> {
        let sign = self.opt(self.char('-'));
        let digits = self.many1(self.digit());
        let fraction = self.opt(self.concat(self.char('.'), self.many(self.digit())));
        let number = self.try_lift(&[sign, digits, fraction], |args| {
            let text = number_text(&args);
            let parsed = if args.get(2).is_some_and(|f| !f.is_null()) {
                text.parse::<f64>().map(Value::Float).map_err(|e| e.to_string())
            } else {
                text.parse::<i64>().map(Value::Int).map_err(|e| e.to_string())
            };
            parsed.map_err(|e| format!("Invalid number {}: {}", text, e))
        });
        self.named(number, "number")
    }

    /// Double or single quoted text. A backslash escapes the quote char;
    /// any other backslash is kept as is.
    pub fn quoted_string(&self) -> P<'a> {
        let double = self.quoted_body('"', "non double quote punctuation character");
        let single = self.quoted_body('\'', "non single quote punctuation character");
        let quoted = self.or(
            self.between(double, self.char('"')),
            self.between(single, self.char('\'')),
        );
        self.named(self.map(quoted, text_of), "quoted string")
    }

    fn quoted_body(&self, quote: char, label: &str) -> P<'a> {
        let excluded: String = [quote, '\\'].iter().collect();
        let item = self.choice(&[
            self.letter(),
            self.digit(),
            self.whitespace(),
            self.in_set(punctuation_except(&excluded), label),
            self.escaped_char(quote),
            self.char('\\'),
        ]);
        self.many(item)
    }

    /// One or more chars from `chars`, as a string.
    pub fn string_of(&self, chars: &str, label: &str) -> P<'a> {
        let run = self.many1(self.in_set(chars.chars(), label));
        self.map(run, text_of)
    }
}

/// Text of the `[sign, digits, fraction?]` values of a number.
fn number_text(args: &[Value]) -> String {
    args.iter().filter_map(Value::concat_text).collect()
}
