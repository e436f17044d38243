//! Behavioral properties that must hold for every grammar, with and without
//! the optimizer.

use bumpalo::Bump;
use weft_parser::grammars::arith;
use weft_parser::{Compiler, Const, Failure, Grammar, Match, Value, P};

/// Parse `input` from `start` with the optimized and the unoptimized program.
fn run_both<F>(build: F, input: &str, start: usize) -> [Result<Match, Failure>; 2]
where
    F: for<'a> Fn(&Grammar<'a>) -> P<'a>,
{
    let chars: Vec<char> = input.chars().collect();
    [true, false].map(|optimize| {
        let arena = Bump::new();
        let g = Grammar::new(&arena);
        let root = build(&g);
        let program = Compiler::new().optimize(optimize).compile(&arena, root).unwrap();
        program.parse_at(&chars, start)
    })
}

/// Status, value and positions agree. Labels in messages may differ where
/// alternatives were folded into one set.
fn assert_transparent(results: &[Result<Match, Failure>; 2], input: &str) {
    match results {
        [Ok(a), Ok(b)] => assert_eq!(a, b, "input {:?}", input),
        [Err(a), Err(b)] => {
            assert_eq!(a.pos, b.pos, "input {:?}", input);
            assert_eq!(a.error_pos, b.error_pos, "input {:?}", input);
        }
        [a, b] => panic!("status differs on {:?}: {:?} vs {:?}", input, a, b),
    }
}

fn chars(s: &str) -> Value {
    Value::List(s.chars().map(Value::Char).collect())
}

// ============================================================================
// Choice ordering
// ============================================================================

#[test]
fn test_first_matching_alternative_wins() {
    let results = run_both(
        |g| g.choice(&[g.keyword("if", Const::Int(1)), g.keyword("if", Const::Int(2))]),
        "if",
        0,
    );
    for result in results {
        assert_eq!(result, Ok(Match { value: Value::Int(1), end: 2 }));
    }

    // The shorter alternative wins even though the longer one would also match
    let results = run_both(|g| g.or(g.literal("a"), g.literal("ab")), "ab", 0);
    for result in results {
        assert_eq!(result, Ok(Match { value: Value::Str("a".into()), end: 1 }));
    }
}

#[test]
fn test_choice_reports_last_failure() {
    let [optimized, plain] = run_both(|g| g.or(g.literal("ab"), g.literal("cd")), "x", 0);
    for failure in [optimized.unwrap_err(), plain.unwrap_err()] {
        assert_eq!(failure.message, "Expected c at 0. Got x instead.");
        assert_eq!(failure.pos, 0);
    }
}

// ============================================================================
// Backtracking purity
// ============================================================================

type Build = for<'a> fn(&Grammar<'a>) -> P<'a>;

fn case(name: &'static str, build: Build, input: &'static str) -> (&'static str, Build, &'static str) {
    (name, build, input)
}

fn failing_cases() -> Vec<(&'static str, Build, &'static str)> {
    vec![
        case("char", |g| g.char('a'), "b"),
        case("literal", |g| g.literal("abc"), "abd"),
        case("keyword", |g| g.keyword("true", Const::Bool(true)), "tru"),
        case("escaped", |g| g.escaped_char('\''), "\\x"),
        case("end", |g| g.end(), "x"),
        case("concat", |g| g.concat(g.char('a'), g.char('b')), "ac"),
        case("long concat", |g| g.concat(g.concat(g.char('a'), g.char('b')), g.char('c')), "abd"),
        case(
            "choice",
            |g| g.or(g.concat(g.char('a'), g.char('b')), g.concat(g.char('a'), g.char('c'))),
            "ad",
        ),
        case("keep left", |g| g.keep_left(g.char('a'), g.char('b')), "ac"),
        case("keep right", |g| g.keep_right(g.char('a'), g.char('b')), "ac"),
        case("followed by", |g| g.followed_by(g.char('a'), g.char('b')), "ac"),
        case("not followed by", |g| g.not_followed_by(g.char('a'), g.char('b')), "ab"),
        case("many1", |g| g.many1(g.concat(g.char('a'), g.char('b'))), "ac"),
        case("scanner", |g| g.scanner("a".chars(), "".chars(), 3, "a"), "aa"),
        case("map", |g| g.try_map(g.literal("ab"), |_| Err::<Value, _>("rejected")), "ab"),
        case(
            "lift",
            |g| g.try_lift(&[g.char('a'), g.char('b')], |_| Err::<Value, _>("rejected")),
            "ab",
        ),
        case("between", |g| g.between(g.char('a'), g.char('"')), "\"a"),
        case("sep by", |g| g.concat(g.sep_by(g.digit(), g.char(',')), g.end()), "1,2x"),
        case("quoted", |g| g.quoted_string(), "\"abc"),
        case(
            "forward",
            |g| {
                let f = g.forward();
                f.set_target(g.concat(g.char('a'), g.opt(f))).unwrap();
                g.concat(f, g.char('!'))
            },
            "aaa?",
        ),
    ]
}

#[test]
fn test_failure_leaves_cursor_at_start() {
    for (name, build, input) in failing_cases() {
        for start in [0, 2] {
            let padded = format!("{}{}", ".".repeat(start), input);
            for result in run_both(build, &padded, start) {
                let failure = result.expect_err(name);
                assert_eq!(failure.pos, start, "{} on {:?}", name, padded);
                assert!(failure.error_pos >= start, "{} on {:?}", name, padded);
            }
        }
    }
}

#[test]
fn test_failed_alternative_does_not_leak_into_next() {
    // Both alternatives start with "a"; the second must see the input from 0
    let results = run_both(
        |g| g.or(g.concat(g.char('a'), g.char('b')), g.concat(g.char('a'), g.char('c'))),
        "ac",
        0,
    );
    for result in results {
        assert_eq!(result, Ok(Match { value: chars("ac"), end: 2 }));
    }
}

// ============================================================================
// Optimizer transparency
// ============================================================================

#[test]
fn test_optimizer_is_transparent() {
    let inputs = ["", "a", "ab", "abc", "a\\'b", "\\", "\\\\x", "ba", "zz", "123", "a1 b2"];
    let grammars: [Build; 8] = [
        |g| g.many(g.or(g.char('a'), g.char('b'))),
        |g| g.many1(g.choice(&[g.char('a'), g.in_set("bc".chars(), "b or c"), g.digit()])),
        |g| g.many(g.choice(&[g.char('\\'), g.escaped_char('\''), g.letter()])),
        |g| g.many(g.choice(&[g.escaped_char('\\'), g.char('\\'), g.char('x')])),
        |g| g.or(g.concat(g.char('a'), g.char('b')), g.or(g.char('a'), g.digit())),
        |g| g.sep_by(g.concat(g.letter(), g.digit()), g.whitespace()),
        |g| g.concat(g.many(g.char_no_case('A')), g.opt_or(g.char('b'), Const::Str("none"))),
        |g| g.concat(g.choice(&[g.concat(g.char('a'), g.char('b'))]), g.char('c')),
    ];
    for (i, build) in grammars.into_iter().enumerate() {
        for input in inputs {
            let results = run_both(build, input, 0);
            assert_transparent(&results, &format!("grammar {} / {}", i, input));
        }
    }
}

#[test]
fn test_transparent_on_arithmetic() {
    for input in ["1+2*3", "((4))", "1+", "2*(3-1)/4", "(1", "1 - - 2"] {
        let results = run_both(|g| arith::grammar(g).unwrap(), input, 0);
        assert_transparent(&results, input);
    }
}

// ============================================================================
// Repetition
// ============================================================================

#[test]
fn test_many_on_no_match_is_empty() {
    for result in run_both(|g| g.many(g.char('a')), "bbb", 0) {
        assert_eq!(result, Ok(Match { value: Value::List(vec![]), end: 0 }));
    }
    for result in run_both(|g| g.many1(g.char('a')), "bbb", 0) {
        let failure = result.unwrap_err();
        assert_eq!(failure.pos, 0);
        assert_eq!(failure.error_pos, 0);
    }
}

#[test]
fn test_many_stops_on_empty_match() {
    for result in run_both(|g| g.many(g.opt(g.char('a'))), "aab", 0) {
        let m = result.unwrap();
        assert_eq!(m.end, 2);
    }
}

#[test]
fn test_escaped_chars_in_scanner() {
    for result in run_both(|g| g.scanner("abc".chars(), "'".chars(), 0, "abc"), "a\\'bc", 0) {
        assert_eq!(result, Ok(Match { value: chars("a'bc"), end: 5 }));
    }
    let results = run_both(
        |g| g.many(g.or(g.in_set("abc".chars(), "abc"), g.escaped_char('\''))),
        "a\\'bc",
        0,
    );
    for result in results {
        assert_eq!(result, Ok(Match { value: chars("a'bc"), end: 5 }));
    }
}

#[test]
fn test_single_alternative_choice_keeps_pair() {
    let results = run_both(
        |g| g.concat(g.choice(&[g.concat(g.char('a'), g.char('b'))]), g.char('c')),
        "abc",
        0,
    );
    for result in results {
        let value = Value::List(vec![chars("ab"), Value::Char('c')]);
        assert_eq!(result, Ok(Match { value, end: 3 }));
    }
}

// ============================================================================
// Case-insensitive matching and comments
// ============================================================================

#[test]
fn test_literal_no_case() {
    for result in run_both(|g| g.literal_no_case("SeLect"), "SELECT", 0) {
        assert_eq!(result, Ok(Match { value: Value::Str("select".into()), end: 6 }));
    }
    for result in run_both(|g| g.literal_no_case("SeLect"), "SELEXT", 0) {
        let failure = result.unwrap_err();
        assert_eq!(failure.pos, 0);
        assert_eq!(failure.error_pos, 4);
    }
}

#[test]
fn test_keyword_no_case() {
    for result in run_both(|g| g.keyword_no_case("true", Const::Bool(true)), "TrUe!", 0) {
        assert_eq!(result, Ok(Match { value: Value::Bool(true), end: 4 }));
    }
    for result in run_both(|g| g.keyword_no_case("true", Const::Bool(true)), "TrUx", 0) {
        assert_eq!(result.unwrap_err().pos, 0);
    }
}

#[test]
fn test_enclosed_comment() {
    for result in run_both(|g| g.enclosed_comment("/*", "*/"), "/* a **/", 0) {
        assert_eq!(result, Ok(Match { value: Value::Str(" a *".into()), end: 8 }));
    }
    for result in run_both(|g| g.enclosed_comment("/*", "*/"), "/* open", 0) {
        assert_eq!(result.unwrap_err().pos, 0);
    }
}

#[test]
fn test_one_line_comment_stops_at_newline() {
    for result in run_both(|g| g.one_line_comment("#"), "# hi\nx", 0) {
        assert_eq!(result, Ok(Match { value: Value::Str(" hi".into()), end: 4 }));
    }
}

// ============================================================================
// Recursion
// ============================================================================

#[test]
fn test_deep_nesting_with_fixed_program() {
    let arena = Bump::new();
    let g = Grammar::new(&arena);
    let program = Compiler::new().compile(&arena, arith::grammar(&g).unwrap()).unwrap();

    // One sub-program per forward reference, however deep the input nests
    assert_eq!(program.forwards.len(), 1);
    let size = program.code.len();

    for depth in [1, 10, 50, 60] {
        let input = format!("{}7{}", "(".repeat(depth), ")".repeat(depth));
        let m = program.parse(&input).unwrap();
        assert_eq!(m.value, Value::Int(7));
        assert_eq!(m.end, 2 * depth + 1);
    }

    let unbalanced = format!("{}7{}", "(".repeat(50), ")".repeat(49));
    assert!(program.parse(&unbalanced).is_err());
    assert_eq!(program.code.len(), size);
}
