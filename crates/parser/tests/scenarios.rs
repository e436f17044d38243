//! End-to-end parses through the public API.

use bumpalo::Bump;
use weft_parser::grammars::{arith, json};
use weft_parser::{compile, Const, Grammar, Match, Value};

fn ints(items: &[i64]) -> Value {
    Value::List(items.iter().map(|&i| Value::Int(i)).collect())
}

#[test]
fn test_keyword_true() {
    let arena = Bump::new();
    let g = Grammar::new(&arena);
    let program = compile(&arena, g.keyword("true", Const::Bool(true))).unwrap();
    assert_eq!(program.parse("true"), Ok(Match { value: Value::Bool(true), end: 4 }));
}

#[test]
fn test_bracketed_number_list() {
    let arena = Bump::new();
    let g = Grammar::new(&arena);
    let items = g.keep_right(g.char('['), g.sep_by(g.number(), g.char(',')));
    let program = compile(&arena, g.keep_left(items, g.char(']'))).unwrap();
    assert_eq!(program.parse("[1,2,3]"), Ok(Match { value: ints(&[1, 2, 3]), end: 7 }));
    assert_eq!(program.parse("[]"), Ok(Match { value: ints(&[]), end: 2 }));
    assert_eq!(program.parse("[,1]"), Ok(Match { value: ints(&[1]), end: 4 }));
    assert!(program.parse("[1,]").is_err());
}

#[test]
fn test_sep_by_optional_first_item() {
    let arena = Bump::new();
    let g = Grammar::new(&arena);
    let program = compile(&arena, g.sep_by(g.char('a'), g.char(','))).unwrap();
    let a = Value::Char('a');
    assert_eq!(program.parse(",a"), Ok(Match { value: Value::List(vec![a.clone()]), end: 2 }));
    assert_eq!(
        program.parse("a,a,"),
        Ok(Match { value: Value::List(vec![a.clone(), a]), end: 3 })
    );
    assert_eq!(program.parse("b"), Ok(Match { value: Value::List(vec![]), end: 0 }));
}

#[test]
fn test_sep_by_keeps_null_items() {
    let arena = Bump::new();
    let g = Grammar::new(&arena);
    let null = g.keyword("null", Const::Null);
    let program = compile(&arena, g.sep_by(null, g.char(','))).unwrap();
    assert_eq!(
        program.parse("null,null"),
        Ok(Match { value: Value::List(vec![Value::Null, Value::Null]), end: 9 })
    );
}

#[test]
fn test_number() {
    let arena = Bump::new();
    let g = Grammar::new(&arena);
    let program = compile(&arena, g.number()).unwrap();
    assert_eq!(program.parse("3.4"), Ok(Match { value: Value::Float(3.4), end: 3 }));
    assert_eq!(program.parse("-12"), Ok(Match { value: Value::Int(-12), end: 3 }));
}

#[test]
fn test_arithmetic() {
    let arena = Bump::new();
    let g = Grammar::new(&arena);
    let program = compile(&arena, arith::grammar(&g).unwrap()).unwrap();
    assert_eq!(program.value("(1+2)*3"), Ok(Value::Int(9)));
}

#[test]
fn test_followed_by_consumes_left_only() {
    let arena = Bump::new();
    let g = Grammar::new(&arena);
    let program = compile(&arena, g.followed_by(g.char('a'), g.char('b'))).unwrap();
    assert_eq!(program.parse("ab"), Ok(Match { value: Value::Char('a'), end: 1 }));

    let failure = program.parse("ac").unwrap_err();
    assert_eq!(failure.pos, 0);
    assert_eq!(failure.error_pos, 1);
}

#[test]
fn test_not_followed_by() {
    let arena = Bump::new();
    let g = Grammar::new(&arena);
    let program = compile(&arena, g.not_followed_by(g.char('a'), g.char('b'))).unwrap();
    assert_eq!(program.parse("ac"), Ok(Match { value: Value::Char('a'), end: 1 }));
    assert_eq!(program.parse("a"), Ok(Match { value: Value::Char('a'), end: 1 }));
    assert_eq!(program.parse("ab").unwrap_err().pos, 0);
}

#[test]
fn test_json_document() {
    let arena = Bump::new();
    let g = Grammar::new(&arena);
    let program = compile(&arena, json::grammar(&g).unwrap()).unwrap();

    let m = program.parse(r#"{"xs": [1, 2], "ok": true}"#).unwrap();
    assert_eq!(m.value.to_string(), r#"{"ok": true, "xs": [1, 2]}"#);
    assert_eq!(m.end, 26);
}

#[test]
fn test_program_is_reusable_across_threads() {
    let arena = Bump::new();
    let g = Grammar::new(&arena);
    let program = compile(&arena, arith::grammar(&g).unwrap()).unwrap();

    std::thread::scope(|s| {
        let handles: Vec<_> = (1..=4)
            .map(|n| {
                let program = &program;
                s.spawn(move || program.value(&format!("{} * {}", n, n)))
            })
            .collect();
        for (n, handle) in (1..=4).zip(handles) {
            assert_eq!(handle.join().unwrap(), Ok(Value::Int(n * n)));
        }
    });
}
