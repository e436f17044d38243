//! JSON values, arrays and objects.
//!
//! Strings support backslash escapes of the quote char only; numbers have no
//! exponent. Object keys are sorted in the resulting map.

use std::collections::BTreeMap;

use crate::builder::{Grammar, P};
use crate::error::GrammarError;
use crate::value::{Const, Value};

/// A complete JSON document: one value with optional surrounding whitespace,
/// then the end of input.
pub fn grammar<'a>(g: &Grammar<'a>) -> Result<P<'a>, GrammarError> {
    let array = g.named(g.forward(), "json array");
    let object = g.named(g.forward(), "json object");
    let ws = g.ws();

    let t = g.named(g.keyword("true", Const::Bool(true)), "true");
    let f = g.named(g.keyword("false", Const::Bool(false)), "false");
    let null = g.named(g.keyword("null", Const::Null), "null");
    let simple = g.named(
        g.choice(&[g.quoted_string(), g.number(), object, array, t, f, null]),
        "json value",
    );
    let value = g.keep_left(g.keep_right(ws, simple), ws);

    let key = g.keep_left(g.keep_left(g.quoted_string(), ws), g.char(':'));
    let pair = g.concat(g.keep_right(ws, key), value);
    let pairs = g.try_map(g.sep_by(pair, g.char(',')), to_map);

    let open_bracket = g.keep_right(g.char('['), ws);
    let items = g.keep_right(open_bracket, g.sep_by(value, g.char(',')));
    array.set_target(g.keep_left(items, g.char(']')))?;

    let open_curly = g.keep_right(g.char('{'), ws);
    object.set_target(g.keep_left(g.keep_right(open_curly, pairs), g.char('}')))?;

    Ok(g.named(g.keep_left(value, g.end()), "json document"))
}

/// `[[key, value], ...]` to a map. Later duplicates win.
fn to_map(pairs: Value) -> Result<Value, String> {
    let mut map = BTreeMap::new();
    for pair in pairs.into_list().unwrap_or_default() {
        let mut kv = pair.into_list().unwrap_or_default();
        let value = kv.pop();
        let key = kv.pop();
        match (key, value) {
            (Some(Value::Str(key)), Some(value)) => {
                map.insert(key, value);
            }
            _ => return Err("Object keys must be strings".to_string()),
        }
    }
    Ok(Value::Map(map))
}
