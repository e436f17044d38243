//! Data-driven grammar tests.
//!
//! Each input under `tests/json` or `tests/arith` is parsed with the bundled
//! grammar, once with the optimizer and once without. Both runs must agree,
//! and the rendered result must match the sibling `.expected` file: the
//! value, or `error: <message>` for a failed parse.

use std::path::Path;

use bumpalo::Bump;
use datatest_stable::harness;
use weft_parser::grammars::{arith, json};
use weft_parser::{Compiler, Grammar, GrammarError, P};

type Build = for<'a> fn(&Grammar<'a>) -> Result<P<'a>, GrammarError>;

fn render(build: Build, input: &str, optimize: bool) -> datatest_stable::Result<String> {
    let arena = Bump::new();
    let g = Grammar::new(&arena);
    let root = build(&g)?;
    let program = Compiler::new().optimize(optimize).compile(&arena, root)?;
    Ok(match program.value(input) {
        Ok(value) => value.to_string(),
        Err(failure) => format!("error: {}", failure.message),
    })
}

fn check(build: Build, path: &Path) -> datatest_stable::Result<()> {
    let input = std::fs::read_to_string(path)?;
    let expected_path = format!("{}.expected", path.display());
    let expected = std::fs::read_to_string(&expected_path)?.trim().to_string();

    let optimized = render(build, &input, true)?;
    let plain = render(build, &input, false)?;
    if optimized != plain {
        return Err(format!(
            "optimizer changed the result for {:?}\n\nOptimized:\n{}\n\nUnoptimized:\n{}",
            path, optimized, plain
        )
        .into());
    }
    if optimized != expected {
        return Err(format!(
            "mismatch for {:?}\n\nExpected:\n{}\n\nActual:\n{}",
            path, expected, optimized
        )
        .into());
    }
    Ok(())
}

fn run_json(path: &Path) -> datatest_stable::Result<()> {
    check(json::grammar, path)
}

fn run_arith(path: &Path) -> datatest_stable::Result<()> {
    check(arith::grammar, path)
}

harness!(run_json, "tests/json", r"\.json$", run_arith, "tests/arith", r"\.txt$");
