use bumpalo::Bump;
use std::env;
use std::fs;
use std::io::{self, Read};
use std::process;

use common::{create_logger, log, SourceModule};
use weft_parser::{format_tree, grammars, Compiler, Grammar};

struct Options {
    grammar: String,
    optimize: bool,
    dump: bool,
    tree: bool,
    trace: bool,
    input: String,
}

fn main() {
    let args: Vec<String> = env::args().skip(1).collect();
    let options = parse_args(&args);
    process::exit(run(&options));
}

fn print_usage() {
    eprintln!("Usage: weft [options] <file|->");
    eprintln!();
    eprintln!("Parse a file with a bundled grammar and print the resulting value.");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --grammar <name>         Grammar to use: json (default) or arith");
    eprintln!("  --no-opt                 Compile without the optimizer");
    eprintln!("  --dump                   Print the compiled program to stderr");
    eprintln!("  --tree                   Print the (optimized) grammar tree to stderr");
    eprintln!("  --trace                  Log named rules as the VM enters them");
    eprintln!("  --help, -h               Show this help message");
}

fn parse_args(args: &[String]) -> Options {
    let mut options = Options {
        grammar: "json".to_string(),
        optimize: true,
        dump: false,
        tree: false,
        trace: false,
        input: String::new(),
    };
    let mut input: Option<&str> = None;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--help" | "-h" => {
                print_usage();
                process::exit(0);
            }
            "--grammar" => match iter.next() {
                Some(name) => options.grammar = name.clone(),
                None => {
                    eprintln!("--grammar needs a value");
                    process::exit(1);
                }
            },
            arg if arg.starts_with("--grammar=") => {
                options.grammar = arg["--grammar=".len()..].to_string();
            }
            "--no-opt" => options.optimize = false,
            "--dump" => options.dump = true,
            "--tree" => options.tree = true,
            "--trace" => options.trace = true,
            arg if arg == "-" || !arg.starts_with('-') => {
                if input.is_none() {
                    input = Some(arg);
                }
            }
            _ => {
                eprintln!("Unknown option: {}", arg);
                print_usage();
                process::exit(1);
            }
        }
    }

    match input {
        Some(path) => options.input = path.to_string(),
        None => {
            print_usage();
            process::exit(1);
        }
    }
    options
}

fn read_input(path: &str) -> io::Result<String> {
    if path == "-" {
        let mut text = String::new();
        io::stdin().read_to_string(&mut text)?;
        Ok(text)
    } else {
        fs::read_to_string(path)
    }
}

fn run(options: &Options) -> i32 {
    let log = create_logger("cli");

    let text = match read_input(&options.input) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error reading {}: {}", options.input, e);
            return 1;
        }
    };

    let arena = Bump::new();
    let g = Grammar::new(&arena);
    let root = match options.grammar.as_str() {
        "json" => grammars::json::grammar(&g),
        "arith" => grammars::arith::grammar(&g),
        other => {
            eprintln!("Unknown grammar: {} (expected json or arith)", other);
            return 1;
        }
    };
    let root = match root {
        Ok(root) => root,
        Err(e) => {
            eprintln!("Error building grammar: {}", e);
            return 1;
        }
    };

    if options.tree {
        let shown = if options.optimize { weft_parser::optimize(&arena, root) } else { root };
        eprint!("{}", format_tree(shown));
    }

    let compiler = Compiler::new().optimize(options.optimize).trace(options.trace);
    let program = match compiler.compile(&arena, root) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error compiling grammar: {}", e);
            return 1;
        }
    };
    log!(log, "{} grammar: {} instructions", options.grammar, program.code.len());

    if options.dump {
        program.dump();
    }

    match program.parse(&text) {
        Ok(m) => {
            log!(log, "matched {} of {} chars", m.end, text.chars().count());
            println!("{}", m.value);
            0
        }
        Err(failure) => {
            let id = if options.input == "-" { "<stdin>" } else { options.input.as_str() };
            let module = SourceModule::new(&text, id);
            eprintln!("{}", module.render_error(failure.error_pos, &failure.message));
            1
        }
    }
}
