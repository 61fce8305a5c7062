use std::io::{self, BufRead, IsTerminal, Read, Write};
use std::process;

use lisp::error::LispError;
use lisp::eval::Machine;
use lisp::selftest;
use lisp::stream::StrSource;
use lisp::value::Value;
use lisp::MachineConfig;

const USAGE: &str = "\
usage: lisp <command> [options] [files]
commands:
  unit .............. run unit tests
  run FILE... ....... load and evaluate files in one environment
  repl .............. read-eval-print loop on stdin
options:
  --max-conses N .... cap the cons heap at N cells
  --max-steps N ..... evaluation steps allowed per top-level form
  --max-depth N ..... evaluation nesting allowed (default 1000)
  --help, -h ........ show this message
environment:
  LISP_LOG=LEVEL .... log filter (error, warn, info, debug, trace)";

fn main() {
    init_logging();

    let args: Vec<String> = std::env::args().collect();
    let mut config = MachineConfig::default();
    let mut positional: Vec<String> = Vec::new();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--max-conses" => {
                config.max_conses = Some(flag_value(&args, i));
                i += 2;
            }
            "--max-steps" => {
                config.max_steps = flag_value(&args, i);
                i += 2;
            }
            "--max-depth" => {
                config.max_depth = flag_value(&args, i);
                i += 2;
            }
            "--help" | "-h" => {
                println!("{}", USAGE);
                process::exit(0);
            }
            other if other.starts_with("--") => usage_error(&format!("unknown option: {}", other)),
            other => {
                positional.push(other.to_string());
                i += 1;
            }
        }
    }

    let Some((command, files)) = positional.split_first() else {
        usage_error("missing command");
    };

    let ok = match command.as_str() {
        "unit" => run_unit(),
        "run" => run_files(config, files),
        "repl" => run_repl(config),
        other => usage_error(&format!("unknown command: {}", other)),
    };
    process::exit(if ok { 0 } else { 1 });
}

fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::new().filter_or("LISP_LOG", "warn"))
        .format(|buf, record| writeln!(buf, "[{}] {}", record.level(), record.args()))
        .init();
}

/// Parse the value following the flag at `args[i]`.
fn flag_value<T: std::str::FromStr>(args: &[String], i: usize) -> T {
    match args.get(i + 1).map(|s| s.parse()) {
        Some(Ok(v)) => v,
        Some(Err(_)) => usage_error(&format!("{} expects a number", args[i])),
        None => usage_error(&format!("{} requires a value", args[i])),
    }
}

fn usage_error(msg: &str) -> ! {
    eprintln!("[FAIL] {}", msg);
    eprintln!("{}", USAGE);
    process::exit(1);
}

fn fail(e: &LispError) -> ! {
    eprintln!("[FAIL] {}", e);
    process::exit(1);
}

fn new_machine(config: MachineConfig) -> (Machine, Value) {
    let mut machine = Machine::new(config).unwrap_or_else(|e| fail(&e));
    let env = machine.make_core_env().unwrap_or_else(|e| fail(&e));
    (machine, env)
}

fn run_unit() -> bool {
    match selftest::run_unit_tests(&mut io::stdout()) {
        Ok(summary) => summary.passed(),
        Err(e) => fail(&e),
    }
}

/// Load each file into one shared environment. An error stops the file it
/// occurs in; later files still run.
fn run_files(config: MachineConfig, files: &[String]) -> bool {
    if files.is_empty() {
        usage_error("run needs at least one file");
    }
    let (mut machine, env) = new_machine(config);
    let mut ok = true;
    for path in files {
        if let Err(e) = machine.load_file(path, env) {
            if e.is_fatal() {
                fail(&e);
            }
            eprintln!("Error in {}: {}", path, e);
            ok = false;
        }
    }
    ok
}

fn run_repl(config: MachineConfig) -> bool {
    let (mut machine, env) = new_machine(config);
    if io::stdin().is_terminal() {
        println!(
            "lisp ready ({} conses, {} symbols)",
            machine.heap.total_cells(),
            machine.symbols.count()
        );
        run_interactive(&mut machine, env);
    } else {
        run_piped(&mut machine, env);
    }
    true
}

/// Paren balance of a line, ignoring strings and comments.
fn paren_depth(line: &str) -> i32 {
    let mut depth = 0;
    let mut in_string = false;
    let mut escaped = false;
    for ch in line.chars() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '(' => depth += 1,
            ')' => depth -= 1,
            '"' => in_string = true,
            ';' => break,
            _ => {}
        }
    }
    depth
}

/// Interactive REPL: accumulate lines until parens are balanced.
fn run_interactive(machine: &mut Machine, env: Value) {
    let stdin = io::stdin();
    let mut buf = String::new();
    let mut depth: i32 = 0;

    loop {
        print!("{}", if depth == 0 { "> " } else { "  " });
        let _ = io::stdout().flush();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                eprintln!("Read error: {}", e);
                break;
            }
        }

        depth += paren_depth(&line);
        buf.push_str(&line);

        if depth <= 0 {
            depth = 0;
            let input = std::mem::take(&mut buf);
            if !input.trim().is_empty() {
                eval_and_print(&input, machine, env);
            }
        }
    }
}

/// Piped mode: read all input, then evaluate it one form at a time.
fn run_piped(machine: &mut Machine, env: Value) {
    let mut input = String::new();
    if let Err(e) = io::stdin().read_to_string(&mut input) {
        eprintln!("Read error: {}", e);
        return;
    }
    eval_and_print(&input, machine, env);
}

/// Evaluate every expression in a string and print each result.
fn eval_and_print(input: &str, machine: &mut Machine, env: Value) {
    let mut source = StrSource::new(input);
    loop {
        let expr = match machine.read_from(&mut source) {
            Ok(Some(expr)) => expr,
            Ok(None) => break,
            Err(e) if e.is_fatal() => fail(&e),
            Err(e) => {
                eprintln!("Error: {}", e);
                break;
            }
        };
        match machine.eval(expr, env) {
            Ok(val) => println!("{}", machine.render(val)),
            Err(e) if e.is_fatal() => fail(&e),
            Err(e) => eprintln!("Error: {}", e),
        }
    }
}
