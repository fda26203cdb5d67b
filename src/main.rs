use std::{env, process};

use tracing_subscriber::EnvFilter;
use weft::{
    diagnostics::Diagnostic,
    program::Program,
    runtime::{DEFAULT_WORKERS, Runtime, RuntimeConfig, error::WeftError},
};

fn main() {
    let mut args: Vec<String> = env::args().collect();
    let verbose = args.iter().any(|arg| arg == "--verbose");
    let trace = args.iter().any(|arg| arg == "--trace");
    let no_gc = args.iter().any(|arg| arg == "--no-gc");
    if verbose {
        args.retain(|arg| arg != "--verbose");
    }
    if trace {
        args.retain(|arg| arg != "--trace");
    }
    if no_gc {
        args.retain(|arg| arg != "--no-gc");
    }
    let Some(workers) = extract_usize(&mut args, "--workers") else {
        process::exit(1);
    };
    let Some(stack_size) = extract_usize(&mut args, "--stack-size") else {
        process::exit(1);
    };

    init_logging(verbose, trace);

    let mut config = RuntimeConfig::default()
        .with_workers(workers.unwrap_or(DEFAULT_WORKERS))
        .with_gc(!no_gc)
        .with_trace(trace);
    if let Some(stack_size) = stack_size {
        config = config.with_stack_size(stack_size);
    }

    if args.len() < 2 {
        print_help();
        return;
    }

    match args[1].as_str() {
        "-h" | "--help" | "help" => print_help(),
        "run" => {
            let Some(path) = args.get(2) else {
                eprintln!("Usage: weft run <program.json>");
                process::exit(1);
            };
            exit_on_error(run_program(path, config));
        }
        "check" => {
            let Some(path) = args.get(2) else {
                eprintln!("Usage: weft check <program.json>");
                process::exit(1);
            };
            exit_on_error(check_program(path, config));
        }
        other => {
            eprintln!("Error: unknown command `{}`", other);
            print_help();
            process::exit(1);
        }
    }
}

fn print_help() {
    println!(
        "\
Weft runtime

Usage:
  weft run <program.json>
  weft check <program.json>
  weft help

Flags:
  --workers <n>         Worker threads (default: {})
  --stack-size <bytes>  Stack size of each worker thread
  --no-gc               Skip the collection after each firing
  --trace               Log every executed statement
  --verbose             Log start-up and scheduling events
  -h, --help            Show this help message

RUST_LOG overrides the log level when neither --trace nor --verbose is given.
",
        DEFAULT_WORKERS
    );
}

fn init_logging(verbose: bool, trace: bool) {
    let filter = if trace {
        EnvFilter::new("weft=trace")
    } else if verbose {
        EnvFilter::new("weft=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_thread_names(true)
        .init();
}

fn run_program(path: &str, config: RuntimeConfig) -> Result<(), WeftError> {
    let program = Program::load(path)?;
    let mut runtime = Runtime::new(program, config);
    runtime.execute()
}

/// Loads, instantiates, binds and analyzes without running anything.
fn check_program(path: &str, config: RuntimeConfig) -> Result<(), WeftError> {
    let program = Program::load(path)?;
    let mut runtime = Runtime::new(program, config);
    runtime.allocate_instances()?;
    runtime.create_bindings()?;
    runtime.analyze_composition()?;
    println!(
        "{}: {} instances, {} lock plans",
        path,
        runtime.instance_names().len(),
        runtime.lock_plans().map_or(0, |plans| plans.len())
    );
    Ok(())
}

fn exit_on_error(result: Result<(), WeftError>) {
    if let Err(err) = result {
        let diagnostic: Diagnostic = err.to_diagnostic();
        eprint!("{}", diagnostic.render());
        process::exit(1);
    }
}

/// Removes `flag <n>` from `args`. Returns `None` after printing an error
/// when the value is missing or not a number.
fn extract_usize(args: &mut Vec<String>, flag: &str) -> Option<Option<usize>> {
    let mut value = None;
    let mut i = 0;
    while i < args.len() {
        if args[i] == flag {
            if i + 1 >= args.len() {
                eprintln!("Usage: weft run <program.json> {} <n>", flag);
                return None;
            }
            let raw = args.remove(i + 1);
            args.remove(i);
            match raw.parse::<usize>() {
                Ok(parsed) => value = Some(parsed),
                Err(_) => {
                    eprintln!("Error: {} expects a non-negative integer.", flag);
                    return None;
                }
            }
            continue;
        }
        i += 1;
    }
    Some(value)
}
