//! `loxide` — run a Lox script file, or start a REPL with none given.

use std::io::{self, BufRead, Write};
use std::process::ExitCode;

use loxide::InterpretError;

fn main() -> ExitCode {
  env_logger::init();

  let args: Vec<String> = std::env::args().collect();
  match args.as_slice() {
    [_] => run_repl(),
    [_, path] => run_file(path),
    _ => {
      eprintln!("Usage: loxide [path]");
      ExitCode::from(64)
    }
  }
}

fn run_file(path: &str) -> ExitCode {
  let source = match std::fs::read_to_string(path) {
    Ok(source) => source,
    Err(e) => {
      eprintln!("Could not read file '{}': {}", path, e);
      return ExitCode::from(74);
    }
  };

  let stdout = io::stdout();
  let mut handle = stdout.lock();
  match loxide::interpret(&source, &mut handle) {
    Ok(()) => ExitCode::from(0),
    Err(InterpretError::Compile) => ExitCode::from(65),
    Err(InterpretError::Runtime(_)) => ExitCode::from(70),
  }
}

/// Reads one line at a time, compiling and running each as a complete
/// program. Error state never carries over between lines — a bad line
/// prints its diagnostics and the session keeps going.
fn run_repl() -> ExitCode {
  let stdin = io::stdin();
  let stdout = io::stdout();
  let mut out = stdout.lock();

  loop {
    print!("> ");
    if io::stdout().flush().is_err() {
      break;
    }

    let mut line = String::new();
    match stdin.lock().read_line(&mut line) {
      Ok(0) => break, // EOF
      Ok(_) => {}
      Err(_) => break,
    }

    if line.trim().is_empty() {
      break;
    }

    let _ = loxide::interpret(&line, &mut out);
  }

  ExitCode::from(0)
}
