//! Lox, as a single-pass bytecode compiler plus a stack-based virtual
//! machine. `interpret` is the one entry point the CLI (and tests) need:
//! compile a source string, then run it, writing `print` output to whatever
//! writer the caller supplies.

pub mod chunk;
pub mod compiler;
pub mod errors;
pub mod natives;
pub mod scanner;
pub mod token;
pub mod value;
pub mod vm;

use std::io::Write;

use log::debug;

pub use errors::InterpretError;

/// Compiles `source` and, if compilation succeeded, runs it to completion.
/// `stdout` receives every `print`ed line; diagnostics (compile errors,
/// runtime error + stack trace) always go to stderr regardless of `stdout`.
pub fn interpret<W: Write>(source: &str, stdout: &mut W) -> Result<(), InterpretError> {
  let function = compiler::Compiler::compile(source).map_err(|_| InterpretError::Compile)?;
  debug!(target: "loxide", "compiled '{}', {} bytes", function.name, function.chunk.len());

  let mut vm = vm::VM::new(stdout);
  vm.interpret(function)?;
  Ok(())
}
