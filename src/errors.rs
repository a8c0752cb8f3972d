//! Error formatting for both compile-time and run-time failures.
//!
//! Compile errors are reported as they're found (panic-mode keeps the
//! compiler going so it can report more than one); runtime errors abort the
//! program immediately, so there is only ever one to report. Both are
//! printed to stderr — `print`'s own output goes to the caller-supplied
//! writer instead, never interleaved with diagnostics.

use log::error;
use thiserror::Error;

use crate::token::{Token, TokenKind};
use crate::vm::call_frame::CallFrame;

/// Every distinct shape of compile-time diagnostic the compiler can raise.
/// `Syntax` covers the many token-expectation messages `consume()` builds
/// ad hoc (`"Expect ';' after value."` and friends) and the scanner errors
/// `advance()` forwards (`"Unterminated string."`); everything else here is
/// a resolution error the compiler detects semantically rather than from a
/// single expected-token mismatch, so it gets its own variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileErrorKind {
  #[error("{0}")]
  Syntax(String),
  #[error("Expect expression.")]
  ExpectedExpression,
  #[error("Invalid assignment target.")]
  InvalidAssignmentTarget,
  #[error("Too many constants in one chunk.")]
  TooManyConstants,
  #[error("Too many local variables in function.")]
  TooManyLocals,
  #[error("Too many closure variables in function.")]
  TooManyUpvalues,
  #[error("Can't have more than 255 parameters.")]
  TooManyParameters,
  #[error("Can't have more than 255 arguments.")]
  TooManyArguments,
  #[error("Already a variable with this name in this scope.")]
  DuplicateLocalBinding,
  #[error("Can't read local variable in its own initializer.")]
  SelfReferentialLocalInitializer,
  #[error("Loop body too large.")]
  LoopBodyTooLarge,
  #[error("A class can't inherit from itself.")]
  ClassInheritsFromItself,
  #[error("Can't use 'this' outside of a class.")]
  ThisOutsideClass,
  #[error("Can't use 'super' outside of a class.")]
  SuperOutsideClass,
  #[error("Can't use 'super' in a class with no superclass.")]
  SuperWithoutSuperclass,
  #[error("Can't return from top-level code.")]
  ReturnOutsideFunction,
  #[error("Can't return a value from an initializer.")]
  ReturnValueFromInitializer,
}

/// Every distinct shape of runtime failure the VM can raise. `Type` covers
/// the operand-type checks shared by `vm::arithmetic`'s helpers; `Native`
/// carries whatever message a host-provided native function chose to raise.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeErrorKind {
  #[error("{0}")]
  Type(String),
  #[error("{0}")]
  Native(String),
  #[error("Undefined variable '{0}'.")]
  UndefinedVariable(String),
  #[error("Undefined property '{0}'.")]
  UndefinedProperty(String),
  #[error("Only instances have properties.")]
  NotAnInstance,
  #[error("Only instances have fields.")]
  NoFields,
  #[error("Only instances have methods.")]
  NoMethods,
  #[error("Superclass must be a class.")]
  SuperclassMustBeAClass,
  #[error("Can only call functions and classes.")]
  NotCallable,
  #[error("Expected {expected} arguments but got {got}.")]
  ArityMismatch { expected: u8, got: u8 },
  #[error("Stack overflow.")]
  StackOverflow,
  #[error("Failed to write output: {0}")]
  Io(String),
}

/// The compiler's own wrapper is just `had_error: bool`; this type exists so
/// runtime failures have a real `std::error::Error` to carry through
/// `lib.rs`'s public API instead of a bare string.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct RuntimeError {
  pub kind: RuntimeErrorKind,
  pub message: String,
}

impl RuntimeError {
  pub fn new(kind: RuntimeErrorKind) -> Self {
    let message = kind.to_string();
    Self { kind, message }
  }
}

/// Prints `[line L] Error at '<lexeme>': <message>` (or the `at end`/bare
/// forms for `Eof`/`Error` tokens) to stderr, matching the line the failing
/// token started on.
pub fn report_compile_error(token: &Token, kind: &CompileErrorKind) {
  let message = kind.to_string();
  error!(target: "loxide::compiler", "line {}: {}", token.line, message);

  match token.kind {
    TokenKind::Eof => eprintln!("[line {}] Error at end: {}", token.line, message),
    TokenKind::Error => eprintln!("[line {}] Error: {}", token.line, message),
    _ => eprintln!("[line {}] Error at '{}': {}", token.line, token.lexeme, message),
  }
}

/// Prints the runtime error message followed by a stack trace, innermost
/// frame first, down to `script` for the top level. `line` is the source
/// line the faulting instruction in the innermost frame maps to; each
/// enclosing frame's own line is recovered from its own (already-advanced)
/// instruction pointer.
pub fn report_runtime_error(frames: &[CallFrame], line: u32, message: &str) {
  error!(target: "loxide::vm", "line {}: {}", line, message);
  eprintln!("{}", message);

  for (i, frame) in frames.iter().enumerate().rev() {
    let frame_line = if i == frames.len() - 1 {
      line
    } else {
      frame.closure.function.chunk.get_line(frame.ip.saturating_sub(1))
    };
    eprintln!("[line {}] in {}", frame_line, frame.function_name());
  }
}

/// The top-level result of compiling and running one program. Carries
/// enough to pick an exit code (§6: 65 for compile errors, 70 for runtime
/// ones) without the caller re-deriving it from a bare `()`.
#[derive(Debug, Error)]
pub enum InterpretError {
  #[error("compile error")]
  Compile,
  #[error(transparent)]
  Runtime(#[from] RuntimeError),
}

