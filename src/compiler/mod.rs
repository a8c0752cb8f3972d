//! The single-pass Pratt compiler: turns a token stream directly into
//! bytecode, with no intermediate AST.
//!
//! Compilation state is split into two independent stacks held by the
//! top-level [`Compiler`]:
//! - `functions`, one [`FunctionState`] per function currently being
//!   compiled (innermost last), standing in for the "one `Compiler` instance
//!   nested per function" design — modeled as a `Vec` rather than boxed
//!   `enclosing` pointers, which sidesteps self-referential ownership for no
//!   change in behavior.
//! - `classes`, one [`ClassState`] per class body currently open, used to
//!   validate `this`/`super`.

mod expressions;
mod functions;
mod loops;
mod precedence;
mod resolver;
mod statements;

use log::debug;

use crate::chunk::{Chunk, OpCode};
use crate::errors::{report_compile_error, CompileErrorKind};
use crate::scanner::Scanner;
use crate::token::{Token, TokenKind};
use crate::value::{FunctionObj, Value};

pub use precedence::Precedence;

/// What kind of function is currently being compiled; governs implicit
/// returns and whether `return <expr>;` / bare top-level `return` are legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
  Script,
  Function,
  Method,
  Initializer,
}

/// A resolved local variable slot.
struct Local {
  name: String,
  /// `-1` while the local is declared but its initializer hasn't finished
  /// compiling yet; reading it in that state is a compile error.
  depth: i32,
  is_captured: bool,
}

/// One entry of a function's upvalue list, built while resolving names that
/// live in an enclosing function rather than the current one.
#[derive(Clone, Copy)]
struct UpvalueDesc {
  index: u8,
  is_local: bool,
}

struct FunctionState {
  chunk: Chunk,
  name: String,
  arity: u8,
  kind: FunctionKind,
  locals: Vec<Local>,
  upvalues: Vec<UpvalueDesc>,
  scope_depth: i32,
}

impl FunctionState {
  fn new(name: String, kind: FunctionKind) -> Self {
    // Slot 0 is reserved for the function itself (or the receiver, for
    // methods) and is never addressable by a user-written local.
    let reserved_name = if kind == FunctionKind::Method || kind == FunctionKind::Initializer {
      "this"
    } else {
      ""
    };

    Self {
      chunk: Chunk::new(),
      name,
      arity: 0,
      kind,
      locals: vec![Local {
        name: reserved_name.to_string(),
        depth: 0,
        is_captured: false,
      }],
      upvalues: Vec::new(),
      scope_depth: 0,
    }
  }
}

struct ClassState {
  has_superclass: bool,
}

/// The compiler's own errors are collected via `had_error`/`panic_mode`
/// rather than `Result`, matching the single-pass "keep going, report
/// everything you can" design panic-mode synchronization calls for.
pub struct Compiler {
  scanner: Scanner,
  previous: Token,
  current: Token,
  had_error: bool,
  panic_mode: bool,
  functions: Vec<FunctionState>,
  classes: Vec<ClassState>,
}

impl Compiler {
  /// Compiles a complete source string into a top-level script function.
  /// Returns `Err(())` if any compile error was reported; the caller should
  /// not attempt to run the VM in that case.
  pub fn compile(source: &str) -> Result<FunctionObj, ()> {
    let mut compiler = Self {
      scanner: Scanner::new(source),
      previous: Token::synthetic(TokenKind::Eof, ""),
      current: Token::synthetic(TokenKind::Eof, ""),
      had_error: false,
      panic_mode: false,
      functions: vec![FunctionState::new("script".to_string(), FunctionKind::Script)],
      classes: Vec::new(),
    };

    debug!("compiling script");
    compiler.advance();
    while !compiler.matches(TokenKind::Eof) {
      compiler.declaration();
    }

    let function = compiler.finish_function();

    if compiler.had_error {
      Err(())
    } else {
      Ok(function)
    }
  }

  fn current_fn(&mut self) -> &mut FunctionState {
    self.functions.last_mut().expect("at least the script FunctionState is always present")
  }

  fn current_chunk(&mut self) -> &mut Chunk {
    &mut self.current_fn().chunk
  }

  pub(super) fn current_chunk_len(&mut self) -> usize {
    self.current_chunk().len()
  }

  fn function_kind(&self) -> FunctionKind {
    self.functions.last().expect("function stack is never empty").kind
  }

  // ---- token stream -------------------------------------------------

  fn advance(&mut self) {
    std::mem::swap(&mut self.previous, &mut self.current);

    loop {
      self.current = self.scanner.next_token();
      if self.current.kind != TokenKind::Error {
        break;
      }
      let message = self.current.lexeme.clone();
      self.error_at_current(CompileErrorKind::Syntax(message));
    }
  }

  fn check(&self, kind: TokenKind) -> bool {
    self.current.kind == kind
  }

  fn matches(&mut self, kind: TokenKind) -> bool {
    if !self.check(kind) {
      return false;
    }
    self.advance();
    true
  }

  fn consume(&mut self, kind: TokenKind, message: &str) {
    if self.current.kind == kind {
      self.advance();
    } else {
      self.error_at_current(CompileErrorKind::Syntax(message.to_string()));
    }
  }

  // ---- error reporting / panic-mode synchronization ------------------

  fn error_at_current(&mut self, kind: CompileErrorKind) {
    let token = self.current.clone();
    self.error_at(&token, kind);
  }

  fn error(&mut self, kind: CompileErrorKind) {
    let token = self.previous.clone();
    self.error_at(&token, kind);
  }

  fn error_at(&mut self, token: &Token, kind: CompileErrorKind) {
    if self.panic_mode {
      return;
    }
    self.panic_mode = true;
    self.had_error = true;
    report_compile_error(token, &kind);
  }

  fn synchronize(&mut self) {
    self.panic_mode = false;

    while self.current.kind != TokenKind::Eof {
      if self.previous.kind == TokenKind::Semicolon {
        return;
      }
      match self.current.kind {
        TokenKind::Class
        | TokenKind::Fun
        | TokenKind::Var
        | TokenKind::For
        | TokenKind::If
        | TokenKind::While
        | TokenKind::Print
        | TokenKind::Return => return,
        _ => {
          self.advance();
        }
      }
    }
  }

  // ---- bytecode emission --------------------------------------------

  fn emit_byte(&mut self, byte: u8) {
    let line = self.previous.line;
    self.current_chunk().write_byte(byte, line);
  }

  fn emit_op(&mut self, op: OpCode) {
    let line = self.previous.line;
    self.current_chunk().write_op(op, line);
  }

  fn emit_ops(&mut self, a: OpCode, b: OpCode) {
    self.emit_op(a);
    self.emit_op(b);
  }

  /// Emits an opcode followed by a two-byte placeholder operand, returning
  /// the offset of the placeholder's first byte for a later `patch_jump`.
  fn emit_jump(&mut self, op: OpCode) -> usize {
    self.emit_op(op);
    self.emit_byte(0xff);
    self.emit_byte(0xff);
    self.current_chunk().len() - 2
  }

  fn patch_jump(&mut self, offset: usize) {
    self.current_chunk().patch_jump(offset);
  }

  fn emit_loop(&mut self, loop_start: usize) {
    self.emit_op(OpCode::Loop);
    let jump = self.current_chunk().len() - loop_start + 2;
    if jump > u16::MAX as usize {
      self.error(CompileErrorKind::LoopBodyTooLarge);
    }
    self.emit_byte((jump >> 8) as u8);
    self.emit_byte(jump as u8);
  }

  fn emit_constant(&mut self, value: Value) {
    match self.current_chunk().add_constant(value) {
      Ok(index) => {
        self.emit_op(OpCode::Constant);
        self.emit_byte(index);
      }
      Err(_) => self.error(CompileErrorKind::TooManyConstants),
    }
  }

  fn emit_return(&mut self) {
    if self.function_kind() == FunctionKind::Initializer {
      // Bare `return;` in an initializer returns `this` (slot 0), not nil.
      self.emit_op(OpCode::GetLocal);
      self.emit_byte(0);
    } else {
      self.emit_op(OpCode::Nil);
    }
    self.emit_op(OpCode::Return);
  }

  /// Pops the innermost `FunctionState`, emits its implicit final return,
  /// and returns the finished `FunctionObj`.
  fn finish_function(&mut self) -> FunctionObj {
    self.emit_return();
    let state = self.functions.pop().expect("pushed function must be present to finish");
    debug!(target: "loxide::compiler", "finished compiling '{}' ({} upvalues)", state.name, state.upvalues.len());
    FunctionObj {
      arity: state.arity,
      chunk: state.chunk,
      name: state.name,
      upvalue_count: state.upvalues.len(),
    }
  }
}
