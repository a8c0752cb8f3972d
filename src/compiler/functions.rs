//! Function and method bodies, and class declarations.

use crate::chunk::OpCode;
use crate::errors::CompileErrorKind;
use crate::token::{Token, TokenKind};
use crate::value::Value;

use super::{ClassState, Compiler, FunctionKind, FunctionState};

impl Compiler {
  pub(super) fn fun_declaration(&mut self) {
    let global_idx = self.parse_variable("Expect function name.");
    self.mark_initialized();
    self.function(FunctionKind::Function);
    self.define_variable(global_idx);
  }

  /// Compiles a function's parameter list and body as a nested
  /// `FunctionState`, then emits a `Closure` instruction in the *enclosing*
  /// function that wraps it, followed by one `(index, is_local)` byte pair
  /// per captured upvalue for the VM to resolve at closure-creation time.
  pub(super) fn function(&mut self, kind: FunctionKind) {
    let name = self.previous.lexeme.clone();
    self.functions.push(FunctionState::new(name, kind));
    self.begin_scope();

    self.consume(TokenKind::LeftParen, "Expect '(' after function name.");
    if !self.check(TokenKind::RightParen) {
      loop {
        let fun = self.current_fn();
        fun.arity += 1;
        if fun.arity > 255 {
          self.error_at_current(CompileErrorKind::TooManyParameters);
        }
        let param_idx = self.parse_variable("Expect parameter name.");
        self.define_variable(param_idx);
        if !self.matches(TokenKind::Comma) {
          break;
        }
      }
    }
    self.consume(TokenKind::RightParen, "Expect ')' after parameters.");
    self.consume(TokenKind::LeftBrace, "Expect '{' before function body.");
    self.block();

    let upvalues: Vec<_> = self.functions.last().unwrap().upvalues.clone();
    let function = self.finish_function();
    let const_idx = match self.current_chunk().add_constant(Value::Obj(crate::value::Obj::Function(
      std::rc::Rc::new(function),
    ))) {
      Ok(idx) => idx,
      Err(_) => {
        self.error(CompileErrorKind::TooManyConstants);
        0
      }
    };
    self.emit_op(OpCode::Closure);
    self.emit_byte(const_idx);

    for upvalue in upvalues {
      self.emit_byte(if upvalue.is_local { 1 } else { 0 });
      self.emit_byte(upvalue.index);
    }
  }

  pub(super) fn class_declaration(&mut self) {
    self.consume(TokenKind::Identifier, "Expect class name.");
    let class_name = self.previous.clone();
    let name_idx = self.identifier_constant(&class_name.lexeme);
    self.declare_variable(&class_name);

    self.emit_op(OpCode::Class);
    self.emit_byte(name_idx);
    self.define_variable(name_idx);

    self.classes.push(ClassState { has_superclass: false });

    if self.matches(TokenKind::Less) {
      self.consume(TokenKind::Identifier, "Expect superclass name.");
      let super_name = self.previous.clone();
      super::expressions::variable(self, false);

      if super_name.lexeme == class_name.lexeme {
        self.error(CompileErrorKind::ClassInheritsFromItself);
      }

      self.begin_scope();
      self.add_local_synthetic("super");
      self.define_variable(0);

      self.named_variable(&class_name, false);
      self.emit_op(OpCode::Inherit);
      self.classes.last_mut().unwrap().has_superclass = true;
    }

    self.named_variable(&class_name, false);
    self.consume(TokenKind::LeftBrace, "Expect '{' before class body.");
    while !self.check(TokenKind::RightBrace) && !self.check(TokenKind::Eof) {
      self.method();
    }
    self.consume(TokenKind::RightBrace, "Expect '}' after class body.");
    self.emit_op(OpCode::Pop); // the class itself, pushed by named_variable above

    let class_state = self.classes.pop().unwrap();
    if class_state.has_superclass {
      self.end_scope();
    }
  }

  fn method(&mut self) {
    self.consume(TokenKind::Identifier, "Expect method name.");
    let name = self.previous.lexeme.clone();
    let name_idx = self.identifier_constant(&name);

    let kind = if name == "init" { FunctionKind::Initializer } else { FunctionKind::Method };
    self.function(kind);

    self.emit_op(OpCode::Method);
    self.emit_byte(name_idx);
  }

  fn add_local_synthetic(&mut self, name: &str) {
    let token = Token::synthetic(TokenKind::Identifier, name);
    self.declare_variable(&token);
  }
}

pub(super) fn this_(c: &mut Compiler, _can_assign: bool) {
  if c.classes.is_empty() {
    c.error(CompileErrorKind::ThisOutsideClass);
    return;
  }
  let token = Token::synthetic(TokenKind::Identifier, "this");
  c.named_variable(&token, false);
}

pub(super) fn super_(c: &mut Compiler, _can_assign: bool) {
  match c.classes.last() {
    None => c.error(CompileErrorKind::SuperOutsideClass),
    Some(class) if !class.has_superclass => c.error(CompileErrorKind::SuperWithoutSuperclass),
    _ => {}
  }

  c.consume(TokenKind::Dot, "Expect '.' after 'super'.");
  c.consume(TokenKind::Identifier, "Expect superclass method name.");
  let name_idx = c.identifier_constant(&c.previous.lexeme.clone());

  let this_token = Token::synthetic(TokenKind::Identifier, "this");
  c.named_variable(&this_token, false);

  if c.matches(TokenKind::LeftParen) {
    let arg_count = c.argument_list();
    let super_token = Token::synthetic(TokenKind::Identifier, "super");
    c.named_variable(&super_token, false);
    c.emit_op(OpCode::SuperInvoke);
    c.emit_byte(name_idx);
    c.emit_byte(arg_count);
  } else {
    let super_token = Token::synthetic(TokenKind::Identifier, "super");
    c.named_variable(&super_token, false);
    c.emit_op(OpCode::GetSuper);
    c.emit_byte(name_idx);
  }
}
