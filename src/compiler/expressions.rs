//! Prefix and infix parse functions: the leaves and operators of the Pratt
//! table. Each function consumes exactly the tokens of the expression form
//! it's named for and emits the bytecode for it directly — there is no
//! intermediate expression tree.

use crate::chunk::OpCode;
use crate::token::{Literal, TokenKind};
use crate::value::Value;

use super::precedence::{get_rule, Precedence};
use super::Compiler;

pub(super) fn grouping(c: &mut Compiler, _can_assign: bool) {
  c.parse_expression();
  c.consume(TokenKind::RightParen, "Expect ')' after expression.");
}

pub(super) fn unary(c: &mut Compiler, _can_assign: bool) {
  let op_kind = c.previous.kind;
  c.parse_precedence(Precedence::Unary);

  match op_kind {
    TokenKind::Bang => c.emit_op(OpCode::Not),
    TokenKind::Minus => c.emit_op(OpCode::Negate),
    _ => unreachable!("unary() only registered for Bang and Minus"),
  }
}

pub(super) fn binary(c: &mut Compiler, _can_assign: bool) {
  let op_kind = c.previous.kind;
  let rule = get_rule(op_kind);
  c.parse_precedence(rule.precedence.next());

  match op_kind {
    TokenKind::Plus => c.emit_op(OpCode::Add),
    TokenKind::Minus => c.emit_op(OpCode::Subtract),
    TokenKind::Star => c.emit_op(OpCode::Multiply),
    TokenKind::Slash => c.emit_op(OpCode::Divide),
    TokenKind::BangEqual => c.emit_ops(OpCode::Equal, OpCode::Not),
    TokenKind::EqualEqual => c.emit_op(OpCode::Equal),
    TokenKind::Greater => c.emit_op(OpCode::Greater),
    TokenKind::GreaterEqual => c.emit_ops(OpCode::Less, OpCode::Not),
    TokenKind::Less => c.emit_op(OpCode::Less),
    TokenKind::LessEqual => c.emit_ops(OpCode::Greater, OpCode::Not),
    _ => unreachable!("binary() only registered for arithmetic/comparison operators"),
  }
}

pub(super) fn number(c: &mut Compiler, _can_assign: bool) {
  let n = match c.previous.literal {
    Literal::Number(n) => n,
    _ => unreachable!("Number tokens always carry a Literal::Number"),
  };
  c.emit_constant(Value::Number(n));
}

pub(super) fn string(c: &mut Compiler, _can_assign: bool) {
  let s = match &c.previous.literal {
    Literal::Str(s) => s.clone(),
    _ => unreachable!("String tokens always carry a Literal::Str"),
  };
  c.emit_constant(Value::from(s));
}

pub(super) fn literal(c: &mut Compiler, _can_assign: bool) {
  match c.previous.kind {
    TokenKind::False => c.emit_op(OpCode::False),
    TokenKind::Nil => c.emit_op(OpCode::Nil),
    TokenKind::True => c.emit_op(OpCode::True),
    _ => unreachable!("literal() only registered for false/nil/true"),
  }
}

pub(super) fn variable(c: &mut Compiler, can_assign: bool) {
  let name = c.previous.clone();
  c.named_variable(&name, can_assign);
}

pub(super) fn and_(c: &mut Compiler, _can_assign: bool) {
  // Short-circuit: if the left operand is falsey, its value is already on
  // the stack and becomes the result; otherwise discard it and evaluate the
  // right operand.
  let end_jump = c.emit_jump(OpCode::JumpIfFalse);
  c.emit_op(OpCode::Pop);
  c.parse_precedence(Precedence::And);
  c.patch_jump(end_jump);
}

pub(super) fn or_(c: &mut Compiler, _can_assign: bool) {
  let else_jump = c.emit_jump(OpCode::JumpIfFalse);
  let end_jump = c.emit_jump(OpCode::Jump);
  c.patch_jump(else_jump);
  c.emit_op(OpCode::Pop);
  c.parse_precedence(Precedence::Or);
  c.patch_jump(end_jump);
}

pub(super) fn call(c: &mut Compiler, _can_assign: bool) {
  let arg_count = c.argument_list();
  c.emit_op(OpCode::Call);
  c.emit_byte(arg_count);
}

pub(super) fn dot(c: &mut Compiler, can_assign: bool) {
  c.consume(TokenKind::Identifier, "Expect property name after '.'.");
  let name = c.previous.lexeme.clone();
  let name_idx = c.identifier_constant(&name);

  if can_assign && c.matches(TokenKind::Equal) {
    c.parse_expression();
    c.emit_op(OpCode::SetProperty);
    c.emit_byte(name_idx);
  } else if c.matches(TokenKind::LeftParen) {
    // `receiver.method(args)` fuses the property lookup and the call into
    // one Invoke instruction rather than GetProperty+Call, skipping the
    // intermediate bound-method allocation.
    let arg_count = c.argument_list();
    c.emit_op(OpCode::Invoke);
    c.emit_byte(name_idx);
    c.emit_byte(arg_count);
  } else {
    c.emit_op(OpCode::GetProperty);
    c.emit_byte(name_idx);
  }
}
