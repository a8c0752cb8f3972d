//! The Pratt-parsing precedence ladder and the table mapping each token kind
//! to its prefix/infix parse functions.

use crate::errors::CompileErrorKind;
use crate::token::TokenKind;

use super::expressions;
use super::functions;
use super::Compiler;

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Eq, Ord)]
pub enum Precedence {
  None,
  Assignment, // =
  Or,         // or
  And,        // and
  Equality,   // == !=
  Comparison, // < > <= >=
  Term,       // + -
  Factor,     // * /
  Unary,      // ! -
  Call,       // . ()
  Primary,
}

impl Precedence {
  /// One level up, used when compiling a binary operator's right-hand side
  /// so that `a + b + c` associates left (`(a + b) + c`).
  pub(super) fn next(self) -> Precedence {
    match self {
      Precedence::None => Precedence::Assignment,
      Precedence::Assignment => Precedence::Or,
      Precedence::Or => Precedence::And,
      Precedence::And => Precedence::Equality,
      Precedence::Equality => Precedence::Comparison,
      Precedence::Comparison => Precedence::Term,
      Precedence::Term => Precedence::Factor,
      Precedence::Factor => Precedence::Unary,
      Precedence::Unary => Precedence::Call,
      Precedence::Call => Precedence::Primary,
      Precedence::Primary => Precedence::Primary,
    }
  }
}

type ParseFn = fn(&mut Compiler, bool);

pub struct ParseRule {
  pub prefix: Option<ParseFn>,
  pub infix: Option<ParseFn>,
  pub precedence: Precedence,
}

fn rule(prefix: Option<ParseFn>, infix: Option<ParseFn>, precedence: Precedence) -> ParseRule {
  ParseRule { prefix, infix, precedence }
}

pub(super) fn get_rule(kind: TokenKind) -> ParseRule {
  use Precedence::*;
  use TokenKind::*;

  match kind {
    LeftParen => rule(Some(expressions::grouping), Some(expressions::call), Call),
    Dot => rule(None, Some(expressions::dot), Call),
    Minus => rule(Some(expressions::unary), Some(expressions::binary), Term),
    Plus => rule(None, Some(expressions::binary), Term),
    Slash => rule(None, Some(expressions::binary), Factor),
    Star => rule(None, Some(expressions::binary), Factor),
    Bang => rule(Some(expressions::unary), None, None),
    BangEqual => rule(None, Some(expressions::binary), Equality),
    EqualEqual => rule(None, Some(expressions::binary), Equality),
    Greater => rule(None, Some(expressions::binary), Comparison),
    GreaterEqual => rule(None, Some(expressions::binary), Comparison),
    Less => rule(None, Some(expressions::binary), Comparison),
    LessEqual => rule(None, Some(expressions::binary), Comparison),
    Identifier => rule(Some(expressions::variable), None, None),
    String => rule(Some(expressions::string), None, None),
    Number => rule(Some(expressions::number), None, None),
    And => rule(None, Some(expressions::and_), Precedence::And),
    Or => rule(None, Some(expressions::or_), Precedence::Or),
    False => rule(Some(expressions::literal), None, None),
    Nil => rule(Some(expressions::literal), None, None),
    True => rule(Some(expressions::literal), None, None),
    This => rule(Some(functions::this_), None, None),
    Super => rule(Some(functions::super_), None, None),
    _ => rule(None, None, None),
  }
}

impl Compiler {
  pub(super) fn parse_precedence(&mut self, precedence: Precedence) {
    self.advance();
    let prefix_rule = get_rule(self.previous.kind).prefix;
    let Some(prefix_rule) = prefix_rule else {
      self.error(CompileErrorKind::ExpectedExpression);
      return;
    };

    let can_assign = precedence <= Precedence::Assignment;
    prefix_rule(self, can_assign);

    while precedence <= get_rule(self.current.kind).precedence {
      self.advance();
      let infix_rule = get_rule(self.previous.kind)
        .infix
        .expect("token reached via precedence climb must have an infix rule");
      infix_rule(self, can_assign);
    }

    if can_assign && self.matches(TokenKind::Equal) {
      self.error(CompileErrorKind::InvalidAssignmentTarget);
    }
  }

  pub(super) fn parse_expression(&mut self) {
    self.parse_precedence(Precedence::Assignment);
  }
}
