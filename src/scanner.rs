//! Produces [`Token`]s on demand from a source string. The scanner never
//! builds a full token list; the compiler pulls one token at a time.

use crate::token::{keyword_kind, Literal, Token, TokenKind};

/// Scans Lox source text one token at a time.
///
/// Positions are byte offsets into a `Vec<char>` copy of the source rather
/// than into the raw `&str`, so lookahead (`peek`/`peek_next`) never has to
/// worry about splitting a multi-byte UTF-8 sequence.
pub struct Scanner {
  source: Vec<char>,
  start: usize,
  current: usize,
  line: u32,
}

impl Scanner {
  pub fn new(source: &str) -> Self {
    Self {
      source: source.chars().collect(),
      start: 0,
      current: 0,
      line: 1,
    }
  }

  /// Scans and returns the next token, skipping whitespace and comments
  /// first. Returns a synthetic `Error` token for unterminated strings or
  /// unrecognized characters, and a synthetic `Eof` token once the source is
  /// exhausted. Never panics.
  pub fn next_token(&mut self) -> Token {
    self.skip_whitespace();
    self.start = self.current;

    if self.is_at_end() {
      return self.make_token(TokenKind::Eof);
    }

    let c = self.advance();

    if is_alpha(c) {
      return self.identifier();
    }
    if c.is_ascii_digit() {
      return self.number();
    }

    match c {
      '(' => self.make_token(TokenKind::LeftParen),
      ')' => self.make_token(TokenKind::RightParen),
      '{' => self.make_token(TokenKind::LeftBrace),
      '}' => self.make_token(TokenKind::RightBrace),
      ';' => self.make_token(TokenKind::Semicolon),
      ',' => self.make_token(TokenKind::Comma),
      '.' => self.make_token(TokenKind::Dot),
      '-' => self.make_token(TokenKind::Minus),
      '+' => self.make_token(TokenKind::Plus),
      '/' => self.make_token(TokenKind::Slash),
      '*' => self.make_token(TokenKind::Star),
      '!' => {
        let kind = if self.matches('=') { TokenKind::BangEqual } else { TokenKind::Bang };
        self.make_token(kind)
      }
      '=' => {
        let kind = if self.matches('=') { TokenKind::EqualEqual } else { TokenKind::Equal };
        self.make_token(kind)
      }
      '<' => {
        let kind = if self.matches('=') { TokenKind::LessEqual } else { TokenKind::Less };
        self.make_token(kind)
      }
      '>' => {
        let kind = if self.matches('=') { TokenKind::GreaterEqual } else { TokenKind::Greater };
        self.make_token(kind)
      }
      '"' => self.string(),
      _ => self.error_token(format!("Unexpected character '{}'.", c)),
    }
  }

  fn is_at_end(&self) -> bool {
    self.current >= self.source.len()
  }

  fn advance(&mut self) -> char {
    let c = self.source[self.current];
    self.current += 1;
    c
  }

  fn peek(&self) -> char {
    if self.is_at_end() {
      '\0'
    } else {
      self.source[self.current]
    }
  }

  fn peek_next(&self) -> char {
    if self.current + 1 >= self.source.len() {
      '\0'
    } else {
      self.source[self.current + 1]
    }
  }

  fn matches(&mut self, expected: char) -> bool {
    if self.is_at_end() || self.source[self.current] != expected {
      return false;
    }
    self.current += 1;
    true
  }

  fn skip_whitespace(&mut self) {
    loop {
      match self.peek() {
        ' ' | '\r' | '\t' => {
          self.advance();
        }
        '\n' => {
          self.line += 1;
          self.advance();
        }
        '/' if self.peek_next() == '/' => {
          while self.peek() != '\n' && !self.is_at_end() {
            self.advance();
          }
        }
        _ => return,
      }
    }
  }

  fn lexeme(&self) -> String {
    self.source[self.start..self.current].iter().collect()
  }

  fn make_token(&self, kind: TokenKind) -> Token {
    Token::new(kind, self.lexeme(), self.line)
  }

  fn error_token(&self, message: String) -> Token {
    Token {
      kind: TokenKind::Error,
      lexeme: message,
      literal: Literal::None,
      line: self.line,
    }
  }

  fn string(&mut self) -> Token {
    while self.peek() != '"' && !self.is_at_end() {
      if self.peek() == '\n' {
        self.line += 1;
      }
      self.advance();
    }

    if self.is_at_end() {
      return self.error_token("Unterminated string.".to_string());
    }

    // The closing quote.
    self.advance();

    let text: String = self.source[self.start + 1..self.current - 1].iter().collect();
    let mut tok = self.make_token(TokenKind::String);
    tok.literal = Literal::Str(text);
    tok
  }

  fn number(&mut self) -> Token {
    while self.peek().is_ascii_digit() {
      self.advance();
    }

    if self.peek() == '.' && self.peek_next().is_ascii_digit() {
      // Consume the '.'.
      self.advance();
      while self.peek().is_ascii_digit() {
        self.advance();
      }
    }

    let text = self.lexeme();
    let mut tok = self.make_token(TokenKind::Number);
    // The scanner only ever admits digits and at most one '.', so this
    // always parses; a failure here would be a scanner bug, not bad input.
    tok.literal = Literal::Number(text.parse().expect("scanned number literal must parse"));
    tok
  }

  fn identifier(&mut self) -> Token {
    while is_alpha(self.peek()) || self.peek().is_ascii_digit() {
      self.advance();
    }

    let text = self.lexeme();
    let kind = keyword_kind(&text).unwrap_or(TokenKind::Identifier);
    self.make_token(kind)
  }
}

fn is_alpha(c: char) -> bool {
  c.is_ascii_alphabetic() || c == '_'
}

#[cfg(test)]
mod tests {
  use super::*;

  fn kinds(src: &str) -> Vec<TokenKind> {
    let mut s = Scanner::new(src);
    let mut out = Vec::new();
    loop {
      let tok = s.next_token();
      let done = tok.kind == TokenKind::Eof;
      out.push(tok.kind);
      if done {
        break;
      }
    }
    out
  }

  #[test]
  fn scans_punctuation_and_operators() {
    assert_eq!(
      kinds("(){},.-+;/* ! != = == < <= > >="),
      vec![
        TokenKind::LeftParen,
        TokenKind::RightParen,
        TokenKind::LeftBrace,
        TokenKind::RightBrace,
        TokenKind::Comma,
        TokenKind::Dot,
        TokenKind::Minus,
        TokenKind::Plus,
        TokenKind::Semicolon,
        TokenKind::Slash,
        TokenKind::Star,
        TokenKind::Bang,
        TokenKind::BangEqual,
        TokenKind::Equal,
        TokenKind::EqualEqual,
        TokenKind::Less,
        TokenKind::LessEqual,
        TokenKind::Greater,
        TokenKind::GreaterEqual,
        TokenKind::Eof,
      ]
    );
  }

  #[test]
  fn scans_keywords_and_identifiers() {
    assert_eq!(
      kinds("class orchid"),
      vec![TokenKind::Class, TokenKind::Identifier, TokenKind::Eof]
    );
  }

  #[test]
  fn scans_number_literal() {
    let mut s = Scanner::new("12.5");
    let tok = s.next_token();
    assert_eq!(tok.kind, TokenKind::Number);
    assert_eq!(tok.literal, Literal::Number(12.5));
  }

  #[test]
  fn scans_string_literal_across_lines() {
    let mut s = Scanner::new("\"a\nb\"");
    let tok = s.next_token();
    assert_eq!(tok.kind, TokenKind::String);
    assert_eq!(tok.literal, Literal::Str("a\nb".to_string()));
    assert_eq!(s.next_token().kind, TokenKind::Eof);
  }

  #[test]
  fn unterminated_string_is_an_error_token_not_a_panic() {
    let mut s = Scanner::new("\"abc");
    let tok = s.next_token();
    assert_eq!(tok.kind, TokenKind::Error);
    assert_eq!(tok.lexeme, "Unterminated string.");
  }

  #[test]
  fn skips_line_comments() {
    assert_eq!(kinds("// hello\nvar"), vec![TokenKind::Var, TokenKind::Eof]);
  }

  #[test]
  fn dot_followed_by_digit_is_not_part_of_a_number_without_a_leading_digit() {
    // `.5` has no leading digit, so the dot is its own token and `5` is a
    // separate number — matches the scanner only entering `number()` from a
    // leading ASCII digit.
    assert_eq!(kinds(".5"), vec![TokenKind::Dot, TokenKind::Number, TokenKind::Eof]);
  }
}
