/*!
  The scanner turns assembly text into a stream of tokens.

  Tokens are separated by whitespace and commas. `;` starts a comment that runs to the end of
  the line, and `( ... )` is an annotation that is skipped entirely. A `"` starts a string
  literal. Every token records the line and column of its first character, counting from 1;
  positions are only used for diagnostics.
*/

use std::str::Chars;

use super::error::{AssemblerError, AssemblerErrorKind};

/// The longest token, in bytes, the scanner accepts.
pub const MAX_TOKEN_LENGTH: usize = 255;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TokenValue {
  /// A bare word: a mnemonic, register, number, label or variable.
  Word(String),
  /// A string literal with its escapes already decoded.
  String(Vec<u8>),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Token {
  pub value  : TokenValue,
  pub line   : usize,
  pub column : usize,
}

impl Token {
  /// The text of a bare word, or `None` for a string literal.
  pub fn word(&self) -> Option<&str> {
    match &self.value {
      TokenValue::Word(text) => Some(text.as_str()),
      TokenValue::String(_)  => None
    }
  }

  pub fn error(&self, kind: AssemblerErrorKind) -> AssemblerError {
    AssemblerError::new(kind, self.line, self.column)
  }
}

/// A character iterator with one character of lookahead that tracks its position.
#[derive(Debug)]
struct CharIter<'d> {
  chars     : Chars<'d>,
  next_char : Option<char>,
  line      : usize,
  column    : usize,
}

impl<'d> Iterator for CharIter<'d> {
  type Item = char;

  fn next(&mut self) -> Option<char> {
    let c = match self.next_char.take() {
      None => self.chars.next(),
      c    => c
    };
    match c {
      Some('\n') => {
        self.line  += 1;
        self.column = 1;
      }
      Some(_)    => self.column += 1,
      None       => {}
    }
    c
  }
}

impl<'d> CharIter<'d> {
  fn new(text: &'d str) -> Self {
    CharIter {
      chars     : text.chars(),
      next_char : None,
      line      : 1,
      column    : 1
    }
  }

  /// Returns the next character without consuming it.
  fn peek(&mut self) -> Option<char> {
    if self.next_char.is_none() {
      self.next_char = self.chars.next();
    }
    self.next_char
  }

  /// Consumes characters up to, but not including, the first one matching `pred`.
  fn skip_until(&mut self, pred: fn(char) -> bool) {
    while let Some(c) = self.peek() {
      if pred(c) {
        break;
      }
      self.next();
    }
  }
}

fn is_separator(c: char) -> bool {
  c.is_whitespace() || c == ','
}

/// Characters that end a bare word.
fn ends_word(c: char) -> bool {
  is_separator(c) || c == ';' || c == '(' || c == '"'
}

pub struct Scanner<'d> {
  chars: CharIter<'d>,
}

impl<'d> Scanner<'d> {
  pub fn new(text: &'d str) -> Scanner<'d> {
    Scanner {
      chars: CharIter::new(text)
    }
  }

  fn word(&mut self, line: usize, column: usize) -> Result<Token, AssemblerError> {
    let mut text = String::new();
    while let Some(c) = self.chars.peek() {
      if ends_word(c) {
        break;
      }
      text.push(c);
      self.chars.next();
      if text.len() > MAX_TOKEN_LENGTH {
        return Err(AssemblerError::new(AssemblerErrorKind::StringTooLong, line, column));
      }
    }
    Ok(Token { value: TokenValue::Word(text), line, column })
  }

  fn string(&mut self, line: usize, column: usize) -> Result<Token, AssemblerError> {
    let error = |kind: AssemblerErrorKind| AssemblerError::new(kind, line, column);
    // Opening quote
    self.chars.next();

    let mut bytes = Vec::new();
    loop {
      let c = match self.chars.next() {
        | None
        | Some('\n') => {
          return Err(
            error(AssemblerErrorKind::InvalidStringParse).with_extra("unterminated string literal")
          );
        }
        Some('"')    => break,
        Some('\\')   => {
          match self.chars.next() {
            Some('n')  => '\n',
            Some('t')  => '\t',
            Some('r')  => '\r',
            Some('0')  => '\0',
            Some('\\') => '\\',
            Some('"')  => '"',
            Some('\'') => '\'',
            Some(other) => {
              return Err(
                error(AssemblerErrorKind::InvalidStringParse)
                  .with_extra(format!("unknown escape `\\{}`", other))
              );
            }
            None => {
              return Err(
                error(AssemblerErrorKind::InvalidStringParse).with_extra("unterminated string literal")
              );
            }
          }
        }
        Some(c)      => c
      };

      let mut buffer = [0u8; 4];
      bytes.extend_from_slice(c.encode_utf8(&mut buffer).as_bytes());
      if bytes.len() > MAX_TOKEN_LENGTH {
        return Err(error(AssemblerErrorKind::StringTooLong));
      }
    }

    Ok(Token { value: TokenValue::String(bytes), line, column })
  }
}

impl<'d> Iterator for Scanner<'d> {
  type Item = Result<Token, AssemblerError>;

  fn next(&mut self) -> Option<Self::Item> {
    loop {
      let c = self.chars.peek()?;
      let (line, column) = (self.chars.line, self.chars.column);

      match c {

        c if is_separator(c) => {
          self.chars.next();
        }

        ';' => {
          self.chars.skip_until(|c| c == '\n');
        }

        '(' => {
          // An unclosed annotation runs to the end of the input.
          self.chars.skip_until(|c| c == ')');
          self.chars.next();
        }

        '"' => return Some(self.string(line, column)),

        _   => return Some(self.word(line, column)),

      } // end match on next character
    } // end loop
  }
}
