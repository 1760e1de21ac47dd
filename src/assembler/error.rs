use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, Eq, PartialEq, Hash)]
pub enum AssemblerErrorKind {
  #[error("String too long")]
  StringTooLong,
  #[error("Invalid opcode during parsing")]
  InvalidOpcodeParse,
  #[error("Invalid register during parsing")]
  InvalidRegisterParse,
  #[error("Invalid word during parsing")]
  InvalidWordParse,
  #[error("Invalid byte during parsing")]
  InvalidByteParse,
  #[error("Invalid short during parsing")]
  InvalidShortParse,
  #[error("Invalid label during parsing")]
  InvalidLabelParse,
  #[error("Invalid global variable during parsing")]
  InvalidVarParse,
  #[error("Invalid string literal during parsing")]
  InvalidStringParse,
  #[error("Label defined more than once")]
  DuplicateLabel,
  #[error("Global variable declared more than once")]
  DuplicateVariable,
  #[error("Missing operand at end of program")]
  MissingOperand,
  #[error("Undefined label")]
  UndefinedLabel,
  #[error("Undefined global variable")]
  UndefinedVariable,
  #[error("Cannot declare a global variable after normal program opcodes")]
  MisplacedGlobal,
}

/// An assembly failure, tagged with the source position it was detected at.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
#[error("{kind} at line {line}, column {column}{}", context_suffix(.extra))]
pub struct AssemblerError {
  pub kind   : AssemblerErrorKind,
  pub line   : usize,
  pub column : usize,
  pub extra  : Option<String>,
}

fn context_suffix(extra: &Option<String>) -> String {
  match extra {
    Some(extra) => format!(": {}", extra),
    None        => String::new()
  }
}

impl AssemblerError {
  pub fn new(kind: AssemblerErrorKind, line: usize, column: usize) -> AssemblerError {
    AssemblerError {
      kind,
      line,
      column,
      extra: None
    }
  }

  pub fn with_extra<S: Into<String>>(mut self, extra: S) -> AssemblerError {
    self.extra = Some(extra.into());
    self
  }
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn display_includes_position_and_context() {
    let error = AssemblerError::new(AssemblerErrorKind::UndefinedLabel, 3, 9).with_extra("@loop");
    assert_eq!(error.to_string(), "Undefined label at line 3, column 9: @loop");

    let error = AssemblerError::new(AssemblerErrorKind::StringTooLong, 1, 1);
    assert_eq!(error.to_string(), "String too long at line 1, column 1");
  }
}
