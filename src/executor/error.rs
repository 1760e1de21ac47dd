use std::io;

use thiserror::Error;

use crate::bytecode::{HeaderError, Word};

#[derive(Debug, Error)]
pub enum ExecutorErrorKind {
  #[error("Bad image header: {0}")]
  BadHeader(#[from] HeaderError),
  #[error("Unknown opcode {0:#04x}")]
  UnknownOpcode(u8),
  #[error("Read past the end of the program")]
  Overread,
  #[error("Invalid register id {0}")]
  InvalidRegister(u8),
  #[error("Invalid address {address:#010x} for a {len} byte access")]
  InvalidAddress {
    address : Word,
    len     : usize,
  },
  #[error("Division by zero")]
  DivideByZero,
  #[error("Allocation failed: {0}")]
  BadAlloc(String),
  #[error("Invalid free of {0:#010x}, which is not an allocated block")]
  InvalidFree(Word),
  #[error("I/O error: {0}")]
  Io(#[from] io::Error),
}

/// An execution failure, tagged with the image offset of the instruction that caused it.
#[derive(Debug, Error)]
#[error("{kind} at offset {offset:#x}")]
pub struct ExecutorError {
  pub kind   : ExecutorErrorKind,
  pub offset : usize,
}

impl ExecutorError {
  pub fn new(kind: ExecutorErrorKind, offset: usize) -> ExecutorError {
    ExecutorError { kind, offset }
  }
}
