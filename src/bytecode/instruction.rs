use std::fmt::{Display, Formatter};

use super::binary::{Byte, Short, Word};
use super::opcode::Opcode;
use super::register::{register_name, RegisterId};

/// A decoded operand. The variant follows the operand kind in the opcode table.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum Operand {
  Register(RegisterId),
  Word(Word),
  Byte(Byte),
  Short(Short),
  /// A jump target, as an image offset.
  Address(Word),
  /// The image offset a global declaration gives its variable.
  Variable(Word),
  String(Vec<u8>),
}

/// Holds the decoded components of an instruction together with its offset in the image.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Instruction {
  pub offset   : usize,
  pub opcode   : Opcode,
  pub operands : Vec<Operand>,
}

impl Display for Operand {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {

      Operand::Register(id) => {
        write!(f, "{}", register_name(*id))
      }

      Operand::Word(word) => {
        write!(f, "{}", *word as i32)
      }

      Operand::Byte(byte) => {
        write!(f, "{}", *byte as i8)
      }

      Operand::Short(short) => {
        write!(f, "{}", *short as i16)
      }

      Operand::Address(address) => {
        write!(f, "{:#010x}", address)
      }

      Operand::Variable(offset) => {
        write!(f, "%{:#x}", offset)
      }

      Operand::String(bytes) => {
        write!(f, "\"{}\"", bytes.escape_ascii())
      }

    }
  }
}

impl Display for Instruction {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "{:08x}: {}", self.offset, self.opcode)?;
    if !self.operands.is_empty() {
      let operands = self.operands
                         .iter()
                         .map(Operand::to_string)
                         .collect::<Vec<String>>()
                         .join(", ");
      write!(f, " {}", operands)?;
    }
    Ok(())
  }
}
