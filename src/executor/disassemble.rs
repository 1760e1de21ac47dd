/*!
  Decoding of instructions back into their components, used for listings and for tracing
  execution.
*/

use crate::bytecode::{
  lookup,
  Byte,
  Instruction,
  Opcode,
  Operand,
  OperandKind,
  Short,
  Word,
  HEADER_SIZE
};

use super::error::{ExecutorError, ExecutorErrorKind};
use super::program::Program;

/// Reads the operands of `opcode` at the cursor.
pub fn decode_operands(program: &mut Program, opcode: Opcode) -> Result<Vec<Operand>, ExecutorErrorKind> {
  let mut operands = Vec::with_capacity(opcode.arity());

  for kind in opcode.operands().iter() {
    let operand = match kind {
      OperandKind::None         => break,
      | OperandKind::WordRegister
      | OperandKind::ByteRegister => Operand::Register(program.read_operand::<Byte>()?),
      OperandKind::Word         => Operand::Word(program.read_operand::<Word>()?),
      OperandKind::Byte         => Operand::Byte(program.read_operand::<Byte>()?),
      OperandKind::Short        => Operand::Short(program.read_operand::<Short>()?),
      OperandKind::Label        => Operand::Address(program.read_operand::<Word>()?),
      OperandKind::Variable     => Operand::Variable(program.position() as Word),
      OperandKind::String       => Operand::String(program.read_string()?),
    };
    operands.push(operand);
  }

  Ok(operands)
}

/// Decodes the instruction at the cursor and leaves the cursor after it.
pub fn decode(program: &mut Program) -> Result<Instruction, ExecutorErrorKind> {
  let offset = program.position();
  let code   = program.read_operand::<u8>()?;
  let opcode = lookup(code).ok_or(ExecutorErrorKind::UnknownOpcode(code))?.opcode;

  Ok(Instruction {
    offset,
    opcode,
    operands: decode_operands(program, opcode)?
  })
}

/// Decodes every instruction in the image, globals included.
pub fn disassemble(image: &[u8]) -> Result<Vec<Instruction>, ExecutorError> {
  let mut program = Program::load(image).map_err(|kind| ExecutorError::new(kind, 0))?;
  let mut listing = Vec::new();

  program.goto(HEADER_SIZE);
  while program.position() < program.len() {
    let offset = program.position();
    listing.push(decode(&mut program).map_err(|kind| ExecutorError::new(kind, offset))?);
  }

  Ok(listing)
}
