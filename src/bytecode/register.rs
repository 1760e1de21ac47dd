/*!
  Register ids and their textual names.

  ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~text
  Id        | Name      | Description
  -         | -         | Instruction pointer (implicit)
  0         | PP        | Program image base pointer (word bank)
  1         | BP        | Stack base pointer (word bank)
  2         | FZ        | Flag, 0 or 1 (byte bank)
  3 .. 31   | R0 .. R28 | General purpose
  ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~

  Every id has both a word cell and a byte cell. Which one an instruction touches is decided
  by the opcode, so `R0` in `movw R0, 1` and `R0` in `movb R0, 1` are different storage.
*/

use bimap::BiMap;
use nom::{
  character::complete::{digit1, one_of},
  combinator::{all_consuming, map_res},
  sequence::preceded,
  IResult
};

pub type RegisterId = u8;

pub const PP: RegisterId = 0;
pub const BP: RegisterId = 1;
pub const FZ: RegisterId = 2;
pub const R0: RegisterId = 3;

pub const REGISTER_COUNT         : usize = 32;
pub const GENERAL_REGISTER_COUNT : usize = REGISTER_COUNT - R0 as usize;

/// The storage bank an operand slot addresses.
#[derive(Clone, Copy, Eq, PartialEq, Debug, Hash)]
pub enum Bank {
  Word,
  Byte,
}

lazy_static! {
  static ref RESERVED_NAMES: BiMap<&'static str, RegisterId> = {
    let mut names = BiMap::new();
    names.insert("PP", PP);
    names.insert("BP", BP);
    names.insert("FZ", FZ);
    names
  };
}

fn general_register(text: &str) -> IResult<&str, usize> {
  all_consuming(
    preceded(one_of("Rr"), map_res(digit1, |digits: &str| digits.parse::<usize>()))
  )(text)
}

/**
  Parses a register name for an operand slot of the given bank. The pointer registers only
  exist in the word bank and the flag only in the byte bank. General registers are
  bounds-checked against `GENERAL_REGISTER_COUNT`.
*/
pub fn parse_register(text: &str, bank: Bank) -> Option<RegisterId> {
  if let Some(id) = RESERVED_NAMES.get_by_left(text.to_ascii_uppercase().as_str()) {
    return match (*id, bank) {
      (FZ, Bank::Byte)      => Some(FZ),
      (FZ, Bank::Word)      => None,
      (_,  Bank::Word)      => Some(*id),
      (_,  Bank::Byte)      => None,
    };
  }

  match general_register(text) {
    Ok((_, index)) if index < GENERAL_REGISTER_COUNT => Some(R0 + index as RegisterId),
    _                                                  => None
  }
}

/// The assembly name of a register id, e.g. `BP` or `R4`.
pub fn register_name(id: RegisterId) -> String {
  match RESERVED_NAMES.get_by_right(&id) {
    Some(name)                           => name.to_string(),
    None if (id as usize) < REGISTER_COUNT => format!("R{}", id - R0),
    None                                 => format!("?{}", id),
  }
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn general_registers() {
    assert_eq!(parse_register("R0", Bank::Word), Some(R0));
    assert_eq!(parse_register("r2", Bank::Byte), Some(R0 + 2));
    assert_eq!(parse_register("R28", Bank::Word), Some(31));
    assert_eq!(parse_register("R29", Bank::Word), None);
    assert_eq!(parse_register("R", Bank::Word), None);
    assert_eq!(parse_register("R1x", Bank::Word), None);
    assert_eq!(parse_register("X1", Bank::Word), None);
  }

  #[test]
  fn reserved_registers_respect_their_bank() {
    assert_eq!(parse_register("PP", Bank::Word), Some(PP));
    assert_eq!(parse_register("bp", Bank::Word), Some(BP));
    assert_eq!(parse_register("BP", Bank::Byte), None);
    assert_eq!(parse_register("FZ", Bank::Byte), Some(FZ));
    assert_eq!(parse_register("FZ", Bank::Word), None);
  }

  #[test]
  fn names_round_trip() {
    for id in 0..REGISTER_COUNT as RegisterId {
      let name = register_name(id);
      let bank = match id { FZ => Bank::Byte, _ => Bank::Word };
      assert_eq!(parse_register(&name, bank), Some(id), "{}", name);
    }
    assert_eq!(register_name(200), "?200");
  }
}
