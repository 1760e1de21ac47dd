/*!
  The register file. Each register id owns a word cell and a byte cell. Cells hold raw bits;
  the typed views are reinterpretations chosen by the instruction that uses the cell.
*/

use std::fmt::{Display, Formatter};

use prettytable::Table;

use crate::bytecode::{register_name, Byte, RegisterId, Word, FZ, R0, REGISTER_COUNT};
use crate::display::TABLE_DISPLAY_FORMAT;

use super::error::ExecutorErrorKind;

/// 32 bits viewed as an unsigned word, a signed integer or a float.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub struct WordCell(Word);

impl WordCell {
  pub fn from_int(value: i32) -> WordCell {
    WordCell(value as Word)
  }

  pub fn from_float(value: f32) -> WordCell {
    WordCell(value.to_bits())
  }

  pub fn word(&self) -> Word {
    self.0
  }

  pub fn int(&self) -> i32 {
    self.0 as i32
  }

  pub fn float(&self) -> f32 {
    f32::from_bits(self.0)
  }
}

impl From<Word> for WordCell {
  fn from(word: Word) -> Self {
    WordCell(word)
  }
}

/// 8 bits viewed as an unsigned byte, a signed char or a boolean.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub struct ByteCell(Byte);

impl ByteCell {
  pub fn from_char(value: i8) -> ByteCell {
    ByteCell(value as Byte)
  }

  pub fn from_bool(value: bool) -> ByteCell {
    ByteCell(value as Byte)
  }

  pub fn byte(&self) -> Byte {
    self.0
  }

  pub fn char(&self) -> i8 {
    self.0 as i8
  }

  pub fn bool(&self) -> bool {
    self.0 != 0
  }
}

impl From<Byte> for ByteCell {
  fn from(byte: Byte) -> Self {
    ByteCell(byte)
  }
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RegisterFile {
  words : [WordCell; REGISTER_COUNT],
  bytes : [ByteCell; REGISTER_COUNT],
}

fn check(id: RegisterId) -> Result<usize, ExecutorErrorKind> {
  match (id as usize) < REGISTER_COUNT {
    true  => Ok(id as usize),
    false => Err(ExecutorErrorKind::InvalidRegister(id))
  }
}

impl RegisterFile {

  pub fn new() -> RegisterFile {
    RegisterFile::default()
  }

  pub fn word(&self, id: RegisterId) -> Result<WordCell, ExecutorErrorKind> {
    Ok(self.words[check(id)?])
  }

  pub fn set_word(&mut self, id: RegisterId, cell: WordCell) -> Result<(), ExecutorErrorKind> {
    self.words[check(id)?] = cell;
    Ok(())
  }

  pub fn byte(&self, id: RegisterId) -> Result<ByteCell, ExecutorErrorKind> {
    Ok(self.bytes[check(id)?])
  }

  pub fn set_byte(&mut self, id: RegisterId, cell: ByteCell) -> Result<(), ExecutorErrorKind> {
    self.bytes[check(id)?] = cell;
    Ok(())
  }

  /// The flag register `FZ`, as 0 or 1.
  pub fn flag(&self) -> Byte {
    self.bytes[FZ as usize].byte()
  }

  pub fn set_flag(&mut self, value: bool) {
    self.bytes[FZ as usize] = ByteCell::from_bool(value);
  }

  /// Shorthand for the word cell of general register `R<n>`.
  pub fn r(&self, n: usize) -> WordCell {
    self.words.get(R0 as usize + n).copied().unwrap_or_default()
  }
}

impl Display for RegisterFile {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    let mut table = Table::new();

    table.set_format(*TABLE_DISPLAY_FORMAT);
    table.set_titles(
      row![ubr->"Register", ubl->"Word", ubl->"Int", ubl->"Float", ubl->"Byte", ubl->"Char"]
    );

    for id in 0..REGISTER_COUNT {
      let word = self.words[id];
      let byte = self.bytes[id];

      // General registers that were never touched are left out.
      if id >= R0 as usize && word.word() == 0 && byte.byte() == 0 {
        continue;
      }

      table.add_row(row![
        r->register_name(id as RegisterId),
        format!("{:#010x}", word.word()),
        word.int(),
        word.float(),
        format!("{:#04x}", byte.byte()),
        byte.char()
      ]);
    } // end for

    write!(f, "{}", table)
  }
}
