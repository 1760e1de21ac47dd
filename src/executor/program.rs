/*!
  The program loader. A `Program` owns a copy of the image followed by a run of `halt`
  opcodes, so that a program that runs off its end stops instead of reading garbage, and
  exposes a read cursor over it.
*/

use crate::bytecode::{Header, Opcode, Scalar};

use super::error::ExecutorErrorKind;

/// Number of `halt` bytes appended after the image.
pub const PADDING: usize = 24;

#[derive(Clone, Debug)]
pub struct Program {
  /// The image followed by `PADDING` halt bytes.
  bytes    : Vec<u8>,
  /// The length of the image without padding.
  len      : usize,
  header   : Header,
  position : usize,
}

impl Program {

  pub fn load(image: &[u8]) -> Result<Program, ExecutorErrorKind> {
    let header    = Header::decode(image)?;
    let mut bytes = Vec::with_capacity(image.len() + PADDING);
    bytes.extend_from_slice(image);
    bytes.resize(image.len() + PADDING, Opcode::Halt.code());

    Ok(Program {
      bytes,
      len      : image.len(),
      header,
      position : 0
    })
  }

  pub fn header(&self) -> Header {
    self.header
  }

  /// The length of the image, not counting the padding.
  pub fn len(&self) -> usize {
    self.len
  }

  pub fn is_empty(&self) -> bool {
    self.len == 0
  }

  /// The image bytes, not counting the padding.
  pub fn image(&self) -> &[u8] {
    &self.bytes[..self.len]
  }

  pub fn image_mut(&mut self) -> &mut [u8] {
    &mut self.bytes[..self.len]
  }

  /// Moves the cursor. Any offset is accepted; reading from an offset outside the program
  /// fails instead.
  pub fn goto(&mut self, offset: usize) {
    self.position = offset;
  }

  pub fn position(&self) -> usize {
    self.position
  }

  pub fn read_operand<T: Scalar>(&mut self) -> Result<T, ExecutorErrorKind> {
    let end = self.position
                  .checked_add(T::WIDTH)
                  .filter(|end| *end <= self.bytes.len())
                  .ok_or(ExecutorErrorKind::Overread)?;
    let value = T::decode(&self.bytes[self.position..end]);
    self.position = end;
    Ok(value)
  }

  /// Reads a NUL terminated string and returns it without the terminator.
  pub fn read_string(&mut self) -> Result<Vec<u8>, ExecutorErrorKind> {
    let rest = self.bytes.get(self.position..).ok_or(ExecutorErrorKind::Overread)?;
    let nul  = rest.iter().position(|b| *b == 0).ok_or(ExecutorErrorKind::Overread)?;
    let text = rest[..nul].to_vec();
    self.position += nul + 1;
    Ok(text)
  }
}
