/*!
  This module is responsible for the encoding and decoding of the scalar values that make up
  an image, and of the image header.

*/
use thiserror::Error;

pub type Word  = u32;
pub type Short = u16;
pub type Byte  = u8;

pub const MAGIC          : [u8; 4] = *b"ZVM\0";
pub const FORMAT_VERSION : u16     = 1;
/// Byte offset of the entry word within the header.
pub const ENTRY_LOCATION : usize   = 8;
pub const HEADER_SIZE    : usize   = 12;

/**
  A fixed-width value that can be read from or written to an image. Every multi-byte field
  in the format goes through this trait, so width and endianness live in exactly one place.
*/
pub trait Scalar: Copy {
  const WIDTH: usize;

  /// Decodes from exactly `WIDTH` bytes.
  fn decode(bytes: &[u8]) -> Self;

  /// Encodes into exactly `WIDTH` bytes.
  fn encode(self, out: &mut [u8]);
}

macro_rules! impl_scalar {
  ($($t:ty),*) => {
    $(
      impl Scalar for $t {
        const WIDTH: usize = std::mem::size_of::<$t>();

        fn decode(bytes: &[u8]) -> Self {
          let mut raw = [0u8; std::mem::size_of::<$t>()];
          raw.copy_from_slice(bytes);
          <$t>::from_le_bytes(raw)
        }

        fn encode(self, out: &mut [u8]) {
          out.copy_from_slice(&self.to_le_bytes());
        }
      }
    )*
  };
}

impl_scalar!(u8, i8, u16, i16, u32, i32, f32);

#[derive(Debug, Error, Clone, Copy, Eq, PartialEq)]
pub enum HeaderError {
  #[error("image is {0} bytes, shorter than the image header")]
  TooShort(usize),
  #[error("image does not start with the ZVM magic number")]
  BadMagic,
  #[error("unsupported image format version {0}")]
  UnsupportedVersion(u16),
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Header {
  pub version : u16,
  pub entry   : Word,
}

impl Header {
  pub fn new(entry: Word) -> Header {
    Header {
      version : FORMAT_VERSION,
      entry
    }
  }

  pub fn encode(&self) -> [u8; HEADER_SIZE] {
    let mut bytes = [0u8; HEADER_SIZE];
    bytes[0..4].copy_from_slice(&MAGIC);
    self.version.encode(&mut bytes[4..6]);
    self.entry.encode(&mut bytes[ENTRY_LOCATION..ENTRY_LOCATION + Word::WIDTH]);
    bytes
  }

  pub fn decode(image: &[u8]) -> Result<Header, HeaderError> {
    if image.len() < HEADER_SIZE {
      return Err(HeaderError::TooShort(image.len()));
    }
    if image[0..4] != MAGIC {
      return Err(HeaderError::BadMagic);
    }
    let version = u16::decode(&image[4..6]);
    if version != FORMAT_VERSION {
      return Err(HeaderError::UnsupportedVersion(version));
    }
    Ok(Header {
      version,
      entry: Word::decode(&image[ENTRY_LOCATION..ENTRY_LOCATION + Word::WIDTH])
    })
  }
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn scalars_are_little_endian() {
    let mut out = [0u8; 4];
    0x1234_5678u32.encode(&mut out);
    assert_eq!(out, [0x78, 0x56, 0x34, 0x12]);
    assert_eq!(i16::decode(&[0xFE, 0xFF]), -2);
    assert_eq!(<f32 as Scalar>::WIDTH, 4);
  }

  #[test]
  fn header_layout() {
    let bytes = Header::new(0x20).encode();
    assert_eq!(&bytes[0..4], b"ZVM\0");
    assert_eq!(&bytes[4..6], &[1, 0]);
    assert_eq!(&bytes[6..8], &[0, 0]);
    assert_eq!(&bytes[8..12], &[0x20, 0, 0, 0]);
    assert_eq!(Header::decode(&bytes), Ok(Header::new(0x20)));
  }

  #[test]
  fn header_rejects_bad_images() {
    assert_eq!(Header::decode(b"ZVM"), Err(HeaderError::TooShort(3)));

    let mut bytes = Header::new(12).encode();
    bytes[0] = b'X';
    assert_eq!(Header::decode(&bytes), Err(HeaderError::BadMagic));

    let mut bytes = Header::new(12).encode();
    bytes[4] = 7;
    assert_eq!(Header::decode(&bytes), Err(HeaderError::UnsupportedVersion(7)));
  }
}
