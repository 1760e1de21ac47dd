/*!
  The data address space of a running program.

  ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~text
  Region    | Base          | Extent
  Image     | `0x0001_0000` | The image, without its padding
  Stack     | `0x4000_0000` | The configured stack size
  Heap      | `0x8000_0000` | Blocks handed out by `alloc`
  ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~

  Every access is bounds-checked against the region, or for the heap the block, the address
  falls in. An access that is not entirely inside one of them fails with `InvalidAddress`.
  Jump targets are not addresses in this space; they are offsets into the image.
*/

use std::collections::BTreeMap;
use std::ops::Range;

use crate::bytecode::{Scalar, Word};

use super::error::ExecutorErrorKind;
use super::program::Program;

pub const IMAGE_BASE : Word = 0x0001_0000;
pub const STACK_BASE : Word = 0x4000_0000;
pub const HEAP_BASE  : Word = 0x8000_0000;

/// Byte addressed, bounds-checked storage.
pub trait Memory {
  fn read_bytes(&self, address: Word, out: &mut [u8]) -> Result<(), ExecutorErrorKind>;

  fn write_bytes(&mut self, address: Word, bytes: &[u8]) -> Result<(), ExecutorErrorKind>;

  fn read<T: Scalar>(&self, address: Word) -> Result<T, ExecutorErrorKind> where Self: Sized {
    let mut raw = [0u8; 8];
    self.read_bytes(address, &mut raw[..T::WIDTH])?;
    Ok(T::decode(&raw[..T::WIDTH]))
  }

  fn write<T: Scalar>(&mut self, address: Word, value: T) -> Result<(), ExecutorErrorKind> where Self: Sized {
    let mut raw = [0u8; 8];
    value.encode(&mut raw[..T::WIDTH]);
    self.write_bytes(address, &raw[..T::WIDTH])
  }

  fn read_word(&self, address: Word) -> Result<Word, ExecutorErrorKind> where Self: Sized {
    self.read(address)
  }

  fn write_word(&mut self, address: Word, value: Word) -> Result<(), ExecutorErrorKind> where Self: Sized {
    self.write(address, value)
  }
}

/// The byte range an access of `len` bytes at `address` covers in a region of `extent` bytes
/// starting at `base`.
fn span(base: Word, extent: usize, address: Word, len: usize) -> Result<Range<usize>, ExecutorErrorKind> {
  let invalid = || ExecutorErrorKind::InvalidAddress { address, len };
  let start   = address.checked_sub(base).ok_or_else(invalid)? as usize;
  let end     = start.checked_add(len).filter(|end| *end <= extent).ok_or_else(invalid)?;
  Ok(start..end)
}

/// The image is mapped read-write, so globals can be updated in place.
impl Memory for Program {
  fn read_bytes(&self, address: Word, out: &mut [u8]) -> Result<(), ExecutorErrorKind> {
    let range = span(IMAGE_BASE, self.len(), address, out.len())?;
    out.copy_from_slice(&self.image()[range]);
    Ok(())
  }

  fn write_bytes(&mut self, address: Word, bytes: &[u8]) -> Result<(), ExecutorErrorKind> {
    let range = span(IMAGE_BASE, self.len(), address, bytes.len())?;
    self.image_mut()[range].copy_from_slice(bytes);
    Ok(())
  }
}

#[derive(Clone, Debug)]
pub struct Stack {
  bytes: Vec<u8>,
}

impl Stack {
  pub fn new(size: usize) -> Result<Stack, ExecutorErrorKind> {
    if size > (HEAP_BASE - STACK_BASE) as usize {
      return Err(ExecutorErrorKind::BadAlloc(
        format!("a stack of {} bytes does not fit in the stack region", size)
      ));
    }
    let mut bytes = Vec::new();
    bytes.try_reserve_exact(size)
         .map_err(|error| ExecutorErrorKind::BadAlloc(error.to_string()))?;
    bytes.resize(size, 0);
    Ok(Stack { bytes })
  }

  pub fn len(&self) -> usize {
    self.bytes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.bytes.is_empty()
  }
}

impl Memory for Stack {
  fn read_bytes(&self, address: Word, out: &mut [u8]) -> Result<(), ExecutorErrorKind> {
    let range = span(STACK_BASE, self.bytes.len(), address, out.len())?;
    out.copy_from_slice(&self.bytes[range]);
    Ok(())
  }

  fn write_bytes(&mut self, address: Word, bytes: &[u8]) -> Result<(), ExecutorErrorKind> {
    let range = span(STACK_BASE, self.bytes.len(), address, bytes.len())?;
    self.bytes[range].copy_from_slice(bytes);
    Ok(())
  }
}

/**
  A bump allocator over the heap region. Addresses are never reused, so a dangling pointer
  into a freed block fails instead of aliasing a newer one. The limit bounds the bytes live at
  any one time.
*/
#[derive(Clone, Debug)]
pub struct Heap {
  blocks : BTreeMap<Word, Vec<u8>>,
  next   : Word,
  used   : usize,
  limit  : usize,
}

impl Heap {
  pub fn new(limit: usize) -> Heap {
    Heap {
      blocks : BTreeMap::new(),
      next   : HEAP_BASE,
      used   : 0,
      limit
    }
  }

  /// Bytes currently allocated.
  pub fn used(&self) -> usize {
    self.used
  }

  pub fn block_count(&self) -> usize {
    self.blocks.len()
  }

  pub fn alloc(&mut self, size: i32) -> Result<Word, ExecutorErrorKind> {
    if size < 0 {
      return Err(ExecutorErrorKind::BadAlloc(format!("negative size {}", size)));
    }
    let size = size as usize;
    if self.used + size > self.limit {
      return Err(ExecutorErrorKind::BadAlloc(
        format!("{} more bytes would exceed the heap limit of {} bytes", size, self.limit)
      ));
    }

    // Every block gets at least one address so that each one is distinct.
    let address = self.next;
    let next    = address.checked_add(size.max(1) as Word).ok_or_else(
      || ExecutorErrorKind::BadAlloc("heap address space exhausted".to_string())
    )?;

    let mut block = Vec::new();
    block.try_reserve_exact(size)
         .map_err(|error| ExecutorErrorKind::BadAlloc(error.to_string()))?;
    block.resize(size, 0);

    self.next  = next;
    self.used += size;
    self.blocks.insert(address, block);
    Ok(address)
  }

  pub fn free(&mut self, address: Word) -> Result<(), ExecutorErrorKind> {
    let block  = self.blocks.remove(&address).ok_or(ExecutorErrorKind::InvalidFree(address))?;
    self.used -= block.len();
    Ok(())
  }

  /// The block containing `address` and the offset of `address` within it.
  fn locate(&self, address: Word, len: usize) -> Result<(Word, Range<usize>), ExecutorErrorKind> {
    let (base, block) = self.blocks
                            .range(..=address)
                            .next_back()
                            .ok_or(ExecutorErrorKind::InvalidAddress { address, len })?;
    Ok((*base, span(*base, block.len(), address, len)?))
  }
}

impl Memory for Heap {
  fn read_bytes(&self, address: Word, out: &mut [u8]) -> Result<(), ExecutorErrorKind> {
    let (base, range) = self.locate(address, out.len())?;
    out.copy_from_slice(&self.blocks[&base][range]);
    Ok(())
  }

  fn write_bytes(&mut self, address: Word, bytes: &[u8]) -> Result<(), ExecutorErrorKind> {
    let (base, range) = self.locate(address, bytes.len())?;
    let block = self.blocks
                    .get_mut(&base)
                    .ok_or(ExecutorErrorKind::InvalidAddress { address, len: bytes.len() })?;
    block[range].copy_from_slice(bytes);
    Ok(())
  }
}

/// The three regions together. Accesses are routed by address.
#[derive(Clone, Debug)]
pub struct AddressSpace {
  pub program : Program,
  pub stack   : Stack,
  pub heap    : Heap,
}

impl AddressSpace {
  pub fn new(program: Program, stack_size: usize, heap_limit: usize) -> Result<AddressSpace, ExecutorErrorKind> {
    Ok(AddressSpace {
      program,
      stack : Stack::new(stack_size)?,
      heap  : Heap::new(heap_limit)
    })
  }

  /// Reads bytes starting at `address` up to, not including, the first NUL.
  pub fn read_string(&self, address: Word) -> Result<Vec<u8>, ExecutorErrorKind> {
    let mut text    = Vec::new();
    let mut address = address;
    loop {
      match self.read::<u8>(address)? {
        0    => return Ok(text),
        byte => text.push(byte)
      }
      address = address.wrapping_add(1);
    }
  }
}

impl Memory for AddressSpace {
  fn read_bytes(&self, address: Word, out: &mut [u8]) -> Result<(), ExecutorErrorKind> {
    match address {
      a if a >= HEAP_BASE  => self.heap.read_bytes(address, out),
      a if a >= STACK_BASE => self.stack.read_bytes(address, out),
      _                    => self.program.read_bytes(address, out)
    }
  }

  fn write_bytes(&mut self, address: Word, bytes: &[u8]) -> Result<(), ExecutorErrorKind> {
    match address {
      a if a >= HEAP_BASE  => self.heap.write_bytes(address, bytes),
      a if a >= STACK_BASE => self.stack.write_bytes(address, bytes),
      _                    => self.program.write_bytes(address, bytes)
    }
  }
}
