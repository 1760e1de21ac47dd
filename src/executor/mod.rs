/*!
  The executor loads an image and interprets it.

  Execution starts at the entry offset from the image header with every register zeroed,
  except `PP`, which holds the base address of the image, and `BP`, which holds the base
  address of the stack. It ends at the first `halt`, or at the first failure, which is
  reported with the offset of the instruction that caused it. Instructions are not
  transactional: operands read and registers written before a failure stay as they are.

  The flag register `FZ` is set by the comparison, flag and arithmetic instructions of each
  family, and read by the conditional jumps: `jmpz` is taken when it is 0, `jmpnz` when it is
  not.
*/

mod disassemble;
mod error;
mod memory;
mod profile;
mod program;
mod registers;
#[cfg(test)]
mod tests;

use std::fmt::{Display, Formatter};
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::time::Instant;

use tracing::{debug, info, trace};

use crate::bytecode::{lookup, Byte, Opcode, RegisterId, Scalar, Short, Word, BP, PP};
use crate::Error;

pub use disassemble::{decode, decode_operands, disassemble};
pub use error::{ExecutorError, ExecutorErrorKind};
pub use memory::{AddressSpace, Heap, Memory, Stack, HEAP_BASE, IMAGE_BASE, STACK_BASE};
pub use profile::Profile;
pub use program::{Program, PADDING};
pub use registers::{ByteCell, RegisterFile, WordCell};

pub const DEFAULT_STACK_SIZE : usize = 0x1000;
pub const DEFAULT_HEAP_LIMIT : usize = 1 << 24;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ExecutorSettings {
  /// Log every instruction as it executes.
  pub debug      : bool,
  /// Count executed instructions per opcode.
  pub profile    : bool,
  pub stack_size : usize,
  /// The most heap memory, in bytes, allocated at any one time.
  pub heap_limit : usize,
}

impl Default for ExecutorSettings {
  fn default() -> Self {
    ExecutorSettings {
      debug      : false,
      profile    : false,
      stack_size : DEFAULT_STACK_SIZE,
      heap_limit : DEFAULT_HEAP_LIMIT
    }
  }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Status {
  Running,
  Halted,
}

pub struct Executor {
  settings  : ExecutorSettings,
  memory    : AddressSpace,
  registers : RegisterFile,
  profile   : Option<Profile>,
  started   : Instant,
}

// region Helpers for the instruction families

fn compare<T: PartialOrd>(opcode: Opcode, a: T, b: T) -> bool {
  match opcode {
    Opcode::ICmpEq | Opcode::CCmpEq | Opcode::FCmpEq => a == b,
    Opcode::ICmpNe | Opcode::CCmpNe | Opcode::FCmpNe => a != b,
    Opcode::ICmpGt | Opcode::CCmpGt | Opcode::FCmpGt => a > b,
    Opcode::ICmpLt | Opcode::CCmpLt | Opcode::FCmpLt => a < b,
    Opcode::ICmpGe | Opcode::CCmpGe | Opcode::FCmpGe => a >= b,
    Opcode::ICmpLe | Opcode::CCmpLe | Opcode::FCmpLe => a <= b,
    _                                                => false
  }
}

fn int_arithmetic(opcode: Opcode, a: i32, b: i32) -> Result<i32, ExecutorErrorKind> {
  match opcode {
    Opcode::IAdd                          => Ok(a.wrapping_add(b)),
    Opcode::ISub                          => Ok(a.wrapping_sub(b)),
    Opcode::IMul                          => Ok(a.wrapping_mul(b)),
    Opcode::IDiv | Opcode::IMod if b == 0 => Err(ExecutorErrorKind::DivideByZero),
    Opcode::IDiv                          => Ok(a.wrapping_div(b)),
    _                                     => Ok(a.wrapping_rem(b))
  }
}

fn char_arithmetic(opcode: Opcode, a: i8, b: i8) -> Result<i8, ExecutorErrorKind> {
  match opcode {
    Opcode::CAdd                          => Ok(a.wrapping_add(b)),
    Opcode::CSub                          => Ok(a.wrapping_sub(b)),
    Opcode::CMul                          => Ok(a.wrapping_mul(b)),
    Opcode::CDiv | Opcode::CMod if b == 0 => Err(ExecutorErrorKind::DivideByZero),
    Opcode::CDiv                          => Ok(a.wrapping_div(b)),
    _                                     => Ok(a.wrapping_rem(b))
  }
}

fn float_arithmetic(opcode: Opcode, a: f32, b: f32) -> Result<f32, ExecutorErrorKind> {
  match opcode {
    Opcode::FAdd                            => Ok(a + b),
    Opcode::FSub                            => Ok(a - b),
    Opcode::FMul                            => Ok(a * b),
    Opcode::FDiv | Opcode::FMod if b == 0.0 => Err(ExecutorErrorKind::DivideByZero),
    Opcode::FDiv                            => Ok(a / b),
    _                                       => Ok(a % b)
  }
}

// endregion

impl Executor {

  /// Loads `image` and prepares it to run from its entry offset.
  pub fn new(image: &[u8], settings: &ExecutorSettings) -> Result<Executor, ExecutorError> {
    let setup   = |kind| ExecutorError::new(kind, 0);
    let program = Program::load(image).map_err(setup)?;
    let entry   = program.header().entry as usize;

    let mut memory = AddressSpace::new(program, settings.stack_size, settings.heap_limit).map_err(setup)?;
    memory.program.goto(entry);

    let mut registers = RegisterFile::new();
    registers.set_word(PP, WordCell::from(IMAGE_BASE)).map_err(setup)?;
    registers.set_word(BP, WordCell::from(STACK_BASE)).map_err(setup)?;

    debug!(
      entry,
      stack_size = settings.stack_size,
      heap_limit = settings.heap_limit,
      "loaded {} byte image", memory.program.len()
    );

    Ok(Executor {
      settings  : *settings,
      memory,
      registers,
      profile   : match settings.profile {
        true  => Some(Profile::new()),
        false => None
      },
      started   : Instant::now()
    })
  }

  pub fn registers(&self) -> &RegisterFile {
    &self.registers
  }

  pub fn into_registers(self) -> RegisterFile {
    self.registers
  }

  pub fn memory(&self) -> &AddressSpace {
    &self.memory
  }

  pub fn profile(&self) -> Option<&Profile> {
    self.profile.as_ref()
  }

  /// Runs until `halt` or a failure, reading from `input` and writing to `output`.
  pub fn run<R: BufRead, W: Write>(&mut self, input: &mut R, output: &mut W) -> Result<(), ExecutorError> {
    self.started = Instant::now();

    let result = loop {
      let at = self.memory.program.position();
      match self.step(input, output) {
        Ok(Status::Running) => {}
        Ok(Status::Halted)  => break Ok(()),
        Err(kind)           => break Err(ExecutorError::new(kind, at)),
      }
      #[cfg(feature = "trace_computation")] trace!("\n{}", self.registers);
    }; // end loop

    if let Some(profile) = self.profile.as_mut() {
      profile.set_elapsed(self.started.elapsed());
    }
    if self.settings.debug {
      debug!("final state\n{}", self);
    }

    let position = self.memory.program.position();
    let flushed  = output.flush().map_err(|error| ExecutorError::new(error.into(), position));
    result.and(flushed)
  }

  // region Operand fetch

  fn fetch<T: Scalar>(&mut self) -> Result<T, ExecutorErrorKind> {
    self.memory.program.read_operand::<T>()
  }

  fn register(&mut self) -> Result<RegisterId, ExecutorErrorKind> {
    self.fetch::<Byte>()
  }

  fn int(&self, id: RegisterId) -> Result<i32, ExecutorErrorKind> {
    Ok(self.registers.word(id)?.int())
  }

  fn char(&self, id: RegisterId) -> Result<i8, ExecutorErrorKind> {
    Ok(self.registers.byte(id)?.char())
  }

  fn float(&self, id: RegisterId) -> Result<f32, ExecutorErrorKind> {
    Ok(self.registers.word(id)?.float())
  }

  /// The address in `base` plus `offset`, wrapping.
  fn effective_address(&self, base: RegisterId, offset: Word) -> Result<Word, ExecutorErrorKind> {
    Ok(self.registers.word(base)?.word().wrapping_add(offset))
  }

  fn jump_taken(&self, opcode: Opcode) -> bool {
    match opcode {
      Opcode::Jmp  | Opcode::RJmp  => true,
      Opcode::JmpZ | Opcode::RJmpZ => self.registers.flag() == 0,
      _                            => self.registers.flag() != 0
    }
  }

  // endregion

  fn step<R: BufRead, W: Write>(&mut self, input: &mut R, output: &mut W) -> Result<Status, ExecutorErrorKind> {
    let at = self.memory.program.position();

    if self.settings.debug {
      let instruction = decode(&mut self.memory.program)?;
      trace!("{}", instruction);
      self.memory.program.goto(at);
    }

    let code   = self.fetch::<u8>()?;
    let opcode = lookup(code).ok_or(ExecutorErrorKind::UnknownOpcode(code))?.opcode;

    if let Some(profile) = self.profile.as_mut() {
      profile.record(opcode);
    }

    match opcode {

      // region Control

      Opcode::Nop  => {}

      Opcode::Halt => return Ok(Status::Halted),

      Opcode::Break => {
        output.flush()?;
        debug!("break at {:#x}\n{}", at, self.registers);
        let mut line = Vec::new();
        input.read_until(b'\n', &mut line)?;
      }

      // endregion

      // region Dynamic memory

      Opcode::Alloc => {
        let (dst, size) = (self.register()?, self.register()?);
        let address     = self.memory.heap.alloc(self.int(size)?)?;
        self.registers.set_word(dst, WordCell::from(address))?;
      }

      Opcode::Free => {
        let src = self.register()?;
        self.memory.heap.free(self.registers.word(src)?.word())?;
      }

      // endregion

      // region Moves

      Opcode::RMovW => {
        let (dst, src) = (self.register()?, self.register()?);
        let value      = self.registers.word(src)?;
        self.registers.set_word(dst, value)?;
      }

      Opcode::RMovB => {
        let (dst, src) = (self.register()?, self.register()?);
        let value      = self.registers.byte(src)?;
        self.registers.set_byte(dst, value)?;
      }

      Opcode::MovW => {
        let (dst, value) = (self.register()?, self.fetch::<Word>()?);
        self.registers.set_word(dst, WordCell::from(value))?;
      }

      Opcode::MovB => {
        let (dst, value) = (self.register()?, self.fetch::<Byte>()?);
        self.registers.set_byte(dst, ByteCell::from(value))?;
      }

      Opcode::MovS => {
        let (dst, value) = (self.register()?, self.fetch::<i16>()?);
        self.registers.set_word(dst, WordCell::from_int(value as i32))?;
      }

      // endregion

      // region Memory

      Opcode::LoadW => {
        let (dst, base, offset) = (self.register()?, self.register()?, self.fetch::<Word>()?);
        let address             = self.effective_address(base, offset)?;
        let value               = self.memory.read_word(address)?;
        self.registers.set_word(dst, WordCell::from(value))?;
      }

      Opcode::StoreW => {
        let (base, offset, src) = (self.register()?, self.fetch::<Word>()?, self.register()?);
        let address             = self.effective_address(base, offset)?;
        let value               = self.registers.word(src)?.word();
        self.memory.write_word(address, value)?;
      }

      Opcode::LoadB => {
        let (dst, base, offset) = (self.register()?, self.register()?, self.fetch::<Word>()?);
        let address             = self.effective_address(base, offset)?;
        let value               = self.memory.read::<Byte>(address)?;
        self.registers.set_byte(dst, ByteCell::from(value))?;
      }

      Opcode::StoreB => {
        let (base, offset, src) = (self.register()?, self.fetch::<Word>()?, self.register()?);
        let address             = self.effective_address(base, offset)?;
        let value               = self.registers.byte(src)?.byte();
        self.memory.write::<Byte>(address, value)?;
      }

      Opcode::LoadS => {
        let (dst, base, offset) = (self.register()?, self.register()?, self.fetch::<Word>()?);
        let address             = self.effective_address(base, offset)?;
        let value               = self.memory.read::<i16>(address)?;
        self.registers.set_word(dst, WordCell::from_int(value as i32))?;
      }

      Opcode::StoreS => {
        let (base, offset, src) = (self.register()?, self.fetch::<Word>()?, self.register()?);
        let address             = self.effective_address(base, offset)?;
        let value               = self.registers.word(src)?.word() as Short;
        self.memory.write::<Short>(address, value)?;
      }

      // endregion

      // region Jumps

      | Opcode::Jmp
      | Opcode::JmpZ
      | Opcode::JmpNz => {
        let target = self.fetch::<Word>()?;
        if self.jump_taken(opcode) {
          self.memory.program.goto(target as usize);
        }
      }

      | Opcode::RJmp
      | Opcode::RJmpZ
      | Opcode::RJmpNz => {
        let src    = self.register()?;
        let target = self.registers.word(src)?.word();
        if self.jump_taken(opcode) {
          self.memory.program.goto(target as usize);
        }
      }

      // endregion

      // region Integer family

      Opcode::IFlag => {
        let src = self.register()?;
        self.registers.set_flag(self.int(src)? != 0);
      }

      | Opcode::ICmpEq | Opcode::ICmpNe | Opcode::ICmpGt
      | Opcode::ICmpLt | Opcode::ICmpGe | Opcode::ICmpLe => {
        let (dst, a, b) = (self.register()?, self.register()?, self.register()?);
        let outcome     = compare(opcode, self.int(a)?, self.int(b)?);
        self.registers.set_byte(dst, ByteCell::from_bool(outcome))?;
        self.registers.set_flag(outcome);
      }

      | Opcode::IInc
      | Opcode::IDec => {
        let dst    = self.register()?;
        let result = match opcode == Opcode::IInc {
          true  => self.int(dst)?.wrapping_add(1),
          false => self.int(dst)?.wrapping_sub(1)
        };
        self.registers.set_word(dst, WordCell::from_int(result))?;
        self.registers.set_flag(result != 0);
      }

      | Opcode::IAdd | Opcode::ISub | Opcode::IMul | Opcode::IDiv | Opcode::IMod => {
        let (dst, a, b) = (self.register()?, self.register()?, self.register()?);
        let result      = int_arithmetic(opcode, self.int(a)?, self.int(b)?)?;
        self.registers.set_word(dst, WordCell::from_int(result))?;
        self.registers.set_flag(result != 0);
      }

      Opcode::IToC => {
        let (dst, src) = (self.register()?, self.register()?);
        self.registers.set_byte(dst, ByteCell::from_char(self.int(src)? as i8))?;
      }

      Opcode::IToF => {
        let (dst, src) = (self.register()?, self.register()?);
        self.registers.set_word(dst, WordCell::from_float(self.int(src)? as f32))?;
      }

      // endregion

      // region Char family

      Opcode::CFlag => {
        let src = self.register()?;
        self.registers.set_flag(self.char(src)? != 0);
      }

      | Opcode::CCmpEq | Opcode::CCmpNe | Opcode::CCmpGt
      | Opcode::CCmpLt | Opcode::CCmpGe | Opcode::CCmpLe => {
        let (dst, a, b) = (self.register()?, self.register()?, self.register()?);
        let outcome     = compare(opcode, self.char(a)?, self.char(b)?);
        self.registers.set_byte(dst, ByteCell::from_bool(outcome))?;
        self.registers.set_flag(outcome);
      }

      | Opcode::CInc
      | Opcode::CDec => {
        let dst    = self.register()?;
        let result = match opcode == Opcode::CInc {
          true  => self.char(dst)?.wrapping_add(1),
          false => self.char(dst)?.wrapping_sub(1)
        };
        self.registers.set_byte(dst, ByteCell::from_char(result))?;
        self.registers.set_flag(result != 0);
      }

      | Opcode::CAdd | Opcode::CSub | Opcode::CMul | Opcode::CDiv | Opcode::CMod => {
        let (dst, a, b) = (self.register()?, self.register()?, self.register()?);
        let result      = char_arithmetic(opcode, self.char(a)?, self.char(b)?)?;
        self.registers.set_byte(dst, ByteCell::from_char(result))?;
        self.registers.set_flag(result != 0);
      }

      Opcode::CToI => {
        let (dst, src) = (self.register()?, self.register()?);
        self.registers.set_word(dst, WordCell::from_int(self.char(src)? as i32))?;
      }

      Opcode::CToF => {
        let (dst, src) = (self.register()?, self.register()?);
        self.registers.set_word(dst, WordCell::from_float(self.char(src)? as f32))?;
      }

      // endregion

      // region Float family

      Opcode::FFlag => {
        let src = self.register()?;
        self.registers.set_flag(self.float(src)? != 0.0);
      }

      | Opcode::FCmpEq | Opcode::FCmpNe | Opcode::FCmpGt
      | Opcode::FCmpLt | Opcode::FCmpGe | Opcode::FCmpLe => {
        let (dst, a, b) = (self.register()?, self.register()?, self.register()?);
        let outcome     = compare(opcode, self.float(a)?, self.float(b)?);
        self.registers.set_byte(dst, ByteCell::from_bool(outcome))?;
        self.registers.set_flag(outcome);
      }

      | Opcode::FAdd | Opcode::FSub | Opcode::FMul | Opcode::FDiv | Opcode::FMod => {
        let (dst, a, b) = (self.register()?, self.register()?, self.register()?);
        let result      = float_arithmetic(opcode, self.float(a)?, self.float(b)?)?;
        self.registers.set_word(dst, WordCell::from_float(result))?;
        self.registers.set_flag(result != 0.0);
      }

      Opcode::FToI => {
        let (dst, src) = (self.register()?, self.register()?);
        self.registers.set_word(dst, WordCell::from_int(self.float(src)? as i32))?;
      }

      Opcode::FToC => {
        let (dst, src) = (self.register()?, self.register()?);
        self.registers.set_byte(dst, ByteCell::from_char(self.float(src)? as i8))?;
      }

      // endregion

      // region I/O

      Opcode::PrntC => {
        let src = self.register()?;
        output.write_all(&[self.registers.byte(src)?.byte()])?;
      }

      Opcode::PrntStr => {
        let (base, offset) = (self.register()?, self.fetch::<Word>()?);
        let address        = self.effective_address(base, offset)?;
        output.write_all(&self.memory.read_string(address)?)?;
      }

      Opcode::RPrntI => {
        let src = self.register()?;
        write!(output, "{}", self.int(src)?)?;
      }

      Opcode::RPrntF => {
        let src = self.register()?;
        write!(output, "{}", self.float(src)?)?;
      }

      Opcode::PrntLn => {
        writeln!(output)?;
      }

      Opcode::ReadC => {
        let dst = self.register()?;
        output.flush()?;
        let buffer = input.fill_buf()?;
        let byte   = match buffer.first() {
          Some(byte) => *byte,
          None       => 0
        };
        if !buffer.is_empty() {
          input.consume(1);
        }
        self.registers.set_byte(dst, ByteCell::from(byte))?;
      }

      Opcode::ReadStr => {
        let (base, offset) = (self.register()?, self.fetch::<Word>()?);
        let address        = self.effective_address(base, offset)?;
        output.flush()?;

        let mut line = Vec::new();
        input.read_until(b'\n', &mut line)?;
        if line.last() == Some(&b'\n') {
          line.pop();
          if line.last() == Some(&b'\r') {
            line.pop();
          }
        }
        line.push(0);
        self.memory.write_bytes(address, &line)?;
      }

      // endregion

      Opcode::Time => {
        let dst    = self.register()?;
        let millis = self.started.elapsed().as_millis() as Word;
        self.registers.set_word(dst, WordCell::from(millis))?;
      }

      // Declarations are data at run time.
      | Opcode::GlobalW
      | Opcode::GlobalB
      | Opcode::GlobalS
      | Opcode::GlobalStr => {
        decode_operands(&mut self.memory.program, opcode)?;
      }

    } // end match on opcode

    Ok(Status::Running)
  }
}

impl Display for Executor {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    writeln!(
      f,
      "Offset: {:#x}\tHeap: {} bytes in {} blocks",
      self.memory.program.position(),
      self.memory.heap.used(),
      self.memory.heap.block_count()
    )?;
    write!(f, "{}", self.registers)
  }
}

/**
  Runs `image` against `input` and `output`. When profiling is on, the profile report is
  written to `output` after the program's own output.
*/
pub fn exec_with<R: BufRead, W: Write>(
  image    : &[u8],
  settings : &ExecutorSettings,
  input    : &mut R,
  output   : &mut W
) -> Result<Executor, ExecutorError> {
  let mut executor = Executor::new(image, settings)?;
  executor.run(input, output)?;

  if let Some(profile) = executor.profile() {
    let position = executor.memory.program.position();
    writeln!(output, "{}", profile).map_err(|error| ExecutorError::new(error.into(), position))?;
  }
  Ok(executor)
}

/// Runs `image` on the standard streams and returns the executor in its final state.
pub fn exec_stdio(image: &[u8], settings: &ExecutorSettings) -> Result<Executor, ExecutorError> {
  let stdin  = io::stdin();
  let stdout = io::stdout();
  exec_with(image, settings, &mut stdin.lock(), &mut stdout.lock())
}

/// Runs `image` on the standard streams and returns the final registers.
pub fn exec(image: &[u8], settings: &ExecutorSettings) -> Result<RegisterFile, ExecutorError> {
  Ok(exec_stdio(image, settings)?.into_registers())
}

/// Reads the image at `path` and runs it on the standard streams.
pub fn exec_file(path: &Path, settings: &ExecutorSettings) -> Result<RegisterFile, Error> {
  let image = std::fs::read(path).map_err(|source| Error::io(path, source))?;
  info!("executing {}", path.display());
  Ok(exec(&image, settings)?)
}
