use std::fmt::{Display, Formatter};

use strum::IntoEnumIterator;
use strum_macros::{Display as StrumDisplay, EnumIter, EnumString, IntoStaticStr};
use num_enum::{IntoPrimitive, TryFromPrimitive};

use super::binary::{Byte, Scalar, Short, Word};

pub const MAX_OPERANDS: usize = 3;
/// Never assigned to an opcode.
pub const INVALID_OPCODE: u8 = 0xFF;

/**
  Opcodes of the virtual machine. The mnemonic of an opcode is its variant name in
  lowercase, e.g. `ICmpEq` is written `icmpeq`.

  The byte values are grouped by family with gaps between the groups. They are part of the
  image format: changing one requires bumping `FORMAT_VERSION`.
*/
#[derive(
  StrumDisplay, IntoStaticStr, EnumString, EnumIter, TryFromPrimitive, IntoPrimitive,
  Clone,        Copy,          Eq, PartialEq,  Debug,    Hash
)]
#[strum(serialize_all = "lowercase")]
#[repr(u8)]
pub enum Opcode {
  // Control //
  Nop       = 0x00,
  Halt      = 0x01,
  Break     = 0x02,

  // Dynamic memory //
  Alloc     = 0x04,  // alloc( dst, size )
  Free      = 0x05,  // free( ptr )

  // Moves //
  RMovW     = 0x08,
  RMovB     = 0x09,
  MovW      = 0x0A,
  MovB      = 0x0B,
  MovS      = 0x0C,

  // Memory, base register plus word offset //
  LoadW     = 0x10,  // loadw( dst, base, offset )
  StoreW    = 0x11,  // storew( base, offset, src )
  LoadB     = 0x12,
  StoreB    = 0x13,
  LoadS     = 0x14,
  StoreS    = 0x15,

  // Jumps //
  Jmp       = 0x18,
  JmpZ      = 0x19,
  JmpNz     = 0x1A,
  RJmp      = 0x1B,
  RJmpZ     = 0x1C,
  RJmpNz    = 0x1D,

  // Integer family //
  IFlag     = 0x20,
  ICmpEq    = 0x21,
  ICmpNe    = 0x22,
  ICmpGt    = 0x23,
  ICmpLt    = 0x24,
  ICmpGe    = 0x25,
  ICmpLe    = 0x26,
  IInc      = 0x28,
  IDec      = 0x29,
  IAdd      = 0x2A,
  ISub      = 0x2B,
  IMul      = 0x2C,
  IDiv      = 0x2D,
  IMod      = 0x2E,
  IToC      = 0x2F,
  IToF      = 0x30,

  // Char family //
  CFlag     = 0x38,
  CCmpEq    = 0x39,
  CCmpNe    = 0x3A,
  CCmpGt    = 0x3B,
  CCmpLt    = 0x3C,
  CCmpGe    = 0x3D,
  CCmpLe    = 0x3E,
  CInc      = 0x40,
  CDec      = 0x41,
  CAdd      = 0x42,
  CSub      = 0x43,
  CMul      = 0x44,
  CDiv      = 0x45,
  CMod      = 0x46,
  CToI      = 0x47,
  CToF      = 0x48,

  // Float family //
  FFlag     = 0x50,
  FCmpEq    = 0x51,
  FCmpNe    = 0x52,
  FCmpGt    = 0x53,
  FCmpLt    = 0x54,
  FCmpGe    = 0x55,
  FCmpLe    = 0x56,
  FAdd      = 0x58,
  FSub      = 0x59,
  FMul      = 0x5A,
  FDiv      = 0x5B,
  FMod      = 0x5C,
  FToI      = 0x5D,
  FToC      = 0x5E,

  // I/O //
  PrntC     = 0x60,
  PrntStr   = 0x61,  // prntstr( base, offset )
  RPrntI    = 0x62,
  RPrntF    = 0x63,
  PrntLn    = 0x64,
  ReadC     = 0x68,
  ReadStr   = 0x69,  // readstr( base, offset )
  Time      = 0x70,

  // Global declarations, only legal before the first code opcode //
  GlobalW   = 0xF0,
  GlobalB   = 0xF1,
  GlobalS   = 0xF2,
  GlobalStr = 0xF3,
}

/// The kind of each operand slot, which determines both how the assembler parses the
/// operand and how many bytes it occupies in the image.
#[derive(Clone, Copy, Eq, PartialEq, Debug, Hash)]
pub enum OperandKind {
  None,
  WordRegister,
  ByteRegister,
  /// A numeric word, or a reference to a label or a global variable.
  Word,
  Byte,
  Short,
  /// A jump target: a label reference or a numeric offset.
  Label,
  /// Declares a global variable; occupies no bytes.
  Variable,
  /// A NUL terminated string literal.
  String,
}

impl OperandKind {
  /// The encoded size in bytes, or `None` for variable-length strings.
  pub fn width(&self) -> Option<usize> {
    match self {
      | OperandKind::None
      | OperandKind::Variable     => Some(0),
      | OperandKind::WordRegister
      | OperandKind::ByteRegister => Some(Byte::WIDTH),
      | OperandKind::Byte         => Some(Byte::WIDTH),
      | OperandKind::Short        => Some(Short::WIDTH),
      | OperandKind::Word
      | OperandKind::Label        => Some(Word::WIDTH),
      | OperandKind::String       => None,
    }
  }
}

impl Display for OperandKind {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    let name = match self {
      OperandKind::None         => "nothing",
      OperandKind::WordRegister => "a word register",
      OperandKind::ByteRegister => "a byte register",
      OperandKind::Word         => "a word",
      OperandKind::Byte         => "a byte",
      OperandKind::Short        => "a short",
      OperandKind::Label        => "a label",
      OperandKind::Variable     => "a global variable name",
      OperandKind::String       => "a string literal",
    };
    write!(f, "{}", name)
  }
}

/// Which part of a program an opcode may appear in.
#[derive(Clone, Copy, Eq, PartialEq, Debug, Hash)]
pub enum Region {
  Globals,
  Code,
}

impl Opcode {
  pub fn code(&self) -> u8 {
    Into::<u8>::into(*self)
  }

  pub fn mnemonic(&self) -> &'static str {
    self.into()
  }

  pub fn operands(&self) -> [OperandKind; MAX_OPERANDS] {
    use OperandKind::{None as N, WordRegister as W, ByteRegister as B,
                      Word, Byte, Short, Label, Variable, String};

    match self {
      | Opcode::Nop
      | Opcode::Halt
      | Opcode::Break
      | Opcode::PrntLn  => [N, N, N],

      Opcode::Alloc     => [W, W, N],
      Opcode::Free      => [W, N, N],

      Opcode::RMovW     => [W, W, N],
      Opcode::RMovB     => [B, B, N],
      Opcode::MovW      => [W, Word, N],
      Opcode::MovB      => [B, Byte, N],
      Opcode::MovS      => [W, Short, N],

      | Opcode::LoadW
      | Opcode::LoadS   => [W, W, Word],
      Opcode::LoadB     => [B, W, Word],
      | Opcode::StoreW
      | Opcode::StoreS  => [W, Word, W],
      Opcode::StoreB    => [W, Word, B],

      | Opcode::Jmp
      | Opcode::JmpZ
      | Opcode::JmpNz   => [Label, N, N],
      | Opcode::RJmp
      | Opcode::RJmpZ
      | Opcode::RJmpNz  => [W, N, N],

      | Opcode::IFlag
      | Opcode::IInc
      | Opcode::IDec
      | Opcode::FFlag
      | Opcode::RPrntI
      | Opcode::RPrntF
      | Opcode::Time    => [W, N, N],

      | Opcode::ICmpEq | Opcode::ICmpNe | Opcode::ICmpGt
      | Opcode::ICmpLt | Opcode::ICmpGe | Opcode::ICmpLe
      | Opcode::FCmpEq | Opcode::FCmpNe | Opcode::FCmpGt
      | Opcode::FCmpLt | Opcode::FCmpGe | Opcode::FCmpLe => [B, W, W],

      | Opcode::IAdd | Opcode::ISub | Opcode::IMul | Opcode::IDiv | Opcode::IMod
      | Opcode::FAdd | Opcode::FSub | Opcode::FMul | Opcode::FDiv | Opcode::FMod => [W, W, W],

      | Opcode::IToC
      | Opcode::FToC    => [B, W, N],
      | Opcode::IToF
      | Opcode::FToI    => [W, W, N],

      | Opcode::CFlag
      | Opcode::CInc
      | Opcode::CDec
      | Opcode::PrntC
      | Opcode::ReadC   => [B, N, N],

      | Opcode::CCmpEq | Opcode::CCmpNe | Opcode::CCmpGt
      | Opcode::CCmpLt | Opcode::CCmpGe | Opcode::CCmpLe
      | Opcode::CAdd | Opcode::CSub | Opcode::CMul | Opcode::CDiv | Opcode::CMod => [B, B, B],

      | Opcode::CToI
      | Opcode::CToF    => [W, B, N],

      | Opcode::PrntStr
      | Opcode::ReadStr => [W, Word, N],

      Opcode::GlobalW   => [Variable, Word, N],
      Opcode::GlobalB   => [Variable, Byte, N],
      Opcode::GlobalS   => [Variable, Short, N],
      Opcode::GlobalStr => [Variable, String, N],
    }
  }

  /// The number of operands the opcode takes. Operand slots are filled from the left, so
  /// this is the number of leading slots that are not `OperandKind::None`.
  pub fn arity(&self) -> usize {
    self.operands()
        .iter()
        .take_while(|kind| **kind != OperandKind::None)
        .count()
  }

  pub fn region(&self) -> Region {
    match self {
      | Opcode::GlobalW
      | Opcode::GlobalB
      | Opcode::GlobalS
      | Opcode::GlobalStr => Region::Globals,
      _                   => Region::Code
    }
  }
}

/// One row of the opcode table.
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub struct OpcodeInfo {
  pub opcode   : Opcode,
  pub mnemonic : &'static str,
  pub operands : [OperandKind; MAX_OPERANDS],
  pub region   : Region,
}

lazy_static! {
  /// The opcode table, indexed by byte value.
  static ref OPCODE_TABLE: Vec<Option<OpcodeInfo>> = {
    let mut table = vec![None; 256];
    for opcode in Opcode::iter() {
      table[opcode.code() as usize] = Some(OpcodeInfo {
        opcode,
        mnemonic : opcode.mnemonic(),
        operands : opcode.operands(),
        region   : opcode.region(),
      });
    }
    table
  };
}

/// Looks up the table row for a raw opcode byte.
pub fn lookup(byte: u8) -> Option<&'static OpcodeInfo> {
  OPCODE_TABLE[byte as usize].as_ref()
}
