/*!

  The image format shared by the assembler and the executor.

  The VM uses a 32 bit little-endian word size. An image is a fixed header followed by one
  flat stream of instructions. Instructions are decoded bytewise and have no explicit
  boundaries: the opcode byte determines, through the opcode table, how many operand bytes
  follow and how they are laid out. The sizes of instruction components are as follows:

    Opcode:     8 bits
    Register:   8 bits
    Byte:       8 bits
    Short:     16 bits
    Word:      32 bits (also labels and variable references)
    String:    NUL terminated

  The header is

    [Magic:32]["ZVM\0"] [Version:16] [Reserved:16] [Entry:32]

  where `Entry` is the byte offset of the first executable instruction. Everything between
  the header and `Entry` is the globals region, which holds the global declaration
  instructions together with their initial values. Because the globals region is made of
  instructions too, the whole stream after the header decodes linearly.

  A corrupt opcode byte desynchronizes the decode of everything after it. Nothing in the
  format can detect this; it is a known property of the encoding.

*/

mod binary;
mod instruction;
mod opcode;
mod register;

pub use binary::{Header, HeaderError, Scalar, Word, Short, Byte,
                 MAGIC, FORMAT_VERSION, ENTRY_LOCATION, HEADER_SIZE};
pub use instruction::{Instruction, Operand};
pub use opcode::{Opcode, OperandKind, OpcodeInfo, Region, MAX_OPERANDS, INVALID_OPCODE, lookup};
pub use register::{RegisterId, Bank, parse_register, register_name,
                   PP, BP, FZ, R0, REGISTER_COUNT, GENERAL_REGISTER_COUNT};
