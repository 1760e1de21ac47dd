/*!
  The assembler translates assembly text into an image.

  Assembly is a whitespace separated stream of mnemonics and operands. The assembler makes a
  single pass over the tokens, emitting each opcode byte as soon as it reads the mnemonic and
  then filling the opcode's operand slots from the tokens that follow. References to labels
  and global variables emit a placeholder word and are patched once the whole source has been
  read, so both may be used before they are defined.

  ```text
  globalw   %count 3          ; globals come first
  @loop
  loadw     R0, PP, %count
  idec      R0
  storew    PP, %count, R0
  jmpnz     @loop
  halt
  ```

  Global declarations must precede the first code instruction. The entry word of the header
  is patched through a reserved label, `__start__`, that is defined at the first code opcode.
*/

mod error;
mod literal;
mod scanner;
mod symbols;

use std::path::Path;
use std::str::FromStr;

use tracing::{debug, info, trace};

use crate::bytecode::{
  parse_register,
  Bank,
  Byte,
  Header,
  Opcode,
  OperandKind,
  Region,
  Scalar,
  Short,
  Word,
  ENTRY_LOCATION
};
use crate::Error;

pub use error::{AssemblerError, AssemblerErrorKind};
pub use literal::{parse_byte, parse_integer, parse_short, parse_word};
pub use scanner::{Scanner, Token, TokenValue, MAX_TOKEN_LENGTH};
pub use symbols::{Reference, Symbol, SymbolTable, Unresolved};

/// The label whose value becomes the entry offset in the header.
pub const START_LABEL: &str = "__start__";
/// Written in place of a symbol's value until the symbol is resolved.
pub const PLACEHOLDER: Word = 0xBCBC_BCBC;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct AssemblerSettings {
  /// Log every token and print the symbol tables after assembly.
  pub debug: bool,
}

/// An opcode whose operand slots have not all been filled yet.
#[derive(Clone, Copy, Debug)]
struct OpenInstruction {
  opcode : Opcode,
  next   : usize,
  line   : usize,
  column : usize,
}

pub struct Assembler {
  settings   : AssemblerSettings,
  image      : Vec<u8>,
  labels     : SymbolTable,
  variables  : SymbolTable,
  in_globals : bool,
  open       : Option<OpenInstruction>,
}

/// Label and variable names are letters, digits, `_` and `.`.
fn is_symbol_name(name: &str) -> bool {
  !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

impl Assembler {

  pub fn new(settings: &AssemblerSettings) -> Assembler {
    let mut labels = SymbolTable::new('@');
    labels.reference(START_LABEL, Reference { offset: ENTRY_LOCATION, line: 0, column: 0 });

    Assembler {
      settings   : *settings,
      image      : Header::new(PLACEHOLDER).encode().to_vec(),
      labels,
      variables  : SymbolTable::new('%'),
      in_globals : true,
      open       : None
    }
  }

  fn offset(&self) -> Word {
    self.image.len() as Word
  }

  fn emit<T: Scalar>(&mut self, value: T) {
    let start = self.image.len();
    self.image.resize(start + T::WIDTH, 0);
    value.encode(&mut self.image[start..]);
  }

  /// Records a reference to the symbol named by `text`, a sigil followed by a name, and emits
  /// the placeholder word.
  fn emit_reference(&mut self, token: &Token, text: &str) -> Result<(), AssemblerError> {
    let reference = Reference { offset: self.image.len(), line: token.line, column: token.column };
    let (table, kind) = match text.chars().next() {
      Some('@') => (&mut self.labels, AssemblerErrorKind::InvalidLabelParse),
      _         => (&mut self.variables, AssemblerErrorKind::InvalidVarParse)
    };

    let name = &text[1..];
    if !is_symbol_name(name) {
      return Err(token.error(kind).with_extra(text));
    }
    table.reference(name, reference);
    self.emit(PLACEHOLDER);
    Ok(())
  }

  /// Consumes one token.
  pub fn feed(&mut self, token: Token) -> Result<(), AssemblerError> {
    if self.settings.debug {
      trace!(line = token.line, column = token.column, "token {:?}", token.value);
    }

    match self.open {
      Some(open) => self.operand(open, &token),
      None       => self.statement(&token)
    }
  }

  /// A label definition or a mnemonic.
  fn statement(&mut self, token: &Token) -> Result<(), AssemblerError> {
    let text = match &token.value {
      TokenValue::Word(text)  => text.as_str(),
      TokenValue::String(_)   => {
        return Err(token.error(AssemblerErrorKind::InvalidOpcodeParse).with_extra("string literal"));
      }
    };

    if let Some(name) = text.strip_prefix('@') {
      if !is_symbol_name(name) || name == START_LABEL {
        return Err(token.error(AssemblerErrorKind::InvalidLabelParse).with_extra(text));
      }
      let offset = self.offset();
      return self.labels
                 .define(name, offset)
                 .map_err(|_| token.error(AssemblerErrorKind::DuplicateLabel).with_extra(text));
    }

    let opcode = Opcode::from_str(text).map_err(
      |_| token.error(AssemblerErrorKind::InvalidOpcodeParse).with_extra(text)
    )?;

    match (opcode.region(), self.in_globals) {
      (Region::Globals, false) => {
        return Err(token.error(AssemblerErrorKind::MisplacedGlobal).with_extra(text));
      }
      (Region::Code, true)     => {
        self.in_globals = false;
        let offset = self.offset();
        debug!("globals region ends at {:#x}", offset);
        // The start label is reserved, so it cannot already be defined.
        let _ = self.labels.define(START_LABEL, offset);
      }
      _                        => {}
    }

    self.emit(opcode.code());
    if opcode.arity() > 0 {
      self.open = Some(OpenInstruction { opcode, next: 0, line: token.line, column: token.column });
    }
    Ok(())
  }

  /// Fills the next operand slot of the open instruction.
  fn operand(&mut self, mut open: OpenInstruction, token: &Token) -> Result<(), AssemblerError> {
    let kind = open.opcode.operands()[open.next];

    match kind {

      | OperandKind::WordRegister
      | OperandKind::ByteRegister => {
        let bank = match kind == OperandKind::WordRegister {
          true  => Bank::Word,
          false => Bank::Byte
        };
        let id = token.word()
                      .and_then(|text| parse_register(text, bank))
                      .ok_or_else(|| self.describe(token, AssemblerErrorKind::InvalidRegisterParse))?;
        self.emit(id);
      }

      OperandKind::Word => {
        match token.word() {
          Some(text) if text.starts_with('@') || text.starts_with('%') => {
            self.emit_reference(token, text)?;
          }
          text => {
            let word = text.and_then(parse_word)
                           .ok_or_else(|| self.describe(token, AssemblerErrorKind::InvalidWordParse))?;
            self.emit(word);
          }
        }
      }

      OperandKind::Byte => {
        let byte: Byte = token.word()
                              .and_then(parse_byte)
                              .ok_or_else(|| self.describe(token, AssemblerErrorKind::InvalidByteParse))?;
        self.emit(byte);
      }

      OperandKind::Short => {
        let short: Short = token.word()
                                .and_then(parse_short)
                                .ok_or_else(|| self.describe(token, AssemblerErrorKind::InvalidShortParse))?;
        self.emit(short);
      }

      OperandKind::Label => {
        match token.word() {
          Some(text) if text.starts_with('@') => {
            self.emit_reference(token, text)?;
          }
          text => {
            let address = text.and_then(parse_word)
                              .ok_or_else(|| self.describe(token, AssemblerErrorKind::InvalidLabelParse))?;
            self.emit(address);
          }
        }
      }

      OperandKind::Variable => {
        let name = token.word()
                        .and_then(|text| text.strip_prefix('%'))
                        .filter(|name| is_symbol_name(name))
                        .ok_or_else(|| self.describe(token, AssemblerErrorKind::InvalidVarParse))?;
        let offset = self.offset();
        self.variables
            .define(name, offset)
            .map_err(|_| self.describe(token, AssemblerErrorKind::DuplicateVariable))?;
      }

      OperandKind::String => {
        match &token.value {
          TokenValue::String(bytes) => {
            self.image.extend_from_slice(bytes);
            self.image.push(0);
          }
          TokenValue::Word(_) => {
            return Err(self.describe(token, AssemblerErrorKind::InvalidStringParse));
          }
        }
      }

      // Slots are only opened while `next < arity`.
      OperandKind::None => {}

    } // end match on operand kind

    open.next += 1;
    self.open = match open.next < open.opcode.arity() {
      true  => Some(open),
      false => None
    };
    Ok(())
  }

  /// An error for `token` that names what it was and what the open slot expected.
  fn describe(&self, token: &Token, kind: AssemblerErrorKind) -> AssemblerError {
    let found = match &token.value {
      TokenValue::Word(text)  => format!("`{}`", text),
      TokenValue::String(_)   => "string literal".to_string()
    };
    match self.open {
      Some(open) => {
        let expected = open.opcode.operands()[open.next];
        token.error(kind).with_extra(format!("{} expects {}, found {}", open.opcode, expected, found))
      }
      None => token.error(kind).with_extra(found)
    }
  }

  /// Ends the source, resolves every reference and returns the finished image.
  pub fn finish(mut self) -> Result<Vec<u8>, AssemblerError> {
    if let Some(open) = self.open {
      let expected = open.opcode.operands()[open.next];
      return Err(
        AssemblerError::new(AssemblerErrorKind::MissingOperand, open.line, open.column)
          .with_extra(format!("{} expects {}", open.opcode, expected))
      );
    }

    if self.in_globals {
      let offset = self.offset();
      let _ = self.labels.define(START_LABEL, offset);
    }

    if self.settings.debug {
      debug!("labels\n{}", self.labels);
      debug!("global variables\n{}", self.variables);
    }

    let labels = self.labels.patch(&mut self.image).map_err(|unresolved| {
      AssemblerError::new(
        AssemblerErrorKind::UndefinedLabel,
        unresolved.reference.line,
        unresolved.reference.column
      ).with_extra(format!("@{}", unresolved.name))
    })?;

    let variables = self.variables.patch(&mut self.image).map_err(|unresolved| {
      AssemblerError::new(
        AssemblerErrorKind::UndefinedVariable,
        unresolved.reference.line,
        unresolved.reference.column
      ).with_extra(format!("%{}", unresolved.name))
    })?;

    debug!(
      "assembled {} bytes, patched {} label and {} variable references",
      self.image.len(), labels, variables
    );
    Ok(self.image)
  }
}

/// Assembles `source` into an image.
pub fn assemble(source: &str, settings: &AssemblerSettings) -> Result<Vec<u8>, AssemblerError> {
  let mut assembler = Assembler::new(settings);
  for token in Scanner::new(source) {
    assembler.feed(token?)?;
  }
  assembler.finish()
}

/// Assembles the file at `input` and writes the image to `output`. Nothing is written if
/// assembly fails. Returns the size of the image.
pub fn assemble_file(input: &Path, output: &Path, settings: &AssemblerSettings) -> Result<usize, Error> {
  let source = std::fs::read_to_string(input).map_err(|source| Error::io(input, source))?;
  let image  = assemble(&source, settings)?;
  std::fs::write(output, &image).map_err(|source| Error::io(output, source))?;
  info!("wrote {} bytes to {}", image.len(), output.display());
  Ok(image.len())
}
