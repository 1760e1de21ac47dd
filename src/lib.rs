/*!
  A small register-based virtual machine.

  The `assembler` turns assembly text into an image, and the `executor` loads an image and
  interprets it. The `bytecode` module holds what the two share: the opcode table, register
  names, scalar encoding and the image header.

  ```text
  source.zasm ──assemble──▶ image.zvm ──exec──▶ output
  ```
*/

#[macro_use] extern crate prettytable;
#[macro_use] extern crate lazy_static;

pub mod assembler;
pub mod bytecode;
pub mod executor;
mod display;

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub use assembler::{assemble, assemble_file, AssemblerError, AssemblerErrorKind, AssemblerSettings};
pub use executor::{
  disassemble,
  exec,
  exec_file,
  exec_stdio,
  exec_with,
  Executor,
  ExecutorError,
  ExecutorErrorKind,
  ExecutorSettings,
  RegisterFile
};

/// Any failure of a file level operation.
#[derive(Debug, Error)]
pub enum Error {
  #[error("{}: {source}", .path.display())]
  Io {
    path   : PathBuf,
    source : io::Error,
  },
  #[error(transparent)]
  Assembler(#[from] AssemblerError),
  #[error(transparent)]
  Executor(#[from] ExecutorError),
}

impl Error {
  pub fn io(path: &Path, source: io::Error) -> Error {
    Error::Io {
      path: path.to_path_buf(),
      source
    }
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use indoc::indoc;

  #[test]
  fn assemble_file_writes_only_on_success() {
    let directory = std::env::temp_dir();
    let id        = std::process::id();
    let good      = directory.join(format!("zvm-good-{}.zasm", id));
    let bad       = directory.join(format!("zvm-bad-{}.zasm", id));
    let output    = directory.join(format!("zvm-out-{}.zvm", id));

    std::fs::write(&good, indoc! {"
      movw R0, 2
      halt
    "}).unwrap();
    std::fs::write(&bad, "jmp @nowhere").unwrap();

    let _ = std::fs::remove_file(&output);
    match assemble_file(&bad, &output, &AssemblerSettings::default()) {
      Err(Error::Assembler(error)) => assert_eq!(error.kind, AssemblerErrorKind::UndefinedLabel),
      other                        => panic!("unexpected {:?}", other)
    }
    assert!(!output.exists());

    let size = assemble_file(&good, &output, &AssemblerSettings::default()).unwrap();
    let image = std::fs::read(&output).unwrap();
    assert_eq!(size, image.len());
    assert_eq!(disassemble(&image).unwrap().len(), 2);

    for path in [good, bad, output].iter() {
      std::fs::remove_file(path).unwrap();
    }
  }

  #[test]
  fn missing_files_name_their_path() {
    let path  = Path::new("/nonexistent/zvm/source.zasm");
    let error = assemble_file(path, Path::new("/nonexistent/out"), &AssemblerSettings::default())
                  .unwrap_err();
    assert!(error.to_string().starts_with("/nonexistent/zvm/source.zasm: "));
  }
}
