use std::{
  io::{self, Write},
  path::{Path, PathBuf},
  process::ExitCode
};

use clap::{Args, Parser, Subcommand};
use tracing::Level;

use zvm::{
  assemble,
  assemble_file,
  disassemble,
  exec_stdio,
  AssemblerSettings,
  Error,
  ExecutorSettings
};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
  #[command(subcommand)]
  command: Command,

  /// One of `TRACE`, `DEBUG`, `INFO`, `WARN`, or `ERROR`
  #[arg(short, long, global = true, default_value_t = Level::WARN)]
  log_level: Level,
}

#[derive(Subcommand)]
enum Command {
  /// Assemble a source file into an image
  Assemble {
    input: PathBuf,
    output: PathBuf,

    /// Log every token and the symbol tables
    #[arg(long, overrides_with = "no_debug")]
    debug: bool,

    #[arg(long)]
    no_debug: bool,
  },

  /// Execute an image
  Exec {
    image: PathBuf,

    #[command(flatten)]
    options: ExecOptions,
  },

  /// Assemble a source file in memory and execute it
  Run {
    source: PathBuf,

    #[command(flatten)]
    options: ExecOptions,
  },

  /// List the instructions of an image
  Disasm {
    image: PathBuf,
  },
}

#[derive(Args)]
struct ExecOptions {
  /// Log every executed instruction and the final registers
  #[arg(long)]
  debug: bool,

  /// Print per-opcode instruction counts after the run
  #[arg(long)]
  profile: bool,

  /// Stack size in bytes
  #[arg(long, default_value_t = zvm::executor::DEFAULT_STACK_SIZE)]
  stack_size: usize,

  /// Most heap memory in bytes allocated at once
  #[arg(long, default_value_t = zvm::executor::DEFAULT_HEAP_LIMIT)]
  heap_limit: usize,
}

impl Command {
  fn debug(&self) -> bool {
    match self {
      Command::Assemble { debug, no_debug, .. } => *debug && !*no_debug,
      | Command::Exec { options, .. }
      | Command::Run { options, .. }            => options.debug,
      Command::Disasm { .. }                    => false,
    }
  }
}

impl ExecOptions {
  fn settings(&self) -> ExecutorSettings {
    ExecutorSettings {
      debug      : self.debug,
      profile    : self.profile,
      stack_size : self.stack_size,
      heap_limit : self.heap_limit
    }
  }
}

fn main() -> ExitCode {
  let cli = Cli::parse();
  // The debug settings report through `trace!` and `debug!`.
  let level = match cli.command.debug() {
    true  => Level::TRACE,
    false => cli.log_level
  };
  tracing_subscriber::fmt()
    .with_max_level(level)
    .with_writer(io::stderr)
    .init();

  #[cfg(feature = "trace_computation")]
  tracing::info!("Computation tracing enabled");

  match main_real(cli.command) {
    Ok(())     => ExitCode::SUCCESS,
    Err(error) => {
      tracing::error!("{}", error);
      ExitCode::FAILURE
    }
  }
}

fn read(path: &Path) -> Result<Vec<u8>, Error> {
  std::fs::read(path).map_err(|source| Error::io(path, source))
}

fn execute(image: &[u8], options: &ExecOptions) -> Result<(), Error> {
  exec_stdio(image, &options.settings())?;
  Ok(())
}

fn main_real(command: Command) -> Result<(), Error> {
  match command {

    Command::Assemble { input, output, debug, no_debug } => {
      let settings = AssemblerSettings { debug: debug && !no_debug };
      assemble_file(&input, &output, &settings)?;
    }

    Command::Exec { image, options } => {
      execute(&read(&image)?, &options)?;
    }

    Command::Run { source, options } => {
      let text = std::fs::read_to_string(&source).map_err(|error| Error::io(&source, error))?;
      let settings = AssemblerSettings { debug: options.debug };
      execute(&assemble(&text, &settings)?, &options)?;
    }

    Command::Disasm { image } => {
      let stdout = io::stdout();
      let mut stdout = stdout.lock();
      for instruction in disassemble(&read(&image)?)? {
        writeln!(stdout, "{}", instruction).map_err(|error| Error::io(Path::new("<stdout>"), error))?;
      }
    }

  } // end match on command

  Ok(())
}
