#[macro_use] extern crate prettytable;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::exit;

use clap::{Parser, Subcommand};
use lazy_static::lazy_static;
use prettytable::{format as TableFormat, Table};
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

use genasm::codec::NATIVE_LENGTH;
use genasm::{
  disassemble,
  AssemblyFailed,
  Decoder,
  DisassemblyError,
  Listing,
  Program,
  TextSink,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Assembles a kernel into native instruction bytes.
  Assemble {
    input: PathBuf,

    /// Where to write the instructions; defaults to the input with a `.bin` extension.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Where to write the constant buffer image.
    #[arg(long)]
    curbe: Option<PathBuf>,
  },

  /// Prints the instructions in a binary, native or compacted.
  Disassemble {
    input: PathBuf,

    /// Lists offsets and raw bytes alongside each instruction.
    #[arg(long)]
    table: bool,
  },

  /// Rewrites a binary with every compacted instruction in its native form.
  Expand {
    input: PathBuf,

    #[arg(short, long)]
    output: PathBuf,
  },
}

#[derive(Debug, Error)]
enum CliError {
  #[error("{path}: {source}")]
  Io { path: PathBuf, source: std::io::Error },
  #[error("assembly failed with {} error(s)", .0.errors.len())]
  Assembly(#[from] AssemblyFailed),
  #[error(transparent)]
  Disassembly(#[from] DisassemblyError),
  #[error("no complete instruction at byte offset {0}")]
  Expansion(usize),
}

lazy_static! {
  static ref TABLE_DISPLAY_FORMAT: TableFormat::TableFormat =
    TableFormat::FormatBuilder::new()
      .column_separator('│')
      .borders(' ')
      .separator(
        TableFormat::LinePosition::Title,
        TableFormat::LineSeparator::new('─', '┼', ' ', ' ')
      )
      .separator(
        TableFormat::LinePosition::Bottom,
        TableFormat::LineSeparator::new('─', '┴', ' ', ' ')
      )
      .padding(1, 1)
      .build();
}

/// Prints each line to standard output.
struct Stdout;

impl TextSink for Stdout {
  fn push(&mut self, text: &str) {
    println!("{}", text);
  }
}

/// Prints each line to standard error.
struct Stderr;

impl TextSink for Stderr {
  fn push(&mut self, text: &str) {
    eprintln!("{}", text);
  }
}

fn read(path: &Path) -> Result<Vec<u8>, CliError> {
  fs::read(path).map_err(|source| CliError::Io { path: path.to_path_buf(), source })
}

fn write(path: &Path, bytes: &[u8]) -> Result<(), CliError> {
  fs::write(path, bytes).map_err(|source| CliError::Io { path: path.to_path_buf(), source })
}

fn assemble(input: &Path, output: Option<PathBuf>, curbe: Option<PathBuf>) -> Result<(), CliError> {
  let source = fs::read_to_string(input)
    .map_err(|source| CliError::Io { path: input.to_path_buf(), source })?;

  // Each error is printed by the sink as it is found; the returned failure only counts them.
  let program = Program::assemble(&source, &mut Stderr)?;

  let output = output.unwrap_or_else(|| input.with_extension("bin"));
  write(&output, program.bytes())?;
  info!(
    path = %output.display(),
    instructions = program.instructions().len(),
    threads = program.thread_count(),
    "wrote instructions"
  );

  if let Some(curbe) = curbe {
    write(&curbe, program.curbe())?;
    info!(path = %curbe.display(), bytes = program.curbe().len(), "wrote constant buffer");
  }
  Ok(())
}

fn hex(bytes: &[u8]) -> String {
  bytes.iter().map(|byte| format!("{:02x}", byte)).collect::<Vec<_>>().join(" ")
}

fn list(bytes: &[u8]) -> Result<(), CliError> {
  let decoder = Decoder::default();
  let mut table = Table::new();
  table.set_format(*TABLE_DISPLAY_FORMAT);
  table.set_titles(row![ubr->"Offset", ubl->"Bytes", ubl->"Instruction"]);

  let mut failure = None;
  for entry in Listing::new(&decoder, bytes) {
    match entry {
      Ok(entry) => {
        let raw = &bytes[entry.offset..entry.offset + entry.length];
        table.add_row(row![r->format!("{:#06x}", entry.offset), hex(raw), entry.instruction.to_string()]);
      }
      Err(error) => failure = Some(error)
    }
  }
  table.printstd();

  match failure {
    Some(error) => Err(error.into()),
    None        => Ok(())
  }
}

fn expand(input: &Path, output: &Path) -> Result<(), CliError> {
  let bytes   = read(input)?;
  let decoder = Decoder::default();
  let mut expanded = Vec::with_capacity(bytes.len() * 2);
  let mut offset   = 0;

  while offset < bytes.len() {
    let mut native = [0u8; NATIVE_LENGTH];
    let consumed = decoder.expand(&mut native, &bytes[offset..]);
    if consumed == 0 {
      return Err(CliError::Expansion(offset));
    }
    expanded.extend_from_slice(&native);
    offset += consumed;
  }

  write(output, &expanded)?;
  info!(path = %output.display(), bytes = expanded.len(), "wrote expanded instructions");
  Ok(())
}

fn run(args: Args) -> Result<(), CliError> {
  match args.command {
    Command::Assemble { input, output, curbe } => assemble(&input, output, curbe),
    Command::Disassemble { input, table: true } => list(&read(&input)?),
    Command::Disassemble { input, table: false } => {
      let count = disassemble(&mut Stdout, &Decoder::default(), &read(&input)?)?;
      info!(count, "disassembled");
      Ok(())
    }
    Command::Expand { input, output } => expand(&input, &output),
  }
}

fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .with_writer(std::io::stderr)
    .init();

  #[cfg(feature = "trace_assembly")]
  eprintln!("Assembly tracing ENABLED");

  if let Err(error) = run(Args::parse()) {
    eprintln!("genasm: {}", error);
    exit(1);
  }
}
