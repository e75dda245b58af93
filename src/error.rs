//! Error types for the codec, the assembler and the disassembler, and the push-only text sink
//! through which the assembler reports errors and the disassembler prints.

use std::fmt::{Display, Formatter};

use thiserror::Error;

use crate::isa::Opcode;

/// A push-only destination for lines of text.
pub trait TextSink {
  fn push(&mut self, text: &str);
}

impl TextSink for String {
  fn push(&mut self, text: &str) {
    self.push_str(text);
    self.push('\n');
  }
}

impl TextSink for Vec<String> {
  fn push(&mut self, text: &str) {
    Vec::push(self, text.to_string());
  }
}

/// Discards everything pushed to it.
pub struct NullSink;

impl TextSink for NullSink {
  fn push(&mut self, _text: &str) {}
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
  #[error("value {value:#x} does not fit in field `{field}`")]
  FieldOverflow { field: &'static str, value: u64 },

  #[error("`{0}` is not a legal region")]
  InvalidRegion(String),

  #[error("an immediate may only appear as the last source of `{0}`")]
  MisplacedImmediate(Opcode),

  #[error("field `{field}` lies outside the instruction buffer")]
  FieldOutOfBounds { field: &'static str },

  #[error("indirect addressing is not supported in align16 mode")]
  Align16Indirect,

  #[error("three-source operands must be direct general registers")]
  TernaryOperand,

  #[error("data type `.{0}` cannot be used by a three-source instruction")]
  TernaryDataType(String),

  #[error("math function `{function}` takes {expected} source(s)")]
  MathSourceCount { function: String, expected: usize },

  #[error("predicate mode is not legal in {0} mode")]
  PredicateMode(&'static str),

  #[error("align16 sources need a swizzle, align1 sources need a region")]
  MixedAddressing,

  #[error("descriptor {0:#x} does not fit in 29 bits")]
  DescriptorOverflow(u32),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
  /// The low seven bits are not an opcode this decoder recognizes.
  #[error("not an instruction (opcode bits {0:#04x})")]
  NotAnInstruction(u8),

  #[error("instruction needs {needed} bytes but only {available} remain")]
  Truncated { needed: usize, available: usize },

  #[error("field `{field}` holds reserved value {value:#x}")]
  InvalidField { field: &'static str, value: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DisassemblyError {
  #[error("at byte offset {offset}: {source}")]
  Decode { offset: usize, source: DecodeError },

  #[error("at byte offset {offset}: a {length}-byte instruction overruns the {available} remaining bytes")]
  Overrun { offset: usize, length: usize, available: usize },
}

/// What went wrong in an assembly statement.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblyErrorKind {
  #[error("syntax error near `{0}`")]
  Syntax(String),
  #[error("unterminated block comment")]
  UnterminatedComment,
  #[error("unrecognized instruction `{0}`")]
  UnknownMnemonic(String),
  #[error("unrecognized message `{0}`")]
  UnknownMessage(String),
  #[error("`{0}` is already declared")]
  DuplicateName(String),
  #[error("binding index {index} is already bound to `{name}`")]
  DuplicateBinding { name: String, index: u32 },
  #[error("label `{0}` is already defined")]
  DuplicateLabel(String),
  #[error("undefined label `{0}`")]
  UndefinedLabel(String),
  #[error("undefined bind point `{0}`")]
  UndefinedBinding(String),
  #[error("undefined register `{0}`")]
  UndefinedRegister(String),
  #[error("`{0}` is a reserved register name")]
  ReservedName(String),
  #[error("index {index} is out of range for `{name}`, which has {size} register(s)")]
  IndexOutOfRange { name: String, index: u32, size: u32 },
  #[error("execution size {0} is not one of 1, 2, 4, 8, 16, 32")]
  InvalidExecSize(u32),
  #[error("thread count {0} is outside [1, 64]")]
  InvalidThreadCount(u32),
  #[error("constant initializer group holds {0} bytes; a register holds 32")]
  CurbeOverflow(usize),
  #[error("`{name}` has {size} register(s) but {groups} initializer groups")]
  TooManyInitializers { name: String, size: u32, groups: usize },
  #[error("`{0}` must declare at least one register")]
  EmptyDeclaration(String),
  #[error("binding index {0} does not fit in eight bits")]
  BindingIndexRange(u64),
  #[error("sub-register byte offset {0} lies outside the register")]
  SubregisterRange(u32),
  #[error("out of general registers")]
  OutOfRegisters,
  #[error("declarations must precede the first instruction")]
  LateDeclaration,
  #[error("`{0}` takes {1} operand(s)")]
  OperandCount(String, usize),
  #[error("comparison `{0}` needs a flag reference")]
  MissingFlag(String),
  #[error("invalid flag reference `{0}`")]
  InvalidFlag(String),
  #[error("immediate `{0}` cannot be represented as `.{1}`")]
  ImmediateRange(String, String),
  #[error("operand cannot be an immediate here")]
  UnexpectedImmediate,
  #[error("cannot mix regions and swizzles in one instruction")]
  MixedAddressing,
  #[error("predication blocks cannot be nested")]
  NestedPredication,
  #[error("`}}` without an open predication block")]
  UnbalancedBrace,
  #[error("predication block is never closed")]
  UnclosedPredication,
  #[error("text after `end`")]
  TrailingText,
  #[error("r127 is reserved for the end-of-thread payload")]
  ReservedRegister,
  #[error("{0}")]
  Encode(#[from] EncodeError),
}

/// A parse error with the line of the statement that caused it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {kind}")]
pub struct AssemblyError {
  pub line : usize,
  pub kind : AssemblyErrorKind,
}

impl AssemblyError {
  pub fn new(line: usize, kind: AssemblyErrorKind) -> AssemblyError {
    AssemblyError { line, kind }
  }
}

/// Returned by a failed assembly; every error was also pushed to the caller's sink.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct AssemblyFailed {
  pub errors: Vec<AssemblyError>,
}

impl Display for AssemblyFailed {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "assembly failed with {} error(s)", self.errors.len())?;
    for error in self.errors.iter() {
      write!(f, "\n  {}", error)?;
    }
    Ok(())
  }
}
