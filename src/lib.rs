/*!

  A toolchain for the execution units of a SIMD GPU: an instruction model, a binary codec for the
  native 16-byte and compacted 8-byte instruction forms, an assembler for a small kernel language,
  and a disassembler.

  ```text
  source text ──Program::assemble──▶ [Instruction] ──encode──▶ bytes
                                                               │
  text lines ◀──disassemble── [Instruction] ◀──Decoder::decode─┘
  ```

*/

pub mod assembler;
pub mod codec;
pub mod disassembler;
pub mod error;
pub mod isa;
pub mod register;

pub use assembler::Program;
pub use codec::{encode, encode_instruction, expand_compressed_instruction, Decoder};
pub use disassembler::{disassemble, Listing, ListingEntry};
pub use error::{
  AssemblyError,
  AssemblyErrorKind,
  AssemblyFailed,
  DecodeError,
  DisassemblyError,
  EncodeError,
  NullSink,
  TextSink,
};
pub use isa::Instruction;
