/*!

  The instruction model shared by the codec, the assembler and the disassembler.

  The execution unit runs SIMD instructions over 32-byte general registers. Each instruction is
  either 16 bytes ("native") or 8 bytes ("compacted"); the model below describes what an
  instruction means, independent of which physical form it came from. The sizes of the
  components that matter most are:

    Opcode:            7 bits
    Execution size:    3 bits  (1, 2, 4, 8, 16 or 32 lanes, stored as log2)
    Register number:   8 bits
    Sub-register:      5 bits  (bytes)
    Immediate:        32 bits

  Unlike bytecode for a virtual machine, where it pays to keep instructions small in memory, the
  hardware fixes the binary layout, so nothing is gained by storing instructions packed. The model
  is therefore a plain tagged enum, one variant per operand shape, and each variant carries only
  its own payload. Exhaustive matching at the encoder, decoder and disassembler keeps the shapes
  honest.

*/

mod instruction;
mod opcode;
mod operand;

pub use instruction::{Instruction, InstructionHeader, MessageDescriptor};
pub use opcode::{Opcode, OpcodeClass};
pub use operand::{
  hstride_code,
  hstride_from_code,
  vf_from_f32,
  vf_to_f32,
  Channel,
  ConditionalModifier,
  DataType,
  DestOperand,
  ExecSize,
  FlagReference,
  Immediate,
  ImmediateType,
  MathFunction,
  Predicate,
  PredicateMode,
  RegisterRegion,
  SharedFunction,
  SourceAddressing,
  SourceModifier,
  SourceOperand,
  Swizzle,
  WriteMask,
};
