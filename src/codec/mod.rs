/*!

  Binary encoding and decoding. Instructions are 128 bits ("native") or 64 bits ("compacted"),
  little-endian, with the opcode always in bits 0-6. Bit 29 of a native-length opcode word is the
  compaction-control bit: when set, the instruction is eight bytes long and most of its fields
  are replaced by indices into four fixed lookup tables. Only the decoder consumes compacted
  instructions; the encoder always produces the native form, and `compact` exists for tooling.

  The sizes of the fields that bound what can be encoded are:

    Register number:        8 bits
    Sub-register:           5 bits  (bytes; align16 operands use a single 16-byte bit)
    Indirect offset:       10 bits  (signed bytes)
    Immediate:             32 bits
    Send descriptor:       29 bits
    Branch offsets:        16 bits each (JIP and UIP)

  Field positions live in `layout` as data, so the encoder and decoder read as a list of field
  assignments rather than as shifts and masks.

*/

mod bits;
mod compaction;
mod decoder;
mod encoder;
mod layout;

pub use bits::{sign_extend, BitCursor, Field};
pub use compaction::{compact, expand_compressed_instruction, CompactionTables, HASWELL_TABLES};
pub use decoder::Decoder;
pub use encoder::{encode, encode_instruction, EncodedInstruction};
pub use layout::{COMPACT_LENGTH, NATIVE_LENGTH};
