/*!
  The compacted form replaces four groups of native fields with 5-bit indices into fixed tables
  of 32 entries each. Expansion looks each index up and scatters the entry's bits back into the
  native positions; `compact` is the inverse lookup, and only succeeds when expanding its result
  reproduces the native instruction exactly.

  The tables below are hardware data and must be kept bit-exact.
*/

use super::bits::{sign_extend, BitCursor, Field};
use super::layout::{self, common, compact as cf, COMPACT_LENGTH, FILE_IMMEDIATE, NATIVE_LENGTH, SRC0, SRC1};
use crate::isa::Opcode;

/// Places bits `shift..` of a table entry into `field`.
#[derive(Copy, Clone)]
struct Scatter {
  field : Field,
  shift : u32,
}

const fn scatter(field: Field, shift: u32) -> Scatter {
  Scatter { field, shift }
}

const CONTROL_SCATTER: [Scatter; 3] = [
  scatter(Field::new("control[18:17]", 89, 90), 17),
  scatter(common::SATURATE, 16),
  scatter(Field::new("control[15:0]", 8, 23), 0),
];

const DATATYPE_SCATTER: [Scatter; 2] = [
  scatter(Field::new("datatype[17:15]", 61, 63), 15),
  scatter(Field::new("datatype[14:0]", 32, 46), 0),
];

const SUBREG_SCATTER: [Scatter; 3] = [
  scatter(SRC1.subreg, 10),
  scatter(SRC0.subreg, 5),
  scatter(layout::dest::SUBREG, 0),
];

const SRC0_SCATTER: [Scatter; 1] = [scatter(SRC0.region_block, 0)];
const SRC1_SCATTER: [Scatter; 1] = [scatter(SRC1.region_block, 0)];

/// Header, datatype, subregister and source-region lookup tables.
pub struct CompactionTables {
  pub control   : [u32; 32],
  pub datatype  : [u32; 32],
  pub subreg    : [u32; 32],
  pub src_index : [u32; 32],
}

/// The Haswell (Gen7.5) tables.
pub static HASWELL_TABLES: CompactionTables = CompactionTables {
  control: [
    0b0000000000000000010, 0b0000100000000000000, 0b0000100000000000001, 0b0000100000000000010,
    0b0000100000000000011, 0b0000100000000000100, 0b0000100000000000101, 0b0000100000000000111,
    0b0000100000000001000, 0b0000100000000001001, 0b0000100000000001101, 0b0000110000000000000,
    0b0000110000000000001, 0b0000110000000000010, 0b0000110000000000011, 0b0000110000000000100,
    0b0000110000000000101, 0b0000110000000000111, 0b0000110000000001001, 0b0000110000000001101,
    0b0000110000000010000, 0b0000110000100000000, 0b0001000000000000000, 0b0001000000000000010,
    0b0001000000000000100, 0b0001000000100000000, 0b0010110000000000000, 0b0010110000000010000,
    0b0011000000000000000, 0b0011000000100000000, 0b0101000000000000000, 0b0101000000100000000,
  ],
  datatype: [
    0b001000000000000001, 0b001000000000100000, 0b001000000000100001, 0b001000000001100001,
    0b001000000010111101, 0b001000001011111101, 0b001000001110100001, 0b001000001110100101,
    0b001000001110111101, 0b001000010000100001, 0b001000110000100000, 0b001000110000100001,
    0b001001010010100101, 0b001001110010100100, 0b001001110010100101, 0b001111001110111101,
    0b001111011110011101, 0b001111011110111100, 0b001111011110111101, 0b001111111110111100,
    0b000000001000001100, 0b001000000000111101, 0b001000000010100101, 0b001000010000100000,
    0b001001010010100100, 0b001001110010000100, 0b001010010100001001, 0b001101111110111101,
    0b001111111110111101, 0b001011110110101100, 0b001010010100101000, 0b001010110100101000,
  ],
  subreg: [
    0b000000000000000, 0b000000000000001, 0b000000000001000, 0b000000000001111,
    0b000000000010000, 0b000000010000000, 0b000000100000000, 0b000000110000000,
    0b000001000000000, 0b000001000010000, 0b000010100000000, 0b001000000000000,
    0b001000000000001, 0b001000010000001, 0b001000010000010, 0b001000010000011,
    0b001000010000100, 0b001000010000111, 0b001000010001000, 0b001000010001110,
    0b001000010001111, 0b001000110000000, 0b001000111101000, 0b010000000000000,
    0b010000110000000, 0b011000000000000, 0b011110010000111, 0b100000000000000,
    0b101000000000000, 0b110000000000000, 0b111000000000000, 0b111000000011100,
  ],
  src_index: [
    0b000000000000, 0b000000000010, 0b000000010000, 0b000000010010,
    0b000000011000, 0b000000100000, 0b000000101000, 0b000001001000,
    0b000001010000, 0b000001110000, 0b000001111000, 0b001100000000,
    0b001100000010, 0b001100001000, 0b001100010000, 0b001100010010,
    0b001100100000, 0b001100101000, 0b001100111000, 0b001101000000,
    0b001101000010, 0b001101001000, 0b001101010000, 0b001101100000,
    0b001101101000, 0b001101110000, 0b001101110001, 0b001101111000,
    0b010001101000, 0b101000000000, 0b101001000000, 0b101001001000,
  ],
};

/// Width of the immediate a compacted instruction can carry in its src1 index and register.
const COMPACT_IMMEDIATE_BITS: usize = 13;

fn place(cursor: &mut BitCursor, entry: u32, scatters: &[Scatter]) -> Option<()> {
  for s in scatters {
    cursor.write(s.field, (entry >> s.shift) & s.field.max_value()).ok()?;
  }
  Some(())
}

fn gather(native: &[u8], scatters: &[Scatter]) -> u32 {
  scatters.iter().fold(0, |entry, s| entry | (s.field.read(native) << s.shift))
}

fn index_of(table: &[u32; 32], entry: u32) -> Option<u32> {
  table.iter().position(|candidate| *candidate == entry).map(|index| index as u32)
}

impl CompactionTables {

  /// Expands an 8-byte compacted instruction. Returns `None` if fewer than eight bytes are given.
  pub fn expand(&self, compacted: &[u8]) -> Option<[u8; NATIVE_LENGTH]> {
    if compacted.len() < COMPACT_LENGTH {
      return None;
    }
    let index = |field: Field| field.read(compacted) as usize;

    let mut native = [0u8; NATIVE_LENGTH];
    let mut cursor = BitCursor::new(&mut native);

    place(&mut cursor, self.control[index(cf::CONTROL_INDEX)], &CONTROL_SCATTER)?;
    place(&mut cursor, self.datatype[index(cf::DATATYPE_INDEX)], &DATATYPE_SCATTER)?;
    place(&mut cursor, self.subreg[index(cf::SUBREG_INDEX)], &SUBREG_SCATTER)?;
    place(&mut cursor, self.src_index[index(cf::SRC0_INDEX)], &SRC0_SCATTER)?;

    cursor.write(common::OPCODE, cf::OPCODE.read(compacted)).ok()?;
    cursor.write(common::DEBUG, cf::DEBUG.read(compacted)).ok()?;
    cursor.write(common::ACC_WRITE, cf::ACC_WRITE.read(compacted)).ok()?;
    cursor.write(common::FUNCTION_CONTROL, cf::CONDITION.read(compacted)).ok()?;
    cursor.write(layout::dest::REG, cf::DST_REG.read(compacted)).ok()?;
    cursor.write(SRC0.reg, cf::SRC0_REG.read(compacted)).ok()?;

    let src1_index = cf::SRC1_INDEX.read(compacted);
    let src1_reg   = cf::SRC1_REG.read(compacted);
    match cursor.read(SRC1.file) {
      FILE_IMMEDIATE => {
        let immediate = sign_extend(src1_index << 8 | src1_reg, COMPACT_IMMEDIATE_BITS);
        cursor.write(layout::IMMEDIATE, immediate as u32).ok()?;
      }
      _ => {
        place(&mut cursor, self.src_index[src1_index as usize], &SRC1_SCATTER)?;
        cursor.write(SRC1.reg, src1_reg).ok()?;
      }
    }

    cursor.write(common::COMPACTION_CONTROL, 0).ok()?;
    Some(native)
  }

  /**
    Finds the compacted form of a native instruction, if it has one. An instruction has a
    compacted form when its opcode may be compacted, each field group appears in its table, any
    immediate fits in thirteen signed bits, and every bit outside those groups is zero.
  */
  pub fn compact(&self, native: &[u8]) -> Option<[u8; COMPACT_LENGTH]> {
    if native.len() < NATIVE_LENGTH {
      return None;
    }
    let opcode = Opcode::from_code(common::OPCODE.read(native) as u8)?;
    if opcode.is_never_compacted() || common::COMPACTION_CONTROL.read_flag(native) {
      return None;
    }

    let (src1_index, src1_reg) = match SRC1.file.read(native) {
      FILE_IMMEDIATE => {
        let immediate = layout::IMMEDIATE.read(native);
        if sign_extend(immediate & 0x1FFF, COMPACT_IMMEDIATE_BITS) as u32 != immediate {
          return None;
        }
        ((immediate >> 8) & 0x1F, immediate & 0xFF)
      }
      _ => (index_of(&self.src_index, gather(native, &SRC1_SCATTER))?, SRC1.reg.read(native))
    };

    let mut compacted = [0u8; COMPACT_LENGTH];
    let mut cursor = BitCursor::new(&mut compacted);
    cursor.write(cf::OPCODE, opcode.code() as u32).ok()?;
    cursor.write(cf::DEBUG, common::DEBUG.read(native)).ok()?;
    cursor.write(cf::CONTROL_INDEX, index_of(&self.control, gather(native, &CONTROL_SCATTER))?).ok()?;
    cursor.write(cf::DATATYPE_INDEX, index_of(&self.datatype, gather(native, &DATATYPE_SCATTER))?).ok()?;
    cursor.write(cf::SUBREG_INDEX, index_of(&self.subreg, gather(native, &SUBREG_SCATTER))?).ok()?;
    cursor.write(cf::ACC_WRITE, common::ACC_WRITE.read(native)).ok()?;
    cursor.write(cf::CONDITION, common::FUNCTION_CONTROL.read(native)).ok()?;
    cursor.write(cf::COMPACTION_CONTROL, 1).ok()?;
    cursor.write(cf::SRC0_INDEX, index_of(&self.src_index, gather(native, &SRC0_SCATTER))?).ok()?;
    cursor.write(cf::SRC1_INDEX, src1_index).ok()?;
    cursor.write(cf::DST_REG, layout::dest::REG.read(native)).ok()?;
    cursor.write(cf::SRC0_REG, SRC0.reg.read(native)).ok()?;
    cursor.write(cf::SRC1_REG, src1_reg).ok()?;

    // Anything the groups do not cover must already be zero.
    match self.expand(&compacted) {
      Some(expanded) if expanded[..] == native[..NATIVE_LENGTH] => Some(compacted),
      _ => None
    }
  }
}

/// Expands a compacted instruction with the Haswell tables.
pub fn expand_compressed_instruction(compacted: &[u8]) -> Option<[u8; NATIVE_LENGTH]> {
  HASWELL_TABLES.expand(compacted)
}

/// Compacts a native instruction with the Haswell tables.
pub fn compact(native: &[u8]) -> Option<[u8; COMPACT_LENGTH]> {
  HASWELL_TABLES.compact(native)
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn tables_have_no_duplicates(){
    for table in [
      &HASWELL_TABLES.control, &HASWELL_TABLES.datatype, &HASWELL_TABLES.subreg, &HASWELL_TABLES.src_index
    ].iter() {
      for (i, entry) in table.iter().enumerate() {
        assert_eq!(index_of(table, *entry), Some(i as u32));
      }
    }
  }

  #[test]
  fn all_zero_indices(){
    // `mov` with every index zero.
    let compacted = [0x01, 0x00, 0x00, 0x20, 0x00, 0x00, 0x00, 0x00];
    let expected  = [
      0x01, 0x02, 0x00, 0x00, 0x01, 0x00, 0x00, 0x20,
      0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    ];
    assert_eq!(expand_compressed_instruction(&compacted), Some(expected));
  }

  #[test]
  fn float_add(){
    // add(8) r2.f, r3.f<8,8,1>, r4.f<8,8,1>
    let compacted = [0x40, 0x4B, 0x02, 0x20, 0xE7, 0x02, 0x03, 0x04];
    let native    = [
      0x40, 0x00, 0x60, 0x00, 0xBD, 0x77, 0x40, 0x20,
      0x60, 0x00, 0x8D, 0x00, 0x80, 0x00, 0x8D, 0x00,
    ];
    assert_eq!(expand_compressed_instruction(&compacted), Some(native));
    assert_eq!(compact(&native), Some(compacted));
  }

  #[test]
  fn immediate_is_sign_extended(){
    // add(8) r2.u, r3.u<8,8,1>, -16
    let compacted = [0x40, 0x6B, 0x01, 0x20, 0xFF, 0x02, 0x03, 0xF0];
    let native = expand_compressed_instruction(&compacted).unwrap();
    assert_eq!(layout::IMMEDIATE.read(&native), 0xFFFF_FFF0);
    assert_eq!(compact(&native), Some(compacted));
  }

  #[test]
  fn uncompactable(){
    let compacted = [0x40, 0x6B, 0x01, 0x20, 0x07, 0x02, 0x03, 0x05];
    let mut native = expand_compressed_instruction(&compacted).unwrap();
    assert_eq!(compact(&native), Some(compacted));

    // An immediate wider than thirteen signed bits.
    let mut cursor = BitCursor::new(&mut native);
    cursor.write(layout::IMMEDIATE, 0x0001_2345).unwrap();
    assert_eq!(compact(&native), None);

    // A stray bit outside every group.
    let mut native = expand_compressed_instruction(&compacted).unwrap();
    native[5] |= 0x80;
    assert_eq!(compact(&native), None);

    // Sends are never compacted.
    let mut native = expand_compressed_instruction(&compacted).unwrap();
    native[0] = Opcode::Send.code();
    assert_eq!(compact(&native), None);

    assert_eq!(expand_compressed_instruction(&compacted[..4]), None);
  }
}
