/*!
  Bit positions of every field the codec reads or writes, for the three physical forms of the
  Haswell (Gen7.5) encoding: the native two-source form, the native three-source form and the
  compacted form. Positions are inclusive bit ranges into the little-endian instruction buffer.
*/

use super::bits::Field;

/// Length in bytes of a native instruction.
pub const NATIVE_LENGTH: usize = 16;
/// Length in bytes of a compacted instruction.
pub const COMPACT_LENGTH: usize = 8;

/// Register file codes.
pub const FILE_ARCH: u32 = 0;
pub const FILE_GENERAL: u32 = 1;
pub const FILE_IMMEDIATE: u32 = 3;

/// The vstride code an align16 register source carries: rows of four elements.
pub const ALIGN16_VSTRIDE_CODE: u32 = 3;

/// Fields shared by the native two- and three-source forms.
pub mod common {
  use super::Field;

  pub const OPCODE: Field              = Field::new("opcode", 0, 6);
  pub const ACCESS_MODE: Field         = Field::new("access_mode", 8, 8);
  pub const MASK_CONTROL: Field        = Field::new("mask_control", 9, 9);
  pub const NO_DD_CLEAR: Field         = Field::new("no_dd_clear", 10, 10);
  pub const NO_DD_CHECK: Field         = Field::new("no_dd_check", 11, 11);
  pub const PREDICATE_CONTROL: Field   = Field::new("predicate_control", 16, 19);
  pub const PREDICATE_INVERT: Field    = Field::new("predicate_invert", 20, 20);
  pub const EXEC_SIZE: Field           = Field::new("exec_size", 21, 23);
  /// Holds the conditional modifier, the math function or the shared-function id.
  pub const FUNCTION_CONTROL: Field    = Field::new("function_control", 24, 27);
  pub const ACC_WRITE: Field           = Field::new("acc_write", 28, 28);
  pub const COMPACTION_CONTROL: Field  = Field::new("compaction_control", 29, 29);
  pub const DEBUG: Field               = Field::new("debug", 30, 30);
  pub const SATURATE: Field            = Field::new("saturate", 31, 31);
}

/// Where a native form keeps its flag register reference.
#[derive(Copy, Clone, Debug)]
pub struct FlagFields {
  pub reg    : Field,
  pub subreg : Field,
}

/// The two-source form keeps the flag reference just past the source 0 region.
pub const FLAG: FlagFields = FlagFields {
  reg    : Field::new("flag_reg", 90, 90),
  subreg : Field::new("flag_subreg", 89, 89),
};

/// Destination fields of the native two-source form.
pub mod dest {
  use super::Field;

  pub const FILE: Field                = Field::new("dst.file", 32, 33);
  pub const TYPE: Field                = Field::new("dst.type", 34, 36);
  pub const SUBREG: Field              = Field::new("dst.subreg", 48, 52);
  pub const WRITE_MASK: Field          = Field::new("dst.write_mask", 48, 51);
  pub const ALIGN16_SUBREG: Field      = Field::new("dst.subreg16", 52, 52);
  pub const INDIRECT_IMMEDIATE: Field  = Field::new("dst.indirect_offset", 48, 57);
  pub const INDIRECT_SUBREG: Field     = Field::new("dst.address_subreg", 58, 60);
  pub const REG: Field                 = Field::new("dst.reg", 53, 60);
  pub const HSTRIDE: Field             = Field::new("dst.hstride", 61, 62);
  pub const ADDRESS_MODE: Field        = Field::new("dst.address_mode", 63, 63);
}

/// The register-operand block of one source in the native two-source form.
#[derive(Copy, Clone, Debug)]
pub struct SourceFields {
  pub file                 : Field,
  pub data_type            : Field,
  pub subreg               : Field,
  pub reg                  : Field,
  pub indirect_immediate   : Field,
  pub indirect_subreg      : Field,
  pub abs                  : Field,
  pub negate               : Field,
  pub address_mode         : Field,
  pub hstride              : Field,
  pub width                : Field,
  pub vstride              : Field,
  pub swizzle_x            : Field,
  pub swizzle_y            : Field,
  pub align16_subreg       : Field,
  pub swizzle_z            : Field,
  pub swizzle_w            : Field,
  /// The twelve bits from `abs` through `vstride`, the unit the compaction tables index.
  pub region_block         : Field,
}

pub const SRC0: SourceFields = SourceFields {
  file                 : Field::new("src0.file", 37, 38),
  data_type            : Field::new("src0.type", 39, 41),
  subreg               : Field::new("src0.subreg", 64, 68),
  reg                  : Field::new("src0.reg", 69, 76),
  indirect_immediate   : Field::new("src0.indirect_offset", 64, 73),
  indirect_subreg      : Field::new("src0.address_subreg", 74, 76),
  abs                  : Field::new("src0.abs", 77, 77),
  negate               : Field::new("src0.negate", 78, 78),
  address_mode         : Field::new("src0.address_mode", 79, 79),
  hstride              : Field::new("src0.hstride", 80, 81),
  width                : Field::new("src0.width", 82, 84),
  vstride              : Field::new("src0.vstride", 85, 88),
  swizzle_x            : Field::new("src0.swizzle_x", 64, 65),
  swizzle_y            : Field::new("src0.swizzle_y", 66, 67),
  align16_subreg       : Field::new("src0.subreg16", 68, 68),
  swizzle_z            : Field::new("src0.swizzle_z", 80, 81),
  swizzle_w            : Field::new("src0.swizzle_w", 82, 83),
  region_block         : Field::new("src0.region", 77, 88),
};

pub const SRC1: SourceFields = SourceFields {
  file                 : Field::new("src1.file", 42, 43),
  data_type            : Field::new("src1.type", 44, 46),
  subreg               : Field::new("src1.subreg", 96, 100),
  reg                  : Field::new("src1.reg", 101, 108),
  indirect_immediate   : Field::new("src1.indirect_offset", 96, 105),
  indirect_subreg      : Field::new("src1.address_subreg", 106, 108),
  abs                  : Field::new("src1.abs", 109, 109),
  negate               : Field::new("src1.negate", 110, 110),
  address_mode         : Field::new("src1.address_mode", 111, 111),
  hstride              : Field::new("src1.hstride", 112, 113),
  width                : Field::new("src1.width", 114, 116),
  vstride              : Field::new("src1.vstride", 117, 120),
  swizzle_x            : Field::new("src1.swizzle_x", 96, 97),
  swizzle_y            : Field::new("src1.swizzle_y", 98, 99),
  align16_subreg       : Field::new("src1.subreg16", 100, 100),
  swizzle_z            : Field::new("src1.swizzle_z", 112, 113),
  swizzle_w            : Field::new("src1.swizzle_w", 114, 115),
  region_block         : Field::new("src1.region", 109, 120),
};

pub const IMMEDIATE: Field       = Field::new("immediate", 96, 127);
pub const SEND_DESCRIPTOR: Field = Field::new("descriptor", 96, 126);
pub const END_OF_THREAD: Field   = Field::new("eot", 127, 127);
pub const JIP: Field             = Field::new("jip", 96, 111);
pub const UIP: Field             = Field::new("uip", 112, 127);

/// The send descriptor is 29 bits; the rest of its slot is reserved.
pub const DESCRIPTOR_BITS: usize = 29;

/// The native three-source form. Sources are laid out at `64 + 21 * i`.
pub mod ternary {
  use super::{Field, FlagFields};

  pub const FLAG: FlagFields = FlagFields {
    reg    : Field::new("flag_reg", 34, 34),
    subreg : Field::new("flag_subreg", 33, 33),
  };
  pub const SRC_ABS: [Field; 3] = [
    Field::new("src0.abs", 36, 36),
    Field::new("src1.abs", 38, 38),
    Field::new("src2.abs", 40, 40),
  ];
  pub const SRC_NEGATE: [Field; 3] = [
    Field::new("src0.negate", 37, 37),
    Field::new("src1.negate", 39, 39),
    Field::new("src2.negate", 41, 41),
  ];
  pub const SRC_TYPE: Field      = Field::new("src.type", 42, 43);
  pub const DST_TYPE: Field      = Field::new("dst.type", 44, 45);
  pub const DST_WRITE_MASK: Field = Field::new("dst.write_mask", 49, 52);
  /// In dwords.
  pub const DST_SUBREG: Field    = Field::new("dst.subreg", 53, 55);
  pub const DST_REG: Field       = Field::new("dst.reg", 56, 63);

  const fn base(source: usize) -> usize {
    64 + 21 * source
  }

  pub const fn rep_control(source: usize) -> Field {
    Field::new("src.rep_ctrl", base(source), base(source))
  }

  pub const fn swizzle(source: usize) -> Field {
    Field::new("src.swizzle", base(source) + 1, base(source) + 8)
  }

  /// In dwords.
  pub const fn subreg(source: usize) -> Field {
    Field::new("src.subreg", base(source) + 9, base(source) + 11)
  }

  pub const fn reg(source: usize) -> Field {
    Field::new("src.reg", base(source) + 12, base(source) + 19)
  }
}

/// The compacted form.
pub mod compact {
  use super::Field;

  pub const OPCODE: Field             = Field::new("opcode", 0, 6);
  pub const DEBUG: Field              = Field::new("debug", 7, 7);
  pub const CONTROL_INDEX: Field      = Field::new("control_index", 8, 12);
  pub const DATATYPE_INDEX: Field     = Field::new("datatype_index", 13, 17);
  pub const SUBREG_INDEX: Field       = Field::new("subreg_index", 18, 22);
  pub const ACC_WRITE: Field          = Field::new("acc_write", 23, 23);
  pub const CONDITION: Field          = Field::new("condition", 24, 27);
  pub const COMPACTION_CONTROL: Field = Field::new("compaction_control", 29, 29);
  pub const SRC0_INDEX: Field         = Field::new("src0_index", 30, 34);
  pub const SRC1_INDEX: Field         = Field::new("src1_index", 35, 39);
  pub const DST_REG: Field            = Field::new("dst.reg", 40, 47);
  pub const SRC0_REG: Field           = Field::new("src0.reg", 48, 55);
  pub const SRC1_REG: Field           = Field::new("src1.reg", 56, 63);
}
