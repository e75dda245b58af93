use num_enum::{IntoPrimitive, TryFromPrimitive};
use strum_macros::{Display as StrumDisplay, EnumIter, EnumString, IntoStaticStr};

/**
  Hardware opcodes. Unlike a virtual machine's opcodes, the numbering is fixed by the hardware:
  the discriminant is the 7-bit code in bits 0-6 of every instruction, native or compacted. Gaps
  in the numbering are codes this toolchain does not recognize; decoding them yields "not an
  instruction," which is a different thing from `Illegal`, a real opcode used as padding.
*/
#[derive(
  StrumDisplay, IntoStaticStr, EnumString, EnumIter, TryFromPrimitive, IntoPrimitive,
  Clone,        Copy,          Eq,         PartialEq, Debug,            Hash
)]
#[strum(serialize_all = "lowercase")]
#[repr(u8)]
pub enum Opcode {
  Illegal  = 0x00,
  Mov      = 0x01,
  Sel      = 0x02,
  Movi     = 0x03,
  Not      = 0x04,
  And      = 0x05,
  Or       = 0x06,
  Xor      = 0x07,
  Shr      = 0x08,
  Shl      = 0x09,
  Smov     = 0x0A,
  Asr      = 0x0C,
  Cmp      = 0x10,
  Cmpn     = 0x11,
  Csel     = 0x12,
  F32to16  = 0x13,
  F16to32  = 0x14,
  Bfrev    = 0x17,
  Bfe      = 0x18,
  Bfi1     = 0x19,
  Bfi2     = 0x1A,
  Jmpi     = 0x20,
  Brd      = 0x21,
  If       = 0x22,
  Brc      = 0x23,
  Else     = 0x24,
  Endif    = 0x25,
  While    = 0x27,
  Break    = 0x28,
  Cont     = 0x29,
  Halt     = 0x2A,
  Calla    = 0x2B,
  Call     = 0x2C,
  Ret      = 0x2D,
  Goto     = 0x2E,
  Join     = 0x2F,
  Wait     = 0x30,
  Send     = 0x31,
  Sendc    = 0x32,
  Math     = 0x38,
  Add      = 0x40,
  Mul      = 0x41,
  Avg      = 0x42,
  Frc      = 0x43,
  Rndu     = 0x44,
  Rndd     = 0x45,
  Rnde     = 0x46,
  Rndz     = 0x47,
  Mac      = 0x48,
  Mach     = 0x49,
  Lzd      = 0x4A,
  Fbh      = 0x4B,
  Fbl      = 0x4C,
  Cbit     = 0x4D,
  Addc     = 0x4E,
  Subb     = 0x4F,
  Sad2     = 0x50,
  Sada2    = 0x51,
  Dp4      = 0x54,
  Dph      = 0x55,
  Dp3      = 0x56,
  Dp2      = 0x57,
  Line     = 0x59,
  Pln      = 0x5A,
  Mad      = 0x5B,
  Lrp      = 0x5C,
  Madm     = 0x5D,
  Nop      = 0x7E,
}

/// Opcodes grouped by the instruction variant, and so the bit layout, they use.
#[derive(StrumDisplay, Clone, Copy, Eq, PartialEq, Debug, Hash)]
pub enum OpcodeClass {
  Null,
  Unary,
  Binary,
  Ternary,
  Math,
  Send,
  Branch,
}

impl Opcode {
  pub fn code(&self) -> u8 {
    Into::<u8>::into(*self)
  }

  /// Maps the low seven bits of an instruction word to an opcode, if the code is recognized.
  pub fn from_code(code: u8) -> Option<Opcode> {
    Opcode::try_from_primitive(code & 0x7F).ok()
  }

  pub fn class(&self) -> OpcodeClass {
    use Opcode::*;
    match self {
      Illegal | Nop => OpcodeClass::Null,

      Send | Sendc => OpcodeClass::Send,

      Math => OpcodeClass::Math,

      Bfe | Bfi2 | Csel | Lrp | Mad | Madm => OpcodeClass::Ternary,

      If | Else | Endif | While | Break | Cont | Halt | Goto | Join => OpcodeClass::Branch,

      | Mov | Movi | Not | Frc | Rndu | Rndd | Rnde | Rndz | Lzd | Fbh | Fbl | Cbit | Bfrev
      | F32to16 | F16to32 | Jmpi | Brd | Brc | Call | Calla | Ret | Wait => OpcodeClass::Unary,

      | Sel | And | Or | Xor | Shr | Shl | Smov | Asr | Cmp | Cmpn | Add | Mul | Avg | Mac
      | Mach | Addc | Subb | Sad2 | Sada2 | Dp4 | Dph | Dp3 | Dp2 | Line | Pln
      | Bfi1 => OpcodeClass::Binary,
    }
  }

  pub fn is_ternary(&self) -> bool {
    self.class() == OpcodeClass::Ternary
  }

  /// `nop`, `send`, `sendc` and the three-source opcodes have no compacted form.
  pub fn is_never_compacted(&self) -> bool {
    match self {
      Opcode::Nop | Opcode::Send | Opcode::Sendc => true,
      opcode                                     => opcode.is_ternary()
    }
  }

  pub fn is_compare(&self) -> bool {
    match self {
      Opcode::Cmp | Opcode::Cmpn => true,
      _                          => false
    }
  }
}
