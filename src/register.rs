//! A register reference names either a general register, one of the architectural registers, or
//! a general register addressed indirectly through the address register `a0`.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use num_enum::{IntoPrimitive, TryFromPrimitive};
use strum_macros::{Display as StrumDisplay, EnumIter, EnumString, IntoStaticStr};

/// General register 0 holds the per-thread dispatch header.
pub const DISPATCH_HEADER_REGISTER: u8 = 0;
/// The last general register is reserved for marshalling the end-of-thread payload.
pub const EOT_PAYLOAD_REGISTER: u8 = 127;
/// One past the highest general register an assembled program may name.
pub const GENERAL_REGISTER_LIMIT: u8 = 127;
/// Every general register is 32 bytes wide.
pub const REGISTER_BYTES: usize = 32;

/**
  The architectural register file. The discriminant of each variant is the register-number byte
  the hardware expects when the register file field selects the architecture file, so a register
  converts to and from its encoding with a plain cast.
*/
#[derive(
  StrumDisplay, IntoStaticStr, EnumString, EnumIter, TryFromPrimitive, IntoPrimitive,
  Clone,        Copy,          Eq,         PartialEq, Debug,            Hash
)]
#[repr(u8)]
pub enum ArchRegister {
  #[strum(serialize = "null")] Null             = 0x00,
  #[strum(serialize = "a0")]   Address          = 0x10,
  #[strum(serialize = "acc0")] Accumulator0     = 0x20,
  #[strum(serialize = "acc1")] Accumulator1     = 0x21,
  #[strum(serialize = "f0")]   Flag0            = 0x30,
  #[strum(serialize = "f1")]   Flag1            = 0x31,
  #[strum(serialize = "ce")]   ChannelEnable    = 0x40,
  #[strum(serialize = "sp")]   StackPointer     = 0x60,
  #[strum(serialize = "sr0")]  State            = 0x70,
  #[strum(serialize = "cr0")]  Control          = 0x80,
  #[strum(serialize = "n0")]   Notification0    = 0x90,
  #[strum(serialize = "n1")]   Notification1    = 0x91,
  #[strum(serialize = "ip")]   InstructionPointer = 0xA0,
  #[strum(serialize = "tdr")]  ThreadDependency = 0xB0,
  #[strum(serialize = "tm0")]  Timestamp        = 0xC0,
  #[strum(serialize = "fc0")]  FlowControl0     = 0xD0,
  #[strum(serialize = "fc1")]  FlowControl1     = 0xD1,
  #[strum(serialize = "fc2")]  FlowControl2     = 0xD2,
  #[strum(serialize = "fc3")]  FlowControl3     = 0xD3,
  #[strum(serialize = "fc4")]  FlowControl4     = 0xD4,
  #[strum(serialize = "fc5")]  FlowControl5     = 0xD5,
  #[strum(serialize = "fc6")]  FlowControl6     = 0xD6,
  #[strum(serialize = "fc7")]  FlowControl7     = 0xD7,
  #[strum(serialize = "fc8")]  FlowControl8     = 0xD8,
  #[strum(serialize = "fc9")]  FlowControl9     = 0xD9,
  #[strum(serialize = "fc10")] FlowControl10    = 0xDA,
  #[strum(serialize = "fc11")] FlowControl11    = 0xDB,
  #[strum(serialize = "fc12")] FlowControl12    = 0xDC,
  #[strum(serialize = "fc13")] FlowControl13    = 0xDD,
  #[strum(serialize = "fc14")] FlowControl14    = 0xDE,
  #[strum(serialize = "fc15")] FlowControl15    = 0xDF,
}

impl ArchRegister {
  pub fn code(&self) -> u8 {
    Into::<u8>::into(*self)
  }

  /// Looks up an architectural register by its assembly name, e.g. `acc0` or `fc12`.
  pub fn from_name(name: &str) -> Option<ArchRegister> {
    ArchRegister::from_str(name).ok()
  }
}

/// Selects the register file of a direct reference.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum RegisterFile {
  /// A general register, `r0` through `r127`.
  General(u8),
  Arch(ArchRegister),
}

impl RegisterFile {
  pub fn is_general(&self) -> bool {
    match self {
      RegisterFile::General(_) => true,
      RegisterFile::Arch(_)    => false
    }
  }

  /// The register-number byte written into an instruction.
  pub fn number(&self) -> u8 {
    match self {
      RegisterFile::General(n) => *n,
      RegisterFile::Arch(arch) => arch.code()
    }
  }
}

impl Display for RegisterFile {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      RegisterFile::General(n) => write!(f, "r{}", n),
      RegisterFile::Arch(arch) => write!(f, "{}", arch)
    }
  }
}

/// Identifies the storage an operand reads or writes.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum RegisterReference {
  /// `subreg` is a byte offset into the register.
  Direct {
    file   : RegisterFile,
    subreg : u8
  },
  /// A general register located at `a0.address_subreg + offset` bytes.
  Indirect {
    offset         : i16,
    address_subreg : u8
  },
}

impl RegisterReference {
  pub fn general(number: u8) -> RegisterReference {
    RegisterReference::Direct { file: RegisterFile::General(number), subreg: 0 }
  }

  pub fn general_at(number: u8, subreg: u8) -> RegisterReference {
    RegisterReference::Direct { file: RegisterFile::General(number), subreg }
  }

  pub fn arch(register: ArchRegister) -> RegisterReference {
    RegisterReference::Direct { file: RegisterFile::Arch(register), subreg: 0 }
  }

  pub fn null() -> RegisterReference {
    RegisterReference::arch(ArchRegister::Null)
  }

  /// Indirect references always address the general file.
  pub fn is_general(&self) -> bool {
    match self {
      RegisterReference::Direct { file, .. } => file.is_general(),
      RegisterReference::Indirect { .. }     => true
    }
  }

  pub fn is_indirect(&self) -> bool {
    match self {
      RegisterReference::Indirect { .. } => true,
      _                                  => false
    }
  }

  pub fn is_null(&self) -> bool {
    match self {
      RegisterReference::Direct { file: RegisterFile::Arch(ArchRegister::Null), .. } => true,
      _ => false
    }
  }

  pub fn subreg(&self) -> u8 {
    match self {
      RegisterReference::Direct { subreg, .. } => *subreg,
      RegisterReference::Indirect { .. }       => 0
    }
  }
}

/// Renders the register without its type suffix; `isa::operand` appends types and regions.
impl Display for RegisterReference {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      RegisterReference::Direct { file, .. } => write!(f, "{}", file),
      RegisterReference::Indirect { offset, address_subreg } => {
        match *offset {
          0                  => write!(f, "[a0.{}]", address_subreg),
          value if value < 0 => write!(f, "[a0.{}{}]", address_subreg, value),
          value              => write!(f, "[a0.{}+{}]", address_subreg, value)
        }
      }
    }
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use strum::IntoEnumIterator;

  #[test]
  fn arch_names_round_trip(){
    for register in ArchRegister::iter() {
      let name = register.to_string();
      assert_eq!(ArchRegister::from_name(&name), Some(register));
    }
    assert_eq!(ArchRegister::from_name("fc12"), Some(ArchRegister::FlowControl12));
    assert_eq!(ArchRegister::from_name("r3"), None);
  }

  #[test]
  fn arch_codes(){
    assert_eq!(ArchRegister::InstructionPointer.code(), 0xA0);
    assert_eq!(ArchRegister::try_from_primitive(0x31).ok(), Some(ArchRegister::Flag1));
    assert!(ArchRegister::try_from_primitive(0x50).is_err());
  }

  #[test]
  fn display_indirect(){
    let r = RegisterReference::Indirect { offset: -16, address_subreg: 2 };
    assert_eq!(r.to_string(), "[a0.2-16]");
    let r = RegisterReference::Indirect { offset: 32, address_subreg: 0 };
    assert_eq!(r.to_string(), "[a0.0+32]");
    assert_eq!(RegisterReference::general(12).to_string(), "r12");
    assert!(RegisterReference::null().is_null());
  }
}
