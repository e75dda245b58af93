/*!
  Operands and the small enumerations that qualify an instruction: data types, immediates, regions,
  swizzles, source modifiers, predicates, flag references, conditional modifiers, math functions
  and shared-function recipients.

  Each enumeration whose values appear verbatim in an instruction derives `TryFromPrimitive` and
  `IntoPrimitive` with the hardware code as its discriminant, and `strum` derives for its assembly
  spelling.
*/

use std::fmt::{Display, Formatter};

use num_enum::{IntoPrimitive, TryFromPrimitive};
use strum_macros::{Display as StrumDisplay, EnumIter, EnumString, IntoStaticStr};

use crate::register::RegisterReference;

// region Data types

/// Register data types. The `strum` spelling is the assembly type suffix (`r3.f`, `r4.us`).
#[derive(
  StrumDisplay, IntoStaticStr, EnumString, EnumIter, TryFromPrimitive, IntoPrimitive,
  Clone,        Copy,          Eq,         PartialEq, Debug,            Hash
)]
#[repr(u8)]
pub enum DataType {
  #[strum(serialize = "u")]  UD = 0,
  #[strum(serialize = "s")]  D  = 1,
  #[strum(serialize = "us")] UW = 2,
  #[strum(serialize = "ss")] W  = 3,
  #[strum(serialize = "ub")] UB = 4,
  #[strum(serialize = "sb")] B  = 5,
  #[strum(serialize = "fd")] DF = 6,
  #[strum(serialize = "f")]  F  = 7,
}

impl DataType {
  pub fn code(&self) -> u8 {
    Into::<u8>::into(*self)
  }

  /// Size of one element in bytes.
  pub fn size(&self) -> usize {
    match self {
      DataType::UB | DataType::B => 1,
      DataType::UW | DataType::W => 2,
      DataType::UD | DataType::D | DataType::F => 4,
      DataType::DF => 8
    }
  }

  pub fn is_float(&self) -> bool {
    match self {
      DataType::F | DataType::DF => true,
      _                          => false
    }
  }

  /// The three-source layout has room for only four types, with its own numbering.
  pub fn ternary_code(&self) -> Option<u8> {
    match self {
      DataType::F  => Some(0),
      DataType::D  => Some(1),
      DataType::UD => Some(2),
      DataType::DF => Some(3),
      _            => None
    }
  }

  pub fn from_ternary_code(code: u8) -> Option<DataType> {
    match code {
      0 => Some(DataType::F),
      1 => Some(DataType::D),
      2 => Some(DataType::UD),
      3 => Some(DataType::DF),
      _ => None
    }
  }
}

// endregion

// region Immediates

/// Hardware type codes used when a source's register file is "immediate."
#[derive(TryFromPrimitive, IntoPrimitive, Clone, Copy, Eq, PartialEq, Debug, Hash)]
#[repr(u8)]
pub enum ImmediateType {
  UD = 0,
  D  = 1,
  UW = 2,
  W  = 3,
  UV = 4,
  VF = 5,
  V  = 6,
  F  = 7,
}

/**
  A typed literal. Packed vectors hold eight 4-bit lanes (`V`, `UV`) or four 8-bit restricted
  floats (`VF`); lane 0 occupies the least significant bits of the immediate slot.
*/
#[derive(Copy, Clone, PartialEq, Debug)]
pub enum Immediate {
  UD(u32),
  D(i32),
  UW(u16),
  W(i16),
  F(f32),
  /// Eight signed nibbles, each in [-8, 7].
  V([i8; 8]),
  /// Eight unsigned nibbles, each in [0, 15].
  UV([u8; 8]),
  /// Four restricted floats in their raw 8-bit encoding, see [`vf_to_f32`].
  VF([u8; 4]),
}

impl Immediate {
  pub fn immediate_type(&self) -> ImmediateType {
    match self {
      Immediate::UD(_) => ImmediateType::UD,
      Immediate::D(_)  => ImmediateType::D,
      Immediate::UW(_) => ImmediateType::UW,
      Immediate::W(_)  => ImmediateType::W,
      Immediate::F(_)  => ImmediateType::F,
      Immediate::V(_)  => ImmediateType::V,
      Immediate::UV(_) => ImmediateType::UV,
      Immediate::VF(_) => ImmediateType::VF,
    }
  }

  /// The register type an instruction sees when it reads this immediate.
  pub fn data_type(&self) -> DataType {
    match self {
      Immediate::UD(_)                  => DataType::UD,
      Immediate::D(_)                   => DataType::D,
      Immediate::UW(_) | Immediate::UV(_) => DataType::UW,
      Immediate::W(_)  | Immediate::V(_)  => DataType::W,
      Immediate::F(_)  | Immediate::VF(_) => DataType::F,
    }
  }

  /// The 32 bits stored in the immediate slot. Sixteen-bit values are replicated in both halves.
  pub fn bits(&self) -> u32 {
    match self {
      Immediate::UD(value) => *value,
      Immediate::D(value)  => *value as u32,
      Immediate::UW(value) => (*value as u32) | ((*value as u32) << 16),
      Immediate::W(value)  => (*value as u16 as u32) | ((*value as u16 as u32) << 16),
      Immediate::F(value)  => value.to_bits(),
      Immediate::V(lanes)  => {
        lanes.iter().enumerate().fold(0u32, |acc, (i, lane)| {
          acc | (((*lane as u8 & 0xF) as u32) << (4 * i))
        })
      }
      Immediate::UV(lanes) => {
        lanes.iter().enumerate().fold(0u32, |acc, (i, lane)| acc | (((lane & 0xF) as u32) << (4 * i)))
      }
      Immediate::VF(lanes) => u32::from_le_bytes(*lanes),
    }
  }

  /// Inverse of `bits` for the given type.
  pub fn from_bits(immediate_type: ImmediateType, bits: u32) -> Immediate {
    match immediate_type {
      ImmediateType::UD => Immediate::UD(bits),
      ImmediateType::D  => Immediate::D(bits as i32),
      ImmediateType::UW => Immediate::UW(bits as u16),
      ImmediateType::W  => Immediate::W(bits as u16 as i16),
      ImmediateType::F  => Immediate::F(f32::from_bits(bits)),
      ImmediateType::V  => {
        let mut lanes = [0i8; 8];
        for (i, lane) in lanes.iter_mut().enumerate() {
          // Shift the nibble into the top of a byte and back to sign-extend it.
          *lane = ((((bits >> (4 * i)) & 0xF) as u8) << 4) as i8 >> 4;
        }
        Immediate::V(lanes)
      }
      ImmediateType::UV => {
        let mut lanes = [0u8; 8];
        for (i, lane) in lanes.iter_mut().enumerate() {
          *lane = ((bits >> (4 * i)) & 0xF) as u8;
        }
        Immediate::UV(lanes)
      }
      ImmediateType::VF => Immediate::VF(bits.to_le_bytes()),
    }
  }
}

/// Decodes a restricted 8-bit float: sign bit 7, exponent bits 4-6 biased by 3, mantissa bits 0-3.
pub fn vf_to_f32(byte: u8) -> f32 {
  let sign     = if byte & 0x80 != 0 { -1.0 } else { 1.0 };
  let exponent = ((byte >> 4) & 0x7) as i32;
  let mantissa = (byte & 0xF) as f32 / 16.0;
  let magnitude = match exponent {
    0 => mantissa * 2f32.powi(-2),
    e => (1.0 + mantissa) * 2f32.powi(e - 3)
  };
  sign * magnitude
}

/// Finds the restricted float that represents `value` exactly, if there is one.
pub fn vf_from_f32(value: f32) -> Option<u8> {
  if value == 0.0 {
    return Some(if value.is_sign_negative() { 0x80 } else { 0 });
  }
  (0u8..=0xFF).find(|byte| vf_to_f32(*byte) == value)
}

// endregion

// region Regions and swizzles

/**
  A 2-D access pattern measured in elements: `vstride` elements between rows, `width` elements per
  row, `hstride` elements between the elements of a row. Written `<v,w,h>`.
*/
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct RegisterRegion {
  pub vstride : u8,
  pub width   : u8,
  pub hstride : u8,
}

impl RegisterRegion {
  /// `<0,1,0>`: one element broadcast to every lane.
  pub const SCALAR: RegisterRegion = RegisterRegion { vstride: 0, width: 1, hstride: 0 };

  pub fn new(vstride: u8, width: u8, hstride: u8) -> RegisterRegion {
    RegisterRegion { vstride, width, hstride }
  }

  /// The region a source gets when the assembly names none: contiguous rows of up to eight.
  pub fn default_for(exec_size: ExecSize) -> RegisterRegion {
    match exec_size.width() {
      1     => RegisterRegion::SCALAR,
      width => {
        let row = width.min(8);
        RegisterRegion { vstride: row, width: row, hstride: 1 }
      }
    }
  }

  pub fn is_scalar(&self) -> bool {
    *self == RegisterRegion::SCALAR
  }

  pub fn vstride_code(&self) -> Option<u8> {
    match self.vstride {
      0  => Some(0),
      1  => Some(1),
      2  => Some(2),
      4  => Some(3),
      8  => Some(4),
      16 => Some(5),
      32 => Some(6),
      _  => None
    }
  }

  pub fn width_code(&self) -> Option<u8> {
    match self.width {
      1  => Some(0),
      2  => Some(1),
      4  => Some(2),
      8  => Some(3),
      16 => Some(4),
      _  => None
    }
  }

  pub fn hstride_code(&self) -> Option<u8> {
    hstride_code(self.hstride)
  }

  pub fn from_codes(vstride: u8, width: u8, hstride: u8) -> Option<RegisterRegion> {
    let vstride = match vstride {
      0 => 0,
      code @ 1..=6 => 1u8 << (code - 1),
      _ => return None
    };
    let width = match width {
      code @ 0..=4 => 1u8 << code,
      _ => return None
    };
    Some(RegisterRegion { vstride, width, hstride: hstride_from_code(hstride) })
  }
}

impl Display for RegisterRegion {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "<{},{},{}>", self.vstride, self.width, self.hstride)
  }
}

pub fn hstride_code(hstride: u8) -> Option<u8> {
  match hstride {
    0 => Some(0),
    1 => Some(1),
    2 => Some(2),
    4 => Some(3),
    _ => None
  }
}

/// Every two-bit code names a stride, so this cannot fail.
pub fn hstride_from_code(code: u8) -> u8 {
  match code & 0x3 {
    0 => 0,
    1 => 1,
    2 => 2,
    _ => 4
  }
}

#[derive(StrumDisplay, EnumString, Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[strum(serialize_all = "lowercase")]
pub enum Channel {
  X,
  Y,
  Z,
  W,
}

impl Channel {
  fn from_code(code: u8) -> Channel {
    match code & 0x3 {
      0 => Channel::X,
      1 => Channel::Y,
      2 => Channel::Z,
      _ => Channel::W
    }
  }

  fn code(&self) -> u8 {
    match self {
      Channel::X => 0,
      Channel::Y => 1,
      Channel::Z => 2,
      Channel::W => 3
    }
  }

  fn from_letter(letter: char) -> Option<Channel> {
    match letter {
      'x' => Some(Channel::X),
      'y' => Some(Channel::Y),
      'z' => Some(Channel::Z),
      'w' => Some(Channel::W),
      _   => None
    }
  }
}

/// A four-channel permutation used by align16 operands.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct Swizzle(pub [Channel; 4]);

impl Swizzle {
  pub const IDENTITY: Swizzle = Swizzle([Channel::X, Channel::Y, Channel::Z, Channel::W]);

  /// Parses one to four channel letters; a short swizzle repeats its last letter (`xy` = `xyyy`).
  pub fn parse(text: &str) -> Option<Swizzle> {
    if text.is_empty() || text.len() > 4 {
      return None;
    }
    let mut channels = [Channel::X; 4];
    let mut last = Channel::X;
    let mut letters = text.chars();
    for channel in channels.iter_mut() {
      if let Some(letter) = letters.next() {
        last = Channel::from_letter(letter)?;
      }
      *channel = last;
    }
    Some(Swizzle(channels))
  }

  /// Eight bits, channel x in the low two.
  pub fn code(&self) -> u8 {
    self.0.iter().enumerate().fold(0u8, |acc, (i, c)| acc | (c.code() << (2 * i)))
  }

  pub fn from_code(code: u8) -> Swizzle {
    Swizzle([
      Channel::from_code(code),
      Channel::from_code(code >> 2),
      Channel::from_code(code >> 4),
      Channel::from_code(code >> 6),
    ])
  }

  pub fn channel(&self, index: usize) -> Channel {
    self.0[index]
  }
}

impl Display for Swizzle {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    for channel in self.0.iter() {
      write!(f, "{}", channel)?;
    }
    Ok(())
  }
}

/// The align16 destination channel mask, bit 0 enabling x.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct WriteMask(pub u8);

impl WriteMask {
  pub const ALL: WriteMask = WriteMask(0xF);

  pub fn parse(text: &str) -> Option<WriteMask> {
    if text.is_empty() {
      return None;
    }
    let mut mask = 0u8;
    for letter in text.chars() {
      let bit = 1u8 << Channel::from_letter(letter)?.code();
      if mask & bit != 0 {
        return None;
      }
      mask |= bit;
    }
    Some(WriteMask(mask))
  }

  pub fn is_all(&self) -> bool {
    self.0 & 0xF == 0xF
  }
}

impl Display for WriteMask {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    for (bit, letter) in ['x', 'y', 'z', 'w'].iter().enumerate() {
      if self.0 & (1 << bit) != 0 {
        write!(f, "{}", letter)?;
      }
    }
    Ok(())
  }
}

// endregion

// region Operands

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum SourceModifier {
  None,
  Abs,
  Negate,
  NegateAbs,
}

impl SourceModifier {
  pub fn from_bits(abs: bool, negate: bool) -> SourceModifier {
    match (abs, negate) {
      (false, false) => SourceModifier::None,
      (true,  false) => SourceModifier::Abs,
      (false, true)  => SourceModifier::Negate,
      (true,  true)  => SourceModifier::NegateAbs
    }
  }

  pub fn abs(&self) -> bool {
    match self {
      SourceModifier::Abs | SourceModifier::NegateAbs => true,
      _                                                => false
    }
  }

  pub fn negate(&self) -> bool {
    match self {
      SourceModifier::Negate | SourceModifier::NegateAbs => true,
      _                                                   => false
    }
  }

  /// The modifier of `-x` given the modifier of `x`.
  pub fn negated(&self) -> SourceModifier {
    SourceModifier::from_bits(self.abs(), !self.negate())
  }
}

/// How a register source maps onto lanes: a region in align1 mode, a swizzle in align16 mode.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum SourceAddressing {
  Region(RegisterRegion),
  Swizzle(Swizzle),
}

#[derive(Copy, Clone, PartialEq, Debug)]
pub enum SourceOperand {
  Immediate(Immediate),
  Register {
    data_type  : DataType,
    reg        : RegisterReference,
    addressing : SourceAddressing,
    modifier   : SourceModifier
  },
}

impl SourceOperand {
  /// A register source read with `region` and no modifier.
  pub fn register(data_type: DataType, reg: RegisterReference, region: RegisterRegion) -> SourceOperand {
    SourceOperand::Register {
      data_type,
      reg,
      addressing: SourceAddressing::Region(region),
      modifier: SourceModifier::None
    }
  }

  pub fn swizzled(data_type: DataType, reg: RegisterReference, swizzle: Swizzle) -> SourceOperand {
    SourceOperand::Register {
      data_type,
      reg,
      addressing: SourceAddressing::Swizzle(swizzle),
      modifier: SourceModifier::None
    }
  }

  pub fn data_type(&self) -> DataType {
    match self {
      SourceOperand::Immediate(immediate)      => immediate.data_type(),
      SourceOperand::Register { data_type, .. } => *data_type
    }
  }

  pub fn is_immediate(&self) -> bool {
    match self {
      SourceOperand::Immediate(_) => true,
      _                           => false
    }
  }

  pub fn is_swizzled(&self) -> bool {
    match self {
      SourceOperand::Register { addressing: SourceAddressing::Swizzle(_), .. } => true,
      _ => false
    }
  }

  pub fn with_modifier(self, new_modifier: SourceModifier) -> SourceOperand {
    match self {
      SourceOperand::Register { data_type, reg, addressing, .. } => {
        SourceOperand::Register { data_type, reg, addressing, modifier: new_modifier }
      }
      immediate => immediate
    }
  }
}

/**
  A destination. Only the horizontal stride of a destination region is encodable, so that is all
  the model carries. `write_mask` only has meaning in align16 mode.
*/
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct DestOperand {
  pub data_type  : DataType,
  pub reg        : RegisterReference,
  pub hstride    : u8,
  pub write_mask : WriteMask,
}

impl DestOperand {
  pub fn new(data_type: DataType, reg: RegisterReference) -> DestOperand {
    DestOperand { data_type, reg, hstride: 1, write_mask: WriteMask::ALL }
  }

  pub fn null(data_type: DataType) -> DestOperand {
    DestOperand::new(data_type, RegisterReference::null())
  }

  pub fn with_hstride(self, hstride: u8) -> DestOperand {
    DestOperand { hstride, ..self }
  }

  pub fn with_write_mask(self, write_mask: WriteMask) -> DestOperand {
    DestOperand { write_mask, ..self }
  }
}

// endregion

// region Predication and flags

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum PredicateMode {
  None,
  /// One flag bit per lane, in lane order.
  Sequential,
  X,
  Y,
  Z,
  W,
  Any2H,
  All2H,
  Any4H,
  All4H,
  Any8H,
  All8H,
  Any16H,
  All16H,
  Any32H,
  All32H,
}

const ALIGN1_PREDICATES: [PredicateMode; 14] = [
  PredicateMode::None,   PredicateMode::Sequential,
  PredicateMode::None,   PredicateMode::None,
  PredicateMode::Any2H,  PredicateMode::All2H,
  PredicateMode::Any4H,  PredicateMode::All4H,
  PredicateMode::Any8H,  PredicateMode::All8H,
  PredicateMode::Any16H, PredicateMode::All16H,
  PredicateMode::Any32H, PredicateMode::All32H,
];

const ALIGN16_PREDICATES: [PredicateMode; 8] = [
  PredicateMode::None, PredicateMode::Sequential,
  PredicateMode::X,    PredicateMode::Y,
  PredicateMode::Z,    PredicateMode::W,
  PredicateMode::Any4H, PredicateMode::All4H,
];

impl PredicateMode {
  /// The four-bit predicate-control code, or `None` if the mode is illegal in the access mode.
  pub fn code(&self, align16: bool) -> Option<u8> {
    if *self == PredicateMode::None {
      return Some(0);
    }
    let table: &[PredicateMode] = match align16 {
      true  => &ALIGN16_PREDICATES,
      false => &ALIGN1_PREDICATES
    };
    table.iter().position(|mode| mode == self).map(|position| position as u8)
  }

  pub fn from_code(code: u8, align16: bool) -> Option<PredicateMode> {
    let mode = match align16 {
      true  => ALIGN16_PREDICATES.get(code as usize).copied(),
      false => ALIGN1_PREDICATES.get(code as usize).copied()
    }?;
    match (mode, code) {
      // Codes 2 and 3 of the align1 table (`anyv`/`allv`) are not modeled.
      (PredicateMode::None, c) if c != 0 => None,
      (mode, _)                          => Some(mode)
    }
  }

  pub fn requires_align16(&self) -> bool {
    match self {
      PredicateMode::X | PredicateMode::Y | PredicateMode::Z | PredicateMode::W => true,
      _ => false
    }
  }

  /// The suffix the disassembler prints after the flag register, empty for the plain modes.
  pub fn suffix(&self) -> &'static str {
    match self {
      PredicateMode::None | PredicateMode::Sequential => "",
      PredicateMode::X      => ".x",
      PredicateMode::Y      => ".y",
      PredicateMode::Z      => ".z",
      PredicateMode::W      => ".w",
      PredicateMode::Any2H  => ".any2h",
      PredicateMode::All2H  => ".all2h",
      PredicateMode::Any4H  => ".any4h",
      PredicateMode::All4H  => ".all4h",
      PredicateMode::Any8H  => ".any8h",
      PredicateMode::All8H  => ".all8h",
      PredicateMode::Any16H => ".any16h",
      PredicateMode::All16H => ".all16h",
      PredicateMode::Any32H => ".any32h",
      PredicateMode::All32H => ".all32h",
    }
  }
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct Predicate {
  pub mode   : PredicateMode,
  pub invert : bool,
}

impl Predicate {
  pub const NONE: Predicate = Predicate { mode: PredicateMode::None, invert: false };

  pub fn new(mode: PredicateMode, invert: bool) -> Predicate {
    Predicate { mode, invert }
  }

  pub fn is_none(&self) -> bool {
    self.mode == PredicateMode::None
  }
}

impl Default for Predicate {
  fn default() -> Predicate {
    Predicate::NONE
  }
}

/// Names one of the four condition words: flag register `reg`, sub-flag `subreg`.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub struct FlagReference {
  pub reg    : u8,
  pub subreg : u8,
}

impl FlagReference {
  pub fn new(reg: u8, subreg: u8) -> FlagReference {
    FlagReference { reg, subreg }
  }
}

impl Display for FlagReference {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "f{}.{}", self.reg, self.subreg)
  }
}

// endregion

// region Function selectors

#[derive(
  StrumDisplay, IntoStaticStr, EnumString, EnumIter, TryFromPrimitive, IntoPrimitive,
  Clone,        Copy,          Eq,         PartialEq, Debug,            Hash
)]
#[repr(u8)]
pub enum ConditionalModifier {
  #[strum(serialize = "eq")] Equal        = 1,
  #[strum(serialize = "ne")] NotEqual     = 2,
  #[strum(serialize = "gt")] Greater      = 3,
  #[strum(serialize = "ge")] GreaterEqual = 4,
  #[strum(serialize = "lt")] Less         = 5,
  #[strum(serialize = "le")] LessEqual    = 6,
  #[strum(serialize = "o")]  Overflow     = 8,
  #[strum(serialize = "u")]  Unordered    = 9,
}

impl ConditionalModifier {
  pub fn code(&self) -> u8 {
    Into::<u8>::into(*self)
  }
}

#[derive(
  StrumDisplay, IntoStaticStr, EnumString, EnumIter, TryFromPrimitive, IntoPrimitive,
  Clone,        Copy,          Eq,         PartialEq, Debug,            Hash
)]
#[strum(serialize_all = "lowercase")]
#[repr(u8)]
pub enum MathFunction {
  Inv                        = 1,
  Log                        = 2,
  Exp                        = 3,
  Sqrt                       = 4,
  Rsq                        = 5,
  Sin                        = 6,
  Cos                        = 7,
  Fdiv                       = 9,
  Pow                        = 10,
  #[strum(serialize = "intdivmod")]
  IntDivQuotientAndRemainder = 11,
  #[strum(serialize = "intdiv")]
  IntDivQuotient             = 12,
  #[strum(serialize = "intmod")]
  IntDivRemainder            = 13,
}

impl MathFunction {
  pub fn code(&self) -> u8 {
    Into::<u8>::into(*self)
  }

  pub fn source_count(&self) -> usize {
    match self {
      | MathFunction::Fdiv
      | MathFunction::Pow
      | MathFunction::IntDivQuotientAndRemainder
      | MathFunction::IntDivQuotient
      | MathFunction::IntDivRemainder => 2,
      _ => 1
    }
  }
}

/// Shared-function identifiers, the recipients of `send` messages.
#[derive(
  StrumDisplay, IntoStaticStr, EnumString, EnumIter, TryFromPrimitive, IntoPrimitive,
  Clone,        Copy,          Eq,         PartialEq, Debug,            Hash
)]
#[repr(u8)]
pub enum SharedFunction {
  #[strum(serialize = "null")]     Null              = 0,
  #[strum(serialize = "sampler")]  Sampler           = 2,
  #[strum(serialize = "gateway")]  Gateway           = 3,
  #[strum(serialize = "dc2")]      SamplerCache      = 4,
  #[strum(serialize = "rc")]       RenderCache       = 5,
  #[strum(serialize = "urb")]      Urb               = 6,
  #[strum(serialize = "ts")]       ThreadSpawner     = 7,
  #[strum(serialize = "vme")]      Vme               = 8,
  #[strum(serialize = "ccache")]   ConstantCache     = 9,
  #[strum(serialize = "dc0")]      DataCache         = 10,
  #[strum(serialize = "pi")]       PixelInterpolator = 11,
  #[strum(serialize = "dc1")]      DataCache1        = 12,
  #[strum(serialize = "cre")]      CheckRefine       = 13,
}

impl SharedFunction {
  pub fn code(&self) -> u8 {
    Into::<u8>::into(*self)
  }
}

// endregion

// region Execution size

#[derive(TryFromPrimitive, IntoPrimitive, Clone, Copy, Eq, PartialEq, Debug, Hash)]
#[repr(u8)]
pub enum ExecSize {
  Simd1  = 0,
  Simd2  = 1,
  Simd4  = 2,
  Simd8  = 3,
  Simd16 = 4,
  Simd32 = 5,
}

impl ExecSize {
  pub fn code(&self) -> u8 {
    Into::<u8>::into(*self)
  }

  pub fn width(&self) -> u8 {
    1u8 << self.code()
  }

  pub fn from_width(width: u32) -> Option<ExecSize> {
    match width {
      1  => Some(ExecSize::Simd1),
      2  => Some(ExecSize::Simd2),
      4  => Some(ExecSize::Simd4),
      8  => Some(ExecSize::Simd8),
      16 => Some(ExecSize::Simd16),
      32 => Some(ExecSize::Simd32),
      _  => None
    }
  }
}

impl Display for ExecSize {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.width())
  }
}

// endregion


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn immediate_bits(){
    assert_eq!(Immediate::W(-2).bits(), 0xFFFE_FFFE);
    assert_eq!(Immediate::UW(0x1234).bits(), 0x1234_1234);
    assert_eq!(Immediate::D(-1).bits(), 0xFFFF_FFFF);
    assert_eq!(Immediate::F(1.0).bits(), 0x3F80_0000);
    let v = Immediate::V([0, 1, 2, 3, -1, -2, -8, 7]);
    assert_eq!(v.bits(), 0x78EF_3210);
    assert_eq!(Immediate::from_bits(ImmediateType::V, 0x78EF_3210), v);
    let uv = Immediate::UV([15, 0, 1, 2, 3, 4, 5, 6]);
    assert_eq!(Immediate::from_bits(ImmediateType::UV, uv.bits()), uv);
    assert_eq!(Immediate::from_bits(ImmediateType::W, 0xFFFE_FFFE), Immediate::W(-2));
  }

  #[test]
  fn restricted_floats(){
    assert_eq!(vf_to_f32(0x30), 1.0);
    assert_eq!(vf_to_f32(0xB0), -1.0);
    assert_eq!(vf_from_f32(1.0), Some(0x30));
    assert_eq!(vf_from_f32(0.5), Some(0x20));
    assert_eq!(vf_from_f32(31.0), Some(0x7F));
    assert_eq!(vf_from_f32(15.5), Some(0x6F));
    assert_eq!(vf_from_f32(0.0), Some(0x00));
    assert_eq!(vf_from_f32(100.0), None);
  }

  #[test]
  fn region_codes(){
    let region = RegisterRegion::new(8, 8, 1);
    assert_eq!(region.vstride_code(), Some(4));
    assert_eq!(region.width_code(), Some(3));
    assert_eq!(region.hstride_code(), Some(1));
    assert_eq!(RegisterRegion::from_codes(4, 3, 1), Some(region));
    assert_eq!(RegisterRegion::from_codes(7, 0, 0), None);
    assert_eq!(RegisterRegion::new(3, 8, 1).vstride_code(), None);
    assert_eq!(RegisterRegion::default_for(ExecSize::Simd1), RegisterRegion::SCALAR);
    assert_eq!(RegisterRegion::default_for(ExecSize::Simd16), RegisterRegion::new(8, 8, 1));
    assert_eq!(RegisterRegion::default_for(ExecSize::Simd4), RegisterRegion::new(4, 4, 1));
  }

  #[test]
  fn swizzles(){
    assert_eq!(Swizzle::IDENTITY.code(), 0xE4);
    assert_eq!(Swizzle::from_code(0xE4), Swizzle::IDENTITY);
    let xy = Swizzle::parse("xy").unwrap();
    assert_eq!(xy.to_string(), "xyyy");
    assert_eq!(Swizzle::parse("xyzwx"), None);
    assert_eq!(Swizzle::parse("xq"), None);
    assert_eq!(WriteMask::parse("xz"), Some(WriteMask(0b0101)));
    assert_eq!(WriteMask::parse("xx"), None);
    assert_eq!(WriteMask(0b0101).to_string(), "xz");
  }

  #[test]
  fn predicate_codes(){
    assert_eq!(PredicateMode::Sequential.code(false), Some(1));
    assert_eq!(PredicateMode::Any16H.code(false), Some(10));
    assert_eq!(PredicateMode::X.code(false), None);
    assert_eq!(PredicateMode::X.code(true), Some(2));
    assert_eq!(PredicateMode::Any4H.code(true), Some(6));
    assert_eq!(PredicateMode::Any8H.code(true), None);
    assert_eq!(PredicateMode::from_code(2, false), None);
    assert_eq!(PredicateMode::from_code(13, false), Some(PredicateMode::All32H));
    assert_eq!(PredicateMode::from_code(5, true), Some(PredicateMode::W));
  }

  #[test]
  fn modifiers(){
    assert_eq!(SourceModifier::None.negated(), SourceModifier::Negate);
    assert_eq!(SourceModifier::Negate.negated(), SourceModifier::None);
    assert_eq!(SourceModifier::Abs.negated(), SourceModifier::NegateAbs);
    assert_eq!(SourceModifier::from_bits(true, true), SourceModifier::NegateAbs);
  }

  #[test]
  fn math_sources(){
    assert_eq!(MathFunction::Sqrt.source_count(), 1);
    assert_eq!(MathFunction::Pow.source_count(), 2);
    assert_eq!(MathFunction::IntDivQuotient.to_string(), "intdiv");
  }
}
