use super::opcode::{Opcode, OpcodeClass};
use super::operand::{
  ConditionalModifier,
  DestOperand,
  ExecSize,
  FlagReference,
  MathFunction,
  Predicate,
  SharedFunction,
  SourceOperand,
};
use crate::register::RegisterReference;

/// Fields every instruction variant carries.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct InstructionHeader {
  pub exec_size           : ExecSize,
  pub predicate           : Predicate,
  pub flag                : FlagReference,
  pub no_dependency_check : bool,
}

impl InstructionHeader {
  pub fn new(exec_size: ExecSize) -> InstructionHeader {
    InstructionHeader {
      exec_size,
      predicate           : Predicate::NONE,
      flag                : FlagReference::default(),
      no_dependency_check : false
    }
  }

  pub fn with_predicate(self, predicate: Predicate, flag: FlagReference) -> InstructionHeader {
    InstructionHeader { predicate, flag, ..self }
  }

  pub fn with_flag(self, flag: FlagReference) -> InstructionHeader {
    InstructionHeader { flag, ..self }
  }
}

/// Where a `send` finds its 29-bit message descriptor.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum MessageDescriptor {
  Immediate(u32),
  /// The descriptor is read from `a0.0` at run time.
  AddressRegister,
}

/**
  A single instruction. Every variant's opcode is consistent with the variant; the constructors
  below check this, and the decoder only ever builds instructions through them.
*/
#[derive(Clone, PartialEq, Debug)]
pub enum Instruction {
  Unary {
    opcode : Opcode,
    header : InstructionHeader,
    dest   : DestOperand,
    src0   : SourceOperand,
    cond   : Option<ConditionalModifier>
  },
  Binary {
    opcode : Opcode,
    header : InstructionHeader,
    dest   : DestOperand,
    src0   : SourceOperand,
    src1   : SourceOperand,
    cond   : Option<ConditionalModifier>
  },
  /// Always align16; sources are direct general registers.
  Ternary {
    opcode : Opcode,
    header : InstructionHeader,
    dest   : DestOperand,
    src0   : SourceOperand,
    src1   : SourceOperand,
    src2   : SourceOperand
  },
  Math {
    function : MathFunction,
    header   : InstructionHeader,
    dest     : DestOperand,
    src0     : SourceOperand,
    src1     : Option<SourceOperand>
  },
  Send {
    opcode        : Opcode,
    header        : InstructionHeader,
    function      : SharedFunction,
    descriptor    : MessageDescriptor,
    dest          : DestOperand,
    src0          : SourceOperand,
    end_of_thread : bool
  },
  Branch {
    opcode : Opcode,
    header : InstructionHeader,
    jip    : i16,
    uip    : i16
  },
  Null(Opcode),
}

impl Instruction {

  // region Constructors

  pub fn unary(
    opcode : Opcode,
    header : InstructionHeader,
    dest   : DestOperand,
    src0   : SourceOperand
  ) -> Option<Instruction> {
    match opcode.class() {
      OpcodeClass::Unary => Some(Instruction::Unary { opcode, header, dest, src0, cond: None }),
      _                  => None
    }
  }

  pub fn binary(
    opcode : Opcode,
    header : InstructionHeader,
    dest   : DestOperand,
    src0   : SourceOperand,
    src1   : SourceOperand
  ) -> Option<Instruction> {
    match opcode.class() {
      OpcodeClass::Binary => {
        Some(Instruction::Binary { opcode, header, dest, src0, src1, cond: None })
      }
      _ => None
    }
  }

  pub fn ternary(
    opcode : Opcode,
    header : InstructionHeader,
    dest   : DestOperand,
    sources: [SourceOperand; 3]
  ) -> Option<Instruction> {
    let [src0, src1, src2] = sources;
    match opcode.class() {
      OpcodeClass::Ternary => Some(Instruction::Ternary { opcode, header, dest, src0, src1, src2 }),
      _                    => None
    }
  }

  pub fn send(
    opcode     : Opcode,
    header     : InstructionHeader,
    function   : SharedFunction,
    descriptor : MessageDescriptor,
    dest       : DestOperand,
    src0       : SourceOperand
  ) -> Option<Instruction> {
    match opcode.class() {
      OpcodeClass::Send => Some(Instruction::Send {
        opcode, header, function, descriptor, dest, src0, end_of_thread: false
      }),
      _ => None
    }
  }

  pub fn branch(opcode: Opcode, header: InstructionHeader, jip: i16, uip: i16) -> Option<Instruction> {
    match opcode.class() {
      OpcodeClass::Branch => Some(Instruction::Branch { opcode, header, jip, uip }),
      _                   => None
    }
  }

  pub fn null(opcode: Opcode) -> Option<Instruction> {
    match opcode.class() {
      OpcodeClass::Null => Some(Instruction::Null(opcode)),
      _                 => None
    }
  }

  /// Attaches a conditional modifier to a unary or binary instruction; other variants are
  /// returned unchanged, since their modifier field holds something else.
  pub fn with_cond(self, modifier: ConditionalModifier) -> Instruction {
    match self {
      Instruction::Unary { opcode, header, dest, src0, .. } => {
        Instruction::Unary { opcode, header, dest, src0, cond: Some(modifier) }
      }
      Instruction::Binary { opcode, header, dest, src0, src1, .. } => {
        Instruction::Binary { opcode, header, dest, src0, src1, cond: Some(modifier) }
      }
      other => other
    }
  }

  pub fn with_end_of_thread(self) -> Instruction {
    match self {
      Instruction::Send { opcode, header, function, descriptor, dest, src0, .. } => {
        Instruction::Send { opcode, header, function, descriptor, dest, src0, end_of_thread: true }
      }
      other => other
    }
  }

  // endregion

  pub fn opcode(&self) -> Opcode {
    match self {
      | Instruction::Unary   { opcode, .. }
      | Instruction::Binary  { opcode, .. }
      | Instruction::Ternary { opcode, .. }
      | Instruction::Send    { opcode, .. }
      | Instruction::Branch  { opcode, .. } => *opcode,
      Instruction::Math { .. }              => Opcode::Math,
      Instruction::Null(opcode)             => *opcode
    }
  }

  /// `Null` instructions have no header; they report a default one.
  pub fn header(&self) -> InstructionHeader {
    match self {
      | Instruction::Unary   { header, .. }
      | Instruction::Binary  { header, .. }
      | Instruction::Ternary { header, .. }
      | Instruction::Math    { header, .. }
      | Instruction::Send    { header, .. }
      | Instruction::Branch  { header, .. } => *header,
      Instruction::Null(_) => InstructionHeader::new(ExecSize::Simd1)
    }
  }

  pub fn header_mut(&mut self) -> Option<&mut InstructionHeader> {
    match self {
      | Instruction::Unary   { header, .. }
      | Instruction::Binary  { header, .. }
      | Instruction::Ternary { header, .. }
      | Instruction::Math    { header, .. }
      | Instruction::Send    { header, .. }
      | Instruction::Branch  { header, .. } => Some(header),
      Instruction::Null(_) => None
    }
  }

  pub fn dest(&self) -> Option<&DestOperand> {
    match self {
      | Instruction::Unary   { dest, .. }
      | Instruction::Binary  { dest, .. }
      | Instruction::Ternary { dest, .. }
      | Instruction::Math    { dest, .. }
      | Instruction::Send    { dest, .. } => Some(dest),
      _ => None
    }
  }

  /// Register and immediate sources in operand order.
  pub fn sources(&self) -> Vec<&SourceOperand> {
    match self {
      Instruction::Unary   { src0, .. }             => vec![src0],
      Instruction::Binary  { src0, src1, .. }       => vec![src0, src1],
      Instruction::Ternary { src0, src1, src2, .. } => vec![src0, src1, src2],
      Instruction::Math    { src0, src1, .. }       => {
        let mut sources = vec![src0];
        sources.extend(src1.iter());
        sources
      }
      Instruction::Send { src0, .. } => vec![src0],
      _                              => vec![]
    }
  }

  /**
    Whether the instruction uses align16 addressing. Ternary instructions always do; otherwise a
    swizzled source, a partial destination write mask, or a channel-selecting predicate selects
    it.
  */
  pub fn is_align16(&self) -> bool {
    if let Instruction::Ternary { .. } = self {
      return true;
    }
    if let Instruction::Null(_) = self {
      return false;
    }
    let swizzled = self.sources().iter().any(|source| source.is_swizzled());
    let masked   = self.dest().map_or(false, |dest| !dest.write_mask.is_all());
    swizzled || masked || self.header().predicate.mode.requires_align16()
  }

  /// Every register the instruction names, destination first.
  pub fn registers(&self) -> Vec<RegisterReference> {
    let mut registers: Vec<RegisterReference> = self.dest().map(|d| d.reg).into_iter().collect();
    for source in self.sources() {
      if let SourceOperand::Register { reg, .. } = source {
        registers.push(*reg);
      }
    }
    registers
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use crate::isa::operand::{DataType, Immediate, PredicateMode, RegisterRegion, Swizzle, WriteMask};

  fn grf(n: u8) -> SourceOperand {
    SourceOperand::register(DataType::F, RegisterReference::general(n), RegisterRegion::new(8, 8, 1))
  }

  #[test]
  fn constructors_check_class(){
    let header = InstructionHeader::new(ExecSize::Simd8);
    let dest   = DestOperand::new(DataType::F, RegisterReference::general(2));
    assert!(Instruction::unary(Opcode::Mov, header, dest, grf(3)).is_some());
    assert!(Instruction::unary(Opcode::Add, header, dest, grf(3)).is_none());
    assert!(Instruction::binary(Opcode::Add, header, dest, grf(3), grf(4)).is_some());
    assert!(Instruction::send(Opcode::Add, header, SharedFunction::DataCache,
      MessageDescriptor::Immediate(0), dest, grf(3)).is_none());
    assert!(Instruction::null(Opcode::Nop).is_some());
    assert!(Instruction::null(Opcode::Mov).is_none());
    assert!(Instruction::branch(Opcode::While, header, -2, 0).is_some());
  }

  #[test]
  fn align16_detection(){
    let header = InstructionHeader::new(ExecSize::Simd8);
    let dest   = DestOperand::new(DataType::F, RegisterReference::general(2));
    let plain  = Instruction::unary(Opcode::Mov, header, dest, grf(3)).unwrap();
    assert!(!plain.is_align16());

    let swizzled = SourceOperand::swizzled(DataType::F, RegisterReference::general(3), Swizzle::IDENTITY);
    let swizzle_mov = Instruction::unary(Opcode::Mov, header, dest, swizzled).unwrap();
    assert!(swizzle_mov.is_align16());

    let masked = Instruction::unary(
      Opcode::Mov, header, dest.with_write_mask(WriteMask(0x3)), grf(3)
    ).unwrap();
    assert!(masked.is_align16());

    let predicated = Instruction::unary(
      Opcode::Mov,
      header.with_predicate(Predicate::new(PredicateMode::X, false), FlagReference::new(0, 0)),
      dest,
      SourceOperand::Immediate(Immediate::F(1.0))
    ).unwrap();
    assert!(predicated.is_align16());
  }

  #[test]
  fn accessors(){
    let header = InstructionHeader::new(ExecSize::Simd16);
    let dest   = DestOperand::new(DataType::F, RegisterReference::general(2));
    let math = Instruction::Math {
      function : MathFunction::Pow,
      header,
      dest,
      src0     : grf(3),
      src1     : Some(grf(4))
    };
    assert_eq!(math.opcode(), Opcode::Math);
    assert_eq!(math.sources().len(), 2);
    assert_eq!(math.registers().len(), 3);
    assert_eq!(Instruction::Null(Opcode::Nop).header().exec_size, ExecSize::Simd1);

    let cmp = Instruction::binary(Opcode::Cmp, header, dest, grf(3), grf(4))
      .unwrap()
      .with_cond(ConditionalModifier::Less);
    match cmp {
      Instruction::Binary { cond, .. } => assert_eq!(cond, Some(ConditionalModifier::Less)),
      _                                => panic!("expected a binary instruction")
    }
  }
}
