/*!
  Mnemonic tables. Most mnemonics name an opcode directly; the rest are pseudo-operations that
  lower to a real instruction:

    cmpeq, cmpne, cmplt, cmple, cmpgt, cmpge    cmp with a conditional modifier; needs a flag
    sub a, b, c                                  add a, b, -c
    fma a, b, c                                  mad a, c, a, b   (a = a * b + c)
    min, max                                     sel with `le` or `ge`
    rcp, log, exp, sqrt, rsqrt, sin, cos         math with one source
    fdiv, pow, idiv, irem, idivrem               math with two sources

  The three-source opcodes other than `mad` are not accepted.
*/

use std::collections::HashMap;
use std::convert::TryFrom;

use lazy_static::lazy_static;

use crate::error::AssemblyErrorKind;
use crate::isa::{
  ConditionalModifier,
  DestOperand,
  Immediate,
  Instruction,
  InstructionHeader,
  MathFunction,
  Opcode,
  RegisterRegion,
  SourceOperand,
};
use super::operands::{finish_sources, ResolvedSource};

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Mnemonic {
  Unary(Opcode),
  Binary(Opcode),
  Ternary(Opcode),
  Math(MathFunction),
  Compare(ConditionalModifier),
  Select(ConditionalModifier),
  Subtract,
  FusedMultiplyAdd,
}

lazy_static! {
  static ref MNEMONICS: HashMap<&'static str, Mnemonic> = {
    use Opcode::*;
    let mut table = HashMap::new();

    let unary = [Mov, Movi, Not, Frc, Rndu, Rndd, Rnde, Rndz, Lzd, Fbh, Fbl, Cbit, Bfrev];
    for opcode in unary.iter() {
      let name: &'static str = (*opcode).into();
      table.insert(name, Mnemonic::Unary(*opcode));
    }
    let binary = [
      Add, Mul, And, Or, Xor, Shl, Shr, Asr, Avg, Mac, Mach, Addc, Subb, Sel, Dp2, Dp3, Dp4, Dph,
      Line, Pln, Sad2, Sada2, Bfi1,
    ];
    for opcode in binary.iter() {
      let name: &'static str = (*opcode).into();
      table.insert(name, Mnemonic::Binary(*opcode));
    }
    table.insert("mad", Mnemonic::Ternary(Mad));

    let math = [
      ("rcp",     MathFunction::Inv),
      ("log",     MathFunction::Log),
      ("exp",     MathFunction::Exp),
      ("sqrt",    MathFunction::Sqrt),
      ("rsqrt",   MathFunction::Rsq),
      ("sin",     MathFunction::Sin),
      ("cos",     MathFunction::Cos),
      ("fdiv",    MathFunction::Fdiv),
      ("pow",     MathFunction::Pow),
      ("idiv",    MathFunction::IntDivQuotient),
      ("irem",    MathFunction::IntDivRemainder),
      ("idivrem", MathFunction::IntDivQuotientAndRemainder),
    ];
    for (name, function) in math.iter() {
      table.insert(*name, Mnemonic::Math(*function));
    }

    let compares = [
      ("cmpeq", ConditionalModifier::Equal),
      ("cmpne", ConditionalModifier::NotEqual),
      ("cmplt", ConditionalModifier::Less),
      ("cmple", ConditionalModifier::LessEqual),
      ("cmpgt", ConditionalModifier::Greater),
      ("cmpge", ConditionalModifier::GreaterEqual),
    ];
    for (name, modifier) in compares.iter() {
      table.insert(*name, Mnemonic::Compare(*modifier));
    }

    table.insert("min", Mnemonic::Select(ConditionalModifier::LessEqual));
    table.insert("max", Mnemonic::Select(ConditionalModifier::GreaterEqual));
    table.insert("sub", Mnemonic::Subtract);
    table.insert("fma", Mnemonic::FusedMultiplyAdd);
    table
  };
}

pub fn lookup(name: &str) -> Option<Mnemonic> {
  MNEMONICS.get(name).copied()
}

fn sources_array<const N: usize>(sources: Vec<SourceOperand>, name: &str)
  -> Result<[SourceOperand; N], AssemblyErrorKind>
{
  <[SourceOperand; N]>::try_from(sources).map_err(|_| AssemblyErrorKind::OperandCount(name.to_string(), N + 1))
}

fn negate_immediate(immediate: Immediate) -> Option<Immediate> {
  match immediate {
    Immediate::UD(value) => Some(Immediate::UD(value.wrapping_neg())),
    Immediate::D(value)  => value.checked_neg().map(Immediate::D),
    Immediate::UW(value) => Some(Immediate::UW(value.wrapping_neg())),
    Immediate::W(value)  => value.checked_neg().map(Immediate::W),
    Immediate::F(value)  => Some(Immediate::F(-value)),
    Immediate::V(lanes)  => {
      let mut negated = [0i8; 8];
      for (slot, lane) in negated.iter_mut().zip(lanes.iter()) {
        *slot = -*lane;
        if *slot > 7 {
          return None;
        }
      }
      Some(Immediate::V(negated))
    }
    Immediate::UV(_)     => None,
    Immediate::VF(lanes) => {
      let mut negated = lanes;
      for lane in negated.iter_mut() {
        *lane ^= 0x80;
      }
      Some(Immediate::VF(negated))
    }
  }
}

/// `-x`: flips a register's negate modifier or negates an immediate's value.
fn negate(source: ResolvedSource) -> Result<ResolvedSource, AssemblyErrorKind> {
  match source.operand {
    SourceOperand::Immediate(immediate) => {
      let negated = negate_immediate(immediate).ok_or_else(|| {
        AssemblyErrorKind::ImmediateRange(format!("-({})", immediate), immediate.data_type().to_string())
      })?;
      Ok(ResolvedSource { operand: SourceOperand::Immediate(negated), ..source })
    }
    SourceOperand::Register { modifier, .. } => {
      Ok(ResolvedSource { operand: source.operand.with_modifier(modifier.negated()), ..source })
    }
  }
}

impl Mnemonic {
  /// Sources the mnemonic takes, not counting the destination.
  pub fn source_count(&self) -> usize {
    match self {
      Mnemonic::Unary(_)         => 1,
      Mnemonic::Ternary(_)       => 3,
      Mnemonic::Math(function)   => function.source_count(),
      | Mnemonic::Binary(_)
      | Mnemonic::Compare(_)
      | Mnemonic::Select(_)
      | Mnemonic::Subtract
      | Mnemonic::FusedMultiplyAdd => 2,
    }
  }

  /// Comparisons write a flag, so their `(flag)` names the flag written rather than a predicate.
  pub fn is_compare(&self) -> bool {
    matches!(self, Mnemonic::Compare(_))
  }

  /// Builds the instruction. `name` is the mnemonic as written, for error messages.
  pub fn lower(
    &self,
    name    : &str,
    header  : InstructionHeader,
    dest    : DestOperand,
    sources : Vec<ResolvedSource>
  ) -> Result<Instruction, AssemblyErrorKind> {
    if sources.len() != self.source_count() {
      return Err(AssemblyErrorKind::OperandCount(name.to_string(), self.source_count() + 1));
    }

    match *self {
      Mnemonic::Unary(opcode) => {
        let [src0] = sources_array(finish_sources(sources, &dest, false)?, name)?;
        Ok(Instruction::Unary { opcode, header, dest, src0, cond: None })
      }

      Mnemonic::Binary(opcode) => {
        let [src0, src1] = sources_array(finish_sources(sources, &dest, false)?, name)?;
        Ok(Instruction::Binary { opcode, header, dest, src0, src1, cond: None })
      }

      Mnemonic::Compare(modifier) | Mnemonic::Select(modifier) => {
        let opcode = match self {
          Mnemonic::Compare(_) => Opcode::Cmp,
          _                    => Opcode::Sel
        };
        let [src0, src1] = sources_array(finish_sources(sources, &dest, false)?, name)?;
        Ok(Instruction::Binary { opcode, header, dest, src0, src1, cond: Some(modifier) })
      }

      Mnemonic::Subtract => {
        let mut sources = sources;
        if let Some(subtrahend) = sources.pop() {
          sources.push(negate(subtrahend)?);
        }
        let [src0, src1] = sources_array(finish_sources(sources, &dest, false)?, name)?;
        Ok(Instruction::Binary { opcode: Opcode::Add, header, dest, src0, src1, cond: None })
      }

      Mnemonic::Ternary(opcode) => {
        let [src0, src1, src2] = sources_array(finish_sources(sources, &dest, true)?, name)?;
        Ok(Instruction::Ternary { opcode, header, dest, src0, src1, src2 })
      }

      Mnemonic::FusedMultiplyAdd => {
        let accumulator = SourceOperand::register(
          dest.data_type,
          dest.reg,
          RegisterRegion::default_for(header.exec_size)
        );
        let mut all = vec![ResolvedSource::implicit(accumulator)];
        all.extend(sources);
        // mad reads src0 as the addend.
        all.rotate_right(1);
        let [src0, src1, src2] = sources_array(finish_sources(all, &dest, true)?, name)?;
        Ok(Instruction::Ternary { opcode: Opcode::Mad, header, dest, src0, src1, src2 })
      }

      Mnemonic::Math(function) => {
        let sources = finish_sources(sources, &dest, false)?;
        let mut sources = sources.into_iter();
        match (sources.next(), sources.next()) {
          (Some(src0), src1) => Ok(Instruction::Math { function, header, dest, src0, src1 }),
          _ => Err(AssemblyErrorKind::OperandCount(name.to_string(), function.source_count() + 1))
        }
      }
    }
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use crate::isa::{DataType, ExecSize, SourceModifier, Swizzle};
  use crate::register::RegisterReference;

  fn register(n: u8) -> ResolvedSource {
    ResolvedSource::implicit(SourceOperand::register(
      DataType::F,
      RegisterReference::general(n),
      RegisterRegion::new(8, 8, 1)
    ))
  }

  fn dest() -> DestOperand {
    DestOperand::new(DataType::F, RegisterReference::general(2))
  }

  #[test]
  fn tables(){
    assert_eq!(lookup("mov"), Some(Mnemonic::Unary(Opcode::Mov)));
    assert_eq!(lookup("sada2"), Some(Mnemonic::Binary(Opcode::Sada2)));
    assert_eq!(lookup("rsqrt"), Some(Mnemonic::Math(MathFunction::Rsq)));
    assert_eq!(lookup("cmpge"), Some(Mnemonic::Compare(ConditionalModifier::GreaterEqual)));
    for rejected in &["bfe", "csel", "lrp", "bfi2", "cmp", "math", "send"] {
      assert_eq!(lookup(rejected), None, "`{}` should not be accepted", rejected);
    }
  }

  #[test]
  fn subtraction_negates(){
    let header = InstructionHeader::new(ExecSize::Simd8);
    let lowered = Mnemonic::Subtract.lower("sub", header, dest(), vec![register(3), register(4)]).unwrap();
    match lowered {
      Instruction::Binary { opcode: Opcode::Add, src1: SourceOperand::Register { modifier, .. }, .. } => {
        assert_eq!(modifier, SourceModifier::Negate);
      }
      other => panic!("unexpected lowering {:?}", other)
    }

    let five = ResolvedSource::implicit(SourceOperand::Immediate(Immediate::D(5)));
    let lowered = Mnemonic::Subtract.lower("sub", header, dest(), vec![register(3), five]).unwrap();
    assert_eq!(lowered.sources()[1], &SourceOperand::Immediate(Immediate::D(-5)));
  }

  #[test]
  fn fused_multiply_add_reads_destination(){
    let header = InstructionHeader::new(ExecSize::Simd8);
    let lowered = Mnemonic::FusedMultiplyAdd
      .lower("fma", header, dest(), vec![register(3), register(4)])
      .unwrap();
    match lowered {
      Instruction::Ternary { opcode: Opcode::Mad, src0, src1, src2, .. } => {
        assert_eq!(src0, SourceOperand::swizzled(DataType::F, RegisterReference::general(4), Swizzle::IDENTITY));
        assert_eq!(src1, SourceOperand::swizzled(DataType::F, RegisterReference::general(2), Swizzle::IDENTITY));
        assert_eq!(src2, SourceOperand::swizzled(DataType::F, RegisterReference::general(3), Swizzle::IDENTITY));
      }
      other => panic!("unexpected lowering {:?}", other)
    }
  }

  #[test]
  fn min_max_select(){
    let header = InstructionHeader::new(ExecSize::Simd8);
    let lowered = lookup("max").unwrap().lower("max", header, dest(), vec![register(3), register(4)]).unwrap();
    match lowered {
      Instruction::Binary { opcode, cond, .. } => {
        assert_eq!(opcode, Opcode::Sel);
        assert_eq!(cond, Some(ConditionalModifier::GreaterEqual));
      }
      other => panic!("unexpected lowering {:?}", other)
    }
  }

  #[test]
  fn operand_counts(){
    let header = InstructionHeader::new(ExecSize::Simd8);
    assert_eq!(
      lookup("pow").unwrap().lower("pow", header, dest(), vec![register(3)]),
      Err(AssemblyErrorKind::OperandCount("pow".to_string(), 3))
    );
    let sqrt = lookup("sqrt").unwrap().lower("sqrt", header, dest(), vec![register(3)]).unwrap();
    assert_eq!(sqrt.sources().len(), 1);
  }

  #[test]
  fn unsigned_vectors_cannot_be_negated(){
    let header = InstructionHeader::new(ExecSize::Simd8);
    let vector = ResolvedSource::implicit(SourceOperand::Immediate(Immediate::UV([1; 8])));
    assert!(Mnemonic::Subtract.lower("sub", header, dest(), vec![register(3), vector]).is_err());
  }
}
