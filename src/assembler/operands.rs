/*!
  Resolution of parsed operand nodes into instruction operands.

  A source written without a region or swizzle is given the default region for the execution
  size. Once every operand of an instruction is resolved, `finish_sources` decides the access
  mode: any swizzled source or a partial destination write mask selects align16, and then every
  source without an explicit region is read through the identity swizzle.
*/

use std::convert::TryFrom;

use crate::error::{AssemblyErrorKind, EncodeError};
use crate::isa::{
  vf_from_f32,
  DataType,
  DestOperand,
  ExecSize,
  FlagReference,
  Immediate,
  RegisterRegion,
  SourceAddressing,
  SourceModifier,
  SourceOperand,
  Swizzle,
  WriteMask,
};
use crate::register::{RegisterReference, REGISTER_BYTES};
use super::ast::{Access, Arena, Literal, Node, NodeId, Number, RegisterName, VectorKind};
use super::declarations::RegisterLayout;

/// Indirect operands can name sub-registers 0-15 of `a0`.
const ADDRESS_SUBREGISTERS: u32 = 8;

#[derive(Copy, Clone, PartialEq, Debug)]
pub struct ResolvedSource {
  pub operand  : SourceOperand,
  /// Whether the source named its own region or swizzle.
  pub explicit : bool,
}

impl ResolvedSource {
  pub fn implicit(operand: SourceOperand) -> ResolvedSource {
    ResolvedSource { operand, explicit: false }
  }
}

fn malformed() -> AssemblyErrorKind {
  AssemblyErrorKind::Syntax("malformed operand".to_string())
}

/// Resolves nodes against a frozen register layout.
pub struct OperandResolver<'s, 'a> {
  pub arena  : &'s Arena<Node<'a>>,
  pub layout : &'s RegisterLayout,
}

impl<'s, 'a> OperandResolver<'s, 'a> {
  /// A flag reference and whether it was written inverted.
  pub fn flag(&self, id: NodeId) -> Result<(FlagReference, bool), AssemblyErrorKind> {
    match self.arena.get(id) {
      Node::Flag { invert, reg, subreg, .. } if *reg <= 1 && *subreg <= 1 => {
        Ok((FlagReference::new(*reg as u8, *subreg as u8), *invert))
      }
      Node::Flag { text, .. } => Err(AssemblyErrorKind::InvalidFlag(text.to_string())),
      _ => Err(malformed())
    }
  }

  /// Resolves a register and its type suffix. The suffix's element index is in units of the type.
  fn register(&self, register: NodeId, suffix: Option<NodeId>)
    -> Result<(RegisterReference, DataType), AssemblyErrorKind>
  {
    let (data_type, element) = match suffix.map(|id| self.arena.get(id)) {
      Some(Node::Suffix { data_type, element }) => (*data_type, element.unwrap_or(0)),
      _ => (DataType::UD, 0)
    };
    let byte_offset = element as u64 * data_type.size() as u64;

    match self.arena.get(register) {
      Node::Register(RegisterName::Named(name)) => {
        let file = self.layout.resolve(name)?;
        if byte_offset >= REGISTER_BYTES as u64 {
          return Err(AssemblyErrorKind::SubregisterRange(byte_offset.min(u32::MAX as u64) as u32));
        }
        Ok((RegisterReference::Direct { file, subreg: byte_offset as u8 }, data_type))
      }

      Node::Register(RegisterName::Indirect { address_subreg, offset }) => {
        if *address_subreg >= ADDRESS_SUBREGISTERS {
          return Err(AssemblyErrorKind::SubregisterRange(*address_subreg));
        }
        let total = offset + byte_offset as i64;
        let offset = i16::try_from(total)
          .map_err(|_| AssemblyErrorKind::ImmediateRange(total.to_string(), "ss".to_string()))?;
        Ok((RegisterReference::Indirect { offset, address_subreg: *address_subreg as u8 }, data_type))
      }

      _ => Err(malformed())
    }
  }

  pub fn dest(&self, id: NodeId) -> Result<DestOperand, AssemblyErrorKind> {
    let (register, suffix, stride, mask) = match self.arena.get(id) {
      Node::Dest { register, suffix, stride, mask } => (*register, *suffix, *stride, *mask),
      _ => return Err(malformed())
    };
    let (reg, data_type) = self.register(register, suffix)?;
    let mut dest = DestOperand::new(data_type, reg);

    if let Some(Node::Access(Access::Stride(hstride))) = stride.map(|id| self.arena.get(id)) {
      let hstride = u8::try_from(*hstride)
        .map_err(|_| EncodeError::InvalidRegion(format!("<{}>", hstride)))?;
      dest = dest.with_hstride(hstride);
    }
    if let Some(Node::Access(Access::WriteMask(text))) = mask.map(|id| self.arena.get(id)) {
      let write_mask = WriteMask::parse(text)
        .ok_or_else(|| AssemblyErrorKind::Syntax(format!(".{}", text)))?;
      dest = dest.with_write_mask(write_mask);
    }
    Ok(dest)
  }

  /// `dest_type` types untyped integer immediates.
  pub fn source(&self, id: NodeId, exec_size: ExecSize, dest_type: DataType)
    -> Result<ResolvedSource, AssemblyErrorKind>
  {
    match self.arena.get(id) {
      Node::Immediate(literal) => {
        Ok(ResolvedSource::implicit(SourceOperand::Immediate(immediate(literal, dest_type)?)))
      }

      Node::Source { negate, abs, register, suffix, access } => {
        let (reg, data_type) = self.register(*register, *suffix)?;
        let (addressing, explicit) = match access.map(|id| self.arena.get(id)) {
          Some(Node::Access(Access::Region(region))) => (SourceAddressing::Region(*region), true),
          Some(Node::Access(Access::Swizzle(text))) => {
            let swizzle = Swizzle::parse(text)
              .ok_or_else(|| AssemblyErrorKind::Syntax(format!(".{}", text)))?;
            (SourceAddressing::Swizzle(swizzle), true)
          }
          _ => (SourceAddressing::Region(RegisterRegion::default_for(exec_size)), false)
        };
        let operand = SourceOperand::Register {
          data_type,
          reg,
          addressing,
          modifier: SourceModifier::from_bits(*abs, *negate)
        };
        Ok(ResolvedSource { operand, explicit })
      }

      _ => Err(malformed())
    }
  }
}

/**
  Settles the access mode of an instruction's sources. Three-source instructions are always
  align16 and may additionally read a scalar through an explicit `<0,1,0>`, which they encode as
  channel replication.
*/
pub fn finish_sources(sources: Vec<ResolvedSource>, dest: &DestOperand, ternary: bool)
  -> Result<Vec<SourceOperand>, AssemblyErrorKind>
{
  let align16 = ternary
    || !dest.write_mask.is_all()
    || sources.iter().any(|source| source.operand.is_swizzled());

  sources
    .into_iter()
    .map(|source| match source.operand {
      SourceOperand::Register { data_type, reg, addressing: SourceAddressing::Region(region), modifier }
        if align16 =>
      {
        if !source.explicit {
          Ok(SourceOperand::Register {
            data_type,
            reg,
            addressing: SourceAddressing::Swizzle(Swizzle::IDENTITY),
            modifier
          })
        } else if ternary && region.is_scalar() {
          Ok(source.operand)
        } else {
          Err(AssemblyErrorKind::MixedAddressing)
        }
      }
      operand => Ok(operand)
    })
    .collect()
}

// region Immediates

/// The suffix an untyped integer takes from its destination; bytes widen to words.
fn implied_suffix(dest_type: DataType) -> Option<&'static str> {
  match dest_type {
    DataType::UD               => Some("u"),
    DataType::D                => Some("s"),
    DataType::UW | DataType::UB => Some("us"),
    DataType::W  | DataType::B  => Some("ss"),
    DataType::F                => Some("f"),
    DataType::DF               => None
  }
}

/// Two's-complement spellings are accepted for the unsigned types.
fn integer(value: i64, suffix: &str) -> Option<Immediate> {
  match suffix {
    "u"  if value >= i32::MIN as i64 && value <= u32::MAX as i64 => Some(Immediate::UD(value as u32)),
    "s"  => i32::try_from(value).ok().map(Immediate::D),
    "us" if value >= i16::MIN as i64 && value <= u16::MAX as i64 => Some(Immediate::UW(value as u16)),
    "ss" => i16::try_from(value).ok().map(Immediate::W),
    "f"  => Some(Immediate::F(value as f32)),
    _    => None
  }
}

fn lane_value(lane: &Number) -> f32 {
  match lane {
    Number::Integer(value) => *value as f32,
    Number::Float(value)   => *value as f32
  }
}

fn vector(kind: VectorKind, lanes: &[Number]) -> Option<Immediate> {
  match kind {
    VectorKind::Signed if lanes.len() == 8 => {
      let mut packed = [0i8; 8];
      for (slot, lane) in packed.iter_mut().zip(lanes) {
        match lane {
          Number::Integer(value) if (-8..=7).contains(value) => *slot = *value as i8,
          _ => return None
        }
      }
      Some(Immediate::V(packed))
    }
    VectorKind::Unsigned if lanes.len() == 8 => {
      let mut packed = [0u8; 8];
      for (slot, lane) in packed.iter_mut().zip(lanes) {
        match lane {
          Number::Integer(value) if (0..=15).contains(value) => *slot = *value as u8,
          _ => return None
        }
      }
      Some(Immediate::UV(packed))
    }
    VectorKind::Float if lanes.len() == 4 => {
      let mut packed = [0u8; 4];
      for (slot, lane) in packed.iter_mut().zip(lanes) {
        *slot = vf_from_f32(lane_value(lane))?;
      }
      Some(Immediate::VF(packed))
    }
    _ => None
  }
}

/**
  Types a literal. An explicit `:type` suffix wins; otherwise floats are `f` and integers take the
  destination's type. Vectors must have exactly eight (`v`, `uv`) or four (`vf`) lanes, each
  representable in its lane format.
*/
pub fn immediate(literal: &Literal, dest_type: DataType) -> Result<Immediate, AssemblyErrorKind> {
  let out_of_range = |suffix: &str| AssemblyErrorKind::ImmediateRange(literal.to_string(), suffix.to_string());
  match literal {
    Literal::Scalar { value: Number::Float(value), suffix: None }
    | Literal::Scalar { value: Number::Float(value), suffix: Some("f") } => Ok(Immediate::F(*value as f32)),

    Literal::Scalar { value: Number::Float(_), suffix: Some(suffix) } => Err(out_of_range(*suffix)),

    Literal::Scalar { value: Number::Integer(value), suffix } => {
      let suffix = match suffix {
        Some(suffix) => *suffix,
        None         => implied_suffix(dest_type).ok_or_else(|| out_of_range("fd"))?
      };
      integer(*value, suffix).ok_or_else(|| out_of_range(suffix))
    }

    Literal::Vector { kind, lanes } => {
      let prefix = match kind {
        VectorKind::Signed   => "v",
        VectorKind::Unsigned => "uv",
        VectorKind::Float    => "vf"
      };
      vector(*kind, lanes).ok_or_else(|| out_of_range(prefix))
    }
  }
}

// endregion
