/*!
  Text rendering of instructions. The output reads back through the assembler for everything the
  assembler can express:

    (~f0.1.any16h) add(1) ip.s, ip.s, 32:s
    cmplt(8)(f0.1) null.f, r3.f2<0,1,0>, -|r4.f|
    mad(8) r2.f, r3.f, r4.f.xxxx, r5.f
    send(16) null.u, r2.u, dc0 mlen 2 rlen 0 dword_scattered_write bti 0x38 eot

  Regions are printed only where they differ from the default for the execution size, and
  swizzles only where they differ from `xyzw`.
*/

use std::fmt::{Display, Formatter};

use crate::assembler::{identify_message, DescriptorFields};
use crate::isa::{
  vf_to_f32,
  DataType,
  DestOperand,
  ExecSize,
  Immediate,
  Instruction,
  InstructionHeader,
  MessageDescriptor,
  Opcode,
  RegisterRegion,
  SourceAddressing,
  SourceOperand,
  Swizzle,
};
use crate::register::RegisterReference;

impl Display for Immediate {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      Immediate::UD(value) => write!(f, "{}:u", value),
      Immediate::D(value)  => write!(f, "{}:s", value),
      Immediate::UW(value) => write!(f, "{}:us", value),
      Immediate::W(value)  => write!(f, "{}:ss", value),
      Immediate::F(value)  => write!(f, "{:?}:f", value),
      Immediate::V(lanes)  => write_lanes(f, "v", lanes.iter()),
      Immediate::UV(lanes) => write_lanes(f, "uv", lanes.iter()),
      Immediate::VF(lanes) => {
        let lanes: Vec<String> = lanes.iter().map(|lane| format!("{:?}", vf_to_f32(*lane))).collect();
        write!(f, "vf[{}]", lanes.join(","))
      }
    }
  }
}

fn write_lanes<T: Display>(f: &mut Formatter<'_>, prefix: &str, lanes: impl Iterator<Item = T>)
  -> std::fmt::Result
{
  let lanes: Vec<String> = lanes.map(|lane| lane.to_string()).collect();
  write!(f, "{}[{}]", prefix, lanes.join(","))
}

/**
  `r3.f2`: the register, its type, and its sub-register counted in elements of that type. A
  sub-register that is not a whole number of elements has no element form and is written as a
  byte offset, `r3.f@5`.
*/
fn write_register(f: &mut Formatter<'_>, reg: &RegisterReference, data_type: DataType) -> std::fmt::Result {
  write!(f, "{}.{}", reg, data_type)?;
  let subreg = reg.subreg() as usize;
  if subreg % data_type.size() != 0 {
    return write!(f, "@{}", subreg);
  }
  let element = subreg / data_type.size();
  if element != 0 {
    write!(f, "{}", element)?;
  }
  Ok(())
}

impl Display for DestOperand {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write_register(f, &self.reg, self.data_type)?;
    if self.hstride != 1 {
      write!(f, "<{}>", self.hstride)?;
    }
    if !self.write_mask.is_all() {
      write!(f, ".{}", self.write_mask)?;
    }
    Ok(())
  }
}

/// A source operand with the execution size that decides its default region.
pub struct SourceText<'i> {
  pub operand   : &'i SourceOperand,
  pub exec_size : ExecSize,
}

impl<'i> Display for SourceText<'i> {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    let (data_type, reg, addressing, modifier) = match self.operand {
      SourceOperand::Immediate(immediate) => return write!(f, "{}", immediate),
      SourceOperand::Register { data_type, reg, addressing, modifier } => {
        (*data_type, reg, addressing, *modifier)
      }
    };

    if modifier.negate() {
      write!(f, "-")?;
    }
    if modifier.abs() {
      write!(f, "|")?;
    }
    write_register(f, reg, data_type)?;
    match addressing {
      SourceAddressing::Region(region) if *region != RegisterRegion::default_for(self.exec_size) => {
        write!(f, "{}", region)?;
      }
      SourceAddressing::Swizzle(swizzle) if *swizzle != Swizzle::IDENTITY => {
        write!(f, ".{}", swizzle)?;
      }
      _ => {}
    }
    if modifier.abs() {
      write!(f, "|")?;
    }
    Ok(())
  }
}

/// `(~f0.1.any16h) ` before a predicated instruction, nothing otherwise.
fn write_predicate(f: &mut Formatter<'_>, header: &InstructionHeader) -> std::fmt::Result {
  if header.predicate.is_none() {
    return Ok(());
  }
  write!(
    f,
    "({}{}{}) ",
    if header.predicate.invert { "~" } else { "" },
    header.flag,
    header.predicate.mode.suffix()
  )
}

fn write_operands<'i>(
  f         : &mut Formatter<'_>,
  exec_size : ExecSize,
  dest      : &DestOperand,
  sources   : impl Iterator<Item = &'i SourceOperand>
) -> std::fmt::Result {
  write!(f, " {}", dest)?;
  for operand in sources {
    write!(f, ", {}", SourceText { operand, exec_size })?;
  }
  Ok(())
}

/// The message description after a send's operands.
fn write_message(f: &mut Formatter<'_>, instruction: &Instruction) -> std::fmt::Result {
  let (function, descriptor, end_of_thread) = match instruction {
    Instruction::Send { function, descriptor, end_of_thread, .. } => (*function, *descriptor, *end_of_thread),
    _ => return Ok(())
  };

  write!(f, ", {}", function)?;
  match descriptor {
    MessageDescriptor::AddressRegister => write!(f, " desc a0.0")?,
    MessageDescriptor::Immediate(value) => {
      let fields = DescriptorFields::unpack(value);
      write!(f, " mlen {} rlen {}", fields.message_length, fields.response_length)?;
      match identify_message(function, value) {
        Some(message) => write!(f, " {} bti {:#04x}", message.family, fields.binding)?,
        None          => write!(f, " desc {:#010x}", value)?
      }
    }
  }
  if end_of_thread {
    write!(f, " eot")?;
  }
  Ok(())
}

impl Display for Instruction {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    let header = self.header();

    match self {
      Instruction::Null(opcode) => return write!(f, "{}", opcode),

      Instruction::Branch { opcode, jip, uip, .. } => {
        write_predicate(f, &header)?;
        return write!(f, "{}({}) jip {} uip {}", opcode, header.exec_size, jip, uip);
      }

      Instruction::Unary { opcode, cond, .. } | Instruction::Binary { opcode, cond, .. } => {
        write_predicate(f, &header)?;
        match (opcode, cond) {
          (Opcode::Cmp, Some(modifier)) | (Opcode::Cmpn, Some(modifier)) => {
            write!(f, "{}{}({})({})", opcode, modifier, header.exec_size, header.flag)?
          }
          (_, Some(modifier)) => write!(f, "{}.{}({})", opcode, modifier, header.exec_size)?,
          (_, None)           => write!(f, "{}({})", opcode, header.exec_size)?
        }
      }

      Instruction::Math { function, .. } => {
        write_predicate(f, &header)?;
        write!(f, "math.{}({})", function, header.exec_size)?;
      }

      Instruction::Ternary { opcode, .. } | Instruction::Send { opcode, .. } => {
        write_predicate(f, &header)?;
        write!(f, "{}({})", opcode, header.exec_size)?;
      }
    }

    if let Some(dest) = self.dest() {
      write_operands(f, header.exec_size, dest, self.sources().into_iter())?;
    }
    write_message(f, self)
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use crate::isa::{
    ConditionalModifier,
    FlagReference,
    MathFunction,
    Predicate,
    PredicateMode,
    SharedFunction,
    SourceModifier,
    WriteMask,
  };
  use crate::register::{ArchRegister, RegisterFile};

  fn grf(data_type: DataType, n: u8) -> SourceOperand {
    SourceOperand::register(data_type, RegisterReference::general(n), RegisterRegion::new(8, 8, 1))
  }

  fn header8() -> InstructionHeader {
    InstructionHeader::new(ExecSize::Simd8)
  }

  #[test]
  fn immediates(){
    assert_eq!(Immediate::UD(7).to_string(), "7:u");
    assert_eq!(Immediate::D(-3).to_string(), "-3:s");
    assert_eq!(Immediate::W(-2).to_string(), "-2:ss");
    assert_eq!(Immediate::F(1.5).to_string(), "1.5:f");
    assert_eq!(Immediate::F(2.0).to_string(), "2.0:f");
    assert_eq!(Immediate::V([0, 1, 2, 3, -1, -2, -8, 7]).to_string(), "v[0,1,2,3,-1,-2,-8,7]");
    assert_eq!(Immediate::VF([0x30, 0xB0, 0x20, 0x00]).to_string(), "vf[1.0,-1.0,0.5,0.0]");
  }

  #[test]
  fn plain_binary(){
    let dest = DestOperand::new(DataType::F, RegisterReference::general(2));
    let add  = Instruction::binary(Opcode::Add, header8(), dest, grf(DataType::F, 3), grf(DataType::F, 4)).unwrap();
    assert_eq!(add.to_string(), "add(8) r2.f, r3.f, r4.f");
  }

  #[test]
  fn unaligned_subregisters_keep_their_byte_offset(){
    let dest = DestOperand::new(DataType::UD, RegisterReference::Direct { file: RegisterFile::General(2), subreg: 8 });
    let src0 = SourceOperand::register(
      DataType::UD,
      RegisterReference::Direct { file: RegisterFile::General(3), subreg: 6 },
      RegisterRegion::new(0, 1, 0)
    );
    let mov = Instruction::unary(Opcode::Mov, InstructionHeader::new(ExecSize::Simd1), dest, src0).unwrap();
    assert_eq!(mov.to_string(), "mov(1) r2.u2, r3.u@6");
  }

  #[test]
  fn compare_and_modifiers(){
    let header = header8().with_flag(FlagReference::new(0, 1));
    let scalar = SourceOperand::register(DataType::F, RegisterReference::general_at(3, 8), RegisterRegion::SCALAR);
    let negabs = grf(DataType::F, 4).with_modifier(SourceModifier::NegateAbs);
    let cmp = Instruction::binary(Opcode::Cmp, header, DestOperand::null(DataType::F), scalar, negabs)
      .unwrap()
      .with_cond(ConditionalModifier::Less);
    assert_eq!(cmp.to_string(), "cmplt(8)(f0.1) null.f, r3.f2<0,1,0>, -|r4.f|");

    let sel = Instruction::binary(
      Opcode::Sel,
      header8(),
      DestOperand::new(DataType::F, RegisterReference::general(2)),
      grf(DataType::F, 3),
      SourceOperand::Immediate(Immediate::F(0.0))
    ).unwrap().with_cond(ConditionalModifier::GreaterEqual);
    assert_eq!(sel.to_string(), "sel.ge(8) r2.f, r3.f, 0.0:f");
  }

  #[test]
  fn predicated_jump(){
    let ip = RegisterReference::arch(ArchRegister::InstructionPointer);
    let header = InstructionHeader::new(ExecSize::Simd1)
      .with_predicate(Predicate::new(PredicateMode::Any16H, true), FlagReference::new(0, 1));
    let jump = Instruction::binary(
      Opcode::Add,
      header,
      DestOperand::new(DataType::D, ip),
      SourceOperand::register(DataType::D, ip, RegisterRegion::SCALAR),
      SourceOperand::Immediate(Immediate::D(32))
    ).unwrap();
    assert_eq!(jump.to_string(), "(~f0.1.any16h) add(1) ip.s, ip.s, 32:s");
  }

  #[test]
  fn align16_operands(){
    let dest = DestOperand::new(DataType::F, RegisterReference::general(2)).with_write_mask(WriteMask(0x3));
    let src  = SourceOperand::swizzled(
      DataType::F,
      RegisterReference::Indirect { offset: 16, address_subreg: 2 },
      Swizzle::parse("xxxx").unwrap()
    );
    let mov = Instruction::unary(Opcode::Mov, header8(), dest, src).unwrap();
    assert_eq!(mov.to_string(), "mov(8) r2.f.xy, [a0.2+16].f.xxxx");

    let math = Instruction::Math {
      function : MathFunction::Sqrt,
      header   : header8(),
      dest     : DestOperand::new(DataType::F, RegisterReference::general(2)).with_hstride(2),
      src0     : grf(DataType::F, 3),
      src1     : None
    };
    assert_eq!(math.to_string(), "math.sqrt(8) r2.f<2>, r3.f");
  }

  #[test]
  fn sends(){
    let store = Instruction::send(
      Opcode::Send,
      header8(),
      SharedFunction::DataCache,
      MessageDescriptor::Immediate((2 << 25) | (11 << 14) | (2 << 8) | 0x38),
      DestOperand::null(DataType::UD),
      grf(DataType::UD, 2)
    ).unwrap();
    assert_eq!(store.to_string(), "send(8) null.u, r2.u, dc0 mlen 2 rlen 0 dword_scattered_write bti 0x38");

    let eot = Instruction::send(
      Opcode::Send,
      header8(),
      SharedFunction::ThreadSpawner,
      MessageDescriptor::Immediate(0x0200_0010),
      DestOperand::null(DataType::UD),
      grf(DataType::UD, 127)
    ).unwrap().with_end_of_thread();
    assert_eq!(eot.to_string(), "send(8) null.u, r127.u, ts mlen 1 rlen 0 desc 0x02000010 eot");
  }

  #[test]
  fn branches_and_padding(){
    let branch = Instruction::branch(Opcode::While, header8(), -32, 0).unwrap();
    assert_eq!(branch.to_string(), "while(8) jip -32 uip 0");
    assert_eq!(Instruction::Null(Opcode::Nop).to_string(), "nop");
    assert_eq!(Instruction::Null(Opcode::Illegal).to_string(), "illegal");
  }
}
