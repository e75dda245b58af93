/*!
  Encodes instructions into their native 16-byte form. The encoder never emits compacted
  instructions.
*/

use super::bits::{BitCursor, Field};
use super::layout::{
  common, dest, ternary, FlagFields, SourceFields, ALIGN16_VSTRIDE_CODE, DESCRIPTOR_BITS,
  END_OF_THREAD, FILE_ARCH, FILE_GENERAL, FILE_IMMEDIATE, FLAG, IMMEDIATE, JIP, NATIVE_LENGTH,
  SEND_DESCRIPTOR, SRC0, SRC1, UIP,
};
use crate::error::EncodeError;
use crate::isa::{
  hstride_code, DestOperand, Immediate, Instruction, InstructionHeader, MessageDescriptor, Opcode,
  RegisterRegion, SourceAddressing, SourceOperand, Swizzle,
};
use crate::register::{ArchRegister, RegisterFile, RegisterReference};

pub type EncodedInstruction = [u8; NATIVE_LENGTH];

/// Encodes a sequence of instructions back to back.
pub fn encode(instructions: &[Instruction]) -> Result<Vec<u8>, EncodeError> {
  let mut bytes = Vec::with_capacity(instructions.len() * NATIVE_LENGTH);
  for instruction in instructions {
    bytes.extend_from_slice(&encode_instruction(instruction)?);
  }
  Ok(bytes)
}

pub fn encode_instruction(instruction: &Instruction) -> Result<EncodedInstruction, EncodeError> {
  let mut bytes  = [0u8; NATIVE_LENGTH];
  let mut cursor = BitCursor::new(&mut bytes);
  let align16    = instruction.is_align16();

  match instruction {

    Instruction::Unary { opcode, header, dest, src0, cond } => {
      encode_header(&mut cursor, *opcode, header, align16, &FLAG)?;
      cursor.write(common::FUNCTION_CONTROL, cond.map_or(0, |c| c.code() as u32))?;
      encode_dest(&mut cursor, dest, align16)?;
      encode_source(&mut cursor, &SRC0, src0, align16)?;
    }

    Instruction::Binary { opcode, header, dest, src0, src1, cond } => {
      if src0.is_immediate() {
        return Err(EncodeError::MisplacedImmediate(*opcode));
      }
      encode_header(&mut cursor, *opcode, header, align16, &FLAG)?;
      cursor.write(common::FUNCTION_CONTROL, cond.map_or(0, |c| c.code() as u32))?;
      encode_dest(&mut cursor, dest, align16)?;
      encode_source(&mut cursor, &SRC0, src0, align16)?;
      encode_source(&mut cursor, &SRC1, src1, align16)?;
    }

    Instruction::Ternary { opcode, header, dest, src0, src1, src2 } => {
      encode_header(&mut cursor, *opcode, header, true, &ternary::FLAG)?;
      encode_ternary(&mut cursor, dest, [src0, src1, src2])?;
    }

    Instruction::Math { function, header, dest, src0, src1 } => {
      let count = 1 + src1.iter().count();
      if count != function.source_count() {
        return Err(EncodeError::MathSourceCount {
          function: function.to_string(),
          expected: function.source_count()
        });
      }
      if src1.is_some() && src0.is_immediate() {
        return Err(EncodeError::MisplacedImmediate(Opcode::Math));
      }
      encode_header(&mut cursor, Opcode::Math, header, align16, &FLAG)?;
      cursor.write(common::FUNCTION_CONTROL, function.code() as u32)?;
      encode_dest(&mut cursor, dest, align16)?;
      encode_source(&mut cursor, &SRC0, src0, align16)?;
      if let Some(src1) = src1 {
        encode_source(&mut cursor, &SRC1, src1, align16)?;
      }
    }

    Instruction::Send { opcode, header, function, descriptor, dest, src0, end_of_thread } => {
      if src0.is_immediate() {
        return Err(EncodeError::MisplacedImmediate(*opcode));
      }
      encode_header(&mut cursor, *opcode, header, align16, &FLAG)?;
      cursor.write(common::FUNCTION_CONTROL, function.code() as u32)?;
      encode_dest(&mut cursor, dest, align16)?;
      encode_source(&mut cursor, &SRC0, src0, align16)?;
      cursor.write(SRC1.data_type, 0)?;
      match descriptor {
        MessageDescriptor::Immediate(value) => {
          if *value >> DESCRIPTOR_BITS != 0 {
            return Err(EncodeError::DescriptorOverflow(*value));
          }
          cursor.write(SRC1.file, FILE_IMMEDIATE)?;
          cursor.write(SEND_DESCRIPTOR, *value)?;
        }
        MessageDescriptor::AddressRegister => {
          cursor.write(SRC1.file, FILE_ARCH)?;
          cursor.write(SRC1.reg, ArchRegister::Address.code() as u32)?;
        }
      }
      cursor.write_flag(END_OF_THREAD, *end_of_thread)?;
    }

    Instruction::Branch { opcode, header, jip, uip } => {
      encode_header(&mut cursor, *opcode, header, align16, &FLAG)?;
      cursor.write(JIP, *jip as u16 as u32)?;
      cursor.write(UIP, *uip as u16 as u32)?;
    }

    Instruction::Null(opcode) => {
      cursor.write(common::OPCODE, opcode.code() as u32)?;
    }

  }

  Ok(bytes)
}

fn encode_header(
  cursor  : &mut BitCursor,
  opcode  : Opcode,
  header  : &InstructionHeader,
  align16 : bool,
  flag    : &FlagFields
) -> Result<(), EncodeError> {
  let mode = if align16 { "align16" } else { "align1" };
  let predicate_control = header.predicate.mode.code(align16).ok_or(EncodeError::PredicateMode(mode))?;

  cursor.write(common::OPCODE, opcode.code() as u32)?;
  cursor.write_flag(common::ACCESS_MODE, align16)?;
  cursor.write_flag(common::NO_DD_CHECK, header.no_dependency_check)?;
  cursor.write(common::PREDICATE_CONTROL, predicate_control as u32)?;
  cursor.write_flag(common::PREDICATE_INVERT, header.predicate.invert)?;
  cursor.write(common::EXEC_SIZE, header.exec_size.code() as u32)?;
  cursor.write(flag.reg, header.flag.reg as u32)?;
  cursor.write(flag.subreg, header.flag.subreg as u32)?;
  Ok(())
}

fn file_code(file: &RegisterFile) -> u32 {
  match file {
    RegisterFile::General(_) => FILE_GENERAL,
    RegisterFile::Arch(_)    => FILE_ARCH
  }
}

/// Writes a ten-bit signed indirect offset.
fn encode_indirect_offset(cursor: &mut BitCursor, field: Field, offset: i16) -> Result<(), EncodeError> {
  if !(-512..=511).contains(&offset) {
    return Err(EncodeError::FieldOverflow { field: field.name, value: offset as u16 as u64 });
  }
  cursor.write(field, (offset as u32) & 0x3FF)
}

/// Align16 operands address a register in 16-byte halves.
fn align16_subreg(field: Field, subreg: u8) -> Result<u32, EncodeError> {
  match subreg % 16 {
    0 => Ok((subreg / 16) as u32),
    _ => Err(EncodeError::FieldOverflow { field: field.name, value: subreg as u64 })
  }
}

fn region_codes(region: &RegisterRegion) -> Result<(u32, u32, u32), EncodeError> {
  let invalid = || EncodeError::InvalidRegion(region.to_string());
  Ok((
    region.vstride_code().ok_or_else(invalid)? as u32,
    region.width_code().ok_or_else(invalid)? as u32,
    region.hstride_code().ok_or_else(invalid)? as u32,
  ))
}

fn encode_dest(cursor: &mut BitCursor, operand: &DestOperand, align16: bool) -> Result<(), EncodeError> {
  cursor.write(dest::TYPE, operand.data_type.code() as u32)?;
  let hstride = match align16 {
    true if operand.hstride == 1 => 1,
    true  => return Err(EncodeError::InvalidRegion(format!("<{}>", operand.hstride))),
    false => {
      hstride_code(operand.hstride)
        .ok_or_else(|| EncodeError::InvalidRegion(format!("<{}>", operand.hstride)))? as u32
    }
  };
  cursor.write(dest::HSTRIDE, hstride)?;

  match operand.reg {
    RegisterReference::Direct { file, subreg } => {
      cursor.write(dest::FILE, file_code(&file))?;
      cursor.write(dest::REG, file.number() as u32)?;
      match align16 {
        true => {
          cursor.write(dest::WRITE_MASK, (operand.write_mask.0 & 0xF) as u32)?;
          cursor.write(dest::ALIGN16_SUBREG, align16_subreg(dest::ALIGN16_SUBREG, subreg)?)?;
        }
        false => cursor.write(dest::SUBREG, subreg as u32)?
      }
    }
    RegisterReference::Indirect { offset, address_subreg } => {
      if align16 {
        return Err(EncodeError::Align16Indirect);
      }
      cursor.write(dest::FILE, FILE_GENERAL)?;
      cursor.write(dest::ADDRESS_MODE, 1)?;
      cursor.write(dest::INDIRECT_SUBREG, address_subreg as u32)?;
      encode_indirect_offset(cursor, dest::INDIRECT_IMMEDIATE, offset)?;
    }
  }
  Ok(())
}

fn encode_source(
  cursor  : &mut BitCursor,
  fields  : &SourceFields,
  source  : &SourceOperand,
  align16 : bool
) -> Result<(), EncodeError> {
  let (data_type, reg, addressing, modifier) = match source {
    SourceOperand::Immediate(immediate) => return encode_immediate(cursor, fields, immediate),
    SourceOperand::Register { data_type, reg, addressing, modifier } => {
      (data_type, reg, addressing, modifier)
    }
  };

  cursor.write(fields.data_type, data_type.code() as u32)?;
  cursor.write_flag(fields.abs, modifier.abs())?;
  cursor.write_flag(fields.negate, modifier.negate())?;

  match (reg, addressing) {
    (RegisterReference::Direct { file, subreg }, SourceAddressing::Region(region)) => {
      if align16 {
        return Err(EncodeError::MixedAddressing);
      }
      let (vstride, width, hstride) = region_codes(region)?;
      cursor.write(fields.file, file_code(file))?;
      cursor.write(fields.reg, file.number() as u32)?;
      cursor.write(fields.subreg, *subreg as u32)?;
      cursor.write(fields.vstride, vstride)?;
      cursor.write(fields.width, width)?;
      cursor.write(fields.hstride, hstride)?;
    }

    (RegisterReference::Direct { file, subreg }, SourceAddressing::Swizzle(swizzle)) => {
      if !align16 {
        return Err(EncodeError::MixedAddressing);
      }
      cursor.write(fields.file, file_code(file))?;
      cursor.write(fields.reg, file.number() as u32)?;
      cursor.write(fields.align16_subreg, align16_subreg(fields.align16_subreg, *subreg)?)?;
      encode_swizzle(cursor, fields, swizzle)?;
      cursor.write(fields.vstride, ALIGN16_VSTRIDE_CODE)?;
    }

    (RegisterReference::Indirect { offset, address_subreg }, SourceAddressing::Region(region)) => {
      if align16 {
        return Err(EncodeError::Align16Indirect);
      }
      let (vstride, width, hstride) = region_codes(region)?;
      cursor.write(fields.file, FILE_GENERAL)?;
      cursor.write(fields.address_mode, 1)?;
      cursor.write(fields.indirect_subreg, *address_subreg as u32)?;
      encode_indirect_offset(cursor, fields.indirect_immediate, *offset)?;
      cursor.write(fields.vstride, vstride)?;
      cursor.write(fields.width, width)?;
      cursor.write(fields.hstride, hstride)?;
    }

    (RegisterReference::Indirect { .. }, SourceAddressing::Swizzle(_)) => {
      return Err(EncodeError::Align16Indirect);
    }
  }
  Ok(())
}

fn encode_swizzle(cursor: &mut BitCursor, fields: &SourceFields, swizzle: &Swizzle) -> Result<(), EncodeError> {
  let code = swizzle.code() as u32;
  cursor.write(fields.swizzle_x, code & 0x3)?;
  cursor.write(fields.swizzle_y, (code >> 2) & 0x3)?;
  cursor.write(fields.swizzle_z, (code >> 4) & 0x3)?;
  cursor.write(fields.swizzle_w, (code >> 6) & 0x3)
}

/// Immediates always occupy the shared 32-bit slot, whichever source they belong to.
fn encode_immediate(cursor: &mut BitCursor, fields: &SourceFields, immediate: &Immediate) -> Result<(), EncodeError> {
  cursor.write(fields.file, FILE_IMMEDIATE)?;
  cursor.write(fields.data_type, Into::<u8>::into(immediate.immediate_type()) as u32)?;
  cursor.write(IMMEDIATE, immediate.bits())
}

fn encode_ternary(
  cursor  : &mut BitCursor,
  operand : &DestOperand,
  sources : [&SourceOperand; 3]
) -> Result<(), EncodeError> {
  let dword = |field: Field, subreg: u8| match subreg % 4 {
    0 => Ok((subreg / 4) as u32),
    _ => Err(EncodeError::FieldOverflow { field: field.name, value: subreg as u64 })
  };

  let (dst_reg, dst_subreg) = match operand.reg {
    RegisterReference::Direct { file: RegisterFile::General(n), subreg } => (n, subreg),
    _ => return Err(EncodeError::TernaryOperand)
  };
  let dst_type = operand.data_type.ternary_code()
    .ok_or_else(|| EncodeError::TernaryDataType(operand.data_type.to_string()))?;
  cursor.write(ternary::DST_TYPE, dst_type as u32)?;
  cursor.write(ternary::DST_WRITE_MASK, (operand.write_mask.0 & 0xF) as u32)?;
  cursor.write(ternary::DST_SUBREG, dword(ternary::DST_SUBREG, dst_subreg)?)?;
  cursor.write(ternary::DST_REG, dst_reg as u32)?;

  let source_type = sources[0].data_type();
  for (i, source) in sources.iter().enumerate() {
    let (data_type, reg, subreg, addressing, modifier) = match source {
      SourceOperand::Register {
        data_type,
        reg: RegisterReference::Direct { file: RegisterFile::General(n), subreg },
        addressing,
        modifier
      } => (*data_type, *n, *subreg, addressing, modifier),
      _ => return Err(EncodeError::TernaryOperand)
    };
    if data_type != source_type {
      return Err(EncodeError::TernaryDataType(data_type.to_string()));
    }

    let (replicate, swizzle) = match addressing {
      SourceAddressing::Swizzle(swizzle)                       => (false, *swizzle),
      SourceAddressing::Region(region) if region.is_scalar()  => (true, Swizzle::IDENTITY),
      SourceAddressing::Region(_)                              => return Err(EncodeError::TernaryOperand)
    };

    cursor.write_flag(ternary::SRC_ABS[i], modifier.abs())?;
    cursor.write_flag(ternary::SRC_NEGATE[i], modifier.negate())?;
    cursor.write_flag(ternary::rep_control(i), replicate)?;
    cursor.write(ternary::swizzle(i), swizzle.code() as u32)?;
    cursor.write(ternary::subreg(i), dword(ternary::subreg(i), subreg)?)?;
    cursor.write(ternary::reg(i), reg as u32)?;
  }

  let source_code = source_type.ternary_code()
    .ok_or_else(|| EncodeError::TernaryDataType(source_type.to_string()))?;
  cursor.write(ternary::SRC_TYPE, source_code as u32)
}
