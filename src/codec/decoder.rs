use num_enum::TryFromPrimitive;
use tracing::trace;

use super::bits::{sign_extend, Field};
use super::compaction::{CompactionTables, HASWELL_TABLES};
use super::layout::{
  common, dest, ternary, FlagFields, SourceFields, COMPACT_LENGTH, DESCRIPTOR_BITS, END_OF_THREAD,
  FILE_ARCH, FILE_GENERAL, FILE_IMMEDIATE, FLAG, IMMEDIATE, JIP, NATIVE_LENGTH, SEND_DESCRIPTOR,
  SRC0, SRC1, UIP,
};
use crate::error::DecodeError;
use crate::isa::{
  hstride_from_code, ConditionalModifier, DataType, DestOperand, ExecSize, FlagReference,
  Immediate, ImmediateType, Instruction, InstructionHeader, MathFunction, MessageDescriptor,
  Opcode, OpcodeClass, Predicate, PredicateMode, RegisterRegion, SharedFunction, SourceModifier,
  SourceOperand, Swizzle, WriteMask,
};
use crate::register::{ArchRegister, RegisterFile, RegisterReference};

/**
  Turns bytes back into instructions. A decoder carries the compaction tables it expands
  compacted instructions with; `Decoder::default()` uses the Haswell tables.
*/
#[derive(Copy, Clone)]
pub struct Decoder {
  tables: &'static CompactionTables,
}

impl Default for Decoder {
  fn default() -> Decoder {
    Decoder::new(&HASWELL_TABLES)
  }
}

fn invalid(field: Field, value: u32) -> DecodeError {
  DecodeError::InvalidField { field: field.name, value }
}

/// Reads a field and converts it through `num_enum`, reporting the field on failure.
fn read_enum<T: TryFromPrimitive<Primitive = u8>>(bytes: &[u8], field: Field) -> Result<T, DecodeError> {
  let value = field.read(bytes);
  T::try_from_primitive(value as u8).map_err(|_| invalid(field, value))
}

impl Decoder {
  pub fn new(tables: &'static CompactionTables) -> Decoder {
    Decoder { tables }
  }

  /// The opcode in the low seven bits of `bytes`, or `None` if it is not an instruction.
  pub fn get_operation(&self, bytes: &[u8]) -> Option<Opcode> {
    bytes.first().and_then(|byte| Opcode::from_code(*byte))
  }

  /**
    The length in bytes of the instruction at the start of `bytes`: zero if it is not an
    instruction, otherwise eight or sixteen. `illegal` is always eight; `nop`, `send`, `sendc` and
    the three-source opcodes are always sixteen; everything else is eight exactly when its
    compaction-control bit is set.
  */
  pub fn determine_length(&self, bytes: &[u8]) -> usize {
    let opcode = match self.get_operation(bytes) {
      Some(opcode) => opcode,
      None         => return 0
    };
    match opcode {
      Opcode::Illegal                      => COMPACT_LENGTH,
      _ if opcode.is_never_compacted()     => NATIVE_LENGTH,
      _ if common::COMPACTION_CONTROL.read_flag(bytes) => COMPACT_LENGTH,
      _                                    => NATIVE_LENGTH
    }
  }

  /// Writes the native form of the instruction at the start of `bytes` into `out` and returns
  /// the number of bytes consumed, or zero if there is no complete instruction.
  pub fn expand(&self, out: &mut [u8; NATIVE_LENGTH], bytes: &[u8]) -> usize {
    let length = self.determine_length(bytes);
    if length == 0 || bytes.len() < length {
      return 0;
    }
    let is_compacted = length == COMPACT_LENGTH && self.get_operation(bytes) != Some(Opcode::Illegal);
    match is_compacted {
      true => match self.tables.expand(&bytes[..COMPACT_LENGTH]) {
        Some(native) => *out = native,
        None         => return 0
      },
      false => {
        *out = [0u8; NATIVE_LENGTH];
        out[..length].copy_from_slice(&bytes[..length]);
      }
    }
    length
  }

  /// Decodes the instruction at the start of `bytes`, returning it with its length in bytes.
  pub fn decode(&self, bytes: &[u8]) -> Result<(Instruction, usize), DecodeError> {
    let opcode = match bytes.first() {
      None       => return Err(DecodeError::Truncated { needed: COMPACT_LENGTH, available: 0 }),
      Some(byte) => self.get_operation(bytes).ok_or(DecodeError::NotAnInstruction(byte & 0x7F))?
    };
    let length = self.determine_length(bytes);
    let mut native = [0u8; NATIVE_LENGTH];
    if self.expand(&mut native, bytes) != length {
      return Err(DecodeError::Truncated { needed: length, available: bytes.len() });
    }
    if opcode == Opcode::Illegal {
      return Ok((Instruction::Null(Opcode::Illegal), length));
    }
    let instruction = decode_native(opcode, &native)?;
    trace!(opcode = %opcode, length, "decoded {}", instruction);
    Ok((instruction, length))
  }
}

fn decode_native(opcode: Opcode, bytes: &[u8]) -> Result<Instruction, DecodeError> {
  let not_class = || invalid(common::OPCODE, opcode.code() as u32);
  let align16   = common::ACCESS_MODE.read_flag(bytes);

  let instruction = match opcode.class() {

    OpcodeClass::Null => Instruction::null(opcode).ok_or_else(not_class)?,

    OpcodeClass::Unary => {
      let header = decode_header(bytes, &FLAG)?;
      let dest   = decode_dest(bytes, align16)?;
      let src0   = decode_source(bytes, &SRC0, align16)?;
      let instruction = Instruction::unary(opcode, header, dest, src0).ok_or_else(not_class)?;
      match decode_condition(bytes)? {
        Some(condition) => instruction.with_cond(condition),
        None            => instruction
      }
    }

    OpcodeClass::Binary => {
      let header = decode_header(bytes, &FLAG)?;
      let dest   = decode_dest(bytes, align16)?;
      let src0   = decode_source(bytes, &SRC0, align16)?;
      let src1   = decode_source(bytes, &SRC1, align16)?;
      let instruction = Instruction::binary(opcode, header, dest, src0, src1).ok_or_else(not_class)?;
      match decode_condition(bytes)? {
        Some(condition) => instruction.with_cond(condition),
        None            => instruction
      }
    }

    OpcodeClass::Ternary => decode_ternary(opcode, bytes)?,

    OpcodeClass::Math => {
      let function: MathFunction = read_enum(bytes, common::FUNCTION_CONTROL)?;
      let src1 = match function.source_count() {
        2 => Some(decode_source(bytes, &SRC1, align16)?),
        _ => None
      };
      Instruction::Math {
        function,
        header : decode_header(bytes, &FLAG)?,
        dest   : decode_dest(bytes, align16)?,
        src0   : decode_source(bytes, &SRC0, align16)?,
        src1
      }
    }

    OpcodeClass::Send => {
      let function: SharedFunction = read_enum(bytes, common::FUNCTION_CONTROL)?;
      let descriptor = match SRC1.file.read(bytes) {
        FILE_IMMEDIATE => {
          MessageDescriptor::Immediate(SEND_DESCRIPTOR.read(bytes) & ((1 << DESCRIPTOR_BITS) - 1))
        }
        _ => MessageDescriptor::AddressRegister
      };
      let instruction = Instruction::send(
        opcode,
        decode_header(bytes, &FLAG)?,
        function,
        descriptor,
        decode_dest(bytes, align16)?,
        decode_source(bytes, &SRC0, align16)?
      ).ok_or_else(not_class)?;
      match END_OF_THREAD.read_flag(bytes) {
        true  => instruction.with_end_of_thread(),
        false => instruction
      }
    }

    OpcodeClass::Branch => {
      Instruction::branch(
        opcode,
        decode_header(bytes, &FLAG)?,
        JIP.read(bytes) as u16 as i16,
        UIP.read(bytes) as u16 as i16
      ).ok_or_else(not_class)?
    }

  };
  Ok(instruction)
}

fn decode_header(bytes: &[u8], flag: &FlagFields) -> Result<InstructionHeader, DecodeError> {
  let align16   = common::ACCESS_MODE.read_flag(bytes);
  let exec_size: ExecSize = read_enum(bytes, common::EXEC_SIZE)?;
  let control   = common::PREDICATE_CONTROL.read(bytes);
  let mode      = PredicateMode::from_code(control as u8, align16)
    .ok_or_else(|| invalid(common::PREDICATE_CONTROL, control))?;

  Ok(InstructionHeader {
    exec_size,
    predicate           : Predicate::new(mode, common::PREDICATE_INVERT.read_flag(bytes)),
    flag                : FlagReference::new(
                            flag.reg.read(bytes) as u8,
                            flag.subreg.read(bytes) as u8
                          ),
    no_dependency_check : common::NO_DD_CHECK.read_flag(bytes)
  })
}

fn decode_condition(bytes: &[u8]) -> Result<Option<ConditionalModifier>, DecodeError> {
  match common::FUNCTION_CONTROL.read(bytes) {
    0 => Ok(None),
    _ => read_enum(bytes, common::FUNCTION_CONTROL).map(Some)
  }
}

fn decode_file(file_field: Field, reg_field: Field, bytes: &[u8]) -> Result<RegisterFile, DecodeError> {
  let number = reg_field.read(bytes);
  match file_field.read(bytes) {
    FILE_GENERAL => Ok(RegisterFile::General(number as u8)),
    FILE_ARCH    => {
      ArchRegister::try_from_primitive(number as u8)
        .map(RegisterFile::Arch)
        .map_err(|_| invalid(reg_field, number))
    }
    code => Err(invalid(file_field, code))
  }
}

fn decode_indirect_offset(bytes: &[u8], field: Field) -> i16 {
  sign_extend(field.read(bytes), field.width()) as i16
}

fn decode_dest(bytes: &[u8], align16: bool) -> Result<DestOperand, DecodeError> {
  let data_type: DataType = read_enum(bytes, dest::TYPE)?;

  if dest::ADDRESS_MODE.read_flag(bytes) {
    let reg = RegisterReference::Indirect {
      offset         : decode_indirect_offset(bytes, dest::INDIRECT_IMMEDIATE),
      address_subreg : dest::INDIRECT_SUBREG.read(bytes) as u8
    };
    return Ok(DestOperand::new(data_type, reg).with_hstride(hstride_from_code(dest::HSTRIDE.read(bytes) as u8)));
  }

  let file = decode_file(dest::FILE, dest::REG, bytes)?;
  let operand = match align16 {
    true => {
      let subreg = dest::ALIGN16_SUBREG.read(bytes) as u8 * 16;
      DestOperand::new(data_type, RegisterReference::Direct { file, subreg })
        .with_write_mask(WriteMask(dest::WRITE_MASK.read(bytes) as u8))
    }
    false => {
      let subreg = dest::SUBREG.read(bytes) as u8;
      DestOperand::new(data_type, RegisterReference::Direct { file, subreg })
        .with_hstride(hstride_from_code(dest::HSTRIDE.read(bytes) as u8))
    }
  };
  Ok(operand)
}

fn decode_region(bytes: &[u8], fields: &SourceFields) -> Result<RegisterRegion, DecodeError> {
  let vstride = fields.vstride.read(bytes);
  let width   = fields.width.read(bytes);
  let hstride = fields.hstride.read(bytes);
  RegisterRegion::from_codes(vstride as u8, width as u8, hstride as u8).ok_or_else(|| {
    match RegisterRegion::from_codes(vstride as u8, 0, 0) {
      None    => invalid(fields.vstride, vstride),
      Some(_) => invalid(fields.width, width)
    }
  })
}

fn decode_source(bytes: &[u8], fields: &SourceFields, align16: bool) -> Result<SourceOperand, DecodeError> {
  if fields.file.read(bytes) == FILE_IMMEDIATE {
    let immediate_type: ImmediateType = read_enum(bytes, fields.data_type)?;
    return Ok(SourceOperand::Immediate(Immediate::from_bits(immediate_type, IMMEDIATE.read(bytes))));
  }

  let data_type: DataType = read_enum(bytes, fields.data_type)?;
  let modifier = SourceModifier::from_bits(fields.abs.read_flag(bytes), fields.negate.read_flag(bytes));

  let operand = if fields.address_mode.read_flag(bytes) {
    let reg = RegisterReference::Indirect {
      offset         : decode_indirect_offset(bytes, fields.indirect_immediate),
      address_subreg : fields.indirect_subreg.read(bytes) as u8
    };
    SourceOperand::register(data_type, reg, decode_region(bytes, fields)?)
  } else {
    let file = decode_file(fields.file, fields.reg, bytes)?;
    match align16 {
      true => {
        let code = fields.swizzle_x.read(bytes)
          | fields.swizzle_y.read(bytes) << 2
          | fields.swizzle_z.read(bytes) << 4
          | fields.swizzle_w.read(bytes) << 6;
        let subreg = fields.align16_subreg.read(bytes) as u8 * 16;
        SourceOperand::swizzled(
          data_type,
          RegisterReference::Direct { file, subreg },
          Swizzle::from_code(code as u8)
        )
      }
      false => {
        let subreg = fields.subreg.read(bytes) as u8;
        SourceOperand::register(
          data_type,
          RegisterReference::Direct { file, subreg },
          decode_region(bytes, fields)?
        )
      }
    }
  };
  Ok(operand.with_modifier(modifier))
}

fn decode_ternary(opcode: Opcode, bytes: &[u8]) -> Result<Instruction, DecodeError> {
  let ternary_type = |field: Field| {
    let code = field.read(bytes);
    DataType::from_ternary_code(code as u8).ok_or_else(|| invalid(field, code))
  };

  let dest_reg = RegisterReference::general_at(
    ternary::DST_REG.read(bytes) as u8,
    ternary::DST_SUBREG.read(bytes) as u8 * 4
  );
  let dest = DestOperand::new(ternary_type(ternary::DST_TYPE)?, dest_reg)
    .with_write_mask(WriteMask(ternary::DST_WRITE_MASK.read(bytes) as u8));

  let source_type = ternary_type(ternary::SRC_TYPE)?;
  let source = |i: usize| {
    let reg = RegisterReference::general_at(
      ternary::reg(i).read(bytes) as u8,
      ternary::subreg(i).read(bytes) as u8 * 4
    );
    let operand = match ternary::rep_control(i).read_flag(bytes) {
      true  => SourceOperand::register(source_type, reg, RegisterRegion::SCALAR),
      false => {
        SourceOperand::swizzled(source_type, reg, Swizzle::from_code(ternary::swizzle(i).read(bytes) as u8))
      }
    };
    operand.with_modifier(SourceModifier::from_bits(
      ternary::SRC_ABS[i].read_flag(bytes),
      ternary::SRC_NEGATE[i].read_flag(bytes)
    ))
  };

  Instruction::ternary(opcode, decode_header(bytes, &ternary::FLAG)?, dest, [source(0), source(1), source(2)])
    .ok_or_else(|| invalid(common::OPCODE, opcode.code() as u32))
}


#[cfg(test)]
mod tests {
  use super::*;
  use crate::codec::encoder::encode_instruction;

  fn header8() -> InstructionHeader {
    InstructionHeader::new(ExecSize::Simd8)
  }

  fn round_trip(instruction: Instruction) {
    let bytes = encode_instruction(&instruction).unwrap();
    let decoder = Decoder::default();
    assert_eq!(decoder.decode(&bytes), Ok((instruction, NATIVE_LENGTH)));
  }

  #[test]
  fn lengths(){
    let decoder = Decoder::default();
    assert_eq!(decoder.determine_length(&[0x7F; 16]), 0);
    assert_eq!(decoder.determine_length(&[]), 0);
    assert_eq!(decoder.determine_length(&[0x00; 16]), 8);
    assert_eq!(decoder.determine_length(&[0x01, 0, 0, 0x20, 0, 0, 0, 0]), 8);
    assert_eq!(decoder.determine_length(&[0x01, 0, 0, 0x00, 0, 0, 0, 0]), 16);
    // Sends ignore the compaction bit.
    assert_eq!(decoder.determine_length(&[0x31, 0, 0, 0x20, 0, 0, 0, 0]), 16);
    assert_eq!(decoder.determine_length(&[0x5B, 0, 0, 0x20, 0, 0, 0, 0]), 16);
  }

  #[test]
  fn decode_errors(){
    let decoder = Decoder::default();
    assert_eq!(decoder.decode(&[0x0B; 16]), Err(DecodeError::NotAnInstruction(0x0B)));
    assert_eq!(
      decoder.decode(&[0x40, 0, 0, 0, 0, 0, 0, 0]),
      Err(DecodeError::Truncated { needed: 16, available: 8 })
    );
    assert_eq!(decoder.decode(&[]), Err(DecodeError::Truncated { needed: 8, available: 0 }));
    assert_eq!(
      decoder.decode(&[0x40, 0x4B, 0x02, 0x20]),
      Err(DecodeError::Truncated { needed: 8, available: 4 })
    );
    assert_eq!(decoder.decode(&[0x00; 8]), Ok((Instruction::Null(Opcode::Illegal), 8)));

    // A vstride code of 7 is reserved.
    let mut bytes = [0u8; 16];
    bytes[0] = Opcode::Mov.code();
    bytes[4] = 0x21;
    bytes[10] = 0xE0;
    assert_eq!(
      decoder.decode(&bytes),
      Err(DecodeError::InvalidField { field: "src0.vstride", value: 7 })
    );
  }

  #[test]
  fn compacted_add(){
    let decoder = Decoder::default();
    let compacted = [0x40, 0x4B, 0x02, 0x20, 0xE7, 0x02, 0x03, 0x04];
    let (instruction, length) = decoder.decode(&compacted).unwrap();
    assert_eq!(length, 8);
    let expected = Instruction::binary(
      Opcode::Add,
      header8(),
      DestOperand::new(DataType::F, RegisterReference::general(2)),
      SourceOperand::register(DataType::F, RegisterReference::general(3), RegisterRegion::new(8, 8, 1)),
      SourceOperand::register(DataType::F, RegisterReference::general(4), RegisterRegion::new(8, 8, 1)),
    ).unwrap();
    assert_eq!(instruction, expected);

    let mut native = [0u8; NATIVE_LENGTH];
    assert_eq!(decoder.expand(&mut native, &compacted), 8);
    assert_eq!(native, encode_instruction(&expected).unwrap());
  }

  #[test]
  fn compacted_immediate(){
    let decoder = Decoder::default();
    let (instruction, _) = decoder.decode(&[0x40, 0x6B, 0x01, 0x20, 0xFF, 0x02, 0x03, 0xF0]).unwrap();
    match instruction {
      Instruction::Binary { src1, .. } => {
        assert_eq!(src1, SourceOperand::Immediate(Immediate::UD(0xFFFF_FFF0)));
      }
      other => panic!("decoded {:?}", other)
    }
  }

  #[test]
  fn round_trips(){
    let dest = DestOperand::new(DataType::F, RegisterReference::general(2));

    round_trip(
      Instruction::unary(
        Opcode::Mov,
        header8().with_predicate(Predicate::new(PredicateMode::Sequential, true), FlagReference::new(0, 1)),
        dest.with_hstride(2),
        SourceOperand::register(DataType::F, RegisterReference::general_at(3, 8), RegisterRegion::SCALAR)
          .with_modifier(SourceModifier::NegateAbs)
      ).unwrap()
    );

    round_trip(
      Instruction::binary(
        Opcode::Cmp,
        header8(),
        DestOperand::null(DataType::F),
        SourceOperand::register(
          DataType::D,
          RegisterReference::Indirect { offset: -32, address_subreg: 2 },
          RegisterRegion::new(8, 8, 1)
        ),
        SourceOperand::Immediate(Immediate::V([0, 1, 2, 3, -1, -2, -3, -4]))
      ).unwrap().with_cond(ConditionalModifier::GreaterEqual)
    );

    round_trip(
      Instruction::binary(
        Opcode::Add,
        header8(),
        dest.with_write_mask(WriteMask(0b0011)),
        SourceOperand::swizzled(DataType::F, RegisterReference::general_at(3, 16), Swizzle::IDENTITY),
        SourceOperand::swizzled(DataType::F, RegisterReference::general(4), Swizzle::parse("wzyx").unwrap())
      ).unwrap()
    );

    round_trip(Instruction::Math {
      function : MathFunction::IntDivQuotient,
      header   : header8(),
      dest     : DestOperand::new(DataType::D, RegisterReference::general(6)),
      src0     : SourceOperand::register(DataType::D, RegisterReference::general(7), RegisterRegion::new(8, 8, 1)),
      src1     : Some(SourceOperand::Immediate(Immediate::D(-3)))
    });

    round_trip(
      Instruction::ternary(
        Opcode::Mad,
        header8().with_predicate(Predicate::new(PredicateMode::Sequential, true), FlagReference::new(1, 0)),
        dest.with_write_mask(WriteMask(0b0101)),
        [
          SourceOperand::register(DataType::F, RegisterReference::general(3), RegisterRegion::SCALAR),
          SourceOperand::swizzled(DataType::F, RegisterReference::general_at(4, 4), Swizzle::IDENTITY)
            .with_modifier(SourceModifier::Negate),
          SourceOperand::swizzled(DataType::F, RegisterReference::general(5), Swizzle::parse("x").unwrap()),
        ]
      ).unwrap()
    );

    round_trip(
      Instruction::send(
        Opcode::Send,
        header8(),
        SharedFunction::DataCache,
        MessageDescriptor::AddressRegister,
        DestOperand::new(DataType::UD, RegisterReference::general(10)),
        SourceOperand::register(DataType::UD, RegisterReference::general(11), RegisterRegion::new(8, 8, 1))
      ).unwrap()
    );

    round_trip(Instruction::branch(Opcode::While, header8(), -48, 16).unwrap());
    round_trip(Instruction::Null(Opcode::Nop));
  }
}
