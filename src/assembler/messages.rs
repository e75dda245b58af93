/*!
  The catalogue of `send` messages the assembler knows by name. A message fixes the recipient
  shared function and every descriptor field except the binding-table index, which comes from a
  `bind` declaration. The disassembler uses the same catalogue in reverse to name the messages it
  recognizes.

  Descriptor layout (bits of the 29-bit descriptor):

    Message length:      25-28  (registers of payload)
    Response length:     20-24  (registers written back)
    Header present:      19
    Message type:        14-18
    Message control:      8-13
    Binding table index:  0-7
*/

use std::collections::HashMap;

use lazy_static::lazy_static;

use crate::codec::{BitCursor, Field};
use crate::error::EncodeError;
use crate::isa::{ExecSize, SharedFunction};

const MESSAGE_LENGTH: Field  = Field::new("message_length", 25, 28);
const RESPONSE_LENGTH: Field = Field::new("response_length", 20, 24);
const HEADER_PRESENT: Field  = Field::new("header_present", 19, 19);
const MESSAGE_TYPE: Field    = Field::new("message_type", 14, 18);
const MESSAGE_CONTROL: Field = Field::new("message_control", 8, 13);
const BINDING_INDEX: Field   = Field::new("binding_table_index", 0, 7);

// Data cache message types.
const OWORD_BLOCK_READ: u32       = 0;
const DWORD_SCATTERED_READ: u32   = 3;
const OWORD_BLOCK_WRITE: u32      = 8;
const DWORD_SCATTERED_WRITE: u32  = 11;
// Data cache 1 message types.
const UNTYPED_SURFACE_WRITE: u32  = 9;

/// Only the red channel of an untyped surface write is enabled; the mask lists disabled channels.
const UNTYPED_RED_ONLY: u32 = 0xE;

/// The fields of a message descriptor, unpacked.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub struct DescriptorFields {
  pub message_length  : u32,
  pub response_length : u32,
  pub header_present  : bool,
  pub message_type    : u32,
  pub control         : u32,
  pub binding         : u32,
}

impl DescriptorFields {
  pub fn unpack(descriptor: u32) -> DescriptorFields {
    let bytes = descriptor.to_le_bytes();
    DescriptorFields {
      message_length  : MESSAGE_LENGTH.read(&bytes),
      response_length : RESPONSE_LENGTH.read(&bytes),
      header_present  : HEADER_PRESENT.read_flag(&bytes),
      message_type    : MESSAGE_TYPE.read(&bytes),
      control         : MESSAGE_CONTROL.read(&bytes),
      binding         : BINDING_INDEX.read(&bytes),
    }
  }

  pub fn pack(&self) -> Result<u32, EncodeError> {
    let mut bytes = [0u8; 4];
    let mut cursor = BitCursor::new(&mut bytes);
    cursor.write(MESSAGE_LENGTH, self.message_length)?;
    cursor.write(RESPONSE_LENGTH, self.response_length)?;
    cursor.write_flag(HEADER_PRESENT, self.header_present)?;
    cursor.write(MESSAGE_TYPE, self.message_type)?;
    cursor.write(MESSAGE_CONTROL, self.control)?;
    cursor.write(BINDING_INDEX, self.binding)?;
    Ok(u32::from_le_bytes(bytes))
  }
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct Message {
  pub name            : &'static str,
  /// The name without its size suffix, which is what the disassembler prints.
  pub family          : &'static str,
  pub function        : SharedFunction,
  pub exec_size       : ExecSize,
  pub message_type    : u32,
  pub control         : u32,
  pub message_length  : u32,
  pub response_length : u32,
  pub header_present  : bool,
}

impl Message {
  pub fn descriptor(&self, binding: u32) -> Result<u32, EncodeError> {
    DescriptorFields {
      message_length  : self.message_length,
      response_length : self.response_length,
      header_present  : self.header_present,
      message_type    : self.message_type,
      control         : self.control,
      binding,
    }.pack()
  }

  /// Whether `fields` could have been produced by this message.
  fn matches(&self, function: SharedFunction, fields: &DescriptorFields) -> bool {
    self.function == function
      && self.message_type == fields.message_type
      && self.control == fields.control
      && self.message_length == fields.message_length
      && self.response_length == fields.response_length
  }
}

/// Oword block messages carry a one-register header with the offset; `owords` is 2, 4 or 8.
fn oword_block(name: &'static str, family: &'static str, owords: u32, write: bool) -> Message {
  let control = match owords {
    2 => 2,
    4 => 3,
    _ => 4
  };
  let data_registers = owords / 2;
  Message {
    name,
    family,
    function        : SharedFunction::DataCache,
    exec_size       : ExecSize::Simd8,
    message_type    : if write { OWORD_BLOCK_WRITE } else { OWORD_BLOCK_READ },
    control,
    message_length  : if write { 1 + data_registers } else { 1 },
    response_length : if write { 0 } else { data_registers },
    header_present  : true,
  }
}

/// Scattered messages take one register of addresses per eight lanes and no header.
fn dword_scattered(name: &'static str, family: &'static str, lanes: u8, write: bool) -> Message {
  let (exec_size, control, registers) = match lanes {
    8 => (ExecSize::Simd8, 2, 1),
    _ => (ExecSize::Simd16, 3, 2)
  };
  Message {
    name,
    family,
    function        : SharedFunction::DataCache,
    exec_size,
    message_type    : if write { DWORD_SCATTERED_WRITE } else { DWORD_SCATTERED_READ },
    control,
    message_length  : if write { 2 * registers } else { registers },
    response_length : if write { 0 } else { registers },
    header_present  : false,
  }
}

fn untyped_write(name: &'static str, lanes: u8) -> Message {
  // SIMD mode lives in the top two control bits: 1 is SIMD16, 2 is SIMD8.
  let (exec_size, simd_mode, registers) = match lanes {
    8 => (ExecSize::Simd8, 2, 1),
    _ => (ExecSize::Simd16, 1, 2)
  };
  Message {
    name,
    family          : "untyped_write",
    function        : SharedFunction::DataCache1,
    exec_size,
    message_type    : UNTYPED_SURFACE_WRITE,
    control         : (simd_mode << 4) | UNTYPED_RED_ONLY,
    message_length  : 2 * registers,
    response_length : 0,
    header_present  : false,
  }
}

lazy_static! {
  static ref MESSAGES: Vec<Message> = vec![
    oword_block("oword_block_read_2", "oword_block_read", 2, false),
    oword_block("oword_block_read_4", "oword_block_read", 4, false),
    oword_block("oword_block_read_8", "oword_block_read", 8, false),
    oword_block("oword_block_write_2", "oword_block_write", 2, true),
    oword_block("oword_block_write_4", "oword_block_write", 4, true),
    oword_block("oword_block_write_8", "oword_block_write", 8, true),
    dword_scattered("dword_scattered_read_8", "dword_scattered_read", 8, false),
    dword_scattered("dword_scattered_read_16", "dword_scattered_read", 16, false),
    dword_scattered("dword_scattered_write_8", "dword_scattered_write", 8, true),
    dword_scattered("dword_scattered_write_16", "dword_scattered_write", 16, true),
    untyped_write("untyped_write_8", 8),
    untyped_write("untyped_write_16", 16),
  ];

  static ref MESSAGES_BY_NAME: HashMap<&'static str, &'static Message> =
    MESSAGES.iter().map(|message| (message.name, message)).collect();
}

pub fn find_message(name: &str) -> Option<&'static Message> {
  MESSAGES_BY_NAME.get(name).copied()
}

/// The catalogued message a descriptor was built from, if any.
pub fn identify_message(function: SharedFunction, descriptor: u32) -> Option<&'static Message> {
  let fields = DescriptorFields::unpack(descriptor);
  MESSAGES.iter().find(|message| message.matches(function, &fields))
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn scattered_write_descriptor(){
    let message = find_message("dword_scattered_write_8").unwrap();
    let descriptor = message.descriptor(0x38).unwrap();
    assert_eq!(descriptor, (2 << 25) | (11 << 14) | (2 << 8) | 0x38);
    assert_eq!(identify_message(SharedFunction::DataCache, descriptor), Some(message));
    assert_eq!(message.exec_size, ExecSize::Simd8);
  }

  #[test]
  fn oword_block_read_has_header(){
    let message = find_message("oword_block_read_8").unwrap();
    let fields = DescriptorFields::unpack(message.descriptor(3).unwrap());
    assert!(fields.header_present);
    assert_eq!(fields.message_length, 1);
    assert_eq!(fields.response_length, 4);
    assert_eq!(fields.control, 4);
    assert_eq!(fields.binding, 3);
  }

  #[test]
  fn untyped_write_uses_second_data_cache(){
    let message = find_message("untyped_write_16").unwrap();
    assert_eq!(message.function, SharedFunction::DataCache1);
    let descriptor = message.descriptor(1).unwrap();
    assert_eq!((descriptor >> 8) & 0x3F, 0x1E);
    assert_eq!(identify_message(SharedFunction::DataCache, descriptor), None);
    assert_eq!(identify_message(SharedFunction::DataCache1, descriptor), Some(message));
  }

  #[test]
  fn unknown_messages(){
    assert!(find_message("dword_scattered_write_4").is_none());
    // The end-of-thread message is not catalogued.
    assert_eq!(identify_message(SharedFunction::ThreadSpawner, 0x0200_0010), None);
  }

  #[test]
  fn binding_must_fit(){
    let message = find_message("untyped_write_8").unwrap();
    assert!(message.descriptor(0x100).is_err());
  }
}
