//! Bit-level access to instruction words. Instructions are little-endian byte buffers and every
//! field is an inclusive range of bit positions counted from bit 0 of byte 0.

use crate::error::EncodeError;

/// A named, inclusive bit range. Fields are at most 32 bits wide.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct Field {
  pub name : &'static str,
  pub lo   : usize,
  pub hi   : usize,
}

impl Field {
  pub const fn new(name: &'static str, lo: usize, hi: usize) -> Field {
    Field { name, lo, hi }
  }

  pub fn width(&self) -> usize {
    self.hi - self.lo + 1
  }

  /// The largest value the field can hold.
  pub fn max_value(&self) -> u32 {
    ((1u64 << self.width()) - 1) as u32
  }

  /// Reads the field from `bytes`. Bits beyond the end of the buffer read as zero.
  pub fn read(&self, bytes: &[u8]) -> u32 {
    let mut value = 0u64;
    for bit in (self.lo..=self.hi).rev() {
      value <<= 1;
      if let Some(byte) = bytes.get(bit / 8) {
        value |= ((byte >> (bit % 8)) & 1) as u64;
      }
    }
    value as u32
  }

  pub fn read_flag(&self, bytes: &[u8]) -> bool {
    self.read(bytes) != 0
  }

  /// Reads the field as a two's-complement value of the field's width.
  pub fn read_signed(&self, bytes: &[u8]) -> i32 {
    sign_extend(self.read(bytes), self.width())
  }
}

/// Sign-extends the low `bits` bits of `value`.
pub fn sign_extend(value: u32, bits: usize) -> i32 {
  let shift = 32 - bits as u32;
  ((value << shift) as i32) >> shift
}

/**
  Writes fields into an instruction buffer. Every write is checked: a value wider than its field
  or a field that reaches past the end of the buffer is an error, and nothing is written.
*/
pub struct BitCursor<'a> {
  bytes: &'a mut [u8],
}

impl<'a> BitCursor<'a> {
  pub fn new(bytes: &'a mut [u8]) -> BitCursor<'a> {
    BitCursor { bytes }
  }

  pub fn read(&self, field: Field) -> u32 {
    field.read(self.bytes)
  }

  pub fn write(&mut self, field: Field, value: u32) -> Result<(), EncodeError> {
    if field.hi / 8 >= self.bytes.len() {
      return Err(EncodeError::FieldOutOfBounds { field: field.name });
    }
    if value > field.max_value() {
      return Err(EncodeError::FieldOverflow { field: field.name, value: value as u64 });
    }
    for (offset, bit) in (field.lo..=field.hi).enumerate() {
      let byte = &mut self.bytes[bit / 8];
      let mask = 1u8 << (bit % 8);
      match (value >> offset) & 1 {
        0 => *byte &= !mask,
        _ => *byte |= mask
      }
    }
    Ok(())
  }

  pub fn write_flag(&mut self, field: Field, value: bool) -> Result<(), EncodeError> {
    self.write(field, value as u32)
  }

  /// Writes a two's-complement value, checking that it fits in the field's width.
  pub fn write_signed(&mut self, field: Field, value: i32) -> Result<(), EncodeError> {
    let width = field.width();
    let fits = match width {
      32    => true,
      width => {
        let min = -(1i64 << (width - 1));
        let max = (1i64 << (width - 1)) - 1;
        (min..=max).contains(&(value as i64))
      }
    };
    if !fits {
      return Err(EncodeError::FieldOverflow { field: field.name, value: value as u32 as u64 });
    }
    self.write(field, (value as u32) & field.max_value())
  }
}


#[cfg(test)]
mod tests {
  use super::*;

  const LOW: Field = Field::new("low", 0, 6);
  const STRADDLE: Field = Field::new("straddle", 5, 12);

  #[test]
  fn write_then_read(){
    let mut bytes = [0u8; 4];
    let mut cursor = BitCursor::new(&mut bytes);
    cursor.write(LOW, 0x40).unwrap();
    cursor.write(STRADDLE, 0xFF).unwrap();
    assert_eq!(cursor.read(STRADDLE), 0xFF);
    // The straddling write clobbered bits 5 and 6 of the low field.
    assert_eq!(cursor.read(LOW), 0x60);
    assert_eq!(bytes, [0xE0, 0x1F, 0x00, 0x00]);
  }

  #[test]
  fn overflow_is_rejected(){
    let mut bytes = [0u8; 2];
    let mut cursor = BitCursor::new(&mut bytes);
    assert_eq!(
      cursor.write(LOW, 0x80),
      Err(EncodeError::FieldOverflow { field: "low", value: 0x80 })
    );
    let far = Field::new("far", 16, 20);
    assert_eq!(cursor.write(far, 1), Err(EncodeError::FieldOutOfBounds { field: "far" }));
    assert_eq!(bytes, [0, 0]);
  }

  #[test]
  fn signed_fields(){
    let mut bytes = [0u8; 4];
    let field = Field::new("offset", 8, 17);
    let mut cursor = BitCursor::new(&mut bytes);
    cursor.write_signed(field, -512).unwrap();
    assert_eq!(field.read_signed(&bytes), -512);
    let mut cursor = BitCursor::new(&mut bytes);
    assert!(cursor.write_signed(field, 512).is_err());
    assert_eq!(sign_extend(0x1FFF, 13), -1);
    assert_eq!(sign_extend(0x0FFF, 13), 0x0FFF);
    let whole = Field::new("imm", 0, 31);
    let mut cursor = BitCursor::new(&mut bytes);
    cursor.write_signed(whole, -16).unwrap();
    assert_eq!(whole.read(&bytes), 0xFFFF_FFF0);
  }
}
