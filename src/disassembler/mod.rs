/*!
  Walks a byte buffer one instruction at a time. `Listing` yields each decoded instruction with
  its offset and length; `disassemble` renders the listing, one line per instruction, into a
  `TextSink`. Both stop at the first byte sequence that is not a complete instruction.
*/

mod format;

use crate::codec::Decoder;
use crate::error::{DecodeError, DisassemblyError, TextSink};
use crate::isa::Instruction;

pub use format::SourceText;

/// One decoded instruction and where it came from.
#[derive(Clone, PartialEq, Debug)]
pub struct ListingEntry {
  pub offset      : usize,
  /// 8 for a compacted instruction, 16 for a native one.
  pub length      : usize,
  pub instruction : Instruction,
}

pub struct Listing<'d, 'b> {
  decoder : &'d Decoder,
  bytes   : &'b [u8],
  offset  : usize,
  failed  : bool,
}

impl<'d, 'b> Listing<'d, 'b> {
  pub fn new(decoder: &'d Decoder, bytes: &'b [u8]) -> Listing<'d, 'b> {
    Listing { decoder, bytes, offset: 0, failed: false }
  }

  fn fail(&mut self, error: DisassemblyError) -> Option<Result<ListingEntry, DisassemblyError>> {
    self.failed = true;
    Some(Err(error))
  }
}

impl<'d, 'b> Iterator for Listing<'d, 'b> {
  type Item = Result<ListingEntry, DisassemblyError>;

  fn next(&mut self) -> Option<Self::Item> {
    if self.failed || self.offset >= self.bytes.len() {
      return None;
    }
    let offset    = self.offset;
    let remaining = &self.bytes[offset..];

    let length = self.decoder.determine_length(remaining);
    if length == 0 {
      let source = DecodeError::NotAnInstruction(remaining[0] & 0x7F);
      return self.fail(DisassemblyError::Decode { offset, source });
    }
    if length > remaining.len() {
      return self.fail(DisassemblyError::Overrun { offset, length, available: remaining.len() });
    }

    match self.decoder.decode(remaining) {
      Ok((instruction, length)) => {
        self.offset += length;
        Some(Ok(ListingEntry { offset, length, instruction }))
      }
      Err(source) => self.fail(DisassemblyError::Decode { offset, source })
    }
  }
}

/**
  Pushes one line per instruction in `bytes` to `printer` and returns how many there were. On
  failure the lines rendered so far stay in the printer, followed by an `error:` line.
*/
pub fn disassemble<P>(printer: &mut P, decoder: &Decoder, bytes: &[u8]) -> Result<usize, DisassemblyError>
  where P: TextSink + ?Sized
{
  let mut count = 0;
  for entry in Listing::new(decoder, bytes) {
    match entry {
      Ok(entry) => {
        printer.push(&entry.instruction.to_string());
        count += 1;
      }
      Err(error) => {
        printer.push(&format!("error: {}", error));
        return Err(error);
      }
    }
  }
  Ok(count)
}
