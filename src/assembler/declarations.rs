/*!
  Register declarations. Declarations accumulate in a `Declarations` builder until the program
  body begins, at which point the builder is frozen into an immutable `RegisterLayout`:

    r0          dispatch header (never allocated)
    r1 ...      `curbe` blocks, in declaration order
    ...         `reg` blocks, in declaration order
    r127        end-of-thread payload (never allocated)

  The CURBE image is the concatenation of the `curbe` blocks' initializers, one 32-byte register
  per block element, zero-filled where a block has fewer initializer groups than registers.
*/

use bimap::BiMap;
use string_cache::DefaultAtom;

use crate::error::AssemblyErrorKind;
use crate::register::{ArchRegister, RegisterFile, EOT_PAYLOAD_REGISTER, GENERAL_REGISTER_LIMIT, REGISTER_BYTES};
use super::ast::Number;

pub const MAX_THREADS: u64 = 64;

#[derive(Clone, Debug)]
enum BlockKind {
  /// The block's initialized bytes, `size * 32` long.
  Curbe(Vec<u8>),
  Reg,
}

#[derive(Clone, Debug)]
struct Declared {
  name : DefaultAtom,
  size : u32,
  kind : BlockKind,
}

/// Collects declarations while the program header is being read.
#[derive(Clone, Debug)]
pub struct Declarations {
  declared : Vec<Declared>,
  bindings : BiMap<DefaultAtom, u32>,
  threads  : u32,
}

impl Declarations {
  pub fn new() -> Declarations {
    Declarations {
      declared : Vec::new(),
      bindings : BiMap::new(),
      threads  : 1
    }
  }

  fn check_name(&self, name: &str, size: u32) -> Result<DefaultAtom, AssemblyErrorKind> {
    if is_reserved_name(name) {
      return Err(AssemblyErrorKind::ReservedName(name.to_string()));
    }
    if size == 0 {
      return Err(AssemblyErrorKind::EmptyDeclaration(name.to_string()));
    }
    // r0 and r127 are never allocated.
    if size >= GENERAL_REGISTER_LIMIT as u32 {
      return Err(AssemblyErrorKind::OutOfRegisters);
    }
    let atom = DefaultAtom::from(name);
    if self.declared.iter().any(|declared| declared.name == atom) {
      return Err(AssemblyErrorKind::DuplicateName(name.to_string()));
    }
    Ok(atom)
  }

  /// Declares `size` registers of constant data. Each group initializes one register; integers
  /// are stored as 32-bit little-endian words, floats as `f32`.
  pub fn declare_curbe(&mut self, name: &str, size: u32, groups: &[Vec<Number>])
    -> Result<(), AssemblyErrorKind>
  {
    let atom = self.check_name(name, size)?;
    if groups.len() > size as usize {
      return Err(AssemblyErrorKind::TooManyInitializers {
        name: name.to_string(),
        size,
        groups: groups.len()
      });
    }

    let mut data = vec![0u8; size as usize * REGISTER_BYTES];
    for (index, group) in groups.iter().enumerate() {
      let bytes = group.len() * 4;
      if bytes > REGISTER_BYTES {
        return Err(AssemblyErrorKind::CurbeOverflow(bytes));
      }
      for (item_index, item) in group.iter().enumerate() {
        let offset = index * REGISTER_BYTES + item_index * 4;
        data[offset..offset + 4].copy_from_slice(&word_bytes(item)?);
      }
    }

    self.declared.push(Declared { name: atom, size, kind: BlockKind::Curbe(data) });
    Ok(())
  }

  pub fn declare_reg(&mut self, name: &str, size: u32) -> Result<(), AssemblyErrorKind> {
    let atom = self.check_name(name, size)?;
    self.declared.push(Declared { name: atom, size, kind: BlockKind::Reg });
    Ok(())
  }

  /// Binds a name to a binding-table index. Names and indices are both unique.
  pub fn bind(&mut self, name: &str, index: u64) -> Result<(), AssemblyErrorKind> {
    if index > 0xFF {
      return Err(AssemblyErrorKind::BindingIndexRange(index));
    }
    let index = index as u32;
    let atom = DefaultAtom::from(name);
    if self.bindings.contains_left(&atom) {
      return Err(AssemblyErrorKind::DuplicateName(name.to_string()));
    }
    if let Some(existing) = self.bindings.get_by_right(&index) {
      return Err(AssemblyErrorKind::DuplicateBinding { name: existing.to_string(), index });
    }
    self.bindings.insert(atom, index);
    Ok(())
  }

  pub fn set_threads(&mut self, count: u64) -> Result<(), AssemblyErrorKind> {
    if count == 0 || count > MAX_THREADS {
      return Err(AssemblyErrorKind::InvalidThreadCount(count.min(u32::MAX as u64) as u32));
    }
    self.threads = count as u32;
    Ok(())
  }

  /// Assigns registers: CURBE blocks first, starting at r1, then `reg` blocks.
  pub fn freeze(self) -> Result<RegisterLayout, AssemblyErrorKind> {
    let mut ordered: Vec<&Declared> =
      self.declared.iter().filter(|d| matches!(d.kind, BlockKind::Curbe(_))).collect();
    ordered.extend(self.declared.iter().filter(|d| matches!(d.kind, BlockKind::Reg)));

    let mut next = 1u32;
    let mut blocks = Vec::with_capacity(ordered.len());
    let mut curbe  = Vec::new();
    for declared in ordered {
      match next.checked_add(declared.size) {
        Some(end) if end <= GENERAL_REGISTER_LIMIT as u32 => {}
        _ => return Err(AssemblyErrorKind::OutOfRegisters)
      }
      blocks.push(RegisterBlock { name: declared.name.clone(), base: next as u8, size: declared.size });
      if let BlockKind::Curbe(data) = &declared.kind {
        curbe.extend_from_slice(data);
      }
      next += declared.size;
    }

    Ok(RegisterLayout {
      blocks,
      curbe,
      bindings : self.bindings,
      threads  : self.threads
    })
  }
}

impl Default for Declarations {
  fn default() -> Declarations {
    Declarations::new()
  }
}

/// Architectural names, `r`, and `r` followed by digits would shadow registers.
fn is_reserved_name(name: &str) -> bool {
  ArchRegister::from_name(name).is_some() || general_register_number(name).is_some() || name == "r"
}

/// The number in `rN`, if `name` has that form.
fn general_register_number(name: &str) -> Option<u32> {
  let digits = name.strip_prefix('r')?;
  if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
    return None;
  }
  Some(digits.parse::<u32>().unwrap_or(u32::MAX))
}

fn word_bytes(item: &Number) -> Result<[u8; 4], AssemblyErrorKind> {
  match *item {
    Number::Float(value) => Ok((value as f32).to_le_bytes()),
    Number::Integer(value) if value >= i32::MIN as i64 && value <= u32::MAX as i64 => {
      Ok((value as u32).to_le_bytes())
    }
    Number::Integer(value) => Err(AssemblyErrorKind::ImmediateRange(value.to_string(), "u".to_string()))
  }
}

/// A named run of consecutive general registers.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct RegisterBlock {
  pub name : DefaultAtom,
  pub base : u8,
  pub size : u32,
}

/// The frozen register allocation, CURBE image and bind table of a program.
#[derive(Clone, Debug)]
pub struct RegisterLayout {
  blocks   : Vec<RegisterBlock>,
  curbe    : Vec<u8>,
  bindings : BiMap<DefaultAtom, u32>,
  threads  : u32,
}

impl RegisterLayout {
  /**
    Resolves a register name. Architectural names win, then declared names by longest prefix
    with an optional decimal element index (`Foo3` is the fourth register of `Foo`), then `rN`.
  */
  pub fn resolve(&self, name: &str) -> Result<RegisterFile, AssemblyErrorKind> {
    if let Some(register) = ArchRegister::from_name(name) {
      return Ok(RegisterFile::Arch(register));
    }
    if let Some(resolved) = self.resolve_declared(name) {
      return resolved.map(RegisterFile::General);
    }
    match general_register_number(name) {
      Some(number) if number == EOT_PAYLOAD_REGISTER as u32 => Err(AssemblyErrorKind::ReservedRegister),
      Some(number) if number < GENERAL_REGISTER_LIMIT as u32 => Ok(RegisterFile::General(number as u8)),
      _ => Err(AssemblyErrorKind::UndefinedRegister(name.to_string()))
    }
  }

  fn resolve_declared(&self, name: &str) -> Option<Result<u8, AssemblyErrorKind>> {
    let block = self.blocks
      .iter()
      .filter(|block| {
        name.strip_prefix(&*block.name)
            .map_or(false, |index| index.chars().all(|c| c.is_ascii_digit()))
      })
      .max_by_key(|block| block.name.len())?;

    let digits = &name[block.name.len()..];
    let index = match digits {
      "" => 0,
      digits => digits.parse::<u32>().unwrap_or(u32::MAX)
    };
    if index >= block.size {
      return Some(Err(AssemblyErrorKind::IndexOutOfRange {
        name: block.name.to_string(),
        index,
        size: block.size
      }));
    }
    Some(Ok(block.base + index as u8))
  }

  pub fn binding(&self, name: &str) -> Option<u32> {
    self.bindings.get_by_left(&DefaultAtom::from(name)).copied()
  }

  pub fn binding_name(&self, index: u32) -> Option<&str> {
    self.bindings.get_by_right(&index).map(|atom| &**atom)
  }

  pub fn bindings(&self) -> &BiMap<DefaultAtom, u32> {
    &self.bindings
  }

  pub fn blocks(&self) -> &[RegisterBlock] {
    &self.blocks
  }

  pub fn curbe(&self) -> &[u8] {
    &self.curbe
  }

  pub fn curbe_registers(&self) -> usize {
    self.curbe.len() / REGISTER_BYTES
  }

  pub fn thread_count(&self) -> u32 {
    self.threads
  }
}


#[cfg(test)]
mod tests {
  use super::*;

  fn integers(values: &[i64]) -> Vec<Number> {
    values.iter().map(|v| Number::Integer(*v)).collect()
  }

  #[test]
  fn curbe_precedes_regs(){
    let mut declarations = Declarations::new();
    declarations.declare_reg("out", 2).unwrap();
    declarations.declare_curbe("C", 1, &[integers(&[1, 2, 3, 4, 5, 6, 7, 8])]).unwrap();
    let layout = declarations.freeze().unwrap();

    assert_eq!(layout.resolve("C"), Ok(RegisterFile::General(1)));
    assert_eq!(layout.resolve("out"), Ok(RegisterFile::General(2)));
    assert_eq!(layout.resolve("out1"), Ok(RegisterFile::General(3)));
    assert_eq!(layout.curbe_registers(), 1);
    assert_eq!(&layout.curbe()[..8], &[1, 0, 0, 0, 2, 0, 0, 0]);
    assert_eq!(&layout.curbe()[28..], &[8, 0, 0, 0]);
  }

  #[test]
  fn curbe_words(){
    let mut declarations = Declarations::new();
    let groups = vec![vec![Number::Float(1.0), Number::Integer(-1)], vec![]];
    declarations.declare_curbe("K", 3, &groups).unwrap();
    let layout = declarations.freeze().unwrap();
    assert_eq!(layout.curbe().len(), 96);
    assert_eq!(&layout.curbe()[..8], &[0x00, 0x00, 0x80, 0x3F, 0xFF, 0xFF, 0xFF, 0xFF]);
    assert!(layout.curbe()[8..].iter().all(|byte| *byte == 0));
  }

  #[test]
  fn curbe_limits(){
    let mut declarations = Declarations::new();
    assert_eq!(
      declarations.declare_curbe("C", 1, &[integers(&[0; 9])]),
      Err(AssemblyErrorKind::CurbeOverflow(36))
    );
    assert_eq!(
      declarations.declare_curbe("C", 1, &[vec![], vec![]]),
      Err(AssemblyErrorKind::TooManyInitializers { name: "C".to_string(), size: 1, groups: 2 })
    );
  }

  #[test]
  fn longest_prefix_wins(){
    let mut declarations = Declarations::new();
    declarations.declare_reg("Foo", 4).unwrap();
    declarations.declare_reg("Foo1", 1).unwrap();
    let layout = declarations.freeze().unwrap();
    assert_eq!(layout.resolve("Foo3"), Ok(RegisterFile::General(4)));
    assert_eq!(layout.resolve("Foo1"), Ok(RegisterFile::General(5)));
    assert_eq!(
      layout.resolve("Foo4"),
      Err(AssemblyErrorKind::IndexOutOfRange { name: "Foo".to_string(), index: 4, size: 4 })
    );
  }

  #[test]
  fn builtin_names(){
    let layout = Declarations::new().freeze().unwrap();
    assert_eq!(layout.resolve("acc0"), Ok(RegisterFile::Arch(ArchRegister::Accumulator0)));
    assert_eq!(layout.resolve("r126"), Ok(RegisterFile::General(126)));
    assert_eq!(layout.resolve("r127"), Err(AssemblyErrorKind::ReservedRegister));
    assert_eq!(layout.resolve("r300"), Err(AssemblyErrorKind::UndefinedRegister("r300".to_string())));
    assert_eq!(layout.resolve("nope"), Err(AssemblyErrorKind::UndefinedRegister("nope".to_string())));
  }

  #[test]
  fn name_errors(){
    let mut declarations = Declarations::new();
    assert_eq!(declarations.declare_reg("r5", 1), Err(AssemblyErrorKind::ReservedName("r5".to_string())));
    assert_eq!(declarations.declare_reg("ip", 1), Err(AssemblyErrorKind::ReservedName("ip".to_string())));
    declarations.declare_reg("x", 1).unwrap();
    assert_eq!(declarations.declare_curbe("x", 1, &[]), Err(AssemblyErrorKind::DuplicateName("x".to_string())));
    assert_eq!(declarations.declare_reg("y", 0), Err(AssemblyErrorKind::EmptyDeclaration("y".to_string())));
  }

  #[test]
  fn bindings_are_one_to_one(){
    let mut declarations = Declarations::new();
    declarations.bind("output", 0x38).unwrap();
    assert_eq!(declarations.bind("output", 1), Err(AssemblyErrorKind::DuplicateName("output".to_string())));
    assert_eq!(
      declarations.bind("other", 0x38),
      Err(AssemblyErrorKind::DuplicateBinding { name: "output".to_string(), index: 0x38 })
    );
    assert_eq!(declarations.bind("big", 256), Err(AssemblyErrorKind::BindingIndexRange(256)));
    let layout = declarations.freeze().unwrap();
    assert_eq!(layout.binding("output"), Some(0x38));
    assert_eq!(layout.binding_name(0x38), Some("output"));
  }

  #[test]
  fn thread_counts(){
    let mut declarations = Declarations::new();
    assert_eq!(declarations.set_threads(0), Err(AssemblyErrorKind::InvalidThreadCount(0)));
    assert_eq!(declarations.set_threads(65), Err(AssemblyErrorKind::InvalidThreadCount(65)));
    declarations.set_threads(64).unwrap();
    assert_eq!(declarations.freeze().unwrap().thread_count(), 64);
  }

  #[test]
  fn allocation_stops_before_r127(){
    let mut declarations = Declarations::new();
    declarations.declare_reg("big", 126).unwrap();
    assert!(declarations.clone().freeze().is_ok());
    declarations.declare_reg("one", 1).unwrap();
    assert_eq!(declarations.freeze().err(), Some(AssemblyErrorKind::OutOfRegisters));
  }

  #[test]
  fn oversized_blocks_are_rejected_up_front(){
    let mut declarations = Declarations::new();
    assert_eq!(declarations.declare_reg("big", u32::MAX), Err(AssemblyErrorKind::OutOfRegisters));
    assert_eq!(declarations.declare_reg("big", 127), Err(AssemblyErrorKind::OutOfRegisters));
    assert_eq!(declarations.declare_curbe("C", u32::MAX, &[]), Err(AssemblyErrorKind::OutOfRegisters));
    declarations.declare_reg("x", 1).unwrap();
    let layout = declarations.freeze().unwrap();
    assert_eq!(layout.resolve("x"), Ok(RegisterFile::General(1)));
    assert_eq!(layout.resolve("big"), Err(AssemblyErrorKind::UndefinedRegister("big".to_string())));
  }
}
