/*!

  The assembler. A program is a run of declarations followed by a body:

  ```text
  curbe Weights[2] = {1, 2, 3, 4} {0.5, 0.25}
  reg   Temp[4]
  bind  output 0x38

  begin:
    mul(8) Temp.f, Weights.f, Weights1.f
    cmplt(8)(f0.0) null.f, Temp.f, 0.0
    pred(f0.0) {
      mov(8) Temp.f, 0.0
    }
    send dword_scattered_write_8(output), null.u, Temp.u
  end
  ```

  Assembly is a single pass over the statements of the comment-stripped source with a fix-up pass
  for jumps at the end. Declarations are collected in a `Declarations` builder that is frozen into
  a `RegisterLayout` when the body starts, either at the label `begin:` or at the first body
  statement. The body is bracketed by a move that preserves the dispatch header in r127 and a send
  of r127 to the thread spawner that ends the thread.

  Errors do not stop assembly; every statement is checked so that one run reports as many problems
  as it can. Failing to lay out the registers is the exception, since nothing after it can be
  resolved.

*/

mod ast;
mod declarations;
mod messages;
mod mnemonics;
mod operands;
mod source;
mod syntax;

use std::collections::HashMap;
use std::convert::TryFrom;

use bimap::BiMap;
use string_cache::DefaultAtom;
use tracing::debug;

use crate::codec::encode_instruction;
use crate::error::{AssemblyError, AssemblyErrorKind, AssemblyFailed, TextSink};
use crate::isa::{
  DataType,
  DestOperand,
  ExecSize,
  FlagReference,
  Immediate,
  Instruction,
  InstructionHeader,
  MessageDescriptor,
  Opcode,
  Predicate,
  PredicateMode,
  RegisterRegion,
  SharedFunction,
  SourceOperand,
};
use crate::register::{
  ArchRegister,
  RegisterReference,
  DISPATCH_HEADER_REGISTER,
  EOT_PAYLOAD_REGISTER,
};

use ast::{Node, NodeId, Statement};
use declarations::Declarations;
use operands::OperandResolver;
use syntax::Parser;

pub use declarations::{RegisterBlock, RegisterLayout, MAX_THREADS};
pub use messages::{find_message, identify_message, DescriptorFields, Message};
pub use mnemonics::{lookup as lookup_mnemonic, Mnemonic};

/// Descriptor of the end-of-thread message: one register of payload, no response.
pub const END_OF_THREAD_DESCRIPTOR: u32 = 0x0200_0010;

/// Bytes of code a jump of one instruction spans.
const JUMP_SCALE: i64 = 16;

/// The longest excerpt of offending text quoted in a syntax error.
const EXCERPT_LENGTH: usize = 24;

/// An assembled program.
#[derive(Clone, Debug)]
pub struct Program {
  instructions : Vec<Instruction>,
  bytes        : Vec<u8>,
  layout       : RegisterLayout,
}

impl Program {
  /**
    Assembles `text`. Every error is pushed to `sink` as `line N: message` as it is found, and the
    complete list is returned on failure.
  */
  pub fn assemble<S: TextSink + ?Sized>(text: &str, sink: &mut S) -> Result<Program, AssemblyFailed> {
    let stripped = match source::strip_comments(text) {
      Ok(stripped) => stripped,
      Err(line) => {
        let error = AssemblyError::new(line, AssemblyErrorKind::UnterminatedComment);
        sink.push(&error.to_string());
        return Err(AssemblyFailed { errors: vec![error] });
      }
    };

    let mut session = Session::new();
    session.run(&stripped);
    let result = session.finish();

    if let Err(failure) = &result {
      for error in failure.errors.iter() {
        sink.push(&error.to_string());
      }
    }
    result
  }

  pub fn instructions(&self) -> &[Instruction] {
    &self.instructions
  }

  /// The encoded program, sixteen bytes per instruction.
  pub fn bytes(&self) -> &[u8] {
    &self.bytes
  }

  /// The constant buffer image, 32 bytes per CURBE register.
  pub fn curbe(&self) -> &[u8] {
    self.layout.curbe()
  }

  pub fn thread_count(&self) -> u32 {
    self.layout.thread_count()
  }

  pub fn layout(&self) -> &RegisterLayout {
    &self.layout
  }

  pub fn bindings(&self) -> &BiMap<DefaultAtom, u32> {
    self.layout.bindings()
  }
}

// region Session

/// A jump whose displacement is filled in once every label is known.
struct PendingJump<'a> {
  label     : &'a str,
  index     : usize,
  line      : usize,
  condition : Option<(FlagReference, bool)>,
}

struct PredicationBlock {
  start     : usize,
  line      : usize,
  predicate : Predicate,
  flag      : FlagReference,
}

/// Where the session is in the program.
enum Phase {
  Declarations(Declarations),
  Body(RegisterLayout),
  /// Register layout failed; nothing more can be resolved.
  Aborted,
}

struct Session<'a> {
  parser       : Parser<'a>,
  phase        : Phase,
  instructions : Vec<Instruction>,
  /// The source line of each instruction, for encoding errors.
  lines        : Vec<usize>,
  labels       : HashMap<&'a str, usize>,
  jumps        : Vec<PendingJump<'a>>,
  predication  : Option<PredicationBlock>,
  ended        : bool,
  last_line    : usize,
  errors       : Vec<AssemblyError>,
}

impl<'a> Session<'a> {
  fn new() -> Session<'a> {
    Session {
      parser       : Parser::new(),
      phase        : Phase::Declarations(Declarations::new()),
      instructions : Vec::new(),
      lines        : Vec::new(),
      labels       : HashMap::new(),
      jumps        : Vec::new(),
      predication  : None,
      ended        : false,
      last_line    : 0,
      errors       : Vec::new(),
    }
  }

  fn error(&mut self, line: usize, kind: AssemblyErrorKind) {
    debug!(line, %kind, "assembly error");
    self.errors.push(AssemblyError::new(line, kind));
  }

  fn is_aborted(&self) -> bool {
    matches!(self.phase, Phase::Aborted)
  }

  fn run(&mut self, text: &'a str) {
    for (index, line) in text.lines().enumerate() {
      let number = index + 1;
      let line = line.trim();
      if line.is_empty() {
        continue;
      }
      self.last_line = number;
      if self.ended {
        self.error(number, AssemblyErrorKind::TrailingText);
        return;
      }
      if !self.line(number, line) {
        return;
      }
    }
  }

  /// Folds every statement on one line. A statement is only folded once the text after it is
  /// known to start another statement, so a malformed tail reports one syntax error rather than
  /// an error for a truncated statement. Returns whether assembly should go on to the next line.
  fn line(&mut self, number: usize, text: &'a str) -> bool {
    let mut parsed = self.parser.statement(text);
    let mut text   = text;

    loop {
      let (rest, statement) = match parsed {
        Ok(result) => result,
        Err(_) => {
          self.error(number, AssemblyErrorKind::Syntax(excerpt(text)));
          return true;
        }
      };
      let rest = rest.trim_start();

      if rest.is_empty() {
        self.statement(number, statement);
        return !self.is_aborted();
      }
      if statement == Statement::End {
        self.statement(number, statement);
        self.error(number, AssemblyErrorKind::TrailingText);
        return false;
      }

      let next = self.parser.statement(rest);
      if next.is_err() {
        self.error(number, AssemblyErrorKind::Syntax(excerpt(rest)));
        return true;
      }
      self.statement(number, statement);
      if self.is_aborted() {
        return false;
      }
      text   = rest;
      parsed = next;
    }
  }

  fn statement(&mut self, line: usize, statement: Statement<'a>) {
    if let Err(kind) = self.fold(line, statement) {
      self.error(line, kind);
    }
  }

  fn fold(&mut self, line: usize, statement: Statement<'a>) -> Result<(), AssemblyErrorKind> {
    match statement {

      Statement::Curbe { name, size, groups } => {
        debug!(line, declaration = name, size, "curbe");
        self.declarations()?.declare_curbe(name, size, &groups)
      }

      Statement::Reg { name, size } => {
        debug!(line, declaration = name, size, "reg");
        self.declarations()?.declare_reg(name, size)
      }

      Statement::Bind { name, index } => {
        debug!(line, binding = name, index, "bind");
        self.declarations()?.bind(name, index)
      }

      Statement::Threads(count) => {
        debug!(line, count, "threads");
        self.declarations()?.set_threads(count)
      }

      Statement::Label(name) => {
        self.start_body(line)?;
        debug!(line, label = name, position = self.instructions.len(), "label");
        if self.labels.contains_key(name) {
          return Err(AssemblyErrorKind::DuplicateLabel(name.to_string()));
        }
        self.labels.insert(name, self.instructions.len());
        Ok(())
      }

      Statement::PredicationOpen(flag) => {
        self.start_body(line)?;
        if self.predication.is_some() {
          return Err(AssemblyErrorKind::NestedPredication);
        }
        let (flag, invert) = self.operands(|operands| operands.flag(flag))?;
        debug!(line, %flag, invert, "predication block");
        self.predication = Some(PredicationBlock {
          start     : self.instructions.len(),
          line,
          predicate : Predicate::new(PredicateMode::Sequential, invert),
          flag
        });
        Ok(())
      }

      Statement::PredicationClose => {
        let block = self.predication.take().ok_or(AssemblyErrorKind::UnbalancedBrace)?;
        for instruction in self.instructions[block.start..].iter_mut() {
          if let Some(header) = instruction.header_mut() {
            *header = header.with_predicate(block.predicate, block.flag);
          }
        }
        Ok(())
      }

      Statement::Jump { label, condition } => {
        self.start_body(line)?;
        let condition = match condition {
          Some(flag) => Some(self.operands(|operands| operands.flag(flag))?),
          None       => None
        };
        debug!(line, label, conditional = condition.is_some(), "jump");
        self.jumps.push(PendingJump { label, index: self.instructions.len(), line, condition });
        self.push(line, jump_placeholder());
        Ok(())
      }

      Statement::Send { message, binding, dest, source } => {
        self.start_body(line)?;
        let instruction = self.send(message, binding, dest, source)?;
        debug!(line, message, binding, "send");
        self.push(line, instruction);
        Ok(())
      }

      Statement::Instruction { operation, dest, sources } => {
        self.start_body(line)?;
        let instruction = self.instruction(operation, dest, &sources)?;
        debug!(line, opcode = %instruction.opcode(), "instruction");
        self.push(line, instruction);
        Ok(())
      }

      Statement::End => {
        self.start_body(line)?;
        debug!(line, "end");
        self.ended = true;
        Ok(())
      }

    }
  }

  fn push(&mut self, line: usize, instruction: Instruction) {
    self.instructions.push(instruction);
    self.lines.push(line);
  }

  fn declarations(&mut self) -> Result<&mut Declarations, AssemblyErrorKind> {
    match &mut self.phase {
      Phase::Declarations(declarations) => Ok(declarations),
      _                                 => Err(AssemblyErrorKind::LateDeclaration)
    }
  }

  fn layout(&self) -> Result<&RegisterLayout, AssemblyErrorKind> {
    match &self.phase {
      Phase::Body(layout) => Ok(layout),
      _                   => Err(AssemblyErrorKind::LateDeclaration)
    }
  }

  /// Runs `resolve` with the parser's arena and the frozen layout.
  fn operands<T, F>(&self, resolve: F) -> Result<T, AssemblyErrorKind>
    where F: FnOnce(&OperandResolver<'_, 'a>) -> Result<T, AssemblyErrorKind>
  {
    let layout = self.layout()?;
    let arena  = self.parser.arena();
    resolve(&OperandResolver { arena: &arena, layout })
  }

  /// Freezes the declarations and emits the header-preserving move. Does nothing once the body
  /// has started.
  fn start_body(&mut self, line: usize) -> Result<(), AssemblyErrorKind> {
    let declarations = match std::mem::replace(&mut self.phase, Phase::Aborted) {
      Phase::Declarations(declarations) => declarations,
      other => {
        self.phase = other;
        return Ok(());
      }
    };

    let layout = declarations.freeze()?;
    debug!(
      line,
      curbe_registers = layout.curbe_registers(),
      blocks = layout.blocks().len(),
      threads = layout.thread_count(),
      "register layout frozen"
    );
    self.phase = Phase::Body(layout);
    self.push(line, preserve_dispatch_header());
    Ok(())
  }

  fn send(&self, message: &str, binding: &str, dest: NodeId, source: NodeId)
    -> Result<Instruction, AssemblyErrorKind>
  {
    let message = find_message(message)
      .ok_or_else(|| AssemblyErrorKind::UnknownMessage(message.to_string()))?;
    let index = self.layout()?
      .binding(binding)
      .ok_or_else(|| AssemblyErrorKind::UndefinedBinding(binding.to_string()))?;
    let descriptor = message.descriptor(index)?;

    let (dest, source) = self.operands(|operands| {
      let dest   = operands.dest(dest)?;
      let source = operands.source(source, message.exec_size, dest.data_type)?;
      Ok((dest, source))
    })?;
    if source.operand.is_immediate() {
      return Err(AssemblyErrorKind::UnexpectedImmediate);
    }

    Ok(Instruction::Send {
      opcode        : Opcode::Send,
      header        : InstructionHeader::new(message.exec_size),
      function      : message.function,
      descriptor    : MessageDescriptor::Immediate(descriptor),
      dest,
      src0          : source.operand,
      end_of_thread : false
    })
  }

  fn instruction(&self, operation: NodeId, dest: NodeId, sources: &[NodeId])
    -> Result<Instruction, AssemblyErrorKind>
  {
    self.operands(|operands| {
      let (name, width, flag) = match operands.arena.get(operation) {
        Node::Operation { mnemonic, width, flag } => (*mnemonic, *width, *flag),
        _ => return Err(AssemblyErrorKind::Syntax("malformed instruction".to_string()))
      };
      let mnemonic  = mnemonics::lookup(name)
        .ok_or_else(|| AssemblyErrorKind::UnknownMnemonic(name.to_string()))?;
      let exec_size = ExecSize::from_width(width).ok_or(AssemblyErrorKind::InvalidExecSize(width))?;

      let mut header = InstructionHeader::new(exec_size);
      match (mnemonic.is_compare(), flag) {
        (true, None) => return Err(AssemblyErrorKind::MissingFlag(name.to_string())),
        (true, Some(id)) => {
          let (flag, invert) = operands.flag(id)?;
          if invert {
            let text = match operands.arena.get(id) {
              Node::Flag { text, .. } => text.to_string(),
              _                       => flag.to_string()
            };
            return Err(AssemblyErrorKind::InvalidFlag(text));
          }
          header = header.with_flag(flag);
        }
        (false, Some(id)) => {
          let (flag, invert) = operands.flag(id)?;
          header = header.with_predicate(Predicate::new(PredicateMode::Sequential, invert), flag);
        }
        (false, None) => {}
      }

      let dest = operands.dest(dest)?;
      let sources = sources
        .iter()
        .map(|id| operands.source(*id, exec_size, dest.data_type))
        .collect::<Result<Vec<_>, _>>()?;
      mnemonic.lower(name, header, dest, sources)
    })
  }

  /// Resolves jumps, appends the end-of-thread send and encodes.
  fn finish(mut self) -> Result<Program, AssemblyFailed> {
    if !self.is_aborted() {
      if let Some(block) = self.predication.take() {
        self.error(block.line, AssemblyErrorKind::UnclosedPredication);
      }
      let line = self.last_line;
      if let Err(kind) = self.start_body(line) {
        self.error(line, kind);
      }
    }

    let layout = match std::mem::replace(&mut self.phase, Phase::Aborted) {
      Phase::Body(layout) => layout,
      _ => return Err(AssemblyFailed { errors: self.errors })
    };

    self.resolve_jumps();
    let line = self.last_line;
    self.push(line, end_of_thread());

    if !self.errors.is_empty() {
      return Err(AssemblyFailed { errors: self.errors });
    }

    let mut bytes = Vec::with_capacity(self.instructions.len() * crate::codec::NATIVE_LENGTH);
    for (instruction, line) in self.instructions.iter().zip(self.lines.iter()) {
      match encode_instruction(instruction) {
        Ok(encoded) => bytes.extend_from_slice(&encoded),
        Err(error)  => self.errors.push(AssemblyError::new(*line, error.into()))
      }
    }
    if !self.errors.is_empty() {
      return Err(AssemblyFailed { errors: self.errors });
    }

    debug!(instructions = self.instructions.len(), bytes = bytes.len(), "assembled");

    #[cfg(feature = "trace_assembly")]
      {
        println!("# Assembled {} instructions ({} bytes)", self.instructions.len(), bytes.len());
        for (index, instruction) in self.instructions.iter().enumerate() {
          println!("{:>6}  {}", index * crate::codec::NATIVE_LENGTH, instruction);
        }
      }

    Ok(Program { instructions: self.instructions, bytes, layout })
  }

  fn resolve_jumps(&mut self) {
    let jumps = std::mem::take(&mut self.jumps);
    for jump in jumps {
      let target = match self.labels.get(jump.label) {
        Some(target) => *target,
        None => {
          self.error(jump.line, AssemblyErrorKind::UndefinedLabel(jump.label.to_string()));
          continue;
        }
      };
      let displacement = JUMP_SCALE * (target as i64 - jump.index as i64);
      debug!(label = jump.label, from = jump.index, to = target, displacement, "jump resolved");

      let displacement = match i32::try_from(displacement) {
        Ok(displacement) => displacement,
        Err(_) => {
          let kind = AssemblyErrorKind::ImmediateRange(displacement.to_string(), "s".to_string());
          self.error(jump.line, kind);
          continue;
        }
      };
      if let Instruction::Binary { header, src1, .. } = &mut self.instructions[jump.index] {
        *src1 = SourceOperand::Immediate(Immediate::D(displacement));
        if let Some((flag, invert)) = jump.condition {
          *header = header.with_predicate(Predicate::new(PredicateMode::Any16H, invert), flag);
        }
      }
    }
  }
}

// endregion

// region Fixed instructions

fn instruction_pointer() -> RegisterReference {
  RegisterReference::arch(ArchRegister::InstructionPointer)
}

/// `add(1) ip.s, ip.s<0,1,0>, 0:s`; the displacement is patched in once labels are known.
fn jump_placeholder() -> Instruction {
  Instruction::Binary {
    opcode : Opcode::Add,
    header : InstructionHeader::new(ExecSize::Simd1),
    dest   : DestOperand::new(DataType::D, instruction_pointer()),
    src0   : SourceOperand::register(DataType::D, instruction_pointer(), RegisterRegion::SCALAR),
    src1   : SourceOperand::Immediate(Immediate::D(0)),
    cond   : None
  }
}

/// `mov(8) r127.u, r0.u<8,8,1>`
fn preserve_dispatch_header() -> Instruction {
  Instruction::Unary {
    opcode : Opcode::Mov,
    header : InstructionHeader::new(ExecSize::Simd8),
    dest   : DestOperand::new(DataType::UD, RegisterReference::general(EOT_PAYLOAD_REGISTER)),
    src0   : SourceOperand::register(
      DataType::UD,
      RegisterReference::general(DISPATCH_HEADER_REGISTER),
      RegisterRegion::new(8, 8, 1)
    ),
    cond   : None
  }
}

/// `send(8) null.u, r127.u` to the thread spawner, ending the thread.
fn end_of_thread() -> Instruction {
  Instruction::Send {
    opcode        : Opcode::Send,
    header        : InstructionHeader::new(ExecSize::Simd8),
    function      : SharedFunction::ThreadSpawner,
    descriptor    : MessageDescriptor::Immediate(END_OF_THREAD_DESCRIPTOR),
    dest          : DestOperand::null(DataType::UD),
    src0          : SourceOperand::register(
      DataType::UD,
      RegisterReference::general(EOT_PAYLOAD_REGISTER),
      RegisterRegion::new(8, 8, 1)
    ),
    end_of_thread : true
  }
}

// endregion

fn excerpt(text: &str) -> String {
  text.chars().take(EXCERPT_LENGTH).collect::<String>().trim_end().to_string()
}


#[cfg(test)]
mod tests {
  use super::*;
  use crate::isa::{ConditionalModifier, SourceModifier};
  use crate::register::RegisterFile;

  fn assemble(text: &str) -> Result<Program, AssemblyFailed> {
    let mut sink: Vec<String> = Vec::new();
    Program::assemble(text, &mut sink)
  }

  fn errors(text: &str) -> Vec<AssemblyError> {
    let mut sink: Vec<String> = Vec::new();
    let failure = Program::assemble(text, &mut sink).unwrap_err();
    assert_eq!(sink.len(), failure.errors.len());
    failure.errors
  }

  #[test]
  fn minimal_program(){
    let program = assemble(
      "reg out\n\
       bind output 0x38\n\
       mov(8) out.u, 7\n\
       send dword_scattered_write_8(output), null.u, out.u\n\
       end\n"
    ).unwrap();

    assert_eq!(program.instructions().len(), 4);
    assert_eq!(program.bytes().len(), 64);
    assert!(program.curbe().is_empty());
    assert_eq!(program.thread_count(), 1);
    assert_eq!(program.layout().resolve("out"), Ok(RegisterFile::General(1)));

    assert_eq!(program.instructions()[0], preserve_dispatch_header());
    assert_eq!(program.instructions()[3], end_of_thread());
    match &program.instructions()[1] {
      Instruction::Unary { opcode: Opcode::Mov, src0, .. } => {
        assert_eq!(*src0, SourceOperand::Immediate(Immediate::UD(7)));
      }
      other => panic!("unexpected instruction {:?}", other)
    }
    match &program.instructions()[2] {
      Instruction::Send { function, descriptor, .. } => {
        assert_eq!(*function, SharedFunction::DataCache);
        assert_eq!(*descriptor, MessageDescriptor::Immediate((2 << 25) | (11 << 14) | (2 << 8) | 0x38));
      }
      other => panic!("unexpected instruction {:?}", other)
    }
  }

  #[test]
  fn curbe_image(){
    let program = assemble("curbe C[1] = {1,2,3,4,5,6,7,8}\nmov(8) r2.u, C.u\n").unwrap();
    let expected: Vec<u8> = (1u32..=8).flat_map(|word| word.to_le_bytes().to_vec()).collect();
    assert_eq!(program.curbe(), &expected[..]);
    assert_eq!(program.layout().resolve("C"), Ok(RegisterFile::General(1)));
    assert_eq!(program.curbe().len(), 32 * program.layout().curbe_registers());
  }

  #[test]
  fn undefined_label(){
    let errors = errors("mov(8) r2.u, 1\n\njmp nowhere\nmov(8) r3.u, 2\n");
    assert_eq!(errors, vec![
      AssemblyError::new(3, AssemblyErrorKind::UndefinedLabel("nowhere".to_string()))
    ]);
  }

  #[test]
  fn jump_displacements(){
    let program = assemble(
      "begin:\n\
       top: add(8) r2.d, r2.d, 1\n\
       jmpif(~f0.1) top\n\
       jmp done\n\
       mov(8) r3.d, 0\n\
       done:\n\
       end\n"
    ).unwrap();
    let instructions = program.instructions();
    assert_eq!(instructions.len(), 6);

    match &instructions[2] {
      Instruction::Binary { opcode: Opcode::Add, header, src1, .. } => {
        assert_eq!(*src1, SourceOperand::Immediate(Immediate::D(-16)));
        assert_eq!(header.predicate, Predicate::new(PredicateMode::Any16H, true));
        assert_eq!(header.flag, FlagReference::new(0, 1));
        assert_eq!(header.exec_size, ExecSize::Simd1);
      }
      other => panic!("unexpected instruction {:?}", other)
    }
    match &instructions[3] {
      Instruction::Binary { header, src1, .. } => {
        assert_eq!(*src1, SourceOperand::Immediate(Immediate::D(32)));
        assert!(header.predicate.is_none());
      }
      other => panic!("unexpected instruction {:?}", other)
    }
  }

  #[test]
  fn predication_blocks(){
    let program = assemble(
      "cmplt(8)(f0.0) null.f, r2.f, 0.0\n\
       pred(~f0.0) {\n\
         mov(8) r3.f, 1.0\n\
         jmp out\n\
       }\n\
       out:\n"
    ).unwrap();
    let instructions = program.instructions();
    match &instructions[1] {
      Instruction::Binary { opcode: Opcode::Cmp, header, cond, .. } => {
        assert_eq!(*cond, Some(ConditionalModifier::Less));
        assert_eq!(header.flag, FlagReference::new(0, 0));
        assert!(header.predicate.is_none());
      }
      other => panic!("unexpected instruction {:?}", other)
    }
    for instruction in &instructions[2..4] {
      assert_eq!(instruction.header().predicate, Predicate::new(PredicateMode::Sequential, true));
    }
    assert!(instructions[4].header().predicate.is_none());
  }

  #[test]
  fn pseudo_operations(){
    let program = assemble("sub(8) r2.f, r3.f, r4.f\nmax(8) r2.f, r3.f, 0.0\n").unwrap();
    match &program.instructions()[1] {
      Instruction::Binary { opcode: Opcode::Add, src1: SourceOperand::Register { modifier, .. }, .. } => {
        assert_eq!(*modifier, SourceModifier::Negate);
      }
      other => panic!("unexpected instruction {:?}", other)
    }
    match &program.instructions()[2] {
      Instruction::Binary { opcode: Opcode::Sel, cond, .. } => {
        assert_eq!(*cond, Some(ConditionalModifier::GreaterEqual));
      }
      other => panic!("unexpected instruction {:?}", other)
    }
  }

  #[test]
  fn errors_carry_lines(){
    let errors = errors(
      "reg A[2]\n\
       reg A\n\
       mov(3) r2.u, 1\n\
       frob(8) r2.u, r3.u\n\
       cmpeq(8) null.u, r2.u, r3.u\n\
       mov(8) A2.u, 1\n\
       send dword_scattered_write_8(nope), null.u, r2.u\n\
       reg late\n\
       }\n"
    );
    let kinds: Vec<(usize, AssemblyErrorKind)> = errors.into_iter().map(|e| (e.line, e.kind)).collect();
    assert_eq!(kinds, vec![
      (2, AssemblyErrorKind::DuplicateName("A".to_string())),
      (3, AssemblyErrorKind::InvalidExecSize(3)),
      (4, AssemblyErrorKind::UnknownMnemonic("frob".to_string())),
      (5, AssemblyErrorKind::MissingFlag("cmpeq".to_string())),
      (6, AssemblyErrorKind::IndexOutOfRange { name: "A".to_string(), index: 2, size: 2 }),
      (7, AssemblyErrorKind::UndefinedBinding("nope".to_string())),
      (8, AssemblyErrorKind::LateDeclaration),
      (9, AssemblyErrorKind::UnbalancedBrace),
    ]);
  }

  #[test]
  fn huge_register_arrays_do_not_shift_later_blocks(){
    let errors = errors("reg big[4294967295]\nreg x\nmov(8) x.u, 1\n");
    assert_eq!(errors, vec![AssemblyError::new(1, AssemblyErrorKind::OutOfRegisters)]);
  }

  #[test]
  fn structural_errors(){
    let unclosed = errors("mov(8) r2.u, 1\npred(f0.0) {\nmov(8) r3.u, 1\n");
    assert_eq!(unclosed, vec![AssemblyError::new(2, AssemblyErrorKind::UnclosedPredication)]);

    let nested = errors("pred(f0.0) {\npred(f0.1) {\n}\n");
    assert_eq!(nested[0], AssemblyError::new(2, AssemblyErrorKind::NestedPredication));

    let trailing = errors("mov(8) r2.u, 1\nend\nmov(8) r3.u, 1\n");
    assert_eq!(trailing, vec![AssemblyError::new(3, AssemblyErrorKind::TrailingText)]);

    let duplicate = errors("a:\na:\n");
    assert_eq!(duplicate, vec![AssemblyError::new(2, AssemblyErrorKind::DuplicateLabel("a".to_string()))]);

    let comment = errors("mov(8) r2.u, 1\n/* never closed\nend\n");
    assert_eq!(comment, vec![AssemblyError::new(2, AssemblyErrorKind::UnterminatedComment)]);

    let syntax = errors("mov(8) r2.f, |r3.f, r4.f\n");
    assert_eq!(syntax.len(), 1);
    assert!(matches!(syntax[0].kind, AssemblyErrorKind::Syntax(_)));
  }

  #[test]
  fn register_exhaustion_aborts(){
    let errors = errors("reg big[200]\nmov(8) big.u, 1\nfrob(8) r2.u, 1\n");
    assert_eq!(errors, vec![AssemblyError::new(2, AssemblyErrorKind::OutOfRegisters)]);
  }

  #[test]
  fn sink_receives_numbered_lines(){
    let mut sink = String::new();
    assert!(Program::assemble("send nothing(x), null.u, r2.u\n", &mut sink).is_err());
    assert_eq!(sink, "line 1: unrecognized message `nothing`\n");
  }

  #[test]
  fn comments_and_shared_lines(){
    let program = assemble(
      "// leading comment\n\
       threads 8 /* inline */ bind out 1\n\
       begin: mov(8) r2.u, 1 // trailing\n"
    ).unwrap();
    assert_eq!(program.thread_count(), 8);
    assert_eq!(program.bindings().get_by_right(&1).map(|name| &**name), Some("out"));
    assert_eq!(program.instructions().len(), 3);
  }
}
