/*!
  Parse-time syntax nodes. A statement's operands are built bottom-up as the parser recognizes
  them, so nodes are allocated in an arena owned by the assembly session and refer to one another
  by `NodeId`. The arena is dropped with the session; nothing outlives a single `assemble` call.
*/

use std::fmt::{Display, Formatter};

use crate::isa::{DataType, RegisterRegion};

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct NodeId(u32);

#[derive(Debug)]
pub struct Arena<T> {
  nodes: Vec<T>,
}

impl<T> Arena<T> {
  pub fn new() -> Arena<T> {
    Arena { nodes: Vec::new() }
  }

  pub fn alloc(&mut self, node: T) -> NodeId {
    self.nodes.push(node);
    NodeId((self.nodes.len() - 1) as u32)
  }

  /// Ids are only minted by `alloc`, so every id indexes a live node.
  pub fn get(&self, id: NodeId) -> &T {
    &self.nodes[id.0 as usize]
  }

  pub fn len(&self) -> usize {
    self.nodes.len()
  }
}

impl<T> Default for Arena<T> {
  fn default() -> Arena<T> {
    Arena::new()
  }
}

/// A numeric literal as written.
#[derive(Copy, Clone, PartialEq, Debug)]
pub enum Number {
  Integer(i64),
  Float(f64),
}

impl Display for Number {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      Number::Integer(value) => write!(f, "{}", value),
      Number::Float(value)   => write!(f, "{:?}", value)
    }
  }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum VectorKind {
  /// `v[...]`
  Signed,
  /// `uv[...]`
  Unsigned,
  /// `vf[...]`
  Float,
}

#[derive(Clone, PartialEq, Debug)]
pub enum Literal<'a> {
  Scalar { value: Number, suffix: Option<&'a str> },
  Vector { kind: VectorKind, lanes: Vec<Number> },
}

impl<'a> Display for Literal<'a> {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      Literal::Scalar { value, suffix: Some(suffix) } => write!(f, "{}:{}", value, suffix),
      Literal::Scalar { value, suffix: None }         => write!(f, "{}", value),
      Literal::Vector { kind, lanes } => {
        let prefix = match kind {
          VectorKind::Signed   => "v",
          VectorKind::Unsigned => "uv",
          VectorKind::Float    => "vf"
        };
        let lanes: Vec<String> = lanes.iter().map(|lane| lane.to_string()).collect();
        write!(f, "{}[{}]", prefix, lanes.join(","))
      }
    }
  }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum RegisterName<'a> {
  /// Anything spelled as an identifier: `r12`, `acc0`, `null`, `Foo3`.
  Named(&'a str),
  /// `[a0.k+offset]`
  Indirect { address_subreg: u32, offset: i64 },
}

/// How a register operand is walked. Regions and swizzles qualify sources; strides and write
/// masks qualify destinations.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Access<'a> {
  Region(RegisterRegion),
  Swizzle(&'a str),
  Stride(u32),
  WriteMask(&'a str),
}

#[derive(Clone, PartialEq, Debug)]
pub enum Node<'a> {
  /// `mnemonic(width)(flag)`
  Operation { mnemonic: &'a str, width: u32, flag: Option<NodeId> },
  /// `[~]fR.S`
  Flag { invert: bool, reg: u32, subreg: u32, text: &'a str },
  Register(RegisterName<'a>),
  /// `.type` followed by an optional element index.
  Suffix { data_type: DataType, element: Option<u32> },
  Access(Access<'a>),
  Immediate(Literal<'a>),
  Source {
    negate   : bool,
    abs      : bool,
    register : NodeId,
    suffix   : Option<NodeId>,
    access   : Option<NodeId>
  },
  Dest {
    register : NodeId,
    suffix   : Option<NodeId>,
    stride   : Option<NodeId>,
    mask     : Option<NodeId>
  },
}

/// One recognized item of a source line. Instruction-bearing statements hold ids into the
/// session's arena.
#[derive(Clone, PartialEq, Debug)]
pub enum Statement<'a> {
  Label(&'a str),
  Curbe { name: &'a str, size: u32, groups: Vec<Vec<Number>> },
  Reg { name: &'a str, size: u32 },
  Bind { name: &'a str, index: u64 },
  Threads(u64),
  PredicationOpen(NodeId),
  PredicationClose,
  Jump { label: &'a str, condition: Option<NodeId> },
  Send { message: &'a str, binding: &'a str, dest: NodeId, source: NodeId },
  Instruction { operation: NodeId, dest: NodeId, sources: Vec<NodeId> },
  End,
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn literal_text(){
    let literal = Literal::Scalar { value: Number::Integer(-3), suffix: Some("ss") };
    assert_eq!(literal.to_string(), "-3:ss");
    let vector = Literal::Vector {
      kind  : VectorKind::Float,
      lanes : vec![Number::Float(1.0), Number::Integer(2)]
    };
    assert_eq!(vector.to_string(), "vf[1.0,2]");
  }

  #[test]
  fn arena_ids_are_stable(){
    let mut arena: Arena<Node> = Arena::new();
    let register = arena.alloc(Node::Register(RegisterName::Named("r3")));
    let source = arena.alloc(Node::Source {
      negate: true, abs: false, register, suffix: None, access: None
    });
    assert_eq!(arena.len(), 2);
    match arena.get(source) {
      Node::Source { register: inner, negate, .. } => {
        assert!(*negate);
        assert_eq!(arena.get(*inner), &Node::Register(RegisterName::Named("r3")));
      }
      other => panic!("unexpected node {:?}", other)
    }
  }
}
