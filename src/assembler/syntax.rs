/*!
  The statement grammar. The assembler feeds one item at a time, so each parser recognizes a
  single statement at the head of its input and returns whatever follows it.

  ```text
  statement   := "end" | curbe | reg | bind | threads | pred "{" | "}"
               | jmpif | jmp | send | instruction | label ":"
  curbe       := "curbe" NAME ("[" N "]")? "=" group ([","] group)*
  group       := "{" (number ("," number)*)? "}"
  instruction := MNEMONIC "(" WIDTH ")" ("(" flag ")")? dest ("," source)*
  dest        := register suffix? ("<" H ">")? ("." mask)?
  source      := immediate | "-"? "|"? register suffix? (region | "." swizzle)? "|"?
  register    := NAME | "[" "a0." K (("+" | "-") OFFSET)? "]"
  suffix      := "." TYPE ELEMENT?
  immediate   := ("v" | "uv" | "vf") "[" number ("," number)* "]" | number (":" TYPE)?
  ```

  Operand parsers allocate their nodes in the parser's arena as they succeed. A parser that fails
  after allocating leaves unreachable nodes behind, which live until the session ends.
*/

use std::cell::{Ref, RefCell};
use std::convert::TryFrom;
use std::str::FromStr;

use nom::{
  branch::alt,
  bytes::complete::{tag, take_while_m_n},
  character::complete::{
    alpha1,
    alphanumeric1,
    char as one_char,
    digit0,
    digit1,
    hex_digit1,
    one_of,
    satisfy,
    space0,
    space1
  },
  combinator::{consumed, map, map_res, not, opt, recognize, value},
  error::{Error as NomError, ErrorKind},
  multi::{many0, many1, separated_list0, separated_list1},
  sequence::{delimited, pair, preceded, terminated, tuple},
  IResult
};

use crate::isa::{DataType, RegisterRegion};
use super::ast::{Access, Arena, Literal, Node, NodeId, Number, RegisterName, Statement, VectorKind};

// region Tokens

fn ws<'a, O, F>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
  where F: FnMut(&'a str) -> IResult<&'a str, O>
{
  delimited(space0, inner, space0)
}

fn is_word_char(c: char) -> bool {
  c.is_alphanumeric() || c == '_'
}

/// A reserved word that is not the prefix of a longer word.
fn keyword<'a>(word: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
  terminated(tag(word), not(satisfy(is_word_char)))
}

pub fn identifier(input: &str) -> IResult<&str, &str> {
  recognize(pair(
    alt((alpha1, tag("_"))),
    many0(alt((alphanumeric1, tag("_"))))
  ))(input)
}

fn decimal(input: &str) -> IResult<&str, u32> {
  map_res(digit1, |digits: &str| digits.parse::<u32>())(input)
}

fn small(input: &str) -> IResult<&str, u8> {
  map_res(digit1, |digits: &str| digits.parse::<u8>())(input)
}

/// Decimal or `0x` hexadecimal.
fn unsigned(input: &str) -> IResult<&str, u64> {
  alt((
    map_res(
      preceded(alt((tag("0x"), tag("0X"))), hex_digit1),
      |digits: &str| u64::from_str_radix(digits, 16)
    ),
    map_res(digit1, |digits: &str| digits.parse::<u64>())
  ))(input)
}

fn signed(input: &str) -> IResult<&str, i64> {
  map_res(
    pair(opt(one_of("+-")), unsigned),
    |(sign, magnitude)| {
      i64::try_from(magnitude).map(|magnitude| match sign {
        Some('-') => -magnitude,
        _         => magnitude
      })
    }
  )(input)
}

/// A float must have a decimal point; `1.`, `-0.25` and `2.5e-3` are floats, `3` is not.
fn float(input: &str) -> IResult<&str, f64> {
  map_res(
    recognize(tuple((
      opt(one_of("+-")),
      digit1,
      one_char('.'),
      digit0,
      opt(tuple((one_of("eE"), opt(one_of("+-")), digit1)))
    ))),
    |text: &str| text.parse::<f64>()
  )(input)
}

pub fn number(input: &str) -> IResult<&str, Number> {
  alt((map(float, Number::Float), map(signed, Number::Integer)))(input)
}

/// Longer spellings first, so that `.ub` is not read as `.u` followed by `b`.
fn data_type(input: &str) -> IResult<&str, DataType> {
  map_res(
    alt((tag("fd"), tag("f"), tag("ub"), tag("us"), tag("u"), tag("sb"), tag("ss"), tag("s"))),
    DataType::from_str
  )(input)
}

fn channels(input: &str) -> IResult<&str, &str> {
  terminated(take_while_m_n(1, 4, |c: char| "xyzw".contains(c)), not(satisfy(is_word_char)))(input)
}

fn region(input: &str) -> IResult<&str, RegisterRegion> {
  map(
    delimited(
      one_char('<'),
      tuple((ws(small), one_char(','), ws(small), one_char(','), ws(small))),
      one_char('>')
    ),
    |(vstride, _, width, _, hstride)| RegisterRegion::new(vstride, width, hstride)
  )(input)
}

/// `[~]fR[.S]`, returned as its inversion, its text, and its register and sub-register numbers.
fn flag_parts(input: &str) -> IResult<&str, (bool, &str, u32, u32)> {
  let (rest, invert) = map(opt(terminated(one_char('~'), space0)), |tilde| tilde.is_some())(input)?;
  let (rest, (text, (reg, subreg))) = consumed(pair(
    preceded(one_char('f'), decimal),
    opt(preceded(one_char('.'), decimal))
  ))(rest)?;
  Ok((rest, (invert, text, reg, subreg.unwrap_or(0))))
}

fn array_size(input: &str) -> IResult<&str, u32> {
  delimited(ws(one_char('[')), decimal, ws(one_char(']')))(input)
}

fn vector(input: &str) -> IResult<&str, Literal> {
  map(
    pair(
      alt((
        value(VectorKind::Float, tag("vf")),
        value(VectorKind::Unsigned, tag("uv")),
        value(VectorKind::Signed, tag("v"))
      )),
      delimited(
        pair(space0, one_char('[')),
        separated_list1(one_char(','), ws(number)),
        one_char(']')
      )
    ),
    |(kind, lanes)| Literal::Vector { kind, lanes }
  )(input)
}

fn scalar(input: &str) -> IResult<&str, Literal> {
  map(
    pair(
      number,
      opt(preceded(one_char(':'), alt((tag("us"), tag("ss"), tag("u"), tag("s"), tag("f")))))
    ),
    |(value, suffix)| Literal::Scalar { value, suffix }
  )(input)
}

// endregion

// region Statements without operands

fn curbe(input: &str) -> IResult<&str, Statement> {
  let group = delimited(
    pair(one_char('{'), space0),
    separated_list0(ws(one_char(',')), number),
    pair(space0, one_char('}'))
  );
  let (rest, (_, name, size, _, groups)) = tuple((
    pair(keyword("curbe"), space1),
    identifier,
    opt(array_size),
    ws(one_char('=')),
    many1(preceded(tuple((space0, opt(one_char(',')), space0)), group))
  ))(input)?;
  Ok((rest, Statement::Curbe { name, size: size.unwrap_or(1), groups }))
}

fn reg(input: &str) -> IResult<&str, Statement> {
  let (rest, (_, name, size)) = tuple((pair(keyword("reg"), space1), identifier, opt(array_size)))(input)?;
  Ok((rest, Statement::Reg { name, size: size.unwrap_or(1) }))
}

fn bind(input: &str) -> IResult<&str, Statement> {
  let (rest, (_, name, _, index)) =
    tuple((pair(keyword("bind"), space1), identifier, space1, unsigned))(input)?;
  Ok((rest, Statement::Bind { name, index }))
}

fn threads(input: &str) -> IResult<&str, Statement> {
  map(preceded(pair(keyword("threads"), space1), unsigned), Statement::Threads)(input)
}

fn jump(input: &str) -> IResult<&str, Statement> {
  map(
    preceded(pair(keyword("jmp"), space1), identifier),
    |label| Statement::Jump { label, condition: None }
  )(input)
}

fn label(input: &str) -> IResult<&str, Statement> {
  map(terminated(identifier, ws(one_char(':'))), Statement::Label)(input)
}

// endregion

/// Parses statements into an arena of operand nodes.
pub struct Parser<'a> {
  arena: RefCell<Arena<Node<'a>>>,
}

impl<'a> Parser<'a> {
  pub fn new() -> Parser<'a> {
    Parser { arena: RefCell::new(Arena::new()) }
  }

  pub fn arena(&self) -> Ref<'_, Arena<Node<'a>>> {
    self.arena.borrow()
  }

  fn alloc(&self, node: Node<'a>) -> NodeId {
    self.arena.borrow_mut().alloc(node)
  }

  /// Recognizes one statement at the head of `input`.
  pub fn statement(&self, input: &'a str) -> IResult<&'a str, Statement<'a>> {
    alt((
      value(Statement::End, keyword("end")),
      curbe,
      reg,
      bind,
      threads,
      |i: &'a str| self.predication_open(i),
      value(Statement::PredicationClose, one_char('}')),
      |i: &'a str| self.jump_if(i),
      jump,
      |i: &'a str| self.send(i),
      |i: &'a str| self.instruction(i),
      label
    ))(input)
  }

  fn predication_open(&self, input: &'a str) -> IResult<&'a str, Statement<'a>> {
    let (rest, flag) = delimited(
      pair(keyword("pred"), ws(one_char('('))),
      |i: &'a str| self.flag(i),
      pair(ws(one_char(')')), one_char('{'))
    )(input)?;
    Ok((rest, Statement::PredicationOpen(flag)))
  }

  /// `jmpif(~f0.1) label` and `jmpif(f0.1, ~) label` both invert the condition.
  fn jump_if(&self, input: &'a str) -> IResult<&'a str, Statement<'a>> {
    let (rest, (_, (invert, text, reg, subreg), trailing, _, label)) = tuple((
      pair(keyword("jmpif"), ws(one_char('('))),
      flag_parts,
      opt(preceded(ws(one_char(',')), one_char('~'))),
      ws(one_char(')')),
      identifier
    ))(input)?;
    let flag = self.alloc(Node::Flag { invert: invert || trailing.is_some(), reg, subreg, text });
    Ok((rest, Statement::Jump { label, condition: Some(flag) }))
  }

  fn send(&self, input: &'a str) -> IResult<&'a str, Statement<'a>> {
    let (rest, (_, message, binding, _, dest, _, source)) = tuple((
      pair(keyword("send"), space1),
      identifier,
      delimited(ws(one_char('(')), identifier, ws(one_char(')'))),
      opt(ws(one_char(','))),
      |i: &'a str| self.dest(i),
      ws(one_char(',')),
      |i: &'a str| self.source(i)
    ))(input)?;
    Ok((rest, Statement::Send { message, binding, dest, source }))
  }

  fn instruction(&self, input: &'a str) -> IResult<&'a str, Statement<'a>> {
    let (rest, (operation, dest, sources)) = tuple((
      |i: &'a str| self.operation(i),
      |i: &'a str| self.dest(i),
      many0(preceded(ws(one_char(',')), |i: &'a str| self.source(i)))
    ))(input)?;
    Ok((rest, Statement::Instruction { operation, dest, sources }))
  }

  // region Operands

  fn operation(&self, input: &'a str) -> IResult<&'a str, NodeId> {
    let (rest, (mnemonic, width, flag)) = tuple((
      identifier,
      delimited(ws(one_char('(')), decimal, ws(one_char(')'))),
      opt(delimited(ws(one_char('(')), |i: &'a str| self.flag(i), ws(one_char(')'))))
    ))(input)?;
    Ok((rest, self.alloc(Node::Operation { mnemonic, width, flag })))
  }

  fn flag(&self, input: &'a str) -> IResult<&'a str, NodeId> {
    let (rest, (invert, text, reg, subreg)) = flag_parts(input)?;
    Ok((rest, self.alloc(Node::Flag { invert, reg, subreg, text })))
  }

  fn register(&self, input: &'a str) -> IResult<&'a str, NodeId> {
    let indirect = map(
      delimited(
        pair(one_char('['), space0),
        tuple((
          preceded(tag("a0."), decimal),
          space0,
          opt(pair(one_of("+-"), preceded(space0, unsigned)))
        )),
        pair(space0, one_char(']'))
      ),
      |(address_subreg, _, offset)| {
        let offset = match offset {
          Some(('-', magnitude)) => -(magnitude as i64),
          Some((_, magnitude))   => magnitude as i64,
          None                   => 0
        };
        RegisterName::Indirect { address_subreg, offset }
      }
    );
    let (rest, name) = alt((indirect, map(identifier, RegisterName::Named)))(input)?;
    Ok((rest, self.alloc(Node::Register(name))))
  }

  fn suffix(&self, input: &'a str) -> IResult<&'a str, NodeId> {
    let (rest, (data_type, element)) = preceded(one_char('.'), pair(data_type, opt(decimal)))(input)?;
    Ok((rest, self.alloc(Node::Suffix { data_type, element })))
  }

  fn dest(&self, input: &'a str) -> IResult<&'a str, NodeId> {
    let (rest, (register, suffix, stride, mask)) = tuple((
      |i: &'a str| self.register(i),
      opt(|i: &'a str| self.suffix(i)),
      opt(map(
        delimited(one_char('<'), ws(decimal), one_char('>')),
        |hstride| self.alloc(Node::Access(Access::Stride(hstride)))
      )),
      opt(map(
        preceded(one_char('.'), channels),
        |mask| self.alloc(Node::Access(Access::WriteMask(mask)))
      ))
    ))(input)?;
    Ok((rest, self.alloc(Node::Dest { register, suffix, stride, mask })))
  }

  fn source(&self, input: &'a str) -> IResult<&'a str, NodeId> {
    alt((|i: &'a str| self.immediate(i), |i: &'a str| self.register_source(i)))(input)
  }

  fn immediate(&self, input: &'a str) -> IResult<&'a str, NodeId> {
    let (rest, literal) = alt((vector, scalar))(input)?;
    Ok((rest, self.alloc(Node::Immediate(literal))))
  }

  fn register_source(&self, input: &'a str) -> IResult<&'a str, NodeId> {
    let (rest, (negate, abs_open, register, suffix, access, abs_close)) = tuple((
      opt(terminated(one_char('-'), space0)),
      opt(terminated(one_char('|'), space0)),
      |i: &'a str| self.register(i),
      opt(|i: &'a str| self.suffix(i)),
      opt(alt((
        map(region, |region| self.alloc(Node::Access(Access::Region(region)))),
        map(preceded(one_char('.'), channels), |swizzle| self.alloc(Node::Access(Access::Swizzle(swizzle))))
      ))),
      opt(preceded(space0, one_char('|')))
    ))(input)?;
    if abs_open.is_some() != abs_close.is_some() {
      return Err(nom::Err::Error(NomError::new(input, ErrorKind::Verify)));
    }
    let node = Node::Source {
      negate : negate.is_some(),
      abs    : abs_open.is_some(),
      register,
      suffix,
      access
    };
    Ok((rest, self.alloc(node)))
  }

  // endregion
}

impl<'a> Default for Parser<'a> {
  fn default() -> Parser<'a> {
    Parser::new()
  }
}


#[cfg(test)]
mod tests {
  use super::*;

  fn parse<'a>(parser: &Parser<'a>, text: &'a str) -> Statement<'a> {
    let (rest, statement) = parser.statement(text).unwrap();
    assert!(rest.trim().is_empty(), "unparsed text `{}`", rest);
    statement
  }

  #[test]
  fn numbers(){
    assert_eq!(number("0x38"), Ok(("", Number::Integer(0x38))));
    assert_eq!(number("-16"), Ok(("", Number::Integer(-16))));
    assert_eq!(number("1.5,"), Ok((",", Number::Float(1.5))));
    assert_eq!(number("-0.25"), Ok(("", Number::Float(-0.25))));
    assert_eq!(identifier("Foo_3.f"), Ok((".f", "Foo_3")));
  }

  #[test]
  fn instruction_operands(){
    let parser = Parser::new();
    let statement = parse(&parser, "add(8) r2.f, -|r3.f2<0,1,0>|, 1.5:f");
    let arena = parser.arena();
    let (operation, sources) = match statement {
      Statement::Instruction { operation, sources, .. } => (operation, sources),
      other => panic!("unexpected statement {:?}", other)
    };
    match arena.get(operation) {
      Node::Operation { mnemonic, width, flag } => {
        assert_eq!(*mnemonic, "add");
        assert_eq!(*width, 8);
        assert!(flag.is_none());
      }
      other => panic!("unexpected node {:?}", other)
    }
    assert_eq!(sources.len(), 2);
    match arena.get(sources[0]) {
      Node::Source { negate, abs, suffix, access, .. } => {
        assert!(*negate && *abs);
        assert_eq!(arena.get(suffix.unwrap()), &Node::Suffix { data_type: DataType::F, element: Some(2) });
        assert_eq!(arena.get(access.unwrap()), &Node::Access(Access::Region(RegisterRegion::SCALAR)));
      }
      other => panic!("unexpected node {:?}", other)
    }
    assert_eq!(
      arena.get(sources[1]),
      &Node::Immediate(Literal::Scalar { value: Number::Float(1.5), suffix: Some("f") })
    );
  }

  #[test]
  fn compare_with_flag(){
    let parser = Parser::new();
    let statement = parse(&parser, "cmplt(8)(f0.1) null.f, r3.f, 0.5");
    let arena = parser.arena();
    if let Statement::Instruction { operation, .. } = statement {
      if let Node::Operation { flag: Some(flag), .. } = arena.get(operation) {
        assert_eq!(arena.get(*flag), &Node::Flag { invert: false, reg: 0, subreg: 1, text: "f0.1" });
        return;
      }
    }
    panic!("flag not parsed");
  }

  #[test]
  fn destinations(){
    let parser = Parser::new();
    let statement = parse(&parser, "mov(8) [a0.2-16].s<2>, r3.s.xyzw");
    let dest = match statement {
      Statement::Instruction { dest, .. } => dest,
      other => panic!("unexpected statement {:?}", other)
    };
    match arena_get(&parser, dest) {
      Node::Dest { register, stride, mask, .. } => {
        assert_eq!(
          arena_get(&parser, register),
          Node::Register(RegisterName::Indirect { address_subreg: 2, offset: -16 })
        );
        assert_eq!(arena_get(&parser, stride.unwrap()), Node::Access(Access::Stride(2)));
        assert!(mask.is_none());
      }
      other => panic!("unexpected node {:?}", other)
    }

    let statement = parse(&parser, "mov(4) r2.f.xz, r3.f.yyyy");
    if let Statement::Instruction { dest, .. } = statement {
      if let Node::Dest { mask: Some(mask), .. } = arena_get(&parser, dest) {
        assert_eq!(arena_get(&parser, mask), Node::Access(Access::WriteMask("xz")));
        return;
      }
    }
    panic!("write mask not parsed");
  }

  fn arena_get<'a>(parser: &Parser<'a>, id: NodeId) -> Node<'a> {
    parser.arena().get(id).clone()
  }

  #[test]
  fn declarations(){
    let parser = Parser::new();
    assert_eq!(
      parse(&parser, "curbe C[2] = {1, 2.5}, {0x10} {}"),
      Statement::Curbe {
        name   : "C",
        size   : 2,
        groups : vec![
          vec![Number::Integer(1), Number::Float(2.5)],
          vec![Number::Integer(16)],
          vec![]
        ]
      }
    );
    assert_eq!(parse(&parser, "reg out"), Statement::Reg { name: "out", size: 1 });
    assert_eq!(parse(&parser, "bind output 0x38"), Statement::Bind { name: "output", index: 0x38 });
    assert_eq!(parse(&parser, "threads 4"), Statement::Threads(4));
    assert_eq!(parse(&parser, "end"), Statement::End);
    assert_eq!(parse(&parser, "begin:"), Statement::Label("begin"));
  }

  #[test]
  fn control_flow(){
    let parser = Parser::new();
    assert_eq!(parse(&parser, "jmp loop"), Statement::Jump { label: "loop", condition: None });
    for text in &["jmpif(~f0.1) done", "jmpif(f0.1, ~) done"] {
      match parse(&parser, text) {
        Statement::Jump { label, condition: Some(flag) } => {
          assert_eq!(label, "done");
          assert_eq!(arena_get(&parser, flag), Node::Flag { invert: true, reg: 0, subreg: 1, text: "f0.1" });
        }
        other => panic!("unexpected statement {:?}", other)
      }
    }
    match parser.statement("pred(f1.0) { mov(8) r1.u, 0") {
      Ok((rest, Statement::PredicationOpen(_))) => assert_eq!(rest.trim(), "mov(8) r1.u, 0"),
      other => panic!("unexpected result {:?}", other)
    }
    assert_eq!(parse(&parser, "}"), Statement::PredicationClose);
  }

  #[test]
  fn sends_and_vectors(){
    let parser = Parser::new();
    match parse(&parser, "send dword_scattered_write_8(output), null, out") {
      Statement::Send { message, binding, .. } => {
        assert_eq!(message, "dword_scattered_write_8");
        assert_eq!(binding, "output");
      }
      other => panic!("unexpected statement {:?}", other)
    }
    match parse(&parser, "mov(8) r1.ss, v[0, 1, 2, 3, -1, -2, -3, -4]") {
      Statement::Instruction { sources, .. } => match arena_get(&parser, sources[0]) {
        Node::Immediate(Literal::Vector { kind, lanes }) => {
          assert_eq!(kind, VectorKind::Signed);
          assert_eq!(lanes.len(), 8);
        }
        other => panic!("unexpected node {:?}", other)
      },
      other => panic!("unexpected statement {:?}", other)
    }
  }

  #[test]
  fn rejects_malformed(){
    let parser = Parser::new();
    assert!(parser.statement("mov r1, r2").is_err());
    assert!(parser.statement("= 3").is_err());
    // An unbalanced absolute value ends the operand list early.
    let (rest, _) = parser.statement("add(8) r1.f, |r2.f, r3.f").unwrap();
    assert_eq!(rest, ", |r2.f, r3.f");
  }
}
