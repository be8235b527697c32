#![allow(dead_code)]

use quickcheck::{Arbitrary, Gen};
use regvm::{Assembler, Assertion, Code};

// Characters used in generated patterns and subjects. None of them needs escaping in a class.
pub const ALPHABET: &[u8] = b"ab01_ ";

// Subjects of filter cases also contain upper case forms.
const CASED_ALPHABET: &[u8] = b"ab01_ AB";

// Moves the alphabet into the Greek block: 'a' becomes U+03B1 and 'A' becomes U+0391. The map is
// monotonic, so class ranges stay sorted.
const WIDE_OFFSET: u16 = 0x350;

/// A small regex syntax tree that compiles to bytecode and prints as a `regex` crate pattern.
#[derive(Clone, Debug)]
pub enum Node {
    Lit(Vec<u8>),
    Char(u8),
    CharOr(Vec<u8>),
    Class { ranges: Vec<(u8, u8)>, negated: bool },
    Assert(Assertion),
    Concat(Vec<Node>),
    Alt(Vec<Node>),
    Group(Box<Node>),
    Star(Box<Node>),
    Plus(Box<Node>),
    Opt(Box<Node>),
    Repeat(Box<Node>, u32),
}

impl Node {
    pub fn nullable(&self) -> bool {
        match self {
            Node::Lit(_) | Node::Char(_) | Node::CharOr(_) | Node::Class { .. } => false,
            Node::Assert(_) | Node::Star(_) | Node::Opt(_) => true,
            Node::Concat(nodes) => nodes.iter().all(Node::nullable),
            Node::Alt(nodes) => nodes.iter().any(Node::nullable),
            Node::Group(node) | Node::Plus(node) | Node::Repeat(node, _) => node.nullable(),
        }
    }

    /// The equivalent pattern for `regex::bytes::Regex` with Unicode disabled.
    pub fn pattern(&self) -> String {
        match self {
            Node::Lit(bytes) => bytes.iter().map(|&b| escape(b)).collect(),
            Node::Char(b) => escape(*b),
            Node::CharOr(bytes) => {
                format!("[{}]", bytes.iter().map(|&b| b as char).collect::<String>())
            }
            Node::Class { ranges, negated } => {
                let mut s = String::from(if *negated { "[^" } else { "[" });
                for &(start, finish) in ranges {
                    s.push(start as char);
                    if start != finish {
                        s.push('-');
                        s.push(finish as char);
                    }
                }
                s.push(']');
                s
            }
            Node::Assert(assertion) => match assertion {
                Assertion::Bob => "^",
                Assertion::Eob => "$",
                Assertion::WordBoundary => r"\b",
                Assertion::NotWordBoundary => r"\B",
                Assertion::Bol => "(?m:^)",
                Assertion::Eol => "(?m:$)",
            }
            .to_string(),
            Node::Concat(nodes) => nodes
                .iter()
                .map(|node| format!("(?:{})", node.pattern()))
                .collect(),
            Node::Alt(nodes) => format!(
                "(?:{})",
                nodes.iter().map(Node::pattern).collect::<Vec<_>>().join("|")
            ),
            Node::Group(node) => format!("({})", node.pattern()),
            Node::Star(node) => format!("(?:{})*", node.pattern()),
            Node::Plus(node) => format!("(?:{})+", node.pattern()),
            Node::Opt(node) => format!("(?:{})?", node.pattern()),
            Node::Repeat(node, n) => format!("(?:{}){{{}}}", node.pattern(), n),
        }
    }

    pub fn groups(&self) -> usize {
        match self {
            Node::Concat(nodes) | Node::Alt(nodes) => nodes.iter().map(Node::groups).sum(),
            Node::Group(node) => 1 + node.groups(),
            Node::Star(node) | Node::Plus(node) | Node::Opt(node) | Node::Repeat(node, _) => {
                node.groups()
            }
            _ => 0,
        }
    }

    fn gen(g: &mut Gen, depth: u32) -> Node {
        let choice = if depth == 0 {
            u8::arbitrary(g) % 5
        } else {
            u8::arbitrary(g) % 12
        };
        match choice {
            0 => {
                let len = 1 + usize::arbitrary(g) % 3;
                Node::Lit((0..len).map(|_| gen_char(g)).collect())
            }
            1 => Node::Char(gen_char(g)),
            2 => {
                let mut bytes: Vec<u8> = ALPHABET.to_vec();
                bytes.retain(|_| bool::arbitrary(g));
                bytes.truncate(4);
                match bytes.len() {
                    0 => Node::Char(gen_char(g)),
                    1 => Node::Char(bytes[0]),
                    _ => Node::CharOr(bytes),
                }
            }
            3 => {
                // sorted and disjoint
                let mut ranges: Vec<(u8, u8)> =
                    vec![(b' ', b' '), (b'0', b'1'), (b'_', b'_'), (b'a', b'b')];
                ranges.retain(|_| bool::arbitrary(g));
                if ranges.is_empty() {
                    ranges.push((b'a', b'b'));
                }
                Node::Class {
                    ranges,
                    negated: bool::arbitrary(g),
                }
            }
            4 => Node::Assert(
                *g.choose(&[
                    Assertion::Bob,
                    Assertion::Eob,
                    Assertion::WordBoundary,
                    Assertion::NotWordBoundary,
                ])
                .unwrap(),
            ),
            5 | 6 => {
                let len = 2 + usize::arbitrary(g) % 2;
                Node::Concat((0..len).map(|_| Node::gen(g, depth - 1)).collect())
            }
            7 => {
                let len = 2 + usize::arbitrary(g) % 2;
                Node::Alt((0..len).map(|_| Node::gen(g, depth - 1)).collect())
            }
            8 => Node::Group(Box::new(Node::gen(g, depth - 1))),
            9 => Node::Star(Box::new(Node::gen_consuming(g, depth - 1))),
            10 => {
                if bool::arbitrary(g) {
                    Node::Plus(Box::new(Node::gen_consuming(g, depth - 1)))
                } else {
                    Node::Opt(Box::new(Node::gen_consuming(g, depth - 1)))
                }
            }
            _ => Node::Repeat(
                Box::new(Node::gen_consuming(g, depth - 1)),
                1 + u32::arbitrary(g) % 3,
            ),
        }
    }

    // quantified bodies never match empty; loops over empty bodies are tested by hand
    fn gen_consuming(g: &mut Gen, depth: u32) -> Node {
        let node = Node::gen(g, depth);
        if node.nullable() {
            Node::Char(gen_char(g))
        } else {
            node
        }
    }
}

fn gen_char(g: &mut Gen) -> u8 {
    *g.choose(ALPHABET).unwrap()
}

fn escape(b: u8) -> String {
    regex::escape(&(b as char).to_string())
}

impl Arbitrary for Node {
    fn arbitrary(g: &mut Gen) -> Self {
        Node::gen(g, 3)
    }
}

/// A pattern together with a subject to search.
#[derive(Clone, Debug)]
pub struct Case {
    pub node: Node,
    pub subject: Vec<u8>,
}

impl Arbitrary for Case {
    fn arbitrary(g: &mut Gen) -> Self {
        let len = usize::arbitrary(g) % 13;
        Case {
            node: Node::arbitrary(g),
            subject: (0..len).map(|_| gen_char(g)).collect(),
        }
    }
}

/// A pattern and subject for comparing filtered with unfiltered searches, optionally
/// case-insensitive and optionally over 16-bit units above the narrow range.
#[derive(Clone, Debug)]
pub struct FilterCase {
    pub node: Node,
    pub subject: Vec<u8>,
    pub ignore_case: bool,
    pub wide: bool,
}

impl FilterCase {
    pub fn compile(&self, derive_filter: bool) -> Code {
        compile_with(&self.node, derive_filter, self.ignore_case, self.wide)
    }

    pub fn wide_subject(&self) -> Vec<u16> {
        self.subject.iter().map(|&b| widen(b, true)).collect()
    }
}

impl Arbitrary for FilterCase {
    fn arbitrary(g: &mut Gen) -> Self {
        let len = usize::arbitrary(g) % 13;
        FilterCase {
            node: Node::arbitrary(g),
            subject: (0..len).map(|_| *g.choose(CASED_ALPHABET).unwrap()).collect(),
            ignore_case: bool::arbitrary(g),
            wide: bool::arbitrary(g),
        }
    }
}

fn widen(b: u8, wide: bool) -> u16 {
    if wide {
        u16::from(b) + WIDE_OFFSET
    } else {
        u16::from(b)
    }
}

struct Compiler {
    asm: Assembler,
    wide: bool,
    next_group: u32,
    next_counter: u32,
}

impl Compiler {
    fn node(&mut self, node: &Node) {
        let wide = self.wide;
        let asm = &mut self.asm;
        match node {
            Node::Lit(bytes) => {
                let units: Vec<u16> = bytes.iter().map(|&b| widen(b, wide)).collect();
                asm.check_n_chars(&units);
            }
            Node::Char(b) => asm.check_char(widen(*b, wide)),
            Node::CharOr(bytes) => {
                let units: Vec<u16> = bytes.iter().map(|&b| widen(b, wide)).collect();
                asm.check_char_or(&units);
            }
            Node::Class { ranges, negated } => {
                let ranges: Vec<(u16, u16)> = ranges
                    .iter()
                    .map(|&(start, finish)| (widen(start, wide), widen(finish, wide)))
                    .collect();
                asm.check_range(&ranges, *negated);
            }
            Node::Assert(assertion) => asm.assertion(*assertion),
            Node::Concat(nodes) => {
                for node in nodes {
                    self.node(node);
                }
            }
            Node::Alt(nodes) => {
                let end = self.asm.new_label();
                for (i, node) in nodes.iter().enumerate() {
                    if i + 1 == nodes.len() {
                        self.node(node);
                    } else {
                        let next = self.asm.new_label();
                        self.asm.push_backtrack(next);
                        self.node(node);
                        self.asm.jump(end);
                        self.asm.bind(next);
                    }
                }
                self.asm.bind(end);
            }
            Node::Group(node) => {
                let group = self.next_group;
                self.next_group += 1;
                self.asm.start_capture(group);
                self.node(node);
                self.asm.end_capture(group);
            }
            Node::Star(node) => self.star(node),
            Node::Plus(node) => {
                // the groups inside are numbered once
                let group = self.next_group;
                self.node(node);
                self.next_group = group;
                self.star(node);
            }
            Node::Opt(node) => {
                let skip = self.asm.new_label();
                self.asm.push_backtrack(skip);
                self.node(node);
                self.asm.bind(skip);
            }
            Node::Repeat(node, n) => {
                let counter = self.next_counter;
                self.next_counter += 1;
                let body = self.asm.new_label();
                self.asm.counter_zero(counter);
                self.asm.bind(body);
                self.node(node);
                self.asm.counter_next(counter, *n, body);
            }
        }
    }

    fn star(&mut self, node: &Node) {
        let top = self.asm.new_label();
        let exit = self.asm.new_label();
        self.asm.bind(top);
        self.asm.push_backtrack(exit);
        self.node(node);
        self.asm.jump(top);
        self.asm.bind(exit);
    }
}

/// Compile `node` into a program with one group per `Node::Group` plus the whole match.
pub fn compile(node: &Node, derive_filter: bool) -> Code {
    compile_with(node, derive_filter, false, false)
}

/// Like [`compile`], case-insensitive if `ignore_case`, and with every character moved above the
/// narrow range if `wide`.
pub fn compile_with(node: &Node, derive_filter: bool, ignore_case: bool, wide: bool) -> Code {
    let mut compiler = Compiler {
        asm: Assembler::new(),
        wide,
        next_group: 1,
        next_counter: 0,
    };
    compiler.node(node);
    let Compiler {
        mut asm,
        next_counter,
        ..
    } = compiler;
    asm.success();
    asm.ignore_case(ignore_case).derive_filter(derive_filter);
    asm.finish(1 + node.groups(), next_counter as usize).unwrap()
}
