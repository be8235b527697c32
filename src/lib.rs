// Copyright 2026 The Regvm Authors.
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN
// THE SOFTWARE.

/*!
A backtracking virtual machine for compiled regexes.

This crate runs regex programs that were already compiled to a compact bytecode. It does not
parse patterns; a front end (or the [`Assembler`]) produces the byte stream, [`Code`] validates
it once, and a [`Vm`] executes it against subjects of 8-bit ([`u8`]) or 16-bit ([`u16`]) code
units.

The engine is a backtracking interpreter, so it supports the features of ECMAScript
style regexes: back references, look-ahead and look-behind bodies, bounded repetition with
counters and an empty-iteration guard for loops. Like every backtracking engine it can take
exponential time on some programs and inputs ("catastrophic backtracking").

# Usage

Programs are run by a [`Vm`], which owns the scratch buffers and can be reused for many
searches. The result of a search is the leftmost match with its capture groups.

## Example: Assembling and running a program

The program for `/ab+c/`:

```rust
use regvm::{Assembler, Vm};

let mut asm = Assembler::new();
let repeat = asm.new_label();
let exit = asm.new_label();
asm.check_char(u16::from(b'a'));
asm.check_char(u16::from(b'b'));
asm.bind(repeat);
asm.push_backtrack(exit);
asm.check_char(u16::from(b'b'));
asm.jump(repeat);
asm.bind(exit);
asm.check_char(u16::from(b'c'));
asm.success();
asm.derive_filter(true);
let code = asm.finish(1, 0).unwrap();

let mut vm = Vm::new();
let captures = vm.search(&code, b"xxabbbcxx", 0).unwrap().expect("No match found");
assert_eq!(captures.get(0), Some(2..7));

// the same program on a UTF-16 subject
let wide: Vec<u16> = "\u{3a9}abc".encode_utf16().collect();
let captures = vm.search(&code, &wide, 0).unwrap().expect("No match found");
assert_eq!(captures.get(0), Some(1..4));

assert!(vm.search(&code, b"xxabxx", 0).unwrap().is_none());
```

## Example: Loading raw bytecode

[`Code::new`] takes the instruction stream as produced by a compiler. Malformed streams are
rejected before they can run.

```rust
use regvm::{Code, CodeError, Error, Opcode};

// ^a
let bytes = vec![
    Opcode::AssertionBob as u8,
    Opcode::Check1ByteChar as u8,
    b'a',
    Opcode::Success as u8,
];
let code = Code::new(bytes, 1, 0).unwrap();
assert!(regvm::Vm::new().search(&code, b"ab", 0).unwrap().is_some());

let result = Code::new(vec![0xff], 1, 0);
assert_eq!(
    result.unwrap_err(),
    Error::CodeError(CodeError::UnknownOpcode { pc: 0, tag: 0xff })
);
```

## Example: Limiting the stack

```rust
use regvm::{Error, RuntimeError, VmBuilder};
# use regvm::Assembler;
# let mut asm = Assembler::new();
# let repeat = asm.new_label();
# let exit = asm.new_label();
# asm.bind(repeat);
# asm.push_backtrack(exit);
# asm.check_char(u16::from(b'a'));
# asm.jump(repeat);
# asm.bind(exit);
# asm.check_char(u16::from(b'b'));
# asm.success();
# let code = asm.finish(1, 0).unwrap();

// `code` is the program for /a*b/
let mut vm = VmBuilder::new().max_stack(100).build();
let subject = vec![b'a'; 1000];
assert_eq!(
    vm.search(&code, &subject, 0),
    Err(Error::RuntimeError(RuntimeError::StackOverflow))
);
```

# Outcomes

Every search ends in one of three ways:

* a match: `Ok(true)` from [`Vm::execute`], `Ok(Some(_))` from [`Vm::search`],
* no match: `Ok(false)` or `Ok(None)`,
* a fatal error: [`Error::RuntimeError`], when the backtrack stack could not grow. No partial
  result is reported in that case.
*/

#![deny(missing_docs)]
#![deny(missing_debug_implementations)]
#![warn(clippy::pedantic)]
#![allow(clippy::enum_glob_use)]
#![allow(clippy::if_not_else)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::redundant_else)]
#![allow(clippy::similar_names)]

use std::iter::FusedIterator;
use std::ops::Range;
use std::slice::ChunksExact;

pub mod analyze;
mod assemble;
pub mod character;
mod code;
mod error;
pub mod op;
mod prefilter;
mod vm;

pub use crate::assemble::{Assembler, Label};
pub use crate::character::CodeUnit;
pub use crate::code::{Code, Instructions};
pub use crate::error::{CodeError, Error, Result, RuntimeError};
pub use crate::op::{Assertion, Insn, Opcode};
pub use crate::prefilter::Filter;
pub use crate::vm::{Vm, UNDEFINED};

#[derive(Copy, Clone, Debug)]
struct VmOptions {
    initial_stack_size: usize,
    max_stack: Option<usize>,
    trace: bool,
}

impl Default for VmOptions {
    fn default() -> Self {
        VmOptions {
            initial_stack_size: vm::DEFAULT_INITIAL_STACK_SIZE,
            max_stack: None,
            trace: false,
        }
    }
}

/// A builder for a [`Vm`] to allow configuring options.
#[derive(Debug, Copy, Clone, Default)]
pub struct VmBuilder(VmOptions);

impl VmBuilder {
    /// Create a new VM builder with default options.
    #[must_use]
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the [`Vm`].
    #[must_use]
    #[inline]
    pub fn build(&self) -> Vm {
        Vm::with_options(&self.0)
    }

    /// Capacity of the backtrack stack allocated up front, in integers. The stack grows on
    /// demand beyond it.
    ///
    /// Default is `4096`.
    #[inline]
    pub fn initial_stack_size(&mut self, size: usize) -> &mut Self {
        self.0.initial_stack_size = size;
        self
    }

    /// Limit the number of backtrack frames. If this limit is exceeded, execution returns an
    /// [`Error::RuntimeError`] with [`RuntimeError::StackOverflow`]. This is for preventing a
    /// program with catastrophic backtracking from consuming too much memory.
    ///
    /// By default the stack grows until allocation fails.
    #[inline]
    pub fn max_stack(&mut self, frames: usize) -> &mut Self {
        self.0.max_stack = Some(frames);
        self
    }

    /// Print every executed instruction and stack operation to stderr. Only has an effect in
    /// debug builds.
    #[inline]
    pub fn trace(&mut self, yes: bool) -> &mut Self {
        self.0.trace = yes;
        self
    }
}

/// The capture groups of a match, as returned by [`Vm::search`].
///
/// Offsets count code units of the subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Captures {
    slots: Vec<i32>,
}

#[allow(clippy::len_without_is_empty)]
impl Captures {
    pub(crate) fn new(slots: Vec<i32>) -> Captures {
        Captures { slots }
    }

    /// Get the capture group by its index.
    ///
    /// If the group did not participate in the match or the index does not correspond to a
    /// group, `None` is returned. The index 0 returns the whole match.
    #[must_use]
    #[inline]
    pub fn get(&self, i: usize) -> Option<Range<usize>> {
        let slot = i.saturating_mul(2);
        if slot >= self.slots.len() {
            return None;
        }
        span(&self.slots[slot..slot + 2])
    }

    /// Iterate over the groups in order. The first item is the whole match.
    #[must_use]
    #[inline]
    pub fn iter(&self) -> SubCaptureMatches<'_> {
        SubCaptureMatches(self.slots.chunks_exact(2))
    }

    /// Number of groups, including the whole match.
    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len() / 2
    }

    /// The raw start/end pairs, [`UNDEFINED`] for groups that did not participate.
    #[must_use]
    #[inline]
    pub fn as_slots(&self) -> &[i32] {
        &self.slots
    }
}

impl<'c> IntoIterator for &'c Captures {
    type IntoIter = SubCaptureMatches<'c>;
    type Item = Option<Range<usize>>;
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

fn span(pair: &[i32]) -> Option<Range<usize>> {
    let start = usize::try_from(pair[0]).ok()?;
    let end = usize::try_from(pair[1]).ok()?;
    Some(start..end)
}

/// Iterator for captured groups in order.
#[derive(Debug)]
pub struct SubCaptureMatches<'c>(ChunksExact<'c, i32>);

impl<'c> Iterator for SubCaptureMatches<'c> {
    type Item = Option<Range<usize>>;

    fn next(&mut self) -> Option<Option<Range<usize>>> {
        self.0.next().map(span)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.0.size_hint()
    }

    fn count(self) -> usize {
        self.0.count()
    }
}

impl<'c> DoubleEndedIterator for SubCaptureMatches<'c> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.0.next_back().map(span)
    }
}

impl<'c> ExactSizeIterator for SubCaptureMatches<'c> {
    fn len(&self) -> usize {
        self.0.len()
    }
}

impl<'c> FusedIterator for SubCaptureMatches<'c> {}

// Access to some internals for tests and debugging.
#[doc(hidden)]
pub mod internal {
    pub use crate::analyze::leading_filter;
    pub use crate::vm::{run_default, run_trace};
}
