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

//! Compiled programs.

use bit_set::BitSet;
use std::fmt;

use crate::error::CodeError;
use crate::op::Insn;
use crate::prefilter::Filter;
use crate::Result;

/// An immutable, validated bytecode program together with the metadata the VM needs to run it.
///
/// `Code` is never mutated by execution, so a single program can be shared (for example in an
/// `Arc`) by any number of [`Vm`](crate::Vm)s on different threads.
///
/// # State layout
///
/// Running a program uses a state vector of [`Code::frame_size`] integers:
///
/// ```text
/// [ group 0 start, group 0 end, ..., group n-1 end ][ slot 0, ..., slot m-1 ][ target ]
///   0                                                captures * 2             frame_size - 1
/// ```
///
/// Scratch slots hold counters, positions saved by `StorePosition` and stack depths saved by
/// `StoreSp`. The final integer is only meaningful inside a backtrack frame, where it holds the
/// continuation target.
#[derive(Clone)]
pub struct Code {
    bytes: Box<[u8]>,
    captures: usize,
    counters: usize,
    ignore_case: bool,
    filter: Option<Filter>,
}

impl Code {
    /// Validate `bytes` and wrap it into a program with `captures` groups (including group 0) and
    /// `counters` scratch slots.
    ///
    /// Validation checks the structure of the stream: every tag is known and complete, capture
    /// and slot operands are in range, jump targets land on instruction boundaries and the last
    /// instruction does not fall through. Range tables are not checked for sortedness.
    ///
    /// # Errors
    ///
    /// Returns an [`Error::CodeError`](crate::Error::CodeError) describing the first problem.
    pub fn new(bytes: impl Into<Vec<u8>>, captures: usize, counters: usize) -> Result<Code> {
        let bytes = bytes.into().into_boxed_slice();
        validate(&bytes, captures, counters)?;
        Ok(Code {
            bytes,
            captures,
            counters,
            ignore_case: false,
            filter: None,
        })
    }

    /// Make `CheckNChars` also match the upper and lower case forms of its units.
    #[must_use]
    pub fn with_ignore_case(mut self, ignore_case: bool) -> Code {
        self.ignore_case = ignore_case;
        self
    }

    /// Set the quick-check filter. The filter must accept the first unit of every possible
    /// match, and it must not be set for programs that can match the empty string.
    #[must_use]
    pub fn with_filter(mut self, filter: Option<Filter>) -> Code {
        self.filter = filter;
        self
    }

    /// The raw instruction stream.
    #[inline]
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Number of capture groups, including the whole match.
    #[inline]
    #[must_use]
    pub fn captures(&self) -> usize {
        self.captures
    }

    /// Number of scratch slots.
    #[inline]
    #[must_use]
    pub fn counters(&self) -> usize {
        self.counters
    }

    /// Whether literal runs match case-insensitively.
    #[inline]
    #[must_use]
    pub fn ignore_case(&self) -> bool {
        self.ignore_case
    }

    /// The quick-check filter, if any.
    #[inline]
    #[must_use]
    pub fn filter(&self) -> Option<Filter> {
        self.filter
    }

    /// Length of the state vector and of one backtrack frame.
    #[inline]
    #[must_use]
    pub fn frame_size(&self) -> usize {
        self.captures * 2 + self.counters + 1
    }

    #[inline]
    pub(crate) fn fetch(&self, pc: usize) -> (Insn<'_>, usize) {
        match Insn::decode(&self.bytes, pc) {
            Ok(decoded) => decoded,
            Err(e) => unreachable!("validated program failed to decode: {}", e),
        }
    }

    /// Iterate over the instructions together with their byte offsets.
    #[must_use]
    pub fn instructions(&self) -> Instructions<'_> {
        Instructions {
            bytes: &self.bytes,
            pc: 0,
        }
    }

    #[cfg(debug_assertions)]
    #[doc(hidden)]
    pub fn debug_print(&self) {
        println!("{:?}", self);
    }
}

impl fmt::Debug for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "captures: {}, counters: {}, ignore_case: {}, filter: {:?}",
            self.captures, self.counters, self.ignore_case, self.filter
        )?;
        for (pc, insn) in self.instructions() {
            writeln!(f, "{:4}: {:?}", pc, insn)?;
        }
        Ok(())
    }
}

/// Iterator over the instructions of a [`Code`], see [`Code::instructions`].
#[derive(Debug, Clone)]
pub struct Instructions<'c> {
    bytes: &'c [u8],
    pc: usize,
}

impl<'c> Iterator for Instructions<'c> {
    type Item = (usize, Insn<'c>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.pc >= self.bytes.len() {
            return None;
        }
        let pc = self.pc;
        let (insn, len) = Insn::decode(self.bytes, pc).ok()?;
        self.pc += len;
        Some((pc, insn))
    }
}

fn validate(bytes: &[u8], captures: usize, counters: usize) -> ::std::result::Result<(), CodeError> {
    if captures == 0 {
        return Err(CodeError::NoCaptures);
    }
    if bytes.is_empty() {
        return Err(CodeError::Empty);
    }
    let mut starts = BitSet::with_capacity(bytes.len());
    let mut jumps = Vec::new();
    let mut pc = 0;
    let mut last = (0, true);
    while pc < bytes.len() {
        let (insn, len) = Insn::decode(bytes, pc)?;
        starts.insert(pc);
        check_operands(&insn, pc, captures, counters)?;
        if let Some(target) = insn.target() {
            jumps.push((pc, target as usize));
        }
        last = (pc, insn.falls_through());
        pc += len;
    }
    if let (pc, true) = last {
        return Err(CodeError::FallsOffEnd(pc));
    }
    for (pc, target) in jumps {
        if !starts.contains(target) {
            return Err(CodeError::InvalidTarget { pc, target });
        }
    }
    Ok(())
}

fn check_operands(
    insn: &Insn<'_>,
    pc: usize,
    captures: usize,
    counters: usize,
) -> ::std::result::Result<(), CodeError> {
    match *insn {
        Insn::StartCapture(group) | Insn::EndCapture(group) if group as usize >= captures => {
            Err(CodeError::InvalidCapture(pc))
        }
        Insn::ClearCaptures { from, to } if from > to || to as usize > captures => {
            Err(CodeError::InvalidCapture(pc))
        }
        Insn::StoreSp(slot)
        | Insn::StorePosition(slot)
        | Insn::PositionTest(slot)
        | Insn::AssertionFailure(slot)
        | Insn::CounterZero(slot)
        | Insn::AssertionSuccess { slot, .. }
        | Insn::CounterNext { slot, .. }
            if slot as usize >= counters =>
        {
            Err(CodeError::InvalidSlot(pc))
        }
        Insn::CounterNext { max, .. } if i32::try_from(max).is_err() => {
            Err(CodeError::InvalidRepeatMax(pc))
        }
        _ => Ok(()),
    }
}
