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

//! Emit programs instruction by instruction.
//!
//! The assembler writes the byte stream described in [`op`](crate::op) and takes care of jump
//! targets: branching instructions refer to [`Label`]s, which can be bound before or after the
//! jump. Targets are filled in by [`Assembler::finish`], which also validates the result.
//!
//! ```
//! use regvm::{Assembler, Vm};
//!
//! // a|b, written as a branch
//! let mut asm = Assembler::new();
//! let other = asm.new_label();
//! let done = asm.new_label();
//! asm.push_backtrack(other);
//! asm.check_char(u16::from(b'a'));
//! asm.jump(done);
//! asm.bind(other);
//! asm.check_char(u16::from(b'b'));
//! asm.bind(done);
//! asm.success();
//! let code = asm.finish(1, 0).unwrap();
//!
//! let caps = Vm::new().search(&code, b"xxb", 0).unwrap().unwrap();
//! assert_eq!(caps.get(0), Some(2..3));
//! ```

use crate::analyze;
use crate::code::Code;
use crate::error::CodeError;
use crate::op::{Assertion, Opcode};
use crate::prefilter::Filter;
use crate::{Error, Result};

/// A position in the program that jumps can refer to before it is known.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Label(usize);

/// Builder for [`Code`].
#[derive(Debug, Default)]
pub struct Assembler {
    bytes: Vec<u8>,
    labels: Vec<Option<u32>>,
    // (operand offset, instruction offset, label)
    holes: Vec<(usize, usize, Label)>,
    ignore_case: bool,
    filter: Option<Filter>,
    derive_filter: bool,
}

impl Assembler {
    /// Create an empty assembler.
    #[must_use]
    pub fn new() -> Assembler {
        Assembler::default()
    }

    /// Byte offset of the next instruction.
    #[must_use]
    pub fn pc(&self) -> usize {
        self.bytes.len()
    }

    /// Create a label that is not bound yet.
    pub fn new_label(&mut self) -> Label {
        self.labels.push(None);
        Label(self.labels.len() - 1)
    }

    /// Bind `label` to the next instruction.
    ///
    /// # Panics
    ///
    /// Panics if the label is already bound.
    pub fn bind(&mut self, label: Label) {
        let pc = self.pc_u32();
        let slot = &mut self.labels[label.0];
        assert!(slot.is_none(), "label {:?} bound twice", label);
        *slot = Some(pc);
    }

    /// Make literal runs ([`Assembler::check_n_chars`]) match case-insensitively.
    pub fn ignore_case(&mut self, yes: bool) -> &mut Self {
        self.ignore_case = yes;
        self
    }

    /// Use this quick-check filter for the program.
    pub fn filter(&mut self, filter: Option<Filter>) -> &mut Self {
        self.filter = filter;
        self
    }

    /// Derive the quick-check filter from the program when finishing, see
    /// [`leading_filter`](crate::analyze::leading_filter). Overrides [`Assembler::filter`].
    pub fn derive_filter(&mut self, yes: bool) -> &mut Self {
        self.derive_filter = yes;
        self
    }

    /// `StoreSp`
    pub fn store_sp(&mut self, slot: u32) {
        self.op(Opcode::StoreSp);
        self.put4(slot);
    }

    /// `StorePosition`
    pub fn store_position(&mut self, slot: u32) {
        self.op(Opcode::StorePosition);
        self.put4(slot);
    }

    /// `PositionTest`
    pub fn position_test(&mut self, slot: u32) {
        self.op(Opcode::PositionTest);
        self.put4(slot);
    }

    /// `AssertionSuccess`: end of a look-around body that succeeded.
    pub fn assertion_success(&mut self, slot: u32, target: Label) {
        let pc = self.op(Opcode::AssertionSuccess);
        self.put4(slot);
        self.put_target(pc, target);
    }

    /// `AssertionFailure`: end of a negative look-around body that matched.
    pub fn assertion_failure(&mut self, slot: u32) {
        self.op(Opcode::AssertionFailure);
        self.put4(slot);
    }

    /// One of the zero-width assertions.
    pub fn assertion(&mut self, assertion: Assertion) {
        self.op(assertion.opcode());
    }

    /// `StartCapture`
    pub fn start_capture(&mut self, group: u32) {
        self.op(Opcode::StartCapture);
        self.put4(group);
    }

    /// `EndCapture`
    pub fn end_capture(&mut self, group: u32) {
        self.op(Opcode::EndCapture);
        self.put4(group);
    }

    /// `ClearCaptures` for groups `from..to`.
    pub fn clear_captures(&mut self, from: u32, to: u32) {
        self.op(Opcode::ClearCaptures);
        self.put4(from);
        self.put4(to);
    }

    /// `CounterZero`
    pub fn counter_zero(&mut self, slot: u32) {
        self.op(Opcode::CounterZero);
        self.put4(slot);
    }

    /// `CounterNext`: jump back to `target` while the incremented counter is below `max`.
    ///
    /// `finish` rejects a `max` above `i32::MAX`.
    pub fn counter_next(&mut self, slot: u32, max: u32, target: Label) {
        let pc = self.op(Opcode::CounterNext);
        self.put4(slot);
        self.put4(max);
        self.put_target(pc, target);
    }

    /// `PushBacktrack`: continue here, resume at `target` on failure.
    pub fn push_backtrack(&mut self, target: Label) {
        let pc = self.op(Opcode::PushBacktrack);
        self.put_target(pc, target);
    }

    /// `BackReference` or `BackReferenceIgnoreCase`.
    pub fn back_reference(&mut self, group: u16, ignore_case: bool) {
        self.op(if ignore_case {
            Opcode::BackReferenceIgnoreCase
        } else {
            Opcode::BackReference
        });
        self.put2(group);
    }

    /// Match one unit, using the one byte form when it fits.
    pub fn check_char(&mut self, ch: u16) {
        match u8::try_from(ch) {
            Ok(b) => {
                self.op(Opcode::Check1ByteChar);
                self.bytes.push(b);
            }
            Err(_) => {
                self.op(Opcode::Check2ByteChar);
                self.put2(ch);
            }
        }
    }

    /// Match any of 2 to 4 units.
    ///
    /// # Panics
    ///
    /// Panics for any other number of units.
    pub fn check_char_or(&mut self, units: &[u16]) {
        self.op(match units.len() {
            2 => Opcode::Check2CharOr,
            3 => Opcode::Check3CharOr,
            4 => Opcode::Check4CharOr,
            n => panic!("CheckCharOr takes 2 to 4 units, got {}", n),
        });
        for &unit in units {
            self.put2(unit);
        }
    }

    /// Match a unit inside (or outside, if `inverted`) the inclusive ranges, which must be
    /// sorted and disjoint.
    pub fn check_range(&mut self, ranges: &[(u16, u16)], inverted: bool) {
        self.op(if inverted {
            Opcode::CheckRangeInverted
        } else {
            Opcode::CheckRange
        });
        let count: u32 = ranges
            .iter()
            .map(|&(start, finish)| u32::from(finish) - u32::from(start) + 1)
            .sum();
        self.put4(to_u32(ranges.len() * 4));
        self.put4(count);
        for &(start, finish) in ranges {
            self.put2(start);
            self.put2(finish);
        }
    }

    /// Match a run of units.
    ///
    /// # Panics
    ///
    /// Panics if `units` is empty.
    pub fn check_n_chars(&mut self, units: &[u16]) {
        assert!(!units.is_empty(), "empty literal");
        self.op(Opcode::CheckNChars);
        self.put4(to_u32(units.len()));
        for &unit in units {
            self.put2(unit);
        }
    }

    /// Unconditional jump.
    pub fn jump(&mut self, target: Label) {
        let pc = self.op(Opcode::Jump);
        self.put_target(pc, target);
    }

    /// Unconditional failure.
    pub fn failure(&mut self) {
        self.op(Opcode::Failure);
    }

    /// Report a match.
    pub fn success(&mut self) {
        self.op(Opcode::Success);
    }

    /// Resolve labels and build the program.
    ///
    /// # Errors
    ///
    /// Returns [`CodeError::UnboundLabel`] with the offset of the first jump to a label that was
    /// never bound, or any error of [`Code::new`].
    pub fn finish(mut self, captures: usize, counters: usize) -> Result<Code> {
        for &(at, pc, label) in &self.holes {
            let target = self.labels[label.0]
                .ok_or(Error::CodeError(CodeError::UnboundLabel(pc)))?;
            self.bytes[at..at + 4].copy_from_slice(&target.to_le_bytes());
        }
        let code = Code::new(self.bytes, captures, counters)?.with_ignore_case(self.ignore_case);
        let filter = if self.derive_filter {
            analyze::leading_filter(&code)
        } else {
            self.filter
        };
        Ok(code.with_filter(filter))
    }

    fn op(&mut self, op: Opcode) -> usize {
        let pc = self.pc();
        self.bytes.push(op as u8);
        pc
    }

    fn put2(&mut self, value: u16) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    fn put4(&mut self, value: u32) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    fn put_target(&mut self, pc: usize, target: Label) {
        self.holes.push((self.pc(), pc, target));
        self.put4(0);
    }

    fn pc_u32(&self) -> u32 {
        to_u32(self.pc())
    }
}

fn to_u32(n: usize) -> u32 {
    match u32::try_from(n) {
        Ok(n) => n,
        Err(_) => panic!("program too large"),
    }
}
