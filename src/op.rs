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

//! Instruction set of the VM.
//!
//! A program is a flat byte stream. Every instruction starts with a one byte tag ([`Opcode`])
//! followed by little-endian immediates whose number and width depend on the tag. Jump targets
//! are absolute byte offsets into the stream.
//!
//! | opcode                     | immediates                                    | length      |
//! |----------------------------|-----------------------------------------------|-------------|
//! | `StoreSp`                  | slot: u32                                     | 5           |
//! | `StorePosition`            | slot: u32                                     | 5           |
//! | `PositionTest`             | slot: u32                                     | 5           |
//! | `AssertionSuccess`         | slot: u32, target: u32                        | 9           |
//! | `AssertionFailure`         | slot: u32                                     | 5           |
//! | `Assertion*`               |                                               | 1           |
//! | `StartCapture`             | group: u32                                    | 5           |
//! | `EndCapture`               | group: u32                                    | 5           |
//! | `ClearCaptures`            | from: u32, to: u32                            | 9           |
//! | `CounterZero`              | slot: u32                                     | 5           |
//! | `CounterNext`              | slot: u32, max: u32, target: u32              | 13          |
//! | `PushBacktrack`            | target: u32                                   | 5           |
//! | `BackReference[IgnoreCase]`| group: u16                                    | 3           |
//! | `Check1ByteChar`           | ch: u8                                        | 2           |
//! | `Check2ByteChar`           | ch: u16                                       | 3           |
//! | `Check{2,3,4}CharOr`       | n × ch: u16                                   | 1 + 2n      |
//! | `CheckRange[Inverted]`     | len: u32, count: u32, (start: u16, end: u16)* | 9 + len     |
//! | `CheckNChars`              | n: u32, n × ch: u16                           | 5 + 2n      |
//! | `Jump`                     | target: u32                                   | 5           |
//! | `Failure`, `Success`       |                                               | 1           |

use crate::error::CodeError;

/// One byte instruction tag.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum Opcode {
    StoreSp = 0,
    StorePosition,
    PositionTest,
    AssertionSuccess,
    AssertionFailure,
    AssertionBol,
    AssertionBob,
    AssertionEol,
    AssertionEob,
    AssertionWordBoundary,
    AssertionWordBoundaryInverted,
    StartCapture,
    EndCapture,
    ClearCaptures,
    CounterZero,
    CounterNext,
    PushBacktrack,
    BackReference,
    BackReferenceIgnoreCase,
    Check1ByteChar,
    Check2ByteChar,
    Check2CharOr,
    Check3CharOr,
    Check4CharOr,
    CheckRange,
    CheckRangeInverted,
    CheckNChars,
    Jump,
    Failure,
    Success,
}

// indexed by tag
const OPCODES: [Opcode; 30] = [
    Opcode::StoreSp,
    Opcode::StorePosition,
    Opcode::PositionTest,
    Opcode::AssertionSuccess,
    Opcode::AssertionFailure,
    Opcode::AssertionBol,
    Opcode::AssertionBob,
    Opcode::AssertionEol,
    Opcode::AssertionEob,
    Opcode::AssertionWordBoundary,
    Opcode::AssertionWordBoundaryInverted,
    Opcode::StartCapture,
    Opcode::EndCapture,
    Opcode::ClearCaptures,
    Opcode::CounterZero,
    Opcode::CounterNext,
    Opcode::PushBacktrack,
    Opcode::BackReference,
    Opcode::BackReferenceIgnoreCase,
    Opcode::Check1ByteChar,
    Opcode::Check2ByteChar,
    Opcode::Check2CharOr,
    Opcode::Check3CharOr,
    Opcode::Check4CharOr,
    Opcode::CheckRange,
    Opcode::CheckRangeInverted,
    Opcode::CheckNChars,
    Opcode::Jump,
    Opcode::Failure,
    Opcode::Success,
];

impl Opcode {
    /// Decode a tag byte.
    #[inline]
    #[must_use]
    pub fn from_byte(tag: u8) -> Option<Opcode> {
        OPCODES.get(usize::from(tag)).copied()
    }

    /// Length of the instruction in bytes, not counting the variable sized tail of
    /// `CheckRange`, `CheckRangeInverted` and `CheckNChars`.
    #[must_use]
    pub fn length(self) -> usize {
        use Opcode::*;
        match self {
            AssertionBol | AssertionBob | AssertionEol | AssertionEob | AssertionWordBoundary
            | AssertionWordBoundaryInverted | Failure | Success => 1,
            Check1ByteChar => 2,
            BackReference | BackReferenceIgnoreCase | Check2ByteChar => 3,
            StoreSp | StorePosition | PositionTest | AssertionFailure | StartCapture
            | EndCapture | CounterZero | PushBacktrack | Jump | CheckNChars | Check2CharOr => 5,
            Check3CharOr => 7,
            AssertionSuccess | ClearCaptures | Check4CharOr | CheckRange | CheckRangeInverted => 9,
            CounterNext => 13,
        }
    }
}

/// Zero-width assertions that only look at the subject around the current position.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Assertion {
    /// Beginning of subject
    Bob,
    /// End of subject
    Eob,
    /// Beginning of subject or after a line terminator
    Bol,
    /// End of subject or before a line terminator
    Eol,
    /// Word-ness differs on both sides of the position
    WordBoundary,
    /// Word-ness is the same on both sides of the position
    NotWordBoundary,
}

impl Assertion {
    pub(crate) fn opcode(self) -> Opcode {
        match self {
            Assertion::Bob => Opcode::AssertionBob,
            Assertion::Eob => Opcode::AssertionEob,
            Assertion::Bol => Opcode::AssertionBol,
            Assertion::Eol => Opcode::AssertionEol,
            Assertion::WordBoundary => Opcode::AssertionWordBoundary,
            Assertion::NotWordBoundary => Opcode::AssertionWordBoundaryInverted,
        }
    }
}

/// A run of 16-bit units encoded inline in the program.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct Units<'c>(&'c [u8]);

impl<'c> Units<'c> {
    /// Number of units.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len() / 2
    }

    /// Always false for validated programs.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The unit at index `i`.
    #[inline]
    #[must_use]
    pub fn get(&self, i: usize) -> u16 {
        load2(self.0, i * 2)
    }

    /// Iterate over the units.
    pub fn iter(&self) -> impl Iterator<Item = u16> + 'c {
        let bytes = self.0;
        bytes.chunks_exact(2).map(|c| u16::from_le_bytes([c[0], c[1]]))
    }

    /// Whether `ch` is one of the units.
    #[inline]
    #[must_use]
    pub fn contains(&self, ch: u16) -> bool {
        self.iter().any(|u| u == ch)
    }
}

impl<'c> std::fmt::Debug for Units<'c> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// A table of inclusive `[start, finish]` ranges, sorted ascending and disjoint.
///
/// Sortedness is a precondition established by whoever produced the program, it is not checked.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct Ranges<'c> {
    table: &'c [u8],
    count: u32,
}

impl<'c> Ranges<'c> {
    /// Number of units covered by the table, as recorded by the producer.
    #[inline]
    #[must_use]
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Iterate over `(start, finish)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (u16, u16)> + 'c {
        let table = self.table;
        table.chunks_exact(4).map(|c| {
            (
                u16::from_le_bytes([c[0], c[1]]),
                u16::from_le_bytes([c[2], c[3]]),
            )
        })
    }

    /// Whether `ch` falls into one of the ranges. Stops at the first range starting above `ch`.
    #[inline]
    #[must_use]
    pub fn contains(&self, ch: u16) -> bool {
        for (start, finish) in self.iter() {
            if ch < start {
                return false;
            }
            if ch <= finish {
                return true;
            }
        }
        false
    }
}

impl<'c> std::fmt::Debug for Ranges<'c> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.iter().map(|(start, finish)| start..=finish))
            .finish()
    }
}

/// A decoded instruction, borrowing its inline tables from the program.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Insn<'c> {
    /// Save the depth of the backtrack stack into the slot
    StoreSp(u32),
    /// Save the current position into the slot
    StorePosition(u32),
    /// Fail if the current position equals the one saved in the slot
    PositionTest(u32),
    /// Look-around body matched: cut the stack back to the depth saved in `slot`, restore the
    /// position from the frame found there and jump to `target`
    AssertionSuccess {
        /// Slot written by `StoreSp`
        slot: u32,
        /// Continuation
        target: u32,
    },
    /// Cut the stack back to the depth saved in the slot, then fail
    AssertionFailure(u32),
    /// Zero-width test
    Assertion(Assertion),
    /// Record the start of a group (and forget its end)
    StartCapture(u32),
    /// Record the end of a group
    EndCapture(u32),
    /// Reset groups `from..to`
    ClearCaptures {
        /// First group
        from: u32,
        /// One past the last group
        to: u32,
    },
    /// Set a counter to zero
    CounterZero(u32),
    /// Increment a counter and jump to `target` while it is below `max`
    CounterNext {
        /// Counter slot
        slot: u32,
        /// Exclusive upper bound
        max: u32,
        /// Loop body
        target: u32,
    },
    /// Save a backtrack frame resuming at the target
    PushBacktrack(u32),
    /// Match the text of a group again
    BackReference {
        /// Group number
        group: u16,
        /// Case insensitive
        casei: bool,
    },
    /// Match one unit that fits in a byte
    Check1ByteChar(u8),
    /// Match one unit
    Check2ByteChar(u16),
    /// Match any of 2 to 4 units
    CheckCharOr(Units<'c>),
    /// Match a unit inside (or, inverted, outside) the ranges
    CheckRange {
        /// The ranges
        ranges: Ranges<'c>,
        /// Match outside the ranges instead
        inverted: bool,
    },
    /// Match a run of units
    CheckNChars(Units<'c>),
    /// Unconditional jump
    Jump(u32),
    /// Unconditional failure
    Failure,
    /// The program matched
    Success,
}

impl<'c> Insn<'c> {
    /// Decode the instruction at `pc`, returning it together with its length in bytes.
    ///
    /// # Errors
    ///
    /// Returns a [`CodeError`] if the tag is unknown or the instruction does not fit in `code`.
    #[allow(clippy::too_many_lines)]
    pub fn decode(code: &'c [u8], pc: usize) -> Result<(Insn<'c>, usize), CodeError> {
        let tag = *code.get(pc).ok_or(CodeError::Truncated(pc))?;
        let op = Opcode::from_byte(tag).ok_or(CodeError::UnknownOpcode { pc, tag })?;
        let mut len = op.length();
        let available = code.len() - pc;
        if available < len {
            return Err(CodeError::Truncated(pc));
        }
        let i = pc + 1;
        let insn = match op {
            Opcode::StoreSp => Insn::StoreSp(load4(code, i)),
            Opcode::StorePosition => Insn::StorePosition(load4(code, i)),
            Opcode::PositionTest => Insn::PositionTest(load4(code, i)),
            Opcode::AssertionSuccess => Insn::AssertionSuccess {
                slot: load4(code, i),
                target: load4(code, i + 4),
            },
            Opcode::AssertionFailure => Insn::AssertionFailure(load4(code, i)),
            Opcode::AssertionBol => Insn::Assertion(Assertion::Bol),
            Opcode::AssertionBob => Insn::Assertion(Assertion::Bob),
            Opcode::AssertionEol => Insn::Assertion(Assertion::Eol),
            Opcode::AssertionEob => Insn::Assertion(Assertion::Eob),
            Opcode::AssertionWordBoundary => Insn::Assertion(Assertion::WordBoundary),
            Opcode::AssertionWordBoundaryInverted => Insn::Assertion(Assertion::NotWordBoundary),
            Opcode::StartCapture => Insn::StartCapture(load4(code, i)),
            Opcode::EndCapture => Insn::EndCapture(load4(code, i)),
            Opcode::ClearCaptures => Insn::ClearCaptures {
                from: load4(code, i),
                to: load4(code, i + 4),
            },
            Opcode::CounterZero => Insn::CounterZero(load4(code, i)),
            Opcode::CounterNext => Insn::CounterNext {
                slot: load4(code, i),
                max: load4(code, i + 4),
                target: load4(code, i + 8),
            },
            Opcode::PushBacktrack => Insn::PushBacktrack(load4(code, i)),
            Opcode::BackReference => Insn::BackReference {
                group: load2(code, i),
                casei: false,
            },
            Opcode::BackReferenceIgnoreCase => Insn::BackReference {
                group: load2(code, i),
                casei: true,
            },
            Opcode::Check1ByteChar => Insn::Check1ByteChar(code[i]),
            Opcode::Check2ByteChar => Insn::Check2ByteChar(load2(code, i)),
            Opcode::Check2CharOr | Opcode::Check3CharOr | Opcode::Check4CharOr => {
                Insn::CheckCharOr(Units(&code[i..pc + len]))
            }
            Opcode::CheckRange | Opcode::CheckRangeInverted => {
                let table_len = load4(code, i) as usize;
                let count = load4(code, i + 4);
                if table_len % 4 != 0 {
                    return Err(CodeError::InvalidRangeTable(pc));
                }
                len = len
                    .checked_add(table_len)
                    .filter(|&len| len <= available)
                    .ok_or(CodeError::Truncated(pc))?;
                Insn::CheckRange {
                    ranges: Ranges {
                        table: &code[i + 8..pc + len],
                        count,
                    },
                    inverted: op == Opcode::CheckRangeInverted,
                }
            }
            Opcode::CheckNChars => {
                let n = load4(code, i) as usize;
                if n == 0 {
                    return Err(CodeError::EmptyLiteral(pc));
                }
                len = n
                    .checked_mul(2)
                    .and_then(|bytes| len.checked_add(bytes))
                    .filter(|&len| len <= available)
                    .ok_or(CodeError::Truncated(pc))?;
                Insn::CheckNChars(Units(&code[i + 4..pc + len]))
            }
            Opcode::Jump => Insn::Jump(load4(code, i)),
            Opcode::Failure => Insn::Failure,
            Opcode::Success => Insn::Success,
        };
        Ok((insn, len))
    }

    /// The jump target, for instructions that transfer control.
    #[must_use]
    pub fn target(&self) -> Option<u32> {
        match *self {
            Insn::AssertionSuccess { target, .. }
            | Insn::CounterNext { target, .. }
            | Insn::PushBacktrack(target)
            | Insn::Jump(target) => Some(target),
            _ => None,
        }
    }

    /// Whether execution can continue with the next instruction in the stream.
    #[must_use]
    pub fn falls_through(&self) -> bool {
        !matches!(
            self,
            Insn::AssertionSuccess { .. }
                | Insn::AssertionFailure(_)
                | Insn::Jump(_)
                | Insn::Failure
                | Insn::Success
        )
    }
}

#[inline]
pub(crate) fn load2(code: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([code[at], code[at + 1]])
}

#[inline]
pub(crate) fn load4(code: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([code[at], code[at + 1], code[at + 2], code[at + 3]])
}
