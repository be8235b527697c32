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

//! Analysis of compiled programs.

use crate::character::{to_lower_case, to_upper_case};
use crate::code::Code;
use crate::op::{Insn, Ranges};
use crate::prefilter::{range_mask, Filter};

/// Derive a quick-check filter from the first instruction that consumes input.
///
/// Leading instructions that neither consume input nor branch are skipped, so every match has
/// to pass through the instruction the filter is derived from. If that instruction is not a
/// plain character test (a branch, a jump, a back reference, an inverted class or a
/// look-around), no filter is derived.
#[must_use]
pub fn leading_filter(code: &Code) -> Option<Filter> {
    for (_, insn) in code.instructions() {
        match insn {
            Insn::StartCapture(_)
            | Insn::EndCapture(_)
            | Insn::ClearCaptures { .. }
            | Insn::CounterZero(_)
            | Insn::StorePosition(_)
            | Insn::Assertion(_) => continue,
            Insn::Check1ByteChar(ch) => return Some(Filter::OneChar(u16::from(ch))),
            Insn::Check2ByteChar(ch) => return Some(Filter::OneChar(ch)),
            Insn::CheckCharOr(units) => return Filter::from_units(units.iter()),
            Insn::CheckRange {
                ranges,
                inverted: false,
            } => return range_filter(ranges),
            Insn::CheckNChars(units) => {
                let first = units.get(0);
                return if code.ignore_case() {
                    Filter::from_units([first, to_upper_case(first), to_lower_case(first)])
                } else {
                    Some(Filter::OneChar(first))
                };
            }
            _ => return None,
        }
    }
    None
}

fn range_filter(ranges: Ranges<'_>) -> Option<Filter> {
    let mut filter: Option<Filter> = None;
    for (start, finish) in ranges.iter() {
        filter = Some(match filter {
            None if start == finish => Filter::OneChar(start),
            None => Filter::Mask(range_mask(start, finish)),
            Some(filter) => filter.with_range(start, finish),
        });
    }
    filter
}
