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

//! Quick-check filters for start positions.
//!
//! A filter is a necessary condition on the first unit of any match. The scanner uses it to skip
//! start positions without running the interpreter; it never changes the outcome of a search.

use crate::character::CodeUnit;

/// A cheap test on the unit at a candidate start position.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Filter {
    /// A match can only start at this unit.
    OneChar(u16),
    /// A match can only start at a unit `ch` with `mask & ch == ch`. Positives are only
    /// candidates, negatives are certain.
    Mask(u16),
}

impl Filter {
    /// Build the tightest filter accepting every unit in `units`.
    ///
    /// Returns `None` for an empty set, because a program whose first unit can be anything
    /// must not be filtered.
    pub fn from_units(units: impl IntoIterator<Item = u16>) -> Option<Filter> {
        let mut units = units.into_iter();
        let first = units.next()?;
        let mut mask = first;
        let mut single = true;
        for unit in units {
            single &= unit == first;
            mask |= unit;
        }
        Some(if single {
            Filter::OneChar(first)
        } else {
            Filter::Mask(mask)
        })
    }

    /// Whether a match may start at `ch`.
    #[inline]
    #[must_use]
    pub fn accepts<U: CodeUnit>(self, ch: U) -> bool {
        let ch = ch.get();
        match self {
            Filter::OneChar(c) => ch == c,
            Filter::Mask(mask) => mask & ch == ch,
        }
    }

    /// Widen the filter so that it also accepts every unit of `start..=finish`.
    #[must_use]
    pub fn with_range(self, start: u16, finish: u16) -> Filter {
        let mask = match self {
            Filter::OneChar(c) => c,
            Filter::Mask(mask) => mask,
        };
        Filter::Mask(mask | range_mask(start, finish))
    }
}

/// Smallest mask covering every unit in `start..=finish`: both bounds plus every bit below the
/// highest bit in which they differ.
#[must_use]
pub(crate) fn range_mask(start: u16, finish: u16) -> u16 {
    let diff = start ^ finish;
    if diff == 0 {
        return start;
    }
    let low_bits = u16::MAX >> diff.leading_zeros();
    start | finish | low_bits
}
