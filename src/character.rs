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

//! Classification of single code units.
//!
//! The interpreter works on one code unit at a time and never decodes surrogate pairs, so all
//! predicates and case mappings here take and return a `u16`. A unit that does not map to a
//! single unit in the Basic Multilingual Plane is returned unchanged.

/// A fixed-width unit of a subject: `u8` for narrow (Latin-1) subjects, `u16` for wide (UTF-16)
/// subjects.
pub trait CodeUnit: Copy + Eq + std::fmt::Debug {
    /// The unit widened to 16 bits.
    fn get(self) -> u16;
}

impl CodeUnit for u8 {
    #[inline]
    fn get(self) -> u16 {
        u16::from(self)
    }
}

impl CodeUnit for u16 {
    #[inline]
    fn get(self) -> u16 {
        self
    }
}

/// `[A-Za-z0-9_]`, the characters of `\w`.
#[inline]
#[must_use]
pub fn is_word(ch: u16) -> bool {
    matches!(ch, 0x30..=0x39 | 0x41..=0x5A | 0x61..=0x7A | 0x5F)
}

/// Line feed, carriage return, line separator and paragraph separator.
#[inline]
#[must_use]
pub fn is_line_terminator(ch: u16) -> bool {
    matches!(ch, 0x0A | 0x0D | 0x2028 | 0x2029)
}

/// Simple upper-case mapping of a unit.
#[must_use]
pub fn to_upper_case(ch: u16) -> u16 {
    match u8::try_from(ch) {
        Ok(b) if b.is_ascii() => return u16::from(b.to_ascii_uppercase()),
        _ => (),
    }
    map_single(ch, char::to_uppercase)
}

/// Simple lower-case mapping of a unit.
#[must_use]
pub fn to_lower_case(ch: u16) -> u16 {
    match u8::try_from(ch) {
        Ok(b) if b.is_ascii() => return u16::from(b.to_ascii_lowercase()),
        _ => (),
    }
    map_single(ch, char::to_lowercase)
}

#[allow(clippy::cast_possible_truncation)]
fn map_single<I>(ch: u16, f: impl FnOnce(char) -> I) -> u16
where
    I: Iterator<Item = char>,
{
    // surrogates have no char
    let c = match char::from_u32(u32::from(ch)) {
        Some(c) => c,
        None => return ch,
    };
    let mut mapped = f(c);
    match (mapped.next(), mapped.next()) {
        (Some(m), None) if (m as u32) <= 0xFFFF => m as u32 as u16,
        _ => ch,
    }
}

/// Whether `ch` is equal to `target` or one of its case variants.
#[inline]
pub(crate) fn eq_ignore_case(ch: u16, target: u16) -> bool {
    ch == target || ch == to_upper_case(target) || ch == to_lower_case(target)
}
