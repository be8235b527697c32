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

//! Backtracking VM for compiled regex bytecode.
//!
//! The VM executes a [`Code`] program against a subject of code units. It keeps a program
//! counter (PC), a position in the subject (IX) and a state vector holding capture offsets and
//! scratch slots (see [`Code`] for the layout).
//!
//! Literal and class instructions such as `Check1ByteChar` test the unit at IX. If it matches,
//! IX advances and execution continues with the next instruction; otherwise the current thread
//! fails. `Success` ends the attempt with a match.
//!
//! `PushBacktrack` is the only choice point: it saves a copy of the whole state vector, together
//! with IX and a continuation target, on the backtrack stack. When a thread fails, the most
//! recent frame is popped, the state vector and IX are restored from it and execution resumes at
//! its target. If the stack is empty, the attempt fails.
//!
//! Example program for the regex `ab|ac`:
//!
//! ```text
//!  0: PushBacktrack(14)
//!  5: Check1ByteChar('a')
//!  7: Check1ByteChar('b')
//!  9: Jump(18)
//! 14: Check1ByteChar('a')
//! 16: Check1ByteChar('c')
//! 18: Success
//! ```
//!
//! Look-around bodies run on the same stack. `StoreSp` remembers the stack depth before the body,
//! and `AssertionSuccess`/`AssertionFailure` cut everything the body pushed by truncating back to
//! that depth.
//!
//! The stack is a single `Vec<i32>` of frames laid out back to back. Its length is the stack
//! pointer and frames are addressed by index, so growing the buffer never invalidates anything.

use std::fmt;

use crate::character::{self, CodeUnit};
use crate::code::Code;
use crate::error::RuntimeError;
use crate::op::{Assertion, Insn};
use crate::{Captures, Error, Result, VmOptions};

/// Enable tracing of VM execution. Only for debugging/investigating.
pub(crate) const OPTION_TRACE: u32 = 1 << 0;

/// Initial capacity of the backtrack stack, in integers.
pub(crate) const DEFAULT_INITIAL_STACK_SIZE: usize = 4096;
const INITIAL_STATE_SIZE: usize = 64;

// depths are stored in state slots
const MAX_FRAMES: usize = i32::MAX as usize;

/// Value of a capture offset or scratch slot that has not been set.
pub const UNDEFINED: i32 = -1;

/// A reusable interpreter.
///
/// A `Vm` owns the scratch buffers of a search: the state vector and the backtrack stack. They
/// are reset at the start of every attempt and their capacity is kept, so reusing one `Vm` for
/// many searches avoids repeated allocation. A `Vm` runs one search at a time; use one per
/// thread to search concurrently.
#[derive(Debug)]
pub struct Vm {
    #[cfg_attr(not(debug_assertions), allow(dead_code))]
    options: u32,
    max_stack: Option<usize>,
    /// Captures, scratch slots and continuation of the running thread.
    state: Vec<i32>,
    /// Backtrack frames, each a copy of `state` with IX in slot 1 and the target in the last
    /// slot.
    stack: Vec<i32>,
}

impl Default for Vm {
    fn default() -> Self {
        Vm::new()
    }
}

impl Vm {
    /// Create a VM with default options, see [`VmBuilder`](crate::VmBuilder).
    #[must_use]
    pub fn new() -> Vm {
        Vm::with_options(&VmOptions::default())
    }

    pub(crate) fn with_options(options: &VmOptions) -> Vm {
        Vm {
            options: if options.trace { OPTION_TRACE } else { 0 },
            max_stack: options.max_stack,
            state: Vec::with_capacity(INITIAL_STATE_SIZE),
            stack: Vec::with_capacity(options.initial_stack_size),
        }
    }

    /// Search `subject` for the leftmost match of `code`, trying start positions from `offset`
    /// on.
    ///
    /// On success the first `code.captures() * 2` entries of `captures` are overwritten with
    /// start/end pairs, [`UNDEFINED`] for groups that did not participate, and `true` is
    /// returned. On failure `captures` is left untouched.
    ///
    /// # Errors
    ///
    /// Returns an [`Error::RuntimeError`] if the backtrack stack could not grow. The search is
    /// abandoned immediately in that case.
    ///
    /// # Panics
    ///
    /// Panics if `captures` is shorter than `code.captures() * 2` or if the subject is longer
    /// than `i32::MAX` units.
    pub fn execute<U: CodeUnit>(
        &mut self,
        code: &Code,
        subject: &[U],
        captures: &mut [i32],
        offset: usize,
    ) -> Result<bool> {
        check_buffers(code, subject, captures);
        let size = subject.len();
        match code.filter() {
            None => {
                for start in offset..=size {
                    if self.attempt(code, subject, captures, start)? {
                        return Ok(true);
                    }
                }
            }
            Some(filter) => {
                for start in offset..size {
                    if filter.accepts(subject[start])
                        && self.attempt(code, subject, captures, start)?
                    {
                        return Ok(true);
                    }
                }
            }
        }
        Ok(false)
    }

    /// Like [`Vm::execute`], but only tries to match starting exactly at `offset`. The
    /// quick-check filter is not consulted.
    ///
    /// # Errors
    ///
    /// Returns an [`Error::RuntimeError`] if the backtrack stack could not grow.
    ///
    /// # Panics
    ///
    /// Same as [`Vm::execute`].
    pub fn execute_at<U: CodeUnit>(
        &mut self,
        code: &Code,
        subject: &[U],
        captures: &mut [i32],
        offset: usize,
    ) -> Result<bool> {
        check_buffers(code, subject, captures);
        if offset > subject.len() {
            return Ok(false);
        }
        self.attempt(code, subject, captures, offset)
    }

    /// Search for the leftmost match and return its groups.
    ///
    /// # Errors
    ///
    /// Returns an [`Error::RuntimeError`] if the backtrack stack could not grow.
    pub fn search<U: CodeUnit>(
        &mut self,
        code: &Code,
        subject: &[U],
        offset: usize,
    ) -> Result<Option<Captures>> {
        let mut slots = vec![UNDEFINED; code.captures() * 2];
        Ok(self
            .execute(code, subject, &mut slots, offset)?
            .then_some(Captures::new(slots)))
    }

    fn reset(&mut self, size: usize, start: usize) {
        self.state.clear();
        self.state.resize(size, UNDEFINED);
        self.state[0] = to_slot(start);
        self.stack.clear();
    }

    // push a backtrack frame
    fn push(&mut self, size: usize, ix: usize, target: u32) -> Result<()> {
        self.reserve(size)?;
        let top = self.stack.len();
        self.stack.extend_from_slice(&self.state);
        self.stack[top + 1] = to_slot(ix);
        self.stack[top + size - 1] = to_slot(target as usize);
        self.trace_stack("push", size);
        Ok(())
    }

    // pop a backtrack frame into the state, returning (pc, ix)
    #[allow(clippy::cast_sign_loss)]
    fn pop(&mut self, size: usize) -> Option<(usize, usize)> {
        let top = self.stack.len().checked_sub(size)?;
        self.state.copy_from_slice(&self.stack[top..]);
        self.stack.truncate(top);
        self.trace_stack("pop", size);
        Some((self.state[size - 1] as usize, self.state[1] as usize))
    }

    fn reserve(&mut self, size: usize) -> Result<()> {
        let frames = self.stack.len() / size + 1;
        if frames > self.max_stack.unwrap_or(MAX_FRAMES).min(MAX_FRAMES) {
            return Err(Error::RuntimeError(RuntimeError::StackOverflow));
        }
        if self.stack.capacity() - self.stack.len() < size {
            self.stack
                .try_reserve(size)
                .map_err(|_| Error::RuntimeError(RuntimeError::OutOfMemory))?;
            self.trace(format_args!(
                "stack grown to {} slots",
                self.stack.capacity()
            ));
        }
        Ok(())
    }

    // number of frames on the stack
    fn depth(&self, size: usize) -> usize {
        self.stack.len() / size
    }

    #[allow(clippy::cast_sign_loss)]
    fn group(&self, code: &Code, group: u16) -> Option<(usize, usize)> {
        let group = usize::from(group);
        if group >= code.captures() {
            return None;
        }
        let lo = self.state[group * 2];
        let hi = self.state[group * 2 + 1];
        if lo == UNDEFINED || hi == UNDEFINED || hi < lo {
            return None;
        }
        Some((lo as usize, hi as usize))
    }

    fn trace_stack(&self, operation: &str, size: usize) {
        self.trace(format_args!(
            "stack after {}: {} frames",
            operation,
            self.depth(size)
        ));
    }

    fn trace(&self, args: fmt::Arguments) {
        #[cfg(debug_assertions)]
        if self.options & OPTION_TRACE != 0 {
            Self::do_trace(args);
        }
        let _ = args;
    }

    #[cold]
    #[cfg(debug_assertions)]
    fn do_trace(args: fmt::Arguments) {
        eprintln!("{}", args);
    }

    #[allow(clippy::too_many_lines)]
    #[allow(clippy::cast_sign_loss)]
    fn attempt<U: CodeUnit>(
        &mut self,
        code: &Code,
        subject: &[U],
        captures: &mut [i32],
        start: usize,
    ) -> Result<bool> {
        self.trace(format_args!("pos\tinstruction"));
        let size = code.frame_size();
        // first scratch slot
        let base = code.captures() * 2;
        self.reset(size, start);
        let mut pc = 0;
        let mut ix = start;
        loop {
            // break from this loop to fail, causes stack to pop
            'fail: loop {
                let (insn, len) = code.fetch(pc);
                self.trace(format_args!("{}\t{} {:?}", ix, pc, insn));
                match insn {
                    Insn::Success => {
                        self.state[1] = to_slot(ix);
                        self.trace(format_args!("saves: {:?}", &self.state[..base]));
                        captures[..base].copy_from_slice(&self.state[..base]);
                        return Ok(true);
                    }
                    Insn::Failure => break 'fail,
                    Insn::Jump(target) => {
                        pc = target as usize;
                        continue;
                    }
                    Insn::PushBacktrack(target) => self.push(size, ix, target)?,
                    Insn::StartCapture(group) => {
                        let slot = group as usize * 2;
                        self.state[slot] = to_slot(ix);
                        self.state[slot + 1] = UNDEFINED;
                    }
                    Insn::EndCapture(group) => {
                        self.state[group as usize * 2 + 1] = to_slot(ix);
                    }
                    Insn::ClearCaptures { from, to } => {
                        self.state[from as usize * 2..to as usize * 2].fill(UNDEFINED);
                    }
                    Insn::BackReference { group, casei } => {
                        // a group that did not participate matches the empty string
                        if let Some((lo, hi)) = self.group(code, group) {
                            let n = hi - lo;
                            if subject.len() - ix < n {
                                break 'fail;
                            }
                            let captured = &subject[lo..hi];
                            let here = &subject[ix..ix + n];
                            let matched = if casei {
                                here.iter().zip(captured).all(|(&ch, &target)| {
                                    character::eq_ignore_case(ch.get(), target.get())
                                })
                            } else {
                                here == captured
                            };
                            if !matched {
                                break 'fail;
                            }
                            ix += n;
                        }
                    }
                    Insn::StorePosition(slot) => {
                        self.state[base + slot as usize] = to_slot(ix);
                    }
                    Insn::PositionTest(slot) => {
                        // an iteration that consumed nothing
                        if self.state[base + slot as usize] == to_slot(ix) {
                            break 'fail;
                        }
                    }
                    Insn::CounterZero(slot) => self.state[base + slot as usize] = 0,
                    Insn::CounterNext { slot, max, target } => {
                        let counter = &mut self.state[base + slot as usize];
                        *counter = counter.saturating_add(1);
                        if i64::from(*counter) < i64::from(max) {
                            pc = target as usize;
                            continue;
                        }
                    }
                    Insn::Check1ByteChar(ch) => {
                        if ix < subject.len() && subject[ix].get() == u16::from(ch) {
                            ix += 1;
                        } else {
                            break 'fail;
                        }
                    }
                    Insn::Check2ByteChar(ch) => {
                        if ix < subject.len() && subject[ix].get() == ch {
                            ix += 1;
                        } else {
                            break 'fail;
                        }
                    }
                    Insn::CheckCharOr(units) => {
                        if ix < subject.len() && units.contains(subject[ix].get()) {
                            ix += 1;
                        } else {
                            break 'fail;
                        }
                    }
                    Insn::CheckRange { ranges, inverted } => {
                        if ix < subject.len() && ranges.contains(subject[ix].get()) != inverted {
                            ix += 1;
                        } else {
                            break 'fail;
                        }
                    }
                    Insn::CheckNChars(units) => {
                        let n = units.len();
                        if subject.len() - ix < n {
                            break 'fail;
                        }
                        let ignore_case = code.ignore_case();
                        let matched =
                            subject[ix..ix + n]
                                .iter()
                                .zip(units.iter())
                                .all(|(&ch, target)| {
                                    let ch = ch.get();
                                    ch == target
                                        || (ignore_case && character::eq_ignore_case(ch, target))
                                });
                        if !matched {
                            break 'fail;
                        }
                        ix += n;
                    }
                    Insn::Assertion(assertion) => {
                        if !check_assertion(assertion, subject, ix) {
                            break 'fail;
                        }
                    }
                    Insn::StoreSp(slot) => {
                        self.state[base + slot as usize] = to_slot(self.depth(size));
                    }
                    Insn::AssertionSuccess { slot, target } => {
                        // the frame pushed right after StoreSp holds the position before the
                        // look-around body
                        let top = self.state[base + slot as usize] as usize * size;
                        ix = self.stack[top + 1] as usize;
                        self.stack.truncate(top);
                        self.trace_stack("cut", size);
                        pc = target as usize;
                        continue;
                    }
                    Insn::AssertionFailure(slot) => {
                        let top = self.state[base + slot as usize] as usize * size;
                        self.stack.truncate(top);
                        self.trace_stack("cut", size);
                        break 'fail;
                    }
                }
                pc += len;
            }
            self.trace(format_args!("fail"));
            // "break 'fail" goes here
            match self.pop(size) {
                Some((newpc, newix)) => {
                    pc = newpc;
                    ix = newix;
                }
                None => return Ok(false),
            }
        }
    }
}

fn check_buffers<U>(code: &Code, subject: &[U], captures: &[i32]) {
    assert!(
        captures.len() >= code.captures() * 2,
        "capture buffer holds {} slots, program needs {}",
        captures.len(),
        code.captures() * 2
    );
    assert!(subject.len() <= MAX_FRAMES, "subject too long");
}

fn check_assertion<U: CodeUnit>(assertion: Assertion, s: &[U], ix: usize) -> bool {
    match assertion {
        Assertion::Bob => ix == 0,
        Assertion::Eob => ix == s.len(),
        Assertion::Bol => ix == 0 || character::is_line_terminator(s[ix - 1].get()),
        Assertion::Eol => ix == s.len() || character::is_line_terminator(s[ix].get()),
        Assertion::WordBoundary => is_word_before(s, ix) != is_word_at(s, ix),
        Assertion::NotWordBoundary => is_word_before(s, ix) == is_word_at(s, ix),
    }
}

#[inline]
fn is_word_before<U: CodeUnit>(s: &[U], ix: usize) -> bool {
    ix > 0 && is_word_at(s, ix - 1)
}

#[inline]
fn is_word_at<U: CodeUnit>(s: &[U], ix: usize) -> bool {
    s.get(ix).map_or(false, |ch| character::is_word(ch.get()))
}

// positions and depths are bounded by `MAX_FRAMES`
#[inline]
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
fn to_slot(value: usize) -> i32 {
    debug_assert!(value <= MAX_FRAMES);
    value as i32
}

/// Run the program with trace printing for debugging.
#[doc(hidden)]
pub fn run_trace<U: CodeUnit>(code: &Code, subject: &[U], offset: usize) -> Result<Option<Captures>> {
    crate::VmBuilder::new()
        .trace(true)
        .build()
        .search(code, subject, offset)
}

/// Run the program with default options.
#[doc(hidden)]
pub fn run_default<U: CodeUnit>(
    code: &Code,
    subject: &[U],
    offset: usize,
) -> Result<Option<Captures>> {
    Vm::new().search(code, subject, offset)
}
