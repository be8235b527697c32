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

use std::error::Error as StdError;
use std::fmt;

/// Result type for this crate with specific error enum.
pub type Result<T> = ::std::result::Result<T, Error>;

/// An error as the result of building or running a program.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// The bytecode handed to [`Code::new`](crate::Code::new) is malformed.
    CodeError(CodeError),
    /// An error as the result of running a program.
    RuntimeError(RuntimeError),
}

/// An error for a program that can not be executed.
///
/// Every variant except [`CodeError::NoCaptures`] and [`CodeError::Empty`] carries the byte
/// offset of the offending instruction.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum CodeError {
    /// The program declares zero capture groups; group 0 is always required.
    NoCaptures,
    /// The instruction stream is empty.
    Empty,
    /// Unknown opcode tag
    UnknownOpcode {
        /// Byte offset of the instruction
        pc: usize,
        /// The tag that was read
        tag: u8,
    },
    /// The instruction's immediates run past the end of the stream.
    Truncated(usize),
    /// A capture operand is outside `0..captures`.
    InvalidCapture(usize),
    /// A scratch slot operand is outside `0..counters`.
    InvalidSlot(usize),
    /// A repeat bound above `i32::MAX`, which a counter slot can not reach.
    InvalidRepeatMax(usize),
    /// A range table is not made of whole `[start, finish]` pairs.
    InvalidRangeTable(usize),
    /// A literal run of zero characters.
    EmptyLiteral(usize),
    /// A jump target that does not point at the start of an instruction.
    InvalidTarget {
        /// Byte offset of the jumping instruction
        pc: usize,
        /// The target that was read
        target: usize,
    },
    /// The last instruction can fall through past the end of the stream.
    FallsOffEnd(usize),
    /// A label was referenced but never bound in the assembler.
    UnboundLabel(usize),
}

/// An error as the result of executing a program.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum RuntimeError {
    /// The backtrack stack could not grow because memory allocation failed.
    OutOfMemory,
    /// The backtrack stack reached the configured maximum, see
    /// [`VmBuilder::max_stack`](crate::VmBuilder::max_stack).
    StackOverflow,
}

impl StdError for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::CodeError(code_error) => write!(f, "Invalid bytecode: {}", code_error),
            Error::RuntimeError(runtime_error) => {
                write!(f, "Error executing program: {}", runtime_error)
            }
        }
    }
}

impl fmt::Display for CodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodeError::NoCaptures => write!(f, "Program must declare at least one capture group"),
            CodeError::Empty => write!(f, "Program has no instructions"),
            CodeError::UnknownOpcode { pc, tag } => {
                write!(f, "Unknown opcode {:#04x} at {}", tag, pc)
            }
            CodeError::Truncated(pc) => write!(f, "Instruction at {} is truncated", pc),
            CodeError::InvalidCapture(pc) => {
                write!(f, "Instruction at {} refers to a nonexistent group", pc)
            }
            CodeError::InvalidSlot(pc) => {
                write!(f, "Instruction at {} refers to a nonexistent counter slot", pc)
            }
            CodeError::InvalidRepeatMax(pc) => {
                write!(f, "Repeat bound of instruction at {} is out of range", pc)
            }
            CodeError::InvalidRangeTable(pc) => {
                write!(f, "Range table of instruction at {} is malformed", pc)
            }
            CodeError::EmptyLiteral(pc) => write!(f, "Literal at {} has no characters", pc),
            CodeError::InvalidTarget { pc, target } => write!(
                f,
                "Instruction at {} jumps to {}, which is not an instruction",
                pc, target
            ),
            CodeError::FallsOffEnd(pc) => {
                write!(f, "Last instruction at {} falls through the end", pc)
            }
            CodeError::UnboundLabel(label) => write!(f, "Label {} was never bound", label),
        }
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::OutOfMemory => {
                write!(f, "Out of memory while growing the backtrack stack")
            }
            RuntimeError::StackOverflow => write!(f, "Max stack size exceeded for backtracking"),
        }
    }
}

impl From<CodeError> for Error {
    fn from(code_error: CodeError) -> Self {
        Error::CodeError(code_error)
    }
}

impl From<RuntimeError> for Error {
    fn from(runtime_error: RuntimeError) -> Self {
        Error::RuntimeError(runtime_error)
    }
}
