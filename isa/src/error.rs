use snafu::Snafu;

use crate::{InstCategory, Opcode};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// ALU bundle holds no instructions or more than the hardware slots.
    #[snafu(display("ALU group must hold 1..={max} instructions, got {count}"))]
    AluGroupSize { count: usize, max: usize },

    /// Decoder ran past the end of the instruction buffer.
    #[snafu(display("decode out of bounds: offset {cursor} + {width} exceeds buffer size {size}"))]
    OutOfBounds { cursor: usize, width: usize, size: usize },

    /// Raw opcode field does not name a known instruction.
    #[snafu(display("unknown opcode {raw:#x} at offset {cursor}"))]
    UnknownOpcode { raw: u32, cursor: usize },

    /// Decoded opcode does not belong to the clause being fetched.
    #[snafu(display("{opcode} is not a {expected:?} instruction"))]
    CategoryMismatch { opcode: Opcode, expected: InstCategory },
}
