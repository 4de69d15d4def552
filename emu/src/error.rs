use snafu::Snafu;
use wavesim_isa::Opcode;

use crate::ndrange::NdRangeId;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// Emulator configuration out of range.
    #[snafu(display("invalid configuration: {reason}"))]
    InvalidConfig { reason: String },

    #[snafu(display("work dimension must be 1, 2 or 3, got {work_dim}"))]
    InvalidWorkDim { work_dim: u32 },

    #[snafu(display("invalid global size {global_size:?}: every dimension must be greater than 0"))]
    InvalidGlobalSize { global_size: [u32; 3] },

    #[snafu(display("invalid local size {local_size:?}: every dimension must be greater than 0"))]
    InvalidLocalSize { local_size: [u32; 3] },

    /// Global size is not a multiple of the work-group size.
    #[snafu(display("global work sizes {global_size:?} must be multiples of local sizes {local_size:?}"))]
    NonDivisibleSize { global_size: [u32; 3], local_size: [u32; 3] },

    /// Total work-item, work-group or wavefront count does not fit in `usize`.
    #[snafu(display("ND-Range sizes {global_size:?} / {local_size:?} overflow the index space"))]
    SizeOverflow { global_size: [u32; 3], local_size: [u32; 3] },

    #[snafu(display("ND-Range {ndrange} layout already set up"))]
    LayoutAlreadySet { ndrange: NdRangeId },

    #[snafu(display("ND-Range {ndrange} has no layout; call setup_size first"))]
    LayoutMissing { ndrange: NdRangeId },

    #[snafu(display("ND-Range {ndrange} instruction buffer already set up"))]
    InstMemoryAlreadyBound { ndrange: NdRangeId },

    #[snafu(display("invalid instruction memory: entry pc {pc} with buffer size {size}"))]
    InvalidEntryPc { pc: usize, size: usize },

    #[snafu(display("ND-Range {ndrange} has no instruction memory bound"))]
    InstMemoryUnbound { ndrange: NdRangeId },

    /// Push on an active-mask stack that is already at maximum depth.
    #[snafu(display("{wavefront}: active mask stack overflow (max size {max})"))]
    StackOverflow { wavefront: String, max: usize },

    /// Pop of more frames than the active-mask stack holds.
    #[snafu(display("{wavefront}: active mask stack underflow (pop {count} at depth {depth})"))]
    StackUnderflow { wavefront: String, count: usize, depth: usize },

    #[snafu(display("wavefront {wavefront} is out of range ({count} wavefronts)"))]
    WavefrontOutOfRange { wavefront: usize, count: usize },

    #[snafu(display("wavefront {wavefront} has already finished"))]
    WavefrontFinished { wavefront: usize },

    /// Clause opened with no instructions in it.
    #[snafu(display("wavefront {wavefront}: empty {kind:?} clause [{start}, {end})"))]
    EmptyClause { wavefront: usize, kind: wavesim_isa::ClauseKind, start: usize, end: usize },

    #[snafu(display("work-group {work_group} is out of range ({count} work-groups)"))]
    WorkGroupOutOfRange { work_group: usize, count: usize },

    #[snafu(display("unknown ND-Range {ndrange}"))]
    UnknownNdRange { ndrange: NdRangeId },

    /// Instruction decoding failed.
    #[snafu(display("decode error: {source}"))]
    Decode { source: wavesim_isa::Error },

    /// Opcode handler reported a fault.
    #[snafu(display("{opcode}: {reason}"))]
    Handler { opcode: Opcode, reason: String },
}
