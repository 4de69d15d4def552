//! SIMT execution core.
//!
//! Models how a kernel launch decomposes into work-groups, wavefronts and
//! work-items, and how a wavefront advances one decoded clause unit per
//! [`Emulator::execute`] call, including divergent control flow through its
//! active-mask stack.
//!
//! Instruction decoding and opcode semantics are external: callers provide a
//! [`wavesim_isa::Decoder`] and an [`OpcodeHandler`].
//!
//! ```ignore
//! let mut emu = Emulator::new(EmuConfig::builder().wavefront_size(4).build())?;
//! let id = emu.create_ndrange("kernel");
//! let ndrange = emu.ndrange_mut(id)?;
//! ndrange.setup_size([8, 1, 1], [4, 1, 1], 1)?;
//! ndrange.setup_instruction_memory(&binary, 0)?;
//! emu.run(id, &decoder, &mut handler)?;
//! emu.dump(&mut report)?;
//! ```

pub mod config;
pub mod divergence;
pub mod emulator;
pub mod error;
pub mod handler;
pub mod host;
pub mod mask;
pub mod ndrange;
pub mod report;
pub mod timer;
pub mod wavefront;
pub mod work_group;
pub mod work_item;

#[cfg(test)]
pub mod test;

pub use config::EmuConfig;
pub use divergence::{DivergenceGroup, DivergenceReport, LaneRange};
pub use emulator::Emulator;
pub use error::{Error, Result};
pub use handler::{ExecContext, OpcodeHandler};
pub use host::{CommandId, CommandList, CommandQueue, HostEvent};
pub use mask::{ActiveMaskStack, LaneMask};
pub use ndrange::{Cascade, NdRange, NdRangeId, NdRangeSize, NdRangeStatus};
pub use timer::SimTimer;
pub use wavefront::{ExecFlags, Step, Wavefront, WavefrontStats};
pub use work_group::{WorkGroup, WorkGroupStatus};
pub use work_item::WorkItem;
