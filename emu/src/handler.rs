//! Opcode handler seam.
//!
//! Instruction semantics live outside the execution core. A wavefront
//! decodes an instruction, then hands it to an [`OpcodeHandler`] together
//! with an [`ExecContext`] describing what is executing: once per wavefront
//! for control-flow instructions, once per active lane for ALU and fetch
//! instructions.

use wavesim_isa::Instruction;

use crate::Result;
use crate::ndrange::NdRangeId;
use crate::wavefront::Wavefront;
use crate::work_item::WorkItem;

/// Execution context passed to every handler call.
pub struct ExecContext<'a> {
    pub ndrange_id: NdRangeId,
    /// Wavefront executing the instruction. Handlers drive divergence and
    /// clause switches through its control API (`push`, `pop`, `jump_cf`,
    /// `start_clause`, ...).
    pub wavefront: &'a mut Wavefront,
    /// Lane being executed; `None` for control-flow instructions.
    pub work_item: Option<&'a mut WorkItem>,
    /// Scalar work-item paired with the wavefront.
    pub scalar_work_item: &'a mut WorkItem,
    /// The ND-Range instruction buffer.
    pub inst_buffer: &'a [u8],
}

impl std::fmt::Debug for ExecContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecContext")
            .field("ndrange_id", &self.ndrange_id)
            .field("wavefront", &self.wavefront.name())
            .field("work_item", &self.work_item.as_ref().map(|item| item.id))
            .finish()
    }
}

/// Semantic functions for every opcode of an ISA.
///
/// Implementations dispatch on `inst.opcode()`.
pub trait OpcodeHandler {
    /// Execute one instruction.
    fn execute(&mut self, inst: &Instruction, ctx: &mut ExecContext<'_>) -> Result<()>;

    /// Make the deferred writes of one lane visible.
    ///
    /// Called once per active lane after the whole ALU group ran on it, so
    /// every read of the group observes pre-group state.
    fn commit_writes(&mut self, _ctx: &mut ExecContext<'_>) -> Result<()> {
        Ok(())
    }

    /// Called when an ALU clause is exhausted, before returning to CF.
    fn alu_clause_end(&mut self, _ctx: &mut ExecContext<'_>) -> Result<()> {
        Ok(())
    }

    /// Called when a fetch clause is exhausted, before returning to CF.
    fn tex_clause_end(&mut self, _ctx: &mut ExecContext<'_>) -> Result<()> {
        Ok(())
    }
}

impl<H: OpcodeHandler + ?Sized> OpcodeHandler for &mut H {
    fn execute(&mut self, inst: &Instruction, ctx: &mut ExecContext<'_>) -> Result<()> {
        (**self).execute(inst, ctx)
    }

    fn commit_writes(&mut self, ctx: &mut ExecContext<'_>) -> Result<()> {
        (**self).commit_writes(ctx)
    }

    fn alu_clause_end(&mut self, ctx: &mut ExecContext<'_>) -> Result<()> {
        (**self).alu_clause_end(ctx)
    }

    fn tex_clause_end(&mut self, ctx: &mut ExecContext<'_>) -> Result<()> {
        (**self).tex_clause_end(ctx)
    }
}
