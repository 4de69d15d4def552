//! Wavefront execution engine.
//!
//! A wavefront runs a three-clause state machine. It starts in the CF clause
//! and decodes one control-flow instruction per [`Wavefront::execute`] call.
//! A control-flow handler may open an ALU or fetch clause through
//! [`Wavefront::start_clause`]; the following calls then decode one ALU group
//! (or one fetch) each until the clause cursor reaches the clause end, at
//! which point the wavefront returns to CF. The program is over once the
//! wavefront is back in CF and the CF cursor is exhausted.

use smallvec::SmallVec;
use snafu::{OptionExt, ResultExt, ensure};
use tracing::trace;

use wavesim_isa::{CfInst, ClauseKind, Decoder, InstFlag, Instruction, MAX_ALU_GROUP_SIZE, Opcode};

use crate::error::{
    DecodeSnafu, EmptyClauseSnafu, Error, InstMemoryUnboundSnafu, Result, StackOverflowSnafu, StackUnderflowSnafu,
    WavefrontFinishedSnafu,
};
use crate::handler::{ExecContext, OpcodeHandler};
use crate::mask::{ActiveMaskStack, LaneMask, StackError};
use crate::ndrange::NdRangeId;
use crate::work_item::WorkItem;

/// Per-call instruction flags, reset at the start of every `execute`.
///
/// Handlers set them; a timing model reads them afterwards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecFlags {
    pub global_mem_read: bool,
    pub global_mem_write: bool,
    pub local_mem_read: bool,
    pub local_mem_write: bool,
    pub pred_mask_update: bool,
    pub active_mask_update: bool,
    /// Frames pushed during this call.
    pub active_mask_push: usize,
    /// Frames popped during this call.
    pub active_mask_pop: usize,
}

/// Cumulative instruction counters of a wavefront.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WavefrontStats {
    pub inst_count: u64,
    pub global_mem_inst_count: u64,
    pub local_mem_inst_count: u64,

    pub cf_inst_count: u64,
    pub cf_inst_global_mem_write_count: u64,

    pub alu_clause_count: u64,
    pub alu_group_count: u64,
    /// Histogram of ALU group sizes; bucket `n - 1` counts groups of `n` instructions.
    pub alu_group_size: [u64; MAX_ALU_GROUP_SIZE],
    pub alu_inst_count: u64,
    pub alu_inst_local_mem_count: u64,

    pub tc_clause_count: u64,
    pub tc_inst_count: u64,
    pub tc_inst_global_mem_read_count: u64,
}

/// Result of one [`Wavefront::execute`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    /// Clause the decoded unit belonged to.
    pub clause: ClauseKind,
    /// Instructions accounted for (the group size for ALU groups, 1 otherwise).
    pub inst_count: usize,
}

/// Everything a wavefront borrows from its ND-Range while executing.
pub(crate) struct WavefrontEnv<'a> {
    pub inst_buffer: &'a [u8],
    /// Work-items of this wavefront, indexed by lane.
    pub work_items: &'a mut [WorkItem],
    pub scalar_work_item: &'a mut WorkItem,
    pub histogram: Option<&'a mut [u64]>,
}

/// SIMD execution unit covering a slice of a work-group's work-items.
#[derive(Debug, Clone)]
pub struct Wavefront {
    id: usize,
    id_in_work_group: usize,
    work_group_id: usize,
    ndrange_id: NdRangeId,
    name: String,

    work_item_id_first: usize,
    work_item_id_last: usize,
    work_item_count: usize,

    stack: ActiveMaskStack,
    pred: LaneMask,

    clause_kind: ClauseKind,
    entry_pc: Option<usize>,
    cf_cursor: Option<usize>,
    cf_inst: Option<CfInst>,
    clause_cursor: usize,
    clause_end: usize,

    flags: ExecFlags,
    stats: WavefrontStats,
}

impl Wavefront {
    pub(crate) fn new(id: usize, id_in_work_group: usize, work_group_id: usize, ndrange_id: NdRangeId) -> Self {
        Self {
            id,
            id_in_work_group,
            work_group_id,
            ndrange_id,
            name: String::new(),
            work_item_id_first: 0,
            work_item_id_last: 0,
            work_item_count: 0,
            stack: ActiveMaskStack::new(0, 2),
            pred: LaneMask::new(0),
            clause_kind: ClauseKind::Cf,
            entry_pc: None,
            cf_cursor: None,
            cf_inst: None,
            clause_cursor: 0,
            clause_end: 0,
            flags: ExecFlags::default(),
            stats: WavefrontStats::default(),
        }
    }

    /// Record work-item `tid` as the next lane of this wavefront.
    pub(crate) fn assign_work_item(&mut self, tid: usize) {
        if self.work_item_count == 0 {
            self.work_item_id_first = tid;
        }
        self.work_item_count += 1;
        self.work_item_id_last = tid;
    }

    /// Name the wavefront and size its masks once all lanes are assigned.
    pub(crate) fn finish_layout(&mut self, max_stack_size: usize) {
        debug_assert!(self.work_item_count > 0, "wavefront {} has no work-items", self.id);
        self.name = format!("wavefront[i{}-i{}]", self.work_item_id_first, self.work_item_id_last);
        self.stack = ActiveMaskStack::new(self.work_item_count, max_stack_size);
        self.pred = LaneMask::new(self.work_item_count);
    }

    pub(crate) fn bind_entry(&mut self, pc: usize) {
        self.entry_pc = Some(pc);
        self.cf_cursor = Some(pc);
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn id_in_work_group(&self) -> usize {
        self.id_in_work_group
    }

    pub fn work_group_id(&self) -> usize {
        self.work_group_id
    }

    pub fn ndrange_id(&self) -> NdRangeId {
        self.ndrange_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn work_item_id_first(&self) -> usize {
        self.work_item_id_first
    }

    pub fn work_item_id_last(&self) -> usize {
        self.work_item_id_last
    }

    pub fn work_item_count(&self) -> usize {
        self.work_item_count
    }

    /// Global ids of the work-items of this wavefront.
    pub fn work_item_ids(&self) -> std::ops::Range<usize> {
        self.work_item_id_first..self.work_item_id_first + self.work_item_count
    }

    pub fn clause_kind(&self) -> ClauseKind {
        self.clause_kind
    }

    /// Program counter every wavefront starts from, once instruction memory is bound.
    pub fn pc(&self) -> Option<usize> {
        self.entry_pc
    }

    /// Offset of the next control-flow instruction; `None` once the program ended.
    pub fn cf_cursor(&self) -> Option<usize> {
        self.cf_cursor
    }

    pub fn clause_cursor(&self) -> usize {
        self.clause_cursor
    }

    pub fn clause_end(&self) -> usize {
        self.clause_end
    }

    /// Last decoded control-flow instruction.
    pub fn cf_inst(&self) -> Option<&CfInst> {
        self.cf_inst.as_ref()
    }

    pub fn flags(&self) -> &ExecFlags {
        &self.flags
    }

    pub fn flags_mut(&mut self) -> &mut ExecFlags {
        &mut self.flags
    }

    pub fn stats(&self) -> &WavefrontStats {
        &self.stats
    }

    pub fn stack(&self) -> &ActiveMaskStack {
        &self.stack
    }

    pub fn stack_top(&self) -> usize {
        self.stack.top()
    }

    /// Mask at the top of the active-mask stack.
    pub fn active_mask(&self) -> &LaneMask {
        self.stack.current()
    }

    pub fn is_active(&self, lane: usize) -> bool {
        self.stack.current().get(lane)
    }

    /// Enable or disable `lane` in the current active mask.
    pub fn set_active(&mut self, lane: usize, active: bool) {
        self.stack.current_mut().set(lane, active);
        self.flags.active_mask_update = true;
    }

    pub fn pred_mask(&self) -> &LaneMask {
        &self.pred
    }

    pub fn pred(&self, lane: usize) -> bool {
        self.pred.get(lane)
    }

    pub fn set_pred(&mut self, lane: usize, value: bool) {
        self.pred.set(lane, value);
        self.flags.pred_mask_update = true;
    }

    /// The wavefront reached the end of its program.
    pub fn is_program_done(&self) -> bool {
        self.entry_pc.is_some() && self.clause_kind == ClauseKind::Cf && self.cf_cursor.is_none()
    }

    /// Push a copy of the current active mask.
    pub fn push(&mut self) -> Result<()> {
        self.stack.push().map_err(|err| self.stack_error(err))?;
        self.flags.active_mask_push += 1;
        trace!(wavefront = %self.name, top = self.stack.top(), "push");
        Ok(())
    }

    /// Pop `count` active-mask frames.
    pub fn pop(&mut self, count: usize) -> Result<()> {
        if count == 0 {
            return Ok(());
        }
        self.stack.pop(count).map_err(|err| self.stack_error(err))?;
        self.flags.active_mask_pop += count;
        self.flags.active_mask_update = true;
        if tracing::enabled!(tracing::Level::TRACE) {
            trace!(wavefront = %self.name, count, active = %self.stack.current(), "pop");
        }
        Ok(())
    }

    /// Continue control flow at byte offset `addr`.
    pub fn jump_cf(&mut self, addr: usize) {
        self.cf_cursor = Some(addr);
    }

    /// Exhaust the control-flow stream.
    pub fn end_program(&mut self) {
        self.cf_cursor = None;
    }

    /// Enter an ALU or fetch clause spanning `[start, end)` of the instruction buffer.
    pub fn start_clause(&mut self, kind: ClauseKind, start: usize, end: usize) -> Result<()> {
        debug_assert!(kind != ClauseKind::Cf, "the CF clause is entered by exhausting another clause");
        ensure!(start < end, EmptyClauseSnafu { wavefront: self.id, kind, start, end });
        self.clause_kind = kind;
        self.clause_cursor = start;
        self.clause_end = end;
        Ok(())
    }

    fn stack_error(&self, err: StackError) -> Error {
        match err {
            StackError::Overflow { max } => StackOverflowSnafu { wavefront: self.name.clone(), max }.build(),
            StackError::Underflow { count, depth } => {
                StackUnderflowSnafu { wavefront: self.name.clone(), count, depth }.build()
            }
        }
    }

    /// Decode and execute one clause unit: a CF instruction, an ALU group,
    /// or a fetch instruction.
    pub(crate) fn execute<D, H>(&mut self, mut env: WavefrontEnv<'_>, decoder: &D, handler: &mut H) -> Result<Step>
    where
        D: Decoder + ?Sized,
        H: OpcodeHandler + ?Sized,
    {
        ensure!(self.entry_pc.is_some(), InstMemoryUnboundSnafu { ndrange: self.ndrange_id });
        ensure!(!self.is_program_done(), WavefrontFinishedSnafu { wavefront: self.id });

        self.flags = ExecFlags::default();

        let clause = self.clause_kind;
        let inst_count = match clause {
            ClauseKind::Cf => self.execute_cf(&mut env, decoder, handler)?,
            ClauseKind::Alu => self.execute_alu_group(&mut env, decoder, handler)?,
            ClauseKind::Tex => self.execute_tex(&mut env, decoder, handler)?,
        };
        Ok(Step { clause, inst_count })
    }

    fn execute_cf<D, H>(&mut self, env: &mut WavefrontEnv<'_>, decoder: &D, handler: &mut H) -> Result<usize>
    where
        D: Decoder + ?Sized,
        H: OpcodeHandler + ?Sized,
    {
        let cursor = self.cf_cursor.context(WavefrontFinishedSnafu { wavefront: self.id })?;
        let (inst, next) = decoder.decode_cf(env.inst_buffer, cursor).context(DecodeSnafu)?;
        trace!(wavefront = %self.name, cursor, opcode = %inst.opcode, "cf");

        self.cf_cursor = next;
        self.cf_inst = Some(inst);

        // Executed once for the whole wavefront.
        let mut ctx = ExecContext {
            ndrange_id: self.ndrange_id,
            wavefront: &mut *self,
            work_item: None,
            scalar_work_item: &mut *env.scalar_work_item,
            inst_buffer: env.inst_buffer,
        };
        handler.execute(&Instruction::Cf(inst), &mut ctx)?;

        if self.flags.active_mask_update || inst.opcode.has_flag(InstFlag::ActMask) {
            let cf_inst_count = self.stats.cf_inst_count;
            for lane in self.stack.current().iter_ones() {
                env.work_items[lane].update_branch_digest(cf_inst_count, cursor as u32);
            }
        }

        self.stats.inst_count += 1;
        self.stats.cf_inst_count += 1;
        if inst.opcode.has_flag(InstFlag::Mem) {
            // Memory accesses from the CF stream are exports, i.e. writes.
            self.stats.global_mem_inst_count += 1;
            self.stats.cf_inst_global_mem_write_count += 1;
        }
        record(&mut env.histogram, inst.opcode);

        Ok(1)
    }

    fn execute_alu_group<D, H>(&mut self, env: &mut WavefrontEnv<'_>, decoder: &D, handler: &mut H) -> Result<usize>
    where
        D: Decoder + ?Sized,
        H: OpcodeHandler + ?Sized,
    {
        let (group, next) = decoder
            .decode_alu_group(env.inst_buffer, self.clause_cursor, self.stats.alu_group_count)
            .context(DecodeSnafu)?;
        trace!(wavefront = %self.name, cursor = self.clause_cursor, size = group.len(), "alu group");
        debug_assert!(next <= self.clause_end, "ALU group decoded past the clause end");
        self.clause_cursor = next;

        // The lane set is fixed for the whole group.
        let lanes: SmallVec<[usize; 64]> = self.stack.current().iter_ones().collect();
        for lane in lanes {
            let mut ctx = ExecContext {
                ndrange_id: self.ndrange_id,
                wavefront: &mut *self,
                work_item: Some(&mut env.work_items[lane]),
                scalar_work_item: &mut *env.scalar_work_item,
                inst_buffer: env.inst_buffer,
            };
            for inst in group.iter() {
                handler.execute(&Instruction::Alu(*inst), &mut ctx)?;
            }
            handler.commit_writes(&mut ctx)?;
        }

        let size = group.len();
        self.stats.inst_count += size as u64;
        self.stats.alu_inst_count += size as u64;
        self.stats.alu_group_count += 1;
        self.stats.alu_group_size[size - 1] += 1;
        for inst in group.iter() {
            if inst.is_local_mem() {
                self.stats.local_mem_inst_count += 1;
                self.stats.alu_inst_local_mem_count += 1;
            }
            record(&mut env.histogram, inst.opcode);
        }

        if self.clause_cursor >= self.clause_end {
            let mut ctx = ExecContext {
                ndrange_id: self.ndrange_id,
                wavefront: &mut *self,
                work_item: None,
                scalar_work_item: &mut *env.scalar_work_item,
                inst_buffer: env.inst_buffer,
            };
            handler.alu_clause_end(&mut ctx)?;
            self.stats.alu_clause_count += 1;
            self.clause_kind = ClauseKind::Cf;
        }

        Ok(size)
    }

    fn execute_tex<D, H>(&mut self, env: &mut WavefrontEnv<'_>, decoder: &D, handler: &mut H) -> Result<usize>
    where
        D: Decoder + ?Sized,
        H: OpcodeHandler + ?Sized,
    {
        let (inst, next) = decoder.decode_tex(env.inst_buffer, self.clause_cursor).context(DecodeSnafu)?;
        trace!(wavefront = %self.name, cursor = self.clause_cursor, opcode = %inst.opcode, "tex");
        debug_assert!(next <= self.clause_end, "fetch decoded past the clause end");
        self.clause_cursor = next;

        let lanes: SmallVec<[usize; 64]> = self.stack.current().iter_ones().collect();
        for lane in lanes {
            let mut ctx = ExecContext {
                ndrange_id: self.ndrange_id,
                wavefront: &mut *self,
                work_item: Some(&mut env.work_items[lane]),
                scalar_work_item: &mut *env.scalar_work_item,
                inst_buffer: env.inst_buffer,
            };
            handler.execute(&Instruction::Tex(inst), &mut ctx)?;
        }

        self.stats.inst_count += 1;
        self.stats.tc_inst_count += 1;
        if inst.opcode.has_flag(InstFlag::Mem) {
            // Fetch clause memory accesses are reads.
            self.stats.global_mem_inst_count += 1;
            self.stats.tc_inst_global_mem_read_count += 1;
        }
        record(&mut env.histogram, inst.opcode);

        if self.clause_cursor >= self.clause_end {
            let mut ctx = ExecContext {
                ndrange_id: self.ndrange_id,
                wavefront: &mut *self,
                work_item: None,
                scalar_work_item: &mut *env.scalar_work_item,
                inst_buffer: env.inst_buffer,
            };
            handler.tex_clause_end(&mut ctx)?;
            self.stats.tc_clause_count += 1;
            self.clause_kind = ClauseKind::Cf;
        }

        Ok(1)
    }
}

fn record(histogram: &mut Option<&mut [u64]>, opcode: Opcode) {
    if let Some(histogram) = histogram.as_deref_mut() {
        histogram[opcode.index()] += 1;
    }
}
