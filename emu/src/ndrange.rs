//! ND-Range layout and ownership.
//!
//! An [`NdRange`] owns every work-group, wavefront and work-item of one
//! kernel launch in flat index-addressed arrays. Parents refer to children
//! by id ranges, children refer to parents by id.
//!
//! # Layout
//!
//! [`NdRange::setup_size`] walks work-groups in (z, y, x) major order and,
//! inside each work-group, local coordinates in (z, y, x) major order. Global
//! work-item ids, local ids and wavefront membership all follow from that
//! single traversal:
//!
//! ```text
//! global (8,1,1), local (4,1,1), wavefront size 4
//!
//! work-group 0 ── wavefront 0 ── work-items 0 1 2 3
//! work-group 1 ── wavefront 1 ── work-items 4 5 6 7
//! ```

use std::collections::BTreeSet;
use std::sync::Arc;

use enumset::{EnumSet, EnumSetType};
use snafu::{OptionExt, ensure};
use strum::EnumCount;
use tracing::debug;
use wavesim_isa::{Decoder, Opcode};

use crate::config::EmuConfig;
use crate::error::{
    InstMemoryAlreadyBoundSnafu, InstMemoryUnboundSnafu, InvalidEntryPcSnafu, InvalidGlobalSizeSnafu,
    InvalidLocalSizeSnafu, InvalidWorkDimSnafu, LayoutAlreadySetSnafu, LayoutMissingSnafu, NonDivisibleSizeSnafu,
    Result, SizeOverflowSnafu, WavefrontOutOfRangeSnafu, WorkGroupOutOfRangeSnafu,
};
use crate::handler::OpcodeHandler;
use crate::host::{CommandId, CommandQueue, HostBinding, HostEvent};
use crate::wavefront::{Step, Wavefront, WavefrontEnv};
use crate::work_group::{WorkGroup, WorkGroupStatus};
use crate::work_item::WorkItem;

/// Sequential identifier of an ND-Range within its emulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NdRangeId(pub u32);

impl std::fmt::Display for NdRangeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle bits of an ND-Range.
#[derive(Debug, Hash, PartialOrd, Ord, EnumSetType)]
pub enum NdRangeStatus {
    Pending,
    Running,
    Finished,
}

/// Sizes fixed by [`NdRange::setup_size`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NdRangeSize {
    pub work_dim: u32,
    pub global_size3: [u32; 3],
    pub local_size3: [u32; 3],
    pub group_count3: [u32; 3],
    /// Total work-items.
    pub global_size: usize,
    /// Work-items per work-group.
    pub local_size: usize,
    /// Total work-groups.
    pub group_count: usize,
    pub wavefronts_per_work_group: usize,
}

impl NdRangeSize {
    /// `None` if a total does not fit in `usize`.
    fn new(work_dim: u32, global_size3: [u32; 3], local_size3: [u32; 3], wavefront_size: usize) -> Option<Self> {
        let group_count3 = std::array::from_fn(|i| global_size3[i] / local_size3[i]);
        let product = |v: [u32; 3]| v.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d as usize));
        let local_size = product(local_size3)?;
        let group_count = product(group_count3)?;
        let wavefronts_per_work_group = local_size.div_ceil(wavefront_size);
        group_count.checked_mul(wavefronts_per_work_group)?;
        Some(Self {
            work_dim,
            global_size3,
            local_size3,
            group_count3,
            global_size: product(global_size3)?,
            local_size,
            group_count,
            wavefronts_per_work_group,
        })
    }

    pub fn wavefront_count(&self) -> usize {
        self.group_count * self.wavefronts_per_work_group
    }
}

/// Outcome of one completion check.
///
/// Each flag is set only on the call that performs the transition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cascade {
    pub wavefront: bool,
    pub work_group: bool,
    pub ndrange: bool,
}

type FreeNotify = Box<dyn FnOnce(NdRangeId)>;

/// Kernel launch: the full index space and everything executing it.
pub struct NdRange {
    id: NdRangeId,
    name: String,
    wavefront_size: usize,
    max_stack_size: usize,

    pub(crate) status: EnumSet<NdRangeStatus>,
    size: Option<NdRangeSize>,

    work_groups: Vec<WorkGroup>,
    wavefronts: Vec<Wavefront>,
    /// One per wavefront, same index.
    scalar_work_items: Vec<WorkItem>,
    work_items: Vec<WorkItem>,

    pending_work_groups: BTreeSet<usize>,
    running_work_groups: BTreeSet<usize>,
    finished_work_groups: BTreeSet<usize>,

    histogram: Option<Vec<u64>>,
    inst_buffer: Option<Box<[u8]>>,
    entry_pc: Option<usize>,

    pub(crate) free_notify: Option<FreeNotify>,
    pub(crate) host: HostBinding,
}

impl std::fmt::Debug for NdRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NdRange")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("status", &self.status)
            .field("size", &self.size)
            .field("work_groups", &self.work_groups.len())
            .field("wavefronts", &self.wavefronts.len())
            .field("work_items", &self.work_items.len())
            .field("entry_pc", &self.entry_pc)
            .finish_non_exhaustive()
    }
}

impl NdRange {
    pub(crate) fn new(id: NdRangeId, name: impl Into<String>, config: &EmuConfig) -> Self {
        Self {
            id,
            name: name.into(),
            wavefront_size: config.wavefront_size,
            max_stack_size: config.max_stack_size,
            status: EnumSet::empty(),
            size: None,
            work_groups: Vec::new(),
            wavefronts: Vec::new(),
            scalar_work_items: Vec::new(),
            work_items: Vec::new(),
            pending_work_groups: BTreeSet::new(),
            running_work_groups: BTreeSet::new(),
            finished_work_groups: BTreeSet::new(),
            histogram: config.inst_histogram.then(|| vec![0; Opcode::COUNT]),
            inst_buffer: None,
            entry_pc: None,
            free_notify: None,
            host: HostBinding::default(),
        }
    }

    /// Fix the launch geometry and build the work-group, wavefront and
    /// work-item hierarchy.
    ///
    /// Only the first `work_dim` entries of each size are used; the other
    /// dimensions are 1. Nothing is allocated if validation fails.
    pub fn setup_size(&mut self, global_size: [u32; 3], local_size: [u32; 3], work_dim: u32) -> Result<()> {
        ensure!(self.size.is_none(), LayoutAlreadySetSnafu { ndrange: self.id });
        ensure!((1..=3).contains(&work_dim), InvalidWorkDimSnafu { work_dim });

        let mut global_size3 = [1; 3];
        let mut local_size3 = [1; 3];
        let dims = work_dim as usize;
        global_size3[..dims].copy_from_slice(&global_size[..dims]);
        local_size3[..dims].copy_from_slice(&local_size[..dims]);

        ensure!(local_size3.iter().all(|&d| d >= 1), InvalidLocalSizeSnafu { local_size: local_size3 });
        ensure!(global_size3.iter().all(|&d| d >= 1), InvalidGlobalSizeSnafu { global_size: global_size3 });
        ensure!(
            global_size3.iter().zip(&local_size3).all(|(g, l)| g % l == 0),
            NonDivisibleSizeSnafu { global_size: global_size3, local_size: local_size3 }
        );

        let size = NdRangeSize::new(work_dim, global_size3, local_size3, self.wavefront_size)
            .context(SizeOverflowSnafu { global_size: global_size3, local_size: local_size3 })?;
        self.build_layout(&size);
        self.size = Some(size);

        debug!(
            ndrange = %self.id,
            local_size = size.local_size,
            local_size3 = ?size.local_size3,
            global_size = size.global_size,
            global_size3 = ?size.global_size3,
            group_count = size.group_count,
            group_count3 = ?size.group_count3,
            wavefront_count = self.wavefronts.len(),
            wavefronts_per_work_group = size.wavefronts_per_work_group,
            "layout"
        );
        Ok(())
    }

    fn build_layout(&mut self, size: &NdRangeSize) {
        let wpg = size.wavefronts_per_work_group;
        let wavefront_count = size.wavefront_count();

        self.wavefronts = (0..wavefront_count).map(|wid| Wavefront::new(wid, wid % wpg, wid / wpg, self.id)).collect();
        self.scalar_work_items = (0..wavefront_count).map(|wid| WorkItem::scalar(wid, wid / wpg)).collect();
        self.work_groups = Vec::with_capacity(size.group_count);
        self.work_items = Vec::with_capacity(size.global_size);

        let [local_x, local_y, local_z] = size.local_size3;
        let [groups_x, groups_y, groups_z] = size.group_count3;

        let mut gid = 0;
        for gz in 0..groups_z {
            for gy in 0..groups_y {
                for gx in 0..groups_x {
                    let first_tid = self.work_items.len();
                    self.work_groups.push(WorkGroup::new(
                        gid,
                        [gx, gy, gz],
                        self.id,
                        first_tid,
                        size.local_size,
                        gid * wpg,
                        wpg,
                    ));

                    let mut lid = 0;
                    for lz in 0..local_z {
                        for ly in 0..local_y {
                            for lx in 0..local_x {
                                let tid = self.work_items.len();
                                let wid = gid * wpg + lid / self.wavefront_size;
                                debug_assert!(wid < wavefront_count);

                                self.work_items.push(WorkItem {
                                    id: tid,
                                    id_3d: [gx * local_x + lx, gy * local_y + ly, gz * local_z + lz],
                                    id_in_work_group: lid,
                                    id_in_work_group_3d: [lx, ly, lz],
                                    id_in_wavefront: lid % self.wavefront_size,
                                    work_group_id: gid,
                                    wavefront_id: wid,
                                    ..Default::default()
                                });
                                self.wavefronts[wid].assign_work_item(tid);
                                lid += 1;
                            }
                        }
                    }

                    self.set_work_group_status_unchecked(gid, WorkGroupStatus::Pending.into());
                    gid += 1;
                }
            }
        }

        for wavefront in &mut self.wavefronts {
            wavefront.finish_layout(self.max_stack_size);
        }
    }

    /// Copy the kernel binary in and point every wavefront at `entry_pc`.
    pub fn setup_instruction_memory(&mut self, buffer: &[u8], entry_pc: usize) -> Result<()> {
        ensure!(self.inst_buffer.is_none(), InstMemoryAlreadyBoundSnafu { ndrange: self.id });
        ensure!(entry_pc < buffer.len(), InvalidEntryPcSnafu { pc: entry_pc, size: buffer.len() });
        ensure!(self.size.is_some(), LayoutMissingSnafu { ndrange: self.id });

        self.inst_buffer = Some(buffer.into());
        self.entry_pc = Some(entry_pc);
        for wavefront in &mut self.wavefronts {
            wavefront.bind_entry(entry_pc);
        }
        debug!(ndrange = %self.id, size = buffer.len(), entry_pc, "instruction memory bound");
        Ok(())
    }

    pub fn id(&self) -> NdRangeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> EnumSet<NdRangeStatus> {
        self.status
    }

    /// Launch geometry, once set up.
    pub fn size(&self) -> Option<&NdRangeSize> {
        self.size.as_ref()
    }

    pub fn wavefront_size(&self) -> usize {
        self.wavefront_size
    }

    pub fn work_groups(&self) -> &[WorkGroup] {
        &self.work_groups
    }

    pub fn work_group(&self, id: usize) -> Option<&WorkGroup> {
        self.work_groups.get(id)
    }

    pub fn wavefronts(&self) -> &[Wavefront] {
        &self.wavefronts
    }

    pub fn wavefront(&self, id: usize) -> Option<&Wavefront> {
        self.wavefronts.get(id)
    }

    pub fn wavefront_mut(&mut self, id: usize) -> Option<&mut Wavefront> {
        self.wavefronts.get_mut(id)
    }

    pub fn work_items(&self) -> &[WorkItem] {
        &self.work_items
    }

    pub fn work_item(&self, id: usize) -> Option<&WorkItem> {
        self.work_items.get(id)
    }

    /// Work-items of wavefront `id`, indexed by lane.
    pub fn wavefront_work_items(&self, id: usize) -> Option<&[WorkItem]> {
        self.wavefronts.get(id).map(|wavefront| &self.work_items[wavefront.work_item_ids()])
    }

    pub fn scalar_work_item(&self, wavefront_id: usize) -> Option<&WorkItem> {
        self.scalar_work_items.get(wavefront_id)
    }

    pub fn pending_work_groups(&self) -> &BTreeSet<usize> {
        &self.pending_work_groups
    }

    pub fn running_work_groups(&self) -> &BTreeSet<usize> {
        &self.running_work_groups
    }

    pub fn finished_work_groups(&self) -> &BTreeSet<usize> {
        &self.finished_work_groups
    }

    pub fn is_finished(&self) -> bool {
        self.size.is_some() && self.finished_work_groups.len() == self.work_groups.len()
    }

    /// Opcode histogram indexed by [`Opcode::index`], if enabled.
    pub fn histogram(&self) -> Option<&[u64]> {
        self.histogram.as_deref()
    }

    pub fn inst_buffer(&self) -> Option<&[u8]> {
        self.inst_buffer.as_deref()
    }

    pub fn entry_pc(&self) -> Option<usize> {
        self.entry_pc
    }

    /// Register a callback run once when the ND-Range is freed, before any
    /// other teardown. Replaces a previously registered callback.
    pub fn set_free_notify(&mut self, notify: impl FnOnce(NdRangeId) + 'static) {
        self.free_notify = Some(Box::new(notify));
    }

    /// Attach the host event and queued command retired when the ND-Range is freed.
    pub fn bind_host(&mut self, event: Option<HostEvent>, command: Option<(Arc<dyn CommandQueue>, CommandId)>) {
        self.host = HostBinding { event, command };
    }

    /// Add `status` bits to work-group `id`. Bits already set are ignored.
    pub fn set_work_group_status(&mut self, id: usize, status: EnumSet<WorkGroupStatus>) -> Result<()> {
        let count = self.work_groups.len();
        ensure!(id < count, WorkGroupOutOfRangeSnafu { work_group: id, count });
        self.set_work_group_status_unchecked(id, status);
        Ok(())
    }

    /// Remove `status` bits from work-group `id`. Bits not set are ignored.
    pub fn clear_work_group_status(&mut self, id: usize, status: EnumSet<WorkGroupStatus>) -> Result<()> {
        let count = self.work_groups.len();
        ensure!(id < count, WorkGroupOutOfRangeSnafu { work_group: id, count });
        self.clear_work_group_status_unchecked(id, status);
        Ok(())
    }

    fn set_work_group_status_unchecked(&mut self, id: usize, status: EnumSet<WorkGroupStatus>) {
        let added = status - self.work_groups[id].status;
        for bit in added {
            let inserted = self.work_group_set(bit).insert(id);
            debug_assert!(inserted, "work-group {id} already in {bit:?} set");
        }
        self.work_groups[id].status |= added;
    }

    fn clear_work_group_status_unchecked(&mut self, id: usize, status: EnumSet<WorkGroupStatus>) {
        let removed = status & self.work_groups[id].status;
        for bit in removed {
            let was_member = self.work_group_set(bit).remove(&id);
            debug_assert!(was_member, "work-group {id} missing from {bit:?} set");
        }
        self.work_groups[id].status -= removed;
    }

    fn work_group_set(&mut self, status: WorkGroupStatus) -> &mut BTreeSet<usize> {
        match status {
            WorkGroupStatus::Pending => &mut self.pending_work_groups,
            WorkGroupStatus::Running => &mut self.running_work_groups,
            WorkGroupStatus::Finished => &mut self.finished_work_groups,
        }
    }

    /// Move every pending work-group to running.
    pub(crate) fn launch_work_groups(&mut self) {
        let pending: Vec<usize> = self.pending_work_groups.iter().copied().collect();
        for id in pending {
            self.clear_work_group_status_unchecked(id, WorkGroupStatus::Pending.into());
            self.set_work_group_status_unchecked(id, WorkGroupStatus::Running.into());
        }
    }

    /// Run one clause unit on wavefront `id`.
    pub(crate) fn execute_wavefront<D, H>(&mut self, id: usize, decoder: &D, handler: &mut H) -> Result<Step>
    where
        D: Decoder + ?Sized,
        H: OpcodeHandler + ?Sized,
    {
        ensure!(self.size.is_some(), LayoutMissingSnafu { ndrange: self.id });
        let count = self.wavefronts.len();
        let wavefront = self.wavefronts.get_mut(id).context(WavefrontOutOfRangeSnafu { wavefront: id, count })?;
        let inst_buffer = self.inst_buffer.as_deref().context(InstMemoryUnboundSnafu { ndrange: self.id })?;

        let env = WavefrontEnv {
            inst_buffer,
            work_items: &mut self.work_items[wavefront.work_item_ids()],
            scalar_work_item: &mut self.scalar_work_items[id],
            histogram: self.histogram.as_deref_mut(),
        };
        wavefront.execute(env, decoder, handler)
    }

    /// Completion check for wavefront `id`.
    ///
    /// A wavefront whose program is done moves to its work-group's finished
    /// set; the last one to finish moves the work-group from running to
    /// finished. `Cascade::ndrange` reports that the last work-group just
    /// finished; the ND-Range status itself belongs to the emulator.
    pub(crate) fn finish_wavefront(&mut self, id: usize) -> Result<Cascade> {
        let count = self.wavefronts.len();
        let wavefront = self.wavefronts.get(id).context(WavefrontOutOfRangeSnafu { wavefront: id, count })?;

        let mut cascade = Cascade::default();
        if !wavefront.is_program_done() {
            return Ok(cascade);
        }

        let gid = wavefront.work_group_id();
        let work_group = &mut self.work_groups[gid];
        cascade.wavefront = work_group.finish_wavefront(id);
        if !cascade.wavefront || !work_group.is_finished() {
            return Ok(cascade);
        }

        self.clear_work_group_status_unchecked(gid, WorkGroupStatus::Pending | WorkGroupStatus::Running);
        self.set_work_group_status_unchecked(gid, WorkGroupStatus::Finished.into());
        cascade.work_group = true;
        debug!(ndrange = %self.id, work_group = gid, "work-group finished");

        cascade.ndrange = self.is_finished();
        Ok(cascade)
    }
}
