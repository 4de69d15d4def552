//! Owning simulator: every ND-Range, their status sets and the global timer.

use std::collections::{BTreeMap, BTreeSet};

use enumset::EnumSet;
use snafu::{OptionExt, ensure};
use tracing::debug;
use wavesim_isa::Decoder;

use crate::config::EmuConfig;
use crate::error::{LayoutMissingSnafu, Result, UnknownNdRangeSnafu};
use crate::handler::OpcodeHandler;
use crate::ndrange::{NdRange, NdRangeId, NdRangeStatus};
use crate::timer::SimTimer;
use crate::wavefront::Step;

#[derive(Debug)]
pub struct Emulator {
    config: EmuConfig,
    ndranges: BTreeMap<NdRangeId, NdRange>,
    next_id: u32,

    pending: BTreeSet<NdRangeId>,
    running: BTreeSet<NdRangeId>,
    finished: BTreeSet<NdRangeId>,

    timer: SimTimer,
    inst_count: u64,
}

impl Emulator {
    pub fn new(config: EmuConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            ndranges: BTreeMap::new(),
            next_id: 0,
            pending: BTreeSet::new(),
            running: BTreeSet::new(),
            finished: BTreeSet::new(),
            timer: SimTimer::new(),
            inst_count: 0,
        })
    }

    /// Emulator configured from `WAVESIM_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(EmuConfig::from_env())
    }

    pub fn config(&self) -> &EmuConfig {
        &self.config
    }

    pub fn timer(&self) -> &SimTimer {
        &self.timer
    }

    /// Clause units executed across all ND-Ranges. An ALU group counts once.
    pub fn inst_count(&self) -> u64 {
        self.inst_count
    }

    /// Number of ND-Ranges created so far, freed ones included.
    pub fn ndrange_count(&self) -> u32 {
        self.next_id
    }

    pub fn ndranges(&self) -> impl Iterator<Item = &NdRange> {
        self.ndranges.values()
    }

    pub fn pending_ndranges(&self) -> &BTreeSet<NdRangeId> {
        &self.pending
    }

    pub fn running_ndranges(&self) -> &BTreeSet<NdRangeId> {
        &self.running
    }

    pub fn finished_ndranges(&self) -> &BTreeSet<NdRangeId> {
        &self.finished
    }

    /// Create an empty ND-Range in the pending set.
    pub fn create_ndrange(&mut self, name: impl Into<String>) -> NdRangeId {
        let id = NdRangeId(self.next_id);
        self.next_id += 1;
        self.ndranges.insert(id, NdRange::new(id, name, &self.config));
        self.update_status(id, NdRangeStatus::Pending.into(), EnumSet::empty());
        debug!(ndrange = %id, "created");
        id
    }

    pub fn ndrange(&self, id: NdRangeId) -> Result<&NdRange> {
        self.ndranges.get(&id).context(UnknownNdRangeSnafu { ndrange: id })
    }

    pub fn ndrange_mut(&mut self, id: NdRangeId) -> Result<&mut NdRange> {
        self.ndranges.get_mut(&id).context(UnknownNdRangeSnafu { ndrange: id })
    }

    /// Add `status` bits to ND-Range `id`. Bits already set are ignored.
    pub fn set_ndrange_status(&mut self, id: NdRangeId, status: EnumSet<NdRangeStatus>) -> Result<()> {
        ensure!(self.ndranges.contains_key(&id), UnknownNdRangeSnafu { ndrange: id });
        self.update_status(id, status, EnumSet::empty());
        Ok(())
    }

    /// Remove `status` bits from ND-Range `id`. Bits not set are ignored.
    pub fn clear_ndrange_status(&mut self, id: NdRangeId, status: EnumSet<NdRangeStatus>) -> Result<()> {
        ensure!(self.ndranges.contains_key(&id), UnknownNdRangeSnafu { ndrange: id });
        self.update_status(id, EnumSet::empty(), status);
        Ok(())
    }

    // Caller guarantees `id` is live.
    fn update_status(&mut self, id: NdRangeId, set: EnumSet<NdRangeStatus>, clear: EnumSet<NdRangeStatus>) {
        let Some(ndrange) = self.ndranges.get_mut(&id) else {
            return;
        };

        let removed = clear & ndrange.status;
        ndrange.status -= removed;
        let added = set - ndrange.status;
        ndrange.status |= added;

        for bit in removed {
            let was_member = status_set(&mut self.pending, &mut self.running, &mut self.finished, bit).remove(&id);
            debug_assert!(was_member, "ND-Range {id} missing from {bit:?} set");
        }
        for bit in added {
            let inserted = status_set(&mut self.pending, &mut self.running, &mut self.finished, bit).insert(id);
            debug_assert!(inserted, "ND-Range {id} already in {bit:?} set");
        }
        if !removed.is_empty() || !added.is_empty() {
            debug!(ndrange = %id, ?added, ?removed, "status");
        }

        if self.running.is_empty() {
            self.timer.stop();
        } else {
            self.timer.start();
        }
    }

    /// Move ND-Range `id` and all of its work-groups from pending to running.
    pub fn launch(&mut self, id: NdRangeId) -> Result<()> {
        let ndrange = self.ndrange_mut(id)?;
        ensure!(ndrange.size().is_some(), LayoutMissingSnafu { ndrange: id });
        ndrange.launch_work_groups();
        self.update_status(id, NdRangeStatus::Running.into(), NdRangeStatus::Pending.into());
        Ok(())
    }

    /// Execute one clause unit on a wavefront, then run the completion cascade.
    pub fn execute<D, H>(&mut self, id: NdRangeId, wavefront: usize, decoder: &D, handler: &mut H) -> Result<Step>
    where
        D: Decoder + ?Sized,
        H: OpcodeHandler + ?Sized,
    {
        let ndrange = self.ndrange_mut(id)?;
        let step = ndrange.execute_wavefront(wavefront, decoder, handler)?;
        let cascade = ndrange.finish_wavefront(wavefront)?;
        self.inst_count += 1;

        if cascade.ndrange {
            debug!(ndrange = %id, "ND-Range finished");
            self.update_status(id, NdRangeStatus::Finished.into(), NdRangeStatus::Pending | NdRangeStatus::Running);
        }
        Ok(step)
    }

    /// Drive ND-Range `id` to completion, one clause unit per unfinished
    /// wavefront per round.
    ///
    /// Launches the ND-Range if it is still pending. Stops early once the
    /// configured instruction limit is reached. Returns the number of
    /// clause units executed by this call.
    pub fn run<D, H>(&mut self, id: NdRangeId, decoder: &D, handler: &mut H) -> Result<u64>
    where
        D: Decoder + ?Sized,
        H: OpcodeHandler + ?Sized,
    {
        if self.ndrange(id)?.status().contains(NdRangeStatus::Pending) {
            self.launch(id)?;
        }

        let start = self.inst_count;
        loop {
            let ndrange = self.ndrange(id)?;
            if ndrange.is_finished() {
                break;
            }
            let active: Vec<usize> =
                ndrange.wavefronts().iter().filter(|wavefront| !wavefront.is_program_done()).map(|w| w.id()).collect();
            if active.is_empty() {
                break;
            }

            for wavefront in active {
                if self.config.max_inst.is_some_and(|max| self.inst_count >= max) {
                    debug!(ndrange = %id, inst_count = self.inst_count, "instruction limit reached");
                    return Ok(self.inst_count - start);
                }
                self.execute(id, wavefront, decoder, handler)?;
            }
        }
        Ok(self.inst_count - start)
    }

    /// Tear down ND-Range `id`.
    ///
    /// Runs the free-notify callback first, then completes the host event,
    /// retires the host command and clears every status bit before the
    /// ND-Range and everything it owns is dropped.
    pub fn free_ndrange(&mut self, id: NdRangeId) -> Result<()> {
        let ndrange = self.ndrange_mut(id)?;
        if let Some(notify) = ndrange.free_notify.take() {
            notify(id);
        }
        ndrange.host.release();

        self.update_status(id, EnumSet::empty(), EnumSet::all());
        // Fields drop in declaration order: work-groups, wavefronts, work-items,
        // histogram, then the instruction buffer.
        drop(self.ndranges.remove(&id));
        debug!(ndrange = %id, "freed");
        Ok(())
    }
}

impl Drop for Emulator {
    fn drop(&mut self) {
        let ids: Vec<NdRangeId> = self.ndranges.keys().copied().collect();
        for id in ids {
            // Only fails for unknown ids.
            let _ = self.free_ndrange(id);
        }
    }
}

fn status_set<'a>(
    pending: &'a mut BTreeSet<NdRangeId>,
    running: &'a mut BTreeSet<NdRangeId>,
    finished: &'a mut BTreeSet<NdRangeId>,
    status: NdRangeStatus,
) -> &'a mut BTreeSet<NdRangeId> {
    match status {
        NdRangeStatus::Pending => pending,
        NdRangeStatus::Running => running,
        NdRangeStatus::Finished => finished,
    }
}
