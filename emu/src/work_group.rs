use std::collections::BTreeSet;

use enumset::{EnumSet, EnumSetType};
use tracing::debug;

use crate::ndrange::NdRangeId;

/// Lifecycle bits of a work-group.
#[derive(Debug, Hash, PartialOrd, Ord, EnumSetType)]
pub enum WorkGroupStatus {
    Pending,
    Running,
    Finished,
}

/// A fixed-size partition of the ND-Range and the wavefronts covering it.
#[derive(Debug, Clone)]
pub struct WorkGroup {
    id: usize,
    id_3d: [u32; 3],
    ndrange_id: NdRangeId,
    name: String,

    work_item_id_first: usize,
    work_item_id_last: usize,
    work_item_count: usize,

    wavefront_id_first: usize,
    wavefront_id_last: usize,
    wavefront_count: usize,

    pub(crate) status: EnumSet<WorkGroupStatus>,
    running_wavefronts: BTreeSet<usize>,
    finished_wavefronts: BTreeSet<usize>,
}

impl WorkGroup {
    /// Work-group owning `work_item_count` items starting at `work_item_id_first`
    /// and `wavefront_count` wavefronts starting at `wavefront_id_first`.
    ///
    /// Every wavefront starts in the running set.
    pub(crate) fn new(
        id: usize,
        id_3d: [u32; 3],
        ndrange_id: NdRangeId,
        work_item_id_first: usize,
        work_item_count: usize,
        wavefront_id_first: usize,
        wavefront_count: usize,
    ) -> Self {
        let work_item_id_last = work_item_id_first + work_item_count - 1;
        let wavefront_id_last = wavefront_id_first + wavefront_count - 1;
        Self {
            id,
            id_3d,
            ndrange_id,
            name: format!("work-group[i{work_item_id_first}-i{work_item_id_last}]"),
            work_item_id_first,
            work_item_id_last,
            work_item_count,
            wavefront_id_first,
            wavefront_id_last,
            wavefront_count,
            status: EnumSet::empty(),
            running_wavefronts: (wavefront_id_first..=wavefront_id_last).collect(),
            finished_wavefronts: BTreeSet::new(),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn id_3d(&self) -> [u32; 3] {
        self.id_3d
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

    pub fn wavefront_id_first(&self) -> usize {
        self.wavefront_id_first
    }

    pub fn wavefront_id_last(&self) -> usize {
        self.wavefront_id_last
    }

    pub fn wavefront_count(&self) -> usize {
        self.wavefront_count
    }

    /// Global ids of the wavefronts of this work-group.
    pub fn wavefront_ids(&self) -> std::ops::RangeInclusive<usize> {
        self.wavefront_id_first..=self.wavefront_id_last
    }

    pub fn status(&self) -> EnumSet<WorkGroupStatus> {
        self.status
    }

    pub fn running_wavefronts(&self) -> &BTreeSet<usize> {
        &self.running_wavefronts
    }

    pub fn finished_wavefronts(&self) -> &BTreeSet<usize> {
        &self.finished_wavefronts
    }

    pub fn is_finished(&self) -> bool {
        self.finished_wavefronts.len() == self.wavefront_count
    }

    /// Move wavefront `wavefront_id` from the running to the finished set.
    ///
    /// Returns `false` if the wavefront had already finished.
    pub(crate) fn finish_wavefront(&mut self, wavefront_id: usize) -> bool {
        debug_assert!(
            self.wavefront_ids().contains(&wavefront_id),
            "wavefront {wavefront_id} not in {}",
            self.name
        );
        if !self.running_wavefronts.remove(&wavefront_id) {
            debug_assert!(self.finished_wavefronts.contains(&wavefront_id));
            return false;
        }
        self.finished_wavefronts.insert(wavefront_id);
        debug!(work_group = self.id, wavefront = wavefront_id, "wavefront finished");
        true
    }
}
