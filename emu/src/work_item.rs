/// Multiplier spreading the instruction count over the digest bits.
const DIGEST_SPREAD: u32 = 0x9e37_79b9;

/// A single logical thread of the kernel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkItem {
    /// Flattened global id.
    pub id: usize,
    pub id_3d: [u32; 3],
    /// Flattened id within the work-group.
    pub id_in_work_group: usize,
    pub id_in_work_group_3d: [u32; 3],
    /// Lane of this work-item in its wavefront.
    pub id_in_wavefront: usize,
    pub work_group_id: usize,
    pub wavefront_id: usize,
    pub(crate) branch_digest: u32,
}

impl WorkItem {
    /// Scalar work-item paired with a wavefront.
    pub(crate) fn scalar(wavefront_id: usize, work_group_id: usize) -> Self {
        Self { wavefront_id, work_group_id, ..Default::default() }
    }

    /// Running digest of the control flow taken by this work-item.
    pub fn branch_digest(&self) -> u32 {
        self.branch_digest
    }

    #[cfg(test)]
    pub(crate) fn set_branch_digest(&mut self, digest: u32) {
        self.branch_digest = digest;
    }

    /// Fold a control-flow instruction that may have changed the active mask
    /// into the digest. Only called for lanes active at that point, so lanes
    /// that took different paths end up with different digests.
    pub(crate) fn update_branch_digest(&mut self, cf_inst_count: u64, inst_addr: u32) {
        self.branch_digest =
            self.branch_digest.rotate_left(5) ^ (cf_inst_count as u32).wrapping_mul(DIGEST_SPREAD) ^ inst_addr;
    }
}
