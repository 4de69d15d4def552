//! Divergence analysis over branch digests.
//!
//! Reporting only; nothing here feeds back into execution.

use std::fmt;

use smallvec::SmallVec;

use crate::work_item::WorkItem;

/// Contiguous run of lanes, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaneRange {
    pub first: usize,
    pub last: usize,
}

impl fmt::Display for LaneRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.first == self.last { write!(f, "{}", self.first) } else { write!(f, "{}-{}", self.first, self.last) }
    }
}

/// Work-items of one wavefront sharing a branch digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DivergenceGroup {
    pub digest: u32,
    pub count: usize,
    /// Maximal runs of member lanes, ascending.
    pub ranges: SmallVec<[LaneRange; 2]>,
}

impl DivergenceGroup {
    /// Ranges joined by spaces, e.g. `0-1 3`.
    pub fn ranges_display(&self) -> String {
        self.ranges.iter().map(ToString::to_string).collect::<Vec<_>>().join(" ")
    }
}

/// Grouping of a wavefront's lanes by branch digest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DivergenceReport {
    /// Largest group first; groups of equal size keep first-seen order.
    pub groups: Vec<DivergenceGroup>,
}

impl DivergenceReport {
    /// Analyze `work_items`, indexed by lane.
    pub fn analyze(work_items: &[WorkItem]) -> Self {
        let mut groups: Vec<DivergenceGroup> = Vec::new();

        for (lane, item) in work_items.iter().enumerate() {
            let digest = item.branch_digest();
            let index = match groups.iter().position(|g| g.digest == digest) {
                Some(index) => index,
                None => {
                    groups.push(DivergenceGroup { digest, count: 0, ranges: SmallVec::new() });
                    groups.len() - 1
                }
            };
            let group = &mut groups[index];
            group.count += 1;
            match group.ranges.last_mut() {
                Some(range) if range.last + 1 == lane => range.last = lane,
                _ => group.ranges.push(LaneRange { first: lane, last: lane }),
            }
        }

        groups.sort_by(|a, b| b.count.cmp(&a.count));
        Self { groups }
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Write the `DivergenceGroups*` report lines.
    pub fn dump(&self, f: &mut dyn fmt::Write) -> fmt::Result {
        writeln!(f, "DivergenceGroups = {}", self.groups.len())?;
        f.write_str("DivergenceGroupsSize =")?;
        for group in &self.groups {
            write!(f, " {}", group.count)?;
        }
        f.write_str("\n\n")?;

        for (index, group) in self.groups.iter().enumerate() {
            write!(f, "DivergenceGroup[{index}] =")?;
            for range in &group.ranges {
                write!(f, " {range}")?;
            }
            f.write_str("\n")?;
        }
        f.write_str("\n")
    }
}
