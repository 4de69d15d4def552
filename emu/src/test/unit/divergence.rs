use test_case::test_case;

use crate::divergence::{DivergenceReport, LaneRange};
use crate::work_item::WorkItem;

fn items(digests: &[u32]) -> Vec<WorkItem> {
    digests
        .iter()
        .enumerate()
        .map(|(lane, &digest)| {
            let mut item = WorkItem { id: lane, id_in_wavefront: lane, ..Default::default() };
            item.set_branch_digest(digest);
            item
        })
        .collect()
}

fn ranges(report: &DivergenceReport) -> Vec<String> {
    report.groups.iter().map(|group| group.ranges_display()).collect()
}

#[test]
fn test_non_contiguous_group_keeps_separate_ranges() {
    let report = DivergenceReport::analyze(&items(&[0xa, 0xa, 0xb, 0xa]));

    assert_eq!(report.len(), 2);
    assert_eq!(report.groups[0].digest, 0xa);
    assert_eq!(report.groups[0].count, 3);
    assert_eq!(report.groups[0].ranges.as_slice(), &[LaneRange { first: 0, last: 1 }, LaneRange { first: 3, last: 3 }]);
    assert_eq!(report.groups[1].digest, 0xb);
    assert_eq!(report.groups[1].count, 1);
    assert_eq!(ranges(&report), vec!["0-1 3", "2"]);
}

#[test_case(&[7, 7, 7, 7], &["0-3"]; "uniform")]
#[test_case(&[1, 2, 1, 2], &["0 2", "1 3"]; "interleaved_tie")]
#[test_case(&[5, 6, 6, 6, 5], &["1-3", "0 4"]; "larger_group_first")]
#[test_case(&[9], &["0"]; "single_lane")]
fn test_group_ranges(digests: &[u32], expected: &[&str]) {
    let report = DivergenceReport::analyze(&items(digests));
    assert_eq!(ranges(&report), expected);
}

#[test]
fn test_ties_keep_first_seen_order() {
    let report = DivergenceReport::analyze(&items(&[3, 1, 2, 3, 1, 2]));
    let digests: Vec<_> = report.groups.iter().map(|group| group.digest).collect();
    assert_eq!(digests, vec![3, 1, 2]);
}

#[test]
fn test_dump_lines() {
    let report = DivergenceReport::analyze(&items(&[0xa, 0xa, 0xb, 0xa]));
    let mut out = String::new();
    report.dump(&mut out).unwrap();

    assert_eq!(
        out,
        "DivergenceGroups = 2\n\
         DivergenceGroupsSize = 3 1\n\
         \n\
         DivergenceGroup[0] = 0-1 3\n\
         DivergenceGroup[1] = 2\n\
         \n"
    );
}
