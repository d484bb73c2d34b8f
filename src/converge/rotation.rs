// ABOUTME: Retirement order and retention arithmetic for superseded generations.
// ABOUTME: Oldest finish time goes first; equal times fall back to the unique name.

use crate::runtime::ContainerRecord;
use std::collections::VecDeque;

/// Order superseded generations for removal, oldest first.
///
/// `finished_at` must be read after the generations were stopped, so a
/// container stopped during this rollout sorts after ones that exited earlier.
pub fn removal_queue(mut records: Vec<ContainerRecord>) -> VecDeque<ContainerRecord> {
    records.sort_by(|a, b| {
        a.finished_at
            .cmp(&b.finished_at)
            .then_with(|| a.unique_name.cmp(&b.unique_name))
    });
    records.into()
}

/// How many queued generations must go so that fewer than `keep_releases`
/// remain. `keep_releases = 0` empties the queue.
pub fn excess(queued: usize, keep_releases: u32) -> usize {
    let keep = keep_releases as usize;
    if queued == 0 {
        0
    } else if keep == 0 {
        queued
    } else if queued >= keep {
        queued - keep + 1
    } else {
        0
    }
}
