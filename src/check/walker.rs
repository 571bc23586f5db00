//! Depth-first directory walk.
//!
//! Directories are visited in pre-order: a subdirectory's contents are
//! finished before the next entry of its parent. The pending directories
//! live on an explicit stack so a deep or cyclic tree cannot exhaust the
//! call stack.

use std::collections::HashSet;

use log::debug;

use super::{Anomaly, Checker};
use crate::fs::{DirEntry, FatEntry};

/// A directory on the walk stack and the position reached inside it.
struct DirFrame {
    path: String,
    depth: usize,
    slots: Vec<usize>,
    next: usize,
}

impl DirFrame {
    fn new(path: String, depth: usize, slots: Vec<usize>) -> Self {
        Self {
            path,
            depth,
            slots,
            next: 0,
        }
    }

    fn next_slot(&mut self) -> Option<usize> {
        let slot = self.slots.get(self.next).copied()?;
        self.next += 1;
        Some(slot)
    }
}

impl<F: FnMut(&str)> Checker<'_, F> {
    /// Visit every reachable entry, marking the clusters of each chain.
    pub(super) fn walk_tree(&mut self) {
        let mut stack = vec![DirFrame::new(String::new(), 0, self.volume.root_slots())];
        self.report.directories_visited += 1;

        while let Some(frame) = stack.last_mut() {
            let Some(slot) = frame.next_slot() else {
                stack.pop();
                continue;
            };

            let entry = self.volume.dirent(slot);
            if let Some(child) = self.visit_entry(&entry, &frame.path, frame.depth) {
                stack.push(child);
            }
        }
    }

    /// Handle one slot. Returns the frame to descend into when the
    /// entry is a followable subdirectory.
    fn visit_entry(&mut self, entry: &DirEntry, parent: &str, depth: usize) -> Option<DirFrame> {
        if entry.is_empty() || entry.is_deleted() || entry.is_dot() || entry.is_long_name() {
            return None;
        }

        if entry.is_volume_label() {
            let label = entry.label();
            (self.log_cb)(&format!("Volume: {label}"));
            self.report.volume_label = Some(label);
            return None;
        }

        let name = entry.short_name();
        let path = format!("{parent}/{name}");

        if entry.is_directory() {
            if entry.is_hidden() {
                debug!("skipping hidden directory {path}");
                return None;
            }
            self.list(depth, &format!("{name}/ (directory)"));
            return self.enter_directory(entry, path, depth + 1);
        }

        self.list(
            depth,
            &format!(
                "{name} ({} bytes) (starting cluster {}) {}",
                entry.file_size,
                entry.start_cluster,
                entry.attribute_flags()
            ),
        );
        self.check_file(entry, &path);
        None
    }

    /// Mark a subdirectory's chain and build its frame.
    ///
    /// Clusters owned by something else, seen earlier in the same chain, or
    /// linked to a free or bad cluster end the chain there; the directory is
    /// still walked over what was collected before that point. Directory
    /// chains are reported, never rewritten.
    fn enter_directory(&mut self, entry: &DirEntry, path: String, depth: usize) -> Option<DirFrame> {
        if depth > self.max_depth {
            self.record(Anomaly::DepthLimit { path, depth });
            return None;
        }

        let start = entry.start_cluster;
        if !self.volume.is_valid_cluster(start) {
            self.record(Anomaly::BrokenDirectory {
                path,
                start_cluster: start,
                last_cluster: None,
            });
            return None;
        }

        let mut clusters = Vec::new();
        let mut seen = HashSet::new();
        let mut cluster = start;
        loop {
            if !self.bitmap.mark(cluster) {
                let anomaly = if seen.contains(&cluster) {
                    Anomaly::DirectoryLoop {
                        path: path.clone(),
                        cluster,
                    }
                } else {
                    Anomaly::CrossLinked {
                        path: path.clone(),
                        cluster,
                    }
                };
                self.record(anomaly);
                break;
            }
            seen.insert(cluster);
            clusters.push(cluster);

            match self.volume.entry(cluster) {
                FatEntry::EndOfChain => break,
                FatEntry::Next(next)
                    if !matches!(self.volume.entry(next), FatEntry::Free | FatEntry::Bad) =>
                {
                    cluster = next
                }
                other => {
                    debug!("{path}: directory chain stops at cluster {cluster} ({other:?})");
                    self.record(Anomaly::BrokenDirectory {
                        path: path.clone(),
                        start_cluster: start,
                        last_cluster: Some(cluster),
                    });
                    break;
                }
            }
        }

        if clusters.is_empty() {
            return None;
        }
        self.report.directories_visited += 1;
        Some(DirFrame::new(path, depth, self.volume.cluster_slots(&clusters)))
    }
}
