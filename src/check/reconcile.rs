//! File chain validation and size reconciliation.

use std::collections::HashSet;

use log::debug;

use super::{Anomaly, Checker};
use crate::fs::entry::{set_file_size, set_start_cluster};
use crate::fs::fat::CLUSTER_FREE;
use crate::fs::{DirEntry, FatEntry};

/// Why a file's chain walk stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChainEnd {
    /// Start cluster 0.
    Empty,
    EndOfChain,
    /// A bad cluster was cut out of the chain.
    BadCluster,
    /// A link back into the chain was cut.
    Loop,
    /// Link to a free cluster or a reserved value, or an unusable start.
    Broken,
    /// Entered a cluster owned by another chain.
    CrossLinked,
}

struct ChainWalk {
    clusters: Vec<u16>,
    end: ChainEnd,
}

impl<F: FnMut(&str)> Checker<'_, F> {
    /// Validate the chain of the file at `path` and repair its entry.
    pub(super) fn check_file(&mut self, entry: &DirEntry, path: &str) {
        self.report.files_checked += 1;

        let walk = self.follow_file_chain(entry, path);
        if walk.end == ChainEnd::CrossLinked {
            debug!("{path}: cross-linked, size left as declared");
            return;
        }
        self.reconcile(entry, path, &walk);
    }

    /// Walk and mark the chain, cutting it at bad clusters and loops.
    fn follow_file_chain(&mut self, entry: &DirEntry, path: &str) -> ChainWalk {
        let start = entry.start_cluster;
        if start == 0 {
            return ChainWalk {
                clusters: Vec::new(),
                end: ChainEnd::Empty,
            };
        }
        if !self.volume.is_valid_cluster(start) || self.volume.entry(start) == FatEntry::Free {
            return ChainWalk {
                clusters: Vec::new(),
                end: ChainEnd::Broken,
            };
        }
        if self.volume.entry(start) == FatEntry::Bad {
            self.volume.set_fat_entry(start, CLUSTER_FREE);
            set_start_cluster(self.volume.slot_mut(entry.offset), 0);
            self.record(Anomaly::BadCluster {
                path: path.to_string(),
                cluster: start,
                kept_until: None,
            });
            return ChainWalk {
                clusters: Vec::new(),
                end: ChainEnd::BadCluster,
            };
        }

        let mut clusters = Vec::new();
        let mut seen = HashSet::new();
        let mut cluster = start;
        let end = loop {
            // Loops are cut before a cluster is revisited, so an already
            // marked cluster here belongs to some other chain.
            if !self.bitmap.mark(cluster) {
                self.record(Anomaly::CrossLinked {
                    path: path.to_string(),
                    cluster,
                });
                break ChainEnd::CrossLinked;
            }
            seen.insert(cluster);
            clusters.push(cluster);

            match self.volume.entry(cluster) {
                FatEntry::EndOfChain => break ChainEnd::EndOfChain,
                FatEntry::Next(next) if seen.contains(&next) => {
                    self.terminate_chain_at(cluster);
                    self.record(Anomaly::ChainLoop {
                        path: path.to_string(),
                        cluster,
                    });
                    break ChainEnd::Loop;
                }
                FatEntry::Next(next) if self.volume.entry(next) == FatEntry::Bad => {
                    self.terminate_chain_at(cluster);
                    self.volume.set_fat_entry(next, CLUSTER_FREE);
                    self.record(Anomaly::BadCluster {
                        path: path.to_string(),
                        cluster: next,
                        kept_until: Some(cluster),
                    });
                    break ChainEnd::BadCluster;
                }
                FatEntry::Next(next) if self.volume.entry(next) == FatEntry::Free => {
                    break ChainEnd::Broken;
                }
                FatEntry::Next(next) => cluster = next,
                FatEntry::Free | FatEntry::Bad | FatEntry::Reserved(_) => break ChainEnd::Broken,
            }
        };

        ChainWalk { clusters, end }
    }

    /// Make the declared size and the allocated cluster count agree.
    fn reconcile(&mut self, entry: &DirEntry, path: &str, walk: &ChainWalk) {
        let bytes_per_cluster = u64::from(self.bytes_per_cluster());
        let declared = u64::from(entry.file_size);
        let allocated = walk.clusters.len() as u64 * bytes_per_cluster;

        if allocated >= declared + bytes_per_cluster {
            // too many clusters: keep what the size needs, free the tail
            let kept = declared.div_ceil(bytes_per_cluster) as usize;
            match kept.checked_sub(1) {
                Some(last) => self.terminate_chain_at(walk.clusters[last]),
                None => set_start_cluster(self.volume.slot_mut(entry.offset), 0),
            }
            for &cluster in &walk.clusters[kept..] {
                self.volume.set_fat_entry(cluster, CLUSTER_FREE);
            }
            self.record(Anomaly::MissingBlock {
                path: path.to_string(),
                start_cluster: entry.start_cluster,
                declared_size: entry.file_size,
                clusters: walk.clusters.len(),
                kept,
            });
        } else if allocated < declared {
            // too few clusters: believe the chain
            self.end_chain(entry, walk);
            let corrected = allocated as u32;
            set_file_size(self.volume.slot_mut(entry.offset), corrected);
            self.record(Anomaly::ExcessiveBlocks {
                path: path.to_string(),
                start_cluster: entry.start_cluster,
                declared_size: entry.file_size,
                corrected_size: corrected,
            });
        } else if walk.end == ChainEnd::Broken {
            self.end_chain(entry, walk);
            self.record(Anomaly::BrokenChain {
                path: path.to_string(),
                start_cluster: entry.start_cluster,
                last_cluster: walk.clusters.last().copied(),
            });
        }
    }

    /// Terminate the walked chain at its last cluster, or clear the entry's
    /// start cluster if nothing usable was walked.
    fn end_chain(&mut self, entry: &DirEntry, walk: &ChainWalk) {
        match walk.clusters.last() {
            Some(&last) => self.terminate_chain_at(last),
            None if entry.start_cluster != 0 => {
                set_start_cluster(self.volume.slot_mut(entry.offset), 0)
            }
            None => {}
        }
    }
}
