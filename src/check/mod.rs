//! Consistency check and repair of a FAT12 volume.
//!
//! A run is a directory walk followed by an orphan scan over one image
//! buffer:
//!
//! 1. [`walker`] visits the root directory and every non-hidden
//!    subdirectory, marking each cluster it reaches in a [`ClusterBitmap`].
//! 2. [`reconcile`] follows each file's chain during the walk, truncating
//!    chains at bad clusters and making the declared size agree with the
//!    allocated cluster count.
//! 3. [`orphan`] runs once the bitmap is complete and gives every allocated
//!    but unreached cluster a `FOUND<N>.DAT` entry in the root directory.
//!
//! Every repair is written into the buffer as soon as it is decided and
//! reported as one [`Anomaly`].

mod orphan;
mod reconcile;
mod walker;

use std::fmt;

use crate::error::ScandiskError;
use crate::fs::fat::CLUSTER_EOC;
use crate::fs::{ClusterBitmap, FatEntry, Volume};

/// Knobs for a check run.
#[derive(Debug, Clone, Default)]
pub struct CheckOptions {
    /// Print every directory and file visited, indented by depth.
    pub list_entries: bool,
}

/// One problem found on the volume.
#[derive(Debug, Clone, PartialEq)]
pub enum Anomaly {
    /// More clusters allocated than the declared size needs; chain truncated.
    MissingBlock {
        path: String,
        start_cluster: u16,
        declared_size: u32,
        clusters: usize,
        kept: usize,
    },
    /// Declared size larger than the allocation; size shrunk to match.
    ExcessiveBlocks {
        path: String,
        start_cluster: u16,
        declared_size: u32,
        corrected_size: u32,
    },
    /// Chain ran into a bad cluster, which was freed. `kept_until` is the new
    /// last cluster, or `None` when the file started on the bad cluster.
    BadCluster {
        path: String,
        cluster: u16,
        kept_until: Option<u16>,
    },
    /// Chain looped back on itself; cut at `cluster`.
    ChainLoop { path: String, cluster: u16 },
    /// Chain ended on a free or reserved link; terminated at `last_cluster`,
    /// or the start cluster was cleared when `None`.
    BrokenChain {
        path: String,
        start_cluster: u16,
        last_cluster: Option<u16>,
    },
    /// Chain enters a cluster already owned by another file or directory.
    CrossLinked { path: String, cluster: u16 },
    /// Directory chain re-enters one of its own clusters.
    DirectoryLoop { path: String, cluster: u16 },
    /// Directory chain is unusable from its start cluster (`None`) or stops
    /// after `last_cluster` on a free, bad or reserved link. Not repaired.
    BrokenDirectory {
        path: String,
        start_cluster: u16,
        last_cluster: Option<u16>,
    },
    /// Directory nested deeper than the volume could legally hold.
    DepthLimit { path: String, depth: usize },
    /// Allocated cluster not reachable from the root; given a root entry.
    Orphan { cluster: u16, recovered_as: String },
}

impl Anomaly {
    /// Whether the image was changed to resolve this anomaly.
    pub fn is_repair(&self) -> bool {
        !matches!(
            self,
            Anomaly::CrossLinked { .. }
                | Anomaly::DirectoryLoop { .. }
                | Anomaly::BrokenDirectory { .. }
                | Anomaly::DepthLimit { .. }
        )
    }
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Anomaly::MissingBlock {
                path,
                start_cluster,
                declared_size,
                clusters,
                kept,
            } => write!(
                f,
                "missing block: {path} (starting cluster {start_cluster}): \
                 {declared_size} bytes in {clusters} clusters, chain truncated to {kept}"
            ),
            Anomaly::ExcessiveBlocks {
                path,
                start_cluster,
                declared_size,
                corrected_size,
            } => write!(
                f,
                "excessive blocks: {path} (starting cluster {start_cluster}): \
                 declared {declared_size} bytes, size set to {corrected_size}"
            ),
            Anomaly::BadCluster {
                path,
                cluster,
                kept_until: Some(last),
            } => write!(
                f,
                "bad cluster: {path} references bad cluster {cluster}, chain truncated at cluster {last}"
            ),
            Anomaly::BadCluster {
                path,
                cluster,
                kept_until: None,
            } => write!(
                f,
                "bad cluster: {path} starts at bad cluster {cluster}, start cluster cleared"
            ),
            Anomaly::ChainLoop { path, cluster } => {
                write!(f, "chain loop: {path} loops back after cluster {cluster}, chain cut")
            }
            Anomaly::BrokenChain {
                path,
                start_cluster,
                last_cluster: Some(last),
            } => write!(
                f,
                "broken chain: {path} (starting cluster {start_cluster}) terminated at cluster {last}"
            ),
            Anomaly::BrokenChain {
                path,
                start_cluster,
                last_cluster: None,
            } => write!(
                f,
                "broken chain: {path} has unusable starting cluster {start_cluster}, start cluster cleared"
            ),
            Anomaly::CrossLinked { path, cluster } => {
                write!(f, "cross-linked: {path} shares cluster {cluster}, left unchanged")
            }
            Anomaly::DirectoryLoop { path, cluster } => {
                write!(f, "directory loop: {path} re-enters cluster {cluster}, not followed")
            }
            Anomaly::BrokenDirectory {
                path,
                start_cluster,
                last_cluster: None,
            } => write!(
                f,
                "broken directory: {path} has unusable starting cluster {start_cluster}, not followed"
            ),
            Anomaly::BrokenDirectory {
                path,
                start_cluster,
                last_cluster: Some(last),
            } => write!(
                f,
                "broken directory: {path} (starting cluster {start_cluster}) chain stops after cluster {last}, left unchanged"
            ),
            Anomaly::DepthLimit { path, depth } => {
                write!(f, "depth limit: {path} is nested {depth} levels deep, not followed")
            }
            Anomaly::Orphan {
                cluster,
                recovered_as,
            } => write!(f, "orphan cluster: {cluster} recovered as {recovered_as}"),
        }
    }
}

/// Outcome of a check run.
#[derive(Debug, Clone, Default)]
pub struct CheckReport {
    pub volume_label: Option<String>,
    /// In the order they were found.
    pub anomalies: Vec<Anomaly>,
    pub directories_visited: usize,
    pub files_checked: usize,
    /// Clusters marked reachable by the walk (before orphan recovery).
    pub clusters_referenced: u32,
    pub orphans_recovered: usize,
}

impl CheckReport {
    /// No anomalies at all.
    pub fn is_clean(&self) -> bool {
        self.anomalies.is_empty()
    }

    /// Whether any repair was written into the image.
    pub fn modified_image(&self) -> bool {
        self.anomalies.iter().any(Anomaly::is_repair)
    }

    pub fn repairs(&self) -> usize {
        self.anomalies.iter().filter(|a| a.is_repair()).count()
    }
}

/// Run context: the volume, the reachability bitmap and the diagnostics sink.
struct Checker<'a, F> {
    volume: Volume<'a>,
    bitmap: ClusterBitmap,
    options: &'a CheckOptions,
    report: CheckReport,
    log_cb: &'a mut F,
    /// Deepest directory nesting followed. Every directory owns at least one
    /// cluster, so only a cyclic tree can go past the cluster count.
    max_depth: usize,
}

impl<'a, F: FnMut(&str)> Checker<'a, F> {
    fn new(volume: Volume<'a>, options: &'a CheckOptions, log_cb: &'a mut F) -> Self {
        let max_depth = volume.geometry().cluster_count() as usize;
        Self {
            volume,
            bitmap: ClusterBitmap::for_fat12(),
            options,
            report: CheckReport::default(),
            log_cb,
            max_depth,
        }
    }

    /// Emit and keep an anomaly.
    fn record(&mut self, anomaly: Anomaly) {
        (self.log_cb)(&anomaly.to_string());
        self.report.anomalies.push(anomaly);
    }

    /// Listing line, indented four spaces per level.
    fn list(&mut self, depth: usize, line: &str) {
        if self.options.list_entries {
            (self.log_cb)(&format!("{:indent$}{line}", "", indent = depth * 4));
        }
    }

    fn bytes_per_cluster(&self) -> u32 {
        self.volume.geometry().bytes_per_cluster()
    }

    /// Make `cluster` the last cluster of its chain.
    fn terminate_chain_at(&mut self, cluster: u16) {
        if self.volume.entry(cluster) != FatEntry::EndOfChain {
            self.volume.set_fat_entry(cluster, CLUSTER_EOC);
        }
    }
}

/// Check and repair the FAT12 volume in `data`.
///
/// Diagnostics are passed to `log_cb` one line at a time as they are found.
/// Repairs are applied to `data` in place; on error `data` holds whatever
/// was written before the failure.
pub fn check_volume<F: FnMut(&str)>(
    data: &mut [u8],
    options: &CheckOptions,
    log_cb: &mut F,
) -> Result<CheckReport, ScandiskError> {
    let volume = Volume::open(data)?;
    let mut checker = Checker::new(volume, options, log_cb);

    checker.walk_tree();
    checker.report.clusters_referenced = checker.bitmap.count_marked();
    checker.recover_orphans()?;

    Ok(checker.report)
}
