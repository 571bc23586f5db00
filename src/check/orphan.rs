//! Recovery of allocated clusters no directory entry reaches.

use super::{Anomaly, Checker};
use crate::error::ScandiskError;
use crate::fs::fat::CLUSTER_FIRST;
use crate::fs::{find_slot_and_write, DirLocation};

impl<F: FnMut(&str)> Checker<'_, F> {
    /// Give each orphan cluster a one-cluster root entry `FOUND<N>.DAT`.
    ///
    /// Must run after the walk has marked every reachable cluster. Each
    /// orphan is terminated in place, so a lost chain comes back as one
    /// file per cluster.
    pub(super) fn recover_orphans(&mut self) -> Result<(), ScandiskError> {
        let size = self.bytes_per_cluster();
        let max_cluster = self.volume.geometry().max_cluster();

        for cluster in CLUSTER_FIRST..max_cluster {
            if !self.volume.is_taken(cluster) || self.bitmap.is_marked(cluster) {
                continue;
            }

            self.terminate_chain_at(cluster);
            let n = self.report.orphans_recovered + 1;
            let slot = find_slot_and_write(
                &mut self.volume,
                DirLocation::Root,
                &format!("found{n}.dat"),
                cluster,
                size,
            )?;
            self.report.orphans_recovered = n;
            let recovered_as = self.volume.dirent(slot).short_name();
            self.record(Anomaly::Orphan {
                cluster,
                recovered_as,
            });
        }

        Ok(())
    }
}
