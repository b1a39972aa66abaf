// FAT table access and cluster allocation
// One logical table replicated across every on-disk copy; all copies are
// written in lockstep on every mutation.

use byteorder::{ByteOrder, LittleEndian};
use ironfat_core::{FsError, FsResult, SectorIo};
use log::{debug, trace};

use crate::volume::{Cluster, Fat16Volume};

/// Bytes per FAT16 table entry.
pub const FAT_ENTRY_SIZE: u64 = 2;

/// Marker for an unallocated cluster.
pub const CLUSTER_FREE: Cluster = 0x0000;
/// Value written to terminate a chain.
pub const CLUSTER_EOC: Cluster = 0xFFFF;
/// Lowest addressable data cluster.
pub const FIRST_DATA_CLUSTER: Cluster = 2;
/// Largest cluster count a 16-bit FAT can address: the highest data
/// cluster index is then 0xFFF5, below the bad-cluster and end-of-chain
/// value ranges.
pub const MAX_CLUSTERS: u32 = 65_524;

/// Whether a FAT entry value terminates a chain (0xFFF8..=0xFFFF).
pub fn is_end_of_chain(value: Cluster) -> bool {
    value >= 0xFFF8
}

impl<D: SectorIo> Fat16Volume<D> {
    /// Whether `cluster` denotes an allocatable data-region cluster, as
    /// opposed to a reserved index or a sentinel value.
    pub fn cluster_in_use(&self, cluster: Cluster) -> bool {
        self.layout.cluster_in_range(cluster)
    }

    /// Read one entry from the first FAT copy.
    pub fn fat_entry(&mut self, cluster: Cluster) -> FsResult<Cluster> {
        let sector_size = self.layout.sector_size as u64;
        let offset = cluster as u64 * FAT_ENTRY_SIZE;
        let sector = self.layout.fat_start + offset / sector_size;
        let in_sector = (offset % sector_size) as usize;

        let buf = self.read_sector_buf(sector)?;
        Ok(LittleEndian::read_u16(&buf[in_sector..in_sector + 2]))
    }

    /// Write one entry into every FAT copy.
    ///
    /// A failure after some copies were written leaves the copies
    /// inconsistent; callers must treat the error as fatal, not retryable.
    pub fn set_fat_entry(&mut self, cluster: Cluster, value: Cluster) -> FsResult<()> {
        trace!("FAT[{}] <- {:#06x}", cluster, value);
        let sector_size = self.layout.sector_size as u64;
        let offset = cluster as u64 * FAT_ENTRY_SIZE;
        let in_sector = (offset % sector_size) as usize;

        for copy in 0..self.layout.num_fats as u64 {
            let sector = self.layout.fat_start
                + copy * self.layout.sectors_per_fat as u64
                + offset / sector_size;
            let mut buf = self.read_sector_buf(sector)?;
            LittleEndian::write_u16(&mut buf[in_sector..in_sector + 2], value);
            self.device.write_sector(sector, &buf)?;
        }
        Ok(())
    }

    /// Scan for `n` free clusters without mutating anything.
    ///
    /// The scan resumes from a rotating cursor and wraps around the whole
    /// cluster range once, so it fails only when the volume is genuinely
    /// out of space.
    fn find_free_clusters(&mut self, n: usize) -> FsResult<Vec<Cluster>> {
        let total = self.layout.total_clusters as u64;
        let mut found = Vec::with_capacity(n);

        let start = self.next_free as u64 - FIRST_DATA_CLUSTER as u64;
        for i in 0..total {
            let cluster = (FIRST_DATA_CLUSTER as u64 + (start + i) % total) as Cluster;
            if self.fat_entry(cluster)? == CLUSTER_FREE {
                found.push(cluster);
                if found.len() == n {
                    break;
                }
            }
        }

        if found.len() < n {
            return Err(FsError::OutOfSpace(format!(
                "needed {} free clusters, found {}",
                n,
                found.len()
            )));
        }

        if let Some(&last) = found.last() {
            self.next_free = if (last as u32 + 1) < self.layout.total_clusters + 2 {
                last + 1
            } else {
                FIRST_DATA_CLUSTER
            };
        }
        Ok(found)
    }

    /// Allocate a single cluster: mark it end-of-chain and zero its sectors.
    pub fn allocate_cluster(&mut self) -> FsResult<Cluster> {
        let cluster = self.find_free_clusters(1)?[0];
        self.set_fat_entry(cluster, CLUSTER_EOC)?;
        self.clear_cluster(cluster)?;
        debug!("allocated cluster {}", cluster);
        Ok(cluster)
    }

    /// Allocate `n` clusters linked head-to-tail and return the head.
    ///
    /// Two-phase: the free clusters are collected first, then linked and
    /// zeroed, so a caller never observes a partially linked chain and an
    /// out-of-space failure mutates nothing. `n` must be non-zero.
    pub fn allocate_chain(&mut self, n: usize) -> FsResult<Cluster> {
        debug_assert!(n > 0);
        let clusters = self.find_free_clusters(n)?;

        for i in 0..n - 1 {
            self.set_fat_entry(clusters[i], clusters[i + 1])?;
        }
        self.set_fat_entry(clusters[n - 1], CLUSTER_EOC)?;
        for &cluster in &clusters {
            self.clear_cluster(cluster)?;
        }

        debug!("allocated chain of {} clusters from {}", n, clusters[0]);
        Ok(clusters[0])
    }

    /// Free every cluster of the chain starting at `head`.
    ///
    /// A head equal to the free or end-of-chain marker is treated as "no
    /// clusters to free".
    pub fn free_chain(&mut self, head: Cluster) -> FsResult<()> {
        let mut cluster = head;
        while self.cluster_in_use(cluster) {
            let next = self.fat_entry(cluster)?;
            self.set_fat_entry(cluster, CLUSTER_FREE)?;
            cluster = next;
        }
        Ok(())
    }

    /// Collect the chain starting at `head` in walk order.
    pub fn cluster_chain(&mut self, head: Cluster) -> FsResult<Vec<Cluster>> {
        let mut chain = Vec::new();
        let mut cluster = head;
        while self.cluster_in_use(cluster) {
            if chain.len() > self.layout.total_clusters as usize {
                return Err(FsError::Corrupt(format!(
                    "cluster chain from {} is circular",
                    head
                )));
            }
            chain.push(cluster);
            cluster = self.fat_entry(cluster)?;
        }
        Ok(chain)
    }

    /// Zero every sector of a cluster.
    pub(crate) fn clear_cluster(&mut self, cluster: Cluster) -> FsResult<()> {
        let zeros = vec![0u8; self.layout.sector_size as usize];
        let first = self.layout.cluster_to_sector(cluster);
        for i in 0..self.layout.sectors_per_cluster as u64 {
            self.device.write_sector(first + i, &zeros)?;
        }
        Ok(())
    }
}
