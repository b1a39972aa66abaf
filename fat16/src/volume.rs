// Volume metadata and cluster addressing
// One context handle per mounted volume; geometry is parsed once at mount
// and read-only afterwards.

use std::time::SystemTime;

use ironfat_core::{FsError, FsResult, SectorIo};
use log::info;

use crate::boot::BootParams;
use crate::dirent::DIR_ENTRY_SIZE;
use crate::fat::{FIRST_DATA_CLUSTER, MAX_CLUSTERS};

/// Cluster index into the data region. Values 0 and 1 are reserved; the
/// free marker and end-of-chain sentinels live in the same value space but
/// are never addressable clusters.
pub type Cluster = u16;

/// Derived region boundaries, computed once from the boot parameters.
#[derive(Debug, Clone, Copy)]
pub struct VolumeLayout {
    pub sector_size: u32,
    pub sectors_per_cluster: u32,
    pub num_fats: u32,
    pub sectors_per_fat: u32,
    pub total_sectors: u32,
    pub root_entries: u32,

    /// First sector of the first FAT copy.
    pub fat_start: u64,
    /// First sector of the fixed root directory region.
    pub root_start: u64,
    /// Length of the root region in sectors.
    pub root_sectors: u32,
    /// First sector of the data region (cluster 2).
    pub data_start: u64,

    pub cluster_size: u32,
    pub total_clusters: u32,
}

impl VolumeLayout {
    pub fn from_params(params: &BootParams) -> FsResult<Self> {
        let sector_size = params.bytes_per_sector as u32;
        let sectors_per_cluster = params.sectors_per_cluster as u32;
        let num_fats = params.num_fats as u32;
        let sectors_per_fat = params.sectors_per_fat as u32;
        let root_entries = params.root_entries as u32;

        let fat_start = params.reserved_sectors as u64;
        let root_start = fat_start + (num_fats * sectors_per_fat) as u64;
        let root_sectors =
            (root_entries * DIR_ENTRY_SIZE as u32 + sector_size - 1) / sector_size;
        let data_start = root_start + root_sectors as u64;

        if data_start >= params.total_sectors as u64 {
            return Err(FsError::InvalidVolume(format!(
                "metadata regions ({} sectors) exceed volume ({} sectors)",
                data_start, params.total_sectors
            )));
        }
        let data_sectors = params.total_sectors - data_start as u32;
        let total_clusters = data_sectors / sectors_per_cluster;

        // Cluster numbers are u16 throughout; past this count the
        // allocator's cluster arithmetic would wrap and alias low
        // clusters. Such a volume is FAT32 territory.
        if total_clusters > MAX_CLUSTERS {
            return Err(FsError::InvalidVolume(format!(
                "{} clusters exceed the FAT16 maximum of {}",
                total_clusters, MAX_CLUSTERS
            )));
        }

        // Every cluster must have a FAT entry in each copy.
        let fat_capacity = sectors_per_fat * sector_size / 2;
        if fat_capacity < total_clusters + 2 {
            return Err(FsError::InvalidVolume(format!(
                "FAT holds {} entries but volume has {} clusters",
                fat_capacity, total_clusters
            )));
        }

        Ok(Self {
            sector_size,
            sectors_per_cluster,
            num_fats,
            sectors_per_fat,
            total_sectors: params.total_sectors,
            root_entries,
            fat_start,
            root_start,
            root_sectors,
            data_start,
            cluster_size: sectors_per_cluster * sector_size,
            total_clusters,
        })
    }

    /// First sector of an in-use-range cluster within the data region.
    pub fn cluster_to_sector(&self, cluster: Cluster) -> u64 {
        debug_assert!(self.cluster_in_range(cluster));
        (cluster as u64 - 2) * self.sectors_per_cluster as u64 + self.data_start
    }

    /// Cluster containing `sector`, or 0 if the sector precedes the data
    /// region (root region and metadata have no cluster).
    pub fn sector_to_cluster(&self, sector: u64) -> Cluster {
        if sector < self.data_start {
            return 0;
        }
        (2 + (sector - self.data_start) / self.sectors_per_cluster as u64) as Cluster
    }

    /// Whether `cluster` addresses a data-region cluster.
    pub fn cluster_in_range(&self, cluster: Cluster) -> bool {
        cluster >= FIRST_DATA_CLUSTER && (cluster as u32) < self.total_clusters + 2
    }
}

/// A mounted FAT16 volume: the device plus its parsed geometry.
///
/// All engine operations are methods on this handle; nothing is process
/// global, so multiple volumes can be mounted side by side.
pub struct Fat16Volume<D: SectorIo> {
    pub(crate) device: D,
    pub(crate) layout: VolumeLayout,
    /// Rotating scan cursor for the cluster allocator.
    pub(crate) next_free: Cluster,
    /// Synthesized root directory timestamps (the root has no entry).
    pub(crate) root_accessed: SystemTime,
    pub(crate) root_modified: SystemTime,
    pub(crate) mounted_at: SystemTime,
}

impl<D: SectorIo> Fat16Volume<D> {
    /// Read the boot sector and mount the volume.
    pub fn mount(mut device: D) -> FsResult<Self> {
        let mut sector = vec![0u8; device.sector_size()];
        device.read_sector(0, &mut sector)?;
        let params = BootParams::decode(&sector)?;

        if params.bytes_per_sector as usize != device.sector_size() {
            return Err(FsError::InvalidVolume(format!(
                "boot sector claims {}-byte sectors, device uses {}",
                params.bytes_per_sector,
                device.sector_size()
            )));
        }

        let layout = VolumeLayout::from_params(&params)?;
        info!(
            "mounted FAT16 volume: {} B/sector, {} sectors/cluster, {} clusters, data at sector {}",
            layout.sector_size, layout.sectors_per_cluster, layout.total_clusters, layout.data_start
        );

        let now = SystemTime::now();
        Ok(Self {
            device,
            layout,
            next_free: FIRST_DATA_CLUSTER,
            root_accessed: now,
            root_modified: now,
            mounted_at: now,
        })
    }

    pub fn layout(&self) -> &VolumeLayout {
        &self.layout
    }

    /// Unmount, returning the backing device.
    pub fn into_device(self) -> D {
        self.device
    }

    pub(crate) fn read_sector_buf(&mut self, sector: u64) -> FsResult<Vec<u8>> {
        let mut buf = vec![0u8; self.layout.sector_size as usize];
        self.device.read_sector(sector, &mut buf)?;
        Ok(buf)
    }
}
