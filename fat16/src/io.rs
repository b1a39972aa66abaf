// Byte-range I/O
// Translates (cluster, offset, length) requests into sector-level reads
// and read-modify-write cycles, then chains across clusters via the FAT.

use ironfat_core::{FsError, FsResult, SectorIo};

use crate::volume::{Cluster, Fat16Volume};

impl<D: SectorIo> Fat16Volume<D> {
    /// Read `buf.len()` bytes from one cluster starting at `offset`.
    ///
    /// Requires `offset + buf.len() <= cluster_size`.
    pub(crate) fn read_in_cluster(
        &mut self,
        cluster: Cluster,
        offset: u32,
        buf: &mut [u8],
    ) -> FsResult<()> {
        debug_assert!(offset as usize + buf.len() <= self.layout.cluster_size as usize);
        let sector_size = self.layout.sector_size;

        let mut sector = self.layout.cluster_to_sector(cluster) + (offset / sector_size) as u64;
        let mut in_sector = (offset % sector_size) as usize;
        let mut pos = 0usize;

        while pos < buf.len() {
            let data = self.read_sector_buf(sector)?;
            let n = (buf.len() - pos).min(sector_size as usize - in_sector);
            buf[pos..pos + n].copy_from_slice(&data[in_sector..in_sector + n]);
            pos += n;
            in_sector = 0;
            sector += 1;
        }
        Ok(())
    }

    /// Write `data` into one cluster starting at `offset`.
    ///
    /// Each touched sector is read, patched, and written back, so bytes
    /// outside the written span are preserved.
    pub(crate) fn write_in_cluster(
        &mut self,
        cluster: Cluster,
        offset: u32,
        data: &[u8],
    ) -> FsResult<()> {
        debug_assert!(offset as usize + data.len() <= self.layout.cluster_size as usize);
        let sector_size = self.layout.sector_size;

        let mut sector = self.layout.cluster_to_sector(cluster) + (offset / sector_size) as u64;
        let mut in_sector = (offset % sector_size) as usize;
        let mut pos = 0usize;

        while pos < data.len() {
            let mut buf = self.read_sector_buf(sector)?;
            let n = (data.len() - pos).min(sector_size as usize - in_sector);
            buf[in_sector..in_sector + n].copy_from_slice(&data[pos..pos + n]);
            self.device.write_sector(sector, &buf)?;
            pos += n;
            in_sector = 0;
            sector += 1;
        }
        Ok(())
    }

    /// Advance from `first` past `offset` whole clusters' worth of bytes,
    /// returning the cluster holding `offset` and the remaining in-cluster
    /// offset.
    fn seek_chain(&mut self, first: Cluster, mut offset: u64) -> FsResult<(Cluster, u32)> {
        let cluster_size = self.layout.cluster_size as u64;
        let mut cluster = first;
        while offset >= cluster_size {
            if !self.cluster_in_use(cluster) {
                return Err(short_chain(first));
            }
            offset -= cluster_size;
            cluster = self.fat_entry(cluster)?;
        }
        Ok((cluster, offset as u32))
    }

    /// Read `buf.len()` bytes from the chain starting at `first`, beginning
    /// `offset` bytes into it.
    ///
    /// Running off the end of the chain before `buf` is filled means the
    /// directory entry claims more bytes than the chain provides: fatal
    /// consistency failure.
    pub(crate) fn read_chain_at(
        &mut self,
        first: Cluster,
        offset: u64,
        buf: &mut [u8],
    ) -> FsResult<()> {
        let cluster_size = self.layout.cluster_size;
        let (mut cluster, mut in_cluster) = self.seek_chain(first, offset)?;

        let mut pos = 0usize;
        while pos < buf.len() {
            if !self.cluster_in_use(cluster) {
                return Err(short_chain(first));
            }
            let n = (buf.len() - pos).min((cluster_size - in_cluster) as usize);
            self.read_in_cluster(cluster, in_cluster, &mut buf[pos..pos + n])?;
            pos += n;
            in_cluster = 0;
            cluster = self.fat_entry(cluster)?;
        }
        Ok(())
    }

    /// Write `data` into the chain starting at `first`, beginning `offset`
    /// bytes into it. The chain must already be long enough.
    pub(crate) fn write_chain_at(
        &mut self,
        first: Cluster,
        offset: u64,
        data: &[u8],
    ) -> FsResult<()> {
        let cluster_size = self.layout.cluster_size;
        let (mut cluster, mut in_cluster) = self.seek_chain(first, offset)?;

        let mut pos = 0usize;
        while pos < data.len() {
            if !self.cluster_in_use(cluster) {
                return Err(short_chain(first));
            }
            let n = (data.len() - pos).min((cluster_size - in_cluster) as usize);
            self.write_in_cluster(cluster, in_cluster, &data[pos..pos + n])?;
            pos += n;
            in_cluster = 0;
            cluster = self.fat_entry(cluster)?;
        }
        Ok(())
    }
}

fn short_chain(first: Cluster) -> FsError {
    FsError::Corrupt(format!(
        "cluster chain from {} ends short of the entry's file size",
        first
    ))
}
