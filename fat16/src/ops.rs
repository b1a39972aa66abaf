// Public file and directory operations
// Every operation resolves a path first, then performs cluster
// allocation/deallocation and byte-range I/O as needed, and finally
// rewrites the affected directory entry.

use std::time::SystemTime;

use ironfat_core::{FsError, FsResult, SectorIo};
use log::{debug, info};

use crate::dirent::{attrs, DirEntry, DIR_ENTRY_SIZE, DOTDOT_NAME, DOT_NAME, NAME_DELETED};
use crate::fat::CLUSTER_EOC;
use crate::name::to_short_name;
use crate::resolve::DirLocation;
use crate::times;
use crate::volume::{Cluster, Fat16Volume};

/// External attribute record returned by [`Fat16Volume::stat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileAttributes {
    pub is_directory: bool,
    pub read_only: bool,
    pub size: u64,
    /// 512-byte blocks covered by the file size.
    pub blocks: u64,
    pub created: SystemTime,
    pub modified: SystemTime,
    pub accessed: SystemTime,
}

impl FileAttributes {
    fn from_entry(entry: &DirEntry) -> Self {
        Self {
            is_directory: entry.is_directory(),
            read_only: entry.is_read_only(),
            size: entry.size as u64,
            blocks: (entry.size as u64 + 511) / 512,
            created: times::fat_to_system_time(
                entry.created_date,
                entry.created_time,
                entry.created_tenth,
            ),
            modified: times::fat_to_system_time(entry.write_date, entry.write_time, 0),
            accessed: times::fat_to_system_time(entry.accessed_date, 0, 0),
        }
    }
}

fn is_root(path: &str) -> bool {
    path.chars().all(|c| c == '/')
}

fn clusters_for(bytes: u64, cluster_size: u64) -> u64 {
    (bytes + cluster_size - 1) / cluster_size
}

impl<D: SectorIo> Fat16Volume<D> {
    /// Attributes of the file or directory at `path`.
    ///
    /// The root path is a synthesized directory with no backing entry.
    pub fn stat(&mut self, path: &str) -> FsResult<FileAttributes> {
        debug!("stat(path='{}')", path);
        if is_root(path) {
            return Ok(FileAttributes {
                is_directory: true,
                read_only: false,
                size: 0,
                blocks: 0,
                created: self.mounted_at,
                modified: self.root_modified,
                accessed: self.root_accessed,
            });
        }
        let slot = self.find_entry(path)?;
        Ok(FileAttributes::from_entry(&slot.entry))
    }

    /// Child names of the directory at `path`, in on-disk order.
    pub fn read_dir(&mut self, path: &str) -> FsResult<Vec<String>> {
        debug!("read_dir(path='{}')", path);
        if is_root(path) {
            return self.list_names(DirLocation::Root);
        }
        let slot = self.find_entry(path)?;
        if !slot.entry.is_directory() {
            return Err(FsError::NotADirectory(path.to_string()));
        }
        self.list_names(DirLocation::Cluster(slot.entry.first_cluster))
    }

    /// Read up to `length` bytes starting at `offset`.
    ///
    /// The length is clamped to the file size; an offset beyond the size
    /// is an error.
    pub fn read(&mut self, path: &str, offset: u64, length: usize) -> FsResult<Vec<u8>> {
        debug!("read(path='{}', offset={}, length={})", path, offset, length);
        if is_root(path) {
            return Err(FsError::IsADirectory(path.to_string()));
        }
        let slot = self.find_entry(path)?;
        if slot.entry.is_directory() {
            return Err(FsError::IsADirectory(path.to_string()));
        }

        let size = slot.entry.size as u64;
        if offset > size {
            return Err(FsError::InvalidOffset { offset, size });
        }
        let length = length.min((size - offset) as usize);
        if length == 0 {
            return Ok(Vec::new());
        }

        let mut buf = vec![0u8; length];
        self.read_chain_at(slot.entry.first_cluster, offset, &mut buf)?;
        Ok(buf)
    }

    /// Write `data` at `offset`, growing the cluster chain as needed.
    ///
    /// The offset may not exceed the current file size (no holes). Returns
    /// the number of bytes written.
    pub fn write(&mut self, path: &str, offset: u64, data: &[u8]) -> FsResult<usize> {
        info!("write(path='{}', offset={}, length={})", path, offset, data.len());
        if is_root(path) {
            return Err(FsError::IsADirectory(path.to_string()));
        }
        let mut slot = self.find_entry(path)?;
        if slot.entry.is_directory() {
            return Err(FsError::IsADirectory(path.to_string()));
        }

        let size = slot.entry.size as u64;
        if offset > size {
            return Err(FsError::InvalidOffset { offset, size });
        }
        if data.is_empty() {
            return Ok(0);
        }
        let end = offset + data.len() as u64;
        if end > u32::MAX as u64 {
            return Err(FsError::InvalidOffset { offset: end, size });
        }

        let cluster_size = self.layout.cluster_size as u64;
        let old_clusters = clusters_for(size, cluster_size);
        let needed = clusters_for(end, cluster_size);
        if needed > old_clusters {
            let head = self.allocate_chain((needed - old_clusters) as usize)?;
            if old_clusters == 0 {
                slot.entry.first_cluster = head;
            } else {
                let last = self.last_cluster(slot.entry.first_cluster, old_clusters)?;
                self.set_fat_entry(last, head)?;
            }
        }

        self.write_chain_at(slot.entry.first_cluster, offset, data)?;

        slot.entry.size = slot.entry.size.max(end as u32);
        self.write_slot(&slot)?;
        Ok(data.len())
    }

    /// Create an empty regular file.
    pub fn create_file(&mut self, path: &str) -> FsResult<()> {
        info!("create_file(path='{}')", path);
        if is_root(path) {
            return Err(FsError::AlreadyExists(path.to_string()));
        }
        let (mut slot, name) = self.find_empty_slot(path)?;
        let short = to_short_name(&name)?;

        slot.entry = DirEntry::new(short, attrs::ARCHIVE, 0, 0);
        self.write_slot(&slot)
    }

    /// Create a directory, populated with its self/parent references.
    pub fn create_dir(&mut self, path: &str) -> FsResult<()> {
        info!("create_dir(path='{}')", path);
        if is_root(path) {
            return Err(FsError::AlreadyExists(path.to_string()));
        }
        let (mut slot, name) = self.find_empty_slot(path)?;
        let short = to_short_name(&name)?;

        // The parent's first cluster; 0 when the slot lives in the root
        // region, which is exactly what the ".." entry must carry there.
        let parent_cluster = self.layout.sector_to_cluster(slot.sector);

        let dir_cluster = self.allocate_cluster()?;
        let first_sector = self.layout.cluster_to_sector(dir_cluster);
        self.write_slot(&crate::dirent::EntrySlot {
            entry: DirEntry::new(DOT_NAME, attrs::DIRECTORY, dir_cluster, 0),
            sector: first_sector,
            offset: 0,
        })?;
        self.write_slot(&crate::dirent::EntrySlot {
            entry: DirEntry::new(DOTDOT_NAME, attrs::DIRECTORY, parent_cluster, 0),
            sector: first_sector,
            offset: DIR_ENTRY_SIZE,
        })?;

        slot.entry = DirEntry::new(short, attrs::DIRECTORY, dir_cluster, 0);
        self.write_slot(&slot)
    }

    /// Delete a regular file: free its chain and tombstone its entry.
    pub fn remove_file(&mut self, path: &str) -> FsResult<()> {
        info!("remove_file(path='{}')", path);
        if is_root(path) {
            return Err(FsError::IsADirectory(path.to_string()));
        }
        let mut slot = self.find_entry(path)?;
        if slot.entry.is_directory() {
            return Err(FsError::IsADirectory(path.to_string()));
        }

        self.free_chain(slot.entry.first_cluster)?;
        slot.entry.name[0] = NAME_DELETED;
        self.write_slot(&slot)
    }

    /// Delete an empty directory. The root cannot be deleted.
    pub fn remove_dir(&mut self, path: &str) -> FsResult<()> {
        info!("remove_dir(path='{}')", path);
        if is_root(path) {
            return Err(FsError::NotEmpty("the root directory cannot be removed".to_string()));
        }
        let mut slot = self.find_entry(path)?;
        if !slot.entry.is_directory() {
            return Err(FsError::NotADirectory(path.to_string()));
        }

        let children = self.list_names(DirLocation::Cluster(slot.entry.first_cluster))?;
        if !children.is_empty() {
            return Err(FsError::NotEmpty(path.to_string()));
        }

        self.free_chain(slot.entry.first_cluster)?;
        slot.entry.name[0] = NAME_DELETED;
        self.write_slot(&slot)
    }

    /// Grow or shrink a file to `new_size`.
    ///
    /// Growth appends freshly zeroed clusters; shrinking frees the tail of
    /// the chain and re-terminates it at the last retained cluster.
    pub fn truncate(&mut self, path: &str, new_size: u64) -> FsResult<()> {
        info!("truncate(path='{}', new_size={})", path, new_size);
        if is_root(path) {
            return Err(FsError::IsADirectory(path.to_string()));
        }
        let mut slot = self.find_entry(path)?;
        if slot.entry.is_directory() {
            return Err(FsError::IsADirectory(path.to_string()));
        }

        let old_size = slot.entry.size as u64;
        if new_size > u32::MAX as u64 {
            return Err(FsError::InvalidOffset {
                offset: new_size,
                size: old_size,
            });
        }
        if new_size == old_size {
            return Ok(());
        }

        let cluster_size = self.layout.cluster_size as u64;
        let needed = clusters_for(new_size, cluster_size);

        if new_size > old_size {
            // Walk the actual chain rather than trusting the size field.
            let chain = self.cluster_chain(slot.entry.first_cluster)?;
            if needed > chain.len() as u64 {
                let head = self.allocate_chain((needed - chain.len() as u64) as usize)?;
                match chain.last() {
                    Some(&last) => self.set_fat_entry(last, head)?,
                    None => slot.entry.first_cluster = head,
                }
            }
        } else if needed == 0 {
            self.free_chain(slot.entry.first_cluster)?;
            slot.entry.first_cluster = 0;
        } else {
            let last = self.last_cluster(slot.entry.first_cluster, needed)?;
            let tail = self.fat_entry(last)?;
            self.set_fat_entry(last, CLUSTER_EOC)?;
            if self.cluster_in_use(tail) {
                self.free_chain(tail)?;
            }
        }

        slot.entry.size = new_size as u32;
        self.write_slot(&slot)
    }

    /// Update the access and write timestamps of `path`.
    pub fn set_times(
        &mut self,
        path: &str,
        accessed: SystemTime,
        modified: SystemTime,
    ) -> FsResult<()> {
        debug!("set_times(path='{}')", path);
        if is_root(path) {
            self.root_accessed = accessed;
            self.root_modified = modified;
            return Ok(());
        }
        let mut slot = self.find_entry(path)?;

        let (write_date, write_time, _) = times::system_time_to_fat(modified);
        let (accessed_date, _, _) = times::system_time_to_fat(accessed);
        slot.entry.write_date = write_date;
        slot.entry.write_time = write_time;
        slot.entry.accessed_date = accessed_date;
        self.write_slot(&slot)
    }

    /// The `count`-th cluster of a chain (1-based), i.e. its last cluster
    /// when `count` is the chain's expected length.
    fn last_cluster(&mut self, first: Cluster, count: u64) -> FsResult<Cluster> {
        let mut cluster = first;
        for _ in 0..count.saturating_sub(1) {
            if !self.cluster_in_use(cluster) {
                return Err(chain_too_short(first));
            }
            cluster = self.fat_entry(cluster)?;
        }
        if !self.cluster_in_use(cluster) {
            return Err(chain_too_short(first));
        }
        Ok(cluster)
    }
}

fn chain_too_short(first: Cluster) -> FsError {
    FsError::Corrupt(format!(
        "cluster chain from {} is shorter than the entry's file size",
        first
    ))
}
