// Directory scanning and path resolution
// Walks `/`-separated components across the fixed root region and nested
// directory cluster chains.

use ironfat_core::{FsError, FsResult, SectorIo};
use log::trace;

use crate::dirent::{attrs, classify, DirEntry, EntryKind, EntrySlot, DIR_ENTRY_SIZE};
use crate::name::{to_long_name, to_short_name};
use crate::volume::{Cluster, Fat16Volume};

/// Where a directory's entries live.
#[derive(Debug, Clone, Copy)]
pub(crate) enum DirLocation {
    /// The fixed root region: a flat sector range with no cluster chain.
    Root,
    /// A non-root directory, stored in the chain starting at this cluster.
    Cluster(Cluster),
}

/// Outcome of scanning one directory for a name.
enum ScanHit {
    Found(EntrySlot),
    Empty(EntrySlot),
    Full,
}

/// Outcome of scanning one contiguous sector range.
enum RangeScan {
    Found(EntrySlot),
    /// A never-used slot was seen; the directory ends here.
    End,
    /// Range exhausted without a match; continue with the next range.
    Continue,
}

/// Result of resolving a full path.
pub(crate) enum Resolution {
    Found(EntrySlot),
    /// Name absent, but a slot is available for creating it.
    Empty { slot: EntrySlot, name: String },
    /// Name absent and every slot of the parent directory is taken.
    Full,
}

impl<D: SectorIo> Fat16Volume<D> {
    /// Scan a contiguous sector range for `short`, recording the first
    /// reusable slot seen along the way.
    ///
    /// Stops at the first never-used slot: entries are appended in order,
    /// so nothing after it can be valid. Tombstoned slots earlier in the
    /// sequence stay reachable and are offered for reuse.
    fn scan_range(
        &mut self,
        first_sector: u64,
        sector_count: u32,
        short: &[u8; 11],
        first_empty: &mut Option<EntrySlot>,
    ) -> FsResult<RangeScan> {
        let sector_size = self.layout.sector_size as usize;
        for i in 0..sector_count as u64 {
            let sector = first_sector + i;
            let buf = self.read_sector_buf(sector)?;
            for offset in (0..sector_size).step_by(DIR_ENTRY_SIZE) {
                let raw = &buf[offset..offset + DIR_ENTRY_SIZE];
                match classify(raw) {
                    EntryKind::Free => {
                        if first_empty.is_none() {
                            *first_empty = Some(EntrySlot {
                                entry: DirEntry::decode(raw),
                                sector,
                                offset,
                            });
                        }
                        return Ok(RangeScan::End);
                    }
                    EntryKind::Deleted => {
                        if first_empty.is_none() {
                            *first_empty = Some(EntrySlot {
                                entry: DirEntry::decode(raw),
                                sector,
                                offset,
                            });
                        }
                    }
                    EntryKind::Valid => {
                        let entry = DirEntry::decode(raw);
                        if !entry.is_volume_label() && entry.name == *short {
                            return Ok(RangeScan::Found(EntrySlot {
                                entry,
                                sector,
                                offset,
                            }));
                        }
                    }
                }
            }
        }
        Ok(RangeScan::Continue)
    }

    /// Scan one directory for `short`. Non-root directories are scanned
    /// one cluster at a time; a chain is only contiguous within a cluster.
    fn scan_directory(&mut self, dir: DirLocation, short: &[u8; 11]) -> FsResult<ScanHit> {
        let mut first_empty = None;

        match dir {
            DirLocation::Root => {
                let (start, count) = (self.layout.root_start, self.layout.root_sectors);
                match self.scan_range(start, count, short, &mut first_empty)? {
                    RangeScan::Found(slot) => return Ok(ScanHit::Found(slot)),
                    RangeScan::End | RangeScan::Continue => {}
                }
            }
            DirLocation::Cluster(first) => {
                let mut cluster = first;
                while self.cluster_in_use(cluster) {
                    let start = self.layout.cluster_to_sector(cluster);
                    let count = self.layout.sectors_per_cluster;
                    match self.scan_range(start, count, short, &mut first_empty)? {
                        RangeScan::Found(slot) => return Ok(ScanHit::Found(slot)),
                        RangeScan::End => break,
                        RangeScan::Continue => {}
                    }
                    cluster = self.fat_entry(cluster)?;
                }
            }
        }

        match first_empty {
            Some(slot) => Ok(ScanHit::Empty(slot)),
            None => Ok(ScanHit::Full),
        }
    }

    /// Walk `path` component by component.
    ///
    /// Intermediate components must exist and be directories; the final
    /// component may resolve to an existing entry, a creatable slot, or a
    /// full parent. Callers handle the root path themselves.
    pub(crate) fn resolve(&mut self, path: &str) -> FsResult<Resolution> {
        let components: Vec<&str> = path.split('/').filter(|c| !c.is_empty()).collect();
        // The root has no directory entry of its own to resolve to.
        if components.is_empty() {
            return Err(FsError::NotFound(path.to_string()));
        }

        let mut dir = DirLocation::Root;
        for (i, component) in components.iter().enumerate() {
            let last = i + 1 == components.len();
            trace!("resolving component '{}' in {:?}", component, dir);

            let short = match to_short_name(component) {
                Ok(short) => short,
                // An unconvertible name can never match an on-disk entry.
                Err(e) if last => return Err(e),
                Err(_) => return Err(FsError::NotFound(path.to_string())),
            };

            match self.scan_directory(dir, &short)? {
                ScanHit::Found(slot) => {
                    if last {
                        return Ok(Resolution::Found(slot));
                    }
                    if !slot.entry.is_directory() {
                        return Err(FsError::NotADirectory(component.to_string()));
                    }
                    dir = DirLocation::Cluster(slot.entry.first_cluster);
                }
                ScanHit::Empty(slot) => {
                    if last {
                        return Ok(Resolution::Empty {
                            slot,
                            name: component.to_string(),
                        });
                    }
                    return Err(FsError::NotFound(path.to_string()));
                }
                ScanHit::Full => {
                    if last {
                        return Ok(Resolution::Full);
                    }
                    return Err(FsError::NotFound(path.to_string()));
                }
            }
        }
        unreachable!("the last component always returns")
    }

    /// Resolve `path` to an existing entry.
    pub fn find_entry(&mut self, path: &str) -> FsResult<EntrySlot> {
        match self.resolve(path) {
            Ok(Resolution::Found(slot)) => Ok(slot),
            Ok(_) => Err(FsError::NotFound(path.to_string())),
            Err(FsError::InvalidName(_)) => Err(FsError::NotFound(path.to_string())),
            Err(e) => Err(e),
        }
    }

    /// Resolve `path` to a slot where its final component can be created.
    ///
    /// Returns the slot and the final component's name.
    pub fn find_empty_slot(&mut self, path: &str) -> FsResult<(EntrySlot, String)> {
        match self.resolve(path)? {
            Resolution::Found(_) => Err(FsError::AlreadyExists(path.to_string())),
            Resolution::Empty { slot, name } => Ok((slot, name)),
            Resolution::Full => Err(FsError::OutOfSpace(format!(
                "no free directory slot for {}",
                path
            ))),
        }
    }

    /// Collect child names from one contiguous sector range.
    ///
    /// Returns `false` once the directory's terminating never-used slot is
    /// seen; self/parent references and volume labels are skipped.
    fn collect_names_in_range(
        &mut self,
        first_sector: u64,
        sector_count: u32,
        names: &mut Vec<String>,
    ) -> FsResult<bool> {
        let sector_size = self.layout.sector_size as usize;
        for i in 0..sector_count as u64 {
            let buf = self.read_sector_buf(first_sector + i)?;
            for offset in (0..sector_size).step_by(DIR_ENTRY_SIZE) {
                let raw = &buf[offset..offset + DIR_ENTRY_SIZE];
                match classify(raw) {
                    EntryKind::Free => return Ok(false),
                    EntryKind::Deleted => continue,
                    EntryKind::Valid => {
                        let entry = DirEntry::decode(raw);
                        if entry.attributes & attrs::VOLUME_ID != 0 || entry.is_dot_entry() {
                            continue;
                        }
                        names.push(to_long_name(&entry.name));
                    }
                }
            }
        }
        Ok(true)
    }

    /// All child names of a directory, in on-disk order.
    pub(crate) fn list_names(&mut self, dir: DirLocation) -> FsResult<Vec<String>> {
        let mut names = Vec::new();
        match dir {
            DirLocation::Root => {
                let (start, count) = (self.layout.root_start, self.layout.root_sectors);
                self.collect_names_in_range(start, count, &mut names)?;
            }
            DirLocation::Cluster(first) => {
                let mut cluster = first;
                while self.cluster_in_use(cluster) {
                    let start = self.layout.cluster_to_sector(cluster);
                    let count = self.layout.sectors_per_cluster;
                    if !self.collect_names_in_range(start, count, &mut names)? {
                        break;
                    }
                    cluster = self.fat_entry(cluster)?;
                }
            }
        }
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ironfat_core::MemDevice;

    use crate::boot::BootParams;
    use crate::format::format_volume;

    fn volume() -> Fat16Volume<MemDevice> {
        let params = BootParams {
            bytes_per_sector: 512,
            sectors_per_cluster: 1,
            reserved_sectors: 1,
            num_fats: 2,
            root_entries: 16,
            total_sectors: 325,
            sectors_per_fat: 2,
        };
        let mut dev = MemDevice::new(512, 325);
        format_volume(&mut dev, &params).unwrap();
        Fat16Volume::mount(dev).unwrap()
    }

    #[test]
    fn component_less_paths_resolve_to_not_found() {
        // Callers that special-case the root go through ops.rs, but the
        // resolver itself must stay total on "/", "" and friends.
        let mut vol = volume();
        for path in ["/", "", "///"] {
            assert!(matches!(vol.find_entry(path), Err(FsError::NotFound(_))));
            assert!(matches!(
                vol.find_empty_slot(path),
                Err(FsError::NotFound(_))
            ));
        }
    }

    #[test]
    fn repeated_separators_are_collapsed() {
        let mut vol = volume();
        vol.create_file("/a.txt").unwrap();
        assert!(vol.find_entry("//a.txt").is_ok());
        assert!(vol.find_entry("/a.txt/").is_ok());
    }
}
