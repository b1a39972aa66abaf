// Directory entry records
// Fixed 32-byte on-disk layout, decoded and encoded field by field.

use byteorder::{ByteOrder, LittleEndian};
use ironfat_core::{FsResult, SectorIo};

use crate::times;
use crate::volume::{Cluster, Fat16Volume};

pub const DIR_ENTRY_SIZE: usize = 32;

/// First name byte of a never-used slot; terminates directory scanning.
pub const NAME_FREE: u8 = 0x00;
/// First name byte of a tombstoned (deleted) entry.
pub const NAME_DELETED: u8 = 0xE5;

/// Short names of the synthesized self/parent entries.
pub const DOT_NAME: [u8; 11] = *b".          ";
pub const DOTDOT_NAME: [u8; 11] = *b"..         ";

/// Directory entry attribute bits.
pub mod attrs {
    pub const READ_ONLY: u8 = 0x01;
    pub const HIDDEN: u8 = 0x02;
    pub const SYSTEM: u8 = 0x04;
    pub const VOLUME_ID: u8 = 0x08;
    pub const DIRECTORY: u8 = 0x10;
    pub const ARCHIVE: u8 = 0x20;
    pub const LONG_NAME: u8 = READ_ONLY | HIDDEN | SYSTEM | VOLUME_ID;
}

// Field offsets within the 32-byte record
const OFF_NAME: usize = 0; // 11 bytes, 8.3 space padded
const OFF_ATTR: usize = 11; // u8
const OFF_NT_RESERVED: usize = 12; // u8, always 0
const OFF_CREATED_TENTH: usize = 13; // u8, 10ms units 0..=199
const OFF_CREATED_TIME: usize = 14; // u16
const OFF_CREATED_DATE: usize = 16; // u16
const OFF_ACCESSED_DATE: usize = 18; // u16
const OFF_FIRST_CLUSTER_HI: usize = 20; // u16, always 0 on FAT16
const OFF_WRITE_TIME: usize = 22; // u16
const OFF_WRITE_DATE: usize = 24; // u16
const OFF_FIRST_CLUSTER_LO: usize = 26; // u16
const OFF_SIZE: usize = 28; // u32

/// Classification of a raw 32-byte slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// In use.
    Valid,
    /// Never used; no later slot in the directory can be valid.
    Free,
    /// Tombstoned; reusable, but later slots may still be valid.
    Deleted,
}

/// Classify a slot by its first name byte.
pub fn classify(raw: &[u8]) -> EntryKind {
    match raw[0] {
        NAME_FREE => EntryKind::Free,
        NAME_DELETED => EntryKind::Deleted,
        _ => EntryKind::Valid,
    }
}

/// A decoded directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirEntry {
    pub name: [u8; 11],
    pub attributes: u8,
    pub created_tenth: u8,
    pub created_time: u16,
    pub created_date: u16,
    pub accessed_date: u16,
    pub write_time: u16,
    pub write_date: u16,
    pub first_cluster: Cluster,
    pub size: u32,
}

impl DirEntry {
    /// Build a fresh entry stamped with the current time.
    ///
    /// A first cluster of 0 means "no clusters yet" (empty file).
    pub fn new(name: [u8; 11], attributes: u8, first_cluster: Cluster, size: u32) -> Self {
        let (date, time, tenth) = times::now_fat();
        Self {
            name,
            attributes,
            created_tenth: tenth,
            created_time: time,
            created_date: date,
            accessed_date: date,
            write_time: time,
            write_date: date,
            first_cluster,
            size,
        }
    }

    pub fn decode(raw: &[u8]) -> Self {
        debug_assert!(raw.len() >= DIR_ENTRY_SIZE);
        let mut name = [0u8; 11];
        name.copy_from_slice(&raw[OFF_NAME..OFF_NAME + 11]);
        Self {
            name,
            attributes: raw[OFF_ATTR],
            created_tenth: raw[OFF_CREATED_TENTH],
            created_time: LittleEndian::read_u16(&raw[OFF_CREATED_TIME..]),
            created_date: LittleEndian::read_u16(&raw[OFF_CREATED_DATE..]),
            accessed_date: LittleEndian::read_u16(&raw[OFF_ACCESSED_DATE..]),
            write_time: LittleEndian::read_u16(&raw[OFF_WRITE_TIME..]),
            write_date: LittleEndian::read_u16(&raw[OFF_WRITE_DATE..]),
            first_cluster: LittleEndian::read_u16(&raw[OFF_FIRST_CLUSTER_LO..]),
            size: LittleEndian::read_u32(&raw[OFF_SIZE..]),
        }
    }

    pub fn encode_into(&self, raw: &mut [u8]) {
        debug_assert!(raw.len() >= DIR_ENTRY_SIZE);
        raw[OFF_NAME..OFF_NAME + 11].copy_from_slice(&self.name);
        raw[OFF_ATTR] = self.attributes;
        raw[OFF_NT_RESERVED] = 0;
        raw[OFF_CREATED_TENTH] = self.created_tenth;
        LittleEndian::write_u16(&mut raw[OFF_CREATED_TIME..], self.created_time);
        LittleEndian::write_u16(&mut raw[OFF_CREATED_DATE..], self.created_date);
        LittleEndian::write_u16(&mut raw[OFF_ACCESSED_DATE..], self.accessed_date);
        LittleEndian::write_u16(&mut raw[OFF_FIRST_CLUSTER_HI..], 0);
        LittleEndian::write_u16(&mut raw[OFF_WRITE_TIME..], self.write_time);
        LittleEndian::write_u16(&mut raw[OFF_WRITE_DATE..], self.write_date);
        LittleEndian::write_u16(&mut raw[OFF_FIRST_CLUSTER_LO..], self.first_cluster);
        LittleEndian::write_u32(&mut raw[OFF_SIZE..], self.size);
    }

    pub fn is_directory(&self) -> bool {
        self.attributes & attrs::DIRECTORY != 0
    }

    pub fn is_read_only(&self) -> bool {
        self.attributes & attrs::READ_ONLY != 0
    }

    pub fn is_volume_label(&self) -> bool {
        self.attributes & attrs::VOLUME_ID != 0
    }

    /// Self/parent reference inside a directory cluster.
    pub fn is_dot_entry(&self) -> bool {
        self.name[0] == b'.'
    }
}

/// A directory entry together with its exact on-disk location, produced by
/// resolution and consumed by the next mutation.
#[derive(Debug, Clone)]
pub struct EntrySlot {
    pub entry: DirEntry,
    /// Sector holding the entry.
    pub sector: u64,
    /// Byte offset of the entry within that sector.
    pub offset: usize,
}

impl<D: SectorIo> Fat16Volume<D> {
    /// Rewrite one entry in place.
    ///
    /// The slot's sector is re-read and only the entry-sized region is
    /// overwritten, so neighboring entries in the same sector survive.
    pub fn write_slot(&mut self, slot: &EntrySlot) -> FsResult<()> {
        let mut buf = self.read_sector_buf(slot.sector)?;
        slot.entry
            .encode_into(&mut buf[slot.offset..slot.offset + DIR_ENTRY_SIZE]);
        self.device.write_sector(slot.sector, &buf)?;
        Ok(())
    }
}
