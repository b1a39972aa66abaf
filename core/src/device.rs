// Sector-level device access
// The engine never touches storage except through this seam: exactly one
// fixed-size sector per call, addressed by logical sector number.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use log::debug;

use crate::error::FsError;

/// Raw sector I/O over a backing block device or image.
///
/// `buf.len()` must equal the device's sector size on every call; the
/// device does not split or merge requests.
pub trait SectorIo {
    /// Sector size in bytes. Fixed for the lifetime of the device.
    fn sector_size(&self) -> usize;

    /// Number of addressable sectors.
    fn sector_count(&self) -> u64;

    fn read_sector(&mut self, sector: u64, buf: &mut [u8]) -> Result<(), FsError>;

    fn write_sector(&mut self, sector: u64, buf: &[u8]) -> Result<(), FsError>;
}

fn out_of_range(sector: u64) -> FsError {
    FsError::Io(std::io::Error::new(
        std::io::ErrorKind::UnexpectedEof,
        format!("sector {} out of range", sector),
    ))
}

/// Device backed by a disk image file.
pub struct FileDevice {
    file: File,
    sector_size: usize,
    sector_count: u64,
}

impl FileDevice {
    /// Open an existing image for read/write access.
    pub fn open<P: AsRef<Path>>(path: P, sector_size: usize) -> Result<Self, FsError> {
        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        let len = file.metadata()?.len();
        debug!(
            "opened image {} ({} sectors of {} bytes)",
            path.as_ref().display(),
            len / sector_size as u64,
            sector_size
        );
        Ok(Self {
            file,
            sector_size,
            sector_count: len / sector_size as u64,
        })
    }

    /// Create (or truncate) an image of `sector_count` sectors.
    pub fn create<P: AsRef<Path>>(
        path: P,
        sector_size: usize,
        sector_count: u64,
    ) -> Result<Self, FsError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;
        file.set_len(sector_count * sector_size as u64)?;
        debug!(
            "created image {} ({} sectors of {} bytes)",
            path.as_ref().display(),
            sector_count,
            sector_size
        );
        Ok(Self {
            file,
            sector_size,
            sector_count,
        })
    }
}

impl SectorIo for FileDevice {
    fn sector_size(&self) -> usize {
        self.sector_size
    }

    fn sector_count(&self) -> u64 {
        self.sector_count
    }

    fn read_sector(&mut self, sector: u64, buf: &mut [u8]) -> Result<(), FsError> {
        debug_assert_eq!(buf.len(), self.sector_size);
        if sector >= self.sector_count {
            return Err(out_of_range(sector));
        }
        self.file
            .seek(SeekFrom::Start(sector * self.sector_size as u64))?;
        self.file.read_exact(buf)?;
        Ok(())
    }

    fn write_sector(&mut self, sector: u64, buf: &[u8]) -> Result<(), FsError> {
        debug_assert_eq!(buf.len(), self.sector_size);
        if sector >= self.sector_count {
            return Err(out_of_range(sector));
        }
        self.file
            .seek(SeekFrom::Start(sector * self.sector_size as u64))?;
        self.file.write_all(buf)?;
        Ok(())
    }
}

/// In-memory device, used by tests and scratch volumes.
pub struct MemDevice {
    data: Vec<u8>,
    sector_size: usize,
}

impl MemDevice {
    pub fn new(sector_size: usize, sector_count: u64) -> Self {
        Self {
            data: vec![0u8; sector_size * sector_count as usize],
            sector_size,
        }
    }

    /// Raw view of the whole image.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

impl SectorIo for MemDevice {
    fn sector_size(&self) -> usize {
        self.sector_size
    }

    fn sector_count(&self) -> u64 {
        (self.data.len() / self.sector_size) as u64
    }

    fn read_sector(&mut self, sector: u64, buf: &mut [u8]) -> Result<(), FsError> {
        debug_assert_eq!(buf.len(), self.sector_size);
        if sector >= self.sector_count() {
            return Err(out_of_range(sector));
        }
        let start = sector as usize * self.sector_size;
        buf.copy_from_slice(&self.data[start..start + self.sector_size]);
        Ok(())
    }

    fn write_sector(&mut self, sector: u64, buf: &[u8]) -> Result<(), FsError> {
        debug_assert_eq!(buf.len(), self.sector_size);
        if sector >= self.sector_count() {
            return Err(out_of_range(sector));
        }
        let start = sector as usize * self.sector_size;
        self.data[start..start + self.sector_size].copy_from_slice(buf);
        Ok(())
    }
}
