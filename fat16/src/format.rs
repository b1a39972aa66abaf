// Volume formatter
// Lays down a boot sector, the reserved FAT head entries in every copy,
// and a zeroed root region, producing a volume the engine can mount.

use byteorder::{ByteOrder, LittleEndian};
use ironfat_core::{FsError, FsResult, SectorIo};
use log::info;

use crate::boot::{BootParams, MEDIA_FIXED};
use crate::fat::CLUSTER_EOC;
use crate::volume::VolumeLayout;

/// Format `device` with the given geometry.
///
/// The geometry is validated for internal consistency only; callers pick
/// the sector/cluster sizes. Every sector of the FAT copies and the root
/// region is zeroed, so any previous contents are unreachable afterwards.
pub fn format_volume<D: SectorIo>(device: &mut D, params: &BootParams) -> FsResult<()> {
    params.validate()?;
    if params.bytes_per_sector as usize != device.sector_size() {
        return Err(FsError::InvalidVolume(format!(
            "geometry wants {}-byte sectors, device uses {}",
            params.bytes_per_sector,
            device.sector_size()
        )));
    }
    if params.total_sectors as u64 > device.sector_count() {
        return Err(FsError::InvalidVolume(format!(
            "geometry wants {} sectors, device has {}",
            params.total_sectors,
            device.sector_count()
        )));
    }
    let layout = VolumeLayout::from_params(params)?;

    let mut sector = vec![0u8; layout.sector_size as usize];
    params.encode_into(&mut sector);
    device.write_sector(0, &sector)?;

    // FAT[0] carries the media byte, FAT[1] is reserved; both read as
    // end-of-chain so clusters 0 and 1 are never allocated.
    let mut fat_head = vec![0u8; layout.sector_size as usize];
    LittleEndian::write_u16(&mut fat_head[0..2], 0xFF00 | MEDIA_FIXED as u16);
    LittleEndian::write_u16(&mut fat_head[2..4], CLUSTER_EOC);

    let zeros = vec![0u8; layout.sector_size as usize];
    for copy in 0..layout.num_fats as u64 {
        let start = layout.fat_start + copy * layout.sectors_per_fat as u64;
        device.write_sector(start, &fat_head)?;
        for i in 1..layout.sectors_per_fat as u64 {
            device.write_sector(start + i, &zeros)?;
        }
    }

    for i in 0..layout.root_sectors as u64 {
        device.write_sector(layout.root_start + i, &zeros)?;
    }

    info!(
        "formatted FAT16 volume: {} sectors, {} clusters of {} bytes",
        layout.total_sectors, layout.total_clusters, layout.cluster_size
    );
    Ok(())
}
