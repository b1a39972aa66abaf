// Boot sector (BPB) parameter record
// Decoded field-by-field from the reserved boot sector; re-encoded by the
// volume formatter.

use byteorder::{ByteOrder, LittleEndian};
use ironfat_core::{FsError, FsResult};

// BPB field offsets within the boot sector
pub const BS_JMP_BOOT: usize = 0x00;
pub const BS_OEM_NAME: usize = 0x03;
pub const BPB_BYTES_PER_SEC: usize = 0x0B;
pub const BPB_SEC_PER_CLUS: usize = 0x0D;
pub const BPB_RSVD_SEC_CNT: usize = 0x0E;
pub const BPB_NUM_FATS: usize = 0x10;
pub const BPB_ROOT_ENT_CNT: usize = 0x11;
pub const BPB_TOT_SEC16: usize = 0x13;
pub const BPB_MEDIA: usize = 0x15;
pub const BPB_FAT_SZ16: usize = 0x16;
pub const BPB_TOT_SEC32: usize = 0x20;

// Extended boot record (FAT16 variant)
pub const BS16_DRV_NUM: usize = 0x24;
pub const BS16_BOOT_SIG: usize = 0x26;
pub const BS16_VOL_ID: usize = 0x27;
pub const BS16_VOL_LAB: usize = 0x2B;
pub const BS16_FIL_SYS_TYPE: usize = 0x36;

pub const BOOT_SIGNATURE_OFFSET: usize = 0x1FE;
pub const BOOT_SIGNATURE: [u8; 2] = [0x55, 0xAA];

pub const MEDIA_FIXED: u8 = 0xF8;

/// The seven geometry parameters sourced from the boot sector.
///
/// Read once at mount and immutable thereafter; everything else the engine
/// needs is derived in [`crate::volume::VolumeLayout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootParams {
    pub bytes_per_sector: u16,
    pub sectors_per_cluster: u8,
    pub reserved_sectors: u16,
    pub num_fats: u8,
    pub root_entries: u16,
    pub total_sectors: u32,
    pub sectors_per_fat: u16,
}

impl BootParams {
    /// Decode the BPB from a raw boot sector.
    pub fn decode(sector: &[u8]) -> FsResult<Self> {
        if sector.len() < 512 {
            return Err(FsError::InvalidVolume(
                "boot sector shorter than 512 bytes".to_string(),
            ));
        }
        if sector[BOOT_SIGNATURE_OFFSET..BOOT_SIGNATURE_OFFSET + 2] != BOOT_SIGNATURE {
            return Err(FsError::InvalidVolume(
                "missing 0x55AA boot signature".to_string(),
            ));
        }

        let total_sectors_16 = LittleEndian::read_u16(&sector[BPB_TOT_SEC16..]);
        let total_sectors = if total_sectors_16 != 0 {
            total_sectors_16 as u32
        } else {
            LittleEndian::read_u32(&sector[BPB_TOT_SEC32..])
        };

        let params = Self {
            bytes_per_sector: LittleEndian::read_u16(&sector[BPB_BYTES_PER_SEC..]),
            sectors_per_cluster: sector[BPB_SEC_PER_CLUS],
            reserved_sectors: LittleEndian::read_u16(&sector[BPB_RSVD_SEC_CNT..]),
            num_fats: sector[BPB_NUM_FATS],
            root_entries: LittleEndian::read_u16(&sector[BPB_ROOT_ENT_CNT..]),
            total_sectors,
            sectors_per_fat: LittleEndian::read_u16(&sector[BPB_FAT_SZ16..]),
        };
        params.validate()?;
        Ok(params)
    }

    /// Encode a full boot sector into `sector` (used by the formatter).
    pub fn encode_into(&self, sector: &mut [u8]) {
        debug_assert!(sector.len() >= 512);
        sector[..512].fill(0);

        sector[BS_JMP_BOOT..BS_JMP_BOOT + 3].copy_from_slice(&[0xEB, 0x3C, 0x90]);
        sector[BS_OEM_NAME..BS_OEM_NAME + 8].copy_from_slice(b"IRONFAT ");

        LittleEndian::write_u16(&mut sector[BPB_BYTES_PER_SEC..], self.bytes_per_sector);
        sector[BPB_SEC_PER_CLUS] = self.sectors_per_cluster;
        LittleEndian::write_u16(&mut sector[BPB_RSVD_SEC_CNT..], self.reserved_sectors);
        sector[BPB_NUM_FATS] = self.num_fats;
        LittleEndian::write_u16(&mut sector[BPB_ROOT_ENT_CNT..], self.root_entries);
        if self.total_sectors <= u16::MAX as u32 {
            LittleEndian::write_u16(&mut sector[BPB_TOT_SEC16..], self.total_sectors as u16);
        } else {
            LittleEndian::write_u32(&mut sector[BPB_TOT_SEC32..], self.total_sectors);
        }
        sector[BPB_MEDIA] = MEDIA_FIXED;
        LittleEndian::write_u16(&mut sector[BPB_FAT_SZ16..], self.sectors_per_fat);

        sector[BS16_DRV_NUM] = 0x80;
        sector[BS16_BOOT_SIG] = 0x29;
        LittleEndian::write_u32(&mut sector[BS16_VOL_ID..], 0x1234_5678);
        sector[BS16_VOL_LAB..BS16_VOL_LAB + 11].copy_from_slice(b"NO NAME    ");
        sector[BS16_FIL_SYS_TYPE..BS16_FIL_SYS_TYPE + 8].copy_from_slice(b"FAT16   ");

        sector[BOOT_SIGNATURE_OFFSET..BOOT_SIGNATURE_OFFSET + 2].copy_from_slice(&BOOT_SIGNATURE);
    }

    pub(crate) fn validate(&self) -> FsResult<()> {
        // The boot sector record itself occupies 512 bytes, so smaller
        // sectors cannot hold it.
        if self.bytes_per_sector < 512 || !self.bytes_per_sector.is_power_of_two() {
            return Err(FsError::InvalidVolume(format!(
                "bad sector size: {}",
                self.bytes_per_sector
            )));
        }
        if self.sectors_per_cluster == 0
            || self.reserved_sectors == 0
            || self.num_fats == 0
            || self.root_entries == 0
            || self.sectors_per_fat == 0
            || self.total_sectors == 0
        {
            return Err(FsError::InvalidVolume(
                "zero geometry field in boot sector".to_string(),
            ));
        }
        Ok(())
    }
}
