// 8.3 short-name conversion
// Long name <-> fixed 11-byte space-padded short name, both directions.

use ironfat_core::{FsError, FsResult};

/// Convert a path component to its 11-byte 8.3 short name.
///
/// Fails with `InvalidName` on invalid characters, an empty base, or
/// over-length base/extension. The name is uppercase-folded; a leading
/// 0xE5 byte is stored as 0x05 so it is not mistaken for a tombstone.
pub fn to_short_name(name: &str) -> FsResult<[u8; 11]> {
    let upper = name.to_uppercase();
    let (base, ext) = match upper.rsplit_once('.') {
        Some((base, ext)) => (base, ext),
        None => (upper.as_str(), ""),
    };

    if base.is_empty() || base.len() > 8 || ext.len() > 3 {
        return Err(FsError::InvalidName(name.to_string()));
    }

    let mut short = [b' '; 11];
    for (i, byte) in base.bytes().enumerate() {
        if !is_valid_short_char(byte) {
            return Err(FsError::InvalidName(name.to_string()));
        }
        short[i] = if i == 0 && byte == 0xE5 { 0x05 } else { byte };
    }
    for (i, byte) in ext.bytes().enumerate() {
        if !is_valid_short_char(byte) {
            return Err(FsError::InvalidName(name.to_string()));
        }
        short[8 + i] = byte;
    }
    Ok(short)
}

/// Reassemble a display name from an 11-byte short name.
pub fn to_long_name(short: &[u8; 11]) -> String {
    let mut name = String::new();

    for (i, &byte) in short[0..8].iter().enumerate() {
        if byte == b' ' || byte == 0x00 {
            break;
        }
        if i == 0 && byte == 0x05 {
            name.push(0xE5 as char);
        } else {
            name.push(byte as char);
        }
    }

    let base_len = name.len();
    for &byte in &short[8..11] {
        if byte != b' ' && byte != 0x00 {
            if name.len() == base_len {
                name.push('.');
            }
            name.push(byte as char);
        }
    }

    name
}

fn is_valid_short_char(c: u8) -> bool {
    matches!(c,
        b'A'..=b'Z' | b'0'..=b'9' | b'!' | b'#' | b'$' | b'%' | b'&'
        | b'\'' | b'(' | b')' | b'-' | b'@' | b'^' | b'_' | b'`'
        | b'{' | b'}' | b'~' | 0x80..=0xFF)
}
