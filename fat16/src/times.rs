// FAT compact date/time conversion
// FAT date: bits 15-9 year since 1980, bits 8-5 month, bits 4-0 day.
// FAT time: bits 15-11 hours, bits 10-5 minutes, bits 4-0 seconds/2.
// The "tenth" byte carries 10ms units within the 2-second window (0..=199).

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc};

/// Convert FAT date/time fields to a wall-clock time.
///
/// Zeroed or out-of-range fields (freshly formatted entries) map to the
/// Unix epoch.
pub fn fat_to_system_time(date: u16, time: u16, tenth: u8) -> SystemTime {
    let year = ((date >> 9) & 0x7F) as i32 + 1980;
    let month = ((date >> 5) & 0x0F) as u32;
    let day = (date & 0x1F) as u32;

    let hour = ((time >> 11) & 0x1F) as u32;
    let minute = ((time >> 5) & 0x3F) as u32;
    let second = ((time & 0x1F) as u32) * 2;

    let secs = NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(hour, minute, second))
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or(0)
        .max(0) as u64;

    UNIX_EPOCH + Duration::from_secs(secs) + Duration::from_millis(tenth as u64 * 10)
}

/// Convert a wall-clock time to FAT date/time/tenth fields.
///
/// Years are clamped to the representable 1980..=2107 window.
pub fn system_time_to_fat(t: SystemTime) -> (u16, u16, u8) {
    let since_epoch = t.duration_since(UNIX_EPOCH).unwrap_or_default();
    let dt = DateTime::<Utc>::from(UNIX_EPOCH + since_epoch);

    let year = dt.year().clamp(1980, 2107) - 1980;
    let date = ((year as u16) << 9) | ((dt.month() as u16) << 5) | dt.day() as u16;
    let time =
        ((dt.hour() as u16) << 11) | ((dt.minute() as u16) << 5) | (dt.second() as u16 / 2);
    let tenth = ((since_epoch.as_millis() % 2000) / 10) as u8;

    (date, time, tenth)
}

/// Current time in FAT fields.
pub fn now_fat() -> (u16, u16, u8) {
    system_time_to_fat(SystemTime::now())
}
