pub mod device;
pub mod error;

pub use device::{FileDevice, MemDevice, SectorIo};
pub use error::FsError;

/// Shorthand used throughout the engine crates.
pub type FsResult<T> = Result<T, FsError>;
