//! Single-volume FAT16 engine.
//!
//! Turns a raw sequence of fixed-size sectors (anything implementing
//! [`ironfat_core::SectorIo`]) into a hierarchical namespace of files and
//! directories: path resolution, directory-entry management, cluster
//! allocation, and byte-range read/write spanning multiple clusters.
//!
//! The engine is single-threaded by design; an embedding dispatch layer
//! must serialize operations behind one lock around the whole volume.

pub mod boot;
pub mod dirent;
pub mod fat;
pub mod format;
pub mod io;
pub mod name;
pub mod ops;
pub mod resolve;
pub mod times;
pub mod volume;

pub use boot::BootParams;
pub use dirent::{DirEntry, EntryKind, EntrySlot};
pub use format::format_volume;
pub use ops::FileAttributes;
pub use volume::{Cluster, Fat16Volume, VolumeLayout};
