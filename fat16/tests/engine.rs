// End-to-end engine tests over in-memory volumes.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use ironfat_core::{FileDevice, FsError, MemDevice};
use ironfat_fat16::{format_volume, BootParams, Fat16Volume};

/// 512-byte clusters, 319 of them, 16 root entries.
fn small_volume() -> Fat16Volume<MemDevice> {
    let _ = env_logger::builder().is_test(true).try_init();
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

/// 4096-byte clusters (8 sectors each), 32 of them.
fn big_cluster_volume() -> Fat16Volume<MemDevice> {
    let _ = env_logger::builder().is_test(true).try_init();
    let params = BootParams {
        bytes_per_sector: 512,
        sectors_per_cluster: 8,
        reserved_sectors: 1,
        num_fats: 2,
        root_entries: 16,
        total_sectors: 260,
        sectors_per_fat: 1,
    };
    let mut dev = MemDevice::new(512, 260);
    format_volume(&mut dev, &params).unwrap();
    Fat16Volume::mount(dev).unwrap()
}

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

#[test]
fn fresh_volume_has_empty_root() {
    let mut vol = small_volume();
    assert!(vol.read_dir("/").unwrap().is_empty());

    let root = vol.stat("/").unwrap();
    assert!(root.is_directory);
    assert_eq!(root.size, 0);
}

#[test]
fn create_stat_and_empty_read() {
    let mut vol = small_volume();
    vol.create_file("/a.txt").unwrap();

    let attrs = vol.stat("/a.txt").unwrap();
    assert!(!attrs.is_directory);
    assert!(!attrs.read_only);
    assert_eq!(attrs.size, 0);
    assert_eq!(attrs.blocks, 0);

    // An empty file owns no clusters and reads as empty at any length.
    assert_eq!(vol.find_entry("/a.txt").unwrap().entry.first_cluster, 0);
    assert!(vol.read("/a.txt", 0, 100).unwrap().is_empty());
}

#[test]
fn write_read_round_trip_within_cluster() {
    let mut vol = small_volume();
    vol.create_file("/small.bin").unwrap();

    let data = pattern(100);
    assert_eq!(vol.write("/small.bin", 0, &data).unwrap(), 100);
    assert_eq!(vol.read("/small.bin", 0, 100).unwrap(), data);
    assert_eq!(vol.stat("/small.bin").unwrap().size, 100);

    // Reads clamp to the file size.
    assert_eq!(vol.read("/small.bin", 40, 1000).unwrap(), data[40..]);
}

#[test]
fn write_read_round_trip_across_clusters() {
    let mut vol = small_volume();
    vol.create_file("/a.txt").unwrap();

    let data = pattern(600);
    assert_eq!(vol.write("/a.txt", 0, &data).unwrap(), 600);
    assert_eq!(vol.stat("/a.txt").unwrap().size, 600);

    // 600 bytes over 512-byte clusters is a two-cluster chain.
    let first = vol.find_entry("/a.txt").unwrap().entry.first_cluster;
    assert_eq!(vol.cluster_chain(first).unwrap().len(), 2);

    assert_eq!(vol.read("/a.txt", 0, 600).unwrap(), data);
    // A read straddling the cluster boundary sees contiguous bytes.
    assert_eq!(vol.read("/a.txt", 500, 24).unwrap(), data[500..524]);
}

#[test]
fn overwrite_preserves_surrounding_bytes() {
    let mut vol = small_volume();
    vol.create_file("/f").unwrap();

    let mut data = pattern(600);
    vol.write("/f", 0, &data).unwrap();
    vol.write("/f", 100, b"XYZW").unwrap();
    data[100..104].copy_from_slice(b"XYZW");

    assert_eq!(vol.read("/f", 0, 600).unwrap(), data);
    assert_eq!(vol.stat("/f").unwrap().size, 600);
}

#[test]
fn append_split_across_cluster_boundary() {
    let mut vol = big_cluster_volume();
    vol.create_file("/a.bin").unwrap();

    let head = pattern(4090);
    vol.write("/a.bin", 0, &head).unwrap();
    let first = vol.find_entry("/a.bin").unwrap().entry.first_cluster;
    assert_eq!(vol.cluster_chain(first).unwrap().len(), 1);

    // 10 more bytes at offset 4090: 6 land in the first cluster, 4 in a
    // freshly allocated second one.
    vol.write("/a.bin", 4090, b"0123456789").unwrap();
    assert_eq!(vol.stat("/a.bin").unwrap().size, 4100);
    assert_eq!(vol.cluster_chain(first).unwrap().len(), 2);

    let back = vol.read("/a.bin", 4085, 15).unwrap();
    assert_eq!(&back[..5], &head[4085..]);
    assert_eq!(&back[5..], b"0123456789");
}

#[test]
fn write_beyond_size_is_rejected() {
    let mut vol = small_volume();
    vol.create_file("/f").unwrap();
    vol.write("/f", 0, &pattern(10)).unwrap();

    assert!(matches!(
        vol.write("/f", 11, b"x"),
        Err(FsError::InvalidOffset { offset: 11, size: 10 })
    ));
    assert!(matches!(
        vol.read("/f", 11, 1),
        Err(FsError::InvalidOffset { .. })
    ));
    // Offset exactly at the size is an append, not an error.
    assert_eq!(vol.write("/f", 10, b"x").unwrap(), 1);
}

#[test]
fn truncate_extends_with_zeros() {
    let mut vol = small_volume();
    vol.create_file("/f").unwrap();
    vol.write("/f", 0, &pattern(10)).unwrap();

    vol.truncate("/f", 1536).unwrap();
    assert_eq!(vol.stat("/f").unwrap().size, 1536);

    let first = vol.find_entry("/f").unwrap().entry.first_cluster;
    assert_eq!(vol.cluster_chain(first).unwrap().len(), 3);

    let back = vol.read("/f", 0, 1536).unwrap();
    assert_eq!(&back[..10], &pattern(10)[..]);
    assert!(back[10..].iter().all(|&b| b == 0));
}

#[test]
fn truncate_shrinks_and_frees_tail() {
    let mut vol = small_volume();
    vol.create_file("/a.txt").unwrap();
    vol.write("/a.txt", 0, &pattern(600)).unwrap();

    let first = vol.find_entry("/a.txt").unwrap().entry.first_cluster;
    let chain = vol.cluster_chain(first).unwrap();
    assert_eq!(chain.len(), 2);

    vol.truncate("/a.txt", 100).unwrap();
    assert_eq!(vol.stat("/a.txt").unwrap().size, 100);
    assert_eq!(vol.cluster_chain(first).unwrap(), vec![first]);
    // The second cluster went back to the free pool.
    assert_eq!(vol.fat_entry(chain[1]).unwrap(), 0);
    assert_eq!(vol.read("/a.txt", 0, 100).unwrap(), pattern(600)[..100]);
}

#[test]
fn truncate_to_zero_releases_every_cluster() {
    let mut vol = small_volume();
    vol.create_file("/f").unwrap();
    vol.write("/f", 0, &pattern(600)).unwrap();

    let first = vol.find_entry("/f").unwrap().entry.first_cluster;
    let chain = vol.cluster_chain(first).unwrap();

    vol.truncate("/f", 0).unwrap();
    assert_eq!(vol.stat("/f").unwrap().size, 0);
    assert_eq!(vol.find_entry("/f").unwrap().entry.first_cluster, 0);
    for cluster in chain {
        assert_eq!(vol.fat_entry(cluster).unwrap(), 0);
    }
}

#[test]
fn remove_file_frees_chain_and_slot() {
    let mut vol = small_volume();
    vol.create_file("/f1").unwrap();
    vol.create_file("/f2").unwrap();
    vol.write("/f1", 0, &pattern(600)).unwrap();

    let first = vol.find_entry("/f1").unwrap().entry.first_cluster;
    let chain = vol.cluster_chain(first).unwrap();

    vol.remove_file("/f1").unwrap();
    assert!(matches!(vol.stat("/f1"), Err(FsError::NotFound(_))));
    assert_eq!(vol.read_dir("/").unwrap(), vec!["F2"]);
    for cluster in chain {
        assert_eq!(vol.fat_entry(cluster).unwrap(), 0);
    }
}

#[test]
fn deleted_slot_is_reused_in_place() {
    let mut vol = small_volume();
    vol.create_file("/f1").unwrap();
    vol.create_file("/f2").unwrap();
    vol.create_file("/f3").unwrap();

    vol.remove_file("/f2").unwrap();
    vol.create_file("/f4").unwrap();

    // f4 took f2's tombstoned slot, so it lists between f1 and f3.
    assert_eq!(vol.read_dir("/").unwrap(), vec!["F1", "F4", "F3"]);
}

#[test]
fn create_collision_leaves_existing_file_intact() {
    let mut vol = small_volume();
    vol.create_file("/a.txt").unwrap();
    vol.write("/a.txt", 0, b"keep me").unwrap();

    assert!(matches!(
        vol.create_file("/a.txt"),
        Err(FsError::AlreadyExists(_))
    ));
    assert!(matches!(
        vol.create_dir("/a.txt"),
        Err(FsError::AlreadyExists(_))
    ));
    assert_eq!(vol.read("/a.txt", 0, 7).unwrap(), b"keep me");
}

#[test]
fn root_directory_fills_up() {
    let mut vol = small_volume();
    // 16 root entries in this geometry.
    for i in 0..16 {
        vol.create_file(&format!("/f{}", i)).unwrap();
    }
    assert!(matches!(
        vol.create_file("/overflow"),
        Err(FsError::OutOfSpace(_))
    ));
    assert_eq!(vol.read_dir("/").unwrap().len(), 16);
}

#[test]
fn nested_directories() {
    let mut vol = small_volume();
    vol.create_dir("/docs").unwrap();
    vol.create_dir("/docs/old").unwrap();
    vol.create_file("/docs/a.txt").unwrap();
    vol.write("/docs/a.txt", 0, b"nested").unwrap();

    let attrs = vol.stat("/docs").unwrap();
    assert!(attrs.is_directory);

    // Self/parent references are not listed.
    let mut names = vol.read_dir("/docs").unwrap();
    names.sort();
    assert_eq!(names, vec!["A.TXT", "OLD"]);

    assert_eq!(vol.read("/docs/a.txt", 0, 6).unwrap(), b"nested");
    assert!(vol.read_dir("/docs/old").unwrap().is_empty());
}

#[test]
fn subdirectory_fills_up() {
    let mut vol = small_volume();
    vol.create_dir("/d").unwrap();
    // One 512-byte cluster holds 16 entries; 2 are the dot entries.
    for i in 0..14 {
        vol.create_file(&format!("/d/f{}", i)).unwrap();
    }
    assert!(matches!(
        vol.create_file("/d/overflow"),
        Err(FsError::OutOfSpace(_))
    ));
}

#[test]
fn remove_dir_requires_empty() {
    let mut vol = small_volume();
    vol.create_dir("/d").unwrap();
    vol.create_file("/d/child").unwrap();

    assert!(matches!(vol.remove_dir("/d"), Err(FsError::NotEmpty(_))));

    vol.remove_file("/d/child").unwrap();
    vol.remove_dir("/d").unwrap();
    assert!(matches!(vol.stat("/d"), Err(FsError::NotFound(_))));
    assert!(vol.read_dir("/").unwrap().is_empty());
}

#[test]
fn root_cannot_be_removed() {
    let mut vol = small_volume();
    assert!(vol.remove_dir("/").is_err());
    assert!(vol.stat("/").unwrap().is_directory);
}

#[test]
fn type_mismatches_are_rejected() {
    let mut vol = small_volume();
    vol.create_file("/file").unwrap();
    vol.create_dir("/dir").unwrap();

    assert!(matches!(
        vol.read("/dir", 0, 1),
        Err(FsError::IsADirectory(_))
    ));
    assert!(matches!(
        vol.write("/dir", 0, b"x"),
        Err(FsError::IsADirectory(_))
    ));
    assert!(matches!(
        vol.remove_file("/dir"),
        Err(FsError::IsADirectory(_))
    ));
    assert!(matches!(
        vol.truncate("/dir", 0),
        Err(FsError::IsADirectory(_))
    ));
    assert!(matches!(
        vol.remove_dir("/file"),
        Err(FsError::NotADirectory(_))
    ));
    assert!(matches!(
        vol.read_dir("/file"),
        Err(FsError::NotADirectory(_))
    ));
    // A file in the middle of a path cannot be traversed.
    assert!(matches!(
        vol.create_file("/file/inner"),
        Err(FsError::NotADirectory(_))
    ));
}

#[test]
fn missing_paths_report_not_found() {
    let mut vol = small_volume();
    assert!(matches!(vol.stat("/nope"), Err(FsError::NotFound(_))));
    assert!(matches!(
        vol.read("/nope", 0, 1),
        Err(FsError::NotFound(_))
    ));
    assert!(matches!(
        vol.create_file("/nodir/f"),
        Err(FsError::NotFound(_))
    ));
    // A name that cannot exist on disk looks absent, not invalid.
    assert!(matches!(vol.stat("/bad*name"), Err(FsError::NotFound(_))));
    // But creating one surfaces the name problem.
    assert!(matches!(
        vol.create_file("/bad*name"),
        Err(FsError::InvalidName(_))
    ));
}

#[test]
fn volume_out_of_space_mutates_nothing() {
    let mut vol = small_volume();
    vol.create_file("/big").unwrap();
    vol.write("/big", 0, &pattern(1000)).unwrap();

    // 319 clusters of 512 bytes on this volume; ask for far more.
    let huge = vec![0x5Au8; 319 * 512 + 512];
    assert!(matches!(
        vol.write("/big", 1000, &huge),
        Err(FsError::OutOfSpace(_))
    ));

    // The failed write allocated nothing and the file is unchanged.
    assert_eq!(vol.stat("/big").unwrap().size, 1000);
    let first = vol.find_entry("/big").unwrap().entry.first_cluster;
    assert_eq!(vol.cluster_chain(first).unwrap().len(), 2);
    assert_eq!(vol.read("/big", 0, 1000).unwrap(), pattern(1000));
}

#[test]
fn freed_clusters_are_reusable() {
    let mut vol = small_volume();
    vol.create_file("/a").unwrap();
    // Fill the whole data region.
    vol.write("/a", 0, &vec![1u8; 319 * 512]).unwrap();
    assert!(matches!(
        vol.write("/a", 319 * 512, b"x"),
        Err(FsError::OutOfSpace(_))
    ));

    // Freeing makes the space allocatable again, including after the
    // allocator's cursor has wrapped.
    vol.remove_file("/a").unwrap();
    vol.create_file("/b").unwrap();
    vol.write("/b", 0, &vec![2u8; 319 * 512]).unwrap();
    assert_eq!(vol.stat("/b").unwrap().size, 319 * 512);
}

#[test]
fn distinct_files_get_disjoint_chains() {
    let mut vol = small_volume();
    vol.create_file("/a").unwrap();
    vol.create_file("/b").unwrap();
    vol.write("/a", 0, &pattern(1500)).unwrap();
    vol.write("/b", 0, &pattern(1500)).unwrap();

    let a_first = vol.find_entry("/a").unwrap().entry.first_cluster;
    let b_first = vol.find_entry("/b").unwrap().entry.first_cluster;
    let a_chain = vol.cluster_chain(a_first).unwrap();
    let b_chain = vol.cluster_chain(b_first).unwrap();

    assert_eq!(a_chain.len(), 3);
    assert_eq!(b_chain.len(), 3);
    assert!(a_chain.iter().all(|c| !b_chain.contains(c)));

    assert_eq!(vol.read("/a", 0, 1500).unwrap(), pattern(1500));
    assert_eq!(vol.read("/b", 0, 1500).unwrap(), pattern(1500));
}

#[test]
fn set_times_round_trips() {
    let mut vol = small_volume();
    vol.create_file("/f").unwrap();

    // Even second: representable exactly in the 2-second time field.
    let modified = UNIX_EPOCH + Duration::from_secs(1_600_000_000);
    // Midnight UTC: the access stamp keeps only the date.
    let accessed = UNIX_EPOCH + Duration::from_secs(1_600_041_600);
    vol.set_times("/f", accessed, modified).unwrap();

    let attrs = vol.stat("/f").unwrap();
    assert_eq!(attrs.modified, modified);
    assert_eq!(attrs.accessed, accessed);
}

#[test]
fn set_times_on_root_updates_synthesized_attrs() {
    let mut vol = small_volume();
    let t = UNIX_EPOCH + Duration::from_secs(1_600_000_000);
    vol.set_times("/", t, t).unwrap();

    let root = vol.stat("/").unwrap();
    assert_eq!(root.modified, t);
    assert_eq!(root.accessed, t);
}

#[test]
fn file_backed_image_round_trip() {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fat16.img");

    let params = BootParams {
        bytes_per_sector: 512,
        sectors_per_cluster: 1,
        reserved_sectors: 1,
        num_fats: 2,
        root_entries: 16,
        total_sectors: 325,
        sectors_per_fat: 2,
    };
    let mut dev = FileDevice::create(&path, 512, 325).unwrap();
    format_volume(&mut dev, &params).unwrap();

    let mut vol = Fat16Volume::mount(dev).unwrap();
    vol.create_file("/disk.txt").unwrap();
    vol.write("/disk.txt", 0, b"on real storage").unwrap();
    drop(vol);

    // Reopen the image from scratch.
    let dev = FileDevice::open(&path, 512).unwrap();
    let mut vol = Fat16Volume::mount(dev).unwrap();
    assert_eq!(vol.read("/disk.txt", 0, 15).unwrap(), b"on real storage");
}

#[test]
fn state_survives_remount() {
    let mut vol = small_volume();
    vol.create_dir("/d").unwrap();
    vol.create_file("/d/keep.txt").unwrap();
    vol.write("/d/keep.txt", 0, &pattern(600)).unwrap();

    // Everything lives on the device, not in the handle.
    let dev = vol.into_device();
    let mut vol = Fat16Volume::mount(dev).unwrap();

    assert_eq!(vol.read_dir("/d").unwrap(), vec!["KEEP.TXT"]);
    assert_eq!(vol.read("/d/keep.txt", 0, 600).unwrap(), pattern(600));

    let now = SystemTime::now();
    assert!(vol.stat("/").unwrap().modified <= now);
}
