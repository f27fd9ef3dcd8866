// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 shmsync contributors
//
// File-backed mappings and locked access to them.

#![cfg(unix)]

use shmsync::{Error, MappedRegion, Mutex, ScopedAccess};

fn map_file(dir: &tempfile::TempDir, name: &str, len: usize) -> MappedRegion {
    MappedRegion::create(dir.path().join(name), len).expect("create region")
}

#[test]
fn create_maps_zeroed_file() {
    let dir = tempfile::tempdir().unwrap();
    let region = map_file(&dir, "zeroed.memory", 4096);

    assert_eq!(region.len(), 4096);
    assert!(!region.is_empty());
    assert_eq!(region.path(), dir.path().join("zeroed.memory"));

    let bytes = unsafe { std::slice::from_raw_parts(region.as_ptr(), region.len()) };
    assert!(bytes.iter().all(|&b| b == 0));
}

#[test]
fn create_rejects_zero_size() {
    let dir = tempfile::tempdir().unwrap();
    assert!(MappedRegion::create(dir.path().join("empty.memory"), 0).is_err());
}

#[test]
fn create_never_shrinks_existing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("grow.memory");

    drop(MappedRegion::create(&path, 8192).expect("create large"));
    let small = MappedRegion::create(&path, 1024).expect("create small");
    assert_eq!(small.len(), 1024);
    assert_eq!(std::fs::metadata(&path).unwrap().len(), 8192);
}

#[test]
fn open_sees_writes_through_another_mapping() {
    let dir = tempfile::tempdir().unwrap();
    let writer = map_file(&dir, "shared.memory", 1024);
    let reader = MappedRegion::open(writer.path()).expect("open");
    assert_eq!(reader.len(), 1024);
    assert_ne!(writer.as_ptr(), reader.as_ptr());

    let msg = b"hello from rust";
    unsafe { std::ptr::copy_nonoverlapping(msg.as_ptr(), writer.as_mut_ptr().add(10), msg.len()) };
    writer.flush().expect("flush");

    let seen = unsafe { std::slice::from_raw_parts(reader.as_ptr().add(10), msg.len()) };
    assert_eq!(seen, msg);
}

#[test]
fn open_rejects_missing_and_empty_files() {
    let dir = tempfile::tempdir().unwrap();
    assert!(MappedRegion::open(dir.path().join("missing.memory")).is_err());

    let empty = dir.path().join("empty.memory");
    std::fs::File::create(&empty).unwrap();
    assert!(MappedRegion::open(&empty).is_err());
}

#[test]
fn scoped_access_write_read() {
    let dir = tempfile::tempdir().unwrap();
    let region = map_file(&dir, "scoped.memory", 4096);
    let mtx = Mutex::new().expect("mutex");

    {
        let mut access = ScopedAccess::new(&region, &mtx).expect("scoped access");
        assert_eq!(access.size(), 4096);
        access.write_at(64, b"scoped data").expect("write");
        assert_eq!(access.read_at(64, 11).unwrap(), b"scoped data");

        // The guard holds the lock.
        assert!(matches!(mtx.lock(), Err(Error::SelfDeadlock)));
    }

    // Released on drop.
    mtx.try_lock().expect("lock released by guard");
    mtx.unlock().unwrap();
}

#[test]
fn scoped_access_cstr_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let region = map_file(&dir, "cstr.memory", 256);
    let mtx = Mutex::new().expect("mutex");

    let mut access = ScopedAccess::with_timeout(&region, &mtx, 1000).expect("scoped access");
    access.write_cstr_at(100, b"Hello Friend").expect("write");
    assert_eq!(access.read_cstr_at(100).unwrap(), b"Hello Friend");
    assert_eq!(access.read_at(112, 1).unwrap(), &[0u8]);

    // Without a terminator the read stops at the end of the mapping.
    access.write_at(250, b"abcdef").expect("write tail");
    assert_eq!(access.read_cstr_at(250).unwrap(), b"abcdef");
}

#[test]
fn scoped_access_reads_after_write_see_new_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let region = map_file(&dir, "rewrite.memory", 64);
    let mtx = Mutex::new().expect("mutex");
    let mut access = ScopedAccess::new(&region, &mtx).expect("scoped access");

    access.write_at(0, b"abcd").expect("write");
    let before = access.read_at(0, 4).unwrap().to_vec();
    access.write_at(0, b"wxyz").expect("overwrite");

    assert_eq!(before, b"abcd");
    assert_eq!(access.read_at(0, 4).unwrap(), b"wxyz");
}

#[test]
fn scoped_access_bounds_are_checked() {
    let dir = tempfile::tempdir().unwrap();
    let region = map_file(&dir, "bounds.memory", 128);
    let mtx = Mutex::new().expect("mutex");
    let mut access = ScopedAccess::new(&region, &mtx).expect("scoped access");

    let err = access.write_at(120, &[1; 16]).unwrap_err();
    assert!(matches!(
        err,
        Error::OutOfBounds {
            offset: 120,
            len: 16,
            size: 128
        }
    ));
    assert!(access.read_at(0, 129).is_err());
    assert!(access.read_at(usize::MAX, 2).is_err());
    assert!(access.read_cstr_at(200).is_err());
    // Room for the bytes but not the terminator.
    assert!(access.write_cstr_at(124, b"abcd").is_err());
    access.write_cstr_at(123, b"abcd").expect("exact fit");
}

#[cfg(target_os = "linux")]
#[test]
fn mutex_in_two_mappings_of_one_file() {
    let dir = tempfile::tempdir().unwrap();
    let first = map_file(&dir, "twice.memory", 4096);
    let second = MappedRegion::open(first.path()).expect("second mapping");

    let a = unsafe { Mutex::attach(first.as_mut_ptr()) }.expect("attach first");
    let b = unsafe { Mutex::attach(second.as_mut_ptr()) }.expect("attach second");
    assert_eq!(b.attachments(), 2);

    a.lock().expect("lock through first");
    std::thread::scope(|s| {
        s.spawn(|| assert!(b.try_lock().unwrap_err().is_busy()));
    });
    a.unlock().expect("unlock");

    drop(a);
    drop(b);
}

#[test]
fn scoped_access_with_timeout_gives_up() {
    let dir = tempfile::tempdir().unwrap();
    let region = map_file(&dir, "timeout.memory", 64);
    let mtx = Mutex::new().expect("mutex");

    mtx.lock().expect("lock");
    std::thread::scope(|s| {
        s.spawn(|| {
            let err = ScopedAccess::with_timeout(&region, &mtx, 50).err().expect("must time out");
            assert!(err.is_timeout());
        });
    });
    mtx.unlock().expect("unlock");
}
