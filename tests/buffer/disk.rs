use std::path::Path;
use std::sync::Arc;

use clockpool::error::{Error, Result};
use clockpool::storage::file::{DiskFile, File, FileRef};
use clockpool::storage::page::Page;
use tempfile::tempdir;

fn create(path: &Path) -> Result<(Arc<DiskFile>, FileRef)> {
    let disk = Arc::new(DiskFile::create(path)?);
    let file: FileRef = disk.clone();
    Ok((disk, file))
}

fn open(path: &Path) -> Result<(Arc<DiskFile>, FileRef)> {
    let disk = Arc::new(DiskFile::open(path)?);
    let file: FileRef = disk.clone();
    Ok((disk, file))
}

fn stamp(page_no: u32) -> Vec<u8> {
    format!("stamp of page {}", page_no).into_bytes()
}

#[test]
fn test_round_trip_under_pressure() -> Result<()> {
    setup!(bpm, 4);
    let dir = tempdir()?;
    let path = dir.path().join("test.db");
    let (disk, file) = create(&path)?;

    // Scenario: write 20 pages through a pool of 4 frames, every page but the
    // last few gets evicted and written back on the way.
    let mut page_nos = vec![];
    for _ in 0..20 {
        let mut guard = bpm.new_page(&file)?;
        let data = stamp(guard.page_no());
        guard.write(|page| page[..data.len()].copy_from_slice(&data))?;
        page_nos.push(guard.page_no());
    }
    assert!(disk.stats()?.writes >= 16);
    assert_eq!(0, disk.stats()?.reads);

    // Scenario: fetching them back returns the written content.
    for &page_no in &page_nos {
        let guard = bpm.fetch_page(&file, page_no)?;
        let data = stamp(page_no);
        assert_eq!(data, guard.read(|page| page[..data.len()].to_vec())?);
    }
    teardown!(bpm);
    Ok(())
}

#[test]
fn test_persist_across_reopen() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("test.db");
    let page_nos = {
        setup!(bpm, 3);
        let (disk, file) = create(&path)?;
        let mut page_nos = vec![];
        for _ in 0..5 {
            let mut guard = bpm.new_page(&file)?;
            let data = stamp(guard.page_no());
            guard.write(|page| page[..data.len()].copy_from_slice(&data))?;
            page_nos.push(guard.page_no());
        }
        bpm.flush_file(&file)?;
        assert_eq!(0, bpm.resident_pages()?);
        disk.sync()?;
        teardown!(bpm);
        page_nos
    };

    setup!(bpm, 3);
    let (_disk, file) = open(&path)?;
    for &page_no in page_nos.iter().rev() {
        let guard = bpm.fetch_page(&file, page_no)?;
        let data = stamp(page_no);
        assert_eq!(data, guard.read(|page| page[..data.len()].to_vec())?);
    }
    teardown!(bpm);
    Ok(())
}

#[test]
fn test_drop_writes_back() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("test.db");
    let page_no = {
        setup!(bpm, 2);
        let (_disk, file) = create(&path)?;
        let mut guard = bpm.new_page(&file)?;
        guard.write(|page| page[..4].copy_from_slice(b"kept"))?;
        let page_no = guard.page_no();
        drop(guard);
        // dropping the manager flushes the dirty page.
        drop(bpm);
        page_no
    };

    let (_disk, file) = open(&path)?;
    let mut page = Page::new();
    file.read_page(page_no, &mut page)?;
    assert_eq!(b"kept", &page.as_ref()[..4]);
    Ok(())
}

#[test]
fn test_dispose_and_reuse() -> Result<()> {
    setup!(bpm, 2);
    let dir = tempdir()?;
    let path = dir.path().join("test.db");
    let (disk, file) = create(&path)?;

    let guard = bpm.new_page(&file)?;
    let disposed = guard.page_no();
    guard.unpin()?;
    let keep = bpm.new_page(&file)?;

    bpm.dispose_page(&file, disposed)?;
    assert_eq!(1, bpm.resident_pages()?);
    assert!(matches!(bpm.fetch_page(&file, disposed), Err(Error::Io(_))));

    // the disposed page number comes back zeroed.
    let reused = bpm.new_page(&file)?;
    assert_eq!(disposed, reused.page_no());
    assert!(reused.read(|page| page.iter().all(|&b| b == 0))?);
    assert_eq!(3, disk.page_count()?);

    drop(keep);
    drop(reused);
    teardown!(bpm);
    Ok(())
}

#[test]
fn test_flush_file_with_pinned_page() -> Result<()> {
    setup!(bpm, 3);
    let dir = tempdir()?;
    let path = dir.path().join("test.db");
    let (disk, file) = create(&path)?;

    let mut first = bpm.new_page(&file)?;
    first.mark_dirty();
    first.unpin()?;
    let pinned = bpm.new_page(&file)?;
    let mut last = bpm.new_page(&file)?;
    last.mark_dirty();
    last.unpin()?;
    let writes = disk.stats()?.writes;

    let res = bpm.flush_file(&file);
    assert_eq!(Err(Error::PagePinned { file: file.id(), page_no: pinned.page_no() }), res);
    // the page in front of the pinned one is flushed and evicted.
    assert_eq!(writes + 1, disk.stats()?.writes);
    assert_eq!(2, bpm.resident_pages()?);

    drop(pinned);
    bpm.flush_file(&file)?;
    assert_eq!(writes + 2, disk.stats()?.writes);
    assert_eq!(0, bpm.resident_pages()?);
    teardown!(bpm);
    Ok(())
}
