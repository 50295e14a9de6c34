use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use clockpool::error::{Error, Result};
use clockpool::storage::buffer::{BufferPoolManager, PageGuard};
use clockpool::storage::file::{FileRef, MemoryFile};
use clockpool::storage::page::PageNo;
use log::debug;
use rand::seq::SliceRandom;
use rand::Rng;

/// Expected content of every live page, keyed by file index and page number.
type Model = HashMap<(usize, PageNo), Vec<u8>>;

fn content(guard: &PageGuard, len: usize) -> Result<Vec<u8>> {
    guard.read(|page| page[..len].to_vec())
}

fn write_stamp(guard: &mut PageGuard, file_idx: usize, step: usize) -> Result<Vec<u8>> {
    let stamp = format!("{}/{}/{}", file_idx, guard.page_no(), step).into_bytes();
    guard.write(|page| {
        page[..32].fill(0);
        page[..stamp.len()].copy_from_slice(&stamp);
    })?;
    Ok(stamp)
}

/// Check what can be checked from the outside: the pool is consistent, and
/// the pins are exactly the ones held by guards.
fn check_pins(bpm: &BufferPoolManager, held: &[(usize, PageGuard)]) -> Result<()> {
    bpm.check_invariants()?;
    let stats = bpm.frame_stats()?;
    let total: u32 = stats.iter().map(|s| s.pin_count).sum();
    assert_eq!(held.len() as u32, total);
    for (_, guard) in held {
        let stat = &stats[guard.frame_id()];
        assert!(stat.valid);
        assert_eq!(Some(guard.page_no()), stat.page_no);
        assert_eq!(Some(guard.file().id()), stat.file);
    }
    Ok(())
}

fn pinned_frames(held: &[(usize, PageGuard)]) -> usize {
    held.iter().map(|(_, g)| g.frame_id()).collect::<HashSet<_>>().len()
}

#[test]
fn test_random_workload() -> Result<()> {
    let pool_size = 8;
    setup!(bpm, pool_size);
    let files: Vec<FileRef> = (0..2).map(|_| Arc::new(MemoryFile::new()) as FileRef).collect();
    let mut model: Model = HashMap::new();
    let mut held: Vec<(usize, PageGuard)> = vec![];
    let mut rng = rand::thread_rng();

    for step in 0..3000 {
        let file_idx = rng.gen_range(0..files.len());
        let file = &files[file_idx];
        match rng.gen_range(0..10) {
            // allocate a new page.
            0..=1 => match bpm.new_page(file) {
                Ok(mut guard) => {
                    let stamp = write_stamp(&mut guard, file_idx, step)?;
                    model.insert((file_idx, guard.page_no()), stamp);
                    if rng.gen_bool(0.5) {
                        held.push((file_idx, guard));
                    }
                }
                Err(Error::CapacityExhausted(n)) => {
                    assert_eq!(pool_size, n);
                    assert_eq!(pool_size, pinned_frames(&held));
                }
                Err(err) => return Err(err),
            },
            // fetch a known page, check it and maybe update it.
            2..=5 => {
                let keys = model.keys().filter(|k| k.0 == file_idx).copied().collect::<Vec<_>>();
                let Some(&(_, page_no)) = keys.choose(&mut rng) else { continue };
                match bpm.fetch_page(file, page_no) {
                    Ok(mut guard) => {
                        let expected = &model[&(file_idx, page_no)];
                        assert_eq!(*expected, content(&guard, expected.len())?);
                        if rng.gen_bool(0.3) {
                            let stamp = write_stamp(&mut guard, file_idx, step)?;
                            model.insert((file_idx, page_no), stamp);
                        }
                        if rng.gen_bool(0.3) {
                            held.push((file_idx, guard));
                        }
                    }
                    Err(Error::CapacityExhausted(_)) => {
                        assert_eq!(pool_size, pinned_frames(&held));
                    }
                    Err(err) => return Err(err),
                }
            }
            // release a held page.
            6..=7 => {
                if !held.is_empty() {
                    let i = rng.gen_range(0..held.len());
                    let (_, guard) = held.swap_remove(i);
                    guard.unpin()?;
                }
            }
            // dispose a page nobody holds.
            8 => {
                let busy = held
                    .iter()
                    .filter(|(i, _)| *i == file_idx)
                    .map(|(_, g)| g.page_no())
                    .collect::<HashSet<_>>();
                let keys = model
                    .keys()
                    .filter(|k| k.0 == file_idx && !busy.contains(&k.1))
                    .copied()
                    .collect::<Vec<_>>();
                if let Some(&(_, page_no)) = keys.choose(&mut rng) {
                    bpm.dispose_page(file, page_no)?;
                    model.remove(&(file_idx, page_no));
                }
            }
            // flush the whole file.
            _ => {
                let res = bpm.flush_file(file);
                if held.iter().any(|(i, _)| *i == file_idx) {
                    assert!(matches!(res, Err(Error::PagePinned { .. })));
                } else {
                    res?;
                    let stats = bpm.frame_stats()?;
                    assert!(stats.iter().all(|s| s.file != Some(file.id())));
                }
            }
        }
        check_pins(&bpm, &held)?;
        if step % 500 == 0 {
            let dump = bpm.dump()?;
            debug!("step {}: {} live pages, {} held\n{}", step, model.len(), held.len(), dump);
        }
    }

    for (_, guard) in held.drain(..) {
        guard.unpin()?;
    }
    // everything written survives a full flush and refetch.
    for file in &files {
        bpm.flush_file(file)?;
        assert!(bpm.frame_stats()?.iter().all(|s| s.file != Some(file.id())));
    }
    for (&(file_idx, page_no), expected) in &model {
        let guard = bpm.fetch_page(&files[file_idx], page_no)?;
        assert_eq!(*expected, content(&guard, expected.len())?);
    }
    teardown!(bpm);
    Ok(())
}
