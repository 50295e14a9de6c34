use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use super::frame::FrameId;
use crate::error::{Error, Result};
use crate::storage::file::FileId;
use crate::storage::page::PageNo;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Entry {
    file: FileId,
    page_no: PageNo,
    frame_id: FrameId,
}

/// Number of directory slots for a pool with the given number of frames.
/// The table is always strictly larger than the pool, so a directory that
/// never holds more entries than there are frames can't fill up.
pub fn table_size(pool_size: usize) -> usize {
    pool_size * 6 / 5 + 1
}

/// Page directory maps a (file, page number) pair to the frame holding
/// that page.
///
/// It is a fixed-size open addressing hash table with linear probing.
/// Removal shifts the following entries of the probe sequence back into
/// the hole instead of leaving tombstones, so lookups can stop at the
/// first empty slot.
#[derive(Debug)]
pub struct PageDirectory {
    slots: Vec<Option<Entry>>,
    len: usize,
}

impl PageDirectory {
    /// Create a directory sized for a pool with the given number of frames.
    pub fn new(pool_size: usize) -> Self {
        Self::with_slots(table_size(pool_size))
    }

    pub fn with_slots(size: usize) -> Self {
        assert!(size > 0, "page directory needs at least one slot");
        PageDirectory { slots: vec![None; size], len: 0 }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Return the frame holding the given page, None if it is absent.
    pub fn lookup(&self, file: FileId, page_no: PageNo) -> Option<FrameId> {
        self.find(file, page_no).and_then(|i| self.slots[i]).map(|e| e.frame_id)
    }

    /// Link the given page to a frame. Inserting a key that is present
    /// already or inserting into a full table fails with a directory error.
    pub fn insert(&mut self, file: FileId, page_no: PageNo, frame_id: FrameId) -> Result<()> {
        let cap = self.capacity();
        let mut i = self.home(file, page_no);
        for _ in 0..cap {
            match self.slots[i] {
                None => {
                    self.slots[i] = Some(Entry { file, page_no, frame_id });
                    self.len += 1;
                    return Ok(());
                }
                Some(e) if e.file == file && e.page_no == page_no => {
                    return Err(Error::Directory(format!(
                        "page {} of file {} is mapped to frame {} already",
                        page_no, file, e.frame_id
                    )));
                }
                Some(_) => i = (i + 1) % cap,
            }
        }
        Err(Error::Directory(format!("table is full with {} entries", self.len)))
    }

    /// Unlink the given page, return the frame it was mapped to. Removing
    /// an absent key does nothing.
    pub fn remove(&mut self, file: FileId, page_no: PageNo) -> Option<FrameId> {
        let cap = self.capacity();
        let i = self.find(file, page_no)?;
        let removed = self.slots[i].take()?;
        self.len -= 1;

        // shift back the entries of the probe run following the hole
        // whenever the hole lies between their home slot and where they are.
        let mut hole = i;
        let mut j = (i + 1) % cap;
        while let Some(e) = self.slots[j] {
            let home = self.home(e.file, e.page_no);
            if distance(home, hole, cap) < distance(home, j, cap) {
                self.slots[hole] = self.slots[j].take();
                hole = j;
            }
            j = (j + 1) % cap;
        }
        Some(removed.frame_id)
    }

    /// Iterate over all (file, page number, frame) mappings.
    pub fn entries(&self) -> impl Iterator<Item = (FileId, PageNo, FrameId)> + '_ {
        self.slots.iter().flatten().map(|e| (e.file, e.page_no, e.frame_id))
    }

    fn find(&self, file: FileId, page_no: PageNo) -> Option<usize> {
        let cap = self.capacity();
        let mut i = self.home(file, page_no);
        for _ in 0..cap {
            match self.slots[i] {
                None => return None,
                Some(e) if e.file == file && e.page_no == page_no => return Some(i),
                Some(_) => i = (i + 1) % cap,
            }
        }
        None
    }

    fn home(&self, file: FileId, page_no: PageNo) -> usize {
        // DefaultHasher::new() uses fixed keys, so slot positions are
        // deterministic across runs.
        let mut hasher = DefaultHasher::new();
        file.hash(&mut hasher);
        page_no.hash(&mut hasher);
        (hasher.finish() % self.capacity() as u64) as usize
    }
}

/// Forward distance from slot `from` to slot `to` on a ring of `cap` slots.
fn distance(from: usize, to: usize, cap: usize) -> usize {
    (to + cap - from) % cap
}
