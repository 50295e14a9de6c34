use std::collections::BTreeMap;
use std::sync::Mutex;

use super::{File, FileId, IoStats};
use crate::error::{Error, Result};
use crate::storage::page::{Page, PageNo};

/// A paged file kept entirely in memory. Useful as a scratch file and for
/// exercising the buffer pool without touching the disk.
#[derive(Debug)]
pub struct MemoryFile {
    id: FileId,
    inner: Mutex<MemoryInner>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    /// allocated pages, disposed pages are removed.
    pages: BTreeMap<PageNo, Page>,
    /// disposed page numbers, reused by allocate_page.
    free: Vec<PageNo>,
    next_page_no: PageNo,
    stats: IoStats,
}

impl MemoryFile {
    pub fn new() -> MemoryFile {
        MemoryFile { id: FileId::new(), inner: Mutex::new(MemoryInner::default()) }
    }

    /// Number of allocated pages.
    pub fn page_count(&self) -> Result<usize> {
        let inner = self.inner.lock()?;
        Ok(inner.pages.len())
    }

    fn unallocated(&self, page_no: PageNo) -> Error {
        Error::Io(format!("page {} of file {} is not allocated", page_no, self.id))
    }
}

impl Default for MemoryFile {
    fn default() -> Self {
        MemoryFile::new()
    }
}

impl File for MemoryFile {
    fn id(&self) -> FileId {
        self.id
    }

    fn read_page(&self, page_no: PageNo, page: &mut Page) -> Result<()> {
        let mut inner = self.inner.lock()?;
        let stored = inner.pages.get(&page_no).ok_or_else(|| self.unallocated(page_no))?;
        page.copy_from(stored);
        inner.stats.reads += 1;
        Ok(())
    }

    fn write_page(&self, page_no: PageNo, page: &Page) -> Result<()> {
        let mut inner = self.inner.lock()?;
        let stored = inner.pages.get_mut(&page_no).ok_or_else(|| self.unallocated(page_no))?;
        stored.copy_from(page);
        inner.stats.writes += 1;
        Ok(())
    }

    fn allocate_page(&self) -> Result<PageNo> {
        let mut inner = self.inner.lock()?;
        let page_no = match inner.free.pop() {
            Some(page_no) => page_no,
            None => {
                let page_no = inner.next_page_no;
                inner.next_page_no = page_no
                    .checked_add(1)
                    .ok_or_else(|| Error::Io(format!("file {} is full", self.id)))?;
                page_no
            }
        };
        inner.pages.insert(page_no, Page::new());
        inner.stats.allocations += 1;
        Ok(page_no)
    }

    fn dispose_page(&self, page_no: PageNo) -> Result<()> {
        let mut inner = self.inner.lock()?;
        if inner.pages.remove(&page_no).is_none() {
            return Err(self.unallocated(page_no));
        }
        inner.free.push(page_no);
        inner.stats.disposals += 1;
        Ok(())
    }

    fn stats(&self) -> Result<IoStats> {
        let inner = self.inner.lock()?;
        Ok(inner.stats)
    }
}
