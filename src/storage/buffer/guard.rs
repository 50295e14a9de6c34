use std::fmt::{Debug, Formatter};
use std::sync::{Arc, Mutex};

use log::warn;

use super::bufferpool::BufferPool;
use super::frame::FrameId;
use crate::error::Result;
use crate::storage::file::FileRef;
use crate::storage::page::PageNo;

/// A pinned page of the buffer pool.
///
/// The guard holds one pin on its page, the page can't be evicted while the
/// guard is alive. Dropping the guard unpins the page, marking it dirty if it
/// was written through the guard. Use [`PageGuard::unpin`] to see whether
/// unpinning succeeded.
///
/// The page bytes are only reachable through closures run with the buffer
/// pool latched, the closures must not call back into the buffer pool.
pub struct PageGuard {
    pool: Arc<Mutex<BufferPool>>,
    file: FileRef,
    page_no: PageNo,
    frame_id: FrameId,
    dirty: bool,
    pinned: bool,
}

impl PageGuard {
    pub(crate) fn new(
        pool: Arc<Mutex<BufferPool>>,
        file: FileRef,
        page_no: PageNo,
        frame_id: FrameId,
    ) -> Self {
        PageGuard { pool, file, page_no, frame_id, dirty: false, pinned: true }
    }

    pub fn page_no(&self) -> PageNo {
        self.page_no
    }

    pub fn file(&self) -> &FileRef {
        &self.file
    }

    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    /// Whether the page will be marked dirty when unpinned.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Run `f` over the page content.
    pub fn read<R>(&self, f: impl FnOnce(&[u8]) -> R) -> Result<R> {
        let pool = self.pool.lock()?;
        let page = pool.page(self.file.id(), self.page_no, self.frame_id)?;
        Ok(f(page.as_ref()))
    }

    /// Run `f` over the mutable page content, the page gets marked dirty.
    pub fn write<R>(&mut self, f: impl FnOnce(&mut [u8]) -> R) -> Result<R> {
        let mut pool = self.pool.lock()?;
        let page = pool.page_mut(self.file.id(), self.page_no, self.frame_id)?;
        self.dirty = true;
        Ok(f(page.as_mut()))
    }

    /// Give the pin back to the buffer pool.
    pub fn unpin(mut self) -> Result<()> {
        self.release()
    }

    fn release(&mut self) -> Result<()> {
        if !self.pinned {
            return Ok(());
        }
        self.pinned = false;
        let mut pool = self.pool.lock()?;
        pool.unpin_page(&self.file, self.page_no, self.dirty)
    }
}

impl Drop for PageGuard {
    fn drop(&mut self) {
        if let Err(err) = self.release() {
            warn!("failed to unpin page {} of file {}: {}", self.page_no, self.file.id(), err);
        }
    }
}

impl Debug for PageGuard {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageGuard")
            .field("file", &self.file.id())
            .field("page_no", &self.page_no)
            .field("frame_id", &self.frame_id)
            .field("dirty", &self.dirty)
            .finish()
    }
}
