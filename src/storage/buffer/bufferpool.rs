use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex};

use log::{debug, trace, warn};

use super::directory::PageDirectory;
use super::frame::{Frame, FrameId};
use super::guard::PageGuard;
use super::replacer::{ClockReplacer, Replacer};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::storage::file::{FileId, FileRef};
use crate::storage::page::{Page, PageNo};

/// Snapshot of a frame's metadata, for diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameStat {
    pub frame_id: FrameId,
    pub file: Option<FileId>,
    pub page_no: Option<PageNo>,
    pub valid: bool,
    pub dirty: bool,
    pub referenced: bool,
    pub pin_count: u32,
}

/// The buffer pool is responsible for moving physical pages back and forth
/// from main memory to disk. It allows a DBMS to support databases that are
/// larger than the amount of memory available to the system.
///
/// The buffer pool's operations are transparent to other parts in the system.
/// For example, the system asks the buffer pool for a page using its file and
/// page number and it does not know whether that page is already in memory or
/// whether the system has to read it from the file.
///
/// The pool itself is single threaded, see [`BufferPoolManager`] for the
/// shareable wrapper.
pub(crate) struct BufferPool {
    pool_size: usize,
    /// frame table, use the array index as FrameId, i.e., the FrameId
    /// is in range: [0, pool_size).
    frames: Vec<Frame>,
    /// page storage, pages[i] holds the page described by frames[i].
    pages: Vec<Page>,
    /// page directory for keeping track of resident pages.
    directory: PageDirectory,
    /// Replacer to find unpinned frames for replacement.
    replacer: Box<dyn Replacer + Send>,
}

impl BufferPool {
    pub(crate) fn new(pool_size: usize) -> Result<Self> {
        if pool_size == 0 {
            return Err(Error::Value("buffer pool size must be positive".to_string()));
        }
        let frames = (0..pool_size).map(Frame::new).collect();
        let pages = (0..pool_size).map(|_| Page::new()).collect();
        let directory = PageDirectory::new(pool_size);
        let replacer = Box::new(ClockReplacer::new(pool_size));
        Ok(BufferPool { pool_size, frames, pages, directory, replacer })
    }

    /// Pick a frame for a new resident page with the replacer. If the frame
    /// holds a page, write it back to its file when it is dirty, unlink it
    /// from the directory and reset the frame.
    ///
    /// A failed write back leaves the victim resident and dirty.
    fn alloc_frame(&mut self) -> Result<FrameId> {
        let frame_id = self
            .replacer
            .victim(&mut self.frames)
            .ok_or(Error::CapacityExhausted(self.pool_size))?;
        let frame = &mut self.frames[frame_id];
        if !frame.valid {
            return Ok(frame_id);
        }

        let (owner, page_no) = match (&frame.owner, frame.page_no) {
            (Some(owner), Some(page_no)) => (Arc::clone(owner), page_no),
            _ => {
                return Err(Error::BadState(format!("valid frame {} has no page", frame_id)));
            }
        };
        if self.directory.lookup(owner.id(), page_no) != Some(frame_id) {
            return Err(Error::BadState(format!(
                "page {} of file {} in frame {} is not in the directory",
                page_no,
                owner.id(),
                frame_id
            )));
        }
        if frame.dirty {
            debug!("flushing page {} from frame {}", page_no, frame_id);
            owner.write_page(page_no, &self.pages[frame_id])?;
            frame.dirty = false;
        }
        debug!("evicting page {} of file {} from frame {}", page_no, owner.id(), frame_id);
        self.directory.remove(owner.id(), page_no);
        frame.release();
        Ok(frame_id)
    }

    /// Fetch the requested page from the buffer pool, read it from the file
    /// if it is not resident. Pins the page.
    pub(crate) fn fetch_page(&mut self, file: &FileRef, page_no: PageNo) -> Result<FrameId> {
        if let Some(frame_id) = self.directory.lookup(file.id(), page_no) {
            trace!("page {} of file {} found in frame {}", page_no, file.id(), frame_id);
            let frame = &mut self.frames[frame_id];
            frame.referenced = true;
            frame.pin_count += 1;
            return Ok(frame_id);
        }

        let frame_id = self.alloc_frame()?;
        // the frame is invalid from here on, so a failure below leaves
        // nothing to clean up.
        file.read_page(page_no, &mut self.pages[frame_id])?;
        self.directory.insert(file.id(), page_no, frame_id)?;
        self.frames[frame_id].install(file, page_no);
        Ok(frame_id)
    }

    /// Allocate a new page in the file and make it resident, zeroed and
    /// pinned, without reading it.
    ///
    /// The file level allocation is not undone if the buffer pool fails
    /// afterward.
    pub(crate) fn new_page(&mut self, file: &FileRef) -> Result<(PageNo, FrameId)> {
        let page_no = file.allocate_page()?;
        let frame_id = self.alloc_frame()?;
        self.pages[frame_id].clear();
        self.directory.insert(file.id(), page_no, frame_id)?;
        self.frames[frame_id].install(file, page_no);
        debug!("allocated page {} of file {} in frame {}", page_no, file.id(), frame_id);
        Ok((page_no, frame_id))
    }

    /// Unpin the target page. The dirty flag of the frame is or-ed with
    /// `is_dirty`.
    pub(crate) fn unpin_page(
        &mut self,
        file: &FileRef,
        page_no: PageNo,
        is_dirty: bool,
    ) -> Result<()> {
        let frame_id = self
            .directory
            .lookup(file.id(), page_no)
            .ok_or(Error::NotFound { file: file.id(), page_no })?;
        let frame = &mut self.frames[frame_id];
        if frame.pin_count == 0 {
            return Err(Error::NotPinned { file: file.id(), page_no });
        }
        frame.pin_count -= 1;
        frame.dirty |= is_dirty;
        Ok(())
    }

    /// Drop the page from the buffer pool if it is resident, then dispose it
    /// in the file.
    ///
    /// The pin count is not checked, callers must make sure nobody holds the
    /// page anymore.
    pub(crate) fn dispose_page(&mut self, file: &FileRef, page_no: PageNo) -> Result<()> {
        if let Some(frame_id) = self.directory.remove(file.id(), page_no) {
            let frame = &mut self.frames[frame_id];
            if frame.is_pinned() {
                warn!(
                    "disposing page {} of file {} with pin count {}",
                    page_no,
                    file.id(),
                    frame.pin_count
                );
            }
            frame.release();
        }
        debug!("disposing page {} of file {}", page_no, file.id());
        file.dispose_page(page_no)
    }

    /// Write back the dirty pages of the given file and drop all its pages
    /// from the buffer pool.
    ///
    /// Stop at the first pinned page. The frames visited before it stay
    /// flushed and evicted.
    pub(crate) fn flush_file(&mut self, file: &FileRef) -> Result<()> {
        let id = file.id();
        for frame_id in 0..self.pool_size {
            let frame = &mut self.frames[frame_id];
            if frame.owner_id() != Some(id) {
                continue;
            }
            let page_no = match frame.page_no {
                Some(page_no) if frame.valid => page_no,
                _ => {
                    return Err(Error::BadState(format!(
                        "invalid frame {} is owned by file {}",
                        frame_id, id
                    )));
                }
            };
            if frame.is_pinned() {
                return Err(Error::PagePinned { file: id, page_no });
            }
            if frame.dirty {
                debug!("flushing page {} from frame {}", page_no, frame_id);
                file.write_page(page_no, &self.pages[frame_id])?;
                frame.dirty = false;
            }
            self.directory.remove(id, page_no);
            frame.release();
        }
        Ok(())
    }

    /// Write the target page back regardless of the dirty flag and unset
    /// the dirty flag. The page stays resident.
    pub(crate) fn flush_page(&mut self, file: &FileRef, page_no: PageNo) -> Result<()> {
        let frame_id = self
            .directory
            .lookup(file.id(), page_no)
            .ok_or(Error::NotFound { file: file.id(), page_no })?;
        file.write_page(page_no, &self.pages[frame_id])?;
        self.frames[frame_id].dirty = false;
        Ok(())
    }

    /// Write back all the dirty pages in the buffer pool.
    pub(crate) fn flush_all_pages(&mut self) -> Result<()> {
        for frame in self.frames.iter_mut().filter(|f| f.valid && f.dirty) {
            if let (Some(owner), Some(page_no)) = (&frame.owner, frame.page_no) {
                debug!("flushing page {} from frame {}", page_no, frame.frame_id);
                owner.write_page(page_no, &self.pages[frame.frame_id])?;
                frame.dirty = false;
            }
        }
        Ok(())
    }

    /// Check the frame still holds the pinned page a guard refers to.
    fn check_pinned(&self, file: FileId, page_no: PageNo, frame_id: FrameId) -> Result<()> {
        match self.frames.get(frame_id) {
            Some(frame) if frame.holds(file, page_no) && frame.is_pinned() => Ok(()),
            _ => Err(Error::BadState(format!(
                "frame {} no longer holds pinned page {} of file {}",
                frame_id, page_no, file
            ))),
        }
    }

    pub(crate) fn page(&self, file: FileId, page_no: PageNo, frame_id: FrameId) -> Result<&Page> {
        self.check_pinned(file, page_no, frame_id)?;
        Ok(&self.pages[frame_id])
    }

    pub(crate) fn page_mut(
        &mut self,
        file: FileId,
        page_no: PageNo,
        frame_id: FrameId,
    ) -> Result<&mut Page> {
        self.check_pinned(file, page_no, frame_id)?;
        Ok(&mut self.pages[frame_id])
    }

    pub(crate) fn frame_stats(&self) -> Vec<FrameStat> {
        self.frames
            .iter()
            .map(|f| FrameStat {
                frame_id: f.frame_id,
                file: f.owner_id(),
                page_no: f.page_no,
                valid: f.valid,
                dirty: f.dirty,
                referenced: f.referenced,
                pin_count: f.pin_count,
            })
            .collect()
    }

    pub(crate) fn resident_pages(&self) -> usize {
        self.directory.len()
    }

    /// Verify the frame table and the directory agree with each other: the
    /// directory maps exactly the pages of the valid frames to their frame,
    /// and invalid frames carry no state.
    pub(crate) fn check_invariants(&self) -> Result<()> {
        let mut valid = 0;
        for frame in &self.frames {
            if !frame.valid {
                if frame.pin_count > 0 || frame.dirty || frame.owner.is_some() {
                    return Err(Error::BadState(format!(
                        "invalid frame {} carries state",
                        frame.frame_id
                    )));
                }
                continue;
            }
            valid += 1;
            let (file, page_no) = match (frame.owner_id(), frame.page_no) {
                (Some(file), Some(page_no)) => (file, page_no),
                _ => {
                    return Err(Error::BadState(format!(
                        "valid frame {} has no page",
                        frame.frame_id
                    )));
                }
            };
            if self.directory.lookup(file, page_no) != Some(frame.frame_id) {
                return Err(Error::BadState(format!(
                    "page {} of file {} in frame {} is not in the directory",
                    page_no, file, frame.frame_id
                )));
            }
        }
        if valid != self.directory.len() {
            return Err(Error::BadState(format!(
                "{} valid frames but {} directory entries",
                valid,
                self.directory.len()
            )));
        }
        for (file, page_no, frame_id) in self.directory.entries() {
            if !self.frames[frame_id].holds(file, page_no) {
                return Err(Error::BadState(format!(
                    "directory maps page {} of file {} to frame {} holding another page",
                    page_no, file, frame_id
                )));
            }
        }
        Ok(())
    }
}

impl Display for BufferPool {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "buffer pool: {} frames, {} resident", self.pool_size, self.directory.len())?;
        for frame in &self.frames {
            let prefix = hex::encode(&self.pages[frame.frame_id].as_ref()[..8]);
            write!(f, "{}\t{}\tpin_count: {}", frame.frame_id, prefix, frame.pin_count)?;
            let page = (frame.owner_id(), frame.page_no);
            if let (true, (Some(file), Some(page_no))) = (frame.valid, page) {
                write!(f, "\tvalid\tpage: {}/{}", file, page_no)?;
                if frame.dirty {
                    write!(f, "\tdirty")?;
                }
                if frame.referenced {
                    write!(f, "\treferenced")?;
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

impl Drop for BufferPool {
    /// Flush out all unwritten pages.
    fn drop(&mut self) {
        if let Err(err) = self.flush_all_pages() {
            warn!("failed to flush buffer pool on drop: {}", err);
        }
    }
}

/// Buffer pool manager wrap buffer pool with a mutex for concurrent access,
/// basically all the heavy lifting are happens in the buffer pool.
///
/// Pages are handed out as [`PageGuard`]s, a guard holds one pin on its page
/// and gives it back when it is dropped.
#[derive(Clone)]
pub struct BufferPoolManager {
    pool_size: usize,
    /// hold the actual buffer pool protected by a mutex latch.
    inner: Arc<Mutex<BufferPool>>,
}

impl BufferPoolManager {
    pub fn new(pool_size: usize) -> Result<Self> {
        let inner = BufferPool::new(pool_size)?;
        Ok(BufferPoolManager { pool_size, inner: Arc::new(Mutex::new(inner)) })
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        Self::new(cfg.pool_size)
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Fetch the requested page from the buffer pool, pinned.
    pub fn fetch_page(&self, file: &FileRef, page_no: PageNo) -> Result<PageGuard> {
        let mut inner = self.inner.lock()?;
        let frame_id = inner.fetch_page(file, page_no)?;
        Ok(PageGuard::new(Arc::clone(&self.inner), Arc::clone(file), page_no, frame_id))
    }

    /// Allocate a new page in the given file, pinned. The page is zeroed.
    pub fn new_page(&self, file: &FileRef) -> Result<PageGuard> {
        let mut inner = self.inner.lock()?;
        let (page_no, frame_id) = inner.new_page(file)?;
        Ok(PageGuard::new(Arc::clone(&self.inner), Arc::clone(file), page_no, frame_id))
    }

    /// Unpin the target page, marking it dirty if `is_dirty` is set.
    ///
    /// This is the low level counterpart of dropping a [`PageGuard`], it must
    /// not be used for pins a guard still holds.
    pub fn unpin_page(&self, file: &FileRef, page_no: PageNo, is_dirty: bool) -> Result<()> {
        let mut inner = self.inner.lock()?;
        inner.unpin_page(file, page_no, is_dirty)
    }

    /// Drop a page from the buffer pool and dispose it in its file.
    ///
    /// The pin count is not checked. Guards still referring to the page see
    /// a [`Error::BadState`] on access.
    pub fn dispose_page(&self, file: &FileRef, page_no: PageNo) -> Result<()> {
        let mut inner = self.inner.lock()?;
        inner.dispose_page(file, page_no)
    }

    /// Write back and evict all the pages of the given file. Fails with
    /// [`Error::PagePinned`] on the first pinned page of the file, the pages
    /// met before it stay flushed and evicted.
    pub fn flush_file(&self, file: &FileRef) -> Result<()> {
        let mut inner = self.inner.lock()?;
        inner.flush_file(file)
    }

    /// Flush the target page to its file regardless of the dirty flag.
    pub fn flush_page(&self, file: &FileRef, page_no: PageNo) -> Result<()> {
        let mut inner = self.inner.lock()?;
        inner.flush_page(file, page_no)
    }

    /// Write back all the dirty pages in the buffer pool.
    pub fn flush_all_pages(&self) -> Result<()> {
        let mut inner = self.inner.lock()?;
        inner.flush_all_pages()
    }

    pub fn frame_stats(&self) -> Result<Vec<FrameStat>> {
        let inner = self.inner.lock()?;
        Ok(inner.frame_stats())
    }

    /// Number of pages resident in the buffer pool.
    pub fn resident_pages(&self) -> Result<usize> {
        let inner = self.inner.lock()?;
        Ok(inner.resident_pages())
    }

    /// Human readable description of every frame, no format guarantee.
    pub fn dump(&self) -> Result<String> {
        let inner = self.inner.lock()?;
        Ok(inner.to_string())
    }

    pub fn check_invariants(&self) -> Result<()> {
        let inner = self.inner.lock()?;
        inner.check_invariants()
    }
}
