use std::sync::Arc;

use crate::storage::file::{FileId, FileRef};
use crate::storage::page::PageNo;

/// Index of a frame in the buffer pool, in range [0, pool_size).
pub type FrameId = usize;

/// Metadata of one buffer frame. The page bytes live in the pool next to
/// the frame table, a frame only describes what its slot currently holds.
#[derive(Debug)]
pub struct Frame {
    pub frame_id: FrameId,
    /// file owning the resident page.
    pub owner: Option<FileRef>,
    pub page_no: Option<PageNo>,
    pub valid: bool,
    pub dirty: bool,
    /// second chance bit of the clock replacer.
    pub referenced: bool,
    pub pin_count: u32,
}

impl Frame {
    pub fn new(frame_id: FrameId) -> Self {
        Frame {
            frame_id,
            owner: None,
            page_no: None,
            valid: false,
            dirty: false,
            referenced: false,
            pin_count: 0,
        }
    }

    /// Mark the frame as holding the given page, pinned once by the caller
    /// that asked for it.
    pub fn install(&mut self, file: &FileRef, page_no: PageNo) {
        self.owner = Some(Arc::clone(file));
        self.page_no = Some(page_no);
        self.valid = true;
        self.dirty = false;
        self.referenced = true;
        self.pin_count = 1;
    }

    /// Reset the frame to the invalid state.
    pub fn release(&mut self) {
        self.owner = None;
        self.page_no = None;
        self.valid = false;
        self.dirty = false;
        self.referenced = false;
        self.pin_count = 0;
    }

    pub fn owner_id(&self) -> Option<FileId> {
        self.owner.as_ref().map(|f| f.id())
    }

    /// Whether the frame holds the given page of the given file.
    pub fn holds(&self, file: FileId, page_no: PageNo) -> bool {
        self.valid && self.page_no == Some(page_no) && self.owner_id() == Some(file)
    }

    pub fn is_pinned(&self) -> bool {
        self.pin_count > 0
    }
}
