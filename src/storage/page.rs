use std::fmt::{Debug, Formatter};

/// Logical page number within a file.
pub type PageNo = u32;

/// Size of a data page in byte.
pub const PAGE_SIZE: usize = 4096;

/// A fixed-size block of bytes, the unit of storage and transfer between
/// files and the buffer pool. The buffer pool owns one page per frame;
/// a page has no identity of its own beyond the frame holding it.
#[derive(Clone, PartialEq)]
pub struct Page {
    data: Box<[u8]>,
}

impl Page {
    /// Allocate a zeroed page of PAGE_SIZE bytes.
    pub fn new() -> Self {
        Page { data: vec![0u8; PAGE_SIZE].into_boxed_slice() }
    }

    /// Build a page from the given bytes, zero padded up to PAGE_SIZE.
    /// Bytes beyond PAGE_SIZE are dropped.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut page = Page::new();
        let n = bytes.len().min(PAGE_SIZE);
        page.data[..n].copy_from_slice(&bytes[..n]);
        page
    }

    pub fn clear(&mut self) {
        self.data.fill(0);
    }

    pub fn copy_from(&mut self, other: &Page) {
        self.data.copy_from_slice(&other.data);
    }
}

impl Default for Page {
    fn default() -> Self {
        Page::new()
    }
}

impl AsRef<[u8]> for Page {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl AsMut<[u8]> for Page {
    fn as_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

impl Debug for Page {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        // the full page is too noisy for debug output.
        write!(f, "Page({}..)", hex::encode(&self.data[..16]))
    }
}
