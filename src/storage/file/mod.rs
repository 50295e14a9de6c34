use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;

use uuid::Uuid;

use crate::error::Result;
use crate::storage::page::{Page, PageNo};

pub mod disk;
pub mod memory;

pub use disk::DiskFile;
pub use memory::MemoryFile;

/// Stable identity of an open file. Two handles compare equal only if
/// they are the same handle, the buffer pool keys its page directory
/// with it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(Uuid);

impl FileId {
    pub fn new() -> Self {
        FileId(Uuid::new_v4())
    }
}

impl Default for FileId {
    fn default() -> Self {
        FileId::new()
    }
}

impl Display for FileId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// A paged file, the collaborator the buffer pool reads pages from and
/// writes pages back to.
///
/// All methods take `&self` so a handle can be shared by the buffer pool
/// and its callers, implementations are expected to protect their state
/// with interior locking.
pub trait File: Debug + Send + Sync {
    /// The identity of this file handle.
    fn id(&self) -> FileId;

    /// Read the page with the given page number into `page`.
    fn read_page(&self, page_no: PageNo, page: &mut Page) -> Result<()>;

    /// Write `page` as the content of the given page number.
    fn write_page(&self, page_no: PageNo, page: &Page) -> Result<()>;

    /// Allocate a new zeroed page and return its page number. Page numbers
    /// of disposed pages may be handed out again.
    fn allocate_page(&self) -> Result<PageNo>;

    /// Give the page number back to the file.
    fn dispose_page(&self, page_no: PageNo) -> Result<()>;

    /// Counters of the operations performed on this file so far.
    fn stats(&self) -> Result<IoStats>;
}

/// Shared handle to a file, a buffer frame keeps one to its owning file so
/// a dirty page can be written back when the frame gets evicted.
pub type FileRef = Arc<dyn File>;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct IoStats {
    pub reads: usize,
    pub writes: usize,
    pub allocations: usize,
    pub disposals: usize,
}
