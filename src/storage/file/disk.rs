use std::collections::BTreeSet;
use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::{File, FileId, IoStats};
use crate::error::{Error, Result};
use crate::storage::page::{Page, PageNo, PAGE_SIZE};

const HEADER_PAGE_NO: PageNo = 0;

/// "CLKP"
const MAGIC: u32 = 0x434c_4b50;

/// Content of the header page, i.e., page 0 of every disk file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct FileHeader {
    magic: u32,
    /// number of pages in the file, header page included.
    page_count: u32,
    /// head of the linked list of disposed pages, each disposed page
    /// stores the page number of the next one in its leading bytes.
    first_free: Option<PageNo>,
}

/// A paged file on disk.
///
/// Page 0 is reserved for the file header, data pages are numbered from 1.
/// Disposed pages are chained into a free list and reused by later
/// allocations before the file grows.
#[derive(Debug)]
pub struct DiskFile {
    id: FileId,
    path: PathBuf,
    inner: Mutex<DiskInner>,
}

#[derive(Debug)]
struct DiskInner {
    file: std::fs::File,
    header: FileHeader,
    /// disposed pages, mirrors the on-disk free list.
    free: BTreeSet<PageNo>,
    stats: IoStats,
}

impl DiskFile {
    /// Create a new paged file, fails if the path exists already.
    pub fn create(path: impl AsRef<Path>) -> Result<DiskFile> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().read(true).write(true).create_new(true).open(&path)?;
        let header = FileHeader { magic: MAGIC, page_count: 1, first_free: None };
        let free = BTreeSet::new();
        let mut inner = DiskInner { file, header, free, stats: IoStats::default() };
        write_header(&mut inner.file, &inner.header)?;
        debug!("created paged file {}", path.display());
        Ok(DiskFile { id: FileId::new(), path, inner: Mutex::new(inner) })
    }

    /// Open an existing paged file.
    pub fn open(path: impl AsRef<Path>) -> Result<DiskFile> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new().read(true).write(true).open(&path)?;
        let mut page = Page::new();
        read_at(&mut file, HEADER_PAGE_NO, &mut page)?;
        let header: FileHeader = bincode::deserialize(page.as_ref())
            .map_err(|e| Error::Io(format!("{}: bad file header: {}", path.display(), e)))?;
        if header.magic != MAGIC {
            return Err(Error::Io(format!("{}: not a paged file", path.display())));
        }

        // walk the free list, it can't be longer than the file itself.
        let mut free = BTreeSet::new();
        let mut next = header.first_free;
        while let Some(page_no) = next {
            if page_no == HEADER_PAGE_NO
                || page_no >= header.page_count
                || !free.insert(page_no)
            {
                return Err(Error::Io(format!(
                    "{}: corrupted free list at page {}",
                    path.display(),
                    page_no
                )));
            }
            read_at(&mut file, page_no, &mut page)?;
            next = decode_free_link(&page)?;
        }

        debug!("opened paged file {} with {} pages", path.display(), header.page_count);
        let inner = DiskInner { file, header, free, stats: IoStats::default() };
        Ok(DiskFile { id: FileId::new(), path, inner: Mutex::new(inner) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of pages in the file, the header page and disposed pages
    /// included.
    pub fn page_count(&self) -> Result<u32> {
        let inner = self.inner.lock()?;
        Ok(inner.header.page_count)
    }

    /// Flush file content and metadata to the storage device.
    pub fn sync(&self) -> Result<()> {
        let inner = self.inner.lock()?;
        inner.file.sync_all()?;
        Ok(())
    }
}

impl DiskInner {
    /// Check the page number refers to an allocated data page.
    fn check(&self, page_no: PageNo) -> Result<()> {
        if page_no == HEADER_PAGE_NO
            || page_no >= self.header.page_count
            || self.free.contains(&page_no)
        {
            return Err(Error::Io(format!("invalid page number {}", page_no)));
        }
        Ok(())
    }

    /// Take the head of the free list, or grow the file by one page.
    ///
    /// The in-memory header and free set change only once the page and the
    /// header are on disk.
    fn allocate(&mut self) -> Result<PageNo> {
        let mut header = self.header.clone();
        let page_no = match header.first_free {
            Some(page_no) => {
                let mut page = Page::new();
                read_at(&mut self.file, page_no, &mut page)?;
                header.first_free = decode_free_link(&page)?;
                // unlink the page on disk before zeroing overwrites its link.
                write_header(&mut self.file, &header)?;
                if let Err(err) = write_at(&mut self.file, page_no, &Page::new()) {
                    if let Err(e) = write_header(&mut self.file, &self.header) {
                        warn!("failed to restore header after allocation failure: {}", e);
                    }
                    return Err(err);
                }
                page_no
            }
            None => {
                let page_no = header.page_count;
                header.page_count = page_no
                    .checked_add(1)
                    .ok_or_else(|| Error::Io("paged file is full".to_string()))?;
                // extends the file, the page is not counted until the header
                // is written.
                write_at(&mut self.file, page_no, &Page::new())?;
                write_header(&mut self.file, &header)?;
                page_no
            }
        };
        self.header = header;
        self.free.remove(&page_no);
        self.stats.allocations += 1;
        Ok(page_no)
    }

    /// Push the page on the free list.
    fn dispose(&mut self, page_no: PageNo) -> Result<()> {
        self.check(page_no)?;
        let link = bincode::serialize(&self.header.first_free)?;
        write_at(&mut self.file, page_no, &Page::from_bytes(&link))?;
        let header = FileHeader { first_free: Some(page_no), ..self.header.clone() };
        write_header(&mut self.file, &header)?;
        self.header = header;
        self.free.insert(page_no);
        self.stats.disposals += 1;
        Ok(())
    }
}

impl File for DiskFile {
    fn id(&self) -> FileId {
        self.id
    }

    fn read_page(&self, page_no: PageNo, page: &mut Page) -> Result<()> {
        let mut inner = self.inner.lock()?;
        inner.check(page_no)?;
        read_at(&mut inner.file, page_no, page)?;
        inner.stats.reads += 1;
        Ok(())
    }

    fn write_page(&self, page_no: PageNo, page: &Page) -> Result<()> {
        let mut inner = self.inner.lock()?;
        inner.check(page_no)?;
        write_at(&mut inner.file, page_no, page)?;
        inner.stats.writes += 1;
        Ok(())
    }

    fn allocate_page(&self) -> Result<PageNo> {
        let mut inner = self.inner.lock()?;
        inner.allocate()
    }

    fn dispose_page(&self, page_no: PageNo) -> Result<()> {
        let mut inner = self.inner.lock()?;
        inner.dispose(page_no)
    }

    fn stats(&self) -> Result<IoStats> {
        let inner = self.inner.lock()?;
        Ok(inner.stats)
    }
}

fn offset(page_no: PageNo) -> u64 {
    page_no as u64 * PAGE_SIZE as u64
}

fn read_at(file: &mut std::fs::File, page_no: PageNo, page: &mut Page) -> Result<()> {
    file.seek(SeekFrom::Start(offset(page_no)))?;
    file.read_exact(page.as_mut())?;
    Ok(())
}

fn write_at(file: &mut std::fs::File, page_no: PageNo, page: &Page) -> Result<()> {
    file.seek(SeekFrom::Start(offset(page_no)))?;
    file.write_all(page.as_ref())?;
    Ok(())
}

fn write_header(file: &mut std::fs::File, header: &FileHeader) -> Result<()> {
    let bytes = bincode::serialize(header)?;
    write_at(file, HEADER_PAGE_NO, &Page::from_bytes(&bytes))
}

fn decode_free_link(page: &Page) -> Result<Option<PageNo>> {
    bincode::deserialize(page.as_ref()).map_err(|e| Error::Io(format!("bad free page link: {}", e)))
}
