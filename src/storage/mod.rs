//! Paged storage: fixed-size pages, the files that hold them and the
//! buffer pool that caches them in memory.

pub mod buffer;
pub mod file;
pub mod page;
