use std::fmt::{Display, Formatter};
use std::sync::PoisonError;

use config::ConfigError;

use crate::storage::file::FileId;
use crate::storage::page::PageNo;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    Internal(String),
    Value(String),
    /// The page is not resident in the buffer pool.
    NotFound { file: FileId, page_no: PageNo },
    /// Unpin on a resident page whose pin count is already zero.
    NotPinned { file: FileId, page_no: PageNo },
    /// The page is held by a caller and cannot be flushed or evicted.
    PagePinned { file: FileId, page_no: PageNo },
    /// Every frame of a pool with the given size is pinned.
    CapacityExhausted(usize),
    /// Underlying file read/write/allocate/dispose failure.
    Io(String),
    /// The page directory failed structurally, e.g., the table is full.
    Directory(String),
    /// An internal invariant of the buffer pool was found broken.
    BadState(String),
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Internal(s) | Error::Value(s) => {
                write!(f, "{}", s)
            }
            Error::NotFound { file, page_no } => {
                write!(f, "page {} of file {} is not in the buffer pool", page_no, file)
            }
            Error::NotPinned { file, page_no } => {
                write!(f, "page {} of file {} is not pinned", page_no, file)
            }
            Error::PagePinned { file, page_no } => {
                write!(f, "page {} of file {} is pinned", page_no, file)
            }
            Error::CapacityExhausted(pool_size) => {
                write!(f, "all {} buffer frames are pinned", pool_size)
            }
            Error::Io(s) => write!(f, "io error: {}", s),
            Error::Directory(s) => write!(f, "page directory error: {}", s),
            Error::BadState(s) => write!(f, "bad buffer state: {}", s),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<Box<bincode::ErrorKind>> for Error {
    fn from(err: Box<bincode::ErrorKind>) -> Self {
        Error::Internal(err.to_string())
    }
}

impl<T> From<PoisonError<T>> for Error {
    fn from(err: PoisonError<T>) -> Self {
        Error::Internal(err.to_string())
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Internal(err.to_string())
    }
}
