use std::path::PathBuf;

use thiserror::Error;

use crate::descriptor::FrameId;
use crate::page::PageId;
use crate::pagefile::FileId;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    // every frame in the pool is pinned
    #[error("buffer pool exhausted: all frames are pinned")]
    PoolExhausted,

    #[error("page {page} of {file} is not pinned (frame {frame})")]
    PageNotPinned {
        file: FileId,
        page: PageId,
        frame: FrameId,
    },

    #[error("page {page} of {file} is pinned (frame {frame})")]
    PagePinned {
        file: FileId,
        page: PageId,
        frame: FrameId,
    },

    // a descriptor tagged with a file while marked invalid
    #[error("bad buffer: frame {frame} dirty={dirty} valid={valid} ref_bit={ref_bit}")]
    BadBuffer {
        frame: FrameId,
        dirty: bool,
        valid: bool,
        ref_bit: bool,
    },

    #[error("invalid page {page} in {file}")]
    InvalidPage { file: FileId, page: PageId },

    #[error("page {page} of {file} is already mapped to frame {frame}")]
    DuplicatePage {
        file: FileId,
        page: PageId,
        frame: FrameId,
    },

    #[error("page {page} has {available} free bytes, record needs {needed}")]
    InsufficientSpace {
        page: PageId,
        needed: usize,
        available: usize,
    },

    #[error("no record in slot {slot} of page {page}")]
    InvalidRecord { page: PageId, slot: u16 },

    #[error("page size mismatch: expected {expected}, got {actual}")]
    PageSizeMismatch { expected: usize, actual: usize },

    #[error("file already exists: {}", .0.display())]
    FileExists(PathBuf),

    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("error parsing config: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    InvalidConfig(String),
}
