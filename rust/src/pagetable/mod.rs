use std::collections::HashMap;
use std::collections::hash_map::Entry;

use crate::descriptor::FrameId;
use crate::error::{Error, Result};
use crate::page::PageId;
use crate::pagefile::FileId;

/// Outcome of a page table lookup. A miss is ordinary control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Found(FrameId),
    NotFound,
}

// Number of buckets for a pool of `pool_size` frames: 2 * ceil(1.2 * n) + 1,
// well above the number of entries the pool can ever hold.
pub fn table_size(pool_size: usize) -> usize {
    2 * (6 * pool_size).div_ceil(5) + 1
}

// PageTable maps (file, page number) to the frame holding that page.
pub struct PageTable {
    map: HashMap<(FileId, PageId), FrameId>,
}

impl PageTable {
    pub fn new(pool_size: usize) -> Self {
        PageTable {
            map: HashMap::with_capacity(table_size(pool_size)),
        }
    }

    pub fn insert(&mut self, file: FileId, page_number: PageId, frame: FrameId) -> Result<()> {
        match self.map.entry((file, page_number)) {
            Entry::Occupied(e) => Err(Error::DuplicatePage {
                file: e.key().0.clone(),
                page: page_number,
                frame: *e.get(),
            }),
            Entry::Vacant(e) => {
                e.insert(frame);
                Ok(())
            }
        }
    }

    pub fn lookup(&self, file: &FileId, page_number: PageId) -> Lookup {
        match self.map.get(&(file.clone(), page_number)) {
            Some(&frame) => Lookup::Found(frame),
            None => Lookup::NotFound,
        }
    }

    pub fn remove(&mut self, file: &FileId, page_number: PageId) -> Option<FrameId> {
        self.map.remove(&(file.clone(), page_number))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
