use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::descriptor::FrameId;
use crate::page::{Page, PageId};

/// Handle to the buffer of one frame, returned by the buffer manager while
/// the page is pinned.
///
/// The handle stays usable after the pin is released, but the frame may then
/// be reused for another page at any time.
#[derive(Debug, Clone)]
pub struct PageHandle {
    frame: FrameId,
    page: Arc<Mutex<Page>>,
}

impl PageHandle {
    pub fn frame(&self) -> FrameId {
        self.frame
    }

    pub fn page_number(&self) -> PageId {
        self.with_page(|page| page.page_number())
    }

    pub fn with_page<R>(&self, f: impl FnOnce(&Page) -> R) -> R {
        f(&*lock(&self.page))
    }

    // with_page_mut is the designated way to modify the frame's contents.
    // Unpin with dirty = true afterwards so the change reaches the file.
    pub fn with_page_mut<R>(&self, f: impl FnOnce(&mut Page) -> R) -> R {
        f(&mut *lock(&self.page))
    }

    // has a clone.
    pub fn data(&self) -> Page {
        lock(&self.page).clone()
    }
}

fn lock(page: &Mutex<Page>) -> MutexGuard<'_, Page> {
    page.lock().unwrap_or_else(PoisonError::into_inner)
}

// FrameStore is the array of page buffers, indexed by frame number in
// parallel with the descriptor table.
pub struct FrameStore {
    frames: Vec<Arc<Mutex<Page>>>,
}

impl FrameStore {
    pub fn new(pool_size: usize) -> Self {
        FrameStore {
            frames: (0..pool_size)
                .map(|_| Arc::new(Mutex::new(Page::empty())))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    // install replaces the contents of a frame in place, so handles given
    // out earlier see the new page.
    pub fn install(&mut self, frame: FrameId, page: Page) {
        *lock(&self.frames[frame]) = page;
    }

    pub fn handle(&self, frame: FrameId) -> PageHandle {
        PageHandle {
            frame,
            page: Arc::clone(&self.frames[frame]),
        }
    }

    pub fn with_page<R>(&self, frame: FrameId, f: impl FnOnce(&Page) -> R) -> R {
        f(&*lock(&self.frames[frame]))
    }
}
