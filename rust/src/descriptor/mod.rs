use crate::page::{INVALID_PAGE, PageId};
use crate::pagefile::{FileId, FileRef};

pub type FrameId = usize;

// A FrameDescriptor is the bookkeeping for one frame of the pool.
// Invariant: an invalid descriptor has no pins and is clean.
#[derive(Debug)]
pub struct FrameDescriptor {
    pub(crate) frame_number: FrameId,
    pub(crate) file: Option<FileRef>,
    pub(crate) page_number: PageId,
    pub(crate) pin_count: u32,
    pub(crate) dirty: bool,
    pub(crate) valid: bool,
    pub(crate) ref_bit: bool,
}

impl FrameDescriptor {
    pub fn new(frame_number: FrameId) -> Self {
        FrameDescriptor {
            frame_number,
            file: None,
            page_number: INVALID_PAGE,
            pin_count: 0,
            dirty: false,
            valid: false,
            ref_bit: false,
        }
    }

    // set installs a freshly loaded page, pinned once by the caller.
    pub fn set(&mut self, file: FileRef, page_number: PageId) {
        self.file = Some(file);
        self.page_number = page_number;
        self.pin_count = 1;
        self.dirty = false;
        self.valid = true;
        self.ref_bit = true;
    }

    // clear returns the frame to the free state.
    pub fn clear(&mut self) {
        self.file = None;
        self.page_number = INVALID_PAGE;
        self.pin_count = 0;
        self.dirty = false;
        self.valid = false;
        self.ref_bit = false;
    }

    // pin records another holder of a resident page.
    pub fn pin(&mut self) {
        self.pin_count += 1;
        self.ref_bit = true;
    }

    // unpin drops one holder. Returns false if the frame was not pinned.
    // A dirty unpin marks the frame dirty; a clean one never clears it.
    pub fn unpin(&mut self, dirty: bool) -> bool {
        if self.pin_count == 0 {
            return false;
        }
        self.pin_count -= 1;
        if dirty {
            self.dirty = true;
        }
        true
    }

    pub fn frame_number(&self) -> FrameId {
        self.frame_number
    }

    pub fn file_id(&self) -> Option<&FileId> {
        self.file.as_ref().map(|f| f.id())
    }

    pub fn page_number(&self) -> PageId {
        self.page_number
    }

    pub fn pin_count(&self) -> u32 {
        self.pin_count
    }

    pub fn is_pinned(&self) -> bool {
        self.pin_count > 0
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn ref_bit(&self) -> bool {
        self.ref_bit
    }

    pub fn belongs_to(&self, file: &FileId) -> bool {
        self.file_id() == Some(file)
    }
}
