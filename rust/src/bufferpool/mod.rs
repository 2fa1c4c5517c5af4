use log::{debug, info, trace, warn};
use serde::Serialize;
use std::fmt;

use crate::config::BufferConfig;
use crate::descriptor::{FrameDescriptor, FrameId};
use crate::error::{Error, Result};
use crate::framestore::{FrameStore, PageHandle};
use crate::page::{Page, PageId};
use crate::pagefile::FileRef;
use crate::pagetable::{Lookup, PageTable};

/// Counters describing how the pool has served requests so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub write_backs: u64,
}

impl PoolStats {
    pub fn hit_rate(&self) -> f64 {
        if self.hits + self.misses == 0 {
            0.0
        } else {
            self.hits as f64 / (self.hits + self.misses) as f64
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrameSnapshot {
    pub frame: FrameId,
    pub file: Option<String>,
    pub page_number: PageId,
    pub pin_count: u32,
    pub dirty: bool,
    pub valid: bool,
    pub ref_bit: bool,
}

/// Point-in-time dump of every frame, for debugging only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolSnapshot {
    pub frames: Vec<FrameSnapshot>,
    pub valid_frames: usize,
}

impl PoolSnapshot {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl fmt::Display for PoolSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for frame in &self.frames {
            match &frame.file {
                Some(file) if frame.valid => writeln!(
                    f,
                    "frame {}: file={} page={} pins={} dirty={} ref={}",
                    frame.frame, file, frame.page_number, frame.pin_count, frame.dirty, frame.ref_bit
                )?,
                _ => writeln!(f, "frame {}: free", frame.frame)?,
            }
        }
        write!(f, "valid frames: {}", self.valid_frames)
    }
}

/// Caches pages of any number of backing files in a fixed set of frames.
///
/// Every successful [`fetch_page`](Self::fetch_page) or
/// [`allocate_page`](Self::allocate_page) pins the page once and must be
/// matched by an [`unpin_page`](Self::unpin_page). Pinned frames are never
/// chosen as victims; unpinned ones are replaced in clock order, giving
/// recently used frames a second chance.
///
/// The manager is single-threaded: it takes `&mut self` for every operation
/// and does no locking of its own. Do not call back into the manager from
/// inside [`PageHandle::with_page_mut`].
///
/// Dropping the manager writes every dirty frame back to its file.
pub struct BufferManager {
    pool_size: usize,
    descriptors: Vec<FrameDescriptor>,
    page_table: PageTable,
    frames: FrameStore,
    clock_hand: FrameId,
    stats: PoolStats,
}

fn bad_buffer(desc: &FrameDescriptor) -> Error {
    Error::BadBuffer {
        frame: desc.frame_number,
        dirty: desc.dirty,
        valid: desc.valid,
        ref_bit: desc.ref_bit,
    }
}

impl BufferManager {
    pub fn new(pool_size: usize) -> Result<Self> {
        Self::from_config(&BufferConfig::with_pool_size(pool_size))
    }

    pub fn from_config(config: &BufferConfig) -> Result<Self> {
        config.validate()?;
        let pool_size = config.pool_size;
        info!("creating buffer manager with {} frames", pool_size);
        Ok(BufferManager {
            pool_size,
            descriptors: (0..pool_size).map(FrameDescriptor::new).collect(),
            page_table: PageTable::new(pool_size),
            frames: FrameStore::new(pool_size),
            // the first sweep starts at frame 0
            clock_hand: pool_size - 1,
            stats: PoolStats::default(),
        })
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn stats(&self) -> PoolStats {
        self.stats
    }

    pub fn descriptor(&self, frame: FrameId) -> Option<&FrameDescriptor> {
        self.descriptors.get(frame)
    }

    /// Frame currently holding the page, if it is resident.
    pub fn frame_of(&self, file: &FileRef, page_number: PageId) -> Option<FrameId> {
        match self.page_table.lookup(file.id(), page_number) {
            Lookup::Found(frame) => Some(frame),
            Lookup::NotFound => None,
        }
    }

    fn advance_clock(&mut self) {
        self.clock_hand = (self.clock_hand + 1) % self.pool_size;
    }

    // allocate_frame runs the clock until it finds a free frame or an
    // unpinned victim whose reference bit is already clear. A dirty victim
    // is written back to its own file first. The victim's descriptor is left
    // for the caller to overwrite or clear.
    fn allocate_frame(&mut self) -> Result<FrameId> {
        // consecutive pinned frames seen since the last reference bit was cleared
        let mut busy = 0;
        loop {
            self.advance_clock();
            let frame = self.clock_hand;
            let desc = &mut self.descriptors[frame];

            if !desc.valid {
                return Ok(frame);
            }
            if desc.ref_bit {
                desc.ref_bit = false;
                busy = 0;
                continue;
            }
            if desc.is_pinned() {
                busy += 1;
                if busy >= self.pool_size {
                    debug!("no victim after a full sweep, all {} frames pinned", busy);
                    return Err(Error::PoolExhausted);
                }
                continue;
            }

            self.evict(frame)?;
            return Ok(frame);
        }
    }

    fn evict(&mut self, frame: FrameId) -> Result<()> {
        self.write_back(frame)?;
        let desc = &self.descriptors[frame];
        if let Some(file) = desc.file_id() {
            self.page_table.remove(file, desc.page_number);
            debug!("evicted page {} of {} from frame {}", desc.page_number, file, frame);
        }
        self.stats.evictions += 1;
        Ok(())
    }

    // write_back writes a valid dirty frame to its file and marks it clean.
    // Returns whether anything was written.
    fn write_back(&mut self, frame: FrameId) -> Result<bool> {
        let desc = &mut self.descriptors[frame];
        if !(desc.valid && desc.dirty) {
            return Ok(false);
        }
        let Some(file) = desc.file.as_ref() else {
            return Err(bad_buffer(desc));
        };
        self.frames.with_page(frame, |page| file.write_page(page))?;
        debug!("wrote back page {} of {} from frame {}", desc.page_number, file.id(), frame);
        desc.dirty = false;
        self.stats.write_backs += 1;
        Ok(true)
    }

    // install registers a page just placed in a claimed frame.
    fn install(&mut self, frame: FrameId, file: &FileRef, page: Page) -> Result<PageHandle> {
        let page_number = page.page_number();
        if let Err(err) = self.page_table.insert(file.id().clone(), page_number, frame) {
            self.descriptors[frame].clear();
            return Err(err);
        }
        self.frames.install(frame, page);
        self.descriptors[frame].set(file.clone(), page_number);
        Ok(self.frames.handle(frame))
    }

    /// Returns the page pinned, reading it from `file` on a miss.
    pub fn fetch_page(&mut self, file: &FileRef, page_number: PageId) -> Result<PageHandle> {
        if let Lookup::Found(frame) = self.page_table.lookup(file.id(), page_number) {
            self.descriptors[frame].pin();
            self.stats.hits += 1;
            trace!("hit: page {} of {} in frame {}", page_number, file.id(), frame);
            return Ok(self.frames.handle(frame));
        }

        self.stats.misses += 1;
        let frame = self.allocate_frame()?;
        let page = match file.read_page(page_number) {
            Ok(page) => page,
            Err(err) => {
                self.descriptors[frame].clear();
                return Err(err);
            }
        };
        trace!("miss: page {} of {} loaded into frame {}", page_number, file.id(), frame);
        self.install(frame, file, page)
    }

    /// Appends a new page to `file` and returns its number with the page pinned.
    pub fn allocate_page(&mut self, file: &FileRef) -> Result<(PageId, PageHandle)> {
        let frame = self.allocate_frame()?;
        let page = match file.allocate_page() {
            Ok(page) => page,
            Err(err) => {
                self.descriptors[frame].clear();
                return Err(err);
            }
        };
        let page_number = page.page_number();
        trace!("allocated page {} of {} in frame {}", page_number, file.id(), frame);
        let handle = self.install(frame, file, page)?;
        Ok((page_number, handle))
    }

    /// Releases one pin. Unpinning a page that is no longer resident is a
    /// no-op; unpinning a resident page with no pins is an error.
    pub fn unpin_page(&mut self, file: &FileRef, page_number: PageId, dirty: bool) -> Result<()> {
        let Lookup::Found(frame) = self.page_table.lookup(file.id(), page_number) else {
            return Ok(());
        };
        if !self.descriptors[frame].unpin(dirty) {
            return Err(Error::PageNotPinned {
                file: file.id().clone(),
                page: page_number,
                frame,
            });
        }
        Ok(())
    }

    /// Writes out every dirty page of `file` and evicts all of its pages.
    ///
    /// Fails without touching any frame if one of the file's pages is pinned.
    pub fn flush_file(&mut self, file: &FileRef) -> Result<()> {
        let owned: Vec<FrameId> = self
            .descriptors
            .iter()
            .filter(|desc| desc.belongs_to(file.id()))
            .map(|desc| desc.frame_number)
            .collect();

        for &frame in &owned {
            let desc = &self.descriptors[frame];
            if !desc.valid {
                return Err(bad_buffer(desc));
            }
            if desc.is_pinned() {
                return Err(Error::PagePinned {
                    file: file.id().clone(),
                    page: desc.page_number,
                    frame,
                });
            }
        }

        for &frame in &owned {
            self.write_back(frame)?;
            let desc = &mut self.descriptors[frame];
            self.page_table.remove(file.id(), desc.page_number);
            desc.clear();
        }
        debug!("flushed {} frames of {}", owned.len(), file.id());
        Ok(())
    }

    /// Deletes a page from `file`, dropping it from the pool first if resident.
    pub fn dispose_page(&mut self, file: &FileRef, page_number: PageId) -> Result<()> {
        if let Lookup::Found(frame) = self.page_table.lookup(file.id(), page_number) {
            let desc = &mut self.descriptors[frame];
            if desc.is_pinned() {
                return Err(Error::PagePinned {
                    file: file.id().clone(),
                    page: page_number,
                    frame,
                });
            }
            desc.clear();
            self.page_table.remove(file.id(), page_number);
        }
        file.delete_page(page_number)
    }

    pub fn snapshot(&self) -> PoolSnapshot {
        let frames: Vec<FrameSnapshot> = self
            .descriptors
            .iter()
            .map(|desc| FrameSnapshot {
                frame: desc.frame_number,
                file: desc.file_id().map(|id| id.to_string()),
                page_number: desc.page_number,
                pin_count: desc.pin_count,
                dirty: desc.dirty,
                valid: desc.valid,
                ref_bit: desc.ref_bit,
            })
            .collect();
        let valid_frames = frames.iter().filter(|f| f.valid).count();
        PoolSnapshot {
            frames,
            valid_frames,
        }
    }
}

impl Drop for BufferManager {
    fn drop(&mut self) {
        for frame in 0..self.pool_size {
            if let Err(err) = self.write_back(frame) {
                warn!("failed to write back frame {} on shutdown: {}", frame, err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pagefile::MemFile;

    fn mem_file(name: &str) -> FileRef {
        FileRef::new(MemFile::new(name))
    }

    // allocates `n` pages in `file` and unpins each one clean
    fn allocate_unpinned(bm: &mut BufferManager, file: &FileRef, n: usize) -> Vec<PageId> {
        (0..n)
            .map(|_| {
                let (pid, _) = bm.allocate_page(file).unwrap();
                bm.unpin_page(file, pid, false).unwrap();
                pid
            })
            .collect()
    }

    #[test]
    fn test_new() {
        let bm = BufferManager::new(10).unwrap();
        assert_eq!(bm.pool_size(), 10);
        assert_eq!(bm.descriptors.len(), 10);
        assert_eq!(bm.frames.len(), 10);
        assert!(bm.page_table.is_empty());
        assert_eq!(bm.clock_hand, 9);
        assert_eq!(bm.snapshot().valid_frames, 0);
    }

    #[test]
    fn test_zero_pool_rejected() {
        assert!(matches!(BufferManager::new(0), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_refetch_hits_same_frame() {
        let mut bm = BufferManager::new(4).unwrap();
        let file = mem_file("a");
        let (pid, first) = bm.allocate_page(&file).unwrap();
        let second = bm.fetch_page(&file, pid).unwrap();

        assert_eq!(first.frame(), second.frame());
        assert_eq!(bm.descriptor(first.frame()).unwrap().pin_count(), 2);
        assert_eq!(bm.snapshot().valid_frames, 1);
        assert_eq!(bm.stats().hits, 1);
    }

    #[test]
    fn test_fill_pool_without_eviction() {
        let mut bm = BufferManager::new(100).unwrap();
        let file = mem_file("a");
        let mut pids = Vec::new();
        for _ in 0..100 {
            let (pid, page) = bm.allocate_page(&file).unwrap();
            page.with_page_mut(|p| p.insert_record(format!("page {}", pid).as_bytes()))
                .unwrap();
            bm.unpin_page(&file, pid, true).unwrap();
            pids.push(pid);
        }
        for &pid in &pids {
            let page = bm.fetch_page(&file, pid).unwrap();
            let rid = crate::page::RecordId { page_number: pid, slot: 0 };
            assert_eq!(
                page.with_page(|p| p.get_record(&rid).unwrap().to_vec()),
                format!("page {}", pid).into_bytes()
            );
            bm.unpin_page(&file, pid, false).unwrap();
        }
        assert_eq!(bm.stats().evictions, 0);
        assert_eq!(bm.stats().hits, 100);
    }

    #[test]
    fn test_pool_exhausted() {
        let mut bm = BufferManager::new(3).unwrap();
        let a = mem_file("a");
        let b = mem_file("b");
        for _ in 0..3 {
            bm.allocate_page(&a).unwrap();
        }
        assert!(matches!(bm.allocate_page(&b), Err(Error::PoolExhausted)));
        // the failed request left every resident page in place
        assert_eq!(bm.snapshot().valid_frames, 3);
        assert_eq!(b.page_count(), 0);
    }

    #[test]
    fn test_clock_gives_second_chance() {
        let mut bm = BufferManager::new(3).unwrap();
        let file = mem_file("a");
        allocate_unpinned(&mut bm, &file, 3);

        // every ref bit is set, so the sweep clears them all and wraps to frame 0
        let (p4, _) = bm.allocate_page(&file).unwrap();
        assert_eq!(bm.frame_of(&file, 1), None);
        assert_eq!(bm.frame_of(&file, p4), Some(0));

        // touching page 2 sets its ref bit again; page 3 is taken instead
        bm.fetch_page(&file, 2).unwrap();
        bm.unpin_page(&file, 2, false).unwrap();
        bm.allocate_page(&file).unwrap();
        assert_eq!(bm.frame_of(&file, 2), Some(1));
        assert_eq!(bm.frame_of(&file, 3), None);
        assert_eq!(bm.stats().evictions, 2);
    }

    #[test]
    fn test_pinned_frames_do_not_hide_victim() {
        let mut bm = BufferManager::new(3).unwrap();
        let file = mem_file("a");
        for _ in 0..3 {
            bm.allocate_page(&file).unwrap();
        }
        bm.unpin_page(&file, 3, false).unwrap();
        let (p4, _) = bm.allocate_page(&file).unwrap();
        assert_eq!(bm.frame_of(&file, p4), Some(2));

        // frames 0 and 1 are pinned with clear ref bits; frame 2 only needs
        // its ref bit cleared before it can go
        bm.unpin_page(&file, p4, false).unwrap();
        let (p5, _) = bm.allocate_page(&file).unwrap();
        assert_eq!(bm.frame_of(&file, p5), Some(2));
        assert_eq!(bm.frame_of(&file, p4), None);
    }

    #[test]
    fn test_dirty_victim_written_back() {
        let mut bm = BufferManager::new(1).unwrap();
        let file = mem_file("a");
        let (p1, page) = bm.allocate_page(&file).unwrap();
        let rid = page.with_page_mut(|p| p.insert_record(b"keep me")).unwrap();
        bm.unpin_page(&file, p1, true).unwrap();

        bm.allocate_page(&file).unwrap();
        assert_eq!(bm.frame_of(&file, p1), None);
        assert_eq!(file.read_page(p1).unwrap().get_record(&rid).unwrap(), b"keep me");
        assert_eq!(bm.stats().write_backs, 1);
    }

    #[test]
    fn test_unpin() {
        let mut bm = BufferManager::new(2).unwrap();
        let file = mem_file("a");
        file.allocate_page().unwrap();

        // not resident
        bm.unpin_page(&file, 1, false).unwrap();

        bm.fetch_page(&file, 1).unwrap();
        bm.unpin_page(&file, 1, false).unwrap();
        let err = bm.unpin_page(&file, 1, false).unwrap_err();
        assert!(matches!(err, Error::PageNotPinned { page: 1, frame: 0, .. }));
    }

    #[test]
    fn test_clean_unpin_keeps_dirty() {
        let mut bm = BufferManager::new(2).unwrap();
        let file = mem_file("a");
        let (pid, handle) = bm.allocate_page(&file).unwrap();
        bm.fetch_page(&file, pid).unwrap();
        bm.unpin_page(&file, pid, true).unwrap();
        bm.unpin_page(&file, pid, false).unwrap();
        assert!(bm.descriptor(handle.frame()).unwrap().is_dirty());
    }

    #[test]
    fn test_flush_file_pinned() {
        let mut bm = BufferManager::new(4).unwrap();
        let file = mem_file("a");
        let (p1, _) = bm.allocate_page(&file).unwrap();
        bm.unpin_page(&file, p1, true).unwrap();
        let (p2, _) = bm.allocate_page(&file).unwrap();

        let err = bm.flush_file(&file).unwrap_err();
        assert!(matches!(err, Error::PagePinned { page, .. } if page == p2));
        // nothing was flushed or evicted
        assert!(bm.frame_of(&file, p1).is_some());
        assert!(bm.frame_of(&file, p2).is_some());
        assert_eq!(bm.stats().write_backs, 0);
    }

    #[test]
    fn test_flush_file_evicts_only_that_file() {
        let mut bm = BufferManager::new(4).unwrap();
        let a = mem_file("a");
        let b = mem_file("b");
        let (pa, page) = bm.allocate_page(&a).unwrap();
        let rid = page.with_page_mut(|p| p.insert_record(b"flushed")).unwrap();
        bm.unpin_page(&a, pa, true).unwrap();
        let (pb, _) = bm.allocate_page(&b).unwrap();

        bm.flush_file(&a).unwrap();
        assert_eq!(bm.frame_of(&a, pa), None);
        assert!(bm.frame_of(&b, pb).is_some());
        assert_eq!(a.read_page(pa).unwrap().get_record(&rid).unwrap(), b"flushed");
        assert_eq!(bm.snapshot().valid_frames, 1);
    }

    #[test]
    fn test_flush_file_bad_buffer() {
        let mut bm = BufferManager::new(2).unwrap();
        let file = mem_file("a");
        let (pid, handle) = bm.allocate_page(&file).unwrap();
        bm.unpin_page(&file, pid, false).unwrap();
        bm.descriptors[handle.frame()].valid = false;

        let err = bm.flush_file(&file).unwrap_err();
        assert!(matches!(err, Error::BadBuffer { valid: false, .. }));
    }

    #[test]
    fn test_dispose_page() {
        let mut bm = BufferManager::new(2).unwrap();
        let file = mem_file("a");
        let (pid, _) = bm.allocate_page(&file).unwrap();
        assert!(matches!(bm.dispose_page(&file, pid), Err(Error::PagePinned { .. })));

        bm.unpin_page(&file, pid, true).unwrap();
        bm.dispose_page(&file, pid).unwrap();
        assert_eq!(bm.frame_of(&file, pid), None);
        assert_eq!(bm.snapshot().valid_frames, 0);
        assert!(matches!(bm.fetch_page(&file, pid), Err(Error::InvalidPage { .. })));
        assert!(matches!(bm.dispose_page(&file, pid), Err(Error::InvalidPage { .. })));
    }

    #[test]
    fn test_failed_read_frees_claimed_frame() {
        let mut bm = BufferManager::new(1).unwrap();
        let file = mem_file("a");
        allocate_unpinned(&mut bm, &file, 1);

        assert!(matches!(bm.fetch_page(&file, 99), Err(Error::InvalidPage { page: 99, .. })));
        assert!(!bm.descriptor(0).unwrap().is_valid());
        assert!(bm.page_table.is_empty());
        bm.flush_file(&file).unwrap();
        bm.fetch_page(&file, 1).unwrap();
    }

    #[test]
    fn test_drop_writes_back_dirty_frames() {
        let file = mem_file("a");
        let rid;
        {
            let mut bm = BufferManager::new(2).unwrap();
            let (pid, page) = bm.allocate_page(&file).unwrap();
            rid = page.with_page_mut(|p| p.insert_record(b"on shutdown")).unwrap();
            bm.unpin_page(&file, pid, true).unwrap();
        }
        assert_eq!(file.read_page(1).unwrap().get_record(&rid).unwrap(), b"on shutdown");
    }

    #[test]
    fn test_snapshot() {
        let mut bm = BufferManager::new(3).unwrap();
        let file = mem_file("snap");
        bm.allocate_page(&file).unwrap();
        let snapshot = bm.snapshot();
        assert_eq!(snapshot.valid_frames, 1);
        assert_eq!(snapshot.frames[0].file.as_deref(), Some("snap"));
        assert_eq!(snapshot.frames[0].pin_count, 1);

        let text = snapshot.to_string();
        assert!(text.contains("frame 0: file=snap page=1 pins=1"));
        assert!(text.contains("frame 1: free"));
        assert!(text.ends_with("valid frames: 1"));
        assert!(snapshot.to_json().unwrap().contains("\"valid_frames\": 1"));
    }
}
