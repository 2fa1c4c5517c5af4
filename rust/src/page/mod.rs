use std::fmt;

use crate::error::{Error, Result};

pub type PageId = u32;

/// Size in bytes of every page, on disk and in a frame.
pub const PAGE_SIZE: usize = 8192;

/// Page number of a free frame or a deleted page. Real pages start at 1.
pub const INVALID_PAGE: PageId = 0;

// header: page number (u32), slot count (u16), free space end (u16)
const HEADER_SIZE: usize = 8;
// slot: record offset (u16), record length (u16). offset 0 marks a deleted slot.
const SLOT_SIZE: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId {
    pub page_number: PageId,
    pub slot: u16,
}

/// A fixed-size page holding variable-length records.
///
/// Records are packed from the end of the page towards the front while the
/// slot directory grows from the header backwards. Space of deleted records
/// is not reclaimed; their slots are reused.
#[derive(Clone, PartialEq, Eq)]
pub struct Page {
    data: Box<[u8]>,
}

impl Page {
    pub fn new(page_number: PageId) -> Self {
        let mut page = Page {
            data: vec![0u8; PAGE_SIZE].into_boxed_slice(),
        };
        page.set_page_number(page_number);
        page.set_slot_count(0);
        page.set_free_end(PAGE_SIZE);
        page
    }

    // the contents of a frame that holds nothing yet
    pub fn empty() -> Self {
        Page::new(INVALID_PAGE)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != PAGE_SIZE {
            return Err(Error::PageSizeMismatch {
                expected: PAGE_SIZE,
                actual: bytes.len(),
            });
        }
        Ok(Page {
            data: bytes.to_vec().into_boxed_slice(),
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn page_number(&self) -> PageId {
        PageId::from_le_bytes([self.data[0], self.data[1], self.data[2], self.data[3]])
    }

    /// Bytes available for a record that needs a fresh slot.
    pub fn free_space(&self) -> usize {
        self.free_end()
            .saturating_sub(HEADER_SIZE + SLOT_SIZE * self.slot_count() as usize)
    }

    pub fn insert_record(&mut self, record: &[u8]) -> Result<RecordId> {
        let reused = (0..self.slot_count()).find(|&slot| self.slot(slot).0 == 0);
        let needed = match reused {
            Some(_) => record.len(),
            None => record.len() + SLOT_SIZE,
        };
        let available = self.free_space();
        if needed > available || (reused.is_none() && self.slot_count() == u16::MAX) {
            return Err(Error::InsufficientSpace {
                page: self.page_number(),
                needed,
                available,
            });
        }

        let offset = self.free_end() - record.len();
        self.data[offset..offset + record.len()].copy_from_slice(record);
        self.set_free_end(offset);

        let slot = match reused {
            Some(slot) => slot,
            None => {
                let slot = self.slot_count();
                self.set_slot_count(slot + 1);
                slot
            }
        };
        self.set_slot(slot, offset as u16, record.len() as u16);

        Ok(RecordId {
            page_number: self.page_number(),
            slot,
        })
    }

    pub fn get_record(&self, rid: &RecordId) -> Result<&[u8]> {
        let (offset, len) = self.live_slot(rid)?;
        Ok(&self.data[offset..offset + len])
    }

    pub fn delete_record(&mut self, rid: &RecordId) -> Result<()> {
        self.live_slot(rid)?;
        self.set_slot(rid.slot, 0, 0);
        Ok(())
    }

    /// Iterates over the live records in slot order.
    pub fn records(&self) -> impl Iterator<Item = (RecordId, &[u8])> + '_ {
        let page_number = self.page_number();
        (0..self.slot_count()).filter_map(move |slot| {
            let (offset, len) = self.slot(slot);
            if offset == 0 {
                return None;
            }
            let (offset, len) = (offset as usize, len as usize);
            Some((RecordId { page_number, slot }, &self.data[offset..offset + len]))
        })
    }

    fn live_slot(&self, rid: &RecordId) -> Result<(usize, usize)> {
        let invalid = Error::InvalidRecord {
            page: self.page_number(),
            slot: rid.slot,
        };
        if rid.page_number != self.page_number() || rid.slot >= self.slot_count() {
            return Err(invalid);
        }
        match self.slot(rid.slot) {
            (0, _) => Err(invalid),
            (offset, len) => Ok((offset as usize, len as usize)),
        }
    }

    fn read_u16(&self, at: usize) -> u16 {
        u16::from_le_bytes([self.data[at], self.data[at + 1]])
    }

    fn write_u16(&mut self, at: usize, value: u16) {
        self.data[at..at + 2].copy_from_slice(&value.to_le_bytes());
    }

    fn set_page_number(&mut self, page_number: PageId) {
        self.data[0..4].copy_from_slice(&page_number.to_le_bytes());
    }

    fn slot_count(&self) -> u16 {
        self.read_u16(4)
    }

    fn set_slot_count(&mut self, count: u16) {
        self.write_u16(4, count);
    }

    // PAGE_SIZE itself fits in a u16
    fn free_end(&self) -> usize {
        self.read_u16(6) as usize
    }

    fn set_free_end(&mut self, end: usize) {
        self.write_u16(6, end as u16);
    }

    fn slot(&self, slot: u16) -> (u16, u16) {
        let at = HEADER_SIZE + SLOT_SIZE * slot as usize;
        (self.read_u16(at), self.read_u16(at + 2))
    }

    fn set_slot(&mut self, slot: u16, offset: u16, len: u16) {
        let at = HEADER_SIZE + SLOT_SIZE * slot as usize;
        self.write_u16(at, offset);
        self.write_u16(at + 2, len);
    }
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page")
            .field("page_number", &self.page_number())
            .field("slots", &self.slot_count())
            .field("free_space", &self.free_space())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_page_is_empty() {
        let page = Page::new(4);
        assert_eq!(page.page_number(), 4);
        assert_eq!(page.free_space(), PAGE_SIZE - HEADER_SIZE);
        assert_eq!(page.records().count(), 0);
        assert_eq!(page.as_bytes().len(), PAGE_SIZE);
    }

    #[test]
    fn test_insert_and_get() {
        let mut page = Page::new(1);
        let a = page.insert_record(b"hello!").unwrap();
        let b = page.insert_record(b"world!").unwrap();
        assert_eq!(a, RecordId { page_number: 1, slot: 0 });
        assert_eq!(b.slot, 1);
        assert_eq!(page.get_record(&a).unwrap(), b"hello!");
        assert_eq!(page.get_record(&b).unwrap(), b"world!");
    }

    #[test]
    fn test_delete_then_reuse_slot() {
        let mut page = Page::new(2);
        let a = page.insert_record(b"first").unwrap();
        page.insert_record(b"second").unwrap();
        page.delete_record(&a).unwrap();
        assert!(matches!(
            page.get_record(&a),
            Err(Error::InvalidRecord { page: 2, slot: 0 })
        ));
        assert!(page.delete_record(&a).is_err());

        let c = page.insert_record(b"third").unwrap();
        assert_eq!(c.slot, 0);
        assert_eq!(page.get_record(&c).unwrap(), b"third");
        let live: Vec<&[u8]> = page.records().map(|(_, r)| r).collect();
        assert_eq!(live, vec![&b"third"[..], &b"second"[..]]);
    }

    #[test]
    fn test_record_from_other_page_rejected() {
        let mut page = Page::new(3);
        page.insert_record(b"x").unwrap();
        let foreign = RecordId { page_number: 9, slot: 0 };
        assert!(page.get_record(&foreign).is_err());
    }

    #[test]
    fn test_page_full() {
        let mut page = Page::new(1);
        let big = vec![7u8; PAGE_SIZE - HEADER_SIZE - SLOT_SIZE];
        page.insert_record(&big).unwrap();
        assert_eq!(page.free_space(), 0);
        let err = page.insert_record(b"y").unwrap_err();
        assert!(matches!(err, Error::InsufficientSpace { page: 1, .. }));
    }

    #[test]
    fn test_bytes_survive_copy() {
        let mut page = Page::new(5);
        let rid = page.insert_record(b"persist me").unwrap();
        let copy = Page::from_bytes(page.as_bytes()).unwrap();
        assert_eq!(copy, page);
        assert_eq!(copy.get_record(&rid).unwrap(), b"persist me");

        assert!(matches!(
            Page::from_bytes(&[0u8; 10]),
            Err(Error::PageSizeMismatch { actual: 10, .. })
        ));
    }
}
