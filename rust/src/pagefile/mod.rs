use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{Error, Result};
use crate::page::{INVALID_PAGE, PAGE_SIZE, Page, PageId};

/// Stable identity of a backing file, used as half of the page table key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(Arc<str>);

impl FileId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for FileId {
    fn from(s: &str) -> Self {
        FileId(Arc::from(s))
    }
}

impl From<String> for FileId {
    fn from(s: String) -> Self {
        FileId(Arc::from(s))
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// A PageFile is the store the buffer pool caches: a numbered sequence of
// fixed-size pages. Page numbers start at 1 and are never reused.
pub trait PageFile {
    fn identity(&self) -> FileId;
    // fails with InvalidPage for out of range or deleted pages
    fn read_page(&mut self, page_number: PageId) -> Result<Page>;
    // writes the page at the number embedded in its header
    fn write_page(&mut self, page: &Page) -> Result<()>;
    // appends a new empty page
    fn allocate_page(&mut self) -> Result<Page>;
    fn delete_page(&mut self, page_number: PageId) -> Result<()>;
    // number of pages ever allocated, deleted ones included
    fn page_count(&self) -> PageId;
}

/// Shared handle to a backing file.
///
/// The buffer manager keeps a clone in every frame the file occupies, so a
/// dirty frame can always be written back to the file it came from.
#[derive(Clone)]
pub struct FileRef {
    id: FileId,
    file: Arc<Mutex<dyn PageFile + Send>>,
}

impl FileRef {
    pub fn new<F>(file: F) -> Self
    where
        F: PageFile + Send + 'static,
    {
        FileRef {
            id: file.identity(),
            file: Arc::new(Mutex::new(file)),
        }
    }

    pub fn id(&self) -> &FileId {
        &self.id
    }

    fn with_file<R>(&self, f: impl FnOnce(&mut dyn PageFile) -> R) -> R {
        let mut guard = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut *guard)
    }

    pub fn read_page(&self, page_number: PageId) -> Result<Page> {
        self.with_file(|file| file.read_page(page_number))
    }

    pub fn write_page(&self, page: &Page) -> Result<()> {
        self.with_file(|file| file.write_page(page))
    }

    pub fn allocate_page(&self) -> Result<Page> {
        self.with_file(|file| file.allocate_page())
    }

    pub fn delete_page(&self, page_number: PageId) -> Result<()> {
        self.with_file(|file| file.delete_page(page_number))
    }

    pub fn page_count(&self) -> PageId {
        self.with_file(|file| file.page_count())
    }
}

impl fmt::Debug for FileRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FileRef").field(&self.id).finish()
    }
}

// MemFile keeps its pages in memory. None marks a deleted page.
pub struct MemFile {
    name: FileId,
    pages: Vec<Option<Page>>,
}

impl MemFile {
    pub fn new(name: &str) -> Self {
        MemFile {
            name: FileId::from(name),
            pages: Vec::new(),
        }
    }

    fn invalid(&self, page_number: PageId) -> Error {
        Error::InvalidPage {
            file: self.name.clone(),
            page: page_number,
        }
    }

    fn index(&self, page_number: PageId) -> Result<usize> {
        if page_number == INVALID_PAGE || page_number as usize > self.pages.len() {
            return Err(self.invalid(page_number));
        }
        Ok(page_number as usize - 1)
    }
}

impl PageFile for MemFile {
    fn identity(&self) -> FileId {
        self.name.clone()
    }

    fn read_page(&mut self, page_number: PageId) -> Result<Page> {
        let idx = self.index(page_number)?;
        self.pages[idx]
            .clone()
            .ok_or_else(|| self.invalid(page_number))
    }

    fn write_page(&mut self, page: &Page) -> Result<()> {
        let idx = self.index(page.page_number())?;
        if self.pages[idx].is_none() {
            return Err(self.invalid(page.page_number()));
        }
        self.pages[idx] = Some(page.clone());
        Ok(())
    }

    fn allocate_page(&mut self) -> Result<Page> {
        let page = Page::new(self.pages.len() as PageId + 1);
        self.pages.push(Some(page.clone()));
        Ok(page)
    }

    fn delete_page(&mut self, page_number: PageId) -> Result<()> {
        let idx = self.index(page_number)?;
        match self.pages[idx].take() {
            Some(_) => Ok(()),
            None => Err(self.invalid(page_number)),
        }
    }

    fn page_count(&self) -> PageId {
        self.pages.len() as PageId
    }
}

/// A page file on disk. Page `n` lives at byte offset `(n - 1) * PAGE_SIZE`;
/// a deleted page is overwritten with a page numbered [`INVALID_PAGE`].
pub struct DiskFile {
    id: FileId,
    path: PathBuf,
    file: fs::File,
    num_pages: PageId,
}

impl DiskFile {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => Error::FileExists(path.to_path_buf()),
                _ => Error::Io(e),
            })?;
        Self::from_file(path, file)
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| not_found_or_io(path, e))?;
        Self::from_file(path, file)
    }

    pub fn remove<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        fs::remove_file(path).map_err(|e| not_found_or_io(path, e))
    }

    pub fn exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().is_file()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn from_file(path: &Path, file: fs::File) -> Result<Self> {
        let canonical = fs::canonicalize(path)?;
        let num_pages = (file.metadata()?.len() / PAGE_SIZE as u64) as PageId;
        Ok(DiskFile {
            id: FileId::from(canonical.display().to_string()),
            path: canonical,
            file,
            num_pages,
        })
    }

    fn check_range(&self, page_number: PageId) -> Result<()> {
        if page_number == INVALID_PAGE || page_number > self.num_pages {
            return Err(Error::InvalidPage {
                file: self.id.clone(),
                page: page_number,
            });
        }
        Ok(())
    }

    fn offset(page_number: PageId) -> u64 {
        (page_number as u64 - 1) * PAGE_SIZE as u64
    }

    fn read_raw(&mut self, page_number: PageId) -> Result<Page> {
        let mut buf = vec![0u8; PAGE_SIZE];
        self.file.seek(SeekFrom::Start(Self::offset(page_number)))?;
        self.file.read_exact(&mut buf)?;
        Page::from_bytes(&buf)
    }

    fn write_raw(&mut self, page_number: PageId, page: &Page) -> Result<()> {
        self.file.seek(SeekFrom::Start(Self::offset(page_number)))?;
        self.file.write_all(page.as_bytes())?;
        Ok(())
    }
}

fn not_found_or_io(path: &Path, e: std::io::Error) -> Error {
    match e.kind() {
        ErrorKind::NotFound => Error::FileNotFound(path.to_path_buf()),
        _ => Error::Io(e),
    }
}

impl PageFile for DiskFile {
    fn identity(&self) -> FileId {
        self.id.clone()
    }

    fn read_page(&mut self, page_number: PageId) -> Result<Page> {
        self.check_range(page_number)?;
        let page = self.read_raw(page_number)?;
        if page.page_number() != page_number {
            // deleted
            return Err(Error::InvalidPage {
                file: self.id.clone(),
                page: page_number,
            });
        }
        Ok(page)
    }

    fn write_page(&mut self, page: &Page) -> Result<()> {
        let page_number = page.page_number();
        self.check_range(page_number)?;
        self.write_raw(page_number, page)
    }

    fn allocate_page(&mut self) -> Result<Page> {
        let page = Page::new(self.num_pages + 1);
        self.write_raw(page.page_number(), &page)?;
        self.num_pages += 1;
        Ok(page)
    }

    fn delete_page(&mut self, page_number: PageId) -> Result<()> {
        // read_page rejects pages that are already deleted
        self.read_page(page_number)?;
        self.write_raw(page_number, &Page::new(INVALID_PAGE))
    }

    fn page_count(&self) -> PageId {
        self.num_pages
    }
}
