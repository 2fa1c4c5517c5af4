//! # bufmgr - Clock-Sweep Buffer Pool Manager
//!
//! A buffer pool that caches fixed-size pages of any number of backing files
//! in a bounded set of in-memory frames.
//!
//! ## Features
//!
//! - **Pin counting**: every fetched page stays resident until it is unpinned
//! - **Clock-sweep replacement**: unpinned frames are reused in clock order,
//!   with a second chance for recently referenced ones
//! - **Write-back caching**: dirty frames reach their file on eviction, on
//!   [`BufferManager::flush_file`], and when the manager is dropped
//! - **Pluggable backing files**: in-memory (`MemFile`) and on-disk (`DiskFile`)
//!   implementations of the `PageFile` trait
//!
//! ## Basic Usage
//!
//! ```rust
//! use bufmgr::bufferpool::BufferManager;
//! use bufmgr::pagefile::{FileRef, MemFile};
//!
//! let mut bufmgr = BufferManager::new(3).unwrap();
//! let file = FileRef::new(MemFile::new("orders"));
//!
//! // New pages come back pinned
//! let (page_number, page) = bufmgr.allocate_page(&file).unwrap();
//! let rid = page
//!     .with_page_mut(|p| p.insert_record(b"order #1"))
//!     .unwrap();
//! bufmgr.unpin_page(&file, page_number, true).unwrap();
//!
//! // Write the dirty page out and drop the file's frames
//! bufmgr.flush_file(&file).unwrap();
//!
//! // Reading it again goes back to the file
//! let page = bufmgr.fetch_page(&file, page_number).unwrap();
//! page.with_page(|p| assert_eq!(p.get_record(&rid).unwrap(), b"order #1"));
//! bufmgr.unpin_page(&file, page_number, false).unwrap();
//! ```
//!
//! ## Pool Exhaustion
//!
//! When every frame is pinned, requests for non-resident pages fail instead
//! of waiting:
//!
//! ```rust
//! use bufmgr::bufferpool::BufferManager;
//! use bufmgr::error::Error;
//! use bufmgr::pagefile::{FileRef, MemFile};
//!
//! let mut bufmgr = BufferManager::new(2).unwrap();
//! let file = FileRef::new(MemFile::new("full"));
//! bufmgr.allocate_page(&file).unwrap();
//! bufmgr.allocate_page(&file).unwrap();
//! assert!(matches!(bufmgr.allocate_page(&file), Err(Error::PoolExhausted)));
//! ```
//!
//! ## Configuration
//!
//! ```rust
//! use bufmgr::bufferpool::BufferManager;
//! use bufmgr::config::BufferConfig;
//!
//! let config = BufferConfig::from_json_str(r#"{"pool_size": 64}"#).unwrap();
//! let bufmgr = BufferManager::from_config(&config).unwrap();
//! assert_eq!(bufmgr.pool_size(), 64);
//! ```
//!
//! ## Performance Analysis
//!
//! ```bash
//! # Run standalone hit-rate report
//! cargo run --bin benchmark_runner
//!
//! # Run criterion benchmarks
//! cargo bench
//! ```

pub mod bufferpool;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod framestore;
pub mod page;
pub mod pagefile;
pub mod pagetable;
