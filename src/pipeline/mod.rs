//! Pipeline stages for batch PDF extraction.
//!
//! Each submodule implements exactly one transformation step and depends
//! only on the stages before it.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ namer ──▶ walker ──▶ sink ──▶ aggregate
//! (path/URL) (sha256)  (pdfium)  (local/zip/s3) (placeholders → links)
//! ```
//!
//! 1. [`input`]: load each path or URL into memory as an `InputFile`
//! 2. [`namer`]: allocate a collision-free namespace per file, up front
//! 3. [`walker`]: open the document and yield pages in order with their
//!    images; runs in `spawn_blocking` because pdfium is blocking.
//!    [`markdown`] renders pages, [`postprocess`] cleans their text and
//!    [`encode`] turns decoded images into PNG
//! 4. sink (see [`crate::sink`]): persist each image, the only stage with
//!    network I/O besides URL downloads
//! 5. [`aggregate`]: bind placeholders to stored images and join pages

pub mod aggregate;
pub mod encode;
pub mod input;
pub mod markdown;
pub mod namer;
pub mod postprocess;
pub mod walker;
