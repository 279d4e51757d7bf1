//! Provides input/output functionality for molecular structure files.
//!
//! Structures are exchanged as XYZ text: a single-frame reader that rejects any
//! malformed line, a lenient multi-frame reader that skips what it cannot
//! parse, and directory ingestion. All formats sit behind the
//! [`StructureFile`](traits::StructureFile) trait.

pub mod traits;
pub mod xyz;
