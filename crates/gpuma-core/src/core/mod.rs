//! # Core Module
//!
//! Stateless building blocks shared by the optimization engine and its callers.
//!
//! ## Architecture
//!
//! - **Molecular Representation** ([`models`]) - The [`Structure`](models::structure::Structure)
//!   record and periodic-table data
//! - **File I/O** ([`io`]) - Reading and writing single- and multi-frame XYZ files,
//!   and ingesting whole directories of them
//! - **Reference Potentials** ([`potentials`]) - A built-in pairwise potential used as the
//!   default model and as a stand-in for pretrained ML potentials in tests and examples
//!
//! Nothing in this module holds process-wide state; caching and device handling live
//! in [`crate::engine`].

pub mod io;
pub mod models;
pub mod potentials;
