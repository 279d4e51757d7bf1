//! # GPUMA Core Library
//!
//! Geometry optimization of molecular structures against interatomic
//! potentials, one structure at a time or many structures in a single batched
//! pass.
//!
//! ## Architectural Philosophy
//!
//! The library keeps the same three layers throughout:
//!
//! - **[`core`]: The Foundation.** Stateless data: the [`Structure`](core::models::structure::Structure)
//!   record, element tables, XYZ I/O, and the built-in Lennard-Jones reference potential.
//!
//! - **[`engine`]: The Logic Core.** Device resolution, the process-wide model caches,
//!   the `Calculator` / `BatchModel` / `ModelProvider` seams, the BFGS and FIRE
//!   minimizers, and the batched state that packs many systems into one.
//!
//! - **[`workflows`]: The Public API.** [`optimize_structure_batch`](workflows::optimize::optimize_structure_batch)
//!   validates its inputs, picks sequential or batched execution from the
//!   configuration, and returns relaxed structures in input order.
//!
//! ## Example
//!
//! ```no_run
//! use gpuma::core::io::xyz::read_xyz;
//! use gpuma::engine::config::Config;
//! use gpuma::workflows::optimize::optimize_structure_batch;
//!
//! let water = read_xyz("water.xyz", 0, 1)?;
//! let relaxed = optimize_structure_batch(&[water], &Config::default(), None)?;
//! println!("E = {:?} eV", relaxed[0].energy);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod core;
pub mod engine;
pub mod workflows;
