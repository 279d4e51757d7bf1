//! # Core Models Module
//!
//! Data structures describing the molecules that flow through GPUMA.
//!
//! ## Key Components
//!
//! - [`structure`] - The [`Structure`](structure::Structure) record: symbols, coordinates,
//!   charge, multiplicity, and an optional energy assigned by an optimizer
//! - [`elements`] - Periodic-table lookups (covalent radii, atomic numbers)
//!
//! ## Usage
//!
//! ```ignore
//! use gpuma::core::models::structure::Structure;
//!
//! let water = Structure::from_parts(
//!     &["O", "H", "H"],
//!     &[[0.0, 0.0, 0.0], [0.757, 0.586, 0.0], [-0.757, 0.586, 0.0]],
//!     0,
//!     1,
//! );
//! assert_eq!(water.n_atoms(), 3);
//! ```

pub mod elements;
pub mod structure;
