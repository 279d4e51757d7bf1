//! Closed-form interatomic potentials used as built-in reference models.
//!
//! These are pure functions of element symbols and positions with no notion of
//! devices or caching; the engine wraps them as calculators.

pub mod lennard_jones;

pub use lennard_jones::{LennardJones, PotentialError};
