use crate::core::models::elements::covalent_radius;
use nalgebra::{Point3, Vector3};
use thiserror::Error;

const DEFAULT_WELL_DEPTH: f64 = 0.1; // eV
const MIN_DISTANCE: f64 = 1e-6;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum PotentialError {
    #[error("No parameters for element '{symbol}' (atom {index})")]
    UnknownElement { index: usize, symbol: String },

    #[error("Atoms {i} and {j} coincide (distance {distance:.2e} Angstrom)")]
    CoincidentAtoms { i: usize, j: usize, distance: f64 },
}

/// Energy and its radial derivative of a 12-6 Lennard-Jones pair.
#[inline]
pub fn lennard_jones_12_6(dist: f64, sigma: f64, epsilon: f64) -> (f64, f64) {
    let sr6 = (sigma / dist).powi(6);
    let sr12 = sr6 * sr6;
    let energy = 4.0 * epsilon * (sr12 - sr6);
    let de_dr = 4.0 * epsilon * (-12.0 * sr12 + 6.0 * sr6) / dist;
    (energy, de_dr)
}

/// Pairwise Lennard-Jones potential over all atom pairs, without cutoff.
///
/// The pair minimum sits at the sum of the two covalent radii, i.e.
/// `sigma_ij = (r_i + r_j) / 2^(1/6)`, and every pair shares one well depth.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LennardJones {
    pub epsilon: f64,
}

impl Default for LennardJones {
    fn default() -> Self {
        Self {
            epsilon: DEFAULT_WELL_DEPTH,
        }
    }
}

impl LennardJones {
    pub fn new(epsilon: f64) -> Self {
        Self { epsilon }
    }

    fn radii(symbols: &[String]) -> Result<Vec<f64>, PotentialError> {
        symbols
            .iter()
            .enumerate()
            .map(|(index, symbol)| {
                covalent_radius(symbol).ok_or_else(|| PotentialError::UnknownElement {
                    index,
                    symbol: symbol.clone(),
                })
            })
            .collect()
    }

    /// Total energy (eV) and per-atom forces (eV/Angstrom).
    pub fn energy_and_forces(
        &self,
        symbols: &[String],
        positions: &[Point3<f64>],
    ) -> Result<(f64, Vec<Vector3<f64>>), PotentialError> {
        let radii = Self::radii(symbols)?;
        let mut energy = 0.0;
        let mut forces = vec![Vector3::zeros(); positions.len()];

        for i in 0..positions.len() {
            for j in (i + 1)..positions.len() {
                let rij = positions[j] - positions[i];
                let dist = rij.norm();
                if dist < MIN_DISTANCE {
                    return Err(PotentialError::CoincidentAtoms {
                        i,
                        j,
                        distance: dist,
                    });
                }
                let sigma = (radii[i] + radii[j]) / 2f64.powf(1.0 / 6.0);
                let (e, de_dr) = lennard_jones_12_6(dist, sigma, self.epsilon);
                energy += e;

                let f = rij * (de_dr / dist);
                forces[i] += f;
                forces[j] -= f;
            }
        }
        Ok((energy, forces))
    }
}
