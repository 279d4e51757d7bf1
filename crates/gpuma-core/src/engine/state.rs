use super::device::Device;
use super::error::{EngineError, ValidationError};
use crate::core::models::structure::Structure;
use nalgebra::Point3;
use std::ops::Range;

/// Many independent atomic systems stacked into flat per-atom arrays, the input
/// and output of a [`BatchModel`](super::models::BatchModel).
///
/// Atoms of system `i` occupy the contiguous range [`BatchedState::atom_range`]`(i)`
/// of `positions` and `symbols`; per-system quantities (`charge`,
/// `multiplicity`, `energy`) are indexed by system. Systems keep the order of
/// the structures the state was built from.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchedState {
    pub positions: Vec<Point3<f64>>,
    pub symbols: Vec<String>,
    /// Owning system of each atom.
    pub system_idx: Vec<usize>,
    pub n_atoms_per_system: Vec<usize>,
    pub charge: Vec<i32>,
    pub multiplicity: Vec<u32>,
    /// Per-system energy in eV, filled in by the model after optimization.
    pub energy: Option<Vec<f64>>,
    pub device: Device,
}

impl BatchedState {
    /// Packs `structures` into one state, in order.
    ///
    /// Every structure is validated before anything is copied so that one
    /// malformed input rejects the whole batch.
    pub fn from_structures(
        structures: &[Structure],
        device: Device,
    ) -> Result<Self, ValidationError> {
        if structures.is_empty() {
            return Err(ValidationError::EmptyBatch);
        }
        for (index, structure) in structures.iter().enumerate() {
            structure.validate(index)?;
        }

        let total_atoms = structures.iter().map(Structure::n_atoms).sum();
        let mut state = Self {
            positions: Vec::with_capacity(total_atoms),
            symbols: Vec::with_capacity(total_atoms),
            system_idx: Vec::with_capacity(total_atoms),
            n_atoms_per_system: Vec::with_capacity(structures.len()),
            charge: Vec::with_capacity(structures.len()),
            multiplicity: Vec::with_capacity(structures.len()),
            energy: None,
            device,
        };

        for (system, structure) in structures.iter().enumerate() {
            state.positions.extend_from_slice(&structure.coordinates);
            state.symbols.extend(structure.symbols.iter().cloned());
            state
                .system_idx
                .extend(std::iter::repeat_n(system, structure.n_atoms()));
            state.n_atoms_per_system.push(structure.n_atoms());
            state.charge.push(structure.charge);
            state.multiplicity.push(structure.multiplicity);
        }
        Ok(state)
    }

    pub fn n_systems(&self) -> usize {
        self.n_atoms_per_system.len()
    }

    pub fn n_atoms(&self) -> usize {
        self.positions.len()
    }

    /// Offsets of the first atom of every system.
    pub fn system_offsets(&self) -> Vec<usize> {
        self.n_atoms_per_system
            .iter()
            .scan(0, |offset, &n| {
                let start = *offset;
                *offset += n;
                Some(start)
            })
            .collect()
    }

    pub fn atom_range(&self, system: usize) -> Range<usize> {
        let start: usize = self.n_atoms_per_system[..system].iter().sum();
        start..start + self.n_atoms_per_system[system]
    }

    /// Checks that the per-atom and per-system arrays agree with each other.
    pub fn check_consistency(&self) -> Result<(), EngineError> {
        let n_systems = self.n_systems();
        let n_atoms = self.n_atoms();
        let declared: usize = self.n_atoms_per_system.iter().sum();
        if declared != n_atoms || self.symbols.len() != n_atoms || self.system_idx.len() != n_atoms
        {
            return Err(EngineError::engine(format!(
                "Batched state is inconsistent: {} positions, {} symbols, {} system indices, {} atoms declared",
                n_atoms,
                self.symbols.len(),
                self.system_idx.len(),
                declared
            )));
        }
        if self.charge.len() != n_systems || self.multiplicity.len() != n_systems {
            return Err(EngineError::engine(format!(
                "Batched state is inconsistent: {} systems but {} charges and {} multiplicities",
                n_systems,
                self.charge.len(),
                self.multiplicity.len()
            )));
        }
        Ok(())
    }

    /// Unpacks an optimized state into one structure per system.
    ///
    /// Symbols, charge and multiplicity are read back from the state itself;
    /// `originals` (the structures the batch was built from, in the same order)
    /// only contribute their comment and metadata.
    pub fn to_structures(&self, originals: &[Structure]) -> Result<Vec<Structure>, EngineError> {
        self.check_consistency()?;
        if self.n_systems() != originals.len() {
            return Err(EngineError::engine(format!(
                "Engine returned {} systems for a batch of {}",
                self.n_systems(),
                originals.len()
            )));
        }
        let energies = self
            .energy
            .as_ref()
            .ok_or_else(|| EngineError::engine("Engine returned a state without energies"))?;
        if energies.len() != self.n_systems() {
            return Err(EngineError::engine(format!(
                "Engine returned {} energies for {} systems",
                energies.len(),
                self.n_systems()
            )));
        }

        let offsets = self.system_offsets();
        let structures = originals
            .iter()
            .enumerate()
            .map(|(i, original)| {
                let range = offsets[i]..offsets[i] + self.n_atoms_per_system[i];
                Structure {
                    symbols: self.symbols[range.clone()].to_vec(),
                    coordinates: self.positions[range].to_vec(),
                    charge: self.charge[i],
                    multiplicity: self.multiplicity[i],
                    energy: Some(energies[i]),
                    comment: original.comment.clone(),
                    metadata: original.metadata.clone(),
                }
            })
            .collect();
        Ok(structures)
    }
}
