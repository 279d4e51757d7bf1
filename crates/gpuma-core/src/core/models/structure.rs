use crate::engine::error::ValidationError;
use nalgebra::Point3;
use std::collections::BTreeMap;

/// A molecular structure: element symbols, Cartesian coordinates, and the
/// electronic state (charge and spin multiplicity) needed by a potential model.
///
/// Coordinates are stored in Angstrom and energies in eV. The `symbols` and
/// `coordinates` vectors are parallel; a structure whose lengths disagree, or
/// which has no atoms at all, is rejected by [`Structure::validate`] before any
/// optimization is attempted.
#[derive(Debug, Clone, PartialEq)]
pub struct Structure {
    /// Element symbols, one per atom.
    pub symbols: Vec<String>,
    /// Atomic positions in Angstrom, parallel to `symbols`.
    pub coordinates: Vec<Point3<f64>>,
    /// Total charge of the system.
    pub charge: i32,
    /// Spin multiplicity (2S + 1), at least 1.
    pub multiplicity: u32,
    /// Potential energy in eV, unset until an optimizer assigns it.
    pub energy: Option<f64>,
    /// Free-form comment, typically the XYZ comment line.
    pub comment: String,
    /// Open key/value metadata carried through optimization untouched.
    pub metadata: BTreeMap<String, String>,
}

impl Structure {
    /// Creates a structure with no energy, an empty comment and no metadata.
    pub fn new(
        symbols: Vec<String>,
        coordinates: Vec<Point3<f64>>,
        charge: i32,
        multiplicity: u32,
    ) -> Self {
        Self {
            symbols,
            coordinates,
            charge,
            multiplicity,
            energy: None,
            comment: String::new(),
            metadata: BTreeMap::new(),
        }
    }

    /// Convenience constructor from string slices and coordinate triples.
    pub fn from_parts<S: AsRef<str>>(
        symbols: &[S],
        coordinates: &[[f64; 3]],
        charge: i32,
        multiplicity: u32,
    ) -> Self {
        Self::new(
            symbols.iter().map(|s| s.as_ref().to_string()).collect(),
            coordinates
                .iter()
                .map(|&[x, y, z]| Point3::new(x, y, z))
                .collect(),
            charge,
            multiplicity,
        )
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    /// Sets the energy and hands back the same structure for chaining.
    /// Passing `None` clears a previously assigned energy.
    pub fn with_energy(mut self, energy: Option<f64>) -> Self {
        self.energy = energy;
        self
    }

    /// Number of atoms, as given by the symbol list.
    pub fn n_atoms(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Checks the invariants every optimizer relies on.
    ///
    /// `index` is the position of this structure in the caller's list and is
    /// only used to make the error message point at the offending input.
    pub fn validate(&self, index: usize) -> Result<(), ValidationError> {
        if self.symbols.is_empty() {
            return Err(ValidationError::EmptyStructure { index });
        }
        if self.symbols.len() != self.coordinates.len() {
            return Err(ValidationError::LengthMismatch {
                index,
                symbols: self.symbols.len(),
                coordinates: self.coordinates.len(),
            });
        }
        if self.multiplicity == 0 {
            return Err(ValidationError::NonPositiveMultiplicity {
                index,
                multiplicity: self.multiplicity,
            });
        }
        Ok(())
    }

    /// Returns a copy with new coordinates and energy, keeping every other field.
    pub(crate) fn relaxed(&self, coordinates: Vec<Point3<f64>>, energy: f64) -> Self {
        Self {
            coordinates,
            energy: Some(energy),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn methane() -> Structure {
        Structure::from_parts(
            &["C", "H", "H", "H", "H"],
            &[
                [0.0, 0.0, 0.0],
                [0.63, 0.63, 0.63],
                [-0.63, -0.63, 0.63],
                [-0.63, 0.63, -0.63],
                [0.63, -0.63, -0.63],
            ],
            0,
            1,
        )
        .with_comment("Methane")
    }

    #[test]
    fn n_atoms_follows_symbols() {
        assert_eq!(methane().n_atoms(), 5);
        assert!(!methane().is_empty());
    }

    #[test]
    fn with_energy_sets_and_clears_energy() {
        let s = methane().with_energy(Some(-12.5));
        assert_eq!(s.energy, Some(-12.5));
        let s = s.with_energy(None);
        assert_eq!(s.energy, None);
        assert_eq!(s.comment, "Methane");
    }

    #[test]
    fn validate_accepts_well_formed_structure() {
        assert!(methane().validate(0).is_ok());
    }

    #[test]
    fn validate_rejects_empty_structure() {
        let s = Structure::new(vec![], vec![], 0, 1);
        assert!(matches!(
            s.validate(3),
            Err(ValidationError::EmptyStructure { index: 3 })
        ));
    }

    #[test]
    fn validate_rejects_length_mismatch() {
        let s = Structure::from_parts(&["H", "H"], &[[0.0, 0.0, 0.0]], 0, 1);
        match s.validate(1) {
            Err(ValidationError::LengthMismatch {
                index,
                symbols,
                coordinates,
            }) => {
                assert_eq!(index, 1);
                assert_eq!(symbols, 2);
                assert_eq!(coordinates, 1);
            }
            other => panic!("Expected LengthMismatch, got {:?}", other),
        }
    }

    #[test]
    fn validate_rejects_zero_multiplicity() {
        let s = Structure::from_parts(&["H"], &[[0.0, 0.0, 0.0]], 0, 0);
        assert!(matches!(
            s.validate(0),
            Err(ValidationError::NonPositiveMultiplicity { .. })
        ));
    }

    #[test]
    fn relaxed_replaces_only_coordinates_and_energy() {
        let mut original = methane();
        original
            .metadata
            .insert("source".to_string(), "test".to_string());
        let moved: Vec<_> = original
            .coordinates
            .iter()
            .map(|p| Point3::new(p.x + 1.0, p.y, p.z))
            .collect();

        let relaxed = original.relaxed(moved.clone(), -7.0);

        assert_eq!(relaxed.coordinates, moved);
        assert_eq!(relaxed.energy, Some(-7.0));
        assert_eq!(relaxed.symbols, original.symbols);
        assert_eq!(relaxed.comment, original.comment);
        assert_eq!(relaxed.metadata, original.metadata);
        assert_eq!(original.energy, None);
    }
}
