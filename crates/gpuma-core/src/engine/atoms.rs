use super::error::EngineError;
use super::models::{Calculator, Evaluation};
use crate::core::models::structure::Structure;
use nalgebra::{Point3, Vector3};
use std::fmt;
use std::sync::Arc;

/// One atomic system prepared for a single-structure minimizer, with a
/// calculator attached.
///
/// The last evaluation is memoized against the positions it was computed for,
/// so reading energy and forces at the same geometry costs one model call.
#[derive(Clone)]
pub struct AtomicSystem {
    symbols: Vec<String>,
    positions: Vec<Point3<f64>>,
    charge: i32,
    multiplicity: u32,
    calculator: Option<Arc<dyn Calculator>>,
    last: Option<(Vec<Point3<f64>>, Evaluation)>,
}

impl fmt::Debug for AtomicSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AtomicSystem")
            .field("symbols", &self.symbols)
            .field("positions", &self.positions)
            .field("charge", &self.charge)
            .field("multiplicity", &self.multiplicity)
            .field("has_calculator", &self.calculator.is_some())
            .finish()
    }
}

impl AtomicSystem {
    pub fn new(
        symbols: Vec<String>,
        positions: Vec<Point3<f64>>,
        charge: i32,
        multiplicity: u32,
    ) -> Self {
        Self {
            symbols,
            positions,
            charge,
            multiplicity,
            calculator: None,
            last: None,
        }
    }

    pub fn from_structure(structure: &Structure) -> Self {
        Self::new(
            structure.symbols.clone(),
            structure.coordinates.clone(),
            structure.charge,
            structure.multiplicity,
        )
    }

    pub fn with_calculator(mut self, calculator: Arc<dyn Calculator>) -> Self {
        self.calculator = Some(calculator);
        self.last = None;
        self
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn n_atoms(&self) -> usize {
        self.symbols.len()
    }

    pub fn charge(&self) -> i32 {
        self.charge
    }

    pub fn multiplicity(&self) -> u32 {
        self.multiplicity
    }

    pub fn get_positions(&self) -> &[Point3<f64>] {
        &self.positions
    }

    pub fn set_positions(&mut self, positions: Vec<Point3<f64>>) {
        self.positions = positions;
    }

    /// Evaluates the attached calculator at the current positions, reusing the
    /// previous result if the geometry has not changed.
    pub fn evaluate(&mut self) -> Result<&Evaluation, EngineError> {
        let fresh = !matches!(&self.last, Some((at, _)) if *at == self.positions);
        if fresh {
            let calculator = self
                .calculator
                .clone()
                .ok_or_else(|| EngineError::engine("No calculator attached to atomic system"))?;
            let evaluation = calculator.evaluate(self).map_err(EngineError::from_boxed)?;
            if evaluation.forces.len() != self.positions.len() {
                return Err(EngineError::engine(format!(
                    "Calculator returned {} force vectors for {} atoms",
                    evaluation.forces.len(),
                    self.positions.len()
                )));
            }
            if !evaluation.energy.is_finite() {
                return Err(EngineError::engine(format!(
                    "Calculator returned non-finite energy {}",
                    evaluation.energy
                )));
            }
            self.last = Some((self.positions.clone(), evaluation));
        }
        match &self.last {
            Some((_, evaluation)) => Ok(evaluation),
            None => Err(EngineError::engine("Evaluation cache is empty")),
        }
    }

    pub fn get_potential_energy(&mut self) -> Result<f64, EngineError> {
        self.evaluate().map(|e| e.energy)
    }

    pub fn get_forces(&mut self) -> Result<Vec<Vector3<f64>>, EngineError> {
        self.evaluate().map(|e| e.forces.clone())
    }
}
