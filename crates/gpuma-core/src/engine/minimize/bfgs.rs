use super::{LocalOptimizer, MinimizationReport, drive};
use crate::engine::atoms::AtomicSystem;
use crate::engine::config::Convergence;
use crate::engine::error::EngineError;
use nalgebra::{DMatrix, DVector, Point3, Vector3};

const DEFAULT_MAX_STEP: f64 = 0.2;
const DEFAULT_INITIAL_CURVATURE: f64 = 70.0;
const MIN_DISPLACEMENT: f64 = 1e-7;
const MIN_CURVATURE: f64 = 1e-12;

/// Quasi-Newton minimizer with a dense BFGS Hessian estimate.
///
/// Each step diagonalizes the current Hessian, takes the Newton step along
/// `|eigenvalues|` (so negative curvature still moves downhill), and scales the
/// step so no atom moves further than `max_step` Angstrom.
#[derive(Debug, Clone)]
pub struct Bfgs {
    pub max_step: f64,
    /// Initial Hessian diagonal in eV/Angstrom^2.
    pub initial_curvature: f64,
    hessian: Option<DMatrix<f64>>,
    previous: Option<(DVector<f64>, DVector<f64>)>,
}

impl Default for Bfgs {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_STEP, DEFAULT_INITIAL_CURVATURE)
    }
}

impl Bfgs {
    pub fn new(max_step: f64, initial_curvature: f64) -> Self {
        Self {
            max_step,
            initial_curvature,
            hessian: None,
            previous: None,
        }
    }

    fn update_hessian(&mut self, r: &DVector<f64>, f: &DVector<f64>) {
        if self.hessian.is_none() {
            self.hessian = Some(DMatrix::identity(r.len(), r.len()) * self.initial_curvature);
            return;
        }
        let (Some(hessian), Some((r0, f0))) = (self.hessian.as_mut(), self.previous.as_ref())
        else {
            return;
        };

        let dr = r - r0;
        if dr.amax() < MIN_DISPLACEMENT {
            return;
        }
        let df = f - f0;
        let a = dr.dot(&df);
        let dg = &*hessian * &dr;
        let b = dr.dot(&dg);
        if a.abs() < MIN_CURVATURE || b.abs() < MIN_CURVATURE {
            return;
        }
        *hessian -= (&df * df.transpose()) / a + (&dg * dg.transpose()) / b;
    }

    fn step(&mut self, atoms: &mut AtomicSystem, forces: &[Vector3<f64>]) -> Result<(), EngineError> {
        let r = flatten_points(atoms.get_positions());
        let f = flatten_vectors(forces);
        self.update_hessian(&r, &f);

        let hessian = self
            .hessian
            .clone()
            .ok_or_else(|| EngineError::engine("BFGS Hessian was not initialized"))?;
        let eigen = hessian.symmetric_eigen();
        let projected = eigen.eigenvectors.transpose() * &f;
        let scaled = DVector::from_iterator(
            projected.len(),
            projected
                .iter()
                .zip(eigen.eigenvalues.iter())
                .map(|(p, w)| p / w.abs().max(MIN_CURVATURE)),
        );
        let mut dr = &eigen.eigenvectors * scaled;

        let longest = dr
            .as_slice()
            .chunks_exact(3)
            .map(|d| Vector3::new(d[0], d[1], d[2]).norm())
            .fold(0.0, f64::max);
        if longest >= self.max_step {
            dr *= self.max_step / longest;
        }

        let new_r = &r + &dr;
        atoms.set_positions(unflatten_points(&new_r));
        self.previous = Some((r, f));
        Ok(())
    }
}

impl LocalOptimizer for Bfgs {
    fn run(
        &mut self,
        atoms: &mut AtomicSystem,
        convergence: &Convergence,
    ) -> Result<MinimizationReport, EngineError> {
        drive(atoms, convergence, |atoms, forces| self.step(atoms, forces))
    }
}

fn flatten_points(points: &[Point3<f64>]) -> DVector<f64> {
    DVector::from_iterator(points.len() * 3, points.iter().flat_map(|p| [p.x, p.y, p.z]))
}

fn flatten_vectors(vectors: &[Vector3<f64>]) -> DVector<f64> {
    DVector::from_iterator(
        vectors.len() * 3,
        vectors.iter().flat_map(|v| [v.x, v.y, v.z]),
    )
}

fn unflatten_points(flat: &DVector<f64>) -> Vec<Point3<f64>> {
    flat.as_slice()
        .chunks_exact(3)
        .map(|c| Point3::new(c[0], c[1], c[2]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::minimize::test_support::Harmonic;
    use std::sync::Arc;

    fn displaced_pair() -> AtomicSystem {
        AtomicSystem::new(
            vec!["H".into(), "H".into()],
            vec![Point3::new(0.3, -0.2, 0.1), Point3::new(1.1, 0.05, -0.1)],
            0,
            1,
        )
    }

    #[test]
    fn converges_on_a_harmonic_well() {
        let minimum = vec![Point3::new(0.0, 0.0, 0.0), Point3::new(0.74, 0.0, 0.0)];
        let calc = Arc::new(Harmonic {
            minimum: minimum.clone(),
            k: 5.0,
            e0: -31.0,
        });
        let mut atoms = displaced_pair().with_calculator(calc);
        let convergence = Convergence {
            fmax: 1e-4,
            max_steps: 200,
        };

        let report = Bfgs::default().run(&mut atoms, &convergence).unwrap();

        assert!(report.converged);
        assert!(report.max_force < 1e-4);
        assert!((report.energy + 31.0).abs() < 1e-6);
        for (r, r0) in atoms.get_positions().iter().zip(&minimum) {
            assert!((r - r0).norm() < 1e-4);
        }
    }

    #[test]
    fn steps_never_exceed_max_step() {
        let calc = Arc::new(Harmonic {
            minimum: vec![Point3::new(10.0, 0.0, 0.0)],
            k: 1.0,
            e0: 0.0,
        });
        let mut atoms =
            AtomicSystem::new(vec!["H".into()], vec![Point3::origin()], 0, 2).with_calculator(calc);
        let convergence = Convergence {
            fmax: 1e-6,
            max_steps: 1,
        };

        let report = Bfgs::new(0.2, 70.0).run(&mut atoms, &convergence).unwrap();

        assert_eq!(report.steps, 1);
        assert!(!report.converged);
        assert!(atoms.get_positions()[0].coords.norm() <= 0.2 + 1e-12);
    }

    #[test]
    fn already_converged_structure_takes_no_steps() {
        let start = vec![Point3::new(1.0, 0.0, 0.0)];
        let calc = Arc::new(Harmonic {
            minimum: start.clone(),
            k: 3.0,
            e0: -13.6,
        });
        let mut atoms =
            AtomicSystem::new(vec!["H".into()], start.clone(), 0, 2).with_calculator(calc);

        let report = Bfgs::default()
            .run(&mut atoms, &Convergence::default())
            .unwrap();

        assert_eq!(report.steps, 0);
        assert!(report.converged);
        assert_eq!(report.energy, -13.6);
        assert_eq!(atoms.get_positions(), start.as_slice());
    }

    #[test]
    fn flatten_and_unflatten_are_inverse() {
        let points = vec![Point3::new(1.0, 2.0, 3.0), Point3::new(-4.0, 5.5, 0.0)];
        assert_eq!(unflatten_points(&flatten_points(&points)), points);
    }
}
