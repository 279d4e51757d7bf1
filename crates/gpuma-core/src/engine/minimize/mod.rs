//! Local minimizers that relax a single [`AtomicSystem`] against its attached calculator.
//!
//! - [`bfgs`] - Quasi-Newton BFGS with a dense Hessian estimate; the default for
//!   single-structure optimization
//! - [`fire`] - Fast Inertial Relaxation Engine integrator state; drives the built-in
//!   batched model

pub mod bfgs;
pub mod fire;

use super::atoms::AtomicSystem;
use super::config::Convergence;
use super::error::EngineError;
use nalgebra::Vector3;

pub use bfgs::Bfgs;
pub use fire::{FireParams, FireState};

/// Outcome of one local minimization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinimizationReport {
    /// Number of position updates performed.
    pub steps: usize,
    pub converged: bool,
    /// Largest per-atom force norm at the final geometry.
    pub max_force: f64,
    /// Potential energy at the final geometry.
    pub energy: f64,
}

/// Iterates an atomic system toward a local energy minimum.
///
/// A minimizer is bound to nothing until [`run`](LocalOptimizer::run) is called;
/// it may keep internal history (e.g. a Hessian estimate) across steps of one run.
pub trait LocalOptimizer {
    fn run(
        &mut self,
        atoms: &mut AtomicSystem,
        convergence: &Convergence,
    ) -> Result<MinimizationReport, EngineError>;
}

pub(crate) fn max_force_norm(forces: &[Vector3<f64>]) -> f64 {
    forces.iter().map(|f| f.norm()).fold(0.0, f64::max)
}

/// The driver loop shared by all minimizers: evaluate, test convergence, step.
pub(crate) fn drive<S>(
    atoms: &mut AtomicSystem,
    convergence: &Convergence,
    mut step: S,
) -> Result<MinimizationReport, EngineError>
where
    S: FnMut(&mut AtomicSystem, &[Vector3<f64>]) -> Result<(), EngineError>,
{
    let mut steps = 0;
    loop {
        let evaluation = atoms.evaluate()?;
        let energy = evaluation.energy;
        let forces = evaluation.forces.clone();
        let max_force = max_force_norm(&forces);

        if !max_force.is_finite() {
            return Err(EngineError::engine(format!(
                "Non-finite forces encountered after {} steps",
                steps
            )));
        }

        let converged = max_force < convergence.fmax;
        if converged || steps >= convergence.max_steps {
            return Ok(MinimizationReport {
                steps,
                converged,
                max_force,
                energy,
            });
        }

        step(atoms, &forces)?;
        steps += 1;
    }
}
