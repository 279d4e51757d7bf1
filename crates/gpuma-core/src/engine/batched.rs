use super::atoms::AtomicSystem;
use super::config::Convergence;
use super::error::{BoxError, EngineError};
use super::minimize::{FireParams, FireState, max_force_norm};
use super::models::{BatchModel, Calculator};
use super::state::BatchedState;
use rayon::prelude::*;
use std::sync::Arc;
use tracing::debug;

/// Relaxation progress of one system inside a batch.
struct SystemRun {
    atoms: AtomicSystem,
    fire: FireState,
    energy: f64,
    converged: bool,
}

impl SystemRun {
    /// Evaluates the current geometry and, unless converged or out of steps,
    /// moves it one FIRE step.
    fn advance(&mut self, fmax: f64, may_step: bool) -> Result<(), EngineError> {
        let evaluation = self.atoms.evaluate()?;
        self.energy = evaluation.energy;
        let forces = evaluation.forces.clone();

        let max_force = max_force_norm(&forces);
        if !max_force.is_finite() {
            return Err(EngineError::engine("Non-finite forces encountered"));
        }
        if max_force < fmax {
            self.converged = true;
            return Ok(());
        }
        if may_step {
            let mut positions = self.atoms.get_positions().to_vec();
            self.fire.step(&mut positions, &forces);
            self.atoms.set_positions(positions);
        }
        Ok(())
    }
}

/// Batched FIRE relaxation on top of any single-structure [`Calculator`].
///
/// All systems advance in lockstep, one step per iteration; within an
/// iteration the unconverged systems are evaluated in parallel on the rayon
/// pool. Converged systems are frozen while the rest continue.
pub struct CalculatorBatchModel {
    calculator: Arc<dyn Calculator>,
    params: FireParams,
}

impl CalculatorBatchModel {
    pub fn new(calculator: Arc<dyn Calculator>, params: FireParams) -> Self {
        Self { calculator, params }
    }
}

impl BatchModel for CalculatorBatchModel {
    fn optimize(
        &self,
        mut state: BatchedState,
        convergence: &Convergence,
    ) -> Result<BatchedState, BoxError> {
        state.check_consistency()?;

        let mut runs: Vec<SystemRun> = (0..state.n_systems())
            .map(|i| {
                let range = state.atom_range(i);
                SystemRun {
                    atoms: AtomicSystem::new(
                        state.symbols[range.clone()].to_vec(),
                        state.positions[range].to_vec(),
                        state.charge[i],
                        state.multiplicity[i],
                    )
                    .with_calculator(Arc::clone(&self.calculator)),
                    fire: FireState::new(self.params),
                    energy: f64::NAN,
                    converged: false,
                }
            })
            .collect();

        let mut steps = 0;
        for step in 0..=convergence.max_steps {
            let may_step = step < convergence.max_steps;
            runs.par_iter_mut()
                .enumerate()
                .filter(|(_, run)| !run.converged)
                .try_for_each(|(i, run)| {
                    run.advance(convergence.fmax, may_step)
                        .map_err(|e| e.at_structure(i))
                })?;
            steps = step;
            if runs.iter().all(|run| run.converged) {
                break;
            }
        }

        let converged = runs.iter().filter(|run| run.converged).count();
        debug!(
            systems = runs.len(),
            converged, steps, "Batched relaxation finished."
        );

        let offsets = state.system_offsets();
        for (run, offset) in runs.iter().zip(offsets) {
            let positions = run.atoms.get_positions();
            state.positions[offset..offset + positions.len()].copy_from_slice(positions);
        }
        state.energy = Some(runs.iter().map(|run| run.energy).collect());
        Ok(state)
    }
}
