use super::atoms::AtomicSystem;
use super::config::Convergence;
use super::device::Device;
use super::error::{BoxError, EngineError};
use super::state::BatchedState;
use nalgebra::Vector3;
use std::sync::Arc;

/// Energy and forces of one atomic system, as returned by a [`Calculator`].
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// Potential energy in eV.
    pub energy: f64,
    /// Per-atom forces in eV/Angstrom (negative energy gradient).
    pub forces: Vec<Vector3<f64>>,
}

impl Evaluation {
    /// Largest per-atom force norm.
    pub fn max_force(&self) -> f64 {
        self.forces.iter().map(|f| f.norm()).fold(0.0, f64::max)
    }
}

/// A potential evaluated one structure at a time.
pub trait Calculator: Send + Sync {
    fn evaluate(&self, system: &AtomicSystem) -> Result<Evaluation, BoxError>;
}

/// A potential that relaxes a whole batch of systems in one call. Any
/// parallelism across systems is the model's own business.
pub trait BatchModel: Send + Sync {
    fn optimize(
        &self,
        state: BatchedState,
        convergence: &Convergence,
    ) -> Result<BatchedState, BoxError>;
}

/// Loads potential models by name onto a resolved device.
///
/// Loading is assumed to be expensive; callers go through the model caches in
/// [`OptimizationContext`](super::context::OptimizationContext) rather than
/// calling a provider directly.
pub trait ModelProvider: Send + Sync {
    fn load_calculator(
        &self,
        model_name: &str,
        device: Device,
    ) -> Result<Arc<dyn Calculator>, EngineError>;

    fn load_batch_model(
        &self,
        model_name: &str,
        device: Device,
    ) -> Result<Arc<dyn BatchModel>, EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_force_is_largest_norm() {
        let eval = Evaluation {
            energy: -1.0,
            forces: vec![
                Vector3::new(0.1, 0.0, 0.0),
                Vector3::new(0.0, -0.3, 0.4),
                Vector3::zeros(),
            ],
        };
        assert!((eval.max_force() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn max_force_of_empty_evaluation_is_zero() {
        let eval = Evaluation {
            energy: 0.0,
            forces: vec![],
        };
        assert_eq!(eval.max_force(), 0.0);
    }
}
