use super::atoms::AtomicSystem;
use super::batched::CalculatorBatchModel;
use super::device::Device;
use super::error::{BoxError, EngineError, ValidationError};
use super::minimize::FireParams;
use super::models::{BatchModel, Calculator, Evaluation, ModelProvider};
use crate::core::potentials::LennardJones;
use std::sync::Arc;
use tracing::{info, warn};

pub const LENNARD_JONES: &str = "lennard-jones";

/// Models that ship with the library and need no weights or network access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinModel {
    LennardJones,
}

impl BuiltinModel {
    /// Looks up a built-in model by name, case-insensitively.
    pub fn from_name(name: &str) -> Result<Self, ValidationError> {
        let normalized = name.trim().to_lowercase();
        match normalized.as_str() {
            "" => Err(ValidationError::EmptyModelName),
            LENNARD_JONES | "lj" => Ok(BuiltinModel::LennardJones),
            _ => Err(ValidationError::UnknownModel(name.to_string())),
        }
    }
}

pub struct LennardJonesCalculator {
    potential: LennardJones,
}

impl LennardJonesCalculator {
    pub fn new(potential: LennardJones) -> Self {
        Self { potential }
    }
}

impl Calculator for LennardJonesCalculator {
    fn evaluate(&self, system: &AtomicSystem) -> Result<Evaluation, BoxError> {
        let (energy, forces) = self
            .potential
            .energy_and_forces(system.symbols(), system.get_positions())?;
        Ok(Evaluation { energy, forces })
    }
}

/// The default [`ModelProvider`]: serves the built-in reference potentials.
///
/// Built-in potentials are evaluated on the host; a GPU device is accepted so
/// that cache keys and logs stay faithful to the request.
#[derive(Debug, Clone, Default)]
pub struct BuiltinModels {
    pub lennard_jones: LennardJones,
    pub fire: FireParams,
}

impl BuiltinModels {
    pub fn new() -> Self {
        Self::default()
    }

    fn calculator_for(
        &self,
        model_name: &str,
        device: Device,
    ) -> Result<Arc<dyn Calculator>, EngineError> {
        let model = BuiltinModel::from_name(model_name)?;
        if device.is_gpu() {
            warn!(%device, "Built-in potentials run on the host; ignoring GPU placement.");
        }
        info!(model = model_name, %device, "Loading built-in potential.");
        match model {
            BuiltinModel::LennardJones => {
                Ok(Arc::new(LennardJonesCalculator::new(self.lennard_jones)))
            }
        }
    }
}

impl ModelProvider for BuiltinModels {
    fn load_calculator(
        &self,
        model_name: &str,
        device: Device,
    ) -> Result<Arc<dyn Calculator>, EngineError> {
        self.calculator_for(model_name, device)
    }

    fn load_batch_model(
        &self,
        model_name: &str,
        device: Device,
    ) -> Result<Arc<dyn BatchModel>, EngineError> {
        let calculator = self.calculator_for(model_name, device)?;
        Ok(Arc::new(CalculatorBatchModel::new(calculator, self.fire)))
    }
}
