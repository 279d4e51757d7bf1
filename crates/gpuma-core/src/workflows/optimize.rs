use crate::core::models::structure::Structure;
use crate::engine::atoms::AtomicSystem;
use crate::engine::config::{BatchMode, Config};
use crate::engine::context::OptimizationContext;
use crate::engine::error::{EngineError, ValidationError};
use crate::engine::minimize::{Bfgs, LocalOptimizer};
use crate::engine::models::Calculator;
use crate::engine::progress::Progress;
use crate::engine::state::BatchedState;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Optimizes every structure in `structures` and returns them, in input order,
/// with relaxed coordinates and `energy` set.
///
/// Runs against the process-wide [`OptimizationContext::global`]; see
/// [`optimize_structure_batch_with`] for the full contract.
pub fn optimize_structure_batch(
    structures: &[Structure],
    config: &Config,
    calculator: Option<Arc<dyn Calculator>>,
) -> Result<Vec<Structure>, EngineError> {
    optimize_structure_batch_with(OptimizationContext::global(), structures, config, calculator)
}

/// Relaxes one structure with a local minimizer. See
/// [`optimize_single_structure_with`].
pub fn optimize_single_structure(
    structure: &Structure,
    config: &Config,
    calculator: Option<Arc<dyn Calculator>>,
) -> Result<Structure, EngineError> {
    optimize_single_structure_with(OptimizationContext::global(), structure, config, calculator)
}

/// Relaxes all structures in one batched engine call. See
/// [`optimize_batch_with`].
pub fn optimize_batch(
    structures: &[Structure],
    config: &Config,
) -> Result<Vec<Structure>, EngineError> {
    optimize_batch_with(OptimizationContext::global(), structures, config)
}

/// The dispatch entry point.
///
/// - An empty list returns an empty list without touching any model.
/// - Every structure is validated before anything else happens; one malformed
///   structure fails the whole call.
/// - `optimization.batch_optimization_mode` selects the back-end:
///   `sequential` relaxes structures one by one (reusing `calculator` when
///   given, otherwise the cached calculator), `batch` hands the whole list to
///   the batched model once. Any other value is rejected.
///
/// Errors abort the call; no partial results are returned. In sequential mode
/// an engine failure is annotated with the index of the failing structure.
#[instrument(skip_all, name = "optimize_structure_batch", fields(structures = structures.len()))]
pub fn optimize_structure_batch_with(
    context: &OptimizationContext,
    structures: &[Structure],
    config: &Config,
    calculator: Option<Arc<dyn Calculator>>,
) -> Result<Vec<Structure>, EngineError> {
    if structures.is_empty() {
        debug!("No structures given; nothing to optimize.");
        return Ok(Vec::new());
    }
    validate_all(structures)?;

    let mode = config.optimization.batch_mode()?;
    info!(
        mode = %mode,
        model = %config.optimization.model_name,
        device = %config.optimization.device,
        "Dispatching {} structure(s).",
        structures.len()
    );

    match mode {
        BatchMode::Sequential => optimize_sequential(context, structures, config, calculator),
        BatchMode::Batch => {
            if calculator.is_some() {
                debug!("A supplied calculator is not used in batch mode.");
            }
            optimize_batch_with(context, structures, config)
        }
    }
}

fn optimize_sequential(
    context: &OptimizationContext,
    structures: &[Structure],
    config: &Config,
    calculator: Option<Arc<dyn Calculator>>,
) -> Result<Vec<Structure>, EngineError> {
    let calculator = match calculator {
        Some(calculator) => calculator,
        None => load_calculator(context, config)?,
    };

    let reporter = context.reporter();
    reporter.report(Progress::TaskStart {
        total_steps: structures.len() as u64,
    });

    let results: Result<Vec<_>, _> = structures
        .iter()
        .enumerate()
        .map(|(index, structure)| -> Result<Structure, EngineError> {
            let relaxed = relax(structure, config, Arc::clone(&calculator))
                .map_err(|e| e.at_structure(index))?;
            reporter.report(Progress::TaskIncrement);
            Ok(relaxed)
        })
        .collect();

    // Closed on failure too.
    reporter.report(Progress::TaskFinish);
    let results = results?;
    info!("Sequential optimization of {} structure(s) complete.", results.len());
    Ok(results)
}

/// Relaxes `structure` with a fresh BFGS minimizer and returns a new structure
/// with the final coordinates and potential energy. Symbols, charge,
/// multiplicity, comment and metadata are copied from the input.
///
/// A supplied `calculator` is used as-is; otherwise the calculator for
/// `optimization.model_name` on `optimization.device` is taken from the
/// context's cache.
#[instrument(skip_all, name = "optimize_single_structure")]
pub fn optimize_single_structure_with(
    context: &OptimizationContext,
    structure: &Structure,
    config: &Config,
    calculator: Option<Arc<dyn Calculator>>,
) -> Result<Structure, EngineError> {
    structure.validate(0)?;
    let calculator = match calculator {
        Some(calculator) => calculator,
        None => load_calculator(context, config)?,
    };
    relax(structure, config, calculator)
}

/// Packs `structures` into one batched state, runs the batched model once, and
/// unpacks the result in input order.
///
/// The batch is all-or-nothing: if the engine fails, no structure is returned.
#[instrument(skip_all, name = "optimize_batch", fields(structures = structures.len()))]
pub fn optimize_batch_with(
    context: &OptimizationContext,
    structures: &[Structure],
    config: &Config,
) -> Result<Vec<Structure>, EngineError> {
    if structures.is_empty() {
        return Err(ValidationError::EmptyBatch.into());
    }
    validate_all(structures)?;
    validate_model_name(config)?;

    let reporter = context.reporter();
    reporter.report(Progress::PhaseStart {
        name: "Batched optimization",
    });

    let results = run_batched(context, structures, config);
    reporter.report(Progress::PhaseFinish);
    let results = results?;
    info!("Batched optimization of {} structure(s) complete.", results.len());
    Ok(results)
}

fn run_batched(
    context: &OptimizationContext,
    structures: &[Structure],
    config: &Config,
) -> Result<Vec<Structure>, EngineError> {
    let device = context.resolve_device(config.optimization.device.clone())?;
    let model = context.batch_model(&config.optimization.model_name, device)?;
    let state = BatchedState::from_structures(structures, device)?;
    debug!(
        systems = state.n_systems(),
        atoms = state.n_atoms(),
        %device,
        "Packed batched state."
    );

    let final_state = model
        .optimize(state, &config.optimization.convergence())
        .map_err(EngineError::from_boxed)?;
    final_state.to_structures(structures)
}

fn validate_all(structures: &[Structure]) -> Result<(), ValidationError> {
    structures
        .iter()
        .enumerate()
        .try_for_each(|(index, structure)| structure.validate(index))
}

fn validate_model_name(config: &Config) -> Result<(), ValidationError> {
    if config.optimization.model_name.trim().is_empty() {
        return Err(ValidationError::EmptyModelName);
    }
    Ok(())
}

fn load_calculator(
    context: &OptimizationContext,
    config: &Config,
) -> Result<Arc<dyn Calculator>, EngineError> {
    validate_model_name(config)?;
    let device = context.resolve_device(config.optimization.device.clone())?;
    context.calculator(&config.optimization.model_name, device)
}

fn relax(
    structure: &Structure,
    config: &Config,
    calculator: Arc<dyn Calculator>,
) -> Result<Structure, EngineError> {
    let mut atoms = AtomicSystem::from_structure(structure).with_calculator(calculator);
    let report = Bfgs::default().run(&mut atoms, &config.optimization.convergence())?;
    debug!(
        steps = report.steps,
        converged = report.converged,
        energy = report.energy,
        "Local minimization finished."
    );
    let energy = atoms.get_potential_energy()?;
    Ok(structure.relaxed(atoms.get_positions().to_vec(), energy))
}
