use crate::cli::OptimizeArgs;
use crate::config::PartialConfig;
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use gpuma::{
    core::io::xyz,
    core::models::structure::Structure,
    engine::{config::Config, context::OptimizationContext, progress::ProgressReporter},
    workflows,
};
use std::path::Path;
use tracing::{info, warn};

pub fn run(args: OptimizeArgs) -> Result<()> {
    let progress_handler = CliProgressHandler::new();
    let optimized = execute(&args, progress_handler.reporter())?;

    println!(
        "Optimized {} structure(s); results written to: {}",
        optimized.len(),
        args.output.display()
    );
    for (i, structure) in optimized.iter().enumerate() {
        match structure.energy {
            Some(energy) => println!("  Structure {}: {:.6} eV", i + 1, energy),
            None => println!("  Structure {}: no energy reported", i + 1),
        }
    }
    Ok(())
}

fn execute(args: &OptimizeArgs, reporter: ProgressReporter) -> Result<Vec<Structure>> {
    let partial_config = match &args.config {
        Some(path) => PartialConfig::from_file(path)?,
        None => PartialConfig::default(),
    };
    info!("Merging configuration from file and CLI arguments...");
    let config = partial_config.merge_with_cli(args)?;

    info!("Loading input structures from {:?}", &args.input);
    let structures = load_structures(&args.input, args.multi, &config)?;
    info!(
        structures = structures.len(),
        model = %config.optimization.model_name,
        mode = %config.optimization.batch_optimization_mode,
        "Invoking the optimization workflow..."
    );

    let context = OptimizationContext::global().clone().with_reporter(reporter);
    let optimized =
        workflows::optimize::optimize_structure_batch_with(&context, &structures, &config, None)?;

    if optimized.iter().any(|s| s.energy.is_none()) {
        warn!("Some structures came back without an energy.");
    }

    xyz::write_multi_xyz(&optimized, &args.output, None)
        .map_err(|e| CliError::file_parsing(&args.output, e))?;
    info!("Wrote {} structure(s) to {:?}", optimized.len(), &args.output);

    Ok(optimized)
}

fn load_structures(input: &Path, multi: bool, config: &Config) -> Result<Vec<Structure>> {
    let charge = config.optimization.charge;
    let multiplicity = config.optimization.multiplicity;

    if input.is_dir() {
        if multi {
            return Err(CliError::Argument(
                "--multi applies to a single input file, not a directory".to_string(),
            ));
        }
        return xyz::read_xyz_directory(input, charge, multiplicity)
            .map_err(|e| CliError::file_parsing(input, e));
    }

    let structures = if multi {
        xyz::read_multi_xyz(input, charge, multiplicity)
    } else {
        xyz::read_xyz(input, charge, multiplicity).map(|s| vec![s])
    };
    structures.map_err(|e| CliError::file_parsing(input, e))
}
