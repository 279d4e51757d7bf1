use crate::cli::OptimizeArgs;
use crate::error::{CliError, Result};
use gpuma::engine::config::{self as core_config, BatchMode};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialOptimizationConfig {
    model_name: Option<String>,
    device: Option<String>,
    batch_optimization_mode: Option<String>,
    force_convergence: Option<f64>,
    max_steps: Option<usize>,
    charge: Option<i32>,
    multiplicity: Option<u32>,
}

/// A configuration file as written by the user: every key is optional and
/// falls back to CLI flags, then to the library defaults.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PartialConfig {
    optimization: Option<PartialOptimizationConfig>,
}

impl From<&core_config::Config> for PartialConfig {
    fn from(config: &core_config::Config) -> Self {
        let opt = &config.optimization;
        Self {
            optimization: Some(PartialOptimizationConfig {
                model_name: Some(opt.model_name.clone()),
                device: Some(opt.device.to_string()),
                batch_optimization_mode: Some(opt.batch_optimization_mode.clone()),
                force_convergence: Some(opt.force_convergence),
                max_steps: Some(opt.max_steps),
                charge: Some(opt.charge),
                multiplicity: Some(opt.multiplicity),
            }),
        }
    }
}

impl PartialConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    /// Renders the configuration in the file format [`PartialConfig::from_file`] reads.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| CliError::Config(e.to_string()))
    }

    /// Layers `-S` overrides onto the file values, then CLI flags on top, then
    /// fills whatever is still unset with defaults.
    pub fn merge_with_cli(mut self, args: &OptimizeArgs) -> Result<core_config::Config> {
        self.apply_set_values(&args.set_values)?;
        let file = self.optimization.take().unwrap_or_default();

        let mode = match args.mode.as_ref().or(file.batch_optimization_mode.as_ref()) {
            Some(raw) => BatchMode::from_str(raw)
                .map_err(|e| CliError::Config(e.to_string()))?,
            None => BatchMode::Sequential,
        };

        let mut builder = core_config::OptimizationConfigBuilder::new()
            .model_name(
                args.model
                    .clone()
                    .or(file.model_name)
                    .unwrap_or_else(|| core_config::DEFAULT_MODEL_NAME.to_string()),
            )
            .batch_mode(mode);

        if let Some(device) = args.device.clone().or(file.device) {
            builder = builder.device(device);
        }
        if let Some(fmax) = args.fmax.or(file.force_convergence) {
            builder = builder.force_convergence(fmax);
        }
        if let Some(steps) = args.max_steps.or(file.max_steps) {
            builder = builder.max_steps(steps);
        }
        if let Some(charge) = args.charge.or(file.charge) {
            builder = builder.charge(charge);
        }
        if let Some(multiplicity) = args.multiplicity.or(file.multiplicity) {
            builder = builder.multiplicity(multiplicity);
        }

        builder.build().map_err(|e| CliError::Config(e.to_string()))
    }

    fn apply_set_values(&mut self, set_values: &[String]) -> Result<()> {
        for kv_pair in set_values {
            let Some((key, value_str)) = kv_pair.split_once('=') else {
                return Err(CliError::Config(format!(
                    "Invalid --set format: '{}'. Expected KEY=VALUE.",
                    kv_pair
                )));
            };
            let key = key.trim();
            let value_str = value_str.trim();
            let opt = self.optimization.get_or_insert_with(Default::default);

            match key {
                "optimization.model-name" => opt.model_name = Some(value_str.to_string()),
                "optimization.device" => opt.device = Some(value_str.to_string()),
                "optimization.batch-optimization-mode" => {
                    opt.batch_optimization_mode = Some(value_str.to_string())
                }
                "optimization.force-convergence" => {
                    opt.force_convergence = Some(parse_value(key, value_str, "float")?)
                }
                "optimization.max-steps" => {
                    opt.max_steps = Some(parse_value(key, value_str, "integer")?)
                }
                "optimization.charge" => opt.charge = Some(parse_value(key, value_str, "integer")?),
                "optimization.multiplicity" => {
                    opt.multiplicity = Some(parse_value(key, value_str, "integer")?)
                }
                _ => {
                    return Err(CliError::Config(format!(
                        "Unsupported configuration key for --set: '{}'",
                        key
                    )));
                }
            }
        }
        Ok(())
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str, kind: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| CliError::Config(format!("Invalid {} value for {}: {}", kind, key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;
    use once_cell::sync::Lazy;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::{TempDir, tempdir};

    static TEST_DIR: Lazy<TempDir> = Lazy::new(|| tempdir().expect("Failed to create temp dir"));

    fn write_config_file(name: &str, content: &str) -> PathBuf {
        let file_path = TEST_DIR.path().join(name);
        fs::write(&file_path, content).unwrap();
        file_path
    }

    fn optimize_args(extra: &[&str]) -> OptimizeArgs {
        let mut argv = vec!["gpuma", "optimize", "-i", "in.xyz", "-o", "out.xyz"];
        argv.extend_from_slice(extra);
        match Cli::parse_from(argv).command {
            Commands::Optimize(args) => args,
            other => panic!("Expected 'optimize' subcommand, got {:?}", other),
        }
    }

    #[test]
    fn empty_config_yields_library_defaults() {
        let config = PartialConfig::default()
            .merge_with_cli(&optimize_args(&[]))
            .unwrap();
        assert_eq!(config, core_config::Config::default());
    }

    #[test]
    fn file_values_are_used_when_cli_is_silent() {
        let path = write_config_file(
            "file_values.toml",
            r#"
            [optimization]
            model-name = "lj"
            device = "cuda:1"
            batch-optimization-mode = "batch"
            force-convergence = 0.01
            max-steps = 42
            charge = -1
            multiplicity = 2
            "#,
        );

        let config = PartialConfig::from_file(&path)
            .unwrap()
            .merge_with_cli(&optimize_args(&[]))
            .unwrap();
        let opt = &config.optimization;

        assert_eq!(opt.model_name, "lj");
        assert_eq!(opt.device, "cuda:1");
        assert_eq!(opt.batch_mode().unwrap(), BatchMode::Batch);
        assert_eq!(opt.force_convergence, 0.01);
        assert_eq!(opt.max_steps, 42);
        assert_eq!(opt.charge, -1);
        assert_eq!(opt.multiplicity, 2);
    }

    #[test]
    fn cli_flags_override_file_values() {
        let path = write_config_file(
            "cli_override.toml",
            r#"
            [optimization]
            max-steps = 42
            batch-optimization-mode = "batch"
            "#,
        );

        let args = optimize_args(&["--max-steps", "7", "--mode", "sequential", "--fmax", "0.2"]);
        let config = PartialConfig::from_file(&path)
            .unwrap()
            .merge_with_cli(&args)
            .unwrap();

        assert_eq!(config.optimization.max_steps, 7);
        assert_eq!(config.optimization.force_convergence, 0.2);
        assert_eq!(
            config.optimization.batch_mode().unwrap(),
            BatchMode::Sequential
        );
    }

    #[test]
    fn set_values_override_file_but_not_flags() {
        let path = write_config_file(
            "set_values.toml",
            r#"
            [optimization]
            max-steps = 42 # Will be overridden by --set
            device = "cpu"
            "#,
        );

        let args = optimize_args(&[
            "-S",
            "optimization.max-steps=99",
            "-S",
            "optimization.device=cuda",
            "--device",
            "cuda:0",
        ]);
        let config = PartialConfig::from_file(&path)
            .unwrap()
            .merge_with_cli(&args)
            .unwrap();

        assert_eq!(config.optimization.max_steps, 99);
        assert_eq!(config.optimization.device, "cuda:0");
    }

    #[test]
    fn unknown_file_keys_are_rejected() {
        let path = write_config_file(
            "unknown_key.toml",
            r#"
            [optimization]
            num-solutions = 5
            "#,
        );
        let result = PartialConfig::from_file(&path);
        assert!(matches!(result, Err(CliError::FileParsing { .. })));
    }

    #[test]
    fn malformed_set_values_are_config_errors() {
        for bad in [
            "optimization.max-steps",
            "optimization.max-steps=many",
            "optimization.force-convergence=fast",
            "forcefield.s-factor=1.0",
        ] {
            let args = optimize_args(&["-S", bad]);
            let result = PartialConfig::default().merge_with_cli(&args);
            assert!(
                matches!(result, Err(CliError::Config(_))),
                "'{}' should be rejected",
                bad
            );
        }
    }

    #[test]
    fn unknown_mode_is_reported_verbatim() {
        let args = optimize_args(&["--mode", "turbo"]);
        let Err(CliError::Config(msg)) = PartialConfig::default().merge_with_cli(&args) else {
            panic!("Expected a configuration error");
        };
        assert!(msg.contains("turbo"));
    }

    #[test]
    fn invalid_threshold_fails_the_build() {
        let args = optimize_args(&["--fmax", "0"]);
        let result = PartialConfig::default().merge_with_cli(&args);
        assert!(matches!(result, Err(CliError::Config(msg)) if msg.contains("force_convergence")));
    }
}
