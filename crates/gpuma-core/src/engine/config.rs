use super::device::DeviceSpec;
use super::error::{ConfigError, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_MODEL_NAME: &str = "lennard-jones";
pub const DEFAULT_DEVICE: &str = "cpu";
pub const DEFAULT_FORCE_CONVERGENCE: f64 = 0.05;
pub const DEFAULT_MAX_STEPS: usize = 500;

/// How a list of structures is scheduled onto the potential model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BatchMode {
    /// One local minimization per structure, in input order.
    Sequential,
    /// All structures packed into one batched state and relaxed in a single engine call.
    Batch,
}

impl BatchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchMode::Sequential => "sequential",
            BatchMode::Batch => "batch",
        }
    }
}

impl fmt::Display for BatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BatchMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sequential" => Ok(BatchMode::Sequential),
            "batch" => Ok(BatchMode::Batch),
            _ => Err(ValidationError::UnknownBatchMode(s.to_string())),
        }
    }
}

/// Convergence criteria shared by the single-structure and batched minimizers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Convergence {
    /// Largest per-atom force norm (eV/Angstrom) at which a system counts as relaxed.
    pub fmax: f64,
    pub max_steps: usize,
}

impl Default for Convergence {
    fn default() -> Self {
        Self {
            fmax: DEFAULT_FORCE_CONVERGENCE,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

/// The `[optimization]` section.
///
/// `batch_optimization_mode` is kept as written; it is parsed with
/// [`OptimizationConfig::batch_mode`] at dispatch time so that an unknown value
/// is reported verbatim. `device` is either a name such as `"cuda:1"`, checked
/// against the host at dispatch, or a [`Device`](super::device::Device) that was
/// resolved earlier and is used as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OptimizationConfig {
    pub model_name: String,
    pub device: DeviceSpec,
    pub batch_optimization_mode: String,
    pub force_convergence: f64,
    pub max_steps: usize,
    pub charge: i32,
    pub multiplicity: u32,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            model_name: DEFAULT_MODEL_NAME.to_string(),
            device: DeviceSpec::from(DEFAULT_DEVICE),
            batch_optimization_mode: BatchMode::Sequential.to_string(),
            force_convergence: DEFAULT_FORCE_CONVERGENCE,
            max_steps: DEFAULT_MAX_STEPS,
            charge: 0,
            multiplicity: 1,
        }
    }
}

impl OptimizationConfig {
    pub fn batch_mode(&self) -> Result<BatchMode, ValidationError> {
        self.batch_optimization_mode.parse()
    }

    pub fn convergence(&self) -> Convergence {
        Convergence {
            fmax: self.force_convergence,
            max_steps: self.max_steps,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub optimization: OptimizationConfig,
}

impl Config {
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

#[derive(Default)]
pub struct OptimizationConfigBuilder {
    model_name: Option<String>,
    device: Option<DeviceSpec>,
    batch_mode: Option<BatchMode>,
    force_convergence: Option<f64>,
    max_steps: Option<usize>,
    charge: Option<i32>,
    multiplicity: Option<u32>,
}

impl OptimizationConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn model_name(mut self, name: impl Into<String>) -> Self {
        self.model_name = Some(name.into());
        self
    }
    pub fn device(mut self, device: impl Into<DeviceSpec>) -> Self {
        self.device = Some(device.into());
        self
    }
    pub fn batch_mode(mut self, mode: BatchMode) -> Self {
        self.batch_mode = Some(mode);
        self
    }
    pub fn force_convergence(mut self, fmax: f64) -> Self {
        self.force_convergence = Some(fmax);
        self
    }
    pub fn max_steps(mut self, steps: usize) -> Self {
        self.max_steps = Some(steps);
        self
    }
    pub fn charge(mut self, charge: i32) -> Self {
        self.charge = Some(charge);
        self
    }
    pub fn multiplicity(mut self, multiplicity: u32) -> Self {
        self.multiplicity = Some(multiplicity);
        self
    }

    pub fn build(self) -> Result<Config, ConfigError> {
        let model_name = self
            .model_name
            .ok_or(ConfigError::MissingParameter("model_name"))?;

        let force_convergence = self.force_convergence.unwrap_or(DEFAULT_FORCE_CONVERGENCE);
        if !(force_convergence.is_finite() && force_convergence > 0.0) {
            return Err(ConfigError::InvalidValue {
                key: "force_convergence",
                value: force_convergence.to_string(),
            });
        }

        let multiplicity = self.multiplicity.unwrap_or(1);
        if multiplicity == 0 {
            return Err(ConfigError::InvalidValue {
                key: "multiplicity",
                value: multiplicity.to_string(),
            });
        }

        Ok(Config {
            optimization: OptimizationConfig {
                model_name,
                device: self.device.unwrap_or_else(|| DeviceSpec::from(DEFAULT_DEVICE)),
                batch_optimization_mode: self
                    .batch_mode
                    .unwrap_or(BatchMode::Sequential)
                    .to_string(),
                force_convergence,
                max_steps: self.max_steps.unwrap_or(DEFAULT_MAX_STEPS),
                charge: self.charge.unwrap_or(0),
                multiplicity,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::device::Device;

    #[test]
    fn defaults_are_sequential_on_cpu() {
        let config = Config::default();
        assert_eq!(config.optimization.model_name, DEFAULT_MODEL_NAME);
        assert_eq!(config.optimization.device, "cpu");
        assert_eq!(
            config.optimization.batch_mode().unwrap(),
            BatchMode::Sequential
        );
        assert_eq!(config.optimization.convergence(), Convergence::default());
    }

    #[test]
    fn batch_mode_parsing_is_case_insensitive() {
        assert_eq!("Batch".parse::<BatchMode>().unwrap(), BatchMode::Batch);
        assert_eq!(
            " SEQUENTIAL ".parse::<BatchMode>().unwrap(),
            BatchMode::Sequential
        );
    }

    #[test]
    fn unknown_batch_mode_names_the_value() {
        let mut config = Config::default();
        config.optimization.batch_optimization_mode = "parallel".to_string();
        let err = config.optimization.batch_mode().unwrap_err();
        assert_eq!(err, ValidationError::UnknownBatchMode("parallel".to_string()));
        assert!(err.to_string().contains("'parallel'"));
    }

    #[test]
    fn partial_toml_is_filled_with_defaults() {
        let config = Config::from_toml_str(
            r#"
            [optimization]
            model_name = "uma-s-1p1"
            batch_optimization_mode = "batch"
            "#,
        )
        .unwrap();
        assert_eq!(config.optimization.model_name, "uma-s-1p1");
        assert_eq!(config.optimization.batch_mode().unwrap(), BatchMode::Batch);
        assert_eq!(config.optimization.device, "cpu");
        assert_eq!(config.optimization.max_steps, DEFAULT_MAX_STEPS);
    }

    #[test]
    fn unknown_toml_keys_are_rejected() {
        let result = Config::from_toml_str(
            r#"
            [optimization]
            modle_name = "typo"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn toml_round_trip_preserves_values() {
        let config = OptimizationConfigBuilder::new()
            .model_name("lj")
            .device("cuda:1")
            .batch_mode(BatchMode::Batch)
            .force_convergence(0.01)
            .max_steps(50)
            .build()
            .unwrap();
        let text = config.to_toml_string().unwrap();
        assert_eq!(Config::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn resolved_device_is_kept_and_written_by_name() {
        let config = OptimizationConfigBuilder::new()
            .model_name("lj")
            .device(Device::Cuda(3))
            .build()
            .unwrap();
        assert_eq!(
            config.optimization.device,
            DeviceSpec::Resolved(Device::Cuda(3))
        );

        let text = config.to_toml_string().unwrap();
        assert!(text.contains("device = \"cuda:3\""));
        let reread = Config::from_toml_str(&text).unwrap();
        assert_eq!(
            reread.optimization.device,
            DeviceSpec::Named("cuda:3".to_string())
        );
    }

    #[test]
    fn builder_requires_model_name() {
        let result = OptimizationConfigBuilder::new().device("cpu").build();
        assert_eq!(result, Err(ConfigError::MissingParameter("model_name")));
    }

    #[test]
    fn builder_rejects_non_positive_fmax() {
        let result = OptimizationConfigBuilder::new()
            .model_name("lj")
            .force_convergence(0.0)
            .build();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue {
                key: "force_convergence",
                ..
            })
        ));
    }
}
