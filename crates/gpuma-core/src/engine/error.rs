use thiserror::Error;

/// Boxed error produced by an external potential model or simulation engine.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Malformed input, detected before any model is loaded or device touched.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ValidationError {
    #[error("At least one structure is required")]
    EmptyBatch,

    #[error("Structure {index} has no atoms")]
    EmptyStructure { index: usize },

    #[error("Structure {index} has {symbols} symbols but {coordinates} coordinates")]
    LengthMismatch {
        index: usize,
        symbols: usize,
        coordinates: usize,
    },

    #[error("Structure {index} has invalid multiplicity {multiplicity} (must be >= 1)")]
    NonPositiveMultiplicity { index: usize, multiplicity: u32 },

    #[error("Model name must not be empty")]
    EmptyModelName,

    #[error("Unknown model '{0}'")]
    UnknownModel(String),

    #[error("Unknown batch optimization mode '{0}' (expected 'sequential' or 'batch')")]
    UnknownBatchMode(String),
}

/// A configuration that is well-formed but cannot be honored on this host.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Invalid value '{value}' for '{key}'")]
    InvalidValue { key: &'static str, value: String },

    #[error("Invalid device specification '{0}'")]
    InvalidDevice(String),

    #[error("Device '{device}' is not available: {reason}")]
    DeviceUnavailable { device: String, reason: String },
}

/// Coarse classification of an [`EngineError`], for callers that only need to branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    Configuration,
    Engine,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Configuration(#[from] ConfigError),

    /// A failure raised by the potential model, the minimizer or the batched
    /// engine. The original error is kept untouched as `source`.
    #[error("{}{source}", failure_prefix(.structure))]
    Engine {
        structure: Option<usize>,
        #[source]
        source: BoxError,
    },
}

fn failure_prefix(structure: &Option<usize>) -> String {
    match structure {
        Some(index) => format!("Optimization of structure {} failed: ", index),
        None => "Optimization failed: ".to_string(),
    }
}

impl EngineError {
    pub fn engine(source: impl Into<BoxError>) -> Self {
        Self::Engine {
            structure: None,
            source: source.into(),
        }
    }

    /// Recovers an `EngineError` that a model passed back through a boxed
    /// error; anything else is wrapped as an engine failure.
    pub fn from_boxed(error: BoxError) -> Self {
        match error.downcast::<EngineError>() {
            Ok(engine_error) => *engine_error,
            Err(other) => Self::Engine {
                structure: None,
                source: other,
            },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Engine { .. } => ErrorKind::Engine,
        }
    }

    /// Attributes an engine failure to the structure at `index` in the caller's list.
    /// Validation and configuration errors already carry their own context and
    /// pass through unchanged.
    pub fn at_structure(self, index: usize) -> Self {
        match self {
            Self::Engine { source, .. } => Self::Engine {
                structure: Some(index),
                source,
            },
            other => other,
        }
    }

    /// Index of the structure whose optimization failed, when known.
    pub fn structure_index(&self) -> Option<usize> {
        match self {
            Self::Engine { structure, .. } => *structure,
            Self::Validation(ValidationError::EmptyStructure { index })
            | Self::Validation(ValidationError::LengthMismatch { index, .. })
            | Self::Validation(ValidationError::NonPositiveMultiplicity { index, .. }) => {
                Some(*index)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[derive(Debug, Error)]
    #[error("NaN in forces")]
    struct NanForces;

    #[test]
    fn kind_reflects_variant() {
        assert_eq!(
            EngineError::from(ValidationError::EmptyModelName).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            EngineError::from(ConfigError::InvalidDevice("tpu".into())).kind(),
            ErrorKind::Configuration
        );
        assert_eq!(EngineError::engine(NanForces).kind(), ErrorKind::Engine);
    }

    #[test]
    fn at_structure_annotates_engine_errors_and_keeps_source() {
        let err = EngineError::engine(NanForces).at_structure(4);
        assert_eq!(err.structure_index(), Some(4));
        assert_eq!(
            err.to_string(),
            "Optimization of structure 4 failed: NaN in forces"
        );
        let source = err.source().expect("source should be preserved");
        assert!(source.downcast_ref::<NanForces>().is_some());
    }

    #[test]
    fn at_structure_leaves_validation_errors_alone() {
        let err = EngineError::from(ValidationError::UnknownBatchMode("turbo".into()))
            .at_structure(2);
        assert!(matches!(
            err,
            EngineError::Validation(ValidationError::UnknownBatchMode(ref m)) if m == "turbo"
        ));
        assert!(err.to_string().contains("turbo"));
    }

    #[test]
    fn unannotated_engine_error_has_generic_prefix() {
        let err = EngineError::engine("engine exploded");
        assert_eq!(err.to_string(), "Optimization failed: engine exploded");
        assert_eq!(err.structure_index(), None);
    }

    #[test]
    fn from_boxed_unwraps_engine_errors() {
        let boxed: BoxError = Box::new(EngineError::engine(NanForces).at_structure(1));
        let err = EngineError::from_boxed(boxed);
        assert_eq!(err.structure_index(), Some(1));

        let foreign: BoxError = Box::new(NanForces);
        let err = EngineError::from_boxed(foreign);
        assert_eq!(err.kind(), ErrorKind::Engine);
        assert_eq!(err.to_string(), "Optimization failed: NaN in forces");
    }
}
