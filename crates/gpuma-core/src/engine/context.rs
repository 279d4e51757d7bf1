use super::builtin::BuiltinModels;
use super::cache::{
    BackendKind, BatchModelCache, CalculatorCache, ModelKey, global_batch_models,
    global_calculators,
};
use super::device::{Device, DeviceResolver, DeviceSpec};
use super::error::{ConfigError, EngineError};
use super::models::{BatchModel, Calculator, ModelProvider};
use super::progress::ProgressReporter;
use once_cell::sync::Lazy;
use std::fmt;
use std::sync::Arc;

/// Everything an optimization call needs besides its inputs: where models
/// come from, where they run, where loaded models are kept, and who hears
/// about progress.
///
/// A context is cheap to clone; clones share the provider and the caches.
/// [`OptimizationContext::new`] wires in the process-wide caches, so separate
/// contexts over the same provider still load each model at most once.
#[derive(Clone)]
pub struct OptimizationContext {
    provider: Arc<dyn ModelProvider>,
    resolver: DeviceResolver,
    calculators: Arc<CalculatorCache>,
    batch_models: Arc<BatchModelCache>,
    reporter: ProgressReporter,
}

impl fmt::Debug for OptimizationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptimizationContext")
            .field("cached_calculators", &self.calculators.len())
            .field("cached_batch_models", &self.batch_models.len())
            .field("reporter", &self.reporter)
            .finish()
    }
}

static DEFAULT_CONTEXT: Lazy<OptimizationContext> =
    Lazy::new(|| OptimizationContext::new(BuiltinModels::new()));

impl OptimizationContext {
    pub fn new(provider: impl ModelProvider + 'static) -> Self {
        Self::from_provider(Arc::new(provider))
    }

    pub fn from_provider(provider: Arc<dyn ModelProvider>) -> Self {
        Self {
            provider,
            resolver: DeviceResolver::new(),
            calculators: global_calculators(),
            batch_models: global_batch_models(),
            reporter: ProgressReporter::new(),
        }
    }

    /// The context used by the context-free entry points: built-in models,
    /// host device probing and the process-wide caches.
    pub fn global() -> &'static OptimizationContext {
        &DEFAULT_CONTEXT
    }

    pub fn with_resolver(mut self, resolver: DeviceResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Replaces the process-wide caches with fresh private ones.
    pub fn with_private_caches(mut self) -> Self {
        self.calculators = Arc::new(CalculatorCache::new());
        self.batch_models = Arc::new(BatchModelCache::new());
        self
    }

    pub fn with_reporter(mut self, reporter: ProgressReporter) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn reporter(&self) -> &ProgressReporter {
        &self.reporter
    }

    pub fn calculator_cache(&self) -> &CalculatorCache {
        &self.calculators
    }

    pub fn batch_model_cache(&self) -> &BatchModelCache {
        &self.batch_models
    }

    pub fn resolve_device(&self, spec: impl Into<DeviceSpec>) -> Result<Device, ConfigError> {
        self.resolver.resolve(spec)
    }

    /// The single-structure calculator for `model_name` on `device`, loaded
    /// through the provider on first use.
    pub fn calculator(
        &self,
        model_name: &str,
        device: Device,
    ) -> Result<Arc<dyn Calculator>, EngineError> {
        let key = ModelKey::new(model_name, device, BackendKind::SingleStructure);
        self.calculators
            .get_or_load(&key, || self.provider.load_calculator(model_name, device))
    }

    /// The batched model for `model_name` on `device`, loaded through the
    /// provider on first use.
    pub fn batch_model(
        &self,
        model_name: &str,
        device: Device,
    ) -> Result<Arc<dyn BatchModel>, EngineError> {
        let key = ModelKey::new(model_name, device, BackendKind::Batched);
        self.batch_models
            .get_or_load(&key, || self.provider.load_batch_model(model_name, device))
    }
}
