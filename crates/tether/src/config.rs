//! Runtime and scheduler configuration.

use std::fmt;

use tether_abi::{ForeignAbi, NativeAbi, WasmModule};
use tether_core::MemoryModel;

/// When a dropped object's finalizer runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FinalizationMode {
    /// Release synchronously inside `Drop`.
    #[default]
    OnDrop,
    /// Queue the release until [`FinalizationScheduler::collect`] runs,
    /// or until the pending queue reaches the collect threshold.
    ///
    /// [`FinalizationScheduler::collect`]: crate::FinalizationScheduler::collect
    Deferred,
}

/// Configuration for the finalization scheduler.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Finalization timing.
    ///
    /// Default: [`FinalizationMode::OnDrop`].
    pub mode: FinalizationMode,

    /// In deferred mode, run a collection pass automatically once this many
    /// finalizers are pending. 0 disables automatic collection.
    ///
    /// Default: 0.
    pub collect_threshold: usize,

    /// Initial capacity of the finalizer table.
    ///
    /// Default: 64.
    pub initial_capacity: usize,
}

impl SchedulerConfig {
    /// Default finalizer table capacity.
    pub const DEFAULT_INITIAL_CAPACITY: usize = 64;

    /// Default automatic collection threshold (disabled).
    pub const DEFAULT_COLLECT_THRESHOLD: usize = 0;

    /// Config for the given mode with default limits.
    pub fn new(mode: FinalizationMode) -> Self {
        Self {
            mode,
            collect_threshold: Self::DEFAULT_COLLECT_THRESHOLD,
            initial_capacity: Self::DEFAULT_INITIAL_CAPACITY,
        }
    }

    /// Deferred finalization with no automatic collection.
    pub fn deferred() -> Self {
        Self::new(FinalizationMode::Deferred)
    }

    /// Set the automatic collection threshold.
    pub fn with_collect_threshold(mut self, threshold: usize) -> Self {
        self.collect_threshold = threshold;
        self
    }

    /// Whether a pending queue of `len` entries should be collected now.
    pub(crate) fn should_collect(&self, len: usize) -> bool {
        self.collect_threshold > 0 && len >= self.collect_threshold
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::new(FinalizationMode::OnDrop)
    }
}

/// The foreign boundary a runtime talks to.
pub enum Abi {
    /// An in-process native library.
    ///
    /// Binding the library's free entry points is `unsafe` and happens in
    /// [`NativeAbi::new`] before the config is built.
    Native(NativeAbi),
    /// A WebAssembly module with the given memory model.
    Wasm {
        /// The instantiated module.
        module: Box<dyn WasmModule>,
        /// Pointer width of its linear memory.
        model: MemoryModel,
    },
    /// Any other implementation of the boundary, typically a test double.
    Custom(Box<dyn ForeignAbi>),
}

impl fmt::Debug for Abi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Abi::Native(abi) => f.debug_tuple("Native").field(abi).finish(),
            Abi::Wasm { model, .. } => f.debug_struct("Wasm").field("model", model).finish(),
            Abi::Custom(abi) => f.debug_tuple("Custom").field(&abi.abi()).finish(),
        }
    }
}

/// Everything needed to start a [`ForeignRuntime`](crate::ForeignRuntime).
#[derive(Debug)]
pub struct RuntimeConfig {
    /// Foreign boundary.
    pub abi: Abi,
    /// Finalizer scheduling.
    pub scheduler: SchedulerConfig,
}

impl RuntimeConfig {
    /// Native library with default scheduling.
    pub fn native(abi: NativeAbi) -> Self {
        Self {
            abi: Abi::Native(abi),
            scheduler: SchedulerConfig::default(),
        }
    }

    /// WebAssembly module with default scheduling.
    pub fn wasm(module: impl WasmModule + 'static, model: MemoryModel) -> Self {
        Self {
            abi: Abi::Wasm {
                module: Box::new(module),
                model,
            },
            scheduler: SchedulerConfig::default(),
        }
    }

    /// Custom boundary with default scheduling.
    pub fn custom(abi: impl ForeignAbi + 'static) -> Self {
        Self {
            abi: Abi::Custom(Box::new(abi)),
            scheduler: SchedulerConfig::default(),
        }
    }

    /// Replace the scheduler config.
    pub fn with_scheduler(mut self, scheduler: SchedulerConfig) -> Self {
        self.scheduler = scheduler;
        self
    }
}
