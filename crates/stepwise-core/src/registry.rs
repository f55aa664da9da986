//! Module registry: step type -> asynchronous module loader.
//!
//! Follows the RPITIT + boxed-dyn pattern:
//! 1. `ModuleLoader` is the ergonomic async trait (blanket-implemented for closures)
//! 2. `ModuleLoaderDyn` is its object-safe twin with boxed futures
//! 3. `BoxModuleLoader` wraps `Arc<dyn ModuleLoaderDyn>` and delegates
//!
//! Registration is expected before the first load but late registration is
//! allowed. Last registration for a type wins.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use tracing::warn;

// ---------------------------------------------------------------------------
// LoadedModule
// ---------------------------------------------------------------------------

/// What a loader produced.
///
/// Loaders may return a module namespace exposing a primary (`default`)
/// export, or the module value itself. The engine accepts both and renders
/// the primary export when one is present.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadedModule<M> {
    /// A namespace whose `default` export is preferred when present.
    Namespace { default: Option<M>, namespace: M },
    /// The module value itself.
    Bare(M),
}

impl<M> LoadedModule<M> {
    /// A namespace with a primary export.
    pub fn with_default(default: M, namespace: M) -> Self {
        LoadedModule::Namespace {
            default: Some(default),
            namespace,
        }
    }

    /// The value to render: the primary export, falling back to the module itself.
    pub fn into_primary(self) -> M {
        match self {
            LoadedModule::Namespace {
                default: Some(default),
                ..
            } => default,
            LoadedModule::Namespace { namespace, .. } => namespace,
            LoadedModule::Bare(module) => module,
        }
    }
}

impl<M> From<M> for LoadedModule<M> {
    fn from(module: M) -> Self {
        LoadedModule::Bare(module)
    }
}

// ---------------------------------------------------------------------------
// ModuleLoader
// ---------------------------------------------------------------------------

/// Asynchronously produces the UI module for a step type.
///
/// Implemented for any `Fn() -> impl Future<Output = anyhow::Result<L>>`
/// where `L: Into<LoadedModule<M>>`, so plain async closures can be
/// registered directly.
pub trait ModuleLoader<M>: Send + Sync {
    fn load(&self) -> impl Future<Output = anyhow::Result<LoadedModule<M>>> + Send;
}

impl<M, F, Fut, L> ModuleLoader<M> for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<L>> + Send + 'static,
    L: Into<LoadedModule<M>> + 'static,
{
    fn load(&self) -> impl Future<Output = anyhow::Result<LoadedModule<M>>> + Send {
        let fut = self();
        async move { fut.await.map(Into::into) }
    }
}

/// Object-safe version of [`ModuleLoader`] with boxed futures.
pub trait ModuleLoaderDyn<M>: Send + Sync {
    fn load_boxed(&self) -> BoxFuture<'_, anyhow::Result<LoadedModule<M>>>;
}

impl<M: 'static, T: ModuleLoader<M>> ModuleLoaderDyn<M> for T {
    fn load_boxed(&self) -> BoxFuture<'_, anyhow::Result<LoadedModule<M>>> {
        Box::pin(self.load())
    }
}

/// Type-erased, cheaply cloneable module loader.
pub struct BoxModuleLoader<M> {
    inner: Arc<dyn ModuleLoaderDyn<M>>,
}

impl<M: 'static> BoxModuleLoader<M> {
    /// Wrap a concrete loader.
    pub fn new<T: ModuleLoader<M> + 'static>(loader: T) -> Self {
        Self {
            inner: Arc::new(loader),
        }
    }

    /// Run the loader.
    pub async fn load(&self) -> anyhow::Result<LoadedModule<M>> {
        self.inner.load_boxed().await
    }
}

impl<M> Clone for BoxModuleLoader<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<M> fmt::Debug for BoxModuleLoader<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BoxModuleLoader")
    }
}

// ---------------------------------------------------------------------------
// ModuleRegistry
// ---------------------------------------------------------------------------

/// Registry of module loaders, indexed by step type.
pub struct ModuleRegistry<M> {
    loaders: HashMap<String, BoxModuleLoader<M>>,
}

impl<M> ModuleRegistry<M> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            loaders: HashMap::new(),
        }
    }

    /// Register a loader under `step_type`.
    ///
    /// An existing loader for the same type is replaced and a warning is
    /// logged. Returns `true` when a loader was replaced.
    pub fn register<T>(&mut self, step_type: impl Into<String>, loader: T) -> bool
    where
        M: 'static,
        T: ModuleLoader<M> + 'static,
    {
        self.register_boxed(step_type, BoxModuleLoader::new(loader))
    }

    /// Register an already type-erased loader.
    pub fn register_boxed(
        &mut self,
        step_type: impl Into<String>,
        loader: BoxModuleLoader<M>,
    ) -> bool {
        let step_type = step_type.into();
        let replaced = self.loaders.insert(step_type.clone(), loader).is_some();
        if replaced {
            warn!(%step_type, "overwriting loader for type");
        }
        replaced
    }

    /// Look up the loader for `step_type`.
    pub fn get(&self, step_type: &str) -> Option<BoxModuleLoader<M>> {
        self.loaders.get(step_type).cloned()
    }

    /// Whether a loader is registered for `step_type`.
    pub fn has(&self, step_type: &str) -> bool {
        self.loaders.contains_key(step_type)
    }

    /// All registered step types, unordered.
    pub fn types(&self) -> Vec<&str> {
        self.loaders.keys().map(|s| s.as_str()).collect()
    }
}

impl<M> Default for ModuleRegistry<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> fmt::Debug for ModuleRegistry<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("types", &self.types())
            .finish()
    }
}
