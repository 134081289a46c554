//! Backend factory and registration system.

use crate::{AccountBackend, Config, Result, UsermuxError};
use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

/// Factory function type for creating backends.
pub type BackendFactory = fn(Config) -> Result<Box<dyn AccountBackend>>;

static BACKEND_REGISTRY: OnceLock<RwLock<HashMap<String, BackendFactory>>> = OnceLock::new();

fn registry() -> &'static RwLock<HashMap<String, BackendFactory>> {
    BACKEND_REGISTRY.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Registers a backend factory function.
///
/// This is typically called from backend modules' `register()` functions
/// during library initialization.
///
/// # Example
///
/// ```no_run
/// use usermux::factory::register_backend;
/// use usermux::{AccountBackend, Config, Result};
///
/// fn my_backend_factory(config: Config) -> Result<Box<dyn AccountBackend>> {
///     // Create and return backend instance
///     # unimplemented!()
/// }
///
/// pub fn register() {
///     register_backend("mybackend", my_backend_factory);
/// }
/// ```
pub fn register_backend(backend_kind: &str, factory: BackendFactory) {
    let mut reg = registry().write().unwrap();
    reg.insert(backend_kind.to_string(), factory);
}

/// Creates a new backend from configuration.
///
/// The appropriate backend factory is looked up based on `config.backend`.
/// If the backend is not registered, an error is returned with a hint to
/// check feature flags.
///
/// # Errors
///
/// Returns an error if:
/// - Backend kind is not registered (missing feature flag or `register()` call)
/// - Backend factory returns an error during initialization
///
/// # Example
///
/// ```no_run
/// use usermux::{factory, BackendKind, Config};
///
/// # fn main() -> usermux::Result<()> {
/// usermux::init();
/// let config = Config::new(BackendKind::Posix);
/// let backend = factory::new_backend(config)?;
/// # Ok(())
/// # }
/// ```
pub fn new_backend(config: Config) -> Result<Box<dyn AccountBackend>> {
    let backend_name = config.backend.to_string();

    let reg = registry().read().unwrap();
    let factory = reg.get(&backend_name).ok_or_else(|| {
        UsermuxError::Other(anyhow::anyhow!(
            "unknown backend: {} (did you enable the '{}' feature flag?)",
            backend_name,
            backend_name
        ))
    })?;

    factory(config)
}
