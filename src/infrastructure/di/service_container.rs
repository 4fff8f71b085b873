//! Service container for dependency injection
//!
//! Wires up all services with their dependencies.

use std::sync::Arc;

use tracing::debug;

use crate::application::services::ResponseTreeService;
use crate::config::Settings;
use crate::infrastructure::store::TomlFileStore;
use crate::infrastructure::traits::NodeStore;

/// Container holding all application services.
pub struct ServiceContainer {
    /// Application settings
    pub settings: Arc<Settings>,

    /// Node store backing every response tree
    pub store: Arc<dyn NodeStore>,

    /// Response tree operations
    pub responses: ResponseTreeService,
}

impl ServiceContainer {
    /// Create a new service container backed by the configured TOML store.
    pub fn new(settings: Settings) -> Self {
        debug!("using data file {}", settings.data_file.display());
        let store = Arc::new(TomlFileStore::new(settings.data_file.clone()));
        Self::with_deps(settings, store)
    }

    /// Create a service container with a custom store (for testing).
    pub fn with_deps(settings: Settings, store: Arc<dyn NodeStore>) -> Self {
        let settings = Arc::new(settings);
        let responses = ResponseTreeService::new(Arc::clone(&store));

        Self {
            settings,
            store,
            responses,
        }
    }
}
