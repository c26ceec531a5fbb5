use super::model::{PluginConfiguration, ScriptEntry};
use crate::common::error::InjectorError;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

/// Host capability that persists the plugin configuration.
pub trait ConfigPersistence: Send + Sync {
    fn load(&self) -> Result<PluginConfiguration, InjectorError>;
    fn save(&self, config: &PluginConfiguration) -> Result<(), InjectorError>;
}

/// JSON file persistence with dependency injection support
pub struct JsonFileStorage {
    pub path: PathBuf,
}

impl JsonFileStorage {
    /// Create storage for a custom file path
    pub fn new(path: PathBuf) -> Result<Self, InjectorError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(Self { path })
    }

    /// Create storage from app config
    pub fn from_config() -> Result<Self, InjectorError> {
        let config_dir = crate::config::get_config_dir().map_err(InjectorError::Config)?;
        Self::new(config_dir.join("plugin.json"))
    }
}

impl ConfigPersistence for JsonFileStorage {
    fn load(&self) -> Result<PluginConfiguration, InjectorError> {
        if !self.path.exists() {
            return Ok(PluginConfiguration::default());
        }
        let content = fs::read_to_string(&self.path)?;

        match serde_json::from_str::<PluginConfiguration>(&content) {
            Ok(config) => Ok(config),
            Err(e) => {
                log::warn!(
                    "[Store] Failed to parse {:?}: {}. Using default.",
                    self.path,
                    e
                );
                Ok(PluginConfiguration::default())
            }
        }
    }

    fn save(&self, config: &PluginConfiguration) -> Result<(), InjectorError> {
        let content = serde_json::to_string_pretty(config)?;
        fs::write(&self.path, content)?;
        Ok(())
    }
}

/// In-memory script store backed by a persistence capability.
///
/// The configuration is `None` until the host has loaded it; every accessor
/// reports that state instead of inventing an empty configuration.
pub struct ScriptStore {
    config: RwLock<Option<PluginConfiguration>>,
    persistence: Arc<dyn ConfigPersistence>,
}

impl ScriptStore {
    /// Create a store whose configuration has not been loaded yet.
    pub fn new(persistence: Arc<dyn ConfigPersistence>) -> Self {
        Self {
            config: RwLock::new(None),
            persistence,
        }
    }

    /// Create a store and load its configuration immediately.
    pub fn open(persistence: Arc<dyn ConfigPersistence>) -> Result<Self, InjectorError> {
        let store = Self::new(persistence);
        store.load()?;
        Ok(store)
    }

    /// (Re)load the configuration from persistence.
    pub fn load(&self) -> Result<(), InjectorError> {
        let loaded = self.persistence.load()?;
        let mut guard = self
            .config
            .write()
            .map_err(|_| InjectorError::Config("store lock poisoned".into()))?;
        log::debug!(
            "[Store] Loaded {} custom and {} registered scripts",
            loaded.custom_java_scripts.len(),
            loaded.plugin_java_scripts.len()
        );
        *guard = Some(loaded);
        Ok(())
    }

    pub fn is_available(&self) -> bool {
        self.config.read().map(|c| c.is_some()).unwrap_or(false)
    }

    /// Run `f` against the current configuration, or `None` when unavailable.
    pub fn read<R>(&self, f: impl FnOnce(&PluginConfiguration) -> R) -> Option<R> {
        let guard = self.config.read().ok()?;
        guard.as_ref().map(f)
    }

    pub fn snapshot(&self) -> Option<PluginConfiguration> {
        self.read(Clone::clone)
    }

    /// Compute a replacement configuration and persist it.
    ///
    /// `f` returns the new configuration (or `None` for "nothing changed") and
    /// a result value. The in-memory state only changes after a successful
    /// save, so a failed save leaves the store exactly as it was.
    pub fn modify<R>(
        &self,
        f: impl FnOnce(&PluginConfiguration) -> (Option<PluginConfiguration>, R),
    ) -> Result<R, InjectorError> {
        let mut guard = self
            .config
            .write()
            .map_err(|_| InjectorError::Config("store lock poisoned".into()))?;
        let current = guard.as_ref().ok_or(InjectorError::Unavailable)?;

        let (replacement, result) = f(current);
        if let Some(next) = replacement {
            self.persistence.save(&next)?;
            *guard = Some(next);
        }
        Ok(result)
    }

    /// Replace the user-authored entry list, leaving registered entries alone.
    pub fn replace_custom_scripts(&self, entries: Vec<ScriptEntry>) -> Result<(), InjectorError> {
        self.modify(|current| {
            let mut next = current.clone();
            next.custom_java_scripts = entries;
            (Some(next), ())
        })
    }
}
