//! The plugin object: owns the script store, the registration service and the
//! patch engine, and is the single value the host wires everything else to.

use crate::common::error::InjectorError;
use crate::common::models::PluginIdentity;
use crate::logging;
use crate::patch::block::InjectionBlock;
use crate::patch::{self, PatchEngine, PatchOutcome};
use crate::plugins::bridge::PluginInterface;
use crate::plugins::transformation::{TransformCallback, TransformationRegistration};
use crate::scripts::registration::RegistrationService;
use crate::scripts::renderer;
use crate::scripts::storage::ScriptStore;
use std::sync::Arc;

pub struct InjectorPlugin {
    identity: PluginIdentity,
    store: Arc<ScriptStore>,
    registration: RegistrationService,
    block: InjectionBlock,
    /// `None` when the host has no web client directory on disk.
    engine: Option<PatchEngine>,
}

impl InjectorPlugin {
    pub fn new(
        identity: PluginIdentity,
        store: Arc<ScriptStore>,
        block: InjectionBlock,
        engine: Option<PatchEngine>,
    ) -> Arc<Self> {
        Arc::new(Self {
            identity,
            registration: RegistrationService::new(store.clone()),
            store,
            block,
            engine,
        })
    }

    pub fn identity(&self) -> &PluginIdentity {
        &self.identity
    }

    pub fn store(&self) -> &Arc<ScriptStore> {
        &self.store
    }

    pub fn registration(&self) -> &RegistrationService {
        &self.registration
    }

    pub fn engine(&self) -> Option<&PatchEngine> {
        self.engine.as_ref()
    }

    /// Handle given to other plugins. It does not keep the plugin alive.
    pub fn interface(self: &Arc<Self>) -> PluginInterface {
        PluginInterface::new(Arc::downgrade(self))
    }

    pub fn render_scripts(&self, requires_authentication: bool) -> String {
        renderer::render_store(&self.store, requires_authentication)
    }

    pub fn render_all_scripts(&self) -> String {
        renderer::render_store_all(&self.store)
    }

    /// Registration handed to the file transformation collaborator for `index.html`.
    pub fn transformation_registration(&self) -> TransformationRegistration {
        let block = self.block.clone();
        let callback: TransformCallback = Arc::new(move |contents: &str| patch::transform(&block, contents));
        TransformationRegistration {
            id: self.identity.id,
            file_name_pattern: patch::INDEX_FILE_NAME.to_string(),
            callback,
        }
    }

    /// Patch `index.html` on disk.
    pub fn inject_script(&self) -> Result<PatchOutcome, InjectorError> {
        let engine = self.require_engine()?;
        engine.ensure_injected()
    }

    /// Strip our delimited block from `index.html`. Returns whether one was present.
    pub fn cleanup_script(&self) -> Result<bool, InjectorError> {
        let engine = self.require_engine()?;
        engine.ensure_removed()
    }

    /// Host hook invoked before the plugin is uninstalled.
    pub fn on_uninstalling(&self) {
        log::info!("[Plugin] {} is being uninstalled", self.identity.name);
        match self.cleanup_script() {
            Ok(true) => {
                let _ = logging::write_domain_log("audit", "Uninstall removed script block");
            }
            Ok(false) => {}
            Err(e) => log::error!("[Plugin] Error while removing script block on uninstall: {}", e),
        }
    }

    fn require_engine(&self) -> Result<&PatchEngine, InjectorError> {
        self.engine
            .as_ref()
            .ok_or_else(|| InjectorError::Config("web client path is not configured".into()))
    }
}
