//! Registration of scripts on behalf of other plugins.
//!
//! Entries are keyed by the caller-supplied id. Updates build a fresh record
//! and substitute it at the same index, and the whole configuration is
//! persisted before the in-memory store changes.

use super::model::{RegisteredScriptEntry, RegistrationPayload};
use super::storage::ScriptStore;
use crate::common::error::{InjectorError, ValidationError};
use crate::logging;
use std::sync::Arc;

pub const MAX_ID_CHARS: usize = 100;
pub const MAX_NAME_CHARS: usize = 200;
pub const MAX_SCRIPT_BYTES: usize = 1024 * 1024;

/// Check a payload without touching the store.
pub fn validate(payload: &RegistrationPayload) -> Result<(), ValidationError> {
    if payload.id.trim().is_empty() {
        return Err(ValidationError::MissingId);
    }
    if payload.id.chars().count() > MAX_ID_CHARS {
        return Err(ValidationError::IdTooLong { max: MAX_ID_CHARS });
    }
    if payload.name.trim().is_empty() {
        return Err(ValidationError::MissingName);
    }
    if payload.name.chars().count() > MAX_NAME_CHARS {
        return Err(ValidationError::NameTooLong {
            max: MAX_NAME_CHARS,
        });
    }
    if payload.script.trim().is_empty() {
        return Err(ValidationError::MissingScript);
    }
    if payload.script.len() > MAX_SCRIPT_BYTES {
        return Err(ValidationError::ScriptTooLarge {
            max: MAX_SCRIPT_BYTES,
        });
    }
    if payload.plugin_id.trim().is_empty() {
        return Err(ValidationError::MissingPluginId);
    }
    if payload.plugin_name.trim().is_empty() {
        return Err(ValidationError::MissingPluginName);
    }
    Ok(())
}

/// Service managing scripts registered by other plugins.
pub struct RegistrationService {
    store: Arc<ScriptStore>,
}

impl RegistrationService {
    pub fn new(store: Arc<ScriptStore>) -> Self {
        Self { store }
    }

    /// Register a new script or replace the one with the same id.
    pub fn register(&self, payload: &RegistrationPayload) -> bool {
        if let Err(e) = validate(payload) {
            log::error!("[Registry] Script registration failed validation: {}", e);
            return false;
        }

        let replacement = RegisteredScriptEntry::from_payload(payload);
        let result = self.store.modify(|current| {
            let mut next = current.clone();
            let updated = match next
                .plugin_java_scripts
                .iter()
                .position(|s| s.id == replacement.id)
            {
                Some(index) => {
                    next.plugin_java_scripts[index] = replacement.clone();
                    true
                }
                None => {
                    next.plugin_java_scripts.push(replacement.clone());
                    false
                }
            };
            (Some(next), updated)
        });

        match result {
            Ok(updated) => {
                let verb = if updated { "Updated" } else { "Registered" };
                log::info!(
                    "[Registry] {} script {} from plugin {}",
                    verb,
                    payload.id,
                    payload.plugin_name
                );
                let _ = logging::write_domain_log(
                    "audit",
                    &format!(
                        "{} script '{}' ({}) from plugin '{}' ({})",
                        verb, payload.name, payload.id, payload.plugin_name, payload.plugin_id
                    ),
                );
                true
            }
            Err(e) => {
                log::error!(
                    "[Registry] Failed to register script {} from plugin {}: {}",
                    payload.id,
                    payload.plugin_name,
                    e
                );
                false
            }
        }
    }

    /// Remove a registered script by id. Returns whether a removal happened.
    pub fn unregister(&self, script_id: &str) -> bool {
        if script_id.trim().is_empty() {
            log::warn!("[Registry] Cannot unregister script: id is empty");
            return false;
        }

        let result = self.store.modify(|current| {
            match current
                .plugin_java_scripts
                .iter()
                .position(|s| s.id == script_id)
            {
                Some(index) => {
                    let mut next = current.clone();
                    next.plugin_java_scripts.remove(index);
                    (Some(next), true)
                }
                None => (None, false),
            }
        });

        match result {
            Ok(true) => {
                log::info!("[Registry] Unregistered script {}", script_id);
                let _ = logging::write_domain_log(
                    "audit",
                    &format!("Unregistered script {}", script_id),
                );
                true
            }
            Ok(false) => {
                log::warn!("[Registry] Script {} not found for unregistration", script_id);
                false
            }
            Err(e) => {
                log::error!("[Registry] Failed to unregister script {}: {}", script_id, e);
                false
            }
        }
    }

    /// Remove every script registered by `plugin_id`, returning the count.
    pub fn unregister_all_from_owner(&self, plugin_id: &str) -> usize {
        if plugin_id.trim().is_empty() {
            log::warn!("[Registry] Cannot unregister scripts: plugin id is empty");
            return 0;
        }

        let result = self.store.modify(|current| {
            let mut next = current.clone();
            next.plugin_java_scripts.retain(|s| s.plugin_id != plugin_id);
            let removed = current.plugin_java_scripts.len() - next.plugin_java_scripts.len();
            if removed > 0 {
                (Some(next), removed)
            } else {
                (None, 0)
            }
        });

        match result {
            Ok(0) => {
                log::debug!("[Registry] No scripts found for plugin {}", plugin_id);
                0
            }
            Ok(removed) => {
                log::info!(
                    "[Registry] Unregistered {} scripts from plugin {}",
                    removed,
                    plugin_id
                );
                let _ = logging::write_domain_log(
                    "audit",
                    &format!("Unregistered {} scripts from plugin {}", removed, plugin_id),
                );
                removed
            }
            Err(e) => {
                log::error!(
                    "[Registry] Failed to unregister scripts from plugin {}: {}",
                    plugin_id,
                    e
                );
                0
            }
        }
    }

    /// Registered scripts in store order.
    pub fn list(&self) -> Result<Vec<RegisteredScriptEntry>, InjectorError> {
        self.store
            .read(|c| c.plugin_java_scripts.clone())
            .ok_or(InjectorError::Unavailable)
    }
}
