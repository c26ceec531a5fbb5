//! Entry points other plugins call to register scripts.
//!
//! Callers hold a [`PluginInterface`], which only has a weak reference to the
//! plugin. Once the plugin is gone every call reports
//! [`InjectorError::NotInitialized`]; anything wrong with the payload itself
//! is logged and reported as a plain `false`.

use crate::common::error::{InjectorError, ToMessage};
use crate::injector::InjectorPlugin;
use crate::scripts::model::RegistrationPayload;
use serde_json::{json, Value};
use std::sync::{Arc, Weak};

#[derive(Clone, Default)]
pub struct PluginInterface {
    plugin: Weak<InjectorPlugin>,
}

impl PluginInterface {
    pub fn new(plugin: Weak<InjectorPlugin>) -> Self {
        Self { plugin }
    }

    /// An interface that was never attached to a plugin.
    pub fn detached() -> Self {
        Self::default()
    }

    fn plugin(&self) -> Result<Arc<InjectorPlugin>, InjectorError> {
        self.plugin.upgrade().ok_or_else(|| {
            log::error!("[PluginBridge] Called before the plugin was initialized");
            InjectorError::NotInitialized
        })
    }

    /// Register or update a script. `payload` is the caller's loosely typed object.
    pub fn register_script(&self, payload: Value) -> Result<bool, InjectorError> {
        let plugin = self.plugin()?;
        let payload: RegistrationPayload = match serde_json::from_value(payload) {
            Ok(p) => p,
            Err(e) => {
                log::error!("[PluginBridge] Malformed registration payload: {}", e);
                return Ok(false);
            }
        };
        log::debug!(
            "[PluginBridge] registerScript from {}: {}",
            payload.plugin_id,
            payload.id
        );
        Ok(plugin.registration().register(&payload))
    }

    pub fn unregister_script(&self, script_id: &str) -> Result<bool, InjectorError> {
        let plugin = self.plugin()?;
        Ok(plugin.registration().unregister(script_id))
    }

    pub fn unregister_all_scripts_from_plugin(&self, plugin_id: &str) -> Result<usize, InjectorError> {
        let plugin = self.plugin()?;
        Ok(plugin.registration().unregister_all_from_owner(plugin_id))
    }

    /// Command-style dispatch for hosts that resolve the interface by name.
    pub fn call(&self, command: &str, args: Value) -> Result<Value, String> {
        match command {
            "registerScript" => self
                .register_script(args)
                .map(Value::Bool)
                .map_err(ToMessage::to_message),
            "unregisterScript" => {
                let id = string_arg(&args, "scriptId")?;
                self.unregister_script(&id)
                    .map(Value::Bool)
                    .map_err(ToMessage::to_message)
            }
            "unregisterAllScriptsFromPlugin" => {
                let id = string_arg(&args, "pluginId")?;
                self.unregister_all_scripts_from_plugin(&id)
                    .map(|n| json!(n))
                    .map_err(ToMessage::to_message)
            }
            _ => Err(format!("Unknown command: {}", command)),
        }
    }
}

// Accepts either a bare string or an object holding `key`.
fn string_arg(args: &Value, key: &str) -> Result<String, String> {
    match args {
        Value::String(s) => Ok(s.clone()),
        Value::Object(map) => map
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| format!("Missing argument: {}", key)),
        _ => Err(format!("Missing argument: {}", key)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::injector::tests::plugin_in;
    use tempfile::TempDir;

    fn payload(id: &str, owner: &str) -> Value {
        json!({
            "id": id,
            "name": "Widget",
            "script": "console.log('widget')",
            "requiresAuthentication": true,
            "pluginId": owner,
            "pluginName": "Widgets",
            "pluginVersion": "2.0.0"
        })
    }

    #[test]
    fn test_register_through_interface() {
        let dir = TempDir::new().unwrap();
        let plugin = plugin_in(&dir);
        let api = plugin.interface();

        assert!(api.register_script(payload("w1", "owner")).unwrap());
        let listed = plugin.registration().list().unwrap();
        assert_eq!(listed.len(), 1);
        assert!(listed[0].enabled);
        assert_eq!(listed[0].plugin_version, "2.0.0");
    }

    #[test]
    fn test_malformed_payload_is_false() {
        let dir = TempDir::new().unwrap();
        let plugin = plugin_in(&dir);
        let api = plugin.interface();

        assert!(!api.register_script(json!({"id": 5})).unwrap());
        assert!(!api.register_script(json!("nope")).unwrap());
        // Well-formed but missing the owner.
        assert!(!api
            .register_script(json!({"id": "a", "name": "b", "script": "c"}))
            .unwrap());
        assert!(plugin.registration().list().unwrap().is_empty());
    }

    #[test]
    fn test_audit_records_accepted_registrations_once() {
        let dir = TempDir::new().unwrap();
        crate::logging::init_log_dir(dir.path().to_path_buf());
        let plugin = plugin_in(&dir);
        let api = plugin.interface();

        let mut rejected = payload("bridge-audit-rejected", "owner");
        rejected["script"] = json!("");
        assert!(!api.register_script(rejected).unwrap());
        let accepted = format!("bridge-audit-{}", uuid::Uuid::new_v4());
        assert!(api.register_script(payload(&accepted, "owner")).unwrap());

        let audit = dir.path().join("logs").join("audit.log");
        let mut contents = String::new();
        for _ in 0..100 {
            contents = std::fs::read_to_string(&audit).unwrap_or_default();
            if contents.contains(&accepted) {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(20));
        }

        assert_eq!(contents.lines().filter(|l| l.contains(&accepted)).count(), 1);
        assert!(!contents.contains("bridge-audit-rejected"));
    }

    #[test]
    fn test_not_initialized() {
        let api = PluginInterface::detached();
        assert!(matches!(
            api.register_script(payload("w1", "owner")),
            Err(InjectorError::NotInitialized)
        ));
        assert!(matches!(api.unregister_script("w1"), Err(InjectorError::NotInitialized)));
        assert!(matches!(
            api.unregister_all_scripts_from_plugin("owner"),
            Err(InjectorError::NotInitialized)
        ));
    }

    #[test]
    fn test_interface_does_not_outlive_plugin() {
        let dir = TempDir::new().unwrap();
        let plugin = plugin_in(&dir);
        let api = plugin.interface();
        drop(plugin);
        assert!(matches!(api.unregister_script("x"), Err(InjectorError::NotInitialized)));
    }

    #[test]
    fn test_call_dispatch() {
        let dir = TempDir::new().unwrap();
        let plugin = plugin_in(&dir);
        let api = plugin.interface();

        assert_eq!(api.call("registerScript", payload("a", "o")).unwrap(), json!(true));
        assert_eq!(api.call("registerScript", payload("b", "o")).unwrap(), json!(true));
        assert_eq!(
            api.call("unregisterScript", json!({"scriptId": "a"})).unwrap(),
            json!(true)
        );
        assert_eq!(
            api.call("unregisterAllScriptsFromPlugin", json!("o")).unwrap(),
            json!(1)
        );
        assert!(api.call("unregisterScript", json!({})).is_err());
        assert!(api.call("launchMissiles", Value::Null).is_err());

        let detached = PluginInterface::detached();
        let err = detached.call("unregisterScript", json!("a")).unwrap_err();
        assert!(err.contains("not available"));
    }
}
