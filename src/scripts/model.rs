use serde::{Deserialize, Serialize};

/// A user-authored script edited through the configuration page.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct ScriptEntry {
    pub name: String,
    pub script: String,
    pub enabled: bool,
    pub requires_authentication: bool,
}

impl Default for ScriptEntry {
    fn default() -> Self {
        Self {
            name: "My Custom Script".to_string(),
            script: String::new(),
            enabled: true,
            requires_authentication: false,
        }
    }
}

/// A script registered by another plugin, keyed by a caller-supplied id.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct RegisteredScriptEntry {
    pub id: String,
    pub name: String,
    pub script: String,
    pub enabled: bool,
    pub requires_authentication: bool,
    pub plugin_id: String,
    pub plugin_name: String,
    pub plugin_version: String,
}

impl RegisteredScriptEntry {
    pub fn from_payload(payload: &RegistrationPayload) -> Self {
        Self {
            id: payload.id.clone(),
            name: payload.name.clone(),
            script: payload.script.clone(),
            enabled: payload.enabled,
            requires_authentication: payload.requires_authentication,
            plugin_id: payload.plugin_id.clone(),
            plugin_name: payload.plugin_name.clone(),
            plugin_version: payload.plugin_version.clone().unwrap_or_default(),
        }
    }
}

/// Persisted plugin configuration: both script lists in store order.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct PluginConfiguration {
    pub custom_java_scripts: Vec<ScriptEntry>,
    pub plugin_java_scripts: Vec<RegisteredScriptEntry>,
}

/// Payload other plugins hand to `registerScript`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationPayload {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub script: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub requires_authentication: bool,
    #[serde(default)]
    pub plugin_id: String,
    #[serde(default)]
    pub plugin_name: String,
    #[serde(default)]
    pub plugin_version: Option<String>,
}

fn default_true() -> bool {
    true
}

/// Borrowed view over either kind of entry, used by the renderer.
#[derive(Clone, Copy, Debug)]
pub struct RenderItem<'a> {
    pub name: &'a str,
    pub script: &'a str,
    pub enabled: bool,
    pub requires_authentication: bool,
    pub owner: Option<(&'a str, &'a str)>,
}

impl<'a> From<&'a ScriptEntry> for RenderItem<'a> {
    fn from(entry: &'a ScriptEntry) -> Self {
        Self {
            name: &entry.name,
            script: &entry.script,
            enabled: entry.enabled,
            requires_authentication: entry.requires_authentication,
            owner: None,
        }
    }
}

impl<'a> From<&'a RegisteredScriptEntry> for RenderItem<'a> {
    fn from(entry: &'a RegisteredScriptEntry) -> Self {
        Self {
            name: &entry.name,
            script: &entry.script,
            enabled: entry.enabled,
            requires_authentication: entry.requires_authentication,
            owner: Some((&entry.plugin_name, &entry.plugin_version)),
        }
    }
}

impl PluginConfiguration {
    /// User-authored entries first, then registered ones, each in store order.
    pub fn render_items(&self) -> impl Iterator<Item = RenderItem<'_>> {
        self.custom_java_scripts
            .iter()
            .map(RenderItem::from)
            .chain(self.plugin_java_scripts.iter().map(RenderItem::from))
    }
}
