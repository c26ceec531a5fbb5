use uuid::Uuid;

/// Fixed identifier the host knows this plugin by.
pub const PLUGIN_ID: &str = "f5a34f7b-2e8a-4e6a-a722-3a216a81b374";

/// Display name used by the host and in log lines.
pub const PLUGIN_NAME: &str = "JavaScript Injector";

/// Route prefix every endpoint of this plugin is mounted under.
pub const ROUTE_PREFIX: &str = "JavaScriptInjector";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginIdentity {
    pub id: Uuid,
    pub name: String,
    pub version: String,
}

impl Default for PluginIdentity {
    fn default() -> Self {
        Self {
            id: Uuid::parse_str(PLUGIN_ID).unwrap_or_else(|_| Uuid::nil()),
            name: PLUGIN_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
