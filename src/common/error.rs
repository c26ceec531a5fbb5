use thiserror::Error;

/// Common plugin errors
#[derive(Debug, Error)]
pub enum InjectorError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// The plugin object has not been attached yet or was already torn down.
    #[error("JavaScript Injector plugin instance is not available")]
    NotInitialized,

    /// The host has not loaded the plugin configuration yet.
    #[error("Plugin configuration is not available")]
    Unavailable,

    #[error("File transformation error: {0}")]
    Transformation(String),
}

/// Registration payload rule violations, reported in check order
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Script ID is required")]
    MissingId,

    #[error("Script ID cannot exceed {max} characters")]
    IdTooLong { max: usize },

    #[error("Script name is required")]
    MissingName,

    #[error("Script name cannot exceed {max} characters")]
    NameTooLong { max: usize },

    #[error("Script content is required")]
    MissingScript,

    #[error("Script content cannot exceed {max} bytes")]
    ScriptTooLarge { max: usize },

    #[error("Plugin ID is required")]
    MissingPluginId,

    #[error("Plugin name is required")]
    MissingPluginName,
}

impl From<serde_json::Error> for InjectorError {
    fn from(e: serde_json::Error) -> Self {
        InjectorError::Serialization(e.to_string())
    }
}

/// Helper trait for flattening errors into the message strings handed to callers
pub trait ToMessage {
    fn to_message(self) -> String;
}

impl<E: std::error::Error> ToMessage for E {
    fn to_message(self) -> String {
        self.to_string()
    }
}
