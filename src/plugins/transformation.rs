//! Contract with the optional "file transformation" collaborator.
//!
//! A collaborator rewrites files of the web client as they are served, so the
//! files on disk never need patching. The host resolves it once at startup and
//! hands the result to the bootstrap as a [`TransformationHost`].

use crate::common::error::InjectorError;
use regex::Regex;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

pub type TransformCallback = Arc<dyn Fn(&str) -> String + Send + Sync>;

#[derive(Clone)]
pub struct TransformationRegistration {
    pub id: Uuid,
    pub file_name_pattern: String,
    pub callback: TransformCallback,
}

impl std::fmt::Debug for TransformationRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformationRegistration")
            .field("id", &self.id)
            .field("file_name_pattern", &self.file_name_pattern)
            .finish_non_exhaustive()
    }
}

pub trait FileTransformation: Send + Sync {
    fn register_transformation(
        &self,
        registration: TransformationRegistration,
    ) -> Result<(), InjectorError>;
}

/// Outcome of looking for the collaborator in the host process.
#[derive(Clone)]
pub enum TransformationHost {
    /// Not loaded.
    Absent,
    /// Loaded, but it does not expose the registration entry point.
    MissingEntryPoint { name: String },
    Available(Arc<dyn FileTransformation>),
}

impl TransformationHost {
    pub fn describe(&self) -> &'static str {
        match self {
            TransformationHost::Absent => "absent",
            TransformationHost::MissingEntryPoint { .. } => "missing entry point",
            TransformationHost::Available(_) => "available",
        }
    }
}

struct RegisteredTransformation {
    matcher: Regex,
    registration: TransformationRegistration,
}

/// In-process collaborator used by the bundled server when it serves the web
/// client itself.
#[derive(Default)]
pub struct TransformationRegistry {
    entries: RwLock<Vec<RegisteredTransformation>>,
}

impl TransformationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run every callback whose pattern matches `file_name`, in registration order.
    pub fn apply(&self, file_name: &str, contents: String) -> String {
        let entries = match self.entries.read() {
            Ok(entries) => entries,
            Err(_) => {
                log::error!("[Transform] Registry lock poisoned; serving {} unmodified", file_name);
                return contents;
            }
        };
        entries
            .iter()
            .filter(|t| t.matcher.is_match(file_name))
            .fold(contents, |acc, t| {
                log::debug!(
                    "[Transform] Applying {} to {}",
                    t.registration.id,
                    file_name
                );
                (t.registration.callback)(&acc)
            })
    }
}

impl FileTransformation for TransformationRegistry {
    fn register_transformation(
        &self,
        registration: TransformationRegistration,
    ) -> Result<(), InjectorError> {
        let matcher = Regex::new(&registration.file_name_pattern)
            .map_err(|e| InjectorError::Transformation(e.to_string()))?;
        let mut entries = self
            .entries
            .write()
            .map_err(|_| InjectorError::Transformation("registry lock poisoned".into()))?;

        // Re-registration from the same plugin for the same file replaces the old callback.
        entries.retain(|t| {
            !(t.registration.id == registration.id
                && t.registration.file_name_pattern == registration.file_name_pattern)
        });
        log::info!(
            "[Transform] Registered transformation {} for {}",
            registration.id,
            registration.file_name_pattern
        );
        entries.push(RegisteredTransformation {
            matcher,
            registration,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration(id: Uuid, pattern: &str, suffix: &'static str) -> TransformationRegistration {
        TransformationRegistration {
            id,
            file_name_pattern: pattern.to_string(),
            callback: Arc::new(move |c: &str| format!("{}{}", c, suffix)),
        }
    }

    #[test]
    fn test_apply_matching_only() {
        let registry = TransformationRegistry::new();
        registry
            .register_transformation(registration(Uuid::new_v4(), "index.html", "!"))
            .unwrap();

        assert_eq!(registry.apply("index.html", "a".to_string()), "a!");
        assert_eq!(registry.apply("main.js", "a".to_string()), "a");
    }

    #[test]
    fn test_reregistration_replaces() {
        let registry = TransformationRegistry::new();
        let id = Uuid::new_v4();
        registry
            .register_transformation(registration(id, "index.html", "1"))
            .unwrap();
        registry
            .register_transformation(registration(id, "index.html", "2"))
            .unwrap();

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.apply("index.html", String::new()), "2");
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let registry = TransformationRegistry::new();
        let result = registry.register_transformation(registration(Uuid::new_v4(), "(", ""));
        assert!(matches!(result, Err(InjectorError::Transformation(_))));
        assert!(registry.is_empty());
    }
}
