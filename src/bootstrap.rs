//! Startup task that puts the loader block in front of users.
//!
//! When a file transformation collaborator is available the block is
//! delivered through it and any block left on disk by an earlier fallback run
//! is cleaned up. Otherwise `index.html` is patched directly.

use crate::injector::InjectorPlugin;
use crate::logging;
use crate::patch::PatchOutcome;
use crate::plugins::transformation::TransformationHost;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// The collaborator accepted our transformation.
    Delegated,
    /// `index.html` was handled on disk.
    Patched(PatchOutcome),
    /// Fallback patching failed; details were logged.
    Failed,
    Cancelled,
}

pub struct StartupTask {
    plugin: Arc<InjectorPlugin>,
    host: TransformationHost,
}

impl StartupTask {
    pub const NAME: &'static str = "JavaScript Injector Startup";
    pub const KEY: &'static str = "JavaScriptInjectorStartup";
    pub const DESCRIPTION: &'static str =
        "Injects the JavaScript Injector loader into the web client on startup.";
    pub const CATEGORY: &'static str = "Startup Services";

    pub fn new(plugin: Arc<InjectorPlugin>, host: TransformationHost) -> Self {
        Self { plugin, host }
    }

    /// Run on a blocking thread; all of the work is file I/O.
    pub async fn execute(self, cancel: CancellationToken) -> BootstrapOutcome {
        match tokio::task::spawn_blocking(move || self.run(&cancel)).await {
            Ok(outcome) => outcome,
            Err(e) => {
                log::error!("[Bootstrap] Startup task aborted: {}", e);
                BootstrapOutcome::Failed
            }
        }
    }

    pub fn run(&self, cancel: &CancellationToken) -> BootstrapOutcome {
        if cancel.is_cancelled() {
            log::info!("[Bootstrap] Cancelled before start");
            return BootstrapOutcome::Cancelled;
        }
        log::info!(
            "[Bootstrap] Starting; file transformation host is {}",
            self.host.describe()
        );

        let transformation = match &self.host {
            TransformationHost::Available(host) => host.clone(),
            TransformationHost::MissingEntryPoint { name } => {
                log::warn!(
                    "[Bootstrap] Could not find the registration entry point in {}. Using fallback injection method.",
                    name
                );
                return self.fallback();
            }
            TransformationHost::Absent => {
                log::warn!(
                    "[Bootstrap] File transformation plugin not found. Using fallback injection method."
                );
                return self.fallback();
            }
        };

        // A previous fallback run may have left the block on disk.
        if self.plugin.engine().is_some() {
            match self.plugin.cleanup_script() {
                Ok(true) => log::info!("[Bootstrap] Removed on-disk block before delegating"),
                Ok(false) => {}
                Err(e) => log::error!("[Bootstrap] Error during on-disk cleanup: {}", e),
            }
        }

        if cancel.is_cancelled() {
            log::info!("[Bootstrap] Cancelled before registering the transformation");
            return BootstrapOutcome::Cancelled;
        }

        match transformation.register_transformation(self.plugin.transformation_registration()) {
            Ok(()) => {
                log::info!("[Bootstrap] Registered index.html transformation");
                let _ = logging::write_domain_log(
                    "audit",
                    "Delegated index.html injection to file transformation",
                );
                BootstrapOutcome::Delegated
            }
            Err(e) => {
                log::error!(
                    "[Bootstrap] Error registering transformation: {}. Using fallback injection method.",
                    e
                );
                self.fallback()
            }
        }
    }

    fn fallback(&self) -> BootstrapOutcome {
        match self.plugin.inject_script() {
            Ok(outcome) => BootstrapOutcome::Patched(outcome),
            Err(e) => {
                log::error!("[Bootstrap] Error injecting script block: {}", e);
                BootstrapOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::error::InjectorError;
    use crate::injector::tests::{plugin_in, PAGE};
    use crate::patch::block::{BlockFlavor, InjectionBlock, START_MARKER};
    use crate::patch::inject_block;
    use crate::plugins::transformation::{
        FileTransformation, TransformationRegistration, TransformationRegistry,
    };
    use std::fs;
    use tempfile::TempDir;

    struct RejectingHost;

    impl FileTransformation for RejectingHost {
        fn register_transformation(
            &self,
            _registration: TransformationRegistration,
        ) -> Result<(), InjectorError> {
            Err(InjectorError::Transformation("rejected".into()))
        }
    }

    fn index(dir: &TempDir) -> String {
        fs::read_to_string(dir.path().join("index.html")).unwrap()
    }

    #[test]
    fn test_fallback_patches_file() {
        let dir = TempDir::new().unwrap();
        let task = StartupTask::new(plugin_in(&dir), TransformationHost::Absent);

        let outcome = task.run(&CancellationToken::new());
        assert_eq!(outcome, BootstrapOutcome::Patched(PatchOutcome::Injected { removed: 0 }));
        assert!(index(&dir).contains(START_MARKER));

        // Second run is a no-op.
        let again = task.run(&CancellationToken::new());
        assert_eq!(again, BootstrapOutcome::Patched(PatchOutcome::AlreadyCurrent));
    }

    #[test]
    fn test_missing_entry_point_falls_back() {
        let dir = TempDir::new().unwrap();
        let host = TransformationHost::MissingEntryPoint {
            name: "FileTransformation".into(),
        };
        let outcome = StartupTask::new(plugin_in(&dir), host).run(&CancellationToken::new());
        assert!(matches!(outcome, BootstrapOutcome::Patched(_)));
        assert!(index(&dir).contains(START_MARKER));
    }

    #[test]
    fn test_delegation_cleans_disk_and_registers() {
        let dir = TempDir::new().unwrap();
        let direct = InjectionBlock::default().render(BlockFlavor::Direct);
        let (patched, _) = inject_block(PAGE, &direct);
        let plugin = plugin_in(&dir);
        // Leftover from an earlier fallback run.
        fs::write(dir.path().join("index.html"), &patched).unwrap();

        let registry = Arc::new(TransformationRegistry::new());
        let task = StartupTask::new(plugin, TransformationHost::Available(registry.clone()));

        assert_eq!(task.run(&CancellationToken::new()), BootstrapOutcome::Delegated);
        assert_eq!(index(&dir), PAGE);
        assert_eq!(registry.len(), 1);

        let served = registry.apply("index.html", PAGE.to_string());
        assert!(served.contains(START_MARKER));
        assert!(served.contains("Injected using file-transformation"));
    }

    #[test]
    fn test_rejected_registration_falls_back() {
        let dir = TempDir::new().unwrap();
        let task = StartupTask::new(
            plugin_in(&dir),
            TransformationHost::Available(Arc::new(RejectingHost)),
        );
        assert!(matches!(
            task.run(&CancellationToken::new()),
            BootstrapOutcome::Patched(PatchOutcome::Injected { .. })
        ));
        assert!(index(&dir).contains(START_MARKER));
    }

    #[test]
    fn test_cancelled_task_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let task = StartupTask::new(plugin_in(&dir), TransformationHost::Absent);
        assert_eq!(task.run(&cancel), BootstrapOutcome::Cancelled);
        assert_eq!(index(&dir), PAGE);
    }

    #[tokio::test]
    async fn test_execute_on_blocking_pool() {
        let dir = TempDir::new().unwrap();
        let task = StartupTask::new(plugin_in(&dir), TransformationHost::Absent);
        let outcome = task.execute(CancellationToken::new()).await;
        assert!(matches!(outcome, BootstrapOutcome::Patched(_)));
    }
}
