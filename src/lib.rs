pub mod bootstrap;
pub mod common;
pub mod config;
pub mod injector;
pub mod logging;
pub mod patch;
pub mod plugins;
pub mod scripts;
pub mod server;

use anyhow::Context;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use bootstrap::StartupTask;
use common::models::PluginIdentity;
use config::{AppConfig, ConfigStatus};
use patch::block::InjectionBlock;
use patch::PatchEngine;
use plugins::transformation::{TransformationHost, TransformationRegistry};
use scripts::storage::{JsonFileStorage, ScriptStore};
use server::auth::ApiKeyGuard;
use server::{AppState, WebClient};

pub use injector::InjectorPlugin;
pub use plugins::bridge::PluginInterface;

pub fn run() -> anyhow::Result<()> {
    let root_dir = config::get_app_root_dir().map_err(anyhow::Error::msg)?;
    let (app_config, config_status) = config::load_config()
        .unwrap_or_else(|e| (AppConfig::default(), ConfigStatus::Invalid(e)));

    logging::init(&root_dir, app_config.verbose_logging);
    logging::init_log_dir(root_dir.clone());
    logging::setup_panic_hook();
    log::info!("Starting {} v{}", common::models::PLUGIN_NAME, env!("CARGO_PKG_VERSION"));

    match &config_status {
        ConfigStatus::Invalid(e) => log::warn!("Failed to load config.json, using defaults: {}", e),
        status if status.needs_write() => {
            if let Err(e) = config::save_config(&app_config) {
                log::warn!("Could not write config.json: {}", e);
            }
        }
        _ => {}
    }

    let plugin = build_plugin(&app_config)?;

    if std::env::args().any(|arg| arg == "--uninstall") {
        plugin.on_uninstalling();
        return Ok(());
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start the async runtime")?;
    runtime.block_on(serve_host(app_config, plugin))
}

fn build_plugin(app_config: &AppConfig) -> anyhow::Result<Arc<InjectorPlugin>> {
    let storage = JsonFileStorage::from_config().context("Failed to prepare plugin storage")?;
    let store = ScriptStore::new(Arc::new(storage));
    // Left unloaded on failure; script endpoints then serve the placeholder.
    if let Err(e) = store.load() {
        log::error!("[Host] Failed to load plugin configuration: {}", e);
    }

    let block = InjectionBlock::new(app_config.script_base_path.clone());
    let engine = app_config
        .web_dir()
        .map(|dir| PatchEngine::new(&dir, block.clone()));
    if engine.is_none() {
        log::warn!("[Host] web_path is not configured; index.html will not be patched");
    }

    Ok(InjectorPlugin::new(
        PluginIdentity::default(),
        Arc::new(store),
        block,
        engine,
    ))
}

fn resolve_transformation_host(app_config: &AppConfig) -> (TransformationHost, Option<WebClient>) {
    match (app_config.serve_web_client, app_config.web_dir()) {
        (true, Some(root)) => {
            let registry = Arc::new(TransformationRegistry::new());
            let web = WebClient {
                root,
                transformations: registry.clone(),
            };
            (TransformationHost::Available(registry), Some(web))
        }
        (true, None) => {
            log::warn!("[Host] serve_web_client is set but web_path is empty");
            (TransformationHost::Absent, None)
        }
        (false, _) => (TransformationHost::Absent, None),
    }
}

async fn serve_host(app_config: AppConfig, plugin: Arc<InjectorPlugin>) -> anyhow::Result<()> {
    let shutdown = CancellationToken::new();
    let (host, web) = resolve_transformation_host(&app_config);

    log::info!("[Host] Scheduling {} ({})", StartupTask::NAME, StartupTask::KEY);
    let startup = tokio::spawn(StartupTask::new(plugin.clone(), host).execute(shutdown.child_token()));

    let listener = TcpListener::bind(&app_config.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", app_config.bind_address))?;
    let guard = Arc::new(ApiKeyGuard::new(app_config.api_keys.clone()));
    let state = AppState::new(plugin, guard, web);

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                log::info!("[Host] Shutdown requested");
                signal_token.cancel();
            }
            Err(e) => log::error!("[Host] Could not listen for shutdown signal: {}", e),
        }
    });

    server::serve(listener, state, shutdown.clone()).await?;
    shutdown.cancel();
    match startup.await {
        Ok(outcome) => log::debug!("[Host] Startup task finished: {:?}", outcome),
        Err(e) => log::error!("[Host] Startup task panicked: {}", e),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_web_client_requires_path() {
        let config = AppConfig {
            serve_web_client: true,
            ..Default::default()
        };
        let (host, web) = resolve_transformation_host(&config);
        assert!(matches!(host, TransformationHost::Absent));
        assert!(web.is_none());
    }

    #[test]
    fn test_web_client_enables_delegation() {
        let config = AppConfig {
            serve_web_client: true,
            web_path: "/srv/web".to_string(),
            ..Default::default()
        };
        let (host, web) = resolve_transformation_host(&config);
        assert_eq!(host.describe(), "available");
        assert_eq!(web.unwrap().root, std::path::PathBuf::from("/srv/web"));
    }
}
