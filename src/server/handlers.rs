use super::AppState;
use crate::common::error::{InjectorError, ToMessage};
use crate::logging;
use crate::patch::INDEX_FILE_NAME;
use crate::scripts::model::{PluginConfiguration, ScriptEntry};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

// --- Error handling ---

#[derive(Debug)]
pub enum ApiError {
    Unauthorized,
    Unavailable,
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, msg) = match self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            ApiError::Unavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                InjectorError::Unavailable.to_string(),
            ),
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m),
            ApiError::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, m),
        };
        (status, Json(json!({ "error": msg }))).into_response()
    }
}

impl From<InjectorError> for ApiError {
    fn from(e: InjectorError) -> Self {
        match e {
            InjectorError::Unavailable => ApiError::Unavailable,
            other => ApiError::Internal(other.to_message()),
        }
    }
}

// --- Script endpoints ---

fn javascript(body: String) -> Response {
    (
        [
            (CONTENT_TYPE, "application/javascript"),
            (CACHE_CONTROL, "no-cache"),
        ],
        body,
    )
        .into_response()
}

pub async fn public_js(State(state): State<AppState>) -> Response {
    javascript(state.plugin.render_scripts(false))
}

pub async fn private_js(State(state): State<AppState>) -> Response {
    javascript(state.plugin.render_scripts(true))
}

/// Served for pages still carrying the single-tag loader.
pub async fn loader_js(State(state): State<AppState>) -> Response {
    javascript(state.plugin.render_all_scripts())
}

// --- Configuration page ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationUpdate {
    #[serde(default)]
    pub custom_java_scripts: Vec<ScriptEntry>,
}

pub async fn get_configuration(
    State(state): State<AppState>,
) -> Result<Json<PluginConfiguration>, ApiError> {
    state
        .plugin
        .store()
        .snapshot()
        .map(Json)
        .ok_or(ApiError::Unavailable)
}

/// Replace the user-authored list. Registered entries are not editable here.
pub async fn post_configuration(
    State(state): State<AppState>,
    payload: Result<Json<ConfigurationUpdate>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(update) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let count = update.custom_java_scripts.len();
    state
        .plugin
        .store()
        .replace_custom_scripts(update.custom_java_scripts)?;

    log::info!("[Server] Saved {} custom scripts", count);
    let _ = logging::write_domain_log("audit", &format!("Saved {} custom scripts", count));
    Ok(StatusCode::NO_CONTENT)
}

// --- Web client ---

/// `index.html` with every registered file transformation applied.
pub async fn web_index(State(state): State<AppState>) -> Result<Response, ApiError> {
    let web = state
        .web
        .as_ref()
        .ok_or_else(|| ApiError::NotFound("web client is not served".into()))?;
    let path = web.root.join(INDEX_FILE_NAME);
    let contents = tokio::fs::read_to_string(&path).await.map_err(|e| {
        log::error!("[Server] Could not read {:?}: {}", path, e);
        ApiError::NotFound(format!("{} not found", INDEX_FILE_NAME))
    })?;

    let body = web.transformations.apply(INDEX_FILE_NAME, contents);
    Ok((
        [
            (CONTENT_TYPE, "text/html; charset=utf-8"),
            (CACHE_CONTROL, "no-cache"),
        ],
        body,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::injector::tests::plugin_in;
    use crate::server::auth::ApiKeyGuard;
    use crate::server::WebClient;
    use axum::body::to_bytes;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn state(dir: &TempDir) -> AppState {
        AppState::new(plugin_in(dir), Arc::new(ApiKeyGuard::new(Vec::new())), None)
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn entry(name: &str, script: &str, enabled: bool, private: bool) -> ScriptEntry {
        ScriptEntry {
            name: name.to_string(),
            script: script.to_string(),
            enabled,
            requires_authentication: private,
        }
    }

    #[tokio::test]
    async fn test_script_endpoints_filter() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir);
        state
            .plugin
            .store()
            .replace_custom_scripts(vec![
                entry("A", "a()", true, false),
                entry("B", "b()", false, false),
                entry("C", "c()", true, true),
            ])
            .unwrap();

        let public = public_js(State(state.clone())).await;
        assert_eq!(public.headers()[CONTENT_TYPE], "application/javascript");
        assert_eq!(public.headers()[CACHE_CONTROL], "no-cache");
        let public = body_text(public).await;
        assert!(public.contains("a()"));
        assert!(!public.contains("b()"));
        assert!(!public.contains("c()"));

        let private = body_text(private_js(State(state.clone())).await).await;
        assert!(private.contains("c()"));
        assert!(!private.contains("a()"));

        let all = body_text(loader_js(State(state)).await).await;
        assert!(all.contains("a()") && all.contains("c()"));
        assert!(!all.contains("b()"));
    }

    #[tokio::test]
    async fn test_unavailable_store_serves_placeholder() {
        use crate::common::models::PluginIdentity;
        use crate::injector::InjectorPlugin;
        use crate::patch::block::InjectionBlock;
        use crate::scripts::renderer::UNAVAILABLE_PLACEHOLDER;
        use crate::scripts::storage::tests::MemoryPersistence;
        use crate::scripts::storage::ScriptStore;

        let store = Arc::new(ScriptStore::new(Arc::new(MemoryPersistence::default())));
        let plugin = InjectorPlugin::new(
            PluginIdentity::default(),
            store,
            InjectionBlock::default(),
            None,
        );
        let state = AppState::new(plugin, Arc::new(ApiKeyGuard::new(Vec::new())), None);

        let response = public_js(State(state.clone())).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, UNAVAILABLE_PLACEHOLDER);

        let err = get_configuration(State(state)).await.unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_post_configuration_keeps_registered() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir);
        let registered = serde_json::json!({
            "id": "r1", "name": "R", "script": "r()",
            "pluginId": "p", "pluginName": "P"
        });
        assert!(state.plugin.interface().register_script(registered).unwrap());

        let update = ConfigurationUpdate {
            custom_java_scripts: vec![entry("A", "a()", true, false)],
        };
        let status = post_configuration(State(state.clone()), Ok(Json(update)))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);

        let Json(config) = get_configuration(State(state)).await.unwrap();
        assert_eq!(config.custom_java_scripts.len(), 1);
        assert_eq!(config.plugin_java_scripts.len(), 1);
    }

    #[tokio::test]
    async fn test_web_index_applies_transformations() {
        use crate::plugins::transformation::{FileTransformation, TransformationRegistry};

        let dir = TempDir::new().unwrap();
        let plugin = plugin_in(&dir);
        let registry = Arc::new(TransformationRegistry::new());
        registry
            .register_transformation(plugin.transformation_registration())
            .unwrap();
        let web = WebClient {
            root: dir.path().to_path_buf(),
            transformations: registry,
        };
        let state = AppState::new(plugin, Arc::new(ApiKeyGuard::new(Vec::new())), Some(web));

        let body = body_text(web_index(State(state)).await.unwrap()).await;
        assert!(body.contains("Injected using file-transformation"));
    }

    #[test]
    fn test_error_body_shape() {
        let response = ApiError::BadRequest("nope".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
