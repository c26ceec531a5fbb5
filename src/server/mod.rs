//! HTTP surface: script endpoints under `/JavaScriptInjector`, the
//! configuration page API, and optionally the web client itself.

pub mod auth;
pub mod handlers;

use crate::common::models::ROUTE_PREFIX;
use crate::injector::InjectorPlugin;
use crate::plugins::transformation::TransformationRegistry;
use auth::SessionGuard;
use axum::http::Method;
use axum::routing::get;
use axum::{middleware, Router};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

/// Web client directory served under `/web`, with its transformations.
#[derive(Clone)]
pub struct WebClient {
    pub root: PathBuf,
    pub transformations: Arc<TransformationRegistry>,
}

#[derive(Clone)]
pub struct AppState {
    pub plugin: Arc<InjectorPlugin>,
    pub guard: Arc<dyn SessionGuard>,
    pub web: Option<WebClient>,
}

impl AppState {
    pub fn new(
        plugin: Arc<InjectorPlugin>,
        guard: Arc<dyn SessionGuard>,
        web: Option<WebClient>,
    ) -> Self {
        Self { plugin, guard, web }
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET]);

    let public = Router::new()
        .route("/public.js", get(handlers::public_js))
        .route("/loader.js", get(handlers::loader_js));

    let private = Router::new()
        .route("/private.js", get(handlers::private_js))
        .route(
            "/configuration",
            get(handlers::get_configuration).post(handlers::post_configuration),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_session,
        ));

    let mut app = Router::new().nest(&format!("/{}", ROUTE_PREFIX), public.merge(private).layer(cors));

    if let Some(web) = &state.web {
        // Directory requests are not answered by ServeDir so the untransformed
        // index.html is never served.
        let static_files = ServeDir::new(&web.root).append_index_html_on_directories(false);
        let web_routes = Router::new()
            .route("/", get(handlers::web_index))
            .route("/index.html", get(handlers::web_index))
            .fallback_service(static_files);
        app = app.nest("/web", web_routes);
    }

    app.with_state(state)
}

/// Serve until `shutdown` is cancelled.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    log::info!("[Server] Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    log::info!("[Server] Stopped");
    Ok(())
}
