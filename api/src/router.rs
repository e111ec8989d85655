//! Router configuration and setup.

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Json, Router,
};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
use utoipa::OpenApi;

use crate::route_trait::RouteHandler;
use crate::routes;
use crate::state::SharedState;

/// Path of the generated OpenAPI document.
pub const OPENAPI_PATH: &str = "/openapi.json";

/// Build the full router with middleware and state applied.
pub fn build_router(state: SharedState) -> Router {
    let config = state.config.clone();

    let mut router: Router<SharedState> = Router::new();

    router = router.route(
        routes::root::RootRoute::metadata().path,
        get(routes::root::get_root),
    );
    router = router.route(
        routes::health::HealthRoute::metadata().path,
        get(routes::health::get_health),
    );
    router = router.route(
        routes::generate::GenerateRoute::metadata().path,
        post(routes::generate::generate_3d),
    );

    if config.enable_openapi {
        let openapi = routes::ApiDoc::openapi();
        router = router.route(
            OPENAPI_PATH,
            get(move || {
                let doc = openapi.clone();
                async move { Json(doc) }
            }),
        );
    }

    // Outer to inner: trace sees the final status, body limit applies to extractors
    router
        .layer(DefaultBodyLimit::max(config.body_limit()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}
