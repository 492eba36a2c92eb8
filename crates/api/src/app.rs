use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::HeaderValue,
    routing::{delete, get, post},
    Router,
};
use engine::GroupRegistry;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::warn;

use crate::config::Config;
use crate::identity::IdentityResolver;
use crate::metadata::MetadataIndex;
use crate::routes::{groups, health, participants, realtime, spins};

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<GroupRegistry>,
    pub metadata: Arc<MetadataIndex>,
    pub identity: Arc<dyn IdentityResolver>,
    pub config: Arc<Config>,
}

pub fn create_app(
    config: Config,
    registry: Arc<GroupRegistry>,
    metadata: Arc<MetadataIndex>,
    identity: Arc<dyn IdentityResolver>,
) -> Router {
    let config = Arc::new(config);
    let state = AppState {
        registry,
        metadata,
        identity,
        config: config.clone(),
    };

    // CORS: exact frontend origin when configured, otherwise wide open.
    let cors = match config
        .security
        .frontend_origin
        .as_deref()
        .map(HeaderValue::from_str)
    {
        Some(Ok(origin)) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods(Any)
            .allow_headers(Any),
        Some(Err(_)) => {
            warn!("invalid frontend_origin, falling back to permissive CORS");
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        }
        None => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    };

    Router::new()
        .route("/health", get(health::health_check))
        .route("/groups", post(groups::create_group))
        .route("/groups/me", get(groups::list_my_groups))
        .route(
            "/groups/bookmarks",
            get(groups::get_bookmarks).put(groups::put_bookmarks),
        )
        .route(
            "/groups/:group_id",
            get(groups::get_group).patch(groups::rename_group),
        )
        .route(
            "/groups/:group_id/participants",
            get(participants::list_participants).post(participants::add_participant),
        )
        .route(
            "/groups/:group_id/participants/commit",
            post(participants::commit_participants),
        )
        .route(
            "/groups/:group_id/participants/:participant_id",
            axum::routing::patch(participants::update_participant)
                .delete(participants::remove_participant),
        )
        .route("/groups/:group_id/spin", post(spins::request_spin))
        .route("/groups/:group_id/history", get(spins::list_history))
        .route(
            "/groups/:group_id/history/:spin_id/save",
            post(spins::save_spin),
        )
        .route(
            "/groups/:group_id/history/:spin_id",
            delete(spins::discard_spin),
        )
        .route("/groups/:group_id/ws", get(realtime::group_socket))
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
