// routes.rs
use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        Method,
    },
    routing::{get, patch, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::handlers;
use crate::state::State;

pub fn create_routes(state: Arc<State>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .max_age(Duration::from_secs(state.config.cors_max_age_secs));

    Router::new()
        .route("/users", get(handlers::list_users).post(handlers::create_user))
        .route(
            "/users/{id}",
            get(handlers::get_user)
                .patch(handlers::update_user)
                .delete(handlers::delete_user),
        )
        .route("/polls", get(handlers::list_polls).post(handlers::create_poll))
        .route(
            "/polls/{id}",
            get(handlers::get_poll)
                .put(handlers::replace_poll)
                .patch(handlers::patch_poll)
                .delete(handlers::delete_poll),
        )
        .route(
            "/polls/{id}/options",
            get(handlers::list_options).post(handlers::add_option),
        )
        .route(
            "/polls/{id}/options/{option_id}",
            patch(handlers::update_option).delete(handlers::delete_option),
        )
        .route("/polls/{id}/cast-vote", post(handlers::cast_vote))
        .route("/polls/{id}/results", get(handlers::results))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
