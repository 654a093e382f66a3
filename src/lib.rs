use crate::cli::Args;
use anyhow::Context;
use axum::Router;
use axum::routing::{get, post};
use axum_keycloak_auth::PassthroughMode;
use axum_keycloak_auth::instance::{KeycloakAuthInstance, KeycloakConfig};
use axum_keycloak_auth::layer::KeycloakAuthLayer;
use deadpool_diesel::Runtime;
use deadpool_diesel::postgres::{Manager, Pool};
use tracing::log::info;

pub mod cli;
pub mod guard;
pub mod model;
pub mod notify;
pub mod payloads;
pub mod response;
pub mod schema;

mod api;
mod errors;

pub fn init_router(args: &Args) -> anyhow::Result<Router> {
    info!("Initializing database pool...");
    let pool = init_pool(&args.connection_str, args.db_pool_max_size)
        .context("Failed to initialize database pool")?;

    info!("Initializing Keycloak authentication layer...");
    let keycloak_layer =
        init_protection_layer(args).context("Failed to initialize Keycloak layer")?;

    info!("Initializing router...");
    Ok(init_router_internal(pool, keycloak_layer))
}

pub fn init_test_router(pool: Pool) -> Router {
    let student_api = student_routes();
    let reviewer_api = reviewer_routes();
    let admin_api = admin_routes();

    Router::new()
        .nest("/student", student_api)
        .nest("/reviewer", reviewer_api)
        .nest("/admin", admin_api)
        .with_state(pool)
}

fn init_router_internal(pool: Pool, keycloak_layer: KeycloakAuthLayer<String>) -> Router {
    let student_api = student_routes().layer(keycloak_layer.clone());
    let reviewer_api = reviewer_routes().layer(keycloak_layer.clone());
    let admin_api = admin_routes().layer(keycloak_layer.clone());

    Router::new()
        .nest("/student", student_api)
        .nest("/reviewer", reviewer_api)
        .nest("/admin", admin_api)
        .with_state(pool)
}

fn init_pool(conn_str: &str, max_size: u32) -> anyhow::Result<Pool> {
    let manager = Manager::new(conn_str, Runtime::Tokio1);
    let pool = Pool::builder(manager).max_size(max_size as usize).build()?;
    Ok(pool)
}

fn init_protection_layer(args: &Args) -> anyhow::Result<KeycloakAuthLayer<String>> {
    let config = KeycloakConfig::builder()
        .server(args.keycloak_server_url.clone())
        .realm(args.keycloak_realm.clone())
        .build();

    let instance = KeycloakAuthInstance::new(config);

    let layer = KeycloakAuthLayer::builder()
        .instance(instance)
        .passthrough_mode(PassthroughMode::Block)
        .persist_raw_claims(false)
        .expected_audiences(vec![args.keycloak_audiences.clone()])
        .build();

    Ok(layer)
}

fn student_routes() -> Router<Pool> {
    Router::new()
        // protected routes go here
        .route("/submit_work", post(api::student::submit_work))
        .route(
            "/get_submission/{submission_id}",
            get(api::student::get_submission),
        )
        .route(
            "/get_own_submissions",
            get(api::student::get_own_submissions),
        )
        .route(
            "/get_review_feedback",
            get(api::student::get_review_feedback),
        )
        .route("/get_lesson_data", get(api::student::get_lesson_data))
    // public routes go here
}

fn reviewer_routes() -> Router<Pool> {
    Router::new()
        // protected routes go here
        .route("/get_review_queue", get(api::reviewer::get_review_queue))
        .route("/get_review_form", get(api::reviewer::get_review_form))
        .route("/submit_review", post(api::reviewer::submit_review))
        .route(
            "/get_reviewer_stats",
            get(api::reviewer::get_reviewer_stats),
        )
    // public routes go here
}

fn admin_routes() -> Router<Pool> {
    Router::new()
        // protected routes go here
        .route(
            "/ensure_default_roles",
            post(api::admin::ensure_default_roles),
        )
        .route("/create_user", post(api::admin::create_user))
        .route("/assign_role", post(api::admin::assign_role))
        .route("/repair_profiles", post(api::admin::repair_profiles))
        .route(
            "/assign_reviewer_course",
            post(api::admin::assign_reviewer_course),
        )
        .route(
            "/remove_reviewer_course",
            post(api::admin::remove_reviewer_course),
        )
        .route("/set_review_quota", post(api::admin::set_review_quota))
        .route(
            "/set_reviewer_active",
            post(api::admin::set_reviewer_active),
        )
        .route(
            "/replace_improvements",
            post(api::admin::replace_improvements),
        )
    // public routes go here
}
