//! Route definitions for the Crop Trade Platform

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use crate::{
    handlers,
    middleware::{admin_middleware, auth_middleware},
    AppState,
};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Auth routes (public + protected)
        .nest("/auth", auth_routes(state.clone()))
        // Protected routes - trader books
        .nest("/customers", customer_routes(state.clone()))
        .nest("/providers", provider_routes(state.clone()))
        .nest("/products", product_routes(state.clone()))
        .nest("/purchases", purchase_routes(state.clone()))
        .nest("/sales", sale_routes(state.clone()))
        // Admin panel, separate token scope
        .nest("/admin", admin_routes(state))
}

/// Authentication routes
fn auth_routes(state: AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/register", post(handlers::register))
        .route("/login", post(handlers::login))
        .route("/refresh", post(handlers::refresh));

    let protected = Router::new()
        .route("/me", get(handlers::me).put(handlers::update_profile))
        .route("/password", put(handlers::change_password))
        .route("/logout", post(handlers::logout))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware));

    public.merge(protected)
}

/// Customer routes (protected)
fn customer_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_customers).post(handlers::create_customer),
        )
        .route(
            "/:customer_id",
            get(handlers::get_customer)
                .put(handlers::update_customer)
                .delete(handlers::delete_customer),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Provider routes (protected)
fn provider_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_providers).post(handlers::create_provider),
        )
        .route(
            "/:provider_id",
            get(handlers::get_provider)
                .put(handlers::update_provider)
                .delete(handlers::delete_provider),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Product routes (protected)
fn product_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_products).post(handlers::create_product))
        .route("/low-stock", get(handlers::low_stock_products))
        .route(
            "/:product_id",
            get(handlers::get_product)
                .put(handlers::update_product)
                .delete(handlers::delete_product),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Purchase routes (protected)
fn purchase_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_purchases).post(handlers::create_purchase),
        )
        .route(
            "/:purchase_id",
            get(handlers::get_purchase).delete(handlers::delete_purchase),
        )
        .route(
            "/:purchase_id/payments",
            post(handlers::record_purchase_payment),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Sale routes (protected)
fn sale_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_sales).post(handlers::create_sale))
        .route(
            "/:sale_id",
            get(handlers::get_sale).delete(handlers::delete_sale),
        )
        .route("/:sale_id/payments", post(handlers::record_sale_payment))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Admin panel routes
fn admin_routes(state: AppState) -> Router<AppState> {
    let auth = Router::new()
        .route("/auth/login", post(handlers::admin_login))
        .route("/auth/refresh", post(handlers::admin_refresh));

    let protected = Router::new()
        .route("/auth/me", get(handlers::admin_me))
        .route("/users", get(handlers::list_users))
        .route(
            "/users/:user_id",
            get(handlers::get_user).delete(handlers::delete_user),
        )
        .route("/users/:user_id/status", put(handlers::set_user_status))
        .route_layer(middleware::from_fn_with_state(state, admin_middleware));

    auth.merge(protected)
}
