//! Library API server

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{
    routing::{get, post, put},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use library_api::{
    api,
    clock::SystemClock,
    config::{AppConfig, CacheBackend},
    repository::Repository,
    services::{
        cache::{Cache, CacheService, MemoryCache},
        redis::RedisService,
        Services,
    },
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("library_api={},tower_http=debug", config.logging.level).into());

    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("Starting Library API v{}", env!("CARGO_PKG_VERSION"));

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .connect(&config.database.url)
        .await
        .context("Failed to connect to database")?;

    tracing::info!("Connected to database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;

    tracing::info!("Database migrations completed");

    let backend: Arc<dyn Cache> = match config.cache.backend {
        CacheBackend::Redis => {
            let redis = RedisService::new(&config.redis.url)
                .await
                .context("Failed to connect to Redis")?;
            tracing::info!("Connected to Redis");
            Arc::new(redis)
        }
        CacheBackend::Memory => {
            tracing::info!("Using in-process cache");
            Arc::new(MemoryCache::new())
        }
    };
    let cache = CacheService::new(backend, config.cache.ttl_seconds);

    let addr = SocketAddr::new(
        config
            .server
            .host
            .parse()
            .with_context(|| format!("Invalid host address: {}", config.server.host))?,
        config.server.port,
    );

    let repository = Repository::new(pool.clone());
    let services = Services::new(
        repository,
        config.auth.clone(),
        config.loans.clone(),
        cache,
        Arc::new(SystemClock),
    );
    services
        .users
        .ensure_admin()
        .await
        .context("Failed to create bootstrap administrator")?;

    let state = AppState {
        config: Arc::new(config),
        services: Arc::new(services),
        pool,
    };

    let app = create_router(state);

    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes
fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        // Health check
        .route("/health", get(api::health::health_check))
        .route("/ready", get(api::health::readiness_check))
        // Authentication
        .route("/auth/login", post(api::auth::login))
        .route("/auth/register", post(api::auth::register))
        .route("/auth/me", get(api::auth::me))
        // Books
        .route("/books", get(api::books::list_books).post(api::books::create_book))
        .route("/books/most-borrowed", get(api::books::most_borrowed))
        .route("/books/isbn/:isbn", get(api::books::get_book_by_isbn))
        .route("/books/search/title", get(api::books::search_by_title))
        .route("/books/search/author/:id", get(api::books::search_by_author))
        .route("/books/search/category/:id", get(api::books::search_by_category))
        .route(
            "/books/:id",
            get(api::books::get_book)
                .put(api::books::update_book)
                .delete(api::books::delete_book),
        )
        // Authors
        .route("/authors", get(api::authors::list_authors).post(api::authors::create_author))
        .route("/authors/search", get(api::authors::search_authors))
        .route(
            "/authors/:id",
            get(api::authors::get_author)
                .put(api::authors::update_author)
                .delete(api::authors::delete_author),
        )
        .route("/authors/:id/books", get(api::authors::author_books))
        // Categories
        .route(
            "/categories",
            get(api::categories::list_categories).post(api::categories::create_category),
        )
        .route("/categories/name/:name", get(api::categories::get_category_by_name))
        .route(
            "/categories/:id",
            get(api::categories::get_category)
                .put(api::categories::update_category)
                .delete(api::categories::delete_category),
        )
        // Users
        .route("/users", get(api::users::list_users).post(api::users::create_user))
        .route("/users/me", get(api::users::get_current_user))
        .route(
            "/users/:id",
            get(api::users::get_user)
                .put(api::users::update_user)
                .delete(api::users::delete_user),
        )
        .route("/users/:id/loans", get(api::users::get_user_loans))
        .route("/users/:id/fines", get(api::users::get_user_fines))
        // Loans
        .route("/loans", get(api::loans::list_loans).post(api::loans::create_loan))
        .route("/loans/overdue", get(api::loans::overdue_loans))
        .route("/loans/:id", get(api::loans::get_loan))
        .route("/loans/:id/return", put(api::loans::return_loan))
        .route("/loans/:id/renew", put(api::loans::renew_loan))
        // Fines
        .route("/fines/:id/pay", post(api::fines::pay_fine))
        // Dashboard
        .route("/dashboard", get(api::dashboard::get_dashboard))
        .route("/dashboard/loans", get(api::dashboard::get_loan_statistics))
        .route("/dashboard/users", get(api::dashboard::get_user_statistics))
        .with_state(state);

    let openapi = api::openapi::create_openapi_router();

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
