use crate::{
    app_state::AppState,
    config::ServeConfig,
    credentials::CredentialIssuer,
    handlers,
    identity_client::{IdentityClient, ProviderConfig},
};
use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use migration::MigratorTrait;
use sea_orm::Database;
use std::time::Duration;

/// Mount every API route under `/api/v1`.
pub fn configure_api(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .app_data(web::JsonConfig::default().error_handler(handlers::json_error_handler))
            .route("/config", web::get().to(handlers::get_config))
            .route("/login", web::post().to(handlers::login))
            .route("/v2/login", web::post().to(handlers::login_v2))
            .route("/register", web::post().to(handlers::register))
            .route("/session", web::get().to(handlers::get_session)),
    );
}

/// Validate configuration, open and migrate the database, and build the
/// immutable collaborators shared by every worker.
pub async fn build_app_state(config: &ServeConfig) -> anyhow::Result<AppState> {
    config.validate()?;

    log::info!("Connecting to database: {}", config.database_url);
    let db = Database::connect(&config.database_url).await?;

    log::info!("Running database migrations...");
    migration::Migrator::up(&db, None).await?;
    log::info!("Database migrations completed");

    let oauth_enabled = config.oauth_configured();
    if oauth_enabled {
        log::info!("OAuth login enabled (token endpoint: {})", config.oauth_token_url);
    } else {
        log::warn!("OAuth provider not fully configured; only password login is available");
    }

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.provider_timeout_secs))
        .build()?;

    let identity = IdentityClient::new(
        http,
        ProviderConfig {
            client_id: config.oauth_client_id.clone(),
            client_secret: config.oauth_client_secret.clone(),
            token_url: config.oauth_token_url.clone(),
            profile_url: config.oauth_profile_url.clone(),
        },
    );

    Ok(AppState {
        db,
        identity,
        issuer: CredentialIssuer::new(&config.jwt_secret, config.token_ttl_secs),
        oauth_enabled,
    })
}

pub async fn run_server(config: ServeConfig) -> anyhow::Result<()> {
    log::info!("Starting Kaiyuan API Server...");

    let app_state = web::Data::new(build_app_state(&config).await?);

    let bind_address = config.bind_address.clone();
    let cors_origins = config.cors_origin_list();

    log::info!("Listening on {}", bind_address);

    HttpServer::new(move || {
        let mut cors = Cors::default()
            .allowed_methods(vec!["GET", "POST", "OPTIONS"])
            .allowed_headers(vec![
                actix_web::http::header::AUTHORIZATION,
                actix_web::http::header::ACCEPT,
                actix_web::http::header::CONTENT_TYPE,
            ])
            .max_age(3600);

        for origin in &cors_origins {
            cors = cors.allowed_origin(origin);
        }

        App::new()
            .app_data(app_state.clone())
            .wrap(middleware::Logger::default())
            .wrap(cors)
            .configure(configure_api)
    })
    .bind(&bind_address)?
    .run()
    .await?;

    Ok(())
}
