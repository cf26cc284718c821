use actix_web::{App, HttpServer, web};
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use docsmind::auth::SessionKeys;
use docsmind::routes::{self, ApiDoc};
use docsmind::{AppState, Config};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env().map_err(std::io::Error::other)?;
    let bind_addr = config.bind_addr.clone();
    tracing::info!(
        "Environment: {}, chat backend: {}, API server: {}",
        config.app_env,
        config.chat_backend,
        config.api_base()
    );

    let keys = web::Data::new(
        SessionKeys::from_secret(config.session_secret.as_deref(), config.secure_cookies())
            .map_err(std::io::Error::other)?,
    );
    let state = web::Data::new(AppState::new(config).map_err(std::io::Error::other)?);

    tracing::info!("Starting server at http://{bind_addr}/swagger-ui/");

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .app_data(keys.clone())
            .configure(routes::configure)
            .service(SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-doc/openapi.json", ApiDoc::openapi()))
    })
    .bind(bind_addr)?
    .run()
    .await
}
