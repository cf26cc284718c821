//! HTTP surface: BFF API routes, the OAuth callback and the gated pages.

pub mod auth;
pub mod chat;
pub mod pages;
pub mod upload;

use actix_web::middleware::from_fn;
use actix_web::web;
use utoipa::OpenApi;

use crate::auth::{protected_gate, public_gate};

/// Pages that need a session.
pub const PROTECTED_PAGES: &[&str] = &["/", "/admin"];
/// Pages only shown to anonymous users.
pub const PUBLIC_PAGES: &[&str] = &["/login", "/signup", "/verify-email", "/auth/error"];
/// Shown regardless of session; the OAuth callback lands here already signed in.
pub const OPEN_PAGES: &[&str] = &["/auth/success"];

#[derive(OpenApi)]
#[openapi(
    paths(
        chat::chat,
        chat::chat_events,
        upload::upload,
        auth::login,
        auth::register,
        auth::forgot_password,
        auth::reset_password,
        auth::verify_email,
        auth::logout,
        auth::oauth_callback
    ),
    components(schemas(
        crate::chat::ChatRequest,
        crate::chat::ChatMessage,
        crate::chat::ChatRole,
        crate::rag::retriever::RetrievedChunk,
        crate::streaming::Progress,
        crate::upload::UploadProgressEvent,
        crate::error::ErrorResponse,
        auth::LoginPayload,
        auth::RegisterPayload,
        auth::ForgotPasswordPayload,
        auth::ResetPasswordPayload
    )),
    tags(
        (name = "chat", description = "Retrieval-augmented chat over the indexed documents"),
        (name = "upload", description = "Document upload proxy"),
        (name = "auth", description = "Auth passthrough to the API server")
    )
)]
pub struct ApiDoc;

/// Registers every route. Expects `web::Data<AppState>` and
/// `web::Data<SessionKeys>` in the app data.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(chat::chat)
        .service(chat::chat_events)
        .service(upload::upload)
        .service(auth::login)
        .service(auth::register)
        .service(auth::forgot_password)
        .service(auth::reset_password)
        .service(auth::verify_email)
        .service(auth::logout)
        .service(auth::oauth_callback);

    cfg.service(
        web::resource("/")
            .wrap(from_fn(protected_gate))
            .route(web::get().to(pages::home)),
    )
    .service(
        web::resource("/admin")
            .wrap(from_fn(protected_gate))
            .route(web::get().to(pages::admin)),
    );

    cfg.service(
        web::resource("/login")
            .wrap(from_fn(public_gate))
            .route(web::get().to(pages::login)),
    )
    .service(
        web::resource("/signup")
            .wrap(from_fn(public_gate))
            .route(web::get().to(pages::signup)),
    )
    .service(
        web::resource("/verify-email")
            .wrap(from_fn(public_gate))
            .route(web::get().to(pages::verify_email)),
    )
    .service(
        web::resource("/auth/error")
            .wrap(from_fn(public_gate))
            .route(web::get().to(pages::auth_error)),
    );

    cfg.service(web::resource("/auth/success").route(web::get().to(pages::auth_success)));
}
