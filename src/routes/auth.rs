//! Auth passthrough routes and the OAuth callback.
//!
//! Every route forwards to `<API_ENDPOINT>/api/auth/*` with the caller's
//! bearer token and relays the reply. Any failure on the way becomes a 500
//! whose body is the fixed JSON string [`GENERIC_FAILURE`].

use actix_web::http::StatusCode;
use actix_web::http::header::{LOCATION, SET_COOKIE};
use actix_web::{HttpRequest, HttpResponse, HttpResponseBuilder, get, post, web};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::auth::{SessionKeys, bearer_token};
use crate::error::GENERIC_FAILURE;
use crate::state::AppState;
use crate::upstream::{UpstreamError, UpstreamReply, UpstreamRequest};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginPayload {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RegisterPayload {
    pub email: String,
    pub name: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ForgotPasswordPayload {
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ResetPasswordPayload {
    pub password: String,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct TokenQuery {
    /// One-time token from the e-mail link. Falls back to the bearer token.
    pub token: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct CallbackQuery {
    pub token: Option<String>,
    pub error: Option<String>,
    pub source: Option<String>,
    pub provider: Option<String>,
}

fn failure(err: &UpstreamError) -> HttpResponse {
    tracing::error!("Internal Server Error: {err}");
    HttpResponse::InternalServerError().json(GENERIC_FAILURE)
}

/// Response builder carrying the upstream status and cookies.
fn relay(reply: &UpstreamReply) -> HttpResponseBuilder {
    let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut builder = HttpResponse::build(status);
    for cookie in &reply.set_cookies {
        builder.append_header((SET_COOKIE, cookie.as_str()));
    }
    builder
}

async fn forward(
    state: &AppState,
    request: UpstreamRequest,
) -> HttpResponse {
    match state.upstream.send_json(request).await {
        Ok(reply) => relay(&reply).json(&reply.body),
        Err(e) => failure(&e),
    }
}

fn token_or_bearer(
    query: TokenQuery,
    req: &HttpRequest,
) -> Option<String> {
    query.token.filter(|t| !t.is_empty()).or_else(|| bearer_token(req))
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginPayload,
    responses(
        (status = 200, description = "Upstream reply; sets the auth_token cookie when it carries data.token"),
        (status = 500, description = "Upstream unreachable", body = String)
    ),
    tag = "auth"
)]
#[post("/api/auth/login")]
pub async fn login(
    req: HttpRequest,
    state: web::Data<AppState>,
    keys: web::Data<SessionKeys>,
    body: web::Json<LoginPayload>,
) -> HttpResponse {
    let request = match UpstreamRequest::post("/auth/login").json(&body.into_inner()) {
        Ok(request) => request.bearer(bearer_token(&req).as_deref()),
        Err(e) => return failure(&e),
    };

    let reply = match state.upstream.send_json(request).await {
        Ok(reply) => reply,
        Err(e) => return failure(&e),
    };

    let mut response = relay(&reply);
    if let Some(token) = reply.body.pointer("/data/token").and_then(|t| t.as_str()) {
        tracing::info!("Login succeeded, issuing session cookie");
        response.cookie(keys.login_cookie(token));
    }
    response.json(&reply.body)
}

#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterPayload,
    responses(
        (status = 200, description = "Upstream reply"),
        (status = 500, description = "Upstream unreachable", body = String)
    ),
    tag = "auth"
)]
#[post("/api/auth/register")]
pub async fn register(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<RegisterPayload>,
) -> HttpResponse {
    match UpstreamRequest::post("/auth/register").json(&body.into_inner()) {
        Ok(request) => forward(&state, request.bearer(bearer_token(&req).as_deref())).await,
        Err(e) => failure(&e),
    }
}

#[utoipa::path(
    post,
    path = "/api/auth/forgot-password",
    request_body = ForgotPasswordPayload,
    responses(
        (status = 200, description = "Upstream reply"),
        (status = 500, description = "Upstream unreachable", body = String)
    ),
    tag = "auth"
)]
#[post("/api/auth/forgot-password")]
pub async fn forgot_password(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<ForgotPasswordPayload>,
) -> HttpResponse {
    match UpstreamRequest::post("/auth/forgot-password").json(&body.into_inner()) {
        Ok(request) => forward(&state, request.bearer(bearer_token(&req).as_deref())).await,
        Err(e) => failure(&e),
    }
}

#[utoipa::path(
    post,
    path = "/api/auth/reset-password",
    params(TokenQuery),
    request_body = ResetPasswordPayload,
    responses(
        (status = 200, description = "Upstream reply"),
        (status = 500, description = "Upstream unreachable", body = String)
    ),
    tag = "auth"
)]
#[post("/api/auth/reset-password")]
pub async fn reset_password(
    req: HttpRequest,
    state: web::Data<AppState>,
    query: web::Query<TokenQuery>,
    body: web::Json<ResetPasswordPayload>,
) -> HttpResponse {
    let mut request = match UpstreamRequest::post("/auth/reset-password").json(&body.into_inner()) {
        Ok(request) => request.bearer(bearer_token(&req).as_deref()),
        Err(e) => return failure(&e),
    };
    if let Some(token) = token_or_bearer(query.into_inner(), &req) {
        request = request.query("token", token);
    }
    forward(&state, request).await
}

#[utoipa::path(
    get,
    path = "/api/auth/verify-email",
    params(TokenQuery),
    responses(
        (status = 200, description = "Upstream reply"),
        (status = 500, description = "Upstream unreachable", body = String)
    ),
    tag = "auth"
)]
#[get("/api/auth/verify-email")]
pub async fn verify_email(
    req: HttpRequest,
    state: web::Data<AppState>,
    query: web::Query<TokenQuery>,
) -> HttpResponse {
    let mut request = UpstreamRequest::get("/auth/verify-email").bearer(bearer_token(&req).as_deref());
    if let Some(token) = token_or_bearer(query.into_inner(), &req) {
        request = request.query("token", token);
    }
    forward(&state, request).await
}

#[utoipa::path(
    get,
    path = "/api/auth/logout",
    responses(
        (status = 200, description = "Upstream reply; clears the auth_token cookie"),
        (status = 500, description = "Upstream unreachable", body = String)
    ),
    tag = "auth"
)]
#[get("/api/auth/logout")]
pub async fn logout(
    req: HttpRequest,
    state: web::Data<AppState>,
    keys: web::Data<SessionKeys>,
) -> HttpResponse {
    let request = UpstreamRequest::get("/auth/logout").bearer(bearer_token(&req).as_deref());

    let mut response = forward(&state, request).await;
    // The local session ends even when the upstream call fails.
    if let Err(e) = response.add_cookie(&keys.logout_cookie()) {
        tracing::warn!("Could not clear session cookie: {e}");
    }
    response
}

fn redirect_to(
    req: &HttpRequest,
    path: &str,
    params: &[(&str, &str)],
) -> HttpResponseBuilder {
    let mut url = req.full_url();
    url.set_path(path);
    url.set_query(None);
    if !params.is_empty() {
        url.query_pairs_mut().extend_pairs(params);
    }

    let mut builder = HttpResponse::Found();
    builder.insert_header((LOCATION, url.as_str()));
    builder
}

#[utoipa::path(
    get,
    path = "/auth",
    params(CallbackQuery),
    responses(
        (status = 302, description = "Redirect to /auth/success or /auth/error")
    ),
    tag = "auth"
)]
#[get("/auth")]
pub async fn oauth_callback(
    req: HttpRequest,
    keys: web::Data<SessionKeys>,
    query: web::Query<CallbackQuery>,
) -> HttpResponse {
    let CallbackQuery {
        token,
        error,
        source,
        provider,
    } = query.into_inner();
    let source = source.unwrap_or_else(|| "unknown".to_string());

    match (token.filter(|t| !t.is_empty()), error.filter(|e| !e.is_empty())) {
        (Some(token), None) => {
            let params: Vec<(&str, &str)> = provider.as_deref().map(|p| ("provider", p)).into_iter().collect();
            redirect_to(&req, "/auth/success", &params)
                .cookie(keys.login_cookie(&token))
                .finish()
        }
        (_, error) => {
            tracing::warn!("Auth callback from {source} failed: {}", error.as_deref().unwrap_or("missing token"));
            let mut params = vec![("source", source.as_str())];
            if let Some(message) = error.as_deref() {
                params.push(("message", message));
            }
            redirect_to(&req, "/auth/error", &params).finish()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::upstream::UpstreamClient;
    use actix_web::test::{TestRequest, call_service, init_service, read_body_json};
    use actix_web::App;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn unreachable_state() -> web::Data<AppState> {
        // Port 9 (discard) is closed on test machines; connections are refused.
        let upstream = UpstreamClient::new(reqwest::Client::new(), "http://127.0.0.1:9/api");
        web::Data::new(AppState::with_chain(Config::default(), upstream, None))
    }

    fn keys() -> web::Data<SessionKeys> {
        web::Data::new(SessionKeys::from_secret(Some(SECRET), false).unwrap())
    }

    #[actix_web::test]
    async fn test_callback_success_sets_cookie_and_redirects() {
        let keys = keys();
        let app = init_service(App::new().app_data(keys.clone()).service(oauth_callback)).await;

        let res = call_service(
            &app,
            TestRequest::get().uri("/auth?token=tok-1&provider=google").to_request(),
        )
        .await;

        assert_eq!(res.status(), StatusCode::FOUND);
        let location = res.headers().get(LOCATION).unwrap().to_str().unwrap();
        assert!(location.ends_with("/auth/success?provider=google"), "{location}");
        let cookie = res.response().cookies().find(|c| c.name() == "auth_token").unwrap();
        assert!(!cookie.value().is_empty());
    }

    #[actix_web::test]
    async fn test_callback_error_redirects_with_message() {
        let app = init_service(App::new().app_data(keys()).service(oauth_callback)).await;

        let res = call_service(
            &app,
            TestRequest::get()
                .uri("/auth?error=access_denied&source=github")
                .to_request(),
        )
        .await;

        assert_eq!(res.status(), StatusCode::FOUND);
        let location = res.headers().get(LOCATION).unwrap().to_str().unwrap();
        assert!(location.ends_with("/auth/error?source=github&message=access_denied"), "{location}");
        assert_eq!(res.response().cookies().count(), 0);
    }

    #[actix_web::test]
    async fn test_callback_without_token_defaults_source() {
        let app = init_service(App::new().app_data(keys()).service(oauth_callback)).await;

        let res = call_service(&app, TestRequest::get().uri("/auth").to_request()).await;
        let location = res.headers().get(LOCATION).unwrap().to_str().unwrap();
        assert!(location.ends_with("/auth/error?source=unknown"), "{location}");
    }

    #[actix_web::test]
    async fn test_unreachable_upstream_returns_generic_failure() {
        let app = init_service(
            App::new()
                .app_data(unreachable_state())
                .app_data(keys())
                .service(register),
        )
        .await;

        let res = call_service(
            &app,
            TestRequest::post()
                .uri("/api/auth/register")
                .set_json(serde_json::json!({ "email": "a@b.c", "name": "A", "password": "pw" }))
                .to_request(),
        )
        .await;

        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: String = read_body_json(res).await;
        assert_eq!(body, GENERIC_FAILURE);
    }

    #[actix_web::test]
    async fn test_logout_clears_cookie_even_on_failure() {
        let app = init_service(
            App::new()
                .app_data(unreachable_state())
                .app_data(keys())
                .service(logout),
        )
        .await;

        let res = call_service(&app, TestRequest::get().uri("/api/auth/logout").to_request()).await;
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let cookie = res.response().cookies().find(|c| c.name() == "auth_token").unwrap();
        assert_eq!(cookie.value(), "");
    }
}
