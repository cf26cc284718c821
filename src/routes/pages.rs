//! Page routes. Each returns a bare HTML shell; the browser app renders the
//! rest. What matters server-side is which gate wraps which page.

use actix_web::{HttpResponse, web};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct SuccessQuery {
    pub provider: Option<String>,
}

fn shell(title: &str) -> HttpResponse {
    HttpResponse::Ok().content_type("text/html; charset=utf-8").body(format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head><meta charset=\"utf-8\"><title>{title} | DocsMind</title></head>\n<body><div id=\"root\" data-page=\"{title}\"></div></body>\n</html>\n"
    ))
}

pub async fn home() -> HttpResponse {
    shell("Chat")
}

pub async fn admin() -> HttpResponse {
    shell("Admin")
}

pub async fn login() -> HttpResponse {
    shell("Login")
}

pub async fn signup() -> HttpResponse {
    shell("Sign up")
}

pub async fn verify_email() -> HttpResponse {
    shell("Verify email")
}

/// Landing page after the OAuth callback has set the session.
pub async fn auth_success(query: web::Query<SuccessQuery>) -> HttpResponse {
    let provider = query
        .provider
        .as_deref()
        .filter(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    match provider {
        Some(provider) => shell(&format!("Signed in with {provider}")),
        None => shell("Signed in"),
    }
}

pub async fn auth_error() -> HttpResponse {
    shell("Sign-in failed")
}
