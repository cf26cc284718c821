//! Signed `auth_token` session cookie.
//!
//! The cookie value is `<issued_at>.<token>` signed with the server key, so a
//! session is accepted only when the signature verifies and it is younger
//! than [`SESSION_TTL`]. The token itself is opaque and owned by the external
//! API server.

use std::future::{Ready, ready};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use actix_web::cookie::{Cookie, CookieJar, Key, SameSite, time};
use actix_web::dev::Payload;
use actix_web::http::header::AUTHORIZATION;
use actix_web::{FromRequest, HttpRequest, web};

use crate::config::ConfigError;
use crate::error::ApiError;

pub const AUTH_COOKIE: &str = "auth_token";
pub const SESSION_TTL: Duration = Duration::from_secs(60 * 60 * 24 * 7);
const MIN_SECRET_LEN: usize = 32;

/// An authenticated session read from a verified cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub issued_at: u64,
}

pub struct SessionKeys {
    key: Key,
    secure: bool,
}

impl SessionKeys {
    /// Derives the signing key from `secret`, or generates a per-process key
    /// when none is configured (sessions then do not survive restarts).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the secret is shorter than 32 bytes.
    pub fn from_secret(
        secret: Option<&str>,
        secure: bool,
    ) -> Result<Self, ConfigError> {
        let key = match secret {
            Some(secret) if secret.len() >= MIN_SECRET_LEN => Key::derive_from(secret.as_bytes()),
            Some(_) => {
                return Err(ConfigError::Invalid {
                    name: "SESSION_SECRET",
                    value: format!("must be at least {MIN_SECRET_LEN} bytes"),
                });
            }
            None => {
                tracing::warn!("SESSION_SECRET not set; generated a random key, sessions end on restart");
                Key::generate()
            }
        };
        Ok(Self { key, secure })
    }

    /// Cookie that logs the browser in with `token` for seven days.
    #[must_use]
    pub fn login_cookie(
        &self,
        token: &str,
    ) -> Cookie<'static> {
        self.login_cookie_at(token, SystemTime::now())
    }

    fn login_cookie_at(
        &self,
        token: &str,
        now: SystemTime,
    ) -> Cookie<'static> {
        let value = format!("{}.{token}", unix_secs(now));

        let mut jar = CookieJar::new();
        jar.signed_mut(&self.key).add(Cookie::new(AUTH_COOKIE, value));
        let signed_value = jar
            .get(AUTH_COOKIE)
            .map(|cookie| cookie.value().to_string())
            .unwrap_or_default();

        Cookie::build(AUTH_COOKIE, signed_value)
            .path("/")
            .max_age(time::Duration::seconds(SESSION_TTL.as_secs() as i64))
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure)
            .finish()
    }

    /// Cookie that clears the session.
    #[must_use]
    pub fn logout_cookie(&self) -> Cookie<'static> {
        let mut cookie = Cookie::build(AUTH_COOKIE, "")
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure)
            .finish();
        cookie.make_removal();
        cookie
    }

    /// Verified session carried by `req`, if any.
    #[must_use]
    pub fn read(
        &self,
        req: &HttpRequest,
    ) -> Option<Session> {
        let cookie = req.cookie(AUTH_COOKIE)?;
        self.verify_at(cookie, SystemTime::now())
    }

    fn verify_at(
        &self,
        cookie: Cookie<'static>,
        now: SystemTime,
    ) -> Option<Session> {
        let mut jar = CookieJar::new();
        jar.add_original(cookie);
        let verified = jar.signed(&self.key).get(AUTH_COOKIE)?;

        let (issued, token) = verified.value().split_once('.')?;
        let issued_at: u64 = issued.parse().ok()?;
        let age = unix_secs(now).checked_sub(issued_at)?;
        if age >= SESSION_TTL.as_secs() || token.is_empty() {
            return None;
        }

        Some(Session {
            token: token.to_string(),
            issued_at,
        })
    }
}

fn unix_secs(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or_default()
}

/// Bearer token for forwarding: the caller's `Authorization` header wins,
/// then the session cookie.
#[must_use]
pub fn bearer_token(req: &HttpRequest) -> Option<String> {
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.strip_prefix("Bearer ").unwrap_or(value).trim())
        .filter(|value| !value.is_empty())
        .map(str::to_string);

    header.or_else(|| {
        req.app_data::<web::Data<SessionKeys>>()
            .and_then(|keys| keys.read(req))
            .map(|session| session.token)
    })
}

impl FromRequest for Session {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(
        req: &HttpRequest,
        _payload: &mut Payload,
    ) -> Self::Future {
        ready(
            req.app_data::<web::Data<SessionKeys>>()
                .and_then(|keys| keys.read(req))
                .ok_or_else(|| ApiError::unauthorized("No valid session")),
        )
    }
}
