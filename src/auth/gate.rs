//! Page-level access control.
//!
//! Pages are split into two groups. Signed-in users are sent away from the
//! public auth pages and anonymous users away from the protected ones.

use actix_web::body::MessageBody;
use actix_web::cookie::Cookie;
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::http::header::LOCATION;
use actix_web::middleware::Next;
use actix_web::{Error, HttpResponse, web};

use super::session::{Session, SessionKeys};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    /// Session not read yet.
    Loading,
    LoggedIn,
    LoggedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteGroup {
    Public,
    Protected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    Redirect(&'static str),
}

/// Where a request in `group` goes given the current `state`.
#[must_use]
pub const fn decide(
    state: AuthState,
    group: RouteGroup,
) -> GateDecision {
    match (state, group) {
        (AuthState::LoggedIn, RouteGroup::Public) => GateDecision::Redirect("/"),
        (AuthState::LoggedOut, RouteGroup::Protected) => GateDecision::Redirect("/login"),
        _ => GateDecision::Allow,
    }
}

/// Session state machine for one route group.
#[derive(Debug)]
pub struct AuthGate {
    group: RouteGroup,
    state: AuthState,
}

impl AuthGate {
    #[must_use]
    pub const fn new(group: RouteGroup) -> Self {
        Self {
            group,
            state: AuthState::Loading,
        }
    }

    #[must_use]
    pub const fn state(&self) -> AuthState {
        self.state
    }

    /// Leaves `Loading` once the session has been read.
    pub fn mount(
        &mut self,
        session: Option<&Session>,
    ) -> GateDecision {
        self.state = if session.is_some() {
            AuthState::LoggedIn
        } else {
            AuthState::LoggedOut
        };
        self.decision()
    }

    #[must_use]
    pub const fn decision(&self) -> GateDecision {
        decide(self.state, self.group)
    }

    pub fn login(
        &mut self,
        keys: &SessionKeys,
        token: &str,
    ) -> Cookie<'static> {
        self.state = AuthState::LoggedIn;
        keys.login_cookie(token)
    }

    pub fn logout(
        &mut self,
        keys: &SessionKeys,
    ) -> Cookie<'static> {
        self.state = AuthState::LoggedOut;
        keys.logout_cookie()
    }
}

async fn gate(
    group: RouteGroup,
    req: ServiceRequest,
    next: Next<impl MessageBody + 'static>,
) -> Result<ServiceResponse<impl MessageBody>, Error> {
    let session = req
        .app_data::<web::Data<SessionKeys>>()
        .and_then(|keys| keys.read(req.request()));

    let mut gate = AuthGate::new(group);
    match gate.mount(session.as_ref()) {
        GateDecision::Allow => Ok(next.call(req).await?.map_into_boxed_body()),
        GateDecision::Redirect(location) => {
            tracing::debug!("Redirecting {} to {location}", req.path());
            let response = HttpResponse::Found().insert_header((LOCATION, location)).finish();
            Ok(req.into_response(response))
        }
    }
}

/// Middleware for the login/signup pages.
///
/// # Errors
///
/// Propagates errors from the wrapped service.
pub async fn public_gate(
    req: ServiceRequest,
    next: Next<impl MessageBody + 'static>,
) -> Result<ServiceResponse<impl MessageBody>, Error> {
    gate(RouteGroup::Public, req, next).await
}

/// Middleware for pages that need a session.
///
/// # Errors
///
/// Propagates errors from the wrapped service.
pub async fn protected_gate(
    req: ServiceRequest,
    next: Next<impl MessageBody + 'static>,
) -> Result<ServiceResponse<impl MessageBody>, Error> {
    gate(RouteGroup::Protected, req, next).await
}
