//! Gate the dashboard behind an ADMIN session.

use super::auth::encode;
use super::pages::UnauthorizedHtml;
use crate::prelude::*;

/// Path prefixes which require an ADMIN session.
const PROTECTED: &[&str] = &["/dashboard"];

#[derive(Debug, PartialEq, Eq)]
pub enum Decision {
    Allow,
    /// Not signed in, send them to the login page and back.
    SignIn,
    /// Signed in, but not allowed here.
    Unauthorized,
}

fn is_protected(path: &str) -> bool {
    PROTECTED.iter().any(|prefix| match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    })
}

/// Decide what to do with a request for `path` from a visitor with `role`.
pub fn decide(path: &str, role: Option<Role>) -> Decision {
    if !is_protected(path) {
        return Decision::Allow;
    }
    match role {
        None => Decision::SignIn,
        Some(Role::Admin) => Decision::Allow,
        Some(_) => Decision::Unauthorized,
    }
}

/// Add the guard to the router. Must run after the session middleware.
pub fn add_middleware(router: AxumRouter) -> AxumRouter {
    async fn guard_middleware(request: Request, next: Next) -> Response {
        let user = request.extensions().get::<User>().cloned();
        let path = request.uri().path().to_string();
        match decide(&path, user.as_ref().map(|u| u.role)) {
            Decision::Allow => next.run(request).await,
            Decision::SignIn => {
                tracing::debug!(%path, "Redirecting to sign in");
                Redirect::to(&format!("/login?redirect={}", encode(&path))).into_response()
            }
            Decision::Unauthorized => {
                tracing::debug!(%path, user_id = user.as_ref().map(|u| u.id), "Denied");
                UnauthorizedHtml { user }.into_response()
            }
        }
    }
    router.layer(axum::middleware::from_fn(guard_middleware))
}
