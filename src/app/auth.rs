//! Passwordless sign-in using one-time links sent via email.
//!
//! 1. The user submits their email address on `/login`.
//! 2. If they have an account, a short-lived login token is created and a link
//!    to `/login?token=...` is emailed to them (or logged, without SMTP).
//! 3. Following the link exchanges the token for a session cookie.

use chrono::TimeDelta;
use lettre::message::Mailbox;

use crate::db::token::{LoginToken, SessionToken};
use crate::prelude::*;
use crate::utils::error::HtmlError;

/// Add all `auth` routes to the router.
#[rustfmt::skip]
pub fn add_routes(router: AppRouter) -> AppRouter {
    router.public_routes(|r| {
        r.route("/login", post(login_form).get(login_link))
         .route("/logout", post(logout))
    })
}

/// Add all `auth` middleware to the router.
pub fn add_middleware(router: AxumRouter, state: SharedAppState) -> AxumRouter {
    /// Middleware layer to add a `User` to the request if a valid session token is present.
    async fn session_middleware(
        State(state): State<SharedAppState>, mut cookies: CookieJar, mut request: Request, next: Next,
    ) -> Result<(CookieJar, Response), HtmlError> {
        if let Some(token) = cookies.get("session") {
            let max_age = TimeDelta::days(state.config.app.session_expiry_days);
            match SessionToken::lookup_user(&state.db, token.value(), max_age).await? {
                Some(user) => {
                    request.extensions_mut().insert(user);
                }
                None => cookies = cookies.remove(Cookie::build("session").path("/")),
            }
        }
        let response = next.run(request).await;
        Ok((cookies, response))
    }
    router.layer(axum::middleware::from_fn_with_state(state, session_middleware))
}

/// Enable extracting an `Option<User>` in a handler.
impl<S: Send + Sync> axum::extract::OptionalFromRequestParts<S> for User {
    type Rejection = Infallible;
    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts.extensions.get::<User>().cloned())
    }
}
/// Enable extracting a `User` in a handler, returning UNAUTHORIZED if not logged in.
impl<S: Send + Sync> axum::extract::FromRequestParts<S> for User {
    type Rejection = AppError;
    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<User>().cloned() {
            Some(user) => Ok(user),
            None => Err(AppError::Unauthorized),
        }
    }
}

#[derive(serde::Deserialize)]
struct LoginForm {
    email: String,
    redirect: Option<String>,
}

/// Process a login form and send a login link via email.
async fn login_form(State(state): State<SharedAppState>, Form(form): Form<LoginForm>) -> HtmlResult {
    let Ok(mailbox) = form.email.trim().parse::<Mailbox>() else {
        return Err(invalid("Please enter a valid email address.").into());
    };
    let email = mailbox.email.to_string();

    // Unknown addresses see the same page, so the form doesn't reveal who has an account.
    let Some(user) = User::lookup_by_email(&state.db, &email).await? else {
        tracing::info!(%email, "Login requested for unknown email");
        return Ok(CheckEmailHtml { user: None, email }.into_response());
    };

    let token = LoginToken::create(&state.db, &user).await?;
    let base_url = &state.config.app.url;
    let url = match safe_redirect(form.redirect.as_deref()) {
        Some(redirect) => format!("{base_url}/login?token={token}&redirect={}", encode(redirect)),
        None => format!("{base_url}/login?token={token}"),
    };

    match &state.notifier {
        Some(notifier) => {
            let message = notifier
                .builder()
                .to(mailbox)
                .subject(format!("Sign in to {}", state.config.app.name))
                .body(format!("Click here to sign in: {url}\n\nThis link expires in 15 minutes."))?;
            notifier.send(message).await?;
        }
        None => tracing::info!(user_id = user.id, %url, "Login link"),
    }

    Ok(CheckEmailHtml { user: None, email }.into_response())
}

#[derive(Template, WebTemplate)]
#[template(path = "auth/check_email.html")]
struct CheckEmailHtml {
    user: Option<User>,
    email: String,
}

#[derive(serde::Deserialize)]
struct LoginQuery {
    redirect: Option<String>,
    token: Option<String>,
}
impl LoginQuery {
    fn redirect(&self) -> Redirect {
        Redirect::to(safe_redirect(self.redirect.as_deref()).unwrap_or("/"))
    }
}

/// Show the login page or handle a login link.
async fn login_link(
    user: Option<User>, State(state): State<SharedAppState>, Query(query): Query<LoginQuery>,
) -> HtmlResult {
    // Already signed in, just follow the redirect
    if user.is_some() {
        return Ok(query.redirect().into_response());
    }

    // If there's no token, just show the login page.
    let Some(token) = &query.token else {
        #[derive(Template, WebTemplate)]
        #[template(path = "auth/login.html")]
        struct Html {
            user: Option<User>,
            redirect: String,
        }
        let redirect = safe_redirect(query.redirect.as_deref()).unwrap_or_default().to_string();
        return Ok(Html { user, redirect }.into_response());
    };

    // Otherwise we're handling a login link. Validate the login token and create a new session.
    let Some(user) = LoginToken::redeem(&state.db, token).await? else {
        return Err(unauthorized().into());
    };
    tracing::info!(user_id = user.id, "Signed in");
    let session = SessionToken::create(&state.db, &user).await?;
    let cookie = session_cookie(&state.config, session);

    let headers = [(header::SET_COOKIE, cookie)];
    Ok((headers, query.redirect()).into_response())
}

/// End the current session, if any.
async fn logout(State(state): State<SharedAppState>, cookies: CookieJar) -> HtmlResult {
    if let Some(token) = cookies.get("session") {
        SessionToken::delete(&state.db, token.value()).await?;
    }
    let cookies = cookies.remove(Cookie::build("session").path("/"));
    Ok((cookies, Redirect::to("/")).into_response())
}

fn session_cookie(config: &Config, token: String) -> String {
    Cookie::build(("session", token))
        .secure(config.app.url.starts_with("https://"))
        .http_only(true)
        .path("/")
        .same_site(cookie::SameSite::Lax)
        .domain(config.app.domain.clone())
        .max_age(cookie::time::Duration::days(config.app.session_expiry_days))
        .to_string()
}

/// Only allow redirects to local paths.
pub fn safe_redirect(redirect: Option<&str>) -> Option<&str> {
    redirect.filter(|r| r.starts_with('/') && !r.starts_with("//"))
}

/// Percent-encode a local path for use as a query parameter.
pub fn encode(path: &str) -> String {
    url::form_urlencoded::byte_serialize(path.as_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::testing::{body_string, TestApp};

    #[test]
    fn redirects_stay_on_site() {
        assert_eq!(safe_redirect(Some("/dashboard/posts")), Some("/dashboard/posts"));
        assert_eq!(safe_redirect(Some("//evil.test")), None);
        assert_eq!(safe_redirect(Some("https://evil.test")), None);
        assert_eq!(safe_redirect(None), None);
    }

    #[test]
    fn paths_are_query_encoded() {
        assert_eq!(encode("/dashboard/posts"), "%2Fdashboard%2Fposts");
        assert_eq!(encode("/a?b=c&d e"), "%2Fa%3Fb%3Dc%26d+e");
    }

    #[tokio::test]
    async fn login_link_creates_a_session() {
        let app = TestApp::new().await;
        let (user, _) = app.user("editor@nexora.test", Role::Editor).await;
        let token = LoginToken::create(app.db(), &user).await.unwrap();

        let response = app.get(&format!("/login?token={token}&redirect=/dashboard"), None).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/dashboard");
        let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap().to_string();
        assert!(cookie.starts_with("session="), "{cookie}");

        // Links are single use
        let response = app.get(&format!("/login?token={token}"), None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn login_form_does_not_reveal_accounts() {
        let app = TestApp::new().await;
        app.user("known@nexora.test", Role::User).await;

        let known = app.post_form("/login", None, "email=known%40nexora.test").await;
        let unknown = app.post_form("/login", None, "email=nobody%40nexora.test").await;
        assert_eq!(known.status(), StatusCode::OK);
        assert_eq!(unknown.status(), StatusCode::OK);

        let invalid = app.post_form("/login", None, "email=not-an-email").await;
        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn logout_ends_the_session() {
        let app = TestApp::new().await;
        let (_, session) = app.user("admin@nexora.test", Role::Admin).await;

        let response = app.post_form("/logout", Some(&session), "").await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let response = app.get("/api/me", Some(&session)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(body_string(response).await.contains("Unauthorized."));
    }
}
