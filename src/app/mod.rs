use axum::extract::DefaultBodyLimit;

use crate::prelude::*;
use crate::utils::notifier::Notifier;

mod api;
mod auth;
mod blog;
mod contact;
mod dashboard;
mod guard;
mod pages;

pub struct AppState {
    pub config: Config,
    pub db: Db,
    /// Absent when no SMTP server is configured.
    pub notifier: Option<Notifier>,
}

pub async fn build(config: Config) -> Result<axum::Router<()>> {
    let notifier = match &config.email {
        Some(email) => Some(Notifier::connect(email)?),
        None => {
            tracing::warn!("No [email] configured, login links will only be logged");
            None
        }
    };
    let state = Arc::new(AppState { db: crate::db::init(&config.db).await?, config, notifier });
    Ok(router(state))
}

/// Assemble every route and middleware around an already initialized state.
pub fn router(state: SharedAppState) -> axum::Router<()> {
    crate::utils::dates::set_timezone(state.config.app.tz);

    // Register business logic routes
    let r = AppRouter::new(&state);
    let r = pages::add_routes(r);
    let r = blog::add_routes(r);
    let r = contact::add_routes(r);
    let r = auth::add_routes(r);
    let r = dashboard::add_routes(r);
    let r = api::add_routes(r);
    let (r, state) = r.finish();

    // Register app-wide routes
    let r = r.nest_service("/static", tower_http::services::ServeDir::new("static"));
    let r = r.fallback(|| async { not_found() });

    // Register middleware. The last layer added runs first, so the session is resolved before the guard.
    let r = guard::add_middleware(r);
    let r = auth::add_middleware(r, Arc::clone(&state));
    let r = crate::utils::tracing::add_middleware(r);
    let r = r.layer(DefaultBodyLimit::max(2 * 1024 * 1024));
    r.with_state(state)
}

#[cfg(test)]
pub(crate) mod testing {
    //! Helpers for driving the full router in tests.

    use axum::body::Body;
    use tower::ServiceExt as _;

    use super::*;
    use crate::db::token::SessionToken;
    use crate::db::user::UpdateUser;

    pub struct TestApp {
        pub state: SharedAppState,
        pub router: axum::Router<()>,
    }

    impl TestApp {
        pub async fn new() -> Self {
            let db = crate::db::memory().await.unwrap();
            let state = Arc::new(AppState { config: Config::test(), db, notifier: None });
            Self { router: router(state.clone()), state }
        }

        pub fn db(&self) -> &Db {
            &self.state.db
        }

        /// Create a user with a role and return them along with a session token.
        pub async fn user(&self, email: &str, role: Role) -> (User, String) {
            let id = User::create(self.db(), &UpdateUser { name: "Test User".into(), email: email.into() })
                .await
                .unwrap();
            User::set_role(self.db(), id, role).await.unwrap();
            let user = User::lookup_by_id(self.db(), id).await.unwrap().unwrap();
            let token = SessionToken::create(self.db(), &user).await.unwrap();
            (user, token)
        }

        pub async fn send(&self, request: axum::http::Request<Body>) -> Response {
            self.router.clone().oneshot(request).await.unwrap()
        }

        pub async fn get(&self, uri: &str, session: Option<&str>) -> Response {
            self.send(request("GET", uri, session).body(Body::empty()).unwrap()).await
        }

        pub async fn post_form(&self, uri: &str, session: Option<&str>, form: &str) -> Response {
            let req = request("POST", uri, session)
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(form.to_string()))
                .unwrap();
            self.send(req).await
        }

        pub async fn post_json(&self, uri: &str, session: Option<&str>, json: serde_json::Value) -> Response {
            let req = request("POST", uri, session)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap();
            self.send(req).await
        }
    }

    fn request(method: &str, uri: &str, session: Option<&str>) -> axum::http::request::Builder {
        let builder = axum::http::Request::builder().method(method).uri(uri);
        match session {
            Some(token) => builder.header(header::COOKIE, format!("session={token}")),
            None => builder,
        }
    }

    pub async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    pub async fn body_json(response: Response) -> serde_json::Value {
        serde_json::from_str(&body_string(response).await).unwrap()
    }
}
