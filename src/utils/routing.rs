use crate::prelude::*;
use crate::utils::error::JsonError;

pub type SharedAppState = Arc<crate::app::AppState>;
pub type AxumRouter = axum::Router<SharedAppState>;

/// A wrapper around the axum router and the shared state, with some additional helpers.
pub struct AppRouter {
    router: AxumRouter,
    state: SharedAppState,
}

impl AppRouter {
    /// Create a new empty `AppRouter`.
    pub fn new(state: &SharedAppState) -> Self {
        Self { router: Default::default(), state: Arc::clone(state) }
    }

    pub fn finish(self) -> (AxumRouter, SharedAppState) {
        (self.router, self.state)
    }

    /// Add some public routes.
    pub fn public_routes(mut self, func: impl FnOnce(AxumRouter) -> AxumRouter) -> Self {
        let subrouter = func(AxumRouter::new());
        self.router = self.router.merge(subrouter);
        self
    }

    /// Add some API routes which require a session with at least `role`.
    ///
    /// Rejections are JSON, so API clients never get bounced to a login page.
    pub fn restricted_routes(mut self, role: Role, func: impl FnOnce(AxumRouter) -> AxumRouter) -> Self {
        let subrouter = func(AxumRouter::new());
        let subrouter = subrouter.route_layer(axum::middleware::from_fn(
            move |user: Option<User>, req: Request, next: Next| async move {
                match user {
                    Some(user) if user.role >= role => Ok(next.run(req).await),
                    _ => Err(JsonError::from(unauthorized())),
                }
            },
        ));
        self.router = self.router.merge(subrouter);
        self
    }
}
