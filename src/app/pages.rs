use crate::db::post::Post;
use crate::prelude::*;

/// Add all static marketing pages to the router.
#[rustfmt::skip]
pub fn add_routes(router: AppRouter) -> AppRouter {
    router.public_routes(|r| {
        r.route("/", get(home))
         .route("/services", get(services))
         .route("/about", get(about))
         .route("/unauthorized", get(unauthorized_page))
    })
}

#[derive(Template, WebTemplate)]
#[template(path = "unauthorized.html")]
pub struct UnauthorizedHtml {
    pub user: Option<User>,
}

async fn unauthorized_page(user: Option<User>) -> UnauthorizedHtml {
    UnauthorizedHtml { user }
}

/// Home page, with a teaser of the latest posts.
async fn home(user: Option<User>, State(state): State<SharedAppState>) -> HtmlResult {
    #[derive(Template, WebTemplate)]
    #[template(path = "home.html")]
    struct Html {
        user: Option<User>,
        posts: Vec<Post>,
    }
    let mut posts = Post::list_published(&state.db).await?;
    posts.truncate(3);
    Ok(Html { user, posts }.into_response())
}

pub struct Service {
    pub name: &'static str,
    pub summary: &'static str,
}

const SERVICES: &[Service] = &[
    Service { name: "Web Development", summary: "Fast, accessible websites and web applications." },
    Service { name: "Brand Strategy", summary: "Positioning, naming, and identity systems that last." },
    Service { name: "Content & SEO", summary: "Editorial content that earns its traffic." },
    Service { name: "Product Design", summary: "Research-driven interfaces for digital products." },
];

async fn services(user: Option<User>) -> impl IntoResponse {
    #[derive(Template, WebTemplate)]
    #[template(path = "services.html")]
    struct Html {
        user: Option<User>,
        services: &'static [Service],
    }
    Html { user, services: SERVICES }
}

async fn about(user: Option<User>) -> impl IntoResponse {
    #[derive(Template, WebTemplate)]
    #[template(path = "about.html")]
    struct Html {
        user: Option<User>,
    }
    Html { user }
}
