use crate::db::post::Post;
use crate::prelude::*;

/// Add all `blog` routes to the router.
#[rustfmt::skip]
pub fn add_routes(router: AppRouter) -> AppRouter {
    router.public_routes(|r| {
        r.route("/blog", get(list_page))
         .route("/blog/{slug}", get(view_page))
    })
}

/// Published posts, newest first.
async fn list_page(user: Option<User>, State(state): State<SharedAppState>) -> HtmlResult {
    #[derive(Template, WebTemplate)]
    #[template(path = "blog/list.html")]
    struct Html {
        user: Option<User>,
        posts: Vec<Post>,
    }
    let posts = Post::list_published(&state.db).await?;
    Ok(Html { user, posts }.into_response())
}

/// A single published post. Drafts are indistinguishable from missing posts.
async fn view_page(
    user: Option<User>, State(state): State<SharedAppState>, Path(slug): Path<String>,
) -> HtmlResult {
    #[derive(Template, WebTemplate)]
    #[template(path = "blog/post.html")]
    struct Html {
        user: Option<User>,
        post: Post,
    }
    let Some(post) = Post::lookup_published(&state.db, &slug).await? else {
        return Err(not_found().into());
    };
    Ok(Html { user, post }.into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::testing::{body_string, TestApp};
    use crate::autosave::{DraftSnapshot, Seo};
    use crate::db::post::PostStatus;

    fn draft(title: &str, slug: &str, status: PostStatus) -> DraftSnapshot {
        DraftSnapshot {
            title: title.into(),
            body: "Body text".into(),
            seo: Seo { slug: slug.into(), ..Default::default() },
            status,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn drafts_stay_hidden() {
        let app = TestApp::new().await;
        let (author, _) = app.user("editor@nexora.test", Role::Editor).await;
        Post::create(app.db(), author.id, &draft("Launch notes", "launch", PostStatus::Published)).await.unwrap();
        let secret = Post::create(app.db(), author.id, &draft("Secret plans", "secret", PostStatus::Draft))
            .await
            .unwrap();

        let list = body_string(app.get("/blog", None).await).await;
        assert!(list.contains("Launch notes"));
        assert!(!list.contains("Secret plans"));

        let response = app.get("/blog/launch", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_string(response).await.contains("Body text"));

        assert_eq!(app.get("/blog/secret", None).await.status(), StatusCode::NOT_FOUND);
        assert_eq!(app.get(&format!("/blog/{}", secret.id), None).await.status(), StatusCode::NOT_FOUND);
    }
}
