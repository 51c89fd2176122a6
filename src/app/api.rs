//! JSON API used by editors, most importantly the autosave persistence endpoint.

use crate::autosave::{AutosaveRequest, DraftSnapshot, Identity};
use crate::db::post::Post;
use crate::prelude::*;

/// Add all `api` routes to the router.
#[rustfmt::skip]
pub fn add_routes(router: AppRouter) -> AppRouter {
    router
        .restricted_routes(Role::User, |r| {
            r.route("/api/me", get(me))
        })
        .restricted_routes(Role::Editor, |r| {
            r.route("/api/posts/autosave", post(autosave))
             .route("/api/posts/{id}", get(view_post))
        })
}

/// Who the current session belongs to.
async fn me(user: User) -> JsonResult<Identity> {
    Ok(Json(Identity { author_id: user.author_id(), role: user.role }))
}

/// Upsert a draft. Without an identifier a new post is created, otherwise the
/// author's existing post is overwritten in full (last write wins).
async fn autosave(
    user: User, State(state): State<SharedAppState>, Json(request): Json<AutosaveRequest>,
) -> JsonResult<DraftSnapshot> {
    if request.author_id != user.author_id() {
        tracing::warn!(user_id = user.id, claimed = %request.author_id, "Autosave for another author");
        return Err(unauthorized().into());
    }
    let draft = request.draft;

    let post = match &draft.identifier {
        Some(id) => {
            let post = Post::update(&state.db, id, Some(user.id), &draft).await.map_err(|e| {
                tracing::error!(%id, "Autosave update failed: {e:#}");
                AppError::UpdateFailed
            })?;
            post.ok_or_else(not_found)?
        }
        None => Post::create(&state.db, user.id, &draft).await.map_err(|e| {
            tracing::error!(user_id = user.id, "Autosave create failed: {e:#}");
            AppError::CreateFailed
        })?,
    };

    tracing::debug!(id = %post.id, user_id = user.id, "Autosaved");
    Ok(Json(post.into_snapshot()))
}

/// An editor's own draft, for resuming work.
async fn view_post(user: User, State(state): State<SharedAppState>, Path(id): Path<String>) -> JsonResult<DraftSnapshot> {
    let post = Post::lookup_for_author(&state.db, &id, user.id).await?.ok_or_else(not_found)?;
    Ok(Json(post.into_snapshot()))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::app::testing::{body_json, TestApp};

    fn payload(author_id: &str, identifier: Option<&str>, title: &str) -> serde_json::Value {
        let mut body = json!({
            "title": title,
            "body": "<p>Draft</p>",
            "seo": {"title": "", "description": "", "slug": "draft", "keywords": ["b", "a"]},
            "status": "draft",
            "authorId": author_id,
        });
        if let Some(id) = identifier {
            body["identifier"] = json!(id);
        }
        body
    }

    #[tokio::test]
    async fn me_reports_identity() {
        let app = TestApp::new().await;
        let (user, session) = app.user("editor@nexora.test", Role::Editor).await;
        let response = app.get("/api/me", Some(&session)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({"authorId": user.author_id(), "role": "EDITOR"}));

        let response = app.get("/api/me", None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn autosave_creates_then_updates() {
        let app = TestApp::new().await;
        let (user, session) = app.user("editor@nexora.test", Role::Editor).await;

        let response = app.post_json("/api/posts/autosave", Some(&session), payload(&user.author_id(), None, "One")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let created: DraftSnapshot = serde_json::from_value(body_json(response).await).unwrap();
        let id = created.identifier.clone().unwrap();
        assert_eq!(created.title, "One");
        assert_eq!(created.seo.keywords, vec!["b", "a"]);

        let response =
            app.post_json("/api/posts/autosave", Some(&session), payload(&user.author_id(), Some(&id), "Two")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let updated: DraftSnapshot = serde_json::from_value(body_json(response).await).unwrap();
        assert_eq!(updated.identifier.as_deref(), Some(id.as_str()));
        assert_eq!(updated.title, "Two");
        assert!(updated.last_saved > created.last_saved);

        let response = app.get(&format!("/api/posts/{id}"), Some(&session)).await;
        let fetched: DraftSnapshot = serde_json::from_value(body_json(response).await).unwrap();
        assert_eq!(fetched, updated);
        assert_eq!(Post::list(app.db()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn foreign_drafts_are_not_found() {
        let app = TestApp::new().await;
        let (owner, owner_session) = app.user("owner@nexora.test", Role::Editor).await;
        let (other, other_session) = app.user("other@nexora.test", Role::Admin).await;

        let response =
            app.post_json("/api/posts/autosave", Some(&owner_session), payload(&owner.author_id(), None, "Mine")).await;
        let created: DraftSnapshot = serde_json::from_value(body_json(response).await).unwrap();
        let id = created.identifier.unwrap();

        let response = app
            .post_json("/api/posts/autosave", Some(&other_session), payload(&other.author_id(), Some(&id), "Theirs"))
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await, json!({"error": "Not found."}));

        let response = app.get(&format!("/api/posts/{id}"), Some(&other_session)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(Post::lookup(app.db(), &id).await.unwrap().unwrap().title, "Mine");
    }

    #[tokio::test]
    async fn autosave_requires_a_matching_editor() {
        let app = TestApp::new().await;
        let (user, user_session) = app.user("reader@nexora.test", Role::User).await;
        let (editor, editor_session) = app.user("editor@nexora.test", Role::Editor).await;

        let response = app.post_json("/api/posts/autosave", Some(&user_session), payload(&user.author_id(), None, "x")).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app.post_json("/api/posts/autosave", None, payload(&editor.author_id(), None, "x")).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app.post_json("/api/posts/autosave", Some(&editor_session), payload("999", None, "x")).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await, json!({"error": "Unauthorized."}));

        assert!(Post::list(app.db()).await.unwrap().is_empty());
    }
}
