//! Admin dashboard. Access is enforced by the route guard, so handlers can assume an ADMIN.

use serde::Deserialize;

use crate::autosave::{DraftSnapshot, Seo};
use crate::db::contact::ContactSubmission;
use crate::db::post::{Post, PostStatus};
use crate::prelude::*;

/// Add all `dashboard` routes to the router.
#[rustfmt::skip]
pub fn add_routes(router: AppRouter) -> AppRouter {
    router.public_routes(|r| {
        r.route("/dashboard", get(overview_page))
         .route("/dashboard/posts", get(posts_page))
         .route("/dashboard/posts/new", get(new_post_page).post(new_post_form))
         .route("/dashboard/posts/{id}", get(edit_post_page).post(edit_post_form))
         .route("/dashboard/posts/{id}/delete", post(delete_post))
         .route("/dashboard/contacts", get(contacts_page))
         .route("/dashboard/contacts/{id}/read", post(mark_contact_read))
         .route("/dashboard/contacts/{id}/delete", post(delete_contact))
         .route("/dashboard/users", get(users_page))
         .route("/dashboard/users/{id}/role", post(set_user_role))
    })
}

/// Counts at a glance.
async fn overview_page(user: User, State(state): State<SharedAppState>) -> HtmlResult {
    #[derive(Template, WebTemplate)]
    #[template(path = "dashboard/index.html")]
    struct Html {
        user: Option<User>,
        posts: i64,
        published: i64,
        unread: i64,
        users: usize,
    }
    let (posts, published) = Post::count(&state.db).await?;
    let unread = ContactSubmission::count_unread(&state.db).await?;
    let users = User::list(&state.db).await?.len();
    Ok(Html { user: Some(user), posts, published, unread, users }.into_response())
}

async fn posts_page(user: User, State(state): State<SharedAppState>) -> HtmlResult {
    #[derive(Template, WebTemplate)]
    #[template(path = "dashboard/posts.html")]
    struct Html {
        user: Option<User>,
        posts: Vec<Post>,
    }
    let posts = Post::list(&state.db).await?;
    Ok(Html { user: Some(user), posts }.into_response())
}

#[derive(Template, WebTemplate)]
#[template(path = "dashboard/post_edit.html")]
struct PostEditHtml {
    user: Option<User>,
    /// `None` while creating a new post.
    post: Option<Post>,
    form: PostForm,
}

async fn new_post_page(user: User) -> impl IntoResponse {
    PostEditHtml { user: Some(user), post: None, form: PostForm::default() }
}

async fn edit_post_page(user: User, State(state): State<SharedAppState>, Path(id): Path<String>) -> HtmlResult {
    let Some(post) = Post::lookup(&state.db, &id).await? else {
        return Err(not_found().into());
    };
    let form = PostForm::from(&post);
    Ok(PostEditHtml { user: Some(user), post: Some(post), form }.into_response())
}

async fn new_post_form(user: User, State(state): State<SharedAppState>, Form(form): Form<PostForm>) -> HtmlResult {
    let draft = form.into_draft();
    if !draft.is_meaningful() {
        return Err(invalid("A post needs a title or some content.").into());
    }
    let post = Post::create(&state.db, user.id, &draft).await?;
    tracing::info!(id = %post.id, user_id = user.id, "Created post");
    Ok(Redirect::to(&format!("/dashboard/posts/{}", post.id)).into_response())
}

/// Admins may edit anyone's post.
async fn edit_post_form(
    user: User, State(state): State<SharedAppState>, Path(id): Path<String>, Form(form): Form<PostForm>,
) -> HtmlResult {
    let draft = form.into_draft();
    if !draft.is_meaningful() {
        return Err(invalid("A post needs a title or some content.").into());
    }
    let Some(post) = Post::update(&state.db, &id, None, &draft).await? else {
        return Err(not_found().into());
    };
    tracing::info!(id = %post.id, user_id = user.id, "Updated post");
    Ok(Redirect::to(&format!("/dashboard/posts/{}", post.id)).into_response())
}

async fn delete_post(State(state): State<SharedAppState>, Path(id): Path<String>) -> HtmlResult {
    if !Post::delete(&state.db, &id).await? {
        return Err(not_found().into());
    }
    tracing::info!(%id, "Deleted post");
    Ok(Redirect::to("/dashboard/posts").into_response())
}

#[derive(Deserialize, Debug, Default)]
struct PostForm {
    title: String,
    body: String,
    #[serde(default)]
    featured_image: String,
    #[serde(default)]
    featured_image_alt: String,
    #[serde(default)]
    seo_title: String,
    #[serde(default)]
    seo_description: String,
    #[serde(default)]
    slug: String,
    /// Comma separated.
    #[serde(default)]
    keywords: String,
    #[serde(default)]
    published: Option<String>,
}

impl PostForm {
    fn into_draft(self) -> DraftSnapshot {
        let optional = |s: String| Some(s.trim().to_string()).filter(|s| !s.is_empty());
        DraftSnapshot {
            identifier: None,
            title: self.title.trim().to_string(),
            body: self.body,
            featured_image: optional(self.featured_image),
            featured_image_alt: optional(self.featured_image_alt),
            seo: Seo {
                title: self.seo_title.trim().to_string(),
                description: self.seo_description.trim().to_string(),
                slug: self.slug.trim().to_string(),
                keywords: split_keywords(&self.keywords),
            },
            status: match self.published {
                Some(_) => PostStatus::Published,
                None => PostStatus::Draft,
            },
            last_saved: None,
        }
    }
}

impl From<&Post> for PostForm {
    fn from(post: &Post) -> Self {
        Self {
            title: post.title.clone(),
            body: post.body.clone(),
            featured_image: post.featured_image.clone().unwrap_or_default(),
            featured_image_alt: post.featured_image_alt.clone().unwrap_or_default(),
            seo_title: post.seo_title.clone(),
            seo_description: post.seo_description.clone(),
            slug: post.slug.clone(),
            keywords: post.keywords_joined(),
            published: post.is_published().then(|| "on".to_string()),
        }
    }
}

fn split_keywords(keywords: &str) -> Vec<String> {
    keywords.split(',').map(str::trim).filter(|k| !k.is_empty()).map(String::from).collect()
}

async fn contacts_page(user: User, State(state): State<SharedAppState>) -> HtmlResult {
    #[derive(Template, WebTemplate)]
    #[template(path = "dashboard/contacts.html")]
    struct Html {
        user: Option<User>,
        submissions: Vec<ContactSubmission>,
    }
    let submissions = ContactSubmission::list(&state.db).await?;
    Ok(Html { user: Some(user), submissions }.into_response())
}

async fn mark_contact_read(State(state): State<SharedAppState>, Path(id): Path<i64>) -> HtmlResult {
    if !ContactSubmission::mark_read(&state.db, id).await? {
        return Err(not_found().into());
    }
    Ok(Redirect::to("/dashboard/contacts").into_response())
}

async fn delete_contact(State(state): State<SharedAppState>, Path(id): Path<i64>) -> HtmlResult {
    if !ContactSubmission::delete(&state.db, id).await? {
        return Err(not_found().into());
    }
    tracing::info!(id, "Deleted contact submission");
    Ok(Redirect::to("/dashboard/contacts").into_response())
}

pub struct RoleOption {
    pub value: &'static str,
    pub selected: bool,
}

pub struct UserRow {
    pub user: User,
    pub roles: Vec<RoleOption>,
}

async fn users_page(user: User, State(state): State<SharedAppState>) -> HtmlResult {
    #[derive(Template, WebTemplate)]
    #[template(path = "dashboard/users.html")]
    struct Html {
        user: Option<User>,
        rows: Vec<UserRow>,
    }
    let rows = User::list(&state.db)
        .await?
        .into_iter()
        .map(|u| UserRow {
            roles: Role::ALL.iter().map(|r| RoleOption { value: r.as_str(), selected: *r == u.role }).collect(),
            user: u,
        })
        .collect();
    Ok(Html { user: Some(user), rows }.into_response())
}

#[derive(Deserialize)]
struct RoleForm {
    role: Role,
}

async fn set_user_role(
    user: User, State(state): State<SharedAppState>, Path(id): Path<i64>, Form(form): Form<RoleForm>,
) -> HtmlResult {
    if id == user.id && form.role != Role::Admin {
        return Err(invalid("You can't remove your own admin access.").into());
    }
    if !User::set_role(&state.db, id, form.role).await? {
        return Err(not_found().into());
    }
    tracing::info!(user_id = id, role = %form.role, by = user.id, "Changed role");
    Ok(Redirect::to("/dashboard/users").into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::testing::{body_string, TestApp};
    use crate::db::contact::CreateContactSubmission;

    #[test]
    fn keywords_are_split_and_trimmed() {
        assert_eq!(split_keywords(" web, ,design ,seo"), vec!["web", "design", "seo"]);
        assert!(split_keywords("").is_empty());
    }

    #[tokio::test]
    async fn admins_manage_posts() {
        let app = TestApp::new().await;
        let (_, session) = app.user("admin@nexora.test", Role::Admin).await;

        let response = app
            .post_form("/dashboard/posts/new", Some(&session), "title=Hello&body=World&slug=hello&keywords=a%2Cb")
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let location = response.headers()[header::LOCATION].to_str().unwrap().to_string();
        let id = location.trim_start_matches("/dashboard/posts/").to_string();

        let post = Post::lookup(app.db(), &id).await.unwrap().unwrap();
        assert_eq!(post.keywords.0, vec!["a", "b"]);
        assert!(!post.is_published());

        let response = app
            .post_form(&location, Some(&session), "title=Hello&body=World&slug=hello&published=on")
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let post = Post::lookup(app.db(), &id).await.unwrap().unwrap();
        assert!(post.is_published());
        assert!(post.published_at.is_some());

        let page = body_string(app.get("/dashboard/posts", Some(&session)).await).await;
        assert!(page.contains("Hello"));

        let response = app.post_form(&location, Some(&session), "title=+&body=%0A").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(Post::lookup(app.db(), &id).await.unwrap().unwrap().title, "Hello");

        let response = app.post_form(&format!("/dashboard/posts/{id}/delete"), Some(&session), "").await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert!(Post::lookup(app.db(), &id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn admins_manage_contacts() {
        let app = TestApp::new().await;
        let (_, session) = app.user("admin@nexora.test", Role::Admin).await;
        let id = ContactSubmission::create(app.db(), &CreateContactSubmission {
            name: "Jane".into(),
            email: "jane@client.test".into(),
            company: Some("Acme".into()),
            budget: None,
            message: "Hi there".into(),
        })
        .await
        .unwrap();

        let page = body_string(app.get("/dashboard/contacts", Some(&session)).await).await;
        assert!(page.contains("Hi there"));

        app.post_form(&format!("/dashboard/contacts/{id}/read"), Some(&session), "").await;
        assert_eq!(ContactSubmission::count_unread(app.db()).await.unwrap(), 0);

        app.post_form(&format!("/dashboard/contacts/{id}/delete"), Some(&session), "").await;
        assert!(ContactSubmission::lookup(app.db(), id).await.unwrap().is_none());

        let response = app.post_form(&format!("/dashboard/contacts/{id}/delete"), Some(&session), "").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn admins_assign_roles() {
        let app = TestApp::new().await;
        let (admin, session) = app.user("admin@nexora.test", Role::Admin).await;
        let (member, _) = app.user("member@nexora.test", Role::User).await;

        let response = app.post_form(&format!("/dashboard/users/{}/role", member.id), Some(&session), "role=EDITOR").await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let member = User::lookup_by_id(app.db(), member.id).await.unwrap().unwrap();
        assert_eq!(member.role, Role::Editor);

        let response = app.post_form(&format!("/dashboard/users/{}/role", admin.id), Some(&session), "role=USER").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let page = body_string(app.get("/dashboard/users", Some(&session)).await).await;
        assert!(page.contains("member@nexora.test"));
    }
}
