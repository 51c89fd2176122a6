use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use uuid::Uuid;

use super::Db;
use crate::autosave::{DraftSnapshot, Seo};

/// Publication state of a post.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, sqlx::Type, serde::Serialize, serde::Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    #[default]
    Draft,
    Published,
}

#[derive(Clone, Debug, sqlx::FromRow, serde::Serialize)]
pub struct Post {
    pub id: String,
    pub author_id: i64,
    pub title: String,
    pub body: String,
    pub featured_image: Option<String>,
    pub featured_image_alt: Option<String>,
    pub seo_title: String,
    pub seo_description: String,
    pub slug: String,
    pub keywords: Json<Vec<String>>,
    pub status: PostStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
}

impl Post {
    /// Path of the public blog page for this post.
    pub fn url(&self) -> String {
        match self.slug.is_empty() {
            true => format!("/blog/{}", self.id),
            false => format!("/blog/{}", self.slug),
        }
    }

    pub fn is_published(&self) -> bool {
        self.status == PostStatus::Published
    }

    pub fn keywords_joined(&self) -> String {
        self.keywords.join(", ")
    }

    /// Publication date for display, or the last edit for drafts.
    pub fn date(&self) -> String {
        crate::utils::dates::long(&self.published_at.unwrap_or(self.updated_at))
    }

    pub fn edited(&self) -> String {
        crate::utils::dates::short(&self.updated_at)
    }

    /// The wire representation of this post. `updated_at` is the authoritative `lastSaved`.
    pub fn into_snapshot(self) -> DraftSnapshot {
        DraftSnapshot {
            identifier: Some(self.id),
            title: self.title,
            body: self.body,
            featured_image: self.featured_image,
            featured_image_alt: self.featured_image_alt,
            seo: Seo {
                title: self.seo_title,
                description: self.seo_description,
                slug: self.slug,
                keywords: self.keywords.0,
            },
            status: self.status,
            last_saved: Some(self.updated_at),
        }
    }

    /// List all posts, most recently edited first.
    pub async fn list(db: &Db) -> Result<Vec<Post>> {
        let posts = sqlx::query_as::<_, Post>("SELECT * FROM posts ORDER BY updated_at DESC")
            .fetch_all(db)
            .await?;
        Ok(posts)
    }

    /// List published posts, newest first.
    pub async fn list_published(db: &Db) -> Result<Vec<Post>> {
        let posts = sqlx::query_as::<_, Post>(
            "SELECT * FROM posts \
             WHERE status = 'published' \
             ORDER BY published_at DESC",
        )
        .fetch_all(db)
        .await?;
        Ok(posts)
    }

    pub async fn count(db: &Db) -> Result<(i64, i64)> {
        let counts = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(status = 'published'), 0) FROM posts",
        )
        .fetch_one(db)
        .await?;
        Ok(counts)
    }

    /// Create a new post owned by `author_id`.
    pub async fn create(db: &Db, author_id: i64, draft: &DraftSnapshot) -> Result<Post> {
        let id = Uuid::now_v7().to_string();
        let now = Utc::now();
        let published_at = (draft.status == PostStatus::Published).then_some(now);
        let post = sqlx::query_as::<_, Post>(
            "INSERT INTO posts \
                (id, author_id, title, body, featured_image, featured_image_alt, \
                 seo_title, seo_description, slug, keywords, status, \
                 created_at, updated_at, published_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             RETURNING *",
        )
        .bind(id)
        .bind(author_id)
        .bind(&draft.title)
        .bind(&draft.body)
        .bind(&draft.featured_image)
        .bind(&draft.featured_image_alt)
        .bind(&draft.seo.title)
        .bind(&draft.seo.description)
        .bind(&draft.seo.slug)
        .bind(Json(&draft.seo.keywords))
        .bind(draft.status)
        .bind(now)
        .bind(now)
        .bind(published_at)
        .fetch_one(db)
        .await?;
        Ok(post)
    }

    /// Overwrite an existing post with the contents of `draft`.
    ///
    /// With `author_id` set, only that author's post matches. Returns `None` if nothing matched.
    pub async fn update(db: &Db, id: &str, author_id: Option<i64>, draft: &DraftSnapshot) -> Result<Option<Post>> {
        let now = Utc::now();
        let post = sqlx::query_as::<_, Post>(
            "UPDATE posts \
             SET title = ?, \
                 body = ?, \
                 featured_image = ?, \
                 featured_image_alt = ?, \
                 seo_title = ?, \
                 seo_description = ?, \
                 slug = ?, \
                 keywords = ?, \
                 status = ?, \
                 updated_at = ?, \
                 published_at = CASE WHEN ? = 'published' THEN COALESCE(published_at, ?) ELSE published_at END \
             WHERE id = ? AND (? IS NULL OR author_id = ?) \
             RETURNING *",
        )
        .bind(&draft.title)
        .bind(&draft.body)
        .bind(&draft.featured_image)
        .bind(&draft.featured_image_alt)
        .bind(&draft.seo.title)
        .bind(&draft.seo.description)
        .bind(&draft.seo.slug)
        .bind(Json(&draft.seo.keywords))
        .bind(draft.status)
        .bind(now)
        .bind(draft.status)
        .bind(now)
        .bind(id)
        .bind(author_id)
        .bind(author_id)
        .fetch_optional(db)
        .await?;
        Ok(post)
    }

    /// Delete a post. Returns false if it doesn't exist.
    pub async fn delete(db: &Db, id: &str) -> Result<bool> {
        let res = sqlx::query("DELETE FROM posts WHERE id = ?").bind(id).execute(db).await?;
        Ok(res.rows_affected() > 0)
    }

    /// Lookup a post by id, if one exists.
    pub async fn lookup(db: &Db, id: &str) -> Result<Option<Post>> {
        let post = sqlx::query_as::<_, Post>("SELECT * FROM posts WHERE id = ?")
            .bind(id)
            .fetch_optional(db)
            .await?;
        Ok(post)
    }

    /// Lookup a post by id, only if it belongs to `author_id`.
    pub async fn lookup_for_author(db: &Db, id: &str, author_id: i64) -> Result<Option<Post>> {
        let post = sqlx::query_as::<_, Post>("SELECT * FROM posts WHERE id = ? AND author_id = ?")
            .bind(id)
            .bind(author_id)
            .fetch_optional(db)
            .await?;
        Ok(post)
    }

    /// Lookup a published post by slug, falling back to its id.
    pub async fn lookup_published(db: &Db, slug_or_id: &str) -> Result<Option<Post>> {
        let post = sqlx::query_as::<_, Post>(
            "SELECT * FROM posts \
             WHERE status = 'published' AND (slug = ?1 OR id = ?1) \
             ORDER BY published_at DESC \
             LIMIT 1",
        )
        .bind(slug_or_id)
        .fetch_optional(db)
        .await?;
        Ok(post)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::user::{UpdateUser, User};

    async fn author(db: &Db, email: &str) -> i64 {
        User::create(db, &UpdateUser { name: "Author".into(), email: email.into() }).await.unwrap()
    }

    fn draft(title: &str) -> DraftSnapshot {
        DraftSnapshot {
            title: title.into(),
            body: "<p>Hello</p>".into(),
            seo: Seo { slug: "hello".into(), keywords: vec!["agency".into(), "web".into()], ..Default::default() },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn update_is_scoped_to_author() {
        let db = crate::db::memory().await.unwrap();
        let owner = author(&db, "owner@nexora.test").await;
        let other = author(&db, "other@nexora.test").await;

        let post = Post::create(&db, owner, &draft("First")).await.unwrap();
        assert_eq!(post.keywords.0, vec!["agency", "web"]);
        assert_eq!(post.published_at, None);

        let stolen = Post::update(&db, &post.id, Some(other), &draft("Mine now")).await.unwrap();
        assert!(stolen.is_none());

        let updated = Post::update(&db, &post.id, Some(owner), &draft("Second")).await.unwrap().unwrap();
        assert_eq!(updated.title, "Second");
        assert!(updated.updated_at >= post.updated_at);

        let by_admin = Post::update(&db, &post.id, None, &draft("Third")).await.unwrap().unwrap();
        assert_eq!(by_admin.author_id, owner);
        assert!(Post::lookup_for_author(&db, &post.id, other).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn publishing_stamps_published_at_once() {
        let db = crate::db::memory().await.unwrap();
        let owner = author(&db, "owner@nexora.test").await;
        let post = Post::create(&db, owner, &draft("Launch")).await.unwrap();
        assert!(Post::lookup_published(&db, "hello").await.unwrap().is_none());

        let mut published = draft("Launch");
        published.status = PostStatus::Published;
        let first = Post::update(&db, &post.id, Some(owner), &published).await.unwrap().unwrap();
        let stamped = first.published_at.unwrap();

        let again = Post::update(&db, &post.id, Some(owner), &published).await.unwrap().unwrap();
        assert_eq!(again.published_at, Some(stamped));

        let found = Post::lookup_published(&db, "hello").await.unwrap().unwrap();
        assert_eq!(found.id, post.id);
        assert!(Post::lookup_published(&db, &post.id).await.unwrap().is_some());
        assert_eq!(Post::count(&db).await.unwrap(), (1, 1));
        assert_eq!(found.url(), "/blog/hello");
    }
}
