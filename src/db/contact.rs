use anyhow::Result;
use chrono::{DateTime, Utc};

use super::Db;

/// A "contact us" form submission.
#[derive(Debug, sqlx::FromRow, serde::Serialize)]
pub struct ContactSubmission {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub company: Option<String>,
    pub budget: Option<String>,
    pub message: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

pub struct CreateContactSubmission {
    pub name: String,
    pub email: String,
    pub company: Option<String>,
    pub budget: Option<String>,
    pub message: String,
}

impl ContactSubmission {
    pub fn received(&self) -> String {
        crate::utils::dates::short(&self.created_at)
    }

    /// Store a new submission.
    pub async fn create(db: &Db, form: &CreateContactSubmission) -> Result<i64> {
        let row = sqlx::query(
            "INSERT INTO contact_submissions (name, email, company, budget, message, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&form.name)
        .bind(&form.email)
        .bind(&form.company)
        .bind(&form.budget)
        .bind(&form.message)
        .bind(Utc::now())
        .execute(db)
        .await?;

        Ok(row.last_insert_rowid())
    }

    /// All submissions, unread first, newest first.
    pub async fn list(db: &Db) -> Result<Vec<Self>> {
        let rows = sqlx::query_as::<_, Self>(
            "SELECT * FROM contact_submissions ORDER BY read, created_at DESC, id DESC",
        )
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    pub async fn lookup(db: &Db, id: i64) -> Result<Option<Self>> {
        let row = sqlx::query_as::<_, Self>("SELECT * FROM contact_submissions WHERE id = ?")
            .bind(id)
            .fetch_optional(db)
            .await?;
        Ok(row)
    }

    pub async fn count_unread(db: &Db) -> Result<i64> {
        let n = sqlx::query_scalar("SELECT COUNT(*) FROM contact_submissions WHERE read = FALSE")
            .fetch_one(db)
            .await?;
        Ok(n)
    }

    /// Mark a submission as read. Returns false if it doesn't exist.
    pub async fn mark_read(db: &Db, id: i64) -> Result<bool> {
        let res = sqlx::query("UPDATE contact_submissions SET read = TRUE WHERE id = ?")
            .bind(id)
            .execute(db)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    /// Delete a submission. Returns false if it doesn't exist.
    pub async fn delete(db: &Db, id: i64) -> Result<bool> {
        let res = sqlx::query("DELETE FROM contact_submissions WHERE id = ?")
            .bind(id)
            .execute(db)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(name: &str) -> CreateContactSubmission {
        CreateContactSubmission {
            name: name.into(),
            email: format!("{}@client.test", name.to_lowercase()),
            company: None,
            budget: Some("10k-25k".into()),
            message: "We need a new website.".into(),
        }
    }

    #[tokio::test]
    async fn unread_submissions_list_first() {
        let db = crate::db::memory().await.unwrap();
        let first = ContactSubmission::create(&db, &form("Alice")).await.unwrap();
        let second = ContactSubmission::create(&db, &form("Bob")).await.unwrap();
        assert_eq!(ContactSubmission::count_unread(&db).await.unwrap(), 2);

        assert!(ContactSubmission::mark_read(&db, second).await.unwrap());
        assert_eq!(ContactSubmission::count_unread(&db).await.unwrap(), 1);

        let list = ContactSubmission::list(&db).await.unwrap();
        assert_eq!(list.iter().map(|s| s.id).collect::<Vec<_>>(), vec![first, second]);
        assert_eq!(list[0].budget.as_deref(), Some("10k-25k"));

        assert!(ContactSubmission::delete(&db, first).await.unwrap());
        assert!(!ContactSubmission::delete(&db, first).await.unwrap());
        assert!(ContactSubmission::lookup(&db, first).await.unwrap().is_none());
    }
}
