use anyhow::Result;
use chrono::{DateTime, Utc};

use super::Db;

/// Access level of a user. Ordered, so `role >= Role::Editor` means "editor or better".
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, sqlx::Type, serde::Serialize, serde::Deserialize,
)]
#[sqlx(rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    #[default]
    User,
    /// Can write and autosave posts.
    Editor,
    /// Full access to everything.
    Admin,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::User, Role::Editor, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Editor => "EDITOR",
            Role::Admin => "ADMIN",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, sqlx::FromRow, serde::Serialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, serde::Deserialize)]
pub struct UpdateUser {
    pub name: String,
    pub email: String,
}

impl User {
    /// Opaque author identifier, as handed out to API clients.
    pub fn author_id(&self) -> String {
        self.id.to_string()
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Create a new user with the default role.
    pub async fn create(db: &Db, user: &UpdateUser) -> Result<i64> {
        let row = sqlx::query(
            "INSERT INTO users \
                (name, email, created_at) \
                VALUES (?, ?, ?)",
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(Utc::now())
        .execute(db)
        .await?;
        Ok(row.last_insert_rowid())
    }

    /// List all users, admins first.
    pub async fn list(db: &Db) -> Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            "SELECT * FROM users \
             ORDER BY CASE role WHEN 'ADMIN' THEN 0 WHEN 'EDITOR' THEN 1 ELSE 2 END, name",
        )
        .fetch_all(db)
        .await?;
        Ok(users)
    }

    /// Change the role of a user.
    pub async fn set_role(db: &Db, id: i64, role: Role) -> Result<bool> {
        let res = sqlx::query("UPDATE users SET role = ? WHERE id = ?")
            .bind(role)
            .bind(id)
            .execute(db)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    /// Lookup a user by id, if one exists.
    pub async fn lookup_by_id(db: &Db, id: i64) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(db)
            .await?;
        Ok(row)
    }

    /// Lookup a user by email address, if one exists.
    pub async fn lookup_by_email(db: &Db, email: &str) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(db)
            .await?;
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn roles_round_trip_as_text() {
        let db = crate::db::memory().await.unwrap();
        let id = User::create(&db, &UpdateUser { name: "Ada".into(), email: "ada@nexora.test".into() })
            .await
            .unwrap();

        let user = User::lookup_by_id(&db, id).await.unwrap().unwrap();
        assert_eq!(user.role, Role::User);

        assert!(User::set_role(&db, id, Role::Editor).await.unwrap());
        let user = User::lookup_by_email(&db, "ada@nexora.test").await.unwrap().unwrap();
        assert_eq!(user.role, Role::Editor);
        assert_eq!(user.author_id(), id.to_string());

        assert!(!User::set_role(&db, id + 1, Role::Admin).await.unwrap());
    }

    #[test]
    fn roles_are_ordered() {
        assert!(Role::Admin > Role::Editor);
        assert!(Role::Editor > Role::User);
    }
}
