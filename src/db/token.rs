use anyhow::Result;
use chrono::{DateTime, TimeDelta, Utc};
use rand::Rng;
use rand::rngs::OsRng;

use super::Db;
use super::user::User;

/// A token which can be used to authenticate as a user.
#[derive(Debug, sqlx::FromRow, serde::Serialize)]
pub struct SessionToken {
    pub user_id: i64,
    pub token: String,
    pub created_at: DateTime<Utc>,
}

/// A single-use token which can be exchanged for a session.
#[derive(Debug, sqlx::FromRow, serde::Serialize)]
pub struct LoginToken {
    pub user_id: i64,
    pub token: String,
    pub created_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
}

fn generate() -> String {
    format!("{:032x}", OsRng.r#gen::<u128>())
}

impl SessionToken {
    /// Create a new session token for a user.
    pub async fn create(db: &Db, user: &User) -> Result<String> {
        let token = generate();

        sqlx::query("INSERT INTO session_tokens (user_id, token, created_at) VALUES (?, ?, ?)")
            .bind(user.id)
            .bind(&token)
            .bind(Utc::now())
            .execute(db)
            .await?;

        Ok(token)
    }

    /// Lookup the user behind a session token, if the session is younger than `max_age`.
    pub async fn lookup_user(db: &Db, token: &str, max_age: TimeDelta) -> Result<Option<User>> {
        let session = sqlx::query_as::<_, SessionToken>("SELECT * FROM session_tokens WHERE token = ?")
            .bind(token)
            .fetch_optional(db)
            .await?;

        match session {
            Some(s) if Utc::now() - s.created_at <= max_age => User::lookup_by_id(db, s.user_id).await,
            _ => Ok(None),
        }
    }

    pub async fn delete(db: &Db, token: &str) -> Result<()> {
        sqlx::query("DELETE FROM session_tokens WHERE token = ?").bind(token).execute(db).await?;
        Ok(())
    }
}

impl LoginToken {
    /// How long a login link stays valid.
    pub const LIFETIME: TimeDelta = TimeDelta::minutes(15);

    /// Create a new login token for a user.
    pub async fn create(db: &Db, user: &User) -> Result<String> {
        let token = generate();

        sqlx::query("INSERT INTO login_tokens (user_id, token, created_at) VALUES (?, ?, ?)")
            .bind(user.id)
            .bind(&token)
            .bind(Utc::now())
            .execute(db)
            .await?;

        Ok(token)
    }

    /// Consume a login token, returning its user if it was unused and not expired.
    pub async fn redeem(db: &Db, token: &str) -> Result<Option<User>> {
        let now = Utc::now();
        let login = sqlx::query_as::<_, LoginToken>(
            "UPDATE login_tokens SET used_at = ? \
             WHERE token = ? AND used_at IS NULL \
             RETURNING *",
        )
        .bind(now)
        .bind(token)
        .fetch_optional(db)
        .await?;

        match login {
            Some(l) if now - l.created_at <= Self::LIFETIME => User::lookup_by_id(db, l.user_id).await,
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::user::UpdateUser;

    async fn user(db: &Db) -> User {
        let id = User::create(db, &UpdateUser { name: "Grace".into(), email: "grace@nexora.test".into() })
            .await
            .unwrap();
        User::lookup_by_id(db, id).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn login_tokens_are_single_use() {
        let db = crate::db::memory().await.unwrap();
        let user = user(&db).await;

        let token = LoginToken::create(&db, &user).await.unwrap();
        let redeemed = LoginToken::redeem(&db, &token).await.unwrap();
        assert_eq!(redeemed.map(|u| u.id), Some(user.id));
        assert!(LoginToken::redeem(&db, &token).await.unwrap().is_none());
        assert!(LoginToken::redeem(&db, "bogus").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn sessions_expire() {
        let db = crate::db::memory().await.unwrap();
        let user = user(&db).await;

        let token = SessionToken::create(&db, &user).await.unwrap();
        let found = SessionToken::lookup_user(&db, &token, TimeDelta::days(1)).await.unwrap();
        assert_eq!(found.map(|u| u.id), Some(user.id));

        let expired = SessionToken::lookup_user(&db, &token, TimeDelta::seconds(-1)).await.unwrap();
        assert!(expired.is_none());

        SessionToken::delete(&db, &token).await.unwrap();
        let gone = SessionToken::lookup_user(&db, &token, TimeDelta::days(1)).await.unwrap();
        assert!(gone.is_none());
    }
}
