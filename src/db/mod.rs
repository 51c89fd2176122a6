use std::path::Path;

use anyhow::Context as _;
use serde::Deserialize;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{migrate::MigrateDatabase, Sqlite, SqlitePool};
use user::{Role, User};

use crate::utils::config::DbConfig;

pub type Db = SqlitePool;

pub mod contact;
pub mod post;
pub mod token;
pub mod user;

/// Create a new db connection pool, initializing and running migrations if necessary.
pub async fn init(db_config: &DbConfig) -> anyhow::Result<Db> {
    let url = format!("sqlite://{}", db_config.file.display());
    if !Sqlite::database_exists(&url).await? {
        Sqlite::create_database(&url).await?;
    }
    let db = SqlitePool::connect(&url).await?;
    migrate(&db).await?;

    if let Some(seed_data) = &db_config.seed_data {
        seed_db(&db, seed_data).await?;
    }

    Ok(db)
}

/// Run the embedded migrations against a pool.
pub async fn migrate(db: &Db) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(db).await.context("running migrations")?;
    Ok(())
}

/// A fresh, migrated in-memory database.
///
/// Pinned to a single connection, since every sqlite `:memory:` connection is its own database.
pub async fn memory() -> anyhow::Result<Db> {
    let db = SqlitePoolOptions::new().max_connections(1).connect("sqlite::memory:").await?;
    migrate(&db).await?;
    Ok(db)
}

#[derive(Deserialize)]
struct SeedData {
    users: Vec<SeedUser>,
}

#[derive(Deserialize)]
struct SeedUser {
    #[serde(flatten)]
    user: user::UpdateUser,
    #[serde(default)]
    role: Role,
}

impl SeedData {
    pub async fn load(file: &Path) -> anyhow::Result<Self> {
        let contents = tokio::fs::read_to_string(file).await?;
        toml::from_str(&contents).with_context(|| format!("loading seed data={file:#?}"))
    }
}

async fn seed_db(db: &Db, seed_data_path: &Path) -> anyhow::Result<()> {
    let seed_data = SeedData::load(seed_data_path).await?;

    for seed in seed_data.users {
        let id = match User::lookup_by_email(db, &seed.user.email).await? {
            Some(user) => user.id,
            None => User::create(db, &seed.user).await?,
        };
        User::set_role(db, id, seed.role).await?;
    }

    Ok(())
}
