//! Shared setup for repository integration tests.
//!
//! Tests run against `DATABASE_URL` and are skipped when it is unset.

#![allow(dead_code)]

use debris_db::Migrator;
use debris_db::migration::MigratorTrait;
use debris_db::entities::users;
use sea_orm::{Database, DatabaseConnection, EntityTrait, Set};
use tokio::sync::OnceCell;

static MIGRATED: OnceCell<()> = OnceCell::const_new();

/// Connects and migrates, or returns `None` when no database is configured.
pub async fn connect() -> Option<DatabaseConnection> {
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping");
        return None;
    };
    let db = Database::connect(&url)
        .await
        .expect("Failed to connect to database");

    MIGRATED
        .get_or_init(|| async {
            Migrator::up(&db, None).await.expect("Failed to migrate");
        })
        .await;

    Some(db)
}

/// A snowflake-looking id that will not collide with other runs.
pub fn snowflake() -> String {
    rand::random_range(100_000_000_000_000_000u64..u64::MAX).to_string()
}

/// Inserts a user row with default preferences.
pub async fn create_user(db: &DatabaseConnection) -> String {
    let id = snowflake();
    users::Entity::insert(users::ActiveModel {
        id: Set(id.clone()),
        light_theme: Set(false),
        files_list_view: Set(false),
        first_login_timestamp: Set(chrono::Utc::now().into()),
    })
    .exec_without_returning(db)
    .await
    .expect("Failed to create test user");
    id
}
