//! Initial schema: users, files and the access log.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(USERS_SQL).await?;
        db.execute_unprepared(FILES_SQL).await?;
        db.execute_unprepared(ACCESSES_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(
            "DROP TABLE IF EXISTS accesses CASCADE;
             DROP TABLE IF EXISTS files CASCADE;
             DROP TABLE IF EXISTS users CASCADE;",
        )
        .await?;
        Ok(())
    }
}

const USERS_SQL: &str = r"
CREATE TABLE users (
    id VARCHAR(20) PRIMARY KEY,
    light_theme BOOLEAN NOT NULL DEFAULT false,
    files_list_view BOOLEAN NOT NULL DEFAULT false,
    first_login_timestamp TIMESTAMPTZ NOT NULL DEFAULT now()
);
";

const FILES_SQL: &str = r"
CREATE TABLE files (
    attachment_id VARCHAR(20) PRIMARY KEY,
    message_id VARCHAR(20) NOT NULL UNIQUE,
    channel_id VARCHAR(20) NOT NULL,
    guild_id VARCHAR(20) NOT NULL,
    owner_id VARCHAR(20) NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    name VARCHAR(63) NOT NULL,
    safe_name VARCHAR(255) NOT NULL,
    extension VARCHAR(63),
    mime VARCHAR(255),
    size BIGINT NOT NULL CHECK (size >= 0),
    width INTEGER,
    height INTEGER,
    upload_timestamp TIMESTAMPTZ NOT NULL,
    CONSTRAINT chk_name_not_empty CHECK (char_length(name) > 0)
);

CREATE INDEX idx_files_owner_uploaded ON files(owner_id, upload_timestamp DESC);
";

const ACCESSES_SQL: &str = r"
CREATE TABLE accesses (
    id BIGSERIAL PRIMARY KEY,
    hash CHAR(16) NOT NULL,
    ip VARCHAR(39) NOT NULL,
    user_agent VARCHAR(255),
    user_id VARCHAR(20) REFERENCES users(id) ON DELETE SET NULL,
    username VARCHAR(32),
    discriminator VARCHAR(4),
    timestamp TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX idx_accesses_hash_timestamp ON accesses(hash, timestamp DESC);
";
