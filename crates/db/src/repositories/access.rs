//! Access log repository.

use async_trait::async_trait;
use debris_core::access::{AccessError, AccessRepository as AccessRepoTrait, NewAccess};
use sea_orm::{
    ActiveValue::NotSet, ConnectionTrait, DatabaseConnection, DbBackend, EntityTrait, Set,
    Statement,
};

use crate::entities::accesses;

const RECENT_ACCESS_SQL: &str = r"
SELECT EXISTS (
    SELECT 1 FROM accesses
    WHERE hash = $1 AND timestamp > now() - make_interval(secs => $2)
) AS recent
";

/// Access log repository implementation.
#[derive(Debug, Clone)]
pub struct AccessRepository {
    db: DatabaseConnection,
}

impl AccessRepository {
    /// Create a new access repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AccessRepoTrait for AccessRepository {
    async fn recent_access_exists(&self, hash: &str, window_secs: u32) -> Result<bool, AccessError> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            RECENT_ACCESS_SQL,
            [hash.into(), f64::from(window_secs).into()],
        );

        let row = self
            .db
            .query_one(stmt)
            .await
            .map_err(|e| AccessError::repository(e.to_string()))?;

        match row {
            Some(row) => row
                .try_get::<bool>("", "recent")
                .map_err(|e| AccessError::repository(e.to_string())),
            None => Ok(false),
        }
    }

    async fn insert_access(&self, access: &NewAccess) -> Result<(), AccessError> {
        let identity = access.identity.as_ref();
        let active_model = accesses::ActiveModel {
            id: NotSet,
            hash: Set(access.hash.clone()),
            ip: Set(access.ip.clone()),
            user_agent: Set(access.user_agent.clone()),
            user_id: Set(identity.map(|i| i.user_id.clone())),
            username: Set(identity.map(|i| i.username.clone())),
            discriminator: Set(identity.map(|i| i.discriminator.clone())),
            timestamp: NotSet,
        };

        accesses::Entity::insert(active_model)
            .exec_without_returning(&self.db)
            .await
            .map_err(|e| AccessError::repository(e.to_string()))?;

        Ok(())
    }
}
