//! File repository for database operations.
//!
//! Implements the file index using SeaORM.

use async_trait::async_trait;
use chrono::Utc;
use debris_core::file::{File, FileError, FileRepository as FileRepoTrait};
use debris_shared::types::TimeWindow;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Select, Set,
};

use crate::entities::files;

/// File repository implementation.
#[derive(Debug, Clone)]
pub struct FileRepository {
    db: DatabaseConnection,
}

impl FileRepository {
    /// Create a new file repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    fn owned_within(owner_id: &str, window: TimeWindow) -> Select<files::Entity> {
        let mut query = files::Entity::find().filter(files::Column::OwnerId.eq(owner_id));
        if let Some(before) = window.before {
            query = query.filter(files::Column::UploadTimestamp.lt(before));
        }
        if let Some(after) = window.after {
            query = query.filter(files::Column::UploadTimestamp.gt(after));
        }
        query
    }
}

#[async_trait]
impl FileRepoTrait for FileRepository {
    async fn insert(&self, file: &File) -> Result<(), FileError> {
        let size = i64::try_from(file.size)
            .map_err(|_| FileError::repository(format!("size {} out of range", file.size)))?;

        let active_model = files::ActiveModel {
            attachment_id: Set(file.attachment_id.clone()),
            message_id: Set(file.message_id.clone()),
            channel_id: Set(file.channel_id.clone()),
            guild_id: Set(file.guild_id.clone()),
            owner_id: Set(file.owner_id.clone()),
            name: Set(file.name.clone()),
            safe_name: Set(file.safe_name.clone()),
            extension: Set(file.extension.clone()),
            mime: Set(file.mime.clone()),
            size: Set(size),
            width: Set(file.width.and_then(|w| i32::try_from(w).ok())),
            height: Set(file.height.and_then(|h| i32::try_from(h).ok())),
            upload_timestamp: Set(file.upload_timestamp.into()),
        };

        files::Entity::insert(active_model)
            .exec_without_returning(&self.db)
            .await
            .map_err(|e| FileError::repository(e.to_string()))?;

        Ok(())
    }

    async fn find_by_id(&self, attachment_id: &str) -> Result<Option<File>, FileError> {
        let model = files::Entity::find_by_id(attachment_id)
            .one(&self.db)
            .await
            .map_err(|e| FileError::repository(e.to_string()))?;

        Ok(model.map(model_to_file))
    }

    async fn list_by_owner(
        &self,
        owner_id: &str,
        limit: u64,
        window: TimeWindow,
    ) -> Result<Vec<File>, FileError> {
        let models = Self::owned_within(owner_id, window)
            .order_by_desc(files::Column::UploadTimestamp)
            .order_by_desc(files::Column::AttachmentId)
            .limit(limit.min(i64::MAX.unsigned_abs()))
            .all(&self.db)
            .await
            .map_err(|e| FileError::repository(e.to_string()))?;

        Ok(models.into_iter().map(model_to_file).collect())
    }

    async fn count_by_owner(&self, owner_id: &str, window: TimeWindow) -> Result<u64, FileError> {
        Self::owned_within(owner_id, window)
            .count(&self.db)
            .await
            .map_err(|e| FileError::repository(e.to_string()))
    }

    async fn update_name(&self, attachment_id: &str, name: &str) -> Result<(), FileError> {
        files::Entity::update_many()
            .col_expr(files::Column::Name, Expr::value(name))
            .filter(files::Column::AttachmentId.eq(attachment_id))
            .exec(&self.db)
            .await
            .map_err(|e| FileError::repository(e.to_string()))?;

        Ok(())
    }

    async fn delete(&self, attachment_id: &str) -> Result<bool, FileError> {
        let result = files::Entity::delete_by_id(attachment_id)
            .exec(&self.db)
            .await
            .map_err(|e| FileError::repository(e.to_string()))?;

        Ok(result.rows_affected > 0)
    }
}

fn model_to_file(model: files::Model) -> File {
    File {
        attachment_id: model.attachment_id,
        message_id: model.message_id,
        channel_id: model.channel_id,
        guild_id: model.guild_id,
        owner_id: model.owner_id,
        name: model.name,
        safe_name: model.safe_name,
        extension: model.extension,
        mime: model.mime,
        size: u64::try_from(model.size).unwrap_or_default(),
        width: model.width.and_then(|w| u32::try_from(w).ok()),
        height: model.height.and_then(|h| u32::try_from(h).ok()),
        upload_timestamp: model.upload_timestamp.with_timezone(&Utc),
    }
}
