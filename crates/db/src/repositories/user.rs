//! User repository for database operations.

use async_trait::async_trait;
use chrono::Utc;
use debris_core::identity::{IdentityError, LocalUser, UserPatch, UserRepository as UserRepoTrait};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};

use crate::entities::users;

/// User repository implementation.
#[derive(Debug, Clone)]
pub struct UserRepository {
    db: DatabaseConnection,
}

impl UserRepository {
    /// Creates a new user repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepoTrait for UserRepository {
    async fn upsert_stub(&self, user_id: &str) -> Result<(), IdentityError> {
        let stub = users::ActiveModel {
            id: Set(user_id.to_string()),
            light_theme: Set(false),
            files_list_view: Set(false),
            first_login_timestamp: Set(Utc::now().into()),
        };

        // An existing row keeps its preferences and first login.
        users::Entity::insert(stub)
            .on_conflict(OnConflict::column(users::Column::Id).do_nothing().to_owned())
            .exec_without_returning(&self.db)
            .await
            .map_err(|e| IdentityError::repository(e.to_string()))?;

        Ok(())
    }

    async fn find_by_id(&self, user_id: &str) -> Result<Option<LocalUser>, IdentityError> {
        let model = users::Entity::find_by_id(user_id)
            .one(&self.db)
            .await
            .map_err(|e| IdentityError::repository(e.to_string()))?;

        Ok(model.map(|m| LocalUser {
            id: m.id,
            light_theme: m.light_theme,
            files_list_view: m.files_list_view,
            first_login_timestamp: m.first_login_timestamp.with_timezone(&Utc),
        }))
    }

    async fn update_prefs(&self, user_id: &str, patch: &UserPatch) -> Result<(), IdentityError> {
        if patch.is_empty() {
            return Ok(());
        }

        let mut update = users::Entity::update_many().filter(users::Column::Id.eq(user_id));
        if let Some(light_theme) = patch.light_theme {
            update = update.col_expr(users::Column::LightTheme, Expr::value(light_theme));
        }
        if let Some(files_list_view) = patch.files_list_view {
            update = update.col_expr(users::Column::FilesListView, Expr::value(files_list_view));
        }

        update
            .exec(&self.db)
            .await
            .map_err(|e| IdentityError::repository(e.to_string()))?;

        Ok(())
    }
}
