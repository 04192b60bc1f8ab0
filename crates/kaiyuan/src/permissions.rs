use entity::{account_permission, permission};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};

use crate::accounts::is_unique_violation;

/// Loads the permission set bound to an account. Read-only.
pub struct PermissionResolver<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> PermissionResolver<'a> {
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }

    /// Permission names ordered by permission id. No grants yields an empty list.
    pub async fn resolve_for(&self, account_id: i64) -> Result<Vec<String>, DbErr> {
        let permission_ids: Vec<i64> = account_permission::Entity::find()
            .select_only()
            .column(account_permission::Column::PermissionId)
            .filter(account_permission::Column::AccountId.eq(account_id))
            .into_tuple()
            .all(self.db)
            .await?;

        if permission_ids.is_empty() {
            return Ok(Vec::new());
        }

        let names = permission::Entity::find()
            .filter(permission::Column::Id.is_in(permission_ids))
            .order_by_asc(permission::Column::Id)
            .all(self.db)
            .await?
            .into_iter()
            .map(|p| p.name)
            .collect();

        Ok(names)
    }
}

/// Bind `name` to the account, creating the permission row on first use.
/// Granting an existing permission again is a no-op.
pub async fn grant(db: &DatabaseConnection, account_id: i64, name: &str) -> Result<(), DbErr> {
    let name = name.trim();

    let permission_id = match permission::Entity::find()
        .filter(permission::Column::Name.eq(name))
        .one(db)
        .await?
    {
        Some(existing) => existing.id,
        None => {
            permission::ActiveModel {
                name: Set(name.to_string()),
                ..Default::default()
            }
            .insert(db)
            .await?
            .id
        }
    };

    let grant = account_permission::ActiveModel {
        account_id: Set(account_id),
        permission_id: Set(permission_id),
    };

    match account_permission::Entity::insert(grant).exec_without_returning(db).await {
        Ok(_) => Ok(()),
        Err(e) if is_unique_violation(&e) => Ok(()),
        Err(e) => Err(e),
    }
}
