use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "accounts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = true)]
    pub id: i64,

    /// Identity provider's stable user id. NULL for password-only accounts.
    #[sea_orm(unique)]
    pub uid: Option<String>,

    pub username: String,

    /// Normalized (trimmed, lowercased). NULL when the provider supplied none.
    #[sea_orm(unique)]
    pub email: Option<String>,

    pub avatar: String,

    /// Linked external repository-host identity.
    pub github: String,

    /// NULL for OAuth-only accounts.
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,

    /// Unix timestamp (seconds).
    pub created_at: i64,

    /// Unix timestamp (seconds).
    pub updated_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::account_permission::Entity")]
    AccountPermission,
}

impl Related<super::account_permission::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AccountPermission.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
