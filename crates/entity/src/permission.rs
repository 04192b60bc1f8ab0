use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "permissions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = true)]
    pub id: i64,

    /// Permission identifier embedded in session credentials (e.g. "event:write").
    #[sea_orm(unique)]
    pub name: String,
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
