use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Ledger header recording one movement of stock.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "inventory_transaction")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub date: DateTime<Utc>,
    pub type_id: i32,
    pub remark: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::enum_values::Entity",
        from = "Column::TypeId",
        to = "super::enum_values::Column::Id"
    )]
    Type,
    #[sea_orm(has_many = "super::inventory_transaction_line::Entity")]
    InventoryTransactionLine,
    #[sea_orm(has_one = "super::receiving::Entity")]
    Receiving,
}

impl Related<super::enum_values::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Type.def()
    }
}

impl Related<super::inventory_transaction_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::InventoryTransactionLine.def()
    }
}

impl Related<super::receiving::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Receiving.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
