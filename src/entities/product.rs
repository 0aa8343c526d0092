use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "product")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub code: String,
    pub name: String,
    pub external_id: Option<String>,
    pub organization_id: Option<i32>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::purchase_order_line::Entity")]
    PurchaseOrderLine,
    #[sea_orm(has_many = "super::receiving_line::Entity")]
    ReceivingLine,
}

impl Related<super::purchase_order_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PurchaseOrderLine.def()
    }
}

impl Related<super::receiving_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ReceivingLine.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
