use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "purchase_order")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub code: String,
    pub order_date: DateTime<Utc>,
    pub supplier_id: i32,
    pub status_id: Option<i32>,
    pub remark: Option<String>,
    pub organization_id: Option<i32>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::supplier::Entity",
        from = "Column::SupplierId",
        to = "super::supplier::Column::Id"
    )]
    Supplier,
    #[sea_orm(has_many = "super::purchase_order_line::Entity")]
    PurchaseOrderLine,
    #[sea_orm(has_many = "super::receiving::Entity")]
    Receiving,
}

impl Related<super::supplier::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Supplier.def()
    }
}

impl Related<super::purchase_order_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PurchaseOrderLine.def()
    }
}

impl Related<super::receiving::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Receiving.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
