use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One product's movement within an inventory transaction. `in_transit_quantity`
/// holds goods expected but not yet confirmed into available stock.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "inventory_transaction_line")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub inventory_transaction_id: i32,
    pub product_id: i32,
    #[sea_orm(column_type = "Decimal(Some((8, 2)))")]
    pub price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((8, 2)))")]
    pub quantity: Decimal,
    #[sea_orm(column_type = "Decimal(Some((8, 2)))")]
    pub in_transit_quantity: Decimal,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::inventory_transaction::Entity",
        from = "Column::InventoryTransactionId",
        to = "super::inventory_transaction::Column::Id"
    )]
    InventoryTransaction,
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
}

impl Related<super::inventory_transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::InventoryTransaction.def()
    }
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
