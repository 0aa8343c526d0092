use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::sea_query::{Expr, SimpleExpr};
use serde::{Deserialize, Serialize};

use crate::common::format_decimal;

/// One product line of a receiving, traced back to the order line it mirrors.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "receiving_line")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub receiving_id: i32,
    pub product_id: i32,
    pub purchase_order_line_id: i32,
    pub inventory_transaction_line_id: Option<i32>,
    #[sea_orm(column_type = "Decimal(Some((8, 2)))", nullable)]
    pub quantity: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((8, 2)))")]
    pub price: Decimal,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::receiving::Entity",
        from = "Column::ReceivingId",
        to = "super::receiving::Column::Id"
    )]
    Receiving,
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
    #[sea_orm(
        belongs_to = "super::purchase_order_line::Entity",
        from = "Column::PurchaseOrderLineId",
        to = "super::purchase_order_line::Column::Id"
    )]
    PurchaseOrderLine,
    #[sea_orm(
        belongs_to = "super::inventory_transaction_line::Entity",
        from = "Column::InventoryTransactionLineId",
        to = "super::inventory_transaction_line::Column::Id"
    )]
    InventoryTransactionLine,
}

impl Related<super::receiving::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Receiving.def()
    }
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl Related<super::purchase_order_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PurchaseOrderLine.def()
    }
}

impl Related<super::inventory_transaction_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::InventoryTransactionLine.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Entity {
    /// Per-row `price * quantity` for storage-level filtering and sorting.
    ///
    /// No null guard: a NULL quantity yields NULL here while
    /// [`Model::total_amount`] yields zero. Kept as observed, not unified.
    pub fn total_amount_expr() -> SimpleExpr {
        Expr::col((Entity, Column::Price)).mul(Expr::col((Entity, Column::Quantity)))
    }
}

impl Model {
    /// `price * quantity`, an unset quantity counting as zero.
    pub fn total_amount(&self) -> Decimal {
        line_total(self.price, self.quantity)
    }

    /// Read-only display passthrough of the stored price.
    pub fn transient_price(&self) -> Decimal {
        self.price
    }
}

pub(crate) fn line_total(price: Decimal, quantity: Option<Decimal>) -> Decimal {
    format_decimal(price * quantity.unwrap_or(Decimal::ZERO))
}
