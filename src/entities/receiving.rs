use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::sea_query::{Expr, Func, Query, SimpleExpr, SubQueryStatement};
use sea_orm::{Condition, QueryOrder};
use serde::{Deserialize, Serialize};

use super::{enum_values, receiving_line};

/// One delivery event against one purchase order.
///
/// `purchase_order_id` is fixed at creation; edit paths never write it.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "receiving")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub date: DateTime<Utc>,
    #[sea_orm(column_type = "Text", nullable)]
    pub remark: Option<String>,
    pub status_id: i32,
    pub purchase_order_id: i32,
    pub inventory_transaction_id: Option<i32>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::enum_values::Entity",
        from = "Column::StatusId",
        to = "super::enum_values::Column::Id"
    )]
    Status,
    #[sea_orm(
        belongs_to = "super::purchase_order::Entity",
        from = "Column::PurchaseOrderId",
        to = "super::purchase_order::Column::Id"
    )]
    PurchaseOrder,
    #[sea_orm(
        belongs_to = "super::inventory_transaction::Entity",
        from = "Column::InventoryTransactionId",
        to = "super::inventory_transaction::Column::Id"
    )]
    InventoryTransaction,
    #[sea_orm(has_many = "super::receiving_line::Entity")]
    ReceivingLine,
}

impl Related<super::enum_values::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Status.def()
    }
}

impl Related<super::purchase_order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PurchaseOrder.def()
    }
}

impl Related<super::inventory_transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::InventoryTransaction.def()
    }
}

impl Related<super::receiving_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ReceivingLine.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Entity {
    /// Predicate for the enumeration values a receiving status may take.
    pub fn status_filter() -> Condition {
        enum_values::Entity::type_filter(enum_values::codes::RECEIVING_STATUS)
    }

    /// Storage-level form of the receiving total: a correlated
    /// `SUM(price * quantity)` over the receiving's lines.
    ///
    /// Evaluates to NULL for a receiving without lines and skips lines whose
    /// quantity is NULL, unlike the in-memory total which counts them as zero.
    pub fn total_amount_expr() -> SimpleExpr {
        let line_sum = Query::select()
            .expr(Func::sum(receiving_line::Entity::total_amount_expr()))
            .from(receiving_line::Entity)
            .and_where(
                Expr::col((receiving_line::Entity, receiving_line::Column::ReceivingId))
                    .equals((Entity, Column::Id)),
            )
            .to_owned();

        SimpleExpr::SubQuery(None, Box::new(SubQueryStatement::SelectStatement(line_sum)))
    }

    /// Every receiving recorded against the purchase order `po_id`.
    pub async fn filter_by_po_id<C: ConnectionTrait>(
        db: &C,
        po_id: i32,
    ) -> Result<Vec<Model>, DbErr> {
        Entity::find()
            .filter(Column::PurchaseOrderId.eq(po_id))
            .order_by_asc(Column::Id)
            .all(db)
            .await
    }
}
