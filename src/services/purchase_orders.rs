use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection,
    DatabaseTransaction, EntityTrait, QueryFilter, QueryOrder,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use validator::Validate;

use crate::{
    common::format_decimal,
    context::RequestContext,
    db::{filter_by_organization, next_code, DatabaseAccess, ScopedEntity},
    entities::{enum_values, product, purchase_order, purchase_order_line, supplier},
    errors::ServiceError,
    models::{PurchaseOrderLineSnapshot, PurchaseOrderSnapshot},
};

/// One line of a new purchase order.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewPurchaseOrderLine {
    pub product_id: i32,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    #[validate(length(max = 256))]
    pub remark: Option<String>,
}

impl NewPurchaseOrderLine {
    fn check(&self) -> Result<(), ServiceError> {
        self.validate()?;
        if self.quantity <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "quantity must be positive".to_string(),
            ));
        }
        if self.unit_price < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "unit_price must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// Minimal purchase order bookkeeping needed to receive goods.
#[derive(Clone)]
pub struct PurchaseOrderService {
    db: DatabaseAccess,
}

impl PurchaseOrderService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            db: DatabaseAccess::new(db),
        }
    }

    /// Creates a draft purchase order for a supplier of the acting
    /// organization, numbering it with the next free code.
    #[instrument(skip(self, lines), fields(line_count = lines.len()))]
    pub async fn create(
        &self,
        ctx: &RequestContext,
        supplier_id: i32,
        order_date: DateTime<Utc>,
        lines: Vec<NewPurchaseOrderLine>,
    ) -> Result<PurchaseOrderSnapshot, ServiceError> {
        for line in &lines {
            line.check()?;
        }

        let owned = ctx.clone();
        let order_id = self
            .db
            .transaction::<_, _, ServiceError>(move |txn| {
                Box::pin(insert_order(txn, owned, supplier_id, order_date, lines))
            })
            .await?;

        info!(order_id, "Purchase order created");
        self.snapshot(ctx, order_id).await
    }

    /// Loads an order of the acting organization with its supplier and lines.
    #[instrument(skip(self))]
    pub async fn snapshot(
        &self,
        ctx: &RequestContext,
        po_id: i32,
    ) -> Result<PurchaseOrderSnapshot, ServiceError> {
        load_snapshot(self.db.get_pool(), ctx, po_id).await
    }

    /// Orders belonging to the acting organization.
    #[instrument(skip(self))]
    pub async fn list(
        &self,
        ctx: &RequestContext,
    ) -> Result<Vec<purchase_order::Model>, ServiceError> {
        filter_by_organization::<purchase_order::Entity, _>(self.db.get_pool(), ctx).await
    }
}

async fn insert_order(
    txn: &DatabaseTransaction,
    ctx: RequestContext,
    supplier_id: i32,
    order_date: DateTime<Utc>,
    lines: Vec<NewPurchaseOrderLine>,
) -> Result<i32, ServiceError> {
    supplier::Entity::scoped(&ctx)
        .filter(supplier::Column::Id.eq(supplier_id))
        .one(txn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Supplier {} not found", supplier_id)))?;

    let draft_status =
        enum_values::Entity::find_one_by_code(txn, enum_values::codes::PURCHASE_ORDER_DRAFT)
            .await?
            .ok_or_else(|| {
                ServiceError::ConfigurationMissing(
                    enum_values::codes::PURCHASE_ORDER_DRAFT.to_string(),
                )
            })?;

    let code = next_code::<purchase_order::Entity, _>(txn, &ctx).await?;

    let order = purchase_order::ActiveModel {
        code: Set(code),
        order_date: Set(order_date),
        supplier_id: Set(supplier_id),
        status_id: Set(Some(draft_status.id)),
        remark: Set(None),
        organization_id: Set(Some(ctx.organization_id)),
        ..Default::default()
    }
    .insert(txn)
    .await?;

    for line in lines {
        product::Entity::scoped(&ctx)
            .filter(product::Column::Id.eq(line.product_id))
            .one(txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} not found", line.product_id))
            })?;

        purchase_order_line::ActiveModel {
            purchase_order_id: Set(order.id),
            product_id: Set(line.product_id),
            quantity: Set(format_decimal(line.quantity)),
            unit_price: Set(format_decimal(line.unit_price)),
            remark: Set(line.remark),
            ..Default::default()
        }
        .insert(txn)
        .await?;
    }

    Ok(order.id)
}

/// Reads the order `po_id`, its supplier, and its lines in stored order.
/// An order of another organization is reported as missing.
pub async fn load_snapshot<C: ConnectionTrait>(
    db: &C,
    ctx: &RequestContext,
    po_id: i32,
) -> Result<PurchaseOrderSnapshot, ServiceError> {
    let order = purchase_order::Entity::scoped(ctx)
        .filter(purchase_order::Column::Id.eq(po_id))
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Purchase order {} not found", po_id)))?;

    let supplier = supplier::Entity::find_by_id(order.supplier_id)
        .one(db)
        .await?
        .ok_or_else(|| {
            ServiceError::InternalError(format!(
                "Purchase order {} references missing supplier {}",
                po_id, order.supplier_id
            ))
        })?;

    let rows = purchase_order_line::Entity::find()
        .filter(purchase_order_line::Column::PurchaseOrderId.eq(po_id))
        .order_by_asc(purchase_order_line::Column::Id)
        .find_also_related(product::Entity)
        .all(db)
        .await?;

    let lines = rows
        .into_iter()
        .map(|(line, product)| {
            let product = product.ok_or_else(|| {
                ServiceError::InternalError(format!(
                    "Purchase order line {} references missing product {}",
                    line.id, line.product_id
                ))
            })?;
            Ok(PurchaseOrderLineSnapshot { line, product })
        })
        .collect::<Result<Vec<_>, ServiceError>>()?;

    Ok(PurchaseOrderSnapshot {
        order,
        supplier,
        lines,
    })
}
