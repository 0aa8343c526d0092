use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait,
    DatabaseConnection, DatabaseTransaction, EntityTrait, FromQueryResult, IntoActiveModel,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use validator::Validate;

use crate::{
    common::{format_decimal, SortOrder, MAX_DECIMAL},
    config::ReceivingConfig,
    context::RequestContext,
    db::{delete_by_id, DatabaseAccess, ScopedEntity},
    entities::{
        enum_values, inventory_transaction, inventory_transaction_line, product, purchase_order,
        receiving, receiving_line, supplier,
    },
    errors::ServiceError,
    models::{
        build_draft_receiving, DraftReceiving, ReceivingDetail, ReceivingLineDetail,
        ReceivingLineUpdate, ReceivingUpdate,
    },
    services::purchase_orders::load_snapshot,
};

/// Column a receiving listing is ordered by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceivingSort {
    #[default]
    Id,
    Date,
    TotalAmount,
}

/// Filter, order and page of a receiving listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ReceivingListParams {
    #[serde(default)]
    pub sort: ReceivingSort,
    #[serde(default)]
    pub order: SortOrder,
    pub min_total: Option<Decimal>,
    pub status_id: Option<i32>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

/// A receiving header with its total computed by the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromQueryResult)]
pub struct ReceivingSummary {
    pub id: i32,
    pub date: DateTime<Utc>,
    pub remark: Option<String>,
    pub status_id: i32,
    pub purchase_order_id: i32,
    pub inventory_transaction_id: Option<i32>,
    /// NULL when no line has a quantity.
    pub total_amount: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReceivingPage {
    pub items: Vec<ReceivingSummary>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Service for recording goods received against purchase orders.
#[derive(Clone)]
pub struct ReceivingService {
    db: DatabaseAccess,
    config: ReceivingConfig,
}

impl ReceivingService {
    pub fn new(db: Arc<DatabaseConnection>, config: ReceivingConfig) -> Self {
        Self {
            db: DatabaseAccess::new(db),
            config,
        }
    }

    /// Enumeration values a receiving status may take.
    #[instrument(skip(self))]
    pub async fn status_options(&self) -> Result<Vec<enum_values::Model>, ServiceError> {
        self.db
            .execute("receiving.status_options", |db| {
                enum_values::Entity::find()
                    .filter(receiving::Entity::status_filter())
                    .order_by_asc(enum_values::Column::Id)
                    .all(db)
            })
            .await
    }

    /// Builds, without saving, a draft receiving mirroring purchase order
    /// `po_id` of the acting organization.
    #[instrument(skip(self, ctx), fields(org = ctx.organization_id))]
    pub async fn create_draft_from_po(
        &self,
        ctx: &RequestContext,
        po_id: i32,
    ) -> Result<DraftReceiving, ServiceError> {
        let db = self.db.get_pool();

        let draft_status = resolve_code(db, &self.config.draft_status_code).await?;
        let purchase_in = resolve_code(db, &self.config.purchase_in_type_code).await?;
        let snapshot = load_snapshot(db, ctx, po_id).await?;

        let draft = build_draft_receiving(&snapshot, &draft_status, &purchase_in);
        info!(
            po_id,
            lines = draft.lines.len(),
            "Draft receiving built from purchase order"
        );
        Ok(draft)
    }

    /// Persists a draft and its inventory transaction in one database
    /// transaction.
    #[instrument(skip(self, ctx, draft), fields(po_id = draft.purchase_order_id()))]
    pub async fn save_draft(
        &self,
        ctx: &RequestContext,
        draft: DraftReceiving,
    ) -> Result<ReceivingDetail, ServiceError> {
        let owned = ctx.clone();
        let receiving_id = self
            .db
            .transaction::<_, _, ServiceError>(move |txn| {
                Box::pin(insert_draft(txn, owned, draft))
            })
            .await
            .map_err(|e| {
                error!("Failed to save draft receiving: {}", e);
                e
            })?;

        info!(receiving_id, "Draft receiving saved");
        self.get(ctx, receiving_id).await
    }

    /// Builds and saves a draft receiving for purchase order `po_id`.
    #[instrument(skip(self, ctx), fields(org = ctx.organization_id))]
    pub async fn create_from_po(
        &self,
        ctx: &RequestContext,
        po_id: i32,
    ) -> Result<ReceivingDetail, ServiceError> {
        let draft = self.create_draft_from_po(ctx, po_id).await?;
        self.save_draft(ctx, draft).await
    }

    #[instrument(skip(self, ctx), fields(org = ctx.organization_id))]
    pub async fn get(&self, ctx: &RequestContext, id: i32) -> Result<ReceivingDetail, ServiceError> {
        load_detail(self.db.get_pool(), ctx, id).await
    }

    /// Every receiving recorded against purchase order `po_id`. An order of
    /// another organization has none.
    #[instrument(skip(self, ctx), fields(org = ctx.organization_id))]
    pub async fn filter_by_po_id(
        &self,
        ctx: &RequestContext,
        po_id: i32,
    ) -> Result<Vec<receiving::Model>, ServiceError> {
        let ctx = ctx.clone();
        self.db
            .execute("receiving.filter_by_po_id", |db| async move {
                let visible = purchase_order::Entity::scoped(&ctx)
                    .filter(purchase_order::Column::Id.eq(po_id))
                    .one(db)
                    .await?;
                match visible {
                    Some(_) => receiving::Entity::filter_by_po_id(db, po_id).await,
                    None => Ok(Vec::new()),
                }
            })
            .await
    }

    /// Lists receivings of the acting organization with their totals computed
    /// by the database, so the total can be filtered and sorted on.
    #[instrument(skip(self, ctx), fields(org = ctx.organization_id))]
    pub async fn list(
        &self,
        ctx: &RequestContext,
        params: &ReceivingListParams,
    ) -> Result<ReceivingPage, ServiceError> {
        let page = params.page.unwrap_or(1).max(1);
        let per_page = params.per_page.unwrap_or(20).max(1);

        let mut query = receiving::Entity::scoped(ctx)
            .column_as(receiving::Entity::total_amount_expr(), "total_amount");

        if let Some(min_total) = params.min_total {
            query = query.filter(Expr::expr(receiving::Entity::total_amount_expr()).gte(min_total));
        }
        if let Some(status_id) = params.status_id {
            query = query.filter(receiving::Column::StatusId.eq(status_id));
        }

        let order = sea_orm::Order::from(params.order);
        query = match params.sort {
            ReceivingSort::Id => query,
            ReceivingSort::Date => query.order_by(receiving::Column::Date, order.clone()),
            ReceivingSort::TotalAmount => {
                query.order_by(receiving::Entity::total_amount_expr(), order.clone())
            }
        };
        query = query.order_by(receiving::Column::Id, order);

        let db = self.db.get_pool();
        let paginator = query
            .into_model::<ReceivingSummary>()
            .paginate(db, per_page);

        let total = paginator.num_items().await?;
        let items = paginator
            .fetch_page(page - 1)
            .await?
            .into_iter()
            .map(|mut item| {
                item.total_amount = item.total_amount.map(format_decimal);
                item
            })
            .collect();

        Ok(ReceivingPage {
            items,
            total,
            page,
            per_page,
        })
    }

    /// Edits the writable header fields. The status may be echoed back
    /// unchanged; moving it is left to [`ReceivingService::complete`], which
    /// keeps stock in step.
    #[instrument(skip(self, ctx, form), fields(org = ctx.organization_id))]
    pub async fn update(
        &self,
        ctx: &RequestContext,
        id: i32,
        form: ReceivingUpdate,
    ) -> Result<ReceivingDetail, ServiceError> {
        form.validate()?;
        let db = self.db.get_pool();

        let existing = find_receiving(db, ctx, id).await?;

        if let Some(status_id) = form.status_id {
            if status_id != existing.status_id {
                warn!(
                    receiving_id = id,
                    from = existing.status_id,
                    to = status_id,
                    "Rejected status change through header edit"
                );
                return Err(ServiceError::InvalidOperation(format!(
                    "Status of receiving {} changes only through completion",
                    id
                )));
            }
        }

        let mut active = existing.into_active_model();
        form.apply(&mut active);
        if active.is_changed() {
            active.update(db).await?;
        }

        info!(receiving_id = id, "Receiving updated");
        self.get(ctx, id).await
    }

    /// Edits a line's received quantity while the receiving is a draft; the
    /// paired transaction line's in-transit quantity follows it.
    #[instrument(skip(self, ctx, form), fields(org = ctx.organization_id))]
    pub async fn update_line(
        &self,
        ctx: &RequestContext,
        id: i32,
        line_id: i32,
        form: ReceivingLineUpdate,
    ) -> Result<ReceivingDetail, ServiceError> {
        form.validate()?;
        if let Some(quantity) = form.quantity {
            if quantity < Decimal::ZERO {
                return Err(ServiceError::ValidationError(
                    "quantity must not be negative".to_string(),
                ));
            }
            if format_decimal(quantity) > MAX_DECIMAL {
                return Err(ServiceError::ValidationError(format!(
                    "quantity must not exceed {}",
                    MAX_DECIMAL
                )));
            }
        }

        let owned = ctx.clone();
        let draft_code = self.config.draft_status_code.clone();
        self.db
            .transaction::<_, _, ServiceError>(move |txn| {
                Box::pin(apply_line_update(txn, owned, id, line_id, form, draft_code))
            })
            .await?;

        self.get(ctx, id).await
    }

    /// Confirms a draft receiving: in-transit stock becomes available stock
    /// and the receiving takes the complete status.
    #[instrument(skip(self, ctx), fields(org = ctx.organization_id))]
    pub async fn complete(
        &self,
        ctx: &RequestContext,
        id: i32,
    ) -> Result<ReceivingDetail, ServiceError> {
        let owned = ctx.clone();
        let config = self.config.clone();
        self.db
            .transaction::<_, _, ServiceError>(move |txn| {
                Box::pin(complete_receiving(txn, owned, id, config))
            })
            .await?;

        info!(receiving_id = id, "Receiving completed");
        self.get(ctx, id).await
    }

    /// Deletes a receiving together with its lines and its inventory
    /// transaction.
    #[instrument(skip(self, ctx), fields(org = ctx.organization_id))]
    pub async fn delete(&self, ctx: &RequestContext, id: i32) -> Result<(), ServiceError> {
        let owned = ctx.clone();
        self.db
            .transaction::<_, _, ServiceError>(move |txn| {
                Box::pin(delete_cascade(txn, owned, id))
            })
            .await?;

        info!(receiving_id = id, "Receiving deleted");
        Ok(())
    }
}

async fn resolve_code<C: ConnectionTrait>(
    db: &C,
    code: &str,
) -> Result<enum_values::Model, ServiceError> {
    enum_values::Entity::find_one_by_code(db, code)
        .await?
        .ok_or_else(|| {
            error!(code, "Required enumeration value is missing");
            ServiceError::ConfigurationMissing(code.to_string())
        })
}

/// Receiving `id` when its purchase order belongs to the acting
/// organization.
async fn find_receiving<C: ConnectionTrait>(
    db: &C,
    ctx: &RequestContext,
    id: i32,
) -> Result<receiving::Model, ServiceError> {
    receiving::Entity::scoped(ctx)
        .filter(receiving::Column::Id.eq(id))
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Receiving {} not found", id)))
}

async fn insert_draft(
    txn: &DatabaseTransaction,
    ctx: RequestContext,
    draft: DraftReceiving,
) -> Result<i32, ServiceError> {
    let order_visible = purchase_order::Entity::scoped(&ctx)
        .filter(purchase_order::Column::Id.eq(draft.purchase_order.id))
        .one(txn)
        .await?;
    if order_visible.is_none() {
        return Err(ServiceError::NotFound(format!(
            "Purchase order {} not found",
            draft.purchase_order.id
        )));
    }

    let transaction = inventory_transaction::ActiveModel {
        date: Set(draft.inventory_transaction.date),
        type_id: Set(draft.inventory_transaction.transaction_type.id),
        remark: Set(None),
        ..Default::default()
    }
    .insert(txn)
    .await?;

    let header = receiving::ActiveModel {
        date: Set(draft.date),
        remark: Set(draft.remark),
        status_id: Set(draft.status.id),
        purchase_order_id: Set(draft.purchase_order.id),
        inventory_transaction_id: Set(Some(transaction.id)),
        ..Default::default()
    }
    .insert(txn)
    .await?;

    for line in draft.lines {
        let stock = line.inventory_transaction_line;
        let transaction_line = inventory_transaction_line::ActiveModel {
            inventory_transaction_id: Set(transaction.id),
            product_id: Set(stock.product_id),
            price: Set(format_decimal(stock.price)),
            quantity: Set(format_decimal(stock.quantity)),
            in_transit_quantity: Set(format_decimal(stock.in_transit_quantity)),
            ..Default::default()
        }
        .insert(txn)
        .await?;

        receiving_line::ActiveModel {
            receiving_id: Set(header.id),
            product_id: Set(line.product.id),
            purchase_order_line_id: Set(line.purchase_order_line_id),
            inventory_transaction_line_id: Set(Some(transaction_line.id)),
            quantity: Set(line.quantity.map(format_decimal)),
            price: Set(format_decimal(line.price)),
            ..Default::default()
        }
        .insert(txn)
        .await?;
    }

    Ok(header.id)
}

async fn apply_line_update(
    txn: &DatabaseTransaction,
    ctx: RequestContext,
    id: i32,
    line_id: i32,
    form: ReceivingLineUpdate,
    draft_code: String,
) -> Result<(), ServiceError> {
    let header = find_receiving(txn, &ctx, id).await?;
    let draft_status = resolve_code(txn, &draft_code).await?;
    if header.status_id != draft_status.id {
        return Err(ServiceError::InvalidOperation(format!(
            "Receiving {} is no longer a draft",
            id
        )));
    }

    let line = receiving_line::Entity::find_by_id(line_id)
        .filter(receiving_line::Column::ReceivingId.eq(id))
        .one(txn)
        .await?
        .ok_or_else(|| {
            ServiceError::NotFound(format!("Line {} not found on receiving {}", line_id, id))
        })?;

    let paired_line_id = line.inventory_transaction_line_id;
    let mut active = line.clone().into_active_model();
    form.apply(&mut active);
    let updated = if active.is_changed() {
        active.update(txn).await?
    } else {
        line
    };

    if let Some(stock_id) = paired_line_id {
        if let Some(stock) = inventory_transaction_line::Entity::find_by_id(stock_id)
            .one(txn)
            .await?
        {
            let mut stock = stock.into_active_model();
            stock.in_transit_quantity =
                Set(format_decimal(updated.quantity.unwrap_or(Decimal::ZERO)));
            stock.update(txn).await?;
        }
    }

    Ok(())
}

async fn complete_receiving(
    txn: &DatabaseTransaction,
    ctx: RequestContext,
    id: i32,
    config: ReceivingConfig,
) -> Result<(), ServiceError> {
    let header = find_receiving(txn, &ctx, id).await?;
    let draft_status = resolve_code(txn, &config.draft_status_code).await?;
    let complete_status = resolve_code(txn, &config.complete_status_code).await?;

    if header.status_id != draft_status.id {
        warn!(receiving_id = id, "Attempt to complete a receiving that is not a draft");
        return Err(ServiceError::InvalidOperation(format!(
            "Receiving {} is not a draft",
            id
        )));
    }

    if let Some(transaction_id) = header.inventory_transaction_id {
        let stock_lines = inventory_transaction_line::Entity::find()
            .filter(inventory_transaction_line::Column::InventoryTransactionId.eq(transaction_id))
            .all(txn)
            .await?;

        for stock in stock_lines {
            let arrived = stock.in_transit_quantity;
            let mut stock = stock.into_active_model();
            stock.quantity = Set(format_decimal(arrived));
            stock.in_transit_quantity = Set(format_decimal(Decimal::ZERO));
            stock.update(txn).await?;
        }
    }

    let mut header = header.into_active_model();
    header.status_id = Set(complete_status.id);
    header.update(txn).await?;

    Ok(())
}

async fn delete_cascade(
    txn: &DatabaseTransaction,
    ctx: RequestContext,
    id: i32,
) -> Result<(), ServiceError> {
    let header = find_receiving(txn, &ctx, id).await?;

    receiving_line::Entity::delete_many()
        .filter(receiving_line::Column::ReceivingId.eq(id))
        .exec(txn)
        .await?;

    delete_by_id::<receiving::Entity, _>(txn, id).await?;

    if let Some(transaction_id) = header.inventory_transaction_id {
        inventory_transaction_line::Entity::delete_many()
            .filter(inventory_transaction_line::Column::InventoryTransactionId.eq(transaction_id))
            .exec(txn)
            .await?;
        inventory_transaction::Entity::delete_by_id(transaction_id)
            .exec(txn)
            .await?;
    }

    Ok(())
}

/// Loads receiving `id` of the acting organization with its order, supplier,
/// status, transaction and lines.
pub async fn load_detail<C: ConnectionTrait>(
    db: &C,
    ctx: &RequestContext,
    id: i32,
) -> Result<ReceivingDetail, ServiceError> {
    let header = find_receiving(db, ctx, id).await?;

    let order = purchase_order::Entity::find_by_id(header.purchase_order_id)
        .one(db)
        .await?
        .ok_or_else(|| {
            ServiceError::InternalError(format!(
                "Receiving {} references missing purchase order {}",
                id, header.purchase_order_id
            ))
        })?;

    let supplier = supplier::Entity::find_by_id(order.supplier_id)
        .one(db)
        .await?
        .ok_or_else(|| {
            ServiceError::InternalError(format!("Supplier {} not found", order.supplier_id))
        })?;

    let status = enum_values::Entity::find_by_id(header.status_id)
        .one(db)
        .await?
        .ok_or_else(|| {
            ServiceError::InternalError(format!("Status {} not found", header.status_id))
        })?;

    let transaction = match header.inventory_transaction_id {
        Some(transaction_id) => {
            inventory_transaction::Entity::find_by_id(transaction_id)
                .one(db)
                .await?
        }
        None => None,
    };

    let rows = receiving_line::Entity::find()
        .filter(receiving_line::Column::ReceivingId.eq(id))
        .order_by_asc(receiving_line::Column::Id)
        .find_also_related(product::Entity)
        .all(db)
        .await?;

    let stock_ids: Vec<i32> = rows
        .iter()
        .filter_map(|(line, _)| line.inventory_transaction_line_id)
        .collect();
    let mut stock_lines: HashMap<i32, inventory_transaction_line::Model> = if stock_ids.is_empty()
    {
        HashMap::new()
    } else {
        inventory_transaction_line::Entity::find()
            .filter(inventory_transaction_line::Column::Id.is_in(stock_ids))
            .all(db)
            .await?
            .into_iter()
            .map(|stock| (stock.id, stock))
            .collect()
    };

    let lines = rows
        .into_iter()
        .map(|(line, product)| {
            let product = product.ok_or_else(|| {
                ServiceError::InternalError(format!(
                    "Receiving line {} references missing product {}",
                    line.id, line.product_id
                ))
            })?;
            let inventory_transaction_line = line
                .inventory_transaction_line_id
                .and_then(|stock_id| stock_lines.remove(&stock_id));
            Ok(ReceivingLineDetail {
                line,
                product,
                inventory_transaction_line,
            })
        })
        .collect::<Result<Vec<_>, ServiceError>>()?;

    Ok(ReceivingDetail {
        receiving: header,
        purchase_order: order,
        supplier,
        status,
        inventory_transaction: transaction,
        lines,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_params_default_to_id_descending() {
        let params: ReceivingListParams = serde_json::from_str("{}").unwrap();
        assert_eq!(params.sort, ReceivingSort::Id);
        assert_eq!(params.order, SortOrder::Desc);
        assert!(params.min_total.is_none());
    }

    #[test]
    fn sort_keys_use_snake_case() {
        let params: ReceivingListParams =
            serde_json::from_str(r#"{"sort":"total_amount","order":"asc","min_total":"10.5"}"#)
                .unwrap();
        assert_eq!(params.sort, ReceivingSort::TotalAmount);
        assert_eq!(params.order, SortOrder::Asc);
        assert_eq!(params.min_total, Some(Decimal::new(105, 1)));
    }
}
