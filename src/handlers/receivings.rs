use super::common::{
    created_response, no_content_response, page_window, success_response, PaginatedResponse,
};
use crate::{
    auth::{authorize, can_view_purchase_price, Operation, Principal, Resource},
    common::SortOrder,
    entities::{enum_values, receiving},
    errors::ServiceError,
    handlers::AppState,
    models::{ReceivingDetail, ReceivingLineDetail, ReceivingLineUpdate, ReceivingUpdate},
    services::{ReceivingListParams, ReceivingSort, ReceivingSummary},
};
use axum::{
    extract::{Json, Path, Query, State},
    response::Response,
    routing::{get, post, put},
    Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

// Query and response DTOs

#[derive(Debug, Default, Deserialize)]
pub struct ReceivingQuery {
    pub po_id: Option<i32>,
    #[serde(default)]
    pub sort: ReceivingSort,
    #[serde(default)]
    pub order: SortOrder,
    pub min_total: Option<Decimal>,
    pub status_id: Option<i32>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct EnumValueView {
    pub id: i32,
    pub code: String,
    pub display: String,
}

impl From<&enum_values::Model> for EnumValueView {
    fn from(value: &enum_values::Model) -> Self {
        Self {
            id: value.id,
            code: value.code.clone(),
            display: value.display.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReceivingSummaryResponse {
    pub id: i32,
    pub date: DateTime<Utc>,
    pub remark: Option<String>,
    pub status_id: i32,
    pub purchase_order_id: i32,
    pub inventory_transaction_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_amount: Option<Decimal>,
}

impl ReceivingSummaryResponse {
    fn from_summary(row: ReceivingSummary, show_prices: bool) -> Self {
        Self {
            id: row.id,
            date: row.date,
            remark: row.remark,
            status_id: row.status_id,
            purchase_order_id: row.purchase_order_id,
            inventory_transaction_id: row.inventory_transaction_id,
            total_amount: if show_prices { row.total_amount } else { None },
        }
    }

    fn from_model(row: receiving::Model) -> Self {
        Self {
            id: row.id,
            date: row.date,
            remark: row.remark,
            status_id: row.status_id,
            purchase_order_id: row.purchase_order_id,
            inventory_transaction_id: row.inventory_transaction_id,
            total_amount: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OrderRef {
    pub id: i32,
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct PartyRef {
    pub id: i32,
    pub code: String,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct ReceivingLineResponse {
    pub id: i32,
    pub purchase_order_line_id: i32,
    pub transient_product: PartyRef,
    pub quantity: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transient_price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_amount: Option<Decimal>,
    pub inventory_transaction_line_id: Option<i32>,
    pub in_transit_quantity: Option<Decimal>,
    pub stock_quantity: Option<Decimal>,
}

impl ReceivingLineResponse {
    fn new(detail: &ReceivingLineDetail, show_prices: bool) -> Self {
        let product = detail.transient_product();
        Self {
            id: detail.line.id,
            purchase_order_line_id: detail.line.purchase_order_line_id,
            transient_product: PartyRef {
                id: product.id,
                code: product.code.clone(),
                name: product.name.clone(),
            },
            quantity: detail.line.quantity,
            transient_price: show_prices.then(|| detail.transient_price()),
            total_amount: show_prices.then(|| detail.total_amount()),
            inventory_transaction_line_id: detail.line.inventory_transaction_line_id,
            in_transit_quantity: detail
                .inventory_transaction_line
                .as_ref()
                .map(|stock| stock.in_transit_quantity),
            stock_quantity: detail
                .inventory_transaction_line
                .as_ref()
                .map(|stock| stock.quantity),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReceivingResponse {
    pub id: i32,
    pub date: DateTime<Utc>,
    pub remark: Option<String>,
    pub status: EnumValueView,
    pub purchase_order_id: i32,
    pub transient_po: OrderRef,
    pub supplier: PartyRef,
    pub inventory_transaction_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_amount: Option<Decimal>,
    pub lines: Vec<ReceivingLineResponse>,
}

impl ReceivingResponse {
    pub fn new(detail: &ReceivingDetail, show_prices: bool) -> Self {
        let order = detail.transient_po();
        let supplier = detail.supplier();
        Self {
            id: detail.id(),
            date: detail.receiving.date,
            remark: detail.receiving.remark.clone(),
            status: EnumValueView::from(&detail.status),
            purchase_order_id: detail.receiving.purchase_order_id,
            transient_po: OrderRef {
                id: order.id,
                code: order.code.clone(),
            },
            supplier: PartyRef {
                id: supplier.id,
                code: supplier.code.clone(),
                name: supplier.name.clone(),
            },
            inventory_transaction_id: detail.receiving.inventory_transaction_id,
            total_amount: show_prices.then(|| detail.total_amount()),
            lines: detail
                .lines
                .iter()
                .map(|line| ReceivingLineResponse::new(line, show_prices))
                .collect(),
        }
    }
}

// Handler functions

/// List receivings, or every receiving of one purchase order when `po_id`
/// is given
async fn list_receivings(
    State(state): State<AppState>,
    principal: Principal,
    Query(query): Query<ReceivingQuery>,
) -> Result<Response, ServiceError> {
    authorize(Some(&principal), Resource::Receiving, Operation::View)?;
    let show_prices = can_view_purchase_price(&principal);
    let ctx = principal.context();

    if let Some(po_id) = query.po_id {
        let rows = state.services.receiving.filter_by_po_id(&ctx, po_id).await?;
        let data = rows
            .into_iter()
            .map(ReceivingSummaryResponse::from_model)
            .collect();
        return Ok(success_response(PaginatedResponse::unpaged(data)));
    }

    if !show_prices && (query.min_total.is_some() || query.sort == ReceivingSort::TotalAmount) {
        return Err(ServiceError::Forbidden(
            "Filtering or sorting by total requires purchase_price_view".to_string(),
        ));
    }

    let (page, per_page) = page_window(
        query.page,
        query.per_page,
        state.config.api_default_page_size,
        state.config.api_max_page_size,
    );
    let params = ReceivingListParams {
        sort: query.sort,
        order: query.order,
        min_total: query.min_total,
        status_id: query.status_id,
        page: Some(page),
        per_page: Some(per_page),
    };

    let result = state.services.receiving.list(&ctx, &params).await?;
    let data = result
        .items
        .into_iter()
        .map(|row| ReceivingSummaryResponse::from_summary(row, show_prices))
        .collect();

    Ok(success_response(PaginatedResponse::new(
        data,
        result.page,
        result.per_page,
        result.total,
    )))
}

/// Statuses a receiving may take
async fn list_statuses(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Response, ServiceError> {
    authorize(Some(&principal), Resource::Receiving, Operation::View)?;

    let statuses = state.services.receiving.status_options().await?;
    let data: Vec<EnumValueView> = statuses.iter().map(EnumValueView::from).collect();
    Ok(success_response(data))
}

async fn get_receiving(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i32>,
) -> Result<Response, ServiceError> {
    authorize(Some(&principal), Resource::Receiving, Operation::View)?;
    let ctx = principal.context();

    let detail = state.services.receiving.get(&ctx, id).await?;
    Ok(success_response(ReceivingResponse::new(
        &detail,
        can_view_purchase_price(&principal),
    )))
}

/// Create and save a draft receiving for a purchase order
async fn create_from_purchase_order(
    State(state): State<AppState>,
    principal: Principal,
    Path(po_id): Path<i32>,
) -> Result<Response, ServiceError> {
    authorize(Some(&principal), Resource::Receiving, Operation::Create)?;
    let ctx = principal.context();

    let detail = state.services.receiving.create_from_po(&ctx, po_id).await?;
    info!(receiving_id = detail.id(), po_id, user = %principal.user_id, "Receiving created");

    Ok(created_response(ReceivingResponse::new(
        &detail,
        can_view_purchase_price(&principal),
    )))
}

async fn update_receiving(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i32>,
    Json(form): Json<ReceivingUpdate>,
) -> Result<Response, ServiceError> {
    authorize(Some(&principal), Resource::Receiving, Operation::Edit)?;
    let ctx = principal.context();

    let detail = state.services.receiving.update(&ctx, id, form).await?;
    Ok(success_response(ReceivingResponse::new(
        &detail,
        can_view_purchase_price(&principal),
    )))
}

async fn update_receiving_line(
    State(state): State<AppState>,
    principal: Principal,
    Path((id, line_id)): Path<(i32, i32)>,
    Json(form): Json<ReceivingLineUpdate>,
) -> Result<Response, ServiceError> {
    authorize(Some(&principal), Resource::Receiving, Operation::Edit)?;
    let ctx = principal.context();

    let detail = state
        .services
        .receiving
        .update_line(&ctx, id, line_id, form)
        .await?;
    Ok(success_response(ReceivingResponse::new(
        &detail,
        can_view_purchase_price(&principal),
    )))
}

/// Confirm arrival of the goods of a draft receiving
async fn complete_receiving(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i32>,
) -> Result<Response, ServiceError> {
    authorize(Some(&principal), Resource::Receiving, Operation::Edit)?;
    let ctx = principal.context();

    let detail = state.services.receiving.complete(&ctx, id).await?;
    info!(receiving_id = id, user = %principal.user_id, "Receiving completed");

    Ok(success_response(ReceivingResponse::new(
        &detail,
        can_view_purchase_price(&principal),
    )))
}

async fn delete_receiving(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i32>,
) -> Result<Response, ServiceError> {
    authorize(Some(&principal), Resource::Receiving, Operation::Delete)?;
    let ctx = principal.context();

    state.services.receiving.delete(&ctx, id).await?;
    info!(receiving_id = id, user = %principal.user_id, "Receiving deleted");

    Ok(no_content_response())
}

/// Receiving routes, mounted under `/api/v1`
pub fn receiving_routes() -> Router<AppState> {
    Router::new()
        .route("/receivings", get(list_receivings))
        .route("/receivings/statuses", get(list_statuses))
        .route(
            "/receivings/:id",
            get(get_receiving)
                .put(update_receiving)
                .delete(delete_receiving),
        )
        .route("/receivings/:id/lines/:line_id", put(update_receiving_line))
        .route("/receivings/:id/complete", post(complete_receiving))
        .route(
            "/purchase-orders/:po_id/receivings",
            post(create_from_purchase_order),
        )
}
