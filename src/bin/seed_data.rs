//! Seed data script - populates the database with demo purchasing data
//!
//! Run with: cargo run --bin seed-data
//!
//! This creates, for organization 1:
//! - 3 suppliers
//! - 6 products
//! - 4 purchase orders, two of which already have a draft receiving

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ActiveValue::Set, ConnectOptions, Database, DatabaseConnection};
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tracing::info;

use psi_api::{
    config::ReceivingConfig,
    context::RequestContext,
    db::{get_by_name, next_code, run_migrations, save_objects_commit},
    entities::{product, supplier},
    services::{NewPurchaseOrderLine, PurchaseOrderService, ReceivingService},
};

const SUPPLIERS: &[&str] = &["Northwind Traders", "Contoso Metals", "Fabrikam Paper"];

const PRODUCTS: &[(&str, &str)] = &[
    ("Copper wire 2mm", "CW-2MM"),
    ("Steel bolts M8", "SB-M8"),
    ("A4 printing paper", "PP-A4"),
    ("Cardboard box L", "CB-L"),
    ("Packing tape", "PT-50"),
    ("Aluminium sheet", "AS-1MM"),
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    info!("=== psi-api Seed Data ===");

    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://psi.db?mode=rwc".to_string());

    let mut options = ConnectOptions::new(database_url.clone());
    options
        .max_connections(5)
        .min_connections(1)
        .connect_timeout(StdDuration::from_secs(10))
        .acquire_timeout(StdDuration::from_secs(10));

    info!("Connecting to database: {}", database_url);
    let db = Database::connect(options).await?;
    run_migrations(&db).await?;

    let ctx = RequestContext::system(1);

    info!("Creating suppliers...");
    let suppliers = create_suppliers(&db, &ctx).await?;
    info!("  {} suppliers available", suppliers.len());

    info!("Creating products...");
    let products = create_products(&db, &ctx).await?;
    info!("  {} products available", products.len());

    let db = Arc::new(db);
    info!("Creating purchase orders...");
    let orders = PurchaseOrderService::new(db.clone());
    let receivings = ReceivingService::new(db.clone(), ReceivingConfig::default());

    let mut order_ids = Vec::new();
    for (i, supplier) in suppliers.iter().cycle().take(4).enumerate() {
        let lines = products
            .iter()
            .skip(i)
            .take(3)
            .enumerate()
            .map(|(j, product)| NewPurchaseOrderLine {
                product_id: product.id,
                quantity: Decimal::from(5 * (j as i64 + 1)),
                unit_price: dec!(12.50) + Decimal::from(i as i64),
                remark: None,
            })
            .collect();

        let order = orders
            .create(&ctx, supplier.id, Utc::now() - Duration::days(i as i64), lines)
            .await?;
        info!(
            "  Order {} for {} ({} lines)",
            order.order.code,
            supplier.name,
            order.lines.len()
        );
        order_ids.push(order.order.id);
    }

    info!("Creating draft receivings...");
    for po_id in order_ids.iter().take(2) {
        let detail = receivings.create_from_po(&ctx, *po_id).await?;
        info!(
            "  Receiving {} for order {} totalling {}",
            detail.id(),
            po_id,
            detail.total_amount()
        );
    }

    info!("=== Seed Data Complete ===");
    info!("Try: curl -H 'Authorization: Bearer <token>' http://localhost:8080/api/v1/receivings");

    Ok(())
}

async fn create_suppliers(
    db: &DatabaseConnection,
    ctx: &RequestContext,
) -> anyhow::Result<Vec<supplier::Model>> {
    let mut existing = Vec::new();
    let mut missing = Vec::new();
    for name in SUPPLIERS {
        match get_by_name::<supplier::Entity, _>(db, ctx, name).await? {
            Some(found) => existing.push(found),
            None => missing.push(*name),
        }
    }

    let first: u64 = next_code::<supplier::Entity, _>(db, ctx).await?.parse()?;
    let rows: Vec<supplier::ActiveModel> = missing
        .into_iter()
        .enumerate()
        .map(|(i, name)| supplier::ActiveModel {
            code: Set(format!("{:06}", first + i as u64)),
            name: Set(name.to_string()),
            external_id: Set(None),
            organization_id: Set(Some(ctx.organization_id)),
            ..Default::default()
        })
        .collect();

    existing.extend(save_objects_commit(db, rows).await?);
    Ok(existing)
}

async fn create_products(
    db: &DatabaseConnection,
    ctx: &RequestContext,
) -> anyhow::Result<Vec<product::Model>> {
    let mut existing = Vec::new();
    let mut missing = Vec::new();
    for (name, sku) in PRODUCTS {
        match get_by_name::<product::Entity, _>(db, ctx, name).await? {
            Some(found) => existing.push(found),
            None => missing.push((*name, *sku)),
        }
    }

    let first: u64 = next_code::<product::Entity, _>(db, ctx).await?.parse()?;
    let rows: Vec<product::ActiveModel> = missing
        .into_iter()
        .enumerate()
        .map(|(i, (name, sku))| product::ActiveModel {
            code: Set(format!("{:06}", first + i as u64)),
            name: Set(name.to_string()),
            external_id: Set(Some(sku.to_string())),
            organization_id: Set(Some(ctx.organization_id)),
            ..Default::default()
        })
        .collect();

    existing.extend(save_objects_commit(db, rows).await?);
    Ok(existing)
}
