#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ActiveValue::Set, DatabaseConnection};
use serde_json::Value;
use tower::ServiceExt;

use psi_api::{
    config::{AppConfig, ReceivingConfig},
    context::RequestContext,
    db::{self, save_objects_commit},
    entities::{product, supplier},
    models::PurchaseOrderSnapshot,
    services::{NewPurchaseOrderLine, PurchaseOrderService, ReceivingService},
    AppState,
};

pub const TEST_ORG: i32 = 1;
const TEST_SECRET: &str = "test_secret_key_for_testing_purposes_only_0123456789abcdef";

/// Application state backed by a private in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
}

impl TestApp {
    pub async fn new() -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            TEST_SECRET.to_string(),
            3600,
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let state = AppState::new(Arc::new(pool), cfg);
        let router = psi_api::build_router(state.clone());
        Self { router, state }
    }

    pub fn db(&self) -> Arc<DatabaseConnection> {
        self.state.db.clone()
    }

    pub fn receiving(&self) -> &ReceivingService {
        &self.state.services.receiving
    }

    /// Receiving service resolving its codes through `config`.
    pub fn receiving_with(&self, config: ReceivingConfig) -> ReceivingService {
        ReceivingService::new(self.db(), config)
    }

    /// Context of the test user acting for the test organization.
    pub fn ctx(&self) -> RequestContext {
        RequestContext::new(TEST_ORG, "test-user")
    }

    pub fn token(&self, roles: &[&str]) -> String {
        self.token_for(TEST_ORG, roles)
    }

    pub fn token_for(&self, organization_id: i32, roles: &[&str]) -> String {
        self.state
            .auth
            .issue_token("test-user", organization_id, roles)
            .expect("issue test token")
    }

    /// Sends a request through the full router, returning status and JSON
    /// body (`Value::Null` when the body is empty).
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("build request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router response");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, json)
    }

    /// One supplier and two products for the test organization.
    pub async fn catalog(&self) -> (supplier::Model, Vec<product::Model>) {
        let db = self.db();
        let supplier = save_objects_commit(
            db.as_ref(),
            vec![supplier::ActiveModel {
                code: Set("000001".to_string()),
                name: Set("Northwind Traders".to_string()),
                organization_id: Set(Some(TEST_ORG)),
                ..Default::default()
            }],
        )
        .await
        .expect("insert supplier")
        .remove(0);

        let products = save_objects_commit(
            db.as_ref(),
            vec![
                product::ActiveModel {
                    code: Set("000001".to_string()),
                    name: Set("Copper wire".to_string()),
                    organization_id: Set(Some(TEST_ORG)),
                    ..Default::default()
                },
                product::ActiveModel {
                    code: Set("000002".to_string()),
                    name: Set("Steel bolts".to_string()),
                    organization_id: Set(Some(TEST_ORG)),
                    ..Default::default()
                },
            ],
        )
        .await
        .expect("insert products");

        (supplier, products)
    }

    /// A purchase order over the catalog with the given (quantity, price)
    /// per product.
    pub async fn purchase_order(
        &self,
        supplier: &supplier::Model,
        products: &[product::Model],
        lines: &[(Decimal, Decimal)],
    ) -> PurchaseOrderSnapshot {
        let lines = products
            .iter()
            .zip(lines)
            .map(|(product, (quantity, unit_price))| NewPurchaseOrderLine {
                product_id: product.id,
                quantity: *quantity,
                unit_price: *unit_price,
                remark: None,
            })
            .collect();

        PurchaseOrderService::new(self.db())
            .create(
                &self.ctx(),
                supplier.id,
                Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap(),
                lines,
            )
            .await
            .expect("create purchase order")
    }

    /// Catalog plus the standard order: 2 x 12.50 and 3 x 10.25.
    pub async fn standard_order(&self) -> PurchaseOrderSnapshot {
        let (supplier, products) = self.catalog().await;
        self.purchase_order(
            &supplier,
            &products,
            &[(dec!(2), dec!(12.50)), (dec!(3), dec!(10.25))],
        )
        .await
    }
}

/// Decimal carried as a JSON string.
pub fn decimal(value: &Value) -> Decimal {
    value
        .as_str()
        .unwrap_or_else(|| panic!("expected decimal string, got {value}"))
        .parse()
        .expect("decimal")
}
