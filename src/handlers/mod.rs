pub mod common;
pub mod enum_values;
pub mod health;
pub mod receivings;

use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::config::ReceivingConfig;
use crate::services::{EnumValueService, PurchaseOrderService, ReceivingService};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer used by the HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub receiving: Arc<ReceivingService>,
    pub purchase_orders: Arc<PurchaseOrderService>,
    pub enum_values: Arc<EnumValueService>,
}

impl AppServices {
    pub fn new(db_pool: Arc<DatabaseConnection>, receiving_config: ReceivingConfig) -> Self {
        Self {
            receiving: Arc::new(ReceivingService::new(db_pool.clone(), receiving_config)),
            purchase_orders: Arc::new(PurchaseOrderService::new(db_pool.clone())),
            enum_values: Arc::new(EnumValueService::new(db_pool)),
        }
    }
}
