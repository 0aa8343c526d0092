// Receiving of goods against purchase orders
pub mod receiving;

// Purchase order bookkeeping consumed by receiving
pub mod purchase_orders;

// Lookup values (statuses, transaction types)
pub mod enum_values;

pub use enum_values::EnumValueService;
pub use purchase_orders::{NewPurchaseOrderLine, PurchaseOrderService};
pub use receiving::{
    ReceivingListParams, ReceivingPage, ReceivingService, ReceivingSort, ReceivingSummary,
};
