pub mod enum_values;
pub mod inventory_transaction;
pub mod inventory_transaction_line;
pub mod product;
pub mod purchase_order;
pub mod purchase_order_line;
pub mod receiving;
pub mod receiving_line;
pub mod supplier;
