pub mod receiving;

pub use receiving::{
    build_draft_receiving, DraftInventoryTransaction, DraftInventoryTransactionLine,
    DraftReceiving, DraftReceivingLine, PurchaseOrderLineSnapshot, PurchaseOrderSnapshot,
    ReceivingDetail, ReceivingLineDetail, ReceivingLineUpdate, ReceivingUpdate,
};
