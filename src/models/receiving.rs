//! In-memory receiving aggregate.
//!
//! A receiving owns its lines and its paired inventory transaction; every
//! receiving line owns its paired transaction line. Drafts are built here
//! without touching storage; persisting them is the caller's job.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::common::format_decimal;
use crate::entities::{
    enum_values, inventory_transaction, inventory_transaction_line, product, purchase_order,
    purchase_order_line, receiving, receiving_line, supplier,
};

/// One ordered line of a purchase order together with its product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseOrderLineSnapshot {
    pub line: purchase_order_line::Model,
    pub product: product::Model,
}

/// Read-only view of a purchase order consumed by draft creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseOrderSnapshot {
    pub order: purchase_order::Model,
    pub supplier: supplier::Model,
    /// Lines in stored order.
    pub lines: Vec<PurchaseOrderLineSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftInventoryTransactionLine {
    pub product_id: i32,
    pub price: Decimal,
    /// Available-stock quantity; zero until the goods are confirmed.
    pub quantity: Decimal,
    pub in_transit_quantity: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftInventoryTransaction {
    pub date: DateTime<Utc>,
    pub transaction_type: enum_values::Model,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftReceivingLine {
    pub product: product::Model,
    pub purchase_order_line_id: i32,
    pub price: Decimal,
    pub quantity: Option<Decimal>,
    pub inventory_transaction_line: DraftInventoryTransactionLine,
}

impl DraftReceivingLine {
    pub fn total_amount(&self) -> Decimal {
        receiving_line::line_total(self.price, self.quantity)
    }
}

/// Unpersisted receiving graph produced from a purchase order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftReceiving {
    pub purchase_order: purchase_order::Model,
    pub supplier: supplier::Model,
    pub date: DateTime<Utc>,
    pub remark: Option<String>,
    pub status: enum_values::Model,
    pub inventory_transaction: DraftInventoryTransaction,
    pub lines: Vec<DraftReceivingLine>,
}

impl DraftReceiving {
    pub fn purchase_order_id(&self) -> i32 {
        self.purchase_order.id
    }

    pub fn total_amount(&self) -> Decimal {
        format_decimal(self.lines.iter().map(DraftReceivingLine::total_amount).sum())
    }

    pub fn supplier(&self) -> &supplier::Model {
        &self.supplier
    }
}

/// Builds a draft receiving mirroring every line of `po`.
///
/// Each receiving line takes the order line's unit price, product and ordered
/// quantity; its paired transaction line records the same quantity as in
/// transit with zero available quantity.
pub fn build_draft_receiving(
    po: &PurchaseOrderSnapshot,
    draft_status: &enum_values::Model,
    purchase_in_type: &enum_values::Model,
) -> DraftReceiving {
    let date = po.order.order_date;

    let lines = po
        .lines
        .iter()
        .map(|source| DraftReceivingLine {
            product: source.product.clone(),
            purchase_order_line_id: source.line.id,
            price: source.line.unit_price,
            quantity: Some(source.line.quantity),
            inventory_transaction_line: DraftInventoryTransactionLine {
                product_id: source.product.id,
                price: source.line.unit_price,
                quantity: Decimal::ZERO,
                in_transit_quantity: source.line.quantity,
            },
        })
        .collect();

    DraftReceiving {
        purchase_order: po.order.clone(),
        supplier: po.supplier.clone(),
        date,
        remark: None,
        status: draft_status.clone(),
        inventory_transaction: DraftInventoryTransaction {
            date,
            transaction_type: purchase_in_type.clone(),
        },
        lines,
    }
}

/// A persisted receiving line with its product and paired transaction line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReceivingLineDetail {
    pub line: receiving_line::Model,
    pub product: product::Model,
    pub inventory_transaction_line: Option<inventory_transaction_line::Model>,
}

impl ReceivingLineDetail {
    pub fn total_amount(&self) -> Decimal {
        self.line.total_amount()
    }

    pub fn transient_product(&self) -> &product::Model {
        &self.product
    }

    pub fn transient_price(&self) -> Decimal {
        self.line.transient_price()
    }
}

/// A persisted receiving loaded with everything it owns or displays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReceivingDetail {
    pub receiving: receiving::Model,
    pub purchase_order: purchase_order::Model,
    pub supplier: supplier::Model,
    pub status: enum_values::Model,
    pub inventory_transaction: Option<inventory_transaction::Model>,
    pub lines: Vec<ReceivingLineDetail>,
}

impl ReceivingDetail {
    pub fn id(&self) -> i32 {
        self.receiving.id
    }

    /// Sum of the line totals in canonical form.
    pub fn total_amount(&self) -> Decimal {
        format_decimal(self.lines.iter().map(ReceivingLineDetail::total_amount).sum())
    }

    /// Supplier of the purchase order, read-only.
    pub fn supplier(&self) -> &supplier::Model {
        &self.supplier
    }

    /// The purchase order as a read-only display field.
    pub fn transient_po(&self) -> &purchase_order::Model {
        &self.purchase_order
    }
}

/// Header edit form.
///
/// Display columns bound by the admin screens are accepted and discarded;
/// only `date` and `remark` are ever written. `status_id` is accepted only
/// when it equals the stored status.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct ReceivingUpdate {
    pub date: Option<DateTime<Utc>>,
    #[validate(length(max = 4000))]
    pub remark: Option<String>,
    pub status_id: Option<i32>,

    #[serde(default)]
    pub transient_po: Option<IgnoredAny>,
    #[serde(default)]
    pub purchase_order_id: Option<IgnoredAny>,
    #[serde(default)]
    pub supplier: Option<IgnoredAny>,
    #[serde(default)]
    pub total_amount: Option<IgnoredAny>,
}

impl ReceivingUpdate {
    pub fn apply(&self, model: &mut receiving::ActiveModel) {
        use sea_orm::ActiveValue::Set;

        if let Some(date) = self.date {
            model.date = Set(date);
        }
        if let Some(remark) = &self.remark {
            model.remark = Set(Some(remark.clone()));
        }
    }
}

/// Line edit form; only the quantity is writable.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct ReceivingLineUpdate {
    pub quantity: Option<Decimal>,

    #[serde(default)]
    pub transient_product: Option<IgnoredAny>,
    #[serde(default)]
    pub transient_price: Option<IgnoredAny>,
    #[serde(default)]
    pub total_amount: Option<IgnoredAny>,
}

impl ReceivingLineUpdate {
    pub fn apply(&self, model: &mut receiving_line::ActiveModel) {
        use sea_orm::ActiveValue::Set;

        if let Some(quantity) = self.quantity {
            model.quantity = Set(Some(format_decimal(quantity)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;
    use sea_orm::{ActiveValue, IntoActiveModel};

    fn enum_value(id: i32, code: &str) -> enum_values::Model {
        enum_values::Model {
            id,
            type_id: Some(1),
            code: code.to_string(),
            display: code.to_lowercase(),
        }
    }

    fn product(id: i32, name: &str) -> product::Model {
        product::Model {
            id,
            code: format!("{:06}", id),
            name: name.to_string(),
            external_id: None,
            organization_id: Some(1),
        }
    }

    fn snapshot(lines: &[(i32, &str, Decimal, Decimal)]) -> PurchaseOrderSnapshot {
        let order = purchase_order::Model {
            id: 42,
            code: "000042".into(),
            order_date: Utc.with_ymd_and_hms(2016, 8, 18, 9, 30, 0).unwrap(),
            supplier_id: 7,
            status_id: None,
            remark: None,
            organization_id: Some(1),
        };
        let supplier = supplier::Model {
            id: 7,
            code: "000007".into(),
            name: "Acme Wholesale".into(),
            external_id: None,
            organization_id: Some(1),
        };
        let lines = lines
            .iter()
            .enumerate()
            .map(|(idx, (product_id, name, quantity, price))| PurchaseOrderLineSnapshot {
                line: purchase_order_line::Model {
                    id: 100 + idx as i32,
                    purchase_order_id: order.id,
                    product_id: *product_id,
                    quantity: *quantity,
                    unit_price: *price,
                    remark: None,
                },
                product: product(*product_id, name),
            })
            .collect();

        PurchaseOrderSnapshot {
            order,
            supplier,
            lines,
        }
    }

    fn draft_for(po: &PurchaseOrderSnapshot) -> DraftReceiving {
        build_draft_receiving(
            po,
            &enum_value(11, "RECEIVING_DRAFT"),
            &enum_value(21, "PURCHASE_IN"),
        )
    }

    #[test]
    fn two_line_order_produces_expected_totals() {
        let po = snapshot(&[
            (1, "productA", dec!(3), dec!(10.00)),
            (2, "productB", dec!(1), dec!(25.50)),
        ]);
        let draft = draft_for(&po);

        assert_eq!(draft.total_amount().to_string(), "55.50");
        let totals: Vec<String> = draft
            .lines
            .iter()
            .map(|l| l.total_amount().to_string())
            .collect();
        assert_eq!(totals, vec!["30.00", "25.50"]);

        let in_transit: Vec<Decimal> = draft
            .lines
            .iter()
            .map(|l| l.inventory_transaction_line.in_transit_quantity)
            .collect();
        assert_eq!(in_transit, vec![dec!(3), dec!(1)]);
    }

    #[test]
    fn header_copies_order_context() {
        let po = snapshot(&[(1, "productA", dec!(3), dec!(10.00))]);
        let draft = draft_for(&po);

        assert_eq!(draft.purchase_order_id(), 42);
        assert_eq!(draft.date, po.order.order_date);
        assert_eq!(draft.supplier().name, "Acme Wholesale");
        assert_eq!(draft.status.code, "RECEIVING_DRAFT");
        assert_eq!(draft.inventory_transaction.date, po.order.order_date);
        assert_eq!(draft.inventory_transaction.transaction_type.code, "PURCHASE_IN");
    }

    #[test]
    fn lines_trace_back_to_their_source_in_order() {
        let po = snapshot(&[
            (5, "bolts", dec!(12), dec!(0.35)),
            (3, "nuts", dec!(40), dec!(0.10)),
            (9, "washers", dec!(100), dec!(0.02)),
        ]);
        let draft = draft_for(&po);

        assert_eq!(draft.lines.len(), 3);
        for (line, source) in draft.lines.iter().zip(&po.lines) {
            assert_eq!(line.purchase_order_line_id, source.line.id);
            assert_eq!(line.product.id, source.product.id);
            assert_eq!(line.price, source.line.unit_price);
            assert_eq!(line.quantity, Some(source.line.quantity));
            assert_eq!(line.inventory_transaction_line.product_id, source.product.id);
            assert_eq!(line.inventory_transaction_line.price, source.line.unit_price);
            assert_eq!(line.inventory_transaction_line.quantity, Decimal::ZERO);
        }
    }

    #[test]
    fn order_without_lines_gives_empty_draft() {
        let po = snapshot(&[]);
        let draft = draft_for(&po);
        assert!(draft.lines.is_empty());
        assert_eq!(draft.total_amount().to_string(), "0.00");
    }

    #[test]
    fn header_update_ignores_display_fields() {
        let stored = receiving::Model {
            id: 3,
            date: Utc.with_ymd_and_hms(2016, 8, 18, 0, 0, 0).unwrap(),
            remark: Some("dock 2".into()),
            status_id: 11,
            purchase_order_id: 42,
            inventory_transaction_id: Some(8),
        };
        let form: ReceivingUpdate = serde_json::from_value(serde_json::json!({
            "transient_po": {"id": 99, "code": "000099"},
            "purchase_order_id": 99,
            "supplier": "Someone Else",
            "total_amount": "123456.00"
        }))
        .unwrap();

        let mut active = stored.clone().into_active_model();
        form.apply(&mut active);

        assert_eq!(active.purchase_order_id, ActiveValue::Unchanged(42));
        assert_eq!(active.remark, ActiveValue::Unchanged(Some("dock 2".into())));
        assert_eq!(active.status_id, ActiveValue::Unchanged(11));
        assert!(!sea_orm::ActiveModelTrait::is_changed(&active));
    }

    #[test]
    fn header_update_writes_editable_fields_but_never_status() {
        let stored = receiving::Model {
            id: 3,
            date: Utc.with_ymd_and_hms(2016, 8, 18, 0, 0, 0).unwrap(),
            remark: None,
            status_id: 11,
            purchase_order_id: 42,
            inventory_transaction_id: None,
        };
        let form = ReceivingUpdate {
            remark: Some("partial delivery".into()),
            status_id: Some(12),
            ..Default::default()
        };

        let mut active = stored.into_active_model();
        form.apply(&mut active);

        assert_eq!(active.remark, ActiveValue::Set(Some("partial delivery".into())));
        assert_eq!(active.status_id, ActiveValue::Unchanged(11));
        assert_eq!(active.purchase_order_id, ActiveValue::Unchanged(42));
    }

    #[test]
    fn line_update_ignores_price_and_totals() {
        let stored = receiving_line::Model {
            id: 1,
            receiving_id: 3,
            product_id: 5,
            purchase_order_line_id: 100,
            inventory_transaction_line_id: Some(4),
            quantity: Some(dec!(3)),
            price: dec!(10.00),
        };
        let form: ReceivingLineUpdate = serde_json::from_value(serde_json::json!({
            "transient_price": "1.00",
            "transient_product": {"id": 77},
            "total_amount": 0
        }))
        .unwrap();

        let mut active = stored.into_active_model();
        form.apply(&mut active);

        assert_eq!(active.price, ActiveValue::Unchanged(dec!(10.00)));
        assert_eq!(active.product_id, ActiveValue::Unchanged(5));
        assert_eq!(active.quantity, ActiveValue::Unchanged(Some(dec!(3))));
    }

    proptest! {
        #[test]
        fn draft_total_is_sum_of_line_products(
            raw in proptest::collection::vec((1u32..100_000, 0u32..100_000), 0..20)
        ) {
            let lines: Vec<(i32, String, Decimal, Decimal)> = raw
                .iter()
                .enumerate()
                .map(|(idx, (qty, price))| {
                    (idx as i32 + 1, format!("p{idx}"), Decimal::new(*qty as i64, 2), Decimal::new(*price as i64, 2))
                })
                .collect();
            let borrowed: Vec<(i32, &str, Decimal, Decimal)> = lines
                .iter()
                .map(|(id, name, q, p)| (*id, name.as_str(), *q, *p))
                .collect();
            let po = snapshot(&borrowed);
            let draft = draft_for(&po);

            let expected: Decimal = po
                .lines
                .iter()
                .map(|l| l.line.unit_price * l.line.quantity)
                .sum();
            prop_assert_eq!(draft.lines.len(), po.lines.len());
            prop_assert_eq!(draft.total_amount(), format_decimal(expected));
            prop_assert_eq!(draft.total_amount().scale(), 2);
        }
    }
}
