use anyhow::Result;
use sea_orm::{ConnectOptions, Database};
use sea_orm_migration::prelude::*;
use std::time::Duration;
use tracing::{error, info};

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20160801_000001_create_enum_values_table::Migration),
            Box::new(m20160801_000002_create_master_data_tables::Migration),
            Box::new(m20160801_000003_create_purchase_order_tables::Migration),
            Box::new(m20160801_000004_create_inventory_transaction_tables::Migration),
            Box::new(m20160801_000005_create_receiving_tables::Migration),
            Box::new(m20160801_000006_seed_enum_values::Migration),
        ]
    }
}

fn id_column<T: IntoIden>(name: T) -> ColumnDef {
    ColumnDef::new(name)
        .integer()
        .not_null()
        .auto_increment()
        .primary_key()
        .to_owned()
}

fn amount_column<T: IntoIden>(name: T) -> ColumnDef {
    ColumnDef::new(name).decimal_len(8, 2).to_owned()
}

mod m20160801_000001_create_enum_values_table {
    use super::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20160801_000001_create_enum_values_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(EnumValues::Table)
                        .if_not_exists()
                        .col(id_column(EnumValues::Id))
                        .col(ColumnDef::new(EnumValues::TypeId).integer().null())
                        .col(
                            ColumnDef::new(EnumValues::Code)
                                .string_len(32)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(EnumValues::Display).string_len(64).not_null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_enum_values_type_id")
                                .from(EnumValues::Table, EnumValues::TypeId)
                                .to(EnumValues::Table, EnumValues::Id),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(EnumValues::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum EnumValues {
        Table,
        Id,
        TypeId,
        Code,
        Display,
    }
}

mod m20160801_000002_create_master_data_tables {
    use super::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20160801_000002_create_master_data_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Supplier::Table)
                        .if_not_exists()
                        .col(id_column(Supplier::Id))
                        .col(ColumnDef::new(Supplier::Code).string_len(8).not_null())
                        .col(ColumnDef::new(Supplier::Name).string_len(128).not_null())
                        .col(ColumnDef::new(Supplier::ExternalId).string().null())
                        .col(ColumnDef::new(Supplier::OrganizationId).integer().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Product::Table)
                        .if_not_exists()
                        .col(id_column(Product::Id))
                        .col(ColumnDef::new(Product::Code).string_len(8).not_null())
                        .col(ColumnDef::new(Product::Name).string_len(128).not_null())
                        .col(ColumnDef::new(Product::ExternalId).string().null())
                        .col(ColumnDef::new(Product::OrganizationId).integer().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_supplier_organization_id")
                        .table(Supplier::Table)
                        .col(Supplier::OrganizationId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_product_organization_id")
                        .table(Product::Table)
                        .col(Product::OrganizationId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Product::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Supplier::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Supplier {
        Table,
        Id,
        Code,
        Name,
        ExternalId,
        OrganizationId,
    }

    #[derive(DeriveIden)]
    pub(super) enum Product {
        Table,
        Id,
        Code,
        Name,
        ExternalId,
        OrganizationId,
    }
}

mod m20160801_000003_create_purchase_order_tables {
    use super::m20160801_000001_create_enum_values_table::EnumValues;
    use super::m20160801_000002_create_master_data_tables::{Product, Supplier};
    use super::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20160801_000003_create_purchase_order_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(PurchaseOrder::Table)
                        .if_not_exists()
                        .col(id_column(PurchaseOrder::Id))
                        .col(ColumnDef::new(PurchaseOrder::Code).string_len(8).not_null())
                        .col(
                            ColumnDef::new(PurchaseOrder::OrderDate)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PurchaseOrder::SupplierId).integer().not_null())
                        .col(ColumnDef::new(PurchaseOrder::StatusId).integer().null())
                        .col(ColumnDef::new(PurchaseOrder::Remark).text().null())
                        .col(ColumnDef::new(PurchaseOrder::OrganizationId).integer().null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_purchase_order_supplier_id")
                                .from(PurchaseOrder::Table, PurchaseOrder::SupplierId)
                                .to(Supplier::Table, Supplier::Id),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_purchase_order_status_id")
                                .from(PurchaseOrder::Table, PurchaseOrder::StatusId)
                                .to(EnumValues::Table, EnumValues::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(PurchaseOrderLine::Table)
                        .if_not_exists()
                        .col(id_column(PurchaseOrderLine::Id))
                        .col(
                            ColumnDef::new(PurchaseOrderLine::PurchaseOrderId)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrderLine::ProductId)
                                .integer()
                                .not_null(),
                        )
                        .col(amount_column(PurchaseOrderLine::Quantity).not_null())
                        .col(amount_column(PurchaseOrderLine::UnitPrice).not_null())
                        .col(ColumnDef::new(PurchaseOrderLine::Remark).text().null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_purchase_order_line_purchase_order_id")
                                .from(PurchaseOrderLine::Table, PurchaseOrderLine::PurchaseOrderId)
                                .to(PurchaseOrder::Table, PurchaseOrder::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_purchase_order_line_product_id")
                                .from(PurchaseOrderLine::Table, PurchaseOrderLine::ProductId)
                                .to(Product::Table, Product::Id),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(PurchaseOrderLine::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(PurchaseOrder::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum PurchaseOrder {
        Table,
        Id,
        Code,
        OrderDate,
        SupplierId,
        StatusId,
        Remark,
        OrganizationId,
    }

    #[derive(DeriveIden)]
    pub(super) enum PurchaseOrderLine {
        Table,
        Id,
        PurchaseOrderId,
        ProductId,
        Quantity,
        UnitPrice,
        Remark,
    }
}

mod m20160801_000004_create_inventory_transaction_tables {
    use super::m20160801_000001_create_enum_values_table::EnumValues;
    use super::m20160801_000002_create_master_data_tables::Product;
    use super::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20160801_000004_create_inventory_transaction_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(InventoryTransaction::Table)
                        .if_not_exists()
                        .col(id_column(InventoryTransaction::Id))
                        .col(
                            ColumnDef::new(InventoryTransaction::Date)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryTransaction::TypeId)
                                .integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(InventoryTransaction::Remark).text().null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_inventory_transaction_type_id")
                                .from(InventoryTransaction::Table, InventoryTransaction::TypeId)
                                .to(EnumValues::Table, EnumValues::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(InventoryTransactionLine::Table)
                        .if_not_exists()
                        .col(id_column(InventoryTransactionLine::Id))
                        .col(
                            ColumnDef::new(InventoryTransactionLine::InventoryTransactionId)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryTransactionLine::ProductId)
                                .integer()
                                .not_null(),
                        )
                        .col(amount_column(InventoryTransactionLine::Price).not_null())
                        .col(amount_column(InventoryTransactionLine::Quantity).not_null())
                        .col(amount_column(InventoryTransactionLine::InTransitQuantity).not_null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_inventory_transaction_line_transaction_id")
                                .from(
                                    InventoryTransactionLine::Table,
                                    InventoryTransactionLine::InventoryTransactionId,
                                )
                                .to(InventoryTransaction::Table, InventoryTransaction::Id),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_inventory_transaction_line_product_id")
                                .from(
                                    InventoryTransactionLine::Table,
                                    InventoryTransactionLine::ProductId,
                                )
                                .to(Product::Table, Product::Id),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(
                    Table::drop()
                        .table(InventoryTransactionLine::Table)
                        .to_owned(),
                )
                .await?;
            manager
                .drop_table(Table::drop().table(InventoryTransaction::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum InventoryTransaction {
        Table,
        Id,
        Date,
        TypeId,
        Remark,
    }

    #[derive(DeriveIden)]
    pub(super) enum InventoryTransactionLine {
        Table,
        Id,
        InventoryTransactionId,
        ProductId,
        Price,
        Quantity,
        InTransitQuantity,
    }
}

mod m20160801_000005_create_receiving_tables {
    use super::m20160801_000001_create_enum_values_table::EnumValues;
    use super::m20160801_000002_create_master_data_tables::Product;
    use super::m20160801_000003_create_purchase_order_tables::{PurchaseOrder, PurchaseOrderLine};
    use super::m20160801_000004_create_inventory_transaction_tables::{
        InventoryTransaction, InventoryTransactionLine,
    };
    use super::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20160801_000005_create_receiving_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Receiving::Table)
                        .if_not_exists()
                        .col(id_column(Receiving::Id))
                        .col(
                            ColumnDef::new(Receiving::Date)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Receiving::Remark).text().null())
                        .col(ColumnDef::new(Receiving::StatusId).integer().not_null())
                        .col(ColumnDef::new(Receiving::PurchaseOrderId).integer().not_null())
                        .col(
                            ColumnDef::new(Receiving::InventoryTransactionId)
                                .integer()
                                .null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_receiving_status_id")
                                .from(Receiving::Table, Receiving::StatusId)
                                .to(EnumValues::Table, EnumValues::Id),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_receiving_purchase_order_id")
                                .from(Receiving::Table, Receiving::PurchaseOrderId)
                                .to(PurchaseOrder::Table, PurchaseOrder::Id),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_receiving_inventory_transaction_id")
                                .from(Receiving::Table, Receiving::InventoryTransactionId)
                                .to(InventoryTransaction::Table, InventoryTransaction::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ReceivingLine::Table)
                        .if_not_exists()
                        .col(id_column(ReceivingLine::Id))
                        .col(ColumnDef::new(ReceivingLine::ReceivingId).integer().not_null())
                        .col(ColumnDef::new(ReceivingLine::ProductId).integer().not_null())
                        .col(
                            ColumnDef::new(ReceivingLine::PurchaseOrderLineId)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ReceivingLine::InventoryTransactionLineId)
                                .integer()
                                .null(),
                        )
                        .col(amount_column(ReceivingLine::Quantity).null())
                        .col(amount_column(ReceivingLine::Price).not_null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_receiving_line_receiving_id")
                                .from(ReceivingLine::Table, ReceivingLine::ReceivingId)
                                .to(Receiving::Table, Receiving::Id),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_receiving_line_product_id")
                                .from(ReceivingLine::Table, ReceivingLine::ProductId)
                                .to(Product::Table, Product::Id),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_receiving_line_purchase_order_line_id")
                                .from(ReceivingLine::Table, ReceivingLine::PurchaseOrderLineId)
                                .to(PurchaseOrderLine::Table, PurchaseOrderLine::Id),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_receiving_line_inventory_transaction_line_id")
                                .from(
                                    ReceivingLine::Table,
                                    ReceivingLine::InventoryTransactionLineId,
                                )
                                .to(InventoryTransactionLine::Table, InventoryTransactionLine::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_receiving_purchase_order_id")
                        .table(Receiving::Table)
                        .col(Receiving::PurchaseOrderId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ReceivingLine::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Receiving::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Receiving {
        Table,
        Id,
        Date,
        Remark,
        StatusId,
        PurchaseOrderId,
        InventoryTransactionId,
    }

    #[derive(DeriveIden)]
    enum ReceivingLine {
        Table,
        Id,
        ReceivingId,
        ProductId,
        PurchaseOrderLineId,
        InventoryTransactionLineId,
        Quantity,
        Price,
    }
}

mod m20160801_000006_seed_enum_values {
    use super::m20160801_000001_create_enum_values_table::EnumValues;
    use super::*;
    use crate::entities::enum_values::codes;
    use sea_orm::ConnectionTrait;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20160801_000006_seed_enum_values"
        }
    }

    /// (type code, type display, [(value code, value display)])
    const SEED: &[(&str, &str, &[(&str, &str)])] = &[
        (
            codes::RECEIVING_STATUS,
            "Receiving Status",
            &[
                (codes::RECEIVING_DRAFT, "Draft"),
                (codes::RECEIVING_COMPLETE, "Complete"),
            ],
        ),
        (
            codes::INVENTORY_TRANSACTION_TYPE,
            "Inventory Transaction Type",
            &[
                (codes::PURCHASE_IN, "Purchase In"),
                (codes::SALES_OUT, "Sales Out"),
            ],
        ),
        (
            codes::PURCHASE_ORDER_STATUS,
            "Purchase Order Status",
            &[
                (codes::PURCHASE_ORDER_DRAFT, "Draft"),
                (codes::PURCHASE_ORDER_ISSUED, "Issued"),
            ],
        ),
    ];

    fn insert(type_id: Option<i32>, code: &str, display: &str) -> InsertStatement {
        Query::insert()
            .into_table(EnumValues::Table)
            .columns([EnumValues::TypeId, EnumValues::Code, EnumValues::Display])
            .values_panic([type_id.into(), code.into(), display.into()])
            .to_owned()
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            let db = manager.get_connection();
            let backend = manager.get_database_backend();

            for (type_code, type_display, values) in SEED {
                manager.exec_stmt(insert(None, type_code, type_display)).await?;

                let lookup = Query::select()
                    .column(EnumValues::Id)
                    .from(EnumValues::Table)
                    .and_where(Expr::col(EnumValues::Code).eq(*type_code))
                    .to_owned();
                let type_id: i32 = db
                    .query_one(backend.build(&lookup))
                    .await?
                    .ok_or_else(|| DbErr::RecordNotFound((*type_code).to_string()))?
                    .try_get("", "id")?;

                for (code, display) in values.iter() {
                    manager
                        .exec_stmt(insert(Some(type_id), code, display))
                        .await?;
                }
            }

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            for (type_code, _, values) in SEED {
                let mut seeded: Vec<&str> = values.iter().map(|(code, _)| *code).collect();
                seeded.push(*type_code);
                manager
                    .exec_stmt(
                        Query::delete()
                            .from_table(EnumValues::Table)
                            .and_where(Expr::col(EnumValues::Code).is_in(seeded))
                            .to_owned(),
                    )
                    .await?;
            }
            Ok(())
        }
    }
}

/// Connects to `db_url` and applies every pending migration.
pub async fn run_migration(db_url: &str) -> Result<()> {
    info!("Setting up database connection for migrations");

    let mut opt = ConnectOptions::new(db_url);
    opt.max_connections(2)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(30))
        .acquire_timeout(Duration::from_secs(30))
        .sqlx_logging(false);

    let db = Database::connect(opt).await?;

    info!("Running database migrations");

    match Migrator::up(&db, None).await {
        Ok(_) => {
            info!("Migrations completed successfully");
            Ok(())
        }
        Err(e) => {
            error!("Migration failed: {}", e);
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::enum_values::{self, codes};
    use sea_orm::DatabaseConnection;

    async fn memory_db() -> DatabaseConnection {
        let mut opt = ConnectOptions::new("sqlite::memory:");
        opt.max_connections(1).min_connections(1);
        Database::connect(opt).await.unwrap()
    }

    #[tokio::test]
    async fn migrations_seed_typed_enumerations() {
        let db = memory_db().await;
        Migrator::up(&db, None).await.unwrap();

        let statuses = enum_values::Entity::values_of_type(&db, codes::RECEIVING_STATUS)
            .await
            .unwrap();
        let status_codes: Vec<&str> = statuses.iter().map(|v| v.code.as_str()).collect();
        assert_eq!(
            status_codes,
            vec![codes::RECEIVING_DRAFT, codes::RECEIVING_COMPLETE]
        );

        let purchase_in = enum_values::Entity::find_one_by_code(&db, codes::PURCHASE_IN)
            .await
            .unwrap()
            .unwrap();
        let type_row =
            enum_values::Entity::find_one_by_code(&db, codes::INVENTORY_TRANSACTION_TYPE)
                .await
                .unwrap()
                .unwrap();
        assert_eq!(purchase_in.type_id, Some(type_row.id));
    }

    #[tokio::test]
    async fn migrations_roll_back_cleanly() {
        let db = memory_db().await;
        Migrator::up(&db, None).await.unwrap();
        Migrator::down(&db, None).await.unwrap();
        Migrator::up(&db, None).await.unwrap();
    }
}
