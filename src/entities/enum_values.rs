use sea_orm::entity::prelude::*;
use sea_orm::sea_query::Query;
use sea_orm::{Condition, QueryOrder};
use serde::{Deserialize, Serialize};

/// Well-known enumeration codes seeded by the migrator.
pub mod codes {
    pub const RECEIVING_STATUS: &str = "RECEIVING_STATUS";
    pub const RECEIVING_DRAFT: &str = "RECEIVING_DRAFT";
    pub const RECEIVING_COMPLETE: &str = "RECEIVING_COMPLETE";

    pub const INVENTORY_TRANSACTION_TYPE: &str = "INVENTORY_TRANSACTION_TYPE";
    pub const PURCHASE_IN: &str = "PURCHASE_IN";
    pub const SALES_OUT: &str = "SALES_OUT";

    pub const PURCHASE_ORDER_STATUS: &str = "PURCHASE_ORDER_STATUS";
    pub const PURCHASE_ORDER_DRAFT: &str = "PURCHASE_ORDER_DRAFT";
    pub const PURCHASE_ORDER_ISSUED: &str = "PURCHASE_ORDER_ISSUED";
}

/// A persisted, typed symbolic constant. Type rows have no `type_id`;
/// value rows point at their type row.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "enum_values")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub type_id: Option<i32>,
    #[sea_orm(unique)]
    pub code: String,
    pub display: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "Entity",
        from = "Column::TypeId",
        to = "Column::Id"
    )]
    Type,
}

impl ActiveModelBehavior for ActiveModel {}

impl Entity {
    /// Predicate selecting the values whose type row carries `type_code`.
    pub fn type_filter(type_code: &str) -> Condition {
        let type_ids = Query::select()
            .column(Column::Id)
            .from(Entity)
            .and_where(Column::Code.eq(type_code))
            .to_owned();

        Condition::all().add(Column::TypeId.in_subquery(type_ids))
    }

    /// Values of one enumeration type, ordered by id.
    pub async fn values_of_type<C: ConnectionTrait>(
        db: &C,
        type_code: &str,
    ) -> Result<Vec<Model>, DbErr> {
        Entity::find()
            .filter(Entity::type_filter(type_code))
            .order_by_asc(Column::Id)
            .all(db)
            .await
    }

    pub async fn find_one_by_code<C: ConnectionTrait>(
        db: &C,
        code: &str,
    ) -> Result<Option<Model>, DbErr> {
        Entity::find().filter(Column::Code.eq(code)).one(db).await
    }
}

impl Model {
    /// True when this value belongs to the type row `type_row`.
    pub fn is_of_type(&self, type_row: &Model) -> bool {
        self.type_id == Some(type_row.id)
    }
}
