//! Generic persistence helpers shared by the services and the seed binary.
//!
//! Entities opt in through small traits naming the columns a helper needs.
//! Organization scoping is applied whenever the entity declares an
//! organization column; the acting organization always comes from an explicit
//! [`RequestContext`].

use sea_orm::sea_query::SelectStatement;
use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait,
    IntoActiveModel, QueryFilter, QueryOrder, QuerySelect, Select, TransactionTrait,
};
use tracing::{debug, instrument};

use crate::context::RequestContext;
use crate::entities::{product, purchase_order, receiving, supplier};
use crate::errors::ServiceError;

/// Width of generated business codes.
pub const CODE_WIDTH: usize = 6;

/// An entity with an integer surrogate key and an optional organization column.
pub trait ScopedEntity: EntityTrait {
    fn id_column() -> Self::Column;

    /// `None` for entities shared across organizations.
    fn organization_column() -> Option<Self::Column> {
        None
    }

    fn scoped(ctx: &RequestContext) -> Select<Self> {
        let query = Self::find();
        match Self::organization_column() {
            Some(column) => query.filter(column.eq(ctx.organization_id)),
            None => query,
        }
    }
}

pub trait HasCode: ScopedEntity {
    fn code_of(model: &Self::Model) -> &str;
}

pub trait HasName: ScopedEntity {
    fn name_column() -> Self::Column;
}

pub trait HasExternalId: ScopedEntity {
    fn external_id_column() -> Self::Column;
}

/// Next business code: the code of the newest row in scope plus one,
/// zero-padded to six digits. `000001` when the scope is empty.
#[instrument(skip(db))]
pub async fn next_code<E, C>(db: &C, ctx: &RequestContext) -> Result<String, ServiceError>
where
    E: HasCode,
    C: ConnectionTrait,
{
    let latest = E::scoped(ctx)
        .order_by_desc(E::id_column())
        .one(db)
        .await
        .map_err(ServiceError::db_error)?;

    let next = match latest {
        None => 1,
        Some(model) => {
            let code = E::code_of(&model);
            let current: u64 = code.trim().parse().map_err(|_| {
                ServiceError::ValidationError(format!("code '{}' is not numeric", code))
            })?;
            current + 1
        }
    };

    Ok(format!("{:0width$}", next, width = CODE_WIDTH))
}

pub async fn get_by_external_id<E, C>(
    db: &C,
    ctx: &RequestContext,
    external_id: &str,
) -> Result<Option<E::Model>, ServiceError>
where
    E: HasExternalId,
    C: ConnectionTrait,
{
    E::scoped(ctx)
        .filter(E::external_id_column().eq(external_id))
        .one(db)
        .await
        .map_err(ServiceError::db_error)
}

/// First row in scope whose name equals `name`.
pub async fn get_by_name<E, C>(
    db: &C,
    ctx: &RequestContext,
    name: &str,
) -> Result<Option<E::Model>, ServiceError>
where
    E: HasName,
    C: ConnectionTrait,
{
    E::scoped(ctx)
        .filter(E::name_column().eq(name))
        .order_by_asc(E::id_column())
        .one(db)
        .await
        .map_err(ServiceError::db_error)
}

/// Inserts every model and commits once. Nothing is written if any insert
/// fails.
#[instrument(skip(db, models), fields(count = models.len()))]
pub async fn save_objects_commit<A, C>(
    db: &C,
    models: Vec<A>,
) -> Result<Vec<<A::Entity as EntityTrait>::Model>, ServiceError>
where
    A: ActiveModelTrait + ActiveModelBehavior + Send,
    <A::Entity as EntityTrait>::Model: IntoActiveModel<A>,
    C: TransactionTrait,
{
    let txn = db.begin().await.map_err(ServiceError::db_error)?;

    let mut saved = Vec::with_capacity(models.len());
    for model in models {
        saved.push(model.insert(&txn).await.map_err(ServiceError::db_error)?);
    }

    txn.commit().await.map_err(ServiceError::db_error)?;
    debug!(saved = saved.len(), "Objects committed");
    Ok(saved)
}

/// Deletes one row by id. `NotFound` if no such row exists.
pub async fn delete_by_id<E, C>(db: &C, id: i32) -> Result<(), ServiceError>
where
    E: ScopedEntity,
    C: ConnectionTrait,
{
    let result = E::delete_many()
        .filter(E::id_column().eq(id))
        .exec(db)
        .await
        .map_err(ServiceError::db_error)?;

    if result.rows_affected == 0 {
        return Err(ServiceError::NotFound(format!(
            "{} {} not found",
            E::default().table_name(),
            id
        )));
    }
    Ok(())
}

/// All rows owned by the acting organization.
pub async fn filter_by_organization<E, C>(
    db: &C,
    ctx: &RequestContext,
) -> Result<Vec<E::Model>, ServiceError>
where
    E: ScopedEntity,
    C: ConnectionTrait,
{
    if E::organization_column().is_none() {
        return Err(ServiceError::InvalidOperation(format!(
            "{} is not organization scoped",
            E::default().table_name()
        )));
    }

    E::scoped(ctx)
        .order_by_asc(E::id_column())
        .all(db)
        .await
        .map_err(ServiceError::db_error)
}

/// Materializes the rows whose ids are returned by `id_query`.
///
/// The statement must project a column named `id`.
pub async fn find_by_id_query<E, C>(
    db: &C,
    id_query: &SelectStatement,
) -> Result<Vec<E::Model>, ServiceError>
where
    E: ScopedEntity,
    C: ConnectionTrait,
{
    let stmt = db.get_database_backend().build(id_query);
    let rows = db.query_all(stmt).await.map_err(ServiceError::db_error)?;

    let ids = rows
        .iter()
        .map(|row| row.try_get::<i32>("", "id"))
        .collect::<Result<Vec<_>, _>>()
        .map_err(ServiceError::db_error)?;

    if ids.is_empty() {
        return Ok(Vec::new());
    }

    E::find()
        .filter(E::id_column().is_in(ids))
        .order_by_asc(E::id_column())
        .all(db)
        .await
        .map_err(ServiceError::db_error)
}

/// Current maximum id plus one, `1` for an empty table.
pub async fn next_id<E, C>(db: &C) -> Result<i32, ServiceError>
where
    E: ScopedEntity,
    C: ConnectionTrait,
{
    let current: Option<Option<i32>> = E::find()
        .select_only()
        .column_as(E::id_column().max(), "max_id")
        .into_tuple()
        .one(db)
        .await
        .map_err(ServiceError::db_error)?;

    Ok(current.flatten().map_or(1, |max| max + 1))
}

impl ScopedEntity for supplier::Entity {
    fn id_column() -> Self::Column {
        supplier::Column::Id
    }

    fn organization_column() -> Option<Self::Column> {
        Some(supplier::Column::OrganizationId)
    }
}

impl HasCode for supplier::Entity {
    fn code_of(model: &supplier::Model) -> &str {
        &model.code
    }
}

impl HasName for supplier::Entity {
    fn name_column() -> Self::Column {
        supplier::Column::Name
    }
}

impl HasExternalId for supplier::Entity {
    fn external_id_column() -> Self::Column {
        supplier::Column::ExternalId
    }
}

impl ScopedEntity for product::Entity {
    fn id_column() -> Self::Column {
        product::Column::Id
    }

    fn organization_column() -> Option<Self::Column> {
        Some(product::Column::OrganizationId)
    }
}

impl HasCode for product::Entity {
    fn code_of(model: &product::Model) -> &str {
        &model.code
    }
}

impl HasName for product::Entity {
    fn name_column() -> Self::Column {
        product::Column::Name
    }
}

impl HasExternalId for product::Entity {
    fn external_id_column() -> Self::Column {
        product::Column::ExternalId
    }
}

impl ScopedEntity for purchase_order::Entity {
    fn id_column() -> Self::Column {
        purchase_order::Column::Id
    }

    fn organization_column() -> Option<Self::Column> {
        Some(purchase_order::Column::OrganizationId)
    }
}

impl HasCode for purchase_order::Entity {
    fn code_of(model: &purchase_order::Model) -> &str {
        &model.code
    }
}

impl ScopedEntity for crate::entities::enum_values::Entity {
    fn id_column() -> Self::Column {
        crate::entities::enum_values::Column::Id
    }
}

/// Receivings carry no organization of their own; they belong to the
/// organization of their purchase order.
impl ScopedEntity for receiving::Entity {
    fn id_column() -> Self::Column {
        receiving::Column::Id
    }

    fn scoped(ctx: &RequestContext) -> Select<Self> {
        receiving::Entity::find()
            .inner_join(purchase_order::Entity)
            .filter(purchase_order::Column::OrganizationId.eq(ctx.organization_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{establish_connection_with_config, run_migrations, DbConfig, DbPool};
    use crate::entities::enum_values;
    use sea_orm::sea_query::Query;
    use sea_orm::Set;

    async fn memory_pool() -> DbPool {
        let config = DbConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            min_connections: 1,
            ..Default::default()
        };
        let pool = establish_connection_with_config(&config).await.unwrap();
        run_migrations(&pool).await.unwrap();
        pool
    }

    fn supplier_row(code: &str, name: &str, org: i32) -> supplier::ActiveModel {
        supplier::ActiveModel {
            code: Set(code.to_string()),
            name: Set(name.to_string()),
            external_id: Set(Some(format!("ext-{code}-{org}"))),
            organization_id: Set(Some(org)),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn next_code_starts_at_one() {
        let db = memory_pool().await;
        let code = next_code::<supplier::Entity, _>(&db, &RequestContext::system(1))
            .await
            .unwrap();
        assert_eq!(code, "000001");
    }

    #[tokio::test]
    async fn next_code_follows_latest_row_of_the_organization() {
        let db = memory_pool().await;
        save_objects_commit(
            &db,
            vec![
                supplier_row("000007", "north", 1),
                supplier_row("000041", "south", 2),
                supplier_row("000008", "east", 1),
            ],
        )
        .await
        .unwrap();

        let org1 = next_code::<supplier::Entity, _>(&db, &RequestContext::system(1))
            .await
            .unwrap();
        let org2 = next_code::<supplier::Entity, _>(&db, &RequestContext::system(2))
            .await
            .unwrap();
        assert_eq!(org1, "000009");
        assert_eq!(org2, "000042");
    }

    #[tokio::test]
    async fn non_numeric_code_is_a_validation_error() {
        let db = memory_pool().await;
        save_objects_commit(&db, vec![supplier_row("ACME", "acme", 1)])
            .await
            .unwrap();

        let result = next_code::<supplier::Entity, _>(&db, &RequestContext::system(1)).await;
        assert!(matches!(result, Err(ServiceError::ValidationError(_))));
    }

    #[tokio::test]
    async fn lookups_respect_the_organization() {
        let db = memory_pool().await;
        save_objects_commit(
            &db,
            vec![supplier_row("000001", "shared", 1), supplier_row("000001", "shared", 2)],
        )
        .await
        .unwrap();

        let ctx = RequestContext::system(2);
        let by_name = get_by_name::<supplier::Entity, _>(&db, &ctx, "shared")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_name.organization_id, Some(2));

        let by_ext = get_by_external_id::<supplier::Entity, _>(&db, &ctx, "ext-000001-1")
            .await
            .unwrap();
        assert!(by_ext.is_none());

        let listed = filter_by_organization::<supplier::Entity, _>(&db, &ctx)
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test]
    async fn filter_by_organization_rejects_unscoped_entities() {
        let db = memory_pool().await;
        let result =
            filter_by_organization::<enum_values::Entity, _>(&db, &RequestContext::system(1))
                .await;
        assert!(matches!(result, Err(ServiceError::InvalidOperation(_))));
    }

    #[tokio::test]
    async fn delete_by_id_removes_row_and_reports_missing() {
        let db = memory_pool().await;
        let saved = save_objects_commit(&db, vec![supplier_row("000001", "gone", 1)])
            .await
            .unwrap();

        delete_by_id::<supplier::Entity, _>(&db, saved[0].id)
            .await
            .unwrap();
        assert!(supplier::Entity::find_by_id(saved[0].id)
            .one(&db)
            .await
            .unwrap()
            .is_none());

        let again = delete_by_id::<supplier::Entity, _>(&db, saved[0].id).await;
        assert!(matches!(again, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn id_query_materializes_matching_rows() {
        let db = memory_pool().await;

        let ids = Query::select()
            .column(enum_values::Column::Id)
            .from(enum_values::Entity)
            .cond_where(enum_values::Entity::type_filter("RECEIVING_STATUS"))
            .to_owned();

        let rows = find_by_id_query::<enum_values::Entity, _>(&db, &ids)
            .await
            .unwrap();
        let codes: Vec<&str> = rows.iter().map(|r| r.code.as_str()).collect();
        assert_eq!(codes, vec!["RECEIVING_DRAFT", "RECEIVING_COMPLETE"]);
    }

    #[tokio::test]
    async fn next_id_is_max_plus_one() {
        let db = memory_pool().await;
        assert_eq!(next_id::<supplier::Entity, _>(&db).await.unwrap(), 1);

        let saved = save_objects_commit(
            &db,
            vec![supplier_row("000001", "a", 1), supplier_row("000002", "b", 1)],
        )
        .await
        .unwrap();
        let max = saved.iter().map(|s| s.id).max().unwrap();
        assert_eq!(next_id::<supplier::Entity, _>(&db).await.unwrap(), max + 1);
    }
}
