use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, Condition, DatabaseConnection, EntityTrait,
    IntoActiveModel, QueryFilter, QueryOrder,
};
use std::sync::Arc;
use tracing::{info, instrument};

use crate::{db::DatabaseAccess, entities::enum_values, errors::ServiceError};

/// Read access to the enumeration table; only the display label is editable.
#[derive(Clone)]
pub struct EnumValueService {
    db: DatabaseAccess,
}

impl EnumValueService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            db: DatabaseAccess::new(db),
        }
    }

    /// Values whose code or display contains `search`, optionally limited to
    /// one enumeration type.
    #[instrument(skip(self))]
    pub async fn list(
        &self,
        search: Option<&str>,
        type_code: Option<&str>,
    ) -> Result<Vec<enum_values::Model>, ServiceError> {
        let mut query = enum_values::Entity::find().order_by_asc(enum_values::Column::Id);

        if let Some(term) = search.map(str::trim).filter(|t| !t.is_empty()) {
            query = query.filter(
                Condition::any()
                    .add(enum_values::Column::Code.contains(term))
                    .add(enum_values::Column::Display.contains(term)),
            );
        }
        if let Some(type_code) = type_code {
            query = query.filter(enum_values::Entity::type_filter(type_code));
        }

        self.db
            .execute("enum_values.list", |db| query.all(db))
            .await
    }

    /// Renames the display label of value `id`. Codes and types are fixed.
    #[instrument(skip(self))]
    pub async fn update_display(
        &self,
        id: i32,
        display_label: &str,
    ) -> Result<enum_values::Model, ServiceError> {
        let display = display_label.trim();
        if display.is_empty() {
            return Err(ServiceError::ValidationError(
                "display must not be empty".to_string(),
            ));
        }

        let db = self.db.get_pool();
        let existing = enum_values::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Enumeration value {} not found", id)))?;

        let mut active = existing.into_active_model();
        active.display = Set(display.to_string());
        let updated = active.update(db).await?;

        info!(id, code = %updated.code, "Enumeration display updated");
        Ok(updated)
    }
}
