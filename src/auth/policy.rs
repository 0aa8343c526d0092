/*!
 * # Access Policy
 *
 * One table maps every (resource, operation) pair the admin surface offers to
 * the role that grants it. Role names follow `<table>_<operation>`. The
 * `admin` role passes every check.
 */

use lazy_static::lazy_static;
use std::collections::HashMap;
use strum::{AsRefStr, Display, EnumIter, EnumString};

use super::Principal;
use crate::errors::ServiceError;

pub const ADMIN_ROLE: &str = "admin";

/// Field-level role: may see purchase prices and the totals derived from them.
pub const PURCHASE_PRICE_VIEW: &str = "purchase_price_view";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum Resource {
    Receiving,
    PurchaseOrder,
    EnumValues,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum Operation {
    View,
    Create,
    Edit,
    Delete,
}

lazy_static! {
    /// Role required per (resource, operation). Pairs absent from the table
    /// are reserved to administrators.
    pub static ref POLICY: HashMap<(Resource, Operation), &'static str> = {
        let mut table = HashMap::new();

        table.insert((Resource::Receiving, Operation::View), "receiving_view");
        table.insert((Resource::Receiving, Operation::Create), "receiving_create");
        table.insert((Resource::Receiving, Operation::Edit), "receiving_edit");
        table.insert((Resource::Receiving, Operation::Delete), "receiving_delete");

        table.insert((Resource::PurchaseOrder, Operation::View), "purchase_order_view");
        table.insert((Resource::PurchaseOrder, Operation::Create), "purchase_order_create");
        table.insert((Resource::PurchaseOrder, Operation::Edit), "purchase_order_edit");
        table.insert((Resource::PurchaseOrder, Operation::Delete), "purchase_order_delete");

        // enumeration rows are seeded, never created or removed through the API
        table.insert((Resource::EnumValues, Operation::View), "enum_values_view");
        table.insert((Resource::EnumValues, Operation::Edit), "enum_values_edit");

        table
    };
}

/// Role granting `operation` on `resource`, if any role does.
pub fn required_role(resource: Resource, operation: Operation) -> Option<&'static str> {
    POLICY.get(&(resource, operation)).copied()
}

/// Whether `principal` may perform `operation` on `resource`.
pub fn is_allowed(principal: &Principal, resource: Resource, operation: Operation) -> bool {
    if principal.is_admin() {
        return true;
    }
    required_role(resource, operation).map_or(false, |role| principal.has_role(role))
}

/// Checks access for an authenticated caller. An absent principal is
/// `Unauthorized`; a principal lacking the role is `Forbidden`.
pub fn authorize(
    principal: Option<&Principal>,
    resource: Resource,
    operation: Operation,
) -> Result<(), ServiceError> {
    let principal = principal
        .ok_or_else(|| ServiceError::Unauthorized("Authentication required".to_string()))?;

    if is_allowed(principal, resource, operation) {
        Ok(())
    } else {
        Err(ServiceError::Forbidden(format!(
            "{} may not {} {}",
            principal.user_id, operation, resource
        )))
    }
}

/// Whether prices and totals may be shown to `principal`.
pub fn can_view_purchase_price(principal: &Principal) -> bool {
    principal.is_admin() || principal.has_role(PURCHASE_PRICE_VIEW)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rstest::rstest;
    use strum::IntoEnumIterator;

    fn principal(roles: &[&str]) -> Principal {
        Principal {
            user_id: "clerk".to_string(),
            organization_id: 1,
            roles: roles.iter().map(|r| r.to_string()).collect(),
        }
    }

    #[rstest]
    #[case(Resource::Receiving, Operation::View, "receiving_view")]
    #[case(Resource::Receiving, Operation::Delete, "receiving_delete")]
    #[case(Resource::PurchaseOrder, Operation::Edit, "purchase_order_edit")]
    #[case(Resource::EnumValues, Operation::View, "enum_values_view")]
    fn role_names_follow_table_and_operation(
        #[case] resource: Resource,
        #[case] operation: Operation,
        #[case] role: &str,
    ) {
        assert_eq!(required_role(resource, operation), Some(role));
        assert_eq!(format!("{}_{}", resource, operation), role);
    }

    #[test]
    fn admin_passes_every_check() {
        let admin = principal(&[ADMIN_ROLE]);
        for resource in Resource::iter() {
            for operation in Operation::iter() {
                assert!(authorize(Some(&admin), resource, operation).is_ok());
            }
        }
    }

    #[test]
    fn missing_principal_is_unauthorized() {
        assert_matches!(
            authorize(None, Resource::Receiving, Operation::View),
            Err(ServiceError::Unauthorized(_))
        );
    }

    #[test]
    fn missing_role_is_forbidden() {
        let viewer = principal(&["receiving_view"]);
        assert!(authorize(Some(&viewer), Resource::Receiving, Operation::View).is_ok());
        assert_matches!(
            authorize(Some(&viewer), Resource::Receiving, Operation::Edit),
            Err(ServiceError::Forbidden(_))
        );
    }

    #[test]
    fn enum_values_cannot_be_created_by_role() {
        assert_eq!(required_role(Resource::EnumValues, Operation::Create), None);
        let editor = principal(&["enum_values_edit", "enum_values_create"]);
        assert!(!is_allowed(&editor, Resource::EnumValues, Operation::Create));
    }

    #[test]
    fn price_visibility_needs_its_own_role() {
        assert!(!can_view_purchase_price(&principal(&["receiving_view"])));
        assert!(can_view_purchase_price(&principal(&[PURCHASE_PRICE_VIEW])));
        assert!(can_view_purchase_price(&principal(&[ADMIN_ROLE])));
    }
}
