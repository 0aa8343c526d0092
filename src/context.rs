use serde::{Deserialize, Serialize};

/// Who is acting, and on behalf of which organization.
///
/// Passed explicitly to every organization-scoped operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    pub organization_id: i32,
    pub user_id: String,
}

impl RequestContext {
    pub fn new(organization_id: i32, user_id: impl Into<String>) -> Self {
        Self {
            organization_id,
            user_id: user_id.into(),
        }
    }

    /// Context for maintenance jobs (seeding, migrations) acting without a user.
    pub fn system(organization_id: i32) -> Self {
        Self::new(organization_id, "system")
    }
}
