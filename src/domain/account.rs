use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Snapshot of an authenticated person as reported by upstream.
///
/// Flags are only ever changed by an administrator action or by a verified
/// membership payment; the portal never deletes an account.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    #[serde(alias = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub is_approved: bool,
    #[serde(default)]
    pub is_member: bool,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub is_suspended: bool,
    #[serde(default)]
    pub suspension_reason: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Account {
    pub fn owns(&self, owner_id: &str) -> bool {
        self.id == owner_id
    }
}

#[cfg(test)]
pub(crate) fn fixture(id: &str) -> Account {
    Account {
        id: id.to_string(),
        name: format!("user {id}"),
        email: format!("{id}@example.org"),
        phone: None,
        is_approved: true,
        is_member: false,
        is_admin: false,
        is_suspended: false,
        suspension_reason: None,
        created_at: None,
        updated_at: None,
    }
}
