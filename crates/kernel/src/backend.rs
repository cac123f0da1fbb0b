use async_trait::async_trait;
use serde::Serialize;

use crate::error::ProvisionError;
use crate::settings::Secret;

/// Authorization record tying a role to the database it applies to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct RoleGrant {
    pub role: String,
    pub db: String,
}

/// Account to create on the target database.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub secret: Secret,
    pub roles: Vec<RoleGrant>,
}

/// Administrative handle to a document database engine.
///
/// Every call names the database it acts on; nothing is selected implicitly.
/// Create calls report duplicates as [`ProvisionError::AlreadyExists`] and
/// leave every other failure as [`ProvisionError::Backend`].
#[async_trait]
pub trait AdminBackend: Send + Sync {
    /// Create a user holding exactly `user.roles`.
    async fn create_user(&self, database: &str, user: &NewUser) -> Result<(), ProvisionError>;

    /// Create an empty collection.
    async fn create_collection(&self, database: &str, name: &str) -> Result<(), ProvisionError>;

    /// Grants held by `username`, or `None` when the user does not exist.
    async fn user_grants(
        &self,
        database: &str,
        username: &str,
    ) -> Result<Option<Vec<RoleGrant>>, ProvisionError>;

    async fn collection_names(&self, database: &str) -> Result<Vec<String>, ProvisionError>;

    async fn count_documents(&self, database: &str, collection: &str)
        -> Result<u64, ProvisionError>;
}
