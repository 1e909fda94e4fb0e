pub mod database;
pub mod memory;

use async_trait::async_trait;
use uuid::Uuid;

use crate::shared::models::{
    Business, BusinessUpdate, Document, DocumentUpdate, DocumentVersion, NewBusiness, NewDocument,
    NewUser, User,
};

pub use database::DatabaseStorage;
pub use memory::MemStorage;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Database error: {0}")]
    Database(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Persistence gateway. Absent rows come back as `Ok(None)`, never as an
/// error. Multi-row invariants (document + version 1, next-version
/// assignment) are enforced inside the implementations so callers cannot
/// observe a half-written state.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn create_user(&self, user: NewUser) -> Result<User, StorageError>;
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, StorageError>;
    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, StorageError>;
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, StorageError>;

    async fn create_business(&self, business: NewBusiness) -> Result<Business, StorageError>;
    async fn get_business(&self, id: Uuid) -> Result<Option<Business>, StorageError>;
    async fn get_businesses_by_user(&self, user_id: Uuid) -> Result<Vec<Business>, StorageError>;
    async fn update_business(
        &self,
        id: Uuid,
        updates: BusinessUpdate,
    ) -> Result<Business, StorageError>;

    async fn get_document(&self, id: Uuid) -> Result<Option<Document>, StorageError>;
    async fn get_documents_by_business(
        &self,
        business_id: Uuid,
    ) -> Result<Vec<Document>, StorageError>;
    /// Inserts the document and its version-1 row as one atomic unit.
    async fn create_document_with_initial_version(
        &self,
        document: NewDocument,
        changelog: &str,
    ) -> Result<(Document, DocumentVersion), StorageError>;
    async fn update_document(
        &self,
        id: Uuid,
        updates: DocumentUpdate,
    ) -> Result<Document, StorageError>;
    async fn delete_document(&self, id: Uuid) -> Result<(), StorageError>;

    /// Versions ordered newest first.
    async fn get_document_versions(
        &self,
        document_id: Uuid,
    ) -> Result<Vec<DocumentVersion>, StorageError>;
    /// Assigns `max(version) + 1`, inserts the version row, and moves the
    /// document row to the new content and number, all in one atomic step.
    /// Two concurrent edits can never claim the same number, and the
    /// document row always matches its newest version row.
    async fn append_document_version(
        &self,
        document_id: Uuid,
        content: &str,
        changelog: &str,
    ) -> Result<(Document, DocumentVersion), StorageError>;
    async fn get_latest_document_version(
        &self,
        document_id: Uuid,
    ) -> Result<Option<DocumentVersion>, StorageError>;
}
