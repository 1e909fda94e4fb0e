use chrono::Utc;
use diesel::prelude::*;
use uuid::Uuid;

use super::{Storage, StorageError};
use crate::shared::models::schema::{businesses, document_versions, documents, users};
use crate::shared::models::{
    Business, BusinessUpdate, DbBusiness, DbDocument, DbDocumentVersion, DbUser, Document,
    DocumentUpdate, DocumentVersion, NewBusiness, NewDocument, NewUser, User,
};
use crate::shared::utils::DbPool;

impl From<diesel::result::Error> for StorageError {
    fn from(e: diesel::result::Error) -> Self {
        StorageError::Database(e.to_string())
    }
}

/// Diesel-backed gateway. Every call clones the pool handle and runs the
/// blocking query on the blocking thread pool.
pub struct DatabaseStorage {
    pool: DbPool,
}

impl DatabaseStorage {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn get_conn(
    pool: &DbPool,
) -> Result<diesel::r2d2::PooledConnection<diesel::r2d2::ConnectionManager<PgConnection>>, StorageError>
{
    pool.get().map_err(|e| StorageError::Database(e.to_string()))
}

async fn blocking<T, F>(pool: &DbPool, f: F) -> Result<T, StorageError>
where
    T: Send + 'static,
    F: FnOnce(&mut PgConnection) -> Result<T, StorageError> + Send + 'static,
{
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = get_conn(&pool)?;
        f(&mut conn)
    })
    .await
    .map_err(|e| StorageError::Internal(e.to_string()))?
}

#[async_trait::async_trait]
impl Storage for DatabaseStorage {
    async fn create_user(&self, user: NewUser) -> Result<User, StorageError> {
        blocking(&self.pool, move |conn| {
            let row = DbUser {
                id: Uuid::new_v4(),
                username: user.username,
                password: user.password,
                email: user.email,
                created_at: Utc::now(),
            };

            diesel::insert_into(users::table)
                .values(&row)
                .execute(conn)?;

            Ok(row.into())
        })
        .await
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, StorageError> {
        blocking(&self.pool, move |conn| {
            let row: Option<DbUser> = users::table.find(id).first(conn).optional()?;
            Ok(row.map(Into::into))
        })
        .await
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, StorageError> {
        let username = username.to_string();
        blocking(&self.pool, move |conn| {
            let row: Option<DbUser> = users::table
                .filter(users::username.eq(&username))
                .first(conn)
                .optional()?;
            Ok(row.map(Into::into))
        })
        .await
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, StorageError> {
        let email = email.to_string();
        blocking(&self.pool, move |conn| {
            let row: Option<DbUser> = users::table
                .filter(users::email.eq(&email))
                .first(conn)
                .optional()?;
            Ok(row.map(Into::into))
        })
        .await
    }

    async fn create_business(&self, business: NewBusiness) -> Result<Business, StorageError> {
        blocking(&self.pool, move |conn| {
            let now = Utc::now();
            let row = DbBusiness {
                id: Uuid::new_v4(),
                user_id: business.user_id,
                name: business.name,
                website: business.website,
                business_type: business.business_type.to_string(),
                jurisdictions: business
                    .jurisdictions
                    .iter()
                    .map(|j| j.to_string())
                    .collect(),
                data_practices: serde_json::to_value(&business.data_practices)
                    .unwrap_or(serde_json::Value::Null),
                created_at: now,
                updated_at: now,
            };

            diesel::insert_into(businesses::table)
                .values(&row)
                .execute(conn)?;

            Ok(row.into())
        })
        .await
    }

    async fn get_business(&self, id: Uuid) -> Result<Option<Business>, StorageError> {
        blocking(&self.pool, move |conn| {
            let row: Option<DbBusiness> = businesses::table.find(id).first(conn).optional()?;
            Ok(row.map(Into::into))
        })
        .await
    }

    async fn get_businesses_by_user(&self, user_id: Uuid) -> Result<Vec<Business>, StorageError> {
        blocking(&self.pool, move |conn| {
            let rows: Vec<DbBusiness> = businesses::table
                .filter(businesses::user_id.eq(user_id))
                .load(conn)?;
            Ok(rows.into_iter().map(Into::into).collect())
        })
        .await
    }

    async fn update_business(
        &self,
        id: Uuid,
        updates: BusinessUpdate,
    ) -> Result<Business, StorageError> {
        blocking(&self.pool, move |conn| {
            let mut row: DbBusiness = businesses::table
                .find(id)
                .first(conn)
                .optional()?
                .ok_or_else(|| StorageError::NotFound("Business not found".to_string()))?;

            if let Some(name) = updates.name {
                row.name = name;
            }
            if let Some(website) = updates.website {
                row.website = website;
            }
            if let Some(business_type) = updates.business_type {
                row.business_type = business_type.to_string();
            }
            if let Some(jurisdictions) = updates.jurisdictions {
                row.jurisdictions = jurisdictions.iter().map(|j| j.to_string()).collect();
            }
            if let Some(practices) = updates.data_practices {
                row.data_practices =
                    serde_json::to_value(&practices).unwrap_or(serde_json::Value::Null);
            }
            row.updated_at = Utc::now();

            diesel::update(businesses::table.find(id))
                .set(&row)
                .execute(conn)?;

            Ok(row.into())
        })
        .await
    }

    async fn get_document(&self, id: Uuid) -> Result<Option<Document>, StorageError> {
        blocking(&self.pool, move |conn| {
            let row: Option<DbDocument> = documents::table.find(id).first(conn).optional()?;
            Ok(row.map(Into::into))
        })
        .await
    }

    async fn get_documents_by_business(
        &self,
        business_id: Uuid,
    ) -> Result<Vec<Document>, StorageError> {
        blocking(&self.pool, move |conn| {
            let rows: Vec<DbDocument> = documents::table
                .filter(documents::business_id.eq(business_id))
                .load(conn)?;
            Ok(rows.into_iter().map(Into::into).collect())
        })
        .await
    }

    async fn create_document_with_initial_version(
        &self,
        document: NewDocument,
        changelog: &str,
    ) -> Result<(Document, DocumentVersion), StorageError> {
        let changelog = changelog.to_string();
        blocking(&self.pool, move |conn| {
            let now = Utc::now();
            let doc_row = DbDocument {
                id: Uuid::new_v4(),
                business_id: document.business_id,
                doc_type: document.doc_type.to_string(),
                title: document.title,
                content: document.content,
                version: 1,
                status: "draft".to_string(),
                metadata: document.metadata,
                created_at: now,
                updated_at: now,
            };
            let version_row = DbDocumentVersion {
                id: Uuid::new_v4(),
                document_id: doc_row.id,
                version: 1,
                content: doc_row.content.clone(),
                changelog: Some(changelog),
                created_at: now,
            };

            conn.transaction::<_, StorageError, _>(|conn| {
                diesel::insert_into(documents::table)
                    .values(&doc_row)
                    .execute(conn)?;
                diesel::insert_into(document_versions::table)
                    .values(&version_row)
                    .execute(conn)?;
                Ok(())
            })?;

            Ok((doc_row.into(), version_row.into()))
        })
        .await
    }

    async fn update_document(
        &self,
        id: Uuid,
        updates: DocumentUpdate,
    ) -> Result<Document, StorageError> {
        blocking(&self.pool, move |conn| {
            let mut row: DbDocument = documents::table
                .find(id)
                .first(conn)
                .optional()?
                .ok_or_else(|| StorageError::NotFound("Document not found".to_string()))?;

            if let Some(title) = updates.title {
                row.title = title;
            }
            if let Some(content) = updates.content {
                row.content = content;
            }
            if let Some(status) = updates.status {
                row.status = status.to_string();
            }
            if let Some(version) = updates.version {
                row.version = version;
            }
            if let Some(metadata) = updates.metadata {
                row.metadata = metadata;
            }
            row.updated_at = Utc::now();

            diesel::update(documents::table.find(id))
                .set(&row)
                .execute(conn)?;

            Ok(row.into())
        })
        .await
    }

    async fn delete_document(&self, id: Uuid) -> Result<(), StorageError> {
        // Version rows are left in place; the observed delete touches only
        // the document itself.
        blocking(&self.pool, move |conn| {
            diesel::delete(documents::table.find(id)).execute(conn)?;
            Ok(())
        })
        .await
    }

    async fn get_document_versions(
        &self,
        document_id: Uuid,
    ) -> Result<Vec<DocumentVersion>, StorageError> {
        blocking(&self.pool, move |conn| {
            let rows: Vec<DbDocumentVersion> = document_versions::table
                .filter(document_versions::document_id.eq(document_id))
                .order(document_versions::version.desc())
                .load(conn)?;
            Ok(rows.into_iter().map(Into::into).collect())
        })
        .await
    }

    async fn append_document_version(
        &self,
        document_id: Uuid,
        content: &str,
        changelog: &str,
    ) -> Result<(Document, DocumentVersion), StorageError> {
        let content = content.to_string();
        let changelog = changelog.to_string();
        blocking(&self.pool, move |conn| {
            conn.transaction::<_, StorageError, _>(|conn| {
                // Row lock on the parent document serializes concurrent
                // edits so version numbers stay contiguous.
                let mut doc: DbDocument = documents::table
                    .find(document_id)
                    .for_update()
                    .first(conn)
                    .optional()?
                    .ok_or_else(|| StorageError::NotFound("Document not found".to_string()))?;

                let latest: Option<i32> = document_versions::table
                    .filter(document_versions::document_id.eq(document_id))
                    .select(diesel::dsl::max(document_versions::version))
                    .first(conn)?;

                let now = Utc::now();
                let row = DbDocumentVersion {
                    id: Uuid::new_v4(),
                    document_id,
                    version: latest.unwrap_or(0) + 1,
                    content,
                    changelog: Some(changelog),
                    created_at: now,
                };

                diesel::insert_into(document_versions::table)
                    .values(&row)
                    .execute(conn)?;

                // The document row moves to the new version inside the same
                // transaction, under the same row lock, so readers never see
                // it pointing at anything but its newest version row.
                doc.content = row.content.clone();
                doc.version = row.version;
                doc.updated_at = now;
                diesel::update(documents::table.find(document_id))
                    .set(&doc)
                    .execute(conn)?;

                Ok((doc.into(), row.into()))
            })
        })
        .await
    }

    async fn get_latest_document_version(
        &self,
        document_id: Uuid,
    ) -> Result<Option<DocumentVersion>, StorageError> {
        blocking(&self.pool, move |conn| {
            let row: Option<DbDocumentVersion> = document_versions::table
                .filter(document_versions::document_id.eq(document_id))
                .order(document_versions::version.desc())
                .first(conn)
                .optional()?;
            Ok(row.map(Into::into))
        })
        .await
    }
}
