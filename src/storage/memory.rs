use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;
use uuid::Uuid;

use super::{Storage, StorageError};
use crate::shared::models::{
    Business, BusinessUpdate, Document, DocumentStatus, DocumentUpdate, DocumentVersion,
    NewBusiness, NewDocument, NewUser, User,
};

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, User>,
    businesses: HashMap<Uuid, Business>,
    documents: HashMap<Uuid, Document>,
    versions: Vec<DocumentVersion>,
}

/// In-memory gateway used by tests and local development. The single mutex
/// is held across each whole operation, which also serializes version-number
/// assignment.
#[derive(Default)]
pub struct MemStorage {
    inner: Mutex<Inner>,
}

impl MemStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl Storage for MemStorage {
    async fn create_user(&self, user: NewUser) -> Result<User, StorageError> {
        let mut inner = self.inner.lock().unwrap();
        if inner
            .users
            .values()
            .any(|u| u.username == user.username || u.email == user.email)
        {
            return Err(StorageError::Database(
                "duplicate username or email".to_string(),
            ));
        }

        let row = User {
            id: Uuid::new_v4(),
            username: user.username,
            password: user.password,
            email: user.email,
            created_at: Utc::now(),
        };
        inner.users.insert(row.id, row.clone());
        Ok(row)
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, StorageError> {
        Ok(self.inner.lock().unwrap().users.get(&id).cloned())
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, StorageError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, StorageError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.users.values().find(|u| u.email == email).cloned())
    }

    async fn create_business(&self, business: NewBusiness) -> Result<Business, StorageError> {
        let now = Utc::now();
        let row = Business {
            id: Uuid::new_v4(),
            user_id: business.user_id,
            name: business.name,
            website: business.website,
            business_type: business.business_type,
            jurisdictions: business.jurisdictions,
            data_practices: business.data_practices,
            created_at: now,
            updated_at: now,
        };
        self.inner
            .lock()
            .unwrap()
            .businesses
            .insert(row.id, row.clone());
        Ok(row)
    }

    async fn get_business(&self, id: Uuid) -> Result<Option<Business>, StorageError> {
        Ok(self.inner.lock().unwrap().businesses.get(&id).cloned())
    }

    async fn get_businesses_by_user(&self, user_id: Uuid) -> Result<Vec<Business>, StorageError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .businesses
            .values()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn update_business(
        &self,
        id: Uuid,
        updates: BusinessUpdate,
    ) -> Result<Business, StorageError> {
        let mut inner = self.inner.lock().unwrap();
        let row = inner
            .businesses
            .get_mut(&id)
            .ok_or_else(|| StorageError::NotFound("Business not found".to_string()))?;

        if let Some(name) = updates.name {
            row.name = name;
        }
        if let Some(website) = updates.website {
            row.website = website;
        }
        if let Some(business_type) = updates.business_type {
            row.business_type = business_type;
        }
        if let Some(jurisdictions) = updates.jurisdictions {
            row.jurisdictions = jurisdictions;
        }
        if let Some(practices) = updates.data_practices {
            row.data_practices = practices;
        }
        row.updated_at = Utc::now();

        Ok(row.clone())
    }

    async fn get_document(&self, id: Uuid) -> Result<Option<Document>, StorageError> {
        Ok(self.inner.lock().unwrap().documents.get(&id).cloned())
    }

    async fn get_documents_by_business(
        &self,
        business_id: Uuid,
    ) -> Result<Vec<Document>, StorageError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .documents
            .values()
            .filter(|d| d.business_id == business_id)
            .cloned()
            .collect())
    }

    async fn create_document_with_initial_version(
        &self,
        document: NewDocument,
        changelog: &str,
    ) -> Result<(Document, DocumentVersion), StorageError> {
        let mut inner = self.inner.lock().unwrap();
        let now = Utc::now();

        let doc = Document {
            id: Uuid::new_v4(),
            business_id: document.business_id,
            doc_type: document.doc_type,
            title: document.title,
            content: document.content,
            version: 1,
            status: DocumentStatus::Draft,
            metadata: document.metadata,
            created_at: now,
            updated_at: now,
        };
        let version = DocumentVersion {
            id: Uuid::new_v4(),
            document_id: doc.id,
            version: 1,
            content: doc.content.clone(),
            changelog: Some(changelog.to_string()),
            created_at: now,
        };

        inner.documents.insert(doc.id, doc.clone());
        inner.versions.push(version.clone());
        Ok((doc, version))
    }

    async fn update_document(
        &self,
        id: Uuid,
        updates: DocumentUpdate,
    ) -> Result<Document, StorageError> {
        let mut inner = self.inner.lock().unwrap();
        let row = inner
            .documents
            .get_mut(&id)
            .ok_or_else(|| StorageError::NotFound("Document not found".to_string()))?;

        if let Some(title) = updates.title {
            row.title = title;
        }
        if let Some(content) = updates.content {
            row.content = content;
        }
        if let Some(status) = updates.status {
            row.status = status;
        }
        if let Some(version) = updates.version {
            row.version = version;
        }
        if let Some(metadata) = updates.metadata {
            row.metadata = metadata;
        }
        row.updated_at = Utc::now();

        Ok(row.clone())
    }

    async fn delete_document(&self, id: Uuid) -> Result<(), StorageError> {
        // Matches the database gateway: version rows are not cascaded.
        self.inner.lock().unwrap().documents.remove(&id);
        Ok(())
    }

    async fn get_document_versions(
        &self,
        document_id: Uuid,
    ) -> Result<Vec<DocumentVersion>, StorageError> {
        let inner = self.inner.lock().unwrap();
        let mut versions: Vec<DocumentVersion> = inner
            .versions
            .iter()
            .filter(|v| v.document_id == document_id)
            .cloned()
            .collect();
        versions.sort_by(|a, b| b.version.cmp(&a.version));
        Ok(versions)
    }

    async fn append_document_version(
        &self,
        document_id: Uuid,
        content: &str,
        changelog: &str,
    ) -> Result<(Document, DocumentVersion), StorageError> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.documents.contains_key(&document_id) {
            return Err(StorageError::NotFound("Document not found".to_string()));
        }

        let latest = inner
            .versions
            .iter()
            .filter(|v| v.document_id == document_id)
            .map(|v| v.version)
            .max()
            .unwrap_or(0);

        let row = DocumentVersion {
            id: Uuid::new_v4(),
            document_id,
            version: latest + 1,
            content: content.to_string(),
            changelog: Some(changelog.to_string()),
            created_at: Utc::now(),
        };
        inner.versions.push(row.clone());

        // Same mutex hold, so the document row can never lag behind the
        // version row it points at.
        let doc = inner
            .documents
            .get_mut(&document_id)
            .ok_or_else(|| StorageError::NotFound("Document not found".to_string()))?;
        doc.content = row.content.clone();
        doc.version = row.version;
        doc.updated_at = row.created_at;

        Ok((doc.clone(), row))
    }

    async fn get_latest_document_version(
        &self,
        document_id: Uuid,
    ) -> Result<Option<DocumentVersion>, StorageError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .versions
            .iter()
            .filter(|v| v.document_id == document_id)
            .max_by_key(|v| v.version)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::{BusinessType, DataPractices, DocumentType, Jurisdiction};

    fn sample_business() -> NewBusiness {
        NewBusiness {
            user_id: Uuid::new_v4(),
            name: "Acme SaaS".to_string(),
            website: Some("https://acme.example".to_string()),
            business_type: BusinessType::Saas,
            jurisdictions: vec![Jurisdiction::Gdpr],
            data_practices: DataPractices::default(),
        }
    }

    fn sample_document(business_id: Uuid) -> NewDocument {
        NewDocument {
            business_id,
            doc_type: DocumentType::PrivacyPolicy,
            title: "Privacy Policy".to_string(),
            content: "<h1>Privacy Policy</h1>".to_string(),
            metadata: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn document_creation_writes_version_one() {
        let storage = MemStorage::new();
        let business = storage.create_business(sample_business()).await.unwrap();

        let (doc, v1) = storage
            .create_document_with_initial_version(
                sample_document(business.id),
                "Initial generation",
            )
            .await
            .unwrap();

        assert_eq!(doc.version, 1);
        assert_eq!(v1.version, 1);
        assert_eq!(v1.document_id, doc.id);
        assert_eq!(v1.changelog.as_deref(), Some("Initial generation"));

        let latest = storage
            .get_latest_document_version(doc.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.id, v1.id);
    }

    #[tokio::test]
    async fn appended_versions_stay_contiguous() {
        let storage = MemStorage::new();
        let business = storage.create_business(sample_business()).await.unwrap();
        let (doc, _) = storage
            .create_document_with_initial_version(
                sample_document(business.id),
                "Initial generation",
            )
            .await
            .unwrap();

        let (_, v2) = storage
            .append_document_version(doc.id, "<p>second</p>", "edit")
            .await
            .unwrap();
        let (doc_after, v3) = storage
            .append_document_version(doc.id, "<p>third</p>", "edit")
            .await
            .unwrap();

        assert_eq!(v2.version, 2);
        assert_eq!(v3.version, 3);

        // The document row moved with the append.
        assert_eq!(doc_after.version, 3);
        assert_eq!(doc_after.content, "<p>third</p>");
        let stored = storage.get_document(doc.id).await.unwrap().unwrap();
        assert_eq!(stored.version, 3);
        assert_eq!(stored.content, "<p>third</p>");

        let versions = storage.get_document_versions(doc.id).await.unwrap();
        let numbers: Vec<i32> = versions.iter().map(|v| v.version).collect();
        assert_eq!(numbers, vec![3, 2, 1]);
    }

    #[tokio::test]
    async fn append_on_missing_document_is_not_found() {
        let storage = MemStorage::new();
        let err = storage
            .append_document_version(Uuid::new_v4(), "x", "edit")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn update_business_refreshes_updated_at() {
        let storage = MemStorage::new();
        let business = storage.create_business(sample_business()).await.unwrap();

        let updated = storage
            .update_business(
                business.id,
                BusinessUpdate {
                    name: Some("Acme Ltd".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.name, "Acme Ltd");
        assert!(updated.updated_at >= business.updated_at);

        let err = storage
            .update_business(Uuid::new_v4(), BusinessUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn update_business_can_clear_the_website() {
        let storage = MemStorage::new();
        let business = storage.create_business(sample_business()).await.unwrap();
        assert!(business.website.is_some());

        let updated = storage
            .update_business(
                business.id,
                BusinessUpdate {
                    website: Some(None),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.website, None);

        // An update that omits the field leaves it alone.
        let replaced = storage
            .update_business(
                business.id,
                BusinessUpdate {
                    website: Some(Some("https://acme.example/v2".to_string())),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let untouched = storage
            .update_business(business.id, BusinessUpdate::default())
            .await
            .unwrap();
        assert_eq!(replaced.website, untouched.website);
        assert_eq!(
            untouched.website.as_deref(),
            Some("https://acme.example/v2")
        );
    }

    #[tokio::test]
    async fn duplicate_usernames_are_rejected() {
        let storage = MemStorage::new();
        let user = NewUser {
            username: "founder".to_string(),
            password: "secret".to_string(),
            email: "founder@acme.example".to_string(),
        };
        storage.create_user(user.clone()).await.unwrap();
        assert!(storage.create_user(user).await.is_err());

        let found = storage.get_user_by_username("founder").await.unwrap();
        assert!(found.is_some());
    }
}
