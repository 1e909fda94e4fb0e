use std::sync::Arc;

use chrono::Utc;
use log::info;
use uuid::Uuid;

use super::ServiceError;
use crate::llm::{GeneratedDocument, GenerationClient};
use crate::shared::models::{Document, DocumentType, NewDocument};
use crate::storage::Storage;

/// Orchestrates the generate and edit flows. Storage and the generation
/// client are injected at construction so tests can run against the
/// in-memory gateway and a scripted provider.
pub struct DocumentService {
    storage: Arc<dyn Storage>,
    generator: GenerationClient,
}

impl DocumentService {
    pub fn new(storage: Arc<dyn Storage>, generator: GenerationClient) -> Self {
        Self { storage, generator }
    }

    /// Generates one document for a business and persists it together with
    /// its version-1 row. All-or-nothing: a generation failure leaves no
    /// partial document behind.
    pub async fn generate_document(
        &self,
        business_id: Uuid,
        doc_type: DocumentType,
    ) -> Result<(Document, GeneratedDocument), ServiceError> {
        let business = self
            .storage
            .get_business(business_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Business not found".to_string()))?;

        let generated = self.generator.generate(&business, doc_type).await?;

        let metadata = serde_json::json!({
            "compliance": generated.compliance,
            "generatedAt": Utc::now().to_rfc3339(),
            "aiModel": self.generator.model(),
        });

        let (document, _) = self
            .storage
            .create_document_with_initial_version(
                NewDocument {
                    business_id,
                    doc_type,
                    title: doc_type.title().to_string(),
                    content: generated.content.clone(),
                    metadata,
                },
                "Initial generation",
            )
            .await?;

        info!(
            "Generated {} for business {} as document {}",
            doc_type, business_id, document.id
        );

        Ok((document, generated))
    }

    /// Replaces the document content and appends the next version row. Both
    /// happen in one atomic storage step, so concurrent edits keep the
    /// sequence contiguous and the document row never trails its newest
    /// version.
    pub async fn update_document_content(
        &self,
        document_id: Uuid,
        content: String,
        changelog: &str,
    ) -> Result<Document, ServiceError> {
        if changelog.trim().is_empty() {
            return Err(ServiceError::Validation(
                "changelog must not be empty".to_string(),
            ));
        }

        let (document, version) = self
            .storage
            .append_document_version(document_id, &content, changelog)
            .await?;

        info!(
            "Document {} updated to version {}",
            document_id, version.version
        );

        Ok(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{GenerationError, LlmProvider};
    use crate::shared::models::{
        BusinessType, DataPractices, Jurisdiction, NewBusiness,
    };
    use crate::storage::MemStorage;
    use async_trait::async_trait;

    struct ScriptedProvider {
        reply: Result<String, String>,
    }

    impl ScriptedProvider {
        fn replying(reply: serde_json::Value) -> Self {
            Self {
                reply: Ok(reply.to_string()),
            }
        }

        fn failing(message: &str) -> Self {
            Self {
                reply: Err(message.to_string()),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn chat(&self, _system: &str, _user: &str) -> Result<String, GenerationError> {
            self.reply
                .clone()
                .map_err(GenerationError::Upstream)
        }
    }

    fn well_formed_reply() -> serde_json::Value {
        serde_json::json!({
            "content": "<h1>Privacy Policy</h1><p>We respect the right to rectification.</p>",
            "compliance": {"gdpr": true, "ccpa": false, "dpdp": false},
            "recommendations": ["Review retention periods annually"]
        })
    }

    async fn service_with(
        provider: ScriptedProvider,
    ) -> (DocumentService, Arc<MemStorage>, Uuid) {
        let storage = Arc::new(MemStorage::new());
        let business = storage
            .create_business(NewBusiness {
                user_id: Uuid::new_v4(),
                name: "Acme SaaS".to_string(),
                website: Some("https://acme.example".to_string()),
                business_type: BusinessType::Saas,
                jurisdictions: vec![Jurisdiction::Gdpr],
                data_practices: DataPractices::default(),
            })
            .await
            .unwrap();

        let generator = GenerationClient::new(Arc::new(provider), "gpt-4o".to_string());
        let service = DocumentService::new(storage.clone(), generator);
        (service, storage, business.id)
    }

    #[tokio::test]
    async fn generation_persists_document_and_version_one() {
        let (service, storage, business_id) =
            service_with(ScriptedProvider::replying(well_formed_reply())).await;

        let (document, generated) = service
            .generate_document(business_id, DocumentType::PrivacyPolicy)
            .await
            .unwrap();

        assert_eq!(document.content, generated.content);
        assert_eq!(document.title, "Privacy Policy");
        assert_eq!(document.version, 1);
        assert_eq!(document.metadata["aiModel"], "gpt-4o");
        assert_eq!(document.metadata["compliance"]["gdpr"], true);

        let documents = storage
            .get_documents_by_business(business_id)
            .await
            .unwrap();
        assert_eq!(documents.len(), 1);

        let versions = storage.get_document_versions(document.id).await.unwrap();
        assert_eq!(versions.len(), 1);
        assert_eq!(versions[0].version, 1);
        assert_eq!(versions[0].changelog.as_deref(), Some("Initial generation"));
        assert_eq!(versions[0].content, document.content);
    }

    #[tokio::test]
    async fn failed_generation_persists_nothing() {
        let (service, storage, business_id) =
            service_with(ScriptedProvider::failing("model unavailable")).await;

        let err = service
            .generate_document(business_id, DocumentType::TermsOfService)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Generation(_)));

        let documents = storage
            .get_documents_by_business(business_id)
            .await
            .unwrap();
        assert!(documents.is_empty());
    }

    #[tokio::test]
    async fn unknown_business_is_not_found() {
        let (service, _, _) =
            service_with(ScriptedProvider::replying(well_formed_reply())).await;

        let err = service
            .generate_document(Uuid::new_v4(), DocumentType::PrivacyPolicy)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn sequential_edits_produce_versions_two_then_three() {
        let (service, storage, business_id) =
            service_with(ScriptedProvider::replying(well_formed_reply())).await;
        let (document, _) = service
            .generate_document(business_id, DocumentType::PrivacyPolicy)
            .await
            .unwrap();

        let after_first = service
            .update_document_content(document.id, "<p>second</p>".to_string(), "tightened wording")
            .await
            .unwrap();
        assert_eq!(after_first.version, 2);

        let latest = storage
            .get_latest_document_version(document.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.version, 2);
        assert_eq!(latest.content, "<p>second</p>");

        let after_second = service
            .update_document_content(document.id, "<p>third</p>".to_string(), "legal review")
            .await
            .unwrap();
        assert_eq!(after_second.version, 3);
        assert_eq!(after_second.content, "<p>third</p>");

        let latest = storage
            .get_latest_document_version(document.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.version, 3);
    }

    #[tokio::test]
    async fn blank_changelog_rejects_the_edit_untouched() {
        let (service, storage, business_id) =
            service_with(ScriptedProvider::replying(well_formed_reply())).await;
        let (document, _) = service
            .generate_document(business_id, DocumentType::PrivacyPolicy)
            .await
            .unwrap();

        let err = service
            .update_document_content(document.id, "<p>never stored</p>".to_string(), "   ")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        let unchanged = storage.get_document(document.id).await.unwrap().unwrap();
        assert_eq!(unchanged.content, document.content);
        assert_eq!(unchanged.version, 1);

        let versions = storage.get_document_versions(document.id).await.unwrap();
        assert_eq!(versions.len(), 1);
    }

    #[tokio::test]
    async fn terms_title_capitalizes_every_word() {
        let (service, _, business_id) =
            service_with(ScriptedProvider::replying(well_formed_reply())).await;

        let (document, _) = service
            .generate_document(business_id, DocumentType::TermsOfService)
            .await
            .unwrap();
        assert_eq!(document.title, "Terms Of Service");
    }
}
