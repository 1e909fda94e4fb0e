use crate::shared::models::{Business, DocumentType, Jurisdiction};

pub const GDPR_CLAUSE: &str = "- GDPR compliance: Include right to access, rectification, erasure, data portability, and consent withdrawal";
pub const CCPA_CLAUSE: &str = "- CCPA compliance: Include California resident rights, opt-out mechanisms, and non-discrimination clauses";
pub const DPDP_CLAUSE: &str = "- DPDP Act compliance: Include India-specific data processing rights and consent mechanisms";

const PRIVACY_POLICY_SECTIONS: &str = "Privacy Policy must include:
- Data collection practices
- Purpose of data processing
- Legal basis for processing
- Data sharing and third-party services
- Data retention periods
- User rights and how to exercise them
- Contact information for privacy concerns
- Cookie policy (if applicable)
- International data transfers
- Changes to privacy policy";

const TERMS_OF_SERVICE_SECTIONS: &str = "Terms of Service must include:
- Service description and acceptable use
- User responsibilities and prohibited activities
- Intellectual property rights
- Payment terms (if applicable)
- Service availability and modifications
- Limitation of liability
- Dispute resolution and governing law
- Termination conditions
- Contact information for legal matters";

/// Builds the user message sent to the completion API. Pure and
/// deterministic: the same business and document type always produce the
/// same string.
pub fn build_prompt(business: &Business, doc_type: DocumentType) -> String {
    let website = business.website.as_deref().unwrap_or("Not provided");
    let jurisdictions = if business.jurisdictions.is_empty() {
        "Not specified".to_string()
    } else {
        business
            .jurisdictions
            .iter()
            .map(|j| j.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    };
    let practices =
        serde_json::to_string(&business.data_practices).unwrap_or_else(|_| "{}".to_string());

    let mut prompt = format!(
        "Generate a comprehensive {} for the following business:\n\n\
         Business Information:\n\
         - Company Name: {}\n\
         - Website: {}\n\
         - Business Type: {}\n\
         - Operating Jurisdictions: {}\n\
         - Data Practices: {}\n\n\
         Requirements:\n\
         1. The document must be legally compliant for the specified jurisdictions\n\
         2. Include specific clauses for the business type and data practices\n\
         3. Use clear, professional language suitable for a startup\n\
         4. Include all necessary legal disclaimers and user rights\n\
         5. Address data collection, processing, storage, and sharing practices\n\
         6. Include contact information sections using the provided business details\n\n\
         Jurisdiction-specific requirements:\n",
        doc_type.spaced(),
        business.name,
        website,
        business.business_type,
        jurisdictions,
        practices,
    );

    // One fixed clause per jurisdiction actually selected.
    if business.jurisdictions.contains(&Jurisdiction::Gdpr) {
        prompt.push_str(GDPR_CLAUSE);
        prompt.push('\n');
    }
    if business.jurisdictions.contains(&Jurisdiction::Ccpa) {
        prompt.push_str(CCPA_CLAUSE);
        prompt.push('\n');
    }
    if business.jurisdictions.contains(&Jurisdiction::Dpdp) {
        prompt.push_str(DPDP_CLAUSE);
        prompt.push('\n');
    }

    let sections = match doc_type {
        DocumentType::PrivacyPolicy => PRIVACY_POLICY_SECTIONS,
        DocumentType::TermsOfService => TERMS_OF_SERVICE_SECTIONS,
    };

    prompt.push_str("\nDocument Type Specific Requirements:\n");
    prompt.push_str(sections);
    prompt.push_str(
        "\n\nPlease respond with a JSON object in the following format:\n\
         {\n\
         \x20 \"content\": \"The complete legal document in HTML format with proper headings, paragraphs, and lists\",\n\
         \x20 \"compliance\": {\n\
         \x20   \"gdpr\": boolean,\n\
         \x20   \"ccpa\": boolean,\n\
         \x20   \"dpdp\": boolean\n\
         \x20 },\n\
         \x20 \"recommendations\": [\"Array of recommendations for improving compliance or legal protection\"]\n\
         }\n\n\
         Ensure the content is comprehensive, legally sound, and tailored to the specific business and jurisdictions provided.",
    );

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::{BusinessType, DataPractices};
    use chrono::Utc;
    use uuid::Uuid;

    fn business(jurisdictions: Vec<Jurisdiction>, website: Option<&str>) -> Business {
        let now = Utc::now();
        Business {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            name: "Acme SaaS".to_string(),
            website: website.map(|w| w.to_string()),
            business_type: BusinessType::Saas,
            jurisdictions,
            data_practices: DataPractices::default(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn prompt_is_deterministic() {
        let b = business(vec![Jurisdiction::Gdpr, Jurisdiction::Ccpa], Some("https://acme.example"));
        let first = build_prompt(&b, DocumentType::PrivacyPolicy);
        let second = build_prompt(&b, DocumentType::PrivacyPolicy);
        assert_eq!(first, second);
    }

    #[test]
    fn jurisdiction_clauses_track_selected_tags() {
        let b = business(vec![Jurisdiction::Gdpr, Jurisdiction::Dpdp], None);
        let prompt = build_prompt(&b, DocumentType::PrivacyPolicy);

        assert!(prompt.contains(GDPR_CLAUSE));
        assert!(prompt.contains(DPDP_CLAUSE));
        assert!(!prompt.contains(CCPA_CLAUSE));
    }

    #[test]
    fn missing_website_uses_placeholder() {
        let b = business(vec![Jurisdiction::Gdpr], None);
        let prompt = build_prompt(&b, DocumentType::PrivacyPolicy);
        assert!(prompt.contains("- Website: Not provided"));
    }

    #[test]
    fn empty_jurisdictions_fall_back_to_not_specified() {
        let b = business(vec![], None);
        let prompt = build_prompt(&b, DocumentType::TermsOfService);
        assert!(prompt.contains("- Operating Jurisdictions: Not specified"));
    }

    #[test]
    fn section_blocks_differ_by_document_type() {
        let b = business(vec![Jurisdiction::Ccpa], None);
        let privacy = build_prompt(&b, DocumentType::PrivacyPolicy);
        let terms = build_prompt(&b, DocumentType::TermsOfService);

        assert!(privacy.contains("Privacy Policy must include:"));
        assert!(privacy.contains("comprehensive privacy policy for"));
        assert!(terms.contains("Terms of Service must include:"));
        assert!(terms.contains("comprehensive terms of service for"));
    }

    #[test]
    fn prompt_demands_the_three_key_json_shape() {
        let b = business(vec![Jurisdiction::Gdpr], None);
        let prompt = build_prompt(&b, DocumentType::PrivacyPolicy);

        assert!(prompt.contains("\"content\""));
        assert!(prompt.contains("\"compliance\""));
        assert!(prompt.contains("\"recommendations\""));
        assert!(prompt.contains("respond with a JSON object"));
    }
}
