use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod schema {
    diesel::table! {
        users (id) {
            id -> Uuid,
            username -> Text,
            password -> Text,
            email -> Text,
            created_at -> Timestamptz,
        }
    }

    diesel::table! {
        businesses (id) {
            id -> Uuid,
            user_id -> Uuid,
            name -> Text,
            website -> Nullable<Text>,
            business_type -> Varchar,
            jurisdictions -> Array<Text>,
            data_practices -> Jsonb,
            created_at -> Timestamptz,
            updated_at -> Timestamptz,
        }
    }

    diesel::table! {
        documents (id) {
            id -> Uuid,
            business_id -> Uuid,
            doc_type -> Varchar,
            title -> Text,
            content -> Text,
            version -> Int4,
            status -> Varchar,
            metadata -> Jsonb,
            created_at -> Timestamptz,
            updated_at -> Timestamptz,
        }
    }

    diesel::table! {
        document_versions (id) {
            id -> Uuid,
            document_id -> Uuid,
            version -> Int4,
            content -> Text,
            changelog -> Nullable<Text>,
            created_at -> Timestamptz,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusinessType {
    Saas,
    Ecommerce,
    Mobile,
    Other,
}

impl std::fmt::Display for BusinessType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Saas => "saas",
            Self::Ecommerce => "ecommerce",
            Self::Mobile => "mobile",
            Self::Other => "other",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for BusinessType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "saas" => Ok(Self::Saas),
            "ecommerce" => Ok(Self::Ecommerce),
            "mobile" => Ok(Self::Mobile),
            "other" => Ok(Self::Other),
            _ => Err(format!("Unknown business type: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Jurisdiction {
    Gdpr,
    Ccpa,
    Dpdp,
}

impl std::fmt::Display for Jurisdiction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Gdpr => "gdpr",
            Self::Ccpa => "ccpa",
            Self::Dpdp => "dpdp",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Jurisdiction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gdpr" => Ok(Self::Gdpr),
            "ccpa" => Ok(Self::Ccpa),
            "dpdp" => Ok(Self::Dpdp),
            _ => Err(format!("Unknown jurisdiction: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    PrivacyPolicy,
    TermsOfService,
}

impl DocumentType {
    /// Tag with underscores replaced by spaces, e.g. "privacy policy".
    pub fn spaced(&self) -> &'static str {
        match self {
            Self::PrivacyPolicy => "privacy policy",
            Self::TermsOfService => "terms of service",
        }
    }

    /// Document title: every word of the tag capitalized.
    pub fn title(&self) -> &'static str {
        match self {
            Self::PrivacyPolicy => "Privacy Policy",
            Self::TermsOfService => "Terms Of Service",
        }
    }
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::PrivacyPolicy => "privacy_policy",
            Self::TermsOfService => "terms_of_service",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for DocumentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "privacy_policy" => Ok(Self::PrivacyPolicy),
            "terms_of_service" => Ok(Self::TermsOfService),
            _ => Err(format!("Unknown document type: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Draft,
    Published,
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Draft => "draft",
            Self::Published => "published",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for DocumentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "published" => Ok(Self::Published),
            _ => Err(format!("Unknown document status: {s}")),
        }
    }
}

/// Closed field set collected by the questionnaire wizard. Stored as jsonb.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DataPractices {
    pub collects_personal_data: bool,
    pub collects_payment_data: bool,
    pub uses_cookies: bool,
    pub shares_data_with_third_parties: bool,
    pub data_retention_period: String,
    pub user_rights: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Business {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub website: Option<String>,
    pub business_type: BusinessType,
    pub jurisdictions: Vec<Jurisdiction>,
    pub data_practices: DataPractices,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBusiness {
    pub user_id: Uuid,
    pub name: String,
    pub website: Option<String>,
    pub business_type: BusinessType,
    pub jurisdictions: Vec<Jurisdiction>,
    #[serde(default)]
    pub data_practices: DataPractices,
}

/// Distinguishes an absent `website` field (leave it alone) from an
/// explicit `null` (clear it).
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessUpdate {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub website: Option<Option<String>>,
    pub business_type: Option<BusinessType>,
    pub jurisdictions: Option<Vec<Jurisdiction>>,
    pub data_practices: Option<DataPractices>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: Uuid,
    pub business_id: Uuid,
    #[serde(rename = "type")]
    pub doc_type: DocumentType,
    pub title: String,
    pub content: String,
    pub version: i32,
    pub status: DocumentStatus,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewDocument {
    pub business_id: Uuid,
    pub doc_type: DocumentType,
    pub title: String,
    pub content: String,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Default)]
pub struct DocumentUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub status: Option<DocumentStatus>,
    pub version: Option<i32>,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentVersion {
    pub id: Uuid,
    pub document_id: Uuid,
    pub version: i32,
    pub content: String,
    pub changelog: Option<String>,
    pub created_at: DateTime<Utc>,
}

// Database rows. The API structs above carry the typed enums; these carry
// what Postgres stores.

#[derive(Debug, Clone, Queryable, Insertable, Serialize, Deserialize)]
#[diesel(table_name = schema::users)]
pub struct DbUser {
    pub id: Uuid,
    pub username: String,
    pub password: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Insertable, AsChangeset, Serialize, Deserialize)]
#[diesel(table_name = schema::businesses)]
pub struct DbBusiness {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub website: Option<String>,
    pub business_type: String,
    pub jurisdictions: Vec<String>,
    pub data_practices: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Insertable, AsChangeset, Serialize, Deserialize)]
#[diesel(table_name = schema::documents)]
pub struct DbDocument {
    pub id: Uuid,
    pub business_id: Uuid,
    pub doc_type: String,
    pub title: String,
    pub content: String,
    pub version: i32,
    pub status: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Insertable, Serialize, Deserialize)]
#[diesel(table_name = schema::document_versions)]
pub struct DbDocumentVersion {
    pub id: Uuid,
    pub document_id: Uuid,
    pub version: i32,
    pub content: String,
    pub changelog: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<DbUser> for User {
    fn from(db: DbUser) -> Self {
        User {
            id: db.id,
            username: db.username,
            password: db.password,
            email: db.email,
            created_at: db.created_at,
        }
    }
}

impl From<DbBusiness> for Business {
    fn from(db: DbBusiness) -> Self {
        Business {
            id: db.id,
            user_id: db.user_id,
            name: db.name,
            website: db.website,
            business_type: db.business_type.parse().unwrap_or(BusinessType::Other),
            jurisdictions: db
                .jurisdictions
                .iter()
                .filter_map(|j| j.parse().ok())
                .collect(),
            data_practices: serde_json::from_value(db.data_practices).unwrap_or_default(),
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

impl From<&Business> for DbBusiness {
    fn from(b: &Business) -> Self {
        DbBusiness {
            id: b.id,
            user_id: b.user_id,
            name: b.name.clone(),
            website: b.website.clone(),
            business_type: b.business_type.to_string(),
            jurisdictions: b.jurisdictions.iter().map(|j| j.to_string()).collect(),
            data_practices: serde_json::to_value(&b.data_practices)
                .unwrap_or(serde_json::Value::Null),
            created_at: b.created_at,
            updated_at: b.updated_at,
        }
    }
}

impl From<DbDocument> for Document {
    fn from(db: DbDocument) -> Self {
        Document {
            id: db.id,
            business_id: db.business_id,
            doc_type: db.doc_type.parse().unwrap_or(DocumentType::PrivacyPolicy),
            title: db.title,
            content: db.content,
            version: db.version,
            status: db.status.parse().unwrap_or(DocumentStatus::Draft),
            metadata: db.metadata,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

impl From<&Document> for DbDocument {
    fn from(d: &Document) -> Self {
        DbDocument {
            id: d.id,
            business_id: d.business_id,
            doc_type: d.doc_type.to_string(),
            title: d.title.clone(),
            content: d.content.clone(),
            version: d.version,
            status: d.status.to_string(),
            metadata: d.metadata.clone(),
            created_at: d.created_at,
            updated_at: d.updated_at,
        }
    }
}

impl From<DbDocumentVersion> for DocumentVersion {
    fn from(db: DbDocumentVersion) -> Self {
        DocumentVersion {
            id: db.id,
            document_id: db.document_id,
            version: db.version,
            content: db.content,
            changelog: db.changelog,
            created_at: db.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_type_round_trips_through_tag() {
        assert_eq!(DocumentType::PrivacyPolicy.to_string(), "privacy_policy");
        assert_eq!(
            "terms_of_service".parse::<DocumentType>(),
            Ok(DocumentType::TermsOfService)
        );
        assert!("invoice".parse::<DocumentType>().is_err());
    }

    #[test]
    fn document_titles_capitalize_every_word() {
        assert_eq!(DocumentType::PrivacyPolicy.title(), "Privacy Policy");
        assert_eq!(DocumentType::TermsOfService.title(), "Terms Of Service");
    }

    #[test]
    fn data_practices_uses_wizard_field_names() {
        let json = r#"{
            "collectsPersonalData": true,
            "collectsPaymentData": false,
            "usesCookies": true,
            "sharesDataWithThirdParties": false,
            "dataRetentionPeriod": "12 months",
            "userRights": ["access", "erasure"]
        }"#;

        let practices: DataPractices = serde_json::from_str(json).unwrap();
        assert!(practices.collects_personal_data);
        assert_eq!(practices.data_retention_period, "12 months");
        assert_eq!(practices.user_rights.len(), 2);
    }

    #[test]
    fn unknown_jurisdiction_tags_are_dropped_on_load() {
        let db = DbBusiness {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            name: "Acme".to_string(),
            website: None,
            business_type: "saas".to_string(),
            jurisdictions: vec!["gdpr".to_string(), "lgpd".to_string()],
            data_practices: serde_json::json!({}),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let business: Business = db.into();
        assert_eq!(business.jurisdictions, vec![Jurisdiction::Gdpr]);
    }
}
