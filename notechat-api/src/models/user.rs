use chrono::{DateTime, Utc};
use notechat_sdk::{ApiKey, Provider};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::note::Note;

/// Stored user profile, keyed by the identity provider's subject
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub auth_subject: String,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub openai_key: Option<ApiKey>,
    pub gemini_key: Option<ApiKey>,
    /// Owned notes, in creation order
    pub note_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Empty profile for a subject seen for the first time
    pub fn new(auth_subject: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            auth_subject: auth_subject.into(),
            email: String::new(),
            username: String::new(),
            first_name: String::new(),
            last_name: String::new(),
            openai_key: None,
            gemini_key: None,
            note_ids: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Usable key for `provider`; blank keys count as absent
    pub fn api_key(&self, provider: Provider) -> Option<&ApiKey> {
        let key = match provider {
            Provider::OpenAi => self.openai_key.as_ref(),
            Provider::Gemini => self.gemini_key.as_ref(),
        };
        key.filter(|k| !k.is_blank())
    }

    pub fn apply_profile(&mut self, request: ProfileRequest) {
        self.email = request.email;
        self.username = request.username;
        self.first_name = request.first_name;
        self.last_name = request.last_name;
        self.updated_at = Utc::now();
    }

    pub fn key_status(&self) -> ApiKeyStatus {
        ApiKeyStatus {
            has_openai_key: self.api_key(Provider::OpenAi).is_some(),
            has_gemini_key: self.api_key(Provider::Gemini).is_some(),
        }
    }

    pub fn profile(&self) -> UserProfile {
        let status = self.key_status();
        UserProfile {
            id: self.id,
            auth_subject: self.auth_subject.clone(),
            email: self.email.clone(),
            username: self.username.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            has_openai_key: status.has_openai_key,
            has_gemini_key: status.has_gemini_key,
            note_ids: self.note_ids.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Client view of a [`User`]; keys are reduced to presence flags
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub auth_subject: String,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub has_openai_key: bool,
    pub has_gemini_key: bool,
    pub note_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserWithNotes {
    #[serde(flatten)]
    pub profile: UserProfile,
    pub notes: Vec<Note>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfileRequest {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiKeysUpdate {
    pub openai_key: Option<String>,
    pub gemini_key: Option<String>,
}

impl ApiKeysUpdate {
    /// Keys present and non-blank in the request
    pub fn provided(&self) -> Vec<(Provider, ApiKey)> {
        [
            (Provider::OpenAi, self.openai_key.as_deref()),
            (Provider::Gemini, self.gemini_key.as_deref()),
        ]
        .into_iter()
        .filter_map(|(provider, key)| {
            key.map(ApiKey::new)
                .filter(|k| !k.is_blank())
                .map(|k| (provider, k))
        })
        .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyStatus {
    pub has_openai_key: bool,
    pub has_gemini_key: bool,
}
