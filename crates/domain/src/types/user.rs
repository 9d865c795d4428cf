//! User profile types
//!
//! One profile row per account, linked to the identity provider's user id.

use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::constants::DEFAULT_LANGUAGE;
use crate::errors::{AccountError, Result};

/// User profile stored in the `users` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: i64,
    /// Identity provider user id (`supabaseId` on the wire)
    #[serde(rename = "supabaseId")]
    pub external_id: Option<String>,
    pub email: String,
    pub full_name: Option<String>,
    pub profile_image: Option<String>,
    /// Token for the external broker integration
    pub api_token: Option<String>,
    pub phone: Option<String>,
    pub cpf: Option<String>,
    pub birth_date: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub gender: Option<String>,
    pub language: Option<String>,
    pub preferences: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    /// Overlay the non-empty attributes onto a copy of this profile.
    ///
    /// Absent or blank attributes keep the stored value. `updated_at` is
    /// refreshed but never moves backwards.
    pub fn merged_with(&self, attributes: &ProfileAttributes, now: DateTime<Utc>) -> Self {
        let incoming = attributes.clone().normalized();
        let mut merged = self.clone();

        overlay(&mut merged.full_name, incoming.full_name);
        overlay(&mut merged.phone, incoming.phone);
        overlay(&mut merged.cpf, incoming.cpf);
        overlay(&mut merged.birth_date, incoming.birth_date);
        overlay(&mut merged.country, incoming.country);
        overlay(&mut merged.city, incoming.city);
        overlay(&mut merged.gender, incoming.gender);
        overlay(&mut merged.language, incoming.language);
        overlay(&mut merged.profile_image, incoming.profile_image);
        overlay(&mut merged.api_token, incoming.api_token);
        if let Some(preferences) = incoming.preferences {
            merged.preferences = Some(preferences);
        }

        merged.updated_at = now.max(self.updated_at);
        merged
    }

    /// Apply a column-wise update the way the store does.
    pub fn with_changes(&self, changes: &ProfileChanges) -> Self {
        let mut merged = self.merged_with(&changes.attributes, changes.updated_at);
        if merged.external_id.is_none() {
            merged.external_id = changes.link_external_id.clone();
        }
        merged
    }
}

fn overlay(slot: &mut Option<String>, incoming: Option<String>) {
    if let Some(value) = incoming {
        *slot = Some(value);
    }
}

/// Optional descriptive attributes carried by create and update requests
///
/// Deserialization also accepts the legacy Portuguese field set (`nome`,
/// `sobrenome`, `telefone`, `nascimento`, `api_token`) and folds it into the
/// canonical fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "AttributesWire")]
pub struct ProfileAttributes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpf: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferences: Option<Value>,
}

impl ProfileAttributes {
    /// Attributes that only set the avatar reference.
    pub fn profile_image(url: impl Into<String>) -> Self {
        Self { profile_image: Some(url.into()), ..Self::default() }
    }

    /// Drop blank strings and null preferences so they read as "not supplied".
    #[must_use]
    pub fn normalized(self) -> Self {
        Self {
            full_name: non_blank(self.full_name),
            phone: non_blank(self.phone),
            cpf: non_blank(self.cpf),
            birth_date: non_blank(self.birth_date),
            country: non_blank(self.country),
            city: non_blank(self.city),
            gender: non_blank(self.gender),
            language: non_blank(self.language),
            profile_image: non_blank(self.profile_image),
            api_token: non_blank(self.api_token),
            preferences: self.preferences.and_then(normalize_preferences),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.clone().normalized() == Self::default()
    }

    /// Build a fresh profile row from these attributes.
    ///
    /// `id` is a placeholder until the store assigns one.
    pub fn into_new_profile(
        self,
        email: String,
        external_id: Option<String>,
        now: DateTime<Utc>,
    ) -> UserProfile {
        let attributes = self.normalized();
        UserProfile {
            id: 0,
            external_id,
            email,
            full_name: attributes.full_name,
            profile_image: attributes.profile_image,
            api_token: attributes.api_token,
            phone: attributes.phone,
            cpf: attributes.cpf,
            birth_date: attributes.birth_date,
            country: attributes.country,
            city: attributes.city,
            gender: attributes.gender,
            language: attributes.language.or_else(|| Some(DEFAULT_LANGUAGE.to_string())),
            preferences: attributes.preferences,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct AttributesWire {
    full_name: Option<String>,
    #[serde(alias = "telefone")]
    phone: Option<String>,
    cpf: Option<String>,
    #[serde(alias = "nascimento")]
    birth_date: Option<String>,
    country: Option<String>,
    city: Option<String>,
    gender: Option<String>,
    language: Option<String>,
    #[serde(alias = "avatarUrl")]
    profile_image: Option<String>,
    #[serde(alias = "api_token")]
    api_token: Option<String>,
    preferences: Option<Value>,
    nome: Option<String>,
    sobrenome: Option<String>,
}

impl From<AttributesWire> for ProfileAttributes {
    fn from(wire: AttributesWire) -> Self {
        let full_name = non_blank(wire.full_name)
            .or_else(|| legacy_full_name(wire.nome.as_deref(), wire.sobrenome.as_deref()));

        Self {
            full_name,
            phone: wire.phone,
            cpf: wire.cpf,
            birth_date: wire.birth_date,
            country: wire.country,
            city: wire.city,
            gender: wire.gender,
            language: wire.language,
            profile_image: wire.profile_image,
            api_token: wire.api_token,
            preferences: wire.preferences,
        }
        .normalized()
    }
}

/// Join the legacy first/last name pair into a single full name.
pub fn legacy_full_name(nome: Option<&str>, sobrenome: Option<&str>) -> Option<String> {
    let parts: Vec<&str> =
        [nome, sobrenome].into_iter().flatten().map(str::trim).filter(|s| !s.is_empty()).collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Preferences arrive either as a JSON document or as its serialized string.
fn normalize_preferences(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::String(raw) if raw.trim().is_empty() => None,
        Value::String(raw) => match serde_json::from_str::<Value>(&raw) {
            Ok(parsed @ (Value::Object(_) | Value::Array(_))) => Some(parsed),
            _ => Some(Value::String(raw)),
        },
        other => Some(other),
    }
}

/// Identity reference used to locate a profile row
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileIdentity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(rename = "supabaseId", default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
}

impl ProfileIdentity {
    pub fn new(email: Option<String>, external_id: Option<String>) -> Self {
        Self {
            email: non_blank(email).map(|e| e.trim().to_string()),
            external_id: non_blank(external_id).map(|id| id.trim().to_string()),
        }
    }

    pub fn by_email(email: impl Into<String>) -> Self {
        Self::new(Some(email.into()), None)
    }

    pub fn by_external_id(external_id: impl Into<String>) -> Self {
        Self::new(None, Some(external_id.into()))
    }

    /// Normalize and require at least one reference.
    ///
    /// # Errors
    /// Returns `AccountError::Validation` when neither email nor external id
    /// is present.
    pub fn validated(self) -> Result<Self> {
        let identity = Self::new(self.email, self.external_id);
        if identity.is_empty() {
            return Err(AccountError::Validation("email or supabaseId is required".into()));
        }
        Ok(identity)
    }

    pub fn is_empty(&self) -> bool {
        self.email.is_none() && self.external_id.is_none()
    }
}

/// Create-or-update request: identity plus attribute updates
///
/// On the wire both halves share one flat JSON object
/// (`{"supabaseId": .., "email": .., "fullName": ..}`).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncRequest {
    #[serde(flatten)]
    pub identity: ProfileIdentity,
    #[serde(flatten)]
    pub attributes: ProfileAttributes,
}

impl SyncRequest {
    pub fn new(identity: ProfileIdentity, attributes: ProfileAttributes) -> Self {
        Self { identity, attributes }
    }
}

impl<'de> Deserialize<'de> for SyncRequest {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        if !value.is_object() {
            return Err(de::Error::custom("expected a JSON object"));
        }
        let identity = ProfileIdentity::deserialize(&value).map_err(de::Error::custom)?;
        let attributes = ProfileAttributes::deserialize(&value).map_err(de::Error::custom)?;
        Ok(Self { identity, attributes })
    }
}

/// Result of a find-or-create call
#[derive(Debug, Clone, PartialEq)]
pub struct SyncOutcome {
    pub profile: UserProfile,
    pub created: bool,
}

/// Column-wise update for one stored row
///
/// Stores write each non-empty attribute onto the current column value in a
/// single statement, so two merges touching different fields never undo each
/// other. `link_external_id` only lands on a row that has none yet.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileChanges {
    pub link_external_id: Option<String>,
    pub attributes: ProfileAttributes,
    pub updated_at: DateTime<Utc>,
}

impl ProfileChanges {
    pub fn new(attributes: ProfileAttributes, updated_at: DateTime<Utc>) -> Self {
        Self { link_external_id: None, attributes: attributes.normalized(), updated_at }
    }

    #[must_use]
    pub fn linking(mut self, external_id: Option<String>) -> Self {
        self.link_external_id = external_id;
        self
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use serde_json::json;

    use super::*;

    fn stored_profile() -> UserProfile {
        let now = Utc::now();
        ProfileAttributes {
            full_name: Some("Ana Souza".into()),
            phone: Some("+55 11 99999-0000".into()),
            ..ProfileAttributes::default()
        }
        .into_new_profile("ana@example.com".into(), Some("uuid-ana".into()), now)
    }

    #[test]
    fn new_profile_defaults_language() {
        let profile = stored_profile();
        assert_eq!(profile.language.as_deref(), Some(DEFAULT_LANGUAGE));
    }

    #[test]
    fn blank_fields_never_erase_existing_values() {
        let existing = stored_profile();
        let updates = ProfileAttributes {
            full_name: Some("   ".into()),
            phone: None,
            city: Some("Recife".into()),
            ..ProfileAttributes::default()
        };

        let merged = existing.merged_with(&updates, Utc::now());

        assert_eq!(merged.full_name.as_deref(), Some("Ana Souza"));
        assert_eq!(merged.phone.as_deref(), Some("+55 11 99999-0000"));
        assert_eq!(merged.city.as_deref(), Some("Recife"));
    }

    #[test]
    fn merge_never_moves_updated_at_backwards() {
        let existing = stored_profile();
        let earlier = existing.updated_at - Duration::seconds(30);

        let merged = existing.merged_with(&ProfileAttributes::default(), earlier);
        assert_eq!(merged.updated_at, existing.updated_at);
    }

    #[test]
    fn changes_link_external_id_only_when_unset() {
        let mut unlinked = stored_profile();
        unlinked.external_id = None;
        let changes = ProfileChanges::new(ProfileAttributes::default(), Utc::now())
            .linking(Some("uuid-new".into()));

        assert_eq!(unlinked.with_changes(&changes).external_id.as_deref(), Some("uuid-new"));
        let linked = stored_profile().with_changes(&changes);
        assert_eq!(linked.external_id.as_deref(), Some("uuid-ana"));
    }

    #[test]
    fn legacy_field_set_is_folded_into_canonical_names() {
        let attributes: ProfileAttributes = serde_json::from_value(json!({
            "nome": "Ana",
            "sobrenome": "Souza",
            "telefone": "123",
            "nascimento": "1990-01-01",
            "api_token": "tok"
        }))
        .unwrap();

        assert_eq!(attributes.full_name.as_deref(), Some("Ana Souza"));
        assert_eq!(attributes.phone.as_deref(), Some("123"));
        assert_eq!(attributes.birth_date.as_deref(), Some("1990-01-01"));
        assert_eq!(attributes.api_token.as_deref(), Some("tok"));
    }

    #[test]
    fn full_name_wins_over_legacy_names() {
        let attributes: ProfileAttributes =
            serde_json::from_value(json!({"fullName": "Ana S.", "nome": "Ana"})).unwrap();
        assert_eq!(attributes.full_name.as_deref(), Some("Ana S."));
    }

    #[test]
    fn stringified_preferences_are_parsed() {
        let attributes: ProfileAttributes =
            serde_json::from_value(json!({"preferences": "{\"theme\":\"dark\"}"})).unwrap();
        assert_eq!(attributes.preferences, Some(json!({"theme": "dark"})));
    }

    #[test]
    fn sync_request_reads_flat_object() {
        let request: SyncRequest = serde_json::from_value(json!({
            "supabaseId": "uuid-1",
            "email": "a@example.com",
            "fullName": "A",
            "city": ""
        }))
        .unwrap();

        assert_eq!(request.identity.external_id.as_deref(), Some("uuid-1"));
        assert_eq!(request.identity.email.as_deref(), Some("a@example.com"));
        assert_eq!(request.attributes.full_name.as_deref(), Some("A"));
        assert!(request.attributes.city.is_none());
    }

    #[test]
    fn sync_request_serializes_flat() {
        let request = SyncRequest::new(
            ProfileIdentity::by_external_id("uuid-1"),
            ProfileAttributes { full_name: Some("A".into()), ..ProfileAttributes::default() },
        );
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value, json!({"supabaseId": "uuid-1", "fullName": "A"}));
    }

    #[test]
    fn identity_requires_a_reference() {
        let err = ProfileIdentity::new(Some(" ".into()), None).validated().unwrap_err();
        assert!(matches!(err, AccountError::Validation(_)));
    }
}
