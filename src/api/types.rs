//! Request and response bodies for the plant-identification backend.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
pub struct SignupRequest<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub password: &'a str,
    /// RFC 3339.
    pub created_at: String,
    /// RFC 3339.
    pub updated_at: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
}

// =============================================================================
// FAVORITES
// =============================================================================

/// Favorite as stored by the backend.
#[derive(Debug, Clone, Deserialize)]
pub struct FavoriteRecord {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub added_at: Option<String>,
    pub plant_data: PlantData,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlantData {
    #[serde(default)]
    pub common_names: Vec<String>,
    #[serde(default)]
    pub scientific_name: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Flattened favorite, one per saved plant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Favorite {
    pub id: String,
    /// First common name, falling back to the scientific name.
    pub name: String,
    pub scientific_name: Option<String>,
    pub image_url: Option<String>,
    pub added_at: Option<String>,
}

impl From<FavoriteRecord> for Favorite {
    fn from(record: FavoriteRecord) -> Self {
        let PlantData { common_names, scientific_name, image_url } = record.plant_data;
        let name = common_names
            .into_iter()
            .find(|n| !n.trim().is_empty())
            .or_else(|| scientific_name.clone())
            .unwrap_or_else(|| "Unknown plant".to_owned());
        Self { id: record.id, name, scientific_name, image_url, added_at: record.added_at }
    }
}

/// Pull a human-readable failure message out of an error body.
///
/// `key` is `detail` for login and `message` elsewhere. Validation failures
/// arrive as `detail: [{ "msg": ... }, ...]` and are joined.
#[must_use]
pub fn error_message(body: &Value, key: &str) -> Option<String> {
    match body.get(key)? {
        Value::String(message) if !message.trim().is_empty() => Some(message.clone()),
        Value::Array(items) => {
            let joined = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(Value::as_str).or_else(|| item.as_str()))
                .collect::<Vec<_>>()
                .join("; ");
            (!joined.is_empty()).then_some(joined)
        }
        _ => None,
    }
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;
