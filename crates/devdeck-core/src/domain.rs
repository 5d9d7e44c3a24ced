use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::{errors::Error, Result};

/// Telegram user id, used as the key of `Document::users`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExternalUserId(pub String);

impl From<i64> for ExternalUserId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for ExternalUserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The whole application state, persisted as one JSON file.
///
/// Missing top-level sections default to empty; sections with the wrong shape
/// fail deserialization so the store can report the file as unusable.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Document {
    pub settings: Map<String, Value>,
    pub resources: Vec<Resource>,
    pub users: BTreeMap<String, User>,
    pub live_drop_pool: Vec<String>,
    pub stats: BTreeMap<String, u64>,
}

impl Document {
    /// Increment a counter in `stats`, creating it at zero first.
    pub fn bump_stat(&mut self, key: &str) -> u64 {
        let counter = self.stats.entry(key.to_string()).or_insert(0);
        *counter = counter.saturating_add(1);
        *counter
    }

    pub fn stat(&self, key: &str) -> u64 {
        self.stats.get(key).copied().unwrap_or(0)
    }

    /// One past the largest id in use, so deleted ids are never handed out again.
    pub fn next_resource_id(&self) -> Result<i64> {
        self.resources
            .iter()
            .map(|r| r.id)
            .max()
            .unwrap_or(0)
            .checked_add(1)
            .ok_or_else(|| Error::Validation("resource id space exhausted".to_string()))
    }
}

/// Catalog entry. Only `id` and `title` are interpreted; every other field is
/// kept verbatim.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: i64,
    pub title: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// Upsert payload: a resource whose `id` may be absent (create) or present
/// (replace).
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct ResourceInput {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub access_code: String,
    pub credits: i64,
    #[serde(default)]
    pub is_premium: bool,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default, deserialize_with = "deserialize_last_login")]
    pub last_login: Option<DateTime<Utc>>,
}

const NAIVE_TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// RFC 3339 timestamps, or offset-less ISO-8601 ones read as UTC.
fn parse_last_login(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NAIVE_TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

fn deserialize_last_login<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(raw) => parse_last_login(&raw).map(Some).ok_or_else(|| {
            serde::de::Error::custom(format!("invalid last_login timestamp: {raw}"))
        }),
    }
}

/// What a successful web login hands back to the browser.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSession {
    pub user_id: String,
    pub username: String,
    pub credits: i64,
    pub is_premium: bool,
    pub is_admin: bool,
}

impl UserSession {
    pub fn project(user_id: &str, user: &User) -> Self {
        Self {
            user_id: user_id.to_string(),
            username: user.username.clone(),
            credits: user.credits,
            is_premium: user.is_premium,
            is_admin: user.is_admin,
        }
    }
}

/// Request metadata attached to login notifications.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClientInfo {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}
