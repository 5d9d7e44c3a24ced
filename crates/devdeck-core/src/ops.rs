//! Domain operations: pure transforms over the document.
//!
//! Each operation takes the current document by value and returns the updated
//! document, a value for the caller, and the event text for the notifier.
//! `event` is `None` exactly when the document was left untouched, which is
//! how `DocumentStore::apply` knows to skip the write. On error the input
//! document is dropped unchanged; nothing has been written.

use chrono::{DateTime, Duration, Utc};
use rand::{seq::SliceRandom, Rng};
use serde_json::{Map, Value};

use crate::{
    domain::{
        ClientInfo, Document, ExternalUserId, Resource, ResourceInput, User, UserSession,
    },
    errors::Error,
    formatting,
    security::{generate_access_code, AdminCredentials},
    Result,
};

pub const DAILY_BONUS: i64 = 25;
pub const STARTING_CREDITS: i64 = 50;
pub const STAT_LOGINS: &str = "logins";
pub const STAT_ADMIN_LOGINS: &str = "admin_logins";

pub fn bonus_interval() -> Duration {
    Duration::hours(24)
}

#[derive(Clone, Debug)]
pub struct Applied<T> {
    pub document: Document,
    pub value: T,
    pub event: Option<String>,
}

impl<T> Applied<T> {
    fn changed(document: Document, value: T, event: String) -> Self {
        Self {
            document,
            value,
            event: Some(event),
        }
    }

    fn unchanged(document: Document, value: T) -> Self {
        Self {
            document,
            value,
            event: None,
        }
    }
}

// ============== Web Login ==============

/// Log a user in by access code, granting the daily bonus when due.
///
/// Access codes are not unique. When several users share one, the user whose
/// id sorts first (string order) is logged in.
pub fn login_by_code(
    mut doc: Document,
    code: &str,
    now: DateTime<Utc>,
    client: &ClientInfo,
) -> Result<Applied<UserSession>> {
    if code.is_empty() {
        return Err(Error::UserNotFound);
    }

    let user_id = doc
        .users
        .iter()
        .find(|(_, u)| u.access_code == code)
        .map(|(id, _)| id.clone())
        .ok_or(Error::UserNotFound)?;

    let user = doc.users.get_mut(&user_id).ok_or(Error::UserNotFound)?;

    let eligible = match user.last_login {
        None => true,
        Some(last) => now.signed_duration_since(last) > bonus_interval(),
    };
    let bonus = if eligible {
        user.credits = user.credits.saturating_add(DAILY_BONUS);
        Some(DAILY_BONUS)
    } else {
        None
    };
    user.last_login = Some(now);

    let session = UserSession::project(&user_id, user);
    doc.bump_stat(STAT_LOGINS);

    let event = formatting::user_login(
        &session.user_id,
        &session.username,
        session.credits,
        bonus,
        client,
    );
    Ok(Applied::changed(doc, session, event))
}

// ============== Chat Registration ==============

#[derive(Clone, Debug, PartialEq)]
pub struct Registration {
    pub user: User,
    pub created: bool,
}

/// Register a chat user on first contact; afterwards return the stored record.
pub fn register_or_fetch(
    mut doc: Document,
    external_id: &ExternalUserId,
    display_name: Option<&str>,
    rng: &mut impl Rng,
) -> Result<Applied<Registration>> {
    if let Some(existing) = doc.users.get(&external_id.0) {
        let reg = Registration {
            user: existing.clone(),
            created: false,
        };
        return Ok(Applied::unchanged(doc, reg));
    }

    let username = display_name
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("user_{external_id}"));

    let user = User {
        username,
        access_code: generate_access_code(rng),
        credits: STARTING_CREDITS,
        is_premium: false,
        is_admin: false,
        last_login: None,
    };
    doc.users.insert(external_id.0.clone(), user.clone());

    let event = formatting::user_registered(&external_id.0, &user.username);
    let reg = Registration {
        user,
        created: true,
    };
    Ok(Applied::changed(doc, reg, event))
}

// ============== Admin ==============

pub fn admin_login(
    mut doc: Document,
    creds: &AdminCredentials,
    user: &str,
    password: &str,
    client: &ClientInfo,
) -> Result<Applied<()>> {
    if !creds.verify(user, password) {
        return Err(Error::InvalidCredentials);
    }
    doc.bump_stat(STAT_ADMIN_LOGINS);
    let event = formatting::admin_login(user, client);
    Ok(Applied::changed(doc, (), event))
}

/// Insert a new resource (no id, or id 0) or replace the one with a matching id.
pub fn upsert_resource(mut doc: Document, input: ResourceInput) -> Result<Applied<Resource>> {
    let title = input
        .title
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| Error::Validation("resource title is required".to_string()))?;

    match input.id.filter(|id| *id != 0) {
        Some(id) => {
            let slot = doc
                .resources
                .iter_mut()
                .find(|r| r.id == id)
                .ok_or(Error::ResourceNotFound(id))?;
            *slot = Resource {
                id,
                title,
                fields: input.fields,
            };
            let resource = slot.clone();
            let event = formatting::resource_updated(&resource.title);
            Ok(Applied::changed(doc, resource, event))
        }
        None => {
            let resource = Resource {
                id: doc.next_resource_id()?,
                title,
                fields: input.fields,
            };
            doc.resources.push(resource.clone());
            let event = formatting::resource_added(&resource.title);
            Ok(Applied::changed(doc, resource, event))
        }
    }
}

pub fn delete_resource(mut doc: Document, id: i64) -> Result<Applied<Resource>> {
    let idx = doc
        .resources
        .iter()
        .position(|r| r.id == id)
        .ok_or(Error::ResourceNotFound(id))?;
    let removed = doc.resources.remove(idx);
    let event = formatting::resource_deleted(&removed.title);
    Ok(Applied::changed(doc, removed, event))
}

/// Shallow merge: top-level keys of `patch` replace those in `settings`.
pub fn merge_settings(
    mut doc: Document,
    patch: Map<String, Value>,
) -> Result<Applied<Map<String, Value>>> {
    let event = formatting::settings_updated(&patch);
    for (k, v) in patch {
        doc.settings.insert(k, v);
    }
    let merged = doc.settings.clone();
    Ok(Applied::changed(doc, merged, event))
}

// ============== Live Drop ==============

pub fn draw_live_drop(doc: &Document, rng: &mut impl Rng) -> Result<String> {
    doc.live_drop_pool
        .choose(rng)
        .cloned()
        .ok_or(Error::EmptyPool)
}
