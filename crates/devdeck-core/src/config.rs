use std::{
    env, fs,
    net::IpAddr,
    path::{Path, PathBuf},
};

use tracing::{info, warn};

use crate::{errors::Error, security::AdminCredentials, Result};

const DEFAULT_ADMIN_USER: &str = "admin";
const INSECURE_ADMIN_PASSWORD: &str = "admin";

/// Typed configuration for the backend.
///
/// Every external integration is optional: a missing bot token disables the
/// Telegram bot, a missing chat id disables notifications.
#[derive(Clone, Debug)]
pub struct Config {
    // Telegram
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,

    // Admin panel
    pub admin_user: String,
    pub admin_password: String,
    pub admin_password_is_default: bool,
    pub secret_key: Option<String>,

    // HTTP
    pub bind_address: IpAddr,
    pub port: u16,

    // Storage
    pub database_file: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let telegram_bot_token = env_str("TELEGRAM_BOT_TOKEN").and_then(non_empty);
        let telegram_chat_id = env_str("TELEGRAM_CHAT_ID").and_then(non_empty);

        let admin_user = env_str("ADMIN_USER")
            .and_then(non_empty)
            .unwrap_or_else(|| DEFAULT_ADMIN_USER.to_string());
        let (admin_password, admin_password_is_default) =
            match env_str("ADMIN_PASSWORD").and_then(non_empty) {
                Some(p) => (p, false),
                None => (INSECURE_ADMIN_PASSWORD.to_string(), true),
            };
        let secret_key = env_str("SECRET_KEY").and_then(non_empty);

        let bind_address = match env_str("BIND_ADDRESS").and_then(non_empty) {
            Some(raw) => raw
                .trim()
                .parse::<IpAddr>()
                .map_err(|e| Error::Config(format!("BIND_ADDRESS is not an IP address: {e}")))?,
            None => IpAddr::from([0, 0, 0, 0]),
        };
        let port = match env_str("PORT").and_then(non_empty) {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|e| Error::Config(format!("PORT is not a valid port: {e}")))?,
            None => 5000,
        };

        let database_file = env_str("DATABASE_FILE")
            .and_then(non_empty)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("database.json"));

        Ok(Self {
            telegram_bot_token,
            telegram_chat_id,
            admin_user,
            admin_password,
            admin_password_is_default,
            secret_key,
            bind_address,
            port,
            database_file,
        })
    }

    pub fn admin_credentials(&self) -> AdminCredentials {
        AdminCredentials::new(self.admin_user.clone(), self.admin_password.clone())
    }

    /// Log which integrations are enabled and warn about insecure fallbacks.
    pub fn log_summary(&self) {
        info!(
            database = %self.database_file.display(),
            address = %self.bind_address,
            port = self.port,
            "configuration loaded"
        );

        if self.telegram_bot_token.is_none() {
            warn!("TELEGRAM_BOT_TOKEN not set: bot disabled, notifications skipped");
        } else if self.telegram_chat_id.is_none() {
            warn!("TELEGRAM_CHAT_ID not set: notifications skipped");
        }
        if self.admin_password_is_default {
            warn!("ADMIN_PASSWORD not set: falling back to an insecure default password");
        }
        if self.secret_key.is_none() {
            warn!("SECRET_KEY not set");
        }
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for (key, val) in parse_dotenv(&contents) {
        if env::var_os(&key).is_some() {
            continue; // do not override existing env
        }
        env::set_var(key, val);
    }
}

fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        out.push((key.to_string(), val));
    }
    out
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
