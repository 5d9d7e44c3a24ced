//! Event texts sent to the admin chat (Telegram HTML parse mode).

use serde_json::{Map, Value};

use crate::domain::ClientInfo;

/// Escape HTML special characters for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn code(text: &str) -> String {
    format!("<code>{}</code>", escape_html(text))
}

fn client_lines(client: &ClientInfo) -> String {
    format!(
        "<b>IP Address</b>: {}\n<b>Device</b>: {}",
        code(client.ip.as_deref().unwrap_or("unknown")),
        code(client.user_agent.as_deref().unwrap_or("Unknown")),
    )
}

pub fn user_login(
    user_id: &str,
    username: &str,
    credits: i64,
    bonus: Option<i64>,
    client: &ClientInfo,
) -> String {
    let bonus_line = match bonus {
        Some(b) => format!("\n<b>Daily bonus</b>: +{b}"),
        None => String::new(),
    };
    format!(
        "✅ <b>New User Login!</b>\n\n<b>User</b>: {} ({})\n<b>Credits</b>: {credits}{bonus_line}\n{}",
        code(username),
        code(user_id),
        client_lines(client),
    )
}

pub fn failed_login(code_entered: &str, client: &ClientInfo) -> String {
    format!(
        "❌ <b>Failed Login Attempt!</b>\n\n<b>Code Entered</b>: {}\n{}",
        code(code_entered),
        client_lines(client),
    )
}

pub fn admin_login(user: &str, client: &ClientInfo) -> String {
    format!(
        "👑 <b>ADMIN PANEL ACCESS GRANTED!</b>\n\n<b>User</b>: {}\n<b>IP</b>: {}",
        code(user),
        code(client.ip.as_deref().unwrap_or("unknown")),
    )
}

pub fn failed_admin_login(user: &str, client: &ClientInfo) -> String {
    format!(
        "🚨 <b>FAILED ADMIN LOGIN ATTEMPT!</b>\n\n<b>User</b>: {}\n<b>IP</b>: {}",
        code(user),
        code(client.ip.as_deref().unwrap_or("unknown")),
    )
}

pub fn resource_added(title: &str) -> String {
    format!("✨ <b>New Resource Added:</b>\n{}", code(title))
}

pub fn resource_updated(title: &str) -> String {
    format!("✏️ <b>Resource Updated:</b>\n{}", code(title))
}

pub fn resource_deleted(title: &str) -> String {
    format!("🗑️ <b>Resource Deleted:</b>\n{}", code(title))
}

pub fn settings_updated(patch: &Map<String, Value>) -> String {
    let pretty = serde_json::to_string_pretty(patch).unwrap_or_else(|_| "{}".to_string());
    format!(
        "⚙️ <b>Site Settings Updated!</b>\n<pre>{}</pre>",
        escape_html(&pretty)
    )
}

pub fn user_registered(user_id: &str, username: &str) -> String {
    format!(
        "🚀 <b>New User Registered!</b>\n\n<b>User</b>: {} ({})",
        code(username),
        code(user_id),
    )
}
