use std::sync::Arc;

use teloxide::{prelude::*, types::ParseMode};
use tracing::{error, info};

use devdeck_core::{
    domain::ExternalUserId,
    errors::Error,
    formatting::escape_html,
    ops::{self, Registration},
};

use crate::router::BotState;

const STORAGE_APOLOGY: &str =
    "Sorry, there is a server-side database issue. Please try again later.";
const GENERIC_APOLOGY: &str = "An unexpected error occurred. The admin has been notified.";

fn parse_command(text: &str) -> (String, String) {
    // Telegram may send `/cmd@botname arg1 ...`
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    (cmd, rest)
}

fn start_reply(first_name: &str, reg: &Registration) -> String {
    let name = escape_html(first_name);
    let code = escape_html(&reg.user.access_code);
    if reg.created {
        format!(
            "🚀 Welcome to Dev-Deck, {name}!\n\n\
You have been successfully registered.\n\n\
Your personal access code is:\n\n<code>{code}</code>\n\n\
Use this code to log in on the website."
        )
    } else {
        format!(
            "👋 Welcome back, {name}!\n\n\
Your personal access code is still:\n\n<code>{code}</code>\n\n\
Use this to log in."
        )
    }
}

fn failure_reply(e: &Error) -> &'static str {
    if e.is_storage() {
        STORAGE_APOLOGY
    } else {
        GENERIC_APOLOGY
    }
}

pub async fn handle_command(bot: Bot, msg: Message, state: Arc<BotState>) -> ResponseResult<()> {
    let Some(user) = msg.from() else {
        return Ok(());
    };
    let Some(text) = msg.text() else {
        return Ok(());
    };

    let (cmd, _arg) = parse_command(text);
    if cmd != "start" {
        return Ok(());
    }

    let external_id = ExternalUserId::from(user.id.0 as i64);
    let display_name = user.username.clone();
    let first_name = user.first_name.clone();
    info!(user_id = %external_id, username = ?display_name, "/start received");

    let result = state
        .store
        .apply(|doc| {
            ops::register_or_fetch(
                doc,
                &external_id,
                display_name.as_deref(),
                &mut rand::thread_rng(),
            )
        })
        .await;

    let reply = match result {
        Ok((reg, event)) => {
            if reg.created {
                info!(user_id = %external_id, "registered new user");
            } else {
                info!(user_id = %external_id, "existing user, resending access code");
            }
            state.notifier.notify_event(event);
            start_reply(&first_name, &reg)
        }
        Err(e) => {
            error!(user_id = %external_id, error = %e, "/start failed");
            state.notifier.notify(format!(
                "🚨 <b>Bot error</b>\n\n/start for <code>{}</code> failed: <code>{}</code>",
                external_id,
                escape_html(&e.to_string())
            ));
            failure_reply(&e).to_string()
        }
    };

    bot.send_message(msg.chat.id, reply)
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}
