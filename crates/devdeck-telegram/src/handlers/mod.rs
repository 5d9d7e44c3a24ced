//! Telegram update handlers.
//!
//! Only commands are handled; plain messages are ignored.

use std::sync::Arc;

use teloxide::{prelude::*, types::Message};

use crate::router::BotState;

mod commands;

pub async fn handle_message(bot: Bot, msg: Message, state: Arc<BotState>) -> ResponseResult<()> {
    if let Some(text) = msg.text() {
        if text.starts_with('/') {
            return commands::handle_command(bot, msg, state).await;
        }
    }
    Ok(())
}
