use super::{BotContext, HandlerResult};
use crate::bot::telegram::identity;
use crate::utils::feedback::CommandFeedback;
use teloxide::prelude::*;

pub async fn handle_general_message(bot: Bot, msg: Message, ctx: BotContext) -> HandlerResult {
    if let Some(user) = msg.from().map(identity) {
        ctx.recorder.touch(&user).await;
    }

    // Only private chats get hints; groups would be spammed.
    if !msg.chat.is_private() {
        return Ok(());
    }
    let feedback = CommandFeedback::new(bot, msg.chat.id);

    if let Some(text) = msg.text() {
        if text.starts_with('/') {
            let error_msg = format!("Unknown command: {}", text.split_whitespace().next().unwrap_or(text));
            let suggestion = "Use /help to see all available commands.";
            feedback.validation_error(&error_msg, suggestion).await?;
        } else if text.to_lowercase().contains("quiz") {
            feedback
                .info("Send me a .txt file with your questions to start a quiz. Use /createquiz to see the format.")
                .await?;
        }
    }

    Ok(())
}
