use super::{BotContext, HandlerResult};
use crate::utils::logging::log_system_event;
use teloxide::types::ChatMemberUpdated;

/// Aborts a running quiz once the bot is removed from its chat.
pub async fn my_chat_member_handler(update: ChatMemberUpdated, ctx: BotContext) -> HandlerResult {
    let kind = &update.new_chat_member.kind;
    if !(kind.is_left() || kind.is_banned()) {
        return Ok(());
    }

    let chat_id = update.chat.id.0;
    let reason = if kind.is_banned() {
        "bot was kicked from the chat"
    } else {
        "bot left the chat"
    };
    log_system_event("MEMBERSHIP_LOST", Some(&format!("chat {chat_id}: {reason}")));

    if ctx.sessions.destination_lost(chat_id, reason).await {
        tracing::info!("Signalled running quiz in chat {} to abort", chat_id);
    }
    Ok(())
}
