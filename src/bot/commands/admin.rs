use crate::bot::handlers::{AdminDialogue, AdminState, BotContext, HandlerResult};
use crate::bot::telegram::identity;
use crate::services::admin::{
    render_broadcast_confirmation, render_broadcast_summary, render_health, render_stats,
};
use crate::services::broadcast::broadcast;
use crate::utils::feedback::{CommandFeedback, FeedbackType};
use crate::utils::logging::CommandLog;
use teloxide::prelude::*;

/// Replies with a denial and returns false unless the sender is the owner.
async fn ensure_owner(bot: &Bot, msg: &Message, command: &str, ctx: &BotContext) -> ResponseResult<bool> {
    let Some(user) = msg.from().map(identity) else {
        return Ok(false);
    };
    match ctx.gate.authorize(command, user.id) {
        Ok(()) => Ok(true),
        Err(e) => {
            CommandLog::new(command, &user, msg.chat.id.0).denied();
            tracing::debug!("{}", e);
            bot.send_message(msg.chat.id, "⛔ This command is only available to the bot owner.")
                .await?;
            Ok(false)
        }
    }
}

pub async fn handle_stats(bot: Bot, msg: Message, arg: String, ctx: &BotContext) -> ResponseResult<()> {
    if !ensure_owner(&bot, &msg, "stats", ctx).await? {
        return Ok(());
    }
    let feedback = CommandFeedback::new(bot.clone(), msg.chat.id);

    let arg = arg.trim();
    let user_filter = if arg.is_empty() {
        None
    } else {
        match arg.parse::<i64>() {
            Ok(id) => Some(id),
            Err(_) => {
                feedback
                    .validation_error(&format!("'{arg}' is not a user id."), "Use /stats or /stats <numeric user id>.")
                    .await?;
                return Ok(());
            }
        }
    };

    let processing = feedback.send_processing("Collecting statistics...").await?;
    match ctx.recorder.summary(user_filter).await {
        Ok(summary) => {
            let mut text = render_stats(&summary);
            if let (Some(id), None) = (user_filter, &summary.user) {
                text.push_str(&format!("\nNo record for user {id}.\n"));
            }
            bot.delete_message(msg.chat.id, processing.id).await.ok();
            bot.send_message(msg.chat.id, text).await?;
        }
        Err(e) => {
            tracing::error!("Failed to load stats: {}", e);
            feedback
                .update_message(processing.id, FeedbackType::Error, &format!("Failed to load statistics: {e}"))
                .await?;
        }
    }
    Ok(())
}

pub async fn handle_broadcast(
    bot: Bot,
    msg: Message,
    message: String,
    dialogue: AdminDialogue,
    ctx: &BotContext,
) -> HandlerResult {
    if !ensure_owner(&bot, &msg, "broadcast", ctx).await? {
        return Ok(());
    }
    let feedback = CommandFeedback::new(bot.clone(), msg.chat.id);

    let reply = msg.reply_to_message();
    let Some(text) = broadcast_text(
        &message,
        reply.and_then(|r| r.text()),
        reply.and_then(|r| r.caption()),
    ) else {
        feedback
            .validation_error(
                "Nothing to broadcast.",
                "Use /broadcast <message> or reply to a text message with /broadcast.",
            )
            .await?;
        return Ok(());
    };

    let recipients = match ctx.recorder.user_ids().await {
        Ok(ids) => ids,
        Err(e) => {
            tracing::error!("Failed to load broadcast recipients: {}", e);
            feedback.error(&format!("Failed to load recipients: {e}")).await?;
            return Ok(());
        }
    };

    bot.send_message(msg.chat.id, render_broadcast_confirmation(&text, recipients.len()))
        .await?;
    dialogue.update(AdminState::ConfirmBroadcast { text }).await?;
    Ok(())
}

/// Inline text wins; otherwise the replied-to message's text, then its caption.
fn broadcast_text(inline: &str, reply_text: Option<&str>, reply_caption: Option<&str>) -> Option<String> {
    let text = match inline.trim() {
        "" => reply_text.or(reply_caption)?.trim(),
        inline => inline,
    };
    (!text.is_empty()).then(|| text.to_string())
}

pub async fn handle_confirm_broadcast(
    bot: Bot,
    msg: Message,
    dialogue: AdminDialogue,
    ctx: &BotContext,
) -> HandlerResult {
    if !ensure_owner(&bot, &msg, "confirm_broadcast", ctx).await? {
        return Ok(());
    }
    let feedback = CommandFeedback::new(bot.clone(), msg.chat.id);

    let AdminState::ConfirmBroadcast { text } = dialogue.get_or_default().await? else {
        feedback
            .warning("There is no pending broadcast. Start one with /broadcast <message>.")
            .await?;
        return Ok(());
    };
    dialogue.exit().await?;

    let recipients = match ctx.recorder.user_ids().await {
        Ok(ids) => ids,
        Err(e) => {
            tracing::error!("Failed to load broadcast recipients: {}", e);
            feedback.error(&format!("Failed to load recipients: {e}")).await?;
            return Ok(());
        }
    };

    let processing = feedback
        .send_processing(&format!("Broadcasting to {} user(s)...", recipients.len()))
        .await?;
    let summary = broadcast(ctx.messenger.as_ref(), &recipients, &text, ctx.broadcast_concurrency).await;
    feedback
        .update_message(processing.id, FeedbackType::Success, &render_broadcast_summary(&summary))
        .await?;
    Ok(())
}

pub async fn handle_cancel(bot: Bot, msg: Message, dialogue: AdminDialogue, ctx: &BotContext) -> HandlerResult {
    if !ensure_owner(&bot, &msg, "cancel", ctx).await? {
        return Ok(());
    }
    let feedback = CommandFeedback::new(bot, msg.chat.id);
    match dialogue.get_or_default().await? {
        AdminState::ConfirmBroadcast { .. } => {
            dialogue.exit().await?;
            feedback.info("Broadcast cancelled.").await?;
        }
        AdminState::Idle => {
            feedback.info("Nothing to cancel.").await?;
        }
    }
    Ok(())
}

pub async fn handle_health(bot: Bot, msg: Message, ctx: &BotContext) -> ResponseResult<()> {
    if !ensure_owner(&bot, &msg, "health", ctx).await? {
        return Ok(());
    }
    let report = ctx.health.check().await;
    bot.send_message(msg.chat.id, render_health(&report)).await?;
    Ok(())
}
