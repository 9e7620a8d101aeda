use super::{AdminDialogue, BotContext, HandlerResult};
use crate::bot::commands::{admin, quiz, Command};
use crate::bot::telegram::identity;
use crate::utils::logging::CommandLog;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

pub async fn command_handler(
    bot: Bot,
    msg: Message,
    cmd: Command,
    dialogue: AdminDialogue,
    ctx: BotContext,
) -> HandlerResult {
    let Some(user) = msg.from().map(identity) else {
        return Ok(());
    };
    let log = CommandLog::new(cmd.name(), &user, msg.chat.id.0);
    log.start();
    ctx.recorder.touch(&user).await;

    let result: HandlerResult = match cmd.clone() {
        Command::Help => bot
            .send_message(msg.chat.id, Command::descriptions().to_string())
            .await
            .map(|_| ())
            .map_err(Into::into),
        Command::Start => bot
            .send_message(
                msg.chat.id,
                "🧠 Welcome to Quiz Poll Bot!\n\nSend me a .txt file with your questions and I'll turn it into a series of quiz polls.\nUse /createquiz to see the file format.\nUse /help to see all commands.",
            )
            .await
            .map(|_| ())
            .map_err(Into::into),
        Command::CreateQuiz => quiz::handle_create_quiz(bot, msg.clone()).await.map_err(Into::into),
        Command::StopQuiz => quiz::handle_stop_quiz(bot, msg.clone(), &ctx).await.map_err(Into::into),
        Command::Stats { arg } => admin::handle_stats(bot, msg.clone(), arg, &ctx).await.map_err(Into::into),
        Command::Broadcast { message } => admin::handle_broadcast(bot, msg.clone(), message, dialogue, &ctx).await,
        Command::ConfirmBroadcast => admin::handle_confirm_broadcast(bot, msg.clone(), dialogue, &ctx).await,
        Command::Cancel => admin::handle_cancel(bot, msg.clone(), dialogue, &ctx).await,
        Command::Health => admin::handle_health(bot, msg.clone(), &ctx).await.map_err(Into::into),
    };

    match &result {
        Ok(()) => log.success(),
        Err(e) => log.error(&e.to_string()),
    }
    result
}

pub async fn document_handler(bot: Bot, msg: Message, ctx: BotContext) -> HandlerResult {
    let Some(user) = msg.from().map(identity) else {
        return Ok(());
    };
    ctx.recorder.touch(&user).await;
    quiz::handle_document(bot, msg, user, &ctx).await?;
    Ok(())
}
