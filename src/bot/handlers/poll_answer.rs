use super::{BotContext, HandlerResult};
use crate::bot::telegram::identity;
use teloxide::types::PollAnswer;

pub async fn poll_answer_handler(answer: PollAnswer, ctx: BotContext) -> HandlerResult {
    let user = identity(&answer.user);
    let option = answer.option_ids.first().map(|&id| id as usize);

    match ctx.sessions.on_poll_answer(&answer.poll_id, &user, option).await {
        Some(outcome) if outcome.advanced => tracing::debug!(
            "Private answer by {} advanced chat {} past question {}",
            user.id,
            outcome.chat_id,
            outcome.index + 1
        ),
        Some(_) => {}
        None => tracing::debug!("Ignoring answer to untracked poll {}", answer.poll_id),
    }
    Ok(())
}
