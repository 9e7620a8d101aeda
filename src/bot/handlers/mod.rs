pub mod general_message;
pub mod membership;
pub mod message;
pub mod poll_answer;

use crate::bot::commands::Command;
use crate::services::admin::AdminGate;
use crate::services::broadcast::Messenger;
use crate::services::health::HealthProbe;
use crate::services::quiz_session::QuizSessions;
use crate::services::stats::StatsRecorder;
use std::sync::Arc;
use teloxide::{
    dispatching::{
        dialogue::{self, InMemStorage},
        UpdateHandler,
    },
    prelude::*,
    types::{ChatMemberUpdated, PollAnswer},
};

pub type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync + 'static>>;

/// Per-chat state of the owner's broadcast confirmation flow.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum AdminState {
    #[default]
    Idle,
    ConfirmBroadcast {
        text: String,
    },
}

pub type AdminDialogue = Dialogue<AdminState, InMemStorage<AdminState>>;

/// Services shared by every update handler.
#[derive(Clone)]
pub struct BotContext {
    pub sessions: Arc<QuizSessions>,
    pub recorder: StatsRecorder,
    pub gate: AdminGate,
    pub health: HealthProbe,
    pub messenger: Arc<dyn Messenger>,
    pub broadcast_concurrency: usize,
}

pub struct BotHandler {
    pub ctx: BotContext,
}

impl BotHandler {
    pub fn new(ctx: BotContext) -> Self {
        Self { ctx }
    }

    pub fn schema(&self) -> UpdateHandler<Box<dyn std::error::Error + Send + Sync + 'static>> {
        use teloxide::dispatching::UpdateFilterExt;

        let ctx_command = self.ctx.clone();
        let ctx_document = self.ctx.clone();
        let ctx_text = self.ctx.clone();
        let ctx_answer = self.ctx.clone();
        let ctx_member = self.ctx.clone();

        // Poll answers and membership updates carry no chat for the dialogue, so they sit outside it.
        dptree::entry()
            .branch(
                dialogue::enter::<Update, InMemStorage<AdminState>, AdminState, _>()
                    .branch(
                        Update::filter_message()
                            .filter_command::<Command>()
                            .endpoint(move |bot: Bot, msg: Message, cmd: Command, dialogue: AdminDialogue| {
                                let ctx = ctx_command.clone();
                                async move { message::command_handler(bot, msg, cmd, dialogue, ctx).await }
                            }),
                    )
                    .branch(
                        Update::filter_message()
                            .filter(|msg: Message| msg.document().is_some())
                            .endpoint(move |bot: Bot, msg: Message| {
                                let ctx = ctx_document.clone();
                                async move { message::document_handler(bot, msg, ctx).await }
                            }),
                    )
                    .branch(Update::filter_message().endpoint(move |bot: Bot, msg: Message| {
                        let ctx = ctx_text.clone();
                        async move { general_message::handle_general_message(bot, msg, ctx).await }
                    })),
            )
            .branch(Update::filter_poll_answer().endpoint(move |answer: PollAnswer| {
                let ctx = ctx_answer.clone();
                async move { poll_answer::poll_answer_handler(answer, ctx).await }
            }))
            .branch(Update::filter_my_chat_member().endpoint(move |update: ChatMemberUpdated| {
                let ctx = ctx_member.clone();
                async move { membership::my_chat_member_handler(update, ctx).await }
            }))
    }
}
