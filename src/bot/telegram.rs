//! teloxide-backed implementations of the outbound poll and message APIs.

use crate::error::DeliveryError;
use crate::quiz::dispatcher::{PollApi, PollHandle, UserIdentity};
use crate::quiz::Question;
use crate::services::broadcast::Messenger;
use async_trait::async_trait;
use std::time::Duration;
use teloxide::prelude::*;
use teloxide::types::{MessageId, PollType, User};
use teloxide::{ApiError, RequestError};
use tracing::debug;

/// Telegram accepts open periods of 5 to 600 seconds.
const MAX_OPEN_PERIOD_SECS: u64 = 600;

#[derive(Clone)]
pub struct TelegramGateway {
    bot: Bot,
}

impl TelegramGateway {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl PollApi for TelegramGateway {
    async fn create_poll(
        &self,
        chat_id: i64,
        question: &Question,
        open_period: Duration,
    ) -> Result<PollHandle, DeliveryError> {
        let open_period = open_period.as_secs().min(MAX_OPEN_PERIOD_SECS) as u16;
        let mut request = self
            .bot
            .send_poll(ChatId(chat_id), question.prompt(), question.options().to_vec())
            .type_(PollType::Quiz)
            .correct_option_id(question.correct_index() as u8)
            .is_anonymous(false)
            .open_period(open_period);
        if let Some(explanation) = question.explanation() {
            request = request.explanation(explanation);
        }

        let sent = request.await.map_err(normalize)?;
        let poll = sent
            .poll()
            .ok_or_else(|| DeliveryError::Rejected("sent message carries no poll".to_string()))?;

        Ok(PollHandle {
            chat_id,
            message_id: sent.id.0,
            poll_id: poll.id.clone(),
        })
    }

    async fn stop_poll(&self, handle: &PollHandle) -> Result<(), DeliveryError> {
        match self
            .bot
            .stop_poll(ChatId(handle.chat_id), MessageId(handle.message_id))
            .await
        {
            Ok(_) => Ok(()),
            // The open period can run out just before the explicit stop.
            Err(e) if is_already_closed(&e) => {
                debug!("Poll {} was already closed", handle.poll_id);
                Ok(())
            }
            Err(e) => Err(normalize(e)),
        }
    }
}

#[async_trait]
impl Messenger for TelegramGateway {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), DeliveryError> {
        self.bot
            .send_message(ChatId(chat_id), text)
            .await
            .map(|_| ())
            .map_err(normalize)
    }
}

fn is_already_closed(error: &RequestError) -> bool {
    matches!(error, RequestError::Api(ApiError::PollHasAlreadyClosed))
}

/// Maps a teloxide request failure onto the delivery taxonomy.
pub fn normalize(error: RequestError) -> DeliveryError {
    let text = error.to_string();
    match error {
        RequestError::Api(
            ApiError::BotBlocked
            | ApiError::BotKicked
            | ApiError::BotKickedFromSupergroup
            | ApiError::ChatNotFound
            | ApiError::UserDeactivated
            | ApiError::CantInitiateConversation,
        )
        | RequestError::MigrateToChatId(_) => DeliveryError::ChatUnavailable(text),
        RequestError::RetryAfter(_) | RequestError::Network(_) | RequestError::Io(_) => {
            DeliveryError::Transient(text)
        }
        _ => DeliveryError::Rejected(text),
    }
}

pub fn identity(user: &User) -> UserIdentity {
    UserIdentity {
        id: user.id.0 as i64,
        username: user.username.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocked_and_kicked_are_chat_unavailable() {
        for api in [ApiError::BotBlocked, ApiError::BotKicked, ApiError::ChatNotFound] {
            assert!(normalize(RequestError::Api(api)).is_chat_unavailable());
        }
    }

    #[test]
    fn test_other_api_errors_are_rejected() {
        let error = normalize(RequestError::Api(ApiError::Unknown("Bad Request: poll can't be stopped".to_string())));
        assert!(matches!(error, DeliveryError::Rejected(_)));
    }

    #[test]
    fn test_already_closed_detection() {
        assert!(is_already_closed(&RequestError::Api(ApiError::PollHasAlreadyClosed)));
        assert!(!is_already_closed(&RequestError::Api(ApiError::BotBlocked)));
        assert!(!is_already_closed(&RequestError::Api(ApiError::Unknown(
            "Bad Request: poll can't be stopped".to_string()
        ))));
    }
}
