//! Registry of running quiz dispatches, keyed by chat.

use crate::config::DispatchSettings;
use crate::database::models::StatsEvent;
use crate::error::DispatchError;
use crate::quiz::dispatcher::{
    control_channel, ControlReceiver, ControlSignal, DispatchControl, DispatchEvent, DispatchObserver,
    DispatchReport, DispatchTarget, Dispatcher, PollApi, UserIdentity,
};
use crate::quiz::QuizFile;
use crate::services::stats::StatsRecorder;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

/// A sent poll, remembered so answers can be attributed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedPoll {
    pub chat_id: i64,
    pub run_id: Uuid,
    pub index: usize,
    pub correct_index: usize,
    /// Set for private chats: the only user whose answer advances the quiz.
    pub private_user: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerOutcome {
    pub chat_id: i64,
    pub index: usize,
    pub correct: bool,
    pub advanced: bool,
}

struct RunningQuiz {
    run_id: Uuid,
    control: DispatchControl,
}

#[derive(Default)]
struct Registry {
    running: HashMap<i64, RunningQuiz>,
    polls: HashMap<String, TrackedPoll>,
}

pub struct QuizSessions {
    registry: Mutex<Registry>,
    dispatcher: Dispatcher,
    recorder: StatsRecorder,
}

impl QuizSessions {
    pub fn new(api: Arc<dyn PollApi>, settings: DispatchSettings, recorder: StatsRecorder) -> Self {
        Self {
            registry: Mutex::new(Registry::default()),
            dispatcher: Dispatcher::new(api, settings),
            recorder,
        }
    }

    pub fn settings(&self) -> &DispatchSettings {
        self.dispatcher.settings()
    }

    /// Claims the chat for a new dispatch. Returns `None` while another quiz is running there.
    pub async fn try_begin(&self, target: &DispatchTarget) -> Option<ControlReceiver> {
        let mut registry = self.registry.lock().await;
        if registry.running.contains_key(&target.chat_id) {
            return None;
        }
        let (control, receiver) = control_channel();
        registry.running.insert(
            target.chat_id,
            RunningQuiz {
                run_id: target.run_id,
                control,
            },
        );
        Some(receiver)
    }

    /// Runs a claimed dispatch to the end and releases the chat.
    pub async fn run(
        &self,
        quiz: &QuizFile,
        target: &DispatchTarget,
        mut control: ControlReceiver,
    ) -> Result<DispatchReport, DispatchError> {
        let result = self.dispatcher.run(quiz, target, &mut control, self).await;
        self.finish(target).await;
        result
    }

    async fn finish(&self, target: &DispatchTarget) {
        let mut registry = self.registry.lock().await;
        if registry
            .running
            .get(&target.chat_id)
            .is_some_and(|running| running.run_id == target.run_id)
        {
            registry.running.remove(&target.chat_id);
        }
        registry.polls.retain(|_, poll| poll.run_id != target.run_id);
    }

    pub async fn is_running(&self, chat_id: i64) -> bool {
        self.registry.lock().await.running.contains_key(&chat_id)
    }

    /// Asks the quiz running in `chat_id` to stop. Returns false if none is running.
    pub async fn stop(&self, chat_id: i64) -> bool {
        self.signal(chat_id, ControlSignal::Cancel).await
    }

    pub async fn destination_lost(&self, chat_id: i64, reason: &str) -> bool {
        self.signal(
            chat_id,
            ControlSignal::DestinationLost {
                reason: reason.to_string(),
            },
        )
        .await
    }

    async fn signal(&self, chat_id: i64, signal: ControlSignal) -> bool {
        let registry = self.registry.lock().await;
        match registry.running.get(&chat_id) {
            Some(running) => running.control.send(signal),
            None => false,
        }
    }

    /// Attributes a poll answer. Unknown polls (other runs, restarts) are ignored.
    pub async fn on_poll_answer(
        &self,
        poll_id: &str,
        user: &UserIdentity,
        option: Option<usize>,
    ) -> Option<AnswerOutcome> {
        let option = option?;
        let (poll, control) = {
            let registry = self.registry.lock().await;
            let poll = registry.polls.get(poll_id)?.clone();
            let control = registry.running.get(&poll.chat_id).map(|r| r.control.clone());
            (poll, control)
        };

        let correct = option == poll.correct_index;
        let advanced = poll.private_user == Some(user.id)
            && control.is_some_and(|control| control.advance(poll.index));

        if correct {
            self.recorder
                .record_detached(user, &[StatsEvent::AnswerReceived, StatsEvent::CorrectAnswer]);
        } else {
            self.recorder.record_detached(user, &[StatsEvent::AnswerReceived]);
        }

        debug!(
            "Answer on poll {} (chat {}, question {}) by {}: option {} correct={}",
            poll_id,
            poll.chat_id,
            poll.index + 1,
            user.id,
            option,
            correct
        );

        Some(AnswerOutcome {
            chat_id: poll.chat_id,
            index: poll.index,
            correct,
            advanced,
        })
    }
}

#[async_trait]
impl DispatchObserver for QuizSessions {
    async fn on_event(&self, target: &DispatchTarget, event: DispatchEvent<'_>) {
        match event {
            DispatchEvent::PollSent { index, question, handle } => {
                self.registry.lock().await.polls.insert(
                    handle.poll_id.clone(),
                    TrackedPoll {
                        chat_id: target.chat_id,
                        run_id: target.run_id,
                        index,
                        correct_index: question.correct_index(),
                        private_user: target.is_private().then_some(target.user.id),
                    },
                );
                self.recorder.record_detached(&target.user, &[StatsEvent::QuizSent]);
            }
            DispatchEvent::Retrying { index, phase, attempt, .. } => {
                info!(
                    "Dispatch {}: retry {} of question {} ({})",
                    target.run_id,
                    attempt,
                    index + 1,
                    phase
                );
            }
            DispatchEvent::PollClosed { index, reason, .. } => {
                debug!(
                    "Dispatch {}: question {} closed ({:?})",
                    target.run_id,
                    index + 1,
                    reason
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::StatsSummary;
    use crate::error::{DeliveryError, StoreError};
    use crate::quiz::dispatcher::{DispatchOutcome, PollHandle};
    use crate::quiz::parser;
    use crate::quiz::Question;
    use crate::services::stats::StatsStore;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    #[derive(Default)]
    struct CountingStore {
        events: StdMutex<Vec<(i64, StatsEvent)>>,
    }

    #[async_trait]
    impl StatsStore for CountingStore {
        async fn record(&self, user: &UserIdentity, event: StatsEvent) -> Result<(), StoreError> {
            self.events.lock().unwrap().push((user.id, event));
            Ok(())
        }

        async fn touch(&self, _user: &UserIdentity) -> Result<(), StoreError> {
            Ok(())
        }

        async fn summary(&self, _user_filter: Option<i64>) -> Result<StatsSummary, StoreError> {
            Ok(StatsSummary::default())
        }

        async fn user_ids(&self) -> Result<Vec<i64>, StoreError> {
            Ok(Vec::new())
        }

        async fn ping(&self) -> Result<(), StoreError> {
            Ok(())
        }
    }

    /// Store whose writes take `delay`, or never finish when it is `None`.
    struct SlowStore {
        delay: Option<Duration>,
    }

    #[async_trait]
    impl StatsStore for SlowStore {
        async fn record(&self, _user: &UserIdentity, _event: StatsEvent) -> Result<(), StoreError> {
            match self.delay {
                Some(delay) => tokio::time::sleep(delay).await,
                None => std::future::pending::<()>().await,
            }
            Ok(())
        }

        async fn touch(&self, _user: &UserIdentity) -> Result<(), StoreError> {
            Ok(())
        }

        async fn summary(&self, _user_filter: Option<i64>) -> Result<StatsSummary, StoreError> {
            Ok(StatsSummary::default())
        }

        async fn user_ids(&self) -> Result<Vec<i64>, StoreError> {
            Ok(Vec::new())
        }

        async fn ping(&self) -> Result<(), StoreError> {
            Ok(())
        }
    }

    struct NumberedPolls;

    #[async_trait]
    impl PollApi for NumberedPolls {
        async fn create_poll(
            &self,
            chat_id: i64,
            question: &Question,
            _open_period: Duration,
        ) -> Result<PollHandle, DeliveryError> {
            Ok(PollHandle {
                chat_id,
                message_id: 1,
                poll_id: format!("poll-{}", question.prompt()),
            })
        }

        async fn stop_poll(&self, _handle: &PollHandle) -> Result<(), DeliveryError> {
            Ok(())
        }
    }

    fn sessions(store: Arc<dyn StatsStore>) -> Arc<QuizSessions> {
        Arc::new(QuizSessions::new(
            Arc::new(NumberedPolls),
            DispatchSettings::default(),
            StatsRecorder::new(store),
        ))
    }

    fn alice() -> UserIdentity {
        UserIdentity {
            id: 42,
            username: Some("alice".to_string()),
        }
    }

    #[tokio::test]
    async fn test_second_dispatch_in_same_chat_is_refused() {
        let sessions = sessions(Arc::new(CountingStore::default()));
        let first = DispatchTarget::new(-100, alice());
        let second = DispatchTarget::new(-100, alice());

        assert!(sessions.try_begin(&first).await.is_some());
        assert!(sessions.try_begin(&second).await.is_none());
        assert!(sessions.try_begin(&DispatchTarget::new(-200, alice())).await.is_some());
    }

    #[tokio::test]
    async fn test_stop_without_running_quiz() {
        let sessions = sessions(Arc::new(CountingStore::default()));
        assert!(!sessions.stop(-100).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_private_answer_advances_and_is_recorded() {
        let store = Arc::new(CountingStore::default());
        let sessions = sessions(store.clone());
        let quiz = parser::parse("Q1\n*A\nB\n\nQ2\nA\n*B\n").unwrap();
        let target = DispatchTarget::new(42, alice());
        let control = sessions.try_begin(&target).await.unwrap();

        let runner = {
            let sessions = sessions.clone();
            let target = target.clone();
            tokio::spawn(async move { sessions.run(&quiz, &target, control).await })
        };

        tokio::time::sleep(Duration::from_secs(1)).await;
        let outcome = sessions.on_poll_answer("poll-Q1", &alice(), Some(0)).await.unwrap();
        assert!(outcome.correct);
        assert!(outcome.advanced);

        let report = runner.await.unwrap().unwrap();
        assert_eq!(report.sent, 2);
        assert_eq!(report.outcome, DispatchOutcome::Completed);
        assert!(!sessions.is_running(42).await);
        assert!(sessions.on_poll_answer("poll-Q2", &alice(), Some(1)).await.is_none());

        let events = store.events.lock().unwrap().clone();
        assert_eq!(
            events,
            vec![
                (42, StatsEvent::QuizSent),
                (42, StatsEvent::AnswerReceived),
                (42, StatsEvent::CorrectAnswer),
                (42, StatsEvent::QuizSent),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_store_does_not_delay_delivery() {
        let sessions = sessions(Arc::new(SlowStore { delay: None }));
        let quiz = parser::parse("Q1\n*A\nB\n\nQ2\nA\n*B\n").unwrap();
        let target = DispatchTarget::new(-100, alice());
        let control = sessions.try_begin(&target).await.unwrap();
        let start = tokio::time::Instant::now();

        let report = sessions.run(&quiz, &target, control).await.unwrap();

        assert_eq!(report.sent, 2);
        assert_eq!(report.outcome, DispatchOutcome::Completed);
        // Two 10 s windows and one 2 s pause.
        assert!(start.elapsed() < Duration::from_secs(23));
    }

    #[tokio::test(start_paused = true)]
    async fn test_private_answer_advances_before_slow_store_finishes() {
        let sessions = sessions(Arc::new(SlowStore {
            delay: Some(Duration::from_secs(2)),
        }));
        let quiz = parser::parse("Q1\n*A\nB\n").unwrap();
        let target = DispatchTarget::new(42, alice());
        let control = sessions.try_begin(&target).await.unwrap();
        let start = tokio::time::Instant::now();

        let runner = {
            let sessions = sessions.clone();
            let target = target.clone();
            tokio::spawn(async move { sessions.run(&quiz, &target, control).await })
        };

        tokio::time::sleep(Duration::from_millis(500)).await;
        let outcome = sessions.on_poll_answer("poll-Q1", &alice(), Some(1)).await.unwrap();
        assert!(!outcome.correct);
        assert!(outcome.advanced);

        let report = runner.await.unwrap().unwrap();
        assert_eq!(report.sent, 1);
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
