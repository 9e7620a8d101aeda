//! Sequential poll delivery for one quiz in one chat.
//!
//! The dispatcher is an explicit state machine:
//!
//! ```text
//! Idle -> Sending(0) -> AwaitingClose(0) -> Sending(1) -> ... -> Done
//!              \                \
//!               +-> Aborted      +-> Aborted
//! ```
//!
//! Poll N is always stopped before poll N+1 is sent. A poll is closed when its
//! visibility window elapses or when an explicit [`ControlSignal::Advance`] for
//! it arrives.

use crate::config::DispatchSettings;
use crate::error::{DeliveryError, DispatchError, PollPhase};
use crate::quiz::{Question, QuizFile};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Identity of a Telegram user, already stripped of platform payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: i64,
    pub username: Option<String>,
}

impl UserIdentity {
    pub fn display_name(&self) -> &str {
        self.username.as_deref().unwrap_or("unknown")
    }
}

/// Where a quiz is delivered and on whose behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchTarget {
    pub chat_id: i64,
    pub user: UserIdentity,
    pub run_id: Uuid,
}

impl DispatchTarget {
    pub fn new(chat_id: i64, user: UserIdentity) -> Self {
        Self {
            chat_id,
            user,
            run_id: Uuid::new_v4(),
        }
    }

    /// Private chats are the only ones where a single answer can close a poll early.
    pub fn is_private(&self) -> bool {
        self.chat_id == self.user.id
    }
}

/// Handle of a poll that was created on the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollHandle {
    pub chat_id: i64,
    pub message_id: i32,
    pub poll_id: String,
}

/// Outbound poll API.
#[async_trait]
pub trait PollApi: Send + Sync {
    async fn create_poll(
        &self,
        chat_id: i64,
        question: &Question,
        open_period: Duration,
    ) -> Result<PollHandle, DeliveryError>;

    async fn stop_poll(&self, handle: &PollHandle) -> Result<(), DeliveryError>;
}

/// Dispatch states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Idle,
    Sending(usize),
    AwaitingClose(usize),
    Done,
    Aborted,
}

/// Why a poll was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    TimerElapsed,
    StopSignal,
    Cancelled,
}

/// Progress notifications emitted while a sequence runs.
#[derive(Debug)]
pub enum DispatchEvent<'a> {
    PollSent {
        index: usize,
        question: &'a Question,
        handle: &'a PollHandle,
    },
    Retrying {
        index: usize,
        phase: PollPhase,
        attempt: u32,
        error: &'a DeliveryError,
    },
    PollClosed {
        index: usize,
        handle: &'a PollHandle,
        reason: CloseReason,
    },
}

#[async_trait]
pub trait DispatchObserver: Send + Sync {
    async fn on_event(&self, target: &DispatchTarget, event: DispatchEvent<'_>);
}

/// Signals accepted by a running dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlSignal {
    /// Close poll `index` now instead of waiting for the window.
    Advance { index: usize },
    /// Stop the sequence at the user's request.
    Cancel,
    /// The bot lost access to the chat.
    DestinationLost { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Abort {
    Cancel,
    DestinationLost(String),
}

/// Sending half of a dispatch's control channel.
#[derive(Debug, Clone)]
pub struct DispatchControl {
    tx: mpsc::UnboundedSender<ControlSignal>,
}

impl DispatchControl {
    /// Returns false when the sequence already finished.
    pub fn send(&self, signal: ControlSignal) -> bool {
        self.tx.send(signal).is_ok()
    }

    pub fn advance(&self, index: usize) -> bool {
        self.send(ControlSignal::Advance { index })
    }

    pub fn cancel(&self) -> bool {
        self.send(ControlSignal::Cancel)
    }
}

/// Receiving half, owned by the running sequence.
#[derive(Debug)]
pub struct ControlReceiver {
    rx: mpsc::UnboundedReceiver<ControlSignal>,
    abort: Option<Abort>,
    closed: bool,
}

pub fn control_channel() -> (DispatchControl, ControlReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        DispatchControl { tx },
        ControlReceiver {
            rx,
            abort: None,
            closed: false,
        },
    )
}

enum Wake {
    Elapsed,
    Advanced,
    Aborted,
}

impl ControlReceiver {
    /// Drains queued signals without waiting. Stale advances are dropped.
    fn pending_abort(&mut self) -> Option<Abort> {
        self.drain(None);
        self.abort.clone()
    }

    /// Returns true when an advance for `open_poll` was already queued.
    fn drain(&mut self, open_poll: Option<usize>) -> bool {
        let mut advanced = false;
        while self.abort.is_none() {
            match self.rx.try_recv() {
                Ok(signal) => advanced |= self.absorb(signal, open_poll),
                Err(_) => break,
            }
        }
        advanced
    }

    fn absorb(&mut self, signal: ControlSignal, open_poll: Option<usize>) -> bool {
        match signal {
            ControlSignal::Advance { index } => open_poll == Some(index),
            ControlSignal::Cancel => {
                self.abort.get_or_insert(Abort::Cancel);
                false
            }
            ControlSignal::DestinationLost { reason } => {
                self.abort = Some(Abort::DestinationLost(reason));
                false
            }
        }
    }

    /// Sleeps for `duration`, waking early on an abort or on an advance for `open_poll`.
    async fn wait(&mut self, duration: Duration, open_poll: Option<usize>) -> Wake {
        let advanced = self.drain(open_poll);
        if self.abort.is_some() {
            return Wake::Aborted;
        }
        if advanced {
            return Wake::Advanced;
        }
        let sleep = tokio::time::sleep(duration);
        tokio::pin!(sleep);

        loop {
            if self.closed {
                sleep.as_mut().await;
                return Wake::Elapsed;
            }
            tokio::select! {
                _ = sleep.as_mut() => return Wake::Elapsed,
                signal = self.rx.recv() => match signal {
                    Some(signal) => {
                        if self.absorb(signal, open_poll) {
                            return Wake::Advanced;
                        }
                        if self.abort.is_some() {
                            return Wake::Aborted;
                        }
                    }
                    None => self.closed = true,
                },
            }
        }
    }
}

/// How a sequence that did not fail ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Completed,
    /// Cancelled by the user before question `next_index` was sent.
    Cancelled { next_index: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    pub total: usize,
    pub sent: usize,
    /// Individual retry attempts across the run.
    pub retries: u32,
    /// Polls that needed at least one retry.
    pub retried_polls: usize,
    pub outcome: DispatchOutcome,
    pub final_state: DispatchState,
}

enum Attempt<T> {
    Done(T),
    Aborted(Abort),
}

pub struct Dispatcher {
    api: Arc<dyn PollApi>,
    settings: DispatchSettings,
}

impl Dispatcher {
    pub fn new(api: Arc<dyn PollApi>, settings: DispatchSettings) -> Self {
        Self { api, settings }
    }

    pub fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    pub async fn run(
        &self,
        quiz: &QuizFile,
        target: &DispatchTarget,
        control: &mut ControlReceiver,
        observer: &dyn DispatchObserver,
    ) -> Result<DispatchReport, DispatchError> {
        let mut report = DispatchReport {
            total: quiz.len(),
            sent: 0,
            retries: 0,
            retried_polls: 0,
            outcome: DispatchOutcome::Completed,
            final_state: DispatchState::Idle,
        };
        let mut state = DispatchState::Idle;
        let mut open: Option<PollHandle> = None;

        info!(
            "Dispatch {} started: {} question(s) to chat {} for {}({})",
            target.run_id,
            quiz.len(),
            target.chat_id,
            target.user.display_name(),
            target.user.id
        );

        loop {
            let next = match state {
                DispatchState::Idle => {
                    if quiz.is_empty() {
                        DispatchState::Done
                    } else {
                        DispatchState::Sending(0)
                    }
                }
                DispatchState::Sending(index) => {
                    let question = &quiz.questions()[index];
                    let window = self.settings.poll_window();
                    let api = &self.api;
                    let chat_id = target.chat_id;
                    let sent = self
                        .with_retry(index, PollPhase::Send, target, control, observer, &mut report, move || {
                            api.create_poll(chat_id, question, window)
                        })
                        .await?;

                    match sent {
                        Attempt::Done(handle) => {
                            report.sent += 1;
                            observer
                                .on_event(target, DispatchEvent::PollSent { index, question, handle: &handle })
                                .await;
                            open = Some(handle);
                            DispatchState::AwaitingClose(index)
                        }
                        Attempt::Aborted(abort) => {
                            Self::abort(index, abort, &mut report)?;
                            DispatchState::Aborted
                        }
                    }
                }
                DispatchState::AwaitingClose(index) => {
                    let handle = match open.take() {
                        Some(handle) => handle,
                        None => return Err(DispatchError::Delivery {
                            index,
                            phase: PollPhase::Stop,
                            attempts: 0,
                            source: DeliveryError::Rejected("no open poll to close".to_string()),
                        }),
                    };

                    let reason = match control.wait(self.settings.poll_window(), Some(index)).await {
                        Wake::Elapsed => CloseReason::TimerElapsed,
                        Wake::Advanced => CloseReason::StopSignal,
                        Wake::Aborted => CloseReason::Cancelled,
                    };
                    if let Some(Abort::DestinationLost(reason)) = control.pending_abort() {
                        return Err(DispatchError::DestinationUnavailable { index, reason });
                    }

                    let api = &self.api;
                    let open_handle = &handle;
                    let stopped = self
                        .with_retry(index, PollPhase::Stop, target, control, observer, &mut report, move || {
                            api.stop_poll(open_handle)
                        })
                        .await?;
                    if let Attempt::Aborted(Abort::DestinationLost(reason)) = stopped {
                        return Err(DispatchError::DestinationUnavailable { index, reason });
                    }
                    observer
                        .on_event(target, DispatchEvent::PollClosed { index, handle: &handle, reason })
                        .await;

                    if let Some(abort) = control.pending_abort() {
                        Self::abort(index + 1, abort, &mut report)?;
                        DispatchState::Aborted
                    } else if index + 1 == quiz.len() {
                        DispatchState::Done
                    } else {
                        match control.wait(self.settings.inter_poll_delay(), None).await {
                            Wake::Aborted => match control.pending_abort() {
                                Some(abort) => {
                                    Self::abort(index + 1, abort, &mut report)?;
                                    DispatchState::Aborted
                                }
                                None => DispatchState::Sending(index + 1),
                            },
                            Wake::Elapsed | Wake::Advanced => DispatchState::Sending(index + 1),
                        }
                    }
                }
                DispatchState::Done | DispatchState::Aborted => {
                    report.final_state = state;
                    info!(
                        "Dispatch {} finished in state {:?}: {}/{} sent, {} retries",
                        target.run_id, state, report.sent, report.total, report.retries
                    );
                    return Ok(report);
                }
            };

            debug!("Dispatch {}: {:?} -> {:?}", target.run_id, state, next);
            state = next;
        }
    }

    /// Records a user cancellation, or turns a lost destination into an error.
    fn abort(next_index: usize, abort: Abort, report: &mut DispatchReport) -> Result<(), DispatchError> {
        match abort {
            Abort::Cancel => {
                report.outcome = DispatchOutcome::Cancelled { next_index };
                Ok(())
            }
            Abort::DestinationLost(reason) => Err(DispatchError::DestinationUnavailable {
                index: next_index.min(report.total.saturating_sub(1)),
                reason,
            }),
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn with_retry<T, F, Fut>(
        &self,
        index: usize,
        phase: PollPhase,
        target: &DispatchTarget,
        control: &mut ControlReceiver,
        observer: &dyn DispatchObserver,
        report: &mut DispatchReport,
        mut call: F,
    ) -> Result<Attempt<T>, DispatchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DeliveryError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            // A stop after a user cancel must still go out, so only sends honour Cancel here.
            match control.pending_abort() {
                Some(Abort::DestinationLost(reason)) => {
                    return Ok(Attempt::Aborted(Abort::DestinationLost(reason)))
                }
                Some(Abort::Cancel) if phase == PollPhase::Send => {
                    return Ok(Attempt::Aborted(Abort::Cancel))
                }
                _ => {}
            }

            attempt += 1;
            let error = match call().await {
                Ok(value) => return Ok(Attempt::Done(value)),
                Err(error) => error,
            };

            if error.is_chat_unavailable() {
                warn!(
                    "Dispatch {}: chat {} unavailable at question {}: {}",
                    target.run_id, target.chat_id, index + 1, error
                );
                return Err(DispatchError::DestinationUnavailable {
                    index,
                    reason: error.to_string(),
                });
            }

            if attempt > self.settings.max_retries {
                warn!(
                    "Dispatch {}: giving up on question {} ({}) after {} attempt(s): {}",
                    target.run_id, index + 1, phase, attempt, error
                );
                return Err(DispatchError::Delivery {
                    index,
                    phase,
                    attempts: attempt,
                    source: error,
                });
            }

            report.retries += 1;
            if attempt == 1 && phase == PollPhase::Send {
                report.retried_polls += 1;
            }
            let backoff = self.settings.backoff(attempt);
            warn!(
                "Dispatch {}: {} failed for question {} (attempt {}), retrying in {:?}: {}",
                target.run_id, phase, index + 1, attempt, backoff, error
            );
            observer
                .on_event(target, DispatchEvent::Retrying { index, phase, attempt, error: &error })
                .await;
            tokio::time::sleep(backoff).await;
        }
    }
}
