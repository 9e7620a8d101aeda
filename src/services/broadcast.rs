use crate::error::DeliveryError;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Plain-text delivery to a single chat.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), DeliveryError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastSummary {
    pub sent: usize,
    pub failed: usize,
}

impl BroadcastSummary {
    pub fn total(&self) -> usize {
        self.sent + self.failed
    }
}

/// Sends `text` to every recipient with at most `concurrency` sends in flight.
///
/// Failures are counted, not retried, and never stop the rest of the batch.
pub async fn broadcast(
    messenger: &dyn Messenger,
    recipients: &[i64],
    text: &str,
    concurrency: usize,
) -> BroadcastSummary {
    info!(
        "Broadcasting to {} recipient(s), concurrency {}",
        recipients.len(),
        concurrency
    );

    let summary = stream::iter(recipients.iter().copied())
        .map(|chat_id| async move { (chat_id, messenger.send_text(chat_id, text).await) })
        .buffer_unordered(concurrency.max(1))
        .fold(BroadcastSummary::default(), |mut summary, (chat_id, result)| async move {
            match result {
                Ok(()) => summary.sent += 1,
                Err(e) => {
                    warn!("Broadcast failed for {}: {}", chat_id, e);
                    summary.failed += 1;
                }
            }
            summary
        })
        .await;

    info!(
        "Broadcast complete: {} sent, {} failed",
        summary.sent, summary.failed
    );
    summary
}
