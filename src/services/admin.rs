//! Owner gate and text rendering for the admin commands.

use crate::database::models::StatsSummary;
use crate::error::PermissionError;
use crate::services::broadcast::BroadcastSummary;
use crate::services::health::HealthReport;
use crate::utils::markdown::truncate;

/// Checks admin commands against the single configured owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdminGate {
    owner_id: Option<i64>,
}

impl AdminGate {
    pub fn new(owner_id: Option<i64>) -> Self {
        Self { owner_id }
    }

    pub fn authorize(&self, command: &str, user_id: i64) -> Result<(), PermissionError> {
        match self.owner_id {
            Some(owner) if owner == user_id => Ok(()),
            Some(_) => Err(PermissionError::NotOwner {
                command: command.to_string(),
                user_id,
            }),
            None => Err(PermissionError::NoOwnerConfigured {
                command: command.to_string(),
            }),
        }
    }
}

pub fn render_stats(summary: &StatsSummary) -> String {
    let mut text = format!(
        "📊 Bot statistics\n\n\
         👥 Users: {}\n\
         📝 Questions served: {}\n\
         🙋 Answers: {}\n\
         ✅ Correct answers: {}\n",
        summary.total_users, summary.total_quizzes_served, summary.total_answers, summary.total_correct
    );

    if !summary.leaderboard.is_empty() {
        text.push_str("\n🏆 Leaderboard:\n");
        for (i, entry) in summary.leaderboard.iter().enumerate() {
            let medal = match i {
                0 => "🥇",
                1 => "🥈",
                2 => "🥉",
                _ => "🏅",
            };
            let name = entry
                .username
                .as_deref()
                .map(|u| format!("@{u}"))
                .unwrap_or_else(|| entry.user_id.to_string());
            text.push_str(&format!(
                "{} {} - {}/{} correct\n",
                medal, name, entry.correct_answers, entry.answers_given
            ));
        }
    }

    if let Some(user) = &summary.user {
        text.push_str(&format!(
            "\n👤 User {}{}\n\
             • Questions received: {}\n\
             • Answers: {}\n\
             • Correct: {}\n\
             • Last seen: {}\n",
            user.user_id,
            user.username.as_deref().map(|u| format!(" (@{u})")).unwrap_or_default(),
            user.quizzes_received,
            user.answers_given,
            user.correct_answers,
            user.last_seen
        ));
    }

    text
}

pub fn render_broadcast_confirmation(text: &str, recipients: usize) -> String {
    format!(
        "Confirm broadcast to {} user(s)?\n\nMessage: {}\n\nType /confirm_broadcast to send or /cancel to abort",
        recipients,
        truncate(text, 200)
    )
}

pub fn render_broadcast_summary(summary: &BroadcastSummary) -> String {
    format!(
        "Broadcast complete!\n• Success: {}\n• Failed: {}",
        summary.sent, summary.failed
    )
}

pub fn render_health(report: &HealthReport) -> String {
    let store_line = match &report.store.error {
        Some(error) => format!("❌ {} ({})", report.store.status, error),
        None => format!("✅ {} ({} ms)", report.store.status, report.store.response_time_ms),
    };
    format!(
        "🩺 Health: {}\n• Store: {}\n• Uptime: {}\n• Version: {}",
        report.status,
        store_line,
        format_uptime(report.uptime_seconds),
        report.version
    )
}

pub fn format_uptime(seconds: u64) -> String {
    let days = seconds / 86_400;
    let hours = (seconds % 86_400) / 3_600;
    let minutes = (seconds % 3_600) / 60;
    let secs = seconds % 60;
    if days > 0 {
        format!("{days}d {hours}h {minutes}m")
    } else if hours > 0 {
        format!("{hours}h {minutes}m {secs}s")
    } else {
        format!("{minutes}m {secs}s")
    }
}
