use crate::bot::handlers::BotContext;
use crate::error::{DispatchError, FormatError};
use crate::quiz::dispatcher::{DispatchOutcome, DispatchReport, DispatchTarget, UserIdentity};
use crate::quiz::parser;
use crate::utils::feedback::CommandFeedback;
use crate::utils::logging::{log_format_errors, log_system_event};
use crate::utils::markdown::truncate;
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::Document;

/// Largest quiz file accepted for download.
pub const MAX_FILE_SIZE: u64 = 1024 * 1024;
/// Errors listed in one reply; the rest are summarized.
const MAX_REPORTED_ERRORS: usize = 15;

pub const FORMAT_HELP: &str = "📝 Quiz file format\n\n\
Send a .txt file. Separate questions with a blank line.\n\
• The first line of a block is the question.\n\
• Every following line is an answer option (2 to 10).\n\
• Mark the correct option with a leading *.\n\
• Optionally end the block with an explanation line starting with >.\n\n\
Example:\n\n\
What colour is the sky?\n\
Green\n\
*Blue\n\
Red\n\
> Rayleigh scattering favours short wavelengths\n\n\
2 + 2 = ?\n\
3\n\
*4";

pub async fn handle_create_quiz(bot: Bot, msg: Message) -> ResponseResult<()> {
    bot.send_message(msg.chat.id, FORMAT_HELP).await?;
    Ok(())
}

pub async fn handle_stop_quiz(bot: Bot, msg: Message, ctx: &BotContext) -> ResponseResult<()> {
    let feedback = CommandFeedback::new(bot, msg.chat.id);
    if ctx.sessions.stop(msg.chat.id.0).await {
        feedback.info("Stopping the quiz after the current question...").await?;
    } else {
        feedback.warning("There is no quiz running in this chat.").await?;
    }
    Ok(())
}

fn is_text_document(doc: &Document) -> bool {
    let mime_ok = doc
        .mime_type
        .as_ref()
        .is_some_and(|m| m.to_string().starts_with("text/"));
    let name_ok = doc
        .file_name
        .as_deref()
        .is_some_and(|n| n.to_lowercase().ends_with(".txt"));
    mime_ok || name_ok
}

pub async fn handle_document(
    bot: Bot,
    msg: Message,
    user: UserIdentity,
    ctx: &BotContext,
) -> ResponseResult<()> {
    let Some(doc) = msg.document() else {
        return Ok(());
    };
    let chat_id = msg.chat.id.0;
    let file_name = doc.file_name.clone().unwrap_or_else(|| "quiz.txt".to_string());
    let feedback = CommandFeedback::new(bot.clone(), msg.chat.id);

    tracing::info!(
        "Quiz file '{}' ({} bytes) uploaded by {}({}) in chat {}",
        file_name,
        doc.file.size,
        user.display_name(),
        user.id,
        chat_id
    );

    if !is_text_document(doc) {
        feedback
            .validation_error("Only plain text files are supported.", "Save your questions as a .txt file and send it again.")
            .await?;
        return Ok(());
    }
    if u64::from(doc.file.size) > MAX_FILE_SIZE {
        feedback
            .validation_error("The file is too large (limit is 1 MB).", "Split the quiz into several smaller files.")
            .await?;
        return Ok(());
    }
    if ctx.sessions.is_running(chat_id).await {
        feedback
            .warning("A quiz is already running in this chat. Use /stopquiz to stop it first.")
            .await?;
        return Ok(());
    }

    let file = bot.get_file(&doc.file.id).await?;
    let mut raw = Vec::new();
    if let Err(e) = bot.download_file(&file.path, &mut raw).await {
        tracing::error!("Failed to download quiz file '{}': {}", file_name, e);
        feedback.error("Failed to download the file. Please try again.").await?;
        return Ok(());
    }

    let quiz = match parser::parse_bytes(&raw) {
        Ok(quiz) => quiz,
        Err(format_error) => {
            log_format_errors(&file_name, &format_error.errors, user.id, chat_id);
            feedback.error(&render_format_errors(&format_error)).await?;
            return Ok(());
        }
    };

    let target = DispatchTarget::new(chat_id, user);
    let Some(control) = ctx.sessions.try_begin(&target).await else {
        feedback
            .warning("A quiz is already running in this chat. Use /stopquiz to stop it first.")
            .await?;
        return Ok(());
    };

    feedback
        .success(&format!(
            "Quiz accepted: {} question(s), {} s each. Starting now!",
            quiz.len(),
            ctx.sessions.settings().poll_duration_seconds
        ))
        .await?;
    log_system_event(
        "QUIZ_STARTED",
        Some(&format!("run {} chat {} questions {}", target.run_id, chat_id, quiz.len())),
    );

    let sessions = ctx.sessions.clone();
    tokio::spawn(async move {
        let result = sessions.run(&quiz, &target, control).await;
        if let Err(e) = &result {
            tracing::error!(
                "Dispatch {} aborted at question {}: {}",
                target.run_id,
                e.index() + 1,
                e
            );
        }
        if let Some(text) = render_outcome(&result) {
            let feedback = CommandFeedback::new(bot, ChatId(target.chat_id));
            let sent = match &result {
                Ok(_) => feedback.success(&text).await,
                Err(_) => feedback.error(&text).await,
            };
            if let Err(e) = sent {
                tracing::warn!("Failed to report quiz outcome to chat {}: {}", target.chat_id, e);
            }
        }
    });

    Ok(())
}

pub fn render_format_errors(error: &FormatError) -> String {
    let mut text = format!(
        "Your quiz file has {} problem(s), nothing was sent:\n\n",
        error.errors.len()
    );
    for e in error.errors.iter().take(MAX_REPORTED_ERRORS) {
        text.push_str(&format!("• Line {}: {}", e.line, e.reason.describe()));
        if !e.content.trim().is_empty() {
            text.push_str(&format!(" (\"{}\")", truncate(e.content.trim(), 40)));
        }
        text.push('\n');
    }
    if error.errors.len() > MAX_REPORTED_ERRORS {
        text.push_str(&format!(
            "...and {} more.\n",
            error.errors.len() - MAX_REPORTED_ERRORS
        ));
    }
    text.push_str("\nUse /createquiz to see the expected format.");
    text
}

/// Text reported to the chat when a dispatch ends. `None` when the chat cannot be reached.
pub fn render_outcome(result: &Result<DispatchReport, DispatchError>) -> Option<String> {
    match result {
        Ok(report) => Some(match report.outcome {
            DispatchOutcome::Completed => {
                format!("Quiz finished! {} of {} question(s) sent.", report.sent, report.total)
            }
            DispatchOutcome::Cancelled { next_index } => format!(
                "Quiz stopped after {} of {} question(s).",
                next_index, report.total
            ),
        }),
        Err(e) if e.chat_reachable() => Some(format!("Quiz aborted: {e}")),
        Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DeliveryError, PollPhase};
    use crate::quiz::dispatcher::DispatchState;

    #[test]
    fn test_render_format_errors_lists_lines() {
        let error = parser::parse("Only one option\n*A\n").unwrap_err();
        let text = render_format_errors(&error);
        assert!(text.starts_with("Your quiz file has 1 problem(s)"));
        assert!(text.contains("Line 1:"));
    }

    #[test]
    fn test_render_outcome() {
        let report = DispatchReport {
            total: 3,
            sent: 1,
            retries: 0,
            retried_polls: 0,
            outcome: DispatchOutcome::Cancelled { next_index: 1 },
            final_state: DispatchState::Aborted,
        };
        assert_eq!(
            render_outcome(&Ok(report)).as_deref(),
            Some("Quiz stopped after 1 of 3 question(s).")
        );

        let lost = DispatchError::DestinationUnavailable {
            index: 0,
            reason: "kicked".to_string(),
        };
        assert_eq!(render_outcome(&Err(lost)), None);

        let failed = DispatchError::Delivery {
            index: 1,
            phase: PollPhase::Send,
            attempts: 4,
            source: DeliveryError::Transient("timeout".to_string()),
        };
        assert!(render_outcome(&Err(failed)).unwrap().starts_with("Quiz aborted:"));
    }
}
