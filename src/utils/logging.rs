//! Log lines with fixed prefixes (`CMD_*`, `DB_*`, `TIMEOUT`, `SYSTEM`, ...) so they can be grepped.

use crate::quiz::dispatcher::UserIdentity;
use crate::quiz::ValidationError;
use tracing::{debug, error, info, warn};

/// Logs the lifecycle of one bot command for one user in one chat.
pub struct CommandLog<'a> {
    command: &'a str,
    user: &'a UserIdentity,
    chat_id: i64,
}

impl<'a> CommandLog<'a> {
    pub fn new(command: &'a str, user: &'a UserIdentity, chat_id: i64) -> Self {
        Self { command, user, chat_id }
    }

    pub fn start(&self) {
        info!(
            user_id = self.user.id,
            chat_id = self.chat_id,
            "CMD_START: /{} by {}",
            self.command,
            self.user.display_name()
        );
    }

    pub fn success(&self) {
        info!(
            user_id = self.user.id,
            chat_id = self.chat_id,
            "CMD_SUCCESS: /{} by {}",
            self.command,
            self.user.display_name()
        );
    }

    pub fn error(&self, error: &str) {
        error!(
            user_id = self.user.id,
            chat_id = self.chat_id,
            "CMD_ERROR: /{} by {} - {}",
            self.command,
            self.user.display_name(),
            error
        );
    }

    pub fn denied(&self) {
        warn!(
            user_id = self.user.id,
            chat_id = self.chat_id,
            "PERMISSION_DENIED: /{} by {}",
            self.command,
            self.user.display_name()
        );
    }
}

/// One summary line per rejected file, one debug line per error.
pub fn log_format_errors(file_name: &str, errors: &[ValidationError], user_id: i64, chat_id: i64) {
    warn!(
        user_id,
        chat_id,
        "VALIDATION_ERROR: quiz file '{}' rejected with {} error(s)",
        file_name,
        errors.len()
    );
    for e in errors {
        debug!("VALIDATION_ERROR: '{}' line {} [{}] {:?}", file_name, e.line, e.reason, e.content);
    }
}

pub fn log_database_operation(operation: &str, table: &str, details: &str) {
    debug!("DB_OP: {} on {} - {}", operation, table, details);
}

pub fn log_database_error(operation: &str, table: &str, error: &str, details: &str) {
    error!("DB_ERROR: {} on {} failed: {} - {}", operation, table, error, details);
}

pub fn log_timeout(operation: &str, duration_secs: u64) {
    warn!("TIMEOUT: {} after {}s", operation, duration_secs);
}

pub fn log_system_event(event: &str, details: Option<&str>) {
    match details {
        Some(d) => info!("SYSTEM: {} - {}", event, d),
        None => info!("SYSTEM: {}", event),
    }
}
