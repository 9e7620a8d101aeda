/// Command enum and the command/document handlers
pub mod commands;
/// Update routing, dialogue state and handler context
pub mod handlers;
/// Teloxide-backed poll and message delivery
pub mod telegram;
