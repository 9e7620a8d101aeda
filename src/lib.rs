//! # Quiz Poll Bot
//!
//! A Telegram bot that turns plain-text question files into timed quiz polls.
//!
//! ## Features
//! - Line-based quiz file format with precise, line-numbered error reports
//! - Sequential poll delivery with a fixed visibility window per question
//! - Per-user statistics (questions received, answers, correct answers)
//! - Owner-only commands: statistics, broadcast, health
//! - HTTP health endpoint for uptime monitors

/// Bot command handlers, update routing and the Telegram adapter
pub mod bot;
/// Configuration management and environment variables
pub mod config;
/// Database models, connections, and migrations
pub mod database;
/// Error taxonomy
pub mod error;
/// Quiz file parsing and poll dispatch
pub mod quiz;
/// Stats, broadcast, health and quiz session services
pub mod services;
/// Logging, feedback and formatting helpers
pub mod utils;
