pub mod admin;
pub mod broadcast;
pub mod health;
pub mod quiz_session;
pub mod stats;
