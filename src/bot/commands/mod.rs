pub mod admin;
pub mod quiz;

use teloxide::utils::command::BotCommands;

#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Quiz Poll Bot commands:")]
pub enum Command {
    #[command(description = "Display this help message")]
    Help,
    #[command(description = "Start the bot")]
    Start,
    #[command(description = "Show the quiz file format")]
    CreateQuiz,
    #[command(description = "Stop the quiz running in this chat")]
    StopQuiz,
    #[command(description = "(owner) Show usage statistics, optionally for one user id")]
    Stats { arg: String },
    #[command(description = "(owner) Send a message to every user")]
    Broadcast { message: String },
    #[command(rename = "confirm_broadcast", description = "(owner) Send the pending broadcast")]
    ConfirmBroadcast,
    #[command(description = "(owner) Drop the pending broadcast")]
    Cancel,
    #[command(description = "(owner) Show bot health")]
    Health,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Help => "help",
            Command::Start => "start",
            Command::CreateQuiz => "createquiz",
            Command::StopQuiz => "stopquiz",
            Command::Stats { .. } => "stats",
            Command::Broadcast { .. } => "broadcast",
            Command::ConfirmBroadcast => "confirm_broadcast",
            Command::Cancel => "cancel",
            Command::Health => "health",
        }
    }
}
