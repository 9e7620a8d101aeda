use quiz_poll_bot::bot::commands::Command;
use teloxide::utils::command::BotCommands;

#[cfg(test)]
mod command_parsing_tests {
    use super::*;

    #[test]
    fn test_simple_commands() {
        for (input, expected) in [
            ("/help", Command::Help),
            ("/start", Command::Start),
            ("/createquiz", Command::CreateQuiz),
            ("/stopquiz", Command::StopQuiz),
            ("/confirm_broadcast", Command::ConfirmBroadcast),
            ("/cancel", Command::Cancel),
            ("/health", Command::Health),
        ] {
            assert_eq!(Command::parse(input, "testbot").unwrap(), expected, "input {input}");
        }
    }

    #[test]
    fn test_stats_with_and_without_user() {
        assert_eq!(
            Command::parse("/stats", "testbot").unwrap(),
            Command::Stats { arg: String::new() }
        );
        assert_eq!(
            Command::parse("/stats 12345", "testbot").unwrap(),
            Command::Stats { arg: "12345".to_string() }
        );
    }

    #[test]
    fn test_broadcast_keeps_whole_message() {
        let cmd = Command::parse("/broadcast New quiz pack is out, try it!", "testbot").unwrap();
        assert_eq!(
            cmd,
            Command::Broadcast {
                message: "New quiz pack is out, try it!".to_string()
            }
        );
        assert_eq!(cmd.name(), "broadcast");
    }

    #[test]
    fn test_command_with_bot_mention() {
        let result = Command::parse("/help@testbot", "testbot");
        assert_eq!(result.unwrap(), Command::Help);
    }

    #[test]
    fn test_invalid_command() {
        assert!(Command::parse("/invalid", "testbot").is_err());
        assert!(Command::parse("/quiz", "testbot").is_err());
    }

    #[test]
    fn test_descriptions_list_every_command() {
        let help = Command::descriptions().to_string();
        for name in ["/createquiz", "/stopquiz", "/stats", "/broadcast", "/confirm_broadcast", "/health"] {
            assert!(help.contains(name), "missing {name} in help");
        }
    }
}
