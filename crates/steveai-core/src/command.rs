//! Slash commands typed into the chat input

use crate::types::{Mode, Theme};
use std::path::PathBuf;

pub const HELP_TEXT: &str = "SteveAI Commands:\n\
/clear - Reset chat\n\
/theme [dark|light] - Toggle mode\n\
/model [fast|chat|reasoning|general] - Show or switch model\n\
/export [path] - Save as JSON\n\
/image <prompt> - Generate an image\n\
/dagi [on|off] - Toggle the router + specialists writer pipeline\n\
/help - This list";

/// A parsed slash command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Clear,
    Help,
    /// `None` toggles the current theme.
    Theme(Option<Theme>),
    /// `None` reports the current mode.
    Model(Option<Mode>),
    Export(Option<PathBuf>),
    Image(String),
    /// `None` toggles the writer pipeline.
    Orchestrate(Option<bool>),
    /// Recognized command with bad arguments; carries the usage line.
    Usage(&'static str),
    Unknown(String),
}

impl Command {
    /// Parse chat input. Returns `None` when the input is not a command.
    pub fn parse(input: &str) -> Option<Command> {
        let trimmed = input.trim();
        let body = trimmed.strip_prefix('/')?;
        let (word, rest) = body.split_once(char::is_whitespace).unwrap_or((body, ""));
        let word = word.to_ascii_lowercase();
        let rest = rest.trim();
        let args: Vec<&str> = rest.split_whitespace().collect();

        let command = match word.as_str() {
            "clear" => Command::Clear,
            "help" => Command::Help,
            "theme" => match args.first() {
                None => Command::Theme(None),
                Some(arg) => match arg.parse() {
                    Ok(theme) => Command::Theme(Some(theme)),
                    Err(_) => Command::Usage("Usage: /theme dark|light"),
                },
            },
            "model" => match args.first() {
                None => Command::Model(None),
                Some(arg) => match arg.parse() {
                    Ok(mode) => Command::Model(Some(mode)),
                    Err(_) => Command::Usage("Usage: /model fast|chat|reasoning|general"),
                },
            },
            // The whole remainder, so paths may contain spaces.
            "export" => Command::Export((!rest.is_empty()).then(|| PathBuf::from(rest))),
            "image" => {
                if args.is_empty() {
                    Command::Usage("Usage: /image <your prompt here>")
                } else {
                    Command::Image(args.join(" "))
                }
            }
            "dagi" => match args.first().map(|a| a.to_ascii_lowercase()).as_deref() {
                None => Command::Orchestrate(None),
                Some("on") => Command::Orchestrate(Some(true)),
                Some("off") => Command::Orchestrate(Some(false)),
                Some(_) => Command::Usage("Usage: /dagi on|off"),
            },
            _ => Command::Unknown(word),
        };
        Some(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_not_a_command() {
        assert_eq!(Command::parse("hello /clear"), None);
        assert_eq!(Command::parse("hello"), None);
    }

    #[test]
    fn test_command_word_is_case_insensitive() {
        assert_eq!(Command::parse("  /CLEAR  "), Some(Command::Clear));
    }
}
