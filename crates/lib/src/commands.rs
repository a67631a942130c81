//! Command table: slash commands answered in place, never relayed.

use std::collections::HashMap;

use crate::config::RelayTexts;

/// Parse a slash command name from message text: `/Start@my_bot extra` -> `start`.
/// Returns `None` when the text is not a command.
pub fn parse_command(text: &str) -> Option<String> {
    let first = text.trim_start().split_whitespace().next()?;
    let name = first.strip_prefix('/')?;
    let name = name.split('@').next().unwrap_or(name);
    if name.is_empty() {
        return None;
    }
    Some(name.to_lowercase())
}

/// Known commands and their replies.
#[derive(Debug, Clone, Default)]
pub struct CommandTable {
    replies: HashMap<String, String>,
}

impl CommandTable {
    /// Built-in table: `/start` greets, `/help` explains how to use the bot.
    pub fn from_texts(texts: &RelayTexts) -> Self {
        let mut table = Self::default();
        table.insert("start", texts.greeting.clone());
        table.insert("help", texts.help.clone());
        table
    }

    pub fn insert(&mut self, name: impl Into<String>, reply: impl Into<String>) {
        self.replies.insert(name.into().to_lowercase(), reply.into());
    }

    /// Reply text for a command, or `None` if the command is unknown.
    pub fn respond(&self, name: &str) -> Option<&str> {
        self.replies.get(name).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands() {
        assert_eq!(parse_command("/start"), Some("start".to_string()));
        assert_eq!(parse_command("  /HELP please"), Some("help".to_string()));
        assert_eq!(parse_command("/start@relay_bot"), Some("start".to_string()));
        assert_eq!(parse_command("hello /start"), None);
        assert_eq!(parse_command("/"), None);
        assert_eq!(parse_command("/@bot"), None);
        assert_eq!(parse_command(""), None);
    }

    #[test]
    fn default_table() {
        let texts = RelayTexts::default();
        let table = CommandTable::from_texts(&texts);
        assert_eq!(table.respond("start"), Some(texts.greeting.as_str()));
        assert_eq!(table.respond("help"), Some(texts.help.as_str()));
        assert_eq!(table.respond("stop"), None);
    }
}
