use std::fmt;
use std::str::FromStr;

use teloxide::types::BotCommand;

pub const COMMAND_PREFIX: char = '/';

/// Commands the bot responds to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Start,
    Help,
}

impl Command {
    pub const ALL: [Command; 2] = [Command::Start, Command::Help];

    pub fn name(self) -> &'static str {
        match self {
            Command::Start => "start",
            Command::Help => "help",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Command::Start => "Start the bot, optionally with a referral ID",
            Command::Help => "Show help",
        }
    }

    /// Command list published to the Telegram command menu
    pub fn menu() -> Vec<BotCommand> {
        Self::ALL
            .iter()
            .map(|cmd| BotCommand::new(cmd.name(), cmd.description()))
            .collect()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", COMMAND_PREFIX, self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCommand(pub String);

impl fmt::Display for UnknownCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown command: {}", self.0)
    }
}

impl std::error::Error for UnknownCommand {}

impl FromStr for Command {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|cmd| cmd.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownCommand(s.to_string()))
    }
}

/// Characters Telegram accepts in a command name or bot username
fn is_command_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Length of the leading run of command characters in `s`
fn command_run(s: &str) -> usize {
    s.find(|c: char| !is_command_char(c)).unwrap_or(s.len())
}

/// A message that starts with a bot command, split into its parts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine<'a> {
    /// Command name without prefix or `@bot` suffix
    pub name: &'a str,
    /// Bot username the command was addressed to, if any
    pub addressee: Option<&'a str>,
    /// Whitespace-delimited words after the first one
    pub args: Vec<&'a str>,
}

impl<'a> CommandLine<'a> {
    /// Returns None unless `text` opens with a bot command the way Telegram
    /// marks one: `/` followed directly by `[A-Za-z0-9_]+`, optionally
    /// `@username`. The command ends at the first other character, so
    /// `/start-now` is `/start` while `/привет` is not a command at all.
    pub fn parse(text: &'a str) -> Option<Self> {
        let rest = text.strip_prefix(COMMAND_PREFIX)?;
        let name_len = command_run(rest);
        if name_len == 0 {
            return None;
        }
        let name = &rest[..name_len];

        let addressee = rest[name_len..]
            .strip_prefix('@')
            .map(|bot| &bot[..command_run(bot)])
            .filter(|bot| !bot.is_empty());

        Some(Self {
            name,
            addressee,
            args: text.split_whitespace().skip(1).collect(),
        })
    }

    /// Whether the command is meant for the bot with the given username
    pub fn is_addressed_to(&self, bot_username: Option<&str>) -> bool {
        match (self.addressee, bot_username) {
            (None, _) => true,
            (Some(target), Some(me)) => target.eq_ignore_ascii_case(me),
            (Some(_), None) => false,
        }
    }

    pub fn first_arg(&self) -> Option<&'a str> {
        self.args.first().copied()
    }
}
