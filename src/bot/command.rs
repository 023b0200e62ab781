use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::domain::{DEFAULT_AMOUNT, UserId};

static MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<@!?(\d+)>").expect("mention pattern is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Credit,
    Debit,
    Status,
    Help,
    Unknown,
}

impl FromStr for Command {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "a" | "add" | "credit" => Ok(Command::Credit),
            "d" | "del" | "debit" => Ok(Command::Debit),
            "s" | "status" => Ok(Command::Status),
            "h" | "help" => Ok(Command::Help),
            _ => Ok(Command::Unknown),
        }
    }
}

struct CommandInfo {
    command: Command,
    name: &'static str,
    brief: &'static str,
    usage: &'static str,
    details: &'static str,
}

const COMMANDS: &[CommandInfo] = &[
    CommandInfo {
        command: Command::Credit,
        name: "a",
        brief: "Hand out {resource} to a user",
        usage: "{prefix}a <@User> [number of {resource} (default {amount})]",
        details: "Logs {resource} being handed out so we know where they are. \
                  Anyone can give or take back {resource} for any user. \
                  Without a trailing number it defaults to {amount}.",
    },
    CommandInfo {
        command: Command::Debit,
        name: "d",
        brief: "Register {resource} handed back by a user",
        usage: "{prefix}d <@User> [number of {resource} (default {amount})]",
        details: "Logs {resource} being handed back. A user who never borrowed \
                  any is ignored. Without a trailing number it defaults to {amount}.",
    },
    CommandInfo {
        command: Command::Status,
        name: "s",
        brief: "Status of a user or the last entries",
        usage: "{prefix}s [@User] [number of actions (default {count})]",
        details: "Shows what a user currently holds and their last {count} actions. \
                  Without a user, everything currently borrowed and the last {count} \
                  actions are shown.",
    },
    CommandInfo {
        command: Command::Help,
        name: "h",
        brief: "Show this help",
        usage: "{prefix}h [command]",
        details: "Lists all commands, or details for a single one.",
    },
];

/// Values substituted into help texts.
pub struct HelpContext<'a> {
    pub prefix: &'a str,
    pub resource: &'a str,
    pub status_length: usize,
}

impl HelpContext<'_> {
    fn fill(&self, template: &str) -> String {
        template
            .replace("{prefix}", self.prefix)
            .replace("{resource}", self.resource)
            .replace("{amount}", &DEFAULT_AMOUNT.to_string())
            .replace("{count}", &self.status_length.to_string())
    }
}

/// Command listing, or the details of `topic` when it names a known command.
pub fn help_text(ctx: &HelpContext<'_>, topic: Option<&str>) -> String {
    let topic = topic
        .and_then(|t| Command::from_str(t).ok())
        .and_then(|command| COMMANDS.iter().find(|info| info.command == command));

    match topic {
        Some(info) => format!(
            "{}{}\nUsage: {}\n{}",
            ctx.prefix,
            info.name,
            ctx.fill(info.usage),
            ctx.fill(info.details)
        ),
        None => {
            let mut text = format!(
                "Commands (use \"{}h <command>\" for details):",
                ctx.prefix
            );
            for info in COMMANDS {
                text.push_str(&format!(
                    "\n{} - {}",
                    ctx.fill(info.usage),
                    ctx.fill(info.brief)
                ));
            }
            text
        }
    }
}

/// User ids mentioned as `<@id>` or `<@!id>`, in order of appearance.
pub fn extract_mentions(content: &str) -> Vec<UserId> {
    MENTION
        .captures_iter(content)
        .filter_map(|caps| caps[1].parse().ok())
        .collect()
}

/// Split `content` into the command word and its arguments if it starts with
/// `prefix`. The command word is not matched yet.
pub fn split_command<'a>(content: &'a str, prefix: &str) -> Option<(&'a str, Vec<&'a str>)> {
    let body = content.trim_start().strip_prefix(prefix)?;
    let mut args = body.split_whitespace();
    let word = args.next()?;
    Some((word, args.collect()))
}
