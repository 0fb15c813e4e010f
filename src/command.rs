//! Parsing of `!`-prefixed chat commands.

use crate::Points;
use crate::error::CommandError;
use crate::games::{reaction, rps};
use crate::games::rps::Choice;
use crate::market::{parse_bracketed_name, parse_name_and_price};
use crate::model::{UserId, parse_user_ref};

pub const PREFIX: char = '!';

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarketCommand {
    Register { name: String, price: Points },
    Manage,
    Delete { name: String },
    Browse,
    Buy { seller: UserId, name: String },
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RaceCommand {
    Enter(Vec<String>),
    Start,
    Cancel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Checkin,
    CheckinStatus,
    Points,
    Grant { target: UserId, amount: Points },
    Reset,
    Beg,
    Gamble(Points),
    Slot,
    Send { to: UserId, amount: Points },
    Market(MarketCommand),
    Leaderboard,
    Average,
    Race(RaceCommand),
    /// 1-based horse number.
    Bet { horse: usize, amount: Points },
    Guess,
    Rps { choice: Choice, stake: Points },
    Duel { opponent: UserId },
    React { stake: Points },
    Dice,
    Help,
    Minigames,
}

impl Command {
    /// Parse a message. `None` when it is not a known command, which includes
    /// plain chat and in-game inputs such as `!join`.
    pub fn parse(content: &str) -> Option<Result<Command, CommandError>> {
        let body = content.trim().strip_prefix(PREFIX)?;
        let (name, rest) = match body.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (body, ""),
        };
        let args: Vec<&str> = rest.split_whitespace().collect();

        let parsed = match name.to_ascii_lowercase().as_str() {
            "checkin" => Ok(Command::Checkin),
            "checkin-status" => Ok(Command::CheckinStatus),
            "points" => Ok(Command::Points),
            "grant" => parse_grant(&args),
            "reset" => Ok(Command::Reset),
            "beg" => Ok(Command::Beg),
            "gamble" => amount(args.first(), "!gamble <points>").map(Command::Gamble),
            "slot" => Ok(Command::Slot),
            "send" => parse_send(&args),
            "market" => parse_market(rest).map(Command::Market),
            "leaderboard" => Ok(Command::Leaderboard),
            "average" => Ok(Command::Average),
            "race" => parse_race(&args).map(Command::Race),
            "bet" => parse_bet(&args),
            "guess" => Ok(Command::Guess),
            "rps" => parse_rps(&args),
            "duel" => {
                target(args.first(), "!duel @user").map(|opponent| Command::Duel { opponent })
            }
            "react" => optional_amount(args.first(), reaction::DEFAULT_STAKE, "!react [points]")
                .map(|stake| Command::React { stake }),
            "dice" => Ok(Command::Dice),
            "help" => Ok(Command::Help),
            "minigames" => Ok(Command::Minigames),
            _ => return None,
        };
        Some(parsed)
    }
}

fn amount(token: Option<&&str>, usage: &'static str) -> Result<Points, CommandError> {
    token
        .and_then(|t| t.parse::<i64>().ok())
        .map(Points::new)
        .ok_or(CommandError::MalformedArguments(usage))
}

fn optional_amount(
    token: Option<&&str>,
    default: Points,
    usage: &'static str,
) -> Result<Points, CommandError> {
    match token {
        None => Ok(default),
        Some(_) => amount(token, usage),
    }
}

fn target(token: Option<&&str>, usage: &'static str) -> Result<UserId, CommandError> {
    let token = token.ok_or(CommandError::MalformedArguments(usage))?;
    parse_user_ref(token)
        .ok_or_else(|| CommandError::InvalidTarget(format!("unknown user '{token}'")))
}

fn parse_grant(args: &[&str]) -> Result<Command, CommandError> {
    const USAGE: &str = "!grant @user <points>";
    Ok(Command::Grant {
        target: target(args.first(), USAGE)?,
        amount: amount(args.get(1), USAGE)?,
    })
}

fn parse_send(args: &[&str]) -> Result<Command, CommandError> {
    const USAGE: &str = "!send @user <points>";
    Ok(Command::Send {
        to: target(args.first(), USAGE)?,
        amount: amount(args.get(1), USAGE)?,
    })
}

fn parse_market(rest: &str) -> Result<MarketCommand, CommandError> {
    const USAGE: &str = "!market register (name) <price> | manage [(name) delete] | browse \
                         | buy @seller (name) | help";
    let (action, args) = match rest.split_once(char::is_whitespace) {
        Some((action, args)) => (action, args.trim()),
        None => (rest, ""),
    };
    match action {
        "register" => {
            let (name, price) = parse_name_and_price(args)
                .ok_or(CommandError::MalformedArguments("!market register (name) <price>"))?;
            Ok(MarketCommand::Register {
                name,
                price: Points::new(price),
            })
        }
        "manage" if args.is_empty() => Ok(MarketCommand::Manage),
        "manage" => match parse_bracketed_name(args) {
            Some((name, tail)) if tail.trim() == "delete" => Ok(MarketCommand::Delete { name }),
            _ => Err(CommandError::MalformedArguments("!market manage (name) delete")),
        },
        "browse" => Ok(MarketCommand::Browse),
        "buy" => {
            const BUY: &str = "!market buy @seller (name)";
            let (seller, tail) = args
                .split_once(char::is_whitespace)
                .ok_or(CommandError::MalformedArguments(BUY))?;
            let seller = target(Some(&seller), BUY)?;
            let (name, _) =
                parse_bracketed_name(tail).ok_or(CommandError::MalformedArguments(BUY))?;
            Ok(MarketCommand::Buy { seller, name })
        }
        "help" => Ok(MarketCommand::Help),
        _ => Err(CommandError::MalformedArguments(USAGE)),
    }
}

fn parse_race(args: &[&str]) -> Result<RaceCommand, CommandError> {
    match args.split_first() {
        Some((&"enter", names)) if !names.is_empty() => Ok(RaceCommand::Enter(
            names.iter().map(|name| name.to_string()).collect(),
        )),
        Some((&"start", _)) => Ok(RaceCommand::Start),
        Some((&"cancel", _)) => Ok(RaceCommand::Cancel),
        _ => Err(CommandError::MalformedArguments(
            "!race enter <horse> <horse>... | start | cancel",
        )),
    }
}

fn parse_bet(args: &[&str]) -> Result<Command, CommandError> {
    const USAGE: &str = "!bet <horse number> <points>";
    let horse = args
        .first()
        .and_then(|t| t.parse::<usize>().ok())
        .ok_or(CommandError::MalformedArguments(USAGE))?;
    Ok(Command::Bet {
        horse,
        amount: amount(args.get(1), USAGE)?,
    })
}

fn parse_rps(args: &[&str]) -> Result<Command, CommandError> {
    const USAGE: &str = "!rps rock|paper|scissors [points]";
    let choice = args
        .first()
        .and_then(|t| Choice::parse(t))
        .ok_or(CommandError::MalformedArguments(USAGE))?;
    Ok(Command::Rps {
        choice,
        stake: optional_amount(args.get(1), rps::DEFAULT_STAKE, USAGE)?,
    })
}
