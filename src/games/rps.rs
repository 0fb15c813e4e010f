//! Rock-paper-scissors, against the house or as a staked duel.

use std::fmt;
use std::time::Duration;

use rand::Rng;
use tokio::time::{Instant, sleep};
use tracing::{info, warn};

use super::{Inbox, Services};
use crate::Points;
use crate::gateway::Embed;
use crate::ledger::{Field, LedgerDocument, LedgerError};
use crate::model::{ChannelId, UserId, mention};

pub const DEFAULT_STAKE: Points = Points::new(10);
const ACCEPT_WINDOW: Duration = Duration::from_secs(30);
const STAKE_WINDOW: Duration = Duration::from_secs(15);
const COUNTDOWN: Duration = Duration::from_secs(3);
const CHOICE_WINDOW: Duration = Duration::from_secs(5);
const ACCEPT: &str = "!accept";
const STAKE: &str = "!stake";

/// Encoded so that `(a - b) mod 3` is 0 for a tie, 2 when `a` wins and 1
/// when `b` wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    Rock = 0,
    Scissors = 1,
    Paper = 2,
}

impl Choice {
    pub const ALL: [Choice; 3] = [Choice::Rock, Choice::Scissors, Choice::Paper];

    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "rock" => Some(Choice::Rock),
            "scissors" => Some(Choice::Scissors),
            "paper" => Some(Choice::Paper),
            _ => None,
        }
    }
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Choice::Rock => "rock",
            Choice::Scissors => "scissors",
            Choice::Paper => "paper",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Tie,
    FirstWins,
    SecondWins,
}

pub fn judge(first: Choice, second: Choice) -> Verdict {
    match (first as u8 + 3 - second as u8) % 3 {
        0 => Verdict::Tie,
        2 => Verdict::FirstWins,
        _ => Verdict::SecondWins,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoloOutcome {
    pub house: Choice,
    pub verdict: Verdict,
    pub balance: Points,
}

/// Play against the house: a win adds the stake, a loss takes it.
pub fn play_solo(
    doc: &mut LedgerDocument,
    user: UserId,
    choice: Choice,
    stake: Points,
    rng: &mut impl Rng,
) -> Result<SoloOutcome, LedgerError> {
    if !stake.is_positive() {
        return Err(LedgerError::InvalidAmount(stake));
    }
    doc.ensure_funds(user, stake)?;

    let house = Choice::ALL[rng.gen_range(0..Choice::ALL.len())];
    let verdict = judge(choice, house);
    match verdict {
        Verdict::FirstWins => doc.credit(user, Field::Points, stake),
        Verdict::SecondWins => doc.debit(user, stake)?,
        Verdict::Tie => {}
    }
    Ok(SoloOutcome {
        house,
        verdict,
        balance: doc.balance(user),
    })
}

pub fn solo_embed(choice: Choice, outcome: &SoloOutcome) -> Embed {
    let result = match outcome.verdict {
        Verdict::Tie => "Tie!",
        Verdict::FirstWins => "You win!",
        Verdict::SecondWins => "You lose...",
    };
    Embed::new("✊ Rock-paper-scissors").description(format!(
        "You: {choice} vs bot: {}\nResult: {result}\nBalance: {}",
        outcome.house, outcome.balance
    ))
}

#[derive(Debug, Clone)]
pub struct Player {
    pub id: UserId,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct Duel {
    pub channel: ChannelId,
    pub challenger: Player,
    pub opponent: Player,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DuelOutcome {
    NotAccepted,
    NoStake,
    MalformedStake,
    Underfunded(UserId),
    Settled {
        stake: Points,
        picks: (Option<Choice>, Option<Choice>),
        /// `None` on a tie, when both stakes went back.
        winner: Option<UserId>,
    },
}

impl Duel {
    pub async fn run(self, services: Services, mut inbox: Inbox) -> DuelOutcome {
        let channel = self.channel;
        let (a, b) = (self.challenger.id, self.opponent.id);

        services.say(
            channel,
            format!(
                "{}! {} challenges you to rock-paper-scissors.\n\
                 Type `{ACCEPT}` within 30 seconds to accept.",
                mention(b),
                mention(a)
            ),
        );
        let accepted = inbox
            .next_matching(Instant::now() + ACCEPT_WINDOW, |msg| {
                msg.author == b && msg.channel == channel && msg.text() == ACCEPT
            })
            .await;
        if accepted.is_none() {
            services.say(channel, "⌛ The challenge was not accepted.");
            return DuelOutcome::NotAccepted;
        }

        services.say(
            channel,
            format!(
                "💰 {}, enter the stake (e.g. `{STAKE} 50`) within 15 seconds.",
                self.challenger.name
            ),
        );
        let Some(msg) = inbox
            .next_matching(Instant::now() + STAKE_WINDOW, |msg| {
                msg.author == a && msg.channel == channel && msg.text().starts_with(STAKE)
            })
            .await
        else {
            services.say(channel, "⌛ No stake was entered. The duel is cancelled.");
            return DuelOutcome::NoStake;
        };
        let stake = match parse_stake(msg.text()) {
            Some(stake) => stake,
            None => {
                services.say(channel, format!("❗ Use the form `{STAKE} 50`."));
                return DuelOutcome::MalformedStake;
            }
        };

        match services.ledger.transact(|doc| doc.debit_all(&[a, b], stake)) {
            Ok(()) => {}
            Err(LedgerError::InsufficientFunds { user, .. }) => {
                let name = if user == a {
                    &self.challenger.name
                } else {
                    &self.opponent.name
                };
                services.say(channel, format!("😭 {name} does not have enough points."));
                return DuelOutcome::Underfunded(user);
            }
            Err(err) => {
                warn!(reason = %err, "duel stake failed");
                services.say(channel, format!("❌ {err}"));
                return DuelOutcome::NoStake;
            }
        }

        sleep(COUNTDOWN).await;
        inbox.drain();
        services.say(
            channel,
            "✊✌️🖐️ Now! Type `rock`, `paper` or `scissors` within 5 seconds!",
        );

        let deadline = Instant::now() + CHOICE_WINDOW;
        let mut picks: (Option<Choice>, Option<Choice>) = (None, None);
        while picks.0.is_none() || picks.1.is_none() {
            let pending = picks;
            let Some(msg) = inbox
                .next_matching(deadline, |msg| {
                    msg.channel == channel
                        && Choice::parse(msg.text()).is_some()
                        && ((msg.author == a && pending.0.is_none())
                            || (msg.author == b && pending.1.is_none()))
                })
                .await
            else {
                break;
            };
            let choice = Choice::parse(msg.text());
            if msg.author == a {
                picks.0 = choice;
            } else {
                picks.1 = choice;
            }
        }

        let pot = stake.times(2);
        let winner = match picks {
            (Some(x), Some(y)) => match judge(x, y) {
                Verdict::Tie => None,
                Verdict::FirstWins => Some(a),
                Verdict::SecondWins => Some(b),
            },
            (Some(_), None) => Some(a),
            (None, Some(_)) => Some(b),
            // Both silent: the opponent forfeits.
            (None, None) => Some(a),
        };

        let settled = services.ledger.transact(|doc| {
            match winner {
                Some(user) => doc.credit(user, Field::Points, pot),
                None => {
                    doc.credit(a, Field::Points, stake);
                    doc.credit(b, Field::Points, stake);
                }
            }
            Ok(())
        });
        if let Err(err) = settled {
            warn!(reason = %err, "duel settlement failed");
        }
        info!(challenger = a, opponent = b, stake = %stake, ?winner, "duel settled");

        services.say(channel, self.result_embed(picks, winner, pot));
        DuelOutcome::Settled {
            stake,
            picks,
            winner,
        }
    }

    fn result_embed(
        &self,
        picks: (Option<Choice>, Option<Choice>),
        winner: Option<UserId>,
        pot: Points,
    ) -> Embed {
        let show = |pick: Option<Choice>| pick.map_or("-".to_string(), |c| c.to_string());
        let result = match (picks, winner) {
            ((Some(_), Some(_)), None) => "Tie! Stakes returned.".to_string(),
            ((None, None), Some(user)) => {
                format!("⌛ Nobody picked. {} takes {pot} points by default!", mention(user))
            }
            ((Some(_), Some(_)), Some(user)) => {
                format!("🏆 {} wins and takes {pot} points!", mention(user))
            }
            (_, Some(user)) => {
                format!("🏃 No pick from the other side. {} takes {pot} points!", mention(user))
            }
            (_, None) => String::new(),
        };
        Embed::new("✂️ Duel results").description(format!(
            "{}: {}  vs  {}: {}\n{result}",
            self.challenger.name,
            show(picks.0),
            self.opponent.name,
            show(picks.1)
        ))
    }
}

fn parse_stake(text: &str) -> Option<Points> {
    let mut parts = text.split_whitespace();
    if parts.next()? != STAKE {
        return None;
    }
    let amount: i64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() || amount <= 0 {
        return None;
    }
    Some(Points::new(amount))
}
