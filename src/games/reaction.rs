//! Reaction-speed battle: first to type the trigger word after "go" takes
//! the pot.

use std::time::Duration;

use tokio::time::{Instant, sleep};
use tracing::{info, warn};

use super::{Inbox, Services};
use crate::Points;
use crate::gateway::Embed;
use crate::ledger::{Field, LedgerError};
use crate::model::{ChannelId, UserId, mention};

pub const DEFAULT_STAKE: Points = Points::new(10);
pub const TRIGGER_WORD: &str = "solaris";
pub const MIN_PLAYERS: usize = 2;
const LOBBY: Duration = Duration::from_secs(30);
const CAPTURE: Duration = Duration::from_secs(5);
const JOIN: &str = "!join";
const START: &str = "!start";

/// A battle about to open its lobby.
#[derive(Debug, Clone)]
pub struct ReactionBattle {
    pub channel: ChannelId,
    pub host: UserId,
    pub host_name: String,
    pub stake: Points,
    /// Pause between the stake and the "go" signal.
    pub trigger_delay: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReactionOutcome {
    /// Fewer than two players joined; nobody was charged.
    Cancelled,
    /// A player could not cover the stake; nobody was charged.
    Underfunded(UserId),
    /// Nobody reacted; every stake was returned.
    Refunded,
    Won {
        winner: UserId,
        pot: Points,
        /// Reaction times, fastest first.
        times: Vec<(UserId, Duration)>,
    },
}

impl ReactionBattle {
    pub fn new(
        channel: ChannelId,
        host: UserId,
        host_name: impl Into<String>,
        stake: Points,
        trigger_delay: Duration,
    ) -> Result<Self, LedgerError> {
        if !stake.is_positive() {
            return Err(LedgerError::InvalidAmount(stake));
        }
        Ok(Self {
            channel,
            host,
            host_name: host_name.into(),
            stake,
            trigger_delay,
        })
    }

    pub async fn run(self, services: Services, mut inbox: Inbox) -> ReactionOutcome {
        let channel = self.channel;
        services.say(
            channel,
            format!(
                "⚡ Reaction battle! Stake: {} points.\n\
                 Type `{JOIN}` within 30 seconds to join.\n\
                 {} can type `{START}` to begin early.",
                self.stake, self.host_name
            ),
        );

        let players = self.lobby(&services, &mut inbox).await;
        if players.len() < MIN_PLAYERS {
            services.say(channel, "❗ At least two players are needed. The battle is cancelled.");
            return ReactionOutcome::Cancelled;
        }

        let ids: Vec<UserId> = players.iter().map(|(id, _)| *id).collect();
        match services
            .ledger
            .transact(|doc| doc.debit_all(&ids, self.stake))
        {
            Ok(()) => {}
            Err(LedgerError::InsufficientFunds { user, .. }) => {
                let name = players
                    .iter()
                    .find(|(id, _)| *id == user)
                    .map(|(_, name)| name.as_str())
                    .unwrap_or_default();
                services.say(channel, format!("😭 {name} does not have enough points!"));
                return ReactionOutcome::Underfunded(user);
            }
            Err(err) => {
                warn!(reason = %err, "reaction stake failed");
                services.say(channel, format!("❌ {err}"));
                return ReactionOutcome::Cancelled;
            }
        }

        services.say(channel, "Get ready... hands on the keyboard!");
        sleep(self.trigger_delay).await;
        inbox.drain();
        services.say(channel, format!("✨ NOW! Type `{TRIGGER_WORD}` as fast as you can!"));

        let go = Instant::now();
        let deadline = go + CAPTURE;
        let mut times: Vec<(UserId, Duration)> = Vec::new();
        while times.len() < ids.len() {
            let reacted = inbox
                .next_matching(deadline, |msg| {
                    msg.channel == channel
                        && msg.text() == TRIGGER_WORD
                        && ids.contains(&msg.author)
                        && !times.iter().any(|(id, _)| *id == msg.author)
                })
                .await;
            match reacted {
                Some(msg) => times.push((msg.author, go.elapsed())),
                None => break,
            }
        }

        let pot = self.stake.times(ids.len() as i64);
        let Some((winner, _)) = times.first().copied() else {
            let refund = services.ledger.transact(|doc| {
                for id in &ids {
                    doc.credit(*id, Field::Points, self.stake);
                }
                Ok(())
            });
            if let Err(err) = refund {
                warn!(reason = %err, "reaction refund failed");
            }
            services.say(
                channel,
                "⌛ Nobody reacted. The battle is void and stakes were refunded.",
            );
            return ReactionOutcome::Refunded;
        };

        if let Err(err) = services.ledger.credit(winner, Field::Points, pot) {
            warn!(user = winner, reason = %err, "reaction pot not credited");
        }
        info!(user = winner, pot = %pot, players = ids.len(), "reaction battle won");

        let ranking: Vec<String> = times
            .iter()
            .enumerate()
            .map(|(i, (id, elapsed))| {
                format!("#{}: {}  {:.3}s", i + 1, mention(*id), elapsed.as_secs_f64())
            })
            .collect();
        services.say(
            channel,
            Embed::new("⚡ Reaction battle results").description(format!(
                "🏆 {} wins the pot of {pot} points!\n{}",
                mention(winner),
                ranking.join("\n")
            )),
        );
        ReactionOutcome::Won { winner, pot, times }
    }

    /// Collect players until the lobby closes or the host starts early.
    async fn lobby(&self, services: &Services, inbox: &mut Inbox) -> Vec<(UserId, String)> {
        let mut players = vec![(self.host, self.host_name.clone())];
        let deadline = Instant::now() + LOBBY;
        let channel = self.channel;

        while let Some(msg) = inbox
            .next_matching(deadline, |msg| {
                msg.channel == channel
                    && !msg.author_is_bot
                    && matches!(msg.text(), JOIN | START)
            })
            .await
        {
            if msg.text() == JOIN {
                if !players.iter().any(|(id, _)| *id == msg.author) {
                    players.push((msg.author, msg.author_name.clone()));
                    services.say(
                        channel,
                        format!("✅ {} joined! ({} players)", msg.author_name, players.len()),
                    );
                }
            } else if msg.author == self.host {
                if players.len() < MIN_PLAYERS {
                    services.say(channel, "❗ At least two players are needed to start!");
                } else {
                    services.say(channel, "⏩ The host started the battle!");
                    break;
                }
            }
        }
        players
    }
}
