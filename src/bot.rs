//! Bot orchestrator.
//!
//! Consumes gateway events one at a time. Chat messages are first published
//! to every waiting mini-game, then parsed as commands; voice events feed the
//! presence tracker. Games that wait on chat input run as spawned tasks and
//! are awaited when the event stream ends.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, info, warn};

use crate::Points;
use crate::command::{Command, MarketCommand, RaceCommand};
use crate::config::EconomyConfig;
use crate::error::CommandError;
use crate::games::reaction::ReactionBattle;
use crate::games::rps::{Duel, Player};
use crate::games::{Inbox, Services, dice, gamble, guess, race, rps, slot};
use crate::gateway::{DeliveryError, Embed, Gateway, Reply};
use crate::help;
use crate::ledger::{BegOutcome, Field, Ledger, LedgerDocument, LedgerError, civil_day};
use crate::market::Marketplace;
use crate::model::{ChannelId, ChatMessage, GatewayEvent, PresenceChange, UserId, mention};
use crate::presence::{AccrualRates, PresenceTracker};

const BUS_CAPACITY: usize = 256;
const LEADERBOARD_SIZE: usize = 10;
const TRIGGER_DELAY_SECS: std::ops::Range<f64> = 2.0..5.0;

const BEG_REFUSALS: [&str; 4] = [
    "A passer-by just shrugged and walked on... 😢",
    "\"I'm broke too!\" came the answer... 💨",
    "Someone pretended to reach for their wallet... 🤥",
    "You were politely ignored. Such is life... 🧰",
];

pub struct Bot {
    config: Arc<EconomyConfig>,
    services: Services,
    market: Arc<Marketplace>,
    race: Arc<race::RaceTrack>,
    presence: PresenceTracker,
    /// Every chat message, for games waiting on input.
    bus: broadcast::Sender<ChatMessage>,
    tasks: JoinSet<()>,
    rng: StdRng,
}

/// Public API
impl Bot {
    pub fn new(
        config: EconomyConfig,
        ledger: Arc<Ledger>,
        market: Arc<Marketplace>,
        gateway: Arc<dyn Gateway>,
    ) -> Self {
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let (bus, _) = broadcast::channel(BUS_CAPACITY);
        Self {
            config: Arc::new(config),
            services: Services::new(ledger, gateway),
            market,
            race: Arc::new(race::RaceTrack::new()),
            presence: PresenceTracker::new(),
            bus,
            tasks: JoinSet::new(),
            rng,
        }
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.services.ledger
    }

    /// Process the event stream, then wait for every game still in progress.
    pub async fn run(&mut self, mut stream: impl Stream<Item = GatewayEvent> + Unpin) {
        while let Some(event) = stream.next().await {
            self.handle(event);
        }
        self.finish().await;
    }

    /// Wait for all spawned games to reach their outcome.
    pub async fn finish(&mut self) {
        while let Some(joined) = self.tasks.join_next().await {
            if let Err(err) = joined {
                warn!(reason = %err, "game task failed");
            }
        }
    }

    /// Apply one event. Failures are reported to the user, never propagated.
    pub fn handle(&mut self, event: GatewayEvent) {
        match event {
            GatewayEvent::Message(msg) => self.on_message(msg),
            GatewayEvent::VoicePresenceChanged(change) => self.on_presence(change),
        }
    }
}

/// Private API
impl Bot {
    fn on_message(&mut self, msg: ChatMessage) {
        // No receivers just means no game is waiting.
        let _ = self.bus.send(msg.clone());
        if msg.author_is_bot {
            return;
        }
        let Some(parsed) = Command::parse(&msg.content) else {
            return;
        };

        let label = msg
            .text()
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .trim_start_matches(crate::command::PREFIX)
            .to_string();
        let result = parsed.and_then(|command| self.dispatch(&msg, command));
        Self::log_result(&label, msg.author, &result);
        if let Err(err) = result {
            self.services.say(msg.channel, format!("❌ {err}"));
        }
    }

    fn on_presence(&mut self, change: PresenceChange) {
        if self.config.ignored_voice_users.contains(&change.user) {
            debug!(user = change.user, "ignored voice user");
            return;
        }
        let rates = AccrualRates {
            mic_on: self.config.mic_on_rate,
            mic_off: self.config.mic_off_rate,
        };
        let accrual = self.presence.apply(&change, rates);

        let result = self.services.ledger.transact(|doc| {
            if let Some(accrual) = accrual {
                doc.credit(accrual.user, Field::Points, accrual.earned);
                doc.credit(accrual.user, Field::ActivityXp, accrual.earned);
            }
            if let Some(account) = doc.accounts.get_mut(&change.user) {
                account.display_name = Some(change.display_name.clone());
            }
            Ok(())
        });
        match (result, accrual) {
            (Ok(()), Some(accrual)) => {
                info!(user = accrual.user, amount = %accrual.earned, "voice accrual applied");
            }
            (Ok(()), None) => {}
            (Err(err), _) => {
                warn!(user = change.user, reason = %err, "voice accrual skipped");
            }
        }
    }

    fn dispatch(&mut self, msg: &ChatMessage, command: Command) -> Result<(), CommandError> {
        let user = msg.author;
        let channel = msg.channel;
        let ledger = self.services.ledger.clone();

        match command {
            Command::Checkin => {
                let day = civil_day(msg.at, self.config.utc_offset);
                let receipt = ledger.transact(|doc| doc.check_in(user, day, &mut self.rng))?;
                let mut lines = vec![
                    format!("🔥 Streak: {} days", receipt.streak),
                    format!("📅 Reward: {} points", receipt.base),
                ];
                if receipt.bonus.is_positive() {
                    lines.push(format!("🎁 Lucky bonus: {} points", receipt.bonus));
                }
                if let Some(bonus) = receipt.milestone_bonus {
                    lines.push(format!(
                        "🏅 {}-day milestone: {bonus} points",
                        receipt.total_checkins
                    ));
                }
                self.say(
                    channel,
                    Embed::new(format!("✅ {} checked in", msg.author_name))
                        .description(lines.join("\n")),
                );
            }
            Command::CheckinStatus => {
                let status = ledger.snapshot().checkin_status(user);
                let next = match status.next_milestone {
                    Some((days, left)) => format!("{left} days to the {days}-day milestone"),
                    None => "every milestone reached".to_string(),
                };
                self.say(
                    channel,
                    Embed::new(format!("📅 {}'s check-ins", msg.author_name)).description(format!(
                        "Total: {} days\nStreak: {} days\nNext: {next}",
                        status.total_days, status.streak
                    )),
                );
            }
            Command::Points => {
                let doc = ledger.snapshot();
                self.say(channel, points_card(&doc, user, &msg.author_name));
            }
            Command::Grant { target, amount } => {
                self.require_admin(user)?;
                if !amount.is_positive() {
                    return Err(LedgerError::InvalidAmount(amount).into());
                }
                ledger.transact(|doc| {
                    doc.credit(target, Field::Points, amount);
                    doc.credit(target, Field::AdminXp, amount);
                    Ok(())
                })?;
                self.say(channel, format!("✅ Granted {amount} points to {}", mention(target)));
            }
            Command::Reset => {
                self.require_admin(user)?;
                ledger.reset()?;
                self.say(channel, "✅ All economy data has been reset.");
            }
            Command::Beg => {
                let day = civil_day(msg.at, self.config.utc_offset);
                let outcome = ledger.transact(|doc| doc.beg(user, day, &mut self.rng))?;
                let reply = match outcome {
                    BegOutcome::Granted(gain) => {
                        format!("🙏 {} begged and received {gain} points!", msg.author_name)
                    }
                    BegOutcome::Refused => {
                        let reason = BEG_REFUSALS[self.rng.gen_range(0..BEG_REFUSALS.len())];
                        format!("{} ❌ No luck!\n{reason}", mention(user))
                    }
                };
                self.say(channel, reply);
            }
            Command::Gamble(bet) => {
                let outcome = ledger.transact(|doc| gamble::play(doc, user, bet, &mut self.rng))?;
                let result = match outcome.multiplier {
                    0 => format!("💀 Lost {bet} points."),
                    10 => format!("🌟 Legendary 10x! Won {} points!", outcome.payout),
                    m => format!("✨ {m}x! Won {} points!", outcome.payout),
                };
                self.say(
                    channel,
                    format!("{}\n{result}\n💰 Balance: {}", mention(user), outcome.balance),
                );
            }
            Command::Slot => {
                let outcome = ledger.transact(|doc| slot::play(doc, user, &mut self.rng))?;
                info!(user, payout = ?outcome.payout, jackpot = %outcome.jackpot, "slot settled");
                let frames = slot::spin_frames(&mut self.rng);
                self.tasks.spawn(slot::animate(
                    self.services.clone(),
                    channel,
                    msg.author_name.clone(),
                    frames,
                    outcome,
                ));
            }
            Command::Send { to, amount } => {
                ledger.transfer(user, to, amount)?;
                self.say(
                    channel,
                    format!("📤 {} sent {amount} points to {}!", msg.author_name, mention(to)),
                );
            }
            Command::Market(action) => self.market(msg, action)?,
            Command::Leaderboard => {
                let doc = ledger.snapshot();
                let top = doc.leaderboard(LEADERBOARD_SIZE);
                if top.is_empty() {
                    self.say(channel, "📉 No data yet.");
                } else {
                    let lines: Vec<String> = top
                        .iter()
                        .enumerate()
                        .map(|(i, (id, points))| {
                            format!("{}. {} - {points} points", i + 1, mention(*id))
                        })
                        .collect();
                    self.say(channel, Embed::new("🌞 Top 10").description(lines.join("\n")));
                }
            }
            Command::Average => match ledger.snapshot().stats() {
                None => {
                    self.say(channel, "📉 No data yet.");
                }
                Some(stats) => {
                    self.say(
                        channel,
                        Embed::new("📈 Average points").description(format!(
                            "Members: {}\nTotal: {}\nAverage: {}",
                            stats.accounts, stats.total, stats.average
                        )),
                    );
                }
            },
            Command::Race(RaceCommand::Enter(horses)) => {
                self.race.enter(&ledger, horses)?;
                self.say(channel, race::staged_embed(&self.race.horses()));
            }
            Command::Race(RaceCommand::Start) => {
                let start = self.race.begin()?;
                info!(horses = start.horses.len(), pool = %start.pool, "race started");
                let rng = self.child_rng();
                self.tasks.spawn(race::run(
                    self.services.clone(),
                    self.race.clone(),
                    channel,
                    start,
                    rng,
                ));
            }
            Command::Race(RaceCommand::Cancel) => {
                let refunded = self.race.cancel(&ledger)?;
                self.say(
                    channel,
                    format!("😕 The race was cancelled. {} bets refunded.", refunded.len()),
                );
            }
            Command::Bet { horse, amount } => {
                let bet = self.race.bet(&ledger, user, horse, amount)?;
                self.say(
                    channel,
                    format!("💸 {} bet {} points on horse {horse}!", msg.author_name, bet.amount),
                );
            }
            Command::Guess => {
                let target = self.rng.gen_range(guess::RANGE);
                let inbox = self.inbox();
                let services = self.services.clone();
                self.tasks.spawn(async move {
                    guess::run(services, inbox, channel, user, target).await;
                });
            }
            Command::Rps { choice, stake } => {
                let outcome =
                    ledger.transact(|doc| rps::play_solo(doc, user, choice, stake, &mut self.rng))?;
                self.say(channel, rps::solo_embed(choice, &outcome));
            }
            Command::Duel { opponent } => {
                if opponent == user {
                    return Err(CommandError::InvalidTarget(
                        "you cannot duel yourself".to_string(),
                    ));
                }
                let doc = ledger.snapshot();
                let duel = Duel {
                    channel,
                    challenger: Player {
                        id: user,
                        name: msg.author_name.clone(),
                    },
                    opponent: Player {
                        id: opponent,
                        name: display_name(&doc, opponent),
                    },
                };
                let inbox = self.inbox();
                let services = self.services.clone();
                self.tasks.spawn(async move {
                    duel.run(services, inbox).await;
                });
            }
            Command::React { stake } => {
                let delay = Duration::from_secs_f64(self.rng.gen_range(TRIGGER_DELAY_SECS));
                let battle =
                    ReactionBattle::new(channel, user, msg.author_name.clone(), stake, delay)?;
                let inbox = self.inbox();
                let services = self.services.clone();
                self.tasks.spawn(async move {
                    battle.run(services, inbox).await;
                });
            }
            Command::Dice => {
                let outcome = ledger.transact_with(|doc| dice::play(doc, user, &mut self.rng))?;
                self.say(channel, dice::embed(&outcome));
            }
            Command::Help => {
                self.say(channel, help::general());
            }
            Command::Minigames => {
                self.say(channel, help::minigames());
            }
        }
        Ok(())
    }

    fn market(&mut self, msg: &ChatMessage, action: MarketCommand) -> Result<(), CommandError> {
        let user = msg.author;
        let channel = msg.channel;
        match action {
            MarketCommand::Register { name, price } => {
                let listing = self.market.register(user, &name, price)?;
                self.say(
                    channel,
                    format!("✅ Listed '{}' for {} points.", listing.name, listing.price),
                );
            }
            MarketCommand::Manage => {
                let listings = self.market.listings(user);
                if listings.is_empty() {
                    self.say(channel, "📦 You have no listings.");
                } else {
                    let lines: Vec<String> = listings
                        .iter()
                        .enumerate()
                        .map(|(i, item)| {
                            format!("{}. {} - {} points", i + 1, item.name, item.price)
                        })
                        .collect();
                    self.say(
                        channel,
                        Embed::new("🗂️ Your listings").description(lines.join("\n")),
                    );
                }
            }
            MarketCommand::Delete { name } => {
                let removed = self.market.delete(user, &name)?;
                self.say(channel, format!("🗑️ Removed {removed} listing(s) named '{name}'."));
            }
            MarketCommand::Browse => {
                let offers = self.market.browse();
                if offers.is_empty() {
                    self.say(channel, "📭 Nothing is listed right now.");
                } else {
                    let doc = self.services.ledger.snapshot();
                    let card = offers.iter().enumerate().fold(
                        Embed::new("🛍️ Marketplace"),
                        |card, (i, offer)| {
                            card.field(
                                format!("{}. {}", i + 1, offer.listing.name),
                                format!(
                                    "Seller: {}\nPrice: {} points",
                                    display_name(&doc, offer.seller),
                                    offer.listing.price
                                ),
                            )
                        },
                    );
                    self.say(channel, card);
                }
            }
            MarketCommand::Buy { seller, name } => {
                let purchase =
                    self.market
                        .purchase(&self.services.ledger, user, seller, &name)?;
                self.say(
                    channel,
                    format!(
                        "✅ {} bought '{}' from {} for {} points!",
                        msg.author_name,
                        purchase.listing.name,
                        mention(seller),
                        purchase.listing.price
                    ),
                );
                let notice = Embed::new("📬 Marketplace sale").description(format!(
                    "{} bought '{}' for {} points.\nGet in touch with {} to deliver it!",
                    msg.author_name,
                    purchase.listing.name,
                    purchase.listing.price,
                    mention(user)
                ));
                if let Err(DeliveryError::DeliveryBlocked(blocked)) = self
                    .services
                    .gateway
                    .send_direct_message(seller, notice.into())
                {
                    warn!(user = blocked, "seller does not accept direct messages");
                    self.say(
                        channel,
                        "⚠️ Could not notify the seller (direct messages blocked).",
                    );
                }
            }
            MarketCommand::Help => {
                self.say(channel, help::market());
            }
        }
        Ok(())
    }

    fn require_admin(&self, user: UserId) -> Result<(), CommandError> {
        if self.config.is_admin(user) {
            Ok(())
        } else {
            Err(CommandError::NotAuthorized)
        }
    }

    fn say(&self, channel: ChannelId, reply: impl Into<Reply>) {
        self.services.say(channel, reply);
    }

    fn inbox(&self) -> Inbox {
        Inbox::new(self.bus.subscribe())
    }

    /// Independent generator for a spawned game, derived from the bot's.
    fn child_rng(&mut self) -> StdRng {
        StdRng::seed_from_u64(self.rng.r#gen())
    }

    /// Small helper to log command results
    fn log_result<T, E: Display>(command: &str, user: UserId, result: &Result<T, E>) {
        match result {
            Ok(_) => info!(user = %user, "{command} applied"),
            Err(e) => info!(user = %user, reason = %e, "{command} skipped"),
        }
    }
}

fn display_name(doc: &LedgerDocument, user: UserId) -> String {
    doc.account(user)
        .and_then(|account| account.display_name.clone())
        .unwrap_or_else(|| mention(user))
}

fn points_card(doc: &LedgerDocument, user: UserId, name: &str) -> Embed {
    let account = doc.account(user).cloned().unwrap_or_default();
    let progress = account.level();
    let rank = match doc.rank(user) {
        Some(rank) => format!("#{rank} of {}", doc.accounts.len()),
        None => "unranked".to_string(),
    };
    Embed::new(format!("{name}'s points & level")).description(format!(
        "📈 Progress: {}\n🏃 Level: {} ({})\n🔼 To next level: {} XP\n📊 Rank: {rank}\n\
         💰 Points: {}\n  activity: {}\n  admin: {}\n  gambling: {}",
        progress.bar(),
        progress.rank_name(),
        progress.level,
        Points::new(progress.remaining),
        account.points,
        account.activity_xp,
        account.admin_xp,
        account.gamble_points,
    ))
}
