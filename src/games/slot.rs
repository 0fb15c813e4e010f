//! Five-reel slot machine with a progressive jackpot.
//!
//! The outcome is drawn and settled in one ledger unit before anything is
//! shown; the spinning animation afterwards is purely cosmetic.

use std::fmt;
use std::time::Duration;

use rand::Rng;
use rand::seq::SliceRandom;
use tokio::time::sleep;

use super::Services;
use crate::Points;
use crate::gateway::Embed;
use crate::ledger::{Field, LedgerDocument, LedgerError};
use crate::model::{ChannelId, UserId};

pub const FEE: Points = Points::new(10);
pub const BASE_JACKPOT: Points = Points::new(1_000);
pub const JACKPOT_RATIO: f64 = 0.8;
pub const SUN_BONUS: Points = Points::new(500);
pub const SUN_JACKPOT_CHANCE: f64 = 0.005;
/// Cumulative with [`SUN_JACKPOT_CHANCE`].
pub const OTHER_JACKPOT_CHANCE: f64 = 0.015;

pub const REEL_COUNT: usize = 5;
const SPIN_FRAMES: usize = 4;
const FRAME_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Symbol {
    Sun,
    Moon,
    Star,
    Clover,
    Bomb,
}

pub const SYMBOLS: [Symbol; 5] = [
    Symbol::Sun,
    Symbol::Moon,
    Symbol::Star,
    Symbol::Clover,
    Symbol::Bomb,
];

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Symbol::Sun => "☀️",
            Symbol::Moon => "🌙",
            Symbol::Star => "⭐",
            Symbol::Clover => "🍀",
            Symbol::Bomb => "💣",
        })
    }
}

pub type Reels = [Symbol; REEL_COUNT];

fn render(reels: &Reels) -> String {
    reels
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

fn uniform(reels: &Reels) -> bool {
    reels.iter().all(|symbol| *symbol == reels[0])
}

fn spin(rng: &mut impl Rng) -> Reels {
    std::array::from_fn(|_| SYMBOLS[rng.gen_range(0..SYMBOLS.len())])
}

/// Draw the final reels.
///
/// Jackpots are decided by one uniform draw; any other outcome is resampled
/// until at least two reels differ.
pub fn decide(rng: &mut impl Rng) -> Reels {
    let chance: f64 = rng.r#gen();
    if chance < SUN_JACKPOT_CHANCE {
        return [Symbol::Sun; REEL_COUNT];
    }
    if chance < OTHER_JACKPOT_CHANCE {
        let symbol = SYMBOLS[1..].choose(rng).copied().unwrap_or(Symbol::Moon);
        return [symbol; REEL_COUNT];
    }
    loop {
        let reels = spin(rng);
        if !uniform(&reels) {
            return reels;
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SlotOutcome {
    pub reels: Reels,
    /// Base plus accumulator at the time of the spin, fee included.
    pub jackpot: Points,
    pub payout: Option<Points>,
    pub balance: Points,
}

/// Charge the fee, grow the accumulator, and pay out when all reels match.
pub fn settle(
    doc: &mut LedgerDocument,
    user: UserId,
    reels: Reels,
) -> Result<SlotOutcome, LedgerError> {
    doc.debit(user, FEE)?;
    doc.slot_accumulator += FEE;
    let jackpot = BASE_JACKPOT + doc.slot_accumulator;

    let payout = uniform(&reels).then(|| {
        let mut reward = jackpot.scale_floor(JACKPOT_RATIO);
        if reels[0] == Symbol::Sun {
            reward += SUN_BONUS;
        }
        reward
    });
    if let Some(reward) = payout {
        doc.credit(user, Field::Points, reward);
        doc.slot_accumulator = Points::ZERO;
    }

    Ok(SlotOutcome {
        reels,
        jackpot,
        payout,
        balance: doc.balance(user),
    })
}

pub fn play(
    doc: &mut LedgerDocument,
    user: UserId,
    rng: &mut impl Rng,
) -> Result<SlotOutcome, LedgerError> {
    let reels = decide(rng);
    settle(doc, user, reels)
}

/// Random frames shown while the reels spin.
pub fn spin_frames(rng: &mut impl Rng) -> Vec<Reels> {
    (0..SPIN_FRAMES).map(|_| spin(rng)).collect()
}

pub fn result_embed(player: &str, outcome: &SlotOutcome) -> Embed {
    let title = format!("🎰 {player}'s spin");
    match outcome.payout {
        Some(reward) => {
            let mut description = format!(
                "🎉 Five {} in a row! Jackpot of {reward} points!",
                outcome.reels[0]
            );
            if outcome.reels[0] == Symbol::Sun {
                description
                    .push_str(&format!("\n☀️ Solar jackpot bonus of {SUN_BONUS} included!"));
            }
            Embed::new(title).description(description)
        }
        None => Embed::new(title)
            .description("💀 No luck. The jackpot keeps growing...")
            .field(
                "Jackpot",
                format!(
                    "{BASE_JACKPOT} + {} = {}",
                    outcome.jackpot - BASE_JACKPOT,
                    outcome.jackpot
                ),
            )
            .field("Balance", outcome.balance.to_string()),
    }
}

/// Play the spinning animation for an already settled outcome, then post the
/// result.
pub async fn animate(
    services: Services,
    channel: ChannelId,
    player: String,
    frames: Vec<Reels>,
    outcome: SlotOutcome,
) {
    let message = services.say(channel, "🎰 Spinning...");
    for frame in &frames {
        services
            .gateway
            .edit_message(message, &format!("🎰 | {}", render(frame)));
        sleep(FRAME_DELAY).await;
    }
    sleep(FRAME_DELAY * 2).await;
    services
        .gateway
        .edit_message(message, &format!("🎯 Result | {}", render(&outcome.reels)));
    sleep(FRAME_DELAY * 4).await;
    services.say(channel, result_embed(&player, &outcome));
}
