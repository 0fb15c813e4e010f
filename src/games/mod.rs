//! Mini-game coordinators.
//!
//! Single-shot games (gamble, slot, dice, solo rock-paper-scissors) settle
//! inside one ledger unit. Interactive games (race, reaction battle, duel,
//! numeric guess) suspend while waiting on chat input; they never hold a
//! ledger lock across a wait and always reach a terminal outcome when a
//! deadline passes.

use std::sync::Arc;

use thiserror::Error;

use crate::gateway::{Gateway, MessageRef, Reply};
use crate::ledger::{Ledger, LedgerError};
use crate::model::ChannelId;

pub mod dice;
pub mod gamble;
pub mod guess;
pub mod race;
pub mod reaction;
pub mod rps;
pub mod slot;

mod inbox;
pub use inbox::Inbox;

#[derive(Debug, Error)]
pub enum GameError {
    #[error("a race is already running")]
    RaceRunning,

    #[error("no race has been set up; enter horses first")]
    NoRace,

    #[error(
        "a race needs between {min} and {max} horses, got {got}",
        min = race::MIN_HORSES,
        max = race::MAX_HORSES
    )]
    HorseCount { got: usize },

    #[error("there is no horse number {0}")]
    InvalidHorse(usize),

    #[error("you already placed a bet on this race")]
    AlreadyBet,

    #[error("dice needs at least {0} points")]
    DiceMinimum(crate::Points),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// What coordinators need from the rest of the bot.
#[derive(Clone)]
pub struct Services {
    pub ledger: Arc<Ledger>,
    pub gateway: Arc<dyn Gateway>,
}

impl Services {
    pub fn new(ledger: Arc<Ledger>, gateway: Arc<dyn Gateway>) -> Self {
        Self { ledger, gateway }
    }

    pub fn say(&self, channel: ChannelId, reply: impl Into<Reply>) -> MessageRef {
        self.gateway.send_message(channel, reply.into())
    }
}
